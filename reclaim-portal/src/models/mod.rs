pub mod identity;
pub mod resource;

pub use identity::Identity;
pub use resource::{DefinedTags, ResourceDescriptor};
