pub mod jwt;
pub mod random;

pub use random::token_urlsafe;
