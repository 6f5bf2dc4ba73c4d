pub mod authenticator;
pub mod cloud;
pub mod deleter;
pub mod metrics;
pub mod search;
