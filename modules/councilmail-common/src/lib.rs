pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::{Config, DispatchPolicy, NoMatchPolicy};
pub use error::ConfigError;
pub use identity::{identity_key, Keyed};
pub use types::*;
