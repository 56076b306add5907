pub mod config;
pub mod error;
pub mod models;

pub use config::*;
pub use error::CoreError;
pub use models::*;
