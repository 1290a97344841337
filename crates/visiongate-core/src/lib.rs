//! Vision Gate core
//!
//! Configuration, error taxonomy and the domain models shared by the
//! processing pipeline, the infrastructure layer and the HTTP API.

pub mod config;
pub mod error;
pub mod models;

pub use config::{Config, ConfigError, LogFormat};
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel};
pub use models::*;
