//! Vision Gate API Library
//!
//! This crate provides the HTTP handlers, middleware, model backends and
//! application setup for the image analysis service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
mod utils;

pub mod error;
pub mod state;

pub use error::{ErrorDescriptor, ErrorResponse, HttpAppError, PreserveBody};
pub use state::AppState;
