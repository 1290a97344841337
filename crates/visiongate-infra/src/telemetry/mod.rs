//! Tracing initialization

mod init;

pub use init::{build_env_filter, init_telemetry};
