//! Per-client admission control

mod limiter;

pub use limiter::{Admission, RateLimiter};
