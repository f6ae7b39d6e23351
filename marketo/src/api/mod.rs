pub mod assets;
pub mod auth;
pub mod client;
pub mod common;
pub mod error;
pub mod test_helpers;

pub use client::{Client, RetryConfig};
pub use error::ApiError;
