//! REST transport and typed facade for the Campaign Monitor API.
//!
//! This module provides:
//! - `HttpClient`: the transport adapter (Basic auth injection, 429
//!   re-issue, 401 session teardown, cooperative cancellation)
//! - `CmApi`: one typed operation per upstream resource, plus bounded-wave
//!   batch fetches
//! - `ApiError`: the error taxonomy shared across the crate

pub mod client;
pub mod error;
pub mod http;

pub use client::{BatchOutcome, CmApi, DEFAULT_BATCH_CONCURRENCY};
pub use error::ApiError;
pub use http::HttpClient;
