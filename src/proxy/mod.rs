//! Same-origin gateway: path allow-listing and credential injection.
//!
//! This module provides:
//! - `AllowList`: the fixed table of forwardable upstream paths
//! - `build_router` / `serve`: the axum gateway that validates requests and
//!   relays upstream responses verbatim

pub mod allowlist;
pub mod server;

pub use allowlist::AllowList;
pub use server::{build_router, serve, ProxyState};
