//! hookcache - cached webhook-subscription management over the Campaign
//! Monitor REST API.
//!
//! The crate is organised the way the data flows:
//!
//! - [`api`]: the HTTP transport adapter and the typed remote facade
//! - [`cache`]: the entity store and the cache-aware load coordinator
//! - [`auth`]: per-session credential and scope state
//! - [`models`]: wire-format entity types and webhook validation
//! - [`proxy`]: the allow-listing, credential-injecting gateway
//!
//! A session wires up as: `Session` -> `HttpClient` -> `CmApi` ->
//! `Coordinator`, with the session's invalidation channel feeding
//! [`cache::Coordinator::run_invalidation_listener`] so credential changes
//! purge the cache.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod proxy;

pub use api::{ApiError, BatchOutcome, CmApi, HttpClient};
pub use auth::{Scope, Session, SessionEvent};
pub use cache::{CacheConfig, CacheStatus, Coordinator, EntityKind, InitialLoad, Load};
