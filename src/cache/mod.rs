//! Cached entity collections and the load coordinator that keeps them
//! fresh.
//!
//! This module provides:
//! - `DataStore`: the per-session entity cache with per-kind freshness
//!   metadata and the optimistic-update protocol for webhook creation
//! - `Coordinator`: cache-aware loading with in-flight deduplication,
//!   retry/backoff, and cooperative cancellation

pub mod coordinator;
pub mod store;

pub use coordinator::{Coordinator, InitialLoad, Load};
pub use store::{CacheConfig, CacheEntry, CacheStatus, DataStore, EntityKind};
