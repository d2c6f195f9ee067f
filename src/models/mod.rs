//! Wire-format entity types for the Campaign Monitor API.
//!
//! This module contains the data structures exchanged with the upstream
//! API:
//!
//! - `Client`, `ClientDetails`: account-level client records
//! - `List`, `ListStats`: subscriber lists with merged statistics
//! - `Webhook`, `NewWebhook`: webhook subscriptions, creation payloads, and
//!   the validation rules applied before anything goes on the wire

pub mod client;
pub mod list;
pub mod webhook;

pub use client::{BasicDetails, Client, ClientDetails};
pub use list::{List, ListStats};
pub use webhook::{validate_webhook_payload, NewWebhook, PayloadFormat, Webhook, WebhookEvent};
