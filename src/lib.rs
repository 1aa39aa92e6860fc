//! Rainmakers deal-sync service.
//!
//! Keeps the portal's commercial-real-estate deal records synchronized
//! with the external CRM (GHL): inbound opportunity webhooks are matched
//! to deals, diffed against them, and the minimal update set is persisted.
//! Also serves the thin read/write API the admin dashboard consumes.
//!
//! # Modules
//!
//! - `config`: Environment-driven configuration.
//! - `deal_store`: Deal persistence (Postgres JSONB or in-memory).
//! - `errors`: Error handling types.
//! - `ghl_client`: GHL REST client (pipeline stage-name lookup).
//! - `handlers`: HTTP request handlers and the router.
//! - `matcher`: Deal matching fallback chain.
//! - `models`: Deal document and partial-update types.
//! - `reconciler`: Field mapping tables and the minimal-diff computation.
//! - `stage`: External → canonical stage label normalization.
//! - `webhook_handler`: GHL webhook controller.
//! - `webhook_models`: Webhook payload models.

pub mod config;
pub mod deal_store;
pub mod errors;
pub mod ghl_client;
pub mod handlers;
pub mod matcher;
pub mod models;
pub mod reconciler;
pub mod stage;
pub mod webhook_handler;
pub mod webhook_models;
