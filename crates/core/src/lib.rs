//! # Novaio Core
//!
//! Credential coordination logic - no I/O.
//!
//! This crate contains:
//! - Access credential decoding and expiry checks
//! - The single-flight renewal coordinator
//! - The process-wide notification bus
//! - Port interfaces (traits) for storage and renewal
//! - Pure pre-flight and recovery decisions used by the request pipeline
//!
//! ## Architecture Principles
//! - Only depends on `novaio-domain`
//! - No network, filesystem or platform code
//! - All external dependencies via traits

pub mod auth;

// Re-export specific items to avoid ambiguity
pub use auth::bus::{NotificationBus, SubscriptionId};
pub use auth::codec::{decode_expiry, is_near_expiry, is_near_expiry_at, now_epoch_ms};
pub use auth::coordinator::SingleFlight;
pub use auth::ports::{
    CredentialRenewer, CredentialStore, ExternalChangeListener, ExternalChangeSource, ListenerId,
};
pub use auth::recovery::{plan_preflight, should_recover, PreflightAction};
