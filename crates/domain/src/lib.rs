//! # Novaio Domain
//!
//! Data types shared by every layer of the authenticated HTTP client.
//!
//! This crate contains:
//! - Credential, user profile and login wire types
//! - Notification events and storage change records
//! - The renewal failure classification
//! - Error types, configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other Novaio crates
//! - Only external dependencies allowed
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod renewal;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use renewal::{RenewalError, RenewalErrorKind};
pub use types::*;
