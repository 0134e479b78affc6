//! # Novaio Infrastructure
//!
//! Infrastructure implementations of the core credential ports.
//!
//! This crate contains:
//! - The authenticated API client and its session layer
//! - The HTTP renewal client
//! - Memory and file-backed credential stores, selected by configuration
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `novaio-core`
//! - Depends on `novaio-domain` and `novaio-core`
//! - Contains all "impure" code (network, filesystem)

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use api::{
    ApiError, ApiErrorCategory, ApiRequest, AuthenticatedClient, AuthenticatedClientBuilder,
    Session, SessionSnapshot,
};
pub use auth::HttpRenewalClient;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::{init_tracing, init_tracing_with, LogFormat};
pub use storage::{ConfiguredStore, FileCredentialStore, MemoryCredentialStore};
