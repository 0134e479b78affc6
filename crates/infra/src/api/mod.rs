//! Authenticated API surface
//!
//! - [`AuthenticatedClient`]: request pipeline with pre-flight renewal and a
//!   single renew-and-retry after a 401
//! - [`Session`]: session lifecycle glue (login, logout, forced refresh)
//!   kept in sync with rotation events and other execution contexts
//!
//! Token values are never logged; only presence flags and lengths.

pub mod client;
pub mod errors;
pub mod request;
pub mod session;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use request::ApiRequest;
pub use session::{Session, SessionSnapshot};
