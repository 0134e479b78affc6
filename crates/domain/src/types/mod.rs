//! Domain types and models

pub mod credentials;
pub mod events;
pub mod user;

pub use credentials::{AccessClaims, CredentialPair};
pub use events::{AuthEvent, AuthEventKind, RefreshFailure, StorageChange, StorageKey};
pub use user::{AuthResponse, LoginRequest, TokensDto, UserProfile};
