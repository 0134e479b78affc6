//! Credential lifecycle coordination
//!
//! ```text
//! request ──► plan_preflight ──► SingleFlight ──► CredentialRenewer
//!                                     │                  │
//!                                     │                  ├──► CredentialStore (write)
//!                                     │                  └──► NotificationBus (publish)
//! 401 ──► should_recover ─────────────┘
//! ```

pub mod bus;
pub mod codec;
pub mod coordinator;
pub mod ports;
pub mod recovery;
