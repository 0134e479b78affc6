//! Credential renewal adapter

pub mod renewal;

pub use renewal::HttpRenewalClient;
