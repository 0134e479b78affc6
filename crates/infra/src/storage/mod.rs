//! Credential store adapters
//!
//! Both adapters keep entries as raw strings under namespaced key names, in
//! the shape of a browser-style key-value storage: the user profile is a JSON
//! string, tokens are stored verbatim.

pub mod configured;
pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use novaio_domain::{StorageChange, StorageKey, StorageKeyNames, UserProfile};
use tracing::debug;

pub use configured::ConfiguredStore;
pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

pub(crate) type Entries = BTreeMap<String, String>;

const KEYS: [StorageKey; 3] = [StorageKey::AccessToken, StorageKey::RefreshToken, StorageKey::User];

pub(crate) fn key_name(names: &StorageKeyNames, key: StorageKey) -> &str {
    match key {
        StorageKey::AccessToken => &names.access_token,
        StorageKey::RefreshToken => &names.refresh_token,
        StorageKey::User => &names.user,
    }
}

/// One change per known key whose value differs between the two snapshots.
pub(crate) fn diff(names: &StorageKeyNames, before: &Entries, after: &Entries) -> Vec<StorageChange> {
    KEYS.iter()
        .filter_map(|&key| {
            let name = key_name(names, key);
            let new_value = after.get(name);
            (before.get(name) != new_value).then(|| StorageChange::new(key, new_value.cloned()))
        })
        .collect()
}

/// Stored profile JSON that no longer parses reads as no profile.
pub(crate) fn parse_profile(raw: Option<&String>) -> Option<UserProfile> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(profile) => Some(profile),
        Err(err) => {
            debug!(error = %err, "ignoring unreadable stored user profile");
            None
        }
    }
}
