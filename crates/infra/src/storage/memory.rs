//! In-memory credential store
//!
//! Every handle created through [`MemoryCredentialStore::linked`] is a
//! separate execution context over the same entries, the way two windows of
//! one application share their origin's storage. A write through one handle
//! is reported to listeners registered on the others, never to its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use novaio_core::{CredentialStore, ExternalChangeListener, ExternalChangeSource, ListenerId};
use novaio_domain::{CredentialPair, Result, StorageKeyNames, UserProfile};
use parking_lot::{Mutex, RwLock};

use super::{diff, parse_profile, Entries};

struct Registration {
    id: ListenerId,
    context: u64,
    listener: ExternalChangeListener,
}

#[derive(Default)]
struct SharedEntries {
    entries: RwLock<Entries>,
    listeners: Mutex<Vec<Registration>>,
    next_context: AtomicU64,
    next_listener: AtomicU64,
}

/// Credential store held in process memory.
pub struct MemoryCredentialStore {
    shared: Arc<SharedEntries>,
    names: StorageKeyNames,
    context: u64,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_key_names(StorageKeyNames::default())
    }

    pub fn with_key_names(names: StorageKeyNames) -> Self {
        Self { shared: Arc::new(SharedEntries::default()), names, context: 0 }
    }

    /// A new execution context over the same entries.
    pub fn linked(&self) -> Self {
        let context = self.shared.next_context.fetch_add(1, Ordering::Relaxed) + 1;
        Self { shared: Arc::clone(&self.shared), names: self.names.clone(), context }
    }

    /// Listeners registered across every linked context.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    fn read(&self, name: &str) -> Option<String> {
        self.shared.entries.read().get(name).cloned()
    }

    fn write(&self, apply: impl FnOnce(&mut Entries, &StorageKeyNames)) {
        let changes = {
            let mut entries = self.shared.entries.write();
            let before = entries.clone();
            apply(&mut entries, &self.names);
            diff(&self.names, &before, &entries)
        };
        if changes.is_empty() {
            return;
        }

        let listeners: Vec<ExternalChangeListener> = self
            .shared
            .listeners
            .lock()
            .iter()
            .filter(|registration| registration.context != self.context)
            .map(|registration| Arc::clone(&registration.listener))
            .collect();
        for change in &changes {
            for listener in &listeners {
                listener(change);
            }
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.read(&self.names.access_token))
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.read(&self.names.refresh_token))
    }

    fn save_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.write(|entries, names| {
            entries.insert(names.access_token.clone(), pair.access_token.clone());
            entries.insert(names.refresh_token.clone(), pair.refresh_token.clone());
        });
        Ok(())
    }

    fn clear_credentials(&self) -> Result<()> {
        self.write(|entries, names| {
            entries.remove(&names.access_token);
            entries.remove(&names.refresh_token);
        });
        Ok(())
    }

    fn user_profile(&self) -> Result<Option<UserProfile>> {
        Ok(parse_profile(self.read(&self.names.user).as_ref()))
    }

    fn save_user_profile(&self, profile: Option<&UserProfile>) -> Result<()> {
        let raw = profile.map(serde_json::to_string).transpose()?;
        self.write(|entries, names| match raw {
            Some(raw) => {
                entries.insert(names.user.clone(), raw);
            }
            None => {
                entries.remove(&names.user);
            }
        });
        Ok(())
    }
}

impl ExternalChangeSource for MemoryCredentialStore {
    fn on_external_change(&self, listener: ExternalChangeListener) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().push(Registration { id, context: self.context, listener });
        id
    }

    fn remove_external_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }
}
