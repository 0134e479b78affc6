//! Store selection from [`ClientConfig`]

use std::sync::Arc;

use novaio_core::{CredentialStore, ExternalChangeSource};
use novaio_domain::{ClientConfig, NovaError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{FileCredentialStore, MemoryCredentialStore};

/// The credential store a configuration asks for.
#[derive(Clone)]
pub enum ConfiguredStore {
    Memory(Arc<MemoryCredentialStore>),
    File(Arc<FileCredentialStore>),
}

impl ConfiguredStore {
    /// A file store at `storage_path` when set, otherwise a memory store.
    /// Both use the namespaced keys of `storage_namespace`.
    ///
    /// # Errors
    /// Returns `NovaError::Serialization` when an existing document is
    /// unreadable.
    pub fn open(config: &ClientConfig) -> Result<Self> {
        let names = config.storage_keys();
        match &config.storage_path {
            Some(path) => {
                info!(path = %path.display(), "using credential file");
                Ok(Self::File(Arc::new(FileCredentialStore::open(path.clone(), names)?)))
            }
            None => {
                debug!(namespace = %config.storage_namespace, "using in-memory credentials");
                Ok(Self::Memory(Arc::new(MemoryCredentialStore::with_key_names(names))))
            }
        }
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        match self {
            Self::Memory(store) => Arc::clone(store) as Arc<dyn CredentialStore>,
            Self::File(store) => Arc::clone(store) as Arc<dyn CredentialStore>,
        }
    }

    pub fn changes(&self) -> Arc<dyn ExternalChangeSource> {
        match self {
            Self::Memory(store) => Arc::clone(store) as Arc<dyn ExternalChangeSource>,
            Self::File(store) => Arc::clone(store) as Arc<dyn ExternalChangeSource>,
        }
    }

    /// Poll a file store every `watch_interval_ms` until `cancel` fires.
    /// Memory stores notify synchronously and need no watcher.
    ///
    /// # Errors
    /// Returns `NovaError::Config` when a file store is used outside a Tokio
    /// runtime.
    pub fn spawn_watcher(
        &self,
        config: &ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>> {
        let Self::File(store) = self else {
            return Ok(None);
        };
        tokio::runtime::Handle::try_current().map_err(|err| {
            NovaError::Config(format!("credential file watcher needs a Tokio runtime: {err}"))
        })?;
        Ok(Some(store.spawn_watcher(config.watch_interval(), cancel)))
    }
}
