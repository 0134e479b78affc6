//! Durable credential store backed by one JSON document
//!
//! The document is a flat object of key name to string value. Every read goes
//! to disk so a rotation made by another process is seen immediately; every
//! write replaces the document atomically (temp file + rename), so the access
//! and refresh entries change together or not at all.
//!
//! Read-modify-write cycles hold an exclusive advisory lock on a sibling
//! `<document>.lock` file, so handles in other processes never write back a
//! stale copy of entries they did not touch.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fs4::fs_std::FileExt;
use novaio_core::{CredentialStore, ExternalChangeListener, ExternalChangeSource, ListenerId};
use novaio_domain::{CredentialPair, NovaError, Result, StorageChange, StorageKeyNames, UserProfile};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{diff, parse_profile, Entries};
use crate::errors::InfraError;

#[derive(Default)]
struct FileState {
    // Serializes read-modify-write cycles within this process and guards the
    // last document this handle wrote or observed.
    last_seen: Mutex<Entries>,
    listeners: RwLock<Vec<(ListenerId, ExternalChangeListener)>>,
    next_listener: AtomicU64,
}

/// Credential store persisted to a JSON file.
#[derive(Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_path: PathBuf,
    names: StorageKeyNames,
    state: Arc<FileState>,
}

impl FileCredentialStore {
    /// Open (or lazily create) the document at `path`.
    ///
    /// # Errors
    /// Returns `NovaError::Serialization` when an existing document is not a
    /// JSON object of strings.
    pub fn open(path: impl Into<PathBuf>, names: StorageKeyNames) -> Result<Self> {
        let path = path.into();
        let current = load(&path)?;
        debug!(path = %path.display(), entries = current.len(), "opened credential file");
        let state = FileState { last_seen: Mutex::new(current), ..FileState::default() };
        Ok(Self { lock_path: sibling(&path, "lock"), path, names, state: Arc::new(state) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compare the document on disk with the last one this handle saw and
    /// notify listeners of every entry another process changed.
    ///
    /// # Errors
    /// Propagates read and parse failures; the last seen snapshot is left
    /// unchanged in that case.
    pub fn poll_external_changes(&self) -> Result<Vec<StorageChange>> {
        let changes = {
            let mut last_seen = self.state.last_seen.lock();
            let current = load(&self.path)?;
            let changes = diff(&self.names, &last_seen, &current);
            *last_seen = current;
            changes
        };
        self.notify(&changes);
        Ok(changes)
    }

    /// Poll for external changes every `interval` until `cancel` fires.
    pub fn spawn_watcher(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match store.poll_external_changes() {
                    Ok(changes) if !changes.is_empty() => {
                        debug!(changes = changes.len(), "credential file changed externally");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, path = %store.path.display(), "credential file poll failed"),
                }
            }
            debug!(path = %store.path.display(), "credential file watcher stopped");
        })
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        Ok(load(&self.path)?.remove(name))
    }

    fn write(&self, apply: impl FnOnce(&mut Entries, &StorageKeyNames)) -> Result<()> {
        let external = {
            let mut last_seen = self.state.last_seen.lock();
            let _lock = DocumentLock::acquire(&self.lock_path)?;
            let mut current = load(&self.path)?;
            // Changes made by others since our last look are still reported.
            let external = diff(&self.names, &last_seen, &current);
            apply(&mut current, &self.names);
            save(&self.path, &current)?;
            *last_seen = current;
            external
        };
        self.notify(&external);
        Ok(())
    }

    fn notify(&self, changes: &[StorageChange]) {
        if changes.is_empty() {
            return;
        }
        let listeners: Vec<ExternalChangeListener> =
            self.state.listeners.read().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for change in changes {
            for listener in &listeners {
                listener(change);
            }
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Result<Option<String>> {
        self.read(&self.names.access_token)
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        self.read(&self.names.refresh_token)
    }

    fn credentials(&self) -> Result<Option<CredentialPair>> {
        let mut entries = load(&self.path)?;
        Ok(match (entries.remove(&self.names.access_token), entries.remove(&self.names.refresh_token)) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        })
    }

    fn save_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.write(|entries, names| {
            entries.insert(names.access_token.clone(), pair.access_token.clone());
            entries.insert(names.refresh_token.clone(), pair.refresh_token.clone());
        })
    }

    fn clear_credentials(&self) -> Result<()> {
        self.write(|entries, names| {
            entries.remove(&names.access_token);
            entries.remove(&names.refresh_token);
        })
    }

    fn user_profile(&self) -> Result<Option<UserProfile>> {
        Ok(parse_profile(self.read(&self.names.user)?.as_ref()))
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
        })
    }
}

impl ExternalChangeSource for FileCredentialStore {
    fn on_external_change(&self, listener: ExternalChangeListener) -> ListenerId {
        let id = ListenerId(self.state.next_listener.fetch_add(1, Ordering::Relaxed));
        self.state.listeners.write().push((id, listener));
        id
    }

    fn remove_external_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.state.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }
}

/// Exclusive lock on the document's lock file, released on drop.
struct DocumentLock {
    file: File,
}

impl DocumentLock {
    fn acquire(lock_path: &Path) -> Result<Self> {
        ensure_parent(lock_path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(InfraError::from)?;
        FileExt::lock_exclusive(&file).map_err(InfraError::from)?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `<document>.<suffix>` next to the document.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{file_name}.{suffix}"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(InfraError::from)?;
    }
    Ok(())
}

/// A missing document reads as empty.
fn load(path: &Path) -> Result<Entries> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(Entries::new()),
        Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
            NovaError::Serialization(format!("invalid credential file {}: {err}", path.display()))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
        Err(err) => Err(InfraError::from(err).into()),
    }
}

/// Write the document atomically (unique tmp file + rename).
fn save(path: &Path, entries: &Entries) -> Result<()> {
    ensure_parent(path)?;

    let json = serde_json::to_string_pretty(entries)?;
    let tmp_path = sibling(path, &format!("{}.tmp", Uuid::new_v4().simple()));

    std::fs::write(&tmp_path, json).map_err(InfraError::from)?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(InfraError::from(err).into());
    }
    Ok(())
}
