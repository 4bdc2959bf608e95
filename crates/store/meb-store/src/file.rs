//! JSON-file backed store.
//!
//! The whole state is small (one record per bot user plus short-lived
//! authorization states), so it is kept in memory and written out as a single
//! JSON document after every mutation. Writes go to a temporary file that is
//! renamed over the previous snapshot, so a crash never leaves a torn file.

use crate::state::StoreState;
use async_trait::async_trait;
use meb_core::{Error, PendingAuthorization, Result, Store, User, UserId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open the store at `path`, loading the existing snapshot if there is one.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create store directory: {}", e);
                Error::StoreInternal(e.to_string())
            })?;
        }

        let state = if fs::try_exists(&path).await.unwrap_or(false) {
            let json = fs::read_to_string(&path).await.map_err(|e| {
                error!("Failed to read store file: {}", e);
                Error::StoreInternal(e.to_string())
            })?;
            let state: StoreState = serde_json::from_str(&json).map_err(|e| {
                error!("Failed to deserialize store file: {}", e);
                Error::StoreInternal(e.to_string())
            })?;
            info!(
                users = state.users.len(),
                pending = state.pending.len(),
                "Store loaded"
            );
            state
        } else {
            info!("No existing store file found, starting empty");
            StoreState::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let json = serde_json::to_vec(state).map_err(|e| {
            error!("Failed to serialize store state: {}", e);
            Error::StoreInternal(e.to_string())
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await.map_err(|e| {
            error!(file = ?tmp, "Failed to write store snapshot: {}", e);
            Error::StoreInternal(e.to_string())
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            error!(file = ?self.path, "Failed to replace store snapshot: {}", e);
            Error::StoreInternal(e.to_string())
        })?;

        debug!("Store snapshot written");
        Ok(())
    }

    /// Apply `op` to a copy of the state, persist it, then commit it.
    ///
    /// The lock is held across the write so mutations are serialized and a
    /// failed write leaves the in-memory state untouched.
    async fn mutate<T>(&self, op: impl FnOnce(&mut StoreState) -> Result<T> + Send) -> Result<T> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let value = op(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(value)
    }
}

#[async_trait]
impl Store for FileStore {
    #[instrument(skip(self))]
    async fn create_user(&self, user_id: UserId, language_code: &str) -> Result<()> {
        self.mutate(|state| state.create_user(user_id, language_code))
            .await
    }

    #[instrument(skip(self))]
    async fn update_language_code(&self, user_id: UserId, language_code: &str) -> Result<()> {
        self.mutate(|state| state.update_language_code(user_id, language_code))
            .await
    }

    #[instrument(skip(self, credential))]
    async fn update_credential(&self, user_id: UserId, credential: &str) -> Result<()> {
        self.mutate(|state| state.update_credential(user_id, credential))
            .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<User> {
        self.state.lock().await.get_user(user_id)
    }

    #[instrument(skip_all, fields(user_id = pending.user_id))]
    async fn create_pending_authorization(&self, pending: PendingAuthorization) -> Result<()> {
        self.mutate(|state| state.insert_pending(pending)).await
    }

    #[instrument(skip_all)]
    async fn take_pending_authorization(&self, state: &str) -> Result<PendingAuthorization> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let taken = next.take_pending(state);

        // An expired record is removed too, so persist whenever something changed.
        if next.pending.len() != guard.pending.len() {
            self.persist(&next).await?;
            *guard = next;
        }

        taken
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let removed = next.cleanup_expired();

        if removed > 0 {
            self.persist(&next).await?;
            *guard = next;
            info!(removed, "Purged expired authorization states");
        }

        Ok(removed)
    }
}
