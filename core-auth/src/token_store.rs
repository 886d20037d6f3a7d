//! Credential Store
//!
//! Holds the access/refresh token pair for one API origin and persists it
//! through the platform [`SecureStore`].
//!
//! ## Guarantees
//!
//! - Both tokens live in a single JSON record under a single key, so every
//!   write replaces the pair as a whole.
//! - Writes are serialized; the in-memory view changes only after the durable
//!   write succeeded.
//! - `clear()` always empties the in-memory view, even when the durable delete
//!   fails.
//! - Token values are never logged or included in error messages.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialStore, TokenKind};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::load(secure_store, "http://localhost:8000").await?;
//!
//! store.set("access", "refresh").await?;
//! assert!(store.has_access_token());
//! assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("refresh"));
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{TokenKind, TokenPair};
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const STORAGE_KEY_PREFIX: &str = "session_tokens:";

/// Durable record. One record per origin.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    updated_at: i64,
}

/// Source of truth for token presence.
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    origin: String,
    key: String,
    cache: RwLock<Option<TokenPair>>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Read the durable record for `origin` once and build the store.
    ///
    /// A record that cannot be decoded is deleted and the store starts empty.
    pub async fn load(secure_store: Arc<dyn SecureStore>, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let key = format!("{}{}", STORAGE_KEY_PREFIX, origin);

        let data = secure_store.get_secret(&key).await.map_err(|e| {
            warn!(origin = %origin, error = %e, "Failed to read credentials from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let initial = match data {
            None => {
                debug!(origin = %origin, "No stored credentials");
                None
            }
            Some(bytes) => match serde_json::from_slice::<StoredSession>(&bytes) {
                Ok(stored) if !stored.access_token.is_empty() && !stored.refresh_token.is_empty() => {
                    info!(origin = %origin, updated_at = stored.updated_at, "Loaded stored credentials");
                    Some(TokenPair::new(stored.access_token, stored.refresh_token))
                }
                Ok(_) => {
                    warn!(origin = %origin, "Stored credentials incomplete, discarding");
                    Self::discard(&*secure_store, &key, &origin).await;
                    None
                }
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Stored credentials corrupted, discarding");
                    Self::discard(&*secure_store, &key, &origin).await;
                    None
                }
            },
        };

        Ok(Self {
            secure_store,
            origin,
            key,
            cache: RwLock::new(initial),
            write_lock: Mutex::new(()),
        })
    }

    async fn discard(secure_store: &dyn SecureStore, key: &str, origin: &str) {
        if let Err(e) = secure_store.delete_secret(key).await {
            warn!(origin = %origin, error = %e, "Failed to delete unreadable credentials");
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Option<TokenPair>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Option<TokenPair>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, kind: TokenKind) -> Option<String> {
        self.read_cache()
            .as_ref()
            .map(|pair| pair.get(kind).to_string())
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(TokenKind::Access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(TokenKind::Refresh)
    }

    /// Both tokens, if a session is stored.
    pub fn snapshot(&self) -> Option<TokenPair> {
        self.read_cache().clone()
    }

    /// Presence check against the in-memory view. No I/O.
    pub fn has_access_token(&self) -> bool {
        self.read_cache().is_some()
    }

    /// Store a fresh pair, replacing whatever was there.
    pub async fn set(&self, access: impl Into<String>, refresh: impl Into<String>) -> Result<()> {
        let pair = TokenPair::new(access, refresh);
        if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "access and refresh tokens must both be non-empty".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        self.persist(&pair).await?;
        *self.write_cache() = Some(pair);

        info!(origin = %self.origin, "Credentials stored");
        Ok(())
    }

    /// Replace the access token after a refresh made with `used_refresh`.
    ///
    /// The refresh token changes only when `rotated_refresh` is given.
    /// Returns `false` without writing when the stored session no longer holds
    /// `used_refresh`, so a refresh that lands after a logout (or after a new
    /// login) cannot overwrite the current session.
    pub async fn update_access(
        &self,
        access: impl Into<String>,
        rotated_refresh: Option<String>,
        used_refresh: &str,
    ) -> Result<bool> {
        let access = access.into();
        if access.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "access token must be non-empty".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let Some(current) = self.snapshot() else {
            debug!(origin = %self.origin, "No session to update, skipping");
            return Ok(false);
        };

        if current.refresh_token != used_refresh {
            debug!(origin = %self.origin, "Session replaced since refresh started, skipping");
            return Ok(false);
        }

        let rotated = rotated_refresh.filter(|token| !token.is_empty());
        let has_rotated = rotated.is_some();
        let pair = TokenPair::new(access, rotated.unwrap_or(current.refresh_token));

        self.persist(&pair).await?;
        *self.write_cache() = Some(pair);

        info!(origin = %self.origin, rotated = has_rotated, "Access token updated");
        Ok(true)
    }

    /// Forget both tokens.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let had_session = self.write_cache().take().is_some();

        self.secure_store.delete_secret(&self.key).await.map_err(|e| {
            warn!(origin = %self.origin, error = %e, "Failed to delete credentials from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        info!(origin = %self.origin, had_session, "Credentials cleared");
        Ok(())
    }

    async fn persist(&self, pair: &TokenPair) -> Result<()> {
        let stored = StoredSession {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            updated_at: chrono::Utc::now().timestamp(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| AuthError::SerializationFailed {
            context: "credential record".to_string(),
            source: e,
        })?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(origin = %self.origin, error = %e, "Failed to write credentials to secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("origin", &self.origin)
            .field("has_access_token", &self.has_access_token())
            .finish()
    }
}
