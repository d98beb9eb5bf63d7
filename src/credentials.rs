//! Credential pool with circular rotation and pluggable persistence.
//!
//! [`CredentialRing`] owns the ordered pool and its cursor behind an async
//! mutex, so rotations and additions from concurrent requests are
//! serialized, including the write to the backing [`CredentialStore`].
//!
//! The default store, [`EnvFileStore`], keeps credentials in a key-value env
//! file under sequentially numbered keys (`GOOGLE_API_KEY_1`,
//! `GOOGLE_API_KEY_2`, ...). Loading scans indices from 1 until one is
//! missing; process environment variables take precedence over file values.

use crate::error::Result;
use crate::RelayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default key prefix for persisted credentials.
pub const DEFAULT_KEY_PREFIX: &str = "GOOGLE_API_KEY";

/// Durable storage for the credential pool.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted pool, in slot order.
    async fn load(&self) -> Result<Vec<String>>;

    /// Persist the full pool, one slot per credential.
    async fn save(&self, credentials: &[String]) -> Result<()>;

    /// Where the credentials live, for logs.
    fn describe(&self) -> String;
}

/// Env-file backed credential store.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
    prefix: String,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key name for 1-based slot `n`.
    pub fn key_name(&self, n: usize) -> String {
        format!("{}_{}", self.prefix, n)
    }

    /// Slot number of a `PREFIX_<n>=...` line, if it is one.
    fn slot_of(&self, line: &str) -> Option<usize> {
        let key = line.split('=').next()?.trim();
        key.strip_prefix(&self.prefix)?
            .strip_prefix('_')?
            .parse::<usize>()
            .ok()
    }

    fn read_file_values(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let iter = dotenv::from_path_iter(&self.path).map_err(|e| {
            RelayError::InvalidConfig(format!(
                "cannot read credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut values = HashMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    values.insert(key, value);
                }
                Err(e) => {
                    tracing::warn!(
                        file = %self.path.display(),
                        error = %e,
                        "skipping unparseable line in credential file"
                    );
                }
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl CredentialStore for EnvFileStore {
    async fn load(&self) -> Result<Vec<String>> {
        let file_values = self.read_file_values()?;

        let mut keys = Vec::new();
        for n in 1.. {
            let name = self.key_name(n);
            let value = std::env::var(&name)
                .ok()
                .or_else(|| file_values.get(&name).cloned())
                .filter(|v| !v.trim().is_empty());
            match value {
                Some(v) => {
                    tracing::debug!(key = %name, "found credential");
                    keys.push(v);
                }
                None => break,
            }
        }

        tracing::info!(
            file = %self.path.display(),
            count = keys.len(),
            "loaded credentials"
        );
        Ok(keys)
    }

    async fn save(&self, credentials: &[String]) -> Result<()> {
        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut lines: Vec<String> = existing.lines().map(String::from).collect();
        let slots: HashMap<usize, usize> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| self.slot_of(line).map(|n| (n, i)))
            .collect();

        for (idx, credential) in credentials.iter().enumerate() {
            let n = idx + 1;
            let entry = format!("{}={}", self.key_name(n), credential);
            match slots.get(&n) {
                Some(&line_no) => lines[line_no] = entry,
                None => lines.push(entry),
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        tokio::fs::write(&self.path, out).await?;

        tracing::info!(
            file = %self.path.display(),
            count = credentials.len(),
            "persisted credentials"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory credential store, for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    credentials: std::sync::Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(credentials: Vec<String>) -> Self {
        Self {
            credentials: std::sync::Mutex::new(credentials),
        }
    }

    /// The most recently saved pool.
    pub fn saved(&self) -> Vec<String> {
        self.credentials
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Vec<String>> {
        Ok(self.saved())
    }

    async fn save(&self, credentials: &[String]) -> Result<()> {
        let mut guard = self
            .credentials
            .lock()
            .map_err(|_| RelayError::Other("credential store lock poisoned".into()))?;
        *guard = credentials.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Result of a rotation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub from: usize,
    pub to: usize,
}

struct RingState {
    keys: Vec<String>,
    cursor: usize,
}

/// The shared credential pool and its rotation cursor.
///
/// The pool is never empty and never shrinks; the cursor always indexes a
/// valid slot.
pub struct CredentialRing {
    state: Mutex<RingState>,
    store: Arc<dyn CredentialStore>,
}

impl CredentialRing {
    /// Load the pool from `store`. Fails if no credentials are found.
    pub async fn load(store: Arc<dyn CredentialStore>) -> Result<Self> {
        let keys = store.load().await?;
        Self::from_keys(keys, store)
    }

    /// Build a ring from an explicit pool. Fails on an empty pool.
    pub fn from_keys(keys: Vec<String>, store: Arc<dyn CredentialStore>) -> Result<Self> {
        if keys.is_empty() {
            return Err(RelayError::InvalidConfig(format!(
                "no API keys found in {}",
                store.describe()
            )));
        }
        Ok(Self {
            state: Mutex::new(RingState { keys, cursor: 0 }),
            store,
        })
    }

    /// The active credential and its slot index.
    pub async fn active(&self) -> (usize, String) {
        let state = self.state.lock().await;
        (state.cursor, state.keys[state.cursor].clone())
    }

    pub async fn active_index(&self) -> usize {
        self.state.lock().await.cursor
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.keys.len()
    }

    /// Advance the cursor to the next slot, wrapping after the last.
    pub async fn rotate(&self) -> Rotation {
        let mut state = self.state.lock().await;
        let from = state.cursor;
        state.cursor = (state.cursor + 1) % state.keys.len();
        tracing::info!(from, to = state.cursor, "rotated credential");
        Rotation {
            from,
            to: state.cursor,
        }
    }

    /// Rotate only if the cursor still points at `failed`.
    ///
    /// Concurrent requests that fail on the same credential advance the
    /// cursor once instead of skipping healthy slots. Returns `None` when
    /// another request already moved the cursor.
    pub async fn rotate_past(&self, failed: usize) -> Option<Rotation> {
        let mut state = self.state.lock().await;
        if state.cursor != failed {
            return None;
        }
        let from = state.cursor;
        state.cursor = (state.cursor + 1) % state.keys.len();
        tracing::info!(from, to = state.cursor, "rotated credential");
        Some(Rotation {
            from,
            to: state.cursor,
        })
    }

    /// Append a credential and persist the pool.
    ///
    /// Returns `Ok(false)` without touching storage if the credential is
    /// already present. The lock is held across the write so persisted
    /// state never interleaves.
    pub async fn add(&self, credential: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let mut updated = state.keys.clone();
        if !append_credential(&mut updated, credential)? {
            tracing::info!(
                key = %mask_credential(credential.trim()),
                "credential already present"
            );
            return Ok(false);
        }

        self.store.save(&updated).await?;
        state.keys = updated;

        tracing::info!(
            key = %mask_credential(credential.trim()),
            total = state.keys.len(),
            "added credential"
        );
        Ok(true)
    }
}

impl std::fmt::Debug for CredentialRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRing")
            .field("store", &self.store.describe())
            .finish()
    }
}

/// Validate `credential` and push it onto `keys` unless already present.
///
/// Surrounding whitespace is trimmed. Blank or multi-line values are
/// rejected since the env file stores the pool one key per line.
pub fn append_credential(keys: &mut Vec<String>, credential: &str) -> Result<bool> {
    let credential = credential.trim();
    if credential.is_empty() || credential.contains(['\n', '\r']) {
        return Err(RelayError::InvalidConfig(
            "credential must be a non-empty single line".into(),
        ));
    }
    if keys.iter().any(|k| k == credential) {
        return Ok(false);
    }
    keys.push(credential.to_string());
    Ok(true)
}

/// Mask a credential for logging: keep the first 4 characters.
pub fn mask_credential(credential: &str) -> String {
    match credential.char_indices().nth(4) {
        Some((idx, _)) if credential.len() > 8 => format!("{}***", &credential[..idx]),
        _ => "***".to_string(),
    }
}
