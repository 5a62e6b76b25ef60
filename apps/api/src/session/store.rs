use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::SessionData;

/// Persists per-session blobs. Carried in `AppState` as `Arc<dyn SessionStore>`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `None` when the session is unknown or expired.
    async fn load(&self, id: &str) -> Result<Option<SessionData>>;

    async fn save(&self, id: &str, data: &SessionData) -> Result<()>;
}

// ────────────────────────────────────────────────────────────────────────────
// FsSessionStore: one JSON file per session
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    expires_at: DateTime<Utc>,
    data: SessionData,
}

const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 3600;

/// Stores sessions as `<dir>/session_<id>.json`, readable by the owner only.
/// Expired files are removed on load; the storage sweep collects the rest.
pub struct FsSessionStore {
    dir: PathBuf,
    lifetime: Duration,
}

impl FsSessionStore {
    pub fn new(dir: PathBuf, lifetime_secs: u64) -> Self {
        let secs = i64::try_from(lifetime_secs)
            .unwrap_or(i64::MAX)
            .min(MAX_LIFETIME_SECS);
        Self {
            dir,
            lifetime: Duration::seconds(secs),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("invalid session id '{id}'");
        }
        Ok(self.dir.join(format!("session_{id}.json")))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>> {
        let path = self.path_for(id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let stored: StoredSession = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Discarding unreadable session {}: {e}", path.display());
                return Ok(None);
            }
        };

        if stored.expires_at <= Utc::now() {
            tracing::debug!("Session {id} expired");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove expired session {}: {e}", path.display());
            }
            return Ok(None);
        }

        Ok(Some(stored.data))
    }

    async fn save(&self, id: &str, data: &SessionData) -> Result<()> {
        let path = self.path_for(id)?;
        let stored = StoredSession {
            expires_at: Utc::now() + self.lifetime,
            data: data.clone(),
        };
        let body = serde_json::to_vec(&stored).context("Failed to serialize session")?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(&body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
