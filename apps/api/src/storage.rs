//! Storage path resolution and age-based cleanup of uploaded/generated files.
//!
//! The base directory depends on where the service runs: a Railway volume, a
//! Render persistent disk, or a local directory. `uploads/` and `downloads/`
//! live under it and are created on startup.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::StorageConfig;

const RAILWAY_DEFAULT_PATH: &str = "/data/storage";
const RENDER_DEFAULT_PATH: &str = "/opt/render/project/src/storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    Railway,
    Render,
    Local,
}

#[derive(Debug, Clone)]
pub struct Storage {
    deployment: Deployment,
    base: PathBuf,
    uploads: PathBuf,
    downloads: PathBuf,
}

impl Storage {
    /// Picks the base directory from the environment markers and creates the subdirectories.
    pub fn resolve(config: &StorageConfig) -> Result<Self> {
        let (deployment, base) = if let Some(path) = &config.railway_storage_path {
            let base = if path.as_os_str().is_empty() {
                PathBuf::from(RAILWAY_DEFAULT_PATH)
            } else {
                path.clone()
            };
            info!("Railway environment detected, using persistent storage: {}", base.display());
            (Deployment::Railway, base)
        } else if config.render {
            let base = config
                .render_disk_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(RENDER_DEFAULT_PATH));
            info!("Render environment detected, using persistent disk: {}", base.display());
            (Deployment::Render, base)
        } else {
            info!("Local environment detected, using directory: {}", config.local_path.display());
            (Deployment::Local, config.local_path.clone())
        };

        Self::at(deployment, base)
    }

    /// Uses `base` directly. Idempotent: existing directories are kept.
    pub fn at(deployment: Deployment, base: PathBuf) -> Result<Self> {
        let storage = Self {
            deployment,
            uploads: base.join("uploads"),
            downloads: base.join("downloads"),
            base,
        };
        storage.ensure_directories()?;
        Ok(storage)
    }

    fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.uploads, &self.downloads] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        }
        info!(
            "Storage directories ready: {}, {}",
            self.uploads.display(),
            self.downloads.display()
        );
        Ok(())
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads
    }

    pub fn upload_file_path(&self, filename: &str) -> PathBuf {
        self.uploads.join(filename)
    }

    pub fn download_file_path(&self, filename: &str) -> PathBuf {
        self.downloads.join(filename)
    }

    /// Deletes files in both directories last modified more than `max_age_hours` ago.
    pub fn sweep(&self, max_age_hours: u64) -> Result<usize> {
        info!("Sweeping files older than {max_age_hours} hours");
        let cutoff = i64::try_from(max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            warn!("Max age of {max_age_hours} hours reaches before any representable time, nothing to delete");
            return Ok(0);
        };
        let deleted = self.sweep_older_than(SystemTime::from(cutoff))?;
        info!("{deleted} files deleted");
        Ok(deleted)
    }

    /// Deletes regular files whose modification time is strictly before `cutoff`.
    /// A file that cannot be inspected or deleted is logged and skipped.
    pub fn sweep_older_than(&self, cutoff: SystemTime) -> Result<usize> {
        let mut deleted = 0;
        for dir in [&self.uploads, &self.downloads] {
            let entries = std::fs::read_dir(dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        error!("Failed to read entry in {}: {e}", dir.display());
                        continue;
                    }
                };
                let path = entry.path();
                let modified = match entry.metadata() {
                    Ok(meta) if meta.is_file() => meta.modified(),
                    Ok(_) => continue,
                    Err(e) => {
                        error!("Failed to stat {}: {e}", path.display());
                        continue;
                    }
                };
                match modified {
                    Ok(mtime) if mtime < cutoff => match std::fs::remove_file(&path) {
                        Ok(()) => {
                            deleted += 1;
                            info!("Deleted file: {}", path.display());
                        }
                        Err(e) => error!("Failed to delete {}: {e}", path.display()),
                    },
                    Ok(_) => {}
                    Err(e) => error!("No modification time for {}: {e}", path.display()),
                }
            }
        }
        Ok(deleted)
    }
}
