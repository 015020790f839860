use super::{Credential, ScopeSet};
use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

const ENTRY_EXTENSION: &str = "json";

/// Directory of persisted credentials, one file per user and scope set
pub struct CredentialStore {
    dir: PathBuf,
    user: String,
}

impl CredentialStore {
    pub fn new(dir: PathBuf, user: &str) -> Self {
        Self {
            dir,
            user: user.to_string(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Stored credential for `scopes`, only if it is still usable
    pub fn load(&self, scopes: &ScopeSet) -> Result<Option<Credential>> {
        Ok(self.load_entry(scopes)?.filter(|c| !c.is_expired()))
    }

    /// Stored credential for `scopes`, expired or not
    pub fn load_entry(&self, scopes: &ScopeSet) -> Result<Option<Credential>> {
        let path = self.entry_path(scopes);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read credential {:?}: {}",
                    path, e
                )));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(path = ?path, "Ignoring unreadable stored credential: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist atomically: write a private temp file, then rename over the entry
    pub fn save(&self, scopes: &ScopeSet, credential: &Credential) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Storage(format!("Failed to create token directory: {}", e))
        })?;

        let path = self.entry_path(scopes);
        let tmp_path =
            path.with_extension(format!("{}.{}.tmp", ENTRY_EXTENSION, std::process::id()));

        let contents = serde_json::to_string_pretty(credential)?;

        let written = write_private(&tmp_path, contents.as_bytes())
            .and_then(|_| fs::rename(&tmp_path, &path));

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(AppError::Storage(format!(
                "Failed to write credential {:?}: {}",
                path, e
            )));
        }

        debug!(path = ?path, "Saved credential");
        Ok(())
    }

    /// Remove every stored credential, returning how many were deleted
    #[instrument(name = "Clearing stored credentials", skip_all)]
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored credentials to clear");
                return Ok(0);
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to list token directory: {}",
                    e
                )));
            }
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                fs::remove_file(&path).map_err(|e| {
                    AppError::Storage(format!("Failed to delete {:?}: {}", path, e))
                })?;
                removed += 1;
            }
        }

        debug!(removed, "Cleared stored credentials");
        Ok(removed)
    }

    fn entry_path(&self, scopes: &ScopeSet) -> PathBuf {
        self.dir
            .join(format!("{}.{}", entry_key(&self.user, scopes), ENTRY_EXTENSION))
    }
}

fn entry_key(user: &str, scopes: &ScopeSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update([0u8]);
    hasher.update(scopes.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // Create file with owner-only permissions from the start
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;

    file.write_all(contents)?;
    file.sync_all()
}
