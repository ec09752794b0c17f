//! Persisted credential bundle.
//!
//! The bundle is a directory holding `creds.json`. The file is opaque JSON
//! apart from the identity field `me.id`, whose presence is the only signal
//! that a usable session exists. Every credential rotation arrives as a JSON
//! merge patch and is written atomically (temp file + rename) under a write
//! lock, so readers never see a half-written bundle.

use crate::CREDENTIALS_FILE_NAME;
use crate::error::session::SessionError;

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;

/// One credential rotation emitted by the session protocol.
///
/// Applied as an RFC 7386 merge patch: objects merge recursively and `null`
/// removes a key.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialDelta(pub Value);

#[derive(Debug, Deserialize)]
struct CredentialMarker {
    #[serde(default)]
    me: Option<Identity>,
}

#[derive(Debug, Deserialize)]
struct Identity {
    #[serde(default)]
    id: String,
}

/// Sole authority on whether a usable session exists.
///
/// Cheap to clone; all clones share the same lock.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: Arc<PathBuf>,
    lock: Arc<RwLock<()>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE_NAME)
    }

    /// True iff the directory holds a bundle that parses and names an identity.
    ///
    /// Anything else counts as "no session" and wipes the directory so a
    /// half-valid bundle is never left behind.
    pub async fn has_session(&self) -> bool {
        let verdict = {
            let _guard = self.lock.read().await;
            self.inspect().await
        };

        match verdict {
            Ok(()) => {
                debug!("Persisted session found at {}", self.dir.display());
                true
            }
            Err(reason) => {
                info!("No usable session: {reason}");
                if let Err(e) = self.clear().await {
                    warn!("Failed to clear unusable session directory: {e}");
                }
                false
            }
        }
    }

    /// Recursively delete the bundle. Idempotent.
    ///
    /// Entries are removed best-effort; failing to remove the directory
    /// itself is an error.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.lock.write().await;

        let mut entries = match fs::read_dir(self.dir.as_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                warn!("Cannot list {} before clearing: {e}", self.dir.display());
                return self.remove_dir().await;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let removed = match entry.file_type().await {
                        Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path).await,
                        _ => fs::remove_file(&path).await,
                    };
                    if let Err(e) = removed {
                        warn!("Failed to remove {}: {e}", path.display());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped listing {}: {e}", self.dir.display());
                    break;
                }
            }
        }

        self.remove_dir().await?;
        info!("Cleared session directory {}", self.dir.display());
        Ok(())
    }

    /// Create the directory if needed. Idempotent.
    pub async fn ensure_directory(&self) -> Result<(), SessionError> {
        fs::create_dir_all(self.dir.as_path())
            .await
            .map_err(|e| SessionError::Directory {
                path: self.dir.to_path_buf(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// The whole bundle, or `None` if nothing has been persisted yet.
    pub async fn load_credentials(&self) -> Result<Option<Value>, SessionError> {
        let _guard = self.lock.read().await;
        self.read_bundle().await
    }

    /// Merge one credential rotation into the bundle and write it atomically.
    pub async fn apply_update(&self, delta: &CredentialDelta) -> Result<(), SessionError> {
        if !delta.0.is_object() {
            return Err(SessionError::Update {
                reason: String::from("Credential update must be a JSON object"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let _guard = self.lock.write().await;
        self.ensure_directory().await?;

        let mut bundle = self
            .read_bundle()
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
        merge_patch(&mut bundle, &delta.0);

        let json = serde_json::to_vec_pretty(&bundle).map_err(|e| SessionError::Update {
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let target = self.credentials_path();
        let temp = self.dir.join(format!("{CREDENTIALS_FILE_NAME}.tmp"));

        fs::write(&temp, json)
            .await
            .map_err(|e| SessionError::Write {
                path: temp.clone(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })?;

        // Atomic rename (POSIX guarantees atomicity)
        fs::rename(&temp, &target)
            .await
            .map_err(|e| SessionError::Write {
                path: target.clone(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!("Persisted credential update to {}", target.display());
        Ok(())
    }

    async fn inspect(&self) -> Result<(), SessionError> {
        let path = self.credentials_path();

        let contents = fs::read_to_string(&path)
            .await
            .map_err(|e| SessionError::Read {
                path: path.clone(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })?;

        let marker: CredentialMarker =
            serde_json::from_str(&contents).map_err(|e| SessionError::Parse {
                path: path.clone(),
                reason: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        match marker.me {
            Some(identity) if !identity.id.trim().is_empty() => Ok(()),
            _ => Err(SessionError::MissingIdentity {
                path,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    async fn read_bundle(&self) -> Result<Option<Value>, SessionError> {
        let path = self.credentials_path();

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Read {
                    path,
                    source: e,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| SessionError::Parse {
                path,
                reason: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    async fn remove_dir(&self) -> Result<(), SessionError> {
        match fs::remove_dir_all(self.dir.as_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Clear {
                path: self.dir.to_path_buf(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// RFC 7386 JSON merge patch.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
