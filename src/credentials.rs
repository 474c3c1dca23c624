use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("app state not found at {0}")]
    Missing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("app state is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized session produced by a previous login. The contents belong to
/// the messaging gateway; this program only reads and forwards them.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AppState(Value);

impl AppState {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for AppState {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Any well-formed JSON is accepted, including `[]`; whether it is a
    /// usable session is for the gateway to decide at login.
    pub fn load(&self) -> Result<AppState, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::Missing(self.path.clone()));
            }
            Err(err) => return Err(CredentialError::Io(err)),
        };

        let value: Value = serde_json::from_str(&contents)?;
        warn_if_shared(&self.path);
        debug!(path = %self.path.display(), "loaded app state");
        Ok(AppState(value))
    }
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        warn!(
            path = %path.display(),
            mode = format!("{:o}", mode & 0o777),
            "app state is readable by other users; consider chmod 600"
        );
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
