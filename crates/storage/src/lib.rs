use directories::ProjectDirs;
use doc_model::EditLedger;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported session version {0}")]
    UnsupportedVersion(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Saved edit sessions, one JSON file per source document name.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionEnvelope {
    version: u32,
    source_name: String,
    ledger: EditLedger,
}

impl SessionStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Inkpatch", "Inkpatch").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().join("sessions") })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `None` when nothing was saved for `source_name`.
    pub fn load(&self, source_name: &str) -> Result<Option<EditLedger>, StorageError> {
        let path = self.session_path(source_name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        let envelope: SessionEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > SESSION_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        Ok(Some(envelope.ledger))
    }

    pub fn save(&self, source_name: &str, ledger: &EditLedger) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = SessionEnvelope {
            version: SESSION_SCHEMA_VERSION,
            source_name: source_name.to_owned(),
            ledger: ledger.clone(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let path = self.session_path(source_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Returns whether a saved session existed.
    pub fn remove(&self, source_name: &str) -> Result<bool, StorageError> {
        let path = self.session_path(source_name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn session_path(&self, source_name: &str) -> PathBuf {
        let stem: String = source_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.root.join(format!("{stem}.session.json"))
    }
}
