//! Settings document storage using a JSON file

use bridge_traits::{
    error::{BridgeError, Result},
    storage::DocumentStorage,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR_NAME: &str = "stream-looper";
const SETTINGS_FILE_NAME: &str = "loop_settings.json";

/// File-backed settings document
///
/// Provides whole-document persistence:
/// - Missing file reads as "no document yet"
/// - Writes go to a sibling temp file which is then renamed over the target,
///   so a crash mid-write never leaves a truncated document
/// - Parent directories are created on first write
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Create a storage handle for the document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform default location of the settings document
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR_NAME)
            .join(SETTINGS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SETTINGS_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentStorage for JsonFileStorage {
    fn read_document(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                debug!(path = ?self.path, size = contents.len(), "Read settings document");
                Ok(Some(contents))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    fn write_document(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, contents.as_bytes())?;
        fs::rename(&temp, &self.path).map_err(|e| {
            BridgeError::OperationFailed(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = ?self.path, size = contents.len(), "Wrote settings document");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
