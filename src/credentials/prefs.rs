//! Plain preference-file backend.
//!
//! A single versioned JSON file holds the preference-backed secrets, the
//! per-provider storage-method markers, and the current provider/model
//! selection. Every mutation rewrites the file atomically (temp file plus
//! rename, 0o600), so a secret and its marker can never be torn apart by a
//! partial write.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::catalog::Provider;

use super::{CredentialError, SecretBackend, StorageMethod};

const PREFERENCES_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PreferencesFile {
    version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, String>,
    #[serde(default)]
    storage_methods: BTreeMap<String, StorageMethod>,
    #[serde(default)]
    selected_provider: Option<String>,
    #[serde(default)]
    selected_model: Option<String>,
}

impl Default for PreferencesFile {
    fn default() -> Self {
        Self {
            version: PREFERENCES_FILE_VERSION,
            secrets: BTreeMap::new(),
            storage_methods: BTreeMap::new(),
            selected_provider: None,
            selected_model: None,
        }
    }
}

/// File-backed preference store.
#[derive(Debug)]
pub struct PreferencesBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl PreferencesBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `~/.textforge/preferences.json`.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".textforge"))
            .unwrap_or_else(|| PathBuf::from(".textforge"))
            .join("preferences.json")
    }

    fn read_file(&self) -> Result<PreferencesFile, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferencesFile::default())
            }
            Err(err) => return Err(CredentialError::Io(err)),
        };

        let file: PreferencesFile = serde_json::from_str(&raw)?;
        if file.version != PREFERENCES_FILE_VERSION {
            return Err(CredentialError::Preferences(format!(
                "unsupported preferences version {} at {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(file)
    }

    fn update<F>(&self, mutate: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut PreferencesFile),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.read_file()?;
        mutate(&mut file);
        let serialized = serde_json::to_vec_pretty(&file)?;
        atomic_write(&self.path, &serialized)
    }

    pub fn set_storage_method(
        &self,
        provider: Provider,
        method: StorageMethod,
    ) -> Result<(), CredentialError> {
        self.update(|file| {
            file.storage_methods.insert(provider.id().to_string(), method);
        })
    }

    pub fn storage_method(
        &self,
        provider: Provider,
    ) -> Result<Option<StorageMethod>, CredentialError> {
        Ok(self.read_file()?.storage_methods.get(provider.id()).copied())
    }

    /// Clear the secret and the storage-method marker in one rewrite, so no
    /// orphaned marker can survive a removal.
    pub fn remove_secret_and_method(&self, provider: Provider) -> Result<(), CredentialError> {
        self.update(|file| {
            file.secrets.remove(provider.id());
            file.storage_methods.remove(provider.id());
        })
    }

    pub fn save_selection(&self, provider_id: &str, model_id: &str) -> Result<(), CredentialError> {
        self.update(|file| {
            file.selected_provider = Some(provider_id.to_string());
            file.selected_model = Some(model_id.to_string());
        })
    }

    /// Raw persisted selection ids. `None` unless both keys are present.
    pub fn load_selection(&self) -> Result<Option<(String, String)>, CredentialError> {
        let file = self.read_file()?;
        Ok(match (file.selected_provider, file.selected_model) {
            (Some(provider), Some(model)) => Some((provider, model)),
            _ => None,
        })
    }
}

impl SecretBackend for PreferencesBackend {
    fn save(&self, provider: Provider, secret: &str) -> Result<(), CredentialError> {
        self.update(|file| {
            file.secrets.insert(provider.id().to_string(), secret.to_string());
        })
    }

    fn load(&self, provider: Provider) -> Result<Option<String>, CredentialError> {
        Ok(self.read_file()?.secrets.get(provider.id()).cloned())
    }

    fn remove(&self, provider: Provider) -> Result<(), CredentialError> {
        self.update(|file| {
            file.secrets.remove(provider.id());
        })
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        CredentialError::Preferences(format!("path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(CredentialError::Io(err));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(CredentialError::Io(err));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
