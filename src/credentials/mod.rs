//! Per-provider API key storage.
//!
//! Two backends sit behind one [`CredentialStore`]: the OS keyring (default)
//! and a plain preference file. Which backend holds a provider's key is
//! recorded per provider, so retrieval knows where to look even after the
//! preference changes. A process-global testing override forces every
//! operation onto the preference backend so automated tests never touch the
//! real vault.
//!
//! The store is a thin persistence layer: secrets round-trip byte-for-byte,
//! with no trimming, escaping, or validation.

mod error;
mod keyring;
mod prefs;

pub use error::CredentialError;
pub use keyring::KeyringBackend;
pub use prefs::PreferencesBackend;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::Provider;

/// Service name used for keyring entries and the default preference dir.
const DEFAULT_SERVICE: &str = "textforge";

/// Which backend holds (or should hold) a provider's secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMethod {
    /// OS-backed secure vault.
    #[default]
    Keyring,
    /// Plain preference file.
    Preferences,
}

static FORCE_PREFERENCE_STORAGE: AtomicBool = AtomicBool::new(false);

/// Force all credential operations onto the preference backend, regardless
/// of the requested or recorded storage method. Process-global; tests must
/// restore it to `false` when done.
pub fn force_preference_storage(enabled: bool) {
    FORCE_PREFERENCE_STORAGE.store(enabled, Ordering::SeqCst);
}

/// Whether the testing override is active.
pub fn preference_storage_forced() -> bool {
    FORCE_PREFERENCE_STORAGE.load(Ordering::SeqCst)
}

/// Storage strategy implemented by each backend.
pub trait SecretBackend: Send + Sync {
    fn save(&self, provider: Provider, secret: &str) -> Result<(), CredentialError>;
    fn load(&self, provider: Provider) -> Result<Option<String>, CredentialError>;
    fn remove(&self, provider: Provider) -> Result<(), CredentialError>;
}

/// Dual-backend credential store, plus persistence for the provider/model
/// selection (the preference keys other tooling may read).
#[derive(Debug)]
pub struct CredentialStore {
    keyring: KeyringBackend,
    prefs: PreferencesBackend,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Store with the default service name and preference path.
    pub fn new() -> Self {
        Self::with_backends(DEFAULT_SERVICE, PreferencesBackend::default_path())
    }

    /// Store with an explicit keyring service name and preference file path.
    /// Tests point this at a temp directory.
    pub fn with_backends(service: impl Into<String>, prefs_path: impl Into<PathBuf>) -> Self {
        Self {
            keyring: KeyringBackend::new(service),
            prefs: PreferencesBackend::new(prefs_path),
        }
    }

    fn effective_method(&self, requested: StorageMethod) -> StorageMethod {
        if preference_storage_forced() {
            StorageMethod::Preferences
        } else {
            requested
        }
    }

    fn backend(&self, method: StorageMethod) -> &dyn SecretBackend {
        match method {
            StorageMethod::Keyring => &self.keyring,
            StorageMethod::Preferences => &self.prefs,
        }
    }

    /// Write a secret to the requested backend and record the backend choice.
    pub fn save_key(
        &self,
        secret: &str,
        provider: Provider,
        method: StorageMethod,
    ) -> Result<(), CredentialError> {
        let method = self.effective_method(method);
        self.backend(method).save(provider, secret)?;
        self.prefs.set_storage_method(provider, method)
    }

    /// Read a secret from wherever the recorded storage method points.
    pub fn load_key(&self, provider: Provider) -> Result<Option<String>, CredentialError> {
        let method = self.effective_method(self.storage_method(provider));
        self.backend(method).load(provider)
    }

    /// Erase a provider's secret and its storage-method marker. After this,
    /// `load_key` returns `None` and `storage_method` reverts to the default.
    pub fn remove_key(&self, provider: Provider) -> Result<(), CredentialError> {
        if !preference_storage_forced() {
            self.keyring.remove(provider)?;
        }
        // One atomic rewrite clears both the preference-backed secret and
        // the marker.
        self.prefs.remove_secret_and_method(provider)
    }

    /// Recorded storage method for a provider, defaulting to the keyring.
    pub fn storage_method(&self, provider: Provider) -> StorageMethod {
        match self.prefs.storage_method(provider) {
            Ok(Some(method)) => method,
            Ok(None) => StorageMethod::default(),
            Err(err) => {
                warn!(provider = provider.id(), %err, "failed to read storage method");
                StorageMethod::default()
            }
        }
    }

    /// Persist the current provider/model selection.
    pub fn save_selection(&self, provider_id: &str, model_id: &str) -> Result<(), CredentialError> {
        self.prefs.save_selection(provider_id, model_id)
    }

    /// Raw persisted selection ids, if any. Callers resolve these against
    /// the catalog and fall back on anything unrecognized.
    pub fn load_selection(&self) -> Option<(String, String)> {
        match self.prefs.load_selection() {
            Ok(selection) => selection,
            Err(err) => {
                warn!(%err, "failed to read persisted selection");
                None
            }
        }
    }
}
