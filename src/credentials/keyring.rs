//! OS keyring backend.

use crate::catalog::Provider;

use super::{CredentialError, SecretBackend};

/// Stores one secret per provider in the platform keyring, keyed by a
/// service name plus the provider id.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, provider: Provider) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, provider.id())
            .map_err(|e| CredentialError::Keyring(e.to_string()))
    }
}

impl SecretBackend for KeyringBackend {
    fn save(&self, provider: Provider, secret: &str) -> Result<(), CredentialError> {
        self.entry(provider)?
            .set_password(secret)
            .map_err(|e| CredentialError::Keyring(e.to_string()))
    }

    fn load(&self, provider: Provider) -> Result<Option<String>, CredentialError> {
        match self.entry(provider)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }

    fn remove(&self, provider: Provider) -> Result<(), CredentialError> {
        match self.entry(provider)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }
}
