//! Orchestrator: provider/model selection, validation state, text dispatch.
//!
//! All mutable state (selection plus the per-provider validation map) lives
//! behind one mutex, and the lock is never held across an await. The
//! validation-in-flight flag is a ref-counted atomic so concurrent
//! validations of different providers cannot clear it early, and a
//! drop-guard keeps the count correct and clears a stale `Validating` entry
//! even when a caller abandons a validation mid-flight.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use secrecy::SecretString;
use tracing::{debug, warn};

use crate::catalog::{self, Model, Provider};
use crate::credentials::{CredentialError, CredentialStore};
use crate::error::{ConfigurationError, CoreError};
use crate::provider::create_adapter;
use crate::validation::ValidationState;

const EMPTY_KEY_MESSAGE: &str = "API key cannot be empty";

#[derive(Debug)]
struct ManagerState {
    selected_provider: Provider,
    selected_model: Option<Model>,
    validation: HashMap<Provider, ValidationState>,
}

/// Central coordinator consumed by the UI and automation layers.
#[derive(Debug)]
pub struct ProviderManager {
    store: CredentialStore,
    state: Mutex<ManagerState>,
    in_flight: AtomicUsize,
    base_urls: RwLock<HashMap<Provider, String>>,
}

impl ProviderManager {
    /// Manager with the default provider and no model selected. Use
    /// [`ProviderManager::restore`] to pick up a persisted selection.
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            state: Mutex::new(ManagerState {
                selected_provider: Provider::default(),
                selected_model: None,
                validation: HashMap::new(),
            }),
            in_flight: AtomicUsize::new(0),
            base_urls: RwLock::new(HashMap::new()),
        }
    }

    /// Lock the state map, recovering from poisoning the same way the
    /// preference backend does: the data is a plain map, so a panic in
    /// another holder cannot leave it half-written.
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Manager initialized from the persisted selection. Unknown provider
    /// ids or models that are not in the provider's catalog fall back to the
    /// default provider and its first model; startup never fails here.
    pub fn restore(store: CredentialStore) -> Self {
        let manager = Self::new(store);

        let (provider, model) = match manager.store.load_selection() {
            Some((provider_id, model_id)) => match Provider::from_str(&provider_id) {
                Ok(provider) => {
                    let model = catalog::find_model(provider, &model_id).unwrap_or_else(|| {
                        warn!(
                            provider = provider.id(),
                            model = %model_id,
                            "persisted model not in catalog, using default"
                        );
                        catalog::default_model(provider)
                    });
                    (provider, model)
                }
                Err(_) => {
                    warn!(provider = %provider_id, "unknown persisted provider, using default");
                    let provider = Provider::default();
                    (provider, catalog::default_model(provider))
                }
            },
            None => {
                let provider = Provider::default();
                (provider, catalog::default_model(provider))
            }
        };

        {
            let mut state = manager.lock_state();
            state.selected_provider = provider;
            state.selected_model = Some(model);
        }
        manager
    }

    /// Access the underlying credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Override the endpoint for a provider. Tests point this at a mock
    /// server.
    pub fn set_base_url(&self, provider: Provider, url: impl Into<String>) {
        self.base_urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, url.into());
    }

    fn base_url(&self, provider: Provider) -> Option<String> {
        self.base_urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
    }

    pub fn selected_provider(&self) -> Provider {
        self.lock_state().selected_provider
    }

    pub fn selected_model(&self) -> Option<Model> {
        self.lock_state().selected_model.clone()
    }

    /// Select a provider, resetting the model to the first entry of its
    /// catalog, and persist both.
    pub fn select_provider(&self, provider: Provider) -> Result<(), CredentialError> {
        let model = catalog::default_model(provider);
        {
            let mut state = self.lock_state();
            state.selected_provider = provider;
            state.selected_model = Some(model.clone());
        }
        self.store.save_selection(provider.id(), &model.id)
    }

    /// Select a model. The model's provider is not checked against the
    /// current provider; a mismatched selection is tolerated and processing
    /// keeps dispatching by the selected provider.
    pub fn select_model(&self, model: Model) -> Result<(), CredentialError> {
        let provider = {
            let mut state = self.lock_state();
            state.selected_model = Some(model.clone());
            state.selected_provider
        };
        self.store.save_selection(provider.id(), &model.id)
    }

    /// Store a key and discard any prior validation judgment for the
    /// provider, since the underlying secret changed.
    pub fn set_api_key(&self, secret: &str, provider: Provider) -> Result<(), CredentialError> {
        let method = self.store.storage_method(provider);
        self.store.save_key(secret, provider, method)?;
        self.set_state(provider, ValidationState::NotValidated);
        Ok(())
    }

    /// Stored key for a provider, or the empty string. Never errors.
    pub fn get_api_key(&self, provider: Provider) -> String {
        match self.store.load_key(provider) {
            Ok(Some(secret)) => secret,
            Ok(None) => String::new(),
            Err(err) => {
                warn!(provider = provider.id(), %err, "failed to load API key");
                String::new()
            }
        }
    }

    /// Remove a provider's key entirely and reset its validation state.
    pub fn remove_api_key(&self, provider: Provider) -> Result<(), CredentialError> {
        self.store.remove_key(provider)?;
        self.set_state(provider, ValidationState::NotValidated);
        Ok(())
    }

    /// True only when a live check has confirmed the provider's key. A
    /// stored key alone is not enough.
    pub fn is_provider_configured(&self, provider: Provider) -> bool {
        self.validation_state(provider).is_valid()
    }

    /// Whether any provider has a confirmed key.
    pub fn has_valid_provider(&self) -> bool {
        let state = self.lock_state();
        state.validation.values().any(ValidationState::is_valid)
    }

    /// Validation state of the selected provider.
    pub fn current_validation_state(&self) -> ValidationState {
        let provider = self.selected_provider();
        self.validation_state(provider)
    }

    /// Validation state for a specific provider.
    pub fn validation_state(&self, provider: Provider) -> ValidationState {
        self.lock_state()
            .validation
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any validation round trip is in flight.
    pub fn is_validating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn set_state(&self, provider: Provider, next: ValidationState) {
        self.lock_state().validation.insert(provider, next);
    }

    /// Run a live round trip against `provider` with `secret`; persist the
    /// secret only when the provider accepts it. The outcome lands in the
    /// validation-state map rather than being returned as an error; the
    /// returned bool mirrors whether the state is now `Valid`.
    pub async fn validate_and_save_api_key(&self, secret: &str, provider: Provider) -> bool {
        if secret.is_empty() {
            self.set_state(provider, ValidationState::Invalid(EMPTY_KEY_MESSAGE.to_string()));
            return false;
        }

        let _in_flight = ValidationGuard::begin(self, provider);
        debug!(provider = provider.id(), "validating API key");

        let adapter = create_adapter(
            provider,
            catalog::default_model(provider).id,
            SecretString::from(secret.to_string()),
            self.base_url(provider),
        );

        match adapter.validate().await {
            Ok(()) => {
                let method = self.store.storage_method(provider);
                match self.store.save_key(secret, provider, method) {
                    Ok(()) => {
                        self.set_state(provider, ValidationState::Valid);
                        true
                    }
                    Err(err) => {
                        warn!(provider = provider.id(), %err, "could not persist validated key");
                        self.set_state(
                            provider,
                            ValidationState::Invalid("failed to persist API key".to_string()),
                        );
                        false
                    }
                }
            }
            Err(err) => {
                // The classified message carries provider/status details but
                // never the secret itself.
                self.set_state(provider, ValidationState::Invalid(err.to_string()));
                false
            }
        }
    }

    /// Apply `instruction` to `text` through the selected provider/model.
    ///
    /// Reads a snapshot of the selection; a concurrent `select_provider` or
    /// `set_api_key` takes effect from the next call.
    pub async fn process_text(&self, text: &str, instruction: &str) -> Result<String, CoreError> {
        let (provider, model) = {
            let state = self.lock_state();
            (state.selected_provider, state.selected_model.clone())
        };

        let model = model.ok_or(ConfigurationError::MissingConfiguration)?;

        let secret = self.get_api_key(provider);
        if secret.is_empty() {
            return Err(ConfigurationError::MissingApiKey.into());
        }
        if matches!(self.validation_state(provider), ValidationState::Invalid(_)) {
            return Err(ConfigurationError::InvalidApiKey(provider).into());
        }

        let adapter = create_adapter(
            provider,
            model.id,
            SecretString::from(secret),
            self.base_url(provider),
        );
        adapter.process(text, instruction).await
    }
}

/// Tracks one validation round trip: bumps the in-flight counter and marks
/// the provider `Validating` on entry. On drop it decrements the counter and,
/// when no terminal state was written (the future was dropped mid-flight),
/// resets a still-`Validating` entry to `NotValidated` so an abandoned
/// validation cannot pin the provider in that state.
struct ValidationGuard<'a> {
    manager: &'a ProviderManager,
    provider: Provider,
}

impl<'a> ValidationGuard<'a> {
    fn begin(manager: &'a ProviderManager, provider: Provider) -> Self {
        manager.in_flight.fetch_add(1, Ordering::SeqCst);
        manager.set_state(provider, ValidationState::Validating);
        Self { manager, provider }
    }
}

impl Drop for ValidationGuard<'_> {
    fn drop(&mut self) {
        self.manager.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut state = self.manager.lock_state();
        if state.validation.get(&self.provider) == Some(&ValidationState::Validating) {
            state
                .validation
                .insert(self.provider, ValidationState::NotValidated);
        }
    }
}
