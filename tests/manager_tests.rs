//! Manager orchestration tests: validation state machine, selection
//! fallback, and text-processing dispatch against a mock server.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use textforge_core::catalog::{self, Provider};
use textforge_core::credentials::{force_preference_storage, CredentialStore};
use textforge_core::error::{ConfigurationError, CoreError};
use textforge_core::manager::ProviderManager;
use textforge_core::validation::ValidationState;

struct OverrideGuard;

impl OverrideGuard {
    fn engage() -> Self {
        force_preference_storage(true);
        Self
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        force_preference_storage(false);
    }
}

fn temp_manager() -> (TempDir, ProviderManager) {
    let dir = TempDir::new().unwrap();
    let store =
        CredentialStore::with_backends("textforge-test", dir.path().join("preferences.json"));
    (dir, ProviderManager::new(store))
}

fn openai_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": "OK"}}],
    }))
}

fn anthropic_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "content": [{"type": "text", "text": "OK"}],
    }))
}

#[tokio::test]
#[serial]
async fn successful_validation_persists_the_key_and_marks_valid() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(openai_ok())
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());

    let ok = manager
        .validate_and_save_api_key("sk-good-key", Provider::OpenAi)
        .await;

    assert!(ok);
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Valid
    );
    assert!(manager.is_provider_configured(Provider::OpenAi));
    assert!(manager.has_valid_provider());
    assert_eq!(manager.get_api_key(Provider::OpenAi), "sk-good-key");
    assert!(!manager.is_validating());
}

#[tokio::test]
#[serial]
async fn failed_validation_does_not_persist_the_key() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "invalid x-api-key"},
        })))
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::Anthropic, server.uri());

    let ok = manager
        .validate_and_save_api_key("sk-bad-key", Provider::Anthropic)
        .await;

    assert!(!ok);
    assert!(matches!(
        manager.validation_state(Provider::Anthropic),
        ValidationState::Invalid(_)
    ));
    assert!(!manager.is_provider_configured(Provider::Anthropic));
    assert_eq!(manager.get_api_key(Provider::Anthropic), "");
    assert!(!manager.is_validating());
}

#[tokio::test]
#[serial]
async fn invalid_state_messages_never_contain_the_secret() {
    let _o = OverrideGuard::engage();
    let secret = "sk-validation-security-test";
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "authentication failed"},
        })))
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    manager.validate_and_save_api_key(secret, Provider::OpenAi).await;

    match manager.validation_state(Provider::OpenAi) {
        ValidationState::Invalid(message) => {
            assert!(!message.contains(secret), "secret leaked: {message}");
        }
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn empty_key_short_circuits_before_the_network() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    // Any request arriving here fails the expect(0) assertion on drop.
    Mock::given(method("POST"))
        .respond_with(openai_ok())
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());

    let ok = manager.validate_and_save_api_key("", Provider::OpenAi).await;

    assert!(!ok);
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Invalid("API key cannot be empty".to_string())
    );
    assert!(!manager.is_validating());
}

#[tokio::test]
#[serial]
async fn set_api_key_resets_any_prior_judgment() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_ok())
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());

    manager
        .validate_and_save_api_key("sk-good-key", Provider::OpenAi)
        .await;
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Valid
    );

    manager.set_api_key("sk-new-key", Provider::OpenAi).unwrap();
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::NotValidated
    );
    assert!(!manager.is_provider_configured(Provider::OpenAi));
}

#[tokio::test]
#[serial]
async fn stored_key_with_invalid_state_reports_unconfigured() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "revoked"},
        })))
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());

    // Key stored directly, then judged invalid by a live check.
    manager.set_api_key("sk-revoked", Provider::OpenAi).unwrap();
    manager
        .validate_and_save_api_key("sk-revoked", Provider::OpenAi)
        .await;

    assert_eq!(manager.get_api_key(Provider::OpenAi), "sk-revoked");
    assert!(!manager.is_provider_configured(Provider::OpenAi));
    assert!(!manager.has_valid_provider());
}

#[tokio::test]
#[serial]
async fn concurrent_validations_complete_independently() {
    let _o = OverrideGuard::engage();
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_ok().set_delay(Duration::from_millis(600)))
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_ok().set_delay(Duration::from_millis(100)))
        .mount(&fast)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, slow.uri());
    manager.set_base_url(Provider::Anthropic, fast.uri());
    let manager = Arc::new(manager);

    let m = Arc::clone(&manager);
    let slow_task =
        tokio::spawn(async move { m.validate_and_save_api_key("sk-slow", Provider::OpenAi).await });
    let m = Arc::clone(&manager);
    let fast_task = tokio::spawn(async move {
        m.validate_and_save_api_key("sk-fast", Provider::Anthropic).await
    });

    // The fast validation must not clear the flag while the slow one is
    // still in flight.
    assert!(fast_task.await.unwrap());
    assert!(manager.is_validating());
    assert_eq!(
        manager.validation_state(Provider::Anthropic),
        ValidationState::Valid
    );

    assert!(slow_task.await.unwrap());
    assert!(!manager.is_validating());
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Valid
    );
}

#[tokio::test]
#[serial]
async fn abandoned_validation_releases_the_flag_and_clears_validating() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_ok().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    let manager = Arc::new(manager);

    let m = Arc::clone(&manager);
    let task =
        tokio::spawn(async move { m.validate_and_save_api_key("sk-slow", Provider::OpenAi).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.is_validating());
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Validating
    );

    task.abort();
    let _ = task.await;

    assert!(!manager.is_validating());
    // No verdict was reached, so the provider must not stay `Validating`.
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::NotValidated
    );
}

#[tokio::test]
#[serial]
async fn process_text_without_model_is_a_configuration_error() {
    let _o = OverrideGuard::engage();
    let (_dir, manager) = temp_manager();
    manager.set_api_key("sk-present", Provider::OpenAi).unwrap();

    let err = manager.process_text("hi", "summarize").await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Configuration(ConfigurationError::MissingConfiguration)
    );
}

#[tokio::test]
#[serial]
async fn process_text_without_key_is_a_configuration_error() {
    let _o = OverrideGuard::engage();
    let (_dir, manager) = temp_manager();
    manager.select_provider(Provider::OpenAi).unwrap();

    let err = manager.process_text("hi", "summarize").await.unwrap_err();
    assert!(
        matches!(err, CoreError::Configuration(ConfigurationError::MissingApiKey)),
        "expected a configuration error, got {err:?}"
    );
}

#[tokio::test]
#[serial]
async fn process_text_fails_fast_when_the_key_was_judged_invalid() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    // Exactly one request: the validation round trip. process_text must not
    // issue a second one.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "revoked"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    manager.select_provider(Provider::OpenAi).unwrap();
    manager.set_api_key("sk-revoked", Provider::OpenAi).unwrap();
    manager
        .validate_and_save_api_key("sk-revoked", Provider::OpenAi)
        .await;
    assert!(matches!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::Invalid(_)
    ));

    let err = manager.process_text("hi", "summarize").await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Configuration(ConfigurationError::InvalidApiKey(Provider::OpenAi))
    );
}

#[tokio::test]
#[serial]
async fn process_text_delegates_to_the_selected_adapter() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "polished"}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    manager.select_provider(Provider::OpenAi).unwrap();
    manager.set_api_key("sk-present", Provider::OpenAi).unwrap();

    let out = manager.process_text("rough", "Polish this").await.unwrap();
    assert_eq!(out, "polished");
}

#[tokio::test]
#[serial]
async fn process_text_propagates_classified_network_errors() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down"},
        })))
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    manager.select_provider(Provider::OpenAi).unwrap();
    manager.set_api_key("sk-present", Provider::OpenAi).unwrap();

    let err = manager.process_text("hi", "summarize").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, CoreError::Network(_)));
}

#[tokio::test]
#[serial]
async fn remove_api_key_resets_state_and_storage() {
    let _o = OverrideGuard::engage();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(openai_ok())
        .mount(&server)
        .await;

    let (_dir, manager) = temp_manager();
    manager.set_base_url(Provider::OpenAi, server.uri());
    manager
        .validate_and_save_api_key("sk-good-key", Provider::OpenAi)
        .await;
    assert!(manager.has_valid_provider());

    manager.remove_api_key(Provider::OpenAi).unwrap();

    assert_eq!(manager.get_api_key(Provider::OpenAi), "");
    assert_eq!(
        manager.validation_state(Provider::OpenAi),
        ValidationState::NotValidated
    );
    assert!(!manager.has_valid_provider());
}

#[test]
#[serial]
fn restore_falls_back_on_unknown_provider_id() {
    let _o = OverrideGuard::engage();
    let dir = TempDir::new().unwrap();
    let prefs = dir.path().join("preferences.json");
    std::fs::write(
        &prefs,
        serde_json::to_vec(&json!({
            "version": 1,
            "selected_provider": "no-such-vendor",
            "selected_model": "gpt-4o",
        }))
        .unwrap(),
    )
    .unwrap();

    let store = CredentialStore::with_backends("textforge-test", prefs);
    let manager = ProviderManager::restore(store);

    assert_eq!(manager.selected_provider(), Provider::default());
    assert_eq!(
        manager.selected_model(),
        Some(catalog::default_model(Provider::default()))
    );
}

#[test]
#[serial]
fn restore_falls_back_on_model_from_another_provider() {
    let _o = OverrideGuard::engage();
    let dir = TempDir::new().unwrap();
    let prefs = dir.path().join("preferences.json");
    std::fs::write(
        &prefs,
        serde_json::to_vec(&json!({
            "version": 1,
            "selected_provider": "anthropic",
            "selected_model": "gemini-2.5-flash",
        }))
        .unwrap(),
    )
    .unwrap();

    let store = CredentialStore::with_backends("textforge-test", prefs);
    let manager = ProviderManager::restore(store);

    assert_eq!(manager.selected_provider(), Provider::Anthropic);
    assert_eq!(
        manager.selected_model(),
        Some(catalog::default_model(Provider::Anthropic))
    );
}

#[test]
#[serial]
fn restore_survives_a_corrupt_preference_file() {
    let _o = OverrideGuard::engage();
    let dir = TempDir::new().unwrap();
    let prefs = dir.path().join("preferences.json");
    std::fs::write(&prefs, b"{definitely not json").unwrap();

    let store = CredentialStore::with_backends("textforge-test", prefs);
    let manager = ProviderManager::restore(store);

    assert_eq!(manager.selected_provider(), Provider::default());
    assert!(manager.selected_model().is_some());
}

#[tokio::test]
#[serial]
async fn manager_debug_never_contains_a_secret() {
    let _o = OverrideGuard::engage();
    let (_dir, manager) = temp_manager();
    manager
        .set_api_key("sk-debug-secret", Provider::OpenAi)
        .unwrap();

    let rendered = format!("{manager:?}");
    assert!(!rendered.contains("sk-debug-secret"));
}
