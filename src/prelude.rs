//! Convenience re-exports for common usage.

pub use crate::catalog::{models, Model, Provider};
pub use crate::credentials::{CredentialStore, StorageMethod};
pub use crate::error::{ConfigurationError, CoreError, NetworkError};
pub use crate::manager::ProviderManager;
pub use crate::provider::TextAdapter;
pub use crate::validation::ValidationState;
