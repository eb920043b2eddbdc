//! Per-provider key validation state.

/// Outcome of the most recent live key check for a provider.
///
/// Exactly one state is held per provider. A stored key alone never makes a
/// provider configured; only an explicit `Valid` does.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// No live check has run since the key was last written.
    #[default]
    NotValidated,
    /// A live check is in flight.
    Validating,
    /// The provider accepted the key.
    Valid,
    /// The provider rejected the key, or the check failed. The message never
    /// contains the secret.
    Invalid(String),
}

impl ValidationState {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Populated only for `Invalid`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Invalid(message) => Some(message),
            _ => None,
        }
    }
}
