//! TextForge core — provider-agnostic text processing.
//!
//! The core behind the TextForge desktop assistant: a static provider/model
//! catalog, a dual-backend credential store (OS keyring + preference file),
//! per-provider live key validation, and one HTTP adapter per provider that
//! maps a generic `(text, instruction)` request onto the vendor wire format.
//!
//! # Quick Start
//!
//! ```no_run
//! use textforge_core::credentials::CredentialStore;
//! use textforge_core::manager::ProviderManager;
//!
//! # async fn example() -> Result<(), textforge_core::error::CoreError> {
//! let manager = ProviderManager::restore(CredentialStore::new());
//! let rewritten = manager.process_text("hello world", "Fix the grammar").await?;
//! println!("{rewritten}");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod provider;
pub mod validation;
