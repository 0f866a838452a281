//! Host bindings for the kickpass password safe.
//!
//! A [`Context`] owns one engine session and the [`PromptHandler`] answering
//! password prompts. A [`Safe`] is one credential entry of a context:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kickpass_core::{Context, KickPassError, PromptHandler, Safe};
//!
//! struct Master;
//!
//! impl PromptHandler for Master {
//!     fn request(&self, _: Arc<Context>, _: bool, _: String) -> Result<String, KickPassError> {
//!         Ok("master password".to_string())
//!     }
//! }
//!
//! # fn main() -> Result<(), KickPassError> {
//! let context = Context::with_prompt(Arc::new(Master))?;
//! context.init_workspace(String::new())?;
//!
//! let safe = Safe::new(context, "mail".to_string())?;
//! safe.open(true, false)?;
//! safe.set_password("p1".to_string())?;
//! safe.save()?;
//! safe.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Errors are [`KickPassError`] values. A failure raised by the prompt
//! handler is returned unchanged to the caller of the operation that
//! triggered the prompt.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod context;
pub use context::{Context, ContextConfig};

mod error;
pub use error::KickPassError;

pub mod logger;

mod prompt;
pub use prompt::{PromptBridge, PromptHandler, PromptState};

mod safe;
pub use safe::Safe;

mod translator;
pub use translator::{ErrorTranslator, Operation};

pub use kickpass_engine::{PASSWORD_MAX, PATH_MAX};

/// Returns the engine version string.
#[must_use]
#[uniffi::export]
pub fn version() -> String {
    kickpass_engine::version_string().to_string()
}

uniffi::setup_scaffolding!("kickpass_core");
