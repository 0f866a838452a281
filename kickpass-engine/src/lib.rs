//! KickPass safe storage engine.
//!
//! The engine owns everything that touches disk: the workspace, the safe
//! file format and its cryptography. Callers drive it through a [`Session`]
//! and one [`SafeRecord`] per safe. Whenever a master password is needed the
//! engine calls the [`PasswordPrompt`] installed in the session and resumes
//! with whatever it wrote into the [`SecretBuf`].
//!
//! Errors use the engine's own numeric domain ([`ErrorCode`]); errno-domain
//! failures keep the raw errno so callers can render the platform message.

mod buffer;
mod crypto;
pub mod error;
pub mod format;
mod safe;
mod session;

pub use buffer::{SecretBuf, PASSWORD_MAX, PATH_MAX};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use format::KdfParams;
pub use safe::{OpenFlags, SafeRecord};
pub use session::{PasswordPrompt, Session, WORKSPACE_DIRNAME};

/// Returns the engine version string.
#[must_use]
pub const fn version_string() -> &'static str {
    concat!("kickpass ", env!("CARGO_PKG_VERSION"))
}
