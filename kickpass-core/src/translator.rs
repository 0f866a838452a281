//! Engine error translation.
//!
//! Engine failures are translated once, when control returns from the
//! engine to the binding. The prompt bridge reports host-side failures
//! itself and hands the engine the [`ErrorCode::Exit`] sentinel; the
//! translator then returns the already-raised host error instead of
//! producing a second one.

use std::io;
use std::sync::{Mutex, PoisonError};

use kickpass_engine::{EngineError, ErrorCode};

use crate::error::KickPassError;

/// The binding operation an engine failure is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Session initialization.
    Init,
    /// Workspace setup or lookup.
    Workspace,
    /// Binding a safe to a name.
    Bind,
    /// Opening a safe, or touching fields of a closed safe.
    Open,
    /// Persisting a safe.
    Save,
    /// Removing a persisted safe.
    Delete,
    /// Renaming a safe.
    Rename,
    /// Writing a bounded field.
    Capacity,
    /// Deriving a safe path.
    Path,
}

impl Operation {
    /// Wraps `message` in the error kind of this operation.
    #[must_use]
    pub fn error(self, message: impl Into<String>) -> KickPassError {
        let message = message.into();
        match self {
            Self::Init => KickPassError::Init(message),
            Self::Workspace => KickPassError::Workspace(message),
            Self::Bind => KickPassError::Bind(message),
            Self::Open => KickPassError::Open(message),
            Self::Save => KickPassError::Save(message),
            Self::Delete => KickPassError::Delete(message),
            Self::Rename => KickPassError::Rename(message),
            Self::Capacity => KickPassError::Capacity(message),
            Self::Path => KickPassError::Path(message),
        }
    }
}

/// Maps engine errors to [`KickPassError`] values.
///
/// Each `Context` owns one translator. The translator also holds the
/// pending host error slot filled by the prompt bridge.
#[derive(Debug, Default)]
pub struct ErrorTranslator {
    pending: Mutex<Option<KickPassError>>,
}

impl ErrorTranslator {
    /// Creates a translator with an empty pending slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error already raised on the host side of a callback.
    ///
    /// A later error replaces an earlier one that was never collected.
    pub fn record_host_error(&self, error: KickPassError) {
        log::debug!("prompt failed on the host side: {error}");
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = Some(error);
    }

    /// Returns `true` if a host error is waiting to be collected.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take_pending(&self) -> Option<KickPassError> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Translates an engine failure raised while running `operation`.
    ///
    /// The pending slot is always drained, so a host error is reported at
    /// most once.
    pub fn translate(&self, operation: Operation, error: &EngineError) -> KickPassError {
        let pending = self.take_pending();
        if error.is_exit() {
            return pending.unwrap_or_else(|| {
                KickPassError::HostOriginated(ErrorCode::Exit.message().to_string())
            });
        }

        let message = match (error.code, error.errno) {
            (ErrorCode::Errno, Some(errno)) => io::Error::from_raw_os_error(errno).to_string(),
            (code, _) => code.message().to_string(),
        };
        log::debug!("{operation:?} failed with engine code {}: {message}", error.code);
        operation.error(message)
    }
}
