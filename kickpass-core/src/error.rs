use thiserror::Error;

/// Errors surfaced to the host by `Context` and `Safe` operations.
///
/// Every variant carries the human-readable message produced when the
/// failure was translated. Engine failures in the errno domain carry the
/// platform description of the errno; other engine failures carry the
/// engine's own message for the code.
#[derive(Debug, Error, uniffi::Error)]
pub enum KickPassError {
    /// The engine session could not be initialized.
    #[error("init error: {0}")]
    Init(String),

    /// The workspace could not be initialized or resolved.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// A safe could not be bound to its context and name.
    #[error("bind error: {0}")]
    Bind(String),

    /// A safe could not be opened, or the operation requires an open safe.
    #[error("open error: {0}")]
    Open(String),

    /// A safe could not be persisted.
    #[error("save error: {0}")]
    Save(String),

    /// A persisted safe could not be removed.
    #[error("delete error: {0}")]
    Delete(String),

    /// A safe could not be renamed.
    #[error("rename error: {0}")]
    Rename(String),

    /// A value does not fit in the bounded secret buffer.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// The on-disk path of a safe could not be derived.
    #[error("path error: {0}")]
    Path(String),

    /// A prompt message could not be rendered.
    #[error("format error: {0}")]
    Format(String),

    /// The prompt handler failed on the host side.
    #[error("host error: {0}")]
    HostOriginated(String),

    /// Generic system failure, such as a handle already in use.
    #[error("system error: {0}")]
    System(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for KickPassError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::HostOriginated(error.reason)
    }
}
