//! Engine error domain.
//!
//! Every fallible engine call reports an [`ErrorCode`]. Codes are stable
//! numbers so that they survive a trip through a C-style status return, and
//! each code owns a human-readable message. The [`ErrorCode::Errno`] code is
//! special: the message lives in the C library's errno table, so the error
//! carries the raw errno captured where the failure happened.

use std::fmt;
use std::io;

/// Numeric result codes returned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// The operation was aborted by the password prompt and the failure has
    /// already been reported by whoever runs the prompt.
    Exit = 1,
    /// A system call failed; see [`EngineError::errno`].
    Errno = 2,
    /// Invalid input from the caller.
    Input = 3,
    /// A buffer or allocation is too small for the requested value.
    NoMem = 4,
    /// Internal engine failure.
    Internal = 5,
    /// The persisted safe is not a valid kickpass safe.
    InvalidStorage = 6,
    /// Decryption failed (wrong password or tampered safe).
    Decrypt = 7,
    /// Encryption or key derivation failed.
    Encrypt = 8,
    /// A password was required but no prompt is configured.
    NoPrompt = 9,
}

impl ErrorCode {
    /// Returns the engine's own description of the code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Exit => "operation aborted by password prompt",
            Self::Errno => "system error",
            Self::Input => "invalid input",
            Self::NoMem => "not enough space",
            Self::Internal => "internal error",
            Self::InvalidStorage => "invalid safe storage",
            Self::Decrypt => "cannot decrypt safe",
            Self::Encrypt => "cannot encrypt safe",
            Self::NoPrompt => "no password prompt configured",
        }
    }

    /// Returns the stable numeric value of the code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Error returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Engine result code.
    pub code: ErrorCode,
    /// Raw errno captured at the failure site, for [`ErrorCode::Errno`].
    pub errno: Option<i32>,
}

impl EngineError {
    /// Creates an error for a code outside the errno domain.
    #[must_use]
    pub const fn new(code: ErrorCode) -> Self {
        Self { code, errno: None }
    }

    /// Creates an errno-domain error.
    #[must_use]
    pub const fn errno(errno: i32) -> Self {
        Self {
            code: ErrorCode::Errno,
            errno: Some(errno),
        }
    }

    /// Returns `true` for the prompt sentinel code.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self.code, ErrorCode::Exit)
    }

    /// Returns `true` if the errno domain reports `kind`.
    #[must_use]
    pub fn is_os_error(&self, kind: io::ErrorKind) -> bool {
        self.errno
            .is_some_and(|errno| io::Error::from_raw_os_error(errno).kind() == kind)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.errno) {
            (ErrorCode::Errno, Some(errno)) => {
                write!(f, "kickpass error {}: {}", self.code, io::Error::from_raw_os_error(errno))
            }
            (code, _) => write!(f, "kickpass error {}: {}", code, code.message()),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        err.raw_os_error().map_or_else(
            || {
                log::debug!("io error without errno: {err}");
                Self::new(ErrorCode::Internal)
            },
            Self::errno,
        )
    }
}

impl From<io::ErrorKind> for EngineError {
    /// Converts well-known kinds to their errno; the rest is internal.
    fn from(kind: io::ErrorKind) -> Self {
        raw_errno(kind).map_or_else(|| Self::new(ErrorCode::Internal), Self::errno)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errno values the engine raises itself (not via a failed system call).
#[cfg(unix)]
const fn raw_errno(kind: io::ErrorKind) -> Option<i32> {
    // Values shared by Linux, macOS and the BSDs.
    match kind {
        io::ErrorKind::NotFound => Some(2),
        io::ErrorKind::PermissionDenied => Some(13),
        io::ErrorKind::AlreadyExists => Some(17),
        io::ErrorKind::NotADirectory => Some(20),
        io::ErrorKind::InvalidInput => Some(22),
        _ => None,
    }
}

#[cfg(windows)]
const fn raw_errno(kind: io::ErrorKind) -> Option<i32> {
    match kind {
        io::ErrorKind::NotFound => Some(2),
        io::ErrorKind::PermissionDenied => Some(5),
        io::ErrorKind::AlreadyExists => Some(183),
        io::ErrorKind::InvalidInput => Some(87),
        _ => None,
    }
}

#[cfg(not(any(unix, windows)))]
const fn raw_errno(_kind: io::ErrorKind) -> Option<i32> {
    None
}
