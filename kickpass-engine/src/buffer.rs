//! Fixed-capacity secret buffers.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EngineError, EngineResult, ErrorCode};

/// Capacity of password and metadata buffers, in bytes.
///
/// A stored value must be strictly shorter than the capacity: the last byte
/// is reserved for the terminator expected by C consumers of the format.
pub const PASSWORD_MAX: usize = 4096;

/// Maximum length of a resolved safe path, in bytes.
pub const PATH_MAX: usize = 4096;

/// A bounded byte buffer for secret material, wiped on drop and on clear.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBuf {
    bytes: [u8; PASSWORD_MAX],
    len: usize,
}

impl SecretBuf {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; PASSWORD_MAX],
            len: 0,
        }
    }

    /// Replaces the content with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NoMem`] if `value.len() >= PASSWORD_MAX`. The
    /// buffer is left untouched in that case.
    pub fn set(&mut self, value: &[u8]) -> EngineResult<()> {
        if value.len() >= PASSWORD_MAX {
            return Err(EngineError::new(ErrorCode::NoMem));
        }
        self.clear();
        self.bytes[..value.len()].copy_from_slice(value);
        self.len = value.len();
        Ok(())
    }

    /// Returns the stored bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Returns the length of the stored value.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Wipes the buffer.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

impl Default for SecretBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuf")
            .field("len", &self.len)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_below_capacity_is_stored() {
        let mut buf = SecretBuf::new();
        let value = vec![b'a'; PASSWORD_MAX - 1];
        buf.set(&value).expect("set");
        assert_eq!(buf.as_bytes(), value.as_slice());
    }

    #[test]
    fn test_value_at_capacity_is_rejected() {
        let mut buf = SecretBuf::new();
        buf.set(b"kept").expect("set");
        let err = buf.set(&vec![b'a'; PASSWORD_MAX]).expect_err("too long");
        assert_eq!(err.code, ErrorCode::NoMem);
        assert_eq!(buf.as_bytes(), b"kept");
    }

    #[test]
    fn test_clear_wipes_content() {
        let mut buf = SecretBuf::new();
        buf.set(b"secret").expect("set");
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_debug_is_redacted() {
        let mut buf = SecretBuf::new();
        buf.set(b"hunter2").expect("set");
        assert!(!format!("{buf:?}").contains("hunter2"));
    }
}
