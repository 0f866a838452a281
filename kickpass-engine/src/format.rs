//! On-disk safe format.
//!
//! A safe file is a fixed header followed by the AEAD ciphertext of the CBOR
//! encoded [`SafePayload`]. The whole header is authenticated as associated
//! data, so tampering with the KDF parameters or the salt fails decryption.

// Layout comments describe binary structure, not Rust identifiers
#![allow(clippy::doc_markdown)]

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EngineError, EngineResult, ErrorCode};

/// Magic bytes at the start of every safe file.
pub const SAFE_MAGIC: &[u8; 8] = b"KICKPASS";

/// Current safe format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the Argon2 salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of the safe header in bytes.
/// Layout: magic(8) + version(2) + m_cost(4) + t_cost(4) + p_cost(4) + salt(16) + nonce(24) = 62
pub const HEADER_SIZE: usize = 62;

/// Largest Argon2 memory cost accepted, in KiB (1 GiB).
pub const MAX_MEMORY_KIB: u32 = 1 << 20;

/// Largest Argon2 pass count accepted.
pub const MAX_ITERATIONS: u32 = 64;

/// Argon2id cost parameters recorded in each safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Builds parameters with a parallelism of one.
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism: 1,
        }
    }

    /// Returns `true` if Argon2 accepts the parameters and they stay within
    /// [`MAX_MEMORY_KIB`] and [`MAX_ITERATIONS`] with a parallelism of one.
    ///
    /// Headers are read before they can be authenticated, so these bounds
    /// cap the work an unauthenticated file can request.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.memory_kib <= MAX_MEMORY_KIB
            && self.iterations <= MAX_ITERATIONS
            && self.parallelism == 1
            && argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
                .is_ok()
    }
}

impl Default for KdfParams {
    /// Argon2id defaults from the argon2 crate (19 MiB, two passes).
    fn default() -> Self {
        Self::new(argon2::Params::DEFAULT_M_COST, argon2::Params::DEFAULT_T_COST)
    }
}

/// Safe file header.
///
/// # Binary Layout (62 bytes)
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     magic ("KICKPASS")
/// 8       2     format_version (u16 LE)
/// 10      4     memory_kib (u32 LE)
/// 14      4     iterations (u32 LE)
/// 18      4     parallelism (u32 LE)
/// 22      16    salt
/// 38      24    nonce
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeHeader {
    /// Format version.
    pub format_version: u16,
    /// Key derivation parameters.
    pub kdf: KdfParams,
    /// Key derivation salt.
    pub salt: [u8; SALT_SIZE],
    /// AEAD nonce for the payload.
    pub nonce: [u8; NONCE_SIZE],
}

impl SafeHeader {
    /// Creates a header for the current format version.
    #[must_use]
    pub const fn new(kdf: KdfParams, salt: [u8; SALT_SIZE], nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kdf,
            salt,
            nonce,
        }
    }

    /// Encodes the header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(SAFE_MAGIC);
        buf[8..10].copy_from_slice(&self.format_version.to_le_bytes());
        buf[10..14].copy_from_slice(&self.kdf.memory_kib.to_le_bytes());
        buf[14..18].copy_from_slice(&self.kdf.iterations.to_le_bytes());
        buf[18..22].copy_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf[22..38].copy_from_slice(&self.salt);
        buf[38..62].copy_from_slice(&self.nonce);
        buf
    }

    /// Decodes a header from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidStorage`] if the buffer is too short, the
    /// magic does not match, the version is unsupported or the key
    /// derivation parameters are out of bounds.
    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() < HEADER_SIZE {
            log::debug!("safe header too short: {} bytes", bytes.len());
            return Err(invalid());
        }
        if &bytes[0..8] != SAFE_MAGIC {
            log::debug!("invalid safe magic");
            return Err(invalid());
        }

        let format_version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if format_version != FORMAT_VERSION {
            log::debug!("unsupported safe format version {format_version}");
            return Err(invalid());
        }

        let kdf = KdfParams {
            memory_kib: read_u32(&bytes[10..14]),
            iterations: read_u32(&bytes[14..18]),
            parallelism: read_u32(&bytes[18..22]),
        };
        if !kdf.is_supported() {
            log::debug!("unsupported key derivation parameters {kdf:?}");
            return Err(invalid());
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[22..38]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[38..62]);

        Ok(Self {
            format_version,
            kdf,
            salt,
            nonce,
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

const fn invalid() -> EngineError {
    EngineError::new(ErrorCode::InvalidStorage)
}

/// Plaintext content of a safe.
#[derive(Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(test, derive(Debug))]
pub struct SafePayload {
    /// The stored password.
    #[serde(with = "serde_bytes_vec")]
    pub password: Vec<u8>,
    /// Free-form metadata.
    #[serde(with = "serde_bytes_vec")]
    pub metadata: Vec<u8>,
}

impl SafePayload {
    /// Serializes the payload to CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Internal`] if serialization fails.
    pub fn to_cbor(&self) -> EngineResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes).map_err(|err| {
            log::warn!("safe payload serialization failed: {err}");
            EngineError::new(ErrorCode::Internal)
        })?;
        Ok(bytes)
    }

    /// Deserializes a payload from CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidStorage`] if the bytes are not a payload.
    pub fn from_cbor(bytes: &[u8]) -> EngineResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|err| {
            log::debug!("safe payload deserialization failed: {err}");
            invalid()
        })
    }
}

/// Serializes `Vec<u8>` as a CBOR byte string instead of an integer array.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        ciborium::value::Value::deserialize(deserializer).and_then(|value| match value {
            ciborium::value::Value::Bytes(bytes) => Ok(bytes),
            _ => Err(serde::de::Error::custom("expected a byte string")),
        })
    }
}
