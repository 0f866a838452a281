//! Key derivation and payload encryption.
//!
//! Master passwords are stretched with Argon2id into a 256-bit key which
//! seals the payload with XChaCha20-Poly1305.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::format::{KdfParams, SafeHeader, HEADER_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Key derived from a master password, bound to the salt and parameters it
/// was derived with.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SafeKey {
    key: [u8; 32],
    #[zeroize(skip)]
    salt: [u8; SALT_SIZE],
    #[zeroize(skip)]
    kdf: KdfParams,
}

impl SafeKey {
    /// Derives a key from `password` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails or the parameters are
    /// rejected by Argon2.
    pub fn generate(password: &[u8], kdf: KdfParams) -> EngineResult<Self> {
        let mut salt = [0u8; SALT_SIZE];
        fill_random(&mut salt)?;
        Self::derive(password, salt, kdf, ErrorCode::Encrypt)
    }

    /// Re-derives the key recorded in `header`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidStorage`] if the recorded parameters are
    /// not valid Argon2 parameters.
    pub fn from_header(password: &[u8], header: &SafeHeader) -> EngineResult<Self> {
        Self::derive(password, header.salt, header.kdf, ErrorCode::InvalidStorage)
    }

    fn derive(
        password: &[u8],
        salt: [u8; SALT_SIZE],
        kdf: KdfParams,
        on_bad_params: ErrorCode,
    ) -> EngineResult<Self> {
        let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
            .map_err(|err| {
                log::debug!("rejected argon2 parameters {kdf:?}: {err}");
                EngineError::new(on_bad_params)
            })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = [0u8; 32];
        argon2
            .hash_password_into(password, &salt, &mut key)
            .map_err(|err| {
                log::debug!("argon2 derivation failed: {err}");
                EngineError::new(ErrorCode::Encrypt)
            })?;
        Ok(Self { key, salt, kdf })
    }

    /// Encrypts `plaintext` and returns the complete safe file content.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Encrypt`] if the RNG or the cipher fails.
    pub fn seal(&self, plaintext: &[u8]) -> EngineResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce)?;
        let header = SafeHeader::new(self.kdf, self.salt, nonce).encode();

        let ciphertext = self
            .cipher()?
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| EngineError::new(ErrorCode::Encrypt))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts the content of a safe file whose header was derived into
    /// this key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Decrypt`] on authentication failure and
    /// [`ErrorCode::InvalidStorage`] if the file is truncated.
    pub fn open(&self, file: &[u8]) -> EngineResult<Vec<u8>> {
        if file.len() < HEADER_SIZE + TAG_SIZE {
            return Err(EngineError::new(ErrorCode::InvalidStorage));
        }
        let (header_bytes, ciphertext) = file.split_at(HEADER_SIZE);
        let header = SafeHeader::decode(header_bytes)?;

        self.cipher()?
            .decrypt(
                XNonce::from_slice(&header.nonce),
                Payload {
                    msg: ciphertext,
                    aad: header_bytes,
                },
            )
            .map_err(|_| EngineError::new(ErrorCode::Decrypt))
    }

    fn cipher(&self) -> EngineResult<XChaCha20Poly1305> {
        XChaCha20Poly1305::new_from_slice(&self.key).map_err(|_| EngineError::new(ErrorCode::Internal))
    }
}

impl std::fmt::Debug for SafeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeKey")
            .field("key", &"[REDACTED]")
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

fn fill_random(bytes: &mut [u8]) -> EngineResult<()> {
    getrandom::fill(bytes).map_err(|err| {
        log::warn!("system random generator failed: {err}");
        EngineError::new(ErrorCode::Encrypt)
    })
}
