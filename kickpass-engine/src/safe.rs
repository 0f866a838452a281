//! Safe records.
//!
//! A [`SafeRecord`] is the in-memory side of one persisted safe. Records are
//! created closed; [`SafeRecord::open`] loads or creates the entry and unlocks
//! the password and metadata buffers until [`SafeRecord::close`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::buffer::SecretBuf;
use crate::crypto::SafeKey;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::format::{SafeHeader, SafePayload, HEADER_SIZE, TAG_SIZE};
use crate::session::{create_parent_dirs, validate_name, Session};

/// Flags accepted by [`SafeRecord::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Create the safe if it does not exist.
    pub create: bool,
    /// With `create`, replace an existing safe.
    pub force: bool,
}

impl OpenFlags {
    /// Open an existing safe.
    pub const EXISTING: Self = Self {
        create: false,
        force: false,
    };

    /// Create a new safe, failing if one exists.
    pub const CREATE: Self = Self {
        create: true,
        force: false,
    };

    /// Create a new safe, replacing any existing one.
    pub const CREATE_FORCE: Self = Self {
        create: true,
        force: true,
    };
}

/// Unlocked content of an open safe.
struct Unlocked {
    key: SafeKey,
    password: SecretBuf,
    metadata: SecretBuf,
}

/// One safe, bound to a name inside a session's workspace.
pub struct SafeRecord {
    name: String,
    unlocked: Option<Box<Unlocked>>,
}

impl SafeRecord {
    /// Binds a record to `name`. Nothing is read from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` does not resolve to a path inside the
    /// workspace.
    pub fn init(session: &Session, name: &str) -> EngineResult<Self> {
        session.safe_path(name)?;
        Ok(Self {
            name: name.to_string(),
            unlocked: None,
        })
    }

    /// Returns the safe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` while the safe is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.unlocked.is_some()
    }

    /// Resolves the on-disk path of the safe.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NoMem`] if the path does not fit in `PATH_MAX`.
    pub fn path(&self, session: &Session) -> EngineResult<PathBuf> {
        session.safe_path(&self.name)
    }

    /// Opens the safe, prompting for its master password.
    ///
    /// On failure the record is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - errno `ENOENT` if the safe does not exist and `flags.create` is unset;
    /// - errno `EEXIST` if it exists, `flags.create` is set and `flags.force`
    ///   is not;
    /// - [`ErrorCode::Decrypt`] for a wrong password;
    /// - [`ErrorCode::InvalidStorage`] for a corrupted safe;
    /// - whatever the prompt returns.
    pub fn open(&mut self, session: &mut Session, flags: OpenFlags) -> EngineResult<()> {
        let path = self.path(session)?;
        let exists = path.try_exists()?;

        let unlocked = match (exists, flags.create, flags.force) {
            (false, false, _) => return Err(EngineError::from(io::ErrorKind::NotFound)),
            (true, true, false) => return Err(EngineError::from(io::ErrorKind::AlreadyExists)),
            (_, true, _) => self.create_unlocked(session)?,
            (true, false, _) => self.load_unlocked(session, &path)?,
        };

        if let Some(mut previous) = self.unlocked.replace(Box::new(unlocked)) {
            previous.password.clear();
            previous.metadata.clear();
        }
        log::debug!("safe {} opened", self.name);
        Ok(())
    }

    fn create_unlocked(&self, session: &mut Session) -> EngineResult<Unlocked> {
        let mut master = SecretBuf::new();
        session.prompt(
            true,
            &mut master,
            format_args!("[kickpass] new master password for safe '{}': ", self.name),
        )?;
        let key = SafeKey::generate(master.as_bytes(), session.kdf())?;
        Ok(Unlocked {
            key,
            password: SecretBuf::new(),
            metadata: SecretBuf::new(),
        })
    }

    fn load_unlocked(&self, session: &mut Session, path: &Path) -> EngineResult<Unlocked> {
        let file = fs::read(path)?;
        let header = SafeHeader::decode(&file)?;

        let mut master = SecretBuf::new();
        session.prompt(
            false,
            &mut master,
            format_args!("[kickpass] master password for safe '{}': ", self.name),
        )?;
        let key = SafeKey::from_header(master.as_bytes(), &header)?;
        let plaintext = zeroize::Zeroizing::new(key.open(&file)?);
        let payload = SafePayload::from_cbor(&plaintext)?;

        let mut password = SecretBuf::new();
        let mut metadata = SecretBuf::new();
        password
            .set(&payload.password)
            .and_then(|()| metadata.set(&payload.metadata))
            .map_err(|_| EngineError::new(ErrorCode::InvalidStorage))?;

        Ok(Unlocked {
            key,
            password,
            metadata,
        })
    }

    /// Persists the password and metadata.
    ///
    /// The file is replaced atomically: either the new content is fully
    /// written or the previous content is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Input`] if the safe is not open, an errno error
    /// for I/O failures and [`ErrorCode::Encrypt`] if sealing fails.
    pub fn save(&self, session: &Session) -> EngineResult<()> {
        let unlocked = self
            .unlocked
            .as_ref()
            .ok_or(EngineError::new(ErrorCode::Input))?;
        let path = self.path(session)?;

        let payload = SafePayload {
            password: unlocked.password.as_bytes().to_vec(),
            metadata: unlocked.metadata.as_bytes().to_vec(),
        };
        let plaintext = zeroize::Zeroizing::new(payload.to_cbor()?);
        let file = unlocked.key.seal(&plaintext)?;

        create_parent_dirs(session.workspace(), &path)?;
        let dir = path
            .parent()
            .ok_or(EngineError::new(ErrorCode::Internal))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&file)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| EngineError::from(err.error))?;

        log::debug!("safe {} saved", self.name);
        Ok(())
    }

    /// Wipes the unlocked content. Closing a closed safe does nothing.
    pub fn close(&mut self) {
        if let Some(mut unlocked) = self.unlocked.take() {
            unlocked.password.clear();
            unlocked.metadata.clear();
            log::debug!("safe {} closed", self.name);
        }
    }

    /// Removes the persisted safe. The record stays open if it was.
    ///
    /// A closed safe prompts for its master password first, unless the
    /// persisted file is not a readable safe at all.
    ///
    /// # Errors
    ///
    /// Returns errno `ENOENT` if nothing is persisted, [`ErrorCode::Decrypt`]
    /// for a wrong password and any I/O error from the removal.
    pub fn delete(&self, session: &mut Session) -> EngineResult<()> {
        let path = self.path(session)?;
        let file = fs::read(&path)?;

        if self.unlocked.is_none() {
            match SafeHeader::decode(&file) {
                Ok(header) if file.len() >= HEADER_SIZE + TAG_SIZE => {
                    let mut master = SecretBuf::new();
                    session.prompt(
                        false,
                        &mut master,
                        format_args!("[kickpass] master password to delete safe '{}': ", self.name),
                    )?;
                    let key = SafeKey::from_header(master.as_bytes(), &header)?;
                    drop(zeroize::Zeroizing::new(key.open(&file)?));
                }
                // Nothing readable to protect.
                _ => log::warn!(
                    "safe {} is not a valid safe, removing it unauthenticated",
                    self.name
                ),
            }
        }

        fs::remove_file(&path)?;
        log::info!("safe {} deleted", self.name);
        Ok(())
    }

    /// Renames the safe, moving its persisted file if there is one.
    ///
    /// On failure the record keeps its original name.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Input`] for an invalid name, errno `EEXIST` if a
    /// safe already uses that name, and any I/O error from the move.
    pub fn rename(&mut self, session: &Session, new_name: &str) -> EngineResult<()> {
        validate_name(new_name)?;
        let from = self.path(session)?;
        let to = session.safe_path(new_name)?;
        if from == to {
            return Ok(());
        }
        if to.try_exists()? {
            return Err(EngineError::from(io::ErrorKind::AlreadyExists));
        }

        if from.try_exists()? {
            create_parent_dirs(session.workspace(), &to)?;
            fs::rename(&from, &to)?;
        }

        log::info!("safe {} renamed to {new_name}", self.name);
        new_name.clone_into(&mut self.name);
        Ok(())
    }

    /// Returns the password while the safe is open.
    #[must_use]
    pub fn password(&self) -> Option<&[u8]> {
        self.unlocked.as_ref().map(|u| u.password.as_bytes())
    }

    /// Returns the metadata while the safe is open.
    #[must_use]
    pub fn metadata(&self) -> Option<&[u8]> {
        self.unlocked.as_ref().map(|u| u.metadata.as_bytes())
    }

    /// Replaces the password.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Input`] if the safe is closed and
    /// [`ErrorCode::NoMem`] if the value does not fit.
    pub fn set_password(&mut self, value: &[u8]) -> EngineResult<()> {
        self.unlocked_mut()?.password.set(value)
    }

    /// Replaces the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Input`] if the safe is closed and
    /// [`ErrorCode::NoMem`] if the value does not fit.
    pub fn set_metadata(&mut self, value: &[u8]) -> EngineResult<()> {
        self.unlocked_mut()?.metadata.set(value)
    }

    fn unlocked_mut(&mut self) -> EngineResult<&mut Unlocked> {
        self.unlocked
            .as_deref_mut()
            .ok_or(EngineError::new(ErrorCode::Input))
    }
}

impl std::fmt::Debug for SafeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeRecord")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for SafeRecord {
    fn drop(&mut self) {
        self.close();
    }
}
