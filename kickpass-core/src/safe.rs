//! Safe handles exported to the host.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use kickpass_engine::{OpenFlags, SafeRecord, PASSWORD_MAX};
use zeroize::Zeroizing;

use crate::context::{busy, Context};
use crate::error::KickPassError;
use crate::translator::Operation;

/// One credential entry of a [`Context`].
///
/// A safe starts closed. [`Safe::open`] loads or creates the persisted
/// entry, after which the password and metadata can be read and written
/// until [`Safe::close`]. Dropping an open safe closes it.
#[derive(uniffi::Object)]
pub struct Safe {
    context: Arc<Context>,
    record: Arc<Mutex<SafeRecord>>,
}

#[uniffi::export]
impl Safe {
    /// Binds a safe called `name` to `context`. Nothing is read from disk.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Bind`] if the name does not resolve to a
    /// path inside the workspace or the context has been destroyed.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(context: Arc<Context>, name: String) -> Result<Arc<Self>, KickPassError> {
        let record = context.with_session(Operation::Bind, |session| {
            SafeRecord::init(session, &name)
        })?;
        let record = Arc::new(Mutex::new(record));
        context.register(&record);
        log::debug!("safe {name} bound");
        Ok(Arc::new(Self { context, record }))
    }

    /// Opens the safe, prompting for its master password.
    ///
    /// With `create`, a missing safe is created and starts with an empty
    /// password and metadata; with `create` and `force`, an existing safe is
    /// replaced. On failure the safe stays closed.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Open`] for a missing or conflicting entry, a
    /// wrong password or a corrupted safe, and the prompt handler's own
    /// error if the handler fails.
    pub fn open(&self, create: bool, force: bool) -> Result<(), KickPassError> {
        let mut record = self.lock_record()?;
        self.context.with_session(Operation::Open, |session| {
            record.open(session, OpenFlags { create, force })
        })
    }

    /// Persists the password and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Save`] if the safe is closed or cannot be
    /// written; the previously saved content is then left untouched.
    pub fn save(&self) -> Result<(), KickPassError> {
        let record = self.lock_record()?;
        self.context
            .with_session(Operation::Save, |session| record.save(session))
    }

    /// Wipes the password and metadata. Closing a closed safe does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the safe is in use.
    pub fn close(&self) -> Result<(), KickPassError> {
        self.lock_record()?.close();
        Ok(())
    }

    /// Removes the persisted safe without closing it.
    ///
    /// A closed safe prompts for its master password first.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Delete`] if nothing is persisted, the
    /// password is wrong or the file cannot be removed.
    pub fn delete(&self) -> Result<(), KickPassError> {
        let record = self.lock_record()?;
        self.context
            .with_session(Operation::Delete, |session| record.delete(session))
    }

    /// Renames the safe and moves its persisted file.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Rename`] if the name is invalid or already
    /// taken. The safe keeps its name on failure.
    #[allow(clippy::needless_pass_by_value)]
    pub fn rename(&self, new_name: String) -> Result<(), KickPassError> {
        let mut record = self.lock_record()?;
        self.context.with_session(Operation::Rename, |session| {
            record.rename(session, &new_name)
        })
    }

    /// Returns the safe name.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the safe is in use.
    pub fn name(&self) -> Result<String, KickPassError> {
        Ok(self.lock_record()?.name().to_string())
    }

    /// Returns the on-disk path of the safe.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Path`] if the path does not fit in
    /// `PATH_MAX` or is not valid UTF-8.
    pub fn path(&self) -> Result<String, KickPassError> {
        let record = self.lock_record()?;
        let path = self
            .context
            .with_session(Operation::Path, |session| record.path(session))?;
        path.into_os_string()
            .into_string()
            .map_err(|_| Operation::Path.error("safe path is not valid UTF-8"))
    }

    /// Returns `true` while the safe is open.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the safe is in use.
    pub fn is_open(&self) -> Result<bool, KickPassError> {
        Ok(self.lock_record()?.is_open())
    }

    /// Returns the password, or `None` while the safe is closed.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the safe is in use.
    pub fn password(&self) -> Result<Option<String>, KickPassError> {
        let record = self.lock_record()?;
        record.password().map(text).transpose()
    }

    /// Replaces the password.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Capacity`] if `value` is `PASSWORD_MAX`
    /// bytes or longer and [`KickPassError::Open`] if the safe is closed.
    pub fn set_password(&self, value: String) -> Result<(), KickPassError> {
        let value = Zeroizing::new(value);
        self.write_field(&value, SafeRecord::set_password)
    }

    /// Returns the metadata, or `None` while the safe is closed.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the safe is in use.
    pub fn metadata(&self) -> Result<Option<String>, KickPassError> {
        let record = self.lock_record()?;
        record.metadata().map(text).transpose()
    }

    /// Replaces the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Capacity`] if `value` is `PASSWORD_MAX`
    /// bytes or longer and [`KickPassError::Open`] if the safe is closed.
    pub fn set_metadata(&self, value: String) -> Result<(), KickPassError> {
        let value = Zeroizing::new(value);
        self.write_field(&value, SafeRecord::set_metadata)
    }

    /// Returns the owning context.
    #[must_use]
    pub fn context(&self) -> Arc<Context> {
        Arc::clone(&self.context)
    }
}

impl Safe {
    fn lock_record(&self) -> Result<MutexGuard<'_, SafeRecord>, KickPassError> {
        match self.record.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(busy()),
            Err(TryLockError::Poisoned(_)) => {
                Err(KickPassError::System("safe lock poisoned".to_string()))
            }
        }
    }

    fn write_field(
        &self,
        value: &str,
        set: fn(&mut SafeRecord, &[u8]) -> kickpass_engine::EngineResult<()>,
    ) -> Result<(), KickPassError> {
        self.context.ensure_alive(Operation::Open)?;
        let mut record = self.lock_record()?;
        if !record.is_open() {
            return Err(Operation::Open.error("safe is not open"));
        }
        if value.len() >= PASSWORD_MAX {
            return Err(Operation::Capacity.error(format!(
                "value must be shorter than {PASSWORD_MAX} bytes"
            )));
        }
        set(&mut *record, value.as_bytes())
            .map_err(|err| self.context.translator().translate(Operation::Capacity, &err))
    }
}

impl std::fmt::Debug for Safe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Safe");
        if let Ok(record) = self.record.try_lock() {
            debug.field("name", &record.name()).field("open", &record.is_open());
        }
        debug.finish_non_exhaustive()
    }
}

fn text(bytes: &[u8]) -> Result<String, KickPassError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| KickPassError::Format("safe content is not valid UTF-8".to_string()))
}
