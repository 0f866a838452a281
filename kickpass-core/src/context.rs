//! Process context: one engine session plus its prompt and error channel.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use kickpass_engine::{EngineResult, KdfParams, SafeRecord, Session};

use crate::error::KickPassError;
use crate::prompt::{PromptBridge, PromptHandler};
use crate::translator::{ErrorTranslator, Operation};

/// Optional overrides applied when a [`Context`] is created.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct ContextConfig {
    /// Workspace root. The default is `$HOME/.kickpass`.
    pub workspace: Option<String>,
    /// Argon2 memory cost in KiB for safes created through this context.
    pub kdf_memory_kib: Option<u32>,
    /// Argon2 iteration count for safes created through this context.
    pub kdf_iterations: Option<u32>,
}

/// A bound session against the kickpass engine.
///
/// The context owns the session, carries the prompt handler used by all its
/// safes and is required to construct a [`crate::Safe`]. Operations on the
/// same context are not meant to run concurrently; overlapping calls fail
/// with [`KickPassError::System`] instead of blocking.
#[derive(uniffi::Object)]
pub struct Context {
    session: Mutex<Option<Session>>,
    translator: Arc<ErrorTranslator>,
    safes: Mutex<Vec<Weak<Mutex<SafeRecord>>>>,
    destroyed: AtomicBool,
    self_ref: Weak<Self>,
}

#[uniffi::export]
impl Context {
    /// Initializes a session rooted at the default workspace.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Init`] if the session cannot be created.
    #[uniffi::constructor]
    pub fn new() -> Result<Arc<Self>, KickPassError> {
        Self::with_config(ContextConfig::default())
    }

    /// Initializes a session and registers `handler` for its prompts.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Init`] if the session cannot be created.
    #[uniffi::constructor]
    pub fn with_prompt(handler: Arc<dyn PromptHandler>) -> Result<Arc<Self>, KickPassError> {
        let context = Self::new()?;
        context.configure(handler)?;
        Ok(context)
    }

    /// Initializes a session with explicit overrides.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Init`] if the session cannot be created or
    /// the key derivation cost is out of bounds.
    #[uniffi::constructor]
    pub fn with_config(config: ContextConfig) -> Result<Arc<Self>, KickPassError> {
        let translator = Arc::new(ErrorTranslator::new());
        let mut session = match config.workspace {
            Some(workspace) => Session::with_workspace(workspace),
            None => Session::init().map_err(|err| translator.translate(Operation::Init, &err))?,
        };

        let default_kdf = KdfParams::default();
        if config.kdf_memory_kib.is_some() || config.kdf_iterations.is_some() {
            let kdf = KdfParams::new(
                config.kdf_memory_kib.unwrap_or(default_kdf.memory_kib),
                config.kdf_iterations.unwrap_or(default_kdf.iterations),
            );
            if !kdf.is_supported() {
                return Err(KickPassError::Init(format!(
                    "unsupported key derivation cost: {} KiB, {} iterations",
                    kdf.memory_kib, kdf.iterations
                )));
            }
            session.set_kdf(kdf);
        }

        log::debug!("context created for {}", session.workspace().display());
        Ok(Arc::new_cyclic(|self_ref| Self {
            session: Mutex::new(Some(session)),
            translator,
            safes: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        }))
    }

    /// Registers the handler answering every future prompt of this
    /// context's safes. Replaces any previous handler.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Init`] if the context has been destroyed
    /// and [`KickPassError::System`] if the context is busy.
    pub fn configure(&self, handler: Arc<dyn PromptHandler>) -> Result<(), KickPassError> {
        let bridge = PromptBridge::new(self.self_ref.clone(), handler, Arc::clone(&self.translator));
        self.with_session(Operation::Init, |session| {
            session.set_password_prompt(Some(bridge.into_password_prompt()));
            Ok(())
        })
    }

    /// Creates the workspace directory.
    ///
    /// An empty `path` keeps the current root; any other value relocates the
    /// root first. Initializing an existing workspace succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Workspace`] with the underlying cause.
    pub fn init_workspace(&self, path: String) -> Result<(), KickPassError> {
        self.with_session(Operation::Workspace, |session| {
            if !path.is_empty() {
                session.set_workspace(PathBuf::from(path));
            }
            session.init_workspace()
        })
    }

    /// Returns the workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::Workspace`] if the context has been destroyed
    /// or the root is not valid UTF-8.
    pub fn workspace_path(&self) -> Result<String, KickPassError> {
        let workspace = self.with_session(Operation::Workspace, |session| {
            Ok(session.workspace().to_path_buf())
        })?;
        workspace
            .into_os_string()
            .into_string()
            .map_err(|_| Operation::Workspace.error("workspace path is not valid UTF-8"))
    }

    /// Closes every safe of this context and releases the session.
    ///
    /// Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`KickPassError::System`] if the context is in use, for
    /// instance from inside a prompt handler.
    pub fn destroy(&self) -> Result<(), KickPassError> {
        let session = self.lock_session()?.take();
        let Some(session) = session else {
            return Ok(());
        };
        self.destroyed.store(true, Ordering::Release);

        let safes = std::mem::take(&mut *self.safes.lock().unwrap_or_else(PoisonError::into_inner));
        for record in safes.iter().filter_map(Weak::upgrade) {
            record.lock().unwrap_or_else(PoisonError::into_inner).close();
        }

        drop(session);
        log::debug!("context destroyed");
        Ok(())
    }

    /// Returns `true` once [`Context::destroy`] has released the session.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Context {
    #[must_use]
    pub(crate) fn translator(&self) -> Arc<ErrorTranslator> {
        Arc::clone(&self.translator)
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<Session>>, KickPassError> {
        match self.session.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(busy()),
            Err(TryLockError::Poisoned(_)) => Err(KickPassError::System(
                "context lock poisoned".to_string(),
            )),
        }
    }

    /// Runs `f` against the live session, translating engine failures as
    /// `operation` failures.
    pub(crate) fn with_session<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&mut Session) -> EngineResult<T>,
    ) -> Result<T, KickPassError> {
        let mut guard = self.lock_session()?;
        let session = guard
            .as_mut()
            .ok_or_else(|| operation.error("context has been destroyed"))?;
        let result = f(session);
        drop(guard);
        result.map_err(|err| self.translator.translate(operation, &err))
    }

    /// Fails with `operation`'s error kind once the context is destroyed.
    pub(crate) fn ensure_alive(&self, operation: Operation) -> Result<(), KickPassError> {
        if self.is_destroyed() {
            return Err(operation.error("context has been destroyed"));
        }
        Ok(())
    }

    /// Tracks `record` so that [`Context::destroy`] can close it.
    pub(crate) fn register(&self, record: &Arc<Mutex<SafeRecord>>) {
        let mut safes = self.safes.lock().unwrap_or_else(PoisonError::into_inner);
        safes.retain(|safe| safe.strong_count() > 0);
        safes.push(Arc::downgrade(record));
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

pub(crate) fn busy() -> KickPassError {
    KickPassError::System(io::Error::from(io::ErrorKind::ResourceBusy).to_string())
}
