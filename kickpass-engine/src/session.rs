//! Engine session: workspace location, key derivation cost and the password
//! prompt slot.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::buffer::{SecretBuf, PATH_MAX};
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::format::KdfParams;

/// Name of the workspace directory created under the home directory.
pub const WORKSPACE_DIRNAME: &str = ".kickpass";

/// Password prompt installed in a [`Session`].
///
/// The engine calls it with `confirm` set when a new master password is
/// being chosen, the output buffer to fill and the prompt to render. A
/// prompt that fails after reporting the failure itself must return
/// [`ErrorCode::Exit`].
pub type PasswordPrompt =
    Box<dyn FnMut(bool, &mut SecretBuf, fmt::Arguments<'_>) -> EngineResult<()> + Send>;

/// An initialized engine session.
pub struct Session {
    workspace: PathBuf,
    kdf: KdfParams,
    password_prompt: Option<PasswordPrompt>,
}

impl Session {
    /// Initializes a session rooted at `$HOME/.kickpass`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Errno`] error (`ENOENT`) if no home directory
    /// can be determined.
    pub fn init() -> EngineResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            log::warn!("cannot determine home directory");
            EngineError::from(io::ErrorKind::NotFound)
        })?;
        Ok(Self::with_workspace(home.join(WORKSPACE_DIRNAME)))
    }

    /// Initializes a session rooted at an explicit workspace.
    #[must_use]
    pub fn with_workspace(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        log::debug!("kickpass session rooted at {}", workspace.display());
        Self {
            workspace,
            kdf: KdfParams::default(),
            password_prompt: None,
        }
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Moves the workspace root. Already opened safes are not moved.
    pub fn set_workspace(&mut self, workspace: impl Into<PathBuf>) {
        self.workspace = workspace.into();
    }

    /// Returns the key derivation parameters used for new safes.
    #[must_use]
    pub const fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Sets the key derivation parameters used for new safes.
    pub const fn set_kdf(&mut self, kdf: KdfParams) {
        self.kdf = kdf;
    }

    /// Installs or removes the password prompt.
    pub fn set_password_prompt(&mut self, prompt: Option<PasswordPrompt>) {
        self.password_prompt = prompt;
    }

    /// Creates the workspace directory.
    ///
    /// An existing directory is accepted.
    ///
    /// # Errors
    ///
    /// Returns an errno error if the directory cannot be created or if the
    /// path exists and is not a directory.
    pub fn init_workspace(&self) -> EngineResult<()> {
        match fs::metadata(&self.workspace) {
            Ok(meta) if meta.is_dir() => {
                log::debug!("workspace {} already exists", self.workspace.display());
                return Ok(());
            }
            Ok(_) => return Err(EngineError::from(io::ErrorKind::NotADirectory)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        create_private_dir(&self.workspace)?;
        log::info!("initialized workspace {}", self.workspace.display());
        Ok(())
    }

    /// Resolves the path of the safe called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Input`] for names that are empty, absolute,
    /// contain `..` or NUL, and [`ErrorCode::NoMem`] if the resolved path
    /// does not fit in [`PATH_MAX`].
    pub fn safe_path(&self, name: &str) -> EngineResult<PathBuf> {
        validate_name(name)?;
        let path = self.workspace.join(name);
        if path.as_os_str().len() >= PATH_MAX {
            return Err(EngineError::new(ErrorCode::NoMem));
        }
        Ok(path)
    }

    /// Asks the installed prompt for a password.
    pub(crate) fn prompt(
        &mut self,
        confirm: bool,
        out: &mut SecretBuf,
        args: fmt::Arguments<'_>,
    ) -> EngineResult<()> {
        let prompt = self
            .password_prompt
            .as_mut()
            .ok_or(EngineError::new(ErrorCode::NoPrompt))?;
        prompt(confirm, out, args)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("workspace", &self.workspace)
            .field("kdf", &self.kdf)
            .field("password_prompt", &self.password_prompt.is_some())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::debug!("kickpass session for {} released", self.workspace.display());
    }
}

/// Checks that `name` designates a file strictly inside the workspace.
pub(crate) fn validate_name(name: &str) -> EngineResult<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(EngineError::new(ErrorCode::Input));
    }
    let mut components = 0usize;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => components += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(EngineError::new(ErrorCode::Input));
            }
        }
    }
    if components == 0 || name.ends_with('/') {
        return Err(EngineError::new(ErrorCode::Input));
    }
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::DirBuilder::new().recursive(true).create(path)
}

pub(crate) fn create_parent_dirs(workspace: &Path, path: &Path) -> EngineResult<()> {
    if !workspace.is_dir() {
        return Err(EngineError::from(io::ErrorKind::NotFound));
    }
    if let Some(parent) = path.parent() {
        if parent != workspace {
            create_private_dir(parent)?;
        }
    }
    Ok(())
}
