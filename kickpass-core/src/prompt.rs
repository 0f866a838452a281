//! Password prompt bridge.
//!
//! The engine asks for passwords through a callback slot on its session.
//! [`PromptBridge`] fills that slot: it renders the engine's prompt, calls
//! the host [`PromptHandler`] and copies the answer into the engine's
//! bounded buffer. Each invocation walks through [`PromptState`]; any
//! failure is recorded with the context's [`ErrorTranslator`] and the
//! engine only sees the [`ErrorCode::Exit`] sentinel.

use std::fmt::{self, Write as _};
use std::sync::{Arc, Weak};

use kickpass_engine::{EngineError, EngineResult, ErrorCode, PasswordPrompt, SecretBuf, PASSWORD_MAX};
use zeroize::Zeroizing;

use crate::context::Context;
use crate::error::KickPassError;
use crate::translator::ErrorTranslator;

/// Host logic answering password prompts.
///
/// Implemented in the host language and registered with
/// `Context::configure`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use kickpass_core::{Context, KickPassError, PromptHandler};
///
/// struct Fixed(String);
///
/// impl PromptHandler for Fixed {
///     fn request(
///         &self,
///         _context: Arc<Context>,
///         _confirm: bool,
///         _prompt: String,
///     ) -> Result<String, KickPassError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[uniffi::export(with_foreign)]
pub trait PromptHandler: Send + Sync {
    /// Asks for a password.
    ///
    /// `confirm` is set when a new master password is being chosen; the
    /// handler should then ask twice and check that both answers agree.
    /// Retrying is up to the handler.
    ///
    /// # Errors
    ///
    /// Any error aborts the operation that triggered the prompt and is
    /// returned unchanged to its caller.
    fn request(
        &self,
        context: Arc<Context>,
        confirm: bool,
        prompt: String,
    ) -> Result<String, KickPassError>;
}

/// Progress of one prompt invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// No prompt has run yet.
    Idle,
    /// Rendering the prompt message.
    Formatting,
    /// Waiting on the host handler.
    Invoking,
    /// Copying the answer into the engine buffer.
    Marshaling,
    /// The engine received a password.
    Succeeded,
    /// The prompt failed; the failure is pending in the translator.
    Failed,
}

/// Adapter between the engine prompt slot and a [`PromptHandler`].
pub struct PromptBridge {
    context: Weak<Context>,
    handler: Arc<dyn PromptHandler>,
    translator: Arc<ErrorTranslator>,
    state: PromptState,
}

impl PromptBridge {
    /// Creates a bridge reporting to `translator` on behalf of `context`.
    #[must_use]
    pub fn new(
        context: Weak<Context>,
        handler: Arc<dyn PromptHandler>,
        translator: Arc<ErrorTranslator>,
    ) -> Self {
        Self {
            context,
            handler,
            translator,
            state: PromptState::Idle,
        }
    }

    /// Returns the state reached by the last invocation.
    #[must_use]
    pub const fn state(&self) -> PromptState {
        self.state
    }

    /// Runs one prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Exit`] on any failure, after recording the
    /// host-visible error with the translator.
    pub fn prompt(
        &mut self,
        confirm: bool,
        out: &mut SecretBuf,
        args: fmt::Arguments<'_>,
    ) -> EngineResult<()> {
        self.state = PromptState::Formatting;
        let mut message = String::new();
        if message.write_fmt(args).is_err() {
            return Err(self.fail(KickPassError::Format(
                "cannot render password prompt".to_string(),
            )));
        }

        self.state = PromptState::Invoking;
        let Some(context) = self.context.upgrade() else {
            return Err(self.fail(KickPassError::System(
                "context released during prompt".to_string(),
            )));
        };
        let answer = match self.handler.request(context, confirm, message) {
            Ok(answer) => Zeroizing::new(answer),
            Err(err) => return Err(self.fail(err)),
        };

        self.state = PromptState::Marshaling;
        if out.set(answer.as_bytes()).is_err() {
            return Err(self.fail(KickPassError::Capacity(format!(
                "password must be shorter than {PASSWORD_MAX} bytes"
            ))));
        }

        self.state = PromptState::Succeeded;
        Ok(())
    }

    fn fail(&mut self, error: KickPassError) -> EngineError {
        self.state = PromptState::Failed;
        self.translator.record_host_error(error);
        EngineError::new(ErrorCode::Exit)
    }

    /// Converts the bridge into the engine prompt slot.
    #[must_use]
    pub fn into_password_prompt(mut self) -> PasswordPrompt {
        Box::new(move |confirm, out, args| self.prompt(confirm, out, args))
    }
}

impl fmt::Debug for PromptBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptBridge")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
