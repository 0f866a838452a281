//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use kickpass_core::{Context, ContextConfig, KickPassError, PromptHandler};

/// Answers every prompt from a script and records what it was asked.
pub struct ScriptedPrompt {
    answers: Mutex<Vec<Result<String, KickPassError>>>,
    fallback: String,
    /// Every request as `(confirm, prompt)`, oldest first.
    pub calls: Mutex<Vec<(bool, String)>>,
}

impl ScriptedPrompt {
    /// Always answers `password`.
    pub fn fixed(password: &str) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(Vec::new()),
            fallback: password.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queues one answer used before falling back to the fixed password.
    pub fn push(&self, answer: Result<String, KickPassError>) {
        self.answers.lock().expect("lock").push(answer);
    }

    /// Number of requests answered so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    /// The most recent request, if any.
    pub fn last_call(&self) -> Option<(bool, String)> {
        self.calls.lock().expect("lock").last().cloned()
    }
}

impl PromptHandler for ScriptedPrompt {
    fn request(
        &self,
        context: Arc<Context>,
        confirm: bool,
        prompt: String,
    ) -> Result<String, KickPassError> {
        assert!(!context.is_destroyed());
        self.calls.lock().expect("lock").push((confirm, prompt));
        let mut answers = self.answers.lock().expect("lock");
        if answers.is_empty() {
            Ok(self.fallback.clone())
        } else {
            answers.remove(0)
        }
    }
}

/// A configured context bound to a throwaway workspace.
pub struct Workspace {
    /// Temporary directory holding the `.kickpass` workspace.
    pub root: tempfile::TempDir,
    /// Context configured with [`Workspace::prompt`].
    pub context: Arc<Context>,
    /// Prompt answering with the master password.
    pub prompt: Arc<ScriptedPrompt>,
}

/// Creates a context over an initialized temporary workspace with cheap key
/// derivation.
pub fn workspace(master: &str) -> Workspace {
    let root = tempfile::tempdir().expect("tempdir");
    let context = Context::with_config(ContextConfig {
        workspace: Some(root.path().join(".kickpass").display().to_string()),
        kdf_memory_kib: Some(64),
        kdf_iterations: Some(1),
    })
    .expect("context");
    let prompt = ScriptedPrompt::fixed(master);
    context.configure(prompt.clone()).expect("configure");
    context.init_workspace(String::new()).expect("init workspace");
    Workspace {
        root,
        context,
        prompt,
    }
}
