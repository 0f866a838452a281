//! Terminal prompt handler.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use kickpass_core::{Context, KickPassError, PromptHandler};
use zeroize::Zeroizing;

use crate::terminal::HiddenInput;

const CONFIRM_ATTEMPTS: usize = 3;

/// Reads master passwords from a line-oriented input.
///
/// When `confirm` is requested the password is asked twice and the pair is
/// asked again on mismatch, up to three times. A master password given on
/// the command line or in the environment bypasses the terminal.
pub struct TerminalPrompt<R, W> {
    io: Mutex<(R, W)>,
    master: Option<Zeroizing<String>>,
}

impl TerminalPrompt<Box<dyn BufRead + Send>, io::Stderr> {
    /// Prompts on stderr and reads from stdin, without echo when stdin is a
    /// terminal.
    pub fn stdio(master: Option<String>) -> Self {
        let input: Box<dyn BufRead + Send> = if io::stdin().is_terminal() {
            Box::new(HiddenInput::default())
        } else {
            Box::new(io::BufReader::new(io::stdin()))
        };
        Self::new(input, io::stderr(), master)
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, master: Option<String>) -> Self {
        Self {
            io: Mutex::new((input, output)),
            master: master.map(Zeroizing::new),
        }
    }

    fn ask(input: &mut R, output: &mut W, prompt: &str) -> io::Result<Zeroizing<String>> {
        output.write_all(prompt.as_bytes())?;
        output.flush()?;

        let mut line = Zeroizing::new(String::new());
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no password given"));
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    fn ask_confirmed(
        input: &mut R,
        output: &mut W,
        prompt: &str,
    ) -> io::Result<Option<Zeroizing<String>>> {
        for _ in 0..CONFIRM_ATTEMPTS {
            let first = Self::ask(input, output, prompt)?;
            let second = Self::ask(input, output, "[kickpass] confirm: ")?;
            if *first == *second {
                return Ok(Some(first));
            }
            writeln!(output, "[kickpass] passwords do not match")?;
        }
        Ok(None)
    }
}

impl<R, W> PromptHandler for TerminalPrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn request(
        &self,
        _context: Arc<Context>,
        confirm: bool,
        prompt: String,
    ) -> Result<String, KickPassError> {
        if let Some(master) = &self.master {
            tracing::debug!("using master password from the command line");
            return Ok(master.as_str().to_owned());
        }

        let mut io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let (input, output) = &mut *io;
        let host = |err: io::Error| KickPassError::HostOriginated(err.to_string());
        if confirm {
            Self::ask_confirmed(input, output, &prompt)
                .map_err(host)?
                .map(|password| password.as_str().to_owned())
                .ok_or_else(|| KickPassError::HostOriginated("passwords do not match".to_string()))
        } else {
            Self::ask(input, output, &prompt)
                .map(|password| password.as_str().to_owned())
                .map_err(host)
        }
    }
}
