//! Hidden line input from the controlling terminal.

use std::io::{self, BufRead, Read, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use zeroize::Zeroizing;

/// Reads lines from the terminal in raw mode so typed characters are never
/// echoed.
///
/// Every line ends with `\n` except the empty read produced by `Ctrl-D` on
/// an empty line, which callers see as end of input.
#[derive(Default)]
pub struct HiddenInput {
    line: Zeroizing<Vec<u8>>,
    pos: usize,
}

impl Read for HiddenInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for HiddenInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.line.len() {
            let raw = RawMode::enable()?;
            let line = read_line(event::read, &mut io::stderr());
            drop(raw);
            self.line = line?;
            self.pos = 0;
        }
        Ok(&self.line[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.line.len());
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            tracing::warn!("cannot restore terminal mode: {err}");
        }
    }
}

/// Collects key presses until `Enter`.
///
/// `Backspace` removes the last character, `Ctrl-U` clears the line and
/// `Ctrl-C` cancels the prompt.
fn read_line(
    mut next: impl FnMut() -> io::Result<Event>,
    echo: &mut impl Write,
) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut line = Zeroizing::new(String::new());
    loop {
        let Event::Key(key) = next()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => {
                line.push('\n');
                break;
            }
            KeyCode::Char('c') if ctrl => {
                echo.write_all(b"\r\n")?;
                return Err(io::Error::other("prompt cancelled"));
            }
            KeyCode::Char('d') if ctrl && line.is_empty() => break,
            KeyCode::Char('u') if ctrl => line.clear(),
            KeyCode::Char(c) if !ctrl => line.push(c),
            KeyCode::Backspace => {
                line.pop();
            }
            _ => {}
        }
    }
    echo.write_all(b"\r\n")?;
    echo.flush()?;
    Ok(Zeroizing::new(line.as_bytes().to_vec()))
}
