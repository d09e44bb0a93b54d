use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use super::Dialogs;

pub const PASSWORD_ENV: &str = "RNAAPP_SSH_PASSWORD";

/// Dialogs for headless runs: file picks come from the command line, the
/// password from the environment or a masked read, confirmations from stdin.
#[derive(Debug, Default)]
pub struct ConsoleDialogs {
    open_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    password: Option<String>,
    assume_yes: bool,
    failure: Option<String>,
}

impl ConsoleDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_path(mut self, path: PathBuf) -> Self {
        self.open_path = Some(path);
        self
    }

    pub fn with_save_path(mut self, path: PathBuf) -> Self {
        self.save_path = Some(path);
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Last error reported through `error`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

fn read_masked(label: &str) -> io::Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{label} ")?;
    stderr.flush()?;

    enable_raw_mode()?;
    let mut buffer = String::new();
    let result = loop {
        let ev = match event::read() {
            Ok(ev) => ev,
            Err(e) => break Err(e),
        };
        let Event::Key(k) = ev else { continue };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        match k.code {
            KeyCode::Enter => break Ok(Some(std::mem::take(&mut buffer))),
            KeyCode::Esc => break Ok(None),
            KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => break Ok(None),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
    };
    disable_raw_mode().ok();
    writeln!(stderr)?;
    result
}

impl Dialogs for ConsoleDialogs {
    fn pick_open_file(&mut self, _title: &str) -> Option<PathBuf> {
        self.open_path.take()
    }

    fn pick_save_file(&mut self, _title: &str) -> Option<PathBuf> {
        self.save_path.take()
    }

    fn confirm(&mut self, _title: &str, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{message} [y/N] ");
        io::stderr().flush().ok();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read confirmation");
                false
            }
        }
    }

    fn prompt_secret(&mut self, _title: &str, label: &str) -> Option<String> {
        if let Some(p) = self.password.take() {
            return Some(p);
        }
        match read_masked(label) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read password");
                None
            }
        }
    }

    fn info(&mut self, _title: &str, message: &str) {
        println!("{message}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("error: {message}");
        self.failure = Some(message.to_string());
    }
}
