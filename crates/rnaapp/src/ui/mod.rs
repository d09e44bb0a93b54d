pub mod console;
pub mod dialogs;
mod tui;

use std::path::PathBuf;

pub use console::ConsoleDialogs;
pub use dialogs::TerminalDialogs;
pub use tui::run_tui;

/// Prompts and notifications used by actions.
///
/// `None` (or `false` for `confirm`) means the user backed out; the action
/// stops without touching anything.
pub trait Dialogs {
    /// An existing file to read from.
    fn pick_open_file(&mut self, title: &str) -> Option<PathBuf>;
    /// A destination, with the selected filter's extension appended when
    /// missing.
    fn pick_save_file(&mut self, title: &str) -> Option<PathBuf>;
    /// Defaults to no.
    fn confirm(&mut self, title: &str, message: &str) -> bool;
    /// Single masked line.
    fn prompt_secret(&mut self, title: &str, label: &str) -> Option<String>;
    fn info(&mut self, title: &str, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub label: &'static str,
    /// With the leading dot. `None` accepts any name as typed.
    pub extension: Option<&'static str>,
}

pub const FILE_FILTERS: &[FileFilter] = &[
    FileFilter {
        label: "TOML files (*.toml)",
        extension: Some(".toml"),
    },
    FileFilter {
        label: "TXT files (*.txt)",
        extension: Some(".txt"),
    },
    FileFilter {
        label: "All Files (*.*)",
        extension: None,
    },
];

/// Appends the filter's extension unless `path` already ends with it.
pub fn with_filter_extension(path: &str, filter: &FileFilter) -> PathBuf {
    match filter.extension {
        Some(ext) if !path.ends_with(ext) => PathBuf::from(format!("{path}{ext}")),
        _ => PathBuf::from(path),
    }
}
