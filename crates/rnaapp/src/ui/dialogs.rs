use std::io::Stdout;
use std::path::{Path, PathBuf};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Widget, Wrap,
};
use walkdir::WalkDir;

use super::{Dialogs, FILE_FILTERS, with_filter_extension};

const PARAM_FILE_EXTENSIONS: &[&str] = &["toml", "txt"];
const PARAM_FILE_SCAN_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Continue,
    Done(T),
    Cancel,
}

/// A prompt driven by key events until it finishes, drawn over a snapshot
/// of the form.
pub trait Modal {
    type Output;
    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Step<Self::Output>;
    fn render(&self, f: &mut ratatui::Frame, area: Rect);
}

fn is_interrupt(code: KeyCode, mods: KeyModifiers) -> bool {
    mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c'))
}

pub struct OpenFilePrompt {
    title: String,
    entries: Vec<PathBuf>,
    selected: Option<usize>,
    buffer: String,
    error: Option<String>,
}

impl OpenFilePrompt {
    pub fn new(title: &str, entries: Vec<PathBuf>) -> Self {
        Self {
            title: title.to_string(),
            entries,
            selected: None,
            buffer: String::new(),
            error: None,
        }
    }

    fn select(&mut self, idx: usize) {
        self.selected = Some(idx);
        self.buffer = self.entries[idx].display().to_string();
        self.error = None;
    }
}

impl Modal for OpenFilePrompt {
    type Output = PathBuf;

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Step<PathBuf> {
        if is_interrupt(code, mods) {
            return Step::Cancel;
        }
        let last = self.entries.len().checked_sub(1);
        match code {
            KeyCode::Esc => return Step::Cancel,
            KeyCode::Up => {
                if let Some(last) = last {
                    let idx = self.selected.map_or(last, |i| i.saturating_sub(1));
                    self.select(idx);
                }
            }
            KeyCode::Down => {
                if let Some(last) = last {
                    let idx = self.selected.map_or(0, |i| (i + 1).min(last));
                    self.select(idx);
                }
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                self.error = None;
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                self.error = None;
            }
            KeyCode::Enter => {
                let raw = self.buffer.trim();
                if raw.is_empty() {
                    self.error = Some("enter a file path".into());
                    return Step::Continue;
                }
                let path = PathBuf::from(raw);
                if !path.is_file() {
                    self.error = Some(format!("no such file: {raw}"));
                    return Step::Continue;
                }
                return Step::Done(path);
            }
            _ => {}
        }
        Step::Continue
    }

    fn render(&self, f: &mut ratatui::Frame, area: Rect) {
        let popup = popup_frame(f, area, 80, 70, &self.title, Color::Cyan);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(popup);

        let items: Vec<ListItem> = if self.entries.is_empty() {
            vec![ListItem::new("(no parameter files found)")]
        } else {
            self.entries
                .iter()
                .map(|p| ListItem::new(p.display().to_string()))
                .collect()
        };
        let list = List::new(items)
            .block(Block::default().title("Files").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::LightYellow))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(self.selected);
        f.render_stateful_widget(list, rows[0], &mut state);

        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("Path: ", Style::default().fg(Color::Yellow)),
                Span::raw(self.buffer.clone()),
            ])),
            rows[1],
        );
        f.render_widget(error_line(self.error.as_deref()), rows[2]);
        f.render_widget(
            Paragraph::new("[Up/Down] Pick  [type] Path  [Enter] Open  [Esc] Cancel")
                .style(Style::default().fg(Color::Gray)),
            rows[3],
        );
    }
}

pub struct SavePrompt {
    title: String,
    buffer: String,
    filter: usize,
    error: Option<String>,
}

impl SavePrompt {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            buffer: String::new(),
            filter: 0,
            error: None,
        }
    }
}

impl Modal for SavePrompt {
    type Output = PathBuf;

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Step<PathBuf> {
        if is_interrupt(code, mods) {
            return Step::Cancel;
        }
        match code {
            KeyCode::Esc => return Step::Cancel,
            KeyCode::Tab => self.filter = (self.filter + 1) % FILE_FILTERS.len(),
            KeyCode::BackTab => {
                self.filter = (self.filter + FILE_FILTERS.len() - 1) % FILE_FILTERS.len();
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                self.error = None;
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                self.error = None;
            }
            KeyCode::Enter => {
                let raw = self.buffer.trim();
                if raw.is_empty() {
                    self.error = Some("enter a file name".into());
                    return Step::Continue;
                }
                let path = with_filter_extension(raw, &FILE_FILTERS[self.filter]);
                if path.is_dir() {
                    self.error = Some(format!("{} is a directory", path.display()));
                    return Step::Continue;
                }
                return Step::Done(path);
            }
            _ => {}
        }
        Step::Continue
    }

    fn render(&self, f: &mut ratatui::Frame, area: Rect) {
        let popup = popup_frame(f, area, 70, 30, &self.title, Color::Cyan);
        let text = vec![
            Line::from(vec![
                Span::styled("File: ", Style::default().fg(Color::Yellow)),
                Span::raw(self.buffer.clone()),
            ]),
            Line::from(vec![
                Span::styled("Type: ", Style::default().fg(Color::Yellow)),
                Span::raw(FILE_FILTERS[self.filter].label),
            ]),
            error_text(self.error.as_deref()),
            Line::from(""),
            Line::from(Span::styled(
                "[Tab] File type  [Enter] Save  [Esc] Cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        f.render_widget(Paragraph::new(Text::from(text)).wrap(Wrap { trim: false }), popup);
    }
}

pub struct SecretPrompt {
    title: String,
    label: String,
    buffer: String,
}

impl SecretPrompt {
    pub fn new(title: &str, label: &str) -> Self {
        Self {
            title: title.to_string(),
            label: label.to_string(),
            buffer: String::new(),
        }
    }
}

impl Modal for SecretPrompt {
    type Output = String;

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Step<String> {
        if is_interrupt(code, mods) {
            return Step::Cancel;
        }
        match code {
            KeyCode::Esc => Step::Cancel,
            KeyCode::Enter => Step::Done(std::mem::take(&mut self.buffer)),
            KeyCode::Backspace => {
                self.buffer.pop();
                Step::Continue
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                Step::Continue
            }
            _ => Step::Continue,
        }
    }

    fn render(&self, f: &mut ratatui::Frame, area: Rect) {
        let popup = popup_frame(f, area, 50, 20, &self.title, Color::Yellow);
        let masked = "*".repeat(self.buffer.chars().count());
        let text = vec![
            Line::from(vec![
                Span::styled(format!("{} ", self.label), Style::default().fg(Color::Yellow)),
                Span::raw(masked),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "[Enter] OK  [Esc] Cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        f.render_widget(Paragraph::new(Text::from(text)), popup);
    }
}

pub struct ConfirmPrompt {
    title: String,
    message: String,
    yes: bool,
}

impl ConfirmPrompt {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            yes: false,
        }
    }
}

impl Modal for ConfirmPrompt {
    type Output = bool;

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Step<bool> {
        if is_interrupt(code, mods) {
            return Step::Cancel;
        }
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Step::Done(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Step::Done(false),
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                self.yes = !self.yes;
                Step::Continue
            }
            KeyCode::Enter => Step::Done(self.yes),
            _ => Step::Continue,
        }
    }

    fn render(&self, f: &mut ratatui::Frame, area: Rect) {
        let popup = popup_frame(f, area, 50, 25, &self.title, Color::Yellow);
        let choice = |label: &'static str, active: bool| {
            if active {
                Span::styled(label, Style::default().fg(Color::Black).bg(Color::LightYellow))
            } else {
                Span::raw(label)
            }
        };
        let text = vec![
            Line::from(self.message.clone()),
            Line::from(""),
            Line::from(vec![
                choice(" Yes ", self.yes),
                Span::raw("  "),
                choice(" No ", !self.yes),
            ]),
        ];
        f.render_widget(Paragraph::new(Text::from(text)).wrap(Wrap { trim: true }), popup);
    }
}

pub struct MessageBox {
    title: String,
    message: String,
    is_error: bool,
}

impl MessageBox {
    pub fn info(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            is_error: false,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            title: "Error".into(),
            message: message.to_string(),
            is_error: true,
        }
    }
}

impl Modal for MessageBox {
    type Output = ();

    fn handle_key(&mut self, code: KeyCode, _mods: KeyModifiers) -> Step<()> {
        match code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') | KeyCode::Char('q') => {
                Step::Done(())
            }
            _ => Step::Continue,
        }
    }

    fn render(&self, f: &mut ratatui::Frame, area: Rect) {
        let color = if self.is_error { Color::Red } else { Color::Green };
        let popup = popup_frame(f, area, 60, 30, &self.title, color);
        let text = vec![
            Line::from(self.message.clone()),
            Line::from(""),
            Line::from(Span::styled("[Enter] OK", Style::default().fg(Color::Gray))),
        ];
        f.render_widget(Paragraph::new(Text::from(text)).wrap(Wrap { trim: false }), popup);
    }
}

/// Dimmed copy of the form shown behind a prompt.
#[derive(Debug, Clone, Default)]
pub struct Backdrop {
    pub title: String,
    pub lines: Vec<String>,
}

impl Backdrop {
    fn render(&self, f: &mut ratatui::Frame) {
        let lines: Vec<Line> = self.lines.iter().map(|l| Line::from(l.clone())).collect();
        let p = Paragraph::new(Text::from(lines))
            .style(Style::default().fg(Color::DarkGray))
            .block(
                Block::default()
                    .title(self.title.clone())
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
        f.render_widget(p, f.area());
    }
}

/// Prompts drawn in the terminal the form is running in.
pub struct TerminalDialogs<'a> {
    terminal: &'a mut Terminal<CrosstermBackend<Stdout>>,
    backdrop: Backdrop,
    root: PathBuf,
}

impl<'a> TerminalDialogs<'a> {
    pub fn new(
        terminal: &'a mut Terminal<CrosstermBackend<Stdout>>,
        backdrop: Backdrop,
        root: PathBuf,
    ) -> Self {
        Self {
            terminal,
            backdrop,
            root,
        }
    }

    /// Terminal failures end the prompt as if the user cancelled it.
    fn run_modal<M: Modal>(&mut self, mut modal: M) -> Option<M::Output> {
        loop {
            let backdrop = &self.backdrop;
            let drawn = self.terminal.draw(|f| {
                backdrop.render(f);
                let area = f.area();
                modal.render(f, area);
            });
            if let Err(e) = drawn {
                tracing::warn!(error = %e, "failed to draw dialog");
                return None;
            }

            match event::read() {
                Ok(Event::Key(k)) if k.kind == KeyEventKind::Press => {
                    match modal.handle_key(k.code, k.modifiers) {
                        Step::Continue => {}
                        Step::Done(v) => return Some(v),
                        Step::Cancel => return None,
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read terminal event");
                    return None;
                }
            }
        }
    }
}

impl Dialogs for TerminalDialogs<'_> {
    fn pick_open_file(&mut self, title: &str) -> Option<PathBuf> {
        let entries = find_param_files(&self.root);
        self.run_modal(OpenFilePrompt::new(title, entries))
    }

    fn pick_save_file(&mut self, title: &str) -> Option<PathBuf> {
        self.run_modal(SavePrompt::new(title))
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.run_modal(ConfirmPrompt::new(title, message))
            .unwrap_or(false)
    }

    fn prompt_secret(&mut self, title: &str, label: &str) -> Option<String> {
        self.run_modal(SecretPrompt::new(title, label))
    }

    fn info(&mut self, title: &str, message: &str) {
        self.run_modal(MessageBox::info(title, message));
    }

    fn error(&mut self, message: &str) {
        self.run_modal(MessageBox::error(message));
    }
}

/// Parameter files under `root`, skipping hidden directories and `target`.
pub fn find_param_files(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(PARAM_FILE_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') || (e.file_type().is_dir() && name == "target"))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| PARAM_FILE_EXTENSIONS.contains(&ext))
        })
        .collect();
    out.sort();
    out
}

fn error_text(error: Option<&str>) -> Line<'static> {
    match error {
        Some(e) => Line::from(Span::styled(
            format!("error: {e}"),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(""),
    }
}

fn error_line(error: Option<&str>) -> Paragraph<'static> {
    Paragraph::new(error_text(error))
}

/// Draws shadow, border and title; returns the inner area.
pub(crate) fn popup_frame(
    f: &mut ratatui::Frame,
    bounds: Rect,
    percent_x: u16,
    percent_y: u16,
    title: &str,
    accent: Color,
) -> Rect {
    let area = centered_rect(percent_x, percent_y, bounds);
    f.render_widget(
        Fill {
            style: Style::default().bg(Color::Black).add_modifier(Modifier::DIM),
        },
        shadow_rect(area, bounds),
    );
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(title.to_string(), Style::default().fg(accent)))
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);
    inner
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r)[1];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical)[1]
}

/// `inner` moved one cell down and right, clipped to `bounds`.
pub(crate) fn shadow_rect(inner: Rect, bounds: Rect) -> Rect {
    let max_x = bounds.x.saturating_add(bounds.width);
    let max_y = bounds.y.saturating_add(bounds.height);
    let x = inner.x.saturating_add(1).min(max_x.saturating_sub(1));
    let y = inner.y.saturating_add(1).min(max_y.saturating_sub(1));
    Rect {
        x,
        y,
        width: inner.width.min(max_x.saturating_sub(x)),
        height: inner.height.min(max_y.saturating_sub(y)),
    }
}

struct Fill {
    style: Style,
}

impl Widget for Fill {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)].set_char(' ').set_style(self.style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press<M: Modal>(m: &mut M, code: KeyCode) -> Step<M::Output> {
        m.handle_key(code, KeyModifiers::NONE)
    }

    fn type_str<M: Modal>(m: &mut M, s: &str) {
        for c in s.chars() {
            let _ = press(m, KeyCode::Char(c));
        }
    }

    #[test]
    fn open_prompt_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("p.toml");
        std::fs::write(&file, "outdir = \"o\"\n").unwrap();

        let mut prompt = OpenFilePrompt::new("Open", vec![]);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Continue);
        type_str(&mut prompt, &dir.path().join("missing.toml").display().to_string());
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Continue);
        assert!(prompt.error.as_deref().unwrap_or("").starts_with("no such file"));

        let mut prompt = OpenFilePrompt::new("Open", vec![file.clone()]);
        assert_eq!(press(&mut prompt, KeyCode::Down), Step::Continue);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(file));
    }

    #[test]
    fn open_prompt_escape_cancels() {
        let mut prompt = OpenFilePrompt::new("Open", vec![]);
        type_str(&mut prompt, "abc");
        assert_eq!(press(&mut prompt, KeyCode::Esc), Step::Cancel);
        let mut prompt = OpenFilePrompt::new("Open", vec![]);
        assert_eq!(
            prompt.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Step::Cancel
        );
    }

    #[test]
    fn save_prompt_appends_selected_extension() {
        let mut prompt = SavePrompt::new("Save As");
        type_str(&mut prompt, "run1");
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(PathBuf::from("run1.toml")));

        let mut prompt = SavePrompt::new("Save As");
        type_str(&mut prompt, "run1");
        let _ = press(&mut prompt, KeyCode::Tab);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(PathBuf::from("run1.txt")));

        let mut prompt = SavePrompt::new("Save As");
        type_str(&mut prompt, "run1.cfg");
        let _ = press(&mut prompt, KeyCode::BackTab);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(PathBuf::from("run1.cfg")));
    }

    #[test]
    fn save_prompt_rejects_empty_name() {
        let mut prompt = SavePrompt::new("Save As");
        type_str(&mut prompt, "   ");
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Continue);
        assert_eq!(prompt.error.as_deref(), Some("enter a file name"));
    }

    #[test]
    fn secret_prompt_returns_typed_text() {
        let mut prompt = SecretPrompt::new("Password", "Password:");
        type_str(&mut prompt, "s3cr3tx");
        let _ = press(&mut prompt, KeyCode::Backspace);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done("s3cr3t".to_string()));
    }

    #[test]
    fn confirm_defaults_to_no() {
        let mut prompt = ConfirmPrompt::new(" ", "Sure?");
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(false));
        let mut prompt = ConfirmPrompt::new(" ", "Sure?");
        let _ = press(&mut prompt, KeyCode::Left);
        assert_eq!(press(&mut prompt, KeyCode::Enter), Step::Done(true));
        let mut prompt = ConfirmPrompt::new(" ", "Sure?");
        assert_eq!(press(&mut prompt, KeyCode::Char('y')), Step::Done(true));
        assert_eq!(press(&mut prompt, KeyCode::Esc), Step::Done(false));
    }

    #[test]
    fn finds_param_files_and_skips_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("c.csv"), "").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("config.toml"), "").unwrap();

        let found: Vec<String> = find_param_files(dir.path())
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(found, vec!["a.toml".to_string(), "b.txt".to_string()]);
    }
}
