use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph, Wrap};

use super::dialogs::{Backdrop, TerminalDialogs, popup_frame};
use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::paramfile::ParamStore;
use crate::params::{ActionId, Mode, ParamDecl, ParamValue};
use crate::remote::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Field(&'static ParamDecl),
    Button(ActionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    EditText {
        key: &'static str,
        buffer: String,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Stay,
    Quit,
    Dispatch(ActionId),
}

struct App<S, C> {
    ctrl: Controller<S, C>,
    selected: usize,
    input: InputMode,
    status: Option<String>,
    root: PathBuf,
}

impl<S, C> App<S, C>
where
    S: ParamStore,
    C: Connector,
{
    fn new(ctrl: Controller<S, C>, root: PathBuf) -> Self {
        Self {
            ctrl,
            selected: 0,
            input: InputMode::Normal,
            status: None,
            root,
        }
    }

    fn rows(&self) -> Vec<Row> {
        self.ctrl
            .form()
            .visible_fields()
            .map(|(d, _)| Row::Field(d))
            .chain(self.ctrl.buttons().iter().copied().map(Row::Button))
            .collect()
    }

    fn selected_row(&self) -> Option<Row> {
        self.rows().get(self.selected).copied()
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.rows().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    }

    fn mode_button(&self) -> ActionId {
        match self.ctrl.mode() {
            Mode::Basic => ActionId::AdvancedMode,
            Mode::Advanced => ActionId::BasicMode,
        }
    }

    fn text_value(&self, key: &str) -> String {
        self.ctrl
            .form()
            .value(key)
            .map(ParamValue::to_string)
            .unwrap_or_default()
    }

    fn toggle(&mut self, key: &str) {
        match self.ctrl.form_mut().toggle_flag(key) {
            Ok(on) => tracing::debug!(key, on, "flag toggled"),
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    fn cycle_choice(&mut self, decl: &ParamDecl, forward: bool) {
        let choices = decl.choices();
        if choices.len() < 2 {
            return;
        }
        let current = self.text_value(decl.key);
        let next = match choices.iter().position(|c| *c == current) {
            Some(i) if forward => (i + 1) % choices.len(),
            Some(i) => (i + choices.len() - 1) % choices.len(),
            None => 0,
        };
        if let Err(e) = self
            .ctrl
            .form_mut()
            .set_value(decl.key, ParamValue::Text(choices[next].to_string()))
        {
            self.status = Some(e.to_string());
        }
    }

    fn activate(&mut self, row: Row) -> Intent {
        match row {
            Row::Field(d) if d.is_flag() => {
                self.toggle(d.key);
                Intent::Stay
            }
            Row::Field(d) => {
                self.input = InputMode::EditText {
                    key: d.key,
                    buffer: self.text_value(d.key),
                    error: None,
                };
                Intent::Stay
            }
            Row::Button(id) => Intent::Dispatch(id),
        }
    }

    fn apply_edit(&mut self) {
        let InputMode::EditText { key, buffer, .. } = &self.input else {
            return;
        };
        let (key, value) = (*key, buffer.clone());
        match self.ctrl.form_mut().set_value(key, ParamValue::Text(value)) {
            Ok(()) => self.input = InputMode::Normal,
            Err(e) => {
                if let InputMode::EditText { error, .. } = &mut self.input {
                    *error = Some(e.to_string());
                }
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Intent {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return Intent::Quit;
        }

        if let InputMode::EditText { buffer, .. } = &mut self.input {
            match code {
                KeyCode::Esc => self.input = InputMode::Normal,
                KeyCode::Enter => self.apply_edit(),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return Intent::Stay;
        }

        self.status = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Intent::Quit,
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection(1);
                Intent::Stay
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection(-1);
                Intent::Stay
            }
            KeyCode::Enter => match self.selected_row() {
                Some(row) => self.activate(row),
                None => Intent::Stay,
            },
            KeyCode::Char(' ') => match self.selected_row() {
                Some(Row::Field(d)) if d.is_flag() => {
                    self.toggle(d.key);
                    Intent::Stay
                }
                Some(Row::Button(id)) => Intent::Dispatch(id),
                _ => Intent::Stay,
            },
            KeyCode::Left | KeyCode::Right => {
                if let Some(Row::Field(d)) = self.selected_row() {
                    if !d.is_flag() {
                        self.cycle_choice(d, code == KeyCode::Right);
                    }
                }
                Intent::Stay
            }
            KeyCode::Char('m') => Intent::Dispatch(self.mode_button()),
            KeyCode::Char('o') => Intent::Dispatch(ActionId::LoadParameters),
            KeyCode::Char('s') => Intent::Dispatch(ActionId::SaveParameters),
            KeyCode::Char('r') => Intent::Dispatch(ActionId::Submit),
            _ => Intent::Stay,
        }
    }

    /// Rows changed with the mode; keep the cursor on the list.
    fn after_dispatch(&mut self) {
        self.move_selection(0);
    }

    fn row_label(&self, row: Row) -> String {
        match row {
            Row::Field(d) if d.is_flag() => {
                let on = self
                    .ctrl
                    .form()
                    .value(d.key)
                    .and_then(ParamValue::as_flag)
                    .unwrap_or(false);
                format!("[{}] {}", if on { "x" } else { " " }, d.key)
            }
            Row::Field(d) => format!("{:<28} {}", d.key, self.text_value(d.key)),
            Row::Button(id) => format!("< {} >", id.label()),
        }
    }

    fn title(&self) -> String {
        format!("RNAapp: {} mode", self.ctrl.mode())
    }

    fn backdrop(&self) -> Backdrop {
        Backdrop {
            title: self.title(),
            lines: self.rows().into_iter().map(|r| self.row_label(r)).collect(),
        }
    }

    fn draw(&self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(f.area());

        self.draw_header(f, chunks[0]);
        self.draw_form(f, chunks[1]);
        self.draw_footer(f, chunks[2]);
        self.draw_modal(f);
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let settings = self
            .ctrl
            .settings()
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<builtin settings>".into());
        let line = Line::from(vec![
            Span::styled(self.title(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(settings, Style::default().fg(Color::Gray)),
            Span::raw("  "),
            Span::styled(now, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(Text::from(line)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_type(BorderType::Plain),
        );
        f.render_widget(p, area);
    }

    fn draw_form(&self, f: &mut ratatui::Frame, area: Rect) {
        let rows = self.rows();
        let items: Vec<ListItem> = rows
            .iter()
            .map(|r| {
                let style = match r {
                    Row::Button(_) => Style::default()
                        .fg(Color::LightBlue)
                        .add_modifier(Modifier::BOLD),
                    Row::Field(_) => Style::default(),
                };
                ListItem::new(self.row_label(*r)).style(style)
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .title("Parameters")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .highlight_style(Style::default().fg(Color::Black).bg(Color::LightYellow))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect) {
        let text = match &self.status {
            Some(s) => Span::styled(s.clone(), Style::default().fg(Color::Yellow)),
            None => Span::styled(
                "[j/k] Move  [Enter] Edit/Press  [Space] Toggle  [Left/Right] Choices  [m] Mode  [o] Load  [s] Save  [r] Submit  [q] Quit",
                Style::default().fg(Color::Gray),
            ),
        };
        let p = Paragraph::new(Line::from(text)).block(Block::default().borders(Borders::TOP));
        f.render_widget(p, area);
    }

    fn draw_modal(&self, f: &mut ratatui::Frame) {
        let InputMode::EditText { key, buffer, error } = &self.input else {
            return;
        };
        let area = f.area();
        let popup = popup_frame(f, area, 70, 30, "Edit Value", Color::Cyan);
        let mut text = vec![
            Line::from(vec![
                Span::styled("Edit: ", Style::default().fg(Color::Yellow)),
                Span::raw(*key),
            ]),
            Line::from("enter=save  esc=cancel"),
        ];
        if let Some(e) = error {
            text.push(Line::from(Span::styled(
                format!("error: {e}"),
                Style::default().fg(Color::Red),
            )));
        }
        text.push(Line::from(""));
        text.push(Line::from(buffer.clone()));
        f.render_widget(Paragraph::new(Text::from(text)).wrap(Wrap { trim: false }), popup);
    }
}

/// Runs the terminal form until the user quits.
pub fn run_tui<S, C>(ctrl: Controller<S, C>) -> Result<()>
where
    S: ParamStore,
    C: Connector,
{
    let root = std::env::current_dir()
        .map_err(|e| Error::msg(format!("failed to read working directory: {e}")))?;

    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| Error::msg(e.to_string()))?;
    execute!(stdout, EnterAlternateScreen, Hide).map_err(|e| Error::msg(e.to_string()))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| Error::msg(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::msg(format!("tui clear failed: {e}")))?;

    let result = run_loop(&mut terminal, App::new(ctrl, root));

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();
    result
}

fn run_loop<S, C>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App<S, C>,
) -> Result<()>
where
    S: ParamStore,
    C: Connector,
{
    // Redraw at least once a second for the header clock.
    let tick = Duration::from_millis(500);
    loop {
        terminal
            .draw(|f| app.draw(f))
            .map_err(|e| Error::msg(format!("tui draw failed: {e}")))?;

        if !event::poll(tick).map_err(|e| Error::msg(e.to_string()))? {
            continue;
        }
        let Event::Key(k) = event::read().map_err(|e| Error::msg(e.to_string()))? else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(k.code, k.modifiers) {
            Intent::Stay => {}
            Intent::Quit => return Ok(()),
            Intent::Dispatch(id) => {
                let mut dialogs = TerminalDialogs::new(terminal, app.backdrop(), app.root.clone());
                app.ctrl.dispatch(id, &mut dialogs);
                app.after_dispatch();
                terminal
                    .clear()
                    .map_err(|e| Error::msg(format!("tui clear failed: {e}")))?;
            }
        }
    }
}
