//! Welcome screen: pick a display name before joining the chat.
//!
//! An empty name resolves to a random `Ghost-NNN`. Ctrl+C cancels without joining. The network
//! comes up in the background meanwhile, and its state is shown above the name input.

use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use rand::Rng;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Flex;
use ratatui::layout::Layout;
use ratatui::layout::Position;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize as _;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Clear;
use ratatui::widgets::Widget;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use unicode_width::UnicodeWidthStr;

use crate::composer::ChatComposer;
use crate::connection::Connection;
use crate::connection::ConnectionStatus;
use crate::connection::SPINNER_INTERVAL;
use crate::connection::spinner_frame;
use crate::text_formatting::skip_prefix_by_width;
use crate::tui::Tui;
use crate::tui::TuiEvent;

/// Longest accepted display name, in characters.
pub const USERNAME_CHAR_LIMIT: usize = 30;

const HUSH_ASCII_ART: &[&str] = &[
    "██╗  ██╗██╗   ██╗███████╗██╗  ██╗",
    "██║  ██║██║   ██║██╔════╝██║  ██║",
    "███████║██║   ██║███████╗███████║",
    "██╔══██║██║   ██║╚════██║██╔══██║",
    "██║  ██║╚██████╔╝███████║██║  ██║",
    "╚═╝  ╚═╝ ╚═════╝ ╚══════╝╚═╝  ╚═╝",
];

pub const WELCOME_TAGLINE: &str = "talk to anyone on your wifi — no servers, no trace";
const NAME_PLACEHOLDER: &str = "enter your name...";
const JOIN_HINT: &str = "press enter to join";
const CONNECTING_STATUS: &str = "connecting...";
const CONNECTED_STATUS: &str = "● connected";
const FAILED_STATUS: &str = "✗ network error";
const INPUT_PROMPT: &str = "> ";
const INPUT_BOX_WIDTH: u16 = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WelcomeOutcome {
    Joined(String),
    Cancelled,
}

/// A random `Ghost-NNN` name with `NNN` in `100..=999`.
pub fn ghost_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("Ghost-{}", rng.random_range(100..=999))
}

/// The trimmed input, or a fresh ghost name when nothing was typed.
pub fn resolve_username(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        ghost_name(&mut rand::rng())
    } else {
        trimmed.to_string()
    }
}

pub async fn run_welcome_with_tui<T>(
    tui: &mut Tui,
    default_name: Option<&str>,
    connection: &mut Connection<T>,
) -> anyhow::Result<WelcomeOutcome> {
    let mut screen = WelcomeScreen::new(default_name);
    screen.set_connection(connection.status().clone());
    draw(tui, &screen)?;

    let events = tui.event_stream();
    tokio::pin!(events);
    let mut spinner = tokio::time::interval(SPINNER_INTERVAL);
    spinner.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while screen.outcome().is_none() {
        let redraw = tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    TuiEvent::Key(key_event) => screen.handle_key(key_event),
                    TuiEvent::Paste(pasted) => screen.handle_paste(&pasted),
                    TuiEvent::Draw => true,
                    TuiEvent::Mouse(_) | TuiEvent::FocusGained => false,
                }
            }
            _ = connection.settle(), if connection.is_connecting() => {
                screen.set_connection(connection.status().clone())
            }
            _ = spinner.tick(), if connection.is_connecting() => screen.advance_spinner(),
        };
        if redraw {
            draw(tui, &screen)?;
        }
    }

    tui.terminal.clear()?;
    Ok(screen.outcome().cloned().unwrap_or(WelcomeOutcome::Cancelled))
}

fn draw(tui: &mut Tui, screen: &WelcomeScreen) -> anyhow::Result<()> {
    tui.draw(|frame| {
        let area = frame.area();
        frame.render_widget(screen, area);
        if let Some(position) = screen.cursor_position(area) {
            frame.set_cursor_position(position);
        }
    })
}

pub struct WelcomeScreen {
    input: ChatComposer,
    outcome: Option<WelcomeOutcome>,
    connection: ConnectionStatus,
    spinner_tick: usize,
}

impl WelcomeScreen {
    pub fn new(default_name: Option<&str>) -> Self {
        let mut input = ChatComposer::default().with_char_limit(USERNAME_CHAR_LIMIT);
        if let Some(name) = default_name {
            input.insert_str(&single_line(name));
        }
        Self {
            input,
            outcome: None,
            connection: ConnectionStatus::Connecting,
            spinner_tick: 0,
        }
    }

    /// Returns whether the status line changed.
    pub fn set_connection(&mut self, connection: ConnectionStatus) -> bool {
        if self.connection == connection {
            return false;
        }
        self.connection = connection;
        true
    }

    pub fn advance_spinner(&mut self) -> bool {
        if self.connection != ConnectionStatus::Connecting {
            return false;
        }
        self.spinner_tick = self.spinner_tick.wrapping_add(1);
        true
    }

    pub fn name(&self) -> &str {
        self.input.text()
    }

    pub fn outcome(&self) -> Option<&WelcomeOutcome> {
        self.outcome.as_ref()
    }

    /// Returns whether the screen needs a redraw.
    pub fn handle_key(&mut self, key_event: KeyEvent) -> bool {
        if key_event.kind == KeyEventKind::Release || self.outcome.is_some() {
            return false;
        }
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key_event.code, KeyCode::Char('c')) {
            self.outcome = Some(WelcomeOutcome::Cancelled);
            return true;
        }

        match key_event.code {
            KeyCode::Enter => {
                let name = resolve_username(self.input.text());
                tracing::info!(%name, "username chosen");
                self.outcome = Some(WelcomeOutcome::Joined(name));
                true
            }
            KeyCode::Char('a') if ctrl => self.input.move_home(),
            KeyCode::Char('e') if ctrl => self.input.move_end(),
            KeyCode::Char(_) if ctrl || key_event.modifiers.contains(KeyModifiers::ALT) => false,
            KeyCode::Char(ch) => self.input.insert_char(ch),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete_forward(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            _ => false,
        }
    }

    pub fn handle_paste(&mut self, pasted: &str) -> bool {
        self.outcome.is_none() && self.input.insert_str(&single_line(pasted))
    }

    fn input_area(area: Rect) -> Rect {
        let [_, _, _, _, _, input, _] = Self::rows(area);
        let [input] = Layout::horizontal([Constraint::Length(INPUT_BOX_WIDTH)])
            .flex(Flex::Center)
            .areas(input);
        input
    }

    /// Banner, tagline, gap, network status, gap, name input, hint.
    fn rows(area: Rect) -> [Rect; 7] {
        Layout::vertical([
            Constraint::Length(HUSH_ASCII_ART.len() as u16),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .flex(Flex::Center)
        .areas(area)
    }

    fn visible_text_and_cursor(&self, width: usize) -> (&str, usize) {
        let text = self.input.text();
        let cursor_column = text[..self.input.cursor()].width();
        let h_offset = cursor_column.saturating_sub(width.saturating_sub(1));
        (skip_prefix_by_width(text, h_offset), cursor_column - h_offset)
    }

    pub fn cursor_position(&self, area: Rect) -> Option<Position> {
        if self.outcome.is_some() {
            return None;
        }
        let inner = Block::bordered().inner(Self::input_area(area));
        let prompt_width = INPUT_PROMPT.width() as u16;
        let text_width = inner.width.saturating_sub(prompt_width);
        if inner.height == 0 || text_width == 0 {
            return None;
        }
        let (_, column) = self.visible_text_and_cursor(usize::from(text_width));
        Some(Position::new(inner.x + prompt_width + column as u16, inner.y))
    }
}

impl Widget for &WelcomeScreen {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let [banner_area, tagline_area, _, status_area, _, _, hint_area] =
            WelcomeScreen::rows(area);

        let banner_rows = Layout::vertical([Constraint::Length(1); HUSH_ASCII_ART.len()])
            .split(banner_area);
        for (row, art) in banner_rows.iter().zip(HUSH_ASCII_ART) {
            Line::from(Span::from(*art).bold().magenta())
                .centered()
                .render(*row, buf);
        }
        Line::from(WELCOME_TAGLINE.dim())
            .centered()
            .render(tagline_area, buf);
        self.status_line().centered().render(status_area, buf);

        let input_area = WelcomeScreen::input_area(area);
        let block = Block::bordered().border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(input_area);
        block.render(input_area, buf);

        let prompt_width = INPUT_PROMPT.width() as u16;
        let text_area = Rect {
            x: inner.x + prompt_width,
            width: inner.width.saturating_sub(prompt_width),
            ..inner
        };
        let content = if self.input.is_empty() {
            Span::from(NAME_PLACEHOLDER).dim()
        } else {
            let (visible, _) = self.visible_text_and_cursor(usize::from(text_area.width));
            Span::from(visible.to_string())
        };
        Line::from(vec![INPUT_PROMPT.magenta(), content]).render(inner, buf);

        Line::from(JOIN_HINT.dim()).centered().render(hint_area, buf);
    }
}

impl WelcomeScreen {
    fn status_line(&self) -> Line<'static> {
        match &self.connection {
            ConnectionStatus::Connecting => Line::from(
                Span::from(format!("{} {CONNECTING_STATUS}", spinner_frame(self.spinner_tick)))
                    .dim(),
            ),
            ConnectionStatus::Connected => Line::from(CONNECTED_STATUS.light_green()),
            ConnectionStatus::Failed(_) => Line::from(FAILED_STATUS.red()),
        }
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
