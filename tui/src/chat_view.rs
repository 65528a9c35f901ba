//! Chat screen renderer.
//!
//! [`ChatView`] is a read-only projection of the session. Scroll position and pointer hit rows
//! live in [`ChatViewState`], which the chat loop keeps between frames.

use std::ops::Range;

use hush_protocol::ChatMessage;
use hush_protocol::Transport;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Position;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize as _;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::StatefulWidget;
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthStr;

use crate::composer::COMPOSER_PLACEHOLDER;
use crate::composer::ChatComposer;
use crate::connection::ConnectionStatus;
use crate::connection::spinner_frame;
use crate::navigation::Selection;
use crate::session::ChatSession;
use crate::text_formatting::skip_prefix_by_width;
use crate::text_formatting::truncate_with_ellipsis;
use crate::timeline::Timeline;

pub const CHAT_TITLE: &str = "👻 Hush — Ghost Chat";
pub const EMPTY_TIMELINE_HINT: &str = "waiting for ghosts to appear... 👻";
pub const SLOW_DOWN_WARNING: &str = "⚡ Slow down!";
const CONNECTING_STATUS: &str = "connecting...";
const CONNECTING_HINT: &str = "connecting to network...";
const FAILED_STATUS: &str = "✗ failed to connect";
const NETWORK_ERROR_PREFIX: &str = "✗ network error: ";

const MORE_MARKER: &str = " (...)";
const TIME_GAP: usize = 3;
const BODY_INDENT: &str = "    ";
const INPUT_PROMPT: &str = "> ";
const SELECTED_BG: Color = Color::DarkGray;

pub struct ChatView<'a> {
    username: &'a str,
    connection: &'a ConnectionStatus,
    peer_count: usize,
    timeline: &'a Timeline,
    selection: Selection,
    composer: &'a ChatComposer,
    format_time: fn(&ChatMessage) -> String,
}

impl<'a> ChatView<'a> {
    pub fn new<T: Transport>(session: &'a ChatSession<T>) -> Self {
        Self {
            username: session.username(),
            connection: session.connection(),
            peer_count: session.peer_count(),
            timeline: session.timeline(),
            selection: session.selection(),
            composer: session.composer(),
            format_time: local_clock_time,
        }
    }

    #[cfg(test)]
    fn with_time_format(mut self, format_time: fn(&ChatMessage) -> String) -> Self {
        self.format_time = format_time;
        self
    }
}

#[derive(Debug, Default)]
pub struct ChatViewState {
    /// First visible line of the message list.
    scroll_top: usize,
    list_area: Rect,
    /// Message index owning each visible list row, top to bottom.
    row_owners: Vec<usize>,
    cursor: Option<Position>,
    spinner_tick: usize,
}

impl ChatViewState {
    pub fn advance_spinner(&mut self) {
        self.spinner_tick = self.spinner_tick.wrapping_add(1);
    }

    /// Where the terminal cursor belongs after the last render.
    pub fn cursor_position(&self) -> Option<Position> {
        self.cursor
    }

    /// Message rendered at screen cell `(column, row)`, if any.
    pub fn hit_test(&self, column: u16, row: u16) -> Option<usize> {
        if !self.list_area.contains(Position::new(column, row)) {
            return None;
        }
        let offset = usize::from(row - self.list_area.y);
        self.row_owners.get(offset).copied()
    }
}

impl StatefulWidget for ChatView<'_> {
    type State = ChatViewState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut ChatViewState) {
        let input_height = self.composer.rows() + 2;
        let [
            header_area,
            status_area,
            top_divider,
            list_area,
            bottom_divider,
            warning_area,
            input_area,
        ] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(input_height),
        ])
        .areas(area);

        Line::from(CHAT_TITLE.bold().magenta()).render(header_area, buf);
        self.render_status(status_area, buf, state.spinner_tick);
        render_divider(top_divider, buf);
        self.render_messages(list_area, buf, state);
        render_divider(bottom_divider, buf);
        if self.composer.show_warning() {
            Line::from(SLOW_DOWN_WARNING.bold().yellow()).render(warning_area, buf);
        }
        state.cursor = self.render_input(input_area, buf);
    }
}

impl ChatView<'_> {
    fn render_status(&self, area: Rect, buf: &mut Buffer, spinner_tick: usize) {
        let line = match self.connection {
            ConnectionStatus::Connecting => {
                Line::from(
                Span::from(format!("{} {CONNECTING_STATUS}", spinner_frame(spinner_tick))).dim(),
            )
            }
            ConnectionStatus::Failed(_) => Line::from(FAILED_STATUS.red()),
            ConnectionStatus::Connected => Line::from(vec![
                "online as ".dim(),
                Span::from(self.username.to_string()).bold().green(),
                Span::from(format!("  ({} active peers)", self.peer_count)).dim(),
            ]),
        };
        line.render(area, buf);
    }

    /// What the list shows instead of messages: connection progress, a setup error, or the
    /// empty-timeline hint.
    fn list_notice(&self, spinner_tick: usize) -> Option<Line<'static>> {
        match self.connection {
            ConnectionStatus::Connecting => Some(Line::from(
                Span::from(format!("{} {CONNECTING_HINT}", spinner_frame(spinner_tick))).dim(),
            )),
            ConnectionStatus::Failed(reason) => Some(Line::from(
                Span::from(format!("{NETWORK_ERROR_PREFIX}{reason}")).red(),
            )),
            ConnectionStatus::Connected if self.timeline.is_empty() => {
                Some(Line::from(EMPTY_TIMELINE_HINT.dim()))
            }
            ConnectionStatus::Connected => None,
        }
    }

    fn render_messages(&self, area: Rect, buf: &mut Buffer, state: &mut ChatViewState) {
        state.list_area = area;
        state.row_owners.clear();

        if let Some(notice) = self.list_notice(state.spinner_tick) {
            state.scroll_top = 0;
            notice.render(area, buf);
            return;
        }

        let width = usize::from(area.width);
        let mut lines: Vec<Line<'static>> = Vec::new();
        let mut owners: Vec<usize> = Vec::new();
        let mut ranges: Vec<Range<usize>> = Vec::with_capacity(self.timeline.len());
        for (index, message) in self.timeline.iter().enumerate() {
            let start = lines.len();
            let is_me = message.sender == self.username;
            let mut message_lines = if self.timeline.is_expanded(index) {
                expanded_lines(message, is_me, (self.format_time)(message), width)
            } else {
                vec![collapsed_line(message, is_me, (self.format_time)(message), width)]
            };
            if self.selection.index() == Some(index) {
                for line in &mut message_lines {
                    line.style = Style::default().bg(SELECTED_BG);
                }
            }
            owners.extend(std::iter::repeat_n(index, message_lines.len()));
            lines.extend(message_lines);
            ranges.push(start..lines.len());
        }

        let height = usize::from(area.height);
        state.scroll_top = scroll_top_for(
            state.scroll_top,
            self.selection.index().and_then(|index| ranges.get(index)),
            lines.len(),
            height,
        );

        let visible = state.scroll_top..(state.scroll_top + height).min(lines.len());
        state
            .row_owners
            .extend_from_slice(&owners[visible.clone()]);
        for (row, line) in lines[visible].iter().enumerate() {
            let row_area = Rect {
                y: area.y + row as u16,
                height: 1,
                ..area
            };
            line.render(row_area, buf);
        }
    }

    fn render_input(&self, area: Rect, buf: &mut Buffer) -> Option<Position> {
        let border_style = if self.composer.show_warning() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::bordered().border_style(border_style);
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return None;
        }

        let single_row = self.composer.rows() == 1;
        let prompt_width = if single_row { INPUT_PROMPT.width() } else { 0 };
        if single_row {
            Span::from(INPUT_PROMPT).magenta().render(inner, buf);
        }
        let text_area = Rect {
            x: inner.x + prompt_width as u16,
            width: inner.width.saturating_sub(prompt_width as u16),
            ..inner
        };
        if text_area.width == 0 {
            return None;
        }

        if self.composer.is_empty() {
            if self.composer.placeholder_visible() {
                Span::from(COMPOSER_PLACEHOLDER).dim().render(text_area, buf);
            }
            return Some(Position::new(text_area.x, text_area.y));
        }

        let (cursor_line, cursor_byte) = self.composer.cursor_line_and_offset();
        let draft_lines: Vec<&str> = self.composer.text().split('\n').collect();
        let visible_rows = usize::from(text_area.height);
        let first_line = cursor_line.saturating_sub(visible_rows.saturating_sub(1));

        let cursor_text = draft_lines.get(cursor_line).copied().unwrap_or_default();
        let cursor_column = cursor_text[..cursor_byte].width();
        let text_width = usize::from(text_area.width);
        let h_offset = cursor_column.saturating_sub(text_width.saturating_sub(1));

        for (row, draft_line) in draft_lines
            .iter()
            .skip(first_line)
            .take(visible_rows)
            .enumerate()
        {
            let row_area = Rect {
                y: text_area.y + row as u16,
                height: 1,
                ..text_area
            };
            Line::from(skip_prefix_by_width(draft_line, h_offset).to_string()).render(row_area, buf);
        }

        let x = text_area.x + (cursor_column - h_offset) as u16;
        let y = text_area.y + (cursor_line - first_line) as u16;
        Some(Position::new(x, y))
    }
}

/// Keeps the selected range in view; with no selection, follows the newest line.
fn scroll_top_for(
    previous: usize,
    selected: Option<&Range<usize>>,
    total_lines: usize,
    height: usize,
) -> usize {
    let max_top = total_lines.saturating_sub(height);
    let Some(range) = selected else {
        return max_top;
    };
    let mut top = previous.min(max_top);
    if range.end > top + height {
        top = range.end - height;
    }
    if range.start < top {
        top = range.start;
    }
    top
}

fn render_divider(area: Rect, buf: &mut Buffer) {
    Line::from(Span::from("─".repeat(usize::from(area.width))).dark_gray()).render(area, buf);
}

fn display_sender(message: &ChatMessage, is_me: bool) -> Span<'static> {
    if is_me {
        Span::from("you").bold().green()
    } else {
        Span::from(message.sender.clone()).bold().light_magenta()
    }
}

fn local_clock_time(message: &ChatMessage) -> String {
    message
        .local_time()
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Pads between `left` and the right-aligned timestamp so the time ends at `width`.
fn with_time(mut spans: Vec<Span<'static>>, time: String, width: usize) -> Line<'static> {
    let used: usize = spans.iter().map(Span::width).sum();
    let gap = width
        .saturating_sub(used + time.width())
        .max(TIME_GAP);
    spans.push(Span::from(" ".repeat(gap)));
    spans.push(Span::from(time).dark_gray());
    Line::from(spans)
}

/// `sender: first line (...)   HH:MM:SS`
fn collapsed_line(
    message: &ChatMessage,
    is_me: bool,
    time: String,
    width: usize,
) -> Line<'static> {
    let sender = display_sender(message, is_me);
    let first_line = message.content.lines().next().unwrap_or_default();

    let reserved = sender.width() + ": ".len() + MORE_MARKER.len() + TIME_GAP + time.width();
    let preview = truncate_with_ellipsis(first_line, width.saturating_sub(reserved));

    with_time(
        vec![
            sender,
            Span::from(": "),
            Span::from(preview),
            MORE_MARKER.dark_gray(),
        ],
        time,
        width,
    )
}

/// `> sender:   HH:MM:SS` followed by the indented, wrapped body.
fn expanded_lines(
    message: &ChatMessage,
    is_me: bool,
    time: String,
    width: usize,
) -> Vec<Line<'static>> {
    let header = with_time(
        vec![
            "> ".light_magenta(),
            display_sender(message, is_me),
            Span::from(":"),
        ],
        time,
        width,
    );

    let body_width = width.saturating_sub(BODY_INDENT.len()).max(1);
    let mut lines = vec![header];
    lines.extend(
        textwrap::wrap(&message.content, body_width)
            .into_iter()
            .map(|wrapped| Line::from(format!("{BODY_INDENT}{wrapped}"))),
    );
    lines
}
