//! The composer is the text input state machine under the message list.
//!
//! It owns the in-progress draft, the placeholder latch, the derived row hint, and the send
//! cooldown (see [`SendRateLimiter`]). It does not decide *when* Enter means "send"; that is the
//! selection table's job in `navigation`. The session calls [`ChatComposer::submit`] once the
//! table resolves Enter to a send.
//!
//! # Placeholder latch
//!
//! The placeholder is shown until the draft becomes non-empty for the first time. After that it
//! stays hidden for the rest of the session, even if the draft is emptied again.
//!
//! # Warning flag
//!
//! A send rejected by the cooldown raises a transient warning. Any following keystroke other than
//! Enter clears it, whether or not the cooldown has elapsed.

use std::time::Instant;

use unicode_segmentation::GraphemeCursor;
use unicode_segmentation::UnicodeSegmentation;

use crate::send_limiter::CooldownActive;
use crate::send_limiter::SendRateLimiter;

/// Upper bound of the row hint, regardless of how many lines the draft holds.
pub const MAX_COMPOSER_ROWS: u16 = 5;

/// Maximum number of characters accepted into the draft.
pub const COMPOSER_CHAR_LIMIT: usize = 500;

pub const COMPOSER_PLACEHOLDER: &str = "type a message...";

/// Result of a send attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Trimmed draft was empty; nothing changed.
    Empty,
    /// Cooldown still active; the draft is kept and the warning is raised.
    Throttled(CooldownActive),
    /// Draft accepted and cleared. Carries the trimmed content to hand to the transport.
    Accepted(String),
}

#[derive(Debug)]
pub struct ChatComposer {
    text: String,
    /// Byte offset into `text`, always on a grapheme boundary.
    cursor: usize,
    placeholder_visible: bool,
    warning: bool,
    char_limit: usize,
    limiter: SendRateLimiter,
}

impl Default for ChatComposer {
    fn default() -> Self {
        Self::new(SendRateLimiter::default())
    }
}

impl ChatComposer {
    pub fn new(limiter: SendRateLimiter) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            placeholder_visible: true,
            warning: false,
            char_limit: COMPOSER_CHAR_LIMIT,
            limiter,
        }
    }

    pub fn with_char_limit(mut self, char_limit: usize) -> Self {
        self.char_limit = char_limit;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn placeholder_visible(&self) -> bool {
        self.placeholder_visible
    }

    pub fn show_warning(&self) -> bool {
        self.warning
    }

    pub fn clear_warning(&mut self) {
        self.warning = false;
    }

    pub fn last_send_at(&self) -> Option<Instant> {
        self.limiter.last_accepted()
    }

    /// Display rows for the draft: one per `\n`-delimited segment, clamped to `1..=5`.
    pub fn rows(&self) -> u16 {
        let segments = self.text.split('\n').count();
        u16::try_from(segments)
            .unwrap_or(u16::MAX)
            .clamp(1, MAX_COMPOSER_ROWS)
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut buf = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut buf))
    }

    pub fn insert_newline(&mut self) -> bool {
        self.insert_str("\n")
    }

    /// Inserts `text` at the cursor, truncated to fit the character limit.
    pub fn insert_str(&mut self, text: &str) -> bool {
        let available = self.char_limit.saturating_sub(self.text.chars().count());
        let accepted: String = text.chars().take(available).collect();
        if accepted.is_empty() {
            return false;
        }
        self.text.insert_str(self.cursor, &accepted);
        self.cursor += accepted.len();
        self.on_text_changed();
        true
    }

    /// Normalizes terminal line endings before inserting a paste.
    pub fn handle_paste(&mut self, pasted: String) -> bool {
        let pasted = pasted.replace("\r\n", "\n").replace('\r', "\n");
        self.insert_str(&pasted)
    }

    pub fn backspace(&mut self) -> bool {
        let Some(prev) = self.prev_boundary() else {
            return false;
        };
        self.text.replace_range(prev..self.cursor, "");
        self.cursor = prev;
        self.on_text_changed();
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        let Some(next) = self.next_boundary() else {
            return false;
        };
        self.text.replace_range(self.cursor..next, "");
        self.on_text_changed();
        true
    }

    pub fn move_left(&mut self) -> bool {
        match self.prev_boundary() {
            Some(prev) => {
                self.cursor = prev;
                true
            }
            None => false,
        }
    }

    pub fn move_right(&mut self) -> bool {
        match self.next_boundary() {
            Some(next) => {
                self.cursor = next;
                true
            }
            None => false,
        }
    }

    /// Moves to the start of the current line.
    pub fn move_home(&mut self) -> bool {
        let start = self.text[..self.cursor].rfind('\n').map_or(0, |idx| idx + 1);
        let moved = start != self.cursor;
        self.cursor = start;
        moved
    }

    /// Moves to the end of the current line.
    pub fn move_end(&mut self) -> bool {
        let end = self.text[self.cursor..]
            .find('\n')
            .map_or(self.text.len(), |idx| self.cursor + idx);
        let moved = end != self.cursor;
        self.cursor = end;
        moved
    }

    /// Attempts to send the draft at `now`.
    ///
    /// On acceptance the warning is cleared, the draft is emptied (which resets the row hint to 1),
    /// and `now` becomes the start of the next cooldown window.
    pub fn submit(&mut self, now: Instant) -> SubmitOutcome {
        let content = self.text.trim();
        if content.is_empty() {
            return SubmitOutcome::Empty;
        }

        if let Err(cooldown) = self.limiter.try_acquire(now) {
            self.warning = true;
            return SubmitOutcome::Throttled(cooldown);
        }

        let content = content.to_string();
        self.warning = false;
        self.text.clear();
        self.cursor = 0;
        SubmitOutcome::Accepted(content)
    }

    /// Splits the draft into display lines and returns the cursor as `(line, byte offset in line)`.
    pub fn cursor_line_and_offset(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
        (line, self.cursor - line_start)
    }

    fn on_text_changed(&mut self) {
        if !self.text.is_empty() {
            self.placeholder_visible = false;
        }
    }

    fn prev_boundary(&self) -> Option<usize> {
        let mut cursor = GraphemeCursor::new(self.cursor, self.text.len(), true);
        cursor.prev_boundary(&self.text, 0).ok().flatten()
    }

    fn next_boundary(&self) -> Option<usize> {
        if self.cursor >= self.text.len() {
            return None;
        }
        self.text[self.cursor..]
            .grapheme_indices(true)
            .nth(1)
            .map(|(idx, _)| self.cursor + idx)
            .or(Some(self.text.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn type_str(composer: &mut ChatComposer, text: &str) {
        for ch in text.chars() {
            composer.insert_char(ch);
        }
    }

    #[test]
    fn placeholder_latches_off_after_first_input() {
        let mut composer = ChatComposer::default();
        assert!(composer.placeholder_visible());

        composer.insert_char('h');
        assert!(!composer.placeholder_visible());

        composer.backspace();
        assert!(composer.is_empty());
        assert!(!composer.placeholder_visible());
    }

    #[test]
    fn placeholder_stays_hidden_after_a_send_empties_the_draft() {
        let mut composer = ChatComposer::default();
        type_str(&mut composer, "hi");
        assert!(matches!(
            composer.submit(Instant::now()),
            SubmitOutcome::Accepted(_)
        ));
        assert!(composer.is_empty());
        assert!(!composer.placeholder_visible());
    }

    #[test]
    fn rows_follow_newlines_and_clamp() {
        let mut composer = ChatComposer::default();
        assert_eq!(composer.rows(), 1);

        composer.insert_str("a\nb");
        assert_eq!(composer.rows(), 2);

        composer.insert_str("\n\n\n\n\n\n");
        assert_eq!(composer.rows(), MAX_COMPOSER_ROWS);
        assert_eq!(composer.text().split('\n').count(), 8);
    }

    #[test]
    fn empty_or_whitespace_submit_is_a_no_op() {
        let mut composer = ChatComposer::default();
        assert_eq!(composer.submit(Instant::now()), SubmitOutcome::Empty);

        composer.insert_str("   \n  ");
        assert_eq!(composer.submit(Instant::now()), SubmitOutcome::Empty);
        assert_eq!(composer.text(), "   \n  ");
        assert_eq!(composer.last_send_at(), None);
        assert!(!composer.show_warning());
    }

    #[test]
    fn accepted_submit_trims_and_resets_rows() {
        let mut composer = ChatComposer::default();
        composer.insert_str("  hello\nthere  ");
        assert_eq!(composer.rows(), 2);

        let now = Instant::now();
        assert_eq!(
            composer.submit(now),
            SubmitOutcome::Accepted("hello\nthere".to_string())
        );
        assert_eq!(composer.text(), "");
        assert_eq!(composer.cursor(), 0);
        assert_eq!(composer.rows(), 1);
        assert_eq!(composer.last_send_at(), Some(now));
    }

    #[test]
    fn throttled_submit_keeps_draft_and_raises_warning() {
        let mut composer = ChatComposer::default();
        let start = Instant::now();
        composer.insert_str("hello");
        composer.submit(start);

        composer.insert_str("world");
        let outcome = composer.submit(start + Duration::from_millis(1000));
        assert_eq!(
            outcome,
            SubmitOutcome::Throttled(CooldownActive {
                remaining: Duration::from_millis(500)
            })
        );
        assert_eq!(composer.text(), "world");
        assert!(composer.show_warning());
        assert_eq!(composer.last_send_at(), Some(start));

        assert_eq!(
            composer.submit(start + Duration::from_millis(1600)),
            SubmitOutcome::Accepted("world".to_string())
        );
        assert!(!composer.show_warning());
    }

    #[test]
    fn char_limit_truncates_insertions() {
        let mut composer = ChatComposer::default().with_char_limit(4);
        assert!(composer.insert_str("abcdef"));
        assert_eq!(composer.text(), "abcd");
        assert!(!composer.insert_char('x'));
    }

    #[test]
    fn cursor_edits_respect_graphemes() {
        let mut composer = ChatComposer::default();
        composer.insert_str("ae\u{301}z");
        assert!(composer.move_left());
        assert!(composer.backspace());
        assert_eq!(composer.text(), "az");
        assert!(composer.move_left());
        assert!(composer.delete_forward());
        assert_eq!(composer.text(), "z");
        assert!(!composer.move_left());
        assert!(!composer.backspace());
    }

    #[test]
    fn home_and_end_stay_on_current_line() {
        let mut composer = ChatComposer::default();
        composer.insert_str("first\nsecond");
        assert!(composer.move_home());
        assert_eq!(composer.cursor_line_and_offset(), (1, 0));
        assert!(composer.move_end());
        assert_eq!(composer.cursor_line_and_offset(), (1, "second".len()));
    }

    #[test]
    fn paste_normalizes_carriage_returns() {
        let mut composer = ChatComposer::default();
        composer.handle_paste("one\r\ntwo\rthree".to_string());
        assert_eq!(composer.text(), "one\ntwo\nthree");
        assert_eq!(composer.rows(), 3);
    }
}
