//! The chat session controller.
//!
//! `ChatSession` is the single owner of the timeline, the selection, the composer and the peer
//! count. It reacts to three kinds of input, each handled to completion before the next:
//!
//! - terminal input (keys, paste, focus, pointer activation) routed from the chat loop;
//! - [`AppEvent`]s posted by background tasks (message subscription and presence poller);
//! - explicit send requests.
//!
//! # Key Routing
//!
//! Navigation keys (Up, Down, Enter, Esc) only reach the selection table when no modifier other
//! than Shift is held. With nothing selected, Shift+Enter inserts a newline instead of sending;
//! Alt+Enter and Ctrl+J always do. Character keys edit the draft and clear the selection, and
//! Backspace/Delete clear it only when they removed something. Any key other than Enter clears
//! the cooldown warning.
//!
//! # Connection
//!
//! A session can start before its transport is ready ([`ChatSession::connecting`]). Sending is
//! refused until [`ChatSession::attach`] hands it the transport; the draft is kept.
//!
//! # Teardown
//!
//! The subscription forwarder and the poller are owned by [`SessionTasks`]. Dropping it (or
//! calling [`ChatSession::end`]) cancels the session token and aborts both tasks. Every handler
//! checks the token first, so an event that was already queued when the session ended is
//! ignored.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use hush_protocol::MessageReceiver;
use hush_protocol::Transport;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app_event::AppEvent;
use crate::app_event::AppEventSender;
use crate::composer::ChatComposer;
use crate::composer::SubmitOutcome;
use crate::connection::ConnectionStatus;
use crate::navigation::NavEffect;
use crate::navigation::NavKey;
use crate::navigation::Navigator;
use crate::navigation::Selection;
use crate::presence::PRESENCE_POLL_INTERVAL;
use crate::presence::spawn_presence_poller;
use crate::timeline::Timeline;

/// What the chat loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled { redraw: bool },
    Quit,
}

/// Outcome of [`ChatSession::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Empty,
    Throttled { remaining: Duration },
    /// The transport is not up yet, or failed to come up.
    Offline,
    Sent,
}

/// Long-lived resources of one session: the subscription forwarder and the presence poller.
///
/// Released on drop, including when the chat loop exits through an error.
pub struct SessionTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SessionTasks {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct ChatSession<T: Transport> {
    transport: Option<Arc<T>>,
    connection: ConnectionStatus,
    /// `None` for sessions driven entirely through [`ChatSession::handle_app_event`].
    app_event_tx: Option<AppEventSender>,
    poll_interval: Duration,
    username: String,
    timeline: Timeline,
    navigator: Navigator,
    composer: ChatComposer,
    peer_count: usize,
    messages_sent: usize,
    cancel: CancellationToken,
    tasks: SessionTasks,
}

impl<T: Transport> ChatSession<T> {
    /// A session whose transport is still being set up. Call [`ChatSession::attach`] or
    /// [`ChatSession::connection_failed`] once the setup settles.
    pub fn connecting(
        username: impl Into<String>,
        app_event_tx: AppEventSender,
        poll_interval: Duration,
    ) -> Self {
        let mut session = Self::offline(username.into());
        session.app_event_tx = Some(app_event_tx);
        session.poll_interval = poll_interval;
        session
    }

    /// A connected session with no background tasks. Events must be fed through
    /// [`ChatSession::handle_app_event`].
    #[cfg(test)]
    pub(crate) fn new_detached(transport: Arc<T>) -> Self {
        let mut session = Self::offline(transport.username());
        session.attach(transport);
        session
    }

    pub(crate) fn offline(username: String) -> Self {
        let cancel = CancellationToken::new();
        Self {
            transport: None,
            connection: ConnectionStatus::Connecting,
            app_event_tx: None,
            poll_interval: PRESENCE_POLL_INTERVAL,
            username,
            timeline: Timeline::new(),
            navigator: Navigator::new(),
            composer: ChatComposer::default(),
            peer_count: 0,
            messages_sent: 0,
            tasks: SessionTasks::new(cancel.clone()),
            cancel,
        }
    }

    /// Hands the session its transport: announces the username, subscribes and starts the
    /// poller. Ignored once ended or already attached.
    ///
    /// Must be called from within a Tokio runtime unless the session is detached.
    pub fn attach(&mut self, transport: Arc<T>) {
        if self.is_ended() || self.transport.is_some() {
            return;
        }
        transport.set_username(&self.username);

        // Only the background tasks hold the sender after this.
        if let Some(app_event_tx) = self.app_event_tx.take() {
            let messages = transport.subscribe();
            self.tasks.push(spawn_message_forwarder(
                messages,
                app_event_tx.clone(),
                self.cancel.clone(),
            ));
            self.tasks.push(spawn_presence_poller(
                Arc::clone(&transport),
                self.poll_interval,
                app_event_tx,
                self.cancel.clone(),
            ));
        }

        self.transport = Some(transport);
        self.connection = ConnectionStatus::Connected;
        tracing::info!(username = %self.username, "chat session started");
    }

    /// The transport could not be set up. The session stays usable for reading the error.
    pub fn connection_failed(&mut self, reason: impl Into<String>) {
        if self.is_ended() || self.transport.is_some() {
            return;
        }
        self.app_event_tx = None;
        self.connection = ConnectionStatus::Failed(reason.into());
    }

    /// Unsubscribes and stops the poller. Later events become no-ops.
    pub fn end(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.tasks.shutdown();
        tracing::info!(
            received = self.timeline.len(),
            sent = self.messages_sent,
            "chat session ended"
        );
    }

    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn selection(&self) -> Selection {
        self.navigator.selection()
    }

    pub fn composer(&self) -> &ChatComposer {
        &self.composer
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// Applies an event posted by a background task. Returns whether a redraw is needed.
    pub fn handle_app_event(&mut self, event: AppEvent) -> bool {
        if self.is_ended() {
            return false;
        }
        match event {
            AppEvent::MessageReceived(message) => {
                let index = self.timeline.append(message);
                tracing::trace!(index, "message appended");
                true
            }
            AppEvent::PeerCount(count) => {
                let changed = self.peer_count != count;
                self.peer_count = count;
                changed
            }
        }
    }

    pub fn handle_key_event(&mut self, key_event: KeyEvent, now: Instant) -> KeyOutcome {
        if self.is_ended() || key_event.kind == KeyEventKind::Release {
            return KeyOutcome::Handled { redraw: false };
        }

        let modifiers = key_event.modifiers;
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        let alt = modifiers.contains(KeyModifiers::ALT);

        if ctrl && matches!(key_event.code, KeyCode::Char('c')) {
            return KeyOutcome::Quit;
        }
        if ctrl && matches!(key_event.code, KeyCode::Char('d')) && self.composer.is_empty() {
            return KeyOutcome::Quit;
        }

        let mut redraw = false;
        if key_event.code != KeyCode::Enter && self.composer.show_warning() {
            self.composer.clear_warning();
            redraw = true;
        }

        let selected = self.navigator.selection() != Selection::Unselected;
        let handled = match key_event.code {
            KeyCode::Enter if ctrl => false,
            KeyCode::Enter if alt => self.type_text(ChatComposer::insert_newline),
            KeyCode::Enter if modifiers.contains(KeyModifiers::SHIFT) && !selected => {
                self.type_text(ChatComposer::insert_newline)
            }
            KeyCode::Enter => self.navigate(NavKey::Enter, now),
            KeyCode::Char('j') if ctrl && !alt => self.type_text(ChatComposer::insert_newline),
            KeyCode::Char('a') if ctrl && !alt => self.composer.move_home(),
            KeyCode::Char('e') if ctrl && !alt => self.composer.move_end(),
            _ if ctrl || alt => false,
            KeyCode::Up => self.navigate(NavKey::Up, now),
            KeyCode::Down => self.navigate(NavKey::Down, now),
            KeyCode::Esc => self.navigate(NavKey::Escape, now),
            KeyCode::Char(ch) => self.type_text(|composer| composer.insert_char(ch)),
            KeyCode::Backspace => self.delete_text(ChatComposer::backspace),
            KeyCode::Delete => self.delete_text(ChatComposer::delete_forward),
            KeyCode::Left => self.composer.move_left(),
            KeyCode::Right => self.composer.move_right(),
            KeyCode::Home => self.composer.move_home(),
            KeyCode::End => self.composer.move_end(),
            _ => false,
        };

        KeyOutcome::Handled {
            redraw: redraw || handled,
        }
    }

    pub fn handle_paste(&mut self, pasted: String) -> bool {
        if self.is_ended() {
            return false;
        }
        self.composer.clear_warning();
        self.type_text(|composer| composer.handle_paste(pasted))
    }

    /// Input focus returned to the composer.
    pub fn handle_focus_gained(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        let before = self.navigator.selection();
        self.navigator.handle(NavKey::Focus, self.timeline.len());
        before != self.navigator.selection()
    }

    /// Pointer activation on the message at `index`: select it and toggle its expansion.
    pub fn activate_message(&mut self, index: usize) -> bool {
        if self.is_ended() {
            return false;
        }
        if let Some(message) = self.timeline.get(index) {
            tracing::trace!(index, sender = %message.sender, "message activated");
        }
        let effect = self.navigator.activate(index, self.timeline.len());
        self.apply_effect(effect, Instant::now())
    }

    /// Explicit send action, independent of the current selection.
    pub fn send(&mut self, now: Instant) -> SendOutcome {
        if self.is_ended() {
            return SendOutcome::Empty;
        }
        let Some(transport) = self.transport.clone() else {
            tracing::debug!(connection = ?self.connection, "send refused while offline");
            return SendOutcome::Offline;
        };
        match self.composer.submit(now) {
            SubmitOutcome::Empty => SendOutcome::Empty,
            SubmitOutcome::Throttled(cooldown) => {
                tracing::debug!(
                    remaining_ms = cooldown.remaining.as_millis() as u64,
                    last_send_at = ?self.composer.last_send_at(),
                    "send rejected by cooldown"
                );
                SendOutcome::Throttled {
                    remaining: cooldown.remaining,
                }
            }
            SubmitOutcome::Accepted(content) => {
                // The message shows up in the timeline when the transport echoes it back.
                transport.send_message(&content);
                self.messages_sent += 1;
                SendOutcome::Sent
            }
        }
    }

    fn navigate(&mut self, key: NavKey, now: Instant) -> bool {
        let before = self.navigator.selection();
        let effect = self.navigator.handle(key, self.timeline.len());
        let changed = before != self.navigator.selection();
        self.apply_effect(effect, now) || changed
    }

    fn apply_effect(&mut self, effect: NavEffect, now: Instant) -> bool {
        match effect {
            NavEffect::None => false,
            NavEffect::ToggleExpanded(index) => self.timeline.toggle_expanded(index).is_some(),
            NavEffect::Send => matches!(
                self.send(now),
                SendOutcome::Sent | SendOutcome::Throttled { .. }
            ),
        }
    }

    /// Runs a character-producing edit. Typing clears the selection even when the draft is full.
    fn type_text(&mut self, f: impl FnOnce(&mut ChatComposer) -> bool) -> bool {
        let before = self.navigator.selection();
        let edited = f(&mut self.composer);
        self.navigator.handle(NavKey::Typed, self.timeline.len());
        edited || before != self.navigator.selection()
    }

    /// Runs a deletion. Only a deletion that removed something clears the selection.
    fn delete_text(&mut self, f: impl FnOnce(&mut ChatComposer) -> bool) -> bool {
        if !f(&mut self.composer) {
            return false;
        }
        self.navigator.handle(NavKey::Typed, self.timeline.len());
        true
    }
}

fn spawn_message_forwarder(
    mut messages: MessageReceiver,
    app_event_tx: AppEventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = messages.recv() => message,
            };
            let Some(message) = message else {
                tracing::info!("message subscription closed by transport");
                break;
            };
            app_event_tx.send_unless_cancelled(&cancel, AppEvent::MessageReceived(message));
        }
        // Dropping `messages` here unsubscribes from the transport.
    })
}
