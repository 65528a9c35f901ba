//! The chat screen event loop.

use std::sync::Arc;
use std::time::Instant;

use crossterm::event::MouseButton;
use crossterm::event::MouseEvent;
use crossterm::event::MouseEventKind;
use hush_protocol::Transport;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;

use crate::app_event::AppEventSender;
use crate::chat_view::ChatView;
use crate::chat_view::ChatViewState;
use crate::connection::Connection;
use crate::connection::ConnectionStatus;
use crate::connection::SPINNER_INTERVAL;
use crate::exit::AppExitInfo;
use crate::exit::ExitReason;
use crate::presence::PRESENCE_POLL_INTERVAL;
use crate::session::ChatSession;
use crate::session::KeyOutcome;
use crate::tui::Tui;
use crate::tui::TuiEvent;

/// Runs the chat screen until the user quits or terminal input ends.
///
/// Terminal input, network setup and background events are handled one at a time on this task.
/// The session is ended before returning, which stops its background tasks.
pub async fn run_chat_with_tui<T: Transport>(
    tui: &mut Tui,
    username: String,
    mut connection: Connection<T>,
) -> anyhow::Result<AppExitInfo> {
    let (app_event_tx, mut app_event_rx) = unbounded_channel();
    let mut session = ChatSession::connecting(
        username,
        AppEventSender::new(app_event_tx),
        PRESENCE_POLL_INTERVAL,
    );
    apply_connection(&mut session, &connection);
    let mut view_state = ChatViewState::default();
    draw(tui, &session, &mut view_state)?;

    let events = tui.event_stream();
    tokio::pin!(events);
    let mut spinner = tokio::time::interval(SPINNER_INTERVAL);
    spinner.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit_reason = loop {
        let redraw = tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    break ExitReason::InputClosed;
                };
                match event {
                    TuiEvent::Key(key_event) => {
                        match session.handle_key_event(key_event, Instant::now()) {
                            KeyOutcome::Quit => break ExitReason::UserRequested,
                            KeyOutcome::Handled { redraw } => redraw,
                        }
                    }
                    TuiEvent::Paste(pasted) => session.handle_paste(pasted),
                    TuiEvent::Mouse(mouse_event) => {
                        handle_mouse(&mut session, &view_state, mouse_event)
                    }
                    TuiEvent::FocusGained => session.handle_focus_gained(),
                    TuiEvent::Draw => true,
                }
            }
            Some(app_event) = app_event_rx.recv() => session.handle_app_event(app_event),
            _ = connection.settle(), if connection.is_connecting() => {
                apply_connection(&mut session, &connection);
                true
            }
            _ = spinner.tick(), if connection.is_connecting() => {
                view_state.advance_spinner();
                true
            }
        };

        if redraw {
            draw(tui, &session, &mut view_state)?;
        }
    };

    session.end();
    tui.terminal.clear()?;

    Ok(AppExitInfo {
        username: session.username().to_string(),
        messages_received: session.timeline().len(),
        messages_sent: session.messages_sent(),
        exit_reason,
    })
}

/// Hands a settled connection to the session. Still connecting is a no-op.
fn apply_connection<T: Transport>(session: &mut ChatSession<T>, connection: &Connection<T>) {
    match (connection.status(), connection.transport()) {
        (ConnectionStatus::Connected, Some(transport)) => session.attach(Arc::clone(transport)),
        (ConnectionStatus::Failed(reason), _) => session.connection_failed(reason.clone()),
        _ => {}
    }
}

fn handle_mouse<T: Transport>(
    session: &mut ChatSession<T>,
    view_state: &ChatViewState,
    mouse_event: MouseEvent,
) -> bool {
    if mouse_event.kind != MouseEventKind::Down(MouseButton::Left) {
        return false;
    }
    match view_state.hit_test(mouse_event.column, mouse_event.row) {
        Some(index) => session.activate_message(index),
        None => false,
    }
}

fn draw<T: Transport>(
    tui: &mut Tui,
    session: &ChatSession<T>,
    view_state: &mut ChatViewState,
) -> anyhow::Result<()> {
    tui.draw(|frame| {
        frame.render_stateful_widget(ChatView::new(session), frame.area(), view_state);
        if let Some(position) = view_state.cursor_position() {
            frame.set_cursor_position(position);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_event::AppEvent;
    use crate::test_transport::RecordingTransport;
    use crossterm::event::KeyModifiers;
    use tokio::sync::oneshot;
    use hush_protocol::ChatMessage;
    use pretty_assertions::assert_eq;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn clicking_a_row_selects_and_expands_it() {
        let transport = Arc::new(RecordingTransport::new("me"));
        let mut session = ChatSession::new_detached(transport);
        for content in ["one", "two"] {
            session.handle_app_event(AppEvent::MessageReceived(ChatMessage::new(
                "peer", content, 0,
            )));
        }

        let mut view_state = ChatViewState::default();
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).expect("terminal");
        terminal
            .draw(|frame| {
                frame.render_stateful_widget(
                    ChatView::new(&session),
                    frame.area(),
                    &mut view_state,
                );
            })
            .expect("draw");

        assert!(handle_mouse(&mut session, &view_state, click(3, 4)));
        assert_eq!(session.selection().index(), Some(1));
        assert!(session.timeline().is_expanded(1));

        let mut release = click(3, 4);
        release.kind = MouseEventKind::Up(MouseButton::Left);
        assert!(!handle_mouse(&mut session, &view_state, release));
        assert!(!handle_mouse(&mut session, &view_state, click(3, 0)));
    }

    #[tokio::test]
    async fn settled_connection_attaches_or_reports_failure() {
        let (tx, _rx) = unbounded_channel();
        let mut session = ChatSession::<RecordingTransport>::connecting(
            "me",
            AppEventSender::new(tx),
            PRESENCE_POLL_INTERVAL,
        );

        let (result_tx, result_rx) = oneshot::channel();
        let mut connection = Connection::pending(result_rx);
        apply_connection(&mut session, &connection);
        assert_eq!(session.connection(), &ConnectionStatus::Connecting);

        let transport = RecordingTransport::new("");
        let _ = result_tx.send(Ok(transport));
        connection.settle().await;
        apply_connection(&mut session, &connection);
        assert_eq!(session.connection(), &ConnectionStatus::Connected);
        let transport = connection.transport().expect("transport");
        assert_eq!(transport.username(), "me");
        assert_eq!(transport.live_subscribers(), 1);

        let (tx, _rx) = unbounded_channel();
        let mut failed = ChatSession::<RecordingTransport>::connecting(
            "me",
            AppEventSender::new(tx),
            PRESENCE_POLL_INTERVAL,
        );
        let (result_tx, result_rx) = oneshot::channel();
        let mut connection = Connection::pending(result_rx);
        let _ = result_tx.send(Err(anyhow::anyhow!("no route to host")));
        connection.settle().await;
        apply_connection(&mut failed, &connection);
        assert_eq!(
            failed.connection(),
            &ConnectionStatus::Failed("no route to host".to_string())
        );
    }
}
