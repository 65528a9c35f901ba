// Forbid accidental stdout/stderr writes in the library portion of the TUI.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod exit;

mod app_event;
mod chat_app;
mod chat_view;
mod composer;
mod connection;
mod hush_tui;
mod navigation;
mod presence;
mod send_limiter;
mod session;
mod text_formatting;
mod timeline;
mod tui;
mod welcome;

#[cfg(test)]
mod test_transport;

pub use connection::Connection;
pub use connection::ConnectionStatus;
pub use exit::AppExitInfo;
pub use exit::ExitReason;
pub use hush_tui::HushTui;
pub use presence::PRESENCE_POLL_INTERVAL;
pub use send_limiter::SEND_COOLDOWN;
pub use welcome::USERNAME_CHAR_LIMIT;
pub use welcome::resolve_username;
