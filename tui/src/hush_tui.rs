use hush_protocol::Transport;

use crate::AppExitInfo;
use crate::connection::Connection;
use crate::tui;
use crate::tui::Tui;
use crate::welcome::WelcomeOutcome;

/// Hush terminal session wrapper:
/// - Collects the display name on the welcome screen while the network comes up
/// - Runs the chat screen against that connection
/// - Restores terminal state on Drop
pub struct HushTui {
    tui: Tui,
}

impl HushTui {
    /// Initialize the TUI (enter raw mode) and clear the screen.
    pub fn new() -> anyhow::Result<Self> {
        let mut terminal = tui::init()?;
        terminal.clear()?;
        Ok(Self {
            tui: Tui::new(terminal),
        })
    }

    /// Show the welcome screen, prefilled with `default_name`. `connection` keeps settling
    /// while the screen is up.
    ///
    /// Returns:
    /// - `Ok(Some(name))`: joined
    /// - `Ok(None)`: cancelled (Ctrl+C)
    pub async fn prompt_username<T>(
        &mut self,
        default_name: Option<&str>,
        connection: &mut Connection<T>,
    ) -> anyhow::Result<Option<String>> {
        let outcome =
            crate::welcome::run_welcome_with_tui(&mut self.tui, default_name, connection).await?;
        Ok(match outcome {
            WelcomeOutcome::Joined(name) => Some(name),
            WelcomeOutcome::Cancelled => None,
        })
    }

    /// Run the chat screen as `username` until the user quits.
    pub async fn run_chat<T: Transport>(
        &mut self,
        username: String,
        connection: Connection<T>,
    ) -> anyhow::Result<AppExitInfo> {
        crate::chat_app::run_chat_with_tui(&mut self.tui, username, connection).await
    }
}

impl Drop for HushTui {
    fn drop(&mut self) {
        // Always attempt to restore the terminal, even if the caller exits early.
        let _ = tui::restore();
    }
}
