/// Summary produced when a chat session exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppExitInfo {
    /// Name the user chatted as.
    pub username: String,
    /// Messages received over the session, own echoes included.
    pub messages_received: usize,
    /// Messages accepted by the rate limiter and handed to the transport.
    pub messages_sent: usize,
    /// Why the session ended.
    pub exit_reason: ExitReason,
}

/// Reason why the chat session terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The user pressed Ctrl+C, or Ctrl+D on an empty composer.
    UserRequested,
    /// The terminal stopped delivering input.
    InputClosed,
}
