//! Terminal lifecycle and the input event stream.

use std::io::Stdout;
use std::io::stdout;

use anyhow::Context as _;
use crossterm::event::DisableBracketedPaste;
use crossterm::event::DisableFocusChange;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableBracketedPaste;
use crossterm::event::EnableFocusChange;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyEvent;
use crossterm::event::MouseEvent;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Frame;
use ratatui::backend::CrosstermBackend;
use tokio_stream::Stream;
use tokio_stream::StreamExt;

pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Input as seen by the screens. Terminal resizes surface as [`TuiEvent::Draw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuiEvent {
    Key(KeyEvent),
    Paste(String),
    Mouse(MouseEvent),
    FocusGained,
    Draw,
}

/// Enters raw mode on the alternate screen with paste, focus and mouse reporting enabled.
pub fn init() -> anyhow::Result<Terminal> {
    enable_raw_mode().context("enable raw mode")?;
    set_panic_hook();
    execute!(
        stdout(),
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableFocusChange,
        EnableMouseCapture
    )
    .context("configure terminal modes")?;

    let terminal = ratatui::Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

/// Undoes [`init`]. Safe to call more than once.
pub fn restore() -> anyhow::Result<()> {
    execute!(
        stdout(),
        DisableMouseCapture,
        DisableFocusChange,
        DisableBracketedPaste,
        LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    disable_raw_mode()?;
    Ok(())
}

fn set_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        hook(panic_info);
    }));
}

pub struct Tui {
    pub terminal: Terminal,
}

impl Tui {
    pub fn new(terminal: Terminal) -> Self {
        Self { terminal }
    }

    /// A fresh stream of terminal input. Owns its crossterm reader, so dropping the stream stops
    /// reading stdin.
    pub fn event_stream(&self) -> impl Stream<Item = TuiEvent> + use<> {
        EventStream::new().filter_map(|event| match event {
            Ok(Event::Key(key_event)) => Some(TuiEvent::Key(key_event)),
            Ok(Event::Paste(pasted)) => Some(TuiEvent::Paste(pasted)),
            Ok(Event::Mouse(mouse_event)) => Some(TuiEvent::Mouse(mouse_event)),
            Ok(Event::FocusGained) => Some(TuiEvent::FocusGained),
            Ok(Event::Resize(_, _)) => Some(TuiEvent::Draw),
            Ok(Event::FocusLost) => None,
            Err(err) => {
                tracing::warn!("failed to read terminal event: {err}");
                None
            }
        })
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> anyhow::Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }
}
