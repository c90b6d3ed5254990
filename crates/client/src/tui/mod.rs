mod arena;
mod screens;

use std::io;

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;

pub use arena::pointer_in_arena;
pub use screens::View;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    key_release_events: bool,
    arena: Rect,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;

        // Release events only arrive when the terminal speaks the kitty protocol.
        let key_release_events = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if key_release_events {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        } else {
            log::warn!("Terminal does not report key releases; press space to stop moving");
        }

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            key_release_events,
            arena: Rect::default(),
        })
    }

    /// Screen area the arena occupied on the last draw.
    pub fn arena(&self) -> Rect {
        self.arena
    }

    pub fn draw(&mut self, view: &View) -> io::Result<()> {
        let mut arena = self.arena;
        self.terminal.draw(|frame| {
            arena = screens::render(frame, view);
        })?;
        self.arena = arena;
        Ok(())
    }

    fn restore_terminal(&mut self) -> io::Result<()> {
        if self.key_release_events {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            cursor::Show
        )?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}
