/// Terminal drawing surface
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use scroll3d_core::{FrameBuffer, Surface, ViewerError, Viewport};
use std::io::{self, IsTerminal, Stdout, Write};

use crate::renderer::{AsciiRenderer, ROWS_PER_CELL};

/// Rows kept free below the picture for the status line
pub const STATUS_ROWS: u16 = 1;

/// Pixel viewport for a terminal of `cols` x `rows` character cells
pub fn viewport_for(cols: u16, rows: u16) -> Viewport {
    let rows = rows.saturating_sub(STATUS_ROWS) as u32;
    Viewport::new(cols as u32, rows * ROWS_PER_CELL as u32)
}

/// Draws frames as ASCII art in the alternate screen.
///
/// Acquiring puts the terminal in raw mode; releasing restores it.
pub struct TerminalSurface {
    out: Stdout,
    renderer: AsciiRenderer,
    bound: bool,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            renderer: AsciiRenderer::new(0, 0),
            bound: false,
        }
    }

    fn bind(&mut self) -> io::Result<Viewport> {
        let (cols, rows) = terminal::size()?;
        terminal::enable_raw_mode()?;
        execute!(self.out, terminal::EnterAlternateScreen, cursor::Hide)?;
        let viewport = viewport_for(cols, rows);
        self.fit(viewport);
        Ok(viewport)
    }

    fn fit(&mut self, viewport: Viewport) {
        self.renderer.resize(
            viewport.width as usize,
            viewport.height as usize / ROWS_PER_CELL,
        );
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn acquire(&mut self) -> Result<Viewport, ViewerError> {
        if self.bound {
            return Err(ViewerError::SurfaceUnavailable(
                "terminal already bound to a viewer".into(),
            ));
        }
        if !self.out.is_terminal() {
            return Err(ViewerError::SurfaceUnavailable(
                "stdout is not a terminal".into(),
            ));
        }
        match self.bind() {
            Ok(viewport) => {
                self.bound = true;
                Ok(viewport)
            }
            Err(e) => {
                let _ = terminal::disable_raw_mode();
                Err(ViewerError::SurfaceUnavailable(e.to_string()))
            }
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        self.fit(viewport);
        if let Err(e) = execute!(self.out, terminal::Clear(terminal::ClearType::All)) {
            log::warn!("failed to clear terminal after resize: {}", e);
        }
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), ViewerError> {
        self.renderer.rasterize(frame);
        let mut out = self.out.lock();
        self.renderer
            .draw(&mut out)
            .and_then(|_| out.flush())
            .map_err(|e| ViewerError::SurfaceUnavailable(e.to_string()))
    }

    fn release(&mut self) {
        if !self.bound {
            return;
        }
        self.bound = false;
        if let Err(e) = execute!(self.out, terminal::LeaveAlternateScreen, cursor::Show) {
            log::warn!("failed to leave alternate screen: {}", e);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Write `text` on the status row, clipped to the terminal width.
pub fn draw_status<W: Write>(out: &mut W, cols: u16, rows: u16, text: &str) -> io::Result<()> {
    let line: String = text.chars().take(cols as usize).collect();
    queue!(
        out,
        cursor::MoveTo(0, rows.saturating_sub(STATUS_ROWS)),
        terminal::Clear(terminal::ClearType::CurrentLine),
        SetForegroundColor(Color::Yellow),
        Print(line),
        ResetColor
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_reserves_status_row() {
        assert_eq!(viewport_for(80, 25), Viewport::new(80, 48));
        assert_eq!(viewport_for(80, 0), Viewport::new(80, 0));
    }

    #[test]
    fn test_status_is_clipped() {
        let mut out = Vec::new();
        draw_status(&mut out, 5, 10, "scroll3d status").unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("scrol"));
        assert!(!text.contains("scroll3d"));
    }

    #[test]
    fn test_unbound_release_is_noop() {
        let mut surface = TerminalSurface::new();
        surface.release();
        assert!(!surface.bound);
    }
}
