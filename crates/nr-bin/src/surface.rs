//! Terminal display surface.
//!
//! Paints `HeadlinePaint` specs onto the terminal with crossterm, mapping
//! the logical display rectangle onto the available cells. This is the
//! demonstration surface; the paint specs themselves are backend-neutral.

use std::io::{Stdout, Write, stdout};

use anyhow::Result;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{cursor, event, execute, queue};

use core_headline::HeadlinePaint;
use core_types::{Point, Rect};

pub struct TerminalSurface {
    out: Stdout,
    logical: Rect,
    cols: u16,
    rows: u16,
}

impl TerminalSurface {
    pub fn new(logical: Rect) -> Result<Self> {
        let mut out = stdout();
        enable_raw_mode()?;
        execute!(
            out,
            EnterAlternateScreen,
            event::EnableMouseCapture,
            cursor::Hide
        )?;
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(Self {
            out,
            logical,
            cols,
            rows,
        })
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
    }

    /// Map a terminal cell to logical display coordinates.
    pub fn cell_to_logical(&self, col: u16, row: u16) -> Point {
        let x = col as i64 * self.logical.width as i64 / self.cols.max(1) as i64;
        let y = row as i64 * self.logical.height as i64 / self.rows.max(1) as i64;
        Point::new(
            self.logical.x + x as i32,
            self.logical.y + y as i32,
        )
    }

    fn logical_to_cell(&self, point: Point) -> (u16, u16) {
        let col = (point.x - self.logical.x) as i64 * self.cols as i64
            / self.logical.width.max(1) as i64;
        let row = (point.y - self.logical.y) as i64 * self.rows as i64
            / self.logical.height.max(1) as i64;
        (
            col.clamp(0, self.cols.saturating_sub(1) as i64) as u16,
            row.clamp(0, self.rows.saturating_sub(1) as i64) as u16,
        )
    }

    pub fn render(&mut self, paints: &[HeadlinePaint]) -> Result<()> {
        queue!(self.out, Clear(ClearType::All))?;
        for paint in paints {
            self.render_one(paint)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn render_one(&mut self, paint: &HeadlinePaint) -> Result<()> {
        // cull anything fully off the logical display
        let display = self.logical;
        if paint.rect.right() < display.left()
            || paint.rect.left() > display.right()
            || paint.rect.bottom() < display.top()
            || paint.rect.top() > display.bottom()
        {
            return Ok(());
        }
        let (col0, row0) = self.logical_to_cell(paint.rect.top_left());
        let (col1, row1) =
            self.logical_to_cell(Point::new(paint.rect.right(), paint.rect.bottom()));
        let width = (col1.saturating_sub(col0)).max(2) as usize;
        let height = (row1.saturating_sub(row0)).max(1);

        if paint.opacity < 0.99 {
            queue!(self.out, SetAttribute(Attribute::Dim))?;
        }
        queue!(self.out, SetForegroundColor(stylesheet_color(&paint.stylesheet)))?;

        for line in 0..height {
            let row = row0 + line;
            if row >= self.rows {
                break;
            }
            let text = if line == 0 {
                paint.lines.first().map(String::as_str).unwrap_or("")
            } else {
                paint
                    .lines
                    .get(line as usize)
                    .map(String::as_str)
                    .unwrap_or("")
            };
            let mut cell_line: String = text.chars().take(width).collect();
            if let Some(progress) = paint.progress
                && line + 1 == height
            {
                let filled = ((width as f64) * progress.fraction) as usize;
                cell_line = format!(
                    "{}{}",
                    "\u{2588}".repeat(filled),
                    "\u{2591}".repeat(width.saturating_sub(filled))
                );
            }
            queue!(
                self.out,
                cursor::MoveTo(col0, row),
                Print(cell_line)
            )?;
        }
        queue!(self.out, ResetColor, SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            cursor::Show,
            event::DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = disable_raw_mode();
    }
}

/// Minimal stylesheet interpretation: the first `color:` directive (not
/// `background-color:`) picks the foreground.
fn stylesheet_color(stylesheet: &str) -> Color {
    let bytes = stylesheet.as_bytes();
    let mut search = 0;
    let idx = loop {
        let Some(i) = stylesheet[search..].find("color:") else {
            return Color::Reset;
        };
        let abs = search + i;
        let preceded = abs > 0 && (bytes[abs - 1] == b'-' || bytes[abs - 1].is_ascii_alphanumeric());
        if !preceded {
            break abs;
        }
        search = abs + "color:".len();
    };
    let value = stylesheet[idx + "color:".len()..]
        .split(&[';', '}'][..])
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match value.as_str() {
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "black" => Color::Black,
        "gray" | "grey" => Color::Grey,
        _ => Color::Reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_color_picks_the_foreground_directive() {
        assert_eq!(
            stylesheet_color("color: red; background-color: black"),
            Color::Red
        );
        assert_eq!(
            stylesheet_color("background-color: black; color: green"),
            Color::Green
        );
        assert_eq!(stylesheet_color("background-color: black"), Color::Reset);
        assert_eq!(stylesheet_color("font-weight: bold"), Color::Reset);
        assert_eq!(stylesheet_color("color: chartreuse"), Color::Reset);
    }
}
