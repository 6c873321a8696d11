//! Text measurement and the fixed-size fitting passes.
//!
//! Measurement goes through `FontMetrics` so the fitting logic is pure and
//! the tests never need a rasterizer. The default implementation scales
//! unicode display width by the font's point size, which tracks real
//! proportional fonts closely enough for layout decisions.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use core_types::FontSpec;

/// Point size below which ScaleToFit stops shrinking.
pub const MIN_POINT_SIZE: f32 = 6.0;
/// ScaleToFit shrink step in points.
pub const POINT_STEP: f32 = 0.1;

const ELLIPSIS: &str = "\u{2026}";

pub trait FontMetrics {
    /// Width in pixels of one line rendered at `font`.
    fn line_width(&self, line: &str, font: &FontSpec) -> i32;
    /// Height in pixels of one line at `font`.
    fn line_height(&self, font: &FontSpec) -> i32;
}

/// Point-size-proportional metrics over unicode display width.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaledMetrics;

impl ScaledMetrics {
    fn cell_width(font: &FontSpec) -> f32 {
        (font.point_size * 0.6).max(1.0)
    }
}

impl FontMetrics for ScaledMetrics {
    fn line_width(&self, line: &str, font: &FontSpec) -> i32 {
        (line.width() as f32 * Self::cell_width(font)).ceil() as i32
    }

    fn line_height(&self, font: &FontSpec) -> i32 {
        (font.point_size * 1.4).ceil().max(1.0) as i32
    }
}

/// Outcome of a fitting pass: the lines to draw and the font to draw them
/// with.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub lines: Vec<String>,
    pub font: FontSpec,
}

fn fits(metrics: &dyn FontMetrics, lines: &[String], font: &FontSpec, width: i32, height: i32) -> bool {
    let too_tall = metrics.line_height(font) * lines.len() as i32 > height;
    if too_tall {
        return false;
    }
    lines
        .iter()
        .all(|line| metrics.line_width(line, font) <= width)
}

/// Shrink the font in 0.1 pt steps until the widest line and the total
/// height fit, stopping at 6 pt and letting any remainder clip.
pub fn scale_to_fit(
    metrics: &dyn FontMetrics,
    text: &str,
    font: &FontSpec,
    width: i32,
    height: i32,
) -> FittedText {
    let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut font = font.clone();
    while !fits(metrics, &lines, &font, width, height) {
        if font.point_size - POINT_STEP < MIN_POINT_SIZE {
            break;
        }
        font.point_size -= POINT_STEP;
    }
    FittedText { lines, font }
}

/// Keep the font, elide each line to the width, and drop lines from the
/// bottom until the height fits.
pub fn clip_to_fit(
    metrics: &dyn FontMetrics,
    text: &str,
    font: &FontSpec,
    width: i32,
    height: i32,
) -> FittedText {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let line_height = metrics.line_height(font);
    while lines.len() > 1 && line_height * lines.len() as i32 > height {
        lines.pop();
    }
    let lines = lines
        .into_iter()
        .map(|line| elide(metrics, &line, font, width))
        .collect();
    FittedText {
        lines,
        font: font.clone(),
    }
}

/// Truncate `line` with a trailing ellipsis so it measures at most `width`.
pub fn elide(metrics: &dyn FontMetrics, line: &str, font: &FontSpec, width: i32) -> String {
    if metrics.line_width(line, font) <= width {
        return line.to_string();
    }
    let mut out = String::new();
    for grapheme in line.graphemes(true) {
        let candidate = format!("{out}{grapheme}{ELLIPSIS}");
        if metrics.line_width(&candidate, font) > width {
            break;
        }
        out.push_str(grapheme);
    }
    out.push_str(ELLIPSIS);
    out
}

/// Natural content size: widest line by total line height, margins included.
pub fn natural_size(
    metrics: &dyn FontMetrics,
    text: &str,
    font: &FontSpec,
    margin: i32,
) -> core_types::Size {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines
        .iter()
        .map(|line| metrics.line_width(line, font))
        .max()
        .unwrap_or(0);
    let height = metrics.line_height(font) * lines.len() as i32;
    core_types::Size::new(width + margin * 2, height + margin * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(pt: f32) -> FontSpec {
        FontSpec::new("Sans", pt)
    }

    #[test]
    fn scale_to_fit_shrinks_until_it_fits() {
        let m = ScaledMetrics;
        let wide = "a very long headline that cannot possibly fit";
        let fitted = scale_to_fit(&m, wide, &font(20.0), 120, 40);
        assert!(fitted.font.point_size < 20.0);
        assert!(
            m.line_width(&fitted.lines[0], &fitted.font) <= 120
                || (fitted.font.point_size - MIN_POINT_SIZE) < POINT_STEP
        );
    }

    #[test]
    fn scale_to_fit_stops_at_floor() {
        let m = ScaledMetrics;
        let fitted = scale_to_fit(&m, &"x".repeat(500), &font(20.0), 30, 10);
        assert!(fitted.font.point_size >= MIN_POINT_SIZE - POINT_STEP);
        assert!(fitted.font.point_size < MIN_POINT_SIZE + POINT_STEP);
    }

    #[test]
    fn text_that_fits_keeps_its_font() {
        let m = ScaledMetrics;
        let fitted = scale_to_fit(&m, "ok", &font(12.0), 500, 100);
        assert_eq!(fitted.font.point_size, 12.0);
    }

    #[test]
    fn clip_to_fit_drops_lines_from_the_bottom() {
        let m = ScaledMetrics;
        let text = "one\ntwo\nthree\nfour\nfive";
        let line_height = m.line_height(&font(10.0));
        let fitted = clip_to_fit(&m, text, &font(10.0), 500, line_height * 2);
        assert_eq!(fitted.lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn clip_to_fit_elides_wide_lines() {
        let m = ScaledMetrics;
        let fitted = clip_to_fit(&m, &"wide".repeat(40), &font(10.0), 60, 100);
        assert!(fitted.lines[0].ends_with('\u{2026}'));
        assert!(m.line_width(&fitted.lines[0], &font(10.0)) <= 60);
    }

    #[test]
    fn clip_keeps_at_least_one_line() {
        let m = ScaledMetrics;
        let fitted = clip_to_fit(&m, "a\nb", &font(10.0), 100, 1);
        assert_eq!(fitted.lines.len(), 1);
    }

    #[test]
    fn natural_size_tracks_widest_line() {
        let m = ScaledMetrics;
        let size = natural_size(&m, "short\na much longer line", &font(10.0), 5);
        assert_eq!(
            size.width,
            m.line_width("a much longer line", &font(10.0)) + 10
        );
        assert_eq!(size.height, m.line_height(&font(10.0)) * 2 + 10);
    }
}
