//! Progress-bar extraction and placement.
//!
//! The configured regex runs over the headline's plain text; capture group 1
//! is the percentage. The bar spans the content width, 5 px high at the
//! bottom (or top), except in compact mode where it fills the whole rect.

use regex::Regex;

use core_types::{Rect, Size};

/// Bar thickness outside compact mode.
pub const BAR_HEIGHT: i32 = 5;

/// Placement and fill for one progress bar, in headline-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPaint {
    pub rect: Rect,
    /// Fill fraction in `[0, 1]`.
    pub fraction: f64,
}

/// Extract the percentage from `text`, clamped to `[0, 100]`, as a fraction.
pub fn extract_progress(text: &str, re: &Regex) -> Option<f64> {
    let caps = re.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) / 100.0)
}

/// Compute the bar rectangle for a headline of `size` with `margin`.
pub fn bar_rect(size: Size, margin: i32, on_top: bool, compact: bool) -> Rect {
    if compact {
        return Rect::new(
            margin,
            margin,
            size.width - margin * 2 - 1,
            size.height - margin * 2 - 1,
        );
    }
    let y = if on_top {
        BAR_HEIGHT
    } else {
        size.height - BAR_HEIGHT - margin
    };
    Rect::new(margin, y, size.width - margin * 2 - 1, BAR_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_re() -> Regex {
        Regex::new(r"\s(\d+)%").unwrap()
    }

    #[test]
    fn extracts_percentage_from_build_text() {
        let f = extract_progress("Building ... 37% complete", &default_re()).unwrap();
        assert!((f - 0.37).abs() < 1e-9);
    }

    #[test]
    fn no_match_yields_none() {
        assert_eq!(extract_progress("idle", &default_re()), None);
    }

    #[test]
    fn over_100_clamps() {
        let f = extract_progress("done 250% over", &default_re()).unwrap();
        assert_eq!(f, 1.0);
    }

    #[test]
    fn bar_sits_at_the_bottom_by_default() {
        let r = bar_rect(Size::new(200, 50), 5, false, false);
        assert_eq!(r, Rect::new(5, 50 - BAR_HEIGHT - 5, 189, BAR_HEIGHT));
    }

    #[test]
    fn bar_moves_to_the_top_on_request() {
        let r = bar_rect(Size::new(200, 50), 5, true, false);
        assert_eq!(r.y, BAR_HEIGHT);
    }

    #[test]
    fn compact_bar_fills_the_widget() {
        let r = bar_rect(Size::new(200, 50), 5, false, true);
        assert_eq!(r, Rect::new(5, 5, 189, 39));
    }
}
