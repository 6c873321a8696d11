//! A single displayable notification and its presentation state.
//!
//! `Headline` owns the visible text, style payload, geometry, and opacity
//! of one notification. `initialize` runs once when the owning chyron takes
//! the headline on screen: it picks window stacking, applies the fixed-size
//! fitting policy, and freezes the display lines. Painting is expressed as
//! a data-only `HeadlinePaint` spec so the surface backend (or a test) can
//! render it however it likes.

pub mod fit;
pub mod progress;

use regex::Regex;

use core_types::{FixedText, FontSpec, Rect, Size};

use fit::{FittedText, FontMetrics, clip_to_fit, natural_size, scale_to_fit};
use progress::{ProgressPaint, bar_rect, extract_progress};

/// Window stacking for a headline's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    /// Stays above normal windows ("always visible" stories).
    TopMost,
    /// Stays glued to the desktop, under everything else.
    BottomMost,
}

/// Progress-bar configuration carried by headlines of stories that asked
/// for one.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub regex: Regex,
    pub on_top: bool,
}

#[derive(Debug, Clone)]
pub struct Headline {
    /// Identity of the story this headline belongs to.
    pub story: String,
    pub text: String,
    /// Opaque styling payload selected by the producer.
    pub stylesheet: String,
    pub font: FontSpec,
    pub margin: i32,
    pub progress: Option<ProgressConfig>,
    pub geometry: Rect,
    /// The reporter paints this headline itself.
    pub reporter_draw: bool,
    pub opacity: f64,
    /// Creation timestamp, desk clock milliseconds.
    pub created: u64,
    /// When the entry animation finished; 0 until then.
    pub viewed: u64,
    /// Train-displaced headlines stop aging.
    pub ignore: bool,
    /// Dashboard compact mode (affects progress-bar placement).
    pub compact_mode: bool,

    z_order: ZOrder,
    display_lines: Vec<String>,
    initialized: bool,
}

impl Headline {
    pub fn new(story: impl Into<String>, text: impl Into<String>, created: u64) -> Self {
        Self {
            story: story.into(),
            text: text.into(),
            stylesheet: String::new(),
            font: FontSpec::default(),
            margin: 5,
            progress: None,
            geometry: Rect::default(),
            reporter_draw: false,
            opacity: 1.0,
            created,
            viewed: 0,
            ignore: false,
            compact_mode: false,
            z_order: ZOrder::TopMost,
            display_lines: Vec::new(),
            initialized: false,
        }
    }

    pub fn z_order(&self) -> ZOrder {
        self.z_order
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn display_lines(&self) -> &[String] {
        &self.display_lines
    }

    /// Prepare the headline for display.
    ///
    /// With `size = None` the headline adopts its natural content size and
    /// the fixed-text policy does not apply. With a fixed size, ScaleToFit
    /// shrinks the font and ClipToFit elides and truncates; either way the
    /// geometry adopts the given size at the current position.
    pub fn initialize(
        &mut self,
        always_visible: bool,
        fixed_text: FixedText,
        size: Option<Size>,
        metrics: &dyn FontMetrics,
    ) {
        self.z_order = if always_visible {
            ZOrder::TopMost
        } else {
            ZOrder::BottomMost
        };

        match size {
            None => {
                let natural = natural_size(metrics, &self.text, &self.font, self.margin);
                self.geometry.width = natural.width;
                self.geometry.height = natural.height;
                self.display_lines = self.text.split('\n').map(str::to_string).collect();
            }
            Some(size) => {
                let inner_width = (size.width - self.margin * 2).max(1);
                let inner_height = (size.height - self.margin * 2).max(1);
                let FittedText { lines, font } = match fixed_text {
                    FixedText::ScaleToFit => {
                        scale_to_fit(metrics, &self.text, &self.font, inner_width, inner_height)
                    }
                    FixedText::ClipToFit => {
                        clip_to_fit(metrics, &self.text, &self.font, inner_width, inner_height)
                    }
                    FixedText::None => FittedText {
                        lines: self.text.split('\n').map(str::to_string).collect(),
                        font: self.font.clone(),
                    },
                };
                self.display_lines = lines;
                self.font = font;
                self.geometry.width = size.width;
                self.geometry.height = size.height;
            }
        }
        tracing::trace!(target: "headline",
            lines = self.display_lines.len(), point_size = self.font.point_size,
            "initialized");
        self.initialized = true;
    }

    /// Replace the text of an already-posted headline (reporter-draw
    /// refreshes); display lines follow without re-fitting geometry.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.display_lines = self.text.split('\n').map(str::to_string).collect();
    }

    /// Compute the current progress overlay, if configured and present in
    /// the text.
    pub fn progress_paint(&self) -> Option<ProgressPaint> {
        let config = self.progress.as_ref()?;
        let fraction = extract_progress(&self.text, &config.regex)?;
        Some(ProgressPaint {
            rect: bar_rect(
                self.geometry.size(),
                self.margin,
                config.on_top,
                self.compact_mode,
            ),
            fraction,
        })
    }

    /// Snapshot everything a surface needs to draw this headline.
    pub fn paint(&self) -> HeadlinePaint {
        HeadlinePaint {
            rect: self.geometry,
            opacity: self.opacity,
            z_order: self.z_order,
            stylesheet: self.stylesheet.clone(),
            font: self.font.clone(),
            lines: self.display_lines.clone(),
            progress: self.progress_paint(),
            reporter_draw: self.reporter_draw,
        }
    }
}

/// Data-only paint instruction for one headline.
#[derive(Debug, Clone)]
pub struct HeadlinePaint {
    pub rect: Rect,
    pub opacity: f64,
    pub z_order: ZOrder,
    pub stylesheet: String,
    pub font: FontSpec,
    pub lines: Vec<String>,
    pub progress: Option<ProgressPaint>,
    pub reporter_draw: bool,
}
