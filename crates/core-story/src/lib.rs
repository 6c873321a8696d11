//! Story settings and headline styles.
//!
//! A `StoryInfo` is the immutable bundle of settings one chyron/producer
//! pair is built from. It is assembled by whatever front end gathers the
//! user's choices, validated once, and then shared read-only; nothing in
//! the core mutates it after handoff.

pub mod persist;
pub mod styles;

pub use styles::{HeadlineStyle, StyleList};

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use core_types::{
    AgeEffects, AnimEntryType, AnimExitType, DisplayGeometry, EasingCurve, FixedText, FontSpec,
    Size,
};

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("dashboard entry types require a group id")]
    MissingDashboardGroup,
    #[error("group id \"{0}\" is only valid with a dashboard entry type")]
    UnexpectedDashboardGroup(String),
    #[error("story has no displayable dimensions")]
    NoDimensions,
}

/// Everything the core needs to know about one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryInfo {
    /// Source URL (local path or REST endpoint) as given by the user.
    pub story: String,
    /// Unique, restart-stable identity. Local files use the absolute path;
    /// REST stories append a reporter-specific disambiguator to the URL.
    pub identity: String,

    // Reporter
    pub reporter_beat: String,
    pub reporter_id: String,
    pub reporter_parameters: Vec<String>,

    // Notifications
    pub ttl: u64,

    // Display
    pub primary_display: usize,
    pub headlines_always_visible: bool,

    // Size
    pub interpret_as_pixels: bool,
    pub headlines_pixel_width: i32,
    pub headlines_pixel_height: i32,
    pub headlines_percent_width: f64,
    pub headlines_percent_height: f64,

    // Content shaping
    pub limit_content: bool,
    pub limit_content_to: usize,
    pub headlines_fixed_type: FixedText,

    // Extras
    pub include_progress_bar: bool,
    pub progress_text_re: String,
    pub progress_on_top: bool,

    // Animation
    pub entry_type: AnimEntryType,
    pub exit_type: AnimExitType,
    pub anim_motion_duration: u64,
    pub fade_target_duration: u64,

    // Train age effects
    pub train_use_age_effect: bool,
    pub train_age_effect: AgeEffects,
    pub train_age_percent: u8,

    // Dashboard
    pub dashboard_group_id: String,
    pub dashboard_compact_mode: bool,
    pub dashboard_compression: f64,

    // Chyron presentation
    pub margin: i32,
    pub font: FontSpec,
    pub motion_curve: EasingCurve,
    pub fading_curve: EasingCurve,
}

impl Default for StoryInfo {
    fn default() -> Self {
        Self {
            story: String::new(),
            identity: String::new(),
            reporter_beat: String::new(),
            reporter_id: String::new(),
            reporter_parameters: Vec::new(),
            ttl: 5,
            primary_display: 0,
            headlines_always_visible: true,
            interpret_as_pixels: true,
            headlines_pixel_width: 0,
            headlines_pixel_height: 0,
            headlines_percent_width: 0.0,
            headlines_percent_height: 0.0,
            limit_content: false,
            limit_content_to: 0,
            headlines_fixed_type: FixedText::None,
            include_progress_bar: false,
            progress_text_re: r"\s(\d+)%".to_string(),
            progress_on_top: false,
            entry_type: AnimEntryType::PopCenter,
            exit_type: AnimExitType::Pop,
            anim_motion_duration: 500,
            fade_target_duration: 500,
            train_use_age_effect: false,
            train_age_effect: AgeEffects::None,
            train_age_percent: 60,
            dashboard_group_id: String::new(),
            dashboard_compact_mode: false,
            dashboard_compression: 25.0,
            margin: 5,
            font: FontSpec::default(),
            motion_curve: EasingCurve::OutCubic,
            fading_curve: EasingCurve::InCubic,
        }
    }
}

impl StoryInfo {
    /// Dashboard group ids and dashboard entry types come and go together.
    pub fn validate(&self) -> Result<(), StoryError> {
        let is_dashboard = self.entry_type.is_dashboard();
        if is_dashboard && self.dashboard_group_id.is_empty() {
            return Err(StoryError::MissingDashboardGroup);
        }
        if !is_dashboard && !self.dashboard_group_id.is_empty() {
            return Err(StoryError::UnexpectedDashboardGroup(
                self.dashboard_group_id.clone(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured headline dimensions against the display the
    /// story targets.
    pub fn dimensions(&self, displays: &dyn DisplayGeometry) -> Size {
        if self.interpret_as_pixels {
            Size::new(self.headlines_pixel_width, self.headlines_pixel_height)
        } else {
            let display = displays.display_rect(self.primary_display);
            Size::new(
                ((self.headlines_percent_width / 100.0) * display.width as f64) as i32,
                ((self.headlines_percent_height / 100.0) * display.height as f64) as i32,
            )
        }
    }
}

/// Shared, read-only story settings as handed to chyron and producer.
pub type StoryInfoRef = Arc<StoryInfo>;

/// Resolve a story identity collision by appending a random hex suffix.
///
/// The suffix is derived from the wall clock hashed through the std hasher,
/// regenerated until the identity is unique among `existing`.
pub fn fix_identity_duplication(story_info: &mut StoryInfo, existing: &[String]) {
    if !existing.iter().any(|e| *e == story_info.identity) {
        return;
    }
    let base = story_info.identity.clone();
    let mut salt = 0u64;
    loop {
        let mut hasher = DefaultHasher::new();
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0)
            .hash(&mut hasher);
        base.hash(&mut hasher);
        salt.hash(&mut hasher);
        let candidate = format!("{}::{:x}", base, hasher.finish() as u32);
        if !existing.iter().any(|e| *e == candidate) {
            tracing::debug!(target: "story", original = %base, resolved = %candidate,
                "identity_collision_resolved");
            story_info.identity = candidate;
            return;
        }
        salt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{FixedDisplays, Rect};

    #[test]
    fn defaults_mirror_a_fresh_story() {
        let s = StoryInfo::default();
        assert_eq!(s.ttl, 5);
        assert_eq!(s.margin, 5);
        assert_eq!(s.entry_type, AnimEntryType::PopCenter);
        assert_eq!(s.exit_type, AnimExitType::Pop);
        assert_eq!(s.motion_curve, EasingCurve::OutCubic);
        assert_eq!(s.fading_curve, EasingCurve::InCubic);
        assert_eq!(s.progress_text_re, r"\s(\d+)%");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn dashboard_group_invariant() {
        let mut s = StoryInfo {
            entry_type: AnimEntryType::DashboardDownLeftTop,
            ..StoryInfo::default()
        };
        assert!(matches!(
            s.validate(),
            Err(StoryError::MissingDashboardGroup)
        ));
        s.dashboard_group_id = "alpha".into();
        assert!(s.validate().is_ok());

        s.entry_type = AnimEntryType::PopCenter;
        assert!(matches!(
            s.validate(),
            Err(StoryError::UnexpectedDashboardGroup(_))
        ));
    }

    #[test]
    fn percent_dimensions_scale_with_display() {
        let s = StoryInfo {
            interpret_as_pixels: false,
            headlines_percent_width: 50.0,
            headlines_percent_height: 10.0,
            ..StoryInfo::default()
        };
        let displays = FixedDisplays::single(Rect::new(0, 0, 1000, 500));
        assert_eq!(s.dimensions(&displays), Size::new(500, 50));
    }

    #[test]
    fn identity_collision_appends_suffix() {
        let mut s = StoryInfo {
            identity: "/var/log/build.log".into(),
            ..StoryInfo::default()
        };
        let existing = vec!["/var/log/build.log".to_string()];
        fix_identity_duplication(&mut s, &existing);
        assert_ne!(s.identity, "/var/log/build.log");
        assert!(s.identity.starts_with("/var/log/build.log::"));
    }

    #[test]
    fn identity_without_collision_is_untouched() {
        let mut s = StoryInfo {
            identity: "/var/log/build.log".into(),
            ..StoryInfo::default()
        };
        fix_identity_duplication(&mut s, &["/other".to_string()]);
        assert_eq!(s.identity, "/var/log/build.log");
    }
}
