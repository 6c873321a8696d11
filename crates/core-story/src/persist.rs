//! Story and style persistence into the settings document.
//!
//! Stories live in a root-level "Stories" array, styles in a
//! "HeadlineStyles" array. Enum-valued settings are stored under their
//! variant names so the document stays diffable by hand.

use serde::Serialize;
use serde::de::DeserializeOwned;

use core_settings::{Document, Value};
use core_types::FontSpec;

use crate::styles::{HeadlineStyle, StyleList};
use crate::StoryInfo;

const STORIES_ARRAY: &str = "Stories";
const STYLES_ARRAY: &str = "HeadlineStyles";

fn enum_value<T: Serialize>(v: &T) -> Value {
    let name = serde_json::to_value(v)
        .ok()
        .and_then(|j| j.as_str().map(str::to_string))
        .unwrap_or_default();
    Value::String(name)
}

fn enum_from<T: DeserializeOwned>(value: &Value, default: T) -> T {
    value
        .as_str()
        .and_then(|s| serde_json::from_value(serde_json::Value::String(s.to_string())).ok())
        .unwrap_or(default)
}

/// Write every story to the document, replacing the previous array.
pub fn save_stories(doc: &mut Document, stories: &[StoryInfo]) {
    for (index, story) in stories.iter().enumerate() {
        save_story_element(doc, index, story);
    }
}

fn save_story_element(doc: &mut Document, index: usize, s: &StoryInfo) {
    let mut set = |name: &str, value: Value| doc.set_array_item(STORIES_ARRAY, index, name, value);
    set("story", s.story.as_str().into());
    set("identity", s.identity.as_str().into());
    set("reporter_beat", s.reporter_beat.as_str().into());
    set("reporter_id", s.reporter_id.as_str().into());
    set(
        "reporter_parameters",
        Value::StringList(s.reporter_parameters.clone()),
    );
    set("ttl", (s.ttl as i64).into());
    set("primary_display", (s.primary_display as i64).into());
    set("always_visible", s.headlines_always_visible.into());
    set("interpret_as_pixels", s.interpret_as_pixels.into());
    set("pixel_width", (s.headlines_pixel_width as i64).into());
    set("pixel_height", (s.headlines_pixel_height as i64).into());
    set("percent_width", s.headlines_percent_width.into());
    set("percent_height", s.headlines_percent_height.into());
    set("limit_content", s.limit_content.into());
    set("limit_content_to", (s.limit_content_to as i64).into());
    set("fixed_text", enum_value(&s.headlines_fixed_type));
    set("include_progress_bar", s.include_progress_bar.into());
    set("progress_text_re", s.progress_text_re.as_str().into());
    set("progress_on_top", s.progress_on_top.into());
    set("entry_type", enum_value(&s.entry_type));
    set("exit_type", enum_value(&s.exit_type));
    set("motion_duration", (s.anim_motion_duration as i64).into());
    set("fade_duration", (s.fade_target_duration as i64).into());
    set("train_use_age_effect", s.train_use_age_effect.into());
    set("train_age_effect", enum_value(&s.train_age_effect));
    set("train_age_percent", (s.train_age_percent as i64).into());
    set("dashboard_group", s.dashboard_group_id.as_str().into());
    set("dashboard_compact_mode", s.dashboard_compact_mode.into());
    set("dashboard_compression", s.dashboard_compression.into());
    set("margin", (s.margin as i64).into());
    set("font_family", s.font.family.as_str().into());
    set("font_point_size", (s.font.point_size as f64).into());
    set("motion_curve", enum_value(&s.motion_curve));
    set("fading_curve", enum_value(&s.fading_curve));
}

/// Read the stories array back. Items missing from older documents fall
/// back to `StoryInfo` defaults.
pub fn load_stories(doc: &Document, count: usize) -> Vec<StoryInfo> {
    (0..count).map(|i| load_story_element(doc, i)).collect()
}

/// Number of persisted stories, for pairing with [`load_stories`].
pub fn story_count(doc: &mut Document) -> usize {
    let count = doc.begin_array(STORIES_ARRAY);
    doc.end_array();
    count
}

fn load_story_element(doc: &Document, index: usize) -> StoryInfo {
    let d = StoryInfo::default();
    let get = |name: &str, default: Value| doc.get_array_item(STORIES_ARRAY, index, name, default);
    let get_str = |name: &str, default: &str| {
        get(name, Value::String(default.to_string()))
            .as_str()
            .unwrap_or(default)
            .to_string()
    };
    let get_i64 = |name: &str, default: i64| {
        get(name, Value::Integer(default))
            .as_integer()
            .unwrap_or(default)
    };
    let get_f64 = |name: &str, default: f64| {
        get(name, Value::Double(default))
            .as_double()
            .unwrap_or(default)
    };
    let get_bool = |name: &str, default: bool| {
        get(name, Value::Bool(default)).as_bool().unwrap_or(default)
    };

    StoryInfo {
        story: get_str("story", &d.story),
        identity: get_str("identity", &d.identity),
        reporter_beat: get_str("reporter_beat", &d.reporter_beat),
        reporter_id: get_str("reporter_id", &d.reporter_id),
        reporter_parameters: get(
            "reporter_parameters",
            Value::StringList(Vec::new()),
        )
        .as_string_list()
        .map(<[String]>::to_vec)
        .unwrap_or_default(),
        ttl: get_i64("ttl", d.ttl as i64).max(0) as u64,
        primary_display: get_i64("primary_display", 0).max(0) as usize,
        headlines_always_visible: get_bool("always_visible", d.headlines_always_visible),
        interpret_as_pixels: get_bool("interpret_as_pixels", d.interpret_as_pixels),
        headlines_pixel_width: get_i64("pixel_width", 0) as i32,
        headlines_pixel_height: get_i64("pixel_height", 0) as i32,
        headlines_percent_width: get_f64("percent_width", 0.0),
        headlines_percent_height: get_f64("percent_height", 0.0),
        limit_content: get_bool("limit_content", d.limit_content),
        limit_content_to: get_i64("limit_content_to", 0).max(0) as usize,
        headlines_fixed_type: enum_from(
            &get("fixed_text", enum_value(&d.headlines_fixed_type)),
            d.headlines_fixed_type,
        ),
        include_progress_bar: get_bool("include_progress_bar", d.include_progress_bar),
        progress_text_re: get_str("progress_text_re", &d.progress_text_re),
        progress_on_top: get_bool("progress_on_top", d.progress_on_top),
        entry_type: enum_from(&get("entry_type", enum_value(&d.entry_type)), d.entry_type),
        exit_type: enum_from(&get("exit_type", enum_value(&d.exit_type)), d.exit_type),
        anim_motion_duration: get_i64("motion_duration", d.anim_motion_duration as i64).max(0)
            as u64,
        fade_target_duration: get_i64("fade_duration", d.fade_target_duration as i64).max(0)
            as u64,
        train_use_age_effect: get_bool("train_use_age_effect", d.train_use_age_effect),
        train_age_effect: enum_from(
            &get("train_age_effect", enum_value(&d.train_age_effect)),
            d.train_age_effect,
        ),
        train_age_percent: get_i64("train_age_percent", d.train_age_percent as i64)
            .clamp(0, 100) as u8,
        dashboard_group_id: get_str("dashboard_group", &d.dashboard_group_id),
        dashboard_compact_mode: get_bool("dashboard_compact_mode", d.dashboard_compact_mode),
        dashboard_compression: get_f64("dashboard_compression", d.dashboard_compression),
        margin: get_i64("margin", d.margin as i64) as i32,
        font: FontSpec {
            family: get_str("font_family", &d.font.family),
            point_size: get_f64("font_point_size", d.font.point_size as f64) as f32,
        },
        motion_curve: enum_from(
            &get("motion_curve", enum_value(&d.motion_curve)),
            d.motion_curve,
        ),
        fading_curve: enum_from(
            &get("fading_curve", enum_value(&d.fading_curve)),
            d.fading_curve,
        ),
    }
}

/// Persist the style list (Default included, at index 0).
pub fn save_styles(doc: &mut Document, styles: &StyleList) {
    for (index, style) in styles.styles().iter().enumerate() {
        doc.set_array_item(STYLES_ARRAY, index, "name", style.name.as_str().into());
        doc.set_array_item(
            STYLES_ARRAY,
            index,
            "triggers",
            Value::StringList(style.triggers.clone()),
        );
        doc.set_array_item(
            STYLES_ARRAY,
            index,
            "stylesheet",
            style.stylesheet.as_str().into(),
        );
    }
}

pub fn load_styles(doc: &mut Document, default_stylesheet: &str) -> StyleList {
    let count = doc.begin_array(STYLES_ARRAY);
    doc.end_array();
    let mut persisted = Vec::with_capacity(count);
    for index in 0..count {
        let name = doc
            .get_array_item(STYLES_ARRAY, index, "name", Value::String(String::new()))
            .as_str()
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            continue;
        }
        persisted.push(HeadlineStyle {
            name,
            triggers: doc
                .get_array_item(STYLES_ARRAY, index, "triggers", Value::StringList(Vec::new()))
                .as_string_list()
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            stylesheet: doc
                .get_array_item(
                    STYLES_ARRAY,
                    index,
                    "stylesheet",
                    Value::String(String::new()),
                )
                .as_str()
                .unwrap_or_default()
                .to_string(),
        });
    }
    StyleList::from_persisted(persisted, default_stylesheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AgeEffects, AnimEntryType, AnimExitType, EasingCurve, FixedText};

    fn sample_story() -> StoryInfo {
        StoryInfo {
            story: "file:///var/log/build.log".into(),
            identity: "/var/log/build.log".into(),
            reporter_beat: "Local".into(),
            reporter_id: "{F1949758-2A08-4E8A-8290-90DCD270A8B9}".into(),
            reporter_parameters: vec!["0".into(), "4".into(), "0".into()],
            ttl: 12,
            primary_display: 1,
            interpret_as_pixels: false,
            headlines_percent_width: 25.0,
            headlines_percent_height: 8.0,
            limit_content: true,
            limit_content_to: 4,
            headlines_fixed_type: FixedText::ScaleToFit,
            include_progress_bar: true,
            progress_on_top: true,
            entry_type: AnimEntryType::TrainDownCenterTop,
            exit_type: AnimExitType::SlideFadeLeft,
            anim_motion_duration: 750,
            train_use_age_effect: true,
            train_age_effect: AgeEffects::ReduceOpacityByAge,
            train_age_percent: 40,
            margin: 8,
            motion_curve: EasingCurve::InOutSine,
            ..StoryInfo::default()
        }
    }

    #[test]
    fn story_round_trip_is_identity() {
        let mut doc = Document::new("newsroom");
        let stories = vec![sample_story(), StoryInfo::default()];
        save_stories(&mut doc, &stories);
        let count = story_count(&mut doc);
        assert_eq!(count, 2);
        let loaded = load_stories(&doc, count);
        assert_eq!(loaded, stories);
    }

    #[test]
    fn missing_items_fall_back_to_defaults() {
        let mut doc = Document::new("newsroom");
        doc.set_array_item(STORIES_ARRAY, 0, "identity", Value::String("only".into()));
        let loaded = load_stories(&doc, 1);
        assert_eq!(loaded[0].identity, "only");
        assert_eq!(loaded[0].ttl, StoryInfo::default().ttl);
        assert_eq!(loaded[0].entry_type, AnimEntryType::PopCenter);
    }

    #[test]
    fn styles_round_trip_preserves_order() {
        let mut doc = Document::new("newsroom");
        let mut styles = StyleList::new("color: white");
        styles.upsert(HeadlineStyle {
            name: "Alert".into(),
            triggers: vec!["error".into()],
            stylesheet: "color: red".into(),
        });
        styles.upsert(HeadlineStyle {
            name: "Calm".into(),
            triggers: vec!["success".into()],
            stylesheet: "color: green".into(),
        });
        save_styles(&mut doc, &styles);
        let loaded = load_styles(&mut doc, "color: white");
        assert_eq!(loaded, styles);
    }
}
