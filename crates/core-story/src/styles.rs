//! Headline styles.
//!
//! A style is a named stylesheet payload plus the trigger substrings that
//! select it. The list is ordered; the "Default" style is always present,
//! always first, and cannot be removed.

use serde::{Deserialize, Serialize};

pub const DEFAULT_STYLE: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlineStyle {
    pub name: String,
    pub triggers: Vec<String>,
    /// Opaque styling payload handed to the surface (CSS-like string).
    pub stylesheet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleList {
    styles: Vec<HeadlineStyle>,
}

impl StyleList {
    pub fn new(default_stylesheet: impl Into<String>) -> Self {
        Self {
            styles: vec![HeadlineStyle {
                name: DEFAULT_STYLE.to_string(),
                triggers: Vec::new(),
                stylesheet: default_stylesheet.into(),
            }],
        }
    }

    pub fn styles(&self) -> &[HeadlineStyle] {
        &self.styles
    }

    pub fn default_style(&self) -> &HeadlineStyle {
        &self.styles[0]
    }

    pub fn find(&self, name: &str) -> Option<&HeadlineStyle> {
        self.styles.iter().find(|s| s.name == name)
    }

    /// Append or update a style. Updating "Default" replaces its stylesheet
    /// but never its position or triggers.
    pub fn upsert(&mut self, style: HeadlineStyle) {
        if style.name == DEFAULT_STYLE {
            self.styles[0].stylesheet = style.stylesheet;
            return;
        }
        match self.styles.iter_mut().find(|s| s.name == style.name) {
            Some(existing) => *existing = style,
            None => self.styles.push(style),
        }
    }

    /// Remove a style by name. Removing "Default" is refused.
    pub fn remove(&mut self, name: &str) -> bool {
        if name == DEFAULT_STYLE {
            return false;
        }
        let before = self.styles.len();
        self.styles.retain(|s| s.name != name);
        self.styles.len() != before
    }

    /// Rebuild from a persisted list, restoring the Default-first invariant
    /// no matter what order the storage produced.
    pub fn from_persisted(styles: Vec<HeadlineStyle>, default_stylesheet: &str) -> Self {
        let mut list = Self::new(default_stylesheet);
        for style in styles {
            list.upsert(style);
        }
        list
    }
}
