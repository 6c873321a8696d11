//! Persistent settings as a living tree document.
//!
//! The document is a tree of Sections; a Section holds named Items, named
//! child Sections, and named Arrays of Elements (an Element is itself a
//! Section, indexed 0..N-1). Items carry typed values. Readers and writers
//! navigate with a cursor API (`begin_section`, `begin_array`,
//! `set_array_index`) so call sites read like the configuration they touch.
//!
//! The backing store is JSON, written atomically on `flush` (temp file in
//! the same directory, then rename). A parse failure on `load` leaves any
//! previously cached document untouched and surfaces the error.

mod value;

pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings file {0} could not be read: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("settings file {0} could not be parsed: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("settings document could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("no array is open at this cursor position")]
    NoOpenArray,
}

/// One node of the tree. Elements of an array are nodes as well, so an
/// array element can carry nested sections and arrays of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    sections: BTreeMap<String, Node>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    arrays: BTreeMap<String, Vec<Node>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    items: BTreeMap<String, Value>,
}

impl Node {
    fn section_mut(&mut self, path: &[String]) -> &mut Node {
        let mut node = self;
        for part in path {
            node = node.sections.entry(part.clone()).or_default();
        }
        node
    }

    fn section(&self, path: &[String]) -> Option<&Node> {
        let mut node = self;
        for part in path {
            node = node.sections.get(part)?;
        }
        Some(node)
    }
}

/// Cursor frame: either a plain section or a position inside an array.
#[derive(Debug, Clone)]
enum Frame {
    Section(Vec<String>),
    Array {
        section: Vec<String>,
        name: String,
        index: usize,
    },
}

/// The settings document plus its cursor state.
#[derive(Debug)]
pub struct Document {
    application: String,
    root: Node,
    frames: Vec<Frame>,
}

impl Document {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            root: Node::default(),
            frames: Vec::new(),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    /// Load a document from disk. A missing file yields an empty document;
    /// a present-but-unparsable file is an error and the caller keeps
    /// whatever state it already had.
    pub fn load(application: impl Into<String>, path: &Path) -> Result<Self, SettingsError> {
        let application = application.into();
        if !path.exists() {
            return Ok(Self::new(application));
        }
        let text =
            fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        let root: Node = serde_json::from_str(&text)
            .map_err(|e| SettingsError::Parse(path.to_path_buf(), e))?;
        tracing::debug!(target: "settings", path = %path.display(), "settings_loaded");
        Ok(Self {
            application,
            root,
            frames: Vec::new(),
        })
    }

    /// Write the document atomically: serialize to a sibling temp file,
    /// then rename over the target.
    pub fn flush(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(&self.root).map_err(SettingsError::Serialize)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|e| SettingsError::Io(tmp.clone(), e))?;
        fs::rename(&tmp, path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        tracing::debug!(target: "settings", path = %path.display(), "settings_flushed");
        Ok(())
    }

    fn split_path(path: &str) -> Vec<String> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Path of the section the cursor currently points at, ignoring any
    /// open array element (arrays are addressed separately).
    fn current_section_path(&self) -> Vec<String> {
        let mut out = Vec::new();
        for frame in &self.frames {
            if let Frame::Section(parts) = frame {
                out.extend(parts.iter().cloned());
            }
        }
        out
    }

    fn current_node_mut(&mut self) -> &mut Node {
        let section = self.current_section_path();
        match self.frames.last().cloned() {
            // an open array addresses an element only once an index is set
            Some(Frame::Array {
                section,
                name,
                index,
            }) if index != usize::MAX => {
                let node = self.root.section_mut(&section);
                let elements = node.arrays.entry(name).or_default();
                if elements.len() <= index {
                    elements.resize_with(index + 1, Node::default);
                }
                &mut elements[index]
            }
            _ => self.root.section_mut(&section),
        }
    }

    fn current_node(&self) -> Option<&Node> {
        match self.frames.last() {
            Some(Frame::Array {
                section,
                name,
                index,
            }) if *index != usize::MAX => {
                self.root.section(section)?.arrays.get(name)?.get(*index)
            }
            Some(Frame::Array { .. }) => None,
            _ => self.root.section(&self.current_section_path()),
        }
    }

    /// Open a (possibly nested) section. Paths are slash separated and
    /// resolve relative to the current cursor; a leading slash reads the
    /// same as a relative path since frames compose.
    pub fn begin_section(&mut self, path: &str) {
        self.frames.push(Frame::Section(Self::split_path(path)));
    }

    pub fn end_section(&mut self) {
        debug_assert!(matches!(self.frames.last(), Some(Frame::Section(_))));
        self.frames.pop();
    }

    /// Drop a section subtree (items, children, arrays) at `path`.
    pub fn clear_section(&mut self, path: &str) {
        let mut full = self.current_section_path();
        full.extend(Self::split_path(path));
        if let Some((last, parents)) = full.split_last() {
            let parent = self.root.section_mut(&parents.to_vec());
            parent.sections.remove(last);
        } else {
            self.root = Node::default();
        }
    }

    /// Open an array at `path` and return its current length. The cursor
    /// points at no element until `set_array_index` is called.
    pub fn begin_array(&mut self, path: &str) -> usize {
        let mut parts = Self::split_path(path);
        let name = parts.pop().unwrap_or_default();
        let mut section = self.current_section_path();
        section.extend(parts);
        let len = self
            .root
            .section(&section)
            .and_then(|n| n.arrays.get(&name))
            .map_or(0, Vec::len);
        self.frames.push(Frame::Array {
            section,
            name,
            index: usize::MAX,
        });
        len
    }

    pub fn end_array(&mut self) {
        debug_assert!(matches!(self.frames.last(), Some(Frame::Array { .. })));
        self.frames.pop();
    }

    /// Point the cursor at element `index` of the open array, creating
    /// empty elements up to that index on the next write.
    pub fn set_array_index(&mut self, index: usize) -> Result<(), SettingsError> {
        match self.frames.last_mut() {
            Some(Frame::Array { index: slot, .. }) => {
                *slot = index;
                Ok(())
            }
            _ => Err(SettingsError::NoOpenArray),
        }
    }

    /// Read an item at the cursor, falling back to `default` when absent.
    pub fn get_item(&self, name: &str, default: Value) -> Value {
        self.current_node()
            .and_then(|n| n.items.get(name))
            .cloned()
            .unwrap_or(default)
    }

    pub fn set_item(&mut self, name: &str, value: Value) {
        self.current_node_mut().items.insert(name.to_string(), value);
    }

    /// Read an element item without moving the cursor.
    pub fn get_array_item(&self, array: &str, index: usize, name: &str, default: Value) -> Value {
        self.root
            .section(&self.current_section_path())
            .and_then(|n| n.arrays.get(array))
            .and_then(|els| els.get(index))
            .and_then(|el| el.items.get(name))
            .cloned()
            .unwrap_or(default)
    }

    pub fn set_array_item(&mut self, array: &str, index: usize, name: &str, value: Value) {
        let section = self.current_section_path();
        let node = self.root.section_mut(&section);
        let elements = node.arrays.entry(array.to_string()).or_default();
        if elements.len() <= index {
            elements.resize_with(index + 1, Node::default);
        }
        elements[index].items.insert(name.to_string(), value);
    }

    /// Structural equality of the persisted tree, cursor state excluded.
    pub fn same_tree(&self, other: &Document) -> bool {
        self.root == other.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new("newsroom")
    }

    #[test]
    fn items_default_when_absent() {
        let d = doc();
        assert_eq!(
            d.get_item("missing", Value::Integer(7)),
            Value::Integer(7)
        );
    }

    #[test]
    fn section_cursor_scopes_items() {
        let mut d = doc();
        d.begin_section("Story/Defaults");
        d.set_item("ttl", Value::Integer(5));
        d.end_section();

        d.begin_section("Story");
        d.begin_section("Defaults");
        assert_eq!(d.get_item("ttl", Value::Integer(0)), Value::Integer(5));
        d.end_section();
        assert_eq!(d.get_item("ttl", Value::Integer(0)), Value::Integer(0));
        d.end_section();
    }

    #[test]
    fn arrays_are_ordered_and_indexed() {
        let mut d = doc();
        let len = d.begin_array("HeadlineStyles");
        assert_eq!(len, 0);
        for (i, name) in ["Default", "Alert"].iter().enumerate() {
            d.set_array_index(i).unwrap();
            d.set_item("name", Value::String(name.to_string()));
        }
        d.end_array();

        assert_eq!(d.begin_array("HeadlineStyles"), 2);
        d.set_array_index(1).unwrap();
        assert_eq!(
            d.get_item("name", Value::String(String::new())),
            Value::String("Alert".to_string())
        );
        d.end_array();
    }

    #[test]
    fn array_item_accessors_bypass_cursor() {
        let mut d = doc();
        d.set_array_item("Stories", 2, "identity", Value::String("s3".into()));
        assert_eq!(
            d.get_array_item("Stories", 2, "identity", Value::String(String::new())),
            Value::String("s3".to_string())
        );
        // elements 0 and 1 were materialized empty to keep indexes stable
        assert_eq!(
            d.get_array_item("Stories", 0, "identity", Value::String("none".into())),
            Value::String("none".to_string())
        );
    }

    #[test]
    fn flush_then_load_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsroom.json");

        let mut d = doc();
        d.begin_section("Application");
        d.set_item("first_run", Value::Bool(false));
        d.set_item("chart", Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]));
        d.set_item(
            "series",
            Value::StringList(vec!["Default".into(), "Build".into()]),
        );
        d.end_section();
        d.set_array_item("Stories", 0, "ttl", Value::Integer(5));
        d.set_array_item("Stories", 0, "compression", Value::Double(25.0));
        d.flush(&path).unwrap();

        let loaded = Document::load("newsroom", &path).unwrap();
        assert!(d.same_tree(&loaded));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let d = Document::load("newsroom", &dir.path().join("absent.json")).unwrap();
        assert!(d.same_tree(&Document::new("newsroom")));
    }

    #[test]
    fn load_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Document::load("newsroom", &path),
            Err(SettingsError::Parse(..))
        ));
    }

    #[test]
    fn clear_section_drops_subtree() {
        let mut d = doc();
        d.begin_section("A/B");
        d.set_item("x", Value::Integer(1));
        d.end_section();
        d.clear_section("A/B");
        d.begin_section("A/B");
        assert_eq!(d.get_item("x", Value::Integer(0)), Value::Integer(0));
        d.end_section();
    }
}
