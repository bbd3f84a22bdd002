//! Source location resolution for diagnostics.
//!
//! Nodes carry byte-offset spans into named sources; diagnostics want
//! `(line, column, line text)`. This module owns the registered sources and
//! the offset arithmetic. Resolution fails gracefully: a missing source or
//! out-of-range offset yields `Location::empty()`, never an error, so purely
//! synthetic nodes degrade to location-less diagnostics.

use std::collections::HashMap;
use std::sync::Arc;

use miette::NamedSource;
use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// A fully resolved source position. Lines and columns are 1-based; the
/// line bounds are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    pub source_name: String,
    pub line: usize,
    pub column: usize,
    pub line_text: String,
    pub line_start: usize,
    pub line_end: usize,
}

impl Location {
    /// The empty location used when span information is missing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.line == 0
    }

    /// `<file>:<line>:<col>` rendering for brief diagnostics.
    pub fn brief(&self) -> String {
        format!("{}:{}:{}", self.source_name, self.line, self.column)
    }
}

/// Registry of source texts, keyed by source name.
///
/// Sources are stored as `miette::NamedSource` so the same handle feeds both
/// the rich diagnostic renderer and the plain-text resolution here.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: HashMap<String, Arc<NamedSource<String>>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source text under a name, returning the shared handle.
    /// Re-registering a name replaces the previous content.
    pub fn register(&mut self, name: &str, text: &str) -> Arc<NamedSource<String>> {
        let source = Arc::new(NamedSource::new(name, text.to_string()));
        self.files.insert(name.to_string(), Arc::clone(&source));
        source
    }

    pub fn get(&self, name: &str) -> Option<Arc<NamedSource<String>>> {
        self.files.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Resolves a node span to a full location. Returns the empty location
    /// when the source is unknown or the offset is out of range.
    pub fn locate(&self, span: &Span) -> Location {
        let Some(source) = self.files.get(&span.source) else {
            return Location::empty();
        };
        let content = source.inner();
        let Some((line, column, line_start, line_end)) = resolve_offset(content, span.start)
        else {
            return Location::empty();
        };
        Location {
            source_name: span.source.clone(),
            line,
            column,
            line_text: content[line_start..line_end].to_string(),
            line_start,
            line_end,
        }
    }

    /// Resolves a (source, line) pair to the location of that line's start.
    /// Used by error translation, where only line granularity survives the
    /// round-trip through generated script text.
    pub fn locate_line(&self, name: &str, line: usize) -> Location {
        let Some(source) = self.files.get(name) else {
            return Location::empty();
        };
        if line == 0 {
            return Location::empty();
        }
        let content = source.inner();
        let mut start = 0usize;
        for (current, text) in content.split('\n').enumerate() {
            if current + 1 == line {
                return Location {
                    source_name: name.to_string(),
                    line,
                    column: 1,
                    line_text: text.to_string(),
                    line_start: start,
                    line_end: start + text.len(),
                };
            }
            start += text.len() + 1;
        }
        Location::empty()
    }
}

/// Resolves a byte offset to `(line, column, line_start, line_end)`, all
/// 1-based except the byte bounds. Returns `None` when the offset lies past
/// the end of the text.
pub fn resolve_offset(text: &str, offset: usize) -> Option<(usize, usize, usize, usize)> {
    if offset > text.len() {
        return None;
    }
    let mut line = 1usize;
    let mut line_start = 0usize;
    for (index, byte) in text.bytes().enumerate() {
        if index >= offset {
            break;
        }
        if byte == b'\n' {
            line += 1;
            line_start = index + 1;
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(text.len());
    let column = text[line_start..offset].chars().count() + 1;
    Some((line, column, line_start, line_end))
}

#[cfg(test)]
mod location_tests {
    use super::*;

    #[test]
    fn resolve_offset_finds_line_and_column() {
        let text = "abc\ndef ghi\njkl";
        let (line, column, line_start, line_end) = resolve_offset(text, 8).unwrap();
        assert_eq!(line, 2);
        assert_eq!(column, 5);
        assert_eq!(&text[line_start..line_end], "def ghi");
    }

    #[test]
    fn resolve_offset_past_end_is_none() {
        assert!(resolve_offset("abc", 10).is_none());
        assert!(resolve_offset("abc", 3).is_some());
    }

    #[test]
    fn locate_missing_source_is_empty() {
        let map = SourceMap::new();
        let span = Span::new("nowhere.src", 0, 1);
        assert!(map.locate(&span).is_empty());
    }

    #[test]
    fn locate_line_walks_to_requested_line() {
        let mut map = SourceMap::new();
        map.register("main.src", "one\ntwo\nthree");
        let loc = map.locate_line("main.src", 3);
        assert_eq!(loc.line, 3);
        assert_eq!(loc.line_text, "three");
        assert!(map.locate_line("main.src", 9).is_empty());
    }
}
