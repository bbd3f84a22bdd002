//! Generated compile-time script text and origin markers.
//!
//! Compile-time code executes as ordinary host code with its own line
//! numbering, disjoint from the user's source file. To map host-side
//! positions back, the generated text carries `@origin <node-id>` marker
//! lines; scanning backward from an error line to the nearest marker
//! recovers the originating node, and the residual line delta is applied to
//! that node's own position.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ast::NodeId;

/// Marker token embedded in generated script text.
pub const ORIGIN_MARKER: &str = "@origin";

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@origin\s+(\d+)").expect("origin marker pattern"));

static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\w./\-]+):(\d+)").expect("citation pattern"));

/// Renders the marker line for a node, in generated-comment form.
pub fn origin_marker(id: NodeId) -> String {
    format!("-- {} {}", ORIGIN_MARKER, id.0)
}

/// One registered compile-time script: its text split into lines plus the
/// scanned marker positions. Lines are 1-based throughout.
#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    lines: Vec<String>,
    markers: Vec<(usize, NodeId)>,
}

impl Script {
    pub fn new(name: &str, text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(String::from).collect();
        let mut markers = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if let Some(caps) = MARKER_RE.captures(line) {
                if let Ok(id) = caps[1].parse::<u64>() {
                    markers.push((index + 1, NodeId(id)));
                }
            }
        }
        Self {
            name: name.to_string(),
            lines,
            markers,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line.checked_sub(1)?).map(String::as_str)
    }

    /// Finds the nearest marker at or before `line` and the line delta from
    /// the marker to `line`. The marker line itself maps to delta zero, as
    /// does the first generated line after it.
    pub fn origin_before(&self, line: usize) -> Option<(NodeId, usize)> {
        self.markers
            .iter()
            .rev()
            .find(|(marker_line, _)| *marker_line <= line)
            .map(|(marker_line, id)| (*id, line.saturating_sub(marker_line + 1)))
    }
}

/// A frame of the "currently executing compile-time source" stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFrame {
    pub script: String,
    pub line: usize,
}

/// Rewrites every `<name>:<line>` citation in a host error message through
/// `lookup`; citations the lookup declines are left untouched.
pub(crate) fn rewrite_citations<F>(message: &str, mut lookup: F) -> String
where
    F: FnMut(&str, usize) -> Option<String>,
{
    CITATION_RE
        .replace_all(message, |caps: &Captures<'_>| {
            let name = &caps[1];
            let line = caps[2].parse::<usize>().unwrap_or(0);
            lookup(name, line).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
