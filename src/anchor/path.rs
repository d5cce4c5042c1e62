//! Structural element paths.
//!
//! A path names an element by walking up from it until an ancestor with an
//! `id` (or the document root) is reached:
//!
//! ```text
//! #main > ul[0] > li[3]
//! html[0] > body[0] > div[2] > span[0]
//! ```
//!
//! `tag[n]` is the zero-based position among same-tag element siblings. A
//! leading `#id` segment is looked up with `element_by_id`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{Document, NodeHandle};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Separator between path segments.
const SEPARATOR: &str = " > ";

static TAG_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z][a-zA-Z0-9-]*)\[(\d+)\]$").expect("static regex")
});

static ID_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([^\s>]+)$").expect("static regex"));

// ============================================================================
// PathSegment
// ============================================================================

/// One step of an [`ElementPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Element found by `id`; only valid as the first segment.
    Id(String),
    /// The `index`-th child with this tag.
    Tag {
        /// Tag name, lowercased.
        tag: String,
        /// Zero-based index among same-tag siblings.
        index: usize,
    },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Tag { tag, index } => write!(f, "{tag}[{index}]"),
        }
    }
}

// ============================================================================
// ElementPath
// ============================================================================

/// A parsed structural path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    segments: Vec<PathSegment>,
}

impl ElementPath {
    /// Builds the path for an attached element.
    ///
    /// Returns `None` if the element is detached or unknown.
    #[must_use]
    pub fn from_node(doc: &dyn Document, node: NodeHandle) -> Option<Self> {
        let root = doc.root()?;
        let mut segments = Vec::new();
        let mut current = node;

        loop {
            if let Some(id) = path_safe_id(doc, current) {
                segments.push(PathSegment::Id(id));
                break;
            }

            let tag = doc.tag_name(current)?.to_ascii_lowercase();
            match doc.parent(current) {
                Some(parent) => {
                    let index = doc
                        .children(parent)
                        .into_iter()
                        .filter(|&c| has_tag(doc, c, &tag))
                        .position(|c| c == current)?;
                    segments.push(PathSegment::Tag { tag, index });
                    current = parent;
                }
                None if current == root => {
                    segments.push(PathSegment::Tag { tag, index: 0 });
                    break;
                }
                None => return None,
            }
        }

        segments.reverse();
        Some(Self { segments })
    }

    /// Parses a path string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for empty paths, malformed segments or an
    /// `#id` segment that is not first.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();

        for (position, raw) in path.split(SEPARATOR).enumerate() {
            let raw = raw.trim();
            if let Some(caps) = ID_SEGMENT.captures(raw) {
                if position != 0 {
                    return Err(Error::protocol(format!(
                        "id segment must lead the path: {path}"
                    )));
                }
                segments.push(PathSegment::Id(caps[1].to_string()));
            } else if let Some(caps) = TAG_SEGMENT.captures(raw) {
                let index = caps[2]
                    .parse()
                    .map_err(|_| Error::protocol(format!("segment index out of range: {raw}")))?;
                segments.push(PathSegment::Tag {
                    tag: caps[1].to_ascii_lowercase(),
                    index,
                });
            } else {
                return Err(Error::protocol(format!("malformed path segment: {raw:?}")));
            }
        }

        Ok(Self { segments })
    }

    /// Finds the element this path names in `doc`.
    #[must_use]
    pub fn find(&self, doc: &dyn Document) -> Option<NodeHandle> {
        let (first, rest) = self.segments.split_first()?;

        let mut current = match first {
            PathSegment::Id(id) => doc.element_by_id(id)?,
            PathSegment::Tag { tag, index } => {
                let root = doc.root()?;
                if *index != 0 || !has_tag(doc, root, tag) {
                    return None;
                }
                root
            }
        };

        for segment in rest {
            let PathSegment::Tag { tag, index } = segment else {
                return None;
            };
            current = doc
                .children(current)
                .into_iter()
                .filter(|&c| has_tag(doc, c, tag))
                .nth(*index)?;
        }

        Some(current)
    }

    /// Returns the segments, outermost first.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(SEPARATOR)?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Hosts report `foreignObject` or `DIV` as they please; paths carry
/// lowercase tags.
fn has_tag(doc: &dyn Document, node: NodeHandle, tag: &str) -> bool {
    doc.tag_name(node)
        .is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// Returns the element's `id` if it can be written as a path segment.
fn path_safe_id(doc: &dyn Document, node: NodeHandle) -> Option<String> {
    doc.attribute(node, "id")
        .filter(|id| ID_SEGMENT.is_match(&format!("#{id}")))
}

// ============================================================================
// Tests
// ============================================================================
