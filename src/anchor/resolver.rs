//! Anchor resolution in both directions.
//!
//! [`resolve`] runs on the sender for every pointer move; [`locate`] runs on
//! the receiver for every replayed sample. Both are pure functions of the
//! document state at call time.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::dom::{ANCHOR_ATTRIBUTE, Document, NodeHandle, OWNED_MARKER_ATTRIBUTE};
use crate::geometry::{Offset, Point, Rect};
use crate::protocol::{Anchor, IdSource};

use super::path::ElementPath;

// ============================================================================
// Types
// ============================================================================

/// Result of [`resolve`]: the anchor plus the unconditional page fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPosition {
    /// Best available anchor.
    pub anchor: Anchor,
    /// Absolute page coordinates.
    pub page: Point,
}

/// Result of [`locate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    /// Where to draw the cursor, in page coordinates.
    pub point: Point,
    /// `true` if the anchor resolved; `false` means the page fallback was used.
    pub anchored: bool,
}

// ============================================================================
// resolve
// ============================================================================

/// Describes what the pointer at `viewport` / `page` is over.
///
/// Self-owned cursor elements are skipped. Elements with an `id` (or the
/// opt-in anchor attribute) yield [`Anchor::ElementIdOffset`], others a
/// structural [`Anchor::ElementPath`], and a miss yields [`Anchor::None`].
#[must_use]
pub fn resolve(doc: &dyn Document, viewport: Point, page: Point) -> ResolvedPosition {
    let anchor = doc
        .elements_from_point(viewport)
        .into_iter()
        .find(|&node| doc.attribute(node, OWNED_MARKER_ATTRIBUTE).is_none())
        .map_or(Anchor::None, |node| anchor_for(doc, node, viewport, page));

    ResolvedPosition { anchor, page }
}

fn anchor_for(doc: &dyn Document, node: NodeHandle, viewport: Point, page: Point) -> Anchor {
    let offset = doc
        .bounding_box(node)
        .unwrap_or_default()
        .offset_of(page);

    if let Some((id, source)) = stable_id(doc, node) {
        return Anchor::ElementIdOffset {
            id,
            source,
            offset,
            index: doc.caret_index(node, viewport),
        };
    }

    match ElementPath::from_node(doc, node) {
        Some(path) => Anchor::ElementPath {
            path: path.to_string(),
            offset,
        },
        None => Anchor::None,
    }
}

fn stable_id(doc: &dyn Document, node: NodeHandle) -> Option<(String, IdSource)> {
    let non_empty = |v: String| (!v.trim().is_empty()).then_some(v);

    if let Some(id) = doc.attribute(node, "id").and_then(non_empty) {
        return Some((id, IdSource::Id));
    }
    doc.attribute(node, ANCHOR_ATTRIBUTE)
        .and_then(non_empty)
        .map(|id| (id, IdSource::DataAttribute))
}

// ============================================================================
// locate
// ============================================================================

/// Maps an anchor back to page coordinates against the local document.
///
/// The element box is measured now, so local reflow since capture is
/// absorbed. Missing, detached or hidden elements, malformed paths and
/// non-finite results all return `fallback` unchanged.
#[must_use]
pub fn locate(doc: &dyn Document, anchor: &Anchor, fallback: Point) -> Located {
    let resolved = match anchor {
        Anchor::ElementIdOffset {
            id,
            source,
            offset,
            index,
        } => {
            let node = match source {
                IdSource::Id => doc.element_by_id(id),
                IdSource::DataAttribute => doc.element_by_attribute(ANCHOR_ATTRIBUTE, id),
            };
            node.and_then(|node| {
                let target = index
                    .and_then(|i| doc.char_box(node, i))
                    .or_else(|| doc.bounding_box(node))?;
                place(doc, node, target, *offset)
            })
        }

        Anchor::ElementPath { path, offset } => ElementPath::parse(path)
            .ok()
            .and_then(|path| path.find(doc))
            .and_then(|node| place(doc, node, doc.bounding_box(node)?, *offset)),

        Anchor::None => None,
    };

    match resolved {
        Some(point) => Located {
            point,
            anchored: true,
        },
        None => {
            trace!(?anchor, "Anchor unresolved, using page coordinates");
            Located {
                point: fallback,
                anchored: false,
            }
        }
    }
}

fn place(doc: &dyn Document, node: NodeHandle, target: Rect, offset: Offset) -> Option<Point> {
    if !doc.is_rendered(node) {
        return None;
    }
    Some(target.point_at(offset)).filter(Point::is_finite)
}

// ============================================================================
// Tests
// ============================================================================
