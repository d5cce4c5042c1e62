//! Document abstraction.
//!
//! The engine never touches a real DOM. Hosts implement [`Document`] over
//! whatever tree they have (a browser binding, a headless renderer), and
//! [`MemoryDocument`] covers hosts without one as well as tests.
//!
//! # Contract
//!
//! | Method | Browser equivalent |
//! |--------|--------------------|
//! | `elements_from_point` | `document.elementsFromPoint(x, y)` |
//! | `bounding_box` | `getBoundingClientRect()` + scroll offset |
//! | `is_rendered` | attached and not `display: none` |
//! | `element_by_id` | `document.getElementById` |
//! | `element_by_attribute` | `querySelector('[name="value"]')` |
//! | `caret_index` | `caretPositionFromPoint` offset |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory document tree.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use crate::geometry::{Point, Rect};

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{ElementSpec, MemoryDocument};

// ============================================================================
// Constants
// ============================================================================

/// Marker attribute carried by cursor elements this crate's renderer injects.
///
/// Hit-testing skips marked elements so a remote cursor drawn under the local
/// pointer never becomes the anchor.
pub const OWNED_MARKER_ATTRIBUTE: &str = "data-cursor-sync";

/// Opt-in attribute giving an element a stable anchor name without an `id`.
pub const ANCHOR_ATTRIBUTE: &str = "data-cursor-anchor";

// ============================================================================
// NodeHandle
// ============================================================================

/// Opaque reference to an element, valid for one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

// ============================================================================
// Document
// ============================================================================

/// Read access to a live document.
///
/// Every query reflects the document at call time; nothing is cached by the
/// engine, so boxes measured during playback include any local reflow.
pub trait Document: Send + Sync {
    /// Elements under a viewport point, topmost first.
    fn elements_from_point(&self, viewport: Point) -> Vec<NodeHandle>;

    /// The document element, if any.
    fn root(&self) -> Option<NodeHandle>;

    /// Parent element, `None` for the root or detached nodes.
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Child elements in document order.
    fn children(&self, node: NodeHandle) -> Vec<NodeHandle>;

    /// Tag name in whatever case the host reports, `None` if the handle is
    /// unknown.
    fn tag_name(&self, node: NodeHandle) -> Option<String>;

    /// Attribute value.
    fn attribute(&self, node: NodeHandle, name: &str) -> Option<String>;

    /// Current page-relative box, `None` if the node is gone.
    fn bounding_box(&self, node: NodeHandle) -> Option<Rect>;

    /// Whether the node is attached and displayed.
    fn is_rendered(&self, node: NodeHandle) -> bool;

    /// Looks up an attached element by `id`.
    fn element_by_id(&self, id: &str) -> Option<NodeHandle>;

    /// Looks up the first attached element whose attribute equals `value`.
    fn element_by_attribute(&self, name: &str, value: &str) -> Option<NodeHandle>;

    /// Character index under the point for text-bearing elements.
    fn caret_index(&self, _node: NodeHandle, _viewport: Point) -> Option<u32> {
        None
    }

    /// Page-relative box of the character at `index`.
    fn char_box(&self, _node: NodeHandle, _index: u32) -> Option<Rect> {
        None
    }
}
