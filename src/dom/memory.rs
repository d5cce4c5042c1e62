//! In-memory [`Document`] implementation.
//!
//! Models just enough of a DOM for anchoring: an element tree with
//! attributes, page-relative boxes, a `rendered` flag (inherited, like
//! `display: none`), stacking order for hit-testing, optional per-character
//! boxes and a scroll offset.
//!
//! # Example
//!
//! ```
//! use cursor_sync::dom::{Document, ElementSpec, MemoryDocument};
//! use cursor_sync::geometry::{Point, Rect};
//!
//! let doc = MemoryDocument::new(1280.0, 2000.0);
//! let header = doc.append(
//!     doc.body(),
//!     ElementSpec::new("header").id("top").rect(Rect::new(0.0, 0.0, 1280.0, 80.0)),
//! );
//!
//! let hits = doc.elements_from_point(Point::new(10.0, 10.0));
//! assert_eq!(hits.first(), Some(&header));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::cmp::Reverse;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::geometry::{Point, Rect};

use super::{Document, NodeHandle};

// ============================================================================
// ElementSpec
// ============================================================================

/// Description of an element to insert.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attributes: FxHashMap<String, String>,
    rect: Rect,
    z_index: i32,
    rendered: bool,
    char_boxes: Vec<Rect>,
}

impl ElementSpec {
    /// Starts a spec for the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: FxHashMap::default(),
            rect: Rect::default(),
            z_index: 0,
            rendered: true,
            char_boxes: Vec::new(),
        }
    }

    /// Sets the `id` attribute.
    #[inline]
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Sets an arbitrary attribute.
    #[inline]
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the page-relative box.
    #[inline]
    #[must_use]
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Sets the stacking order; higher paints on top.
    #[inline]
    #[must_use]
    pub fn z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Marks the element as `display: none`.
    #[inline]
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.rendered = false;
        self
    }

    /// Sets per-character boxes for caret hit-testing.
    #[inline]
    #[must_use]
    pub fn char_boxes(mut self, boxes: Vec<Rect>) -> Self {
        self.char_boxes = boxes;
        self
    }
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug)]
struct Node {
    spec: ElementSpec,
    parent: Option<u64>,
    children: Vec<u64>,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: FxHashMap<u64, Node>,
    next_id: u64,
    root: u64,
    body: u64,
    scroll: Point,
}

impl Tree {
    fn insert(&mut self, parent: Option<u64>, spec: ElementSpec) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(
            id,
            Node {
                spec,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent
            && let Some(node) = self.nodes.get_mut(&parent)
        {
            node.children.push(id);
        }
        id
    }

    /// Attached nodes in document (pre-)order.
    fn document_order(&self) -> Vec<u64> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    fn is_attached(&self, mut id: u64) -> bool {
        loop {
            if id == self.root {
                return true;
            }
            match self.nodes.get(&id).and_then(|n| n.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn is_rendered(&self, id: u64) -> bool {
        if !self.is_attached(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(&node_id) else {
                return false;
            };
            if !node.spec.rendered {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn find_attached(&self, predicate: impl Fn(&ElementSpec) -> bool) -> Option<u64> {
        self.document_order()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| predicate(&n.spec)))
    }
}

// ============================================================================
// MemoryDocument
// ============================================================================

/// A thread-safe in-memory element tree.
#[derive(Debug)]
pub struct MemoryDocument {
    tree: RwLock<Tree>,
}

impl MemoryDocument {
    /// Creates a document with `html` and `body` spanning `width` x `height`.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let page = Rect::new(0.0, 0.0, width, height);
        let mut tree = Tree::default();
        let root = tree.insert(None, ElementSpec::new("html").rect(page));
        let body = tree.insert(Some(root), ElementSpec::new("body").rect(page));
        tree.root = root;
        tree.body = body;
        Self {
            tree: RwLock::new(tree),
        }
    }

    /// Returns the `body` element.
    #[inline]
    #[must_use]
    pub fn body(&self) -> NodeHandle {
        NodeHandle(self.tree.read().body)
    }

    /// Appends a child element and returns its handle.
    pub fn append(&self, parent: NodeHandle, spec: ElementSpec) -> NodeHandle {
        NodeHandle(self.tree.write().insert(Some(parent.0), spec))
    }

    /// Detaches an element (and its subtree) from the document.
    ///
    /// The handle stays known but is no longer attached or rendered.
    pub fn remove(&self, node: NodeHandle) {
        let mut tree = self.tree.write();
        let parent = tree.nodes.get_mut(&node.0).and_then(|n| n.parent.take());
        if let Some(parent) = parent
            && let Some(parent_node) = tree.nodes.get_mut(&parent)
        {
            parent_node.children.retain(|&c| c != node.0);
        }
    }

    /// Moves or resizes an element.
    pub fn set_rect(&self, node: NodeHandle, rect: Rect) {
        if let Some(n) = self.tree.write().nodes.get_mut(&node.0) {
            n.spec.rect = rect;
        }
    }

    /// Toggles `display: none` on an element.
    pub fn set_rendered(&self, node: NodeHandle, rendered: bool) {
        if let Some(n) = self.tree.write().nodes.get_mut(&node.0) {
            n.spec.rendered = rendered;
        }
    }

    /// Sets or replaces an attribute.
    pub fn set_attribute(&self, node: NodeHandle, name: &str, value: &str) {
        if let Some(n) = self.tree.write().nodes.get_mut(&node.0) {
            n.spec.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Sets the scroll offset (page = viewport + scroll).
    pub fn set_scroll(&self, scroll: Point) {
        self.tree.write().scroll = scroll;
    }

    /// Number of known elements, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.read().nodes.len()
    }

    /// Always `false`: a document has at least `html` and `body`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.read().nodes.is_empty()
    }
}

// ============================================================================
// MemoryDocument - Document
// ============================================================================

impl Document for MemoryDocument {
    fn elements_from_point(&self, viewport: Point) -> Vec<NodeHandle> {
        let tree = self.tree.read();
        let page = Point::new(viewport.x + tree.scroll.x, viewport.y + tree.scroll.y);

        let mut hits: Vec<(i32, usize, u64)> = tree
            .document_order()
            .into_iter()
            .enumerate()
            .filter_map(|(order, id)| {
                let node = tree.nodes.get(&id)?;
                (tree.is_rendered(id) && node.spec.rect.contains(page))
                    .then_some((node.spec.z_index, order, id))
            })
            .collect();

        // Later in document order paints over earlier within the same z layer.
        hits.sort_by_key(|&(z, order, _)| (Reverse(z), Reverse(order)));
        hits.into_iter().map(|(_, _, id)| NodeHandle(id)).collect()
    }

    fn root(&self) -> Option<NodeHandle> {
        Some(NodeHandle(self.tree.read().root))
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.tree
            .read()
            .nodes
            .get(&node.0)
            .and_then(|n| n.parent)
            .map(NodeHandle)
    }

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.tree
            .read()
            .nodes
            .get(&node.0)
            .map(|n| n.children.iter().copied().map(NodeHandle).collect())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeHandle) -> Option<String> {
        self.tree
            .read()
            .nodes
            .get(&node.0)
            .map(|n| n.spec.tag.clone())
    }

    fn attribute(&self, node: NodeHandle, name: &str) -> Option<String> {
        self.tree
            .read()
            .nodes
            .get(&node.0)
            .and_then(|n| n.spec.attributes.get(name).cloned())
    }

    fn bounding_box(&self, node: NodeHandle) -> Option<Rect> {
        self.tree.read().nodes.get(&node.0).map(|n| n.spec.rect)
    }

    fn is_rendered(&self, node: NodeHandle) -> bool {
        self.tree.read().is_rendered(node.0)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeHandle> {
        self.element_by_attribute("id", id)
    }

    fn element_by_attribute(&self, name: &str, value: &str) -> Option<NodeHandle> {
        self.tree
            .read()
            .find_attached(|spec| spec.attributes.get(name).is_some_and(|v| v == value))
            .map(NodeHandle)
    }

    fn caret_index(&self, node: NodeHandle, viewport: Point) -> Option<u32> {
        let tree = self.tree.read();
        let page = Point::new(viewport.x + tree.scroll.x, viewport.y + tree.scroll.y);
        tree.nodes
            .get(&node.0)?
            .spec
            .char_boxes
            .iter()
            .position(|b| b.contains(page))
            .and_then(|i| u32::try_from(i).ok())
    }

    fn char_box(&self, node: NodeHandle, index: u32) -> Option<Rect> {
        self.tree
            .read()
            .nodes
            .get(&node.0)?
            .spec
            .char_boxes
            .get(index as usize)
            .copied()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> (MemoryDocument, NodeHandle, NodeHandle) {
        let doc = MemoryDocument::new(800.0, 600.0);
        let panel = doc.append(
            doc.body(),
            ElementSpec::new("div")
                .id("panel")
                .rect(Rect::new(100.0, 100.0, 200.0, 200.0)),
        );
        let button = doc.append(
            panel,
            ElementSpec::new("button").rect(Rect::new(120.0, 120.0, 50.0, 20.0)),
        );
        (doc, panel, button)
    }

    #[test]
    fn test_hit_test_topmost_first() {
        let (doc, panel, button) = sample_doc();
        let hits = doc.elements_from_point(Point::new(130.0, 125.0));
        assert_eq!(hits[0], button);
        assert_eq!(hits[1], panel);
        assert_eq!(hits.last(), doc.root().as_ref());
    }

    #[test]
    fn test_hit_test_respects_z_index() {
        let (doc, _, button) = sample_doc();
        let overlay = doc.append(
            doc.body(),
            ElementSpec::new("div")
                .z_index(10)
                .rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        );
        let hits = doc.elements_from_point(Point::new(130.0, 125.0));
        assert_eq!(hits[0], overlay);
        assert_eq!(hits[1], button);
    }

    #[test]
    fn test_hit_test_uses_scroll() {
        let (doc, _, button) = sample_doc();
        doc.set_scroll(Point::new(0.0, 100.0));
        let hits = doc.elements_from_point(Point::new(130.0, 25.0));
        assert_eq!(hits[0], button);
    }

    #[test]
    fn test_outside_document_hits_nothing() {
        let (doc, _, _) = sample_doc();
        assert!(doc.elements_from_point(Point::new(-5.0, 900.0)).is_empty());
    }

    #[test]
    fn test_hidden_parent_hides_subtree() {
        let (doc, panel, button) = sample_doc();
        doc.set_rendered(panel, false);
        assert!(!doc.is_rendered(button));
        let hits = doc.elements_from_point(Point::new(130.0, 125.0));
        assert!(!hits.contains(&button));
    }

    #[test]
    fn test_remove_detaches() {
        let (doc, panel, button) = sample_doc();
        doc.remove(panel);
        assert!(!doc.is_rendered(button));
        assert_eq!(doc.element_by_id("panel"), None);
        assert!(doc.bounding_box(panel).is_some());
    }

    #[test]
    fn test_caret_index_and_char_box() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let boxes = vec![
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(8.0, 0.0, 8.0, 16.0),
        ];
        let text = doc.append(
            doc.body(),
            ElementSpec::new("p")
                .rect(Rect::new(0.0, 0.0, 16.0, 16.0))
                .char_boxes(boxes.clone()),
        );
        assert_eq!(doc.caret_index(text, Point::new(10.0, 4.0)), Some(1));
        assert_eq!(doc.char_box(text, 1), Some(boxes[1]));
        assert_eq!(doc.char_box(text, 7), None);
    }
}
