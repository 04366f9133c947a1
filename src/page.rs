//! Structural model of the live page, as seen by the guard engine.
//!
//! The engine never touches a real DOM. The embedding host mirrors the parts
//! of the page the engine cares about — markers, class names, link targets,
//! text — into a [`PageModel`] snapshot and hands it over on every mutation
//! batch. Element identity is carried by host-assigned [`ElementId`]s: when
//! the host replaces a button with an equivalent one, the replacement gets a
//! fresh id and is treated as a brand-new element.

use std::collections::HashMap;

/// Host-assigned identity of a page element. Identity, not equality: two
/// structurally equal nodes with different ids are different elements.
pub type ElementId = u64;

/// Broad role of a node, used by trigger detection and link scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Generic container (div-like).
    Region,
    /// Anchor with an `href`.
    Link,
    /// Button or button-role element.
    Button,
}

/// One mirrored page element.
#[derive(Debug, Clone)]
pub struct PageNode {
    /// Host-assigned identity.
    pub id: ElementId,
    /// Parent element, if any.
    pub parent: Option<ElementId>,
    /// Node role.
    pub kind: NodeKind,
    /// Stable test/automation marker (`data-qa` / `data-testid` value).
    pub marker: Option<String>,
    /// CSS class names.
    pub classes: Vec<String>,
    /// DOM `id` attribute.
    pub dom_id: Option<String>,
    /// Visible text content.
    pub text: String,
    /// Link target, for [`NodeKind::Link`] nodes.
    pub href: Option<String>,
}

/// Immutable-by-convention snapshot of the page structure.
///
/// `Clone` is cheap enough for the snapshot-per-event model; tests clone a
/// snapshot and mutate the copy to simulate SPA navigation or re-renders.
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    url: String,
    nodes: HashMap<ElementId, PageNode>,
    order: Vec<ElementId>,
    next_id: ElementId,
}

/// Markers that identify the merge trigger across host-page versions.
const MERGE_TRIGGER_MARKERS: &[&str] = &[
    "merge-button",
    "pr-merge-button",
    "pr-header-merge-button",
];

impl PageModel {
    /// Create an empty page at the given location.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            nodes: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Current location URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the location URL (simulates SPA navigation on a clone).
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Insert a node, assigning it a fresh id. Returns the id.
    pub fn insert(&mut self, spec: NodeSpec) -> ElementId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.nodes.insert(
            id,
            PageNode {
                id,
                parent: spec.parent,
                kind: spec.kind,
                marker: spec.marker,
                classes: spec.classes,
                dom_id: spec.dom_id,
                text: spec.text,
                href: spec.href,
            },
        );
        self.order.push(id);
        id
    }

    /// Remove a node (and only that node) from the snapshot.
    pub fn remove(&mut self, id: ElementId) {
        self.nodes.remove(&id);
        self.order.retain(|n| *n != id);
    }

    /// Replace a node's text content in place.
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.text = text.into();
        }
    }

    /// Look up a node by id.
    pub fn get(&self, id: ElementId) -> Option<&PageNode> {
        self.nodes.get(&id)
    }

    /// Whether the element is still part of the page.
    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes in insertion (document) order.
    pub fn iter(&self) -> impl Iterator<Item = &PageNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Ancestor chain of a node, nearest first. Does not include the node.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = &PageNode> {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        std::iter::from_fn(move || {
            let node = self.nodes.get(&current?)?;
            current = node.parent;
            Some(node)
        })
    }

    /// Whether `ancestor` appears in the ancestor chain of `id`.
    pub fn is_descendant_of(&self, id: ElementId, ancestor: ElementId) -> bool {
        self.ancestors(id).any(|n| n.id == ancestor)
    }

    /// First node carrying one of the given markers, in document order.
    pub fn find_by_marker(&self, markers: &[&str]) -> Option<&PageNode> {
        for marker in markers {
            if let Some(node) = self
                .iter()
                .find(|n| n.marker.as_deref() == Some(*marker))
            {
                return Some(node);
            }
        }
        None
    }

    /// Locate the merge trigger element.
    ///
    /// Tries the known stable markers first, then falls back to any
    /// button-like node whose trimmed text is exactly `Merge`.
    pub fn find_merge_trigger(&self) -> Option<ElementId> {
        if let Some(node) = self.find_by_marker(MERGE_TRIGGER_MARKERS) {
            return Some(node.id);
        }
        self.iter()
            .find(|n| n.kind == NodeKind::Button && n.text.trim() == "Merge")
            .map(|n| n.id)
    }
}

/// Field bundle for [`PageModel::insert`]. All fields default to empty.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Parent element, if any.
    pub parent: Option<ElementId>,
    /// Node role.
    pub kind: NodeKind,
    /// Stable automation marker.
    pub marker: Option<String>,
    /// CSS class names.
    pub classes: Vec<String>,
    /// DOM `id` attribute.
    pub dom_id: Option<String>,
    /// Visible text content.
    pub text: String,
    /// Link target.
    pub href: Option<String>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            parent: None,
            kind: NodeKind::Region,
            marker: None,
            classes: Vec::new(),
            dom_id: None,
            text: String::new(),
            href: None,
        }
    }
}

impl NodeSpec {
    /// A region node with a marker.
    pub fn marked_region(marker: &str) -> Self {
        Self {
            kind: NodeKind::Region,
            marker: Some(marker.to_owned()),
            ..Self::default()
        }
    }

    /// A link node with the given target.
    pub fn link(href: &str) -> Self {
        Self {
            kind: NodeKind::Link,
            href: Some(href.to_owned()),
            ..Self::default()
        }
    }

    /// A button node with the given text.
    pub fn button(text: &str) -> Self {
        Self {
            kind: NodeKind::Button,
            text: text.to_owned(),
            ..Self::default()
        }
    }

    /// Set the parent element.
    #[must_use]
    pub fn under(mut self, parent: ElementId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the marker.
    #[must_use]
    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = Some(marker.to_owned());
        self
    }

    /// Set the class list.
    #[must_use]
    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| (*c).to_owned()).collect();
        self
    }

    /// Set the DOM id attribute.
    #[must_use]
    pub fn with_dom_id(mut self, dom_id: &str) -> Self {
        self.dom_id = Some(dom_id.to_owned());
        self
    }

    /// Set the text content.
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }
}
