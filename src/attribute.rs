//! Destination-branch detection from the page structure.
//!
//! The host page's markup is not a stable contract, so the destination
//! branch is read through an ordered list of fallback strategies: stable
//! markers first, then branch links inside the pull-request header, then a
//! page-wide scan. The first strategy that produces a value wins.

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::page::{NodeKind, PageModel, PageNode};

/// Markers that carry the destination branch name directly.
const DESTINATION_MARKERS: &[&str] = &[
    "pr-destination-branch",
    "pr-header-destination-branch",
    "destination-branch-name",
];

/// Marker identifying the pull-request header region.
const HEADER_MARKER: &str = "pr-header";

/// Class-name substring identifying the header region.
const HEADER_CLASS_FRAGMENT: &str = "PullRequestHeader";

/// DOM-id substring identifying the header region.
const HEADER_DOM_ID_FRAGMENT: &str = "pull-request-header";

/// One way of reading the destination branch from the page.
///
/// Strategies are ordered: earlier entries are more precise, later entries
/// trade precision for resilience to markup drift.
pub trait DestinationStrategy: Send + Sync {
    /// Strategy name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Try to read the destination branch. `None` means "not found", never
    /// an error.
    fn attempt(&self, page: &PageModel) -> Option<String>;
}

/// Ordered fallback chain over [`DestinationStrategy`] implementations.
pub struct AttributeReader {
    strategies: Vec<Box<dyn DestinationStrategy>>,
}

impl AttributeReader {
    /// Reader with the three default strategies in priority order.
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(MarkerLookup),
            Box::new(HeaderBranchLinks),
            Box::new(GlobalBranchLinks),
        ])
    }

    /// Reader with a custom strategy chain (order is significant).
    pub fn with_strategies(strategies: Vec<Box<dyn DestinationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the chain, returning the first strategy's value.
    ///
    /// Returns `None` only when every strategy fails.
    pub fn read(&self, page: &PageModel) -> Option<String> {
        for strategy in &self.strategies {
            if let Some(branch) = strategy.attempt(page) {
                debug!(strategy = strategy.name(), branch, "destination branch read");
                return Some(branch);
            }
        }
        None
    }
}

impl Default for AttributeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AttributeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("AttributeReader")
            .field("strategies", &names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Strategy 1: stable markers
// ---------------------------------------------------------------------------

/// Direct lookup of the known destination-branch markers.
pub struct MarkerLookup;

impl DestinationStrategy for MarkerLookup {
    fn name(&self) -> &'static str {
        "marker-lookup"
    }

    fn attempt(&self, page: &PageModel) -> Option<String> {
        for marker in DESTINATION_MARKERS {
            if let Some(node) = page.find_by_marker(&[marker]) {
                let text = node.text.trim();
                if !text.is_empty() {
                    return Some(text.to_owned());
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Strategy 2: branch links inside the PR header
// ---------------------------------------------------------------------------

/// Second branch link inside the pull-request header (source → destination).
pub struct HeaderBranchLinks;

impl DestinationStrategy for HeaderBranchLinks {
    fn name(&self) -> &'static str {
        "header-branch-links"
    }

    fn attempt(&self, page: &PageModel) -> Option<String> {
        let header = find_header(page)?;
        let links: Vec<&PageNode> = page
            .iter()
            .filter(|n| is_branch_link(n) && page.is_descendant_of(n.id, header))
            .collect();
        second_link_branch(&links)
    }
}

/// Locate the header region by marker, class substring, or dom-id substring.
fn find_header(page: &PageModel) -> Option<crate::page::ElementId> {
    if let Some(node) = page.find_by_marker(&[HEADER_MARKER]) {
        return Some(node.id);
    }
    page.iter()
        .find(|n| {
            n.classes.iter().any(|c| c.contains(HEADER_CLASS_FRAGMENT))
                || n.dom_id
                    .as_deref()
                    .is_some_and(|id| id.contains(HEADER_DOM_ID_FRAGMENT))
        })
        .map(|n| n.id)
}

// ---------------------------------------------------------------------------
// Strategy 3: page-wide branch links
// ---------------------------------------------------------------------------

/// Page-wide scan for branch links, excluding commit listings and requiring
/// a branch-related ancestor.
pub struct GlobalBranchLinks;

impl DestinationStrategy for GlobalBranchLinks {
    fn name(&self) -> &'static str {
        "global-branch-links"
    }

    fn attempt(&self, page: &PageModel) -> Option<String> {
        let links: Vec<&PageNode> = page
            .iter()
            .filter(|n| {
                is_branch_link(n)
                    && !n.href.as_deref().is_some_and(|h| h.contains("commits"))
                    && has_branch_ancestor(page, n.id)
            })
            .collect();
        second_link_branch(&links)
    }
}

/// Whether any ancestor mentions "branch" in its classes or marker.
fn has_branch_ancestor(page: &PageModel, id: crate::page::ElementId) -> bool {
    page.ancestors(id).any(|n| {
        n.classes
            .iter()
            .any(|c| c.contains("branch") || c.contains("Branch"))
            || n.marker.as_deref().is_some_and(|m| m.contains("branch"))
    })
}

// ---------------------------------------------------------------------------
// Shared link handling
// ---------------------------------------------------------------------------

/// Whether a node is a link pointing at a branch page.
fn is_branch_link(node: &PageNode) -> bool {
    node.kind == NodeKind::Link && node.href.as_deref().is_some_and(|h| h.contains("/branch/"))
}

/// With at least two branch links, the second one (source → destination)
/// names the destination branch.
fn second_link_branch(links: &[&PageNode]) -> Option<String> {
    let second = links.get(1)?;
    decode_branch_href(second.href.as_deref()?)
}

/// Extract and percent-decode the branch name embedded in a branch href.
fn decode_branch_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/branch/")?;
    let encoded = rest
        .split(['?', '#'])
        .next()
        .filter(|s| !s.is_empty())?;
    Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned())
}
