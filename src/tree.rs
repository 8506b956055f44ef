//! Generic assertion tree primitives.
//!
//! These know nothing about security semantics. `create_or_get` never
//! creates a second sibling of a kind, which is what makes every
//! higher-level "ensure X" call idempotent.

use crate::assertion::AssertionKind;
use crate::model::{Document, NodeId, Transaction};

/// First child of `node` with the given kind.
pub fn find_first(doc: &Document, node: NodeId, kind: AssertionKind) -> Option<NodeId> {
    doc.children(node)
        .iter()
        .copied()
        .find(|child| doc.assertion_kind(*child) == Some(kind))
}

/// All children of `node` with the given kind.
pub fn find_all(doc: &Document, node: NodeId, kind: AssertionKind) -> Vec<NodeId> {
    doc.children(node)
        .iter()
        .copied()
        .filter(|child| doc.assertion_kind(*child) == Some(kind))
        .collect()
}

/// First child matching a predicate over its kind.
pub fn find_first_where(
    doc: &Document,
    node: NodeId,
    pred: impl Fn(AssertionKind) -> bool,
) -> Option<NodeId> {
    doc.children(node)
        .iter()
        .copied()
        .find(|child| doc.assertion_kind(*child).is_some_and(&pred))
}

/// Existing child of `kind`, or a freshly appended one.
pub fn create_or_get(tx: &mut Transaction<'_>, node: NodeId, kind: AssertionKind) -> NodeId {
    if let Some(existing) = find_first(tx, node, kind) {
        return existing;
    }
    let child = tx.create(kind);
    tx.append(node, child);
    child
}

/// Remove every child of `kind`. Returns how many were removed.
pub fn remove(tx: &mut Transaction<'_>, node: NodeId, kind: AssertionKind) -> usize {
    remove_where(tx, node, |k| k == kind)
}

/// Remove every child whose kind matches `pred`.
pub fn remove_where(
    tx: &mut Transaction<'_>,
    node: NodeId,
    pred: impl Fn(AssertionKind) -> bool,
) -> usize {
    let doomed: Vec<NodeId> = tx
        .children(node)
        .iter()
        .copied()
        .filter(|child| tx.assertion_kind(*child).is_some_and(&pred))
        .collect();
    for child in &doomed {
        tx.remove_subtree(*child);
    }
    doomed.len()
}

/// True iff every child is an invisible marker or an empty wrapper,
/// recursively. A node without children is empty.
pub fn is_empty(doc: &Document, node: NodeId) -> bool {
    doc.children(node).iter().all(|child| match doc.assertion_kind(*child) {
        Some(kind) if kind.is_invisible_marker() => true,
        Some(kind) if kind.is_wrapper() => is_empty(doc, *child),
        _ => false,
    })
}

/// The nested `Policy` scope of an assertion.
pub fn nested_policy(doc: &Document, node: NodeId) -> Option<NodeId> {
    find_first(doc, node, AssertionKind::Policy)
}

/// The node that holds the refinements of `node`.
///
/// Accepts both the compact `Policy → assertions` form and the normalized
/// `Policy → ExactlyOne → All → assertions` form.
pub fn nested_container(doc: &Document, node: NodeId) -> Option<NodeId> {
    let policy = nested_policy(doc, node)?;
    Some(normalized_interior(doc, policy).unwrap_or(policy))
}

/// `All` inside `Policy → ExactlyOne → All`, if the policy is normalized.
pub fn normalized_interior(doc: &Document, policy: NodeId) -> Option<NodeId> {
    let one = find_first(doc, policy, AssertionKind::ExactlyOne)?;
    find_first(doc, one, AssertionKind::All)
}

/// Create (or reuse) the nested scope of `node` and return its container.
pub fn create_nested_wrapper(tx: &mut Transaction<'_>, node: NodeId) -> NodeId {
    if let Some(existing) = nested_container(tx, node) {
        return existing;
    }
    create_or_get(tx, node, AssertionKind::Policy)
}

/// A child of `kind` inside the nested scope of `node`.
pub fn find_nested(doc: &Document, node: NodeId, kind: AssertionKind) -> Option<NodeId> {
    let container = nested_container(doc, node)?;
    find_first(doc, container, kind)
}

/// Create-or-get `kind` inside the nested scope of `node`.
pub fn create_nested(tx: &mut Transaction<'_>, node: NodeId, kind: AssertionKind) -> NodeId {
    let container = create_nested_wrapper(tx, node);
    create_or_get(tx, container, kind)
}

/// Move every child of `from` matching `pred` under `to`, preserving order.
pub fn move_where(
    tx: &mut Transaction<'_>,
    from: NodeId,
    to: NodeId,
    pred: impl Fn(AssertionKind) -> bool,
) -> usize {
    let moving: Vec<NodeId> = tx
        .children(from)
        .iter()
        .copied()
        .filter(|child| tx.assertion_kind(*child).is_some_and(&pred))
        .collect();
    for child in &moving {
        tx.append(to, *child);
    }
    moving.len()
}
