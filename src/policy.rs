//! Policy attachment and normalization.
//!
//! Every attachable WSDL element references at most one top-level policy
//! through a `PolicyReference`. The policy itself is kept in the normalized
//! `Policy → ExactlyOne → All` shape; callers receive the `All` node.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assertion::{addressing_marker, AssertionKind};
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId, Transaction, WsdlKind};
use crate::tree;

/// URI of the policy referenced by `element`.
pub fn policy_uri(doc: &Document, element: NodeId) -> Option<String> {
    let reference = tree::find_first(doc, element, AssertionKind::PolicyReference)?;
    doc.attr(reference, Attr::Uri).map(str::to_string)
}

fn policy_id_from_uri(uri: &str) -> &str {
    uri.strip_prefix('#').unwrap_or(uri)
}

/// The policy attached to `element`, by reference or inline.
pub fn policy_for_element(doc: &Document, element: NodeId) -> Option<NodeId> {
    if let Some(uri) = policy_uri(doc, element) {
        return doc.find_policy_by_id(policy_id_from_uri(&uri));
    }
    tree::find_first(doc, element, AssertionKind::Policy)
}

/// The assertion container of the policy attached to `element`.
pub fn policy_container(doc: &Document, element: NodeId) -> Option<NodeId> {
    let policy = policy_for_element(doc, element)?;
    Some(tree::normalized_interior(doc, policy).unwrap_or(policy))
}

/// Generated policy id for an element, before collision handling.
pub fn base_policy_name(doc: &Document, element: NodeId) -> Option<String> {
    let label = |id: NodeId| doc.name(id).unwrap_or("unnamed").to_string();
    let kind = doc.wsdl_kind(element)?;
    let binding = doc.owning_binding(element).map(label)?;
    let operation = || {
        let mut current = Some(element);
        while let Some(node) = current {
            if doc.wsdl_kind(node) == Some(WsdlKind::BindingOperation) {
                return label(node);
            }
            current = doc.parent(node);
        }
        "unnamed".to_string()
    };
    Some(match kind {
        WsdlKind::Binding => format!("{}Policy", binding),
        WsdlKind::BindingOperation => format!("{}_{}_Policy", binding, operation()),
        WsdlKind::BindingInput => format!("{}_{}_Input_Policy", binding, operation()),
        WsdlKind::BindingOutput => format!("{}_{}_Output_Policy", binding, operation()),
        WsdlKind::BindingFault => format!(
            "{}_{}_{}_Fault_Policy",
            binding,
            operation(),
            label(element)
        ),
        _ => return None,
    })
}

fn unique_policy_name(doc: &Document, base: String) -> String {
    if doc.find_policy_by_id(&base).is_none() {
        return base;
    }
    (1..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| doc.find_policy_by_id(candidate).is_none())
        .unwrap_or(base)
}

fn require_attachable(doc: &Document, element: NodeId) -> Result<(), PolicyError> {
    match doc.wsdl_kind(element) {
        Some(kind) if kind.is_attachable() => Ok(()),
        _ => Err(PolicyError::NotAttachable(doc.describe(element))),
    }
}

/// Return the `All` container of `element`'s policy, creating and
/// referencing a fresh policy when there is none.
///
/// A detached element yields `Ok(None)`. When `wants_addressing` is set and
/// `element` is a binding, the version's addressing marker is ensured.
pub fn attach_policy(
    tx: &mut Transaction<'_>,
    element: NodeId,
    wants_addressing: bool,
) -> Result<Option<NodeId>, PolicyError> {
    require_attachable(tx, element)?;
    if !tx.is_attached(element) {
        warn!(element = %tx.describe(element), "Element is not part of a document, skipping");
        return Ok(None);
    }

    let policy = match policy_for_element(tx, element) {
        Some(policy) => policy,
        None => {
            let Some(base) = base_policy_name(tx, element) else {
                return Ok(None);
            };
            let id = unique_policy_name(tx, base);
            let policy = tx.create(AssertionKind::Policy);
            tx.set_attr(policy, Attr::Id, id.as_str());
            let root = tx.root();
            tx.append(root, policy);
            set_reference(tx, element, &format!("#{}", id));
            debug!(element = %tx.describe(element), policy = %id, "Policy attached");
            policy
        }
    };

    let one = tree::create_or_get(tx, policy, AssertionKind::ExactlyOne);
    let all = tree::create_or_get(tx, one, AssertionKind::All);
    if wants_addressing && tx.wsdl_kind(element) == Some(WsdlKind::Binding) {
        let marker = addressing_marker(tx.version());
        tree::create_or_get(tx, all, marker);
    }
    Ok(Some(all))
}

fn set_reference(tx: &mut Transaction<'_>, element: NodeId, uri: &str) {
    tree::remove(tx, element, AssertionKind::PolicyReference);
    let reference = tx.create(AssertionKind::PolicyReference);
    tx.set_attr(reference, Attr::Uri, uri);
    tx.append(element, reference);
}

/// Point `element` at an existing policy by URI, replacing any previous
/// reference. The previous policy is left for [`cleanup`].
pub fn attach_policy_uri(
    tx: &mut Transaction<'_>,
    element: NodeId,
    uri: &str,
) -> Result<(), PolicyError> {
    require_attachable(tx, element)?;
    if policy_uri(tx, element).as_deref() == Some(uri) {
        return Ok(());
    }
    tree::remove(tx, element, AssertionKind::Policy);
    set_reference(tx, element, uri);
    Ok(())
}

/// Give `element` a private copy of its policy when other elements
/// reference the same one. Returns whether a copy was made.
pub fn fork_shared_policy(tx: &mut Transaction<'_>, element: NodeId) -> Result<bool, PolicyError> {
    require_attachable(tx, element)?;
    let Some(uri) = policy_uri(tx, element) else {
        return Ok(false);
    };
    let shared = tx
        .attachable_elements()
        .into_iter()
        .any(|other| other != element && policy_uri(tx, other).as_deref() == Some(uri.as_str()));
    if !shared {
        return Ok(false);
    }
    let (Some(policy), Some(base)) = (
        tx.find_policy_by_id(policy_id_from_uri(&uri)),
        base_policy_name(tx, element),
    ) else {
        return Ok(false);
    };

    let id = unique_policy_name(tx, base);
    let Some(copy) = tx.deep_copy(policy) else {
        return Ok(false);
    };
    tx.set_attr(copy, Attr::Id, id.as_str());
    let root = tx.root();
    tx.append(root, copy);
    set_reference(tx, element, &format!("#{}", id));
    debug!(element = %tx.describe(element), from = %uri, policy = %id, "Shared policy forked");
    Ok(true)
}

/// Drop `element`'s reference (and inline policy).
pub fn detach_policy(tx: &mut Transaction<'_>, element: NodeId) {
    tree::remove(tx, element, AssertionKind::PolicyReference);
    tree::remove(tx, element, AssertionKind::Policy);
}

/// Outcome of a [`cleanup`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub policies_removed: usize,
    pub references_removed: usize,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.policies_removed == 0 && self.references_removed == 0
    }
}

/// Remove empty or unreferenced top-level policies, inline empty policies,
/// and references that no longer resolve.
pub fn cleanup(tx: &mut Transaction<'_>) -> CleanupReport {
    let mut report = CleanupReport::default();
    let elements = tx.attachable_elements();

    let referenced: Vec<String> = elements
        .iter()
        .filter_map(|e| policy_uri(tx, *e))
        .map(|uri| policy_id_from_uri(&uri).to_string())
        .collect();

    for policy in tx.policies() {
        let id = tx.attr(policy, Attr::Id).unwrap_or_default().to_string();
        if tree::is_empty(tx, policy) || !referenced.contains(&id) {
            debug!(policy = %id, "Removing policy");
            tx.remove_subtree(policy);
            report.policies_removed += 1;
        }
    }

    for element in elements {
        if let Some(uri) = policy_uri(tx, element) {
            if tx.find_policy_by_id(policy_id_from_uri(&uri)).is_none() {
                tree::remove(tx, element, AssertionKind::PolicyReference);
                report.references_removed += 1;
            }
        }
        for inline in tree::find_all(tx, element, AssertionKind::Policy) {
            if tree::is_empty(tx, inline) {
                tx.remove_subtree(inline);
                report.policies_removed += 1;
            }
        }
    }

    if !report.is_noop() {
        info!(
            policies_removed = report.policies_removed,
            references_removed = report.references_removed,
            "Policy cleanup"
        );
    }
    report
}
