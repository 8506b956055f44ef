//! Reliable messaging assertions on a binding policy.
//!
//! Current vocabulary:
//! `RMAssertion → Policy → { DeliveryAssurance → Policy → {ExactlyOnce|…, InOrder}, SequenceSTR|SequenceTransportSecurity }`.
//! Legacy vocabulary has no delivery-assurance container; ordering and
//! duplicate delivery are flat `Ordered` / `AllowDuplicates` assertions
//! next to `RMAssertion`, and the sequence binding is not expressible.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assertion::AssertionKind;
use crate::binding::require_binding_scope;
use crate::error::PolicyError;
use crate::model::{Document, NodeId, Transaction};
use crate::policy::{attach_policy, cleanup, policy_container};
use crate::tree;
use crate::version::ConfigVersion;

/// Message delivery guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryAssurance {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl DeliveryAssurance {
    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::AtMostOnce => AssertionKind::AtMostOnce,
            Self::AtLeastOnce => AssertionKind::AtLeastOnce,
            Self::ExactlyOnce => AssertionKind::ExactlyOnce,
        }
    }

    fn from_assertion(kind: AssertionKind) -> Option<Self> {
        match kind {
            AssertionKind::AtMostOnce => Some(Self::AtMostOnce),
            AssertionKind::AtLeastOnce => Some(Self::AtLeastOnce),
            AssertionKind::ExactlyOnce => Some(Self::ExactlyOnce),
            _ => None,
        }
    }
}

/// How an RM sequence is bound to the security context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceBinding {
    SecuredTransport,
    SecuredToken,
}

impl SequenceBinding {
    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::SecuredTransport => AssertionKind::SequenceTransportSecurity,
            Self::SecuredToken => AssertionKind::SequenceStr,
        }
    }
}

fn is_sequence_binding(kind: AssertionKind) -> bool {
    matches!(kind, AssertionKind::SequenceStr | AssertionKind::SequenceTransportSecurity)
}

fn rm_assertion(doc: &Document, element: NodeId) -> Option<NodeId> {
    tree::find_first(doc, policy_container(doc, element)?, AssertionKind::RmAssertion)
}

fn require_rm(doc: &Document, element: NodeId) -> Result<(NodeId, NodeId), PolicyError> {
    let container = policy_container(doc, element)
        .ok_or_else(|| PolicyError::RmNotEnabled(doc.describe(element)))?;
    let rm = tree::find_first(doc, container, AssertionKind::RmAssertion)
        .ok_or_else(|| PolicyError::RmNotEnabled(doc.describe(element)))?;
    Ok((container, rm))
}

pub fn is_rm_enabled(doc: &Document, element: NodeId) -> bool {
    rm_assertion(doc, element).is_some()
}

/// Add or remove the `RMAssertion` of a binding or operation. Disabling
/// also drops the legacy flat markers and runs cleanup.
pub fn enable_rm(tx: &mut Transaction<'_>, element: NodeId, enable: bool) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    debug!(element = %tx.describe(element), enable, "Setting reliable messaging");
    if enable {
        if let Some(container) = attach_policy(tx, element, true)? {
            tree::create_or_get(tx, container, AssertionKind::RmAssertion);
        }
        return Ok(());
    }
    if let Some(container) = policy_container(tx, element) {
        tree::remove_where(tx, container, |k| {
            matches!(
                k,
                AssertionKind::RmAssertion | AssertionKind::Ordered | AssertionKind::AllowDuplicates
            )
        });
        cleanup(tx);
    }
    Ok(())
}

/// Set the delivery guarantee. Requires reliable messaging to be on.
///
/// Legacy documents express only exactly-once (the default) and
/// at-least-once (`AllowDuplicates`).
pub fn set_delivery_assurance(
    tx: &mut Transaction<'_>,
    element: NodeId,
    assurance: DeliveryAssurance,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let (container, rm) = require_rm(tx, element)?;
    let version = tx.version();
    match version {
        ConfigVersion::Current => {
            let holder = tree::create_nested(tx, rm, AssertionKind::DeliveryAssurance);
            let inner = tree::create_nested_wrapper(tx, holder);
            tree::remove_where(tx, inner, |k| DeliveryAssurance::from_assertion(k).is_some());
            tree::create_or_get(tx, inner, assurance.assertion_kind());
        }
        ConfigVersion::Legacy => match assurance {
            DeliveryAssurance::AtMostOnce => {
                return Err(PolicyError::unsupported("AtMostOnce delivery", version))
            }
            DeliveryAssurance::AtLeastOnce => {
                tree::create_or_get(tx, container, AssertionKind::AllowDuplicates);
            }
            DeliveryAssurance::ExactlyOnce => {
                tree::remove(tx, container, AssertionKind::AllowDuplicates);
            }
        },
    }
    Ok(())
}

pub fn delivery_assurance(doc: &Document, element: NodeId) -> Option<DeliveryAssurance> {
    let (container, rm) = require_rm(doc, element).ok()?;
    if doc.version().nests_delivery_assurance() {
        let holder = tree::find_nested(doc, rm, AssertionKind::DeliveryAssurance)?;
        let inner = tree::nested_container(doc, holder)?;
        doc.children(inner)
            .iter()
            .find_map(|child| doc.assertion_kind(*child).and_then(DeliveryAssurance::from_assertion))
    } else if tree::find_first(doc, container, AssertionKind::AllowDuplicates).is_some() {
        Some(DeliveryAssurance::AtLeastOnce)
    } else {
        Some(DeliveryAssurance::ExactlyOnce)
    }
}

/// Toggle in-order delivery. Requires reliable messaging to be on.
pub fn set_ordered(tx: &mut Transaction<'_>, element: NodeId, ordered: bool) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let (container, rm) = require_rm(tx, element)?;
    match tx.version() {
        ConfigVersion::Current => {
            if ordered {
                let holder = tree::create_nested(tx, rm, AssertionKind::DeliveryAssurance);
                tree::create_nested(tx, holder, AssertionKind::InOrder);
            } else if let Some(holder) = tree::find_nested(tx, rm, AssertionKind::DeliveryAssurance) {
                if let Some(inner) = tree::nested_container(tx, holder) {
                    tree::remove(tx, inner, AssertionKind::InOrder);
                }
            }
        }
        ConfigVersion::Legacy => {
            if ordered {
                tree::create_or_get(tx, container, AssertionKind::Ordered);
            } else {
                tree::remove(tx, container, AssertionKind::Ordered);
            }
        }
    }
    Ok(())
}

pub fn is_ordered(doc: &Document, element: NodeId) -> bool {
    let Ok((container, rm)) = require_rm(doc, element) else {
        return false;
    };
    if doc.version().nests_delivery_assurance() {
        tree::find_nested(doc, rm, AssertionKind::DeliveryAssurance)
            .and_then(|holder| tree::find_nested(doc, holder, AssertionKind::InOrder))
            .is_some()
    } else {
        tree::find_first(doc, container, AssertionKind::Ordered).is_some()
    }
}

/// Set (`Some`) or clear (`None`) the sequence binding.
pub fn set_sequence_binding(
    tx: &mut Transaction<'_>,
    element: NodeId,
    binding: Option<SequenceBinding>,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let version = tx.version();
    if version == ConfigVersion::Legacy {
        return match binding {
            Some(_) => Err(PolicyError::unsupported("RM sequence binding", version)),
            None => Ok(()),
        };
    }
    let (_, rm) = require_rm(tx, element)?;
    match binding {
        Some(binding) => {
            let inner = tree::create_nested_wrapper(tx, rm);
            let wanted = binding.assertion_kind();
            tree::remove_where(tx, inner, |k| is_sequence_binding(k) && k != wanted);
            tree::create_or_get(tx, inner, wanted);
        }
        None => {
            if let Some(inner) = tree::nested_container(tx, rm) {
                tree::remove_where(tx, inner, is_sequence_binding);
            }
        }
    }
    Ok(())
}

pub fn sequence_binding(doc: &Document, element: NodeId) -> Option<SequenceBinding> {
    let rm = rm_assertion(doc, element)?;
    let inner = tree::nested_container(doc, rm)?;
    match doc.assertion_kind(tree::find_first_where(doc, inner, is_sequence_binding)?)? {
        AssertionKind::SequenceStr => Some(SequenceBinding::SecuredToken),
        _ => Some(SequenceBinding::SecuredTransport),
    }
}
