//! Message-level protection targets.
//!
//! Which parts of a message are signed, encrypted or required, expressed as
//! `SignedParts`, `EncryptedParts`, `SignedElements`, `EncryptedElements`,
//! `RequiredElements` and `RequiredParts` in a message policy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assertion::AssertionKind;
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId, Transaction};
use crate::policy::{attach_policy, policy_container};
use crate::tree;
use crate::version::{ConfigVersion, WSA_NS};

/// WS-Addressing headers signed by default.
pub const ADDRESSING_HEADERS: [&str; 7] =
    ["To", "From", "FaultTo", "ReplyTo", "MessageID", "RelatesTo", "Action"];

/// WS-RM headers signed by default when reliable messaging is on.
pub const RM_HEADERS: [&str; 3] = ["Sequence", "SequenceAcknowledgement", "AckRequested"];

/// What part of a message a target addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetKind {
    Body,
    Attachments,
    Header { name: String, namespace: String },
    XPath { expression: String },
}

/// A message part and the protections applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTarget {
    pub kind: TargetKind,
    #[serde(default)]
    pub sign: bool,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub require: bool,
}

impl MessageTarget {
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            sign: false,
            encrypt: false,
            require: false,
        }
    }

    pub fn signed(mut self) -> Self {
        self.sign = true;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.require = true;
        self
    }

    pub fn header(name: &str, namespace: &str) -> Self {
        Self::new(TargetKind::Header {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    fn is_active(&self) -> bool {
        self.sign || self.encrypt || self.require
    }
}

/// Body signed and encrypted, plus signed addressing headers when
/// `headers` is set and signed RM headers when `rm` is also set.
pub fn default_targets(version: ConfigVersion, headers: bool, rm: bool) -> Vec<MessageTarget> {
    let mut targets = vec![MessageTarget::new(TargetKind::Body).signed().encrypted()];
    if headers {
        targets.extend(
            ADDRESSING_HEADERS
                .iter()
                .map(|name| MessageTarget::header(name, WSA_NS).signed()),
        );
        if rm {
            targets.extend(
                RM_HEADERS
                    .iter()
                    .map(|name| MessageTarget::header(name, version.rm_protocol_ns()).signed()),
            );
        }
    }
    targets
}

fn validate(version: ConfigVersion, targets: &[MessageTarget]) -> Result<(), PolicyError> {
    for target in targets {
        match &target.kind {
            TargetKind::Body if target.require => {
                return Err(PolicyError::InvalidTarget("the body cannot be required".into()))
            }
            TargetKind::Attachments if target.require => {
                return Err(PolicyError::InvalidTarget("attachments cannot be required".into()))
            }
            TargetKind::Attachments if version == ConfigVersion::Legacy => {
                return Err(PolicyError::unsupported("attachment protection", version))
            }
            TargetKind::Header { name, .. } if name.is_empty() => {
                return Err(PolicyError::InvalidTarget("header without a name".into()))
            }
            TargetKind::Header { .. } if target.require && version == ConfigVersion::Legacy => {
                return Err(PolicyError::unsupported("RequiredParts", version))
            }
            TargetKind::XPath { expression } if expression.trim().is_empty() => {
                return Err(PolicyError::InvalidTarget("empty XPath expression".into()))
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_target_assertion(kind: AssertionKind) -> bool {
    kind.is_message_target()
}

#[derive(Clone, Copy)]
enum Protection {
    Sign,
    Encrypt,
    Require,
}

fn protection_of(kind: AssertionKind) -> Option<Protection> {
    match kind {
        AssertionKind::SignedParts | AssertionKind::SignedElements => Some(Protection::Sign),
        AssertionKind::EncryptedParts | AssertionKind::EncryptedElements => Some(Protection::Encrypt),
        AssertionKind::RequiredParts | AssertionKind::RequiredElements => Some(Protection::Require),
        _ => None,
    }
}

fn part_kind(doc: &Document, part: NodeId) -> Option<TargetKind> {
    let text = |attr| doc.attr(part, attr).unwrap_or_default().to_string();
    match doc.assertion_kind(part)? {
        AssertionKind::Body => Some(TargetKind::Body),
        AssertionKind::Attachments => Some(TargetKind::Attachments),
        AssertionKind::Header => Some(TargetKind::Header {
            name: text(Attr::Name),
            namespace: text(Attr::Namespace),
        }),
        AssertionKind::XPath => Some(TargetKind::XPath {
            expression: text(Attr::Text),
        }),
        _ => None,
    }
}

/// Read the targets of a message policy container, merged per part in
/// order of first appearance.
pub fn targets_in(doc: &Document, container: NodeId) -> Vec<MessageTarget> {
    let mut found: Vec<MessageTarget> = Vec::new();
    for holder in doc.children(container) {
        let Some(protection) = doc.assertion_kind(*holder).and_then(protection_of) else {
            continue;
        };
        for part in doc.children(*holder) {
            let Some(kind) = part_kind(doc, *part) else {
                continue;
            };
            let index = match found.iter().position(|t| t.kind == kind) {
                Some(index) => index,
                None => {
                    found.push(MessageTarget::new(kind));
                    found.len() - 1
                }
            };
            let target = &mut found[index];
            match protection {
                Protection::Sign => target.sign = true,
                Protection::Encrypt => target.encrypt = true,
                Protection::Require => target.require = true,
            }
        }
    }
    found
}

/// Targets of `element`'s message policy.
pub fn targets(doc: &Document, element: NodeId) -> Vec<MessageTarget> {
    policy_container(doc, element)
        .map(|container| targets_in(doc, container))
        .unwrap_or_default()
}

fn write_part(tx: &mut Transaction<'_>, container: NodeId, holder_kind: AssertionKind, kind: &TargetKind) {
    let holder = tree::create_or_get(tx, container, holder_kind);
    let (assertion, attrs): (AssertionKind, Vec<(Attr, &str)>) = match kind {
        TargetKind::Body => (AssertionKind::Body, Vec::new()),
        TargetKind::Attachments => (AssertionKind::Attachments, Vec::new()),
        TargetKind::Header { name, namespace } => (
            AssertionKind::Header,
            vec![(Attr::Name, name.as_str()), (Attr::Namespace, namespace.as_str())],
        ),
        TargetKind::XPath { expression } => (AssertionKind::XPath, vec![(Attr::Text, expression.as_str())]),
    };
    if matches!(assertion, AssertionKind::Body | AssertionKind::Attachments)
        && tree::find_first(tx, holder, assertion).is_some()
    {
        return;
    }
    let part = tx.create(assertion);
    for (attr, value) in attrs {
        tx.set_attr(part, attr, value);
    }
    tx.append(holder, part);
}

/// Replace every target assertion in `container` with `targets`.
pub fn set_targets_in(
    tx: &mut Transaction<'_>,
    container: NodeId,
    targets: &[MessageTarget],
) -> Result<(), PolicyError> {
    validate(tx.version(), targets)?;
    tree::remove_where(tx, container, is_target_assertion);
    for target in targets.iter().filter(|t| t.is_active()) {
        let is_element = matches!(target.kind, TargetKind::XPath { .. });
        if target.sign {
            let holder = if is_element { AssertionKind::SignedElements } else { AssertionKind::SignedParts };
            write_part(tx, container, holder, &target.kind);
        }
        if target.encrypt {
            let holder = if is_element { AssertionKind::EncryptedElements } else { AssertionKind::EncryptedParts };
            write_part(tx, container, holder, &target.kind);
        }
        if target.require {
            let holder = if is_element { AssertionKind::RequiredElements } else { AssertionKind::RequiredParts };
            write_part(tx, container, holder, &target.kind);
        }
    }
    Ok(())
}

/// Replace the targets of `element`'s message policy.
pub fn set_targets(
    tx: &mut Transaction<'_>,
    element: NodeId,
    targets: &[MessageTarget],
) -> Result<(), PolicyError> {
    validate(tx.version(), targets)?;
    debug!(element = %tx.describe(element), count = targets.len(), "Setting message targets");
    let container = if targets.iter().any(MessageTarget::is_active) {
        attach_policy(tx, element, false)?
    } else {
        policy_container(tx, element)
    };
    match container {
        Some(container) => set_targets_in(tx, container, targets),
        None => Ok(()),
    }
}

/// Remove every target of `element`.
pub fn clear_targets(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    set_targets(tx, element, &[])
}

pub fn set_default_targets_in(tx: &mut Transaction<'_>, container: NodeId, headers: bool, rm: bool) -> Result<(), PolicyError> {
    let targets = default_targets(tx.version(), headers, rm);
    set_targets_in(tx, container, &targets)
}

pub fn set_default_targets(tx: &mut Transaction<'_>, element: NodeId, headers: bool, rm: bool) -> Result<(), PolicyError> {
    let targets = default_targets(tx.version(), headers, rm);
    set_targets(tx, element, &targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(version: ConfigVersion) -> (Document, NodeId) {
        let mut doc = Document::new(version);
        let binding = doc.add_binding("B");
        let op = doc.add_operation(binding, "op");
        let input = doc.binding_input(op).unwrap();
        (doc, input)
    }

    #[test]
    fn test_default_targets_roundtrip() {
        let (mut doc, input) = setup(ConfigVersion::Current);
        let mut tx = doc.begin();
        set_default_targets(&mut tx, input, true, true).unwrap();
        let read = targets(&tx, input);
        assert_eq!(read.len(), 1 + ADDRESSING_HEADERS.len() + RM_HEADERS.len());
        let body = read.iter().find(|t| t.kind == TargetKind::Body).unwrap();
        assert!(body.sign && body.encrypt && !body.require);
        assert!(read.iter().any(|t| t.kind
            == TargetKind::Header {
                name: "Action".into(),
                namespace: WSA_NS.into()
            }));
    }

    #[test]
    fn test_body_only_without_headers() {
        let (mut doc, input) = setup(ConfigVersion::Legacy);
        let mut tx = doc.begin();
        set_default_targets(&mut tx, input, false, true).unwrap();
        assert_eq!(targets(&tx, input).len(), 1);
    }

    #[test]
    fn test_set_targets_is_idempotent() {
        let (mut doc, input) = setup(ConfigVersion::Current);
        let mut tx = doc.begin();
        set_default_targets(&mut tx, input, true, false).unwrap();
        let policy = crate::policy::policy_for_element(&tx, input).unwrap();
        let first = tx.snapshot(policy);
        set_default_targets(&mut tx, input, true, false).unwrap();
        assert_eq!(first, tx.snapshot(policy));
    }

    #[test]
    fn test_require_body_is_invalid() {
        let (mut doc, input) = setup(ConfigVersion::Current);
        let mut tx = doc.begin();
        let err = set_targets(&mut tx, input, &[MessageTarget::new(TargetKind::Body).required()]).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidTarget(_)));
    }

    #[test]
    fn test_require_header_only_in_current() {
        let header = MessageTarget::header("Security", "urn:x").required();
        let (mut legacy, input) = setup(ConfigVersion::Legacy);
        let mut tx = legacy.begin();
        assert!(set_targets(&mut tx, input, &[header.clone()]).is_err());
        drop(tx);

        let (mut current, input) = setup(ConfigVersion::Current);
        let mut tx = current.begin();
        set_targets(&mut tx, input, &[header.clone()]).unwrap();
        assert_eq!(targets(&tx, input), vec![header]);
    }

    #[test]
    fn test_xpath_targets_use_element_assertions() {
        let (mut doc, input) = setup(ConfigVersion::Current);
        let mut tx = doc.begin();
        let xpath = MessageTarget::new(TargetKind::XPath {
            expression: "//ns:Amount".into(),
        })
        .signed()
        .required();
        set_targets(&mut tx, input, &[xpath.clone()]).unwrap();
        let container = policy_container(&tx, input).unwrap();
        assert!(tree::find_first(&tx, container, AssertionKind::SignedElements).is_some());
        assert!(tree::find_first(&tx, container, AssertionKind::RequiredElements).is_some());
        assert_eq!(targets(&tx, input), vec![xpath]);
    }

    #[test]
    fn test_clear_targets_leaves_empty_policy() {
        let (mut doc, input) = setup(ConfigVersion::Current);
        let mut tx = doc.begin();
        set_default_targets(&mut tx, input, false, false).unwrap();
        clear_targets(&mut tx, input).unwrap();
        assert!(targets(&tx, input).is_empty());
        let policy = crate::policy::policy_for_element(&tx, input).unwrap();
        assert!(tree::is_empty(&tx, policy));
    }
}
