//! Security binding kind and its binding-wide refinements.
//!
//! A policy holds zero or one security binding assertion. Layout,
//! algorithm suite and the boolean binding flags live in the binding's
//! nested policy. WSS and Trust markers are siblings of the binding.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::assertion::{trust_marker, AssertionKind};
use crate::error::PolicyError;
use crate::model::{Document, NodeId, Transaction, WsdlKind};
use crate::policy::{attach_policy, policy_container};
use crate::tree;

/// Security binding families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Transport,
    Symmetric,
    Asymmetric,
}

impl BindingKind {
    pub const ALL: [BindingKind; 3] = [Self::Transport, Self::Symmetric, Self::Asymmetric];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Transport => AssertionKind::TransportBinding,
            Self::Symmetric => AssertionKind::SymmetricBinding,
            Self::Asymmetric => AssertionKind::AsymmetricBinding,
        }
    }

    pub fn from_assertion(kind: AssertionKind) -> Option<Self> {
        match kind {
            AssertionKind::TransportBinding => Some(Self::Transport),
            AssertionKind::SymmetricBinding => Some(Self::Symmetric),
            AssertionKind::AsymmetricBinding => Some(Self::Asymmetric),
            _ => None,
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.assertion_kind().local_name())
    }
}

/// Security header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    Strict,
    Lax,
    LaxTsFirst,
    LaxTsLast,
}

impl Layout {
    pub const ALL: [Layout; 4] = [Self::Strict, Self::Lax, Self::LaxTsFirst, Self::LaxTsLast];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Strict => AssertionKind::Strict,
            Self::Lax => AssertionKind::Lax,
            Self::LaxTsFirst => AssertionKind::LaxTsFirst,
            Self::LaxTsLast => AssertionKind::LaxTsLast,
        }
    }

    pub fn from_assertion(kind: AssertionKind) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.assertion_kind() == kind)
    }
}

/// Algorithm suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmSuite {
    Basic256,
    Basic192,
    Basic128,
    TripleDes,
    Basic256Rsa15,
    Basic192Rsa15,
    Basic128Rsa15,
    TripleDesRsa15,
    Basic256Sha256,
    Basic192Sha256,
    Basic128Sha256,
    TripleDesSha256,
}

impl AlgorithmSuite {
    pub const ALL: [AlgorithmSuite; 12] = [
        Self::Basic256,
        Self::Basic192,
        Self::Basic128,
        Self::TripleDes,
        Self::Basic256Rsa15,
        Self::Basic192Rsa15,
        Self::Basic128Rsa15,
        Self::TripleDesRsa15,
        Self::Basic256Sha256,
        Self::Basic192Sha256,
        Self::Basic128Sha256,
        Self::TripleDesSha256,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Basic256 => AssertionKind::Basic256,
            Self::Basic192 => AssertionKind::Basic192,
            Self::Basic128 => AssertionKind::Basic128,
            Self::TripleDes => AssertionKind::TripleDes,
            Self::Basic256Rsa15 => AssertionKind::Basic256Rsa15,
            Self::Basic192Rsa15 => AssertionKind::Basic192Rsa15,
            Self::Basic128Rsa15 => AssertionKind::Basic128Rsa15,
            Self::TripleDesRsa15 => AssertionKind::TripleDesRsa15,
            Self::Basic256Sha256 => AssertionKind::Basic256Sha256,
            Self::Basic192Sha256 => AssertionKind::Basic192Sha256,
            Self::Basic128Sha256 => AssertionKind::Basic128Sha256,
            Self::TripleDesSha256 => AssertionKind::TripleDesSha256,
        }
    }

    pub fn from_assertion(kind: AssertionKind) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.assertion_kind() == kind)
    }
}

/// Boolean refinements of a security binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingFlag {
    IncludeTimestamp,
    OnlySignEntireHeadersAndBody,
    EncryptSignature,
    EncryptBeforeSigning,
}

impl BindingFlag {
    pub const ALL: [BindingFlag; 4] = [
        Self::IncludeTimestamp,
        Self::OnlySignEntireHeadersAndBody,
        Self::EncryptSignature,
        Self::EncryptBeforeSigning,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::IncludeTimestamp => AssertionKind::IncludeTimestamp,
            Self::OnlySignEntireHeadersAndBody => AssertionKind::OnlySignEntireHeadersAndBody,
            Self::EncryptSignature => AssertionKind::EncryptSignature,
            Self::EncryptBeforeSigning => AssertionKind::EncryptBeforeSigning,
        }
    }
}

/// WSS marker versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WssVersion {
    Wss10,
    Wss11,
}

impl WssVersion {
    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Wss10 => AssertionKind::Wss10,
            Self::Wss11 => AssertionKind::Wss11,
        }
    }
}

/// Token reference mechanisms a WSS marker declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WssReference {
    KeyIdentifier,
    IssuerSerial,
    Thumbprint,
    EncryptedKey,
}

impl WssReference {
    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::KeyIdentifier => AssertionKind::MustSupportRefKeyIdentifier,
            Self::IssuerSerial => AssertionKind::MustSupportRefIssuerSerial,
            Self::Thumbprint => AssertionKind::MustSupportRefThumbprint,
            Self::EncryptedKey => AssertionKind::MustSupportRefEncryptedKey,
        }
    }
}

/// Trust marker flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustFlag {
    MustSupportIssuedTokens,
    RequireClientEntropy,
    RequireServerEntropy,
}

impl TrustFlag {
    pub const ALL: [TrustFlag; 3] = [
        Self::MustSupportIssuedTokens,
        Self::RequireClientEntropy,
        Self::RequireServerEntropy,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::MustSupportIssuedTokens => AssertionKind::MustSupportIssuedTokens,
            Self::RequireClientEntropy => AssertionKind::RequireClientEntropy,
            Self::RequireServerEntropy => AssertionKind::RequireServerEntropy,
        }
    }
}

/// Fail unless `element` is a binding or a binding operation.
pub fn require_binding_scope(doc: &Document, element: NodeId) -> Result<(), PolicyError> {
    match doc.wsdl_kind(element) {
        Some(WsdlKind::Binding | WsdlKind::BindingOperation) => Ok(()),
        _ => Err(PolicyError::NotBindingScope(doc.describe(element))),
    }
}

// ----------------------------------------------------------------------
// Binding kind
// ----------------------------------------------------------------------

/// The security binding assertion directly inside `container`.
pub fn security_binding_in(doc: &Document, container: NodeId) -> Option<NodeId> {
    tree::find_first_where(doc, container, AssertionKind::is_security_binding)
}

/// The security binding assertion of `element`'s policy.
pub fn security_binding(doc: &Document, element: NodeId) -> Option<NodeId> {
    security_binding_in(doc, policy_container(doc, element)?)
}

pub fn binding_kind_of(doc: &Document, node: NodeId) -> Option<BindingKind> {
    BindingKind::from_assertion(doc.assertion_kind(node)?)
}

pub fn binding_kind(doc: &Document, element: NodeId) -> Option<BindingKind> {
    binding_kind_of(doc, security_binding(doc, element)?)
}

/// Install `kind` as the only security binding of `element`, or remove
/// every binding kind when `kind` is `None`.
///
/// An existing binding of the requested kind is kept with its contents.
pub fn set_binding_kind(
    tx: &mut Transaction<'_>,
    element: NodeId,
    kind: Option<BindingKind>,
) -> Result<Option<NodeId>, PolicyError> {
    require_binding_scope(tx, element)?;
    debug!(element = %tx.describe(element), kind = ?kind, "Setting binding kind");

    let Some(kind) = kind else {
        if let Some(container) = policy_container(tx, element) {
            tree::remove_where(tx, container, AssertionKind::is_security_binding);
        }
        return Ok(None);
    };

    let Some(container) = attach_policy(tx, element, true)? else {
        return Ok(None);
    };
    let wanted = kind.assertion_kind();
    tree::remove_where(tx, container, |k| k.is_security_binding() && k != wanted);
    Ok(Some(tree::create_or_get(tx, container, wanted)))
}

fn required_binding(doc: &Document, element: NodeId) -> Result<NodeId, PolicyError> {
    require_binding_scope(doc, element)?;
    security_binding(doc, element).ok_or_else(|| PolicyError::NoSecurityBinding(doc.describe(element)))
}

// ----------------------------------------------------------------------
// Single-valued refinements: Layout and AlgorithmSuite
// ----------------------------------------------------------------------

fn set_choice(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    wrapper: AssertionKind,
    value: AssertionKind,
) {
    let holder = tree::create_nested(tx, binding, wrapper);
    let inner = tree::create_nested_wrapper(tx, holder);
    tree::remove_where(tx, inner, |k| k != value);
    tree::create_or_get(tx, inner, value);
}

fn choice_of(doc: &Document, binding: NodeId, wrapper: AssertionKind) -> Option<AssertionKind> {
    let holder = tree::find_nested(doc, binding, wrapper)?;
    let inner = tree::nested_container(doc, holder)?;
    doc.children(inner)
        .iter()
        .find_map(|child| doc.assertion_kind(*child))
}

pub fn set_layout_on(tx: &mut Transaction<'_>, binding: NodeId, layout: Layout) {
    set_choice(tx, binding, AssertionKind::Layout, layout.assertion_kind());
}

pub fn layout_of(doc: &Document, binding: NodeId) -> Option<Layout> {
    Layout::from_assertion(choice_of(doc, binding, AssertionKind::Layout)?)
}

pub fn set_layout(tx: &mut Transaction<'_>, element: NodeId, layout: Layout) -> Result<(), PolicyError> {
    let binding = required_binding(tx, element)?;
    set_layout_on(tx, binding, layout);
    Ok(())
}

pub fn layout(doc: &Document, element: NodeId) -> Option<Layout> {
    layout_of(doc, security_binding(doc, element)?)
}

pub fn set_algorithm_suite_on(tx: &mut Transaction<'_>, binding: NodeId, suite: AlgorithmSuite) {
    set_choice(tx, binding, AssertionKind::AlgorithmSuite, suite.assertion_kind());
}

pub fn algorithm_suite_of(doc: &Document, binding: NodeId) -> Option<AlgorithmSuite> {
    AlgorithmSuite::from_assertion(choice_of(doc, binding, AssertionKind::AlgorithmSuite)?)
}

pub fn set_algorithm_suite(
    tx: &mut Transaction<'_>,
    element: NodeId,
    suite: AlgorithmSuite,
) -> Result<(), PolicyError> {
    let binding = required_binding(tx, element)?;
    set_algorithm_suite_on(tx, binding, suite);
    Ok(())
}

pub fn algorithm_suite(doc: &Document, element: NodeId) -> Option<AlgorithmSuite> {
    algorithm_suite_of(doc, security_binding(doc, element)?)
}

// ----------------------------------------------------------------------
// Boolean binding flags
// ----------------------------------------------------------------------

pub fn set_binding_flag_on(tx: &mut Transaction<'_>, binding: NodeId, flag: BindingFlag, enable: bool) {
    let kind = flag.assertion_kind();
    if enable {
        tree::create_nested(tx, binding, kind);
    } else if let Some(container) = tree::nested_container(tx, binding) {
        tree::remove(tx, container, kind);
    }
}

pub fn binding_flag_of(doc: &Document, binding: NodeId, flag: BindingFlag) -> bool {
    tree::find_nested(doc, binding, flag.assertion_kind()).is_some()
}

pub fn set_binding_flag(
    tx: &mut Transaction<'_>,
    element: NodeId,
    flag: BindingFlag,
    enable: bool,
) -> Result<(), PolicyError> {
    let binding = required_binding(tx, element)?;
    set_binding_flag_on(tx, binding, flag, enable);
    Ok(())
}

pub fn binding_flag(doc: &Document, element: NodeId, flag: BindingFlag) -> bool {
    security_binding(doc, element).is_some_and(|b| binding_flag_of(doc, b, flag))
}

// ----------------------------------------------------------------------
// WSS markers
// ----------------------------------------------------------------------

fn is_wss_marker(kind: AssertionKind) -> bool {
    matches!(kind, AssertionKind::Wss10 | AssertionKind::Wss11)
}

pub fn wss_marker_in(doc: &Document, container: NodeId) -> Option<NodeId> {
    tree::find_first_where(doc, container, is_wss_marker)
}

/// Ensure exactly one WSS marker of `version` in `container`.
pub fn enable_wss_in(tx: &mut Transaction<'_>, container: NodeId, version: WssVersion) -> NodeId {
    let wanted = version.assertion_kind();
    tree::remove_where(tx, container, |k| is_wss_marker(k) && k != wanted);
    tree::create_or_get(tx, container, wanted)
}

pub fn disable_wss_in(tx: &mut Transaction<'_>, container: NodeId) {
    tree::remove_where(tx, container, is_wss_marker);
}

pub fn set_wss_reference_on(tx: &mut Transaction<'_>, wss: NodeId, reference: WssReference, enable: bool) {
    let kind = reference.assertion_kind();
    if enable {
        tree::create_nested(tx, wss, kind);
    } else if let Some(container) = tree::nested_container(tx, wss) {
        tree::remove(tx, container, kind);
    }
}

pub fn wss_reference_of(doc: &Document, wss: NodeId, reference: WssReference) -> bool {
    tree::find_nested(doc, wss, reference.assertion_kind()).is_some()
}

pub fn enable_wss(
    tx: &mut Transaction<'_>,
    element: NodeId,
    wss11: bool,
) -> Result<Option<NodeId>, PolicyError> {
    require_binding_scope(tx, element)?;
    let version = if wss11 { WssVersion::Wss11 } else { WssVersion::Wss10 };
    let Some(container) = attach_policy(tx, element, true)? else {
        return Ok(None);
    };
    Ok(Some(enable_wss_in(tx, container, version)))
}

pub fn disable_wss(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if let Some(container) = policy_container(tx, element) {
        disable_wss_in(tx, container);
    }
    Ok(())
}

pub fn wss_version(doc: &Document, element: NodeId) -> Option<WssVersion> {
    let marker = wss_marker_in(doc, policy_container(doc, element)?)?;
    match doc.assertion_kind(marker)? {
        AssertionKind::Wss11 => Some(WssVersion::Wss11),
        _ => Some(WssVersion::Wss10),
    }
}

/// Toggle a reference flag on `element`'s WSS marker. Enabling a flag
/// requires the marker to be present.
pub fn set_wss_reference(
    tx: &mut Transaction<'_>,
    element: NodeId,
    reference: WssReference,
    enable: bool,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let marker = policy_container(tx, element).and_then(|c| wss_marker_in(tx, c));
    match marker {
        Some(wss) => set_wss_reference_on(tx, wss, reference, enable),
        None if enable => {
            return Err(PolicyError::UnexpectedShape(format!(
                "no WSS marker on {}",
                tx.describe(element)
            )))
        }
        None => {}
    }
    Ok(())
}

pub fn wss_reference(doc: &Document, element: NodeId, reference: WssReference) -> bool {
    policy_container(doc, element)
        .and_then(|c| wss_marker_in(doc, c))
        .is_some_and(|wss| wss_reference_of(doc, wss, reference))
}

// ----------------------------------------------------------------------
// Trust markers
// ----------------------------------------------------------------------

fn is_trust_marker(kind: AssertionKind) -> bool {
    matches!(kind, AssertionKind::Trust10 | AssertionKind::Trust13)
}

pub fn trust_marker_in(doc: &Document, container: NodeId) -> Option<NodeId> {
    tree::find_first_where(doc, container, is_trust_marker)
}

/// Ensure the version's Trust marker in `container`.
pub fn enable_trust_in(tx: &mut Transaction<'_>, container: NodeId) -> NodeId {
    let wanted = trust_marker(tx.version());
    tree::remove_where(tx, container, |k| is_trust_marker(k) && k != wanted);
    tree::create_or_get(tx, container, wanted)
}

pub fn disable_trust_in(tx: &mut Transaction<'_>, container: NodeId) {
    tree::remove_where(tx, container, is_trust_marker);
}

pub fn set_trust_flag_on(tx: &mut Transaction<'_>, trust: NodeId, flag: TrustFlag, enable: bool) {
    let kind = flag.assertion_kind();
    if enable {
        tree::create_nested(tx, trust, kind);
    } else if let Some(container) = tree::nested_container(tx, trust) {
        tree::remove(tx, container, kind);
    }
}

pub fn trust_flag_of(doc: &Document, trust: NodeId, flag: TrustFlag) -> bool {
    tree::find_nested(doc, trust, flag.assertion_kind()).is_some()
}

pub fn enable_trust(tx: &mut Transaction<'_>, element: NodeId) -> Result<Option<NodeId>, PolicyError> {
    require_binding_scope(tx, element)?;
    let Some(container) = attach_policy(tx, element, true)? else {
        return Ok(None);
    };
    Ok(Some(enable_trust_in(tx, container)))
}

pub fn disable_trust(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if let Some(container) = policy_container(tx, element) {
        disable_trust_in(tx, container);
    }
    Ok(())
}

pub fn is_trust_enabled(doc: &Document, element: NodeId) -> bool {
    policy_container(doc, element).is_some_and(|c| trust_marker_in(doc, c).is_some())
}

pub fn set_trust_flag(
    tx: &mut Transaction<'_>,
    element: NodeId,
    flag: TrustFlag,
    enable: bool,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let marker = policy_container(tx, element).and_then(|c| trust_marker_in(tx, c));
    match marker {
        Some(trust) => set_trust_flag_on(tx, trust, flag, enable),
        None if enable => {
            return Err(PolicyError::UnexpectedShape(format!(
                "no Trust marker on {}",
                tx.describe(element)
            )))
        }
        None => {}
    }
    Ok(())
}

pub fn trust_flag(doc: &Document, element: NodeId, flag: TrustFlag) -> bool {
    policy_container(doc, element)
        .and_then(|c| trust_marker_in(doc, c))
        .is_some_and(|trust| trust_flag_of(doc, trust, flag))
}

/// Whether `element` carries a security binding or a WSS marker.
pub fn is_security_enabled(doc: &Document, element: NodeId) -> bool {
    policy_container(doc, element)
        .is_some_and(|c| security_binding_in(doc, c).is_some() || wss_marker_in(doc, c).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ConfigVersion;

    fn setup() -> (Document, NodeId) {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        doc.add_operation(binding, "op");
        (doc, binding)
    }

    #[test]
    fn test_binding_kind_exclusive() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        for kind in BindingKind::ALL {
            set_binding_kind(&mut tx, binding, Some(kind)).unwrap();
            assert_eq!(binding_kind(&tx, binding), Some(kind));
            let container = policy_container(&tx, binding).unwrap();
            let count = tx
                .children(container)
                .iter()
                .filter(|c| tx.assertion_kind(**c).is_some_and(AssertionKind::is_security_binding))
                .count();
            assert_eq!(count, 1);
        }
        set_binding_kind(&mut tx, binding, None).unwrap();
        assert_eq!(binding_kind(&tx, binding), None);
    }

    #[test]
    fn test_same_kind_keeps_node() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        let first = set_binding_kind(&mut tx, binding, Some(BindingKind::Symmetric)).unwrap();
        set_layout(&mut tx, binding, Layout::Strict).unwrap();
        let second = set_binding_kind(&mut tx, binding, Some(BindingKind::Symmetric)).unwrap();
        assert_eq!(first, second);
        assert_eq!(layout(&tx, binding), Some(Layout::Strict));
    }

    #[test]
    fn test_not_binding_scope() {
        let (mut doc, binding) = setup();
        let op = doc.operations(binding)[0];
        let input = doc.binding_input(op).unwrap();
        let mut tx = doc.begin();
        let err = set_binding_kind(&mut tx, input, Some(BindingKind::Transport)).unwrap_err();
        assert_eq!(err.code().as_str(), "NOT_BINDING_SCOPE");
    }

    #[test]
    fn test_layout_and_suite_are_independent() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        set_binding_kind(&mut tx, binding, Some(BindingKind::Asymmetric)).unwrap();
        set_layout(&mut tx, binding, Layout::Lax).unwrap();
        set_algorithm_suite(&mut tx, binding, AlgorithmSuite::Basic256Sha256).unwrap();
        set_layout(&mut tx, binding, Layout::Strict).unwrap();
        assert_eq!(layout(&tx, binding), Some(Layout::Strict));
        assert_eq!(algorithm_suite(&tx, binding), Some(AlgorithmSuite::Basic256Sha256));
    }

    #[test]
    fn test_layout_without_binding_fails() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        let err = set_layout(&mut tx, binding, Layout::Lax).unwrap_err();
        assert!(matches!(err, PolicyError::NoSecurityBinding(_)));
    }

    #[test]
    fn test_binding_flags() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        set_binding_kind(&mut tx, binding, Some(BindingKind::Symmetric)).unwrap();
        set_binding_flag(&mut tx, binding, BindingFlag::IncludeTimestamp, true).unwrap();
        set_binding_flag(&mut tx, binding, BindingFlag::IncludeTimestamp, true).unwrap();
        assert!(binding_flag(&tx, binding, BindingFlag::IncludeTimestamp));
        assert!(!binding_flag(&tx, binding, BindingFlag::EncryptSignature));
        set_binding_flag(&mut tx, binding, BindingFlag::IncludeTimestamp, false).unwrap();
        assert!(!binding_flag(&tx, binding, BindingFlag::IncludeTimestamp));
    }

    #[test]
    fn test_wss_version_switch() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        enable_wss(&mut tx, binding, false).unwrap();
        set_wss_reference(&mut tx, binding, WssReference::IssuerSerial, true).unwrap();
        assert_eq!(wss_version(&tx, binding), Some(WssVersion::Wss10));
        enable_wss(&mut tx, binding, true).unwrap();
        assert_eq!(wss_version(&tx, binding), Some(WssVersion::Wss11));
        assert!(!wss_reference(&tx, binding, WssReference::IssuerSerial));
        disable_wss(&mut tx, binding).unwrap();
        assert_eq!(wss_version(&tx, binding), None);
        assert!(set_wss_reference(&mut tx, binding, WssReference::Thumbprint, true).is_err());
        assert!(set_wss_reference(&mut tx, binding, WssReference::Thumbprint, false).is_ok());
    }

    #[test]
    fn test_trust_marker_per_version() {
        let mut doc = Document::new(ConfigVersion::Legacy);
        let binding = doc.add_binding("B");
        let mut tx = doc.begin();
        let trust = enable_trust(&mut tx, binding).unwrap().unwrap();
        assert_eq!(tx.assertion_kind(trust), Some(AssertionKind::Trust10));
        for flag in TrustFlag::ALL {
            set_trust_flag(&mut tx, binding, flag, true).unwrap();
            assert!(trust_flag(&tx, binding, flag));
        }
        disable_trust(&mut tx, binding).unwrap();
        assert!(!is_trust_enabled(&tx, binding));
    }
}
