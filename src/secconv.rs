//! Secure conversation: moving a binding's security into a bootstrap policy.
//!
//! Enabled shape:
//!
//! ```text
//! SymmetricBinding
//!   Policy
//!     ProtectionToken
//!       Policy
//!         SecureConversationToken IncludeToken=AlwaysToRecipient
//!           Policy
//!             RequireDerivedKeys
//!             BootstrapPolicy
//!               Policy
//!                 <original binding>, Wss1x, Trust, supporting tokens, targets
//! Wss11 (+3 reference flags)
//! Trust  (+3 flags)
//! ```
//!
//! Nodes are moved, not copied, so identity of the bootstrap content is
//! preserved across enable/disable.

use tracing::{debug, info};

use crate::assertion::AssertionKind;
use crate::binding::{
    algorithm_suite_of, binding_flag_of, disable_trust_in, disable_wss_in, enable_trust_in,
    enable_wss_in, require_binding_scope, security_binding_in, set_algorithm_suite_on,
    set_binding_flag_on, set_layout_on, set_trust_flag_on, set_wss_reference_on, AlgorithmSuite,
    BindingFlag, BindingKind, Layout, TrustFlag, WssReference, WssVersion,
};
use crate::error::PolicyError;
use crate::model::{Document, NodeId, Transaction};
use crate::policy::{cleanup, policy_container};
use crate::rm::is_rm_enabled;
use crate::targets::set_default_targets_in;
use crate::tokens::{
    set_token_inclusion_level, set_token_slot, token_in_slot, token_type, InclusionLevel, TokenSlot,
    TokenType,
};
use crate::tree;

fn is_bootstrap_content(kind: AssertionKind) -> bool {
    matches!(
        kind,
        AssertionKind::Wss10 | AssertionKind::Wss11 | AssertionKind::Trust10 | AssertionKind::Trust13
    ) || kind.is_supporting_tokens()
}

/// Whether a security binding node protects messages with a secure
/// conversation token.
pub fn is_secure_conversation_binding(doc: &Document, binding: NodeId) -> bool {
    doc.assertion_kind(binding) == Some(AssertionKind::SymmetricBinding)
        && token_in_slot(doc, binding, TokenSlot::Protection)
            .and_then(|token| token_type(doc, token))
            == Some(TokenType::SecureConversation)
}

pub fn is_secure_conversation_enabled(doc: &Document, element: NodeId) -> bool {
    policy_container(doc, element)
        .and_then(|c| security_binding_in(doc, c))
        .is_some_and(|binding| is_secure_conversation_binding(doc, binding))
}

/// Container of the bootstrap policy under a secure conversation binding.
pub fn bootstrap_container(doc: &Document, binding: NodeId) -> Option<NodeId> {
    let token = token_in_slot(doc, binding, TokenSlot::Protection)?;
    let bootstrap = tree::find_nested(doc, token, AssertionKind::BootstrapPolicy)?;
    tree::nested_container(doc, bootstrap)
}

/// Turn secure conversation on or off for a binding or operation.
pub fn set_secure_conversation(
    tx: &mut Transaction<'_>,
    element: NodeId,
    enable: bool,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if enable {
        enable_secure_conversation(tx, element)
    } else {
        disable_secure_conversation(tx, element)
    }
}

fn enable_secure_conversation(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    let container = policy_container(tx, element)
        .ok_or_else(|| PolicyError::NoSecurityBinding(tx.describe(element)))?;
    let original = security_binding_in(tx, container)
        .ok_or_else(|| PolicyError::NoSecurityBinding(tx.describe(element)))?;
    if is_secure_conversation_binding(tx, original) {
        debug!(element = %tx.describe(element), "Secure conversation already enabled");
        return Ok(());
    }

    let suite = algorithm_suite_of(tx, original).unwrap_or(AlgorithmSuite::Basic128);
    let flags: Vec<BindingFlag> = BindingFlag::ALL
        .into_iter()
        .filter(|flag| binding_flag_of(tx, original, *flag))
        .collect();
    let rm = tx
        .owning_binding(element)
        .is_some_and(|binding| is_rm_enabled(tx, binding));

    tx.detach(original);
    let outer = tree::create_or_get(tx, container, BindingKind::Symmetric.assertion_kind());
    let token = set_token_slot(tx, outer, TokenSlot::Protection, TokenType::SecureConversation)?;
    set_token_inclusion_level(tx, token, InclusionLevel::AlwaysToRecipient)?;
    tree::create_nested(tx, token, AssertionKind::RequireDerivedKeys);
    let bootstrap = tree::create_nested(tx, token, AssertionKind::BootstrapPolicy);
    let inner = tree::create_nested_wrapper(tx, bootstrap);

    tx.append(inner, original);
    tree::move_where(tx, container, inner, is_bootstrap_content);
    set_default_targets_in(tx, inner, true, rm)?;

    set_layout_on(tx, outer, Layout::Strict);
    set_algorithm_suite_on(tx, outer, suite);
    for flag in flags {
        set_binding_flag_on(tx, outer, flag, true);
    }

    let wss = enable_wss_in(tx, container, WssVersion::Wss11);
    for reference in [WssReference::IssuerSerial, WssReference::Thumbprint, WssReference::EncryptedKey] {
        set_wss_reference_on(tx, wss, reference, true);
    }
    let trust = enable_trust_in(tx, container);
    for flag in TrustFlag::ALL {
        set_trust_flag_on(tx, trust, flag, true);
    }

    info!(element = %tx.describe(element), "Secure conversation enabled");
    Ok(())
}

fn disable_secure_conversation(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    let not_enabled = || PolicyError::SecureConversationNotEnabled(tx.describe(element));
    let container = policy_container(tx, element).ok_or_else(not_enabled)?;
    let outer = security_binding_in(tx, container).ok_or_else(not_enabled)?;
    if !is_secure_conversation_binding(tx, outer) {
        return Err(not_enabled());
    }

    // All preconditions are checked before anything moves.
    let inner = bootstrap_container(tx, outer).ok_or_else(|| {
        PolicyError::UnexpectedShape(format!("{} has no bootstrap policy", tx.describe(element)))
    })?;
    let original = security_binding_in(tx, inner).ok_or_else(|| {
        PolicyError::UnexpectedShape(format!(
            "bootstrap policy of {} has no security binding",
            tx.describe(element)
        ))
    })?;
    if is_secure_conversation_binding(tx, original) {
        return Err(PolicyError::UnexpectedShape(format!(
            "nested secure conversation on {}",
            tx.describe(element)
        )));
    }

    disable_wss_in(tx, container);
    disable_trust_in(tx, container);
    tree::remove_where(tx, container, AssertionKind::is_supporting_tokens);
    tx.detach(original);
    tree::move_where(tx, inner, container, is_bootstrap_content);
    tx.remove_subtree(outer);
    tx.append(container, original);
    cleanup(tx);

    info!(element = %tx.describe(element), "Secure conversation disabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{binding_kind, layout, wss_version};
    use crate::builder::apply;
    use crate::profile::{classify, SecurityProfile};
    use crate::version::ConfigVersion;

    fn with_profile(profile: SecurityProfile) -> (Document, NodeId) {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        doc.add_operation(binding, "op");
        doc.transact(|tx| apply(tx, binding, profile, false)).unwrap();
        (doc, binding)
    }

    #[test]
    fn test_enable_wraps_binding() {
        let (mut doc, binding) = with_profile(SecurityProfile::MutualCertificates);
        doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
        assert!(is_secure_conversation_enabled(&doc, binding));
        assert_eq!(binding_kind(&doc, binding), Some(BindingKind::Symmetric));
        assert_eq!(layout(&doc, binding), Some(Layout::Strict));
        assert_eq!(wss_version(&doc, binding), Some(WssVersion::Wss11));
        assert_eq!(classify(&doc, binding), SecurityProfile::MutualCertificates);

        let outer = security_binding_in(&doc, policy_container(&doc, binding).unwrap()).unwrap();
        let inner = bootstrap_container(&doc, outer).unwrap();
        let nested = security_binding_in(&doc, inner).unwrap();
        assert_eq!(doc.assertion_kind(nested), Some(AssertionKind::AsymmetricBinding));
        assert!(tree::find_first(&doc, inner, AssertionKind::Wss10).is_some());
    }

    #[test]
    fn test_enable_is_idempotent() {
        let (mut doc, binding) = with_profile(SecurityProfile::Kerberos);
        doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
        let policy = crate::policy::policy_for_element(&doc, binding).unwrap();
        let first = doc.snapshot(policy);
        doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
        assert_eq!(first, doc.snapshot(policy));
    }

    #[test]
    fn test_roundtrip_restores_profile() {
        let (mut doc, binding) = with_profile(SecurityProfile::MutualCertificates);
        doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
        doc.transact(|tx| set_secure_conversation(tx, binding, false)).unwrap();
        assert!(!is_secure_conversation_enabled(&doc, binding));
        assert_eq!(classify(&doc, binding), SecurityProfile::MutualCertificates);
        assert_eq!(wss_version(&doc, binding), Some(WssVersion::Wss10));
        assert!(!crate::binding::is_trust_enabled(&doc, binding));
    }

    #[test]
    fn test_disable_when_not_enabled_fails_without_mutation() {
        let (mut doc, binding) = with_profile(SecurityProfile::Kerberos);
        let policy = crate::policy::policy_for_element(&doc, binding).unwrap();
        let before = doc.snapshot(policy);
        let err = doc
            .transact(|tx| set_secure_conversation(tx, binding, false))
            .unwrap_err();
        assert_eq!(err.code().as_str(), "SECURE_CONVERSATION_NOT_ENABLED");
        assert_eq!(before, doc.snapshot(policy));
    }

    #[test]
    fn test_disable_rejects_hand_built_shape() {
        let (mut doc, binding) = with_profile(SecurityProfile::Kerberos);
        let err = doc
            .transact(|tx| {
                let container = policy_container(tx, binding).unwrap();
                let sb = security_binding_in(tx, container).unwrap();
                set_token_slot(tx, sb, TokenSlot::Protection, TokenType::SecureConversation)?;
                set_secure_conversation(tx, binding, false)
            })
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnexpectedShape(_)));
    }

    #[test]
    fn test_enable_without_binding_fails() {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        let err = doc
            .transact(|tx| set_secure_conversation(tx, binding, true))
            .unwrap_err();
        assert!(matches!(err, PolicyError::NoSecurityBinding(_)));
    }
}
