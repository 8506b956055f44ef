//! Integration tests for the wsitconf crate.
//!
//! These tests exercise the public API surface end-to-end, combining
//! the builder, classifier, secure conversation, reliable messaging,
//! runtime configuration and rendering together.

use proptest::prelude::*;

use wsitconf::binding::{
    binding_kind, enable_wss, is_trust_enabled, layout, security_binding, security_binding_in,
    set_binding_kind, set_layout, wss_reference, wss_version, BindingKind, Layout, WssReference,
    WssVersion,
};
use wsitconf::config::WsitConfig;
use wsitconf::model::TreeSnapshot;
use wsitconf::policy::{policy_container, policy_for_element};
use wsitconf::proprietary::{
    enable_sts, is_sts_enabled, set_store_location, store_location, Flavour, StoreKind,
};
use wsitconf::rm::{
    enable_rm, is_ordered, is_rm_enabled, sequence_binding, set_ordered, SequenceBinding,
};
use wsitconf::targets::targets;
use wsitconf::tokens::{
    supporting_token, supporting_token_type, token_in_slot, token_inclusion_level, token_type,
    InclusionLevel, SupportingModifier, TokenSlot, TokenType,
};
use wsitconf::{
    apply, apply_config, classify, cleanup, disable_security, is_secure_conversation_enabled,
    render_policies, set_secure_conversation, ConfigVersion, Document, NodeId, PolicyError,
    SecurityProfile,
};

// ============================================================================
// Helpers
// ============================================================================

/// Echo service with two request/response operations and one port.
fn echo_document(version: ConfigVersion) -> (Document, NodeId) {
    let mut doc = Document::new(version);
    let binding = doc.add_binding("EchoBinding");
    let echo = doc.add_operation(binding, "echo");
    doc.add_fault(echo, "EchoFault");
    doc.add_operation(binding, "ping");
    let service = doc.add_service("EchoService");
    doc.add_port(
        service,
        "EchoPort",
        "EchoBinding",
        "http://localhost:${HttpDefaultPort}/echo",
    );
    (doc, binding)
}

fn secured(version: ConfigVersion, profile: SecurityProfile) -> (Document, NodeId) {
    let (mut doc, binding) = echo_document(version);
    doc.transact(|tx| apply(tx, binding, profile, false)).unwrap();
    (doc, binding)
}

fn policy_snapshots(doc: &Document) -> Vec<TreeSnapshot> {
    doc.policies()
        .into_iter()
        .filter_map(|policy| doc.snapshot(policy))
        .collect()
}

fn message_profiles() -> impl Strategy<Value = SecurityProfile> {
    prop::sample::select(
        SecurityProfile::ALL
            .into_iter()
            .filter(|p| !p.is_ssl())
            .collect::<Vec<_>>(),
    )
}

fn any_profile() -> impl Strategy<Value = SecurityProfile> {
    prop::sample::select(SecurityProfile::ALL.to_vec())
}

fn any_version() -> impl Strategy<Value = ConfigVersion> {
    prop::sample::select(ConfigVersion::ALL.to_vec())
}

fn any_binding_kind() -> impl Strategy<Value = Option<BindingKind>> {
    prop::option::of(prop::sample::select(BindingKind::ALL.to_vec()))
}

// ============================================================================
// End-to-end: build and classify
// ============================================================================

#[test]
fn test_e2e_every_profile_in_both_versions() {
    for version in ConfigVersion::ALL {
        for profile in SecurityProfile::ALL {
            let (doc, binding) = secured(version, profile);
            assert_eq!(classify(&doc, binding), profile, "{:?} in {}", profile, version);
        }
    }
}

#[test]
fn test_e2e_kerberos_from_scratch() {
    let (mut doc, binding) = echo_document(ConfigVersion::Current);
    doc.transact(|tx| apply(tx, binding, SecurityProfile::Kerberos, false))
        .unwrap();

    assert_eq!(classify(&doc, binding), SecurityProfile::Kerberos);
    assert_eq!(binding_kind(&doc, binding), Some(BindingKind::Symmetric));
    let sb = security_binding(&doc, binding).unwrap();
    let token = token_in_slot(&doc, sb, TokenSlot::Protection).unwrap();
    assert_eq!(token_type(&doc, token), Some(TokenType::Kerberos));
    assert_eq!(token_inclusion_level(&doc, token), Some(InclusionLevel::Once));
    assert_eq!(layout(&doc, binding), Some(Layout::Strict));
    assert_eq!(wss_version(&doc, binding), Some(WssVersion::Wss11));
    for reference in [WssReference::IssuerSerial, WssReference::Thumbprint, WssReference::EncryptedKey] {
        assert!(wss_reference(&doc, binding, reference));
    }
    for modifier in SupportingModifier::ALL {
        assert!(supporting_token(&doc, binding, modifier).is_none());
    }
}

#[test]
fn test_e2e_saml_sender_then_transport() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::SamlSenderVouches);
    doc.transact(|tx| apply(tx, binding, SecurityProfile::Transport, false))
        .unwrap();
    assert_eq!(classify(&doc, binding), SecurityProfile::Transport);
    assert_eq!(binding_kind(&doc, binding), Some(BindingKind::Transport));
    for modifier in SupportingModifier::ALL {
        assert!(supporting_token(&doc, binding, modifier).is_none());
    }
}

#[test]
fn test_e2e_switch_profiles_on_same_binding() {
    let (mut doc, binding) = echo_document(ConfigVersion::Current);
    for profile in [
        SecurityProfile::StsIssuedSupportingToken,
        SecurityProfile::Transport,
        SecurityProfile::SamlSenderVouches,
        SecurityProfile::Kerberos,
    ] {
        doc.transact(|tx| apply(tx, binding, profile, true)).unwrap();
        assert_eq!(classify(&doc, binding), profile);
    }
    assert!(!is_trust_enabled(&doc, binding));
    assert_eq!(
        supporting_token_type(&doc, binding, SupportingModifier::SignedEncrypted),
        None
    );
    assert!(!wsitconf::is_service_url_https(&doc, binding));
}

#[test]
fn test_e2e_message_targets_follow_profile() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::MutualCertificates);
    let ping = doc.find_operation(binding, "ping").unwrap();
    let input = doc.binding_input(ping).unwrap();
    assert!(!targets(&doc, input).is_empty());

    doc.transact(|tx| apply(tx, binding, SecurityProfile::Transport, false))
        .unwrap();
    assert!(targets(&doc, input).is_empty());
}

#[test]
fn test_e2e_saml_sender_supporting_token() {
    let (doc, binding) = secured(ConfigVersion::Legacy, SecurityProfile::SamlSenderVouches);
    assert_eq!(
        supporting_token_type(&doc, binding, SupportingModifier::Signed),
        Some(TokenType::Saml)
    );
}

#[test]
fn test_e2e_disable_security_leaves_no_policies() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::StsIssuedToken);
    doc.transact(|tx| disable_security(tx, binding)).unwrap();
    assert_eq!(classify(&doc, binding), SecurityProfile::NotRecognized);
    assert!(doc.policies().is_empty());
}

#[test]
fn test_e2e_operation_profile_leaves_siblings_alone() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::MutualCertificates);
    let echo = doc.find_operation(binding, "echo").unwrap();
    let ping = doc.find_operation(binding, "ping").unwrap();
    let ping_input = doc.binding_input(ping).unwrap();
    assert_eq!(classify(&doc, ping), SecurityProfile::MutualCertificates);
    let ping_targets = targets(&doc, ping_input);
    let ping_policy = doc.snapshot(policy_for_element(&doc, ping_input).unwrap());

    doc.transact(|tx| apply(tx, echo, SecurityProfile::SamlSenderVouches, false))
        .unwrap();
    assert_eq!(classify(&doc, echo), SecurityProfile::SamlSenderVouches);
    assert_eq!(classify(&doc, ping), SecurityProfile::MutualCertificates);
    assert_eq!(classify(&doc, binding), SecurityProfile::MutualCertificates);
    for modifier in SupportingModifier::ALL {
        assert!(supporting_token(&doc, ping, modifier).is_none());
    }
    assert_eq!(targets(&doc, ping_input), ping_targets);
    assert_eq!(
        doc.snapshot(policy_for_element(&doc, ping_input).unwrap()),
        ping_policy
    );

    doc.transact(|tx| disable_security(tx, echo)).unwrap();
    assert!(targets(&doc, doc.binding_input(echo).unwrap()).is_empty());
    assert_eq!(targets(&doc, ping_input), ping_targets);
    assert_eq!(classify(&doc, ping), SecurityProfile::MutualCertificates);
}

#[test]
fn test_e2e_failed_transaction_keeps_earlier_edits() {
    let (mut doc, binding) = echo_document(ConfigVersion::Current);
    let commits = doc.commit_count();

    let err = doc
        .transact(|tx| {
            enable_wss(tx, binding, true)?;
            set_layout(tx, binding, Layout::Lax)
        })
        .unwrap_err();
    assert!(matches!(err, PolicyError::NoSecurityBinding(_)));
    assert_eq!(wss_version(&doc, binding), Some(WssVersion::Wss11));
    assert!(!doc.in_transaction());
    assert_eq!(doc.commit_count(), commits + 1);
}

// ============================================================================
// End-to-end: secure conversation and reliable messaging
// ============================================================================

#[test]
fn test_e2e_secure_conversation_survives_profile_switch() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::MutualCertificates);
    doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
    doc.transact(|tx| apply(tx, binding, SecurityProfile::Kerberos, false))
        .unwrap();
    assert!(is_secure_conversation_enabled(&doc, binding));
    assert_eq!(classify(&doc, binding), SecurityProfile::Kerberos);
    assert_eq!(binding_kind(&doc, binding), Some(BindingKind::Symmetric));
    assert_eq!(wss_version(&doc, binding), Some(WssVersion::Wss11));
}

#[test]
fn test_e2e_reliable_messaging_with_profile() {
    let (mut doc, binding) = echo_document(ConfigVersion::Current);
    doc.transact(|tx| {
        enable_rm(tx, binding, true)?;
        set_ordered(tx, binding, true)?;
        apply(tx, binding, SecurityProfile::SamlAuthorizationOverSsl, false)
    })
    .unwrap();
    assert!(is_rm_enabled(&doc, binding));
    assert!(is_ordered(&doc, binding));
    assert_eq!(sequence_binding(&doc, binding), Some(SequenceBinding::SecuredTransport));

    doc.transact(|tx| enable_rm(tx, binding, false)).unwrap();
    assert!(!is_rm_enabled(&doc, binding));
    assert_eq!(classify(&doc, binding), SecurityProfile::SamlAuthorizationOverSsl);
}

#[test]
fn test_e2e_legacy_rm_has_no_sequence_binding() {
    let (mut doc, binding) = echo_document(ConfigVersion::Legacy);
    doc.transact(|tx| {
        enable_rm(tx, binding, true)?;
        apply(tx, binding, SecurityProfile::MutualCertificates, false)
    })
    .unwrap();
    assert!(is_rm_enabled(&doc, binding));
    assert_eq!(sequence_binding(&doc, binding), None);
}

// ============================================================================
// End-to-end: runtime configuration and rendering
// ============================================================================

#[test]
fn test_e2e_stores_and_sts_rendered() {
    let (mut doc, binding) = secured(ConfigVersion::Current, SecurityProfile::StsIssuedToken);
    doc.transact(|tx| {
        set_store_location(tx, binding, StoreKind::KeyStore, Some("server-keystore.jks"), Flavour::Service)?;
        enable_sts(tx, binding, true)
    })
    .unwrap();
    assert!(is_sts_enabled(&doc, binding));
    assert_eq!(
        store_location(&doc, binding, StoreKind::KeyStore).as_deref(),
        Some("server-keystore.jks")
    );

    let xml = render_policies(&doc).unwrap();
    assert!(xml.contains("<sc:KeyStore"));
    assert!(xml.contains("<tc:STSConfiguration"));
    assert!(xml.contains("WSTrustContractImpl"));
    assert!(xml.contains("<sp:SymmetricBinding>"));

    doc.transact(|tx| enable_sts(tx, binding, false)).unwrap();
    assert!(!is_sts_enabled(&doc, binding));
    assert_eq!(classify(&doc, binding), SecurityProfile::StsIssuedToken);
}

#[test]
fn test_e2e_config_file_roundtrip() {
    let yaml = r#"
settings:
  config_version: "1.3"
document:
  bindings:
    - name: OrderBinding
      operations:
        - name: placeOrder
        - name: cancelOrder
        - name: notify
          one_way: true
  services:
    - name: OrderService
      ports:
        - name: OrderPort
          binding: OrderBinding
          address: "http://localhost:${HttpDefaultPort}/orders"
profiles:
  - binding: OrderBinding
    profile: message-authentication-over-ssl
  - binding: OrderBinding
    operations: ["*Order"]
    profile: endorsing-certificate
stores:
  keystore:
    location: keystore.jks
    alias: xws-security-server
"#;
    let config: WsitConfig = serde_yaml::from_str(yaml).unwrap();
    let mut doc = config.build_document().unwrap();
    let report = apply_config(&mut doc, &config).unwrap();

    let binding = &report.bindings[0];
    assert_eq!(binding.profile, SecurityProfile::MessageAuthenticationOverSsl);
    assert_eq!(binding.service_url_https, Some(true));
    let ops: Vec<_> = binding.operations.iter().map(|op| op.profile).collect();
    assert_eq!(
        ops,
        vec![
            SecurityProfile::EndorsingCertificate,
            SecurityProfile::EndorsingCertificate,
            SecurityProfile::MessageAuthenticationOverSsl,
        ]
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["bindings"][0]["profile"], "message-authentication-over-ssl");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_profile_roundtrip(version in any_version(), profile in any_profile()) {
        let (doc, binding) = secured(version, profile);
        prop_assert_eq!(classify(&doc, binding), profile);
    }

    #[test]
    fn prop_apply_is_idempotent(version in any_version(), profile in any_profile()) {
        let (mut doc, binding) = secured(version, profile);
        let first = policy_snapshots(&doc);
        doc.transact(|tx| apply(tx, binding, profile, false)).unwrap();
        prop_assert_eq!(first, policy_snapshots(&doc));
    }

    #[test]
    fn prop_profile_sequence_ends_in_last(
        version in any_version(),
        profiles in prop::collection::vec(any_profile(), 1..5),
    ) {
        let (mut doc, binding) = echo_document(version);
        for profile in &profiles {
            doc.transact(|tx| apply(tx, binding, *profile, true)).unwrap();
        }
        let last = profiles[profiles.len() - 1];
        prop_assert_eq!(classify(&doc, binding), last);
        prop_assert_eq!(wsitconf::is_service_url_https(&doc, binding), last.is_ssl());
    }

    #[test]
    fn prop_binding_kind_is_exclusive(kinds in prop::collection::vec(any_binding_kind(), 1..8)) {
        let (mut doc, binding) = echo_document(ConfigVersion::Current);
        for kind in &kinds {
            doc.transact(|tx| set_binding_kind(tx, binding, *kind)).unwrap();
        }
        let expected = kinds[kinds.len() - 1];
        prop_assert_eq!(binding_kind(&doc, binding), expected);
        if let Some(container) = policy_container(&doc, binding) {
            let count = doc
                .children(container)
                .iter()
                .filter(|c| doc.assertion_kind(**c).is_some_and(|k| k.is_security_binding()))
                .count();
            prop_assert!(count <= 1);
            prop_assert_eq!(count == 1, security_binding_in(&doc, container).is_some());
        }
    }

    #[test]
    fn prop_secure_conversation_roundtrip(version in any_version(), profile in message_profiles()) {
        let (mut doc, binding) = secured(version, profile);
        let wss = wss_version(&doc, binding);
        let trust = is_trust_enabled(&doc, binding);

        doc.transact(|tx| set_secure_conversation(tx, binding, true)).unwrap();
        prop_assert!(is_secure_conversation_enabled(&doc, binding));
        prop_assert_eq!(classify(&doc, binding), profile);

        doc.transact(|tx| set_secure_conversation(tx, binding, false)).unwrap();
        prop_assert!(!is_secure_conversation_enabled(&doc, binding));
        prop_assert_eq!(classify(&doc, binding), profile);
        prop_assert_eq!(wss_version(&doc, binding), wss);
        prop_assert_eq!(is_trust_enabled(&doc, binding), trust);
    }

    #[test]
    fn prop_operation_secure_conversation_roundtrip(version in any_version(), profile in any_profile()) {
        let (mut doc, binding) = echo_document(version);
        let echo = doc.find_operation(binding, "echo").unwrap();
        doc.transact(|tx| apply(tx, echo, profile, false)).unwrap();
        prop_assert_eq!(classify(&doc, echo), profile);

        doc.transact(|tx| set_secure_conversation(tx, echo, true)).unwrap();
        prop_assert!(is_secure_conversation_enabled(&doc, echo));
        prop_assert_eq!(classify(&doc, echo), profile);

        doc.transact(|tx| set_secure_conversation(tx, echo, false)).unwrap();
        prop_assert!(!is_secure_conversation_enabled(&doc, echo));
        prop_assert_eq!(classify(&doc, echo), profile);
    }

    #[test]
    fn prop_cleanup_converges(version in any_version(), profile in any_profile(), disable in any::<bool>()) {
        let (mut doc, binding) = secured(version, profile);
        if disable {
            doc.transact(|tx| disable_security(tx, binding)).unwrap();
        }
        doc.transact(|tx| cleanup(tx));
        let second = doc.transact(|tx| cleanup(tx));
        prop_assert!(second.is_noop());
        if disable {
            prop_assert!(policy_for_element(&doc, binding).is_none());
        }
    }
}
