//! Security profile builder.
//!
//! [`apply`] resets the security assertions of a binding or operation and
//! installs the fixed recipe of a profile, so that [`classify`] on the
//! result returns the same profile.
//!
//! [`classify`]: crate::profile::classify

use tracing::{debug, info};

use crate::binding::{
    disable_trust, disable_wss, enable_trust_in, enable_wss_in, require_binding_scope,
    set_algorithm_suite_on, set_binding_flag_on, set_binding_kind, set_layout_on,
    set_trust_flag_on, set_wss_reference_on, wss_version, AlgorithmSuite, BindingFlag, BindingKind,
    Layout, TrustFlag, WssReference, WssVersion,
};
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId, Transaction, WsdlKind};
use crate::policy::{
    attach_policy_uri, cleanup, detach_policy, fork_shared_policy, policy_container, policy_uri,
};
use crate::profile::SecurityProfile;
use crate::rm::{is_rm_enabled, set_sequence_binding, SequenceBinding};
use crate::secconv::{is_secure_conversation_enabled, set_secure_conversation};
use crate::targets::{clear_targets, set_default_targets};
use crate::tokens::{
    remove_supporting_tokens, set_supporting_token, set_token_inclusion_level,
    set_token_refinement, set_token_slot, InclusionLevel, SupportingModifier, TokenRefinement,
    TokenSlot, TokenType,
};
use crate::version::ConfigVersion;

const HTTP_PORT: &str = "${HttpDefaultPort}";
const HTTPS_PORT: &str = "${HttpsDefaultPort}";

// ============================================================================
// Recipes
// ============================================================================

struct SlotRecipe {
    slot: TokenSlot,
    token: TokenType,
    inclusion: Option<InclusionLevel>,
    issuer_serial: bool,
}

const fn slot(slot: TokenSlot, token: TokenType, inclusion: InclusionLevel) -> SlotRecipe {
    SlotRecipe {
        slot,
        token,
        inclusion: Some(inclusion),
        issuer_serial: true,
    }
}

#[derive(Clone, Copy)]
enum Supporting {
    /// Signed in the legacy vocabulary, signed and encrypted in the current one.
    Credential,
    Signed,
    Endorsing,
}

impl Supporting {
    fn modifier(self, version: ConfigVersion) -> SupportingModifier {
        match self {
            Self::Credential => SupportingModifier::signed_credential(version),
            Self::Signed => SupportingModifier::Signed,
            Self::Endorsing => SupportingModifier::Endorsing,
        }
    }
}

struct Recipe {
    binding: BindingKind,
    slots: Vec<SlotRecipe>,
    layout: Layout,
    only_sign: bool,
    wss: WssVersion,
    references: &'static [WssReference],
    trust: bool,
    supporting: Option<(TokenType, Supporting)>,
}

const WSS11_REFERENCES: &[WssReference] = &[
    WssReference::IssuerSerial,
    WssReference::Thumbprint,
    WssReference::EncryptedKey,
];

const WSS11_ALL_REFERENCES: &[WssReference] = &[
    WssReference::KeyIdentifier,
    WssReference::IssuerSerial,
    WssReference::Thumbprint,
    WssReference::EncryptedKey,
];

impl Recipe {
    fn transport(supporting: Option<(TokenType, Supporting)>) -> Self {
        Self {
            binding: BindingKind::Transport,
            slots: vec![SlotRecipe {
                slot: TokenSlot::Transport,
                token: TokenType::Https,
                inclusion: None,
                issuer_serial: true,
            }],
            layout: Layout::Lax,
            only_sign: false,
            wss: WssVersion::Wss10,
            references: &[],
            trust: false,
            supporting,
        }
    }

    fn symmetric(token: TokenType, inclusion: InclusionLevel, layout: Layout) -> Self {
        Self {
            binding: BindingKind::Symmetric,
            slots: vec![slot(TokenSlot::Protection, token, inclusion)],
            layout,
            only_sign: true,
            wss: WssVersion::Wss11,
            references: WSS11_REFERENCES,
            trust: false,
            supporting: None,
        }
    }

    fn asymmetric(initiator: SlotRecipe, layout: Layout) -> Self {
        Self {
            binding: BindingKind::Asymmetric,
            slots: vec![
                initiator,
                slot(TokenSlot::Recipient, TokenType::X509, InclusionLevel::Never),
            ],
            layout,
            only_sign: true,
            wss: WssVersion::Wss10,
            references: &[WssReference::IssuerSerial],
            trust: false,
            supporting: None,
        }
    }

    fn with_supporting(mut self, token: TokenType, supporting: Supporting) -> Self {
        self.supporting = Some((token, supporting));
        self
    }

    fn with_trust(mut self) -> Self {
        self.trust = true;
        self
    }

    fn with_wss11(mut self, references: &'static [WssReference]) -> Self {
        self.wss = WssVersion::Wss11;
        self.references = references;
        self
    }

    fn for_profile(profile: SecurityProfile) -> Option<Self> {
        use InclusionLevel as I;
        use SecurityProfile as P;
        use TokenType as T;

        let initiator = |token, issuer_serial| SlotRecipe {
            slot: TokenSlot::Initiator,
            token,
            inclusion: Some(I::AlwaysToRecipient),
            issuer_serial,
        };

        Some(match profile {
            P::Transport => Self::transport(None),
            P::MessageAuthenticationOverSsl => {
                Self::transport(Some((T::Username, Supporting::Credential)))
            }
            P::SamlAuthorizationOverSsl => Self::transport(Some((T::Saml, Supporting::Signed))),
            P::UsernameAuthenticationWithSymmetricKey => {
                Self::symmetric(T::X509, I::Never, Layout::Strict)
                    .with_supporting(T::Username, Supporting::Credential)
            }
            P::UsernameAuthenticationWithPasswordDerivedKeys => {
                Self::symmetric(T::Username, I::AlwaysToRecipient, Layout::Strict)
            }
            P::MutualCertificates => Self::asymmetric(initiator(T::X509, false), Layout::Strict),
            P::EndorsingCertificate => Self::symmetric(T::X509, I::Never, Layout::Lax)
                .with_supporting(T::X509, Supporting::Endorsing),
            P::SamlSenderVouches => Self::asymmetric(initiator(T::X509, true), Layout::Strict)
                .with_supporting(T::Saml, Supporting::Credential),
            P::SamlHolderOfKey => Self::asymmetric(initiator(T::Saml, true), Layout::Strict),
            P::Kerberos => Self::symmetric(T::Kerberos, I::Once, Layout::Strict),
            P::StsIssuedToken => {
                Self::symmetric(T::Issued, I::AlwaysToRecipient, Layout::Lax).with_trust()
            }
            P::StsIssuedTokenWithServiceCertificate => {
                Self::asymmetric(initiator(T::Issued, true), Layout::Lax)
                    .with_wss11(WSS11_REFERENCES)
                    .with_trust()
            }
            P::StsIssuedEndorsingToken => Self::symmetric(T::X509, I::Always, Layout::Lax)
                .with_wss11(WSS11_ALL_REFERENCES)
                .with_trust()
                .with_supporting(T::Issued, Supporting::Endorsing),
            P::StsIssuedSupportingToken => Self::symmetric(T::X509, I::Always, Layout::Lax)
                .with_trust()
                .with_supporting(T::Issued, Supporting::Credential),
            P::NotRecognized => return None,
        })
    }
}

// ============================================================================
// Apply
// ============================================================================

/// Configure `element` (a binding or binding operation) with `profile`.
///
/// Runs inside the caller's transaction. Reapplying the same profile
/// yields the same tree. Secure conversation, when enabled, is rebuilt
/// around the new profile. With `update_service_url`, the addresses of the
/// binding's ports are switched to https for SSL profiles and back to http
/// otherwise.
pub fn apply(
    tx: &mut Transaction<'_>,
    element: NodeId,
    profile: SecurityProfile,
    update_service_url: bool,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let recipe = Recipe::for_profile(profile)
        .ok_or_else(|| PolicyError::Config(format!("profile '{}' cannot be applied", profile)))?;
    let version = tx.version();
    let secure_conversation = is_secure_conversation_enabled(tx, element);
    debug!(
        element = %tx.describe(element),
        profile = %profile,
        secure_conversation,
        "Applying security profile"
    );

    isolate_messages(tx, element)?;
    reset(tx, element)?;
    install(tx, element, &recipe)?;
    set_message_level_policies(tx, element, profile)?;

    let is_binding = tx.wsdl_kind(element) == Some(WsdlKind::Binding);
    if is_binding && update_service_url {
        self::update_service_url(tx, element, profile.is_ssl());
    }
    if is_binding && version == ConfigVersion::Current && is_rm_enabled(tx, element) {
        let sequence = if profile.is_ssl() {
            SequenceBinding::SecuredTransport
        } else {
            SequenceBinding::SecuredToken
        };
        set_sequence_binding(tx, element, Some(sequence))?;
    }
    if secure_conversation {
        set_secure_conversation(tx, element, true)?;
    }

    let report = cleanup(tx);
    info!(
        element = %tx.describe(element),
        profile = %profile,
        policies_removed = report.policies_removed,
        "Security profile applied"
    );
    Ok(())
}

/// Fork message policies an operation shares with its siblings.
fn isolate_messages(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    if tx.wsdl_kind(element) != Some(WsdlKind::BindingOperation) {
        return Ok(());
    }
    for message in tx.messages(element) {
        fork_shared_policy(tx, message)?;
    }
    Ok(())
}

/// Remove the binding kind, WSS and Trust markers and every supporting
/// token of `element`. For a binding, supporting tokens on the message
/// scopes of its operations go too, since those policies are shared.
fn reset(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    set_binding_kind(tx, element, None)?;
    disable_wss(tx, element)?;
    disable_trust(tx, element)?;
    remove_supporting_tokens(tx, element)?;
    if tx.wsdl_kind(element) == Some(WsdlKind::Binding) {
        for operation in tx.operations(element) {
            remove_supporting_tokens(tx, operation)?;
        }
    }
    Ok(())
}

fn install(tx: &mut Transaction<'_>, element: NodeId, recipe: &Recipe) -> Result<(), PolicyError> {
    let Some(binding) = set_binding_kind(tx, element, Some(recipe.binding))? else {
        return Ok(());
    };

    for entry in &recipe.slots {
        let token = set_token_slot(tx, binding, entry.slot, entry.token)?;
        if let Some(level) = entry.inclusion {
            set_token_inclusion_level(tx, token, level)?;
        }
        if !entry.issuer_serial {
            set_token_refinement(tx, token, TokenRefinement::RequireIssuerSerialReference, false)?;
        }
    }

    set_layout_on(tx, binding, recipe.layout);
    set_binding_flag_on(tx, binding, BindingFlag::IncludeTimestamp, true);
    if recipe.only_sign {
        set_binding_flag_on(tx, binding, BindingFlag::OnlySignEntireHeadersAndBody, true);
    }
    set_algorithm_suite_on(tx, binding, AlgorithmSuite::Basic128);

    // The container exists: set_binding_kind attached it above.
    if let Some(container) = policy_container(tx, element) {
        let wss = enable_wss_in(tx, container, recipe.wss);
        for reference in recipe.references {
            set_wss_reference_on(tx, wss, *reference, true);
        }
        if recipe.trust {
            let trust = enable_trust_in(tx, container);
            for flag in TrustFlag::ALL {
                set_trust_flag_on(tx, trust, flag, true);
            }
        }
    }

    if let Some((token, supporting)) = recipe.supporting {
        let modifier = supporting.modifier(tx.version());
        set_supporting_token(tx, element, Some(token), modifier)?;
    }
    Ok(())
}

/// Install the message targets of `profile` on the messages of an
/// operation, or on the first operation of a binding with every other
/// operation referencing the same message policies.
fn set_message_level_policies(
    tx: &mut Transaction<'_>,
    element: NodeId,
    profile: SecurityProfile,
) -> Result<(), PolicyError> {
    if tx.wsdl_kind(element) == Some(WsdlKind::BindingOperation) {
        return set_operation_targets(tx, element, profile);
    }

    let operations = tx.operations(element);
    let Some((first, rest)) = operations.split_first() else {
        return Ok(());
    };
    set_operation_targets(tx, *first, profile)?;

    let input_uri = tx.binding_input(*first).and_then(|input| policy_uri(tx, input));
    let output_uri = tx.binding_output(*first).and_then(|output| policy_uri(tx, output));
    for operation in rest {
        let messages = [
            (tx.binding_input(*operation), input_uri.as_deref()),
            (tx.binding_output(*operation), output_uri.as_deref()),
        ];
        for (message, uri) in messages {
            let Some(message) = message else { continue };
            match uri {
                Some(uri) => attach_policy_uri(tx, message, uri)?,
                None => detach_policy(tx, message),
            }
        }
    }
    Ok(())
}

fn set_operation_targets(
    tx: &mut Transaction<'_>,
    operation: NodeId,
    profile: SecurityProfile,
) -> Result<(), PolicyError> {
    let owner = tx.owning_binding(operation);
    let rm = owner.is_some_and(|binding| is_rm_enabled(tx, binding));
    let wss11 = wss_version(tx, operation)
        .or_else(|| owner.and_then(|binding| wss_version(tx, binding)))
        == Some(WssVersion::Wss11);
    let headers = profile == SecurityProfile::MutualCertificates || wss11;

    let messages: Vec<NodeId> = tx
        .binding_input(operation)
        .into_iter()
        .chain(tx.binding_output(operation))
        .collect();
    for message in messages {
        if profile.is_ssl() {
            clear_targets(tx, message)?;
        } else {
            set_default_targets(tx, message, headers, rm)?;
        }
    }
    Ok(())
}

// ============================================================================
// Disable / service URL
// ============================================================================

/// Strip every security assertion from `element`: binding kind, WSS and
/// Trust markers, supporting tokens and message targets. For a binding the
/// message policies of its operations are cleared too.
pub fn disable_security(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    debug!(element = %tx.describe(element), "Disabling security");
    isolate_messages(tx, element)?;
    reset(tx, element)?;

    let operations = match tx.wsdl_kind(element) {
        Some(WsdlKind::Binding) => tx.operations(element),
        _ => vec![element],
    };
    for operation in operations {
        for message in tx.messages(operation) {
            clear_targets(tx, message)?;
        }
    }

    let report = cleanup(tx);
    info!(
        element = %tx.describe(element),
        policies_removed = report.policies_removed,
        "Security disabled"
    );
    Ok(())
}

fn rewrite_location(location: &str, to_https: bool) -> String {
    let (scheme_from, scheme_to, port_from, port_to) = if to_https {
        ("http:", "https:", HTTP_PORT, HTTPS_PORT)
    } else {
        ("https:", "http:", HTTPS_PORT, HTTP_PORT)
    };
    location
        .replacen(port_from, port_to, 1)
        .replacen(scheme_from, scheme_to, 1)
}

/// Switch the `soap:address` of every port bound to `binding` to https
/// (or back to http). Returns how many addresses changed.
pub fn update_service_url(tx: &mut Transaction<'_>, binding: NodeId, to_https: bool) -> usize {
    let addresses: Vec<NodeId> = tx
        .ports_for_binding(binding)
        .into_iter()
        .filter_map(|port| tx.soap_address(port))
        .collect();

    let mut changed = 0;
    for address in addresses {
        let Some(location) = tx.attr(address, Attr::Location) else {
            continue;
        };
        let rewritten = rewrite_location(location, to_https);
        if rewritten != location {
            debug!(from = %location, to = %rewritten, "Rewriting service address");
            tx.set_attr(address, Attr::Location, rewritten);
            changed += 1;
        }
    }
    changed
}

/// Whether any port bound to `binding` has an https address.
pub fn is_service_url_https(doc: &Document, binding: NodeId) -> bool {
    doc.ports_for_binding(binding)
        .into_iter()
        .filter_map(|port| doc.soap_address(port))
        .filter_map(|address| doc.attr(address, Attr::Location))
        .any(|location| location.contains("https:"))
}
