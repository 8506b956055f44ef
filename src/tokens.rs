//! Token slots, token types, inclusion levels and supporting tokens.
//!
//! A token occupies a slot of the security binding:
//! `Binding → Policy → <Slot> → Policy → <TokenType IncludeToken=…> → Policy → refinements`.
//! Supporting tokens hang off a policy container directly:
//! `<Modifier> → Policy → <TokenType>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::assertion::AssertionKind;
use crate::binding::{binding_kind_of, require_binding_scope, BindingKind};
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId, Transaction, WsdlKind};
use crate::policy::{attach_policy, fork_shared_policy, policy_container};
use crate::tree;
use crate::version::ConfigVersion;

/// Token positions inside a security binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSlot {
    Protection,
    Signature,
    Encryption,
    Initiator,
    Recipient,
    Transport,
}

impl TokenSlot {
    pub const ALL: [TokenSlot; 6] = [
        Self::Protection,
        Self::Signature,
        Self::Encryption,
        Self::Initiator,
        Self::Recipient,
        Self::Transport,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Protection => AssertionKind::ProtectionToken,
            Self::Signature => AssertionKind::SignatureToken,
            Self::Encryption => AssertionKind::EncryptionToken,
            Self::Initiator => AssertionKind::InitiatorToken,
            Self::Recipient => AssertionKind::RecipientToken,
            Self::Transport => AssertionKind::TransportToken,
        }
    }

    /// Slots cleared when this one is set.
    pub fn conflicts(self) -> &'static [TokenSlot] {
        match self {
            Self::Protection => &[Self::Signature, Self::Encryption, Self::Initiator, Self::Recipient],
            Self::Signature | Self::Encryption => {
                &[Self::Protection, Self::Initiator, Self::Recipient]
            }
            Self::Initiator | Self::Recipient => {
                &[Self::Protection, Self::Signature, Self::Encryption]
            }
            Self::Transport => &[],
        }
    }

    pub fn allowed_on(self, binding: BindingKind) -> bool {
        match self {
            Self::Transport => binding == BindingKind::Transport,
            _ => binding != BindingKind::Transport,
        }
    }
}

impl fmt::Display for TokenSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.assertion_kind().local_name())
    }
}

/// Token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Username,
    X509,
    Saml,
    Kerberos,
    Issued,
    SecureConversation,
    SecurityContext,
    Https,
}

impl TokenType {
    pub const ALL: [TokenType; 8] = [
        Self::Username,
        Self::X509,
        Self::Saml,
        Self::Kerberos,
        Self::Issued,
        Self::SecureConversation,
        Self::SecurityContext,
        Self::Https,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Username => AssertionKind::UsernameToken,
            Self::X509 => AssertionKind::X509Token,
            Self::Saml => AssertionKind::SamlToken,
            Self::Kerberos => AssertionKind::KerberosToken,
            Self::Issued => AssertionKind::IssuedToken,
            Self::SecureConversation => AssertionKind::SecureConversationToken,
            Self::SecurityContext => AssertionKind::SecurityContextToken,
            Self::Https => AssertionKind::HttpsToken,
        }
    }

    pub fn from_assertion(kind: AssertionKind) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.assertion_kind() == kind)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.assertion_kind().local_name())
    }
}

/// When a token is included in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InclusionLevel {
    Never,
    Always,
    AlwaysToRecipient,
    Once,
}

impl InclusionLevel {
    pub const ALL: [InclusionLevel; 4] = [Self::Never, Self::Always, Self::AlwaysToRecipient, Self::Once];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "Never",
            Self::Always => "Always",
            Self::AlwaysToRecipient => "AlwaysToRecipient",
            Self::Once => "Once",
        }
    }

    /// `IncludeToken` attribute value under `version`.
    pub fn uri(self, version: ConfigVersion) -> String {
        format!("{}{}", version.include_token_base(), self.as_str())
    }

    /// Parse an `IncludeToken` value of either version.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.rsplit('/').next()?;
        Self::ALL.into_iter().find(|l| l.as_str() == local)
    }
}

/// Supporting-token modifiers: every combination of signed, endorsing
/// and encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportingModifier {
    Supporting,
    Signed,
    Endorsing,
    SignedEndorsing,
    Encrypted,
    SignedEncrypted,
    EndorsingEncrypted,
    SignedEndorsingEncrypted,
}

impl SupportingModifier {
    pub const ALL: [SupportingModifier; 8] = [
        Self::Supporting,
        Self::Signed,
        Self::Endorsing,
        Self::SignedEndorsing,
        Self::Encrypted,
        Self::SignedEncrypted,
        Self::EndorsingEncrypted,
        Self::SignedEndorsingEncrypted,
    ];

    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::Supporting => AssertionKind::SupportingTokens,
            Self::Signed => AssertionKind::SignedSupportingTokens,
            Self::Endorsing => AssertionKind::EndorsingSupportingTokens,
            Self::SignedEndorsing => AssertionKind::SignedEndorsingSupportingTokens,
            Self::Encrypted => AssertionKind::EncryptedSupportingTokens,
            Self::SignedEncrypted => AssertionKind::SignedEncryptedSupportingTokens,
            Self::EndorsingEncrypted => AssertionKind::EndorsingEncryptedSupportingTokens,
            Self::SignedEndorsingEncrypted => AssertionKind::SignedEndorsingEncryptedSupportingTokens,
        }
    }

    pub fn is_encrypted(self) -> bool {
        matches!(
            self,
            Self::Encrypted
                | Self::SignedEncrypted
                | Self::EndorsingEncrypted
                | Self::SignedEndorsingEncrypted
        )
    }

    /// Encrypted modifiers exist only in the current vocabulary.
    pub fn available_in(self, version: ConfigVersion) -> bool {
        !self.is_encrypted() || version == ConfigVersion::Current
    }

    /// The signed-supporting modifier a username/SAML credential uses in
    /// `version`.
    pub fn signed_credential(version: ConfigVersion) -> Self {
        match version {
            ConfigVersion::Legacy => Self::Signed,
            ConfigVersion::Current => Self::SignedEncrypted,
        }
    }
}

impl fmt::Display for SupportingModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.assertion_kind().local_name())
    }
}

/// Boolean refinements of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRefinement {
    RequireIssuerSerialReference,
    RequireThumbprintReference,
    RequireKeyIdentifierReference,
    RequireDerivedKeys,
}

impl TokenRefinement {
    pub fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::RequireIssuerSerialReference => AssertionKind::RequireIssuerSerialReference,
            Self::RequireThumbprintReference => AssertionKind::RequireThumbprintReference,
            Self::RequireKeyIdentifierReference => AssertionKind::RequireKeyIdentifierReference,
            Self::RequireDerivedKeys => AssertionKind::RequireDerivedKeys,
        }
    }
}

fn require_token(doc: &Document, token: NodeId) -> Result<TokenType, PolicyError> {
    doc.assertion_kind(token)
        .and_then(TokenType::from_assertion)
        .ok_or_else(|| PolicyError::NotAToken(doc.describe(token)))
}

/// Type of a token node.
pub fn token_type(doc: &Document, token: NodeId) -> Option<TokenType> {
    TokenType::from_assertion(doc.assertion_kind(token)?)
}

/// The token node held by a slot or supporting-token wrapper.
fn token_inside(doc: &Document, holder: NodeId) -> Option<NodeId> {
    let container = tree::nested_container(doc, holder)?;
    tree::find_first_where(doc, container, AssertionKind::is_token_type)
}

/// Create a token of `token_type` under `container` with its default
/// refinements.
fn create_token(tx: &mut Transaction<'_>, container: NodeId, token_type: TokenType) -> NodeId {
    let token = tx.create(token_type.assertion_kind());
    tx.append(container, token);
    let version = tx.version();
    match token_type {
        TokenType::Username => {
            tree::create_nested(tx, token, AssertionKind::WssUsernameToken10);
        }
        TokenType::X509 => {
            tree::create_nested(tx, token, AssertionKind::WssX509V3Token10);
            tree::create_nested(tx, token, AssertionKind::RequireIssuerSerialReference);
        }
        TokenType::Saml => {
            let profile = match version {
                ConfigVersion::Legacy => AssertionKind::WssSamlV11Token10,
                ConfigVersion::Current => AssertionKind::WssSamlV20Token11,
            };
            tree::create_nested(tx, token, profile);
        }
        TokenType::Kerberos => {
            tree::create_nested(tx, token, AssertionKind::WssKerberosV5ApReqToken11);
        }
        TokenType::Issued => {
            let template = tree::create_or_get(tx, token, AssertionKind::RequestSecurityTokenTemplate);
            let key_type = tree::create_or_get(tx, template, AssertionKind::KeyType);
            tx.set_attr(key_type, Attr::Text, format!("{}/SymmetricKey", version.trust_ns()));
            let key_size = tree::create_or_get(tx, template, AssertionKind::KeySize);
            tx.set_attr(key_size, Attr::Text, "256");
            tree::create_nested(tx, token, AssertionKind::RequireInternalReference);
        }
        TokenType::Https => {
            if version == ConfigVersion::Legacy {
                tx.set_attr(token, Attr::RequireClientCertificate, "false");
            } else {
                tree::create_nested_wrapper(tx, token);
            }
        }
        TokenType::SecureConversation | TokenType::SecurityContext => {}
    }
    token
}

/// Put a token of `token_type` into `slot` of a security binding node.
///
/// Conflicting slots are cleared first. A slot that already holds a token
/// of the same type keeps it unchanged.
pub fn set_token_slot(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    slot: TokenSlot,
    token_type: TokenType,
) -> Result<NodeId, PolicyError> {
    let kind = binding_kind_of(tx, binding).ok_or_else(|| {
        PolicyError::UnexpectedShape(format!("{} is not a security binding", tx.describe(binding)))
    })?;
    if !slot.allowed_on(kind) {
        return Err(PolicyError::SlotNotAllowed {
            slot: slot.to_string(),
            binding: kind.to_string(),
        });
    }
    debug!(slot = %slot, token = %token_type, "Setting token slot");

    let container = tree::create_nested_wrapper(tx, binding);
    for conflict in slot.conflicts() {
        tree::remove(tx, container, conflict.assertion_kind());
    }
    let holder = tree::create_or_get(tx, container, slot.assertion_kind());
    if let Some(existing) = token_inside(tx, holder) {
        if token_type_is(tx, existing, token_type) {
            return Ok(existing);
        }
    }
    let inner = tree::create_nested_wrapper(tx, holder);
    tree::remove_where(tx, inner, AssertionKind::is_token_type);
    Ok(create_token(tx, inner, token_type))
}

fn token_type_is(doc: &Document, token: NodeId, token_type: TokenType) -> bool {
    self::token_type(doc, token) == Some(token_type)
}

/// Empty `slot` of a security binding node.
pub fn clear_token_slot(tx: &mut Transaction<'_>, binding: NodeId, slot: TokenSlot) {
    if let Some(container) = tree::nested_container(tx, binding) {
        tree::remove(tx, container, slot.assertion_kind());
    }
}

/// The token in `slot` of a security binding node.
pub fn token_in_slot(doc: &Document, binding: NodeId, slot: TokenSlot) -> Option<NodeId> {
    let holder = tree::find_nested(doc, binding, slot.assertion_kind())?;
    token_inside(doc, holder)
}

pub fn set_token_inclusion_level(
    tx: &mut Transaction<'_>,
    token: NodeId,
    level: InclusionLevel,
) -> Result<(), PolicyError> {
    require_token(tx, token)?;
    let uri = level.uri(tx.version());
    tx.set_attr(token, Attr::IncludeToken, uri);
    Ok(())
}

pub fn token_inclusion_level(doc: &Document, token: NodeId) -> Option<InclusionLevel> {
    InclusionLevel::from_uri(doc.attr(token, Attr::IncludeToken)?)
}

pub fn set_token_refinement(
    tx: &mut Transaction<'_>,
    token: NodeId,
    refinement: TokenRefinement,
    enable: bool,
) -> Result<(), PolicyError> {
    require_token(tx, token)?;
    let kind = refinement.assertion_kind();
    if enable {
        tree::create_nested(tx, token, kind);
    } else if let Some(container) = tree::nested_container(tx, token) {
        tree::remove(tx, container, kind);
    }
    Ok(())
}

pub fn token_refinement(doc: &Document, token: NodeId, refinement: TokenRefinement) -> bool {
    tree::find_nested(doc, token, refinement.assertion_kind()).is_some()
}

// ----------------------------------------------------------------------
// Supporting tokens
// ----------------------------------------------------------------------

/// The element whose policy holds supporting tokens for `element`: the
/// binding itself, or an operation's input message.
pub fn supporting_scope(doc: &Document, element: NodeId) -> NodeId {
    match doc.wsdl_kind(element) {
        Some(WsdlKind::BindingOperation) => doc.binding_input(element).unwrap_or(element),
        _ => element,
    }
}

/// The token of the `modifier` supporting-token assertion in `container`.
pub fn supporting_token_in(doc: &Document, container: NodeId, modifier: SupportingModifier) -> Option<NodeId> {
    let holder = tree::find_first(doc, container, modifier.assertion_kind())?;
    token_inside(doc, holder)
}

/// Set or remove the `modifier` supporting token in `container`.
pub fn set_supporting_token_in(
    tx: &mut Transaction<'_>,
    container: NodeId,
    token_type: Option<TokenType>,
    modifier: SupportingModifier,
) -> Result<Option<NodeId>, PolicyError> {
    let version = tx.version();
    if !modifier.available_in(version) {
        return Err(PolicyError::unsupported(modifier.to_string(), version));
    }
    let Some(token_type) = token_type else {
        tree::remove(tx, container, modifier.assertion_kind());
        return Ok(None);
    };
    let holder = tree::create_or_get(tx, container, modifier.assertion_kind());
    if let Some(existing) = token_inside(tx, holder) {
        if token_type_is(tx, existing, token_type) {
            return Ok(Some(existing));
        }
    }
    let inner = tree::create_nested_wrapper(tx, holder);
    tree::remove_where(tx, inner, AssertionKind::is_token_type);
    let token = create_token(tx, inner, token_type);
    set_token_inclusion_level(tx, token, InclusionLevel::AlwaysToRecipient)?;
    Ok(Some(token))
}

/// Set (`Some`) or remove (`None`) the `modifier` supporting token of a
/// binding or operation.
pub fn set_supporting_token(
    tx: &mut Transaction<'_>,
    element: NodeId,
    token_type: Option<TokenType>,
    modifier: SupportingModifier,
) -> Result<Option<NodeId>, PolicyError> {
    require_binding_scope(tx, element)?;
    let version = tx.version();
    if !modifier.available_in(version) {
        return Err(PolicyError::unsupported(modifier.to_string(), version));
    }
    let scope = supporting_scope(tx, element);
    let is_binding = tx.wsdl_kind(scope) == Some(WsdlKind::Binding);
    if !is_binding {
        fork_shared_policy(tx, scope)?;
    }
    debug!(element = %tx.describe(element), modifier = %modifier, token = ?token_type, "Setting supporting token");
    let container = match token_type {
        Some(_) => attach_policy(tx, scope, is_binding)?,
        None => policy_container(tx, scope),
    };
    match container {
        Some(container) => set_supporting_token_in(tx, container, token_type, modifier),
        None => Ok(None),
    }
}

pub fn supporting_token(doc: &Document, element: NodeId, modifier: SupportingModifier) -> Option<NodeId> {
    let container = policy_container(doc, supporting_scope(doc, element))?;
    supporting_token_in(doc, container, modifier)
}

/// Type of the `modifier` supporting token of `element`.
pub fn supporting_token_type(doc: &Document, element: NodeId, modifier: SupportingModifier) -> Option<TokenType> {
    token_type(doc, supporting_token(doc, element, modifier)?)
}

pub fn remove_supporting_tokens_in(tx: &mut Transaction<'_>, container: NodeId) -> usize {
    tree::remove_where(tx, container, AssertionKind::is_supporting_tokens)
}

/// Remove every supporting-token assertion of `element`.
pub fn remove_supporting_tokens(tx: &mut Transaction<'_>, element: NodeId) -> Result<usize, PolicyError> {
    require_binding_scope(tx, element)?;
    let scope = supporting_scope(tx, element);
    Ok(match policy_container(tx, scope) {
        Some(container) => remove_supporting_tokens_in(tx, container),
        None => 0,
    })
}
