//! Security profiles and the classifier that recognizes them.
//!
//! A profile is a named, fixed shape of the policy tree. [`classify`] maps
//! a tree back to the profile whose recipe it matches exactly; anything
//! else is [`SecurityProfile::NotRecognized`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::binding::{binding_kind_of, require_binding_scope, security_binding_in, BindingKind};
use crate::error::PolicyError;
use crate::model::{Document, NodeId, WsdlKind};
use crate::policy::policy_container;
use crate::secconv::{bootstrap_container, is_secure_conversation_binding};
use crate::tokens::{
    supporting_scope, supporting_token_in, token_in_slot, token_type, SupportingModifier, TokenSlot,
    TokenType,
};

/// Named security configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityProfile {
    Transport,
    MessageAuthenticationOverSsl,
    SamlAuthorizationOverSsl,
    UsernameAuthenticationWithSymmetricKey,
    UsernameAuthenticationWithPasswordDerivedKeys,
    MutualCertificates,
    EndorsingCertificate,
    SamlSenderVouches,
    SamlHolderOfKey,
    Kerberos,
    StsIssuedToken,
    StsIssuedTokenWithServiceCertificate,
    StsIssuedEndorsingToken,
    StsIssuedSupportingToken,
    NotRecognized,
}

/// Runtime configuration a profile needs on the service side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileRequirements {
    pub keystore: bool,
    pub truststore: bool,
    pub kerberos: bool,
    pub sts_allowed: bool,
}

impl SecurityProfile {
    /// Every buildable profile, in presentation order.
    pub const ALL: [SecurityProfile; 14] = [
        Self::UsernameAuthenticationWithSymmetricKey,
        Self::MutualCertificates,
        Self::Transport,
        Self::MessageAuthenticationOverSsl,
        Self::SamlAuthorizationOverSsl,
        Self::EndorsingCertificate,
        Self::SamlSenderVouches,
        Self::SamlHolderOfKey,
        Self::Kerberos,
        Self::StsIssuedToken,
        Self::StsIssuedTokenWithServiceCertificate,
        Self::StsIssuedEndorsingToken,
        Self::StsIssuedSupportingToken,
        Self::UsernameAuthenticationWithPasswordDerivedKeys,
    ];

    /// Stable identifier, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::MessageAuthenticationOverSsl => "message-authentication-over-ssl",
            Self::SamlAuthorizationOverSsl => "saml-authorization-over-ssl",
            Self::UsernameAuthenticationWithSymmetricKey => "username-authentication-with-symmetric-key",
            Self::UsernameAuthenticationWithPasswordDerivedKeys => {
                "username-authentication-with-password-derived-keys"
            }
            Self::MutualCertificates => "mutual-certificates",
            Self::EndorsingCertificate => "endorsing-certificate",
            Self::SamlSenderVouches => "saml-sender-vouches",
            Self::SamlHolderOfKey => "saml-holder-of-key",
            Self::Kerberos => "kerberos",
            Self::StsIssuedToken => "sts-issued-token",
            Self::StsIssuedTokenWithServiceCertificate => "sts-issued-token-with-service-certificate",
            Self::StsIssuedEndorsingToken => "sts-issued-endorsing-token",
            Self::StsIssuedSupportingToken => "sts-issued-supporting-token",
            Self::NotRecognized => "not-recognized",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Transport => "Transport Security (SSL)",
            Self::MessageAuthenticationOverSsl => "Message Authentication over SSL",
            Self::SamlAuthorizationOverSsl => "SAML Authorization over SSL",
            Self::UsernameAuthenticationWithSymmetricKey => "Username Authentication with Symmetric Key",
            Self::UsernameAuthenticationWithPasswordDerivedKeys => {
                "Username Authentication with Password Derived Keys"
            }
            Self::MutualCertificates => "Mutual Certificates Security",
            Self::EndorsingCertificate => "Endorsing Certificate",
            Self::SamlSenderVouches => "SAML Sender Vouches with Certificates",
            Self::SamlHolderOfKey => "SAML Holder of Key",
            Self::Kerberos => "Kerberos",
            Self::StsIssuedToken => "STS Issued Token",
            Self::StsIssuedTokenWithServiceCertificate => "STS Issued Token with Service Certificate",
            Self::StsIssuedEndorsingToken => "STS Issued Endorsing Token",
            Self::StsIssuedSupportingToken => "STS Issued Supporting Token",
            Self::NotRecognized => "Not Recognized",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => {
                "SSL protects the transport; no message-level security is added."
            }
            Self::MessageAuthenticationOverSsl => {
                "SSL protects the transport; the client authenticates with a username token or certificate carried in the message."
            }
            Self::SamlAuthorizationOverSsl => {
                "SSL protects the transport; authorization data travels in a signed SAML assertion."
            }
            Self::UsernameAuthenticationWithSymmetricKey => {
                "A symmetric key protects the message; the service certificate secures the key and the client authenticates with a username and password."
            }
            Self::UsernameAuthenticationWithPasswordDerivedKeys => {
                "Keys derived from the client password sign and encrypt the message."
            }
            Self::MutualCertificates => {
                "Client and service each sign with their own certificate and encrypt for the other."
            }
            Self::EndorsingCertificate => {
                "A symmetric key protected by the service certificate secures the message; a client certificate endorses the signature."
            }
            Self::SamlSenderVouches => {
                "Mutual certificates protect the message; the client vouches for a SAML assertion about the caller."
            }
            Self::SamlHolderOfKey => {
                "The client proves possession of the key referenced by a SAML assertion; the service certificate protects responses."
            }
            Self::Kerberos => "A Kerberos ticket protects the message.",
            Self::StsIssuedToken => {
                "A token issued by a security token service provides the symmetric key protecting the message."
            }
            Self::StsIssuedTokenWithServiceCertificate => {
                "The client signs with an issued token; the service certificate protects responses."
            }
            Self::StsIssuedEndorsingToken => {
                "A symmetric key protected by the service certificate secures the message; an issued token endorses the signature."
            }
            Self::StsIssuedSupportingToken => {
                "A symmetric key protected by the service certificate secures the message; an issued token is sent as a signed supporting token."
            }
            Self::NotRecognized => "The policy does not match any known profile.",
        }
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .chain(std::iter::once(Self::NotRecognized))
            .find(|p| p.display_name() == name)
    }

    /// Profiles that rely on transport-level security.
    pub fn is_ssl(&self) -> bool {
        matches!(
            self,
            Self::Transport | Self::MessageAuthenticationOverSsl | Self::SamlAuthorizationOverSsl
        )
    }

    /// Profiles built around a token issued by a security token service.
    pub fn is_sts(&self) -> bool {
        matches!(
            self,
            Self::StsIssuedToken
                | Self::StsIssuedTokenWithServiceCertificate
                | Self::StsIssuedEndorsingToken
                | Self::StsIssuedSupportingToken
        )
    }

    pub fn requirements(&self) -> ProfileRequirements {
        let kerberos = *self == Self::Kerberos;
        let stores = !self.is_ssl()
            && !kerberos
            && !matches!(self, Self::UsernameAuthenticationWithPasswordDerivedKeys | Self::NotRecognized);
        ProfileRequirements {
            keystore: stores,
            truststore: stores && *self != Self::UsernameAuthenticationWithSymmetricKey,
            kerberos,
            sts_allowed: !matches!(
                self,
                Self::SamlHolderOfKey | Self::SamlSenderVouches | Self::SamlAuthorizationOverSsl
            ),
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SecurityProfile {
    type Err = PolicyError;

    /// Accepts the identifier or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .or_else(|| Self::from_display_name(s))
            .ok_or_else(|| PolicyError::Config(format!("unknown security profile '{}'", s)))
    }
}

/// The parts of a policy the classifier looks at.
struct Shape {
    binding: NodeId,
    supporting: Option<NodeId>,
}

impl Shape {
    fn read(doc: &Document, element: NodeId) -> Option<Self> {
        let own = policy_container(doc, element).and_then(|c| security_binding_in(doc, c));
        let binding = match (own, doc.wsdl_kind(element)) {
            (Some(binding), _) => binding,
            // An operation without a binding of its own reads as its binding.
            (None, Some(WsdlKind::BindingOperation)) => {
                return Self::read(doc, doc.owning_binding(element)?);
            }
            (None, _) => return None,
        };

        if is_secure_conversation_binding(doc, binding) {
            let bootstrap = bootstrap_container(doc, binding)?;
            // Operation supporting tokens stay on the input message.
            let supporting = match doc.wsdl_kind(element) {
                Some(WsdlKind::BindingOperation) => {
                    policy_container(doc, supporting_scope(doc, element))
                }
                _ => Some(bootstrap),
            };
            return Some(Self {
                binding: security_binding_in(doc, bootstrap)?,
                supporting,
            });
        }
        Some(Self {
            binding,
            supporting: policy_container(doc, supporting_scope(doc, element)),
        })
    }

    fn supporting(&self, doc: &Document, modifier: SupportingModifier) -> Option<TokenType> {
        let token = supporting_token_in(doc, self.supporting?, modifier)?;
        token_type(doc, token)
    }

    fn slot(&self, doc: &Document, slot: TokenSlot) -> Option<TokenType> {
        token_type(doc, token_in_slot(doc, self.binding, slot)?)
    }

    fn classify(&self, doc: &Document) -> SecurityProfile {
        use SecurityProfile as P;
        use TokenType as T;

        let signed = self.supporting(doc, SupportingModifier::Signed);
        let signed_encrypted = self.supporting(doc, SupportingModifier::SignedEncrypted);
        let endorsing = self.supporting(doc, SupportingModifier::Endorsing);

        match binding_kind_of(doc, self.binding) {
            Some(BindingKind::Transport) => {
                if endorsing.is_some() {
                    return P::MessageAuthenticationOverSsl;
                }
                match (signed, signed_encrypted) {
                    (Some(T::Saml), _) => P::SamlAuthorizationOverSsl,
                    (Some(T::Username | T::X509), _) | (_, Some(_)) => {
                        P::MessageAuthenticationOverSsl
                    }
                    (Some(_), None) => P::NotRecognized,
                    (None, None) => P::Transport,
                }
            }
            Some(BindingKind::Symmetric) => match self.slot(doc, TokenSlot::Protection) {
                Some(T::Issued) => P::StsIssuedToken,
                Some(T::Kerberos) => P::Kerberos,
                Some(T::Username) => P::UsernameAuthenticationWithPasswordDerivedKeys,
                Some(T::X509) => match endorsing {
                    Some(T::Issued) => P::StsIssuedEndorsingToken,
                    Some(T::X509) => P::EndorsingCertificate,
                    Some(_) => P::NotRecognized,
                    None => match (signed_encrypted, signed) {
                        (Some(T::Username), _) => P::UsernameAuthenticationWithSymmetricKey,
                        (Some(T::Issued), _) | (None, Some(T::Issued)) => P::StsIssuedSupportingToken,
                        (Some(_), _) => P::NotRecognized,
                        (None, _) => P::UsernameAuthenticationWithSymmetricKey,
                    },
                },
                _ => P::NotRecognized,
            },
            Some(BindingKind::Asymmetric) => {
                let initiator = self.slot(doc, TokenSlot::Initiator);
                let recipient = self.slot(doc, TokenSlot::Recipient);
                match (initiator, recipient) {
                    (Some(T::X509), Some(T::X509)) => match signed.or(signed_encrypted) {
                        None => P::MutualCertificates,
                        Some(T::Saml) => P::SamlSenderVouches,
                        Some(_) => P::NotRecognized,
                    },
                    (Some(T::Saml), Some(T::X509)) => P::SamlHolderOfKey,
                    (Some(T::Issued), Some(T::X509)) => P::StsIssuedTokenWithServiceCertificate,
                    _ => P::NotRecognized,
                }
            }
            None => P::NotRecognized,
        }
    }
}

/// Which profile the policy of a binding or operation expresses.
///
/// Read-only. A missing policy, a non-binding element or an unknown shape
/// all classify as [`SecurityProfile::NotRecognized`]. With secure
/// conversation on, the bootstrap policy is classified. An operation
/// without a security binding of its own classifies as its binding;
/// otherwise its supporting tokens are read from its input message.
pub fn classify(doc: &Document, element: NodeId) -> SecurityProfile {
    if require_binding_scope(doc, element).is_err() {
        return SecurityProfile::NotRecognized;
    }
    match Shape::read(doc, element) {
        Some(shape) => shape.classify(doc),
        None => SecurityProfile::NotRecognized,
    }
}
