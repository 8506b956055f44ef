//! The closed vocabulary of policy assertion kinds.
//!
//! Every node of a policy tree carries one [`AssertionKind`]. The qualified
//! name a kind serializes under depends on the [`ConfigVersion`] of the
//! document; the kind itself does not.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::version::{
    ConfigVersion, SUN_RM_NS, TRUST_SERVER_NS, WSS_CLIENT_NS, WSS_SERVER_NS,
};

/// Policy assertion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssertionKind {
    // WS-Policy wrappers
    Policy,
    ExactlyOne,
    All,
    PolicyReference,

    // Addressing markers
    UsingAddressing,
    Addressing,

    // Security binding kinds
    TransportBinding,
    SymmetricBinding,
    AsymmetricBinding,

    // Token slots
    ProtectionToken,
    SignatureToken,
    EncryptionToken,
    InitiatorToken,
    RecipientToken,
    TransportToken,

    // Token types
    UsernameToken,
    X509Token,
    SamlToken,
    KerberosToken,
    IssuedToken,
    SecureConversationToken,
    SecurityContextToken,
    HttpsToken,

    // Token refinements
    WssUsernameToken10,
    WssUsernameToken11,
    WssX509V3Token10,
    WssX509V3Token11,
    WssSamlV11Token10,
    WssSamlV11Token11,
    WssSamlV20Token11,
    WssKerberosV5ApReqToken11,
    RequireIssuerSerialReference,
    RequireThumbprintReference,
    RequireKeyIdentifierReference,
    RequireDerivedKeys,
    RequireExternalReference,
    RequireInternalReference,
    RequestSecurityTokenTemplate,
    TokenType,
    KeyType,
    KeySize,
    BootstrapPolicy,

    // Binding refinements
    Layout,
    Strict,
    Lax,
    LaxTsFirst,
    LaxTsLast,
    AlgorithmSuite,
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
    IncludeTimestamp,
    OnlySignEntireHeadersAndBody,
    EncryptSignature,
    EncryptBeforeSigning,

    // WSS markers
    Wss10,
    Wss11,
    MustSupportRefKeyIdentifier,
    MustSupportRefIssuerSerial,
    MustSupportRefThumbprint,
    MustSupportRefEncryptedKey,

    // Trust markers
    Trust10,
    Trust13,
    MustSupportIssuedTokens,
    RequireClientEntropy,
    RequireServerEntropy,

    // Supporting tokens
    SupportingTokens,
    SignedSupportingTokens,
    EndorsingSupportingTokens,
    SignedEndorsingSupportingTokens,
    EncryptedSupportingTokens,
    SignedEncryptedSupportingTokens,
    EndorsingEncryptedSupportingTokens,
    SignedEndorsingEncryptedSupportingTokens,

    // Message targets
    SignedParts,
    EncryptedParts,
    SignedElements,
    EncryptedElements,
    RequiredElements,
    RequiredParts,
    Body,
    Attachments,
    Header,
    XPath,

    // Reliable messaging
    RmAssertion,
    DeliveryAssurance,
    ExactlyOnce,
    AtLeastOnce,
    AtMostOnce,
    InOrder,
    SequenceStr,
    SequenceTransportSecurity,
    Ordered,
    AllowDuplicates,

    // Proprietary runtime configuration
    KeyStore,
    TrustStore,
    ValidatorConfiguration,
    Validator,
    CallbackHandlerConfiguration,
    CallbackHandler,
    KerberosConfig,
    StsConfiguration,
    LifeTime,
    Issuer,
    Contract,
    DisableStreamingSecurity,
}

/// Vocabulary family a kind belongs to; selects its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Policy,
    SecurityPolicy,
    Trust,
    Addressing,
    ReliableMessaging,
    SunReliableMessaging,
    ProprietarySecurity,
    ProprietaryTrust,
}

/// A qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: &'static str,
    pub local: &'static str,
    pub prefix: &'static str,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

impl AssertionKind {
    /// Local XML name.
    pub fn local_name(self) -> &'static str {
        use AssertionKind::*;
        match self {
            Policy => "Policy",
            ExactlyOne => "ExactlyOne",
            All => "All",
            PolicyReference => "PolicyReference",
            UsingAddressing => "UsingAddressing",
            Addressing => "Addressing",
            TransportBinding => "TransportBinding",
            SymmetricBinding => "SymmetricBinding",
            AsymmetricBinding => "AsymmetricBinding",
            ProtectionToken => "ProtectionToken",
            SignatureToken => "SignatureToken",
            EncryptionToken => "EncryptionToken",
            InitiatorToken => "InitiatorToken",
            RecipientToken => "RecipientToken",
            TransportToken => "TransportToken",
            UsernameToken => "UsernameToken",
            X509Token => "X509Token",
            SamlToken => "SamlToken",
            KerberosToken => "KerberosToken",
            IssuedToken => "IssuedToken",
            SecureConversationToken => "SecureConversationToken",
            SecurityContextToken => "SecurityContextToken",
            HttpsToken => "HttpsToken",
            WssUsernameToken10 => "WssUsernameToken10",
            WssUsernameToken11 => "WssUsernameToken11",
            WssX509V3Token10 => "WssX509V3Token10",
            WssX509V3Token11 => "WssX509V3Token11",
            WssSamlV11Token10 => "WssSamlV11Token10",
            WssSamlV11Token11 => "WssSamlV11Token11",
            WssSamlV20Token11 => "WssSamlV20Token11",
            WssKerberosV5ApReqToken11 => "WssKerberosV5ApReqToken11",
            RequireIssuerSerialReference => "RequireIssuerSerialReference",
            RequireThumbprintReference => "RequireThumbprintReference",
            RequireKeyIdentifierReference => "RequireKeyIdentifierReference",
            RequireDerivedKeys => "RequireDerivedKeys",
            RequireExternalReference => "RequireExternalReference",
            RequireInternalReference => "RequireInternalReference",
            RequestSecurityTokenTemplate => "RequestSecurityTokenTemplate",
            TokenType => "TokenType",
            KeyType => "KeyType",
            KeySize => "KeySize",
            BootstrapPolicy => "BootstrapPolicy",
            Layout => "Layout",
            Strict => "Strict",
            Lax => "Lax",
            LaxTsFirst => "LaxTsFirst",
            LaxTsLast => "LaxTsLast",
            AlgorithmSuite => "AlgorithmSuite",
            Basic256 => "Basic256",
            Basic192 => "Basic192",
            Basic128 => "Basic128",
            TripleDes => "TripleDes",
            Basic256Rsa15 => "Basic256Rsa15",
            Basic192Rsa15 => "Basic192Rsa15",
            Basic128Rsa15 => "Basic128Rsa15",
            TripleDesRsa15 => "TripleDesRsa15",
            Basic256Sha256 => "Basic256Sha256",
            Basic192Sha256 => "Basic192Sha256",
            Basic128Sha256 => "Basic128Sha256",
            TripleDesSha256 => "TripleDesSha256",
            IncludeTimestamp => "IncludeTimestamp",
            OnlySignEntireHeadersAndBody => "OnlySignEntireHeadersAndBody",
            EncryptSignature => "EncryptSignature",
            EncryptBeforeSigning => "EncryptBeforeSigning",
            Wss10 => "Wss10",
            Wss11 => "Wss11",
            MustSupportRefKeyIdentifier => "MustSupportRefKeyIdentifier",
            MustSupportRefIssuerSerial => "MustSupportRefIssuerSerial",
            MustSupportRefThumbprint => "MustSupportRefThumbprint",
            MustSupportRefEncryptedKey => "MustSupportRefEncryptedKey",
            Trust10 => "Trust10",
            Trust13 => "Trust13",
            MustSupportIssuedTokens => "MustSupportIssuedTokens",
            RequireClientEntropy => "RequireClientEntropy",
            RequireServerEntropy => "RequireServerEntropy",
            SupportingTokens => "SupportingTokens",
            SignedSupportingTokens => "SignedSupportingTokens",
            EndorsingSupportingTokens => "EndorsingSupportingTokens",
            SignedEndorsingSupportingTokens => "SignedEndorsingSupportingTokens",
            EncryptedSupportingTokens => "EncryptedSupportingTokens",
            SignedEncryptedSupportingTokens => "SignedEncryptedSupportingTokens",
            EndorsingEncryptedSupportingTokens => "EndorsingEncryptedSupportingTokens",
            SignedEndorsingEncryptedSupportingTokens => "SignedEndorsingEncryptedSupportingTokens",
            SignedParts => "SignedParts",
            EncryptedParts => "EncryptedParts",
            SignedElements => "SignedElements",
            EncryptedElements => "EncryptedElements",
            RequiredElements => "RequiredElements",
            RequiredParts => "RequiredParts",
            Body => "Body",
            Attachments => "Attachments",
            Header => "Header",
            XPath => "XPath",
            RmAssertion => "RMAssertion",
            DeliveryAssurance => "DeliveryAssurance",
            ExactlyOnce => "ExactlyOnce",
            AtLeastOnce => "AtLeastOnce",
            AtMostOnce => "AtMostOnce",
            InOrder => "InOrder",
            SequenceStr => "SequenceSTR",
            SequenceTransportSecurity => "SequenceTransportSecurity",
            Ordered => "Ordered",
            AllowDuplicates => "AllowDuplicates",
            KeyStore => "KeyStore",
            TrustStore => "TrustStore",
            ValidatorConfiguration => "ValidatorConfiguration",
            Validator => "Validator",
            CallbackHandlerConfiguration => "CallbackHandlerConfiguration",
            CallbackHandler => "CallbackHandler",
            KerberosConfig => "KerberosConfig",
            StsConfiguration => "STSConfiguration",
            LifeTime => "LifeTime",
            Issuer => "Issuer",
            Contract => "Contract",
            DisableStreamingSecurity => "DisableStreamingSecurity",
        }
    }

    /// Vocabulary family.
    pub fn family(self) -> Family {
        use AssertionKind::*;
        match self {
            Policy | ExactlyOne | All | PolicyReference => Family::Policy,
            UsingAddressing | Addressing => Family::Addressing,
            TokenType | KeyType | KeySize => Family::Trust,
            RmAssertion | DeliveryAssurance | ExactlyOnce | AtLeastOnce | AtMostOnce | InOrder
            | SequenceStr | SequenceTransportSecurity => Family::ReliableMessaging,
            Ordered | AllowDuplicates => Family::SunReliableMessaging,
            KeyStore | TrustStore | ValidatorConfiguration | Validator
            | CallbackHandlerConfiguration | CallbackHandler | KerberosConfig
            | DisableStreamingSecurity => Family::ProprietarySecurity,
            StsConfiguration | LifeTime | Issuer | Contract => Family::ProprietaryTrust,
            _ => Family::SecurityPolicy,
        }
    }

    /// Qualified name under `version`. Proprietary kinds resolve to their
    /// service flavour; see [`AssertionKind::client_qname`].
    pub fn qname(self, version: ConfigVersion) -> QName {
        let local = self.local_name();
        let (namespace, prefix) = match self.family() {
            Family::Policy => (version.policy_ns(), "wsp"),
            Family::SecurityPolicy => (version.security_policy_ns(), "sp"),
            Family::Trust => (version.trust_ns(), "wst"),
            Family::Addressing => match self {
                AssertionKind::UsingAddressing => {
                    (ConfigVersion::Legacy.addressing_ns(), "wsaws")
                }
                _ => (ConfigVersion::Current.addressing_ns(), "wsam"),
            },
            Family::ReliableMessaging => (version.rm_ns(), "wsrmp"),
            Family::SunReliableMessaging => (SUN_RM_NS, "sunrm"),
            Family::ProprietarySecurity => (WSS_SERVER_NS, "sc"),
            Family::ProprietaryTrust => (TRUST_SERVER_NS, "tc"),
        };
        QName {
            namespace,
            local,
            prefix,
        }
    }

    /// Qualified name of the client flavour of a proprietary kind.
    pub fn client_qname(self, version: ConfigVersion) -> QName {
        match self.family() {
            Family::ProprietarySecurity | Family::ProprietaryTrust => QName {
                namespace: WSS_CLIENT_NS,
                local: self.local_name(),
                prefix: "sc1",
            },
            _ => self.qname(version),
        }
    }

    /// Policy / ExactlyOne / All.
    pub fn is_wrapper(self) -> bool {
        matches!(self, Self::Policy | Self::ExactlyOne | Self::All)
    }

    /// Markers that are always present and never count as policy content.
    pub fn is_invisible_marker(self) -> bool {
        matches!(self, Self::UsingAddressing | Self::Addressing)
    }

    pub fn is_security_binding(self) -> bool {
        matches!(
            self,
            Self::TransportBinding | Self::SymmetricBinding | Self::AsymmetricBinding
        )
    }

    pub fn is_token_slot(self) -> bool {
        matches!(
            self,
            Self::ProtectionToken
                | Self::SignatureToken
                | Self::EncryptionToken
                | Self::InitiatorToken
                | Self::RecipientToken
                | Self::TransportToken
        )
    }

    pub fn is_token_type(self) -> bool {
        matches!(
            self,
            Self::UsernameToken
                | Self::X509Token
                | Self::SamlToken
                | Self::KerberosToken
                | Self::IssuedToken
                | Self::SecureConversationToken
                | Self::SecurityContextToken
                | Self::HttpsToken
        )
    }

    pub fn is_supporting_tokens(self) -> bool {
        matches!(
            self,
            Self::SupportingTokens
                | Self::SignedSupportingTokens
                | Self::EndorsingSupportingTokens
                | Self::SignedEndorsingSupportingTokens
                | Self::EncryptedSupportingTokens
                | Self::SignedEncryptedSupportingTokens
                | Self::EndorsingEncryptedSupportingTokens
                | Self::SignedEndorsingEncryptedSupportingTokens
        )
    }

    pub fn is_message_target(self) -> bool {
        matches!(
            self,
            Self::SignedParts
                | Self::EncryptedParts
                | Self::SignedElements
                | Self::EncryptedElements
                | Self::RequiredElements
                | Self::RequiredParts
        )
    }

    pub fn is_proprietary(self) -> bool {
        matches!(
            self.family(),
            Family::ProprietarySecurity | Family::ProprietaryTrust
        )
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// The addressing marker of a version.
pub fn addressing_marker(version: ConfigVersion) -> AssertionKind {
    match version {
        ConfigVersion::Legacy => AssertionKind::UsingAddressing,
        ConfigVersion::Current => AssertionKind::Addressing,
    }
}

/// The trust marker of a version.
pub fn trust_marker(version: ConfigVersion) -> AssertionKind {
    match version {
        ConfigVersion::Legacy => AssertionKind::Trust10,
        ConfigVersion::Current => AssertionKind::Trust13,
    }
}
