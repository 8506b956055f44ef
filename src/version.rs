//! Configuration versions and the namespace vocabulary each one serializes under.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WS-Addressing namespace used for signed header targets.
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
/// WS-Security utility namespace (policy ids).
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
/// Proprietary policy visibility namespace.
pub const WSPP_NS: &str = "http://java.sun.com/xml/ns/wsit/policy";
/// Legacy proprietary reliable-messaging extensions (ordering, duplicates).
pub const SUN_RM_NS: &str = "http://sun.com/2006/03/rm";
/// Proprietary service-side security configuration.
pub const WSS_SERVER_NS: &str = "http://schemas.sun.com/2006/03/wss/server";
/// Proprietary client-side security configuration.
pub const WSS_CLIENT_NS: &str = "http://schemas.sun.com/2006/03/wss/client";
/// Proprietary STS service configuration.
pub const TRUST_SERVER_NS: &str = "http://schemas.sun.com/ws/2006/05/trust/server";

/// Vocabulary epoch of a policy document.
///
/// Legacy is the 2004/2005 submission vocabulary; current is the OASIS
/// WS-SX 1.2 / W3C WS-Policy 1.5 vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConfigVersion {
    #[serde(rename = "1.0")]
    Legacy,
    #[default]
    #[serde(rename = "1.3")]
    Current,
}

impl ConfigVersion {
    pub const ALL: [ConfigVersion; 2] = [ConfigVersion::Legacy, ConfigVersion::Current];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "1.0",
            Self::Current => "1.3",
        }
    }

    /// WS-Policy namespace.
    pub fn policy_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://schemas.xmlsoap.org/ws/2004/09/policy",
            Self::Current => "http://www.w3.org/ns/ws-policy",
        }
    }

    /// WS-SecurityPolicy namespace.
    pub fn security_policy_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://schemas.xmlsoap.org/ws/2005/07/securitypolicy",
            Self::Current => "http://docs.oasis-open.org/ws-sx/ws-securitypolicy/200702",
        }
    }

    /// WS-Trust namespace.
    pub fn trust_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://schemas.xmlsoap.org/ws/2005/02/trust",
            Self::Current => "http://docs.oasis-open.org/ws-sx/ws-trust/200512",
        }
    }

    /// WS-Addressing metadata namespace of the addressing marker.
    pub fn addressing_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://www.w3.org/2006/05/addressing/wsdl",
            Self::Current => "http://www.w3.org/2007/05/addressing/metadata",
        }
    }

    /// WS-ReliableMessaging policy namespace.
    pub fn rm_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://schemas.xmlsoap.org/ws/2005/02/rm/policy",
            Self::Current => "http://docs.oasis-open.org/ws-rx/wsrmp/200702",
        }
    }

    /// WS-ReliableMessaging protocol namespace (sequence headers).
    pub fn rm_protocol_ns(self) -> &'static str {
        match self {
            Self::Legacy => "http://schemas.xmlsoap.org/ws/2005/02/rm",
            Self::Current => "http://docs.oasis-open.org/ws-rx/wsrm/200702",
        }
    }

    /// Prefix of the `IncludeToken` attribute values.
    pub fn include_token_base(self) -> String {
        format!("{}/IncludeToken/", self.security_policy_ns())
    }

    /// Whether delivery assurance is nested under a `DeliveryAssurance` container
    /// (current) or expressed as flat top-level markers (legacy).
    pub fn nests_delivery_assurance(self) -> bool {
        matches!(self, Self::Current)
    }

    /// Default STS contract implementation for this runtime generation.
    pub fn default_sts_contract(self) -> &'static str {
        match self {
            Self::Legacy => "com.sun.xml.ws.security.trust.impl.IssueSamlTokenContractImpl",
            Self::Current => "com.sun.xml.ws.security.trust.impl.WSTrustContractImpl",
        }
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_serde_names() {
        let yaml = serde_yaml::to_string(&ConfigVersion::Legacy).unwrap();
        assert!(yaml.contains("1.0"));
        let parsed: ConfigVersion = serde_yaml::from_str("\"1.3\"").unwrap();
        assert_eq!(parsed, ConfigVersion::Current);
    }

    #[test]
    fn test_namespaces_differ_per_version() {
        assert_ne!(
            ConfigVersion::Legacy.security_policy_ns(),
            ConfigVersion::Current.security_policy_ns()
        );
        assert!(ConfigVersion::Current
            .include_token_base()
            .ends_with("/200702/IncludeToken/"));
    }

    #[test]
    fn test_default_is_current() {
        assert_eq!(ConfigVersion::default(), ConfigVersion::Current);
        assert!(ConfigVersion::Current.nests_delivery_assurance());
        assert!(!ConfigVersion::Legacy.nests_delivery_assurance());
    }
}
