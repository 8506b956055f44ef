//! Error types for the policy engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::ConfigVersion;

/// Policy engine errors.
///
/// Absence (no policy, no token, no binding kind) is never an error: it is
/// reported as `None`. Detached elements degrade to no-ops. What remains
/// here are contract violations by the caller and configuration failures.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("element {0} is neither a Binding nor a BindingOperation")]
    NotBindingScope(String),

    #[error("element {0} cannot carry a policy reference")]
    NotAttachable(String),

    #[error("node {0} is not a token assertion")]
    NotAToken(String),

    #[error("token slot {slot} is not allowed on {binding}")]
    SlotNotAllowed { slot: String, binding: String },

    #[error("{what} is not expressible in configuration version {version}")]
    UnsupportedInVersion {
        what: String,
        version: ConfigVersion,
    },

    #[error("invalid message target: {0}")]
    InvalidTarget(String),

    #[error("no security binding is configured on {0}")]
    NoSecurityBinding(String),

    #[error("secure conversation is not enabled on {0}")]
    SecureConversationNotEnabled(String),

    #[error("unexpected policy shape: {0}")]
    UnexpectedShape(String),

    #[error("reliable messaging is not enabled on {0}")]
    RmNotEnabled(String),

    #[error("unknown element: {0}")]
    UnknownElement(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotBindingScope(_) => ErrorCode::NotBindingScope,
            Self::NotAttachable(_) => ErrorCode::NotAttachable,
            Self::NotAToken(_) => ErrorCode::NotAToken,
            Self::SlotNotAllowed { .. } => ErrorCode::SlotNotAllowed,
            Self::UnsupportedInVersion { .. } => ErrorCode::UnsupportedInVersion,
            Self::InvalidTarget(_) => ErrorCode::InvalidTarget,
            Self::NoSecurityBinding(_) => ErrorCode::NoSecurityBinding,
            Self::SecureConversationNotEnabled(_) => ErrorCode::SecureConversationNotEnabled,
            Self::UnexpectedShape(_) => ErrorCode::UnexpectedShape,
            Self::RmNotEnabled(_) => ErrorCode::RmNotEnabled,
            Self::UnknownElement(_) => ErrorCode::UnknownElement,
            Self::Render(_) => ErrorCode::Render,
            Self::Config(_) => ErrorCode::Config,
            Self::Io(_) => ErrorCode::Io,
        }
    }

    pub(crate) fn unsupported(what: impl Into<String>, version: ConfigVersion) -> Self {
        Self::UnsupportedInVersion {
            what: what.into(),
            version,
        }
    }
}

/// Error codes, serialized in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Operation requires a Binding or BindingOperation
    NotBindingScope,
    /// Element cannot reference a policy
    NotAttachable,
    /// Node is not a token
    NotAToken,
    /// Token slot incompatible with the security binding
    SlotNotAllowed,
    /// Assertion form unavailable in the configuration version
    UnsupportedInVersion,
    /// Message target cannot be expressed
    InvalidTarget,
    /// Security binding missing
    NoSecurityBinding,
    /// Secure conversation expected but absent
    SecureConversationNotEnabled,
    /// Policy tree does not have the expected structure
    UnexpectedShape,
    /// Reliable messaging assertion missing
    RmNotEnabled,
    /// Named element not found
    UnknownElement,
    /// XML rendering failure
    Render,
    /// Invalid configuration
    Config,
    /// IO failure
    Io,
}

impl ErrorCode {
    /// Get the string code for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotBindingScope => "NOT_BINDING_SCOPE",
            Self::NotAttachable => "NOT_ATTACHABLE",
            Self::NotAToken => "NOT_A_TOKEN",
            Self::SlotNotAllowed => "SLOT_NOT_ALLOWED",
            Self::UnsupportedInVersion => "UNSUPPORTED_IN_VERSION",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::NoSecurityBinding => "NO_SECURITY_BINDING",
            Self::SecureConversationNotEnabled => "SECURE_CONVERSATION_NOT_ENABLED",
            Self::UnexpectedShape => "UNEXPECTED_SHAPE",
            Self::RmNotEnabled => "RM_NOT_ENABLED",
            Self::UnknownElement => "UNKNOWN_ELEMENT",
            Self::Render => "RENDER",
            Self::Config => "CONFIG",
            Self::Io => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::NotBindingScope.as_str(), "NOT_BINDING_SCOPE");
        assert_eq!(
            ErrorCode::SecureConversationNotEnabled.as_str(),
            "SECURE_CONVERSATION_NOT_ENABLED"
        );
    }

    #[test]
    fn test_error_maps_to_code() {
        let err = PolicyError::unsupported("EncryptedSupportingTokens", ConfigVersion::Legacy);
        assert_eq!(err.code(), ErrorCode::UnsupportedInVersion);
        assert!(err.to_string().contains("1.0"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PolicyError = io.into();
        assert_eq!(err.code().as_str(), "IO");
    }
}
