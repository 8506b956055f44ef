//! WS-SecurityPolicy profile engine for WSDL binding policies.
//!
//! Reads and writes the policy trees attached to WSDL bindings, operations
//! and messages, classifying them into one of a fixed set of named security
//! profiles and installing the recipe of a profile on request.
//!
//! # Features
//!
//! - Profile classification of bindings and operations
//! - Profile builder with per-message signing and encryption targets
//! - Secure conversation wrapping of an installed profile
//! - Reliable messaging assertions in both vocabularies
//! - Runtime store, validator, callback handler and STS configuration
//! - XML rendering of the resulting policies
//!
//! # Example
//!
//! ```
//! use wsitconf::{apply, classify, ConfigVersion, Document, SecurityProfile};
//!
//! let mut doc = Document::new(ConfigVersion::Current);
//! let binding = doc.add_binding("EchoBinding");
//! doc.add_operation(binding, "echo");
//!
//! doc.transact(|tx| apply(tx, binding, SecurityProfile::MutualCertificates, false))
//!     .unwrap();
//! assert_eq!(classify(&doc, binding), SecurityProfile::MutualCertificates);
//! ```

pub mod assertion;
pub mod binding;
pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod profile;
pub mod proprietary;
pub mod render;
pub mod report;
pub mod rm;
pub mod secconv;
pub mod targets;
pub mod tokens;
pub mod tree;
pub mod version;

pub use assertion::AssertionKind;
pub use builder::{apply, disable_security, is_service_url_https, update_service_url};
pub use config::WsitConfig;
pub use error::{ErrorCode, PolicyError};
pub use model::{Document, NodeId, Transaction};
pub use policy::cleanup;
pub use profile::{classify, SecurityProfile};
pub use render::{render_policies, render_policy};
pub use report::{apply_config, report, ApplyReport};
pub use secconv::{is_secure_conversation_enabled, set_secure_conversation};
pub use version::ConfigVersion;
