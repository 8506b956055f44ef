//! Configuration types for the `wsitconf` tool.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::model::Document;
use crate::profile::SecurityProfile;
use crate::proprietary::{Flavour, KerberosSettings, StoreSettings};
use crate::version::ConfigVersion;

/// Main configuration: a WSDL skeleton plus the profiles to apply to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsitConfig {
    /// Config version
    pub version: String,

    /// General settings
    pub settings: SettingsConfig,

    /// The document the profiles are applied to
    pub document: DocumentConfig,

    /// Profile rules, applied in order
    pub profiles: Vec<ProfileRule>,

    /// Runtime stores installed on every configured binding
    pub stores: StoresConfig,
}

impl Default for WsitConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: SettingsConfig::default(),
            document: DocumentConfig::default(),
            profiles: Vec::new(),
            stores: StoresConfig::default(),
        }
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Vocabulary the policies are written in ("1.0" or "1.3")
    pub config_version: ConfigVersion,

    /// Rewrite service addresses to match the transport of the profile
    pub update_service_url: bool,

    /// Fail when a rule leaves a target that classifies as not recognized
    pub fail_on_unrecognized: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            config_version: ConfigVersion::Current,
            update_service_url: true,
            fail_on_unrecognized: true,
        }
    }
}

/// WSDL skeleton.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub bindings: Vec<BindingConfig>,
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub name: String,
    pub operations: Vec<OperationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub name: String,

    /// Input only, no output message
    pub one_way: bool,

    /// Fault names
    pub faults: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub ports: Vec<PortConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub name: String,

    /// Name of the binding this port implements
    pub binding: String,

    /// SOAP address location
    pub address: String,
}

/// One profile application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRule {
    /// Binding name
    pub binding: String,

    /// Operation name patterns; empty applies the profile to the binding
    pub operations: Vec<String>,

    /// Profile to install
    pub profile: SecurityProfile,

    /// Wrap the installed security in a secure conversation
    pub secure_conversation: bool,

    /// Enable reliable messaging on the binding before the profile
    pub reliable_messaging: bool,
}

impl Default for ProfileRule {
    fn default() -> Self {
        Self {
            binding: String::new(),
            operations: Vec::new(),
            profile: SecurityProfile::MutualCertificates,
            secure_conversation: false,
            reliable_messaging: false,
        }
    }
}

impl ProfileRule {
    /// Compiled operation patterns.
    pub fn patterns(&self) -> Result<Vec<Pattern>, PolicyError> {
        self.operations
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    PolicyError::Config(format!("invalid operation pattern '{}': {}", p, e))
                })
            })
            .collect()
    }

    pub fn targets_binding(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Keystore / truststore / Kerberos defaults.
///
/// Each is installed only on bindings whose profile needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub flavour: Flavour,
    pub keystore: Option<StoreSettings>,
    pub truststore: Option<StoreSettings>,
    pub kerberos: Option<KerberosSettings>,
}

impl WsitConfig {
    /// Check cross references between sections.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let known = |name: &str| self.document.bindings.iter().any(|b| b.name == name);
        for service in &self.document.services {
            for port in &service.ports {
                if !known(&port.binding) {
                    return Err(PolicyError::Config(format!(
                        "port '{}' refers to unknown binding '{}'",
                        port.name, port.binding
                    )));
                }
            }
        }
        for rule in &self.profiles {
            if !known(&rule.binding) {
                return Err(PolicyError::UnknownElement(format!("binding '{}'", rule.binding)));
            }
            if rule.profile == SecurityProfile::NotRecognized {
                return Err(PolicyError::Config(format!(
                    "rule for '{}' names no buildable profile",
                    rule.binding
                )));
            }
            rule.patterns()?;
        }
        Ok(())
    }

    /// Build the configured WSDL skeleton.
    pub fn build_document(&self) -> Result<Document, PolicyError> {
        self.validate()?;
        let mut doc = Document::new(self.settings.config_version);
        for binding in &self.document.bindings {
            let id = doc.add_binding(&binding.name);
            for op in &binding.operations {
                let op_id = if op.one_way {
                    doc.add_one_way_operation(id, &op.name)
                } else {
                    doc.add_operation(id, &op.name)
                };
                for fault in &op.faults {
                    doc.add_fault(op_id, fault);
                }
            }
        }
        for service in &self.document.services {
            let id = doc.add_service(&service.name);
            for port in &service.ports {
                doc.add_port(id, &port.name, &port.binding, &port.address);
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1"
settings:
  config_version: "1.0"
  update_service_url: false
document:
  bindings:
    - name: EchoBinding
      operations:
        - name: echo
          faults: [EchoFault]
        - name: notify
          one_way: true
  services:
    - name: EchoService
      ports:
        - name: EchoPort
          binding: EchoBinding
          address: "http://localhost:${HttpDefaultPort}/echo"
profiles:
  - binding: EchoBinding
    profile: kerberos
    reliable_messaging: true
  - binding: EchoBinding
    operations: ["no*"]
    profile: transport
stores:
  flavour: client
  truststore:
    location: cacerts.jks
    peer_alias: server
"#;

    #[test]
    fn test_default_config() {
        let config = WsitConfig::default();
        assert_eq!(config.settings.config_version, ConfigVersion::Current);
        assert!(config.settings.update_service_url);
        assert!(config.settings.fail_on_unrecognized);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config: WsitConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: WsitConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.profiles.len(), 2);
        assert_eq!(parsed.settings.config_version, ConfigVersion::Legacy);
    }

    #[test]
    fn test_config_from_yaml() {
        let config: WsitConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(!config.settings.update_service_url);
        assert_eq!(config.profiles[0].profile, SecurityProfile::Kerberos);
        assert!(config.profiles[0].reliable_messaging);
        assert!(config.profiles[0].targets_binding());
        assert_eq!(config.profiles[1].profile, SecurityProfile::Transport);
        assert_eq!(config.stores.flavour, Flavour::Client);
        let truststore = config.stores.truststore.as_ref().unwrap();
        assert_eq!(truststore.peer_alias.as_deref(), Some("server"));
    }

    #[test]
    fn test_build_document() {
        let config: WsitConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let doc = config.build_document().unwrap();
        let binding = doc.find_binding("EchoBinding").unwrap();
        let echo = doc.find_operation(binding, "echo").unwrap();
        let notify = doc.find_operation(binding, "notify").unwrap();
        assert_eq!(doc.binding_faults(echo).len(), 1);
        assert!(doc.binding_output(notify).is_none());
        assert_eq!(doc.ports_for_binding(binding).len(), 1);
    }

    #[test]
    fn test_validate_unknown_binding() {
        let mut config: WsitConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.profiles[0].binding = "Missing".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code().as_str(), "UNKNOWN_ELEMENT");
    }

    #[test]
    fn test_validate_bad_pattern() {
        let mut config: WsitConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.profiles[1].operations = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }
}
