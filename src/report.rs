//! Applying configured profile rules to a document and reporting the result.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::{apply, is_service_url_https};
use crate::config::{ProfileRule, SettingsConfig, StoresConfig, WsitConfig};
use crate::error::PolicyError;
use crate::model::{Document, NodeId, Transaction};
use crate::profile::{classify, ProfileRequirements, SecurityProfile};
use crate::proprietary::{configure_store, set_kerberos_config, KerberosSettings, StoreKind};
use crate::rm::{enable_rm, is_rm_enabled};
use crate::secconv::{is_secure_conversation_enabled, set_secure_conversation};
use crate::version::ConfigVersion;

/// Classification of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    pub name: String,
    pub profile: SecurityProfile,
    pub display_name: &'static str,
}

/// Classification of one binding and its operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingReport {
    pub name: String,
    pub profile: SecurityProfile,
    pub display_name: &'static str,
    pub secure_conversation: bool,
    pub reliable_messaging: bool,
    /// `None` when no port implements the binding.
    pub service_url_https: Option<bool>,
    pub operations: Vec<OperationReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub config_version: ConfigVersion,
    pub policies: usize,
    pub transactions: u64,
    pub bindings: Vec<BindingReport>,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "configuration version {} ({} policies, {} transactions)",
            self.config_version, self.policies, self.transactions
        )?;
        for binding in &self.bindings {
            write!(f, "{}: {}", binding.name, binding.display_name)?;
            if binding.secure_conversation {
                f.write_str(" + secure conversation")?;
            }
            if binding.reliable_messaging {
                f.write_str(" + reliable messaging")?;
            }
            if let Some(https) = binding.service_url_https {
                write!(f, " [{}]", if https { "https" } else { "http" })?;
            }
            writeln!(f)?;
            for op in &binding.operations {
                writeln!(f, "  {}: {}", op.name, op.display_name)?;
            }
        }
        Ok(())
    }
}

/// Classify every binding and operation of `doc`.
pub fn report(doc: &Document) -> ApplyReport {
    let bindings = doc
        .bindings()
        .into_iter()
        .map(|binding| {
            let profile = classify(doc, binding);
            let operations = doc
                .operations(binding)
                .into_iter()
                .map(|op| {
                    let profile = classify(doc, op);
                    OperationReport {
                        name: doc.name(op).unwrap_or_default().to_string(),
                        profile,
                        display_name: profile.display_name(),
                    }
                })
                .collect();
            BindingReport {
                name: doc.name(binding).unwrap_or_default().to_string(),
                profile,
                display_name: profile.display_name(),
                secure_conversation: is_secure_conversation_enabled(doc, binding),
                reliable_messaging: is_rm_enabled(doc, binding),
                service_url_https: (!doc.ports_for_binding(binding).is_empty())
                    .then(|| is_service_url_https(doc, binding)),
                operations,
            }
        })
        .collect();
    ApplyReport {
        config_version: doc.version(),
        policies: doc.policies().len(),
        transactions: doc.commit_count(),
        bindings,
    }
}

fn rule_targets(doc: &Document, binding: NodeId, rule: &ProfileRule) -> Result<Vec<NodeId>, PolicyError> {
    if rule.targets_binding() {
        return Ok(vec![binding]);
    }
    let patterns = rule.patterns()?;
    Ok(doc
        .operations(binding)
        .into_iter()
        .filter(|op| {
            doc.name(*op)
                .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
        })
        .collect())
}

fn apply_rule(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    rule: &ProfileRule,
    settings: &SettingsConfig,
) -> Result<(), PolicyError> {
    let targets = rule_targets(tx, binding, rule)?;
    if targets.is_empty() {
        warn!(binding = %rule.binding, patterns = ?rule.operations, "Rule matches no operation");
        return Ok(());
    }
    if rule.reliable_messaging {
        enable_rm(tx, binding, true)?;
    }
    for target in targets {
        info!(
            element = %tx.describe(target),
            profile = rule.profile.as_str(),
            "Applying profile rule"
        );
        apply(tx, target, rule.profile, settings.update_service_url)?;
        if rule.secure_conversation {
            set_secure_conversation(tx, target, true)?;
        }
        if settings.fail_on_unrecognized && classify(tx, target) == SecurityProfile::NotRecognized {
            return Err(PolicyError::Config(format!(
                "{} does not classify after applying {}",
                tx.describe(target),
                rule.profile.as_str()
            )));
        }
    }
    Ok(())
}

fn install_stores(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    needs: ProfileRequirements,
    stores: &StoresConfig,
) -> Result<(), PolicyError> {
    if let Some(keystore) = stores.keystore.as_ref().filter(|_| needs.keystore) {
        configure_store(tx, binding, StoreKind::KeyStore, keystore, stores.flavour)?;
    }
    if let Some(truststore) = stores.truststore.as_ref().filter(|_| needs.truststore) {
        configure_store(tx, binding, StoreKind::TrustStore, truststore, stores.flavour)?;
    }
    if needs.kerberos {
        let kerberos = stores
            .kerberos
            .clone()
            .unwrap_or_else(|| KerberosSettings::defaults(stores.flavour));
        set_kerberos_config(tx, binding, Some(&kerberos), stores.flavour)?;
    }
    Ok(())
}

/// Apply every rule of `config` to `doc`, one transaction per rule, then
/// install the configured stores on the bindings whose profiles need them.
pub fn apply_config(doc: &mut Document, config: &WsitConfig) -> Result<ApplyReport, PolicyError> {
    config.validate()?;
    let mut needs: Vec<(NodeId, ProfileRequirements)> = Vec::new();

    for rule in &config.profiles {
        let binding = doc
            .find_binding(&rule.binding)
            .ok_or_else(|| PolicyError::UnknownElement(format!("binding '{}'", rule.binding)))?;
        doc.transact(|tx| apply_rule(tx, binding, rule, &config.settings))?;

        let req = rule.profile.requirements();
        match needs.iter_mut().find(|(b, _)| *b == binding) {
            Some((_, acc)) => {
                acc.keystore |= req.keystore;
                acc.truststore |= req.truststore;
                acc.kerberos |= req.kerberos;
            }
            None => needs.push((binding, req)),
        }
    }

    for (binding, req) in needs {
        debug!(binding = %doc.describe(binding), ?req, "Installing stores");
        doc.transact(|tx| install_stores(tx, binding, req, &config.stores))?;
    }

    Ok(report(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proprietary::{kerberos_config, store_location};

    fn config(yaml: &str) -> WsitConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = r#"
document:
  bindings:
    - name: EchoBinding
      operations:
        - name: echo
        - name: ping
  services:
    - name: EchoService
      ports:
        - name: EchoPort
          binding: EchoBinding
          address: "http://localhost:${HttpDefaultPort}/echo"
"#;

    #[test]
    fn test_apply_binding_rule() {
        let cfg = config(&format!(
            "{}{}",
            BASE,
            r#"
profiles:
  - binding: EchoBinding
    profile: transport
"#
        ));
        let mut doc = cfg.build_document().unwrap();
        let report = apply_config(&mut doc, &cfg).unwrap();
        let binding = &report.bindings[0];
        assert_eq!(binding.profile, SecurityProfile::Transport);
        assert_eq!(binding.service_url_https, Some(true));
        assert_eq!(binding.operations.len(), 2);
    }

    #[test]
    fn test_apply_operation_patterns() {
        let cfg = config(&format!(
            "{}{}",
            BASE,
            r#"
profiles:
  - binding: EchoBinding
    operations: ["ec*"]
    profile: kerberos
"#
        ));
        let mut doc = cfg.build_document().unwrap();
        let report = apply_config(&mut doc, &cfg).unwrap();
        let ops = &report.bindings[0].operations;
        assert_eq!(ops[0].profile, SecurityProfile::Kerberos);
        assert_eq!(ops[1].profile, SecurityProfile::NotRecognized);

        let binding = doc.find_binding("EchoBinding").unwrap();
        let kerberos = kerberos_config(&doc, binding).unwrap();
        assert_eq!(kerberos.login_module.as_deref(), Some("KerberosService"));
    }

    #[test]
    fn test_apply_with_secure_conversation_and_rm() {
        let cfg = config(&format!(
            "{}{}",
            BASE,
            r#"
profiles:
  - binding: EchoBinding
    profile: mutual-certificates
    secure_conversation: true
    reliable_messaging: true
stores:
  keystore:
    location: keystore.jks
    alias: server
"#
        ));
        let mut doc = cfg.build_document().unwrap();
        let report = apply_config(&mut doc, &cfg).unwrap();
        let binding = &report.bindings[0];
        assert_eq!(binding.profile, SecurityProfile::MutualCertificates);
        assert!(binding.secure_conversation);
        assert!(binding.reliable_messaging);

        let id = doc.find_binding("EchoBinding").unwrap();
        assert_eq!(store_location(&doc, id, StoreKind::KeyStore).as_deref(), Some("keystore.jks"));
        assert!(report.to_string().contains("EchoBinding: Mutual Certificates Security"));
    }

    #[test]
    fn test_unknown_binding_rejected() {
        let cfg = config(&format!(
            "{}{}",
            BASE,
            r#"
profiles:
  - binding: Nope
    profile: kerberos
"#
        ));
        let mut doc = Document::new(ConfigVersion::Current);
        let err = apply_config(&mut doc, &cfg).unwrap_err();
        assert_eq!(err.code().as_str(), "UNKNOWN_ELEMENT");
    }
}
