//! Runtime configuration assertions of the web services stack.
//!
//! These live next to the security assertions in a binding (or operation)
//! policy, are marked `visibility="private"`, and come in a service and a
//! client flavour that serialize under different namespaces.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assertion::AssertionKind;
use crate::binding::require_binding_scope;
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId, Transaction, WsdlKind};
use crate::policy::{attach_policy, cleanup, policy_container};
use crate::tree;

pub const DEFAULT_USERNAME: &str = "wsit";
pub const DEFAULT_PASSWORD: &str = "wsit";
pub const DEFAULT_STS_LIFETIME: &str = "300000";
pub const DEFAULT_MAX_CLOCK_SKEW: &str = "300000";
pub const DEFAULT_TIMESTAMP_FRESHNESS: &str = "300000";
pub const DEFAULT_HANDLER_TIMESTAMP_TIMEOUT: &str = "300";
pub const DEFAULT_SERVICE_PRINCIPAL: &str = "websvc/service@SUN.COM";

const PRIVATE: &str = "private";

/// Which side of the conversation a configuration assertion is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    #[default]
    Service,
    Client,
}

/// Whether a node carries the client flavour.
pub fn is_client(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, Attr::Client) == Some("true")
}

fn config_node(doc: &Document, element: NodeId, kind: AssertionKind) -> Option<NodeId> {
    tree::find_first(doc, policy_container(doc, element)?, kind)
}

/// Existing configuration assertion of `kind`, or a new private one.
fn ensure_config(
    tx: &mut Transaction<'_>,
    element: NodeId,
    kind: AssertionKind,
    flavour: Flavour,
) -> Result<Option<NodeId>, PolicyError> {
    require_binding_scope(tx, element)?;
    let Some(container) = attach_policy(tx, element, true)? else {
        return Ok(None);
    };
    if let Some(existing) = tree::find_first(tx, container, kind) {
        return Ok(Some(existing));
    }
    let node = tree::create_or_get(tx, container, kind);
    tx.set_attr(node, Attr::Visibility, PRIVATE);
    if flavour == Flavour::Client {
        tx.set_attr(node, Attr::Client, "true");
    }
    Ok(Some(node))
}

fn set_optional_attr(tx: &mut Transaction<'_>, node: NodeId, attr: Attr, value: Option<&str>) {
    match value {
        Some(value) => tx.set_attr(node, attr, value),
        None => tx.remove_attr(node, attr),
    }
}

// ============================================================================
// Key and trust stores
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    KeyStore,
    TrustStore,
}

impl StoreKind {
    fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::KeyStore => AssertionKind::KeyStore,
            Self::TrustStore => AssertionKind::TrustStore,
        }
    }
}

/// Attributes of a store besides its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreField {
    Type,
    StorePassword,
    KeyPassword,
    Alias,
    PeerAlias,
    AliasSelector,
    CertSelector,
}

impl StoreField {
    fn attr(self) -> Attr {
        match self {
            Self::Type => Attr::Type,
            Self::StorePassword => Attr::StorePassword,
            Self::KeyPassword => Attr::KeyPassword,
            Self::Alias => Attr::Alias,
            Self::PeerAlias => Attr::PeerAlias,
            Self::AliasSelector => Attr::AliasSelector,
            Self::CertSelector => Attr::CertSelector,
        }
    }

    pub fn applies_to(self, store: StoreKind) -> bool {
        match self {
            Self::Type | Self::StorePassword => true,
            Self::KeyPassword | Self::Alias | Self::AliasSelector => store == StoreKind::KeyStore,
            Self::PeerAlias | Self::CertSelector => store == StoreKind::TrustStore,
        }
    }
}

/// A store as written in configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub location: String,
    #[serde(rename = "type")]
    pub store_type: Option<String>,
    pub store_password: Option<String>,
    pub key_password: Option<String>,
    pub alias: Option<String>,
    pub peer_alias: Option<String>,
    pub alias_selector: Option<String>,
    pub cert_selector: Option<String>,
}

impl StoreSettings {
    fn fields(&self) -> [(StoreField, Option<&str>); 7] {
        [
            (StoreField::Type, self.store_type.as_deref()),
            (StoreField::StorePassword, self.store_password.as_deref()),
            (StoreField::KeyPassword, self.key_password.as_deref()),
            (StoreField::Alias, self.alias.as_deref()),
            (StoreField::PeerAlias, self.peer_alias.as_deref()),
            (StoreField::AliasSelector, self.alias_selector.as_deref()),
            (StoreField::CertSelector, self.cert_selector.as_deref()),
        ]
    }
}

/// Set the location of a store. `None` removes the store entirely.
pub fn set_store_location(
    tx: &mut Transaction<'_>,
    element: NodeId,
    store: StoreKind,
    location: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    let Some(location) = location else {
        if let Some(container) = policy_container(tx, element) {
            tree::remove(tx, container, store.assertion_kind());
        }
        return Ok(());
    };
    if let Some(node) = ensure_config(tx, element, store.assertion_kind(), flavour)? {
        tx.set_attr(node, Attr::Location, location);
    }
    Ok(())
}

pub fn store_location(doc: &Document, element: NodeId, store: StoreKind) -> Option<String> {
    let node = config_node(doc, element, store.assertion_kind())?;
    doc.attr(node, Attr::Location).map(str::to_string)
}

/// Set or clear one attribute of a store, creating the store if needed.
pub fn set_store_field(
    tx: &mut Transaction<'_>,
    element: NodeId,
    store: StoreKind,
    field: StoreField,
    value: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    if !field.applies_to(store) {
        return Err(PolicyError::Config(format!(
            "{:?} does not apply to {:?}",
            field, store
        )));
    }
    let node = match value {
        Some(_) => ensure_config(tx, element, store.assertion_kind(), flavour)?,
        None => config_node(tx, element, store.assertion_kind()),
    };
    if let Some(node) = node {
        set_optional_attr(tx, node, field.attr(), value);
    }
    Ok(())
}

pub fn store_field(doc: &Document, element: NodeId, store: StoreKind, field: StoreField) -> Option<String> {
    let node = config_node(doc, element, store.assertion_kind())?;
    doc.attr(node, field.attr()).map(str::to_string)
}

/// Write a whole store from configuration. Fields that do not apply to
/// the store kind are ignored.
pub fn configure_store(
    tx: &mut Transaction<'_>,
    element: NodeId,
    store: StoreKind,
    settings: &StoreSettings,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    set_store_location(tx, element, store, Some(&settings.location), flavour)?;
    for (field, value) in settings.fields() {
        if field.applies_to(store) && value.is_some() {
            set_store_field(tx, element, store, field, value, flavour)?;
        }
    }
    Ok(())
}

// ============================================================================
// Validators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    Username,
    Timestamp,
    Certificate,
    Saml,
}

impl ValidatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "usernameValidator",
            Self::Timestamp => "timestampValidator",
            Self::Certificate => "certificateValidator",
            Self::Saml => "samlValidator",
        }
    }
}

fn named_child(doc: &Document, parent: NodeId, kind: AssertionKind, name: &str) -> Option<NodeId> {
    tree::find_all(doc, parent, kind)
        .into_iter()
        .find(|child| doc.attr(*child, Attr::Name) == Some(name))
}

/// Set (`Some`) or remove (`None`) the validator class of `kind`.
pub fn set_validator(
    tx: &mut Transaction<'_>,
    element: NodeId,
    kind: ValidatorKind,
    class_name: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    debug!(element = %tx.describe(element), validator = kind.as_str(), "Setting validator");
    let Some(class_name) = class_name else {
        require_binding_scope(tx, element)?;
        if let Some(config) = config_node(tx, element, AssertionKind::ValidatorConfiguration) {
            if let Some(validator) = named_child(tx, config, AssertionKind::Validator, kind.as_str()) {
                tx.remove_subtree(validator);
            }
        }
        return Ok(());
    };
    let Some(config) = ensure_config(tx, element, AssertionKind::ValidatorConfiguration, flavour)? else {
        return Ok(());
    };
    let validator = match named_child(tx, config, AssertionKind::Validator, kind.as_str()) {
        Some(existing) => existing,
        None => {
            let node = tx.create(AssertionKind::Validator);
            tx.set_attr(node, Attr::Name, kind.as_str());
            tx.append(config, node);
            node
        }
    };
    tx.set_attr(validator, Attr::ClassName, class_name);
    Ok(())
}

pub fn validator(doc: &Document, element: NodeId, kind: ValidatorKind) -> Option<String> {
    let config = config_node(doc, element, AssertionKind::ValidatorConfiguration)?;
    let validator = named_child(doc, config, AssertionKind::Validator, kind.as_str())?;
    doc.attr(validator, Attr::ClassName).map(str::to_string)
}

/// Remove the validator configuration, including its timing settings.
pub fn clear_validators(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if let Some(container) = policy_container(tx, element) {
        tree::remove(tx, container, AssertionKind::ValidatorConfiguration);
    }
    Ok(())
}

pub fn is_any_validator_set(doc: &Document, element: NodeId) -> bool {
    config_node(doc, element, AssertionKind::ValidatorConfiguration).is_some()
}

/// Timing and revocation settings carried by the validator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorSetting {
    MaxClockSkew,
    TimestampFreshness,
    Revocation,
}

impl ValidatorSetting {
    fn attr(self) -> Attr {
        match self {
            Self::MaxClockSkew => Attr::MaxClockSkew,
            Self::TimestampFreshness => Attr::TimestampFreshnessLimit,
            Self::Revocation => Attr::RevocationEnabled,
        }
    }
}

pub fn set_validator_setting(
    tx: &mut Transaction<'_>,
    element: NodeId,
    setting: ValidatorSetting,
    value: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    let config = match value {
        Some(_) => ensure_config(tx, element, AssertionKind::ValidatorConfiguration, flavour)?,
        None => config_node(tx, element, AssertionKind::ValidatorConfiguration),
    };
    if let Some(config) = config {
        set_optional_attr(tx, config, setting.attr(), value);
    }
    Ok(())
}

pub fn validator_setting(doc: &Document, element: NodeId, setting: ValidatorSetting) -> Option<String> {
    let config = config_node(doc, element, AssertionKind::ValidatorConfiguration)?;
    doc.attr(config, setting.attr()).map(str::to_string)
}

pub fn is_revocation_enabled(doc: &Document, element: NodeId) -> bool {
    validator_setting(doc, element, ValidatorSetting::Revocation).as_deref() == Some("true")
}

// ============================================================================
// Callback handlers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Username,
    Password,
    Saml,
    Xwss,
}

impl HandlerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "usernameHandler",
            Self::Password => "passwordHandler",
            Self::Saml => "samlHandler",
            Self::Xwss => "xwssCallbackHandler",
        }
    }
}

/// A configured callback handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallbackHandler {
    pub class_name: Option<String>,
    pub default: Option<String>,
}

/// Set the class and default value of a callback handler. With both
/// `None` the handler is removed, and so is the handler configuration once
/// it has no handlers and no timestamp timeout.
pub fn set_callback_handler(
    tx: &mut Transaction<'_>,
    element: NodeId,
    kind: HandlerKind,
    class_name: Option<&str>,
    default: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if class_name.is_none() && default.is_none() {
        let Some(config) = config_node(tx, element, AssertionKind::CallbackHandlerConfiguration) else {
            return Ok(());
        };
        if let Some(handler) = named_child(tx, config, AssertionKind::CallbackHandler, kind.as_str()) {
            tx.remove_subtree(handler);
        }
        if tx.children(config).is_empty() && tx.attr(config, Attr::TimestampTimeout).is_none() {
            tx.remove_subtree(config);
        }
        return Ok(());
    }

    let Some(config) = ensure_config(tx, element, AssertionKind::CallbackHandlerConfiguration, flavour)?
    else {
        return Ok(());
    };
    let handler = match named_child(tx, config, AssertionKind::CallbackHandler, kind.as_str()) {
        Some(existing) => existing,
        None => {
            let node = tx.create(AssertionKind::CallbackHandler);
            tx.set_attr(node, Attr::Name, kind.as_str());
            tx.append(config, node);
            node
        }
    };
    set_optional_attr(tx, handler, Attr::ClassName, class_name);
    set_optional_attr(tx, handler, Attr::Default, default);
    Ok(())
}

pub fn callback_handler(doc: &Document, element: NodeId, kind: HandlerKind) -> Option<CallbackHandler> {
    let config = config_node(doc, element, AssertionKind::CallbackHandlerConfiguration)?;
    let handler = named_child(doc, config, AssertionKind::CallbackHandler, kind.as_str())?;
    Some(CallbackHandler {
        class_name: doc.attr(handler, Attr::ClassName).map(str::to_string),
        default: doc.attr(handler, Attr::Default).map(str::to_string),
    })
}

pub fn remove_callback_handlers(tx: &mut Transaction<'_>, element: NodeId) -> Result<(), PolicyError> {
    require_binding_scope(tx, element)?;
    if let Some(container) = policy_container(tx, element) {
        tree::remove(tx, container, AssertionKind::CallbackHandlerConfiguration);
    }
    Ok(())
}

pub fn set_handler_timestamp_timeout(
    tx: &mut Transaction<'_>,
    element: NodeId,
    timeout: Option<&str>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    let config = match timeout {
        Some(_) => ensure_config(tx, element, AssertionKind::CallbackHandlerConfiguration, flavour)?,
        None => config_node(tx, element, AssertionKind::CallbackHandlerConfiguration),
    };
    if let Some(config) = config {
        set_optional_attr(tx, config, Attr::TimestampTimeout, timeout);
    }
    Ok(())
}

pub fn handler_timestamp_timeout(doc: &Document, element: NodeId) -> Option<String> {
    let config = config_node(doc, element, AssertionKind::CallbackHandlerConfiguration)?;
    doc.attr(config, Attr::TimestampTimeout).map(str::to_string)
}

/// Install the development username/password defaults.
pub fn set_default_credentials(
    tx: &mut Transaction<'_>,
    element: NodeId,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    set_callback_handler(tx, element, HandlerKind::Username, None, Some(DEFAULT_USERNAME), flavour)?;
    set_callback_handler(tx, element, HandlerKind::Password, None, Some(DEFAULT_PASSWORD), flavour)
}

pub fn default_username(doc: &Document, element: NodeId) -> Option<String> {
    callback_handler(doc, element, HandlerKind::Username)?.default
}

pub fn default_password(doc: &Document, element: NodeId) -> Option<String> {
    callback_handler(doc, element, HandlerKind::Password)?.default
}

// ============================================================================
// Kerberos
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KerberosSettings {
    pub login_module: Option<String>,
    pub service_principal: Option<String>,
    pub credential_delegation: bool,
}

impl KerberosSettings {
    pub fn defaults(flavour: Flavour) -> Self {
        let login_module = match flavour {
            Flavour::Service => "KerberosService",
            Flavour::Client => "KerberosClient",
        };
        Self {
            login_module: Some(login_module.to_string()),
            service_principal: Some(DEFAULT_SERVICE_PRINCIPAL.to_string()),
            credential_delegation: false,
        }
    }
}

/// Write (`Some`) or remove (`None`) the Kerberos configuration.
pub fn set_kerberos_config(
    tx: &mut Transaction<'_>,
    element: NodeId,
    settings: Option<&KerberosSettings>,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    let Some(settings) = settings else {
        require_binding_scope(tx, element)?;
        if let Some(container) = policy_container(tx, element) {
            tree::remove(tx, container, AssertionKind::KerberosConfig);
        }
        return Ok(());
    };
    let Some(node) = ensure_config(tx, element, AssertionKind::KerberosConfig, flavour)? else {
        return Ok(());
    };
    set_optional_attr(tx, node, Attr::LoginModule, settings.login_module.as_deref());
    set_optional_attr(tx, node, Attr::ServicePrincipal, settings.service_principal.as_deref());
    tx.set_attr(
        node,
        Attr::CredentialDelegation,
        if settings.credential_delegation { "true" } else { "false" },
    );
    Ok(())
}

pub fn kerberos_config(doc: &Document, element: NodeId) -> Option<KerberosSettings> {
    let node = config_node(doc, element, AssertionKind::KerberosConfig)?;
    Some(KerberosSettings {
        login_module: doc.attr(node, Attr::LoginModule).map(str::to_string),
        service_principal: doc.attr(node, Attr::ServicePrincipal).map(str::to_string),
        credential_delegation: doc.attr(node, Attr::CredentialDelegation) == Some("true"),
    })
}

// ============================================================================
// Security token service
// ============================================================================

fn require_binding(doc: &Document, element: NodeId) -> Result<(), PolicyError> {
    match doc.wsdl_kind(element) {
        Some(WsdlKind::Binding) => Ok(()),
        _ => Err(PolicyError::NotBindingScope(doc.describe(element))),
    }
}

fn sts_configuration(doc: &Document, binding: NodeId) -> Option<NodeId> {
    config_node(doc, binding, AssertionKind::StsConfiguration)
}

fn set_text_child(tx: &mut Transaction<'_>, parent: NodeId, kind: AssertionKind, value: &str) {
    let child = tree::create_or_get(tx, parent, kind);
    tx.set_attr(child, Attr::Text, value);
}

fn text_child(doc: &Document, parent: NodeId, kind: AssertionKind) -> Option<String> {
    let child = tree::find_first(doc, parent, kind)?;
    doc.attr(child, Attr::Text).map(str::to_string)
}

/// Turn the binding into a security token service endpoint, or back.
///
/// Enabling installs the version's default contract and lifetime.
/// Disabling removes the configuration and runs cleanup.
pub fn enable_sts(tx: &mut Transaction<'_>, binding: NodeId, enable: bool) -> Result<(), PolicyError> {
    require_binding(tx, binding)?;
    debug!(binding = %tx.describe(binding), enable, "Setting STS configuration");
    if !enable {
        if let Some(config) = sts_configuration(tx, binding) {
            tx.remove_subtree(config);
        }
        cleanup(tx);
        return Ok(());
    }
    let contract = tx.version().default_sts_contract();
    let Some(config) = ensure_config(tx, binding, AssertionKind::StsConfiguration, Flavour::Service)? else {
        return Ok(());
    };
    set_text_child(tx, config, AssertionKind::Contract, contract);
    set_text_child(tx, config, AssertionKind::LifeTime, DEFAULT_STS_LIFETIME);
    Ok(())
}

pub fn is_sts_enabled(doc: &Document, binding: NodeId) -> bool {
    sts_configuration(doc, binding).is_some()
}

/// Text settings of the STS configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StsField {
    LifeTime,
    Issuer,
    Contract,
}

impl StsField {
    fn assertion_kind(self) -> AssertionKind {
        match self {
            Self::LifeTime => AssertionKind::LifeTime,
            Self::Issuer => AssertionKind::Issuer,
            Self::Contract => AssertionKind::Contract,
        }
    }
}

fn require_sts(doc: &Document, binding: NodeId) -> Result<NodeId, PolicyError> {
    require_binding(doc, binding)?;
    sts_configuration(doc, binding).ok_or_else(|| {
        PolicyError::UnexpectedShape(format!("STS is not enabled on {}", doc.describe(binding)))
    })
}

pub fn set_sts_field(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    field: StsField,
    value: Option<&str>,
) -> Result<(), PolicyError> {
    let config = require_sts(tx, binding)?;
    match value {
        Some(value) => set_text_child(tx, config, field.assertion_kind(), value),
        None => {
            tree::remove(tx, config, field.assertion_kind());
        }
    }
    Ok(())
}

pub fn sts_field(doc: &Document, binding: NodeId, field: StsField) -> Option<String> {
    text_child(doc, sts_configuration(doc, binding)?, field.assertion_kind())
}

/// Toggle encryption of the issued key (`token == false`) or of the
/// issued token itself (`token == true`).
pub fn set_sts_encryption(
    tx: &mut Transaction<'_>,
    binding: NodeId,
    token: bool,
    enable: bool,
) -> Result<(), PolicyError> {
    let config = require_sts(tx, binding)?;
    let attr = if token { Attr::EncryptIssuedToken } else { Attr::EncryptIssuedKey };
    tx.set_attr(config, attr, if enable { "true" } else { "false" });
    Ok(())
}

pub fn sts_encryption(doc: &Document, binding: NodeId, token: bool) -> bool {
    let attr = if token { Attr::EncryptIssuedToken } else { Attr::EncryptIssuedKey };
    sts_configuration(doc, binding).is_some_and(|config| doc.attr(config, attr) == Some("true"))
}

// ============================================================================
// Streaming
// ============================================================================

/// Streaming security is on unless the `DisableStreamingSecurity` marker
/// is present.
pub fn set_streaming_security(
    tx: &mut Transaction<'_>,
    element: NodeId,
    enable: bool,
    flavour: Flavour,
) -> Result<(), PolicyError> {
    if enable {
        require_binding_scope(tx, element)?;
        if let Some(container) = policy_container(tx, element) {
            tree::remove(tx, container, AssertionKind::DisableStreamingSecurity);
        }
        return Ok(());
    }
    ensure_config(tx, element, AssertionKind::DisableStreamingSecurity, flavour)?;
    Ok(())
}

pub fn is_streaming_security(doc: &Document, element: NodeId) -> bool {
    config_node(doc, element, AssertionKind::DisableStreamingSecurity).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ConfigVersion;

    fn setup() -> (Document, NodeId) {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        doc.add_operation(binding, "op");
        (doc, binding)
    }

    #[test]
    fn test_store_location_none_removes_store() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        set_store_location(&mut tx, binding, StoreKind::KeyStore, Some("keystore.jks"), Flavour::Service)
            .unwrap();
        set_store_field(&mut tx, binding, StoreKind::KeyStore, StoreField::Alias, Some("xws-security-server"), Flavour::Service)
            .unwrap();
        assert_eq!(store_location(&tx, binding, StoreKind::KeyStore).as_deref(), Some("keystore.jks"));
        assert_eq!(
            store_field(&tx, binding, StoreKind::KeyStore, StoreField::Alias).as_deref(),
            Some("xws-security-server")
        );

        let node = config_node(&tx, binding, AssertionKind::KeyStore).unwrap();
        assert_eq!(tx.attr(node, Attr::Visibility), Some("private"));
        assert!(!is_client(&tx, node));

        set_store_location(&mut tx, binding, StoreKind::KeyStore, None, Flavour::Service).unwrap();
        assert_eq!(store_location(&tx, binding, StoreKind::KeyStore), None);
    }

    #[test]
    fn test_store_field_must_apply() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        let err = set_store_field(&mut tx, binding, StoreKind::TrustStore, StoreField::KeyPassword, Some("x"), Flavour::Client)
            .unwrap_err();
        assert_eq!(err.code().as_str(), "CONFIG");
    }

    #[test]
    fn test_configure_store_client_flavour() {
        let (mut doc, binding) = setup();
        let settings = StoreSettings {
            location: "cacerts.jks".to_string(),
            peer_alias: Some("xws-security-client".to_string()),
            key_password: Some("ignored".to_string()),
            ..Default::default()
        };
        doc.transact(|tx| configure_store(tx, binding, StoreKind::TrustStore, &settings, Flavour::Client))
            .unwrap();
        let node = config_node(&doc, binding, AssertionKind::TrustStore).unwrap();
        assert!(is_client(&doc, node));
        assert_eq!(doc.attr(node, Attr::KeyPassword), None);
        assert_eq!(doc.attr(node, Attr::PeerAlias), Some("xws-security-client"));
    }

    #[test]
    fn test_validators() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        assert!(!is_any_validator_set(&tx, binding));
        set_validator(&mut tx, binding, ValidatorKind::Username, Some("org.example.UserValidator"), Flavour::Service)
            .unwrap();
        set_validator(&mut tx, binding, ValidatorKind::Username, Some("org.example.Other"), Flavour::Service)
            .unwrap();
        let config = config_node(&tx, binding, AssertionKind::ValidatorConfiguration).unwrap();
        assert_eq!(tx.children(config).len(), 1);
        assert_eq!(validator(&tx, binding, ValidatorKind::Username).as_deref(), Some("org.example.Other"));

        set_validator_setting(&mut tx, binding, ValidatorSetting::Revocation, Some("true"), Flavour::Service)
            .unwrap();
        assert!(is_revocation_enabled(&tx, binding));

        set_validator(&mut tx, binding, ValidatorKind::Username, None, Flavour::Service).unwrap();
        assert!(is_any_validator_set(&tx, binding));
        clear_validators(&mut tx, binding).unwrap();
        assert!(!is_any_validator_set(&tx, binding));
    }

    #[test]
    fn test_callback_handlers_remove_empty_configuration() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        set_default_credentials(&mut tx, binding, Flavour::Client).unwrap();
        assert_eq!(default_username(&tx, binding).as_deref(), Some("wsit"));
        assert_eq!(default_password(&tx, binding).as_deref(), Some("wsit"));

        set_callback_handler(&mut tx, binding, HandlerKind::Username, None, None, Flavour::Client).unwrap();
        assert!(config_node(&tx, binding, AssertionKind::CallbackHandlerConfiguration).is_some());
        set_callback_handler(&mut tx, binding, HandlerKind::Password, None, None, Flavour::Client).unwrap();
        assert!(config_node(&tx, binding, AssertionKind::CallbackHandlerConfiguration).is_none());
    }

    #[test]
    fn test_handler_config_with_timeout_survives() {
        let (mut doc, binding) = setup();
        let mut tx = doc.begin();
        set_callback_handler(&mut tx, binding, HandlerKind::Saml, Some("org.example.Saml"), None, Flavour::Client)
            .unwrap();
        set_handler_timestamp_timeout(&mut tx, binding, Some(DEFAULT_HANDLER_TIMESTAMP_TIMEOUT), Flavour::Client)
            .unwrap();
        set_callback_handler(&mut tx, binding, HandlerKind::Saml, None, None, Flavour::Client).unwrap();
        assert_eq!(handler_timestamp_timeout(&tx, binding).as_deref(), Some("300"));
    }

    #[test]
    fn test_kerberos_defaults() {
        let (mut doc, binding) = setup();
        let defaults = KerberosSettings::defaults(Flavour::Service);
        doc.transact(|tx| set_kerberos_config(tx, binding, Some(&defaults), Flavour::Service))
            .unwrap();
        let read = kerberos_config(&doc, binding).unwrap();
        assert_eq!(read.login_module.as_deref(), Some("KerberosService"));
        assert_eq!(read.service_principal.as_deref(), Some("websvc/service@SUN.COM"));
        assert!(!read.credential_delegation);
    }

    #[test]
    fn test_sts_lifecycle() {
        let (mut doc, binding) = setup();
        doc.transact(|tx| enable_sts(tx, binding, true)).unwrap();
        assert!(is_sts_enabled(&doc, binding));
        assert_eq!(sts_field(&doc, binding, StsField::LifeTime).as_deref(), Some("300000"));
        assert_eq!(
            sts_field(&doc, binding, StsField::Contract).as_deref(),
            Some(ConfigVersion::Current.default_sts_contract())
        );

        doc.transact(|tx| {
            set_sts_field(tx, binding, StsField::Issuer, Some("MySTS"))?;
            set_sts_encryption(tx, binding, true, true)
        })
        .unwrap();
        assert_eq!(sts_field(&doc, binding, StsField::Issuer).as_deref(), Some("MySTS"));
        assert!(sts_encryption(&doc, binding, true));
        assert!(!sts_encryption(&doc, binding, false));

        doc.transact(|tx| enable_sts(tx, binding, false)).unwrap();
        assert!(!is_sts_enabled(&doc, binding));
        assert!(doc.policies().is_empty());
    }

    #[test]
    fn test_sts_requires_binding() {
        let (mut doc, binding) = setup();
        let op = doc.operations(binding)[0];
        let err = doc.transact(|tx| enable_sts(tx, op, true)).unwrap_err();
        assert!(matches!(err, PolicyError::NotBindingScope(_)));
        let err = doc
            .transact(|tx| set_sts_field(tx, binding, StsField::Issuer, Some("x")))
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnexpectedShape(_)));
    }

    #[test]
    fn test_streaming_security_toggle() {
        let (mut doc, binding) = setup();
        assert!(is_streaming_security(&doc, binding));
        doc.transact(|tx| set_streaming_security(tx, binding, false, Flavour::Service))
            .unwrap();
        assert!(!is_streaming_security(&doc, binding));
        doc.transact(|tx| set_streaming_security(tx, binding, true, Flavour::Service))
            .unwrap();
        assert!(is_streaming_security(&doc, binding));
    }
}
