//! XML rendering of policy trees.
//!
//! Output is diagnostic: it shows what a document's policies would look
//! like under the document's vocabulary. Nothing here parses XML back.

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::assertion::QName;
use crate::error::PolicyError;
use crate::model::{Attr, Document, NodeId};
use crate::proprietary::is_client;
use crate::version::{WSPP_NS, WSU_NS};

fn qname_of(doc: &Document, node: NodeId) -> Option<QName> {
    let kind = doc.assertion_kind(node)?;
    Some(if is_client(doc, node) {
        kind.client_qname(doc.version())
    } else {
        kind.qname(doc.version())
    })
}

/// Prefix to namespace bindings used anywhere under `node`.
fn collect_namespaces(doc: &Document, node: NodeId, out: &mut BTreeMap<&'static str, &'static str>) {
    if let Some(qname) = qname_of(doc, node) {
        out.insert(qname.prefix, qname.namespace);
    }
    for (attr, _) in doc.attrs(node) {
        match attr {
            Attr::Id => {
                out.insert("wsu", WSU_NS);
            }
            Attr::Visibility => {
                out.insert("wspp", WSPP_NS);
            }
            Attr::IncludeToken => {
                out.insert("sp", doc.version().security_policy_ns());
            }
            _ => {}
        }
    }
    for child in doc.children(node) {
        collect_namespaces(doc, *child, out);
    }
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    node: NodeId,
    namespaces: Option<&BTreeMap<&'static str, &'static str>>,
) -> Result<(), PolicyError> {
    let Some(qname) = qname_of(doc, node) else {
        return Ok(());
    };
    let name = qname.to_string();
    let mut start = BytesStart::new(name.as_str());
    if let Some(namespaces) = namespaces {
        for (prefix, namespace) in namespaces {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), *namespace));
        }
    }
    for (attr, value) in doc.attrs(node) {
        if let Some(xml_name) = attr.xml_name() {
            start.push_attribute((xml_name, value));
        }
    }

    let text = doc.attr(node, Attr::Text);
    let children = doc.children(node);
    if text.is_none() && children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(render_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(render_error)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(render_error)?;
    }
    for child in children {
        write_node(writer, doc, *child, None)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(render_error)?;
    Ok(())
}

fn render_error(err: impl std::fmt::Display) -> PolicyError {
    PolicyError::Render(err.to_string())
}

/// Render one policy (or any assertion subtree) with its namespace
/// declarations on the root element.
pub fn render_policy(doc: &Document, policy: NodeId) -> Result<String, PolicyError> {
    if doc.assertion_kind(policy).is_none() {
        return Err(PolicyError::Render(format!(
            "{} is not a policy assertion",
            doc.describe(policy)
        )));
    }
    let mut namespaces = BTreeMap::new();
    collect_namespaces(doc, policy, &mut namespaces);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_node(&mut writer, doc, policy, Some(&namespaces))?;
    String::from_utf8(writer.into_inner()).map_err(render_error)
}

/// Render every top-level policy of the document, in document order.
pub fn render_policies(doc: &Document) -> Result<String, PolicyError> {
    let rendered = doc
        .policies()
        .into_iter()
        .map(|policy| render_policy(doc, policy))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;
    use crate::policy::policy_for_element;
    use crate::profile::SecurityProfile;
    use crate::proprietary::{set_store_location, Flavour, StoreKind};
    use crate::version::ConfigVersion;

    fn secured(version: ConfigVersion, profile: SecurityProfile) -> (Document, NodeId) {
        let mut doc = Document::new(version);
        let binding = doc.add_binding("EchoBinding");
        doc.add_operation(binding, "echo");
        doc.transact(|tx| apply(tx, binding, profile, false)).unwrap();
        (doc, binding)
    }

    #[test]
    fn test_render_declares_used_namespaces() {
        let (doc, binding) = secured(ConfigVersion::Current, SecurityProfile::MutualCertificates);
        let policy = policy_for_element(&doc, binding).unwrap();
        let xml = render_policy(&doc, policy).unwrap();
        assert!(xml.starts_with("<wsp:Policy"));
        assert!(xml.contains("xmlns:sp=\"http://docs.oasis-open.org/ws-sx/ws-securitypolicy/200702\""));
        assert!(xml.contains("xmlns:wsu="));
        assert!(xml.contains("wsu:Id=\"EchoBindingPolicy\""));
        assert!(xml.contains("<sp:AsymmetricBinding>"));
        assert!(xml.contains("<sp:Wss10>"));
    }

    #[test]
    fn test_render_legacy_vocabulary() {
        let (doc, binding) = secured(ConfigVersion::Legacy, SecurityProfile::UsernameAuthenticationWithSymmetricKey);
        let policy = policy_for_element(&doc, binding).unwrap();
        let xml = render_policy(&doc, policy).unwrap();
        assert!(xml.contains("http://schemas.xmlsoap.org/ws/2005/07/securitypolicy"));
        assert!(xml.contains("<sp:SymmetricBinding>"));
    }

    #[test]
    fn test_render_client_flavour_and_visibility() {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        doc.transact(|tx| set_store_location(tx, binding, StoreKind::TrustStore, Some("truststore.jks"), Flavour::Client))
            .unwrap();
        let xml = render_policies(&doc).unwrap();
        assert!(xml.contains("<sc1:TrustStore"));
        assert!(xml.contains("wspp:visibility=\"private\""));
        assert!(xml.contains("location=\"truststore.jks\""));
    }

    #[test]
    fn test_render_rejects_wsdl_node() {
        let mut doc = Document::new(ConfigVersion::Current);
        let binding = doc.add_binding("B");
        let err = render_policy(&doc, binding).unwrap_err();
        assert_eq!(err.code().as_str(), "RENDER");
    }
}
