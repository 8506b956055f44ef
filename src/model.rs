//! In-memory WSDL document model.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. A slot freed by
//! [`Document::remove_subtree`] is never handed out again, so a stale id
//! simply reads as absent. Policy mutation goes through a [`Transaction`]
//! obtained from [`Document::begin`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::debug;

use crate::assertion::AssertionKind;
use crate::version::ConfigVersion;

/// Stable index of a node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// WSDL element kinds the engine navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WsdlKind {
    Definitions,
    Service,
    Port,
    SoapAddress,
    Binding,
    BindingOperation,
    BindingInput,
    BindingOutput,
    BindingFault,
}

impl WsdlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definitions => "Definitions",
            Self::Service => "Service",
            Self::Port => "Port",
            Self::SoapAddress => "SoapAddress",
            Self::Binding => "Binding",
            Self::BindingOperation => "BindingOperation",
            Self::BindingInput => "BindingInput",
            Self::BindingOutput => "BindingOutput",
            Self::BindingFault => "BindingFault",
        }
    }

    /// Elements that may reference a policy.
    pub fn is_attachable(&self) -> bool {
        matches!(
            self,
            Self::Binding
                | Self::BindingOperation
                | Self::BindingInput
                | Self::BindingOutput
                | Self::BindingFault
        )
    }
}

/// Kind of a node: a WSDL element or a policy assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Wsdl(WsdlKind),
    Assertion(AssertionKind),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wsdl(kind) => f.write_str(kind.as_str()),
            Self::Assertion(kind) => f.write_str(kind.local_name()),
        }
    }
}

/// Typed attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Attr {
    Id,
    Uri,
    Name,
    Namespace,
    IncludeToken,
    Location,
    Type,
    StorePassword,
    KeyPassword,
    Alias,
    PeerAlias,
    AliasSelector,
    CertSelector,
    ClassName,
    Default,
    MaxClockSkew,
    TimestampFreshnessLimit,
    RevocationEnabled,
    TimestampTimeout,
    LoginModule,
    ServicePrincipal,
    CredentialDelegation,
    EncryptIssuedKey,
    EncryptIssuedToken,
    Visibility,
    Client,
    Binding,
    RequireClientCertificate,
    Text,
}

impl Attr {
    /// XML attribute name; `None` for attributes rendered as content or
    /// used only for bookkeeping.
    pub fn xml_name(&self) -> Option<&'static str> {
        Some(match self {
            Self::Id => "wsu:Id",
            Self::Uri => "URI",
            Self::Name => "Name",
            Self::Namespace => "Namespace",
            Self::IncludeToken => "sp:IncludeToken",
            Self::Location => "location",
            Self::Type => "type",
            Self::StorePassword => "storepass",
            Self::KeyPassword => "keypass",
            Self::Alias => "alias",
            Self::PeerAlias => "peeralias",
            Self::AliasSelector => "aliasSelector",
            Self::CertSelector => "certSelector",
            Self::ClassName => "classname",
            Self::Default => "default",
            Self::MaxClockSkew => "maxClockSkew",
            Self::TimestampFreshnessLimit => "timestampFreshnessLimit",
            Self::RevocationEnabled => "revocationEnabled",
            Self::TimestampTimeout => "timestampTimeout",
            Self::LoginModule => "loginModule",
            Self::ServicePrincipal => "servicePrincipal",
            Self::CredentialDelegation => "credentialDelegation",
            Self::EncryptIssuedKey => "encryptIssuedKey",
            Self::EncryptIssuedToken => "encryptIssuedToken",
            Self::Visibility => "wspp:visibility",
            Self::Binding => "binding",
            Self::RequireClientCertificate => "RequireClientCertificate",
            Self::Client | Self::Text => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    name: Option<String>,
    attrs: BTreeMap<Attr, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, name: Option<String>) -> Self {
        Self {
            kind,
            name,
            attrs: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Id-free canonical form of a subtree, for structural comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<Attr, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeSnapshot>,
}

/// A WSDL document with its policies.
#[derive(Debug, Clone)]
pub struct Document {
    version: ConfigVersion,
    nodes: Vec<Option<Node>>,
    root: NodeId,
    in_transaction: bool,
    commits: u64,
    edits: u64,
}

impl Document {
    /// Create an empty document whose policies use `version`.
    pub fn new(version: ConfigVersion) -> Self {
        Self {
            version,
            nodes: vec![Some(Node::new(NodeKind::Wsdl(WsdlKind::Definitions), None))],
            root: NodeId(0),
            in_transaction: false,
            commits: 0,
            edits: 0,
        }
    }

    pub fn version(&self) -> ConfigVersion {
        self.version
    }

    /// The `Definitions` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn assertion_kind(&self, id: NodeId) -> Option<AssertionKind> {
        match self.kind(id)? {
            NodeKind::Assertion(kind) => Some(kind),
            NodeKind::Wsdl(_) => None,
        }
    }

    pub fn wsdl_kind(&self, id: NodeId) -> Option<WsdlKind> {
        match self.kind(id)? {
            NodeKind::Wsdl(kind) => Some(kind),
            NodeKind::Assertion(_) => None,
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.name.as_deref())
    }

    pub fn attr(&self, id: NodeId, attr: Attr) -> Option<&str> {
        self.node(id).and_then(|n| n.attrs.get(&attr).map(String::as_str))
    }

    /// All attributes of a node, in key order.
    pub fn attrs(&self, id: NodeId) -> impl Iterator<Item = (Attr, &str)> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.attrs.iter().map(|(k, v)| (*k, v.as_str())))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children in document order. Empty for a freed node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Human-readable label used in errors and logs.
    pub fn describe(&self, id: NodeId) -> String {
        match (self.kind(id), self.name(id)) {
            (Some(kind), Some(name)) => format!("{} '{}'", kind, name),
            (Some(kind), None) => format!("{} {}", kind, id),
            (None, _) => format!("removed node {}", id),
        }
    }

    /// Number of completed transactions.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Canonical form of the subtree rooted at `id`.
    pub fn snapshot(&self, id: NodeId) -> Option<TreeSnapshot> {
        let node = self.node(id)?;
        Some(TreeSnapshot {
            kind: node.kind.to_string(),
            name: node.name.clone(),
            attrs: node.attrs.clone(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.snapshot(*child))
                .collect(),
        })
    }

    // ------------------------------------------------------------------
    // WSDL construction
    // ------------------------------------------------------------------

    fn add_wsdl(&mut self, parent: NodeId, kind: WsdlKind, name: Option<&str>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::Wsdl(kind), name.map(str::to_string)));
        self.append(parent, id);
        id
    }

    pub fn add_binding(&mut self, name: &str) -> NodeId {
        self.add_wsdl(self.root, WsdlKind::Binding, Some(name))
    }

    /// Add a request/response operation with an input and an output.
    pub fn add_operation(&mut self, binding: NodeId, name: &str) -> NodeId {
        let op = self.add_wsdl(binding, WsdlKind::BindingOperation, Some(name));
        self.add_wsdl(op, WsdlKind::BindingInput, None);
        self.add_wsdl(op, WsdlKind::BindingOutput, None);
        op
    }

    /// Add an operation with an input only.
    pub fn add_one_way_operation(&mut self, binding: NodeId, name: &str) -> NodeId {
        let op = self.add_wsdl(binding, WsdlKind::BindingOperation, Some(name));
        self.add_wsdl(op, WsdlKind::BindingInput, None);
        op
    }

    pub fn add_fault(&mut self, operation: NodeId, name: &str) -> NodeId {
        self.add_wsdl(operation, WsdlKind::BindingFault, Some(name))
    }

    pub fn add_service(&mut self, name: &str) -> NodeId {
        self.add_wsdl(self.root, WsdlKind::Service, Some(name))
    }

    /// Add a port bound to `binding` with a SOAP address at `location`.
    pub fn add_port(&mut self, service: NodeId, name: &str, binding: &str, location: &str) -> NodeId {
        let port = self.add_wsdl(service, WsdlKind::Port, Some(name));
        self.set_attr(port, Attr::Binding, binding);
        let address = self.add_wsdl(port, WsdlKind::SoapAddress, None);
        self.set_attr(address, Attr::Location, location);
        port
    }

    // ------------------------------------------------------------------
    // WSDL lookup
    // ------------------------------------------------------------------

    fn children_of(&self, id: NodeId, kind: WsdlKind) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.wsdl_kind(*child) == Some(kind))
    }

    pub fn bindings(&self) -> Vec<NodeId> {
        self.children_of(self.root, WsdlKind::Binding).collect()
    }

    pub fn find_binding(&self, name: &str) -> Option<NodeId> {
        self.children_of(self.root, WsdlKind::Binding)
            .find(|b| self.name(*b) == Some(name))
    }

    pub fn operations(&self, binding: NodeId) -> Vec<NodeId> {
        self.children_of(binding, WsdlKind::BindingOperation).collect()
    }

    pub fn find_operation(&self, binding: NodeId, name: &str) -> Option<NodeId> {
        self.children_of(binding, WsdlKind::BindingOperation)
            .find(|op| self.name(*op) == Some(name))
    }

    pub fn binding_input(&self, operation: NodeId) -> Option<NodeId> {
        self.children_of(operation, WsdlKind::BindingInput).next()
    }

    pub fn binding_output(&self, operation: NodeId) -> Option<NodeId> {
        self.children_of(operation, WsdlKind::BindingOutput).next()
    }

    pub fn binding_faults(&self, operation: NodeId) -> Vec<NodeId> {
        self.children_of(operation, WsdlKind::BindingFault).collect()
    }

    /// Input, output and faults of an operation.
    pub fn messages(&self, operation: NodeId) -> Vec<NodeId> {
        self.binding_input(operation)
            .into_iter()
            .chain(self.binding_output(operation))
            .chain(self.binding_faults(operation))
            .collect()
    }

    pub fn services(&self) -> Vec<NodeId> {
        self.children_of(self.root, WsdlKind::Service).collect()
    }

    /// Ports of every service whose `binding` attribute names `binding`.
    pub fn ports_for_binding(&self, binding: NodeId) -> Vec<NodeId> {
        let Some(name) = self.name(binding) else {
            return Vec::new();
        };
        self.services()
            .into_iter()
            .flat_map(|service| self.children_of(service, WsdlKind::Port).collect::<Vec<_>>())
            .filter(|port| self.attr(*port, Attr::Binding) == Some(name))
            .collect()
    }

    pub fn soap_address(&self, port: NodeId) -> Option<NodeId> {
        self.children_of(port, WsdlKind::SoapAddress).next()
    }

    /// Top-level policies.
    pub fn policies(&self) -> Vec<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|child| self.assertion_kind(*child) == Some(AssertionKind::Policy))
            .collect()
    }

    pub fn find_policy_by_id(&self, id: &str) -> Option<NodeId> {
        self.policies()
            .into_iter()
            .find(|policy| self.attr(*policy, Attr::Id) == Some(id))
    }

    /// The binding an attachable element belongs to.
    pub fn owning_binding(&self, element: NodeId) -> Option<NodeId> {
        let mut current = Some(element);
        while let Some(node) = current {
            if self.wsdl_kind(node) == Some(WsdlKind::Binding) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Every attached element that may reference a policy.
    pub fn attachable_elements(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.wsdl_kind(node).is_some_and(|k| k.is_attachable()) {
                found.push(node);
            }
            stack.extend(
                self.children(node)
                    .iter()
                    .rev()
                    .copied()
                    .filter(|child| self.wsdl_kind(*child).is_some()),
            );
        }
        found
    }

    // ------------------------------------------------------------------
    // Primitive mutation
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached assertion node.
    pub(crate) fn create(&mut self, kind: AssertionKind) -> NodeId {
        self.edits += 1;
        self.alloc(Node::new(NodeKind::Assertion(kind), None))
    }

    /// Append `child` under `parent`, detaching it from any previous parent.
    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.edits += 1;
    }

    /// Unlink `id` from its parent, keeping the subtree alive.
    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        self.edits += 1;
    }

    /// Detach and free `id` and all its descendants.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(freed) = self.nodes.get_mut(node.0).and_then(Option::take) {
                stack.extend(freed.children);
            }
        }
        self.edits += 1;
    }

    pub(crate) fn set_attr(&mut self, id: NodeId, attr: Attr, value: impl Into<String>) {
        let value = value.into();
        if let Some(node) = self.node_mut(id) {
            if node.attrs.get(&attr) != Some(&value) {
                node.attrs.insert(attr, value);
                self.edits += 1;
            }
        }
    }

    pub(crate) fn remove_attr(&mut self, id: NodeId, attr: Attr) {
        if let Some(node) = self.node_mut(id) {
            if node.attrs.remove(&attr).is_some() {
                self.edits += 1;
            }
        }
    }

    /// Copy the subtree rooted at `id`; the copy is detached.
    pub(crate) fn deep_copy(&mut self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?.clone();
        let copy = self.alloc(Node {
            parent: None,
            children: Vec::new(),
            ..node.clone()
        });
        for child in node.children {
            if let Some(child_copy) = self.deep_copy(child) {
                self.append(copy, child_copy);
            }
        }
        self.edits += 1;
        Some(copy)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Begin a transaction. It ends when the guard is dropped.
    pub fn begin(&mut self) -> Transaction<'_> {
        self.in_transaction = true;
        let edits_at_begin = self.edits;
        Transaction {
            doc: self,
            edits_at_begin,
        }
    }

    /// Run `f` inside one transaction.
    pub fn transact<R>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let mut tx = self.begin();
        f(&mut tx)
    }
}

/// Scoped write access to a [`Document`].
///
/// Dropping the guard ends the transaction, on success and on early
/// return alike. Edits made before an error are kept.
pub struct Transaction<'a> {
    doc: &'a mut Document,
    edits_at_begin: u64,
}

impl Transaction<'_> {
    /// Edits performed so far in this transaction.
    pub fn edits(&self) -> u64 {
        self.doc.edits - self.edits_at_begin
    }
}

impl Deref for Transaction<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.doc
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let edits = self.edits();
        self.doc.in_transaction = false;
        self.doc.commits += 1;
        debug!(edits, commits = self.doc.commits, "Transaction committed");
    }
}
