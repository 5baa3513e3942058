// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions: named port collections plus a value-production kind.

use crate::port::{ConnectionPolicy, Port, PortDirection, PortId, PortRef, PortType};
use crate::resolve::PullContext;
use crate::storage::PortMap;
use crate::value::Value;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Graph-scoped node identifier. `NodeId(0)` means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Sentinel for a node that has not been attached to a graph.
    pub const UNASSIGNED: NodeId = NodeId(0);

    /// Whether a graph has assigned this identifier.
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static-port descriptor: one row of a node kind's declared schema.
#[derive(Debug, Clone)]
pub struct PortSpec {
    /// Field name of the port.
    pub name: &'static str,
    /// Declared value type.
    pub port_type: PortType,
    /// Port direction.
    pub direction: PortDirection,
    /// Maximum-connection policy.
    pub policy: ConnectionPolicy,
}

impl PortSpec {
    /// Declare an input port (single-connection by default).
    pub fn input(name: &'static str, port_type: PortType) -> Self {
        Self {
            name,
            port_type,
            direction: PortDirection::Input,
            policy: ConnectionPolicy::Single,
        }
    }

    /// Declare an output port (multi-connection by default).
    pub fn output(name: &'static str, port_type: PortType) -> Self {
        Self {
            name,
            port_type,
            direction: PortDirection::Output,
            policy: ConnectionPolicy::Multiple,
        }
    }

    /// Override the connection policy.
    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Behavior of a node: its declared ports and how its outputs are
/// computed.
///
/// Concrete kinds override [`NodeKind::value`] to produce outputs,
/// typically by recursively pulling their own inputs through the
/// supplied [`PullContext`].
pub trait NodeKind {
    /// Type name, used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Declared static ports. Consulted by
    /// [`Node::update_static_ports`] on activation.
    fn schema(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    /// Produce the value for one of this node's output ports.
    ///
    /// The base behavior logs a warning and returns [`Value::Null`].
    fn value(&self, _ctx: &PullContext<'_>, port: &Port) -> Value {
        tracing::warn!(
            kind = self.type_name(),
            port = port.name(),
            "no value override defined for output port"
        );
        Value::Null
    }

    /// Called after a connection from `_from` (output) to `_to` (input)
    /// involving this node is created.
    fn on_create_connection(&mut self, _from: &PortRef, _to: &PortRef) {}

    /// Called after a connection on this node's port `_port` is removed.
    fn on_remove_connection(&mut self, _port: &PortRef) {}
}

/// A node in the graph: an identifier, a name-keyed port collection,
/// and the [`NodeKind`] producing its output values.
pub struct Node {
    id: NodeId,
    name: String,
    ports: PortMap,
    kind: Box<dyn NodeKind>,
}

impl Node {
    /// Create a detached node. The identifier stays
    /// [`NodeId::UNASSIGNED`] until the node joins a graph.
    pub fn new(name: impl Into<String>, kind: impl NodeKind + 'static) -> Self {
        Self {
            id: NodeId::UNASSIGNED,
            name: name.into(),
            ports: PortMap::new(),
            kind: Box::new(kind),
        }
    }

    /// Host-driven activation: populate static ports from the kind's
    /// schema.
    pub fn activate(&mut self) {
        self.update_static_ports();
    }

    /// Reconcile the port set against the kind's declared schema.
    ///
    /// Adds missing static ports; never removes anything, not even
    /// ports absent from the schema.
    pub fn update_static_ports(&mut self) {
        for spec in self.kind.schema() {
            if !self.ports.contains_key(spec.name) {
                self.ports.insert(
                    spec.name.to_string(),
                    Port::new(spec.name, spec.port_type, spec.direction, spec.policy, false),
                );
            }
        }
        self.refresh_port_ids();
    }

    /// Assigned identifier, or [`NodeId::UNASSIGNED`].
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the node.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The node's behavior.
    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    pub(crate) fn kind_mut(&mut self) -> &mut dyn NodeKind {
        self.kind.as_mut()
    }

    /// Assign the graph-issued identifier and refresh the derived ids
    /// of all owned ports.
    pub(crate) fn assign_id(&mut self, id: NodeId) {
        self.id = id;
        self.refresh_port_ids();
    }

    fn refresh_port_ids(&mut self) {
        let node = self.id;
        for (index, port) in self.ports.values_mut().enumerate() {
            port.set_id(PortId {
                node,
                index: index as u32,
            });
        }
    }

    /// Add a dynamic port. With `name: None` a unique field name is
    /// synthesized (`instanceInput_0`, `instanceInput_1`, …). If the
    /// name is already taken the existing port is returned unchanged
    /// and a warning is logged.
    pub fn add_instance_port(
        &mut self,
        port_type: PortType,
        direction: PortDirection,
        policy: ConnectionPolicy,
        name: Option<&str>,
    ) -> &Port {
        let field_name = match name {
            Some(n) => n.to_string(),
            None => {
                let mut i = 0;
                loop {
                    let candidate = format!("instanceInput_{i}");
                    if !self.ports.contains_key(&candidate) {
                        break candidate;
                    }
                    i += 1;
                }
            }
        };
        let id = PortId {
            node: self.id,
            index: self.ports.len() as u32,
        };
        match self.ports.entry(field_name) {
            Entry::Occupied(entry) => {
                tracing::warn!(
                    node = %self.name,
                    port = entry.key().as_str(),
                    "port already exists, returning existing port"
                );
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let mut port = Port::new(entry.key().clone(), port_type, direction, policy, true);
                port.set_id(id);
                entry.insert(port)
            }
        }
    }

    /// Add a dynamic input port (multi-connection by default).
    pub fn add_instance_input(&mut self, port_type: PortType, name: Option<&str>) -> &Port {
        self.add_instance_port(
            port_type,
            PortDirection::Input,
            ConnectionPolicy::Multiple,
            name,
        )
    }

    /// Add a dynamic output port (multi-connection by default).
    pub fn add_instance_output(&mut self, port_type: PortType, name: Option<&str>) -> &Port {
        self.add_instance_port(
            port_type,
            PortDirection::Output,
            ConnectionPolicy::Multiple,
            name,
        )
    }

    /// Detach a port from the node's mapping. Connection cleanup is the
    /// graph's job; see [`crate::Graph::remove_instance_port`].
    pub(crate) fn take_port(&mut self, name: &str) -> Option<Port> {
        let port = self.ports.shift_remove(name);
        if port.is_some() {
            self.refresh_port_ids();
        }
        port
    }

    /// Get a port by field name.
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    pub(crate) fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.get_mut(name)
    }

    /// Whether a port with this field name exists.
    pub fn has_port(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    /// Get an input port by field name. Returns `None` when the name
    /// exists but belongs to an output.
    pub fn input_port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name).filter(|p| p.is_input())
    }

    /// Get an output port by field name. Returns `None` when the name
    /// exists but belongs to an input.
    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name).filter(|p| p.is_output())
    }

    /// Address of one of this node's ports. Only meaningful once the
    /// node has an assigned identifier.
    pub fn port_ref(&self, name: &str) -> PortRef {
        PortRef::new(self.id, name)
    }

    /// Iterate over all ports, in insertion order.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub(crate) fn ports_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.ports.values_mut()
    }

    /// Iterate over all input ports.
    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.is_input())
    }

    /// Iterate over all output ports.
    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.is_output())
    }

    /// Iterate over all dynamic ports.
    pub fn instance_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.is_dynamic())
    }

    /// Iterate over all dynamic input ports.
    pub fn instance_inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.is_dynamic() && p.is_input())
    }

    /// Iterate over all dynamic output ports.
    pub fn instance_outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.is_dynamic() && p.is_output())
    }

    /// Ports keyed by their derived identifiers.
    pub fn ports_by_id(&self) -> HashMap<PortId, &Port> {
        self.ports().map(|p| (p.id(), p)).collect()
    }

    /// Number of ports on this node.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// The port collection in its persistable form.
    pub fn port_map(&self) -> &PortMap {
        &self.ports
    }

    /// Replace the port collection with a deserialized one and refresh
    /// derived port identifiers.
    pub fn restore_ports(&mut self, ports: PortMap) {
        self.ports = ports;
        self.refresh_port_ids();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.type_name())
            .field("ports", &self.ports.len())
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.id.is_assigned() && other.id.is_assigned() {
            self.id == other.id
        } else {
            std::ptr::eq(self, other)
        }
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl NodeKind for Blank {
        fn type_name(&self) -> &'static str {
            "blank"
        }
    }

    struct Adder;

    impl NodeKind for Adder {
        fn type_name(&self) -> &'static str {
            "adder"
        }

        fn schema(&self) -> Vec<PortSpec> {
            vec![
                PortSpec::input("a", PortType::Int),
                PortSpec::input("b", PortType::Int),
                PortSpec::output("sum", PortType::Int),
            ]
        }
    }

    #[test]
    fn test_synthesized_names_are_unique() {
        let mut node = Node::new("n", Blank);
        for _ in 0..4 {
            node.add_instance_input(PortType::Float, None);
        }
        let names: Vec<_> = node.ports().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "instanceInput_0",
                "instanceInput_1",
                "instanceInput_2",
                "instanceInput_3"
            ]
        );
    }

    #[test]
    fn test_synthesis_skips_taken_names() {
        let mut node = Node::new("n", Blank);
        node.add_instance_input(PortType::Float, Some("instanceInput_1"));
        node.add_instance_input(PortType::Float, None);
        node.add_instance_input(PortType::Float, None);
        assert!(node.has_port("instanceInput_0"));
        assert!(node.has_port("instanceInput_1"));
        assert!(node.has_port("instanceInput_2"));
        assert_eq!(node.port_count(), 3);
    }

    #[test]
    fn test_duplicate_name_returns_existing_port() {
        let mut node = Node::new("n", Blank);
        node.add_instance_input(PortType::Float, Some("x"));
        let port = node.add_instance_output(PortType::Int, Some("x"));
        // unchanged: still the original input
        assert!(port.is_input());
        assert_eq!(*port.port_type(), PortType::Float);
        assert_eq!(node.port_count(), 1);
    }

    #[test]
    fn test_update_static_ports_adds_missing_only() {
        let mut node = Node::new("n", Adder);
        node.activate();
        assert_eq!(node.port_count(), 3);
        assert!(node.port("a").is_some_and(Port::is_static));

        // a stale extra port survives reconciliation
        node.add_instance_input(PortType::Float, Some("extra"));
        node.update_static_ports();
        assert_eq!(node.port_count(), 4);
        assert!(node.port("extra").is_some_and(Port::is_dynamic));
    }

    #[test]
    fn test_directional_lookup_filters_direction() {
        let mut node = Node::new("n", Adder);
        node.activate();
        assert!(node.input_port("a").is_some());
        assert!(node.output_port("a").is_none());
        assert!(node.output_port("sum").is_some());
        assert!(node.input_port("sum").is_none());
        assert!(node.port("missing").is_none());
    }

    #[test]
    fn test_instance_port_enumeration() {
        let mut node = Node::new("n", Adder);
        node.activate();
        node.add_instance_input(PortType::Float, Some("dyn_in"));
        node.add_instance_output(PortType::Float, Some("dyn_out"));
        assert_eq!(node.instance_ports().count(), 2);
        assert_eq!(node.instance_inputs().count(), 1);
        assert_eq!(node.instance_outputs().count(), 1);
        assert_eq!(node.inputs().count(), 3);
        assert_eq!(node.outputs().count(), 2);
    }

    #[test]
    fn test_port_ids_follow_node_id() {
        let mut node = Node::new("n", Adder);
        node.activate();
        node.assign_id(NodeId(7));
        let ids: Vec<_> = node.ports().map(Port::id).collect();
        assert!(ids.iter().all(|id| id.node == NodeId(7)));
        assert_eq!(ids.len(), node.ports_by_id().len());
    }

    #[test]
    fn test_equality_by_id_once_assigned() {
        let mut a = Node::new("a", Blank);
        let mut b = Node::new("b", Blank);
        assert_ne!(a, b);

        a.assign_id(NodeId(3));
        b.assign_id(NodeId(3));
        assert_eq!(a, b);

        let mut c = Node::new("c", Blank);
        c.assign_id(NodeId(4));
        assert_ne!(a, c);
    }
}
