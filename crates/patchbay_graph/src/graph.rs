// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph container: node registry, identifier allocation, and the
//! structural connect/disconnect operations.

use crate::node::{Node, NodeId};
use crate::port::{ConnectionPolicy, Port, PortRef, PortType, TypeCompatibility};
use indexmap::IndexMap;
use std::collections::HashSet;

/// A mutable node/port graph.
///
/// The graph exclusively owns its nodes, keyed by identifier in
/// insertion order. All cross-node operations live here, since only the
/// graph can reach both endpoints of a connection. Peer lists on the
/// two endpoints of every connection are kept symmetric.
#[derive(Debug)]
pub struct Graph {
    /// Graph name.
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    next_id: u64,
    compatibility: TypeCompatibility,
}

impl Graph {
    /// Create a new empty graph with exact-match type compatibility.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            next_id: 0,
            compatibility: TypeCompatibility::default(),
        }
    }

    /// Set the type-compatibility policy used by [`Graph::connect`].
    pub fn with_compatibility(mut self, compatibility: TypeCompatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// The type-compatibility policy in effect.
    pub fn compatibility(&self) -> TypeCompatibility {
        self.compatibility
    }

    /// Replace the type-compatibility policy.
    pub fn set_compatibility(&mut self, compatibility: TypeCompatibility) {
        self.compatibility = compatibility;
    }

    /// Issue a fresh identifier: strictly increasing, non-zero, never
    /// reissued within this graph's lifetime.
    pub fn next_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Add a node, assigning it an identifier if it does not already
    /// carry one. A node re-attached with a persisted identifier keeps
    /// it, and the allocator is bumped past it; if that identifier is
    /// already held by a node in this graph, the incoming node is
    /// reassigned a fresh one instead of displacing the holder.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if !node.id().is_assigned() {
            let id = self.next_id();
            node.assign_id(id);
        } else if self.nodes.contains_key(&node.id()) {
            // allocator sits past every live id, so the fresh id is free
            let id = self.next_id();
            tracing::warn!(
                node = %node.name(),
                carried = %node.id(),
                assigned = %id,
                "node id already in use in this graph, reassigning"
            );
            node.assign_id(id);
        } else {
            self.next_id = self.next_id.max(node.id().0);
        }
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node, symmetrically clearing all its connections first.
    /// Insertion order of the remaining nodes is preserved.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.clear_node_connections(id);
        self.nodes.shift_remove(&id)
    }

    /// Get a node by identifier.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by identifier.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterate over all node identifiers in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a port by address.
    pub fn port(&self, at: &PortRef) -> Option<&Port> {
        self.nodes.get(&at.node)?.port(&at.port)
    }

    fn port_mut(&mut self, at: &PortRef) -> Option<&mut Port> {
        self.nodes.get_mut(&at.node)?.port_mut(&at.port)
    }

    fn require_port(&self, at: &PortRef) -> Result<&Port, ConnectError> {
        let node = self
            .nodes
            .get(&at.node)
            .ok_or(ConnectError::NodeNotFound(at.node))?;
        node.port(&at.port)
            .ok_or_else(|| ConnectError::PortNotFound(at.clone()))
    }

    /// Connect two ports.
    ///
    /// Fails when the ports share a direction or their declared types
    /// are incompatible under the graph's policy. Connecting an already
    /// connected pair is a no-op. A `Single`-policy endpoint first
    /// drops its existing peer, symmetrically. Fires
    /// `on_create_connection` on both nodes once the edge exists.
    pub fn connect(&mut self, a: &PortRef, b: &PortRef) -> Result<(), ConnectError> {
        let port_a = self.require_port(a)?;
        let port_b = self.require_port(b)?;

        if port_a.direction() == port_b.direction() {
            return Err(ConnectError::InvalidDirection {
                a: a.clone(),
                b: b.clone(),
            });
        }

        let (output, input) = if port_a.is_output() { (a, b) } else { (b, a) };
        let (out_port, in_port) = if port_a.is_output() {
            (port_a, port_b)
        } else {
            (port_b, port_a)
        };

        if !self
            .compatibility
            .allows(out_port.port_type(), in_port.port_type())
        {
            return Err(ConnectError::TypeMismatch {
                output: out_port.port_type().clone(),
                input: in_port.port_type().clone(),
            });
        }

        if out_port.connected_to(input) {
            return Ok(());
        }

        let mut replaced: Vec<(PortRef, PortRef)> = Vec::new();
        if out_port.policy() == ConnectionPolicy::Single {
            replaced.extend(
                out_port
                    .connections()
                    .iter()
                    .map(|peer| (output.clone(), peer.clone())),
            );
        }
        if in_port.policy() == ConnectionPolicy::Single {
            replaced.extend(
                in_port
                    .connections()
                    .iter()
                    .map(|peer| (input.clone(), peer.clone())),
            );
        }

        let output = output.clone();
        let input = input.clone();

        for (own, peer) in replaced {
            self.unlink(&own, &peer);
        }

        if let Some(port) = self.port_mut(&output) {
            port.attach_peer(input.clone());
        }
        if let Some(port) = self.port_mut(&input) {
            port.attach_peer(output.clone());
        }

        if let Some(node) = self.nodes.get_mut(&output.node) {
            node.kind_mut().on_create_connection(&output, &input);
        }
        if input.node != output.node {
            if let Some(node) = self.nodes.get_mut(&input.node) {
                node.kind_mut().on_create_connection(&output, &input);
            }
        }

        Ok(())
    }

    /// Remove the connection between two ports. Returns whether a
    /// connection existed; removing an absent pair is a no-op.
    pub fn disconnect(&mut self, a: &PortRef, b: &PortRef) -> bool {
        self.unlink(a, b)
    }

    /// Disconnect all peers of one port.
    pub fn clear_port_connections(&mut self, at: &PortRef) {
        let peers: Vec<PortRef> = match self.port(at) {
            Some(port) => port.connections().to_vec(),
            None => return,
        };
        for peer in peers {
            self.unlink(at, &peer);
        }
    }

    /// Disconnect everything from every port of a node.
    pub fn clear_node_connections(&mut self, id: NodeId) {
        let refs: Vec<PortRef> = match self.nodes.get(&id) {
            Some(node) => node.ports().map(|p| PortRef::new(id, p.name())).collect(),
            None => return,
        };
        for at in refs {
            self.clear_port_connections(&at);
        }
    }

    /// Remove a dynamic port: clears its connections symmetrically,
    /// then drops it from the node's mapping. Removing a name that
    /// does not exist is a no-op; removing a static port fails.
    pub fn remove_instance_port(&mut self, id: NodeId, name: &str) -> Result<(), PortError> {
        let node = self.nodes.get(&id).ok_or(PortError::NodeNotFound(id))?;
        let Some(port) = node.port(name) else {
            return Ok(());
        };
        if port.is_static() {
            return Err(PortError::StaticPortRemoval {
                node: id,
                port: name.to_string(),
            });
        }
        self.clear_port_connections(&PortRef::new(id, name));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.take_port(name);
        }
        Ok(())
    }

    /// Remove all dynamic ports of a node.
    pub fn clear_instance_ports(&mut self, id: NodeId) {
        // snapshot first: removal mutates the mapping being walked
        let names: Vec<String> = match self.nodes.get(&id) {
            Some(node) => node
                .instance_ports()
                .map(|p| p.name().to_string())
                .collect(),
            None => return,
        };
        for name in names {
            // cannot fail: every snapshotted port is dynamic
            let _ = self.remove_instance_port(id, &name);
        }
    }

    /// Repair pass after external structural edits: drop every peer
    /// entry whose target port no longer exists in its owning node's
    /// port set.
    pub fn verify_connections(&mut self) {
        let live: HashSet<PortRef> = self
            .nodes
            .iter()
            .flat_map(|(id, node)| node.ports().map(|p| PortRef::new(*id, p.name())))
            .collect();
        for node in self.nodes.values_mut() {
            for port in node.ports_mut() {
                port.retain_peers(|peer| live.contains(peer));
            }
        }
    }

    /// Nodes in dependency order: every producer before its consumers.
    ///
    /// The pull-resolution path performs no cycle checking of its own;
    /// hosts that cannot trust a graph's topology call this first and
    /// refuse to evaluate on [`CycleError`].
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for id in self.nodes.keys() {
            if !visited.contains(id) {
                self.visit(*id, &mut visited, &mut in_progress, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        in_progress: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if in_progress.contains(&id) {
            return Err(CycleError);
        }
        if visited.contains(&id) {
            return Ok(());
        }

        in_progress.insert(id);

        if let Some(node) = self.nodes.get(&id) {
            for port in node.inputs() {
                for peer in port.connections() {
                    self.visit(peer.node, visited, in_progress, order)?;
                }
            }
        }

        in_progress.remove(&id);
        visited.insert(id);
        order.push(id);

        Ok(())
    }

    /// Removes the symmetric pair and fires removal hooks. Returns
    /// whether anything was removed.
    fn unlink(&mut self, a: &PortRef, b: &PortRef) -> bool {
        let mut removed = false;
        if let Some(port) = self.port_mut(a) {
            removed |= port.detach_peer(b);
        }
        if let Some(port) = self.port_mut(b) {
            removed |= port.detach_peer(a);
        }
        if removed {
            if let Some(node) = self.nodes.get_mut(&a.node) {
                node.kind_mut().on_remove_connection(a);
            }
            if let Some(node) = self.nodes.get_mut(&b.node) {
                node.kind_mut().on_remove_connection(b);
            }
        }
        removed
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("untitled")
    }
}

/// Error when creating a connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    /// Node not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found on its node.
    #[error("port not found: {0}")]
    PortNotFound(PortRef),

    /// Both ports have the same direction.
    #[error("ports {a} and {b} share the same direction")]
    InvalidDirection {
        /// First port.
        a: PortRef,
        /// Second port.
        b: PortRef,
    },

    /// Declared types are incompatible under the graph's policy.
    #[error("type mismatch: output {output} cannot feed input {input}")]
    TypeMismatch {
        /// Declared type of the output port.
        output: PortType,
        /// Declared type of the input port.
        input: PortType,
    },
}

/// Error when removing a port.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    /// Node not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The port is declared by the node kind's schema and cannot be
    /// removed at runtime.
    #[error("cannot remove static port `{port}` on node {node}")]
    StaticPortRemoval {
        /// Owning node.
        node: NodeId,
        /// Field name of the static port.
        port: String,
    },
}

/// Error when the graph contains a cycle.
#[derive(Debug, Clone, thiserror::Error)]
#[error("graph contains a cycle")]
pub struct CycleError;
