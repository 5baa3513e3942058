// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions: the typed, directed endpoints nodes connect through.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived identifier for a port, usable as a key in lookup-by-id maps.
///
/// Valid once the owning node has been assigned an identifier; refreshed
/// whenever the node's id or port set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortId {
    /// Identifier of the owning node.
    pub node: NodeId,
    /// Position of the port within the owning node's port set.
    pub index: u32,
}

/// Address of a port within a graph: owning node id plus field name.
///
/// Peer lists store these instead of direct references, so a connection
/// is the symmetric pair of `PortRef` entries on its two endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Identifier of the owning node.
    pub node: NodeId,
    /// Field name of the port on that node.
    pub port: String,
}

impl PortRef {
    /// Create a port address from a node id and field name.
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Consumes values.
    Input,
    /// Produces values.
    Output,
}

/// How many peers a port will hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// At most one peer; a new connection replaces the old one.
    Single,
    /// Unlimited peers; repeated connects are idempotent.
    Multiple,
}

/// Data type that can flow through ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value.
    Bool,
    /// Integer value.
    Int,
    /// Floating point value.
    Float,
    /// 2D vector.
    Vector2,
    /// 3D vector.
    Vector3,
    /// String value.
    String,
    /// Any type (for generic nodes).
    Any,
    /// Custom host-defined type.
    Custom(String),
}

impl PortType {
    /// Check whether a value of this type can feed a port of `other`'s
    /// type under the implicit-conversion rules.
    pub fn coercible_to(&self, other: &PortType) -> bool {
        // Any accepts and produces anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        match (self, other) {
            // Numeric conversions
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            // Scalar broadcast into vectors
            (Self::Float, Self::Vector2 | Self::Vector3) => true,
            (Self::Vector2, Self::Vector3) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Vector2 => write!(f, "vector2"),
            Self::Vector3 => write!(f, "vector3"),
            Self::String => write!(f, "string"),
            Self::Any => write!(f, "any"),
            Self::Custom(name) => write!(f, "custom({name})"),
        }
    }
}

/// Type-compatibility policy consulted when connecting ports.
#[derive(Debug, Clone, Copy, Default)]
pub enum TypeCompatibility {
    /// Declared types must match exactly.
    #[default]
    Exact,
    /// The implicit-conversion table of [`PortType::coercible_to`].
    Coercible,
    /// Host-supplied predicate, called as `(output type, input type)`.
    Custom(fn(&PortType, &PortType) -> bool),
}

impl TypeCompatibility {
    /// Check whether an output of type `output` may feed an input of
    /// type `input` under this policy.
    pub fn allows(&self, output: &PortType, input: &PortType) -> bool {
        match self {
            Self::Exact => output == input,
            Self::Coercible => output.coercible_to(input),
            Self::Custom(pred) => pred(output, input),
        }
    }
}

/// A typed, directed connection endpoint owned by exactly one node.
///
/// The port tracks its connected peers in insertion order. Peer lists
/// are kept symmetric by the graph's connect/disconnect operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    id: PortId,
    name: String,
    port_type: PortType,
    direction: PortDirection,
    policy: ConnectionPolicy,
    dynamic: bool,
    connections: Vec<PortRef>,
}

impl Port {
    pub(crate) fn new(
        name: impl Into<String>,
        port_type: PortType,
        direction: PortDirection,
        policy: ConnectionPolicy,
        dynamic: bool,
    ) -> Self {
        Self {
            id: PortId::default(),
            name: name.into(),
            port_type,
            direction,
            policy,
            dynamic,
            connections: Vec::new(),
        }
    }

    /// Derived identifier for lookup-by-id maps.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Field name, unique within the owning node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type.
    pub fn port_type(&self) -> &PortType {
        &self.port_type
    }

    /// Port direction.
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Maximum-connection policy.
    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    /// Whether this port was added at runtime rather than declared by
    /// the node kind's schema.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Whether this port was declared by the node kind's schema.
    pub fn is_static(&self) -> bool {
        !self.dynamic
    }

    /// Whether this is an input port.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Whether this is an output port.
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Connected peers, in connection order.
    pub fn connections(&self) -> &[PortRef] {
        &self.connections
    }

    /// Whether at least one peer is connected.
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Number of connected peers.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether `peer` is currently connected to this port.
    pub fn connected_to(&self, peer: &PortRef) -> bool {
        self.connections.contains(peer)
    }

    /// Check whether a connection to `other` would be structurally
    /// valid: opposite directions and compatible types under `policy`.
    pub fn can_connect(&self, other: &Port, policy: &TypeCompatibility) -> bool {
        if self.direction == other.direction {
            return false;
        }
        let (output, input) = if self.is_output() {
            (&self.port_type, &other.port_type)
        } else {
            (&other.port_type, &self.port_type)
        };
        policy.allows(output, input)
    }

    pub(crate) fn set_id(&mut self, id: PortId) {
        self.id = id;
    }

    /// Appends `peer` if not already present.
    pub(crate) fn attach_peer(&mut self, peer: PortRef) {
        if !self.connections.contains(&peer) {
            self.connections.push(peer);
        }
    }

    /// Removes `peer` from the list; returns whether it was present.
    pub(crate) fn detach_peer(&mut self, peer: &PortRef) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c != peer);
        self.connections.len() != before
    }

    pub(crate) fn retain_peers(&mut self, pred: impl FnMut(&PortRef) -> bool) {
        self.connections.retain(pred);
    }
}
