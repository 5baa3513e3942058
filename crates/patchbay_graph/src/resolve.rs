// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pull-based value resolution.
//!
//! Resolution walks the graph backward from a requested input to its
//! producing output(s) and invokes the producing node's
//! [`NodeKind::value`](crate::NodeKind::value). It is strictly lazy:
//! nothing is cached, nothing runs until a value is requested, and the
//! walk is synchronous call-stack recursion. An unconnected or missing
//! input is never an error; the caller's fallback is returned instead.
//!
//! There is no cycle guard on this path. A graph whose producers
//! depend on their own outputs recurses until stack exhaustion; hosts
//! that cannot trust a topology should call
//! [`Graph::topological_order`] before evaluating.

use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::port::PortRef;
use crate::value::{FromValue, Value};

impl Graph {
    /// Produce the value of an output port by invoking its owning
    /// node's kind. Returns `None` when the address does not name an
    /// output port.
    pub fn output_value(&self, output: &PortRef) -> Option<Value> {
        let node = self.node(output.node)?;
        let port = node.output_port(&output.port)?;
        let ctx = PullContext::new(self, output.node);
        Some(node.kind().value(&ctx, port))
    }

    /// Resolve a single input value.
    ///
    /// Returns `fallback` when the port is missing, is not an input,
    /// or has no connected peer. With several peers the first in
    /// connection order wins. A resolved value that does not convert
    /// to `T` also yields the fallback; that is a caller error, logged
    /// rather than surfaced.
    pub fn input_value<T: FromValue>(&self, node: NodeId, name: &str, fallback: T) -> T {
        let Some(port) = self.node(node).and_then(|n| n.input_port(name)) else {
            return fallback;
        };
        let Some(peer) = port.connections().first() else {
            return fallback;
        };
        match self.output_value(peer) {
            Some(value) => match T::from_value(&value) {
                Some(typed) => typed,
                None => {
                    tracing::debug!(
                        %peer,
                        resolved = %value.port_type(),
                        "resolved value not convertible to requested type, using fallback"
                    );
                    fallback
                }
            },
            None => fallback,
        }
    }

    /// Resolve all peers of an input port, in connection order.
    ///
    /// Returns `fallback` when the port is missing or unconnected.
    /// Peers whose resolved value does not convert are skipped with a
    /// diagnostic.
    pub fn input_values<T: FromValue>(&self, node: NodeId, name: &str, fallback: Vec<T>) -> Vec<T> {
        let Some(port) = self.node(node).and_then(|n| n.input_port(name)) else {
            return fallback;
        };
        if !port.is_connected() {
            return fallback;
        }
        let mut values = Vec::with_capacity(port.connection_count());
        for peer in port.connections() {
            let Some(value) = self.output_value(peer) else {
                continue;
            };
            match T::from_value(&value) {
                Some(typed) => values.push(typed),
                None => tracing::debug!(
                    %peer,
                    resolved = %value.port_type(),
                    "resolved value not convertible to requested type, skipping peer"
                ),
            }
        }
        values
    }

    /// Resolve all peers of an input port without typed conversion.
    /// Empty when the port is missing or unconnected.
    pub fn raw_input_values(&self, node: NodeId, name: &str) -> Vec<Value> {
        let Some(port) = self.node(node).and_then(|n| n.input_port(name)) else {
            return Vec::new();
        };
        port.connections()
            .iter()
            .filter_map(|peer| self.output_value(peer))
            .collect()
    }
}

/// Borrowed context handed to [`NodeKind::value`](crate::NodeKind::value)
/// so a producer can recursively pull its own inputs.
pub struct PullContext<'a> {
    graph: &'a Graph,
    node: NodeId,
}

impl<'a> PullContext<'a> {
    /// Create a context for producing values on `node`.
    pub fn new(graph: &'a Graph, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// The graph being evaluated.
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Identifier of the producing node.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The producing node.
    pub fn node(&self) -> Option<&'a Node> {
        self.graph.node(self.node)
    }

    /// Pull one of the producing node's own inputs.
    pub fn input<T: FromValue>(&self, name: &str, fallback: T) -> T {
        self.graph.input_value(self.node, name, fallback)
    }

    /// Pull all peers of one of the producing node's own inputs.
    pub fn inputs<T: FromValue>(&self, name: &str, fallback: Vec<T>) -> Vec<T> {
        self.graph.input_values(self.node, name, fallback)
    }
}
