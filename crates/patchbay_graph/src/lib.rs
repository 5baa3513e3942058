// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed node/port dataflow graph with pull-based value resolution.
//!
//! A [`Graph`] owns nodes; each [`Node`] owns a named collection of
//! typed, directed [`Port`]s. Output ports connect to input ports, and
//! values are resolved on demand by walking connections backward from
//! a requested input to the producing output.
//!
//! ## Architecture
//!
//! - Ports are either static (declared by a [`NodeKind`]'s schema) or
//!   dynamic (added and removed at runtime).
//! - Connections are symmetric peer-list pairs with `Single`
//!   (replace-on-connect) or `Multiple` (idempotent append) policies
//!   and configurable type compatibility.
//! - Evaluation is strictly pull: lazy, uncached, synchronous, and
//!   total — a missing or unconnected input resolves to a caller
//!   supplied fallback instead of an error.
//! - Port sets persist as parallel name/port sequences; see
//!   [`PortMap`].
//!
//! The pull path carries no cycle guard by design; hosts that cannot
//! trust a topology validate it first with
//! [`Graph::topological_order`].

pub mod graph;
pub mod node;
pub mod port;
pub mod resolve;
pub mod storage;
pub mod value;

pub use graph::{ConnectError, CycleError, Graph, PortError};
pub use node::{Node, NodeId, NodeKind, PortSpec};
pub use port::{
    ConnectionPolicy, Port, PortDirection, PortId, PortRef, PortType, TypeCompatibility,
};
pub use resolve::PullContext;
pub use storage::{PortMap, StorageError};
pub use value::{FromValue, Value};
