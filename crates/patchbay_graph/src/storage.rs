// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistable port storage.
//!
//! A node's port set is an ordered name→port mapping in memory, but its
//! persisted form is a pair of parallel sequences (`names`, `ports`),
//! since common persistence formats do not round-trip keyed mappings.
//! Deserialization rejects storage whose sequences disagree.

use crate::port::Port;
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when loading persisted port storage.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The parallel sequences have different lengths.
    #[error("corrupt port storage: {names} names but {ports} port entries")]
    CorruptState {
        /// Number of entries in the name sequence.
        names: usize,
        /// Number of entries in the port sequence.
        ports: usize,
    },

    /// The same field name appears twice; a keyed mapping cannot
    /// represent that without dropping an entry.
    #[error("corrupt port storage: duplicate port name `{0}`")]
    DuplicateName(String),
}

/// Insertion-ordered mapping from field name to [`Port`].
#[derive(Debug, Clone, Default)]
pub struct PortMap {
    inner: IndexMap<String, Port>,
}

impl PortMap {
    /// Create an empty port map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map holds no ports.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether a port with this field name exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Get a port by field name.
    pub fn get(&self, name: &str) -> Option<&Port> {
        self.inner.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.inner.get_mut(name)
    }

    pub(crate) fn insert(&mut self, name: String, port: Port) -> Option<Port> {
        self.inner.insert(name, port)
    }

    /// Removes by name, preserving the order of the remaining entries.
    pub(crate) fn shift_remove(&mut self, name: &str) -> Option<Port> {
        self.inner.shift_remove(name)
    }

    pub(crate) fn entry(&mut self, name: String) -> Entry<'_, String, Port> {
        self.inner.entry(name)
    }

    /// Iterate over `(name, port)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Port)> {
        self.inner.iter()
    }

    /// Iterate over ports in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Port> {
        self.inner.values()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.inner.values_mut()
    }

    /// Rebuild a map from its parallel-sequence form.
    pub fn from_parallel(names: Vec<String>, ports: Vec<Port>) -> Result<Self, StorageError> {
        if names.len() != ports.len() {
            return Err(StorageError::CorruptState {
                names: names.len(),
                ports: ports.len(),
            });
        }
        let mut inner = IndexMap::with_capacity(names.len());
        for (name, port) in names.into_iter().zip(ports) {
            if inner.insert(name.clone(), port).is_some() {
                return Err(StorageError::DuplicateName(name));
            }
        }
        Ok(Self { inner })
    }

    /// The parallel-sequence form of this map.
    pub fn to_parallel(&self) -> (Vec<String>, Vec<Port>) {
        (
            self.inner.keys().cloned().collect(),
            self.inner.values().cloned().collect(),
        )
    }
}

impl Serialize for PortMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let names: Vec<&str> = self.inner.keys().map(String::as_str).collect();
        let ports: Vec<&Port> = self.inner.values().collect();
        let mut state = serializer.serialize_struct("PortMap", 2)?;
        state.serialize_field("names", &names)?;
        state.serialize_field("ports", &ports)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PortMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Stored {
            names: Vec<String>,
            ports: Vec<Port>,
        }

        let stored = Stored::deserialize(deserializer)?;
        Self::from_parallel(stored.names, stored.ports).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ConnectionPolicy, PortDirection, PortRef, PortType};
    use crate::NodeId;

    fn sample_map() -> PortMap {
        let mut map = PortMap::new();
        map.insert(
            "x".to_string(),
            Port::new(
                "x",
                PortType::Int,
                PortDirection::Input,
                ConnectionPolicy::Single,
                false,
            ),
        );
        let mut out = Port::new(
            "result",
            PortType::Float,
            PortDirection::Output,
            ConnectionPolicy::Multiple,
            true,
        );
        out.attach_peer(PortRef::new(NodeId(4), "value"));
        map.insert("result".to_string(), out);
        map
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let map = sample_map();
        let text = ron::ser::to_string_pretty(&map, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: PortMap = ron::from_str(&text).unwrap();

        assert_eq!(loaded.len(), map.len());
        for ((name_a, port_a), (name_b, port_b)) in map.iter().zip(loaded.iter()) {
            assert_eq!(name_a, name_b);
            assert_eq!(port_a.name(), port_b.name());
            assert_eq!(port_a.port_type(), port_b.port_type());
            assert_eq!(port_a.direction(), port_b.direction());
            assert_eq!(port_a.policy(), port_b.policy());
            assert_eq!(port_a.is_dynamic(), port_b.is_dynamic());
            assert_eq!(port_a.connections(), port_b.connections());
        }
    }

    #[test]
    fn test_mismatched_lengths_are_corrupt() {
        let (mut names, ports) = sample_map().to_parallel();
        names.pop();
        let err = PortMap::from_parallel(names, ports).unwrap_err();
        assert!(matches!(
            err,
            StorageError::CorruptState { names: 1, ports: 2 }
        ));
    }

    #[test]
    fn test_duplicate_names_are_corrupt() {
        let (mut names, ports) = sample_map().to_parallel();
        names[1] = names[0].clone();
        let err = PortMap::from_parallel(names, ports).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(name) if name == "x"));
    }

    #[test]
    fn test_deserialize_rejects_mismatch() {
        let text = r#"(names: ["a"], ports: [])"#;
        assert!(ron::from_str::<PortMap>(text).is_err());
    }
}
