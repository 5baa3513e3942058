// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime values flowing through pull resolution.

use crate::port::PortType;
use serde::{Deserialize, Serialize};

/// A value produced by a node output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value; what an unimplemented producer returns.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f32),
    /// 2D vector.
    Vector2([f32; 2]),
    /// 3D vector.
    Vector3([f32; 3]),
    /// String.
    String(String),
}

impl Value {
    /// Get the port type this value corresponds to.
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Null => PortType::Any,
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::String(_) => PortType::String,
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Typed extraction from a resolved [`Value`].
///
/// Returns `None` when the value does not convert; callers substitute
/// their fallback, so resolution never fails on a type mismatch.
pub trait FromValue: Sized {
    /// Attempt to extract `Self` from a value.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            // Int widens losslessly enough for graph parameters
            Value::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromValue for [f32; 2] {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector2(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for [f32; 3] {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<[f32; 2]> for Value {
    fn from(v: [f32; 2]) -> Self {
        Self::Vector2(v)
    }
}

impl From<[f32; 3]> for Value {
    fn from(v: [f32; 3]) -> Self {
        Self::Vector3(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
