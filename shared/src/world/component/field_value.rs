use std::fmt::Debug;

use crate::{reference::ReferenceId, types::{Float3, FloatQ}};

/// Decoded form of every replicated field archetype
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Float3(Float3),
    FloatQ(FloatQ),
    Text(String),
    /// A [`ReferenceId`] in its canonical decimal form
    Reference(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn archetype(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Float3(_) => "float3",
            FieldValue::FloatQ(_) => "floatQ",
            FieldValue::Text(_) => "text",
            FieldValue::Reference(_) => "reference",
            FieldValue::List(_) => "list",
        }
    }
}

/// A value type that can live in a sync field
pub trait SyncValue: Clone + PartialEq + Debug + Send + 'static {
    const ARCHETYPE: &'static str;

    fn to_field_value(&self) -> FieldValue;
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl SyncValue for bool {
    const ARCHETYPE: &'static str = "bool";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl SyncValue for i64 {
    const ARCHETYPE: &'static str = "int";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl SyncValue for i32 {
    const ARCHETYPE: &'static str = "int";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self as i64)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(inner) => i32::try_from(*inner).ok(),
            _ => None,
        }
    }
}

impl SyncValue for f64 {
    const ARCHETYPE: &'static str = "float";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl SyncValue for f32 {
    const ARCHETYPE: &'static str = "float";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self as f64)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(inner) => Some(*inner as f32),
            _ => None,
        }
    }
}

impl SyncValue for Float3 {
    const ARCHETYPE: &'static str = "float3";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float3(*self)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float3(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl SyncValue for FloatQ {
    const ARCHETYPE: &'static str = "floatQ";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::FloatQ(*self)
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::FloatQ(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl SyncValue for String {
    const ARCHETYPE: &'static str = "text";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(inner) => Some(inner.clone()),
            _ => None,
        }
    }
}

// Malformed reference strings decode to Null rather than failing
impl SyncValue for ReferenceId {
    const ARCHETYPE: &'static str = "reference";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Reference(self.to_wire_string())
    }
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Reference(inner) => Some(ReferenceId::from_wire_str(inner)),
            _ => None,
        }
    }
}
