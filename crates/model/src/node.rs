use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a single PLC variable, built from the hierarchical prefixes
/// the field protocol documents (`<GVL>.cellK.*`, `<POU>.idK_i`, ...).
/// Kept as an owned, already-formatted path rather than reconstructed ad hoc
/// at every call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn cell_field(line: u8, field: &str) -> Self {
        Self(format!("GVL.cell{line}.{field}"))
    }

    pub fn cell_control(line: u8, suffix: &str) -> Self {
        Self(format!("POU.id{line}_{suffix}"))
    }

    pub fn cell_ack(line: u8) -> Self {
        Self(format!("POU.mes{line}"))
    }

    pub fn supply_field(line: u8, field: &str) -> Self {
        Self(format!("GVL.cin{line}.{field}"))
    }

    pub fn supply_control(line: u8) -> Self {
        Self(format!("POU.id_in{line}"))
    }

    pub fn delivery_field(line: u8, field: &str) -> Self {
        Self(format!("GVL.roller{line}.{field}"))
    }

    pub fn delivery_control(line: u8) -> Self {
        Self(format!("POU.idr{line}"))
    }

    pub fn warehouse_total(warehouse: u8) -> Self {
        Self(format!("GVL.totalW{warehouse}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed value read from or written to a PLC node. The field protocol
/// only ever carries int16 or bool values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeValue {
    Int16(i16),
    Bool(bool),
}

impl NodeValue {
    pub fn as_i16(&self) -> Option<i16> {
        match self {
            NodeValue::Int16(v) => Some(*v),
            NodeValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NodeValue::Bool(v) => Some(*v),
            NodeValue::Int16(_) => None,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Int16(v) => write!(f, "{v}"),
            NodeValue::Bool(v) => write!(f, "{v}"),
        }
    }
}
