use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// PLC transaction id. 16-bit and monotonically increasing per line, matching
/// the field width the OPC UA side actually exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub i16);

impl TxId {
    pub const ZERO: TxId = TxId(0);

    pub fn next(self) -> TxId {
        TxId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal control id assigned to a piece on dispatch. Distinct from the
/// ERP's external identifier, which mutates across transformations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlId(pub i64);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A processing/supply/delivery line identifier, `L0`..`L6`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub u8);

impl LineId {
    pub const L0: LineId = LineId(0);

    pub fn is_trivial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A warehouse identifier, `W1` or `W2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarehouseId {
    W1,
    W2,
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseId::W1 => write!(f, "W1"),
            WarehouseId::W2 => write!(f, "W2"),
        }
    }
}

/// An ERP-assigned shipment or delivery order id. Cheaply clonable, interned
/// as a string the way the teacher's run/item identifiers are.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Arc<str>);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
