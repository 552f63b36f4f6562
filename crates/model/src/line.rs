use serde::{Deserialize, Serialize};
use std::fmt;

/// A tool symbol a machine can have mounted, `T1`..`T6`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tool::T1 => "T1",
            Tool::T2 => "T2",
            Tool::T3 => "T3",
            Tool::T4 => "T4",
            Tool::T5 => "T5",
            Tool::T6 => "T6",
        };
        write!(f, "{s}")
    }
}

/// Which of a processing line's two machines a form or event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachinePosition {
    /// Slot 1, top of the conveyor.
    M1,
    /// Slot 3, bottom of the conveyor.
    M2,
}

impl MachinePosition {
    pub fn slot(self) -> usize {
        match self {
            MachinePosition::M1 => 1,
            MachinePosition::M2 => 3,
        }
    }
}

impl fmt::Display for MachinePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachinePosition::M1 => write!(f, "M1"),
            MachinePosition::M2 => write!(f, "M2"),
        }
    }
}

/// The fixed 3-tool repertoire for a machine position on a given line half.
/// `L1`-`L3` and `L4`-`L6` are kept symmetric: M1 always covers `{T1,T2,T3}`,
/// M2 always covers `{T4,T5,T6}`.
pub fn repertoire(pos: MachinePosition) -> &'static [Tool] {
    match pos {
        MachinePosition::M1 => &[Tool::T1, Tool::T2, Tool::T3],
        MachinePosition::M2 => &[Tool::T4, Tool::T5, Tool::T6],
    }
}

pub fn supports(pos: MachinePosition, tool: Tool) -> bool {
    repertoire(pos).contains(&tool)
}

/// Fixed tool-change penalty, in seconds, applied whenever a machine's
/// mounted tool differs from the one a step requires.
pub const TOOL_CHANGE_PENALTY_SECS: u32 = 30;
