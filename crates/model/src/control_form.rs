use crate::{TxId, line::Tool};
use serde::{Deserialize, Serialize};

/// Per-machine half of a `ControlForm`: whether this machine processes the
/// piece at all, which tool it needs mounted, how many repeats, and whether
/// mounting that tool requires a change from what's currently loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineForm {
    pub process: bool,
    pub tool: Option<Tool>,
    pub repeat: u32,
    pub tool_change: bool,
}

impl MachineForm {
    pub fn none() -> Self {
        Self::default()
    }
}

/// The command written to a cell, plus the planner metadata needed to
/// score it and to report transformation time back to the ERP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlForm {
    pub tx_id: TxId,
    pub piece_kind: String,
    pub top: MachineForm,
    pub bot: MachineForm,
    /// Number of recipe steps this form covers in one pass.
    pub steps_covered: usize,
    /// Sum of step durations covered, plus any tool-change penalties.
    pub intrinsic_time_secs: u32,
    /// Conveyor occupancy at the moment of planning, used for scoring only.
    pub queue_size: usize,
}

impl ControlForm {
    /// The trivial `L0` form: no tooling, no processing, just a pass-through.
    pub fn trivial(tx_id: TxId, piece_kind: String) -> Self {
        Self {
            tx_id,
            piece_kind,
            top: MachineForm::none(),
            bot: MachineForm::none(),
            steps_covered: 1,
            intrinsic_time_secs: 0,
            queue_size: 0,
        }
    }
}
