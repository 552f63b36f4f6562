use crate::{ControlId, TxId, control_form::ControlForm, ids::LineId, line::MachinePosition};
use tokio::sync::mpsc;

/// Sent to the owning piece worker when its item reaches the head of the
/// conveyor and is acknowledged onto the line.
#[derive(Clone, Copy, Debug)]
pub struct LineEntryEvent {
    pub line: LineId,
}

/// Sent once per repeat, per machine, as the conveyor advances an item past
/// a processing machine.
#[derive(Clone, Copy, Debug)]
pub struct TransformEvent {
    pub line: LineId,
    pub machine: MachinePosition,
    pub tool_change: bool,
}

/// Sent when the item reaches the end of the conveyor and leaves the line.
#[derive(Clone, Copy, Debug)]
pub struct LineExitEvent {
    pub line: LineId,
}

/// The signalling handles a conveyor item carries back to its piece worker.
/// Unbounded: the conveyor must never block on a slow consumer mid-tick.
#[derive(Clone, Debug)]
pub struct ConveyorHandles {
    pub line_entry: mpsc::UnboundedSender<LineEntryEvent>,
    pub transform: mpsc::UnboundedSender<TransformEvent>,
    pub line_exit: mpsc::UnboundedSender<LineExitEvent>,
    pub err: mpsc::UnboundedSender<String>,
}

/// One occupied conveyor slot: the command that put it there, the piece
/// worker's handles, which machines process it and how many times, and
/// whether mounting each machine's tool required a change (carried through
/// for ERP time reporting).
#[derive(Clone, Debug)]
pub struct ConveyorItem {
    pub control_id: ControlId,
    pub tx_id: TxId,
    pub use_m1: bool,
    pub use_m2: bool,
    pub m1_repeats: u32,
    pub m2_repeats: u32,
    pub m1_tool_change: bool,
    pub m2_tool_change: bool,
    pub handles: ConveyorHandles,
}

impl ConveyorItem {
    pub fn from_form(control_id: ControlId, form: &ControlForm, handles: ConveyorHandles) -> Self {
        Self {
            control_id,
            tx_id: form.tx_id,
            use_m1: form.top.process,
            use_m2: form.bot.process,
            m1_repeats: form.top.repeat,
            m2_repeats: form.bot.repeat,
            m1_tool_change: form.top.tool_change,
            m2_tool_change: form.bot.tool_change,
            handles,
        }
    }
}
