//! Per-line conveyor state machine: fixed-length slot array, two machine
//! positions, current mounted tool per machine, and the waiter queue
//! lines pull from once they're ready for a new piece.

use crate::error::CoreError;
use crate::mirror::CellMirror;
use crate::waiter::WaiterQueue;
use model::line::{self, MachinePosition, Tool};
use model::{ControlId, ConveyorItem, LineId, TxId};

/// Identity of an item that just left the conveyor: enough to match it
/// against the PLC's reported out transaction id and to report back to
/// the piece worker which `ControlId` exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitedItem {
    pub control_id: ControlId,
    pub tx_id: TxId,
}

/// The length-5 conveyor plus mounted-tool and readiness state for one
/// processing line. `L0` lines never hold conveyor state (it's a trivial
/// pass-through) but are still represented so the factory can treat
/// every line uniformly.
pub struct LineModel {
    id: LineId,
    conveyor: Vec<Option<ConveyorItem>>,
    m1_idx: usize,
    m2_idx: usize,
    mounted_m1: Option<Tool>,
    mounted_m2: Option<Tool>,
    ready_for_next: bool,
    last_left_piece_id: Option<ControlId>,
}

impl LineModel {
    pub fn new(id: LineId, conveyor_len: usize) -> Self {
        Self {
            id,
            conveyor: vec![None; conveyor_len],
            m1_idx: MachinePosition::M1.slot(),
            m2_idx: MachinePosition::M2.slot(),
            mounted_m1: None,
            mounted_m2: None,
            ready_for_next: true,
            last_left_piece_id: None,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.ready_for_next
    }

    /// Number of conveyor slots currently holding an item.
    pub fn occupied_slots(&self) -> usize {
        self.conveyor.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn last_left_piece_id(&self) -> Option<ControlId> {
        self.last_left_piece_id
    }

    pub fn mounted(&self, pos: MachinePosition) -> Option<Tool> {
        match pos {
            MachinePosition::M1 => self.mounted_m1,
            MachinePosition::M2 => self.mounted_m2,
        }
    }

    /// No-op on `L0` or an unset tool; otherwise the tool must be in the
    /// machine's fixed repertoire.
    pub fn set_current_tool(&mut self, pos: MachinePosition, tool: Option<Tool>) -> Result<(), CoreError> {
        if self.id.is_trivial() {
            return Ok(());
        }
        let Some(tool) = tool else { return Ok(()) };
        if !line::supports(pos, tool) {
            return Err(CoreError::ToolNotInRepertoire { line: self.id, position: pos, tool });
        }
        match pos {
            MachinePosition::M1 => self.mounted_m1 = Some(tool),
            MachinePosition::M2 => self.mounted_m2 = Some(tool),
        }
        Ok(())
    }

    /// Precondition: `readyForNext ∧ slot[0] == ∅`.
    pub fn add_item(&mut self, item: ConveyorItem) -> Result<(), CoreError> {
        if !self.ready_for_next || self.conveyor[0].is_some() {
            return Err(CoreError::ConveyorNotReady(self.id));
        }
        self.ready_for_next = false;
        self.conveyor[0] = Some(item);
        Ok(())
    }

    /// Precondition: `PieceEntered ∧ slot[1] == ∅`. Moves `slot[0] →
    /// slot[1]`, emits `lineEntry`, sets `readyForNext`.
    pub fn progress_new_piece(&mut self) -> Result<(), CoreError> {
        if self.conveyor[self.m1_idx].is_some() {
            return Err(CoreError::ConveyorNotReady(self.id));
        }
        let item = self.conveyor[0].take().ok_or(CoreError::ConveyorNotReady(self.id))?;
        let _ = item
            .handles
            .line_entry
            .send(model::conveyor::LineEntryEvent { line: self.id });
        self.conveyor[self.m1_idx] = Some(item);
        self.ready_for_next = true;
        Ok(())
    }

    /// Emits `transform` per repeat for each occupied, processing
    /// machine; emits `lineExit` for the item at the last slot; shifts
    /// slots `4 ← 3 ← 2 ← 1` and clears slot `1`. Returns the exited
    /// item's identity, if any.
    pub fn progress_conveyor(&mut self) -> Option<ExitedItem> {
        if let Some(item) = &self.conveyor[self.m1_idx] {
            if item.use_m1 {
                for _ in 0..item.m1_repeats {
                    let _ = item.handles.transform.send(model::conveyor::TransformEvent {
                        line: self.id,
                        machine: MachinePosition::M1,
                        tool_change: item.m1_tool_change,
                    });
                }
            }
        }
        if let Some(item) = &self.conveyor[self.m2_idx] {
            if item.use_m2 {
                for _ in 0..item.m2_repeats {
                    let _ = item.handles.transform.send(model::conveyor::TransformEvent {
                        line: self.id,
                        machine: MachinePosition::M2,
                        tool_change: item.m2_tool_change,
                    });
                }
            }
        }

        let last_idx = self.conveyor.len() - 1;
        let exited = self.conveyor[last_idx].as_ref().map(|item| {
            let _ = item.handles.line_exit.send(model::conveyor::LineExitEvent { line: self.id });
            ExitedItem { control_id: item.control_id, tx_id: item.tx_id }
        });
        if let Some(exited) = exited {
            self.last_left_piece_id = Some(exited.control_id);
        }

        for i in (2..self.conveyor.len()).rev() {
            self.conveyor[i] = self.conveyor[i - 1].take();
        }
        self.conveyor[self.m1_idx] = None;

        exited
    }

    /// The conveyor state machine driven by the factory tick: a
    /// `PieceLeft` drain loop, a `PieceEntered` entry sequence, then a
    /// claim attempt if the line is now ready. `conveyor_len` bounds the
    /// drain loop — exceeding it means the PLC reported progress this
    /// model cannot reconcile, which is fatal.
    pub fn update_conveyor(
        &mut self,
        mirror: &CellMirror,
        waiters: &mut WaiterQueue,
    ) -> Result<(), CoreError> {
        if mirror.piece_left() {
            let target_tx = mirror.current().out_tx_id;
            let conveyor_len = self.conveyor.len();
            let mut iterations = 0;
            loop {
                let exited = self.progress_conveyor();
                iterations += 1;
                if exited.is_some_and(|e| e.tx_id == target_tx) {
                    break;
                }
                if iterations >= conveyor_len {
                    return Err(CoreError::DrainDidNotTerminate { line: self.id, conveyor_len });
                }
            }
        }

        if mirror.piece_entered() {
            if self.conveyor[self.m1_idx].is_some() {
                self.progress_conveyor();
            }
            self.progress_new_piece()?;
        }

        if self.is_ready() {
            waiters.claim_one(self.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::conveyor::ConveyorHandles;
    use tokio::sync::mpsc;

    fn handles() -> (ConveyorHandles, mpsc::UnboundedReceiver<model::conveyor::LineEntryEvent>) {
        let (entry_tx, entry_rx) = mpsc::unbounded_channel();
        let (transform_tx, _transform_rx) = mpsc::unbounded_channel();
        let (exit_tx, _exit_rx) = mpsc::unbounded_channel();
        let (err_tx, _err_rx) = mpsc::unbounded_channel();
        (
            ConveyorHandles { line_entry: entry_tx, transform: transform_tx, line_exit: exit_tx, err: err_tx },
            entry_rx,
        )
    }

    fn item(control_id: i64, tx_id: i16) -> (ConveyorItem, mpsc::UnboundedReceiver<model::conveyor::LineEntryEvent>) {
        let (h, rx) = handles();
        (
            ConveyorItem {
                control_id: ControlId(control_id),
                tx_id: TxId(tx_id),
                use_m1: true,
                use_m2: false,
                m1_repeats: 1,
                m2_repeats: 0,
                m1_tool_change: false,
                m2_tool_change: false,
                handles: h,
            },
            rx,
        )
    }

    #[test]
    fn add_item_requires_ready_and_empty_slot0() {
        let mut line = LineModel::new(LineId(1), 5);
        let (it, _rx) = item(1, 1);
        assert!(line.add_item(it).is_ok());
        let (it2, _rx2) = item(2, 2);
        assert!(line.add_item(it2).is_err());
    }

    #[test]
    fn progress_new_piece_moves_slot0_to_m1() {
        let mut line = LineModel::new(LineId(1), 5);
        let (it, mut rx) = item(1, 1);
        line.add_item(it).unwrap();
        line.progress_new_piece().unwrap();
        assert!(line.is_ready());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn set_current_tool_rejects_out_of_repertoire() {
        let mut line = LineModel::new(LineId(1), 5);
        let err = line.set_current_tool(MachinePosition::M1, Some(Tool::T4));
        assert!(err.is_err());
    }

    #[test]
    fn set_current_tool_is_noop_on_l0() {
        let mut line = LineModel::new(LineId::L0, 5);
        assert!(line.set_current_tool(MachinePosition::M1, Some(Tool::T4)).is_ok());
    }

    #[test]
    fn progress_conveyor_exits_last_slot_and_shifts() {
        let mut line = LineModel::new(LineId(1), 5);
        let (it, _rx) = item(7, 3);
        line.add_item(it).unwrap();
        line.progress_new_piece().unwrap();
        // Item starts at slot 1 (M1); each call shifts it one slot
        // further. It reaches slot 4 after three calls, and the fourth
        // call is the one that observes it sitting there and exits it.
        line.progress_conveyor();
        line.progress_conveyor();
        line.progress_conveyor();
        let exited = line.progress_conveyor();
        assert_eq!(exited, Some(ExitedItem { control_id: ControlId(7), tx_id: TxId(3) }));
        assert_eq!(line.last_left_piece_id(), Some(ControlId(7)));
    }
}
