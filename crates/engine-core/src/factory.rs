//! The factory singleton: every processing, supply, and delivery line's
//! model and mirror state, guarded by one coarse mutex at the call site
//! (the caller, typically the factory tick actor, takes the lock for a
//! tightly scoped critical section — this struct has no locking of its
//! own).

use crate::line_model::LineModel;
use crate::mirror::{AckMirror, CellMirror};
use crate::waiter::WaiterQueue;
use engine_config::Settings;
use model::{ControlId, LineId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// `L1`..`L6`, the only lines with real conveyor state. `L0` is a trivial
/// pass-through and is never represented here.
pub const PROCESSING_LINE_COUNT: u8 = 6;

pub struct Factory {
    pub processing: HashMap<LineId, LineModel>,
    /// PLC-reported cell state per processing line, decoded and updated by
    /// the factory tick; `LineModel::update_conveyor` reads it but does not
    /// own it, since the tick needs it before the conveyor step runs.
    pub cells: HashMap<LineId, CellMirror>,
    pub waiters: HashMap<LineId, WaiterQueue>,
    pub supply: Vec<AckMirror>,
    pub delivery: Vec<AckMirror>,
    control_id_seq: AtomicI64,
}

impl Factory {
    pub fn new(settings: &Settings) -> Self {
        let mut processing = HashMap::new();
        let mut cells = HashMap::new();
        let mut waiters = HashMap::new();
        for i in 1..=PROCESSING_LINE_COUNT {
            let id = LineId(i);
            processing.insert(id, LineModel::new(id, settings.conveyor_length));
            cells.insert(id, CellMirror::new());
            waiters.insert(id, WaiterQueue::new());
        }
        // L0 still needs a waiter queue: W2-origin pieces register there
        // exclusively, bypassing the scoring comparison entirely.
        waiters.insert(LineId::L0, WaiterQueue::new());

        Self {
            processing,
            cells,
            waiters,
            supply: (0..settings.supply_line_count).map(|_| AckMirror::new()).collect(),
            delivery: (0..settings.delivery_line_count).map(|_| AckMirror::new()).collect(),
            control_id_seq: AtomicI64::new(1),
        }
    }

    pub fn processing_line_ids() -> impl Iterator<Item = LineId> {
        (1..=PROCESSING_LINE_COUNT).map(LineId)
    }

    /// Mints a fresh `ControlId` for a piece about to be dispatched onto a
    /// line. Monotonic for the life of the process; never reused.
    pub fn next_control_id(&self) -> ControlId {
        ControlId(self.control_id_seq.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_factory_has_expected_line_counts() {
        let settings = Settings::default();
        let factory = Factory::new(&settings);
        assert_eq!(factory.processing.len(), PROCESSING_LINE_COUNT as usize);
        assert_eq!(factory.cells.len(), PROCESSING_LINE_COUNT as usize);
        assert_eq!(factory.waiters.len(), PROCESSING_LINE_COUNT as usize + 1);
        assert_eq!(factory.supply.len(), settings.supply_line_count as usize);
        assert_eq!(factory.delivery.len(), settings.delivery_line_count as usize);
    }
}
