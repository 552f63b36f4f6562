//! Typed dual-snapshot mirror of PLC-reported state: `current`, `previous`,
//! and the last command we wrote. Edge predicates are pure functions of
//! these three values — no I/O happens here, the caller owns reading and
//! writing the bus.

use model::TxId;

/// One processing line's cell variables: the transaction id the PLC
/// reports for the piece currently entering (`in_tx_id`) and for the one
/// that just left (`out_tx_id`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellSnapshot {
    pub in_tx_id: TxId,
    pub out_tx_id: TxId,
}

/// A supply or delivery line's single ack variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckSnapshot {
    pub ack_tx_id: TxId,
}

/// Dual-snapshot mirror generic over the observable's shape. `UpdateState`
/// is `update`; `SetCommand` is `set_command`.
#[derive(Debug, Clone, Default)]
pub struct Mirror<S> {
    current: S,
    previous: S,
    last_command_tx: TxId,
}

impl<S: Copy + Default> Mirror<S> {
    pub fn new() -> Self {
        Self {
            current: S::default(),
            previous: S::default(),
            last_command_tx: TxId::ZERO,
        }
    }

    /// Copies `current` into `previous`, then installs the freshly decoded
    /// values as `current`. Decoding itself (wrong type/count from the
    /// bus) is the caller's concern and must fail fatally, per the
    /// component's failure semantics — this method never fails.
    pub fn update(&mut self, decoded: S) {
        self.previous = self.current;
        self.current = decoded;
    }

    /// Records a command's transaction id without performing any I/O.
    pub fn set_command(&mut self, tx_id: TxId) {
        self.last_command_tx = tx_id;
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn previous(&self) -> S {
        self.previous
    }

    pub fn last_command_tx(&self) -> TxId {
        self.last_command_tx
    }
}

pub type CellMirror = Mirror<CellSnapshot>;
pub type AckMirror = Mirror<AckSnapshot>;

impl CellMirror {
    pub fn piece_entered(&self) -> bool {
        self.current.in_tx_id == self.last_command_tx && self.current.in_tx_id != self.previous.in_tx_id
    }

    pub fn piece_left(&self) -> bool {
        self.current.out_tx_id != self.previous.out_tx_id
    }
}

impl AckMirror {
    pub fn acked(&self) -> bool {
        self.current.ack_tx_id == self.last_command_tx
            && self.current.ack_tx_id != self.previous.ack_tx_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_entered_requires_matching_command_and_changed_tx() {
        let mut mirror = CellMirror::new();
        mirror.set_command(TxId(5));
        assert!(!mirror.piece_entered());

        mirror.update(CellSnapshot { in_tx_id: TxId(5), out_tx_id: TxId(0) });
        assert!(mirror.piece_entered());

        // Same tx reported again: no longer an edge.
        mirror.update(CellSnapshot { in_tx_id: TxId(5), out_tx_id: TxId(0) });
        assert!(!mirror.piece_entered());
    }

    #[test]
    fn piece_left_fires_on_any_out_tx_change() {
        let mut mirror = CellMirror::new();
        mirror.update(CellSnapshot { in_tx_id: TxId(0), out_tx_id: TxId(1) });
        assert!(mirror.piece_left());
        mirror.update(CellSnapshot { in_tx_id: TxId(0), out_tx_id: TxId(1) });
        assert!(!mirror.piece_left());
    }

    #[test]
    fn acked_requires_matching_command_and_changed_tx() {
        let mut mirror = AckMirror::new();
        mirror.set_command(TxId(3));
        mirror.update(AckSnapshot { ack_tx_id: TxId(3) });
        assert!(mirror.acked());
        mirror.update(AckSnapshot { ack_tx_id: TxId(3) });
        assert!(!mirror.acked());
    }
}
