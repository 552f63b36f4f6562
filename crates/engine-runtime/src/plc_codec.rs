//! Node addressing and int16/bool encoding for the field protocol. Grounded
//! on the reference's `PieceFromString`/`ToolFromString` ordinal mappings:
//! everything the PLC side sees is a small positive `int16`, never a string.

use engine_core::mirror::{AckSnapshot, CellSnapshot};
use model::control_form::ControlForm;
use model::node::{NodeId, NodeValue};
use model::{LineId, Tool, TxId};

/// `"P1"`..`"P9"` to `1`..`9`; anything else (including `L0`'s pieces, which
/// still carry a real kind string) encodes to `0`, matching the reference.
pub fn piece_kind_ordinal(kind: &str) -> i16 {
    kind.strip_prefix('P')
        .and_then(|n| n.parse::<i16>().ok())
        .filter(|n| (1..=9).contains(n))
        .unwrap_or(0)
}

/// `T1`..`T6` to `1`..`6`.
pub fn tool_ordinal(tool: Tool) -> i16 {
    match tool {
        Tool::T1 => 1,
        Tool::T2 => 2,
        Tool::T3 => 3,
        Tool::T4 => 4,
        Tool::T5 => 5,
        Tool::T6 => 6,
    }
}

fn tool_ordinal_opt(tool: Option<Tool>) -> i16 {
    tool.map(tool_ordinal).unwrap_or(0)
}

/// Builds the batch write for a cell command: `GVL.cellK.{id, piece,
/// processTop, toolTop, repeatTop, processBot, toolBot, repeatBot}`.
pub fn encode_cell_command(line: LineId, form: &ControlForm) -> Vec<(NodeId, NodeValue)> {
    vec![
        (NodeId::cell_field(line.0, "id"), NodeValue::Int16(form.tx_id.0)),
        (
            NodeId::cell_field(line.0, "piece"),
            NodeValue::Int16(piece_kind_ordinal(&form.piece_kind)),
        ),
        (NodeId::cell_field(line.0, "processTop"), NodeValue::Bool(form.top.process)),
        (
            NodeId::cell_field(line.0, "toolTop"),
            NodeValue::Int16(tool_ordinal_opt(form.top.tool)),
        ),
        (
            NodeId::cell_field(line.0, "repeatTop"),
            NodeValue::Int16(form.top.repeat as i16),
        ),
        (NodeId::cell_field(line.0, "processBot"), NodeValue::Bool(form.bot.process)),
        (
            NodeId::cell_field(line.0, "toolBot"),
            NodeValue::Int16(tool_ordinal_opt(form.bot.tool)),
        ),
        (
            NodeId::cell_field(line.0, "repeatBot"),
            NodeValue::Int16(form.bot.repeat as i16),
        ),
    ]
}

/// `POU.idK_i`/`POU.idK_o`, in read order.
pub fn cell_control_nodes(line: LineId) -> [NodeId; 2] {
    [NodeId::cell_control(line.0, "i"), NodeId::cell_control(line.0, "o")]
}

/// Decodes a `[in, out]` pair read via [`cell_control_nodes`] into a
/// `CellSnapshot`. Returns `None` on a type/count mismatch; the caller
/// treats that as the fatal decode-mismatch case.
pub fn decode_cell_snapshot(values: &[NodeValue]) -> Option<CellSnapshot> {
    let [in_v, out_v] = values else { return None };
    Some(CellSnapshot {
        in_tx_id: TxId(in_v.as_i16()?),
        out_tx_id: TxId(out_v.as_i16()?),
    })
}

/// `POU.mesK`, the ack write acknowledging warehouse entry for `tx_id`.
pub fn encode_cell_ack(line: LineId, tx_id: TxId) -> (NodeId, NodeValue) {
    (NodeId::cell_ack(line.0), NodeValue::Int16(tx_id.0))
}

/// `GVL.cinK.{id,piece}` write for a supply line command.
pub fn encode_supply_command(line: u8, tx_id: TxId, piece_kind: &str) -> Vec<(NodeId, NodeValue)> {
    vec![
        (NodeId::supply_field(line, "id"), NodeValue::Int16(tx_id.0)),
        (
            NodeId::supply_field(line, "piece"),
            NodeValue::Int16(piece_kind_ordinal(piece_kind)),
        ),
    ]
}

/// `POU.id_inK`, the supply line's ack read.
pub fn supply_control_node(line: u8) -> NodeId {
    NodeId::supply_control(line)
}

pub fn decode_ack_snapshot(value: &NodeValue) -> Option<AckSnapshot> {
    Some(AckSnapshot { ack_tx_id: TxId(value.as_i16()?) })
}

/// `GVL.rollerK.{id,np,piece}` write for a delivery line command. `np` is
/// the chunk quantity this roller should dispense.
pub fn encode_delivery_command(
    line: u8,
    tx_id: TxId,
    quantity: u32,
    piece_kind: &str,
) -> Vec<(NodeId, NodeValue)> {
    vec![
        (NodeId::delivery_field(line, "id"), NodeValue::Int16(tx_id.0)),
        (NodeId::delivery_field(line, "np"), NodeValue::Int16(quantity as i16)),
        (
            NodeId::delivery_field(line, "piece"),
            NodeValue::Int16(piece_kind_ordinal(piece_kind)),
        ),
    ]
}

/// `POU.idrK`, the delivery line's ack read.
pub fn delivery_control_node(line: u8) -> NodeId {
    NodeId::delivery_control(line)
}

/// `GVL.totalW{1,2}` read.
pub fn warehouse_total_node(warehouse: u8) -> NodeId {
    NodeId::warehouse_total(warehouse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_kind_ordinal_maps_p1_through_p9() {
        assert_eq!(piece_kind_ordinal("P1"), 1);
        assert_eq!(piece_kind_ordinal("P9"), 9);
        assert_eq!(piece_kind_ordinal("P10"), 0);
        assert_eq!(piece_kind_ordinal("garbage"), 0);
    }

    #[test]
    fn tool_ordinal_maps_t1_through_t6() {
        assert_eq!(tool_ordinal(Tool::T1), 1);
        assert_eq!(tool_ordinal(Tool::T6), 6);
    }

    #[test]
    fn decode_cell_snapshot_rejects_wrong_shape() {
        assert!(decode_cell_snapshot(&[NodeValue::Int16(1)]).is_none());
        assert!(decode_cell_snapshot(&[NodeValue::Bool(true), NodeValue::Int16(1)]).is_none());
    }

    #[test]
    fn decode_cell_snapshot_reads_in_out_pair() {
        let snap = decode_cell_snapshot(&[NodeValue::Int16(5), NodeValue::Int16(7)]).unwrap();
        assert_eq!(snap.in_tx_id, TxId(5));
        assert_eq!(snap.out_tx_id, TxId(7));
    }

    #[test]
    fn encode_cell_command_covers_all_eight_fields() {
        let form = ControlForm::trivial(TxId(3), "P2".into());
        let nodes = encode_cell_command(LineId::L0, &form);
        assert_eq!(nodes.len(), 8);
    }
}
