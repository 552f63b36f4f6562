//! Piece step-transition helpers: each pairs a `Piece` state mutation with
//! the ERP post the reference always issues alongside it, so the piece
//! worker's select arms stay a single call per signal.

use crate::error::ProcessingError;
use connectors::ErpClient;
use model::erp::TransformationPost;
use model::line::{MachinePosition, TOOL_CHANGE_PENALTY_SECS};
use model::piece::Piece;
use model::{LineId, WarehouseId};

/// `lineExitCh`'s target-warehouse rule: `L0` returns pieces to `W1`;
/// every other line delivers to `W2`. Confirmed against the reference's
/// `wID := ID_W2; if line == ID_L0 { wID = ID_W1 }`. `L0` is visited only
/// by a piece currently sitting in `W2` with steps still remaining, and
/// never calls `transform` (see below) — so the piece worker's outer loop
/// simply re-dispatches it from `W1`, onto a real line, for its next step.
pub fn target_warehouse(line: LineId) -> WarehouseId {
    if line.is_trivial() {
        WarehouseId::W1
    } else {
        WarehouseId::W2
    }
}

/// `lineEntryCh` arm: the piece has left its warehouse for `line`.
pub async fn exit_to_line(
    piece: &mut Piece,
    line: LineId,
    erp: &dyn ErpClient,
) -> Result<(), ProcessingError> {
    piece.exit_to_prod_line(line);
    erp.post_warehouse_exit(&piece.external_id).await?;
    Ok(())
}

/// `transformCh` arm: one machine pass completed. Captures the current
/// step's identity before `Piece::transform` advances the cursor, and
/// folds in the 30s tool-change penalty when one was needed. Never called
/// for `L0`, whose trivial form processes neither machine position.
pub async fn transform(
    piece: &mut Piece,
    line: LineId,
    machine: MachinePosition,
    tool_change: bool,
    erp: &dyn ErpClient,
) -> Result<(), ProcessingError> {
    let step = piece.current_transformation().clone();
    let time_taken = step.duration_secs + if tool_change { TOOL_CHANGE_PENALTY_SECS } else { 0 };
    piece.transform();
    erp.post_transformation(TransformationPost {
        transf_id: step.erp_transf_id,
        material_id: step.material_id,
        product_id: step.product_id,
        line_id: line.to_string(),
        machine_id: machine.to_string(),
        time_taken,
    })
    .await?;
    Ok(())
}

/// `lineExitCh` arm: the piece has left `line` for its target warehouse.
pub async fn enter_warehouse(
    piece: &mut Piece,
    line: LineId,
    erp: &dyn ErpClient,
) -> Result<(), ProcessingError> {
    let warehouse = target_warehouse(line);
    piece.enter_warehouse(warehouse);
    erp.post_warehouse_entry(&piece.external_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::testing::MockErpClient;
    use model::piece::Transformation;
    use model::Tool;

    fn piece() -> Piece {
        Piece::new(
            "p0".into(),
            "P0".into(),
            vec![Transformation {
                material_id: "p0".into(),
                material_kind: "P0".into(),
                product_id: "p1".into(),
                product_kind: "P1".into(),
                tool: Tool::T1,
                duration_secs: 10,
                erp_transf_id: "t1".into(),
            }],
        )
    }

    #[tokio::test]
    async fn transform_includes_tool_change_penalty() {
        let erp = MockErpClient::new();
        let mut p = piece();
        p.exit_to_prod_line(LineId(1));
        transform(&mut p, LineId(1), MachinePosition::M1, true, &erp).await.unwrap();
        let posts = erp.transformations();
        assert_eq!(posts[0].time_taken, 40);
        assert_eq!(p.external_id, "p1");
    }

    #[tokio::test]
    async fn transform_without_tool_change_has_no_penalty() {
        let erp = MockErpClient::new();
        let mut p = piece();
        p.exit_to_prod_line(LineId(1));
        transform(&mut p, LineId(1), MachinePosition::M1, false, &erp).await.unwrap();
        assert_eq!(erp.transformations()[0].time_taken, 10);
    }

    #[tokio::test]
    async fn enter_warehouse_routes_l0_to_w1() {
        let erp = MockErpClient::new();
        let mut p = piece();
        p.exit_to_prod_line(LineId::L0);
        enter_warehouse(&mut p, LineId::L0, &erp).await.unwrap();
        assert_eq!(p.location, model::piece::Location::Warehouse(WarehouseId::W1));
    }

    #[tokio::test]
    async fn enter_warehouse_routes_other_lines_to_w2() {
        let erp = MockErpClient::new();
        let mut p = piece();
        p.exit_to_prod_line(LineId(2));
        enter_warehouse(&mut p, LineId(2), &erp).await.unwrap();
        assert_eq!(p.location, model::piece::Location::Warehouse(WarehouseId::W2));
    }
}
