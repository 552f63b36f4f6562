//! Multi-line waiter registration: ask the planner which lines can take a
//! piece, then register one shared waiter on every line within the
//! leniency window so whichever becomes ready first claims it.

use crate::error::ProcessingError;
use engine_core::{Factory, Waiter};
use model::piece::Piece;
use model::{LineId, TxId};
use planner::{MountedTools, Weights};
use tokio::sync::oneshot;
use tracing::debug;

/// Registers `piece`'s waiter on every candidate line the planner selects
/// within the leniency window (`planner::plan` itself collapses a
/// `W2`-origin piece onto `L0` alone), returning the receiver the piece
/// worker blocks on to learn which line claimed it.
///
/// The `tx_id` passed to the planner is a placeholder: scoring never
/// depends on it, and the real transaction id is only minted for the line
/// that actually wins the claim, at dispatch time.
pub fn register(
    piece: &Piece,
    factory: &mut Factory,
    weights: Weights,
    leniency: f64,
) -> Result<oneshot::Receiver<LineId>, ProcessingError> {
    let (waiter, rx) = Waiter::new();

    let candidates: Vec<(LineId, MountedTools, usize)> = engine_core::Factory::processing_line_ids()
        .filter_map(|line| {
            let model = factory.processing.get(&line)?;
            let mounted = MountedTools {
                m1: model.mounted(model::MachinePosition::M1),
                m2: model.mounted(model::MachinePosition::M2),
            };
            Some((line, mounted, queue_size(factory, line)))
        })
        .collect();

    let selected = planner::plan(piece, TxId::ZERO, &candidates, weights, leniency)?;
    if selected.is_empty() {
        return Err(ProcessingError::NoLineOffered);
    }

    for candidate in &selected {
        debug!(line = %candidate.line, score = candidate.score, "registering waiter");
        factory
            .waiters
            .get_mut(&candidate.line)
            .ok_or(ProcessingError::UnknownLine(candidate.line))?
            .register(waiter.clone());
    }

    Ok(rx)
}

/// Conveyor occupancy used only for scoring: slots currently holding an
/// item, independent of readiness.
fn queue_size(factory: &Factory, line: LineId) -> usize {
    factory.processing.get(&line).map(|model| model.occupied_slots()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::Settings;
    use model::piece::{Location, Transformation};
    use model::{Tool, WarehouseId};

    fn piece(tool: Tool) -> Piece {
        Piece::new(
            "p0".into(),
            "P0".into(),
            vec![Transformation {
                material_id: "p0".into(),
                material_kind: "P0".into(),
                product_id: "p1".into(),
                product_kind: "P1".into(),
                tool,
                duration_secs: 10,
                erp_transf_id: "t1".into(),
            }],
        )
    }

    #[test]
    fn registers_on_at_least_one_compatible_line() {
        let settings = Settings::default();
        let mut factory = Factory::new(&settings);
        let p = piece(Tool::T1);
        let rx = register(&p, &mut factory, settings.scoring_weights, settings.leniency).unwrap();
        drop(rx);
        let total: usize = Factory::processing_line_ids()
            .map(|l| factory.waiters.get(&l).unwrap().len())
            .sum();
        assert!(total >= 1);
    }

    #[test]
    fn w2_origin_piece_registers_only_on_l0() {
        let settings = Settings::default();
        let mut factory = Factory::new(&settings);
        let mut p = piece(Tool::T1);
        p.location = Location::Warehouse(WarehouseId::W2);
        let rx = register(&p, &mut factory, settings.scoring_weights, settings.leniency).unwrap();
        drop(rx);
        assert_eq!(factory.waiters.get(&LineId::L0).unwrap().len(), 1);
        for l in Factory::processing_line_ids() {
            assert_eq!(factory.waiters.get(&l).unwrap().len(), 0);
        }
    }
}
