//! Piece intake: poll the ERP production endpoint, skip anything already
//! tracked, and hand back freshly constructed pieces for dispatch.

use crate::error::ProcessingError;
use connectors::ErpClient;
use model::piece::Piece;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Dedup pool of external identifiers for pieces currently in flight.
/// Entries are added on intake and removed once `validate_completion`
/// passes, matching the reference's "live until validateCompletion, then
/// forgotten" lifecycle.
#[derive(Default)]
pub struct IntakeTracker {
    active: HashSet<String>,
}

impl IntakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Polls the production endpoint (capped at `max_items`) and returns
    /// only the pieces not already being tracked, each freshly constructed
    /// at `W1` with identity/kind taken from its first recipe step.
    pub async fn poll(
        &mut self,
        erp: &dyn ErpClient,
        max_items: u32,
    ) -> Result<Vec<Piece>, ProcessingError> {
        let recipes = erp.pending_production(max_items).await?;
        let mut fresh = Vec::new();
        for recipe in recipes {
            let Some(first) = recipe.steps.first() else {
                warn!("production endpoint returned a piece recipe with no steps, skipping");
                continue;
            };
            let external_id = first.material_id.clone();
            if !self.active.insert(external_id.clone()) {
                debug!(external_id, "piece already tracked, skipping duplicate intake");
                continue;
            }
            let kind = first.material_kind.clone();
            fresh.push(Piece::new(external_id, kind, recipe.steps));
        }
        Ok(fresh)
    }

    /// Drops a completed piece from the dedup pool.
    pub fn release(&mut self, external_id: &str) {
        self.active.remove(external_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::testing::MockErpClient;
    use model::erp::PieceRecipe;
    use model::piece::Transformation;
    use model::line::Tool;

    fn recipe(material_id: &str) -> PieceRecipe {
        PieceRecipe {
            steps: vec![Transformation {
                material_id: material_id.to_string(),
                material_kind: "P1".to_string(),
                product_id: "p-out".to_string(),
                product_kind: "P2".to_string(),
                tool: Tool::T1,
                duration_secs: 10,
                erp_transf_id: "t1".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn poll_skips_already_tracked_pieces() {
        let erp = MockErpClient::new();
        erp.push_production(recipe("a"));
        erp.push_production(recipe("a"));
        erp.push_production(recipe("b"));

        let mut tracker = IntakeTracker::new();
        let pieces = tracker.poll(&erp, 32).await.unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(tracker.active_count(), 2);
    }

    #[tokio::test]
    async fn released_pieces_can_be_retracked() {
        let erp = MockErpClient::new();
        erp.push_production(recipe("a"));

        let mut tracker = IntakeTracker::new();
        tracker.poll(&erp, 32).await.unwrap();
        tracker.release("a");
        assert_eq!(tracker.active_count(), 0);

        erp.push_production(recipe("a"));
        let pieces = tracker.poll(&erp, 32).await.unwrap();
        assert_eq!(pieces.len(), 1);
    }
}
