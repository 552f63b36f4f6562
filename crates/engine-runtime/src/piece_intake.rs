//! Piece Intake: the actor side of `IntakeTracker::poll` — on a tick or a
//! shipment-arrival nudge, pulls fresh recipes off the ERP and spawns one
//! piece worker per piece that wasn't already in flight.

use crate::actor::messages::PieceIntakeMsg;
use crate::actor::{Actor, ActorContext};
use crate::error::{ActorError, RuntimeError};
use crate::piece_worker::{self, PieceWorkerContext};
use engine_processing::IntakeTracker;
use tracing::{error, info};

pub struct PieceIntakeActor {
    ctx: PieceWorkerContext,
}

impl PieceIntakeActor {
    pub fn new(ctx: PieceWorkerContext) -> Self {
        Self { ctx }
    }

    async fn poll(&self) -> Result<(), RuntimeError> {
        let fresh = {
            let erp = self.ctx.erp.as_ref();
            let mut tracker: tokio::sync::MutexGuard<'_, IntakeTracker> = self.ctx.intake.lock().await;
            tracker.poll(erp, self.ctx.settings.intake_poll_cap).await?
        };

        if !fresh.is_empty() {
            info!(count = fresh.len(), "piece intake spawning new workers");
        }
        for piece in fresh {
            piece_worker::spawn(piece, self.ctx.clone());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Actor<PieceIntakeMsg> for PieceIntakeActor {
    async fn handle(&mut self, _msg: PieceIntakeMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        if let Err(err) = self.poll().await {
            error!(%err, "piece intake fatal error");
            self.ctx.metrics.record_fatal_error();
            let _ = self.ctx.fatal_tx.send(err);
            self.ctx.cancel.cancel();
        }
        Ok(())
    }
}
