//! Day Tick: one simulated day per period. Advances the ERP's date, polls
//! expected shipments and pending deliveries for that day, and forwards
//! each batch to the shipment and delivery handlers.
//!
//! Grounded on the reference's `DateCounter`/`DateForm.HandleNew`: the
//! first value emitted is the day already in effect (no increment), later
//! ticks increment by one each period. The reference hardcodes the
//! starting day (5); this queries `ErpClient::current_day` once at
//! startup instead, since the capability the core depends on actually
//! exposes it.

use crate::actor::messages::{DayTickMsg, DeliveryMsg, ShipmentMsg};
use crate::actor::{Actor, ActorContext, ActorRef};
use crate::error::{ActorError, RuntimeError};
use connectors::ErpClient;
use engine_core::Metrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct DayTickActor {
    erp: Arc<dyn ErpClient>,
    shipment_ref: ActorRef<ShipmentMsg>,
    delivery_ref: ActorRef<DeliveryMsg>,
    metrics: Metrics,
    fatal_tx: mpsc::UnboundedSender<RuntimeError>,
    cancel: CancellationToken,
    day: u32,
}

impl DayTickActor {
    pub fn new(
        erp: Arc<dyn ErpClient>,
        shipment_ref: ActorRef<ShipmentMsg>,
        delivery_ref: ActorRef<DeliveryMsg>,
        metrics: Metrics,
        fatal_tx: mpsc::UnboundedSender<RuntimeError>,
        cancel: CancellationToken,
        starting_day: u32,
    ) -> Self {
        Self {
            erp,
            shipment_ref,
            delivery_ref,
            metrics,
            fatal_tx,
            cancel,
            day: starting_day,
        }
    }

    async fn tick(&mut self) -> Result<(), RuntimeError> {
        let day = self.day;
        self.erp.advance_day(day).await?;
        info!(day, "advanced to new day");

        let materials = match self.erp.expected_materials(day).await {
            Ok(materials) => materials,
            Err(err) => {
                warn!(day, %err, "failed to poll expected materials, treating as empty this tick");
                Vec::new()
            }
        };
        let deliveries = match self.erp.pending_deliveries().await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                warn!(day, %err, "failed to poll pending deliveries, treating as empty this tick");
                Vec::new()
            }
        };

        if self.shipment_ref.send(ShipmentMsg::Shipments(materials)).await.is_err() {
            warn!("shipment handler mailbox closed, dropping day's materials");
        }
        if self.delivery_ref.send(DeliveryMsg::Deliveries(deliveries)).await.is_err() {
            warn!("delivery handler mailbox closed, dropping day's deliveries");
        }

        self.day += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Actor<DayTickMsg> for DayTickActor {
    async fn handle(&mut self, _msg: DayTickMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        if let Err(err) = self.tick().await {
            error!(%err, "day tick fatal error");
            self.metrics.record_fatal_error();
            let _ = self.fatal_tx.send(err);
            self.cancel.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::testing::MockErpClient;
    use model::erp::{DeliveryOrder, ExpectedMaterial};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn tick_forwards_materials_and_deliveries_and_increments_day() {
        let erp = Arc::new(MockErpClient::new());
        erp.push_expected_material(ExpectedMaterial {
            material_type: "P1".into(),
            shipment_id: "S1".into(),
            quantity: 3,
        });
        erp.push_delivery(DeliveryOrder { id: "D1".into(), piece: "P2".into(), quantity: 2 });

        let (ship_tx, mut ship_rx) = mpsc::channel(4);
        let (deliv_tx, mut deliv_rx) = mpsc::channel(4);
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut actor = DayTickActor::new(
            erp.clone(),
            ActorRef::new("shipment", ship_tx),
            ActorRef::new("delivery", deliv_tx),
            Metrics::new(),
            fatal_tx,
            cancel.clone(),
            5,
        );

        actor.handle(DayTickMsg::Tick, &ActorContext::new("day-tick")).await.unwrap();

        assert_eq!(erp.current_day().await.unwrap(), 5);
        match ship_rx.try_recv().unwrap() {
            ShipmentMsg::Shipments(batch) => assert_eq!(batch.len(), 1),
            other => panic!("unexpected message: {other:?}"),
        }
        match deliv_rx.try_recv().unwrap() {
            DeliveryMsg::Deliveries(batch) => assert_eq!(batch.len(), 1),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(fatal_rx.try_recv().is_err());
        assert!(!cancel.is_cancelled());
        assert_eq!(actor.day, 6);
    }
}
