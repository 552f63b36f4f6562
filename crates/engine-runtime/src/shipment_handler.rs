//! Shipment Handler (C7): dispatches incoming raw-material shipments onto
//! the supply-line PLCs, tracks per-line acks, and once a whole shipment has
//! arrived posts it to the ERP and wakes piece intake.
//!
//! Grounded on the reference's `StartShipmentHandler`: shipments are
//! serviced one at a time, in arrival order, batching up to
//! `NUM_SUPPLY_LINES` outstanding commands before waiting on acks for room
//! to send more. The reference blocks the whole goroutine on `shipAckCh`
//! between batches; here, acks arrive through the same mailbox as new
//! shipment batches (forwarded by the factory tick), so the handler keeps
//! its in-flight state across `handle` calls instead of blocking inside one.

use crate::actor::messages::{PieceIntakeMsg, ShipmentMsg};
use crate::actor::{Actor, ActorContext, ActorRef};
use crate::error::{ActorError, RuntimeError};
use crate::plc_codec;
use connectors::plc::{with_timeout, PlcBus};
use connectors::ErpClient;
use engine_core::{Factory, Metrics};
use engine_config::Settings;
use model::TxId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct ActiveShipment {
    shipment_id: String,
    material_kind: String,
    remaining_to_send: u32,
    in_flight: HashMap<u32, TxId>,
}

pub struct ShipmentHandlerActor {
    factory: Arc<Mutex<Factory>>,
    plc: Arc<dyn PlcBus>,
    erp: Arc<dyn ErpClient>,
    settings: Arc<Settings>,
    metrics: Metrics,
    piece_intake_ref: ActorRef<PieceIntakeMsg>,
    fatal_tx: mpsc::UnboundedSender<RuntimeError>,
    cancel: CancellationToken,
    queue: VecDeque<model::erp::ExpectedMaterial>,
    active: Option<ActiveShipment>,
}

impl ShipmentHandlerActor {
    pub fn new(
        factory: Arc<Mutex<Factory>>,
        plc: Arc<dyn PlcBus>,
        erp: Arc<dyn ErpClient>,
        settings: Arc<Settings>,
        metrics: Metrics,
        piece_intake_ref: ActorRef<PieceIntakeMsg>,
        fatal_tx: mpsc::UnboundedSender<RuntimeError>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            factory,
            plc,
            erp,
            settings,
            metrics,
            piece_intake_ref,
            fatal_tx,
            cancel,
            queue: VecDeque::new(),
            active: None,
        }
    }

    async fn accept_batch(&mut self, batch: Vec<model::erp::ExpectedMaterial>) -> Result<(), RuntimeError> {
        for shipment in batch {
            info!(
                shipment_id = %shipment.shipment_id,
                quantity = shipment.quantity,
                material = %shipment.material_type,
                "new shipment queued"
            );
            self.queue.push_back(shipment);
        }
        if self.active.is_none() {
            self.start_next().await?;
        }
        Ok(())
    }

    async fn start_next(&mut self) -> Result<(), RuntimeError> {
        let Some(shipment) = self.queue.pop_front() else {
            return Ok(());
        };
        self.active = Some(ActiveShipment {
            shipment_id: shipment.shipment_id,
            material_kind: shipment.material_type,
            remaining_to_send: shipment.quantity,
            in_flight: HashMap::new(),
        });
        self.fill_in_flight().await
    }

    /// Dispatches onto free supply lines until every line is busy or the
    /// active shipment's full quantity has been sent.
    async fn fill_in_flight(&mut self) -> Result<(), RuntimeError> {
        let active = self.active.as_mut().expect("fill_in_flight called with an active shipment");
        let capacity = self.settings.supply_line_count;

        let mut writes = Vec::new();
        let mut newly_assigned = Vec::new();
        {
            let mut factory = self.factory.lock().await;
            for line in 1..=capacity {
                if active.remaining_to_send == 0 {
                    break;
                }
                if active.in_flight.contains_key(&line) {
                    continue;
                }
                let mirror = &mut factory.supply[(line - 1) as usize];
                let tx_id = mirror.last_command_tx().next();
                mirror.set_command(tx_id);
                writes.extend(plc_codec::encode_supply_command(line as u8, tx_id, &active.material_kind));
                newly_assigned.push((line, tx_id));
                active.remaining_to_send -= 1;
            }
        }

        if writes.is_empty() {
            return Ok(());
        }

        with_timeout(self.settings.plc_write_timeout, self.plc.write(&writes)).await?;
        for (line, tx_id) in newly_assigned {
            active.in_flight.insert(line, tx_id);
        }
        Ok(())
    }

    async fn on_ack(&mut self, supply_line: u32, tx_id: TxId) -> Result<(), RuntimeError> {
        let Some(active) = self.active.as_mut() else {
            return Err(RuntimeError::Actor(ActorError::Internal(format!(
                "shipment ack on supply line {supply_line} with no active shipment"
            ))));
        };

        match active.in_flight.remove(&supply_line) {
            Some(expected) if expected == tx_id => {}
            Some(expected) => {
                return Err(RuntimeError::Actor(ActorError::Internal(format!(
                    "supply line {supply_line} acked tx {tx_id} but {expected} was expected"
                ))));
            }
            None => {
                return Err(RuntimeError::Actor(ActorError::Internal(format!(
                    "unexpected ack on supply line {supply_line}, no command outstanding"
                ))));
            }
        }

        if active.remaining_to_send == 0 && active.in_flight.is_empty() {
            let shipment_id = active.shipment_id.clone();
            self.active = None;
            info!(shipment_id = %shipment_id, "shipment fully arrived");
            self.erp.post_shipment_arrival(&shipment_id).await?;
            if self.piece_intake_ref.send(PieceIntakeMsg::Poll).await.is_err() {
                warn!("piece intake mailbox closed, dropping wake-up nudge");
            }
            self.start_next().await
        } else {
            self.fill_in_flight().await
        }
    }
}

#[async_trait::async_trait]
impl Actor<ShipmentMsg> for ShipmentHandlerActor {
    async fn handle(&mut self, msg: ShipmentMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        let result = match msg {
            ShipmentMsg::Shipments(batch) => self.accept_batch(batch).await,
            ShipmentMsg::Ack { supply_line, tx_id } => self.on_ack(supply_line, tx_id).await,
        };

        if let Err(err) = result {
            error!(%err, "shipment handler fatal error");
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
    use connectors::plc::InMemoryPlcBus;
    use connectors::testing::MockErpClient;
    use engine_config::Settings;
    use model::erp::ExpectedMaterial;

    fn harness(
        settings: Arc<Settings>,
    ) -> (
        ShipmentHandlerActor,
        InMemoryPlcBus,
        Arc<MockErpClient>,
        mpsc::Receiver<PieceIntakeMsg>,
        mpsc::UnboundedReceiver<RuntimeError>,
        CancellationToken,
    ) {
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let bus = InMemoryPlcBus::new();
        let erp = Arc::new(MockErpClient::new());
        let (intake_tx, intake_rx) = mpsc::channel(8);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let actor = ShipmentHandlerActor::new(
            factory,
            Arc::new(bus.clone()),
            erp.clone(),
            settings,
            Metrics::new(),
            ActorRef::new("piece-intake", intake_tx),
            fatal_tx,
            cancel.clone(),
        );
        (actor, bus, erp, intake_rx, fatal_rx, cancel)
    }

    #[tokio::test]
    async fn shipment_larger_than_line_count_batches_in_two_waves() {
        let settings = Arc::new(Settings::default());
        let capacity = settings.supply_line_count;
        let (mut actor, _bus, erp, _intake_rx, mut fatal_rx, cancel) = harness(settings.clone());

        let shipment = ExpectedMaterial {
            material_type: "P1".into(),
            shipment_id: "S1".into(),
            quantity: capacity + 1,
        };
        actor
            .handle(ShipmentMsg::Shipments(vec![shipment]), &ActorContext::new("shipment"))
            .await
            .unwrap();
        assert!(fatal_rx.try_recv().is_err());
        assert!(!cancel.is_cancelled());

        let active = actor.active.as_ref().unwrap();
        assert_eq!(active.in_flight.len(), capacity as usize);
        assert_eq!(active.remaining_to_send, 1);

        // Ack every line from the first wave; the last ack should trigger a
        // second wave of exactly one more write rather than completion.
        let acks: Vec<(u32, TxId)> = active.in_flight.iter().map(|(&l, &t)| (l, t)).collect();
        for (line, tx_id) in acks {
            actor
                .handle(ShipmentMsg::Ack { supply_line: line, tx_id }, &ActorContext::new("shipment"))
                .await
                .unwrap();
        }
        assert!(fatal_rx.try_recv().is_err());
        let active = actor.active.as_ref().unwrap();
        assert_eq!(active.in_flight.len(), 1);
        assert_eq!(active.remaining_to_send, 0);

        let (&line, &tx_id) = active.in_flight.iter().next().unwrap();
        actor
            .handle(ShipmentMsg::Ack { supply_line: line, tx_id }, &ActorContext::new("shipment"))
            .await
            .unwrap();

        assert!(actor.active.is_none());
        assert_eq!(erp.shipment_arrivals(), vec!["S1".to_string()]);
        assert!(fatal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unexpected_ack_is_fatal() {
        let settings = Arc::new(Settings::default());
        let (mut actor, _bus, _erp, _intake_rx, mut fatal_rx, cancel) = harness(settings);

        actor
            .handle(ShipmentMsg::Ack { supply_line: 1, tx_id: TxId(9) }, &ActorContext::new("shipment"))
            .await
            .unwrap();

        assert!(fatal_rx.try_recv().is_ok());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn single_wave_shipment_completes_immediately_on_last_ack() {
        let settings = Arc::new(Settings::default());
        let (mut actor, _bus, erp, mut intake_rx, mut fatal_rx, _cancel) = harness(settings.clone());

        let shipment = ExpectedMaterial {
            material_type: "P2".into(),
            shipment_id: "S2".into(),
            quantity: 2,
        };
        actor
            .handle(ShipmentMsg::Shipments(vec![shipment]), &ActorContext::new("shipment"))
            .await
            .unwrap();

        let active = actor.active.as_ref().unwrap();
        assert_eq!(active.in_flight.len(), 2);
        let acks: Vec<(u32, TxId)> = active.in_flight.iter().map(|(&l, &t)| (l, t)).collect();
        for (line, tx_id) in acks {
            actor
                .handle(ShipmentMsg::Ack { supply_line: line, tx_id }, &ActorContext::new("shipment"))
                .await
                .unwrap();
        }

        assert!(actor.active.is_none());
        assert_eq!(erp.shipment_arrivals(), vec!["S2".to_string()]);
        assert!(intake_rx.try_recv().is_ok());
        assert!(fatal_rx.try_recv().is_err());
    }
}
