//! Factory Tick (C5): the one place that reads the PLC each period, folds
//! the result into every line's mirror, drives the conveyor state machine,
//! and forwards supply/delivery ack edges to the handlers that are waiting
//! on them. Read-only towards the PLC — every write happens at dispatch or
//! line-exit time, in the piece worker.

use crate::actor::{Actor, ActorContext, ActorRef};
use crate::actor::messages::{DeliveryMsg, FactoryTickMsg, ShipmentMsg};
use crate::error::{ActorError, RuntimeError};
use crate::plc_codec;
use connectors::plc::{with_timeout, PlcBus};
use connectors::ConnectorError;
use engine_config::Settings;
use engine_core::{CoreError, Factory, Metrics};
use model::LineId;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub struct FactoryTickActor {
    factory: Arc<Mutex<Factory>>,
    plc: Arc<dyn PlcBus>,
    settings: Arc<Settings>,
    metrics: Metrics,
    shipment_ref: ActorRef<ShipmentMsg>,
    delivery_ref: ActorRef<DeliveryMsg>,
    fatal_tx: mpsc::UnboundedSender<RuntimeError>,
    cancel: CancellationToken,
}

impl FactoryTickActor {
    pub fn new(
        factory: Arc<Mutex<Factory>>,
        plc: Arc<dyn PlcBus>,
        settings: Arc<Settings>,
        metrics: Metrics,
        shipment_ref: ActorRef<ShipmentMsg>,
        delivery_ref: ActorRef<DeliveryMsg>,
        fatal_tx: mpsc::UnboundedSender<RuntimeError>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            factory,
            plc,
            settings,
            metrics,
            shipment_ref,
            delivery_ref,
            fatal_tx,
            cancel,
        }
    }

    async fn tick(&self) -> Result<(), RuntimeError> {
        let lines: Vec<LineId> = Factory::processing_line_ids().collect();
        let supply_lines: Vec<u32> = (1..=self.settings.supply_line_count).collect();
        let delivery_lines: Vec<u32> = (1..=self.settings.delivery_line_count).collect();

        let mut nodes = Vec::with_capacity(lines.len() * 2 + supply_lines.len() + delivery_lines.len());
        for line in &lines {
            nodes.extend(plc_codec::cell_control_nodes(*line));
        }
        for line in &supply_lines {
            nodes.push(plc_codec::supply_control_node(*line as u8));
        }
        for line in &delivery_lines {
            nodes.push(plc_codec::delivery_control_node(*line as u8));
        }

        let values = with_timeout(self.settings.plc_read_timeout, self.plc.read(&nodes)).await?;

        let mut factory = self.factory.lock().await;
        let mut offset = 0;

        for line in &lines {
            let pair = &values[offset..offset + 2];
            offset += 2;
            let decoded = plc_codec::decode_cell_snapshot(pair).ok_or_else(|| CoreError::DecodeMismatch {
                line: *line,
                detail: "cell control pair is not two int16 values".into(),
            })?;
            factory.cells.get_mut(line).expect("cell mirror exists per line").update(decoded);

            let mirror = factory.cells.get(line).expect("cell mirror exists per line").clone();
            let line_model = factory.processing.get_mut(line).expect("line model exists per line");
            let waiters = factory.waiters.get_mut(line).expect("waiter queue exists per line");
            line_model.update_conveyor(&mirror, waiters)?;
        }

        // L0 carries no PLC state of its own: a piece sitting in it is
        // immediately ready, so it's offered to the waiter queue every
        // tick rather than gated on a conveyor edge.
        factory
            .waiters
            .get_mut(&LineId::L0)
            .expect("l0 waiter queue always present")
            .claim_one(LineId::L0);

        for supply_line in &supply_lines {
            let value = &values[offset];
            offset += 1;
            let decoded = plc_codec::decode_ack_snapshot(value).ok_or_else(|| {
                ConnectorError::Decode(format!("supply line {supply_line} ack is not int16"))
            })?;
            let mirror = &mut factory.supply[(*supply_line - 1) as usize];
            mirror.update(decoded);
            if mirror.acked() {
                let tx_id = mirror.current().ack_tx_id;
                let msg = ShipmentMsg::Ack { supply_line: *supply_line, tx_id };
                if self.shipment_ref.send(msg).await.is_err() {
                    warn!(supply_line, "shipment handler mailbox closed, dropping ack");
                }
            }
        }

        for delivery_line in &delivery_lines {
            let value = &values[offset];
            offset += 1;
            let decoded = plc_codec::decode_ack_snapshot(value).ok_or_else(|| {
                ConnectorError::Decode(format!("delivery line {delivery_line} ack is not int16"))
            })?;
            let mirror = &mut factory.delivery[(*delivery_line - 1) as usize];
            mirror.update(decoded);
            if mirror.acked() {
                let tx_id = mirror.current().ack_tx_id;
                let msg = DeliveryMsg::Ack { delivery_line: *delivery_line, tx_id };
                if self.delivery_ref.send(msg).await.is_err() {
                    warn!(delivery_line, "delivery handler mailbox closed, dropping ack");
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Actor<FactoryTickMsg> for FactoryTickActor {
    async fn handle(&mut self, _msg: FactoryTickMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        match self.tick().await {
            Ok(()) => {
                self.metrics.record_tick();
                Ok(())
            }
            Err(err) => {
                error!(%err, "factory tick fatal error");
                self.metrics.record_fatal_error();
                let _ = self.fatal_tx.send(err);
                self.cancel.cancel();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::plc::InMemoryPlcBus;
    use model::node::NodeValue;
    use model::TxId;

    async fn seed_defaults(bus: &InMemoryPlcBus, settings: &Settings) {
        for line in Factory::processing_line_ids() {
            for node in plc_codec::cell_control_nodes(line) {
                bus.simulate(node, NodeValue::Int16(0)).await;
            }
        }
        for i in 1..=settings.supply_line_count {
            bus.simulate(plc_codec::supply_control_node(i as u8), NodeValue::Int16(0)).await;
        }
        for i in 1..=settings.delivery_line_count {
            bus.simulate(plc_codec::delivery_control_node(i as u8), NodeValue::Int16(0)).await;
        }
    }

    fn harness(
        factory: Arc<Mutex<Factory>>,
        bus: InMemoryPlcBus,
        settings: Arc<Settings>,
    ) -> (
        FactoryTickActor,
        mpsc::Receiver<ShipmentMsg>,
        mpsc::Receiver<DeliveryMsg>,
        mpsc::UnboundedReceiver<RuntimeError>,
        CancellationToken,
    ) {
        let (ship_tx, ship_rx) = mpsc::channel(8);
        let (deliv_tx, deliv_rx) = mpsc::channel(8);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let actor = FactoryTickActor::new(
            factory,
            Arc::new(bus),
            settings,
            Metrics::new(),
            ActorRef::new("shipment", ship_tx),
            ActorRef::new("delivery", deliv_tx),
            fatal_tx,
            cancel.clone(),
        );
        (actor, ship_rx, deliv_rx, fatal_rx, cancel)
    }

    #[tokio::test]
    async fn tick_with_consistent_state_raises_no_fatal() {
        let settings = Arc::new(Settings::default());
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let bus = InMemoryPlcBus::new();
        seed_defaults(&bus, &settings).await;
        let (mut actor, _ship_rx, _deliv_rx, mut fatal_rx, cancel) = harness(factory, bus, settings);

        actor.handle(FactoryTickMsg::Tick, &ActorContext::new("factory-tick")).await.unwrap();

        assert!(fatal_rx.try_recv().is_err());
        assert!(!cancel.is_cancelled());
        assert_eq!(actor.metrics.snapshot().ticks_processed, 1);
    }

    #[tokio::test]
    async fn tick_forwards_shipment_ack_on_edge() {
        let settings = Arc::new(Settings::default());
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        {
            let mut f = factory.lock().await;
            f.supply[0].set_command(TxId(7));
        }
        let bus = InMemoryPlcBus::new();
        seed_defaults(&bus, &settings).await;
        bus.simulate(plc_codec::supply_control_node(1), NodeValue::Int16(7)).await;
        let (mut actor, mut ship_rx, _deliv_rx, mut fatal_rx, _cancel) = harness(factory, bus, settings);

        actor.handle(FactoryTickMsg::Tick, &ActorContext::new("factory-tick")).await.unwrap();

        assert!(fatal_rx.try_recv().is_err());
        match ship_rx.try_recv().unwrap() {
            ShipmentMsg::Ack { supply_line, tx_id } => {
                assert_eq!(supply_line, 1);
                assert_eq!(tx_id, TxId(7));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tick_raises_fatal_on_cell_decode_mismatch() {
        let settings = Arc::new(Settings::default());
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let bus = InMemoryPlcBus::new();
        seed_defaults(&bus, &settings).await;
        // Corrupt one cell control node with the wrong value shape.
        let corrupted = plc_codec::cell_control_nodes(LineId(1))[0].clone();
        bus.simulate(corrupted, NodeValue::Bool(true)).await;
        let (mut actor, _ship_rx, _deliv_rx, mut fatal_rx, cancel) = harness(factory, bus, settings);

        actor.handle(FactoryTickMsg::Tick, &ActorContext::new("factory-tick")).await.unwrap();

        assert!(fatal_rx.try_recv().is_ok());
        assert!(cancel.is_cancelled());
    }
}
