//! Orchestrator (C9): builds every shared handle, starts the sub-handlers in
//! dependency order, and owns the fatal-error funnel and graceful shutdown.
//!
//! Grounded on the teacher's `PipelineCoordinator`: one `ActorRef` +
//! `JoinHandle` pair per sub-handler, a shared `CancellationToken`, and a
//! `wait()` that drops every ref before joining every handle so mailboxes
//! close instead of hanging. Start order (delivery, piece intake, shipment,
//! factory tick, day tick) matches the reference's `mes.Run`.

use crate::actor::messages::{DayTickMsg, DeliveryMsg, FactoryTickMsg, PieceIntakeMsg, ShipmentMsg};
use crate::actor::{spawn_actor, ActorRef, TickScheduler};
use crate::day_tick::DayTickActor;
use crate::delivery_handler::DeliveryHandlerActor;
use crate::error::RuntimeError;
use crate::factory_tick::FactoryTickActor;
use crate::piece_intake::PieceIntakeActor;
use crate::piece_worker::PieceWorkerContext;
use crate::shipment_handler::ShipmentHandlerActor;
use connectors::plc::PlcBus;
use connectors::ErpClient;
use engine_config::Settings;
use engine_core::{Factory, Metrics};
use engine_processing::IntakeTracker;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SUB_HANDLER_MAILBOX: usize = 64;
const TICK_ACTOR_MAILBOX: usize = 4;

pub struct Orchestrator {
    cancel: CancellationToken,
    fatal_rx: mpsc::UnboundedReceiver<RuntimeError>,
    metrics: Metrics,

    delivery_ref: ActorRef<DeliveryMsg>,
    intake_ref: ActorRef<PieceIntakeMsg>,
    shipment_ref: ActorRef<ShipmentMsg>,
    factory_tick_ref: ActorRef<FactoryTickMsg>,
    day_tick_ref: ActorRef<DayTickMsg>,

    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Builds the factory singleton and every sub-handler, wires the
    /// fatal-error funnel, and starts the periodic schedulers. Fails only
    /// if the initial `current_day` query to the ERP fails — everything
    /// after that point runs under the fatal-error funnel instead.
    pub async fn build(
        settings: Arc<Settings>,
        plc: Arc<dyn PlcBus>,
        erp: Arc<dyn ErpClient>,
    ) -> Result<Self, RuntimeError> {
        let cancel = CancellationToken::new();
        let metrics = Metrics::new();
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let mut handles = Vec::new();

        let delivery_actor = DeliveryHandlerActor::new(
            factory.clone(),
            plc.clone(),
            erp.clone(),
            settings.clone(),
            metrics.clone(),
            fatal_tx.clone(),
            cancel.clone(),
        );
        let (delivery_ref, delivery_handle) =
            spawn_actor("delivery-handler", SUB_HANDLER_MAILBOX, delivery_actor);
        handles.push(delivery_handle);

        let worker_ctx = PieceWorkerContext {
            factory: factory.clone(),
            plc: plc.clone(),
            erp: erp.clone(),
            settings: settings.clone(),
            metrics: metrics.clone(),
            intake: Arc::new(Mutex::new(IntakeTracker::new())),
            fatal_tx: fatal_tx.clone(),
            cancel: cancel.clone(),
        };
        let intake_actor = PieceIntakeActor::new(worker_ctx);
        let (intake_ref, intake_handle) = spawn_actor("piece-intake", SUB_HANDLER_MAILBOX, intake_actor);
        handles.push(intake_handle);

        let shipment_actor = ShipmentHandlerActor::new(
            factory.clone(),
            plc.clone(),
            erp.clone(),
            settings.clone(),
            metrics.clone(),
            intake_ref.clone(),
            fatal_tx.clone(),
            cancel.clone(),
        );
        let (shipment_ref, shipment_handle) =
            spawn_actor("shipment-handler", SUB_HANDLER_MAILBOX, shipment_actor);
        handles.push(shipment_handle);

        let factory_tick_actor = FactoryTickActor::new(
            factory.clone(),
            plc.clone(),
            settings.clone(),
            metrics.clone(),
            shipment_ref.clone(),
            delivery_ref.clone(),
            fatal_tx.clone(),
            cancel.clone(),
        );
        let (factory_tick_ref, factory_tick_handle) =
            spawn_actor("factory-tick", TICK_ACTOR_MAILBOX, factory_tick_actor);
        handles.push(factory_tick_handle);
        handles.push(tokio::spawn(
            TickScheduler::new(factory_tick_ref.clone(), settings.tick_period, FactoryTickMsg::Tick)
                .run(cancel.clone()),
        ));

        let starting_day = erp.current_day().await?;
        let day_tick_actor = DayTickActor::new(
            erp.clone(),
            shipment_ref.clone(),
            delivery_ref.clone(),
            metrics.clone(),
            fatal_tx.clone(),
            cancel.clone(),
            starting_day,
        );
        let (day_tick_ref, day_tick_handle) =
            spawn_actor("day-tick", TICK_ACTOR_MAILBOX, day_tick_actor);
        handles.push(day_tick_handle);
        handles.push(tokio::spawn(
            TickScheduler::new(day_tick_ref.clone(), settings.day_tick_period, DayTickMsg::Tick)
                .run(cancel.clone()),
        ));

        info!(starting_day, "orchestrator started all sub-handlers");

        Ok(Self {
            cancel,
            fatal_rx,
            metrics,
            delivery_ref,
            intake_ref,
            shipment_ref,
            factory_tick_ref,
            day_tick_ref,
            handles,
        })
    }

    /// A clone of the shared cancellation token, for an external shutdown
    /// source (signal handler, test harness) to trigger a graceful stop.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs until either the shared token is cancelled (externally, or by a
    /// sub-handler's own fatal-error path) or the fatal-error funnel yields
    /// the first reported error, whichever happens first, then tears down.
    /// Returns the first fatal error observed, if any.
    pub async fn run(mut self) -> Option<RuntimeError> {
        let observed = tokio::select! {
            _ = self.cancel.cancelled() => None,
            Some(err) = self.fatal_rx.recv() => {
                error!(%err, "orchestrator observed a fatal error, shutting down");
                Some(err)
            }
        };
        self.cancel.cancel();
        self.wait().await;
        observed
    }

    /// Drops every held `ActorRef` so mailboxes close, then joins every
    /// spawned task.
    async fn wait(self) {
        drop(self.delivery_ref);
        drop(self.intake_ref);
        drop(self.shipment_ref);
        drop(self.factory_tick_ref);
        drop(self.day_tick_ref);

        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
