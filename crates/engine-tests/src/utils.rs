//! Test harness: wires every sub-handler exactly as `Orchestrator::build`
//! does, minus the `TickScheduler`s — a test calls `tick_factory`/
//! `tick_day`/`submit_*` itself, so message order is deterministic and
//! nothing depends on wall-clock timing.

use connectors::plc::InMemoryPlcBus;
use connectors::testing::MockErpClient;
use connectors::ErpClient;
use engine_config::Settings;
use engine_core::{Factory, Metrics};
use engine_processing::IntakeTracker;
use engine_runtime::actor::messages::{DayTickMsg, DeliveryMsg, FactoryTickMsg, PieceIntakeMsg, ShipmentMsg};
use engine_runtime::actor::{Actor, ActorContext, ActorRef};
use engine_runtime::piece_worker::{self, PieceWorkerContext};
use engine_runtime::plc_codec;
use engine_runtime::{
    DayTickActor, DeliveryHandlerActor, FactoryTickActor, PieceIntakeActor, RuntimeError,
    ShipmentHandlerActor,
};
use model::erp::{DeliveryOrder, ExpectedMaterial};
use model::node::NodeValue;
use model::piece::Piece;
use model::{LineId, TxId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MAILBOX: usize = 64;

/// Every sub-handler from `Orchestrator::build`, driven by hand. Holds the
/// receiving end of each mailbox a handler forwards into, so a test can
/// pump exactly the messages one step produced before asserting anything.
pub struct Harness {
    pub settings: Arc<Settings>,
    pub factory: Arc<Mutex<Factory>>,
    pub bus: InMemoryPlcBus,
    pub erp: Arc<MockErpClient>,
    pub metrics: Metrics,
    pub cancel: CancellationToken,
    fatal_rx: mpsc::UnboundedReceiver<RuntimeError>,

    worker_ctx: PieceWorkerContext,

    factory_tick: FactoryTickActor,
    shipment: ShipmentHandlerActor,
    delivery: DeliveryHandlerActor,
    day_tick: DayTickActor,
    intake: PieceIntakeActor,

    ship_rx: mpsc::Receiver<ShipmentMsg>,
    deliv_rx: mpsc::Receiver<DeliveryMsg>,
    intake_rx: mpsc::Receiver<PieceIntakeMsg>,
}

impl Harness {
    /// Builds the full sub-handler set against a fresh `Factory`, a fresh
    /// `InMemoryPlcBus` seeded to all-zero control nodes (so the first
    /// factory tick can read every node without a decode error, exactly
    /// as a real PLC freshly powered on would report), and a fresh
    /// `MockErpClient`. The day-tick starting day comes from the ERP the
    /// same way the orchestrator queries it at startup.
    pub async fn build(settings: Arc<Settings>) -> Self {
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let bus = InMemoryPlcBus::new();
        let erp = Arc::new(MockErpClient::new());
        let metrics = Metrics::new();
        let cancel = CancellationToken::new();
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

        seed_plc_defaults(&bus, &settings).await;

        let (ship_tx, ship_rx) = mpsc::channel(MAILBOX);
        let (deliv_tx, deliv_rx) = mpsc::channel(MAILBOX);
        let (intake_tx, intake_rx) = mpsc::channel(MAILBOX);
        let shipment_ref = ActorRef::new("shipment", ship_tx);
        let delivery_ref = ActorRef::new("delivery", deliv_tx);
        let intake_ref = ActorRef::new("piece-intake", intake_tx);

        let factory_tick = FactoryTickActor::new(
            factory.clone(),
            Arc::new(bus.clone()),
            settings.clone(),
            metrics.clone(),
            shipment_ref.clone(),
            delivery_ref.clone(),
            fatal_tx.clone(),
            cancel.clone(),
        );
        let shipment = ShipmentHandlerActor::new(
            factory.clone(),
            Arc::new(bus.clone()),
            erp.clone(),
            settings.clone(),
            metrics.clone(),
            intake_ref,
            fatal_tx.clone(),
            cancel.clone(),
        );
        let delivery = DeliveryHandlerActor::new(
            factory.clone(),
            Arc::new(bus.clone()),
            erp.clone(),
            settings.clone(),
            metrics.clone(),
            fatal_tx.clone(),
            cancel.clone(),
        );
        let starting_day = erp.current_day().await.expect("mock erp never fails");
        let day_tick = DayTickActor::new(
            erp.clone(),
            shipment_ref,
            delivery_ref,
            metrics.clone(),
            fatal_tx.clone(),
            cancel.clone(),
            starting_day,
        );
        let worker_ctx = PieceWorkerContext {
            factory: factory.clone(),
            plc: Arc::new(bus.clone()),
            erp: erp.clone(),
            settings: settings.clone(),
            metrics: metrics.clone(),
            intake: Arc::new(Mutex::new(IntakeTracker::new())),
            fatal_tx,
            cancel: cancel.clone(),
        };
        let intake = PieceIntakeActor::new(worker_ctx.clone());

        Self {
            settings,
            factory,
            bus,
            erp,
            metrics,
            cancel,
            fatal_rx,
            worker_ctx,
            factory_tick,
            shipment,
            delivery,
            day_tick,
            intake,
            ship_rx,
            deliv_rx,
            intake_rx,
        }
    }

    pub fn worker_ctx(&self) -> PieceWorkerContext {
        self.worker_ctx.clone()
    }

    /// Spawns a real piece worker task, exactly as `PieceIntakeActor`
    /// does for a freshly polled piece.
    pub fn spawn_piece(&self, piece: Piece) -> JoinHandle<()> {
        piece_worker::spawn(piece, self.worker_ctx.clone())
    }

    /// Drives one factory tick, then forwards whatever ack messages it
    /// produced into the shipment/delivery handlers (and whatever those,
    /// in turn, wake the piece intake actor with).
    pub async fn tick_factory(&mut self) {
        self.factory_tick
            .handle(FactoryTickMsg::Tick, &ActorContext::new("factory-tick"))
            .await
            .expect("actor handle never errors, fatal path self-reports instead");
        self.pump().await;
    }

    pub async fn tick_day(&mut self) {
        self.day_tick
            .handle(DayTickMsg::Tick, &ActorContext::new("day-tick"))
            .await
            .expect("actor handle never errors, fatal path self-reports instead");
        self.pump().await;
    }

    pub async fn submit_shipments(&mut self, batch: Vec<ExpectedMaterial>) {
        self.shipment
            .handle(ShipmentMsg::Shipments(batch), &ActorContext::new("shipment"))
            .await
            .expect("actor handle never errors, fatal path self-reports instead");
        self.pump().await;
    }

    pub async fn submit_deliveries(&mut self, batch: Vec<DeliveryOrder>) {
        self.delivery
            .handle(DeliveryMsg::Deliveries(batch), &ActorContext::new("delivery"))
            .await
            .expect("actor handle never errors, fatal path self-reports instead");
        self.pump().await;
    }

    pub async fn poll_intake(&mut self) {
        self.intake
            .handle(PieceIntakeMsg::Poll, &ActorContext::new("piece-intake"))
            .await
            .expect("actor handle never errors, fatal path self-reports instead");
    }

    /// Drains every mailbox a handled message might have forwarded into,
    /// to a fixed point. Bounded by the mailbox capacity, never by an
    /// unbounded loop: each handler only ever forwards into a different
    /// handler's mailbox, never its own, so this always terminates.
    async fn pump(&mut self) {
        loop {
            let mut advanced = false;
            while let Ok(msg) = self.ship_rx.try_recv() {
                self.shipment
                    .handle(msg, &ActorContext::new("shipment"))
                    .await
                    .expect("actor handle never errors, fatal path self-reports instead");
                advanced = true;
            }
            while let Ok(msg) = self.deliv_rx.try_recv() {
                self.delivery
                    .handle(msg, &ActorContext::new("delivery"))
                    .await
                    .expect("actor handle never errors, fatal path self-reports instead");
                advanced = true;
            }
            while let Ok(msg) = self.intake_rx.try_recv() {
                self.intake
                    .handle(msg, &ActorContext::new("piece-intake"))
                    .await
                    .expect("actor handle never errors, fatal path self-reports instead");
                advanced = true;
            }
            if !advanced {
                return;
            }
        }
    }

    /// The transaction id the cell's last command wrote, for simulating
    /// the matching entry/exit edge.
    pub async fn cell_command_tx(&self, line: LineId) -> TxId {
        self.factory.lock().await.cells.get(&line).expect("cell mirror exists").last_command_tx()
    }

    pub async fn supply_command_tx(&self, line: u8) -> TxId {
        self.factory.lock().await.supply[(line - 1) as usize].last_command_tx()
    }

    pub async fn delivery_command_tx(&self, line: u8) -> TxId {
        self.factory.lock().await.delivery[(line - 1) as usize].last_command_tx()
    }

    /// Reports `tx_id` entering `line`'s cell — the PLC edge that moves a
    /// freshly dispatched item from slot 0 onto the conveyor.
    pub async fn simulate_piece_entered(&self, line: LineId, tx_id: TxId) {
        let [in_node, _out_node] = plc_codec::cell_control_nodes(line);
        self.bus.simulate(in_node, NodeValue::Int16(tx_id.0)).await;
    }

    /// Reports `tx_id` leaving `line`'s cell — the PLC edge the factory
    /// tick drains the conveyor against until this item exits.
    pub async fn simulate_piece_left(&self, line: LineId, tx_id: TxId) {
        let [_in_node, out_node] = plc_codec::cell_control_nodes(line);
        self.bus.simulate(out_node, NodeValue::Int16(tx_id.0)).await;
    }

    pub async fn simulate_supply_ack(&self, line: u8, tx_id: TxId) {
        self.bus.simulate(plc_codec::supply_control_node(line), NodeValue::Int16(tx_id.0)).await;
    }

    pub async fn simulate_delivery_ack(&self, line: u8, tx_id: TxId) {
        self.bus.simulate(plc_codec::delivery_control_node(line), NodeValue::Int16(tx_id.0)).await;
    }

    /// Asserts the fatal-error funnel stayed empty, the way a passing run
    /// must: a fatal error means some invariant the design treats as
    /// unrecoverable broke.
    pub fn assert_no_fatal(&mut self) {
        if let Ok(err) = self.fatal_rx.try_recv() {
            panic!("unexpected fatal error on the runtime's funnel: {err}");
        }
    }
}

async fn seed_plc_defaults(bus: &InMemoryPlcBus, settings: &Settings) {
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

/// Polls `cond` until it's true or `timeout` elapses, for assertions on
/// state a background piece-worker task mutates asynchronously. Returns
/// whether `cond` was observed true.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    loop {
        if cond() {
            return true;
        }
        if waited >= timeout {
            return false;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
}
