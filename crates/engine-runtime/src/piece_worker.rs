//! Piece Worker (C6): one task per in-flight piece. Registers for a line,
//! dispatches onto whichever one claims it, rides that line's
//! entry/transform/exit signals to completion, and loops back for the
//! next recipe step until the piece is done.
//!
//! Grounded on the reference's `pieceTracker`/`sendToProduction`/
//! `sendToLine`: `sendToProduction` blocks on the waiter's claim channel,
//! then `sendToLine` recomputes the control form for the winning line and
//! adds the conveyor item — recomputing rather than reusing the
//! planning-time form is intentional, since only the winning line's form
//! (with a real `tx_id`) is ever written to the PLC.

use crate::error::{ActorError, RuntimeError};
use crate::plc_codec;
use connectors::plc::{with_timeout, PlcBus};
use connectors::ErpClient;
use engine_config::Settings;
use engine_core::{Factory, Metrics};
use engine_processing::{posting, IntakeTracker};
use model::conveyor::{ConveyorHandles, ConveyorItem};
use model::piece::{Location, Piece};
use model::LineId;
use planner::{build_form, MountedTools};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared handles every piece worker task needs. Cloning is cheap — every
/// field is an `Arc` or an already-cloneable handle.
#[derive(Clone)]
pub struct PieceWorkerContext {
    pub factory: Arc<Mutex<Factory>>,
    pub plc: Arc<dyn PlcBus>,
    pub erp: Arc<dyn ErpClient>,
    pub settings: Arc<Settings>,
    pub metrics: Metrics,
    pub intake: Arc<Mutex<IntakeTracker>>,
    pub fatal_tx: mpsc::UnboundedSender<RuntimeError>,
    pub cancel: CancellationToken,
}

/// Spawns the task driving one piece from intake to completion.
pub fn spawn(piece: Piece, ctx: PieceWorkerContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(piece, ctx))
}

async fn run(mut piece: Piece, ctx: PieceWorkerContext) {
    let original_external_id = piece.external_id.clone();
    info!(
        external_id = %original_external_id,
        steps = piece.steps.len(),
        "piece worker starting"
    );

    if let Err(err) = drive(&mut piece, &ctx).await {
        error!(external_id = %original_external_id, %err, "piece worker fatal error");
        ctx.metrics.record_fatal_error();
        let _ = ctx.fatal_tx.send(err);
        ctx.cancel.cancel();
        return;
    }

    if ctx.cancel.is_cancelled() {
        return;
    }

    if let Err(reason) = piece.validate_completion() {
        let err = RuntimeError::Actor(ActorError::Internal(reason));
        error!(external_id = %original_external_id, %err, "piece failed completion validation");
        ctx.metrics.record_fatal_error();
        let _ = ctx.fatal_tx.send(err);
        ctx.cancel.cancel();
        return;
    }

    ctx.intake.lock().await.release(&original_external_id);
    ctx.metrics.record_piece_completed();
    info!(external_id = %original_external_id, "piece completed");
}

/// The outer `StepLoop`: register, dispatch, ride the line to completion
/// or a watchdog restart, repeat until every recipe step is done.
async fn drive(piece: &mut Piece, ctx: &PieceWorkerContext) -> Result<(), RuntimeError> {
    while !piece.is_complete() {
        let rx = {
            let mut factory = ctx.factory.lock().await;
            engine_processing::register(piece, &mut factory, ctx.settings.scoring_weights, ctx.settings.leniency)?
        };

        let line = tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            claimed = rx => claimed.map_err(|_| ActorError::MailboxClosed)?,
        };

        if line.is_trivial() {
            // L0 carries no conveyor or PLC state (see the factory's line
            // maps): it's an instant `W2 -> W1` shuttle, never a
            // transform, so current_step is unchanged and the loop
            // immediately re-registers, now from W1.
            posting::exit_to_line(piece, line, ctx.erp.as_ref()).await?;
            posting::enter_warehouse(piece, line, ctx.erp.as_ref()).await?;
            continue;
        }

        run_on_line(piece, line, ctx).await?;
    }
    Ok(())
}

/// Dispatches onto `line` and rides its conveyor signals to a line exit
/// (step progress made) or a watchdog timeout (no progress, restart).
async fn run_on_line(piece: &mut Piece, line: LineId, ctx: &PieceWorkerContext) -> Result<(), RuntimeError> {
    let (entry_tx, mut entry_rx) = mpsc::unbounded_channel();
    let (transform_tx, mut transform_rx) = mpsc::unbounded_channel();
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let (err_tx, _err_rx) = mpsc::unbounded_channel();
    let handles = ConveyorHandles {
        line_entry: entry_tx,
        transform: transform_tx,
        line_exit: exit_tx,
        err: err_tx,
    };

    let (tx_id, form) = {
        let mut factory = ctx.factory.lock().await;
        let mounted = {
            let model = factory.processing.get(&line).expect("selected line has a model");
            MountedTools {
                m1: model.mounted(model::MachinePosition::M1),
                m2: model.mounted(model::MachinePosition::M2),
            }
        };
        let tx_id = factory
            .cells
            .get(&line)
            .expect("selected line has a cell mirror")
            .last_command_tx()
            .next();
        let form = build_form(line, tx_id, piece, mounted, 0, ctx.settings.scoring_weights)
            .expect("planner already confirmed this line accepts the piece's next step");
        let control_id = factory.next_control_id();
        let item = ConveyorItem::from_form(control_id, &form, handles);
        let model = factory.processing.get_mut(&line).expect("selected line has a model");
        model.add_item(item)?;
        // Mounted tool persists past this dispatch, so the next piece's
        // planning pass sees it and only pays the change penalty when it
        // actually differs. `set_current_tool` no-ops on a `None` side.
        model.set_current_tool(model::MachinePosition::M1, form.top.tool)?;
        model.set_current_tool(model::MachinePosition::M2, form.bot.tool)?;
        factory
            .cells
            .get_mut(&line)
            .expect("selected line has a cell mirror")
            .set_command(tx_id);
        (tx_id, form)
    };

    let write = plc_codec::encode_cell_command(line, &form);
    with_timeout(ctx.settings.plc_write_timeout, ctx.plc.write(&write)).await?;
    ctx.metrics.record_piece_dispatched();
    if form.top.tool_change || form.bot.tool_change {
        ctx.metrics.record_tool_change();
    }
    debug!(%line, %tx_id, "dispatched control form onto line");

    let watchdog = sleep(ctx.settings.watchdog_duration);
    tokio::pin!(watchdog);

    loop {
        // A single PLC out-edge can make the drain loop in `update_conveyor`
        // walk an item through several slots at once, queuing its entry,
        // transform(s), and exit events all before this task is next
        // scheduled. `biased` drains them in that causal order instead of
        // letting the exit arm win the race and strand the others.
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Ok(()),
            Some(_event) = entry_rx.recv() => {
                posting::exit_to_line(piece, line, ctx.erp.as_ref()).await?;
            }
            Some(event) = transform_rx.recv() => {
                posting::transform(piece, line, event.machine, event.tool_change, ctx.erp.as_ref()).await?;
            }
            Some(_event) = exit_rx.recv() => {
                let ack = plc_codec::encode_cell_ack(line, tx_id);
                with_timeout(ctx.settings.plc_write_timeout, ctx.plc.write(&[ack])).await?;
                posting::enter_warehouse(piece, line, ctx.erp.as_ref()).await?;
                return Ok(());
            }
            _ = &mut watchdog => {
                ctx.metrics.record_watchdog_restart();
                warn!(external_id = %piece.external_id, %line, "piece worker watchdog fired, restarting");
                // Pragmatic recovery for a missed PLC edge event: treat the
                // piece as already back in whichever warehouse this line
                // would have returned it to, so the next register/dispatch
                // cycle finds it in a legal starting state.
                piece.location = Location::Warehouse(posting::target_warehouse(line));
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::plc::InMemoryPlcBus;
    use connectors::testing::MockErpClient;
    use engine_config::Settings;
    use model::node::NodeValue;
    use model::piece::Transformation;
    use model::Tool;

    fn one_step_piece(tool: Tool) -> Piece {
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

    async fn seed_zero_cells(bus: &InMemoryPlcBus) {
        for line in Factory::processing_line_ids() {
            for node in plc_codec::cell_control_nodes(line) {
                bus.simulate(node, NodeValue::Int16(0)).await;
            }
        }
    }

    fn ctx(settings: Arc<Settings>, bus: InMemoryPlcBus) -> PieceWorkerContext {
        let factory = Arc::new(Mutex::new(Factory::new(&settings)));
        let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel();
        PieceWorkerContext {
            factory,
            plc: Arc::new(bus),
            erp: Arc::new(MockErpClient::new()),
            settings,
            metrics: Metrics::new(),
            intake: Arc::new(Mutex::new(IntakeTracker::new())),
            fatal_tx,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn w2_origin_piece_bypasses_conveyor_via_l0() {
        let settings = Arc::new(Settings::default());
        let bus = InMemoryPlcBus::new();
        let c = ctx(settings, bus);
        let mut piece = one_step_piece(Tool::T1);
        piece.location = Location::Warehouse(model::WarehouseId::W2);

        // L0 is an instant shuttle: one outer-loop pass dispatches it
        // straight through without ever touching the conveyor or PLC, so
        // the recipe's single step is still unconsumed afterwards.
        let rx = {
            let mut factory = c.factory.lock().await;
            engine_processing::register(&piece, &mut factory, c.settings.scoring_weights, c.settings.leniency)
                .unwrap()
        };
        let line = rx.await.unwrap();
        assert_eq!(line, model::LineId::L0);

        posting::exit_to_line(&mut piece, line, c.erp.as_ref()).await.unwrap();
        posting::enter_warehouse(&mut piece, line, c.erp.as_ref()).await.unwrap();
        assert_eq!(piece.location, Location::Warehouse(model::WarehouseId::W1));
        assert_eq!(piece.current_step, 0);
    }

    #[tokio::test]
    async fn dispatch_onto_real_line_writes_control_form() {
        let settings = Arc::new(Settings::default());
        let bus = InMemoryPlcBus::new();
        seed_zero_cells(&bus).await;
        let c = ctx(settings, bus.clone());
        let mut piece = one_step_piece(Tool::T1);

        let rx = {
            let mut factory = c.factory.lock().await;
            engine_processing::register(&piece, &mut factory, c.settings.scoring_weights, c.settings.leniency)
                .unwrap()
        };
        let line = rx.await.unwrap();
        assert!(!line.is_trivial());

        // run_on_line blocks waiting for a PLC edge that never arrives in
        // this fixture; just confirm the control form landed on the bus
        // before tearing the task down.
        let task = tokio::spawn(async move {
            let _ = run_on_line(&mut piece, line, &c).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        task.abort();

        let written = bus.get(&model::node::NodeId::cell_field(line.0, "id")).await;
        assert!(written.is_some());
    }
}
