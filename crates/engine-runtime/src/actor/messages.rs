use model::erp::{DeliveryOrder, ExpectedMaterial};
use model::TxId;

/// Drives the factory tick actor: one per tick period, nothing else.
#[derive(Debug, Clone, Copy)]
pub enum FactoryTickMsg {
    Tick,
}

/// A batch of shipments to receive, plus the ack notifications the factory
/// tick forwards once a supply line's ack node reports the tx id back.
#[derive(Debug)]
pub enum ShipmentMsg {
    Shipments(Vec<ExpectedMaterial>),
    Ack { supply_line: u32, tx_id: TxId },
}

/// A batch of deliveries to fulfil, plus the ack notifications the factory
/// tick forwards once a delivery line's ack node reports the tx id back.
#[derive(Debug)]
pub enum DeliveryMsg {
    Deliveries(Vec<DeliveryOrder>),
    Ack { delivery_line: u32, tx_id: TxId },
}

/// Drives the piece intake loop: a periodic poll, or a nudge from the
/// shipment handler once a shipment has fully arrived.
#[derive(Debug, Clone, Copy)]
pub enum PieceIntakeMsg {
    Poll,
}

/// Drives the day-tick source: one per simulated day, nothing else.
#[derive(Debug, Clone, Copy)]
pub enum DayTickMsg {
    Tick,
}
