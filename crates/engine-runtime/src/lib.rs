pub mod actor;
pub mod day_tick;
pub mod delivery_handler;
pub mod error;
pub mod factory_tick;
pub mod orchestrator;
pub mod piece_intake;
pub mod piece_worker;
pub mod plc_codec;
pub mod shipment_handler;

pub use day_tick::DayTickActor;
pub use delivery_handler::DeliveryHandlerActor;
pub use error::RuntimeError;
pub use factory_tick::FactoryTickActor;
pub use orchestrator::Orchestrator;
pub use piece_intake::PieceIntakeActor;
pub use piece_worker::{spawn as spawn_piece_worker, PieceWorkerContext};
pub use shipment_handler::ShipmentHandlerActor;
