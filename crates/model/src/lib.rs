pub mod control_form;
pub mod conveyor;
pub mod erp;
pub mod ids;
pub mod line;
pub mod node;
pub mod piece;

pub use control_form::{ControlForm, MachineForm};
pub use conveyor::ConveyorItem;
pub use ids::{ControlId, LineId, TxId, WarehouseId};
pub use line::{MachinePosition, Tool};
pub use node::{NodeId, NodeValue};
pub use piece::{Location, Piece, Transformation};
