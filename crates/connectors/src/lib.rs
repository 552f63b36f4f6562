pub mod erp;
pub mod error;
pub mod plc;
pub mod testing;

pub use erp::{ErpClient, HttpErpClient};
pub use error::ConnectorError;
pub use plc::{with_timeout, InMemoryPlcBus, PlcBus};
