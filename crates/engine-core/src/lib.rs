pub mod error;
pub mod factory;
pub mod line_model;
pub mod metrics;
pub mod mirror;
pub mod retry;
pub mod waiter;

pub use error::CoreError;
pub use factory::Factory;
pub use line_model::{ExitedItem, LineModel};
pub use metrics::{Metrics, MetricsSnapshot};
pub use mirror::{AckMirror, AckSnapshot, CellMirror, CellSnapshot, Mirror};
pub use retry::{RetryDisposition, RetryError, RetryPolicy};
pub use waiter::{Waiter, WaiterQueue};
