use model::LineId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("no candidate line offered a compatible control form for this piece")]
    NoLineOffered,

    #[error("line {0} missing from factory's processing map")]
    UnknownLine(LineId),

    #[error(transparent)]
    Planner(#[from] planner::PlannerError),

    #[error(transparent)]
    Core(#[from] engine_core::CoreError),

    #[error(transparent)]
    Connector(#[from] connectors::ConnectorError),
}
