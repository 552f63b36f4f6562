use model::LineId;
use thiserror::Error;

/// Invariant violations in the mirror, line model, or claim protocol.
/// These are the "fatal" class from the error handling design: they
/// indicate the PLC and our model of it have diverged, or a protocol
/// guarantee was broken, and are never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("line {line}: decode mismatch, {detail}")]
    DecodeMismatch { line: LineId, detail: String },

    #[error("line {0}: addItem called while conveyor slot 0 is occupied")]
    ConveyorNotReady(LineId),

    #[error("line {0}: claimed while not ready")]
    ClaimWhileNotReady(LineId),

    #[error("line {line}: drain loop did not terminate within {conveyor_len} iterations")]
    DrainDidNotTerminate { line: LineId, conveyor_len: usize },

    #[error("tool {tool} is not in {position}'s repertoire on line {line}")]
    ToolNotInRepertoire {
        line: LineId,
        position: model::line::MachinePosition,
        tool: model::line::Tool,
    },

    #[error("waiter already claimed, cannot claim twice")]
    DoubleClaim,

    #[error("no line offered a compatible form for this piece")]
    NoLineOffered,

    #[error(transparent)]
    Config(#[from] engine_config::ConfigError),

    #[error(transparent)]
    Connector(#[from] connectors::ConnectorError),
}
