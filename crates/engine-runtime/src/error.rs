use thiserror::Error;

/// Top-level errors for the coordination runtime: every sub-handler's fatal
/// channel carries one of these back to the orchestrator.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] engine_core::CoreError),

    #[error(transparent)]
    Processing(#[from] engine_processing::ProcessingError),

    #[error(transparent)]
    Connector(#[from] connectors::ConnectorError),

    #[error(transparent)]
    Config(#[from] engine_config::ConfigError),

    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Common error type for actors in the runtime.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("mailbox closed")]
    MailboxClosed,

    #[error("actor internal error: {0}")]
    Internal(String),
}
