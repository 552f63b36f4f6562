use engine_runtime::RuntimeError;
use thiserror::Error;

/// Top-level CLI error: wraps a fatal runtime error or a startup failure,
/// maps to a process exit code per the coordination core's exit-code note.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] engine_config::ConfigError),

    #[error("failed to load env file: {0}")]
    EnvFile(#[from] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl CliError {
    /// 0 for a normal shutdown is handled separately in `main`; anything
    /// reaching this point is a startup or fatal-assertion failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
