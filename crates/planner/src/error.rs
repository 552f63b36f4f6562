use thiserror::Error;
use model::LineId;

/// Planner-level failures. These are all configuration/invariant
/// violations, not I/O — the planner only ever touches in-memory state.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("piece offered no compatible line out of {candidates} candidates")]
    NoLineOffered { candidates: usize },

    #[error("line {0} rejected a step none of its machines can process")]
    Incompatible(LineId),
}
