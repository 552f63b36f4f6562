//! Integration fixtures and tests for the coordination core: every sub-
//! handler wired together exactly as the orchestrator wires them, but
//! driven by hand instead of by a `TickScheduler`, so a test controls
//! precisely which tick or PLC edge happens next.

pub mod integration;
pub mod utils;
