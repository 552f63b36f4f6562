use crate::error::ConnectorError;
use async_trait::async_trait;
use model::{NodeId, NodeValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Typed batch read/write of named PLC variables, bounded by a timeout.
/// The real OPC UA wire client is out of scope for this core; this trait
/// is the only thing the coordination logic depends on.
#[async_trait]
pub trait PlcBus: Send + Sync {
    async fn read(&self, nodes: &[NodeId]) -> Result<Vec<NodeValue>, ConnectorError>;
    async fn write(&self, values: &[(NodeId, NodeValue)]) -> Result<(), ConnectorError>;
}

/// Reference `PlcBus`: an in-process shared variable table. Used for local
/// running (no physical PLC reachable from this workspace) and as the
/// fixture every integration test drives directly, mutating node values to
/// simulate PLC-side progress between ticks.
#[derive(Clone, Default)]
pub struct InMemoryPlcBus {
    vars: Arc<Mutex<HashMap<NodeId, NodeValue>>>,
}

impl InMemoryPlcBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/simulation hook: set a node's value directly, as if the PLC had
    /// reported it, without going through `write`.
    pub async fn simulate(&self, node: NodeId, value: NodeValue) {
        self.vars.lock().await.insert(node, value);
    }

    pub async fn get(&self, node: &NodeId) -> Option<NodeValue> {
        self.vars.lock().await.get(node).copied()
    }
}

#[async_trait]
impl PlcBus for InMemoryPlcBus {
    async fn read(&self, nodes: &[NodeId]) -> Result<Vec<NodeValue>, ConnectorError> {
        let vars = self.vars.lock().await;
        nodes
            .iter()
            .map(|n| {
                vars.get(n).copied().ok_or_else(|| {
                    ConnectorError::Decode(format!("no value recorded for node {n}"))
                })
            })
            .collect()
    }

    async fn write(&self, values: &[(NodeId, NodeValue)]) -> Result<(), ConnectorError> {
        let mut vars = self.vars.lock().await;
        for (node, value) in values {
            vars.insert(node.clone(), *value);
        }
        Ok(())
    }
}

/// Wraps any `PlcBus` with a per-call timeout, matching the 1s read / 10s
/// write bound the concurrency model requires of every critical section.
pub async fn with_timeout<T>(
    duration: Duration,
    fut: impl std::future::Future<Output = Result<T, ConnectorError>>,
) -> Result<T, ConnectorError> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ConnectorError::Timeout(duration))?
}
