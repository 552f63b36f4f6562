use thiserror::Error;

/// Failures originating from the external-collaborator boundary: the PLC
/// bus and the ERP client. Both transport and decode failures land here;
/// callers decide (per spec §7) whether a given failure is transient or
/// fatal based on which operation produced it.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("plc bus timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("plc decode error: {0}")]
    Decode(String),

    #[error("plc transport error: {0}")]
    Transport(String),

    #[error("erp request failed: {0}")]
    Erp(#[from] reqwest::Error),

    #[error("erp returned malformed body: {0}")]
    ErpDecode(#[from] serde_json::Error),

    #[error("erp returned unexpected status {status} for {endpoint}")]
    ErpStatus {
        status: u16,
        endpoint: &'static str,
    },
}
