//! Structured error types for hpcmon
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// Fatal probe-runtime failures (§7): propagate, cleanup, exit non-zero.
///
/// `AttachWarning` is the one Informational case (§7) carried as a variant
/// purely so callers can log it uniformly; it is never returned from
/// `ProbeRuntime::load` — a failed net-probe attach is downgraded to a
/// `warn!` log line and the load proceeds without it.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("insufficient privilege to attach kernel probes (must run as root)")]
    Privilege,

    #[error("eBPF probe bytecode rejected by kernel verifier: {0}")]
    LoadRejected(String),

    #[error("required kernel feature missing: {0}")]
    KernelFeatureMissing(String),

    #[error("failed to attach {probe}: {error}")]
    AttachWarning { probe: String, error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Aya(#[from] aya::EbpfError),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Config-file load/parse failures. A user-requested `--config` that can't
/// be read or deserializes with unknown fields is treated as a startup
/// failure, not the resolver's "fall through silently" recoverable kind.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_display() {
        let err = ProbeError::Privilege;
        assert_eq!(err.to_string(), "insufficient privilege to attach kernel probes (must run as root)");
    }

    #[test]
    fn attach_warning_display() {
        let err = ProbeError::AttachWarning {
            probe: "sock_sendmsg".to_string(),
            error: "symbol not found".to_string(),
        };
        assert!(err.to_string().contains("sock_sendmsg"));
    }
}
