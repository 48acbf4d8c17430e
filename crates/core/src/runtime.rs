//! Container runtime selection: docker, podman, or orbstack.
//!
//! `RuntimeKind` is a thin enum; the actual CLI invocation lives in
//! `docker.rs` behind the `DockerCli` struct, which all three kinds share
//! (orbstack speaks the docker CLI protocol through a context switch).

use crate::errors::{PacknplayError, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
    Orbstack,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
            Self::Orbstack => "orbstack",
        }
    }

    /// The CLI binary to invoke. Orbstack reuses the `docker` binary via a
    /// context switch rather than shipping its own client.
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Docker | Self::Orbstack => "docker",
            Self::Podman => "podman",
        }
    }

    /// Extra leading args needed to reach this runtime through its binary,
    /// e.g. orbstack's docker context.
    pub fn context_args(&self) -> Vec<String> {
        match self {
            Self::Orbstack => vec!["--context".to_string(), "orbstack".to_string()],
            _ => Vec::new(),
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = PacknplayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            "orbstack" => Ok(Self::Orbstack),
            other => Err(PacknplayError::runtime(format!(
                "unknown runtime: {other}. supported runtimes: docker, podman, orbstack"
            ))),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const RUNTIME_ENV_VAR: &str = "PACKNPLAY_RUNTIME";

/// Precedence: CLI flag > `PACKNPLAY_RUNTIME` env var > default (docker).
pub fn detect_runtime(cli_runtime: Option<RuntimeKind>) -> RuntimeKind {
    if let Some(runtime) = cli_runtime {
        return runtime;
    }
    if let Ok(value) = std::env::var(RUNTIME_ENV_VAR) {
        if let Ok(runtime) = value.parse() {
            return runtime;
        }
    }
    RuntimeKind::Docker
}

/// Builds the runtime client for a kind. Split out from `detect_runtime` so
/// callers can construct a client for an explicitly-named runtime (e.g. the
/// `configure` command probing all three) without going through detection.
pub fn client_for(kind: RuntimeKind) -> crate::docker::DockerCli {
    crate::docker::DockerCli::new(kind)
}

/// Checks whether a runtime's binary is reachable on PATH and its daemon
/// responds, without constructing a full client.
pub async fn probe(kind: RuntimeKind) -> Result<()> {
    client_for(kind).ping().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_runtimes() {
        assert_eq!("docker".parse::<RuntimeKind>().unwrap(), RuntimeKind::Docker);
        assert_eq!("Podman".parse::<RuntimeKind>().unwrap(), RuntimeKind::Podman);
        assert_eq!("orbstack".parse::<RuntimeKind>().unwrap(), RuntimeKind::Orbstack);
    }

    #[test]
    fn rejects_unknown_runtime() {
        assert!("fakeruntime".parse::<RuntimeKind>().is_err());
    }

    #[test]
    fn detect_prefers_cli_flag_over_env() {
        std::env::set_var(RUNTIME_ENV_VAR, "podman");
        assert_eq!(detect_runtime(Some(RuntimeKind::Docker)), RuntimeKind::Docker);
        std::env::remove_var(RUNTIME_ENV_VAR);
    }

    #[test]
    fn orbstack_reuses_docker_binary() {
        assert_eq!(RuntimeKind::Orbstack.binary(), "docker");
        assert_eq!(RuntimeKind::Orbstack.context_args(), vec!["--context", "orbstack"]);
    }
}
