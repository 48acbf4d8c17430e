//! Shell-probe flag selection for in-container user detection.
//!
//! The devcontainer `userEnvProbe` field names a shell invocation style; we
//! only need the resulting argv flags, not a full host environment
//! simulation, since the probe always runs inside the target container.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeMode {
    None,
    LoginShell,
    InteractiveShell,
    LoginInteractiveShell,
}

impl ProbeMode {
    /// Parses the `userEnvProbe` config string. Unset or unrecognized
    /// values default to `loginInteractiveShell`, matching upstream
    /// devcontainer tooling.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("none") => Self::None,
            Some("loginShell") => Self::LoginShell,
            Some("interactiveShell") => Self::InteractiveShell,
            Some("loginInteractiveShell") | None | Some(_) => Self::LoginInteractiveShell,
        }
    }

    /// Shell flags to splice between `sh` and `-c "<probe command>"`.
    pub fn shell_args(&self) -> Vec<&'static str> {
        match self {
            Self::None => vec![],
            Self::LoginShell => vec!["-l"],
            Self::InteractiveShell => vec!["-i"],
            Self::LoginInteractiveShell => vec!["-l", "-i"],
        }
    }
}

pub const PROBE_COMMAND: &str = "whoami && echo $HOME";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_defaults_to_login_interactive() {
        assert_eq!(ProbeMode::from_config(None), ProbeMode::LoginInteractiveShell);
    }

    #[test]
    fn unknown_value_defaults_to_login_interactive() {
        assert_eq!(ProbeMode::from_config(Some("bogus")), ProbeMode::LoginInteractiveShell);
    }

    #[test]
    fn none_has_no_flags() {
        assert!(ProbeMode::from_config(Some("none")).shell_args().is_empty());
    }

    #[test]
    fn login_interactive_has_both_flags() {
        assert_eq!(
            ProbeMode::from_config(Some("loginInteractiveShell")).shell_args(),
            vec!["-l", "-i"]
        );
    }
}
