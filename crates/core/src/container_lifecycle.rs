//! Runs normalized lifecycle commands inside a running container, in
//! order, honoring `waitFor` as a gating point.
//!
//! Stages after `waitFor` are fatal on failure; stages before it (and,
//! when `waitFor` is unset, all stages) are non-fatal warnings that don't
//! stop the pipeline.

use crate::docker::{DockerCli, ExecConfig};
use crate::errors::{PacknplayError, Result};
use crate::lifecycle::{LifecyclePhase, NormalizedCommand};
use tracing::{instrument, warn};

pub const ORDERED_PHASES: [LifecyclePhase; 4] = [
    LifecyclePhase::OnCreate,
    LifecyclePhase::UpdateContent,
    LifecyclePhase::PostCreate,
    LifecyclePhase::PostStart,
];

fn wait_for_phase(wait_for: Option<&str>) -> Option<LifecyclePhase> {
    match wait_for {
        Some("onCreateCommand") => Some(LifecyclePhase::OnCreate),
        Some("updateContentCommand") => Some(LifecyclePhase::UpdateContent),
        Some("postCreateCommand") => Some(LifecyclePhase::PostCreate),
        Some("postStartCommand") => Some(LifecyclePhase::PostStart),
        _ => None,
    }
}

/// Runs `onCreate` through `postStart`, in order, inside `container_id` as
/// `user`. A phase at or before the `waitFor` gate is fatal on failure;
/// everything after it degrades to a warning.
#[instrument(skip(docker, commands_by_phase))]
pub async fn run_create_phases(
    docker: &DockerCli,
    container_id: &str,
    user: Option<&str>,
    wait_for: Option<&str>,
    commands_by_phase: &dyn Fn(LifecyclePhase) -> Vec<NormalizedCommand>,
) -> Result<()> {
    let gate = wait_for_phase(wait_for);
    let mut past_gate = gate.is_none();

    for phase in ORDERED_PHASES {
        let fatal = !past_gate;
        for command in commands_by_phase(phase) {
            run_one(docker, container_id, user, phase, &command, fatal).await?;
        }
        if gate == Some(phase) {
            past_gate = true;
        }
    }
    Ok(())
}

/// Runs `postAttach`, always non-fatal: it fires right before handing
/// control to the user's interactive command, too late to usefully abort.
pub async fn run_post_attach(
    docker: &DockerCli,
    container_id: &str,
    user: Option<&str>,
    commands: &[NormalizedCommand],
) -> Result<()> {
    for command in commands {
        run_one(docker, container_id, user, LifecyclePhase::PostAttach, command, false).await?;
    }
    Ok(())
}

async fn run_one(
    docker: &DockerCli,
    container_id: &str,
    user: Option<&str>,
    phase: LifecyclePhase,
    command: &NormalizedCommand,
    fatal: bool,
) -> Result<()> {
    let config = ExecConfig {
        user: user.map(str::to_string),
        ..Default::default()
    };
    let result = docker
        .exec(container_id, &["sh".to_string(), "-c".to_string(), command.shell_command.clone()], config)
        .await?;

    if !result.success() {
        let message = format!(
            "{} command failed (exit {}): {}",
            phase.as_str(),
            result.exit_code,
            command.shell_command
        );
        if fatal {
            return Err(PacknplayError::Lifecycle(message));
        }
        warn!(phase = phase.as_str(), "{message}");
    }
    Ok(())
}

/// Runs `initialize`, which executes on the host before container
/// creation, so it shells out locally rather than via `docker exec`.
pub async fn run_initialize(commands: &[NormalizedCommand]) -> Result<()> {
    for command in commands {
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command.shell_command)
            .status()
            .await
            .map_err(|e| PacknplayError::Lifecycle(format!("spawning initialize command: {e}")))?;
        if !status.success() {
            warn!(
                "initialize command failed (exit {:?}): {}",
                status.code(),
                command.shell_command
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_maps_known_phase_names() {
        assert_eq!(wait_for_phase(Some("postCreateCommand")), Some(LifecyclePhase::PostCreate));
        assert_eq!(wait_for_phase(None), None);
        assert_eq!(wait_for_phase(Some("bogus")), None);
    }

    #[test]
    fn ordered_phases_excludes_initialize_and_post_attach() {
        assert!(!ORDERED_PHASES.contains(&LifecyclePhase::Initialize));
        assert!(!ORDERED_PHASES.contains(&LifecyclePhase::PostAttach));
        assert_eq!(ORDERED_PHASES[0], LifecyclePhase::OnCreate);
        assert_eq!(ORDERED_PHASES[3], LifecyclePhase::PostStart);
    }
}
