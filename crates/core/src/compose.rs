//! Compose adapter: the alternate launch path when the devcontainer config
//! names one or more compose files and a target service.
//!
//! When this path is taken the image manager and feature resolver are
//! bypassed entirely; the compose stack is assumed to already build
//! whatever the service needs.

use crate::docker::DockerCli;
use crate::errors::{PacknplayError, Result};
use tracing::instrument;

/// Brings the compose stack up in the worktree directory and resolves the
/// target service's container id.
#[instrument(skip(docker))]
pub async fn up(
    docker: &DockerCli,
    compose_files: &[String],
    project: &str,
    service: &str,
    run_services: &[String],
) -> Result<String> {
    if compose_files.is_empty() {
        return Err(PacknplayError::compose("no compose files configured"));
    }
    docker.compose_up(compose_files, project, run_services).await?;
    docker.compose_ps_q(compose_files, project, service).await
}

pub async fn down(docker: &DockerCli, compose_files: &[String], project: &str) -> Result<()> {
    docker.compose_down(compose_files, project).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeKind;

    #[tokio::test]
    async fn up_rejects_empty_compose_file_list() {
        let docker = DockerCli::new(RuntimeKind::Docker);
        let result = up(&docker, &[], "proj", "app", &[]).await;
        assert!(result.is_err());
    }
}
