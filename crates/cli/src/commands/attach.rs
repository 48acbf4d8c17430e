//! The `attach` subcommand: opens an interactive shell in an already
//! running workspace container, without touching the launch pipeline.

use crate::cli::AttachArgs;
use crate::commands::{resolve_project_path, resolve_worktree_name};
use anyhow::{Context, Result};
use packnplay_core::docker::{DockerCli, ExecConfig};
use packnplay_core::errors::PacknplayError;
use packnplay_core::naming;
use packnplay_core::pconfig;
use packnplay_core::runtime;
use std::io::IsTerminal;

pub async fn execute(args: AttachArgs) -> Result<i32> {
    let project_path = resolve_project_path(&args.workspace)?;
    let worktree_name = resolve_worktree_name(&args.workspace);
    let container_name = naming::container_name(&project_path, worktree_name.as_deref());

    let config = pconfig::load_default()?.typed;
    let runtime_kind = config
        .container_runtime
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| runtime::detect_runtime(None));
    let docker = DockerCli::new(runtime_kind);

    let info = docker
        .inspect_container(&container_name)
        .await?
        .ok_or_else(|| PacknplayError::runtime(format!("no workspace container named {container_name} found")))?;
    if info.state != "running" {
        return Err(PacknplayError::runtime(format!(
            "container {container_name} is not running (state: {}); use 'run' to (re)launch it",
            info.state
        ))
        .into());
    }

    let tty = std::io::stdin().is_terminal();
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let exec_config = ExecConfig {
        user: None,
        working_dir: None,
        env: Default::default(),
        tty,
        interactive: true,
    };
    let result = docker
        .exec(&info.id, &[shell], exec_config)
        .await
        .context("attaching to workspace container")?;
    Ok(result.exit_code)
}
