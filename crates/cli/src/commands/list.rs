//! The `list` subcommand: enumerates containers managed by packnplay.

use crate::cli::ListArgs;
use anyhow::Result;
use packnplay_core::naming;
use packnplay_core::pconfig;
use packnplay_core::runtime;
use packnplay_core::docker::DockerCli;

pub async fn execute(args: ListArgs) -> Result<i32> {
    let config = pconfig::load_default()?.typed;
    let runtime_kind = config
        .container_runtime
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| runtime::detect_runtime(None));
    let docker = DockerCli::new(runtime_kind);

    let containers = docker.list_containers(Some(&naming::label_selector())).await?;
    if containers.is_empty() {
        println!("no packnplay-managed containers found");
        return Ok(0);
    }

    for container in &containers {
        let labels = container.label_map();
        let project = labels.get(naming::LABEL_PROJECT).map(String::as_str).unwrap_or("?");
        let worktree = labels.get(naming::LABEL_WORKTREE).map(String::as_str).unwrap_or("");
        if args.verbose {
            println!(
                "{}\t{}\tproject={project}\tworktree={worktree}\timage={}\tstate={}\tstatus={}",
                container.names, container.id, container.image, container.state, container.status
            );
        } else {
            println!("{}\t{project}\t{worktree}\t{}", container.names, container.state);
        }
    }
    Ok(0)
}
