//! The `refresh-container` subcommand: pulls the configured default image.

use crate::cli::RefreshContainerArgs;
use anyhow::{Context, Result};
use packnplay_core::docker::DockerCli;
use packnplay_core::errors::PacknplayError;
use packnplay_core::pconfig;
use packnplay_core::runtime;

pub async fn execute(_args: RefreshContainerArgs) -> Result<i32> {
    let config = pconfig::load_default()?.typed;
    let image = config
        .default_image()
        .ok_or_else(|| PacknplayError::runtime("no default image configured; set defaultContainer.image"))?;

    let runtime_kind = config
        .container_runtime
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| runtime::detect_runtime(None));
    let docker = DockerCli::new(runtime_kind);

    docker.pull(image).await.with_context(|| format!("pulling {image}"))?;
    println!("pulled {image}");
    Ok(0)
}
