//! The `run` subcommand: the launch orchestrator.
//!
//! Resolves workspace identity, the devcontainer config, features, and the
//! image; reconnects to or creates the container; runs lifecycle commands
//! at the right phases; execs the user's command; and propagates its exit
//! status as the process exit code.

use crate::cli::{CredentialArgs, RunArgs};
use crate::commands::{ensure_daemon_running, load_packnplay_config, resolve_project_path, resolve_worktree_name};
use anyhow::{Context, Result};
use packnplay_core::config::DevContainerConfig;
use packnplay_core::container::ContainerSpec;
use packnplay_core::container_lifecycle;
use packnplay_core::credentials::{self, CredentialCategory};
use packnplay_core::docker::{DockerCli, ExecConfig};
use packnplay_core::errors::PacknplayError;
use packnplay_core::feature_resolver;
use packnplay_core::host_requirements;
use packnplay_core::image;
use packnplay_core::lifecycle::{self, LifecyclePhase, NormalizedCommand};
use packnplay_core::naming;
use packnplay_core::pconfig::{DefaultCredentials, PacknplayConfig};
use packnplay_core::ports::{self, PublishSpec};
use packnplay_core::runtime::{self, RuntimeKind};
use packnplay_core::state;
use packnplay_core::updatecheck;
use packnplay_core::variable::SubstitutionContext;
use packnplay_core::workspace;
use packnplay_core::{compose, config as devcontainer_config};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::Path;
use tracing::{info, warn};

pub async fn execute(args: RunArgs) -> Result<i32> {
    ensure_daemon_running()?;

    let project_path = resolve_project_path(&args.workspace)?;
    let worktree_name = resolve_worktree_name(&args.workspace);
    let state_dir = state::state_dir();
    let cache_dir = state::cache_dir();

    let packnplay_config = load_packnplay_config()?;
    let runtime_kind = resolve_runtime_kind(&args, &packnplay_config)?;
    let docker = DockerCli::new(runtime_kind);

    let launch_dir = workspace::ensure_worktree(&state_dir, &project_path, worktree_name.as_deref().unwrap_or(""))
        .await
        .context("preparing workspace")?;

    let resolved_config = match devcontainer_config::discover_config(&launch_dir) {
        Some(path) => devcontainer_config::load_from_path(&path)?.typed,
        None => {
            let default_image = packnplay_config.default_image().ok_or_else(|| {
                PacknplayError::runtime("no devcontainer config found and no default image configured")
            })?;
            devcontainer_config::synthesize_default(default_image)
        }
    };

    let container_name = naming::container_name(&project_path, worktree_name.as_deref());
    let launch_basename = launch_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let workspace_folder = resolved_config.resolved_workspace_folder(&launch_basename);

    let ctx = SubstitutionContext::new(launch_dir.clone(), std::path::PathBuf::from(&workspace_folder));
    let env = build_env(&resolved_config, &ctx, &packnplay_config, args.config_profile.as_deref(), &args.env);
    let published_ports = build_published_ports(&resolved_config, &args.publish)?;
    let categories = resolved_credential_categories(&args.credentials, &packnplay_config.default_credentials);

    let (container_id, exec_user) = if resolved_config.uses_compose() {
        run_compose_phase(&docker, &resolved_config, &launch_dir, &container_name).await?
    } else {
        run_direct_phase(
            &docker,
            &resolved_config,
            &launch_dir,
            &project_path,
            worktree_name.as_deref(),
            &container_name,
            &args,
            &state_dir,
            &cache_dir,
            env,
            published_ports,
            &categories,
            &packnplay_config,
        )
        .await?
    };

    if let Some(commands) = attach_commands(&resolved_config) {
        container_lifecycle::run_post_attach(&docker, &container_id, exec_user.as_deref(), &commands).await?;
    }

    let tty = std::io::stdin().is_terminal();
    let exec_config = ExecConfig {
        user: exec_user,
        working_dir: Some(workspace_folder),
        env: HashMap::new(),
        tty,
        interactive: true,
    };
    let result = docker.exec(&container_id, &args.command, exec_config).await?;
    Ok(result.exit_code)
}

fn resolve_runtime_kind(args: &RunArgs, config: &PacknplayConfig) -> Result<RuntimeKind> {
    if let Some(raw) = &args.runtime {
        return Ok(raw.parse::<RuntimeKind>()?);
    }
    if let Some(raw) = &config.container_runtime {
        if let Ok(kind) = raw.parse::<RuntimeKind>() {
            return Ok(kind);
        }
        warn!(value = raw.as_str(), "ignoring unrecognized configured container runtime");
    }
    Ok(runtime::detect_runtime(None))
}

/// Brings up the compose stack (idempotent) and resolves the target
/// service's container id. Bypasses the image manager and feature resolver
/// entirely per the compose adapter's contract, but still runs lifecycle
/// commands against the resolved service container.
async fn run_compose_phase(
    docker: &DockerCli,
    config: &DevContainerConfig,
    launch_dir: &Path,
    project_name: &str,
) -> Result<(String, Option<String>)> {
    let compose_files: Vec<String> = config
        .compose_files()
        .iter()
        .map(|f| launch_dir.join(f).display().to_string())
        .collect();
    let service = config
        .service
        .clone()
        .ok_or_else(|| PacknplayError::compose("dockerComposeFile set without a target 'service'"))?;

    run_initialize_phase(config).await?;

    let container_id = compose::up(docker, &compose_files, project_name, &service, &config.run_services).await?;

    let user = config.remote_user.clone().or_else(|| config.container_user.clone());
    run_create_phases(docker, config, &container_id, user.as_deref()).await?;

    Ok((container_id, user))
}

#[allow(clippy::too_many_arguments)]
async fn run_direct_phase(
    docker: &DockerCli,
    config: &DevContainerConfig,
    launch_dir: &Path,
    project_path: &Path,
    worktree_name: Option<&str>,
    container_name: &str,
    args: &RunArgs,
    state_dir: &Path,
    cache_dir: &Path,
    env: HashMap<String, String>,
    published_ports: Vec<PublishSpec>,
    categories: &[CredentialCategory],
    packnplay_config: &PacknplayConfig,
) -> Result<(String, Option<String>)> {
    if let Some(requirements) = &config.host_requirements {
        host_requirements::evaluate(requirements, host_requirements::detected_cpus(), host_requirements::detected_memory_bytes());
    }

    let existing = docker.inspect_container(container_name).await?;
    if let Some(info) = &existing {
        if info.state == "running" {
            if !args.reconnect {
                return Err(PacknplayError::runtime(format!(
                    "container {container_name} is already running; pass --reconnect to attach to it"
                ))
                .into());
            }
            info!(container = container_name, "reconnecting to running container");
            let user = config.remote_user.clone().or_else(|| config.container_user.clone());
            return Ok((info.id.clone(), user));
        }
        info!(container = container_name, "removing stopped container before recreating");
        docker.rm_container(&info.id, true).await?;
    }

    run_initialize_phase(config).await?;

    let lockfile = packnplay_core::lockfile::load(launch_dir).context("loading devcontainer lockfile")?;
    let (features, merged) = feature_resolver::resolve_features(&config.features, cache_dir, lockfile.as_ref())
        .await
        .context("resolving devcontainer features")?;
    let image_ref = image::ensure_image(docker, config, &features, &merged, launch_dir, project_path, cache_dir)
        .await
        .context("materializing devcontainer image")?;

    maybe_check_for_image_updates(docker, packnplay_config, state_dir).await;

    let user_detection =
        packnplay_core::user_detect::detect_user(docker, cache_dir, &image_ref, config.remote_user.as_deref(), config.user_env_probe.as_deref())
            .await;
    let credential_plan = credentials::plan_mounts(state_dir, &user_detection.home_dir, categories);

    let mut env = env;
    for (key, value) in credential_plan.env {
        packnplay_core::redaction::add_global_secret(&value);
        env.insert(key, value);
    }

    let spec = ContainerSpec::new(launch_dir, project_path, worktree_name, image_ref, config, merged, &args.command)
        .with_env(env)
        .with_published_ports(published_ports)
        .with_extra_mounts(credential_plan.mounts);

    let container_id = docker.run_detached(&spec.build_run_args()).await?;

    let exec_user = config.remote_user.clone().or(config.container_user.clone()).or(Some(user_detection.user));
    run_create_phases(docker, config, &container_id, exec_user.as_deref()).await?;

    Ok((container_id, exec_user))
}

/// Background maintenance, never fatal to a launch: if the user has opted
/// into update checks on the configured default image, looks up its
/// current registry digest at most once per the configured frequency and
/// optionally pulls it down when it has moved.
async fn maybe_check_for_image_updates(docker: &DockerCli, packnplay_config: &PacknplayConfig, state_dir: &Path) {
    let Some(default_container) = &packnplay_config.default_container else { return };
    if !default_container.check_for_updates.unwrap_or(false) {
        return;
    }
    let Some(image) = packnplay_config.default_image() else { return };
    let frequency_secs = default_container.check_frequency_hours.unwrap_or(24) * 60 * 60;

    match updatecheck::check_for_update(state_dir, image, frequency_secs).await {
        Ok(Some(notification)) => {
            info!(image = %notification.image, digest = %notification.digest, "newer default image digest available");
            if default_container.auto_pull_updates.unwrap_or(false) {
                if let Err(e) = docker.pull(&notification.image).await {
                    warn!(image = %notification.image, error = %e, "auto-pull of updated default image failed");
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "update check failed"),
    }
}

async fn run_initialize_phase(config: &DevContainerConfig) -> Result<()> {
    let commands = lifecycle::normalize(config.initialize_command.as_ref());
    container_lifecycle::run_initialize(&commands).await?;
    Ok(())
}

async fn run_create_phases(
    docker: &DockerCli,
    config: &DevContainerConfig,
    container_id: &str,
    user: Option<&str>,
) -> Result<()> {
    let phase_commands = |phase: LifecyclePhase| -> Vec<NormalizedCommand> {
        let value = match phase {
            LifecyclePhase::OnCreate => config.on_create_command.as_ref(),
            LifecyclePhase::UpdateContent => config.update_content_command.as_ref(),
            LifecyclePhase::PostCreate => config.post_create_command.as_ref(),
            LifecyclePhase::PostStart => config.post_start_command.as_ref(),
            _ => None,
        };
        lifecycle::normalize(value)
    };
    container_lifecycle::run_create_phases(docker, container_id, user, config.wait_for.as_deref(), &phase_commands)
        .await?;
    Ok(())
}

fn attach_commands(config: &DevContainerConfig) -> Option<Vec<NormalizedCommand>> {
    let commands = lifecycle::normalize(config.post_attach_command.as_ref());
    if commands.is_empty() {
        None
    } else {
        Some(commands)
    }
}

/// Merges environment sources in increasing precedence: devcontainer
/// `containerEnv`/`remoteEnv`, then default-forwarded host vars, then the
/// selected named profile, then explicit `--env` flags.
fn build_env(
    config: &DevContainerConfig,
    ctx: &SubstitutionContext,
    packnplay_config: &PacknplayConfig,
    profile: Option<&str>,
    cli_env: &[String],
) -> HashMap<String, String> {
    let (container_env, remote_env) = config.resolve_environment(ctx);
    let mut env = container_env;
    env.extend(remote_env);

    let host_env: HashMap<String, String> = std::env::vars().collect();
    for name in &packnplay_config.default_env_vars {
        if let Some(value) = host_env.get(name) {
            env.insert(name.clone(), value.clone());
        }
    }

    if let Some(profile_name) = profile {
        match packnplay_config.env_configs.get(profile_name) {
            Some(profile_config) => {
                for (key, value) in &profile_config.env_vars {
                    env.insert(key.clone(), packnplay_core::variable::substitute_flat_env(value, &host_env));
                }
            }
            None => warn!(profile = profile_name, "named environment profile not found in config"),
        }
    }

    for pair in cli_env {
        if let Some((key, value)) = pair.split_once('=') {
            env.insert(key.to_string(), value.to_string());
        }
    }

    env
}

fn build_published_ports(config: &DevContainerConfig, cli_ports: &[String]) -> Result<Vec<PublishSpec>> {
    let mut published = Vec::new();
    for raw in &config.forward_ports {
        published.push(ports::from_forward_port(raw)?);
    }
    published.extend(ports::parse_all(cli_ports)?);
    Ok(published)
}

fn resolved_credential_categories(args: &CredentialArgs, defaults: &DefaultCredentials) -> Vec<CredentialCategory> {
    if args.all_creds {
        return CredentialCategory::all().to_vec();
    }
    let mut explicit = Vec::new();
    if args.git_creds {
        explicit.push(CredentialCategory::Git);
    }
    if args.ssh_creds {
        explicit.push(CredentialCategory::Ssh);
    }
    if args.gh_creds {
        explicit.push(CredentialCategory::Gh);
    }
    if args.gpg_creds {
        explicit.push(CredentialCategory::Gpg);
    }
    if args.npm_creds {
        explicit.push(CredentialCategory::Npm);
    }
    if args.aws_creds {
        explicit.push(CredentialCategory::Aws);
    }
    if !explicit.is_empty() {
        return explicit;
    }
    defaults.enabled_categories()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_creds_overrides_individual_flags_and_defaults() {
        let args = CredentialArgs {
            git_creds: false,
            ssh_creds: false,
            gh_creds: false,
            gpg_creds: false,
            npm_creds: false,
            aws_creds: false,
            all_creds: true,
        };
        let categories = resolved_credential_categories(&args, &DefaultCredentials::default());
        assert_eq!(categories.len(), 6);
    }

    #[test]
    fn explicit_flags_override_config_defaults() {
        let args = CredentialArgs {
            git_creds: true,
            ssh_creds: false,
            gh_creds: false,
            gpg_creds: false,
            npm_creds: false,
            aws_creds: false,
            all_creds: false,
        };
        let defaults = DefaultCredentials { aws: true, ..Default::default() };
        let categories = resolved_credential_categories(&args, &defaults);
        assert_eq!(categories, vec![CredentialCategory::Git]);
    }

    #[test]
    fn falls_back_to_config_defaults_when_no_flags_set() {
        let args = CredentialArgs {
            git_creds: false,
            ssh_creds: false,
            gh_creds: false,
            gpg_creds: false,
            npm_creds: false,
            aws_creds: false,
            all_creds: false,
        };
        let defaults = DefaultCredentials { ssh: true, gh: true, ..Default::default() };
        let categories = resolved_credential_categories(&args, &defaults);
        assert_eq!(categories, vec![CredentialCategory::Ssh, CredentialCategory::Gh]);
    }

    #[test]
    fn published_ports_merge_config_then_cli() {
        let config = DevContainerConfig {
            forward_ports: vec![serde_json::json!(3000)],
            ..Default::default()
        };
        let published = build_published_ports(&config, &["8080:8080".to_string()]).unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].container_port, "3000");
        assert_eq!(published[1].to_arg(), "8080:8080");
    }

    #[test]
    fn cli_env_takes_precedence_over_profile_and_defaults() {
        let config = DevContainerConfig::default();
        let ctx = SubstitutionContext::new(std::path::PathBuf::from("/tmp/proj"), std::path::PathBuf::from("/workspaces/proj"));
        let mut packnplay_config = PacknplayConfig::default();
        packnplay_config
            .env_configs
            .insert("zai".to_string(), packnplay_core::pconfig::EnvProfile {
                name: None,
                description: None,
                env_vars: [("TOKEN".to_string(), "from-profile".to_string())].into_iter().collect(),
            });
        let env = build_env(&config, &ctx, &packnplay_config, Some("zai"), &["TOKEN=from-cli".to_string()]);
        assert_eq!(env.get("TOKEN").map(String::as_str), Some("from-cli"));
    }
}
