//! Assembly of `docker run` arguments from a resolved workspace.
//!
//! Everything here is pure: given a workspace identity, a devcontainer
//! config, and merged feature runtime properties, `build_run_args` produces
//! the exact argument vector handed to `DockerCli::run_detached`.

use crate::config::DevContainerConfig;
use crate::feature_resolver::MergedRuntimeProperties;
use crate::mount::MountSpec;
use crate::naming;
use crate::ports::PublishSpec;
use std::collections::HashMap;
use std::path::Path;

/// Everything needed to launch a container for one workspace.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub workspace_folder: String,
    pub workspace_mount: MountSpec,
    pub extra_mounts: Vec<MountSpec>,
    pub env: HashMap<String, String>,
    pub labels: Vec<(String, String)>,
    pub published_ports: Vec<PublishSpec>,
    pub user: Option<String>,
    pub run_args: Vec<String>,
    pub merged: MergedRuntimeProperties,
}

impl ContainerSpec {
    /// `launch_dir` is the directory actually bind-mounted into the
    /// container (the worktree checkout, when one is in use); `project_path`
    /// is the original workspace root that names the project. Naming and
    /// labels are derived from `project_path` so a container's identity
    /// stays stable across worktree launches of the same project; the mount
    /// source and workspace folder name follow `launch_dir`, since that's
    /// what's actually on disk.
    pub fn new(
        launch_dir: &Path,
        project_path: &Path,
        worktree_name: Option<&str>,
        image: String,
        config: &DevContainerConfig,
        merged: MergedRuntimeProperties,
        launch_command: &[String],
    ) -> Self {
        let basename = launch_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| launch_dir.display().to_string());
        let workspace_folder = config.resolved_workspace_folder(&basename);
        let workspace_mount = config
            .workspace_mount
            .as_deref()
            .and_then(|s| crate::mount::parse_mount(&serde_json::Value::String(s.to_string())).ok())
            .unwrap_or_else(|| {
                MountSpec::bind(launch_dir.display().to_string(), workspace_folder.clone(), false)
            });

        let labels = naming::build_labels(project_path, worktree_name, launch_command);

        Self {
            name: naming::container_name(project_path, worktree_name),
            image,
            workspace_folder,
            workspace_mount,
            extra_mounts: Vec::new(),
            env: HashMap::new(),
            labels,
            published_ports: Vec::new(),
            user: config.remote_user.clone().or_else(|| config.container_user.clone()),
            run_args: config.run_args.clone(),
            merged,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_published_ports(mut self, ports: Vec<PublishSpec>) -> Self {
        self.published_ports = ports;
        self
    }

    pub fn with_extra_mounts(mut self, mounts: Vec<MountSpec>) -> Self {
        self.extra_mounts = mounts;
        self
    }

    /// Produces the `docker run ...` argument vector (minus `run -d`, which
    /// `DockerCli::run_detached` prepends itself).
    pub fn build_run_args(&self) -> Vec<String> {
        let mut args = vec!["--name".to_string(), self.name.clone()];

        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }

        for (key, value) in &self.merged.container_env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        args.push("--mount".to_string());
        args.push(self.workspace_mount.to_docker_arg());
        for mount in &self.extra_mounts {
            args.push("--mount".to_string());
            args.push(mount.to_docker_arg());
        }
        for mount in &self.merged.mounts {
            args.push("--mount".to_string());
            args.push(mount.clone());
        }

        for publish in &self.published_ports {
            args.push("-p".to_string());
            args.push(publish.to_arg());
        }

        if let Some(user) = &self.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }

        if self.merged.privileged {
            args.push("--privileged".to_string());
        }
        if self.merged.init {
            args.push("--init".to_string());
        }
        for cap in &self.merged.cap_add {
            args.push("--cap-add".to_string());
            args.push(cap.clone());
        }
        for opt in &self.merged.security_opt {
            args.push("--security-opt".to_string());
            args.push(opt.clone());
        }

        args.extend(self.run_args.iter().cloned());

        args.push("-w".to_string());
        args.push(self.workspace_folder.clone());

        args.push(self.image.clone());

        if let Some(entrypoint) = self.merged.entrypoints.first() {
            args.extend(shell_words::split(entrypoint).unwrap_or_else(|_| vec![entrypoint.clone()]));
        } else {
            args.push("sleep".to_string());
            args.push("infinity".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountType;
    use std::path::PathBuf;

    fn base_spec() -> ContainerSpec {
        let config = DevContainerConfig::default();
        ContainerSpec::new(
            &PathBuf::from("/tmp/proj"),
            &PathBuf::from("/tmp/proj"),
            None,
            "ubuntu:22.04".to_string(),
            &config,
            MergedRuntimeProperties::default(),
            &["echo".to_string(), "hi".to_string()],
        )
    }

    #[test]
    fn default_command_is_sleep_infinity_when_no_entrypoints() {
        let spec = base_spec();
        let args = spec.build_run_args();
        let idx = args.iter().position(|a| a == "ubuntu:22.04").unwrap();
        assert_eq!(args[idx + 1], "sleep");
        assert_eq!(args[idx + 2], "infinity");
    }

    #[test]
    fn workspace_mount_defaults_to_bind_of_project_path() {
        let spec = base_spec();
        assert_eq!(spec.workspace_mount.mount_type, MountType::Bind);
        assert_eq!(spec.workspace_mount.target, "/workspaces/proj");
    }

    #[test]
    fn includes_identity_labels() {
        let spec = base_spec();
        let args = spec.build_run_args();
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--label" && w[1].starts_with("managed-by=packnplay")));
    }

    #[test]
    fn privileged_flag_only_set_when_merged_requires_it() {
        let mut merged = MergedRuntimeProperties::default();
        merged.privileged = true;
        let config = DevContainerConfig::default();
        let spec = ContainerSpec::new(
            &PathBuf::from("/tmp/proj"),
            &PathBuf::from("/tmp/proj"),
            None,
            "ubuntu:22.04".to_string(),
            &config,
            merged,
            &["echo".to_string(), "hi".to_string()],
        );
        assert!(spec.build_run_args().contains(&"--privileged".to_string()));
        assert!(!base_spec().build_run_args().contains(&"--privileged".to_string()));
    }
}
