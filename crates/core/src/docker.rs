//! CLI-based container runtime client.
//!
//! Shells out to `docker`/`podman` rather than speaking the daemon socket
//! protocol directly, matching whichever runtime the user already has
//! configured (credential helpers, contexts, rootless setups) without this
//! crate needing to reimplement any of that.

use crate::errors::{DockerError, Result};
use crate::progress::ProgressTracker;
use crate::runtime::RuntimeKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub env: HashMap<String, String>,
    pub tty: bool,
    pub interactive: bool,
}

#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: i32,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Labels", default)]
    pub labels: String,
}

impl ContainerInfo {
    pub fn label_map(&self) -> HashMap<String, String> {
        self.labels
            .split(',')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

pub struct ImageInfo {
    pub id: String,
}

/// A container runtime client bound to a single `RuntimeKind`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    kind: RuntimeKind,
}

impl DockerCli {
    pub fn new(kind: RuntimeKind) -> Self {
        Self { kind }
    }

    pub fn runtime_name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// The binary to invoke, honoring the legacy `DOCKER_CMD` override
    /// (e.g. a path to a non-PATH docker shim) ahead of the runtime kind's
    /// own default.
    fn binary(&self) -> String {
        std::env::var("DOCKER_CMD").unwrap_or_else(|_| self.kind.binary().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.binary());
        cmd.args(self.kind.context_args());
        cmd
    }

    async fn run_capturing_stdout<S: AsRef<str> + std::fmt::Debug>(&self, args: &[S]) -> Result<String> {
        debug!(runtime = self.kind.as_str(), args = ?args, "running container runtime command");
        let output = self
            .command()
            .args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DockerError::NotFound {
                runtime: format!("{}: {e}", self.kind.binary()),
            })?;
        if !output.status.success() {
            let joined = args.iter().map(AsRef::as_ref).collect::<Vec<&str>>().join(" ");
            return Err(DockerError::CliError(format!(
                "{} {joined}: {}",
                self.kind.binary(),
                String::from_utf8_lossy(&output.stderr)
            ))
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        self.run_capturing_stdout(&["version", "--format", "{{.Server.Version}}"])
            .await?;
        Ok(())
    }

    /// Lists containers, optionally filtered by a `key=value` label selector.
    pub async fn list_containers(&self, label_selector: Option<&str>) -> Result<Vec<ContainerInfo>> {
        let mut args: Vec<String> = vec!["ps".into(), "--all".into(), "--format".into(), "json".into()];
        if let Some(selector) = label_selector {
            args.push("--filter".into());
            args.push(format!("label={selector}"));
        }
        let stdout = self.run_capturing_stdout(&args).await?;
        parse_json_lines(&stdout)
    }

    pub async fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>> {
        match self.run_capturing_stdout(&["inspect".to_string(), id.to_string()]).await {
            Ok(stdout) => {
                let mut list: Vec<ContainerInfo> = serde_json::from_str(&stdout)
                    .map_err(|e| DockerError::CliError(format!("parsing inspect output: {e}")))?;
                Ok(list.pop())
            }
            Err(_) => Ok(None),
        }
    }

    pub async fn inspect_image(&self, image_ref: &str) -> Result<Option<ImageInfo>> {
        match self
            .run_capturing_stdout(&["image", "inspect", image_ref, "--format", "{{.Id}}"])
            .await
        {
            Ok(stdout) => Ok(Some(ImageInfo {
                id: stdout.trim().to_string(),
            })),
            Err(_) => Ok(None),
        }
    }

    pub async fn pull(&self, image_ref: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("pull").arg(image_ref);
        self.run_streaming_progress(cmd).await
    }

    /// Builds an image from a context directory, streaming build output
    /// through the progress tracker rather than capturing it whole (build
    /// logs can be large and are meant for a human watching as they go).
    #[instrument(skip(self, labels, build_args))]
    pub async fn build(
        &self,
        context_dir: &std::path::Path,
        dockerfile: &std::path::Path,
        tag: &str,
        labels: &HashMap<String, String>,
        build_args: &HashMap<String, String>,
    ) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("build")
            .arg("-f")
            .arg(dockerfile)
            .arg("-t")
            .arg(tag);
        for (key, value) in labels {
            cmd.arg("--label").arg(format!("{key}={value}"));
        }
        for (key, value) in build_args {
            cmd.arg("--build-arg").arg(format!("{key}={value}"));
        }
        cmd.arg(context_dir);
        self.run_streaming_progress(cmd).await
    }

    /// Runs `cmd` with stdout/stderr piped, feeding each line through a
    /// [`ProgressTracker`] and emitting a throttled status event, rather
    /// than letting a fast-scrolling build/pull log hit the terminal
    /// unbuffered or buffering it all in memory until exit.
    async fn run_streaming_progress(&self, mut cmd: Command) -> Result<()> {
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| DockerError::NotFound {
            runtime: format!("{}: {e}", self.kind.binary()),
        })?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut tracker = ProgressTracker::new();

        loop {
            tokio::select! {
                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => emit_progress(&mut tracker, &line),
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                line = stderr_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => emit_progress(&mut tracker, &line),
                        Ok(None) => {}
                        Err(_) => {}
                    }
                }
            }
        }
        // Drain whichever stream still has buffered lines after the other closed.
        while let Ok(Some(line)) = stdout_lines.next_line().await {
            emit_progress(&mut tracker, &line);
        }
        while let Ok(Some(line)) = stderr_lines.next_line().await {
            emit_progress(&mut tracker, &line);
        }

        let status = child.wait().await.map_err(|e| DockerError::NotFound {
            runtime: format!("{}: {e}", self.kind.binary()),
        })?;
        if !status.success() {
            return Err(DockerError::ExecFailed {
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    /// Runs a new detached container and returns its id.
    pub async fn run_detached(&self, run_args: &[String]) -> Result<String> {
        let mut cmd = self.command();
        cmd.arg("run").arg("-d").args(run_args);
        cmd.stdin(Stdio::null());
        let output = cmd.output().await.map_err(|e| DockerError::NotFound {
            runtime: format!("{}: {e}", self.kind.binary()),
        })?;
        if !output.status.success() {
            return Err(DockerError::CliError(String::from_utf8_lossy(&output.stderr).into_owned()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs the full `run` argv (typically `["run", "--rm", image, ...]`)
    /// and captures stdout, for short-lived probe invocations rather than
    /// the long-running container started by `run_detached`.
    pub async fn run_probe(&self, args: &[String]) -> Result<String> {
        self.run_capturing_stdout(args).await
    }

    pub async fn start(&self, container_id: &str) -> Result<()> {
        self.run_capturing_stdout(&["start", container_id]).await?;
        Ok(())
    }

    #[instrument(skip(self, command))]
    pub async fn exec(
        &self,
        container_id: &str,
        command: &[String],
        config: ExecConfig,
    ) -> Result<ExecResult> {
        let mut cmd = self.command();
        cmd.arg("exec");
        if config.interactive {
            cmd.arg("-i");
        }
        if config.tty {
            cmd.arg("-t");
        }
        if let Some(user) = &config.user {
            cmd.arg("-u").arg(user);
        }
        if let Some(dir) = &config.working_dir {
            cmd.arg("-w").arg(dir);
        }
        for (key, value) in &config.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(container_id).args(command);
        if config.interactive || config.tty {
            cmd.stdin(Stdio::inherit());
        }
        let status = cmd
            .status()
            .await
            .map_err(|e| DockerError::NotFound {
                runtime: format!("{}: {e}", self.kind.binary()),
            })?;
        Ok(ExecResult {
            exit_code: status.code().unwrap_or(-1),
        })
    }

    pub async fn stop_container(&self, container_id: &str, timeout: Option<u32>) -> Result<()> {
        let mut args = vec!["stop".to_string()];
        if let Some(t) = timeout {
            args.push("-t".to_string());
            args.push(t.to_string());
        }
        args.push(container_id.to_string());
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_capturing_stdout(&args_ref).await?;
        Ok(())
    }

    pub async fn rm_container(&self, container_id: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(container_id);
        match self.run_capturing_stdout(&args).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(container_id, error = %e, "removing container failed");
                Err(e)
            }
        }
    }

    pub async fn compose_up(&self, compose_files: &[String], project: &str, services: &[String]) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("compose");
        for file in compose_files {
            cmd.arg("-f").arg(file);
        }
        cmd.arg("-p").arg(project).arg("up").arg("-d");
        cmd.args(services);
        cmd.stdin(Stdio::null());
        let status = cmd.status().await.map_err(|e| DockerError::NotFound {
            runtime: format!("{}: {e}", self.kind.binary()),
        })?;
        if !status.success() {
            return Err(DockerError::ExecFailed {
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    pub async fn compose_down(&self, compose_files: &[String], project: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("compose");
        for file in compose_files {
            cmd.arg("-f").arg(file);
        }
        cmd.arg("-p").arg(project).arg("down").arg("-v");
        cmd.stdin(Stdio::null());
        let status = cmd.status().await.map_err(|e| DockerError::NotFound {
            runtime: format!("{}: {e}", self.kind.binary()),
        })?;
        if !status.success() {
            return Err(DockerError::ExecFailed {
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    /// Resolves the container id for a compose service via `compose ps -q`.
    pub async fn compose_ps_q(&self, compose_files: &[String], project: &str, service: &str) -> Result<String> {
        let mut args = vec!["compose".to_string()];
        for file in compose_files {
            args.push("-f".to_string());
            args.push(file.clone());
        }
        args.push("-p".to_string());
        args.push(project.to_string());
        args.push("ps".to_string());
        args.push("-q".to_string());
        args.push(service.to_string());
        let stdout = self.run_capturing_stdout(&args).await?;
        let id = stdout.trim().to_string();
        if id.is_empty() {
            return Err(DockerError::ContainerNotFound {
                name: service.to_string(),
            }
            .into());
        }
        Ok(id)
    }
}

/// `docker ps --format json` emits one JSON object per line, not a JSON
/// array; podman's `--format json` emits a single array. Handle both.
fn parse_json_lines(stdout: &str) -> Result<Vec<ContainerInfo>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| DockerError::CliError(format!("parsing ps output: {e}")).into());
    }
    trimmed
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| DockerError::CliError(format!("parsing ps output: {e}")).into())
        })
        .collect()
}

fn emit_progress(tracker: &mut ProgressTracker, line: &str) {
    if let Some(update) = tracker.feed(line) {
        match update.percent {
            Some(percent) => info!(percent, status = %update.status, "build/pull progress"),
            None => info!(status = %update.status, "build/pull progress"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_style_ndjson() {
        let stdout = r#"{"ID":"abc123","Names":"foo","Image":"ubuntu","State":"running","Status":"Up 2 minutes","Labels":"a=1,b=2"}
{"ID":"def456","Names":"bar","Image":"alpine","State":"exited","Status":"Exited","Labels":""}"#;
        let containers = parse_json_lines(stdout).unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "abc123");
        assert_eq!(containers[0].label_map().get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn parses_podman_style_array() {
        let stdout = r#"[{"ID":"abc123","Names":"foo","Image":"ubuntu","State":"running","Status":"Up","Labels":""}]"#;
        let containers = parse_json_lines(stdout).unwrap();
        assert_eq!(containers.len(), 1);
    }

    #[test]
    fn empty_output_is_empty_list() {
        assert!(parse_json_lines("").unwrap().is_empty());
        assert!(parse_json_lines("   \n").unwrap().is_empty());
    }

    #[test]
    fn exec_result_success_reflects_exit_code() {
        assert!(ExecResult { exit_code: 0 }.success());
        assert!(!ExecResult { exit_code: 1 }.success());
    }
}
