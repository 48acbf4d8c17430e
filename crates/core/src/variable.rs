//! Variable substitution engine.
//!
//! Resolves `${...}` placeholders in devcontainer config strings against a
//! context built from workspace paths and the host environment. Supports
//! `${localWorkspaceFolder}`, `${localWorkspaceFolderBasename}`,
//! `${containerWorkspaceFolder}`, `${containerWorkspaceFolderBasename}`,
//! `${localEnv:NAME[:default]}`, and `${containerEnv:NAME}`.
//!
//! Substitution is a single, non-recursive pass: expansion products are
//! never re-scanned for further `${...}` tokens. Malformed tokens (an
//! unclosed `${`) are left verbatim, which falls out naturally since the
//! token regex requires a closing brace.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());
static FLAT_TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The context substitution is resolved against.
#[derive(Debug, Clone)]
pub struct SubstitutionContext {
    pub local_workspace_folder: PathBuf,
    pub container_workspace_folder: PathBuf,
    pub local_env: HashMap<String, String>,
    pub container_env: HashMap<String, String>,
}

impl SubstitutionContext {
    pub fn new(local_workspace_folder: PathBuf, container_workspace_folder: PathBuf) -> Self {
        Self {
            local_workspace_folder,
            container_workspace_folder,
            local_env: std::env::vars().collect(),
            container_env: HashMap::new(),
        }
    }

    /// Merges previously-resolved values (e.g. a substituted `containerEnv`
    /// map) into the `containerEnv:NAME` lookup table, for the second pass
    /// over `remoteEnv` described in the config loader.
    pub fn with_container_env(mut self, container_env: HashMap<String, String>) -> Self {
        self.container_env = container_env;
        self
    }

    fn resolve(&self, token: &str) -> String {
        match token {
            "localWorkspaceFolder" => self.local_workspace_folder.display().to_string(),
            "localWorkspaceFolderBasename" => basename(&self.local_workspace_folder),
            "containerWorkspaceFolder" => self.container_workspace_folder.display().to_string(),
            "containerWorkspaceFolderBasename" => basename(&self.container_workspace_folder),
            other if other.starts_with("localEnv:") => {
                let rest = &other["localEnv:".len()..];
                let (name, default) = match rest.split_once(':') {
                    Some((n, d)) => (n, Some(d)),
                    None => (rest, None),
                };
                self.local_env
                    .get(name)
                    .cloned()
                    .or_else(|| default.map(str::to_string))
                    .unwrap_or_default()
            }
            other if other.starts_with("containerEnv:") => {
                let name = &other["containerEnv:".len()..];
                self.container_env.get(name).cloned().unwrap_or_default()
            }
            _ => String::new(),
        }
    }
}

/// Substitutes every recognized `${...}` token in `input` in a single,
/// non-recursive pass. Unrecognized token names expand to the empty string,
/// matching `${localEnv:...}`'s undefined-variable behavior.
pub fn substitute(input: &str, ctx: &SubstitutionContext) -> String {
    TOKEN_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            ctx.resolve(caps[1].trim())
        })
        .into_owned()
}

/// Substitutes every value in a string map, preserving keys and order.
pub fn substitute_map(
    input: &HashMap<String, String>,
    ctx: &SubstitutionContext,
) -> HashMap<String, String> {
    input
        .iter()
        .map(|(k, v)| (k.clone(), substitute(v, ctx)))
        .collect()
}

/// A separate, flat `${NAME}` pass used by env-profile expansion: profile
/// values reference bare host environment variable names (e.g.
/// `ANTHROPIC_AUTH_TOKEN=${Z_AI_API_KEY}`) rather than the richer devcontainer
/// token vocabulary. Undefined names expand to the empty string.
pub fn substitute_flat_env(input: &str, env: &HashMap<String, String>) -> String {
    FLAT_TOKEN_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}
