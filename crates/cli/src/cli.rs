use crate::commands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Launches developer command-line agents inside ephemeral devcontainer workspaces"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch a command inside a devcontainer workspace, creating it if needed.
    Run(RunArgs),
    /// Attach an interactive shell to an existing workspace container.
    Attach(AttachArgs),
    /// Enumerate managed containers.
    List(ListArgs),
    /// Pull the configured default image.
    RefreshContainer(RefreshContainerArgs),
    /// Interactive configuration editor.
    Configure(ConfigureArgs),
    /// Credential sync daemon entry point.
    WatchCredentials,
}

#[derive(clap::Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Project directory. Defaults to the current directory.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Git branch to materialize as a worktree and launch from.
    #[arg(long)]
    pub worktree: Option<String>,

    /// Launch directly against `--path` even if a worktree name is configured.
    #[arg(long, conflicts_with = "worktree")]
    pub no_worktree: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CredentialArgs {
    #[arg(long = "git-creds")]
    pub git_creds: bool,
    #[arg(long = "ssh-creds")]
    pub ssh_creds: bool,
    #[arg(long = "gh-creds")]
    pub gh_creds: bool,
    #[arg(long = "gpg-creds")]
    pub gpg_creds: bool,
    #[arg(long = "npm-creds")]
    pub npm_creds: bool,
    #[arg(long = "aws-creds")]
    pub aws_creds: bool,
    #[arg(long = "all-creds")]
    pub all_creds: bool,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Environment variable to set in the container, `KEY=VALUE`, repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Publish a container port to the host, repeatable.
    #[arg(short = 'p', long = "publish", value_name = "HOSTIP?:HOST:CONTAINER[/proto]")]
    pub publish: Vec<String>,

    /// Container runtime to use.
    #[arg(long)]
    pub runtime: Option<String>,

    /// Named environment profile from the persisted config.
    #[arg(long = "config")]
    pub config_profile: Option<String>,

    /// Attach to an already-running matching container instead of failing.
    #[arg(long)]
    pub reconnect: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Raise the default log filter to debug.
    #[arg(long)]
    pub verbose: bool,

    /// The command to run inside the container and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[arg(long)]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub struct RefreshContainerArgs {
    #[arg(long)]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub struct ConfigureArgs {
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// True when `--verbose` was passed to whichever subcommand is active,
    /// used to pick the logging init level before any other work happens.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Commands::Run(args) => args.verbose,
            Commands::Attach(args) => args.verbose,
            Commands::List(args) => args.verbose,
            Commands::RefreshContainer(args) => args.verbose,
            Commands::Configure(args) => args.verbose,
            Commands::WatchCredentials => false,
        }
    }

    pub async fn dispatch(self) -> anyhow::Result<i32> {
        match self.command {
            Commands::Run(args) => commands::run::execute(args).await,
            Commands::Attach(args) => commands::attach::execute(args).await,
            Commands::List(args) => commands::list::execute(args).await,
            Commands::RefreshContainer(args) => commands::refresh_container::execute(args).await,
            Commands::Configure(args) => commands::configure::execute(args),
            Commands::WatchCredentials => commands::watch_credentials::execute(),
        }
    }
}
