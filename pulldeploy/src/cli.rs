//! All the clap stuff for parsing/documenting the CLI.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Clone, Debug)]
#[clap(version)]
#[clap(bin_name = "pulldeploy")]
/// Pull-based release distribution: manage repositories and run the agent.
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Directory containing `pulldeploy.yaml` and the `pulldeploy.d/` app
    /// config directory.
    #[clap(long, default_value = "/etc/pulldeploy")]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub config_dir: Utf8PathBuf,

    /// Logging verbosity.
    #[clap(long, default_value = "info")]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub verbose: String,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create a new, empty repository index for an application.
    InitRepo(AppArgs),
    /// Add one or more environments to an application.
    AddEnv(EnvNamesArgs),
    /// Remove one or more environments from an application.
    RmEnv(EnvNamesArgs),
    /// Set an environment's version retention floor.
    Set(SetArgs),
    /// Upload a new artifact and add it to the version catalog.
    Upload(UploadArgs),
    /// Mark a version as eligible for activation.
    Enable(VersionArgs),
    /// Mark a version as ineligible for activation.
    Disable(VersionArgs),
    /// Remove a version everywhere it is not in use.
    Purge(VersionArgs),
    /// Mark a version as deployed to an environment.
    Deploy(DeployArgs),
    /// Activate a deployed version, generally or as a preview.
    Release(ReleaseArgs),
    /// Print the configured applications.
    List,
    /// Print a summary of an application's index.
    Status(AppArgs),
    /// Print the host registry for an application in an environment.
    ListHosts(EnvArgs),
    /// Run the agent reconciler for an environment.
    Daemon(DaemonArgs),
}

#[derive(clap::Args, Clone, Debug)]
pub struct AppArgs {
    #[clap(long)]
    pub app: String,
}

#[derive(clap::Args, Clone, Debug)]
pub struct EnvNamesArgs {
    #[clap(long)]
    pub app: String,
    /// One or more environment names.
    #[clap(required = true)]
    pub envs: Vec<String>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct SetArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub env: String,
    /// Minimum number of versions to retain (at least 2).
    #[clap(long)]
    pub keep: u32,
}

#[derive(clap::Args, Clone, Debug)]
pub struct UploadArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub version: String,
    /// Path to the artifact file to upload.
    pub file: Utf8PathBuf,
    /// Upload disabled (not yet eligible for activation).
    #[clap(long)]
    pub disabled: bool,
}

#[derive(clap::Args, Clone, Debug)]
pub struct VersionArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub version: String,
}

#[derive(clap::Args, Clone, Debug)]
pub struct DeployArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub version: String,
    #[clap(long)]
    pub env: String,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ReleaseArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub version: String,
    #[clap(long)]
    pub env: String,
    /// Hosts that should preview this version instead of everyone
    /// receiving it generally.
    pub previewers: Vec<String>,
}

#[derive(clap::Args, Clone, Debug)]
pub struct EnvArgs {
    #[clap(long)]
    pub app: String,
    #[clap(long)]
    pub env: String,
}

#[derive(clap::Args, Clone, Debug)]
pub struct DaemonArgs {
    #[clap(long)]
    pub env: String,
    /// Path to redirect daemon logs to (default: stderr).
    #[clap(long)]
    pub logfile: Option<Utf8PathBuf>,
}
