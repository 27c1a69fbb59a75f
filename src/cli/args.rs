//! Command line argument parsing.
//!
//! Every option can also come from the environment, matching how the tool
//! runs in CI: `PSLMODELS_ANACONDA_CHANNEL`, `PSLMODELS_ANACONDA_LABEL`,
//! `PSLMODELS_ANACONDA_TOKEN`, `PSLMODELS_PYTHON_VERSIONS`,
//! `ANACONDA_FORCE`, and `WORKDIR`.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Manage Policy Simulation Library (PSL) packages
#[derive(Parser, Debug)]
#[command(name = "pslpkg", version, about, long_about = None)]
pub struct Args {
    /// Phase to run
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Pipeline phases exposed as subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull sources and build packages without uploading
    Build(BuildArgs),
    /// Build packages, then upload the staged artifacts
    Release(ReleaseArgs),
    /// Upload previously built artifacts
    Upload(UploadArgs),
    /// Show the resolved build order without doing anything
    Info(InfoArgs),
}

/// Options shared by every phase
#[derive(ClapArgs, Debug, Clone)]
pub struct CommonArgs {
    /// Packages to operate on (`name` or `name=tag`); empty means all
    #[arg(value_name = "NAMES")]
    pub names: Vec<String>,

    /// Restrict the run to the last package of the resolved order
    #[arg(long)]
    pub only_last: bool,

    /// Working directory holding the package cache
    #[arg(short, long, env = "WORKDIR", default_value_os_t = default_workdir())]
    pub workdir: PathBuf,

    /// Remove the package cache before starting
    #[arg(long)]
    pub clean: bool,
}

/// Options for phases that build
#[derive(ClapArgs, Debug, Clone)]
pub struct BuildOpts {
    /// Anaconda channel dependencies are drawn from
    #[arg(
        short,
        long,
        env = "PSLMODELS_ANACONDA_CHANNEL",
        default_value = "pslmodels"
    )]
    pub channel: String,

    /// Python versions to build for
    #[arg(
        long = "python",
        value_name = "VERSION",
        env = "PSLMODELS_PYTHON_VERSIONS",
        value_delimiter = ' ',
        default_values_t = vec!["2.7".to_string(), "3.6".to_string()]
    )]
    pub python_versions: Vec<String>,
}

/// Options for phases that upload
#[derive(ClapArgs, Debug, Clone)]
pub struct UploadOpts {
    /// Label the artifacts are published under
    #[arg(short, long, env = "PSLMODELS_ANACONDA_LABEL", default_value = "main")]
    pub label: String,

    /// Anaconda user or organization to upload to
    #[arg(short, long)]
    pub user: Option<String>,

    /// Replace artifacts that already exist at the destination
    #[arg(long, env = "ANACONDA_FORCE")]
    pub force: bool,

    /// API token; falls back to ~/.pslmodels_anaconda_token, then to the
    /// logged-in anaconda session
    #[arg(long, env = "PSLMODELS_ANACONDA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for `pslpkg build`
#[derive(ClapArgs, Debug)]
pub struct BuildArgs {
    /// Shared phase options
    #[command(flatten)]
    pub common: CommonArgs,
    /// Build options
    #[command(flatten)]
    pub build: BuildOpts,
}

/// Arguments for `pslpkg release`
#[derive(ClapArgs, Debug)]
pub struct ReleaseArgs {
    /// Shared phase options
    #[command(flatten)]
    pub common: CommonArgs,
    /// Build options
    #[command(flatten)]
    pub build: BuildOpts,
    /// Upload options
    #[command(flatten)]
    pub upload: UploadOpts,
}

/// Arguments for `pslpkg upload`
#[derive(ClapArgs, Debug)]
pub struct UploadArgs {
    /// Shared phase options
    #[command(flatten)]
    pub common: CommonArgs,
    /// Upload options
    #[command(flatten)]
    pub upload: UploadOpts,
}

/// Arguments for `pslpkg info`
#[derive(ClapArgs, Debug)]
pub struct InfoArgs {
    /// Shared phase options
    #[command(flatten)]
    pub common: CommonArgs,
}

fn default_workdir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmp")
        .join("pslpkg")
}

/// Resolve the upload token: an explicit value wins, otherwise the token
/// file next to the user's home directory is read if present.
pub fn resolve_token(explicit: Option<String>) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }
    let path = dirs::home_dir()?.join(".pslmodels_anaconda_token");
    match std::fs::read_to_string(&path) {
        Ok(token) => {
            let token = token.trim().to_string();
            if token.is_empty() { None } else { Some(token) }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn release_parses_names_and_options() {
        let args = Args::parse_from([
            "pslpkg",
            "release",
            "taxcalc=0.24.0",
            "btax",
            "--channel",
            "testing",
            "--only-last",
            "-v",
        ]);
        assert_eq!(args.verbose, 1);
        let Command::Release(release) = args.command else {
            panic!("expected release");
        };
        assert_eq!(release.common.names, ["taxcalc=0.24.0", "btax"]);
        assert!(release.common.only_last);
        assert_eq!(release.build.channel, "testing");
        assert_eq!(release.upload.label, "main");
    }

    #[test]
    fn explicit_token_wins_over_token_file() {
        assert_eq!(
            resolve_token(Some("secret".to_string())).as_deref(),
            Some("secret")
        );
    }
}
