//! Command executors coordinating resolution and the pipeline phases.

mod build;
mod info;
mod release;
mod upload;

use crate::cli::args::{Args, Command, CommonArgs};
use crate::cli::OutputManager;
use crate::error::Result;
use crate::registry::{default_set, CacheLayout, PackageSet, DEFAULT_BASE_URL};
use crate::resolver::{resolve, BuildOrder, PackageRequest};

/// Execute the parsed command, returning the process exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    let out = OutputManager::new(args.verbose > 0, args.quiet);

    match &args.command {
        Command::Build(build_args) => build::execute(build_args, &out).await,
        Command::Release(release_args) => release::execute(release_args, &out).await,
        Command::Upload(upload_args) => upload::execute(upload_args, &out).await,
        Command::Info(info_args) => info::execute(info_args, &out),
    }
}

/// Everything the phase executors share: the cache, the descriptor set,
/// and the resolved build order.
pub(crate) struct RunContext {
    pub cache: CacheLayout,
    pub set: PackageSet,
    pub order: BuildOrder,
}

/// Build the run context from the shared arguments.
///
/// Resolution happens before any side effect other than creating (or,
/// with `--clean`, recreating) the cache directory, so bad requests fail
/// without touching the network.
pub(crate) fn prepare(common: &CommonArgs) -> Result<RunContext> {
    let cache = CacheLayout::new(&common.workdir);
    cache.ensure(common.clean)?;

    let set = default_set(DEFAULT_BASE_URL, &cache);
    let requests = common
        .names
        .iter()
        .map(|spec| PackageRequest::parse(spec))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let order = resolve(&set, &requests, common.only_last)?;

    Ok(RunContext { cache, set, order })
}
