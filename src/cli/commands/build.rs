//! `pslpkg build`: pull sources and build packages without uploading.

use crate::cli::args::BuildArgs;
use crate::cli::OutputManager;
use crate::conda::CondaBuild;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::process;

pub(crate) async fn execute(args: &BuildArgs, out: &OutputManager) -> Result<i32> {
    process::ensure_commands(&["git", "conda"])?;
    let ctx = super::prepare(&args.common)?;
    out.info(&format!("build order: {}", ctx.order.names.join(", ")));

    let config = PipelineConfig::for_build(
        CondaBuild::new(args.build.channel.clone()),
        args.build.python_versions.clone(),
        args.common.workdir.clone(),
    );
    let summary = Pipeline::new(&ctx.set, ctx.order, config, out)
        .run_build()
        .await?;
    Ok(if summary.has_failures() { 1 } else { 0 })
}
