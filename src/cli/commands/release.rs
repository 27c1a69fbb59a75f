//! `pslpkg release`: build packages, then upload the staged artifacts.

use crate::cli::args::{resolve_token, ReleaseArgs};
use crate::cli::OutputManager;
use crate::conda::{Anaconda, CondaBuild};
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::process;

pub(crate) async fn execute(args: &ReleaseArgs, out: &OutputManager) -> Result<i32> {
    process::ensure_commands(&["git", "conda", "anaconda"])?;
    let ctx = super::prepare(&args.common)?;
    out.info(&format!("release order: {}", ctx.order.names.join(", ")));

    let anaconda = Anaconda::new(
        resolve_token(args.upload.token.clone()),
        args.upload.label.clone(),
        args.upload.user.clone(),
        args.upload.force,
    );
    let config = PipelineConfig::for_release(
        CondaBuild::new(args.build.channel.clone()),
        args.build.python_versions.clone(),
        anaconda,
        args.common.workdir.clone(),
    );
    let summary = Pipeline::new(&ctx.set, ctx.order, config, out)
        .run_release()
        .await?;
    Ok(if summary.has_failures() { 1 } else { 0 })
}
