//! `pslpkg upload`: publish previously built artifacts.

use crate::cli::args::{resolve_token, UploadArgs};
use crate::cli::OutputManager;
use crate::conda::Anaconda;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::process;

pub(crate) async fn execute(args: &UploadArgs, out: &OutputManager) -> Result<i32> {
    process::ensure_commands(&["anaconda"])?;
    let ctx = super::prepare(&args.common)?;
    out.info(&format!("uploading: {}", ctx.order.names.join(", ")));

    let anaconda = Anaconda::new(
        resolve_token(args.upload.token.clone()),
        args.upload.label.clone(),
        args.upload.user.clone(),
        args.upload.force,
    );
    let config = PipelineConfig::for_upload(anaconda, args.common.workdir.clone());
    let summary = Pipeline::new(&ctx.set, ctx.order, config, out)
        .run_upload()
        .await?;
    Ok(if summary.has_failures() { 1 } else { 0 })
}
