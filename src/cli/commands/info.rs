//! `pslpkg info`: show the resolved build order without doing anything.

use crate::cli::args::InfoArgs;
use crate::cli::OutputManager;
use crate::error::Result;

pub(crate) fn execute(args: &InfoArgs, out: &OutputManager) -> Result<i32> {
    let ctx = super::prepare(&args.common)?;

    out.section("Build order");
    for (position, name) in ctx.order.names.iter().enumerate() {
        let Some(package) = ctx.set.get(name) else {
            continue;
        };
        out.println(&format!("{}. {name}", position + 1));
        out.indent(&format!("repository: {}", package.repository().url()));
        if !package.dependencies().is_empty() {
            out.indent(&format!(
                "depends on: {}",
                package.dependencies().join(", ")
            ));
        }
        match ctx.order.pins.get(name) {
            Some(pin) => out.indent(&format!("tag: {pin} (pinned)")),
            None => out.indent("tag: latest at pull time"),
        }
    }
    out.println("");
    out.info(&format!("cache: {}", ctx.cache.root().display()));
    Ok(0)
}
