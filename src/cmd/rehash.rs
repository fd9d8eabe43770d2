//! `carve rehash`: rebuild the plugin manifest from a full directory scan.
//!
//! Always scans, even when a manifest is in use, so a stale or broken
//! manifest can be replaced.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::cmd::{RunContext, command_arguments, parse_builtin_args};
use crate::error::Error;
use crate::loader::{CommandManifest, ScanningLoader};
use crate::registry::Command;

#[derive(Parser, Debug)]
#[command(
    name = "carve rehash",
    no_binary_name = true,
    about = "Regenerate the plugin manifest"
)]
pub struct RehashArgs {}

#[derive(Debug)]
pub struct RehashCommand;

impl Command for RehashCommand {
    fn name(&self) -> &str {
        "rehash"
    }

    fn summary(&self) -> &str {
        "Regenerate the plugin manifest"
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<i32> {
        if let Err(code) = parse_builtin_args::<RehashArgs>(&command_arguments(&ctx.args, self.name()))
        {
            return Ok(code);
        }
        let path = ctx
            .settings
            .manifest_path
            .clone()
            .ok_or(Error::ManifestLocation)?;

        let scanning = ScanningLoader::new(ctx.settings.locator());
        let manifest =
            CommandManifest::generate(&scanning).context("Failed to generate plugin manifest")?;
        manifest.save(&path)?;

        info!(path = %path.display(), commands = manifest.len(), "manifest written");
        println!(
            "Wrote {} command(s) to {}",
            manifest.len(),
            path.display()
        );
        Ok(0)
    }
}
