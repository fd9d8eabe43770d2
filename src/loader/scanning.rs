//! Loader that scans the plugin directories on every load.
//!
//! Built-in commands are activated first so site plugins can override them.
//! There is no "already loaded" guard: each call re-activates everything and
//! the registry's overwrite-by-key keeps the result stable.

use tracing::debug;

use crate::error::Result;
use crate::loader::{PluginLocator, SubcommandLoader};
use crate::plugin::PluginSource;
use crate::registry::CommandRegistry;

/// Built-in bundle activated ahead of site plugins.
pub const CORE_BUNDLE: &str = "core";

#[derive(Debug, Clone)]
pub struct ScanningLoader {
    locator: PluginLocator,
}

impl ScanningLoader {
    pub fn new(locator: PluginLocator) -> Self {
        Self { locator }
    }
}

impl SubcommandLoader for ScanningLoader {
    fn subcommand_files(&self) -> Result<Vec<PluginSource>> {
        let mut sources = vec![PluginSource::builtin(CORE_BUNDLE)];
        sources.extend(
            self.locator
                .site_subcommands()?
                .into_iter()
                .map(PluginSource::File),
        );
        Ok(sources)
    }

    /// Always a full load; the requested words do not narrow the scan.
    fn load_command(&mut self, args: &[String], registry: &mut CommandRegistry) -> Result<()> {
        debug!(?args, "scanning loader: full load for command");
        self.load_commands(registry)
    }
}
