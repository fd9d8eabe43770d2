/*!
Built-in commands.

These are linked into the binary and activated as the `builtin:core` plugin
source, so they resolve and list exactly like plugin-file commands and can be
named in the manifest.

  rehash.rs  (`carve rehash`)       - regenerate the plugin manifest
  list.rs    (`carve plugin list`)  - show commands grouped by category
  format.rs                         - table / color helpers for human output

Conventions:
  - Each built-in parses its own arguments with a `clap::Parser` struct
    (`no_binary_name`), fed by `command_arguments`.
  - `run` returns the process exit status.
*/

use std::sync::Arc;

use clap::Parser;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::loader::SubcommandLoader;
use crate::loader::scanning::CORE_BUNDLE;
use crate::registry::CommandRegistry;

pub mod format;
pub mod list;
pub mod rehash;

pub use list::PluginListCommand;
pub use rehash::RehashCommand;

/// Everything a running command may need from the composition root.
pub struct RunContext<'a> {
    pub settings: &'a Settings,
    pub loader: &'a mut dyn SubcommandLoader,
    pub registry: &'a mut CommandRegistry,
    /// The full argument vector, command words included.
    pub args: Vec<String>,
}

/// Register the commands of built-in bundle `bundle`.
pub fn register_builtins(bundle: &str, registry: &mut CommandRegistry) -> Result<()> {
    match bundle {
        CORE_BUNDLE => {
            registry.register(Arc::new(RehashCommand));
            registry.register(Arc::new(PluginListCommand));
            Ok(())
        }
        other => Err(Error::UnknownBuiltin(other.to_string())),
    }
}

/// `args` with the command's own words removed (first occurrence of each, in
/// order). Hyphens and underscores compare equal.
pub fn command_arguments(args: &[String], name: &str) -> Vec<String> {
    let mut words = name.split_whitespace().map(normalize).peekable();
    args.iter()
        .filter(|arg| {
            if words.peek() == Some(&normalize(arg)) {
                words.next();
                false
            } else {
                true
            }
        })
        .cloned()
        .collect()
}

fn normalize(word: &str) -> String {
    word.replace('-', "_")
}

/// Parse a built-in's arguments. `Err` carries the exit status after clap has
/// printed help or a usage error.
pub(crate) fn parse_builtin_args<T: Parser>(args: &[String]) -> std::result::Result<T, i32> {
    T::try_parse_from(args).map_err(|e| {
        let code = e.exit_code();
        let _ = e.print();
        code
    })
}
