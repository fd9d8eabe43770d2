/*!
Plugin activation.

A plugin source is either a YAML file found by the locator or a built-in
bundle linked into the binary. Activating a source registers every command
it declares into the `CommandRegistry`; nothing else about the source is
inspected by the loaders.

Plugin file shape:

```yaml
commands:
  - name: node show
    category: node          # optional, defaults to the first word
    summary: Show a node    # optional
    exec: "knife-node show --format json"
```
*/

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command as Process;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cmd::{self, RunContext};
use crate::error::{Error, Result};
use crate::loader::is_command_word;
use crate::registry::{Command, CommandRegistry};

const BUILTIN_PREFIX: &str = "builtin:";

/* ---- Sources ---- */

/// Something that can be activated. Serialized as a plain path, or as
/// `builtin:<bundle>` for commands compiled into the binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PluginSource {
    Builtin(String),
    File(PathBuf),
}

impl PluginSource {
    pub fn builtin(name: &str) -> Self {
        PluginSource::Builtin(name.to_string())
    }
}

impl From<String> for PluginSource {
    fn from(raw: String) -> Self {
        match raw.strip_prefix(BUILTIN_PREFIX) {
            Some(name) => PluginSource::Builtin(name.to_string()),
            None => PluginSource::File(PathBuf::from(raw)),
        }
    }
}

impl From<&str> for PluginSource {
    fn from(raw: &str) -> Self {
        PluginSource::from(raw.to_string())
    }
}

impl From<PathBuf> for PluginSource {
    fn from(path: PathBuf) -> Self {
        PluginSource::File(path)
    }
}

impl From<PluginSource> for String {
    fn from(source: PluginSource) -> Self {
        source.to_string()
    }
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSource::Builtin(name) => write!(f, "{BUILTIN_PREFIX}{name}"),
            PluginSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/* ---- Activation ---- */

/// Activate one source, registering its commands. Failures abort the caller's
/// resolution; nothing is skipped.
pub fn activate(source: &PluginSource, registry: &mut CommandRegistry) -> Result<()> {
    debug!(%source, "activating plugin source");
    match source {
        PluginSource::Builtin(name) => cmd::register_builtins(name, registry),
        PluginSource::File(path) => activate_file(path, source, registry),
    }
}

/// Activate each source in order.
pub fn activate_all<'a>(
    sources: impl IntoIterator<Item = &'a PluginSource>,
    registry: &mut CommandRegistry,
) -> Result<()> {
    for source in sources {
        activate(source, registry)?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PluginFile {
    #[serde(default)]
    commands: Vec<CommandDecl>,
}

#[derive(Debug, Deserialize)]
struct CommandDecl {
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    exec: String,
}

fn activate_file(path: &Path, origin: &PluginSource, registry: &mut CommandRegistry) -> Result<()> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::PluginRead {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PluginFile = serde_yaml::from_str(&raw).map_err(|source| Error::PluginParse {
        path: path.to_path_buf(),
        source,
    })?;

    for decl in file.commands {
        let command = ExternalCommand::from_decl(decl, origin)?;
        trace!(name = %command.name, %origin, "registering plugin command");
        registry.register(Arc::new(command));
    }
    Ok(())
}

/* ---- External commands ---- */

/// A command declared by a plugin file and backed by an external program.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    name: String,
    category: String,
    summary: String,
    program: String,
    program_args: Vec<String>,
    origin: PluginSource,
}

impl ExternalCommand {
    fn from_decl(decl: CommandDecl, origin: &PluginSource) -> Result<Self> {
        let words: Vec<&str> = decl.name.split_whitespace().collect();
        if words.is_empty() || !words.iter().all(|w| is_command_word(w)) {
            return Err(Error::InvalidCommandName {
                name: decl.name,
                origin: origin.clone(),
            });
        }
        let name = words.join(" ");

        let mut parts = shell_words::split(&decl.exec).map_err(|source| Error::ExecSyntax {
            name: name.clone(),
            origin: origin.clone(),
            source,
        })?;
        if parts.is_empty() || parts[0].is_empty() {
            return Err(Error::EmptyExec {
                name,
                origin: origin.clone(),
            });
        }
        let program = parts.remove(0);

        let category = decl
            .category
            .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| words[0].to_string());

        Ok(Self {
            name,
            category,
            summary: decl.summary.unwrap_or_default(),
            program,
            program_args: parts,
            origin: origin.clone(),
        })
    }

    #[cfg(test)]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub fn program_args(&self) -> &[String] {
        &self.program_args
    }
}

impl Command for ExternalCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<i32> {
        let user_args = cmd::command_arguments(&ctx.args, &self.name);
        debug!(program = %self.program, ?user_args, "spawning plugin command");
        let status = Process::new(&self.program)
            .args(&self.program_args)
            .args(&user_args)
            .status()
            .with_context(|| {
                format!(
                    "Failed to run '{}' for command '{}' (declared in {})",
                    self.program, self.name, self.origin
                )
            })?;
        // Killed by a signal: no code, report generic failure.
        Ok(status.code().unwrap_or(1))
    }
}
