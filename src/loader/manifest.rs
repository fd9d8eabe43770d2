/*!
Manifest-backed loader.

The manifest is a JSON object written by `carve rehash`:

```json
{
  "node_show": { "paths": ["/home/u/.carve/plugins/carve/node.yaml"], "category": "node" },
  "rehash":    { "paths": ["builtin:core"], "category": "rehash" }
}
```

Resolution only activates the sources listed for the matched key, so no
directory is scanned. The manifest can be stale: a missing key is reported as
not-found (exit 10), and an entry without `paths` is reported as malformed.
Neither case activates anything.
*/

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::loader::{SubcommandLoader, find_longest_key, positional_arguments};
use crate::plugin::{self, PluginSource};
use crate::registry::CommandRegistry;

/* ---- Data ---- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<PluginSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CommandEntry {
    /// The sources to activate, or `None` when the list is missing or empty.
    pub fn paths(&self) -> Option<&[PluginSource]> {
        self.paths.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandManifest {
    pub commands: BTreeMap<String, CommandEntry>,
}

impl CommandManifest {
    pub fn from_json(raw: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    /// Write pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::ManifestWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::ManifestWrite {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        fs::write(path, json + "\n").map_err(write_err)
    }

    /// Build a manifest by activating each of `loader`'s sources into a
    /// scratch registry and recording which keys each one registers.
    pub fn generate(loader: &dyn SubcommandLoader) -> Result<Self> {
        let mut manifest = Self::default();
        for source in loader.subcommand_files()? {
            let mut scratch = CommandRegistry::new();
            plugin::activate(&source, &mut scratch)?;
            for (key, command) in scratch.commands() {
                let entry = manifest.commands.entry(key.clone()).or_default();
                entry
                    .paths
                    .get_or_insert_with(Vec::new)
                    .push(source.clone());
                entry.category = Some(command.category().to_string());
            }
        }
        info!(commands = manifest.len(), "generated plugin manifest");
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CommandEntry)> for CommandManifest {
    fn from_iter<I: IntoIterator<Item = (K, CommandEntry)>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/* ---- Loader ---- */

#[derive(Debug, Clone)]
pub struct ManifestLoader {
    manifest: CommandManifest,
    /// Where the manifest came from, for the regeneration hint.
    manifest_path: Option<PathBuf>,
}

impl ManifestLoader {
    pub fn new(manifest: CommandManifest) -> Self {
        Self {
            manifest,
            manifest_path: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            manifest: CommandManifest::load(path)?,
            manifest_path: Some(path.to_path_buf()),
        })
    }

    pub fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    /// Manifest key for `args`, if any.
    pub fn subcommand_for_args(&self, args: &[String]) -> Option<String> {
        find_longest_key(&self.manifest.commands, &positional_arguments(args), "_")
    }
}

impl SubcommandLoader for ManifestLoader {
    fn subcommand_files(&self) -> Result<Vec<PluginSource>> {
        Ok(self
            .manifest
            .commands
            .values()
            .flat_map(|entry| entry.paths.iter().flatten().cloned())
            .collect())
    }

    fn load_command(&mut self, args: &[String], registry: &mut CommandRegistry) -> Result<()> {
        let Some(key) = self.subcommand_for_args(args) else {
            return Err(Error::SubcommandNotFound {
                args: args.join(" "),
            });
        };
        let paths = self.manifest.commands[&key]
            .paths()
            .ok_or_else(|| Error::MalformedManifestEntry {
                key: key.clone(),
                manifest: self.manifest_path.clone(),
            })?;

        debug!(%key, count = paths.len(), "activating manifest entry");
        plugin::activate_all(paths, registry)
    }
}
