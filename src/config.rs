//! Runtime settings: CLI flags layered over the process environment.
//!
//! Precedence for the config directory: `--config-dir` > `CARVE_CONFIG_DIR`.
//! The manifest lives at `--manifest` or `$HOME/.carve/plugin_manifest.json`.
//! Empty environment values count as unset.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use tracing::warn;

use crate::loader::PluginLocator;

pub const CONFIG_DIR_ENV: &str = "CARVE_CONFIG_DIR";
pub const HOME_ENV: &str = "HOME";
/// Per-user directory under `$HOME`.
pub const DOT_DIR: &str = ".carve";
pub const MANIFEST_FILE: &str = "plugin_manifest.json";

/// Snapshot of the environment variables the loader cares about.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Keep UTF-8 variables. A non-UTF-8 value for a variable we read is
    /// dropped with a warning.
    pub fn from_os_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        vars.into_iter()
            .filter_map(|(k, v)| {
                let key = k.into_string().ok()?;
                match v.into_string() {
                    Ok(value) => Some((key, value)),
                    Err(raw) => {
                        if [HOME_ENV, CONFIG_DIR_ENV].contains(&key.as_str()) {
                            warn!(var = %key, value = ?raw, "ignoring non-UTF-8 environment value");
                        }
                        None
                    }
                }
            })
            .collect()
    }

    /// Non-empty value of `key`.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn home(&self) -> Option<PathBuf> {
        self.var(HOME_ENV).map(PathBuf::from)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub no_manifest: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config_dir: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub use_manifest: bool,
}

impl Settings {
    pub fn resolve(overrides: Overrides, env: &Environment) -> Self {
        let config_dir = overrides
            .config_dir
            .or_else(|| env.var(CONFIG_DIR_ENV).map(PathBuf::from));
        let home = env.home();
        let manifest_path = overrides
            .manifest
            .or_else(|| home.as_ref().map(|h| h.join(DOT_DIR).join(MANIFEST_FILE)));

        Self {
            config_dir,
            home,
            manifest_path,
            use_manifest: !overrides.no_manifest,
        }
    }

    pub fn locator(&self) -> PluginLocator {
        PluginLocator::new(self.config_dir.clone(), self.home.clone())
    }
}
