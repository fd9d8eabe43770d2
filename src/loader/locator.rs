//! Plugin file discovery.
//!
//! Search roots, in order:
//!   1. `<config-dir>/plugins/carve/*.yaml`   (when a config dir is set)
//!   2. `<home>/.carve/plugins/carve/*.yaml`  (when HOME is set)
//!
//! Every match from every root is returned; nothing is deduplicated.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::config::DOT_DIR;
use crate::error::Result;

pub const PLUGIN_EXTENSION: &str = "yaml";

#[derive(Debug, Clone, Default)]
pub struct PluginLocator {
    config_dir: Option<PathBuf>,
    home: Option<PathBuf>,
}

impl PluginLocator {
    pub fn new(config_dir: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        Self { config_dir, home }
    }

    /// Directories that are scanned, in scan order.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(dir) = &self.config_dir {
            roots.push(dir.join("plugins").join("carve"));
        }
        if let Some(home) = &self.home {
            roots.push(home.join(DOT_DIR).join("plugins").join("carve"));
        }
        roots
    }

    /// Plugin files found under every search root.
    pub fn site_subcommands(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for root in self.search_roots() {
            files.extend(glob_plugins(&root)?);
        }
        debug!(count = files.len(), "located site plugin files");
        Ok(files)
    }
}

/// `root/*.yaml`, with `root` escaped so glob metacharacters in directory
/// names match literally. Hidden files (`._node.yaml`) are not plugins.
fn glob_plugins(root: &Path) -> Result<Vec<PathBuf>> {
    let Some(root_str) = root.to_str() else {
        warn!(root = %root.display(), "skipping plugin root: path is not valid UTF-8");
        return Ok(Vec::new());
    };
    let pattern = format!("{}/*.{PLUGIN_EXTENSION}", Pattern::escape(root_str));
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut found = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        match entry {
            Ok(path) if path.is_file() => found.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable plugin path"),
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn plugin_dir(base: &Path) -> PathBuf {
        let dir = base.join("plugins").join("carve");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn nothing_configured_is_empty_not_error() {
        let locator = PluginLocator::new(None, None);
        assert!(locator.search_roots().is_empty());
        assert!(locator.site_subcommands().unwrap().is_empty());
    }

    #[test]
    fn missing_directories_contribute_nothing() {
        let tmp = TempDir::new().unwrap();
        let locator = PluginLocator::new(
            Some(tmp.path().join("no-config")),
            Some(tmp.path().join("no-home")),
        );
        assert_eq!(locator.search_roots().len(), 2);
        assert!(locator.site_subcommands().unwrap().is_empty());
    }

    #[test]
    fn collects_config_then_home_matches() {
        let config = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let cfg_plugins = plugin_dir(config.path());
        let home_plugins = plugin_dir(&home.path().join(".carve"));

        fs::write(cfg_plugins.join("node.yaml"), "commands: []").unwrap();
        fs::write(cfg_plugins.join("README.md"), "not a plugin").unwrap();
        fs::write(home_plugins.join("role.yaml"), "commands: []").unwrap();
        fs::write(home_plugins.join("node.yaml"), "commands: []").unwrap();

        let locator = PluginLocator::new(
            Some(config.path().to_path_buf()),
            Some(home.path().to_path_buf()),
        );
        let files = locator.site_subcommands().unwrap();
        assert_eq!(
            files,
            vec![
                cfg_plugins.join("node.yaml"),
                home_plugins.join("node.yaml"),
                home_plugins.join("role.yaml"),
            ]
        );
    }

    #[test]
    fn glob_metacharacters_in_root_are_literal() {
        let tmp = TempDir::new().unwrap();
        let odd = tmp.path().join("conf[1]?*");
        let plugins = plugin_dir(&odd);
        fs::write(plugins.join("node.yaml"), "commands: []").unwrap();

        // A sibling that the unescaped pattern `conf[1]?*` would match.
        let decoy = plugin_dir(&tmp.path().join("conf1xx"));
        fs::write(decoy.join("decoy.yaml"), "commands: []").unwrap();

        let locator = PluginLocator::new(Some(odd), None);
        assert_eq!(
            locator.site_subcommands().unwrap(),
            vec![plugins.join("node.yaml")]
        );
    }

    #[test]
    fn hidden_files_are_skipped() {
        let config = TempDir::new().unwrap();
        let plugins = plugin_dir(config.path());
        fs::write(plugins.join("node.yaml"), "commands: []").unwrap();
        fs::write(plugins.join("._node.yaml"), [0u8, 5, 22, 7, 0xff]).unwrap();
        fs::write(plugins.join(".hidden.yaml"), "commands: []").unwrap();

        let locator = PluginLocator::new(Some(config.path().to_path_buf()), None);
        assert_eq!(
            locator.site_subcommands().unwrap(),
            vec![plugins.join("node.yaml")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_root_contributes_nothing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new(OsStr::from_bytes(b"/tmp/carve-\xff-root"));
        let locator = PluginLocator::new(Some(root.to_path_buf()), None);
        assert!(locator.site_subcommands().unwrap().is_empty());
    }
}
