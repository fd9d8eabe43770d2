/*!
Subcommand loaders.

Public operations of a loader (`SubcommandLoader`):

  load_commands(registry)          - activate every source the loader knows
  load_command(args, registry)     - activate what is needed for `args`
  list_commands(category, registry)- category grouping, optionally filtered
  subcommand_files()               - every source the loader could activate
  command_class_from(args, registry) - the command the user asked for

Two implementations:
  scanning.rs  (ScanningLoader)  - globs plugin directories on every call
  manifest.rs  (ManifestLoader)  - reads a precomputed key -> sources index

Shared here: the token filter (`positional_arguments`) and the longest-match
resolver (`find_longest_key`).
*/

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::plugin::{self, PluginSource};
use crate::registry::{CategoryListing, Command, CommandRegistry};

pub mod locator;
pub mod manifest;
pub mod scanning;

pub use locator::PluginLocator;
pub use manifest::{CommandEntry, CommandManifest, ManifestLoader};
pub use scanning::ScanningLoader;

/* ---- Token Filter ---- */

static COMMAND_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Alphabetic}\p{Nd}][\p{Alphabetic}\p{Nd}_\-]+$")
        .expect("command word pattern is valid")
});

/// Whether `word` looks like a command word (not a flag or option value).
pub fn is_command_word(word: &str) -> bool {
    COMMAND_WORD.is_match(word)
}

/// The positional arguments from the user's argument list, in order.
pub fn positional_arguments<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(AsRef::<str>::as_ref)
        .filter(|a| is_command_word(a))
        .map(str::to_string)
        .collect()
}

/// Positional words with hyphenated words split apart, for category lookups.
pub fn category_words<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    positional_arguments(args)
        .iter()
        .flat_map(|w| w.split('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/* ---- Longest-Match Resolver ---- */

/// Anything with string keys the resolver can probe.
pub trait KeyLookup {
    fn has_key(&self, key: &str) -> bool;
}

impl<V> KeyLookup for BTreeMap<String, V> {
    fn has_key(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

/// Find the longest key in `map` made of a leading run of `words` joined by
/// `sep`. Words are dropped from the end until a key matches.
pub fn find_longest_key<M, S>(map: &M, words: &[S], sep: &str) -> Option<String>
where
    M: KeyLookup + ?Sized,
    S: AsRef<str>,
{
    let words: Vec<&str> = words.iter().map(AsRef::<str>::as_ref).collect();
    (1..=words.len())
        .rev()
        .map(|n| words[..n].join(sep))
        .find(|candidate| map.has_key(candidate))
}

/* ---- Loader trait ---- */

pub trait SubcommandLoader: std::fmt::Debug {
    /// Every source this loader would activate.
    fn subcommand_files(&self) -> Result<Vec<PluginSource>>;

    /// Activate whatever is needed to resolve `args`.
    fn load_command(&mut self, args: &[String], registry: &mut CommandRegistry) -> Result<()>;

    /// Activate every known source.
    fn load_commands(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        let sources = self.subcommand_files()?;
        debug!(count = sources.len(), "loading all subcommands");
        plugin::activate_all(&sources, registry)
    }

    /// Category grouping after a full load. An unknown or absent category
    /// yields everything.
    fn list_commands(
        &mut self,
        category: Option<&str>,
        registry: &mut CommandRegistry,
    ) -> Result<CategoryListing> {
        self.load_commands(registry)?;
        if let Some(cat) = category
            && let Some(cmds) = registry.category(cat)
        {
            return Ok(BTreeMap::from([(cat.to_string(), cmds)]));
        }
        Ok(registry.by_category())
    }

    /// Resolve `args` to a command: longest positional-word match first, then
    /// the first raw argument (hyphens as underscores) as a direct key.
    fn command_class_from(
        &mut self,
        args: &[String],
        registry: &mut CommandRegistry,
    ) -> Result<Option<Arc<dyn Command>>> {
        let words = positional_arguments(args);
        self.load_command(args, registry)?;

        if let Some(key) = find_longest_key(registry.commands(), &words, "_") {
            debug!(%key, "resolved subcommand");
            return Ok(registry.get(&key));
        }
        let fallback = args.first().map(|a| a.replace('-', "_"));
        Ok(fallback.and_then(|key| registry.get(&key)))
    }

    /// Longest category named by the positional words, if any.
    fn guess_category(&self, args: &[String], registry: &CommandRegistry) -> Option<String> {
        find_longest_key(registry.categories(), &category_words(args), " ")
    }
}

/// Word that regenerates the manifest; it must stay reachable when the
/// manifest itself cannot be read.
const REHASH_WORD: &str = "rehash";

/// Pick the loader for these settings: the manifest loader when a manifest
/// is enabled and present, the scanning loader otherwise. An unreadable
/// manifest is fatal unless `args` ask for `rehash`.
pub fn for_settings(settings: &Settings, args: &[String]) -> Result<Box<dyn SubcommandLoader>> {
    let rehash_requested =
        positional_arguments(args).first().map(String::as_str) == Some(REHASH_WORD);
    if settings.use_manifest
        && let Some(path) = settings.manifest_path.as_deref()
        && path.is_file()
    {
        match ManifestLoader::from_path(path) {
            Ok(loader) => {
                debug!(manifest = %path.display(), "using manifest loader");
                return Ok(Box::new(loader));
            }
            Err(err @ (Error::ManifestParse { .. } | Error::ManifestRead { .. }))
                if rehash_requested =>
            {
                warn!(error = %err, "ignoring unreadable manifest for rehash");
            }
            Err(err) => return Err(err),
        }
    }
    debug!("using scanning loader");
    Ok(Box::new(ScanningLoader::new(settings.locator())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::StubCommand;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    /// Loader that only knows built-in stubs handed to it up front.
    #[derive(Debug)]
    struct FixedLoader(Vec<&'static str>);

    impl SubcommandLoader for FixedLoader {
        fn subcommand_files(&self) -> Result<Vec<PluginSource>> {
            Ok(Vec::new())
        }

        fn load_commands(&mut self, registry: &mut CommandRegistry) -> Result<()> {
            for name in &self.0 {
                registry.register(StubCommand::arc(name));
            }
            Ok(())
        }

        fn load_command(&mut self, _args: &[String], registry: &mut CommandRegistry) -> Result<()> {
            self.load_commands(registry)
        }
    }

    #[test]
    fn filter_keeps_command_words_in_order() {
        let raw = args(&["node", "-V", "show", "--format=json", "web_01", "x", "-f", "a-b"]);
        assert_eq!(
            positional_arguments(&raw),
            vec!["node", "show", "web_01", "a-b"]
        );
    }

    #[test]
    fn filter_rejects_leading_symbols_and_single_chars() {
        let raw = args(&["_node", "-node", "n", "9", "99", "nöde", "a b", ""]);
        assert_eq!(positional_arguments(&raw), vec!["99", "nöde"]);
    }

    #[test]
    fn filter_is_idempotent() {
        let raw = args(&["role", "--env", "prod", "from", "file", "x.json", "-d"]);
        let once = positional_arguments(&raw);
        assert_eq!(positional_arguments(&once), once);
    }

    #[test]
    fn category_words_split_hyphens() {
        let raw = args(&["data-bag", "show", "-x"]);
        assert_eq!(category_words(&raw), vec!["data", "bag", "show"]);
    }

    #[test]
    fn longest_key_prefers_more_words() {
        let map: BTreeMap<String, ()> = ["node", "node_show"]
            .into_iter()
            .map(|k| (k.to_string(), ()))
            .collect();
        assert_eq!(
            find_longest_key(&map, &["node", "show", "web1"], "_").as_deref(),
            Some("node_show")
        );
        assert_eq!(
            find_longest_key(&map, &["node", "list"], "_").as_deref(),
            Some("node")
        );
    }

    #[test]
    fn longest_key_misses_and_empty() {
        let map: BTreeMap<String, u8> = BTreeMap::from([("cookbook site".to_string(), 1)]);
        let empty: [&str; 0] = [];
        assert_eq!(find_longest_key(&map, &empty, " "), None);
        assert_eq!(find_longest_key(&map, &["cookbook"], " "), None);
        assert_eq!(find_longest_key(&map, &["site", "cookbook"], " "), None);
        assert_eq!(
            find_longest_key(&map, &["cookbook", "site", "share"], " ").as_deref(),
            Some("cookbook site")
        );
    }

    #[test]
    fn longest_key_never_skips_a_longer_match() {
        let keys = ["a1", "a1_b2", "a1_b2_c3", "a1_b2_c3_d4"];
        let map: BTreeMap<String, ()> = keys.iter().map(|k| (k.to_string(), ())).collect();
        let words = ["a1", "b2", "c3", "d4", "e5"];
        for n in 1..=words.len() {
            let expected = keys[n.min(keys.len()) - 1];
            assert_eq!(
                find_longest_key(&map, &words[..n], "_").as_deref(),
                Some(expected)
            );
        }
    }

    #[test]
    fn command_class_prefers_two_word_key() {
        let mut loader = FixedLoader(vec!["node", "node show"]);
        let mut reg = CommandRegistry::new();
        let cmd = loader
            .command_class_from(&args(&["node", "show", "node1"]), &mut reg)
            .unwrap()
            .unwrap();
        assert_eq!(cmd.name(), "node show");
    }

    #[test]
    fn command_class_falls_back_to_first_argument() {
        let mut loader = FixedLoader(vec!["x_ray"]);
        let mut reg = CommandRegistry::new();
        let cmd = loader
            .command_class_from(&args(&["x-ray", "-v"]), &mut reg)
            .unwrap()
            .unwrap();
        assert_eq!(cmd.name(), "x_ray");
    }

    #[test]
    fn command_class_unknown_is_none() {
        let mut loader = FixedLoader(vec!["node show"]);
        let mut reg = CommandRegistry::new();
        let found = loader
            .command_class_from(&args(&["frobnicate"]), &mut reg)
            .unwrap();
        assert!(found.is_none());
        let found = loader.command_class_from(&[], &mut reg).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn guess_category_uses_space_joined_words() {
        let mut reg = CommandRegistry::new();
        reg.register(StubCommand::in_category("bag show", "data bag"));
        reg.register(StubCommand::arc("node show"));
        let loader = FixedLoader(vec![]);

        assert_eq!(
            loader.guess_category(&args(&["data-bag", "frob"]), &reg).as_deref(),
            Some("data bag")
        );
        assert_eq!(
            loader.guess_category(&args(&["node", "nope"]), &reg).as_deref(),
            Some("node")
        );
        assert_eq!(loader.guess_category(&args(&["--help"]), &reg), None);
    }

    #[test]
    fn list_commands_filters_known_category() {
        let mut loader = FixedLoader(vec!["node show", "node list", "role show"]);
        let mut reg = CommandRegistry::new();

        let only_node = loader.list_commands(Some("node"), &mut reg).unwrap();
        assert_eq!(only_node.keys().collect::<Vec<_>>(), vec!["node"]);
        assert_eq!(only_node["node"].len(), 2);

        let all = loader.list_commands(Some("nope"), &mut reg).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(loader.list_commands(None, &mut reg).unwrap().len(), 2);
    }

    fn settings_with_manifest(dir: &std::path::Path, body: &str) -> Settings {
        let path = dir.join("plugin_manifest.json");
        std::fs::write(&path, body).unwrap();
        Settings {
            config_dir: Some(dir.to_path_buf()),
            home: None,
            manifest_path: Some(path),
            use_manifest: true,
        }
    }

    #[test]
    fn corrupt_manifest_is_fatal_with_hint() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = settings_with_manifest(tmp.path(), r#"{"node_show": {"paths": "a.yaml"}}"#);

        let Err(err) = for_settings(&settings, &args(&["node", "show"])) else {
            panic!("corrupt manifest must not produce a loader");
        };
        assert!(matches!(err, Error::ManifestParse { .. }));
        let hint = err.hint().unwrap();
        assert!(hint.contains("carve --no-manifest rehash"));
        assert!(hint.contains("plugin_manifest.json"));
    }

    #[test]
    fn corrupt_manifest_still_allows_rehash() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = settings_with_manifest(tmp.path(), "{ not json");

        let mut loader = for_settings(&settings, &args(&["-v", "rehash"])).unwrap();
        let mut reg = CommandRegistry::new();
        let cmd = loader
            .command_class_from(&args(&["rehash"]), &mut reg)
            .unwrap()
            .unwrap();
        assert_eq!(cmd.name(), "rehash");
    }

    #[test]
    fn manifest_used_when_present_and_enabled() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut settings =
            settings_with_manifest(tmp.path(), r#"{"rehash": {"paths": ["builtin:core"]}}"#);

        let loader = for_settings(&settings, &[]).unwrap();
        assert_eq!(
            loader.subcommand_files().unwrap(),
            vec![PluginSource::builtin("core")]
        );

        settings.use_manifest = false;
        let loader = for_settings(&settings, &[]).unwrap();
        assert_eq!(loader.subcommand_files().unwrap()[0], PluginSource::builtin("core"));
    }
}
