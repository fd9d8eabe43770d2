/*!
Command registry.

Holds every command activated so far, keyed two ways:
  - canonical key (`node_show`) -> implementation
  - category (`node`)           -> keys in that category

The registry is created empty by `main` and only grows. Activation code
(`plugin::activate`, `cmd::register_builtins`) is the only writer; loaders
read it through `commands()` / `categories()`.
*/

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::cmd::RunContext;

/// A runnable command. Implementations register themselves when the plugin
/// source that declares them is activated.
pub trait Command: fmt::Debug + Send + Sync {
    /// Space separated command words, e.g. `node show`.
    fn name(&self) -> &str;

    /// Grouping label for listings; the first command word unless overridden.
    fn category(&self) -> &str {
        self.name().split_whitespace().next().unwrap_or_default()
    }

    /// One-line description shown in listings.
    fn summary(&self) -> &str {
        ""
    }

    /// Run the command, returning the process exit status.
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<i32>;
}

/// Canonical registry key for a command name (`node show` -> `node_show`).
pub fn command_key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Category name -> commands, in key order.
pub type CategoryListing = BTreeMap<String, Vec<Arc<dyn Command>>>;

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
    by_category: BTreeMap<String, BTreeSet<String>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any previous command with the same key.
    /// Returns the replaced command.
    pub(crate) fn register(&mut self, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        let key = command_key(command.name());
        let category = command.category().to_string();
        let previous = self.commands.insert(key.clone(), command);

        if let Some(prev) = &previous
            && prev.category() != category
            && let Some(keys) = self.by_category.get_mut(prev.category())
        {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_category.remove(prev.category());
            }
        }
        self.by_category.entry(category).or_default().insert(key);
        previous
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Key -> implementation map, for key lookups.
    pub fn commands(&self) -> &BTreeMap<String, Arc<dyn Command>> {
        &self.commands
    }

    /// Category -> keys map, for category lookups.
    pub fn categories(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.by_category
    }

    /// Commands of a single category, if the category is known.
    pub fn category(&self, name: &str) -> Option<Vec<Arc<dyn Command>>> {
        let keys = self.by_category.get(name)?;
        Some(keys.iter().filter_map(|k| self.get(k)).collect())
    }

    /// Full category grouping.
    pub fn by_category(&self) -> CategoryListing {
        self.by_category
            .iter()
            .map(|(cat, keys)| {
                let cmds = keys.iter().filter_map(|k| self.get(k)).collect();
                (cat.clone(), cmds)
            })
            .collect()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("by_category", &self.by_category)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Inert command used across the crate's unit tests.
    #[derive(Debug)]
    pub(crate) struct StubCommand {
        pub name: String,
        pub category: Option<String>,
    }

    impl StubCommand {
        pub(crate) fn arc(name: &str) -> Arc<dyn Command> {
            Arc::new(StubCommand {
                name: name.to_string(),
                category: None,
            })
        }

        pub(crate) fn in_category(name: &str, category: &str) -> Arc<dyn Command> {
            Arc::new(StubCommand {
                name: name.to_string(),
                category: Some(category.to_string()),
            })
        }
    }

    impl Command for StubCommand {
        fn name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> &str {
            match &self.category {
                Some(c) => c,
                None => self.name.split_whitespace().next().unwrap_or_default(),
            }
        }

        fn run(&self, _ctx: &mut RunContext<'_>) -> anyhow::Result<i32> {
            Ok(0)
        }
    }

    #[test]
    fn key_joins_words_with_underscore() {
        assert_eq!(command_key("node show"), "node_show");
        assert_eq!(command_key("  data  bag   list "), "data_bag_list");
        assert_eq!(command_key("rehash"), "rehash");
    }

    #[test]
    fn register_groups_by_first_word() {
        let mut reg = CommandRegistry::new();
        reg.register(StubCommand::arc("node show"));
        reg.register(StubCommand::arc("node list"));
        reg.register(StubCommand::arc("rehash"));

        assert_eq!(reg.len(), 3);
        let node: Vec<_> = reg
            .category("node")
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(node, vec!["node list", "node show"]);
        assert!(reg.category("cookbook").is_none());
    }

    #[test]
    fn reregistration_overwrites_last_wins() {
        let mut reg = CommandRegistry::new();
        assert!(reg.register(StubCommand::arc("node show")).is_none());
        let prev = reg.register(StubCommand::in_category("node show", "nodes"));
        assert!(prev.is_some());

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("node_show").unwrap().category(), "nodes");
        assert!(
            !reg.categories().contains_key("node"),
            "emptied category is dropped"
        );
        assert_eq!(reg.by_category()["nodes"].len(), 1);
    }
}
