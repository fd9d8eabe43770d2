/*!
`list.rs`

Implements `carve plugin list [CATEGORY...] [--json]`.

Loads every command through the active loader and prints the category
grouping. An unknown category prints everything and is reported in JSON as
`"category": null`.

JSON Output Shape:
{
  "status": "ok",
  "category": "node" | null,
  "count": 3,
  "categories": {
    "node": [ { "name": "node show", "summary": "..." } ]
  }
}
*/

use anyhow::{Context, Result};
use clap::Parser;

use crate::cmd::format::{Role, StyleOptions, color, table};
use crate::cmd::{RunContext, command_arguments, parse_builtin_args};
use crate::registry::{CategoryListing, Command};

#[derive(Parser, Debug)]
#[command(
    name = "carve plugin list",
    no_binary_name = true,
    about = "List available commands by category"
)]
pub struct ListArgs {
    /// Only show this category (words are joined with spaces)
    #[arg(value_name = "CATEGORY")]
    pub category: Vec<String>,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug)]
pub struct PluginListCommand;

impl Command for PluginListCommand {
    fn name(&self) -> &str {
        "plugin list"
    }

    fn summary(&self) -> &str {
        "List available commands by category"
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<i32> {
        let args = match parse_builtin_args::<ListArgs>(&command_arguments(&ctx.args, self.name()))
        {
            Ok(a) => a,
            Err(code) => return Ok(code),
        };
        let category = (!args.category.is_empty()).then(|| args.category.join(" "));

        let listing = ctx
            .loader
            .list_commands(category.as_deref(), ctx.registry)
            .context("Failed to load commands")?;

        if args.json {
            println!("{}", listing_json(&listing, category.as_deref()));
        } else {
            println!("{}", render_listing(&listing, &StyleOptions::detect()));
        }
        Ok(0)
    }
}

/// Human-readable listing, one block per category.
pub fn render_listing(listing: &CategoryListing, style: &StyleOptions) -> String {
    let mut out = vec![color(
        Role::Dim,
        "Available subcommands: (for details, carve SUB-COMMAND --help)",
        style,
    )];
    if listing.is_empty() {
        out.push("(none)".to_string());
    }
    for (category, commands) in listing {
        out.push(String::new());
        out.push(color(
            Role::Primary,
            format!("** {} COMMANDS **", category.to_uppercase()),
            style,
        ));
        let rows: Vec<Vec<String>> = commands
            .iter()
            .map(|c| vec![format!("carve {}", c.name()), c.summary().to_string()])
            .collect();
        out.push(table(&["COMMAND", "SUMMARY"], &rows, style));
    }
    out.join("\n")
}

/// JSON listing. `requested` is echoed back only when the filter applied.
pub fn listing_json(listing: &CategoryListing, requested: Option<&str>) -> serde_json::Value {
    let category = requested.filter(|c| listing.contains_key(*c));
    let categories: serde_json::Map<String, serde_json::Value> = listing
        .iter()
        .map(|(cat, commands)| {
            let items = commands
                .iter()
                .map(|c| serde_json::json!({ "name": c.name(), "summary": c.summary() }))
                .collect();
            (cat.clone(), serde_json::Value::Array(items))
        })
        .collect();
    let count: usize = listing.values().map(Vec::len).sum();

    serde_json::json!({
        "status": "ok",
        "category": category,
        "count": count,
        "categories": categories,
    })
}
