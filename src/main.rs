use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cmd;
mod config;
mod error;
mod loader;
mod plugin;
mod registry;
mod utils;

use cmd::RunContext;
use cmd::format::StyleOptions;
use cmd::list::render_listing;
use config::{Environment, Overrides, Settings};
use error::Error;
use registry::CommandRegistry;

/// carve - a pluggable command-line tool
///
/// Subcommands are not built in: they are declared by plugin files and
/// resolved from the words you type.
///
///   carve node show web1 --long     -> longest known command: `node show`
///   carve plugin list [CATEGORY]    -> what is installed
///   carve rehash                    -> cache plugin locations in a manifest
///
/// Plugin files (`*.yaml`) are read from:
///   <config-dir>/plugins/carve/     (--config-dir or CARVE_CONFIG_DIR)
///   $HOME/.carve/plugins/carve/
///
/// When `$HOME/.carve/plugin_manifest.json` exists (or --manifest is given)
/// it is used instead of scanning; pass --no-manifest to force a scan.
///
/// Env:
///   CARVE_LOG       tracing filter (overrides -v / -q)
///   NO_COLOR        disable ANSI colors
#[derive(Parser, Debug)]
#[command(
    name = "carve",
    version,
    about = "carve - pluggable command-line tool",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Configuration directory (falls back to CARVE_CONFIG_DIR)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Plugin manifest to use instead of $HOME/.carve/plugin_manifest.json
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Ignore any manifest and scan plugin directories
    #[arg(long)]
    no_manifest: bool,

    /// Subcommand words followed by its arguments
    #[arg(
        value_name = "SUB-COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    utils::init_logging(utils::derive_level(cli.verbose, cli.quiet));

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => report(&err),
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let settings = Settings::resolve(
        Overrides {
            config_dir: cli.config_dir,
            manifest: cli.manifest,
            no_manifest: cli.no_manifest,
        },
        &Environment::from_process(),
    );
    debug!(?settings, "resolved settings");

    let mut registry = CommandRegistry::new();
    let mut loader = loader::for_settings(&settings, &cli.args)?;

    if cli.args.is_empty() {
        eprintln!("Usage: carve [OPTIONS] SUB-COMMAND [ARGS]...");
        let listing = loader.list_commands(None, &mut registry)?;
        println!("{}", render_listing(&listing, &StyleOptions::detect()));
        return Ok(1);
    }

    let Some(command) = loader.command_class_from(&cli.args, &mut registry)? else {
        eprintln!("FATAL: Cannot find subcommand for: '{}'", cli.args.join(" "));
        let category = loader.guess_category(&cli.args, &registry);
        let listing = loader.list_commands(category.as_deref(), &mut registry)?;
        println!("{}", render_listing(&listing, &StyleOptions::detect()));
        return Ok(1);
    };

    debug!(command = command.name(), "running subcommand");
    let mut ctx = RunContext {
        settings: &settings,
        loader: loader.as_mut(),
        registry: &mut registry,
        args: cli.args,
    };
    command.run(&mut ctx)
}

/// Print a fatal error (and its hint) and pick the exit status.
fn report(err: &anyhow::Error) -> i32 {
    eprintln!("FATAL: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    match err.downcast_ref::<Error>() {
        Some(e) => {
            if let Some(hint) = e.hint() {
                eprintln!("FATAL: {hint}");
            }
            e.exit_code()
        }
        None => 1,
    }
}
