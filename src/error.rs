//! Error type shared by the loaders, the plugin host and the manifest cache.
//!
//! Manifest errors carry a `hint()` telling the user how to regenerate the
//! cache; `main` prints it after the error itself.

use std::path::PathBuf;

use thiserror::Error;

use crate::plugin::PluginSource;

/// Convenient result alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The manifest has no key for the positional words that were typed.
    #[error("Cannot find subcommand for: '{args}'")]
    SubcommandNotFound { args: String },

    /// A manifest entry exists but carries no usable `paths` list.
    #[error("Cached information for subcommand '{key}' appears to be improperly formatted")]
    MalformedManifestEntry {
        key: String,
        manifest: Option<PathBuf>,
    },

    #[error("failed to read plugin {path}")]
    PluginRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plugin {path}")]
    PluginParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A plugin declared a command whose words are not valid command words.
    #[error("invalid command name '{name}' declared in {origin}")]
    InvalidCommandName { name: String, origin: PluginSource },

    #[error("command '{name}' declared in {origin} has an empty exec line")]
    EmptyExec { name: String, origin: PluginSource },

    #[error("command '{name}' declared in {origin} has an unparsable exec line")]
    ExecSyntax {
        name: String,
        origin: PluginSource,
        #[source]
        source: shell_words::ParseError,
    },

    #[error("unknown built-in command bundle '{0}'")]
    UnknownBuiltin(String),

    #[error("failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write manifest {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither `--manifest` nor a home directory was available.
    #[error("no manifest location could be resolved (set HOME or pass --manifest)")]
    ManifestLocation,

    #[error("invalid plugin search pattern")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Exit status reserved for "no subcommand found in the manifest".
    pub const NOT_FOUND_EXIT_CODE: i32 = 10;

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SubcommandNotFound { .. } => Self::NOT_FOUND_EXIT_CODE,
            _ => 1,
        }
    }

    /// User-facing advice printed after the error, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::SubcommandNotFound { .. } => Some(
                "If you recently installed this command, try running: carve --no-manifest rehash"
                    .to_string(),
            ),
            Error::MalformedManifestEntry {
                manifest: Some(path),
                ..
            } => Some(format!(
                "Try running carve --no-manifest rehash or removing {}",
                path.display()
            )),
            Error::ManifestRead { path, .. } | Error::ManifestParse { path, .. } => Some(format!(
                "Try running carve --no-manifest rehash or removing {}",
                path.display()
            )),
            Error::MalformedManifestEntry { manifest: None, .. } => Some(
                "Try running carve --no-manifest rehash or removing the plugin manifest"
                    .to_string(),
            ),
            _ => None,
        }
    }
}
