//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::Mode;
use crate::storage::StoreKind;
use crate::sync::MergePolicy;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
    /// Comma-separated values
    Csv,
}

pub mod commands;

/// info-filter: save links, books and audio for later
#[derive(Parser, Debug)]
#[command(name = "ifl", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store path (default: the desktop app's config.json)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Store backend (json, sqlite, memory)
    #[arg(long, global = true)]
    pub store_kind: Option<StoreKind>,

    /// Directory for EPUB/audio payloads
    #[arg(long, global = true)]
    pub blob_dir: Option<PathBuf>,

    /// Object-storage bucket URL for EPUB/audio payloads
    #[arg(long, global = true)]
    pub bucket_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Output only the item ID (for scripting)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save a link (title and thumbnail are scraped)
    Add(AddArgs),

    /// List saved items
    List(ListArgs),

    /// Show one item
    Show {
        /// Item ID
        id: String,
    },

    /// Delete an item (and its stored file)
    Delete {
        /// Item ID
        id: String,
    },

    /// Toggle an item's pin
    Pin {
        /// Item ID
        id: String,
    },

    /// Replace an item's note
    Note {
        /// Item ID
        id: String,

        /// New note text (empty clears it)
        text: String,
    },

    /// Markdown notes attached to an item
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },

    /// Move an item to a position in the stored order
    Move {
        /// Item ID
        id: String,

        /// Zero-based target index
        to: usize,
    },

    /// Rewrite the stored order (every ID exactly once)
    Reorder {
        /// Item IDs in their new order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Save an EPUB book
    AddEpub {
        /// Path to the .epub file
        path: PathBuf,
    },

    /// Save an audio file
    AddAudio {
        /// Path to the audio file
        path: PathBuf,

        /// Override the detected content type
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Scrape title and thumbnail for a URL
    Metadata {
        /// Page URL
        url: String,
    },

    /// Inspect an EPUB without saving it
    Epub {
        /// Path to the .epub file
        path: PathBuf,
    },

    /// Export a JSON backup
    Export(ExportArgs),

    /// Import a JSON backup or a bare item array
    Import(ImportArgs),

    /// Run the local sync host (HTTP API, /ws, mobile bundle)
    Serve(ServeArgs),

    /// Connect to a sync host and mirror its items
    Connect(ConnectArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum NotesCommands {
    /// Attach .md / .markdown files as notes (titled by file name)
    Add {
        /// Item ID
        id: String,

        /// Markdown files to attach
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List an item's notes
    List {
        /// Item ID
        id: String,
    },

    /// Print one note's Markdown
    Show {
        /// Item ID
        id: String,

        /// Note ID
        note_id: String,
    },

    /// Delete a note
    Delete {
        /// Item ID
        id: String,

        /// Note ID
        note_id: String,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Display order for `list`.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Pinned first, newest first
    #[default]
    Display,
    /// Stored array order
    Stored,
}

/// Merge policy for `import`.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Replace the library with the file's items
    Replace,
    /// Union; the file wins on id collisions
    #[default]
    PreferIncoming,
    /// Union; the library wins on id collisions
    PreferLocal,
}

impl From<ImportPolicy> for MergePolicy {
    fn from(policy: ImportPolicy) -> Self {
        match policy {
            ImportPolicy::Replace => Self::Replace,
            ImportPolicy::PreferIncoming => Self::PreferIncoming,
            ImportPolicy::PreferLocal => Self::PreferLocal,
        }
    }
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Page URL
    pub url: String,

    /// Category key (read_later, learning, inspiration, entertainment, ...)
    #[arg(short, long)]
    pub category: Option<String>,

    /// Note
    #[arg(short, long)]
    pub note: Option<String>,

    /// Capture into a learning-space mode (video, book, paper, audio, web)
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Use this title instead of the scraped one
    #[arg(short, long)]
    pub title: Option<String>,

    /// Skip metadata scraping
    #[arg(long)]
    pub no_fetch: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only items of this platform ("all" for every item)
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Only items in this mode
    #[arg(short, long, conflicts_with = "platform")]
    pub mode: Option<Mode>,

    /// Ordering
    #[arg(long, value_enum, default_value_t)]
    pub order: ListOrder,

    /// Maximum items to show
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file (default: ./info-filter-backup-YYYY-MM-DD.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Embed stored files as base64
    #[arg(long, alias = "files")]
    pub with_files: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Backup file
    pub path: PathBuf,

    /// How to combine with the existing library
    #[arg(long, value_enum, default_value_t)]
    pub policy: ImportPolicy,

    /// Keep local entries on id collisions (same as --policy prefer-local)
    #[arg(long, conflicts_with = "policy")]
    pub keep_local: bool,
}

impl ImportArgs {
    /// Effective merge policy.
    #[must_use]
    pub fn merge_policy(&self) -> MergePolicy {
        if self.keep_local {
            MergePolicy::PreferLocal
        } else {
            self.policy.into()
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind host (default: 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (default: 3000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory with the mobile bundle to serve
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Host address (host:port, http(s):// or ws(s):// URL)
    pub host: String,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    /// Keep mirroring pushes until interrupted
    #[arg(short, long)]
    pub watch: bool,
}
