use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::tantivy_index::DEFAULT_PAGE_SIZE;

#[derive(Debug, Parser)]
#[command(
    name = "notesearch",
    about = "Search and index a local markdown note corpus"
)]
pub struct Cli {
    /// Override the project directory
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring the index up to date with the notes on disk
    Index(IndexArgs),
    /// Delete the index and build it again from scratch
    Rebuild,
    /// Search notes, attachments and folders
    Search(SearchArgs),
    /// Instant file name matching, without the index
    Palette(PaletteArgs),
    /// List every tag with its note count
    Tags(JsonArgs),
    /// Manage saved searches
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Show project paths and index statistics
    Status(JsonArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Re-index notes even if they look unchanged
    #[arg(long)]
    pub force: bool,

    /// Number of indexing workers
    #[arg(long)]
    pub workers: Option<usize>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Palette --

#[derive(Debug, Parser)]
pub struct PaletteArgs {
    /// Partial file or folder name
    pub query: String,

    /// Rank by Jaro-Winkler similarity instead of trigram overlap
    #[arg(long)]
    pub similarity: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Saved searches --

#[derive(Debug, Subcommand)]
pub enum SavedAction {
    /// List saved searches
    List(JsonArgs),
    /// Save a query under a name
    Add {
        /// Unique name for the search
        name: String,
        /// Query text
        query: String,
    },
    /// Remove a saved search
    Remove {
        /// Name of the saved search
        name: String,
    },
}

#[derive(Debug, Parser)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "notesearch",
            &mut std::io::stdout(),
        );
    }
}
