use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "docarchive",
    about = "Scan, OCR and search your document archive",
    version
)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/docarchive/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Semicolon-separated document roots, overriding the configuration
    #[arg(long, global = true)]
    pub roots: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one scan and extraction cycle over all roots
    Scan(ScanArgs),
    /// Scan periodically until interrupted
    Watch,
    /// Search document text, tags, titles and paths
    Search(SearchArgs),
    /// List documents whose metadata changed recently
    Newest(NewestArgs),
    /// Edit the metadata of one document
    Edit(EditArgs),
    /// Fold legacy per-page text files into JSON sidecars
    Migrate,
    /// Show how many documents have been extracted
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Scan --

#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Print the cycle report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Whitespace-separated terms; a document matches if any term does
    pub query: String,

    /// Show at most this many results
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Newest --

#[derive(Debug, Parser)]
pub struct NewestArgs {
    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Edit --

#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Path of the original document
    pub document: PathBuf,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// Replace the tags (repeatable; pass once with "" to clear)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Replace the document text
    #[arg(long)]
    pub text: Option<String>,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
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
            "docarchive",
            &mut std::io::stdout(),
        );
    }
}
