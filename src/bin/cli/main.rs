mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mnemos-cli", about = "Spaced-repetition study from the terminal", version)]
struct Cli {
    /// Collection file (default: settings.toml, then the data directory)
    #[arg(long, global = true)]
    collection: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SchedulerArg {
    V2,
    V3,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum FilterArg {
    Due,
    New,
    Any,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum FilterOrderArg {
    Due,
    Random,
    Added,
}

#[derive(Subcommand)]
enum Command {
    /// Create the collection if it does not exist and show where it lives
    Init,

    /// List, add, select, or remove decks
    #[command(subcommand)]
    Decks(DecksCommand),

    /// Add notes to a deck
    Add {
        /// Deck name (created if missing)
        deck: String,
        /// Number of notes to add
        #[arg(long, default_value = "1")]
        count: u32,
        /// Cards per note
        #[arg(long, default_value = "1")]
        cards: u16,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show new, learning, and review counts for the current deck
    Counts,

    /// Study the current deck interactively
    Study,

    /// Suspend cards
    Suspend {
        #[arg(required = true)]
        cards: Vec<i64>,
    },

    /// Unsuspend or unbury cards
    Unsuspend {
        #[arg(required = true)]
        cards: Vec<i64>,
    },

    /// Bury cards until tomorrow
    Bury {
        #[arg(required = true)]
        cards: Vec<i64>,
    },

    /// Renumber the new cards of a deck
    Sort {
        deck: String,
        /// Shuffle instead of ordering by note
        #[arg(long)]
        random: bool,
    },

    /// Reset cards to new, placing them at the end of the new queue
    Forget {
        #[arg(required = true)]
        cards: Vec<i64>,
        /// Do not write a review log entry
        #[arg(long)]
        no_log: bool,
    },

    /// Build or empty filtered decks
    #[command(subcommand)]
    Filtered(FilteredCommand),

    /// Show or import deck options
    #[command(subcommand)]
    Options(OptionsCommand),

    /// Switch the collection to a later scheduler
    Upgrade {
        target: SchedulerArg,
    },
}

#[derive(Subcommand)]
enum DecksCommand {
    /// List decks with card counts
    List,
    /// Add a deck; parents are created as needed
    Add { name: String },
    /// Make a deck the one studied
    Use { name: String },
    /// Remove a deck, its children, and their cards
    Remove { name: String },
}

#[derive(Subcommand)]
enum FilteredCommand {
    /// Create (if needed) and fill a filtered deck
    Build {
        name: String,
        #[arg(long, default_value = "due")]
        kind: FilterArg,
        #[arg(long, default_value = "100")]
        limit: u32,
        #[arg(long, default_value = "due")]
        order: FilterOrderArg,
        /// Only gather from this deck and its children
        #[arg(long)]
        source: Option<String>,
        /// Preview without rescheduling
        #[arg(long)]
        preview: bool,
    },
    /// Send every card in a filtered deck home
    Empty { name: String },
}

#[derive(Subcommand)]
enum OptionsCommand {
    /// List deck option presets
    Show,
    /// Import presets from a TOML file; presets with a known name are replaced
    Import { file: PathBuf },
    /// Use a preset for a deck
    Use { deck: String, preset: String },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let mut app = app::App::open(cli.collection.as_deref())?;

    match cli.command {
        Command::Init => commands::init::run(&app, &cli.format, use_color)?,
        Command::Decks(subcmd) => match subcmd {
            DecksCommand::List => commands::decks::run_list(&app, &cli.format, use_color)?,
            DecksCommand::Add { name } => commands::decks::run_add(&mut app, &name, &cli.format)?,
            DecksCommand::Use { name } => commands::decks::run_use(&mut app, &name)?,
            DecksCommand::Remove { name } => commands::decks::run_remove(&mut app, &name)?,
        },
        Command::Add { deck, count, cards, tags } => {
            commands::add::run(&mut app, &deck, count, cards, tags.as_deref(), &cli.format)?;
        }
        Command::Counts => commands::counts::run(&mut app, &cli.format, use_color)?,
        Command::Study => commands::study::run(&mut app, use_color)?,
        Command::Suspend { cards } => commands::cards::run_suspend(&mut app, &cards)?,
        Command::Unsuspend { cards } => commands::cards::run_unsuspend(&mut app, &cards)?,
        Command::Bury { cards } => commands::cards::run_bury(&mut app, &cards)?,
        Command::Sort { deck, random } => commands::cards::run_sort(&mut app, &deck, random)?,
        Command::Forget { cards, no_log } => commands::cards::run_forget(&mut app, &cards, !no_log)?,
        Command::Filtered(subcmd) => match subcmd {
            FilteredCommand::Build {
                name,
                kind,
                limit,
                order,
                source,
                preview,
            } => {
                let request = commands::filtered::BuildRequest {
                    name: &name,
                    kind,
                    limit,
                    order,
                    source: source.as_deref(),
                    preview,
                };
                commands::filtered::run_build(&mut app, request, &cli.format)?;
            }
            FilteredCommand::Empty { name } => commands::filtered::run_empty(&mut app, &name)?,
        },
        Command::Options(subcmd) => match subcmd {
            OptionsCommand::Show => commands::options::run_show(&app, &cli.format, use_color)?,
            OptionsCommand::Import { file } => commands::options::run_import(&mut app, &file)?,
            OptionsCommand::Use { deck, preset } => commands::options::run_use(&mut app, &deck, &preset)?,
        },
        Command::Upgrade { target } => commands::upgrade::run(&mut app, target)?,
    }

    app.close()
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
