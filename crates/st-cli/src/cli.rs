//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser};

/// Desktop screen time tracker.
///
/// Samples the focused application and idle time in the background and
/// reports where your screen time went.
#[derive(Debug, Parser)]
#[command(name = "screentime", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub action: ActionFlags,

    /// Start of the report window: YYYY-MM-DD, today, yesterday or "N days ago".
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// End of the report window (inclusive); same formats as --from.
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Number of apps listed in summaries.
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Print reports as JSON.
    #[arg(long)]
    pub json: bool,

    /// Confirm destructive actions.
    #[arg(long)]
    pub yes: bool,
}

/// The mutually exclusive action flags.
#[derive(Debug, Default, Args)]
#[group(multiple = false)]
pub struct ActionFlags {
    /// Start the background tracker.
    #[arg(long)]
    pub start: bool,

    /// Stop the background tracker.
    #[arg(long)]
    pub stop: bool,

    /// Show tracker status and diagnostics.
    #[arg(long)]
    pub status: bool,

    /// Show today's summary.
    #[arg(long)]
    pub today: bool,

    /// Show the last seven days day by day.
    #[arg(long)]
    pub week: bool,

    /// Show per-application usage.
    #[arg(long)]
    pub apps: bool,

    /// Show the productivity breakdown.
    #[arg(long)]
    pub productivity: bool,

    /// Summarize a custom date range (requires --from and --to).
    #[arg(long, requires = "from", requires = "to")]
    pub range: bool,

    /// Export the log with calendar columns to PATH (default: the exports directory).
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub export: Option<Option<PathBuf>>,

    /// Delete all recorded activity (requires --yes).
    #[arg(long, requires = "yes")]
    pub clear: bool,

    /// Run the tracker in the foreground.
    #[arg(long)]
    pub track: bool,
}

/// The action selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Status,
    Today,
    Week,
    Apps,
    Productivity,
    Range,
    Export(Option<PathBuf>),
    Clear,
    Track,
}

impl ActionFlags {
    /// The selected action; `None` when no action flag was given.
    pub fn selected(&self) -> Option<Action> {
        let flags = [
            (self.start, Action::Start),
            (self.stop, Action::Stop),
            (self.status, Action::Status),
            (self.today, Action::Today),
            (self.week, Action::Week),
            (self.apps, Action::Apps),
            (self.productivity, Action::Productivity),
            (self.range, Action::Range),
            (self.clear, Action::Clear),
            (self.track, Action::Track),
        ];
        if let Some(dest) = &self.export {
            return Some(Action::Export(dest.clone()));
        }
        flags
            .into_iter()
            .find_map(|(set, action)| set.then_some(action))
    }
}
