//! Command-line argument parsing for the `plux` script runner.

use clap::{Parser, ValueEnum, builder::styling};

const HEADING_RUN_OPTIONS: &str = "Run options";
const HEADING_LOGGING_OPTIONS: &str = "Logging options";

const USAGE: &str =
    color_print::cstr!("<bold>plux</bold> <italics>[OPTIONS]</italics>... <italics>SCRIPT_GLOB</italics>...");

/// Minimum severity of tracing events written to the application log
/// and mirrored to stderr.
#[derive(Clone, Copy, Debug, ValueEnum)]
#[clap(rename_all = "UPPER")]
pub enum LogLevel {
    /// Every span and event, including per-poll-wakeup diagnostics.
    Trace,
    /// Engine-internal diagnostics useful while debugging a script.
    Debug,
    /// Script lifecycle: shell spawns, matches, calls, includes.
    Info,
    /// Recoverable anomalies: ignored `[config set]` keys, reaped orphans.
    Warning,
    /// Faults that fail a running script.
    Error,
}

impl LogLevel {
    /// Renders as the level name `tracing_subscriber::EnvFilter` expects.
    pub const fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// Parsed command-line arguments for the `plux` script runner.
#[derive(Clone, Parser, Debug)]
#[clap(
    name = "plux",
    version,
    about = "Runs expect-style scripts against PTY- or pipe-backed child processes",
    override_usage = USAGE,
    styles = plux_help_styles()
)]
pub struct CommandLineArgs {
    /// Path globs of scripts to run.
    #[arg(required = true, value_name = "SCRIPT_GLOB")]
    pub globs: Vec<String>,

    /// Parse every matched script and print its model instead of running it.
    #[arg(short = 'd', long = "dump", help_heading = HEADING_RUN_OPTIONS)]
    pub dump: bool,

    /// Mirror shell input to stderr as it is sent.
    #[arg(short = 't', long = "tail", help_heading = HEADING_RUN_OPTIONS)]
    pub tail: bool,

    /// Override the default per-shell timeout, in milliseconds.
    #[arg(short = 'T', long = "timeout", value_name = "MS", help_heading = HEADING_RUN_OPTIONS)]
    pub timeout_ms: Option<u64>,

    /// Minimum severity written to the application log and stderr.
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        ignore_case = true,
        default_value = "info",
        help_heading = HEADING_LOGGING_OPTIONS
    )]
    pub log_level: LogLevel,
}

/// Returns clap styling to be used for command-line help.
fn plux_help_styles() -> clap::builder::Styles {
    styling::Styles::styled()
        .header(
            styling::AnsiColor::Yellow.on_default() | styling::Effects::BOLD | styling::Effects::UNDERLINE,
        )
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Magenta.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}
