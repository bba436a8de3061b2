//! Entry point for the `plux` expect-style script runner.

mod args;
mod dump;
mod loader;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use plux_core::ast::ScriptEnv;
use plux_core::config::Config;
use plux_core::loader::ScriptLoader as _;
use plux_core::runner::Runner;

use args::{CommandLineArgs, LogLevel};
use loader::PluxScriptLoader;

/// A fault that prevents `plux` from attempting to run anything at all:
/// a malformed glob, or a glob that matched no files. Per-script parse
/// and run failures are not represented here; they're collected and
/// reported as part of a normal (non-zero exit code) run.
#[derive(Debug, thiserror::Error)]
enum UsageError {
    /// The glob pattern itself failed to compile.
    #[error("invalid glob '{pattern}': {source}")]
    InvalidGlob {
        /// The offending pattern, as given on the command line.
        pattern: String,
        /// Underlying `glob` crate error.
        #[source]
        source: glob::PatternError,
    },
    /// A filesystem error occurred while walking a glob's matches.
    #[error("error reading glob match for '{pattern}': {source}")]
    GlobMatch {
        /// The pattern being expanded.
        pattern: String,
        /// Underlying `glob` crate error.
        #[source]
        source: glob::GlobError,
    },
    /// A glob compiled fine but matched zero files.
    #[error("glob '{pattern}' matched no files")]
    NoMatches {
        /// The offending pattern.
        pattern: String,
    },
}

/// Parses arguments, initializes logging, runs every matched script in
/// turn, and maps the aggregate outcome to a process exit code.
fn main() -> ExitCode {
    let args = CommandLineArgs::parse();
    let _log_guard = init_logging(args.log_level);

    if let Err(err) = plux_core::signal::install() {
        tracing::warn!(%err, "failed to install signal handlers");
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("plux: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Installs a `tracing` subscriber writing to stderr and, in parallel,
/// to an append-only `./plux.log`. The returned guard must stay alive
/// for the duration of the process so the non-blocking file writer can
/// flush on exit.
fn init_logging(level: LogLevel) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let file_appender = tracing_appender::rolling::never(".", "plux.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

/// Expands globs, then parses and (unless `--dump`) runs each matched
/// script. Returns `Ok(true)` iff every matched script completed
/// `OK`.
fn run(args: &CommandLineArgs) -> Result<bool, UsageError> {
    let paths = expand_globs(&args.globs)?;

    let cfg = Config::resolve(args.timeout_ms, args.tail);
    let loader = PluxScriptLoader::new(cfg.stdlib_dir.clone());

    let mut failed = Vec::new();

    for path in paths {
        let env = ScriptEnv::new();
        let script = match loader.load_file(&path, env) {
            Ok(script) => script,
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "failed to parse script");
                println!("FAIL {}", path.display());
                failed.push(path.display().to_string());
                continue;
            }
        };

        if args.dump {
            println!("{}", dump::render_script(&script));
            continue;
        }

        let script_cfg = Config {
            log_dir: script_log_dir(&cfg.log_dir, &script.name),
            ..cfg.clone()
        };

        let mut runner = match Runner::new(script_cfg, Box::new(loader.clone())) {
            Ok(runner) => runner,
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "failed to start runner");
                println!("FAIL {}", path.display());
                failed.push(path.display().to_string());
                continue;
            }
        };

        let result = runner.run(&script);
        runner.stop_all();

        if result.is_ok() {
            println!("OK   {}", path.display());
        } else {
            println!("FAIL {}", path.display());
            report_failure(&result);
            failed.push(path.display().to_string());
        }
    }

    if failed.is_empty() {
        Ok(true)
    } else {
        eprintln!("plux: {} script(s) failed:", failed.len());
        for path in &failed {
            eprintln!("  {path}");
        }
        Ok(false)
    }
}

/// Prints a failed [`plux_core::ScriptResult`]'s status, location, error
/// text, and call stack to stderr.
fn report_failure(result: &plux_core::ScriptResult) {
    if let Some(info) = &result.info {
        eprintln!("  {:?} at {info}: {}", result.status, result.error);
    } else {
        eprintln!("  {:?}: {}", result.status, result.error);
    }
    let stack = result.render_stack();
    if !stack.is_empty() {
        eprintln!("  call stack: {stack}");
    }
}

/// Directory persisted per-shell logs for a script named `name` are
/// written under: `<base>/<name>`.
fn script_log_dir(base: &Path, name: &str) -> PathBuf {
    base.join(name)
}

fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>, UsageError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern).map_err(|source| UsageError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;

        let mut matched_any = false;
        for entry in matches {
            let path = entry.map_err(|source| UsageError::GlobMatch {
                pattern: pattern.clone(),
                source,
            })?;
            matched_any = true;
            paths.push(path);
        }

        if !matched_any {
            return Err(UsageError::NoMatches {
                pattern: pattern.clone(),
            });
        }
    }
    Ok(paths)
}
