use anyhow::{Context, Result};
use clap::Parser;
use roster_import::{BatchRunner, ImportConfig, RowFailurePolicy, SqliteStore};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Import subjects (and optional group memberships) from a CSV file
#[derive(Debug, Parser)]
#[command(name = "roster-import", version, about)]
struct Args {
    /// CSV file to import
    file: PathBuf,

    /// SQLite database holding the record store
    #[arg(long, value_name = "PATH", default_value = "roster.db")]
    db: PathBuf,

    /// CSV delimiter [default: ,]
    #[arg(short = 'd', long)]
    delimiter: Option<String>,

    /// Subject matching field [default: idnumber]
    #[arg(short = 'f', long)]
    field: Option<String>,

    /// Update subjects that already exist
    #[arg(short = 'U', long = "update-user")]
    update_user: bool,

    /// Data rows to skip before processing starts
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<i64>,

    /// Maximum number of rows to process (-1 for no limit)
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Log and skip rows the store rejects instead of aborting
    #[arg(long)]
    skip_failed_rows: bool,

    /// JSON file with import settings; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print per-line progress and final counters
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn import_config(&self) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => ImportConfig::from_json_file(path)?,
            None => ImportConfig::default(),
        };

        if let Some(delimiter) = &self.delimiter {
            config.delimiter = delimiter.clone();
        }
        if let Some(field) = &self.field {
            config.matching_field = field.clone();
        }
        if self.update_user {
            config.update_existing = true;
        }
        if let Some(offset) = self.offset {
            config.offset = offset;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if self.skip_failed_rows {
            config.failure_policy = RowFailurePolicy::SkipAndLog;
        }

        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    if let Err(error) = setup_logging(args.verbose).and_then(|_| run(&args)) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.import_config()?;
    config.validate()?;

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;

    let mut runner = BatchRunner::new(&store, config);
    let summary = runner.run_path(&args.file)?;

    println!("Import complete");
    if args.verbose {
        let config = runner.config();
        let skip_policy = config.failure_policy == RowFailurePolicy::SkipAndLog;
        for line in summary.report_lines(config.update_existing, skip_policy) {
            println!("{}", line);
        }
        for failure in &summary.failures {
            println!("  line {}: {}", failure.line, failure.message);
        }
    }

    Ok(())
}

/// RUST_LOG directives, with per-line progress forced on by `--verbose`
fn log_filter(env: Option<&str>, verbose: bool) -> Result<EnvFilter> {
    let filter = env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("roster_import=warn"));

    if verbose {
        return Ok(filter.add_directive("roster_import=debug".parse()?));
    }
    Ok(filter)
}

/// Set up structured logging on stderr; stdout carries the report
fn setup_logging(verbose: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), verbose)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_env_filter() {
        let filter = log_filter(Some("warn"), true).unwrap().to_string();
        assert!(filter.contains("roster_import=debug"), "{}", filter);

        let quiet = log_filter(Some("warn"), false).unwrap().to_string();
        assert!(!quiet.contains("roster_import"), "{}", quiet);

        let default = log_filter(None, false).unwrap().to_string();
        assert!(default.contains("roster_import=warn"), "{}", default);
    }
}
