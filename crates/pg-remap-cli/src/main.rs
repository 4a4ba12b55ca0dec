//! pg-remap CLI - bulk find/replace across the text columns of a PostgreSQL schema.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use pg_remap::remap::DEFAULT_REGEX_FLAGS;
use pg_remap::{
    Config, PostgresStore, RemapError, RemapOptions, RemapReport, RemapRequest, Remapper,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "pg-remap")]
#[command(about = "Bulk find/replace across the text columns of a PostgreSQL schema")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

/// Table exclusion, shared by every scanning command.
#[derive(Args)]
struct ScopeArgs {
    /// Table to leave untouched (repeatable; adds to remap.excluded_tables)
    #[arg(long = "exclude-table", value_name = "TABLE")]
    exclude_tables: Vec<String>,
}

/// Options shared by `remap` and `regexp-replace`.
#[derive(Args)]
struct WriteArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Leave rows whose new value is too long for the column instead of failing
    #[arg(long)]
    skip_max_length_violations: bool,

    /// Log every skipped row and per-column update counts
    #[arg(long)]
    verbose: bool,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

/// Anchoring for literal patterns.
#[derive(Args)]
struct AnchorArgs {
    /// Only values starting with the pattern
    #[arg(long)]
    anchor_left: bool,

    /// Only values ending with the pattern
    #[arg(long)]
    anchor_right: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a literal string in every eligible text column
    Remap {
        /// Text to find (case-sensitive)
        from: String,

        /// Replacement text
        to: String,

        #[command(flatten)]
        write: WriteArgs,

        #[command(flatten)]
        anchors: AnchorArgs,
    },

    /// Replace regular-expression matches in every eligible text column
    RegexpReplace {
        /// Regular expression to match
        pattern: String,

        /// Replacement; \1..\9 insert capture groups, \& the whole match
        replacement: String,

        /// Regex flags: g (every match) and/or i (case-insensitive)
        #[arg(long, default_value = DEFAULT_REGEX_FLAGS)]
        flags: String,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// List rows containing a literal string, without writing
    Find {
        /// Text to find (case-sensitive)
        needle: String,

        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        anchors: AnchorArgs,
    },

    /// List the text columns a remap would scan
    Columns {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), RemapError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(RemapError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let base = RemapOptions::from_defaults(&config.remap);

    // Patterns are validated before a connection is opened.
    let request = match &cli.command {
        Commands::Remap {
            from,
            to,
            write,
            anchors,
        } => {
            let options = write_options(base.clone(), write)
                .anchored(anchors.anchor_left, anchors.anchor_right);
            Some(RemapRequest::literal(from, to, options)?)
        }
        Commands::RegexpReplace {
            pattern,
            replacement,
            flags,
            write,
        } => {
            let options = write_options(base.clone(), write);
            Some(RemapRequest::regex(pattern, replacement, flags, options)?)
        }
        _ => None,
    };

    let store = Arc::new(PostgresStore::connect(&config.database).await?);
    let remapper = Remapper::new(store.clone(), &config.database.schema);

    match cli.command {
        Commands::Remap { .. } | Commands::RegexpReplace { .. } => {
            if let Some(request) = request {
                let report = remapper.apply(&request).await?;
                print_report(&report, cli.output_json)?;
            }
        }

        Commands::Find {
            needle,
            scope,
            anchors,
        } => {
            let options = scoped(base, &scope).anchored(anchors.anchor_left, anchors.anchor_right);
            let matches = remapper.find(&needle, &options).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                for m in &matches {
                    println!("{}.{} [{}]: {}", m.table, m.column, m.key, m.value);
                }
                println!("\n{} matching rows", matches.len());
            }
        }

        Commands::Columns { scope } => {
            let columns = remapper.eligible_columns(&scoped(base, &scope)).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                for c in &columns {
                    let length = c
                        .max_length
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "unbounded".to_string());
                    println!("{} ({}, max length {})", c.full_name(), c.data_type, length);
                }
                println!("\n{} eligible columns in schema '{}'", columns.len(), remapper.schema());
            }
        }

        Commands::HealthCheck => {
            let result = store.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  PostgreSQL ({}): {} ({}ms)",
                    config.database.display_target(),
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref version) = result.server_version {
                    println!("    Server version: {}", version);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if let Some(err) = result.error {
                return Err(RemapError::pool(err, "health check"));
            }
        }
    }

    store.close();
    Ok(())
}

fn scoped(options: RemapOptions, scope: &ScopeArgs) -> RemapOptions {
    scope
        .exclude_tables
        .iter()
        .fold(options, |options, table| options.exclude_table(table.as_str()))
}

/// Command-line switches only ever turn config defaults on.
fn write_options(base: RemapOptions, write: &WriteArgs) -> RemapOptions {
    let skip = base.skip_max_length_violations || write.skip_max_length_violations;
    let verbose = base.verbose || write.verbose;
    scoped(base, &write.scope)
        .skip_max_length_violations(skip)
        .verbose(verbose)
        .dry_run(write.dry_run)
}

fn print_report(report: &RemapReport, output_json: bool) -> Result<(), RemapError> {
    if output_json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", format_report(report));
    }
    Ok(())
}

/// Text summary of a report. Skipped rows appear only as a count; their
/// `SKIPPED:` lines are logged during the run when verbose is on.
fn format_report(report: &RemapReport) -> String {
    let mut out = String::new();
    let status_msg = if report.dry_run {
        "Dry run completed!"
    } else {
        "Remap completed!"
    };
    out.push_str(&format!("\n{}\n", status_msg));
    out.push_str(&format!("  Pattern: {} {:?}\n", report.kind, report.pattern));
    out.push_str(&format!("  Duration: {:.2}s\n", report.duration_seconds));
    out.push_str(&format!("  Columns scanned: {}\n", report.columns_scanned()));
    out.push_str(&format!("  Rows matched: {}\n", report.rows_matched()));
    if report.dry_run {
        out.push_str(&format!("  Rows to update: {}\n", report.rows_planned()));
    } else {
        out.push_str(&format!("  Rows updated: {}\n", report.rows_updated()));
    }
    out.push_str(&format!("  Rows skipped (too long): {}\n", report.rows_skipped()));

    for column in report.changed_columns() {
        out.push_str(&format!(
            "    {}={}\n",
            column.full_name(),
            column.rows_updated + column.rows_planned
        ));
    }
    for outcome in &report.planned {
        out.push_str(&format!("  {}\n", outcome));
    }
    if report.outcomes_truncated {
        out.push_str("  (row list truncated; counts above are complete)\n");
    }
    out
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'. Use text or json", other)),
    }

    Ok(())
}
