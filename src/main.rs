use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use attribution_dashboard::config::{SheetNames, SourceConfig, DEFAULT_SHEETS_BASE_URL};
use attribution_dashboard::models::{GroupingKey, QueryResult, Snapshot};
use attribution_dashboard::report::{self, KeyMetrics};
use attribution_dashboard::{aggregate, logging, source};

#[derive(Parser)]
#[command(name = "attribution-dashboard")]
#[command(
    about = "Marketing attribution, order and pricing-sent rollups by month and source",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory holding <worksheet>.csv exports
    #[arg(long, env = "DASHBOARD_CSV_DIR", global = true)]
    csv_dir: Option<PathBuf>,
    /// Spreadsheet to read through its CSV export
    #[arg(long, env = "DASHBOARD_SHEET_ID", global = true)]
    sheet_id: Option<String>,
    #[arg(
        long,
        env = "DASHBOARD_SHEETS_BASE_URL",
        default_value = DEFAULT_SHEETS_BASE_URL,
        global = true
    )]
    sheets_base_url: String,
    #[arg(long, default_value = "attribution_data", global = true)]
    attribution_sheet: String,
    #[arg(long, default_value = "orders_data", global = true)]
    orders_sheet: String,
    #[arg(long, default_value = "notifications_data", global = true)]
    notifications_sheet: String,
}

#[derive(Args)]
struct RangeArgs {
    /// First month, e.g. "May. 2024"
    #[arg(long)]
    start: Option<String>,
    /// Last month, inclusive
    #[arg(long)]
    end: Option<String>,
    #[arg(long, value_enum, default_value_t = GroupingKey::Source)]
    by: GroupingKey,
}

#[derive(Subcommand)]
enum Commands {
    /// List the months available for selection
    Months,
    /// Print key metrics and rollups for a month range
    Summary {
        #[command(flatten)]
        range: RangeArgs,
        /// Emit the rollups as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report for a month range
    Report {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    period: &'a str,
    metrics: Option<KeyMetrics>,
    #[serde(flatten)]
    tables: &'a QueryResult,
    diagnostics: &'a [String],
}

/// Fills in missing endpoints from the data. `None` when there are no
/// months to choose from.
fn resolve_range(snapshot: &Snapshot, range: &RangeArgs) -> Option<(String, String)> {
    let months = aggregate::available_months(&snapshot.attribution);
    let (default_start, default_end) = aggregate::default_range(&months)?;
    Some((
        range.start.clone().unwrap_or(default_start),
        range.end.clone().unwrap_or(default_end),
    ))
}

fn run_query(snapshot: &Snapshot, range: &RangeArgs) -> anyhow::Result<(String, QueryResult)> {
    let Some((start, end)) = resolve_range(snapshot, range) else {
        return Ok((String::new(), QueryResult::default()));
    };
    let result = aggregate::query(snapshot, &start, &end, range.by)
        .with_context(|| format!("cannot build rollups for {start} to {end}"))?;
    Ok((aggregate::period_label(&start, &end), result))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let names = SheetNames {
        attribution: cli.source.attribution_sheet,
        orders: cli.source.orders_sheet,
        notifications: cli.source.notifications_sheet,
    };
    let config = SourceConfig::resolve(
        cli.source.csv_dir,
        cli.source.sheet_id,
        cli.source.sheets_base_url,
        std::env::var("DASHBOARD_SHEETS_TOKEN").ok(),
    );

    let (raw, diagnostics) = source::load_or_empty(config, &names).await;
    let snapshot = aggregate::build_snapshot(raw, diagnostics);
    for diagnostic in &snapshot.diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    match cli.command {
        Commands::Months => {
            let months = aggregate::available_months(&snapshot.attribution);
            if months.is_empty() {
                println!("No months available.");
                return Ok(());
            }
            println!(
                "{} attribution rows, {} active orders, {} pricing-sent notifications.",
                snapshot.attribution.len(),
                snapshot.orders.len(),
                snapshot.notifications.len()
            );
            for month in months {
                println!("- {month}");
            }
        }
        Commands::Summary { range, json } => {
            let (period, result) = run_query(&snapshot, &range)?;
            if json {
                let summary = JsonSummary {
                    period: &period,
                    metrics: report::key_metrics(&result, &period),
                    tables: &result,
                    diagnostics: &snapshot.diagnostics,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!(
                    "{}",
                    report::build_summary(&result, range.by, &period, &snapshot.diagnostics)
                );
            }
        }
        Commands::Report { range, out } => {
            let (period, result) = run_query(&snapshot, &range)?;
            let report = report::build_report(&result, range.by, &period, &snapshot.diagnostics);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
