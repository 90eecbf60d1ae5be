//! Retention CLI - cohort retention views from a CSV file
//!
//! # Commands
//!
//! ```bash
//! retention serve                        # Start HTTP server (port 3000)
//! retention matrix cohorts.csv --table   # Annotated retention table
//! retention trend cohorts.csv -c 2023-01 -c 2023-02
//! retention series cohorts.csv 2023-01
//! retention aggregate cohorts.csv
//! ```
//!
//! Every view is printed as JSON (undefined rates are `null`) unless noted.
//! Progress logs go to stderr.

use clap::{Args, Parser, Subcommand};
use cohort_retention::{
    config::DEFAULT_TREND_COHORTS, retention::views, run_file, server, CohortId, PipelineOptions,
    RawCohortTable, RetentionGrid, RetentionRun, ServerConfig, ViewRequest,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retention")]
#[command(about = "Cohort retention matrix, trends and aggregates from a CSV file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input options shared by every file command
#[derive(Args)]
struct InputArgs {
    /// Input CSV file (cohort column + `Month N` columns)
    input: PathBuf,

    /// Cohort identifier column (default: first column)
    #[arg(long)]
    cohort_column: Option<String>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl InputArgs {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            cohort_column: self.cohort_column.clone(),
            delimiter: self.delimiter,
            ..PipelineOptions::default()
        }
    }

    fn run(&self) -> Result<RetentionRun, Box<dyn std::error::Error>> {
        Ok(run_file(&self.input, &self.options())?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the cohort table, print it as JSON
    Parse {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Retention matrix (heatmap grid)
    Matrix {
        #[command(flatten)]
        input: InputArgs,

        /// Print an annotated text table instead of JSON
        #[arg(long)]
        table: bool,
    },

    /// Long-form record stream
    Long {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Retention trends for selected cohorts
    Trend {
        #[command(flatten)]
        input: InputArgs,

        /// Cohort to include (repeatable)
        #[arg(short, long = "cohort")]
        cohorts: Vec<String>,

        /// Number of leading cohorts when none is given
        #[arg(long, default_value_t = DEFAULT_TREND_COHORTS)]
        top: usize,
    },

    /// Retention series for one cohort
    Series {
        #[command(flatten)]
        input: InputArgs,

        /// Cohort identifier
        cohort: String,
    },

    /// Retention summed across cohorts per period
    Aggregate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// List cohort identifiers
    Cohorts {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: RETENTION_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input } => cmd_parse(&input),
        Commands::Matrix { input, table } => cmd_matrix(&input, table),
        Commands::Long { input } => cmd_long(&input),
        Commands::Trend { input, cohorts, top } => cmd_trend(&input, cohorts, top),
        Commands::Series { input, cohort } => cmd_view(
            &input,
            ViewRequest::SingleCohortSeries(CohortId::from(cohort)),
        ),
        Commands::Aggregate { input } => cmd_view(&input, ViewRequest::AggregateByPeriod),
        Commands::Cohorts { input } => cmd_cohorts(&input),
        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &InputArgs) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = cohort_retention::parse_csv_file(&input.input, input.delimiter)?;
    let table = RawCohortTable::from_parsed(&parsed, input.cohort_column.as_deref())?;
    eprintln!(
        "✅ {} cohorts × {} periods",
        table.rows().len(),
        table.periods().len()
    );
    write_json(&table, input.output.as_deref())
}

fn cmd_matrix(input: &InputArgs, as_table: bool) -> Result<(), Box<dyn std::error::Error>> {
    let run = input.run()?;
    let grid = views::matrix(&run.stream).grid();

    if as_table {
        let text = render_table(run.table.cohort_column(), &grid);
        write_output(&text, input.output.as_deref())
    } else {
        write_json(&grid, input.output.as_deref())
    }
}

fn cmd_long(input: &InputArgs) -> Result<(), Box<dyn std::error::Error>> {
    let run = input.run()?;
    write_json(&run.stream, input.output.as_deref())
}

fn cmd_trend(
    input: &InputArgs,
    cohorts: Vec<String>,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let run = input.run()?;
    let selected: BTreeSet<CohortId> = if cohorts.is_empty() {
        views::default_trend_selection(&run.stream, top)
            .into_iter()
            .collect()
    } else {
        cohorts.into_iter().map(CohortId::from).collect()
    };

    eprintln!("📈 {} cohort(s) selected", selected.len());
    let view = run.view(&ViewRequest::TrendSubset(selected))?;
    write_json(&view, input.output.as_deref())
}

fn cmd_view(input: &InputArgs, request: ViewRequest) -> Result<(), Box<dyn std::error::Error>> {
    let run = input.run()?;
    let view = run.view(&request)?;
    write_json(&view, input.output.as_deref())
}

fn cmd_cohorts(input: &InputArgs) -> Result<(), Box<dyn std::error::Error>> {
    let run = input.run()?;
    write_json(&run.cohorts(), input.output.as_deref())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    server::start_server(config).await?;
    Ok(())
}

/// Heatmap-style table: one row per cohort, one-decimal rates.
fn render_table(cohort_column: &str, grid: &RetentionGrid) -> String {
    let label_width = grid
        .cohorts
        .iter()
        .map(|c| c.as_str().chars().count())
        .chain(std::iter::once(cohort_column.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}", cohort_column, width = label_width);
    for period in &grid.periods {
        out.push_str(&format!(" | {:>7}", format!("M{}", period)));
    }
    out.push('\n');

    for (cohort, cells) in grid.cohorts.iter().zip(&grid.cells) {
        out.push_str(&format!("{:<width$}", cohort.as_str(), width = label_width));
        for rate in cells {
            out.push_str(&format!(" | {:>7}", format!("{:.1}", rate)));
        }
        out.push('\n');
    }

    out
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    write_output(&json, path)
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
