//! Codegraph CLI - build a code knowledge graph from a Python source tree

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use codegraph::config::{self, GraphConfig};
use codegraph::pipeline::{Extraction, RunReport};
use codegraph::storage::{DbStats, SqliteStore};
use codegraph::ui::{self, Icons, Spinner};
use codegraph::{EdgeType, EntityKind, Pipeline};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(version)]
#[command(about = "Build a code knowledge graph from Python sources")]
#[command(long_about = r#"
Codegraph statically analyzes a Python project and stores:
  • Files, libraries, functions, classes and methods as nodes
  • CALLS, IMPORTS, CONTAINS and DEFINES relationships as edges

Re-running against an unchanged tree never duplicates anything.

Example usage:
  codegraph init
  codegraph index --path ./src
  codegraph extract --path ./src --format json
  codegraph stats
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default codegraph.toml
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Extract and resolve without writing to the store
    Extract {
        /// Project root (overrides the config)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the full pipeline into the graph store
    Index {
        /// Project root (overrides the config)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show node and edge counts in the graph store
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { force } => {
            let graph_config = GraphConfig::default();
            config::write_config(&config_path, &graph_config, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
            ui::summary_row("Database:", &graph_config.database_path().display().to_string());
        }

        Commands::Extract { path, format } => {
            let graph_config = resolve_config(&config_path, path, None)?;
            let started = Instant::now();

            let spinner = Spinner::new("Extracting");
            let result = Pipeline::new(graph_config).extract();
            spinner.finish_and_clear();
            let extraction = result?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&extraction)?),
                OutputFormat::Text => {
                    print_extraction(&extraction);
                    ui::timing(&format!("{:.2?}", started.elapsed()));
                }
            }
        }

        Commands::Index { path, database, format } => {
            let graph_config = resolve_config(&config_path, path, database)?;
            let db_path = graph_config.database_path();
            config::ensure_db_dir(&db_path)?;

            if format == OutputFormat::Text {
                ui::header("Indexing");
                ui::info(&format!("{} Root", Icons::FOLDER), &graph_config.root.display().to_string());
                ui::info(&format!("{} Database", Icons::DATABASE), &db_path.display().to_string());
            }

            let started = Instant::now();
            let mut store = SqliteStore::open(&db_path)
                .with_context(|| format!("opening graph store {}", db_path.display()))?;

            let spinner = Spinner::new("Extracting and writing");
            let result = Pipeline::new(graph_config).run(&mut store);
            spinner.finish_and_clear();
            let report = result?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    print_report(&report);
                    ui::section("Store");
                    print_db_stats(&store.stats()?);
                    ui::timing(&format!("Complete in {:.2?}", started.elapsed()));
                }
            }

            if !report.write.is_success() {
                std::process::exit(2);
            }
        }

        Commands::Stats { database, format } => {
            let graph_config = resolve_config(&config_path, None, database)?;
            let db_path = graph_config.database_path();
            if !db_path.exists() {
                anyhow::bail!("no graph store at {} (run `codegraph index` first)", db_path.display());
            }

            let store = SqliteStore::open(&db_path)?;
            let stats = store.stats()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("{} Codegraph Statistics ({})", Icons::STATS, db_path.display());
                    print_db_stats(&stats);
                }
            }
        }
    }

    Ok(())
}

/// Config file values, with command-line flags on top
fn resolve_config(
    config_path: &Path,
    root: Option<PathBuf>,
    database: Option<PathBuf>,
) -> anyhow::Result<GraphConfig> {
    let mut graph_config = config::load_config(Some(config_path))
        .with_context(|| format!("reading {}", config_path.display()))?
        .unwrap_or_default();

    if let Some(root) = root {
        graph_config.root = root;
    }
    if database.is_some() {
        graph_config.database = database;
    }
    tracing::debug!("Using config: {:?}", graph_config);
    Ok(graph_config)
}

fn print_extraction(extraction: &Extraction) {
    ui::section("Entities");
    println!("{}", ui::entity_table(&extraction.entities));

    ui::section("Relationships");
    println!("{}", ui::relationship_table(&extraction.relationships));

    if !extraction.data_flows.is_empty() {
        ui::section("Data flows");
        println!("{}", ui::data_flow_table(&extraction.data_flows));
    }

    print_extraction_summary(extraction);
}

fn print_extraction_summary(extraction: &Extraction) {
    ui::phase("Summary");
    let mut rows: Vec<(String, String)> = vec![
        ("Files scanned".into(), extraction.files_scanned.to_string()),
        ("Files parsed".into(), extraction.files_parsed.to_string()),
    ];
    for kind in EntityKind::all() {
        rows.push((kind.to_string(), extraction.count_entities(*kind).to_string()));
    }
    for edge_type in EdgeType::all() {
        rows.push((edge_type.to_string(), extraction.count_relationships(*edge_type).to_string()));
    }
    rows.push(("Data flows".into(), extraction.data_flows.len().to_string()));
    let stats = &extraction.resolution;
    rows.push((
        "Calls resolved".into(),
        format!("{}/{} ({} ambiguous, {} external)", stats.resolved, stats.total, stats.ambiguous, stats.external),
    ));

    let borrowed: Vec<(&str, &str)> = rows.iter().map(|(l, v)| (l.as_str(), v.as_str())).collect();
    println!("{}", ui::stats_table(&borrowed));

    if !extraction.skipped.is_empty() {
        ui::warn(&format!("Skipped {} files", extraction.skipped.len()));
        for skip in &extraction.skipped {
            ui::skipped(&skip.path, &skip.reason);
        }
    }
    if !extraction.parse_errors.is_empty() {
        ui::warn(&format!("{} files failed to parse", extraction.parse_errors.len()));
        for failure in &extraction.parse_errors {
            ui::skipped(&failure.path, &failure.message);
        }
    }
}

fn print_report(report: &RunReport) {
    print_extraction_summary(&report.extraction);

    let write = &report.write;
    ui::section("Write");
    let rows = [
        ("Nodes created", write.nodes_created.to_string()),
        ("Nodes already present", write.nodes_existing.to_string()),
        ("Edges created", write.edges_created.to_string()),
        ("Edges already present", write.edges_existing.to_string()),
        ("Failed", write.failures.len().to_string()),
    ];
    let borrowed: Vec<(&str, &str)> = rows.iter().map(|(l, v)| (*l, v.as_str())).collect();
    println!("{}", ui::stats_table(&borrowed));

    if write.is_success() {
        ui::success("All entities and relationships written");
    } else {
        for failure in &write.failures {
            ui::error(&format!("{}: {}", failure.item, failure.reason));
        }
    }
}

fn print_db_stats(stats: &DbStats) {
    let mut rows: Vec<(String, String)> = vec![("Nodes".into(), stats.nodes.to_string())];
    rows.extend(stats.nodes_by_kind.iter().map(|(k, n)| (format!("  {}", k), n.to_string())));
    rows.push(("Edges".into(), stats.edges.to_string()));
    rows.extend(stats.edges_by_type.iter().map(|(t, n)| (format!("  {}", t), n.to_string())));

    let borrowed: Vec<(&str, &str)> = rows.iter().map(|(l, v)| (l.as_str(), v.as_str())).collect();
    println!("{}", ui::stats_table(&borrowed));
}
