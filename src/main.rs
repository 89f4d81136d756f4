//! Lookup CLI - search, inspect aliases, dry-run markup scans

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use lookup::entity::builtin_aliases;
use lookup::{
    ElementDescriptor, EngineConfig, FixSuggestion, Lookup, LookupError, RecordingWriter,
};

#[derive(Parser)]
#[command(name = "lookup")]
#[command(about = "Lookup - typeahead search engine for data-entry pages")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/lookup/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the base URL search paths are resolved against
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search through the cache and print the rows
    Search {
        /// Entity name or alias (product, client, room, ...)
        entity: String,

        /// Query text
        query: String,

        /// Maximum rows (0 = no limit parameter)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Endpoint override (absolute URL or path)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the entity alias table
    Aliases,

    /// Bind element descriptors from a JSON file and report the outcome
    Scan {
        /// JSON array of {"id": ..., "attributes": {...}}
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<LookupError>()
            .and_then(|le| le.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.base_url)?;

    match cli.command {
        Commands::Search {
            entity,
            query,
            limit,
            endpoint,
            json,
        } => search(config, &entity, &query, limit, endpoint.as_deref(), json).await,
        Commands::Aliases => {
            print_aliases(&config);
            Ok(())
        }
        Commands::Scan { file } => scan(config, &file).await,
        Commands::Config => print_config(&config, cli.config.as_deref()),
    }
}

fn load_config(
    path: Option<&std::path::Path>,
    base_url: Option<String>,
) -> Result<EngineConfig, LookupError> {
    let config = match path {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    let mut config = config.with_env();
    if let Some(url) = base_url {
        config = config.with_base_url(url);
    }
    config.validate()?;
    Ok(config)
}

async fn search(
    config: EngineConfig,
    entity: &str,
    query: &str,
    limit: Option<usize>,
    endpoint: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(config.defaults.limit);
    let lookup = Lookup::builder(config).build()?;
    let rows = lookup.fetch_only(entity, query, limit, endpoint).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{} No matches", "∅".yellow());
        return Ok(());
    }
    for row in &rows {
        let id = row.id().unwrap_or_default();
        match row.secondary() {
            Some(secondary) => println!(
                "  {} {} {}",
                id.cyan(),
                row.label().bold(),
                secondary.dimmed()
            ),
            None => println!("  {} {}", id.cyan(), row.label().bold()),
        }
    }
    println!("{} {} row(s)", "✓".green(), rows.len());
    Ok(())
}

fn print_aliases(config: &EngineConfig) {
    println!("{}", "Built-in aliases:".cyan().bold());
    for (alias, canonical) in builtin_aliases() {
        println!("  {} → {}", alias, canonical.green());
    }
    if !config.aliases.is_empty() {
        println!("{}", "Configured aliases:".cyan().bold());
        for (alias, canonical) in &config.aliases {
            println!("  {} → {}", alias, canonical.green());
        }
    }
}

async fn scan(config: EngineConfig, file: &std::path::Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let elements: Vec<ElementDescriptor> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse element descriptors in {}", file.display()))?;

    let lookup = Lookup::builder(config)
        .writer(Arc::new(RecordingWriter::new()))
        .build()?;
    let report = lookup.scan(&elements);

    for element in &report.bound {
        println!("{} {} bound", "✓".green(), element);
    }
    for element in &report.already_bound {
        println!("{} {} already bound", "•".cyan(), element);
    }
    for (element, err) in &report.rejected {
        println!("{} {} rejected: {}", "✗".red(), element, err);
    }
    println!(
        "  Bound: {} | Already bound: {} | Rejected: {} | Skipped: {}",
        report.bound.len(),
        report.already_bound.len(),
        report.rejected.len(),
        report.skipped
    );

    if report.rejected.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} element(s) rejected", report.rejected.len())
    }
}

fn print_config(config: &EngineConfig, path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let path = path
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(EngineConfig::config_path);
    println!("{} {}", "# Config file:".dimmed(), path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
