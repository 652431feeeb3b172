//! Recipe Harvest main entry point
//!
//! This is the command-line interface for the Recipe Harvest crawler.

use anyhow::Context;
use clap::Parser;
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::site::{PageScheme, SiteAdapter};
use recipe_harvest::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Recipe Harvest: a polite recipe crawler
///
/// Recipe Harvest walks the recipe listings of configured publishing sites,
/// extracts schema.org Recipe microdata from each recipe page, and stores
/// the results in SQLite.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version)]
#[command(about = "A polite recipe crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only crawl the named site (repeatable)
    #[arg(long = "site", value_name = "NAME")]
    sites: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export stored recipes as JSON to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.sites)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)?;
    } else {
        handle_crawl(&config, &config_hash, &cli.sites).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn describe_pagination(site: &SiteAdapter) -> String {
    match site.pagination() {
        PageScheme::Path => "path (/page/N)".to_string(),
        PageScheme::Query { param } => format!("query (?{}=N)", param),
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, names: &[String]) -> anyhow::Result<()> {
    let sites = config.select_sites(names)?;

    println!("=== Recipe Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Request timeout: {}s", config.crawler.timeout_secs);
    println!(
        "  Max concurrent sites: {}",
        config.crawler.max_concurrent_sites
    );
    println!("  Download images: {}", config.crawler.download_images);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nExtraction:");
    println!("  Require author: {}", config.extraction.require_author);
    println!("  Require yield: {}", config.extraction.require_yield);
    println!(
        "  Author properties: {}",
        config.extraction.author_properties.join(", ")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSites ({}):", sites.len());
    for site in &sites {
        println!("  - {} ({:?})", site.name(), site.traversal());
        println!("    Root: {}", site.root_url());
        println!("    Index: {}", site.recipe_index_url());
        println!("    Recipe links: {}", site.link_selector().to_css());
        if let Some(categories) = site.category_selector() {
            println!("    Category links: {}", categories.to_css());
        }
        println!("    Pagination: {}", describe_pagination(site));
        if !site.fixups().is_empty() {
            println!("    Fixups: {}", site.fixups().len());
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} sites", sites.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use recipe_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes every stored recipe as JSON
fn handle_export(config: &Config, path: &Path) -> anyhow::Result<()> {
    use recipe_harvest::output::export_json;

    println!("=== Exporting Recipes ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", path.display());
    println!();

    let store = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;
    let count = export_json(&store, path)
        .with_context(|| format!("exporting to {}", path.display()))?;

    println!("✓ Exported {} recipes to: {}", count, path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, names: &[String]) -> anyhow::Result<()> {
    use recipe_harvest::crawler::crawl;
    use recipe_harvest::output::print_site_reports;

    let sites = config.select_sites(names)?;
    tracing::info!(
        "Crawling {} sites: {}",
        sites.len(),
        sites.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );

    let store = Arc::new(
        open_storage(Path::new(&config.output.database_path))
            .with_context(|| format!("opening {}", config.output.database_path))?,
    );

    match crawl(config, config_hash, sites, store).await {
        Ok(reports) => {
            tracing::info!("Crawl completed successfully");
            print_site_reports(&reports);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
