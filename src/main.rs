use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use talks_scraper::catalog::client::{CatalogClient, TalkPageSource};
use talks_scraper::config::Config;
use talks_scraper::db::Database;
use talks_scraper::{logging, server, tasks};
use tracing::info;

#[derive(Parser)]
#[command(name = "talks_scraper")]
#[command(about = "Talk catalog scraper and search backend")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pass (fetch, project, persist) and exit.
    /// Exits non-zero on failure, so it slots into cron.
    Scrape,
    /// Serve the query API, exports, and the manual scrape trigger
    Serve {
        /// Port to bind (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let source: Arc<dyn TalkPageSource> = Arc::new(CatalogClient::new(
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_seconds),
    )?);

    match cli.command {
        Commands::Scrape => {
            info!("starting catalog scrape");
            let summary = tasks::run_ingest(source.as_ref(), &db, &config).await?;
            println!(
                "Scrape complete: {} items fetched, {} talks, {} instructors, {} tags",
                summary.fetched_items, summary.talks, summary.instructors, summary.tags
            );
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let state = Arc::new(server::AppState { db, source, config });
            server::run_server(state, port).await?;
        }
    }

    Ok(())
}
