use anyhow::{Context, Result};
use clap::Parser;
use listen_log::db::Database;
use listen_log::importer::spotify::{DEFAULT_API_BASE, SpotifyClient};
use listen_log::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listen-log")]
#[command(about = "Listen Log Server", long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(short, long, env = "LISTEN_LOG_DATABASE", default_value = "data/listen-log.db")]
    database: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "LISTEN_LOG_PORT", default_value = "3000")]
    port: u16,

    /// Base URL of the streaming service Web API
    #[arg(long, env = "LISTEN_LOG_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Seconds to wait for the streaming service before giving up on an import
    #[arg(long, env = "LISTEN_LOG_IMPORT_TIMEOUT_SECS", default_value = "5")]
    import_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("listen_log=debug,tower_http=debug")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    if cli.import_timeout_secs == 0 {
        anyhow::bail!("Import timeout must be at least one second");
    }

    tracing::info!("Starting Listen Log");
    tracing::info!("Database path: {}", cli.database.display());

    let db = Database::connect(&cli.database)
        .await
        .context("Failed to open database")?;

    let source = SpotifyClient::new(cli.api_base, Duration::from_secs(cli.import_timeout_secs))
        .context("Failed to create streaming API client")?;

    let app = server::create_router(AppState::new(&db, Arc::new(source)));
    let addr = format!("0.0.0.0:{}", cli.port);

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /                          - API info");
    tracing::info!("  GET  /identities                - List identities");
    tracing::info!("  POST /identities                - Register identity, import history");
    tracing::info!("  GET  /artists                   - List artists");
    tracing::info!("  GET  /artists/search?artist=    - Songs for an artist");
    tracing::info!("  GET  /suggestions               - List suggestions");
    tracing::info!("  POST /suggestions               - Submit a suggestion");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
