//! Fixture Registry Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! fixture-registry
//!
//! # Custom config, port and data directory
//! fixture-registry --config /etc/fixture-registry.toml --http-port 9000 --data-dir /data
//!
//! # Load a seed file before serving
//! fixture-registry --seed fixtures.json
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fixture_registry::services::events::spawn_logging_listener;
use fixture_registry::{Config, HttpServer, RegistryDb, SeedFile, Services};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fixture-registry")]
#[command(about = "Lighting fixture directory with endorsements and certification")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "FIXTURE_REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the database and default config
    #[arg(long, env = "FIXTURE_REGISTRY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "FIXTURE_REGISTRY_PORT")]
    http_port: Option<u16>,

    /// JSON seed file to load on startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Load the seed and exit without serving
    #[arg(long, requires = "seed")]
    seed_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fixture_registry=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    config.validate()?;

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        "Starting fixture-registry"
    );

    tokio::fs::create_dir_all(&config.data_dir).await?;

    let config_path = config.config_path();
    if args.config.is_none() && !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(RegistryDb::open(&config.database_path(), config.pool_size)?);
    let services = Arc::new(Services::new(db.clone(), &config));
    let listener = spawn_logging_listener(services.events.clone());

    if let Some(seed_path) = &args.seed {
        let seed = SeedFile::load(seed_path)
            .with_context(|| format!("reading seed {}", seed_path.display()))?;
        let result = fixture_registry::seed::apply(&services, seed)?;
        for e in &result.errors {
            error!("  {}", e);
        }
    }

    if !args.seed_only {
        let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
        let http_server = Arc::new(HttpServer::new(services.clone(), http_addr));

        info!("HTTP API available at http://{}", http_addr);
        info!("  GET  /fixtures/{{idOrSlug}}/similar            - Similar fixtures");
        info!("  POST /fixtures/{{slug}}/endorsements/{{cat}}/vote - Cast a vote");
        info!("  POST /endorsement-issues/certify/{{fixtureId}}   - Evaluate certification");
        info!("Press Ctrl+C to stop.");

        let shutdown = async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        };

        tokio::select! {
            result = http_server.run() => {
                if let Err(e) = result {
                    error!(error = %e, "HTTP server error");
                }
            }
            _ = shutdown => {}
        }
    }

    listener.abort();

    if let Ok(stats) = db.stats() {
        info!(
            fixtures = stats.fixture_count,
            votes = stats.vote_count,
            certified = stats.certified_count,
            "Final registry stats"
        );
    }

    Ok(())
}
