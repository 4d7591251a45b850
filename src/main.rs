use anyhow::{Context, Result};
use clap::Parser;
use meeting_intake::{create_router, AppState, Config};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Accepts meeting recordings and starts diarization + transcription jobs
#[derive(Debug, Parser)]
#[command(name = "meeting-intake", version)]
struct Cli {
    /// Config file, without extension
    #[arg(long, default_value = "config/meeting-intake")]
    config: String,

    /// Override `service.http.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Override `service.http.port`
    #[arg(long)]
    port: Option<u16>,

    /// Override `storage.sound_root`
    #[arg(long)]
    sound_root: Option<PathBuf>,

    /// Override `storage.results_root`
    #[arg(long)]
    results_root: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(self, cfg: &mut Config) {
        if let Some(bind) = self.bind {
            cfg.service.http.bind = bind;
        }
        if let Some(port) = self.port {
            cfg.service.http.port = port;
        }
        if let Some(root) = self.sound_root {
            cfg.storage.sound_root = root;
        }
        if let Some(root) = self.results_root {
            cfg.storage.results_root = root;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meeting_intake=debug,tower_http=debug"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut cfg = Config::load(&cli.config)?;
    cli.apply(&mut cfg);

    info!("Meeting Intake v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Sound files: {}", cfg.storage.sound_root.display());
    info!("Results: {}", cfg.storage.results_root.display());
    info!("Job runner: {}", cfg.jobs.program);

    let state = AppState::from_config(&cfg);
    let registry = state.registry.clone();
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let pending = registry.active_meetings().await;
    if pending > 0 {
        info!("Waiting for background jobs of {} meeting(s)", pending);
        registry.wait_all().await;
    }

    Ok(())
}
