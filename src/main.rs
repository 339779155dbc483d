use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use yodda::build::FsArtifactStore;
use yodda::config::Config;
use yodda::{YoddaState, db, yodda_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        public_base_url = %cfg.basic.public_base_url,
        builds_dir = %cfg.basic.builds_dir.display(),
        proxy = %cfg.providers.defaults.proxy.as_ref().map_or("<none>", |u| u.as_str()),
        fallback_provider = %cfg.providers.fallback.provider,
        fallback_key = if cfg.providers.fallback.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "<redacted>"
        } else {
            "<unset>"
        },
        jwt_secret = "<redacted>",
    );

    tokio::fs::create_dir_all(&cfg.basic.builds_dir).await?;
    let store = db::spawn(&cfg.basic.database_url).await?;
    let artifacts = FsArtifactStore::new(cfg.basic.builds_dir.clone());

    let state = YoddaState::new(&cfg, Arc::new(store), Arc::new(artifacts))?;
    let app = yodda_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
