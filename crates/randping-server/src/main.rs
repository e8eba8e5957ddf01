mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use randping_api::{AppState, AppStateInner};
use randping_core::dispatcher::DispatcherConfig;
use randping_core::geo::FixedCountry;
use randping_core::push::{PushTransport, RelayTransport, TracingTransport};
use randping_core::{Accounts, DispatchTrigger, Dispatcher, PingEngine};
use randping_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "randping=debug,randping_api=debug,randping_core=debug,randping_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let public_key = config.public_key().unwrap_or_else(|| {
        warn!("No VAPID public key configured, clients will not be able to subscribe");
        String::new()
    });

    // Init database
    let db = Database::open(&config.db_path)?;

    let transport: Arc<dyn PushTransport> = match &config.push_relay_url {
        Some(url) => {
            info!("Delivering notifications through relay {}", url);
            Arc::new(RelayTransport::new(url.clone())?)
        }
        None => {
            warn!("RANDPING_PUSH_RELAY_URL not set, notifications are only logged");
            Arc::new(TracingTransport)
        }
    };

    // Services
    let accounts = Accounts::new(db.clone(), transport.clone());
    let (trigger, queue) = DispatchTrigger::channel();
    let pings = PingEngine::new(db.clone(), trigger.clone()).with_cooldown(config.ping_cooldown);
    let dispatcher = Dispatcher::new(db, accounts.clone(), transport, DispatcherConfig::default());
    let worker = dispatcher.spawn_worker(queue);

    // Drain pings left waiting by a previous run
    trigger.notify();

    let state: AppState = Arc::new(AppStateInner {
        accounts,
        pings,
        geo: Arc::new(FixedCountry(config.default_country.clone())),
        public_key,
        trust_forwarded_for: config.trust_forwarded_for,
    });

    let app = randping_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("randping listening on {}", addr);
    info!("Ping cooldown: {}s", config.ping_cooldown.as_secs());

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Dropping the router released every trigger handle except ours
    drop(trigger);
    if let Err(e) = worker.await {
        warn!("Dispatch worker ended abnormally: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
