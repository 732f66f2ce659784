//! Gatehouse bot entrypoint wiring the gateway, the REST client, persisted state and the keep-alive server.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse_bot::{
    config::AppConfig,
    dao::state_store::JsonFileStore,
    platform::{
        gateway::{self, GatewayConfig},
        rest::{DiscordRest, RestConfig},
    },
    routes,
    services::{counting, dispatcher, startup},
    state::AppState,
};

/// Inbound events buffered between the gateway reader and the dispatcher.
const EVENT_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    let rest = DiscordRest::new(RestConfig {
        api_base: config.api_base.clone(),
        token: config.token.clone(),
        application_id: config.application_id,
    })
    .context("building Discord REST client")?;
    let store = JsonFileStore::new(&config.state_dir);
    let gateway_config = GatewayConfig::new(config.gateway_url.clone(), config.token.clone());
    let filler_period = config.filler_period;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState::restore(config, Arc::new(rest), Arc::new(store)).await;
    startup::synchronize(&state).await;

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    tokio::spawn(dispatcher::run(state.clone(), events_rx));
    tokio::spawn(counting::run_filler_schedule(filler_period, events_tx.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .context("binding keep-alive server")?;
    info!(%addr, "starting keep-alive server");
    let server = axum::serve(listener, routes::router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = gateway::run(gateway_config, events_tx) => {
            result.context("gateway connection failed")?;
        }
        result = server => {
            result.context("serving keep-alive routes")?;
            info!("shutdown requested");
        }
    }

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
