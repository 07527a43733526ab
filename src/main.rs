use anyhow::Result;
use axum::Router;
use smart_grid_controller::{api, config, engine, telemetry};

use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    // Topology construction is the only fatal startup step.
    let app_state = engine::AppState::new(cfg.clone())?;

    let app: Router = api::router(app_state.clone(), &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!(
            "Server binding to 0.0.0.0 - service will be accessible from the network! \
            For production, bind to 127.0.0.1 unless behind a firewall/reverse proxy."
        );
    }

    info!(%addr, "starting Smart Grid Controller");

    let (cancel, engine_task) = engine::spawn_engine_tasks(app_state.clone(), cfg.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    // Stop the background loop cooperatively and wait for it; an
    // in-flight episode finishes and publishes before the task exits.
    cancel.cancel();
    engine_task.await?;

    warn!("shutdown complete");
    Ok(())
}
