use std::time::Duration;

use anyhow::Context;

use gatehouse_api::app::{AppState, build_app, services};
use gatehouse_api::config::Settings;
use gatehouse_auth::global;

const SESSION_REAP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let settings = Settings::from_env()?;
    let services = services::build_services(&settings).await?;

    // Aborts start-up on NoSecret.
    let authenticator =
        services::build_authenticator(&settings, &services).context("failed to configure authenticator")?;
    let auth = global::install(authenticator)?;
    tracing::info!(?auth, "authenticator installed");

    services::spawn_session_reaper(services.sessions.clone(), SESSION_REAP_INTERVAL);

    let app = build_app(AppState::new(auth, &services));

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
