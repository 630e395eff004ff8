//! Backend wiring: in-memory stores for dev/tests, Postgres when
//! `DATABASE_URL` is set.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{debug, info};

use gatehouse_auth::{AuthResult, Authenticator, InMemorySessionStore, OrgDirectory, RegisteredClaims, TokenConfig};
use gatehouse_infra::schema::ensure_schema;
use gatehouse_infra::{
    InMemoryOrgStore, InMemoryUserStore, OrgRepository, PostgresOrgStore, PostgresRegistrar, PostgresUserStore,
    Registrar, StoreRegistrar, UserStore,
};

use crate::config::Settings;

/// Shared backends. The org store is held once per capability it serves.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<InMemorySessionStore>,
    pub org_directory: Arc<dyn OrgDirectory>,
    pub orgs: Arc<dyn OrgRepository>,
    pub users: Arc<dyn UserStore>,
    pub registrar: Arc<dyn Registrar>,
}

pub fn build_in_memory_services(session_ttl_secs: i64) -> Services {
    let orgs = Arc::new(InMemoryOrgStore::new());
    let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    Services {
        sessions: Arc::new(InMemorySessionStore::with_ttl(chrono::Duration::seconds(session_ttl_secs))),
        org_directory: orgs.clone(),
        registrar: Arc::new(StoreRegistrar::new(orgs.clone(), users.clone())),
        orgs,
        users,
    }
}

pub async fn build_postgres_services(database_url: &str, session_ttl_secs: i64) -> anyhow::Result<Services> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    ensure_schema(&pool).await.context("failed to apply schema")?;

    let orgs = Arc::new(PostgresOrgStore::new(pool.clone()));
    Ok(Services {
        sessions: Arc::new(InMemorySessionStore::with_ttl(chrono::Duration::seconds(session_ttl_secs))),
        org_directory: orgs.clone(),
        orgs,
        users: Arc::new(PostgresUserStore::new(pool.clone())),
        registrar: Arc::new(PostgresRegistrar::new(pool)),
    })
}

pub async fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    match settings.database_url.as_deref() {
        Some(url) => {
            info!("using postgres stores");
            build_postgres_services(url, settings.session_ttl_secs).await
        }
        None => {
            info!("using in-memory stores");
            Ok(build_in_memory_services(settings.session_ttl_secs))
        }
    }
}

/// Configure the authenticator for `settings`.
///
/// Fails with `NoSecret` when tokens are enabled without a secret.
pub fn build_authenticator(settings: &Settings, services: &Services) -> AuthResult<Authenticator> {
    let mut builder = Authenticator::builder()
        .with_home_route(settings.home_route.clone())
        .with_org_directory(services.org_directory.clone());

    if settings.strategy.sessions() {
        builder = builder.with_session_store(services.sessions.clone());
    }

    if settings.strategy.tokens() {
        let claims = RegisteredClaims {
            iss: settings.jwt_issuer.clone(),
            ..Default::default()
        };
        let mut config =
            TokenConfig::new(claims).with_ttl(chrono::Duration::seconds(settings.jwt_ttl_secs));
        if let Some(secret) = &settings.jwt_secret {
            config = config.with_secret(secret.clone());
        }
        builder = builder.with_token_config(config);
    }

    builder.build()
}

/// Periodically drop expired sessions.
pub fn spawn_session_reaper(sessions: Arc<InMemorySessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    })
}
