//! Environment-driven settings for the API binary.
//!
//! | variable | default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `AUTH_STRATEGY` | `session` (`session`, `token`, `both`) |
//! | `JWT_SECRET` | unset; required for the token strategy |
//! | `JWT_ISSUER` | unset |
//! | `JWT_TTL_SECS` | `3600` |
//! | `SESSION_TTL_SECS` | `7200` |
//! | `HOME_ROUTE` | `/home` |
//! | `DATABASE_URL` | unset; in-memory stores are used |

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, bail};

use gatehouse_auth::authenticator::{DEFAULT_HOME_ROUTE, JWT_SECRET_ENV};
use gatehouse_auth::session::DEFAULT_SESSION_TTL_SECS;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_TTL_SECS: i64 = 60 * 60;

/// Which identity persistence the authenticator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Session,
    Token,
    Both,
}

impl AuthStrategy {
    pub fn sessions(self) -> bool {
        matches!(self, Self::Session | Self::Both)
    }

    pub fn tokens(self) -> bool {
        matches!(self, Self::Token | Self::Both)
    }
}

impl FromStr for AuthStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "token" | "jwt" => Ok(Self::Token),
            "both" => Ok(Self::Both),
            other => bail!("unknown AUTH_STRATEGY {other:?} (expected session, token or both)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub strategy: AuthStrategy,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub home_route: String,
    pub database_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let strategy = match var("AUTH_STRATEGY") {
            Some(raw) => raw.parse()?,
            None => AuthStrategy::Session,
        };

        Ok(Self {
            bind_addr,
            strategy,
            jwt_secret: var(JWT_SECRET_ENV),
            jwt_issuer: var("JWT_ISSUER"),
            jwt_ttl_secs: seconds(var("JWT_TTL_SECS"), "JWT_TTL_SECS", DEFAULT_JWT_TTL_SECS)?,
            session_ttl_secs: seconds(var("SESSION_TTL_SECS"), "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            home_route: var("HOME_ROUTE").unwrap_or_else(|| DEFAULT_HOME_ROUTE.to_string()),
            database_url: var("DATABASE_URL"),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            strategy: AuthStrategy::Session,
            jwt_secret: None,
            jwt_issuer: None,
            jwt_ttl_secs: DEFAULT_JWT_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            home_route: DEFAULT_HOME_ROUTE.to_string(),
            database_url: None,
        }
    }
}

fn seconds(raw: Option<String>, name: &str, default: i64) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let secs: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a whole number of seconds"))?;
    if secs <= 0 {
        bail!("{name} must be positive");
    }
    Ok(secs)
}
