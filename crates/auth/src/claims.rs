use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Registered JWT claims (RFC 7519 §4.1).
///
/// Used both as the configured template and as the per-login payload.
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject: the authenticated identity's id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Full token payload: registered claims plus the username, so a verified
/// token yields a complete [`AuthUser`](crate::AuthUser).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub registered: RegisteredClaims,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Token strategy configuration.
#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    /// Template merged into every issued token.
    pub claims: RegisteredClaims,

    /// Lifetime applied when the template carries no `exp`.
    pub ttl: Option<Duration>,

    /// HMAC secret. When unset, `JWT_SECRET` is read at build time.
    pub secret: Option<String>,
}

impl TokenConfig {
    pub fn new(claims: RegisteredClaims) -> Self {
        Self {
            claims,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

impl TokenClaims {
    /// Merge the template with a per-login subject.
    ///
    /// Template fields win, except `sub`, which is always the identity's id.
    /// When `ttl` is given and the template has no `exp`, `iat`/`exp` are
    /// derived from `now`. The template itself is never modified.
    pub fn for_identity(
        template: &RegisteredClaims,
        ttl: Option<Duration>,
        identity: &(impl Identity + ?Sized),
        now: DateTime<Utc>,
    ) -> Self {
        let mut registered = template.clone();
        registered.sub = Some(identity.id().to_string());

        if let (Some(ttl), None) = (ttl, registered.exp) {
            registered.iat.get_or_insert(now.timestamp());
            registered.exp = Some((now + ttl).timestamp());
        }

        Self {
            registered,
            username: Some(identity.username().to_string()),
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.registered.sub.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CredUser;

    fn user() -> CredUser {
        CredUser::new(9u64, "alice@example.com", "$2b$04$x")
    }

    #[test]
    fn subject_is_always_the_identity() {
        let template = RegisteredClaims {
            iss: Some("gatehouse".to_string()),
            sub: Some("someone-else".to_string()),
            ..Default::default()
        };

        let claims = TokenClaims::for_identity(&template, None, &user(), Utc::now());

        assert_eq!(claims.subject(), Some("9"));
        assert_eq!(claims.registered.iss.as_deref(), Some("gatehouse"));
        assert_eq!(claims.username.as_deref(), Some("alice@example.com"));
        // template untouched
        assert_eq!(template.sub.as_deref(), Some("someone-else"));
    }

    #[test]
    fn ttl_fills_expiry_only_when_template_has_none() {
        let now = Utc::now();
        let ttl = Duration::minutes(10);

        let claims = TokenClaims::for_identity(&RegisteredClaims::default(), Some(ttl), &user(), now);
        assert_eq!(claims.registered.iat, Some(now.timestamp()));
        assert_eq!(claims.registered.exp, Some((now + ttl).timestamp()));

        let fixed = RegisteredClaims {
            exp: Some(42),
            ..Default::default()
        };
        let claims = TokenClaims::for_identity(&fixed, Some(ttl), &user(), now);
        assert_eq!(claims.registered.exp, Some(42));
        assert_eq!(claims.registered.iat, None);
    }

    #[test]
    fn unset_claims_are_not_serialized() {
        let claims = TokenClaims::for_identity(&RegisteredClaims::default(), None, &user(), Utc::now());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sub": "9", "username": "alice@example.com"})
        );
    }
}
