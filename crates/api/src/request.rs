//! Header and cookie helpers shared by the middleware and handlers.

use axum::extract::Request;
use axum::http::{HeaderMap, header};

use gatehouse_auth::{CheckRequest, SessionKey};

/// Cookie carrying the session key.
pub const SESSION_COOKIE: &str = "session_id";

/// Cookie carrying a signed token.
pub const JWT_COOKIE: &str = "jwt";

/// Header set by XHR-style (Inertia) page visits.
pub const INERTIA_HEADER: &str = "x-inertia";

/// Value of cookie `name`, searching every `Cookie` header.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// True when `Accept` mentions JSON.
pub fn wants_json(headers: &HeaderMap) -> bool {
    header_str(headers, header::ACCEPT).is_some_and(|accept| accept.contains("json"))
}

pub fn is_inertia(headers: &HeaderMap) -> bool {
    headers.contains_key(INERTIA_HEADER)
}

/// JSON responses go to API clients only; XHR page visits always get the
/// redirect flow.
pub fn responds_with_json(headers: &HeaderMap) -> bool {
    wants_json(headers) && !is_inertia(headers)
}

pub fn content_type(headers: &HeaderMap) -> &str {
    header_str(headers, header::CONTENT_TYPE).unwrap_or_default()
}

/// Where "go back" leads: the `Referer`, else `/`.
pub fn back_url(headers: &HeaderMap) -> String {
    header_str(headers, header::REFERER)
        .filter(|referer| !referer.is_empty())
        .unwrap_or("/")
        .to_string()
}

/// Credentials carried by `req`, for [`Authenticator::check`](gatehouse_auth::Authenticator::check).
pub fn check_request(req: &Request) -> CheckRequest {
    let headers = req.headers();
    CheckRequest {
        session: req.extensions().get::<SessionKey>().cloned(),
        jwt_cookie: cookie(headers, JWT_COOKIE).map(str::to_string),
        authorization: header_str(headers, header::AUTHORIZATION).map(str::to_string),
    }
}
