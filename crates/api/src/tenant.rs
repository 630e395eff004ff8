//! Tenant-resolution middleware.
//!
//! Gathers the candidate handles of a request into [`TenantSources`], looks
//! the winning handle up in the org directory and attaches a
//! [`TenantContext`]. The body is buffered for inspection and handed on
//! unchanged.

use std::collections::HashMap;
use std::error::Error as StdError;

use axum::{
    Form, Json,
    body::{Body, Bytes, to_bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::json;
use tracing::{debug, error, info};

use gatehouse_auth::tenant::{ORG_USERNAME_FIELD, TENANT_HEADER};
use gatehouse_auth::{SessionKey, TenantSources, resolve_handle};
use gatehouse_core::ValidationErrors;

use crate::app::AppState;
use crate::app::errors::json_error;
use crate::context::TenantContext;
use crate::{flash, request};

pub const ORG_NOT_FOUND: &str = "Org not found";

/// Largest body the resolver buffers.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub async fn resolve_tenant(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(directory) = state.auth.org_directory().cloned() else {
        error!("tenant resolver invoked without an org directory");
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "tenant_unavailable",
            "org directory is not configured",
        );
    };

    let (parts, body) = req.into_parts();
    let mut sources = TenantSources {
        header: request::header_str(&parts.headers, TENANT_HEADER).map(str::to_string),
        // HTTP/2 carries the host in the URI authority instead.
        host: request::header_str(&parts.headers, header::HOST)
            .or_else(|| parts.uri.host())
            .map(str::to_string),
        ..Default::default()
    };

    let body = if sources.has_header() {
        body
    } else {
        let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(err) if exceeds_limit(&err) => {
                debug!(limit = MAX_BODY_BYTES, "request body too large for tenant resolution");
                return json_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "body_too_large",
                    "request body is too large",
                );
            }
            Err(err) => {
                error!(error = %err, "failed to buffer request body");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "body_unreadable",
                    "request body could not be read",
                );
            }
        };
        read_body_field(&parts.headers, &bytes, &mut sources).await;
        Body::from(bytes)
    };
    let mut req = Request::from_parts(parts, body);

    let handle = resolve_handle(&sources);
    let org = if handle.is_empty() {
        None
    } else {
        match directory.find_by_username(&handle).await {
            Ok(org) => org,
            Err(err) => {
                error!(error = %err, handle = %handle, "org lookup failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "tenant_lookup_failed",
                    "org lookup failed",
                );
            }
        }
    };

    match org {
        Some(org) => {
            info!(org_id = %org.id, "tenant resolved");
            req.extensions_mut().insert(TenantContext::new(org.id));
            next.run(req).await
        }
        None => {
            debug!(handle = %handle, "tenant not resolved");
            reject(&state, req).await
        }
    }
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut cause: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = cause {
        if current.is::<LengthLimitError>() {
            return true;
        }
        cause = current.source();
    }
    false
}

async fn reject(state: &AppState, req: Request) -> Response {
    let (parts, _) = req.into_parts();
    if request::responds_with_json(&parts.headers) {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": ORG_NOT_FOUND }))).into_response();
    }

    let errors = ValidationErrors::field(ORG_USERNAME_FIELD, ORG_NOT_FOUND);
    flash::back_with_errors(&state.auth, parts.extensions.get::<SessionKey>(), &parts.headers, &errors).await
}

/// Fill the body-borne candidate: the JSON field for JSON and XHR-style
/// requests, the form field for urlencoded and multipart ones. Bodies that
/// do not decode leave the field absent.
async fn read_body_field(headers: &HeaderMap, bytes: &Bytes, sources: &mut TenantSources) {
    let content_type = request::content_type(headers);

    if request::is_inertia(headers) || content_type.contains("json") {
        sources.json_field = serde_json::from_slice::<serde_json::Value>(bytes)
            .ok()
            .and_then(|body| body.get(ORG_USERNAME_FIELD)?.as_str().map(str::to_string));
    } else if content_type.starts_with("application/x-www-form-urlencoded")
        || content_type.starts_with("multipart/form-data")
    {
        sources.form_field = form_field(content_type, bytes.clone()).await;
    }
}

async fn form_field(content_type: &str, bytes: Bytes) -> Option<String> {
    let req = axum::http::Request::post("/")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .ok()?;

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &()).await.ok()?;
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some(ORG_USERNAME_FIELD) {
                return field.text().await.ok();
            }
        }
        None
    } else {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, &()).await.ok()?;
        fields.get(ORG_USERNAME_FIELD).cloned()
    }
}
