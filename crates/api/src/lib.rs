//! HTTP API: session transport, guards, tenant resolution and the
//! login / registration routes.

pub mod app;
pub mod config;
pub mod context;
pub mod flash;
pub mod middleware;
pub mod request;
pub mod tenant;
