use axum::extract::State;
use chrono::FixedOffset;
use std::sync::Arc;

pub mod api;
pub mod app_env;
pub mod domain;
pub mod dto;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod routing_utils;


/// Everything request handlers need that outlives a single request
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub identity_provider: persistence::http_identity_driven_ports::HttpIdentityProvider,
    /// Offset used to decide calendar days when a request doesn't name one
    pub default_utc_offset: FixedOffset,
}

pub type AppState = State<Arc<SharedData>>;
