use anyhow::Context;
use chrono::{FixedOffset, Local};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use todo_planner::persistence::http_identity_driven_ports::{
    DEFAULT_IDENTITY_API_URL, HttpIdentityProvider,
};
use todo_planner::{SharedData, api, app_env, logging, persistence};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let otel_exporters = match (
        env::var(app_env::OTEL_SPAN_EXPORT_URL),
        env::var(app_env::OTEL_METRIC_EXPORT_URL),
    ) {
        (Ok(span_url), Ok(metric_url)) => Some(logging::init_exporters(&span_url, &metric_url)?),
        _ => None,
    };
    logging::setup_logging_and_tracing(logging::init_env_filter()?, otel_exporters);

    let db_url = env::var(app_env::DB_URL)
        .with_context(|| format!("{} must be set", app_env::DB_URL))?;
    info!("Connecting to database");
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await
        .context("could not connect to the database")?;
    sqlx::migrate!()
        .run(&db)
        .await
        .context("could not run database migrations")?;

    let identity_api_url =
        env::var(app_env::IDENTITY_API_URL).unwrap_or_else(|_| DEFAULT_IDENTITY_API_URL.to_owned());
    let identity_api_key = env::var(app_env::IDENTITY_API_KEY).unwrap_or_else(|_| {
        warn!("{} is not set, authentication requests will fail", app_env::IDENTITY_API_KEY);
        String::new()
    });

    let shared_data = Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(db)?,
        identity_provider: HttpIdentityProvider::new(identity_api_url, identity_api_key),
        default_utc_offset: default_utc_offset()?,
    });
    let router = api::build_router(shared_data);

    let listen_addr = env::var(app_env::LISTEN_ADDR)
        .unwrap_or_else(|_| app_env::DEFAULT_LISTEN_ADDR.to_owned());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("could not listen on {listen_addr}"))?;
    info!("Starting server on {listen_addr}");
    axum::serve(listener, router)
        .await
        .context("server stopped unexpectedly")?;

    Ok(())
}

/// Reads [app_env::DEFAULT_UTC_OFFSET_MINUTES], falling back to the server's current local offset
fn default_utc_offset() -> anyhow::Result<FixedOffset> {
    let Ok(raw_minutes) = env::var(app_env::DEFAULT_UTC_OFFSET_MINUTES) else {
        return Ok(*Local::now().offset());
    };

    let minutes: i32 = raw_minutes.trim().parse().with_context(|| {
        format!("{} must be a whole number of minutes", app_env::DEFAULT_UTC_OFFSET_MINUTES)
    })?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .with_context(|| {
            format!("{} must be within 24 hours of UTC", app_env::DEFAULT_UTC_OFFSET_MINUTES)
        })
}
