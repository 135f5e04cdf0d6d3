/// URL for accessing the PostgreSQL database (should contain a schema name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. Uses [tracing_subscriber::EnvFilter] directives,
/// such as "info" or "todo_planner=debug,sqlx=warn"
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Address the HTTP server listens on. Defaults to [DEFAULT_LISTEN_ADDR].
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Base URL of the identity provider's REST API. Defaults to
/// [DEFAULT_IDENTITY_API_URL][crate::persistence::http_identity_driven_ports::DEFAULT_IDENTITY_API_URL].
pub const IDENTITY_API_URL: &str = "IDENTITY_API_URL";
/// Web API key for the identity provider project
pub const IDENTITY_API_KEY: &str = "IDENTITY_API_KEY";
/// Minutes east of UTC used to decide calendar days when a request doesn't say. Falls back to
/// the server's own offset.
pub const DEFAULT_UTC_OFFSET_MINUTES: &str = "DEFAULT_UTC_OFFSET_MINUTES";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";
