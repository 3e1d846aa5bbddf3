//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let namespaces = state.config.target_namespaces();
    let scope = if namespaces.is_empty() {
        "all namespaces".to_string()
    } else {
        namespaces.join(", ")
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Trivy Metrics Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 900px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Trivy Metrics Exporter</h1>
    <p>Version <code>{version}</code>, up {uptime}, collecting from {scope}.</p>
    <ul>
        <li><a href="/metrics">/metrics</a> Prometheus metrics</li>
        <li><a href="/health">/health</a> Report cache status (JSON)</li>
    </ul>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        scope = scope,
    );

    Html(html)
}
