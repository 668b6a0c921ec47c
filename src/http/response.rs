//! Responses the proxy writes on its own behalf.
//!
//! Relayed upstream responses are never touched here; see `proxy::relay`.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const RELOAD_ACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Reload Successful</title>
    <style>
        body { font-family: -apple-system, sans-serif; margin: 2em; }
        h1 { color: #4CAF50; }
    </style>
</head>
<body>
    <h1>Rules Reloaded</h1>
    <p>Rules reloaded successfully.</p>
</body>
</html>
"#;

/// Acknowledgement for a successful rule reload.
pub fn reload_ack() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        RELOAD_ACK_PAGE,
    )
        .into_response()
}
