//! The embedded chat page.
//!
//! `frontend/` is compiled into the binary with `include_str!`, so the
//! gateway ships as a single file.

use axum::{
    Router,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};

const INDEX_HTML: &str = include_str!("../../../frontend/index.html");
const STYLE_CSS: &str = include_str!("../../../frontend/style.css");
const APP_JS: &str = include_str!("../../../frontend/app.js");

/// Routes for the chat page and its assets.
pub fn frontend_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/static/style.css", get(css_handler))
        .route("/static/app.js", get(js_handler))
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn css_handler() -> Response {
    asset("text/css; charset=utf-8", STYLE_CSS)
}

async fn js_handler() -> Response {
    asset("application/javascript; charset=utf-8", APP_JS)
}

fn asset(content_type: &'static str, body: &'static str) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}
