pub mod chat;
pub mod error;
pub mod health;
pub mod history;
pub mod thread;

use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub use error::ApiError;

/// Build the API router.  The caller attaches state and middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/thread", get(thread::get_thread))
        .route("/chat", post(chat::chat))
        .route("/history", post(history::history))
        .route("/health", get(health::health))
}

/// Raw cookie string for identity decoding: the configured header first,
/// then the standard `Cookie` header.
pub(crate) fn cookie_header<'a>(headers: &'a HeaderMap, configured: &str) -> Option<&'a str> {
    headers
        .get(configured)
        .or_else(|| headers.get(header::COOKIE))
        .and_then(|v| v.to_str().ok())
}
