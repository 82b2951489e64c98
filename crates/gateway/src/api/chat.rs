//! `POST /chat`: ask the tutor a question and stream the answer back one
//! character at a time as `text/event-stream`.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use tl_domain::error::Error;
use tl_domain::trace::TraceEvent;

use crate::api::{cookie_header, ApiError};
use crate::runtime::emit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let thread_id = chat_thread(&state, &headers, body.thread_id.as_deref()).await?;

    // Only run failures carry their own message to the client.
    // The wait ends early if the server shuts down; if the client goes
    // away axum drops this future and the wait with it.
    let cancel = state.shutdown.child_token();
    let answer = state
        .waiter
        .ask(&thread_id, &body.question, &state.assistant_id, &cancel)
        .await
        .map_err(ApiError::exposed)?;

    let stream = paced_body(thread_id, answer, state.config.runs.stream_delay());
    Ok((
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Pick the thread for a chat turn.
///
/// With an identity cookie the learner's own thread is resolved, using the
/// supplied `thread_id` as the candidate.  Without one, the supplied thread
/// is used as-is, or a fresh thread not bound to anyone is created.
async fn chat_thread(
    state: &AppState,
    headers: &HeaderMap,
    supplied: Option<&str>,
) -> Result<String, Error> {
    let raw = cookie_header(headers, &state.config.identity.header_name);
    match state.decoder.decode(raw) {
        Ok(identity) => {
            state
                .resolver
                .resolve(&identity, &state.assistant_id, supplied)
                .await
        }
        Err(Error::MissingCredential) => match supplied.filter(|t| !t.is_empty()) {
            Some(thread_id) => Ok(thread_id.to_owned()),
            None => {
                let thread_id = state.assistants.create_thread().await?;
                tracing::info!(thread_id = %thread_id, "anonymous chat thread created");
                Ok(thread_id)
            }
        },
        Err(e) => Err(e),
    }
}

fn paced_body(
    thread_id: String,
    answer: String,
    delay: Duration,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    async_stream::stream! {
        let chars = answer.chars().count();
        let chunks = emit(answer, delay);
        futures_util::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            yield Ok(chunk);
        }
        TraceEvent::AnswerStreamed { thread_id, chars }.emit();
    }
}
