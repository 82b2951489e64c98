use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use tl_assistants::{Role, ThreadMessage};

use crate::api::ApiError;
use crate::state::AppState;

/// `thread_id` may arrive in the query string or in a JSON body.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryParams>,
    body: Bytes,
) -> Result<Json<HistoryResponse>, ApiError> {
    let thread_id = match non_empty(query.thread_id) {
        Some(t) => t,
        None => body_thread_id(&body)?
            .ok_or_else(|| ApiError::bad_request("thread_id is required"))?,
    };

    let messages = state.assistants.list_all_messages(&thread_id).await?;
    Ok(Json(HistoryResponse {
        history: oldest_first(messages),
    }))
}

/// The service lists newest first; learners read oldest first.
pub fn oldest_first(messages: Vec<ThreadMessage>) -> Vec<HistoryEntry> {
    messages
        .into_iter()
        .rev()
        .map(|m| HistoryEntry {
            role: m.role,
            content: m.text().to_owned(),
        })
        .collect()
}

fn body_thread_id(body: &[u8]) -> Result<Option<String>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let params: HistoryParams = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    Ok(non_empty(params.thread_id))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_assistants::{ContentPart, TextContent};

    fn msg(id: &str, role: Role, text: &str) -> ThreadMessage {
        ThreadMessage {
            id: id.into(),
            role,
            content: vec![ContentPart::Text {
                text: TextContent { value: text.into() },
            }],
            created_at: 0,
        }
    }

    #[test]
    fn reverses_service_order() {
        let newest_first = vec![
            msg("m3", Role::Assistant, "third"),
            msg("m2", Role::User, "second"),
            msg("m1", Role::User, "first"),
        ];
        let contents: Vec<_> = oldest_first(newest_first)
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn body_thread_id_parsing() {
        assert_eq!(body_thread_id(b"").unwrap(), None);
        assert_eq!(body_thread_id(b"  \n").unwrap(), None);
        assert_eq!(
            body_thread_id(br#"{"thread_id":"thread_9"}"#).unwrap().as_deref(),
            Some("thread_9")
        );
        assert_eq!(body_thread_id(br#"{"thread_id":""}"#).unwrap(), None);
        assert!(body_thread_id(b"{not json").is_err());
    }
}
