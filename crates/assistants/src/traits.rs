use tl_domain::error::Result;

use crate::types::{MessageList, MessageQuery, Run, RunRequest, ThreadMessage};

/// Upper bound on pages fetched by [`AssistantsApi::list_all_messages`].
const MAX_PAGES: usize = 100;

/// Abstraction over the Assistants API surface the tutor needs.
///
/// Implementations may talk to the real HTTP API or be a test double.
/// Every method fails with `Error::ExternalService` (or `Error::NotFound`
/// for unknown threads/runs) when the service rejects the call.
#[async_trait::async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Create an empty thread and return its id (POST /threads).
    async fn create_thread(&self) -> Result<String>;

    /// Append a user message to a thread (POST /threads/{id}/messages).
    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage>;

    /// Start a run on a thread (POST /threads/{id}/runs).
    async fn create_run(&self, thread_id: &str, req: RunRequest) -> Result<Run>;

    /// Fetch the current state of a run (GET /threads/{id}/runs/{run_id}).
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Fetch one page of messages (GET /threads/{id}/messages).
    async fn list_messages(&self, thread_id: &str, query: MessageQuery) -> Result<MessageList>;

    /// Fetch every message of a thread, newest first, following the
    /// `after` cursor across pages.
    async fn list_all_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let mut all = Vec::new();
        let mut after = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .list_messages(
                    thread_id,
                    MessageQuery {
                        after: after.take(),
                        ..Default::default()
                    },
                )
                .await?;

            let next = page.last_id.clone();
            let has_more = page.has_more && !page.data.is_empty();
            all.extend(page.data);

            match next {
                Some(id) if has_more => after = Some(id),
                _ => return Ok(all),
            }
        }

        tracing::warn!(thread_id, pages = MAX_PAGES, "message listing truncated");
        Ok(all)
    }
}
