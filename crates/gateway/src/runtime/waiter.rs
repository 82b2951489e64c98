//! Run a tutoring turn to completion.
//!
//! `RunWaiter::ask` appends the learner's question to the thread, starts a
//! run with the tutoring instructions, polls the run on a fixed interval
//! until it finishes, and returns the text of the newest message.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tl_assistants::{AssistantsApi, MessageQuery, Run, RunRequest};
use tl_domain::config::RunsConfig;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;

pub struct RunWaiter {
    api: Arc<dyn AssistantsApi>,
    poll_interval: Duration,
    deadline: Option<Duration>,
    instructions: String,
}

impl RunWaiter {
    pub fn new(api: Arc<dyn AssistantsApi>, runs: &RunsConfig, instructions: String) -> Self {
        Self {
            api,
            poll_interval: runs.poll_interval(),
            deadline: runs.deadline(),
            instructions,
        }
    }

    /// Ask `question` on `thread_id` and wait for the assistant's answer.
    ///
    /// Fails with `ExternalService` when any call fails, the run ends in a
    /// failure state, or the thread has no messages afterwards; `Timeout`
    /// when the configured deadline passes; `Cancelled` when `cancel` fires.
    pub async fn ask(
        &self,
        thread_id: &str,
        question: &str,
        assistant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.api
            .add_user_message(thread_id, question)
            .await
            .map_err(external)?;

        let run = self
            .api
            .create_run(
                thread_id,
                RunRequest {
                    assistant_id: assistant_id.to_owned(),
                    instructions: Some(self.instructions.clone()),
                },
            )
            .await
            .map_err(external)?;
        tracing::debug!(thread_id, run_id = %run.id, "run started");

        let finished = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.poll(thread_id, &run.id, cancel))
                .await
                .map_err(|_| {
                    Error::Timeout(format!(
                        "run {} did not finish within {}s",
                        run.id,
                        limit.as_secs()
                    ))
                })??,
            None => self.poll(thread_id, &run.id, cancel).await?,
        };

        let newest = self
            .api
            .list_messages(
                thread_id,
                MessageQuery {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .map_err(external)?
            .data
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::ExternalService(format!("thread {thread_id} has no messages after run"))
            })?;

        tracing::debug!(thread_id, run_id = %finished.id, "answer retrieved");
        Ok(newest.text().to_owned())
    }

    /// Check-then-sleep loop until the run reports completion.  Both the
    /// status request and the pause between checks give way to `cancel`.
    async fn poll(&self, thread_id: &str, run_id: &str, cancel: &CancellationToken) -> Result<Run> {
        let mut polls: u32 = 0;
        loop {
            polls += 1;
            let run = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                run = self.api.retrieve_run(thread_id, run_id) => run.map_err(external)?,
            };

            if run.status.is_failure() {
                let reason = run
                    .last_error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .filter(|m| !m.is_empty())
                    .unwrap_or("no error reported");
                return Err(Error::ExternalService(format!(
                    "run {run_id} ended {:?}: {reason}",
                    run.status
                )));
            }

            if let Some(completed_at) = run.completed_at {
                let elapsed = format_elapsed(completed_at - run.created_at);
                tracing::info!(thread_id, run_id, polls, elapsed = %elapsed, "run finished");
                TraceEvent::RunCompleted {
                    thread_id: thread_id.to_owned(),
                    run_id: run_id.to_owned(),
                    polls,
                    elapsed,
                }
                .emit();
                return Ok(run);
            }

            tracing::debug!(thread_id, run_id, polls, status = ?run.status, "run still pending");
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Anything that goes wrong while talking to the service surfaces as an
/// external-service failure.
fn external(e: Error) -> Error {
    match e {
        Error::ExternalService(_) => e,
        other => Error::ExternalService(other.to_string()),
    }
}

/// Format a span of seconds as `HH:MM:SS` (wrapping at 24 hours).
fn format_elapsed(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs.max(0), 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".into())
}
