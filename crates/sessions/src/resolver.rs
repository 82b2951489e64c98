//! Session resolution: map an identity to its conversation thread,
//! creating the thread on first contact.
//!
//! Resolution order:
//! 1. a caller-supplied candidate thread, if it is stored for this identity;
//! 2. the thread already stored for the identity (the assistant bound at
//!    creation wins even if a different one is requested now);
//! 3. a freshly created thread, stored before it is returned.
//!
//! Step 3 runs under a per-identity lock and re-checks the store first.
//! The insert itself is conflict-tolerant, so a concurrent creator in
//! another process loses cleanly and the stored thread is returned.

use std::sync::Arc;

use tl_assistants::AssistantsApi;
use tl_domain::error::{Error, Result};
use tl_domain::trace::{redact, ResolveSource, TraceEvent};

use crate::identity::Identity;
use crate::lock::IdentityLocks;
use crate::store::{SessionRecord, SessionStore};

pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    assistants: Arc<dyn AssistantsApi>,
    locks: IdentityLocks,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>, assistants: Arc<dyn AssistantsApi>) -> Self {
        Self {
            store,
            assistants,
            locks: IdentityLocks::new(),
        }
    }

    /// Resolve the thread for `identity`.
    ///
    /// Fails with `StoreUnavailable` when the store cannot be read or
    /// written and `ExternalService` when thread creation fails.
    pub async fn resolve(
        &self,
        identity: &Identity,
        assistant_id: &str,
        candidate_thread_id: Option<&str>,
    ) -> Result<String> {
        let id = identity.as_str();

        if let Some(candidate) = candidate_thread_id.filter(|c| !c.is_empty()) {
            if let Some(thread_id) = self.store.find_thread(id, candidate).await? {
                emit(id, &thread_id, ResolveSource::Candidate);
                return Ok(thread_id);
            }
            tracing::debug!(
                identity = %redact(id),
                candidate,
                "candidate thread not bound to identity, ignoring"
            );
        }

        if let Some(existing) = self.lookup(id, assistant_id).await? {
            return Ok(existing);
        }

        let _guard = self.locks.acquire(id).await;

        // Another request may have created the session while we waited.
        if let Some(existing) = self.lookup(id, assistant_id).await? {
            return Ok(existing);
        }

        let thread_id = self.assistants.create_thread().await.map_err(|e| match e {
            Error::ExternalService(_) => e,
            other => Error::ExternalService(other.to_string()),
        })?;

        let record = SessionRecord {
            identity: id.to_owned(),
            thread_id: thread_id.clone(),
            assistant_id: assistant_id.to_owned(),
        };

        if self.store.insert_if_absent(&record).await? {
            tracing::info!(identity = %redact(id), thread_id = %thread_id, "new session created");
            emit(id, &thread_id, ResolveSource::Created);
            return Ok(thread_id);
        }

        // Lost the insert to a writer outside this process.
        let winner = self.store.find_by_identity(id).await?.ok_or_else(|| {
            Error::StoreUnavailable("session row missing after conflicting insert".into())
        })?;
        tracing::warn!(
            identity = %redact(id),
            orphaned_thread = %thread_id,
            thread_id = %winner.thread_id,
            "concurrent session creation, keeping the stored thread"
        );
        emit(id, &winner.thread_id, ResolveSource::Existing);
        Ok(winner.thread_id)
    }

    async fn lookup(&self, id: &str, assistant_id: &str) -> Result<Option<String>> {
        let Some(existing) = self.store.find_by_identity(id).await? else {
            return Ok(None);
        };
        if existing.assistant_id != assistant_id {
            tracing::debug!(
                identity = %redact(id),
                stored = %existing.assistant_id,
                requested = %assistant_id,
                "session bound to a different assistant, reusing it"
            );
        }
        emit(id, &existing.thread_id, ResolveSource::Existing);
        Ok(Some(existing.thread_id))
    }
}

fn emit(id: &str, thread_id: &str, source: ResolveSource) {
    TraceEvent::SessionResolved {
        identity_prefix: redact(id),
        thread_id: thread_id.to_owned(),
        source,
    }
    .emit();
}
