use serde::Serialize;

/// Structured trace events emitted across all Tutorline crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    IdentityDecoded {
        /// Short prefix of the identity; the full value is never logged.
        identity_prefix: String,
        cookie_chars: usize,
    },
    SessionResolved {
        identity_prefix: String,
        thread_id: String,
        /// Which step of the get-or-create protocol produced the thread.
        source: ResolveSource,
    },
    AssistantsCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    RunCompleted {
        thread_id: String,
        run_id: String,
        polls: u32,
        /// Service-reported elapsed time, formatted `HH:MM:SS`.
        elapsed: String,
    },
    AnswerStreamed {
        thread_id: String,
        chars: usize,
    },
}

/// How a thread id was obtained by the session resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveSource {
    /// The caller-supplied thread belongs to the identity.
    Candidate,
    /// The identity already had a stored session.
    Existing,
    /// A new thread was created and stored.
    Created,
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tl_event");
    }
}

/// Shorten an identity for logs: at most the first four characters.
pub fn redact(identity: &str) -> String {
    let prefix: String = identity.chars().take(4).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_short_prefix() {
        assert_eq!(redact("student@example.com"), "stud…");
        assert_eq!(redact("ab"), "ab…");
    }

    #[test]
    fn session_resolved_serializes_with_tag() {
        let ev = TraceEvent::SessionResolved {
            identity_prefix: "stud…".into(),
            thread_id: "thread_1".into(),
            source: ResolveSource::Created,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "SessionResolved");
        assert_eq!(json["source"], "created");
    }
}
