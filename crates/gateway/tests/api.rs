use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use tl_assistants::{
    AssistantsApi, ContentPart, MessageList, MessageQuery, Role, Run, RunRequest, RunStatus,
    TextContent, ThreadMessage,
};
use tl_domain::config::Config;
use tl_domain::error::{Error, Result};
use tl_gateway::runtime::RunWaiter;
use tl_gateway::state::AppState;
use tl_sessions::{
    IdentityDecoder, SessionRecord, SessionResolver, SessionStore, SqliteSessionStore,
};

const KEY: &[u8] = b"test-secret";
const ANSWER: &str = "Good morning!";

/// In-memory Assistants service: runs complete on the first poll and
/// append a canned assistant reply.
#[derive(Default)]
struct FakeAssistants {
    threads: Mutex<HashMap<String, Vec<ThreadMessage>>>,
    next_id: Mutex<usize>,
}

impl FakeAssistants {
    fn with_thread(thread_id: &str, messages: Vec<ThreadMessage>) -> Self {
        let fake = Self::default();
        fake.threads.lock().insert(thread_id.into(), messages);
        fake
    }

    fn push(&self, thread_id: &str, role: Role, text: &str) -> Result<ThreadMessage> {
        let mut threads = self.threads.lock();
        let msgs = threads
            .get_mut(thread_id)
            .ok_or_else(|| Error::NotFound(thread_id.into()))?;
        let m = msg(&format!("m{}", msgs.len() + 1), role, text);
        msgs.push(m.clone());
        Ok(m)
    }
}

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

#[async_trait]
impl AssistantsApi for FakeAssistants {
    async fn create_thread(&self) -> Result<String> {
        let mut n = self.next_id.lock();
        *n += 1;
        let id = format!("thread_{n}");
        self.threads.lock().insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        self.push(thread_id, Role::User, content)
    }

    async fn create_run(&self, thread_id: &str, _req: RunRequest) -> Result<Run> {
        self.push(thread_id, Role::Assistant, ANSWER)?;
        Ok(Run {
            id: "run_1".into(),
            thread_id: thread_id.into(),
            status: RunStatus::Queued,
            created_at: 100,
            completed_at: None,
            last_error: None,
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        Ok(Run {
            id: run_id.into(),
            thread_id: thread_id.into(),
            status: RunStatus::Completed,
            created_at: 100,
            completed_at: Some(104),
            last_error: None,
        })
    }

    async fn list_messages(&self, thread_id: &str, query: MessageQuery) -> Result<MessageList> {
        let threads = self.threads.lock();
        let msgs = threads
            .get(thread_id)
            .ok_or_else(|| Error::NotFound(format!("thread {thread_id}")))?;
        let mut data: Vec<_> = msgs.iter().rev().cloned().collect();
        if let Some(limit) = query.limit {
            data.truncate(limit as usize);
        }
        Ok(MessageList {
            data,
            first_id: None,
            last_id: None,
            has_more: false,
        })
    }
}

struct Harness {
    app: Router,
    store: Arc<dyn SessionStore>,
    api: Arc<FakeAssistants>,
    decoder: IdentityDecoder,
}

async fn harness(api: FakeAssistants) -> Harness {
    let store = Arc::new(SqliteSessionStore::in_memory("sessions").await.unwrap());
    harness_with_store(api, store)
}

fn harness_with_store(api: FakeAssistants, store: Arc<dyn SessionStore>) -> Harness {
    let mut config = Config::default();
    config.runs.poll_interval_ms = 1;
    config.runs.stream_delay_ms = 0;
    let config = Arc::new(config);

    let api = Arc::new(api);
    let decoder = IdentityDecoder::new(config.identity.cookie_name.clone(), KEY);

    let state = AppState {
        config: config.clone(),
        decoder: Arc::new(decoder.clone()),
        resolver: Arc::new(SessionResolver::new(store.clone(), api.clone())),
        assistants: api.clone(),
        waiter: Arc::new(RunWaiter::new(api.clone(), &config.runs, "tutor".into())),
        assistant_id: Arc::from("asst_1"),
        shutdown: CancellationToken::new(),
    };

    Harness {
        app: tl_gateway::api::router().with_state(state),
        store,
        api,
        decoder,
    }
}

impl Harness {
    fn cookie(&self, identity: &str) -> String {
        format!(
            "theme=dark; {}={}",
            self.decoder.cookie_name(),
            self.decoder.encode(identity)
        )
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

// ── GET /thread ──────────────────────────────────────────────────────

#[tokio::test]
async fn thread_is_created_once_per_identity() {
    let h = harness(FakeAssistants::default()).await;

    let req = || {
        Request::get("/thread")
            .header("Cookies", h.cookie("S1001"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = h.send(req()).await;
    assert_eq!(status, StatusCode::OK);
    let first = json(&body)["thread_id"].as_str().unwrap().to_owned();

    let (_, body) = h.send(req()).await;
    assert_eq!(json(&body)["thread_id"], first.as_str());
    assert_eq!(h.store.count_for_identity("S1001").await.unwrap(), 1);
}

#[tokio::test]
async fn thread_accepts_standard_cookie_header() {
    let h = harness(FakeAssistants::default()).await;
    let req = Request::get("/thread")
        .header(header::COOKIE, h.cookie("S1001"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn thread_without_cookie_is_bad_request() {
    let h = harness(FakeAssistants::default()).await;
    let (status, body) = h
        .send(Request::get("/thread").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["detail"].is_string());
}

#[tokio::test]
async fn thread_with_garbage_cookie_is_bad_request() {
    let h = harness(FakeAssistants::default()).await;
    let req = Request::get("/thread")
        .header("Cookies", "ESDUBAI_STUDENT_ID=not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Session store whose database is unreachable.
struct DownStore;

#[async_trait]
impl SessionStore for DownStore {
    async fn find_thread(&self, _: &str, _: &str) -> Result<Option<String>> {
        Err(down())
    }

    async fn find_by_identity(&self, _: &str) -> Result<Option<SessionRecord>> {
        Err(down())
    }

    async fn insert_if_absent(&self, _: &SessionRecord) -> Result<bool> {
        Err(down())
    }

    async fn count_for_identity(&self, _: &str) -> Result<u64> {
        Err(down())
    }
}

fn down() -> Error {
    Error::StoreUnavailable("connection refused to db-host:3306".into())
}

// ── POST /chat ───────────────────────────────────────────────────────

#[tokio::test]
async fn chat_streams_answer_on_identity_thread() {
    let h = harness(FakeAssistants::default()).await;

    let req = Request::post("/chat")
        .header("Cookies", h.cookie("S1001"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Hello"}"#))
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, ANSWER.as_bytes());

    let rec = h.store.find_by_identity("S1001").await.unwrap().unwrap();
    let thread = h.api.threads.lock()[&rec.thread_id].clone();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].text(), "Hello");
}

#[tokio::test]
async fn anonymous_chat_without_thread_creates_unbound_thread() {
    let h = harness(FakeAssistants::default()).await;
    let req = Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Hi"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ANSWER.as_bytes());
    assert_eq!(h.api.threads.lock().len(), 1);
}

#[tokio::test]
async fn anonymous_chat_uses_supplied_thread() {
    let h = harness(FakeAssistants::with_thread("thread_x", Vec::new())).await;
    let req = Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Hi","thread_id":"thread_x"}"#))
        .unwrap();
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.api.threads.lock()["thread_x"].len(), 2);
}

#[tokio::test]
async fn chat_failure_reports_detail() {
    let h = harness(FakeAssistants::default()).await;
    let req = Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Hi","thread_id":"thread_missing"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json(&body)["detail"].as_str().unwrap().contains("thread_missing"));
}

#[tokio::test]
async fn chat_store_failure_hides_store_detail() {
    let h = harness_with_store(FakeAssistants::default(), Arc::new(DownStore));
    let req = Request::post("/chat")
        .header("Cookies", h.cookie("S1001"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"Hi"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json(&body)["detail"].as_str().unwrap().to_owned();
    assert_eq!(detail, "internal server error");
    assert!(!detail.contains("db-host"));
    assert!(h.api.threads.lock().is_empty());
}

#[tokio::test]
async fn chat_without_question_is_bad_request() {
    let h = harness(FakeAssistants::default()).await;
    let req = Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"thread_id":"thread_1"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["detail"].is_string());
}

// ── POST /history ────────────────────────────────────────────────────

fn three_messages() -> Vec<ThreadMessage> {
    // Stored oldest first; the fake lists them newest first.
    vec![
        msg("m1", Role::User, "How do I say hello?"),
        msg("m2", Role::Assistant, "You say: hello!"),
        msg("m3", Role::User, "Thanks"),
    ]
}

#[tokio::test]
async fn history_is_oldest_first() {
    let h = harness(FakeAssistants::with_thread("thread_h", three_messages())).await;
    let (status, body) = h
        .send(
            Request::post("/history?thread_id=thread_h")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let history = json(&body)["history"].as_array().unwrap().clone();
    let contents: Vec<_> = history
        .iter()
        .map(|e| e["content"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(contents, ["How do I say hello?", "You say: hello!", "Thanks"]);
    assert_eq!(history[1]["role"], "assistant");
}

#[tokio::test]
async fn history_reads_thread_id_from_body() {
    let h = harness(FakeAssistants::with_thread("thread_h", three_messages())).await;
    let req = Request::post("/history")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"thread_id":"thread_h"}"#))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["history"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn history_without_thread_id_is_bad_request() {
    let h = harness(FakeAssistants::default()).await;
    let (status, _) = h
        .send(Request::post("/history").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_of_unknown_thread_is_not_found() {
    let h = harness(FakeAssistants::default()).await;
    let (status, body) = h
        .send(
            Request::post("/history?thread_id=thread_nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["detail"].is_string());
}

// ── GET /health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let h = harness(FakeAssistants::default()).await;
    let (status, body) = h
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");
}
