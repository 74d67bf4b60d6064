use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use gemini_relay::{
    IncomingRequest, NormalizedResult, RelayError, RelayHandler, RelayObserver, RelayOptions,
    Sleep, StaticCredential,
    TokioSleep, CONFIG_INCOMPLETE_MESSAGE, EMPTY_OUTPUT_MESSAGE, INTERNAL_ERROR_MESSAGE,
    OVERLOADED_MESSAGE, UPSTREAM_FAILURE_MESSAGE,
};
use serde_json::{json, Value as JsonValue};

const API_KEY: &str = "test-api-key";

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug)]
struct CapturedRequest {
    path: String,
    key: Option<String>,
    body: JsonValue,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    hits: Arc<AtomicUsize>,
}

async fn generate_handler(
    State(state): State<MockState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<JsonValue>,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .captured
        .lock()
        .expect("capture mutex must not be poisoned")
        .push(CapturedRequest {
            path,
            key: query.get("key").cloned(),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::IM_A_TEAPOT,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn options(&self) -> RelayOptions {
        RelayOptions::default()
            .with_base_url(&self.base_url)
            .with_timeout_ms(2_000)
    }

    fn handler(&self) -> RelayHandler<gemini_relay::GeminiCaller, RecordingSleep> {
        RelayHandler::with_api_key(self.options(), API_KEY).with_sleeper(RecordingSleep::default())
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        captured: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/v1beta/models/*path", post(generate_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        captured: state.captured,
        task,
    }
}

#[derive(Clone, Default)]
struct RecordingSleep {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleep {
    fn delays_ms(&self) -> Vec<u128> {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .iter()
            .map(Duration::as_millis)
            .collect()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.delays
            .lock()
            .expect("delay mutex must not be poisoned")
            .push(duration);
        async {}
    }
}

fn candidates_body(texts: &[&str]) -> JsonValue {
    let candidates: Vec<JsonValue> = texts
        .iter()
        .map(|text| json!({ "content": { "role": "model", "parts": [{ "text": text }] } }))
        .collect();
    json!({ "candidates": candidates })
}

fn overloaded() -> MockResponse {
    MockResponse::json(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}),
    )
}

#[tokio::test]
async fn successful_generation_returns_first_candidate() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        candidates_body(&["Hola", "Buenos días"]),
    )])
    .await;
    let handler = server.handler();

    let reply = handler
        .handle_http("POST", r#"{"prompt":"¿Cómo se dice hello?"}"#.as_bytes())
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({ "response": "Hola" }));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn outbound_call_carries_key_in_query_and_prompt_in_template() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        candidates_body(&["4"]),
    )])
    .await;
    let handler = server.handler();

    let result = handler.handle(&IncomingRequest::new("¿Cuánto es 2+2?")).await;
    assert_eq!(
        result,
        NormalizedResult::Success {
            text: "4".to_owned()
        }
    );

    let captured = server.captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let request = &captured[0];
    assert_eq!(request.path, "gemini-2.5-flash-preview-05-20:generateContent");
    assert_eq!(request.key.as_deref(), Some(API_KEY));
    assert!(!request.body.to_string().contains(API_KEY));

    let text = request.body["contents"][0]["parts"][0]["text"]
        .as_str()
        .expect("template text must be a string");
    assert!(text.starts_with("Responde a la siguiente pregunta de un estudiante"));
    assert!(text.contains("\"¿Cuánto es 2+2?\""));
}

#[tokio::test]
async fn missing_prompt_is_rejected_without_upstream_call() {
    let server = spawn_server(vec![]).await;
    let handler = server.handler();

    for body in [&b"{}"[..], br#"{"prompt":""}"#, b"garbage"] {
        let reply = handler.handle_http("POST", body).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body, json!({ "error": "Prompt is required" }));
    }
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn non_post_method_is_rejected() {
    let server = spawn_server(vec![]).await;
    let handler = server.handler();

    for method in ["GET", "PUT", "DELETE", "OPTIONS", "post", "Post"] {
        let reply = handler.handle_http(method, br#"{"prompt":"hola"}"#).await;
        assert_eq!(reply.status, 405);
        assert_eq!(reply.body, json!({ "error": "Method Not Allowed" }));
    }
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn missing_credential_is_config_error_without_upstream_call() {
    let server = spawn_server(vec![]).await;
    let handler = RelayHandler::new(server.options(), StaticCredential::missing());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, json!({ "error": CONFIG_INCOMPLETE_MESSAGE }));
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn unbuildable_endpoint_is_internal_error() {
    let handler = RelayHandler::with_api_key(
        RelayOptions::default().with_base_url("not a url"),
        API_KEY,
    )
    .with_sleeper(RecordingSleep::default());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, json!({ "error": INTERNAL_ERROR_MESSAGE }));
}

#[tokio::test]
async fn persistent_overload_exhausts_retries_with_backoff() {
    let server = spawn_server(vec![overloaded(), overloaded(), overloaded(), overloaded()]).await;
    let sleeper = RecordingSleep::default();
    let handler =
        RelayHandler::with_api_key(server.options(), API_KEY).with_sleeper(sleeper.clone());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 503);
    assert_eq!(reply.body, json!({ "error": OVERLOADED_MESSAGE }));
    assert_eq!(server.hits(), 4);
    assert_eq!(sleeper.delays_ms(), vec![1_000, 2_000, 4_000]);
    assert_eq!(sleeper.delays_ms().iter().sum::<u128>(), 7_000);
}

#[tokio::test]
async fn rate_limit_then_success_recovers() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::TOO_MANY_REQUESTS, json!({"error": "quota"})),
        MockResponse::json(StatusCode::OK, candidates_body(&["Hola"])),
    ])
    .await;
    let sleeper = RecordingSleep::default();
    let handler =
        RelayHandler::with_api_key(server.options(), API_KEY).with_sleeper(sleeper.clone());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({ "response": "Hola" }));
    assert_eq!(server.hits(), 2);
    assert_eq!(sleeper.delays_ms(), vec![1_000]);
}

#[tokio::test]
async fn forbidden_is_surfaced_immediately() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::FORBIDDEN,
        json!({"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}),
    )])
    .await;
    let sleeper = RecordingSleep::default();
    let handler =
        RelayHandler::with_api_key(server.options(), API_KEY).with_sleeper(sleeper.clone());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 403);
    assert_eq!(reply.body, json!({ "error": UPSTREAM_FAILURE_MESSAGE }));
    assert!(!reply.body.to_string().contains("API key not valid"));
    assert_eq!(server.hits(), 1);
    assert!(sleeper.delays_ms().is_empty());
}

#[tokio::test]
async fn success_without_candidates_is_500_and_not_retried() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
    )])
    .await;
    let handler = server.handler();

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, json!({ "error": EMPTY_OUTPUT_MESSAGE }));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn timeout_is_internal_error_and_not_retried() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::OK, candidates_body(&["tarde"]))
            .with_delay(Duration::from_millis(200)),
    ])
    .await;
    let handler = RelayHandler::with_api_key(server.options().with_timeout_ms(20), API_KEY)
        .with_sleeper(RecordingSleep::default());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, json!({ "error": INTERNAL_ERROR_MESSAGE }));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn real_sleeper_waits_between_attempts() {
    let server = spawn_server(vec![
        overloaded(),
        MockResponse::json(StatusCode::OK, candidates_body(&["listo"])),
    ])
    .await;
    let mut options = server.options();
    options.retry_backoff_ms = 5;
    let handler = RelayHandler::with_api_key(options, API_KEY).with_sleeper(TokioSleep);

    let started = std::time::Instant::now();
    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 200);
    assert!(started.elapsed() >= Duration::from_millis(5));
    assert_eq!(server.hits(), 2);
}

#[derive(Default)]
struct RecordingObserver {
    upstream_errors: Mutex<Vec<(u16, String)>>,
    retries: AtomicUsize,
    failures: Mutex<Vec<u16>>,
}

impl RelayObserver for RecordingObserver {
    fn on_retry(&self, _attempt: usize, _status: u16, _delay: Duration) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_upstream_error(&self, status: u16, body: &str) {
        self.upstream_errors
            .lock()
            .unwrap()
            .push((status, body.to_owned()));
    }

    fn on_failure(&self, error: &RelayError) {
        self.failures.lock().unwrap().push(error.status_code());
    }
}

#[tokio::test]
async fn upstream_error_body_goes_to_observer_only() {
    let server = spawn_server(vec![
        overloaded(),
        MockResponse::json(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Invalid JSON payload received."}}),
        ),
    ])
    .await;
    let observer = Arc::new(RecordingObserver::default());
    let handler = server.handler().with_observer(observer.clone());

    let reply = handler.handle_http("POST", br#"{"prompt":"hola"}"#).await;

    assert_eq!(reply.status, 400);
    assert!(!reply.body.to_string().contains("Invalid JSON payload"));
    assert_eq!(observer.retries.load(Ordering::SeqCst), 1);
    let errors = observer.upstream_errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].0, 503);
    assert_eq!(errors[1].0, 400);
    assert!(errors[1].1.contains("Invalid JSON payload"));
    assert_eq!(*observer.failures.lock().unwrap(), vec![400]);
}
