use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use quiz_relay::config::{Credential, ExtractionPolicy, RelayConfig};
use quiz_relay::server::router;
use quiz_relay::{ProviderShape, Relay};

const GEMINI_PARIS: &str
  = r#"{"candidates":[{"content":{"parts":[{"text":"Paris "}]}}]}"#;
const CHAT_TWO: &str
  = r#"{"choices":[{"message":{"role":"assistant","content":" 2\n"}}]}"#;

/// What the mock saw on its last call
#[derive(Debug, Clone)]
struct Captured
{   authorization: Option<String>
  , referer: Option<String>
  , title: Option<String>
  , query: Option<String>
  , body: Value
}

struct MockState
{   calls: AtomicU32
  , status: u16
  , body: String
  , delay: Duration
  , last: Mutex<Option<Captured>>
}

/// Mock upstream provider serving one canned reply on every path
struct MockUpstream
{   addr: SocketAddr
  , state: Arc<MockState>
  , task: tokio::task::JoinHandle<()>
}

impl MockUpstream
{   async fn start(status: u16, body: &str) -> Self
    {   Self::start_delayed(status, body, Duration::ZERO).await
    }

    async fn start_delayed(status: u16, body: &str, delay: Duration) -> Self
    {   let state = Arc::new(MockState
        {   calls: AtomicU32::new(0)
          , status
          , body: body.to_string()
          , delay
          , last: Mutex::new(None)
        });

        let app = Router::new()
          .fallback(handle_upstream)
          .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
          .await
          .unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
          axum::serve(listener, app).await.ok();
        });

        MockUpstream { addr, state, task }
    }

    fn url(&self, path: &str) -> String
    {   format!("http://{}{}", self.addr, path)
    }

    fn calls(&self) -> u32
    {   self.state.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> Captured
    {   self.state.last.lock().unwrap().clone().expect("no upstream call")
    }
}

impl Drop for MockUpstream
{   fn drop(&mut self)
    {   self.task.abort();
    }
}

async fn handle_upstream(
  State(state): State<Arc<MockState>>
, uri: Uri
, headers: HeaderMap
, body: Bytes
) -> Response
{   state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last.lock().unwrap() = Some(Captured
    {   authorization: header(&headers, "authorization")
      , referer: header(&headers, "http-referer")
      , title: header(&headers, "x-title")
      , query: uri.query().map(str::to_string)
      , body: serde_json::from_slice(&body).unwrap_or(Value::Null)
    });
    if !state.delay.is_zero()
    {   tokio::time::sleep(state.delay).await;
    }
    (
      StatusCode::from_u16(state.status).unwrap()
    , state.body.clone()
    ).into_response()
}

fn header(headers: &HeaderMap, name: &str) -> Option<String>
{   headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string)
}

fn test_credential() -> Credential
{   Credential::Static
    {   name: "GOOGLE_API_KEY".to_string()
      , key: Some("test-key".to_string())
    }
}

fn gemini_config(endpoint_url: String) -> RelayConfig
{   RelayConfig
    {   provider: ProviderShape::Gemini
      , endpoint_url
      , credential: test_credential()
      , ..RelayConfig::default()
    }
}

fn chat_config(endpoint_url: String) -> RelayConfig
{   RelayConfig
    {   endpoint_url
      , credential: Credential::Static
        {   name: "OPENROUTER_API_KEY".to_string()
          , key: Some("test-key".to_string())
        }
      , ..RelayConfig::preset("openrouter").unwrap()
    }
}

fn app(config: RelayConfig) -> Router
{   router(Arc::new(Relay::new(config).unwrap()))
}

fn post(uri: &str, body: &str) -> Request<Body>
{   Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes)
{   let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, headers, body)
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value)
{   let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ===== Method handling =====

#[tokio::test]
async fn test_options_is_empty_ok_before_validation()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    let request = Request::builder()
      .method("OPTIONS")
      .uri("/api/answer")
      .body(Body::empty())
      .unwrap();

    let (status, headers, body) = send(
      app(gemini_config(upstream.url("/gen")))
    , request
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_get_is_method_not_allowed()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    for uri in ["/api/answer", "/api/question"]
    {   let request = Request::builder()
          .method("GET")
          .uri(uri)
          .body(Body::empty())
          .unwrap();
        let (status, headers, body) = send(
          app(gemini_config(upstream.url("/gen")))
        , request
        ).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers["access-control-allow-origin"], "*");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Method not allowed" }));
    }
    assert_eq!(upstream.calls(), 0);
}

// ===== Caller input errors =====

#[tokio::test]
async fn test_missing_text_is_bad_request()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    for body in ["", "{}", r#"{"text":"  "}"#, r#"{"question":"Q"}"#]
    {   let (status, json) = send_json(
          app(gemini_config(upstream.url("/gen")))
        , post("/api/answer", body)
        ).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "No text provided" }));
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    let (status, json) = send_json(
      app(gemini_config(upstream.url("/gen")))
    , post("/api/answer", "{text: nope")
    ).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_payload_too_large()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    let config = RelayConfig
    {   body_limit_bytes: 32
      , ..gemini_config(upstream.url("/gen"))
    };
    let body = format!(r#"{{"text":"{}"}}"#, "x".repeat(100));
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", &body)
    ).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
      json
    , json!({ "error": "Request body is too large, limit is 32 bytes" })
    );
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_question_without_choice_list_is_bad_request()
{   let upstream = MockUpstream::start(200, CHAT_TWO).await;
    let (status, json) = send_json(
      app(chat_config(upstream.url("/v1/chat/completions")))
    , post("/api/question", r#"{"question":"Q?","choices":"a,b"}"#)
    ).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({ "error": "No choices provided" }));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_missing_credential_skips_upstream()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    let config = RelayConfig
    {   credential: Credential::Static
        {   name: "GOOGLE_API_KEY".to_string()
          , key: None
        }
      , ..gemini_config(upstream.url("/gen"))
    };
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", r#"{"text":"Capital of France?"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "error": "Missing GOOGLE_API_KEY" }));
    assert_eq!(upstream.calls(), 0);
}

// ===== Successful relays =====

#[tokio::test]
async fn test_gemini_relay_returns_trimmed_output()
{   let upstream = MockUpstream::start(200, GEMINI_PARIS).await;
    let (status, json) = send_json(
      app(gemini_config(upstream.url("/v1beta/models/m:generateContent")))
    , post("/api/answer", r#"{"text":"Capital of France?"}"#)
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "output": "Paris" }));
    assert_eq!(upstream.calls(), 1);

    let seen = upstream.last();
    assert_eq!(seen.query.as_deref(), Some("key=test-key"));
    assert_eq!(seen.authorization, None);
    assert_eq!(seen.body["contents"][0]["role"], "user");
    let prompt = seen.body["contents"][0]["parts"][0]["text"]
      .as_str()
      .unwrap();
    assert!(prompt.ends_with("Capital of France?\n"));
    assert_eq!(seen.body["generationConfig"]["temperature"], json!(0.0));
}

#[tokio::test]
async fn test_chat_relay_uses_bearer_auth()
{   let upstream = MockUpstream::start(200, CHAT_TWO).await;
    let (status, json) = send_json(
      app(chat_config(upstream.url("/v1/chat/completions")))
    , post("/api/answer", r#"{"text":"2 + 0 = ___"}"#)
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "output": "2" }));

    let seen = upstream.last();
    assert_eq!(seen.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(seen.query, None);
    assert_eq!(seen.body["model"], "openai/gpt-4o-mini");
    assert_eq!(seen.body["stream"], false);
    assert_eq!(seen.body["messages"][0]["role"], "user");
    assert_eq!(seen.referer, None);
    assert_eq!(seen.title, None);
}

#[tokio::test]
async fn test_chat_relay_sends_attribution_headers()
{   let upstream = MockUpstream::start(200, CHAT_TWO).await;
    let config = RelayConfig
    {   referer: Some("https://quiz.example".to_string())
      , title: Some("Quiz Relay".to_string())
      , ..chat_config(upstream.url("/v1/chat/completions"))
    };
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", r#"{"text":"2 + 0 = ___"}"#)
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "output": "2" }));
    let seen = upstream.last();
    assert_eq!(seen.referer.as_deref(), Some("https://quiz.example"));
    assert_eq!(seen.title.as_deref(), Some("Quiz Relay"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer test-key"));
}

#[tokio::test]
async fn test_gemini_openai_endpoint_uses_query_key()
{   let upstream = MockUpstream::start(200, CHAT_TWO).await;
    let config = RelayConfig
    {   endpoint_url: upstream.url("/v1beta/openai/chat/completions")
      , credential: test_credential()
      , ..RelayConfig::preset("gemini-openai").unwrap()
    };
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", r#"{"text":"1 + 1 = ___"}"#)
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "output": "2" }));
    let seen = upstream.last();
    assert_eq!(seen.query.as_deref(), Some("key=test-key"));
    assert_eq!(seen.authorization, None);
}

#[tokio::test]
async fn test_question_relay_returns_answer_field()
{   let upstream = MockUpstream::start(200, CHAT_TWO).await;
    let body = json!({
      "question": "Which is a port city?",
      "instruction": "Pick one",
      "choices": ["Lyon", "Marseille"]
    });
    let (status, json) = send_json(
      app(chat_config(upstream.url("/v1/chat/completions")))
    , post("/api/question", &body.to_string())
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "answer": "2" }));
    let prompt = upstream.last().body["messages"][0]["content"]
      .as_str()
      .unwrap()
      .to_string();
    assert!(prompt.contains("Instruction:\nPick one\n"));
    assert!(prompt.ends_with("1. Lyon\n2. Marseille\n"));
}

#[tokio::test]
async fn test_missing_answer_path_yields_sentinel()
{   let upstream = MockUpstream::start(200, r#"{"candidates":[]}"#).await;
    let (status, json) = send_json(
      app(gemini_config(upstream.url("/gen")))
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "output": "(no answer)" }));
}

// ===== Upstream failures =====

#[tokio::test]
async fn test_strict_policy_reports_missing_answer()
{   let upstream = MockUpstream::start(200, r#"{"candidates":[]}"#).await;
    let config = RelayConfig
    {   extraction: ExtractionPolicy::Strict
      , ..gemini_config(upstream.url("/gen"))
    };
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["raw"], r#"{"candidates":[]}"#);
}

#[tokio::test]
async fn test_html_error_page_keeps_raw_text()
{   let page = "<html><body>Service Unavailable</body></html>";
    let upstream = MockUpstream::start(200, page).await;
    let (status, json) = send_json(
      app(gemini_config(upstream.url("/gen")))
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({
      "error": "Invalid response from upstream",
      "raw": page
    }));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_upstream_status_is_reported()
{   let quota = r#"{"error":{"code":429,"message":"quota"}}"#;
    let upstream = MockUpstream::start(429, quota).await;
    let (status, json) = send_json(
      app(gemini_config(upstream.url("/gen")))
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({
      "error": "Upstream returned status 429",
      "status": 429,
      "raw": quota
    }));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_slow_upstream_times_out()
{   let upstream = MockUpstream::start_delayed(
      200, GEMINI_PARIS, Duration::from_secs(5)
    ).await;
    let config = RelayConfig
    {   timeout_secs: 1
      , ..gemini_config(upstream.url("/gen"))
    };
    let (status, json) = send_json(
      app(config)
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "error": "Upstream request timed out" }));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_unreachable_upstream_is_server_error()
{   let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (status, json) = send_json(
      app(gemini_config(format!("http://{}/gen", addr)))
    , post("/api/answer", r#"{"text":"Q"}"#)
    ).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = json["error"].as_str().unwrap();
    assert!(message.starts_with("Upstream request failed"));
    // Gemini puts the key in the query string; it must not leak back
    assert!(!message.contains("test-key"));
    assert!(!json.to_string().contains("test-key"));
}

// ===== Diagnostics =====

#[tokio::test]
async fn test_debug_counts_key_in_utf16_units()
{   let config = RelayConfig
    {   credential: Credential::Static
        {   name: "GOOGLE_API_KEY".to_string()
          , key: Some("k\u{1F511}".to_string())
        }
      , ..gemini_config("http://127.0.0.1:9/gen".to_string())
    };
    let request = Request::builder()
      .uri("/api/debug")
      .body(Body::empty())
      .unwrap();
    let (_, json) = send_json(app(config), request).await;
    assert_eq!(json["hasKey"], true);
    assert_eq!(json["keyLength"], 3);
}

#[tokio::test]
async fn test_debug_reports_key_presence_only()
{   let request = Request::builder()
      .uri("/api/debug")
      .body(Body::empty())
      .unwrap();
    let (status, headers, body) = send(
      app(gemini_config("http://127.0.0.1:9/gen".to_string()))
    , request
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({
      "hasKey": true,
      "keyLength": 8,
      "keyName": "GOOGLE_API_KEY"
    }));
    assert!(!String::from_utf8_lossy(&body).contains("test-key"));
}

#[tokio::test]
async fn test_trace_echoes_request()
{   let (status, json) = send_json(
      app(gemini_config("http://127.0.0.1:9/gen".to_string()))
    , post("/api/trace", r#"{"text":"hi"}"#)
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({
      "method": "POST",
      "contentType": "application/json",
      "rawBody": { "text": "hi" },
      "bodyType": "object"
    }));

    let request = Request::builder()
      .method("PUT")
      .uri("/api/trace")
      .body(Body::from("not json"))
      .unwrap();
    let (_, json) = send_json(
      app(gemini_config("http://127.0.0.1:9/gen".to_string()))
    , request
    ).await;
    assert_eq!(json["method"], "PUT");
    assert_eq!(json["contentType"], Value::Null);
    assert_eq!(json["rawBody"], "not json");
    assert_eq!(json["bodyType"], "string");
}
