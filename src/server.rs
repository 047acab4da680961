//! HTTP surface: relay routes, CORS headers and diagnostics

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{
  ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
  ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::{Json, Router};
use log::{debug, info};
use serde_json::{json, Map, Value};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::client::Relay;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::request::{normalize, AnswerResult, TransportBody};
use crate::PayloadShape;

/// All routes, with CORS headers on every response
pub fn router(relay: Arc<Relay>) -> Router
{   Router::new()
      .route(
        "/api/answer"
      , post(answer_text)
          .options(preflight)
          .fallback(method_not_allowed)
      )
      .route(
        "/api/question"
      , post(answer_question)
          .options(preflight)
          .fallback(method_not_allowed)
      )
      .route("/api/debug", any(debug_credential))
      .route("/api/trace", any(trace_request))
      .layer(middleware::from_fn(log_request))
      .layer(SetResponseHeaderLayer::overriding(
        ACCESS_CONTROL_ALLOW_ORIGIN
      , HeaderValue::from_static("*")
      ))
      .layer(SetResponseHeaderLayer::overriding(
        ACCESS_CONTROL_ALLOW_METHODS
      , HeaderValue::from_static("POST, OPTIONS")
      ))
      .layer(SetResponseHeaderLayer::overriding(
        ACCESS_CONTROL_ALLOW_HEADERS
      , HeaderValue::from_static("Content-Type")
      ))
      .with_state(relay)
}

/// Bind and serve until ctrl-c
pub async fn serve(
  config: ServerConfig
, relay: Relay
) -> std::io::Result<()>
{   let listener
      = tokio::net::TcpListener::bind(config.listen_address).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(relay)))
      .with_graceful_shutdown(shutdown_signal())
      .await
}

async fn shutdown_signal()
{   let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

async fn log_request(request: Request, next: Next) -> Response
{   let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    debug!("{} {} -> {}", method, path, response.status());
    response
}

async fn answer_text(
  State(relay): State<Arc<Relay>>
, body: Body
) -> Response
{   handle_relay(&relay, PayloadShape::Text, TransportBody::Unread(body))
      .await
}

async fn answer_question(
  State(relay): State<Arc<Relay>>
, body: Body
) -> Response
{   handle_relay(
      &relay
    , PayloadShape::Question
    , TransportBody::Unread(body)
    ).await
}

/// Normalize, relay, respond. One upstream call at most.
pub async fn handle_relay(
  relay: &Relay
, shape: PayloadShape
, body: TransportBody
) -> Response
{   let limit = relay.config().body_limit_bytes;
    let result = async {
      let payload = normalize(body, shape, limit).await?;
      let answer = relay.answer(&payload).await?;
      Ok::<_, Error>(AnswerResult { shape, answer })
    }.await;

    match result
    {   Ok(answer) => (StatusCode::OK, Json(answer.to_json())).into_response()
      , Err(e) => e.into_response()
    }
}

async fn preflight() -> StatusCode
{   StatusCode::OK
}

async fn method_not_allowed() -> Response
{   Error::MethodNotAllowed.into_response()
}

/// Reports whether the credential is set, never its value
async fn debug_credential(State(relay): State<Arc<Relay>>) -> Json<Value>
{   let credential = &relay.config().credential;
    let key = credential.peek().unwrap_or_default();
    Json(json!({
      "hasKey": !key.is_empty(),
      // UTF-16 units, as browsers count string length
      "keyLength": key.encode_utf16().count(),
      "keyName": credential.name(),
    }))
}

/// Echoes what the transport delivered
async fn trace_request(
  method: Method
, headers: HeaderMap
, body: Bytes
) -> Json<Value>
{   let content_type = headers
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|v| Value::String(v.to_string()))
      .unwrap_or(Value::Null);

    let text = String::from_utf8_lossy(&body);
    let (raw_body, body_type) = if text.trim().is_empty()
    {   (Value::Null, "undefined")
    } else
    {   match serde_json::from_str::<Value>(&text)
        {   Ok(value) => {
              let kind = json_type(&value);
              (value, kind)
            }
          , Err(_) => (Value::String(text.into_owned()), "string")
        }
    };

    Json(json!({
      "method": method.as_str(),
      "contentType": content_type,
      "rawBody": raw_body,
      "bodyType": body_type,
    }))
}

fn json_type(value: &Value) -> &'static str
{   match value
    {   Value::Null => "null"
      , Value::Bool(_) => "boolean"
      , Value::Number(_) => "number"
      , Value::String(_) => "string"
      , Value::Array(_) => "array"
      , Value::Object(_) => "object"
    }
}

impl IntoResponse for Error
{   fn into_response(self) -> Response
    {   let status = StatusCode::from_u16(self.status_code())
          .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.to_string()));
        if let Some(upstream) = self.upstream_status()
        {   body.insert("status".to_string(), Value::from(upstream));
        }
        if let Some(raw) = self.raw()
        {   body.insert("raw".to_string(), Value::String(raw.to_string()));
        }

        (status, Json(Value::Object(body))).into_response()
    }
}
