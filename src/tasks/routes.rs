//! HTTP surface of the task dispatcher
//!
//! - `GET {prefix}` lists registered tasks
//! - any method on `{prefix}/{name}` runs a task with the query string
//!   merged with the decoded request body (body fields win)

use std::borrow::Cow;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, header},
    routing::{any, get},
};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use serde_json::Value;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::debug;

use super::dispatcher::TaskDispatcher;
use super::error::TaskError;
use super::types::{Payload, TaskInvocation, TaskList};
use crate::config::TasksConfig;

#[derive(Clone)]
struct TaskRoutes {
    dispatcher: TaskDispatcher,
    max_body_bytes: usize,
}

/// Router serving the task endpoints under `config.route_prefix`
pub fn router(dispatcher: TaskDispatcher, config: &TasksConfig) -> Router {
    let prefix = config.route_prefix.as_str();
    let state = TaskRoutes {
        dispatcher,
        max_body_bytes: config.max_body_bytes,
    };

    Router::new()
        .route(prefix, get(list_tasks))
        .route(&format!("{prefix}/{{name}}"), any(run_task))
        .with_state(state)
        // Unsupported encodings reach the handler as-is and decode to an empty body
        .layer(RequestDecompressionLayer::new().pass_through_unaccepted(true))
}

async fn list_tasks(State(routes): State<TaskRoutes>) -> Json<TaskList> {
    Json(routes.dispatcher.list_tasks())
}

async fn run_task(
    State(routes): State<TaskRoutes>,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, TaskError> {
    let query = decode_query(query.as_deref());

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = match read_body(body, routes.max_body_bytes).await {
        Some(bytes) => decode_body(content_type, &bytes),
        None => Payload::new(),
    };

    let invocation = TaskInvocation::from_parts(name, query, body);
    routes.dispatcher.invoke(invocation).await.map(Json)
}

/// Collects the request body; unreadable or oversized bodies count as absent.
async fn read_body(body: Body, limit: usize) -> Option<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Some(collected.to_bytes()),
        Err(e) => {
            debug!(error = %e, "Ignoring unreadable request body");
            None
        }
    }
}

/// Query string to payload. Repeated keys collect into an array.
pub fn decode_query(raw: Option<&str>) -> Payload {
    match raw {
        Some(raw) => collect_pairs(url::form_urlencoded::parse(raw.as_bytes())),
        None => Payload::new(),
    }
}

/// Request body to payload fields
///
/// Form bodies are decoded like a query string. Everything else is tried as
/// JSON and only contributes when it is an object. Anything undecodable is
/// treated as an empty body.
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Payload {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Payload::new();
    }

    if is_form(content_type) {
        return collect_pairs(url::form_urlencoded::parse(bytes));
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            debug!(kind = json_kind(&other), "Ignoring non-object request body");
            Payload::new()
        }
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable request body");
            Payload::new()
        }
    }
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .is_some_and(|m| {
            m.type_() == mime::APPLICATION && m.subtype() == mime::WWW_FORM_URLENCODED
        })
}

fn collect_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in pairs {
        let value = Value::String(value.into_owned());
        match payload.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                payload.insert(key.into_owned(), value);
            }
        }
    }
    payload
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
