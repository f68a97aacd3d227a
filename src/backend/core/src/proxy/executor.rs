//! Outbound dispatch and response normalization.

use std::time::{Duration, Instant};

use metrics::counter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use tracing::{debug, warn};

use super::spec::{format_size, AuthType, BodyType, ExecutionResult, RequestBody, RequestSpec};

/// What goes on the wire as the request body.
///
/// `DroppedInvalidJson` is distinct from `Empty` so callers and logs can
/// tell "no body was given" apart from "a body was given but could not be
/// parsed"; both send nothing upstream.
#[derive(Debug, PartialEq)]
enum BodyPayload {
    Empty,
    Json(serde_json::Value),
    Raw(String),
    DroppedInvalidJson,
}

fn prepare_body(body: &RequestBody) -> BodyPayload {
    if body.content.is_empty() {
        return BodyPayload::Empty;
    }
    match body.body_type {
        BodyType::None => BodyPayload::Empty,
        BodyType::Json => match serde_json::from_str(&body.content) {
            Ok(value) => BodyPayload::Json(value),
            // Malformed JSON is dropped, not forwarded as raw text. Changing
            // this would alter observable behavior for existing clients.
            Err(_) => BodyPayload::DroppedInvalidJson,
        },
        BodyType::Form | BodyType::Raw => BodyPayload::Raw(body.content.clone()),
    }
}

/// Collapse key/value pairs: skip disabled entries, later duplicates
/// overwrite earlier ones in place.
fn collapse_pairs(pairs: &[super::spec::KeyValue]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for kv in pairs.iter().filter(|kv| kv.enabled) {
        match out.iter_mut().find(|(k, _)| *k == kv.key) {
            Some((_, v)) => *v = kv.value.clone(),
            None => out.push((kv.key.clone(), kv.value.clone())),
        }
    }
    out
}

/// Issues one outbound HTTP call per invocation. No retries, no streaming;
/// the per-call timeout is the only cancellation mechanism.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Execute a request specification. Never fails at the interface level:
    /// transport and normalization errors come back as the fixed
    /// `status: 0` envelope.
    pub async fn execute(&self, spec: &RequestSpec) -> ExecutionResult {
        match self.dispatch(spec).await {
            Ok(result) => {
                counter!("courier_proxy_executions_total", "outcome" => "ok").increment(1);
                result
            }
            Err(err) => {
                counter!("courier_proxy_executions_total", "outcome" => "error").increment(1);
                warn!(method = %spec.method, url = %spec.url, error = %err, "Request execution failed");
                ExecutionResult::failure(err.to_string())
            }
        }
    }

    async fn dispatch(&self, spec: &RequestSpec) -> anyhow::Result<ExecutionResult> {
        let method = Method::from_bytes(spec.method.as_bytes())?;

        // Headers first, then the auth overlay so it can override them.
        let mut headers = HeaderMap::new();
        for (key, value) in collapse_pairs(&spec.headers) {
            headers.insert(
                HeaderName::from_bytes(key.as_bytes())?,
                HeaderValue::from_str(&value)?,
            );
        }

        let params = collapse_pairs(&spec.params);

        let mut basic_credentials: Option<(String, String)> = None;
        match spec.auth.auth_type {
            AuthType::None => {}
            AuthType::Bearer => {
                let token = spec.auth.token.clone().unwrap_or_default();
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token))?,
                );
            }
            AuthType::Apikey => {
                let key = spec.auth.key.clone().unwrap_or_default();
                let value = spec.auth.value.clone().unwrap_or_default();
                headers.insert(
                    HeaderName::from_bytes(key.as_bytes())?,
                    HeaderValue::from_str(&value)?,
                );
            }
            AuthType::Basic => {
                basic_credentials = Some((
                    spec.auth.username.clone().unwrap_or_default(),
                    spec.auth.password.clone().unwrap_or_default(),
                ));
            }
        }

        let mut builder = self
            .client
            .request(method, &spec.url)
            .timeout(self.timeout)
            .headers(headers)
            .query(&params);

        if let Some((username, password)) = basic_credentials {
            builder = builder.basic_auth(username, Some(password));
        }

        match prepare_body(&spec.body) {
            BodyPayload::Empty => {}
            BodyPayload::Json(value) => builder = builder.json(&value),
            BodyPayload::Raw(content) => builder = builder.body(content),
            BodyPayload::DroppedInvalidJson => {
                debug!(url = %spec.url, "Malformed JSON body dropped; sending no body");
            }
        }

        // Exactly one upstream attempt. Timing covers dispatch through full
        // payload read, in whole milliseconds.
        let start = Instant::now();
        let response = builder.send().await?;

        let status = response.status();
        let mut result_headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            result_headers.insert(
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let bytes = response.bytes().await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => value,
            Err(_) => serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        };

        Ok(ExecutionResult {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            time: elapsed_ms,
            size: format_size(bytes.len()),
            headers: result_headers,
            body,
        })
    }
}
