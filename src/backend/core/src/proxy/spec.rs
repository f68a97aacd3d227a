//! Request specification and execution result types.
//!
//! Field names on the wire match what the web client sends: `type` for the
//! body/auth discriminators, `statusText` in results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One header or query-parameter entry. Disabled entries are kept in saved
/// requests but skipped at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    #[default]
    None,
    Json,
    Form,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestBody {
    #[serde(rename = "type", default)]
    pub body_type: BodyType,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    Basic,
    Apikey,
}

/// Auth descriptor. Only the fields relevant to `auth_type` are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestAuth {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A declarative description of one HTTP call to be proxied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub auth: RequestAuth,
}

/// Normalized outcome of one proxied call.
///
/// `status: 0` signals a local/transport failure; the upstream was never
/// reached or never answered usably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    pub time: u64,
    pub size: String,
    /// Response headers, last value wins for repeats. Names arrive
    /// lowercased; the transport normalizes them before we see them.
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

impl ExecutionResult {
    /// The fixed envelope for any transport-level failure. `time` is
    /// reported as 0 even when the failure followed a long timeout.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            status_text: "Error".to_string(),
            time: 0,
            size: "0 B".to_string(),
            headers: HashMap::new(),
            body: serde_json::json!({ "error": message.into() }),
        }
    }
}

/// Human-readable payload size: bytes below 1 KiB, then one-decimal KB/MB.
pub(crate) fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_boundaries() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_spec_deserializes_client_payload() {
        let spec: RequestSpec = serde_json::from_str(
            r#"{
                "method": "GET",
                "url": "https://example.com",
                "headers": [{"key": "X-Test", "value": "1"}],
                "body": {"type": "json", "content": "{}"},
                "auth": {"type": "bearer", "token": "tok"}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.method, "GET");
        assert!(spec.headers[0].enabled, "enabled defaults to true");
        assert!(spec.params.is_empty());
        assert_eq!(spec.body.body_type, BodyType::Json);
        assert_eq!(spec.auth.auth_type, AuthType::Bearer);
        assert_eq!(spec.auth.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_spec_defaults() {
        let spec: RequestSpec =
            serde_json::from_str(r#"{"method": "GET", "url": "https://example.com"}"#).unwrap();
        assert_eq!(spec.body.body_type, BodyType::None);
        assert_eq!(spec.auth.auth_type, AuthType::None);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let result = ExecutionResult::failure("dns error");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], 0);
        assert_eq!(json["statusText"], "Error");
        assert_eq!(json["time"], 0);
        assert_eq!(json["size"], "0 B");
        assert_eq!(json["headers"], serde_json::json!({}));
        assert_eq!(json["body"]["error"], "dns error");
    }
}
