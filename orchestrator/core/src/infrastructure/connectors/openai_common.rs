// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared plumbing for OpenAI-compatible connectors (OpenAI and Azure OpenAI).
//
// Both the chat and the embeddings connector speak the same HTTP dialect:
// bearer auth, optional organization header, caller-supplied extra headers
// and query params, and the Azure `deployments` routing when the base URL
// points at azure.com.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::model::{ConnectionStatus, ConnectionTestResult, ModelError};
use crate::domain::redaction::redact_keys;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SECRET_KEYS: &[&str] = &["api_key", "authorization"];

/// Connection settings read from a decrypted model configuration.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub api_version: Option<String>,
    pub default_model: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub extra_query: Vec<(String, String)>,
}

impl OpenAiSettings {
    pub fn from_config(config: &Value) -> Self {
        let text = |key: &str| {
            config
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let pairs = |key: &str| -> Vec<(String, String)> {
            config
                .get(key)
                .and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            base_url: text("base_url")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: text("api_key").unwrap_or_default(),
            organization: text("organization"),
            api_version: text("api_version"),
            default_model: text("default_model"),
            extra_headers: pairs("extra_headers"),
            extra_query: pairs("extra_query_params"),
        }
    }

    pub fn is_azure(&self) -> bool {
        self.base_url.contains("azure.com")
    }

    /// Bearer auth plus extra headers. Extra headers never replace
    /// `Authorization`.
    pub fn headers(&self, with_organization: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("API key contains characters not allowed in a header; sending without auth"),
        }
        if with_organization {
            if let Some(org) = &self.organization {
                if let Ok(value) = HeaderValue::from_str(org) {
                    headers.insert(HeaderName::from_static("openai-organization"), value);
                }
            }
        }
        for (name, value) in &self.extra_headers {
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid extra header"),
            }
        }
        headers
    }

    /// Query parameters: `api-version` first for Azure, then the extras.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(self.extra_query.len() + 1);
        if self.is_azure() {
            if let Some(version) = &self.api_version {
                query.push(("api-version".to_string(), version.clone()));
            }
        }
        query.extend(self.extra_query.iter().cloned());
        query
    }

    /// Non-billable listing endpoint.
    pub fn listing_url(&self) -> String {
        if self.is_azure() {
            format!("{}/deployments", self.base_url)
        } else {
            format!("{}/models", self.base_url)
        }
    }

    /// Inference endpoint for `path` (`chat/completions`, `embeddings`).
    pub fn inference_url(&self, model: &str, path: &str) -> String {
        if self.is_azure() {
            format!("{}/deployments/{}/{}", self.base_url, model, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Connector config schema. Nullable fields accept `null`.
pub fn config_schema(title: &str, with_expected_dimension: bool) -> Value {
    let mut properties = json!({
        "api_key": {"type": "string", "title": "API Key", "minLength": 1, "secret": true},
        "base_url": {"type": "string", "title": "Base URL", "default": DEFAULT_BASE_URL},
        "organization": {"type": ["string", "null"], "title": "Organization"},
        "default_model": {"type": ["string", "null"], "title": "Default Model"},
        "api_version": {"type": ["string", "null"], "title": "API Version (Azure only)"},
        "extra_headers": {
            "type": "object",
            "title": "Extra Headers",
            "additionalProperties": {"type": "string"}
        },
        "extra_query_params": {
            "type": "object",
            "title": "Extra Query Params",
            "additionalProperties": {"type": "string"}
        }
    });
    if with_expected_dimension {
        if let Some(map) = properties.as_object_mut() {
            map.insert(
                "expected_dimension".to_string(),
                json!({"type": ["integer", "null"], "title": "Expected Dimension"}),
            );
        }
    }
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": title,
        "type": "object",
        "properties": properties,
        "required": ["api_key"]
    })
}

/// JSON-schema check followed by the semantic rules shared by every
/// OpenAI-compatible connector.
pub fn validate_config(schema: &Value, config: &Value) -> Result<(), ModelError> {
    let validator = jsonschema::draft202012::new(schema)
        .map_err(|e| ModelError::Validation(format!("Invalid connector schema: {}", e)))?;
    let errors: Vec<String> = validator.iter_errors(config).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ModelError::Validation(format!(
            "Invalid configuration: {}",
            errors.join("; ")
        )));
    }

    match config.get("api_key") {
        Some(Value::String(key)) if !key.trim().is_empty() => {}
        _ => {
            return Err(ModelError::Validation(
                "'api_key' is required and must be a string".to_string(),
            ))
        }
    }
    for key in ["base_url", "default_model"] {
        if let Some(value) = config.get(key) {
            if !value.is_null() && !value.is_string() {
                return Err(ModelError::Validation(format!(
                    "'{}' must be a string if provided",
                    key
                )));
            }
        }
    }
    let base_url = config.get("base_url").and_then(Value::as_str).unwrap_or_default();
    let has_version = config
        .get("api_version")
        .and_then(Value::as_str)
        .is_some_and(|v| !v.trim().is_empty());
    if base_url.contains("azure.com") && !has_version {
        return Err(ModelError::Validation(
            "'api_version' is required when using Azure OpenAI base_url".to_string(),
        ));
    }
    Ok(())
}

pub fn redact_config(config: &Value) -> Value {
    redact_keys(config, SECRET_KEYS)
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Minimal billable request used when the listing endpoint is inconclusive.
pub struct SmokeCall {
    pub path: &'static str,
    pub model: String,
    pub body: Value,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn transport_failure(err: &reqwest::Error, started: Instant, billable: bool) -> ConnectionTestResult {
    let details = if err.is_timeout() {
        json!({"error": "timeout"})
    } else {
        json!({"error": "request_error", "message": err.to_string()})
    };
    ConnectionTestResult {
        status: ConnectionStatus::Failed,
        latency_ms: elapsed_ms(started),
        billable,
        details,
    }
}

/// Listing probe with the optional smoke inference fallback.
pub async fn probe(settings: &OpenAiSettings, timeout: Duration, smoke: Option<SmokeCall>) -> ConnectionTestResult {
    let started = Instant::now();
    let client = match http_client(timeout) {
        Ok(client) => client,
        Err(e) => return transport_failure(&e, started, false),
    };
    let headers = settings.headers(true);
    let query = settings.query();
    let url = settings.listing_url();
    debug!(endpoint = %url, "Probing model provider");

    let response = match client.get(&url).headers(headers.clone()).query(&query).send().await {
        Ok(response) => response,
        Err(e) => return transport_failure(&e, started, false),
    };
    let status = response.status().as_u16();
    let latency_ms = elapsed_ms(started);
    let failed = |details: Value, billable: bool, latency_ms: u64| ConnectionTestResult {
        status: ConnectionStatus::Failed,
        latency_ms,
        billable,
        details,
    };

    match status {
        200 => {
            return ConnectionTestResult {
                status: ConnectionStatus::Ok,
                latency_ms,
                billable: false,
                details: json!({"endpoint": url}),
            }
        }
        401 | 403 => return failed(json!({"error": "auth_failed", "status_code": status}), false, latency_ms),
        429 => return failed(json!({"error": "rate_limited", "status_code": status}), false, latency_ms),
        _ => {}
    }

    let Some(smoke) = smoke else {
        return failed(json!({"error": format!("status_{}", status), "endpoint": url}), false, latency_ms);
    };

    let smoke_url = settings.inference_url(&smoke.model, smoke.path);
    debug!(endpoint = %smoke_url, "Listing inconclusive; attempting smoke inference");
    match client
        .post(&smoke_url)
        .headers(headers)
        .query(&query)
        .json(&smoke.body)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => ConnectionTestResult {
            status: ConnectionStatus::Ok,
            latency_ms: elapsed_ms(started),
            billable: true,
            details: json!({"endpoint": smoke_url}),
        },
        Ok(r) => failed(
            json!({"error": format!("status_{}", r.status().as_u16()), "endpoint": smoke_url}),
            true,
            elapsed_ms(started),
        ),
        Err(e) => transport_failure(&e, started, true),
    }
}

/// Ids from the listing endpoint (`data[].id`, or `data[].name` for Azure).
/// A non-200 answer yields an empty list; transport failures are errors.
pub async fn list_model_ids(settings: &OpenAiSettings) -> Result<Vec<String>, reqwest::Error> {
    let client = http_client(Duration::from_secs(10))?;
    let response = client
        .get(settings.listing_url())
        .headers(settings.headers(false))
        .query(&settings.query())
        .send()
        .await?;
    if response.status().as_u16() != 200 {
        return Ok(Vec::new());
    }
    let body: Value = response.json().await?;
    let ids = body
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("id")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(ids)
}

/// Provider parameters that are not first-class request fields.
pub fn passthrough_params(extra: &Map<String, Value>) -> Map<String, Value> {
    const RESERVED: &[&str] = &["model", "messages", "tools", "temperature", "max_tokens", "stream"];
    extra
        .iter()
        .filter(|(k, _)| !RESERVED.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
