// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Secret Redaction
//!
//! Model configurations are stored encrypted. Reads return a masked copy in
//! which every secret path holds [`REDACTED`]; the set of secret paths is kept
//! next to the ciphertext as a [`RedactionMap`]. On a partial update a client
//! may send the sentinel back unchanged, in which case the stored secret is
//! kept.
//!
//! Paths are dot-separated object keys (`"auth.api_key"`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel substituted for secret values.
pub const REDACTED: &str = "__REDACTED__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionMap {
    #[serde(default)]
    pub secret_paths: Vec<String>,
}

impl RedactionMap {
    /// Build the map from an already-redacted configuration.
    pub fn from_redacted(redacted: &Value) -> Self {
        Self {
            secret_paths: collect_redacted_paths(redacted),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secret_paths.is_empty()
    }
}

/// Replace the values of `secret_keys` (matched case-insensitively) with the
/// sentinel, recursing into nested objects. Arrays are copied as-is.
pub fn redact_keys(config: &Value, secret_keys: &[&str]) -> Value {
    match config {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let lowered = key.to_ascii_lowercase();
                if secret_keys.iter().any(|k| *k == lowered) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else if value.is_object() {
                    out.insert(key.clone(), redact_keys(value, secret_keys));
                } else {
                    out.insert(key.clone(), value.clone());
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Dot-paths of every value equal to the sentinel.
pub fn collect_redacted_paths(redacted: &Value) -> Vec<String> {
    fn walk(node: &Value, prefix: &mut Vec<String>, paths: &mut Vec<String>) {
        if let Value::Object(map) = node {
            for (key, value) in map {
                prefix.push(key.clone());
                if value.as_str() == Some(REDACTED) {
                    paths.push(prefix.join("."));
                } else {
                    walk(value, prefix, paths);
                }
                prefix.pop();
            }
        }
    }

    let mut paths = Vec::new();
    walk(redacted, &mut Vec::new(), &mut paths);
    paths
}

/// Mask the recorded secret paths of a plaintext configuration.
pub fn apply_redaction(config: &Value, map: &RedactionMap) -> Value {
    fn mask(node: &mut Value, parts: &[&str]) {
        let Some((first, rest)) = parts.split_first() else {
            return;
        };
        if let Some(child) = node.as_object_mut().and_then(|obj| obj.get_mut(*first)) {
            if rest.is_empty() {
                *child = Value::String(REDACTED.to_string());
            } else {
                mask(child, rest);
            }
        }
    }

    let mut masked = config.clone();
    for path in map.secret_paths.iter().filter(|p| !p.is_empty()) {
        let parts: Vec<&str> = path.split('.').collect();
        mask(&mut masked, &parts);
    }
    masked
}

/// Deep-merge `patch` into `existing`. Nested objects merge key by key; a
/// sentinel in the patch keeps the existing value when one is present.
pub fn merge_partial_config(existing: &Value, patch: &Value) -> Value {
    fn merge(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
        for (key, value) in src {
            match (value, dst.get_mut(key)) {
                (Value::Object(src_obj), Some(Value::Object(dst_obj))) => {
                    merge(dst_obj, src_obj);
                }
                (Value::String(s), Some(current)) if s == REDACTED && !current.is_null() => {}
                _ => {
                    dst.insert(key.clone(), value.clone());
                }
            }
        }
    }

    let mut result = existing.clone();
    match (result.as_object_mut(), patch.as_object()) {
        (Some(dst), Some(src)) => merge(dst, src),
        _ => return patch.clone(),
    }
    result
}
