// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Built-in Tool Adapters
//
// One `ToolAdapter` per tool kind. Adapters never touch a driver directly;
// every read goes through the `DatasetGateway` carried in the `ToolContext`.

pub mod sql_select;
pub mod vector_search;

pub use sql_select::SqlSelectAdapter;
pub use vector_search::VectorSearchAdapter;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::tool::ToolError;

/// Typed view of a tool config; `null` means all defaults.
pub(crate) fn parse_config<T: DeserializeOwned + Default>(config: &Value) -> Result<T, ToolError> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| ToolError::Validation(format!("Invalid tool config: {}", e)))
}

pub(crate) fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}
