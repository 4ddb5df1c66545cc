// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// `sql.select`: constrained read against a SQL dataset bound as `primary`.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{parse_config, schema_of};
use crate::domain::dataset::{DatasetId, OrderBy, SqlSelectSpec};
use crate::domain::tool::{AgentTool, ResourceType, ToolAdapter, ToolBindings, ToolContext, ToolError};

pub const KIND: &str = "sql.select";
pub const PRIMARY_ROLE: &str = "primary";

const MAX_ROWS_CAP: u32 = 5000;
const TIMEOUT_CAP: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SqlSelectConfig {
    #[schemars(description = "Upper bound on returned rows", range(min = 1, max = 5000))]
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,

    #[schemars(description = "Statement timeout in seconds", range(min = 1, max = 60))]
    #[serde(default = "default_query_timeout_s")]
    pub query_timeout_s: u32,

    #[schemars(description = "Columns returned when the call does not name any")]
    #[serde(default)]
    pub default_columns: Option<Vec<String>>,

    #[schemars(description = "Columns allowed in `where`; empty allows all")]
    #[serde(default)]
    pub allowed_predicates: Option<Vec<String>>,
}

fn default_max_rows() -> u32 {
    500
}

fn default_query_timeout_s() -> u32 {
    15
}

impl Default for SqlSelectConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            query_timeout_s: default_query_timeout_s(),
            default_columns: None,
            allowed_predicates: None,
        }
    }
}

impl SqlSelectConfig {
    fn check_bounds(&self) -> Result<(), ToolError> {
        if !(1..=MAX_ROWS_CAP).contains(&self.max_rows) {
            return Err(ToolError::Validation("max_rows must be between 1 and 5000".to_string()));
        }
        if !(1..=TIMEOUT_CAP).contains(&self.query_timeout_s) {
            return Err(ToolError::Validation("query_timeout_s must be between 1 and 60".to_string()));
        }
        Ok(())
    }
}

/// Call arguments as offered to the model.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SqlSelectPayload {
    #[schemars(description = "Columns to return")]
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    #[schemars(description = "Equality predicates, column -> value")]
    #[serde(default, rename = "where")]
    pub predicates: Option<Map<String, Value>>,

    #[serde(default)]
    pub params: Option<Map<String, Value>>,

    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    #[schemars(description = "Maximum rows; capped by the tool configuration")]
    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub offset: Option<u32>,
}

/// Build the gateway request, clamping caller limits to the configured caps.
pub fn build_spec(config: &SqlSelectConfig, payload: SqlSelectPayload) -> Result<SqlSelectSpec, ToolError> {
    let allowed = config.allowed_predicates.as_deref().unwrap_or_default();
    if let Some(predicates) = &payload.predicates {
        if !allowed.is_empty() {
            if let Some(key) = predicates.keys().find(|k| !allowed.contains(k)) {
                return Err(ToolError::Validation(format!("Predicate on disallowed column: {}", key)));
            }
        }
    }

    let limit = payload
        .limit
        .map(|l| l.min(config.max_rows))
        .unwrap_or(config.max_rows);

    Ok(SqlSelectSpec {
        columns: payload.columns.or_else(|| config.default_columns.clone()),
        r#where: payload.predicates,
        params: payload.params,
        order_by: payload.order_by,
        limit,
        offset: payload.offset.unwrap_or(0),
        timeout_s: config.query_timeout_s.clamp(1, TIMEOUT_CAP),
    })
}

#[derive(Default)]
pub struct SqlSelectAdapter;

impl SqlSelectAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolAdapter for SqlSelectAdapter {
    fn kind(&self) -> &str {
        KIND
    }

    fn display_name(&self) -> &str {
        "SQL Select"
    }

    fn config_schema(&self) -> Value {
        schema_of::<SqlSelectConfig>()
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SqlSelectPayload>()
    }

    fn validate_bindings(&self, bindings: &ToolBindings) -> Result<(), ToolError> {
        bindings.require(PRIMARY_ROLE, ResourceType::Dataset).map(|_| ())
    }

    fn validate_config(&self, config: &Value) -> Result<(), ToolError> {
        parse_config::<SqlSelectConfig>(config)?.check_bounds()
    }

    async fn invoke(&self, tool: &AgentTool, payload: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let config = parse_config::<SqlSelectConfig>(&tool.config)?;
        config.check_bounds()?;
        let binding = tool.bindings.require(PRIMARY_ROLE, ResourceType::Dataset)?;

        let payload: SqlSelectPayload = if payload.is_null() {
            SqlSelectPayload::default()
        } else {
            serde_json::from_value(payload.clone())
                .map_err(|e| ToolError::Validation(format!("Invalid sql.select payload: {}", e)))?
        };
        let spec = build_spec(&config, payload)?;

        let result = ctx
            .datasets
            .sql_select(&ctx.principal.tenant_id, DatasetId(binding.id), &spec)
            .await?;
        Ok(json!(result))
    }
}
