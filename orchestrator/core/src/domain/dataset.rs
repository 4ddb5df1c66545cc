// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dataset Execution Port
//!
//! Tools never talk to a database or vector store driver. They build a
//! constrained request ([`SqlSelectSpec`], [`VectorQuerySpec`]) and hand it
//! to a [`DatasetGateway`], which owns identifier quoting, injection defence,
//! connection management and row-level security.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::error::{Classified, ErrorKind};
use crate::domain::tenant::TenantId;

entity_id!(
    /// Unique identifier for a dataset owned by the dataset layer.
    DatasetId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetCategory {
    Sql,
    Vector,
    Blob,
    Other,
}

impl fmt::Display for DatasetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatasetCategory::Sql => "sql",
            DatasetCategory::Vector => "vector",
            DatasetCategory::Blob => "blob",
            DatasetCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// Read-only view of a dataset row as needed by the tool layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRef {
    pub id: DatasetId,
    pub tenant_id: TenantId,
    pub name: String,
    pub category: DatasetCategory,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Constrained select request. `limit` and `timeout_s` are already clamped by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlSelectSpec {
    pub columns: Option<Vec<String>>,
    /// Column -> value equality predicates.
    pub r#where: Option<Map<String, Value>>,
    pub params: Option<Map<String, Value>>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    pub limit: u32,
    pub offset: u32,
    pub timeout_s: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlSelectResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuerySpec {
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub filter: Option<Map<String, Value>>,
    pub include_values: bool,
    pub include_metadata: bool,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQueryResult {
    pub matches: Vec<VectorMatch>,
    pub namespace: Option<String>,
}

/// Byte range for blob reads (`end` exclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

#[async_trait]
pub trait DatasetGateway: Send + Sync {
    /// Non-deleted dataset owned by `tenant`.
    async fn find(&self, tenant: &TenantId, id: DatasetId) -> Result<Option<DatasetRef>, DatasetError>;

    async fn sql_select(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        spec: &SqlSelectSpec,
    ) -> Result<SqlSelectResult, DatasetError>;

    async fn sql_schema(&self, tenant: &TenantId, id: DatasetId) -> Result<Value, DatasetError>;

    async fn vector_query(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        spec: &VectorQuerySpec,
    ) -> Result<VectorQueryResult, DatasetError>;

    async fn vector_stats(&self, tenant: &TenantId, id: DatasetId) -> Result<Value, DatasetError>;

    async fn blob_get(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        range: Option<BlobRange>,
    ) -> Result<Value, DatasetError>;

    async fn blob_presign(&self, tenant: &TenantId, id: DatasetId, ttl_s: u32) -> Result<Value, DatasetError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset not found")]
    NotFound,

    #[error("{0}")]
    Disabled(String),

    #[error("Dataset category mismatch for operation: expected {expected}, found {found}")]
    CategoryMismatch {
        expected: DatasetCategory,
        found: DatasetCategory,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("Dataset backend error: {0}")]
    Backend(String),
}

impl Classified for DatasetError {
    fn kind(&self) -> ErrorKind {
        match self {
            DatasetError::NotFound => ErrorKind::NotFound,
            DatasetError::Disabled(_) => ErrorKind::Disabled,
            DatasetError::CategoryMismatch { .. } | DatasetError::Invalid(_) => ErrorKind::ValidationInvalid,
            DatasetError::NotImplemented(_) => ErrorKind::NotImplemented,
            DatasetError::Backend(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DatasetError::NotFound => "DATASET_NOT_FOUND",
            DatasetError::Disabled(_) => "DATASET_DISABLED",
            DatasetError::CategoryMismatch { .. } | DatasetError::Invalid(_) => "DATASET_VALIDATION_ERROR",
            DatasetError::NotImplemented(_) => "DATASET_NOT_IMPLEMENTED",
            DatasetError::Backend(_) => "DATASET_BACKEND_ERROR",
        }
    }
}
