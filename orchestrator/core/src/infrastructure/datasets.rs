// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # In-Memory Dataset Gateway
//!
//! Reference [`DatasetGateway`] for tests and local runs. SQL datasets are a
//! list of JSON rows with equality filtering, projection, ordering and
//! paging; vector datasets are records ranked by cosine similarity. Blob
//! access is not supported.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

use crate::domain::dataset::{
    BlobRange, DatasetCategory, DatasetError, DatasetGateway, DatasetId, DatasetRef, SortDirection,
    SqlSelectResult, SqlSelectSpec, VectorMatch, VectorQueryResult, VectorQuerySpec,
};
use crate::domain::tenant::TenantId;

/// Stored vector with optional metadata and namespace.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
enum Contents {
    Rows(Vec<Map<String, Value>>),
    Vectors(Vec<VectorRecord>),
    Empty,
}

#[derive(Debug, Clone)]
struct Entry {
    dataset: DatasetRef,
    contents: Contents,
    deleted: bool,
}

#[derive(Default)]
pub struct InMemoryDatasetGateway {
    datasets: DashMap<DatasetId, Entry>,
}

impl InMemoryDatasetGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, tenant: &TenantId, name: &str, category: DatasetCategory, contents: Contents) -> DatasetId {
        let id = DatasetId::new();
        self.datasets.insert(
            id,
            Entry {
                dataset: DatasetRef {
                    id,
                    tenant_id: tenant.clone(),
                    name: name.to_string(),
                    category,
                    is_enabled: true,
                },
                contents,
                deleted: false,
            },
        );
        id
    }

    pub fn add_sql(&self, tenant: &TenantId, name: &str, rows: Vec<Map<String, Value>>) -> DatasetId {
        self.put(tenant, name, DatasetCategory::Sql, Contents::Rows(rows))
    }

    pub fn add_vector(&self, tenant: &TenantId, name: &str, records: Vec<VectorRecord>) -> DatasetId {
        self.put(tenant, name, DatasetCategory::Vector, Contents::Vectors(records))
    }

    pub fn add_blob(&self, tenant: &TenantId, name: &str) -> DatasetId {
        self.put(tenant, name, DatasetCategory::Blob, Contents::Empty)
    }

    pub fn set_enabled(&self, id: DatasetId, enabled: bool) {
        if let Some(mut entry) = self.datasets.get_mut(&id) {
            entry.dataset.is_enabled = enabled;
        }
    }

    pub fn soft_delete(&self, id: DatasetId) {
        if let Some(mut entry) = self.datasets.get_mut(&id) {
            entry.deleted = true;
        }
    }

    /// Live, enabled dataset of the expected category.
    fn usable(&self, tenant: &TenantId, id: DatasetId, expected: DatasetCategory) -> Result<Entry, DatasetError> {
        let entry = self
            .datasets
            .get(&id)
            .filter(|e| !e.deleted && &e.dataset.tenant_id == tenant)
            .map(|e| e.clone())
            .ok_or(DatasetError::NotFound)?;
        if !entry.dataset.is_enabled {
            return Err(DatasetError::Disabled(format!("Dataset '{}' is disabled", entry.dataset.name)));
        }
        if entry.dataset.category != expected {
            return Err(DatasetError::CategoryMismatch {
                expected,
                found: entry.dataset.category,
            });
        }
        Ok(entry)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn matches_filter(metadata: &Map<String, Value>, filter: Option<&Map<String, Value>>) -> bool {
    filter.is_none_or(|f| f.iter().all(|(k, v)| metadata.get(k) == Some(v)))
}

#[async_trait]
impl DatasetGateway for InMemoryDatasetGateway {
    async fn find(&self, tenant: &TenantId, id: DatasetId) -> Result<Option<DatasetRef>, DatasetError> {
        Ok(self
            .datasets
            .get(&id)
            .filter(|e| !e.deleted && &e.dataset.tenant_id == tenant)
            .map(|e| e.dataset.clone()))
    }

    async fn sql_select(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        spec: &SqlSelectSpec,
    ) -> Result<SqlSelectResult, DatasetError> {
        let entry = self.usable(tenant, id, DatasetCategory::Sql)?;
        let Contents::Rows(rows) = entry.contents else {
            return Err(DatasetError::Backend("SQL dataset has no rows".to_string()));
        };

        let mut selected: Vec<Map<String, Value>> = rows
            .into_iter()
            .filter(|row| matches_filter(row, spec.r#where.as_ref()))
            .collect();

        for order in spec.order_by.iter().rev() {
            selected.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let page: Vec<Map<String, Value>> = selected
            .into_iter()
            .skip(spec.offset as usize)
            .take(spec.limit as usize)
            .collect();

        let columns: Vec<String> = match &spec.columns {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => {
                let mut cols: Vec<String> = Vec::new();
                for row in &page {
                    for key in row.keys() {
                        if !cols.contains(key) {
                            cols.push(key.clone());
                        }
                    }
                }
                cols
            }
        };

        let rows: Vec<Map<String, Value>> = page
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();

        Ok(SqlSelectResult {
            row_count: rows.len(),
            columns,
            rows,
        })
    }

    async fn sql_schema(&self, tenant: &TenantId, id: DatasetId) -> Result<Value, DatasetError> {
        let entry = self.usable(tenant, id, DatasetCategory::Sql)?;
        let mut columns: Vec<String> = Vec::new();
        if let Contents::Rows(rows) = &entry.contents {
            for key in rows.iter().flat_map(|r| r.keys()) {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Ok(json!({"dataset": entry.dataset.name, "columns": columns}))
    }

    async fn vector_query(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        spec: &VectorQuerySpec,
    ) -> Result<VectorQueryResult, DatasetError> {
        let entry = self.usable(tenant, id, DatasetCategory::Vector)?;
        let Contents::Vectors(records) = entry.contents else {
            return Err(DatasetError::Backend("Vector dataset has no records".to_string()));
        };
        if spec.vector.is_empty() {
            return Err(DatasetError::Invalid("Query vector must not be empty".to_string()));
        }

        let mut scored: Vec<(f32, VectorRecord)> = records
            .into_iter()
            .filter(|r| spec.namespace.is_none() || r.namespace == spec.namespace)
            .filter(|r| matches_filter(&r.metadata, spec.filter.as_ref()))
            .filter(|r| r.values.len() == spec.vector.len())
            .map(|r| (cosine(&spec.vector, &r.values), r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let matches = scored
            .into_iter()
            .take(spec.top_k as usize)
            .map(|(score, r)| VectorMatch {
                id: r.id,
                score,
                values: spec.include_values.then_some(r.values),
                metadata: spec.include_metadata.then(|| Value::Object(r.metadata)),
            })
            .collect();

        Ok(VectorQueryResult {
            matches,
            namespace: spec.namespace.clone(),
        })
    }

    async fn vector_stats(&self, tenant: &TenantId, id: DatasetId) -> Result<Value, DatasetError> {
        let entry = self.usable(tenant, id, DatasetCategory::Vector)?;
        let (count, dimension) = match &entry.contents {
            Contents::Vectors(records) => (records.len(), records.first().map(|r| r.values.len())),
            _ => (0, None),
        };
        Ok(json!({"count": count, "dimension": dimension}))
    }

    async fn blob_get(
        &self,
        tenant: &TenantId,
        id: DatasetId,
        _range: Option<BlobRange>,
    ) -> Result<Value, DatasetError> {
        self.usable(tenant, id, DatasetCategory::Blob)?;
        Err(DatasetError::NotImplemented("Blob reads are not supported by this gateway".to_string()))
    }

    async fn blob_presign(&self, tenant: &TenantId, id: DatasetId, _ttl_s: u32) -> Result<Value, DatasetError> {
        self.usable(tenant, id, DatasetCategory::Blob)?;
        Err(DatasetError::NotImplemented("Blob presigning is not supported by this gateway".to_string()))
    }
}
