// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod model_service;
pub mod tool_service;
pub mod agent_executor;
pub mod agent_service;
pub mod standalone;
pub mod network_service;
pub mod chat_service;
pub mod platform;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_service::AgentService;
pub use chat_service::{ChatThreadService, ChatbotService};
pub use model_service::AiModelService;
pub use network_service::AgentNetworkService;
pub use platform::{Platform, PlatformBuilder};
pub use tool_service::ToolService;

use serde::Serialize;

use crate::domain::platform_config::PaginationConfig;
use crate::domain::repository::Page;

/// Limit/offset defaults shared by every list operation.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl From<&PaginationConfig> for Paging {
    fn from(config: &PaginationConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

impl Paging {
    pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
        Page::new(limit.unwrap_or(self.default_limit), offset.unwrap_or(0)).clamped(self.max_limit)
    }
}

/// One page of a list operation plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Listing<T> {
    pub fn new(items: Vec<T>, total: usize, page: Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        Listing {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Result of a standalone validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    pub status: &'static str,
}

impl ValidationStatus {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// Trimmed, non-empty, at most `max` characters.
pub(crate) fn check_name(field: &str, value: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", field));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{} must be at most {} characters", field, max));
    }
    Ok(trimmed.to_string())
}
