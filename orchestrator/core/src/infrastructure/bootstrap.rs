// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Built-in registries
//
// The registries a production platform starts with. Tests build their own
// registries with the scripted connectors instead.

use std::sync::Arc;

use crate::infrastructure::connectors::{openai_chat, openai_embeddings, OpenAiChatConnector, OpenAiEmbeddingsConnector};
use crate::infrastructure::registry::{ConnectorRegistry, ToolAdapterRegistry};
use crate::infrastructure::tools::{sql_select, vector_search, SqlSelectAdapter, VectorSearchAdapter};

pub fn builtin_connectors() -> ConnectorRegistry {
    ConnectorRegistry::builder("model connectors")
        .register(openai_chat::TYPE_SLUG, None, Arc::new(OpenAiChatConnector::new()))
        .register(openai_embeddings::TYPE_SLUG, None, Arc::new(OpenAiEmbeddingsConnector::new()))
        .build()
}

pub fn builtin_tool_adapters() -> ToolAdapterRegistry {
    ToolAdapterRegistry::builder("tool adapters")
        .register(sql_select::KIND, None, Arc::new(SqlSelectAdapter::new()))
        .register(vector_search::KIND, None, Arc::new(VectorSearchAdapter::new()))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registries() {
        let connectors = builtin_connectors();
        assert!(connectors.contains("llm.openai", None));
        assert!(connectors.contains(openai_embeddings::TYPE_SLUG, None));
        assert!(!connectors.contains("llm.scripted", None));

        let adapters = builtin_tool_adapters();
        assert_eq!(adapters.len(), 2);
        assert!(adapters.contains("sql.select", Some("postgres")));
    }
}
