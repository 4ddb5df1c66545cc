// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Model Connectors
//
// One `ModelConnector` per model type slug. Built-ins are registered by
// `crate::infrastructure::bootstrap`.

pub mod openai_chat;
pub mod openai_common;
pub mod openai_embeddings;
pub mod scripted;

pub use openai_chat::{OpenAiChatConnector, OpenAiChatModel};
pub use openai_embeddings::OpenAiEmbeddingsConnector;
pub use scripted::{ScriptedConnector, ScriptedReply};
