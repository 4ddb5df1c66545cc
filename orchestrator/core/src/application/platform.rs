// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Platform assembly
//!
//! Wires repositories, registries and the secret cipher into the
//! application services. Nothing here is global: every [`Platform`] owns its
//! own registries and repositories, so tests can build as many as they need.
//!
//! Network runtimes that depend on [`AgentService`] (standalone, swarm) are
//! registered as factories and instantiated once the agent service exists.

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::application::agent_service::AgentService;
use crate::application::chat_service::{ChatThreadService, ChatbotService};
use crate::application::model_service::AiModelService;
use crate::application::network_service::AgentNetworkService;
use crate::application::standalone::StandaloneRuntime;
use crate::application::tool_service::ToolService;
use crate::application::Paging;
use crate::domain::dataset::DatasetGateway;
use crate::domain::network::{NetworkRuntime, NetworkType};
use crate::domain::platform_config::{ChatConfig, ConnectorsConfig, PlatformConfig};
use crate::domain::repository::{
    AgentRepository, ChatbotRepository, MessageRepository, ModelRepository, NetworkRepository, ThreadRepository,
    ToolRepository,
};
use crate::domain::secrets::SecretCipher;
use crate::infrastructure::bootstrap::{builtin_connectors, builtin_tool_adapters};
use crate::infrastructure::datasets::InMemoryDatasetGateway;
use crate::infrastructure::db::Database;
use crate::infrastructure::registry::{ConnectorRegistry, RuntimeRegistry, ToolAdapterRegistry};
use crate::infrastructure::repositories::{
    InMemoryAgentRepository, InMemoryChatbotRepository, InMemoryMessageRepository, InMemoryModelRepository,
    InMemoryNetworkRepository, InMemoryThreadRepository, InMemoryToolRepository, PostgresAgentRepository,
    PostgresChatbotRepository, PostgresMessageRepository, PostgresModelRepository, PostgresNetworkRepository,
    PostgresThreadRepository, PostgresToolRepository,
};
use crate::infrastructure::secrets::AesGcmCipher;

/// Builds a runtime once the agent service is available.
pub type RuntimeFactory = Box<dyn FnOnce(Arc<AgentService>) -> Arc<dyn NetworkRuntime> + Send>;

/// One repository per aggregate.
#[derive(Clone)]
pub struct Repositories {
    pub models: Arc<dyn ModelRepository>,
    pub tools: Arc<dyn ToolRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub networks: Arc<dyn NetworkRepository>,
    pub chatbots: Arc<dyn ChatbotRepository>,
    pub threads: Arc<dyn ThreadRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            models: Arc::new(InMemoryModelRepository::new()),
            tools: Arc::new(InMemoryToolRepository::new()),
            agents: Arc::new(InMemoryAgentRepository::new()),
            networks: Arc::new(InMemoryNetworkRepository::new()),
            chatbots: Arc::new(InMemoryChatbotRepository::new()),
            threads: Arc::new(InMemoryThreadRepository::new()),
            messages: Arc::new(InMemoryMessageRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            models: Arc::new(PostgresModelRepository::new(pool.clone())),
            tools: Arc::new(PostgresToolRepository::new(pool.clone())),
            agents: Arc::new(PostgresAgentRepository::new(pool.clone())),
            networks: Arc::new(PostgresNetworkRepository::new(pool.clone())),
            chatbots: Arc::new(PostgresChatbotRepository::new(pool.clone())),
            threads: Arc::new(PostgresThreadRepository::new(pool.clone())),
            messages: Arc::new(PostgresMessageRepository::new(pool)),
        }
    }
}

/// The assembled application services.
#[derive(Clone)]
pub struct Platform {
    pub models: Arc<AiModelService>,
    pub tools: Arc<ToolService>,
    pub agents: Arc<AgentService>,
    pub networks: Arc<AgentNetworkService>,
    pub chatbots: Arc<ChatbotService>,
    pub threads: Arc<ChatThreadService>,
}

impl Platform {
    pub fn builder(cipher: Arc<dyn SecretCipher>) -> PlatformBuilder {
        PlatformBuilder::new(cipher)
    }
}

pub struct PlatformBuilder {
    cipher: Arc<dyn SecretCipher>,
    paging: Paging,
    probes: ConnectorsConfig,
    chat: ChatConfig,
    repositories: Option<Repositories>,
    connectors: Option<ConnectorRegistry>,
    adapters: Option<ToolAdapterRegistry>,
    datasets: Option<Arc<dyn DatasetGateway>>,
    runtimes: Vec<(NetworkType, RuntimeFactory)>,
}

impl PlatformBuilder {
    /// Defaults: in-memory repositories, built-in connectors and adapters,
    /// an empty in-memory dataset gateway and the standalone runtime.
    pub fn new(cipher: Arc<dyn SecretCipher>) -> Self {
        let standalone: RuntimeFactory =
            Box::new(|agents: Arc<AgentService>| Arc::new(StandaloneRuntime::new(agents)) as Arc<dyn NetworkRuntime>);
        Self {
            cipher,
            paging: Paging::default(),
            probes: ConnectorsConfig::default(),
            chat: ChatConfig::default(),
            repositories: None,
            connectors: None,
            adapters: None,
            datasets: None,
            runtimes: vec![(NetworkType::Standalone, standalone)],
        }
    }

    /// Cipher from the configured secret key, Postgres repositories when a
    /// database URL is set (migrations are applied), and the configured
    /// paging, probe and chat settings.
    pub async fn from_config(config: &PlatformConfig) -> anyhow::Result<Self> {
        let secret = config.resolve_secret_key().context("Failed to resolve spec.security.secret_key")?;
        let cipher = AesGcmCipher::new(&secret).context("Failed to initialise the secret cipher")?;
        let mut builder = Self::new(Arc::new(cipher)).with_config(config);

        if let Some(db) = Database::from_config(&config.spec.database).await? {
            db.migrate().await?;
            builder = builder.repositories(Repositories::postgres(db.get_pool().clone()));
            info!("Using PostgreSQL repositories");
        } else {
            info!("No database configured; using in-memory repositories");
        }
        Ok(builder)
    }

    pub fn with_config(mut self, config: &PlatformConfig) -> Self {
        self.paging = Paging::from(&config.spec.pagination);
        self.probes = config.spec.connectors;
        self.chat = config.spec.chat;
        self
    }

    pub fn repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = Some(repositories);
        self
    }

    pub fn connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = Some(connectors);
        self
    }

    pub fn tool_adapters(mut self, adapters: ToolAdapterRegistry) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn datasets(mut self, datasets: Arc<dyn DatasetGateway>) -> Self {
        self.datasets = Some(datasets);
        self
    }

    /// Register (or replace) the runtime for a network type.
    pub fn runtime(mut self, network_type: NetworkType, factory: RuntimeFactory) -> Self {
        self.runtimes.retain(|(t, _)| *t != network_type);
        self.runtimes.push((network_type, factory));
        self
    }

    pub fn build(self) -> Platform {
        let repos = self.repositories.unwrap_or_else(Repositories::in_memory);
        let datasets = self
            .datasets
            .unwrap_or_else(|| Arc::new(InMemoryDatasetGateway::new()) as Arc<dyn DatasetGateway>);

        let models = Arc::new(AiModelService::new(
            repos.models.clone(),
            self.connectors.unwrap_or_else(builtin_connectors),
            self.cipher,
            self.paging,
            self.probes,
        ));
        let tools = Arc::new(ToolService::new(
            repos.tools.clone(),
            self.adapters.unwrap_or_else(builtin_tool_adapters),
            models.clone(),
            datasets,
            self.paging,
        ));
        let agents = Arc::new(AgentService::new(
            repos.agents.clone(),
            repos.networks.clone(),
            models.clone(),
            tools.clone(),
            self.paging,
        ));

        let runtimes = self
            .runtimes
            .into_iter()
            .fold(RuntimeRegistry::builder("network runtimes"), |builder, (network_type, factory)| {
                builder.register(network_type.as_str(), None, factory(agents.clone()))
            })
            .build();
        info!(runtimes = runtimes.len(), "Network runtimes registered");

        let networks = Arc::new(AgentNetworkService::new(
            repos.networks.clone(),
            repos.agents.clone(),
            repos.chatbots.clone(),
            runtimes,
            self.paging,
        ));
        let chatbots = Arc::new(ChatbotService::new(repos.chatbots.clone(), networks.clone(), self.paging));
        let threads = Arc::new(ChatThreadService::new(
            repos.threads,
            repos.messages,
            chatbots.clone(),
            self.chat.history_window,
            self.paging,
        ));

        Platform {
            models,
            tools,
            agents,
            networks,
            chatbots,
            threads,
        }
    }
}
