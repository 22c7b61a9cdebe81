//! Agent registry
//!
//! Maps display labels (and short keys) to the four preconfigured agents.

use super::Agent;
use crate::config::Settings;
use crate::error::AppError;
use crate::llm::{ChatModel, OpenAiClient};
use crate::models::Capability;
use crate::storage::AgentStore;
use crate::tools::ToolRegistry;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Static configuration of one agent.
#[derive(Debug, Serialize)]
pub struct AgentProfile {
    pub key: &'static str,
    pub label: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    pub instructions: &'static [&'static str],
    pub capabilities: &'static [Capability],
    /// Storage partition; unique per agent.
    pub table: &'static str,
    pub add_history_to_messages: bool,
    pub markdown: bool,
}

pub static AGENT_PROFILES: [AgentProfile; 4] = [
    AgentProfile {
        key: "web",
        label: "🌍 Web Search Agent",
        name: "Web Agent",
        role: "Search the web for information",
        instructions: &[],
        capabilities: &[Capability::WebSearch],
        table: "web_agent",
        add_history_to_messages: true,
        markdown: true,
    },
    AgentProfile {
        key: "finance",
        label: "📈 Finance Agent",
        name: "Finance Agent",
        role: "Get financial data",
        instructions: &["Always use tables to display data"],
        capabilities: &[Capability::FinancialData, Capability::WebSearch],
        table: "finance_agent",
        add_history_to_messages: true,
        markdown: true,
    },
    AgentProfile {
        key: "research",
        label: "📚 Research Agent",
        name: "Research Agent",
        role: "Conduct in-depth research on various topics",
        instructions: &[],
        capabilities: &[Capability::WebSearch],
        table: "research_agent",
        add_history_to_messages: true,
        markdown: true,
    },
    AgentProfile {
        key: "simple",
        label: "💬 Simple Agent",
        name: "Simple Agent",
        role: "Provide general AI-powered responses",
        instructions: &[],
        capabilities: &[],
        table: "simple_agent",
        add_history_to_messages: true,
        markdown: true,
    },
];

pub struct AgentRegistry {
    agents: Vec<Arc<Agent>>,
}

impl AgentRegistry {
    /// Builds every agent against the OpenAI API. Fails before constructing
    /// anything when no credential was supplied.
    pub fn build(credential: Option<&str>, settings: &Settings, store: &AgentStore) -> Result<Self> {
        let api_key = credential
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AppError::MissingCredential)?;

        let model: Arc<dyn ChatModel> = Arc::new(OpenAiClient::new(api_key, settings)?);
        Self::with_model(model, settings, store)
    }

    /// Builds every agent against an already constructed model.
    pub fn with_model(
        model: Arc<dyn ChatModel>,
        settings: &Settings,
        store: &AgentStore,
    ) -> Result<Self> {
        let agents = AGENT_PROFILES
            .iter()
            .map(|profile| {
                let tools = ToolRegistry::for_capabilities(profile.capabilities, settings)?;
                let storage = store.partition(profile.table)?;
                Ok(Arc::new(Agent::new(
                    profile,
                    Arc::clone(&model),
                    tools,
                    storage,
                    settings,
                )))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(agents = agents.len(), "Agent registry initialized");
        Ok(Self { agents })
    }

    /// Display labels in selector order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.agents.iter().map(|agent| agent.profile().label).collect()
    }

    /// Looks an agent up by display label or short key.
    pub fn get(&self, label_or_key: &str) -> Option<Arc<Agent>> {
        let wanted = label_or_key.trim();
        self.agents
            .iter()
            .find(|agent| {
                let profile = agent.profile();
                profile.label == wanted || profile.key.eq_ignore_ascii_case(wanted)
            })
            .cloned()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.agents.iter()
    }
}
