//! Conversational agents
//!
//! An agent binds a role, a tool set and a storage partition to the shared
//! language model. One run answers one query:
//!
//! SYSTEM PROMPT → REPLAYED TURNS → QUERY → (TOOL CALLS → TOOL RESULTS)* → ANSWER

use crate::config::Settings;
use crate::llm::{ChatMessage, ChatModel, ToolCall, ToolSpec};
use crate::models::{AgentResponse, ChatTurn, ToolInput};
use crate::storage::AgentStorage;
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod registry;

pub use registry::{AgentProfile, AgentRegistry, AGENT_PROFILES};

/// The invocation boundary the interaction controller talks to.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, session_id: Uuid, text: &str) -> Result<AgentResponse>;
}

pub struct Agent {
    profile: &'static AgentProfile,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    storage: AgentStorage,
    history_turns: usize,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(
        profile: &'static AgentProfile,
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        storage: AgentStorage,
        settings: &Settings,
    ) -> Self {
        Self {
            profile,
            model,
            tools,
            storage,
            history_turns: settings.history_turns,
            max_tool_rounds: settings.max_tool_rounds,
        }
    }

    pub fn profile(&self) -> &'static AgentProfile {
        self.profile
    }

    pub fn storage(&self) -> &AgentStorage {
        &self.storage
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.list()
    }

    /// Answer one query, replaying earlier turns of the session when enabled.
    pub async fn run(&self, session_id: Uuid, query: &str) -> Result<AgentResponse> {
        let started = Instant::now();
        let mut messages = vec![ChatMessage::system(build_system_prompt(
            self.profile,
            &self.tools.list(),
        ))];

        if self.profile.add_history_to_messages {
            match self.storage.load_recent(session_id, self.history_turns).await {
                Ok(turns) => {
                    debug!(agent = self.profile.name, replayed = turns.len(), "Replaying history");
                    for turn in turns {
                        messages.push(ChatMessage::user(turn.query));
                        messages.push(ChatMessage::assistant(turn.response));
                    }
                }
                Err(error) => {
                    warn!("History load failed, continuing without replayed turns: {}", error);
                }
            }
        }

        messages.push(ChatMessage::user(query));

        let specs = self.tools.specs();
        let mut tools_called = Vec::new();
        let mut content = None;

        for round in 0..=self.max_tool_rounds {
            // Last round withholds tools so the model has to answer.
            let offered: &[ToolSpec] = if round < self.max_tool_rounds { &specs[..] } else { &[] };
            let reply = self.model.complete(&messages, offered).await?;

            let calls = reply.requested_tools().to_vec();
            if calls.is_empty() || offered.is_empty() {
                content = reply.content;
                break;
            }

            messages.push(reply);
            for call in &calls {
                tools_called.push(call.function.name.clone());
                let result = self.dispatch(call).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), result));
            }
        }

        let response = AgentResponse {
            content,
            tools_called,
        };

        let turn = ChatTurn::new(query, response.normalized());
        if let Err(error) = self.storage.append(session_id, &turn).await {
            warn!("Run persistence failed, response will still be returned: {}", error);
        }

        info!(
            agent = self.profile.name,
            tools = ?response.tools_called,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Agent run completed"
        );

        Ok(response)
    }

    /// Executes one tool call. Failures go back to the model as text.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.function.name) else {
            warn!(tool = %call.function.name, "Model requested an unknown tool");
            return format!("Error: unknown tool '{}'", call.function.name);
        };

        let parameters = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(value) => value,
                Err(e) => return format!("Error: arguments are not valid JSON: {}", e),
            }
        };

        let input = ToolInput {
            tool_name: call.function.name.clone(),
            parameters,
        };

        match tool.execute(&input).await {
            Ok(output) => {
                debug!(tool = %input.tool_name, success = output.success, "Tool executed");
                serde_json::to_string(&output.data)
                    .unwrap_or_else(|e| format!("Error: unserializable tool output: {}", e))
            }
            Err(e) => {
                warn!(tool = %input.tool_name, "Tool failed: {}", e);
                format!("Error: {}", e)
            }
        }
    }
}

#[async_trait]
impl AgentInvoker for Agent {
    fn name(&self) -> &str {
        self.profile.name
    }

    async fn invoke(&self, session_id: Uuid, text: &str) -> Result<AgentResponse> {
        self.run(session_id, text).await
    }
}

/// Build the system prompt from the agent's role and instructions
fn build_system_prompt(profile: &AgentProfile, tools: &[&str]) -> String {
    let mut prompt = format!("You are {}.\nYour role: {}.", profile.name, profile.role);

    let mut guidelines: Vec<&str> = profile.instructions.to_vec();
    if profile.markdown {
        guidelines.push("Use markdown to format your answers");
    }
    if !guidelines.is_empty() {
        prompt.push_str("\n\nInstructions:\n- ");
        prompt.push_str(&guidelines.join("\n- "));
    }

    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:\n- ");
        prompt.push_str(&tools.join("\n- "));
    }

    prompt
}
