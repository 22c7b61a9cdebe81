//! Core data models for the chat service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Recorded in place of a response that carried no usable text.
pub const FALLBACK_RESPONSE: &str = "⚠️ No valid response received.";

//
// ================= Chat History =================
//

/// One (query, response) pair of a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
}

impl ChatTurn {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
        }
    }
}

//
// ================= Agent Result =================
//

/// Result of a single agent invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tools_called: Vec<String>,
}

impl AgentResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tools_called: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Text to record for this response, or the fallback when nothing usable came back.
    pub fn normalized(&self) -> String {
        match self.content.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => FALLBACK_RESPONSE.to_string(),
        }
    }
}

//
// ================= Capabilities =================
//

/// External tool families an agent may call while answering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    FinancialData,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::WebSearch => write!(f, "web search"),
            Capability::FinancialData => write!(f, "financial data"),
        }
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}
