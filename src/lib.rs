//! Multi-Agent Chat
//!
//! A browser front end for four preconfigured conversational agents:
//! - Web search, finance, research and general-purpose agents
//! - Per-session chat history with clear and plain-text export
//! - Per-agent storage partitions replayed as conversation memory
//!
//! REQUEST FLOW:
//! FORM → CONTROLLER → AGENT (MODEL ⇄ TOOLS) → NORMALIZE → SESSION → PAGE

pub mod agent;
pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod models;
pub mod render;
pub mod session;
pub mod storage;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::{Agent, AgentInvoker, AgentRegistry};
pub use session::{SessionHandle, SessionState, SessionStore};
