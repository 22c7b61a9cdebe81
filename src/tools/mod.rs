//! Tool trait and registry
//!
//! Tools are thin adapters over external data services. The agent
//! advertises them to the model and dispatches the calls it asks for.

use crate::config::Settings;
use crate::error::AppError;
use crate::llm::ToolSpec;
use crate::models::{Capability, ToolInput, ToolOutput};
use crate::Result;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub mod finance;
pub mod web_search;

pub use finance::{FinanceQuery, YahooFinanceTool};
pub use web_search::WebSearchTool;

const USER_AGENT: &str = concat!("multi-agent-chat/", env!("CARGO_PKG_VERSION"));

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry holding every tool the given capabilities grant.
    pub fn for_capabilities(capabilities: &[Capability], settings: &Settings) -> Result<Self> {
        let mut registry = Self::new();
        if capabilities.is_empty() {
            return Ok(registry);
        }

        let http = JsonHttpClient::new(settings.request_timeout)?;

        for capability in capabilities {
            match capability {
                Capability::WebSearch => {
                    registry.register(Arc::new(WebSearchTool::new(
                        http.clone(),
                        settings.search_base_url.clone(),
                    )));
                }
                Capability::FinancialData => {
                    for query in FinanceQuery::ALL {
                        registry.register(Arc::new(YahooFinanceTool::new(
                            query,
                            http.clone(),
                            settings.finance_base_url.clone(),
                        )));
                    }
                }
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function definitions advertised to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared GET-and-parse client for the tool services.
#[derive(Clone)]
pub struct JsonHttpClient {
    client: Client,
}

impl JsonHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::ToolError(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ToolError(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::ToolError(format!("Invalid JSON response: {}", e)))
    }
}

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AppError::InvalidToolInput(
            "tool arguments must be a JSON object".to_string(),
        ))
    }
}

fn require_str<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidToolInput(format!("Expected '{}' in tool arguments", key)))
}

fn optional_count(input: &ToolInput, key: &str, default: usize, max: usize) -> usize {
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| (n as usize).clamp(1, max))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_per_capability() {
        let settings = Settings::default();

        let none = ToolRegistry::for_capabilities(&[], &settings).unwrap();
        assert!(none.is_empty());

        let web = ToolRegistry::for_capabilities(&[Capability::WebSearch], &settings).unwrap();
        assert_eq!(web.list(), vec!["web_search"]);

        let finance = ToolRegistry::for_capabilities(
            &[Capability::FinancialData, Capability::WebSearch],
            &settings,
        )
        .unwrap();
        assert_eq!(
            finance.list(),
            vec![
                "get_analyst_recommendations",
                "get_company_info",
                "get_company_news",
                "get_stock_price",
                "web_search",
            ]
        );
        assert_eq!(finance.specs().len(), 5);
    }

    #[test]
    fn test_require_str() {
        let input = ToolInput {
            tool_name: "web_search".to_string(),
            parameters: json!({"query": "  rust  ", "blank": " "}),
        };
        assert_eq!(require_str(&input, "query").unwrap(), "rust");
        assert!(require_str(&input, "blank").is_err());
        assert!(require_str(&input, "missing").is_err());
    }

    #[test]
    fn test_optional_count_is_clamped() {
        let input = ToolInput {
            tool_name: "get_company_news".to_string(),
            parameters: json!({"num_stories": 500}),
        };
        assert_eq!(optional_count(&input, "num_stories", 3, 10), 10);
        assert_eq!(optional_count(&input, "missing", 3, 10), 3);
    }
}
