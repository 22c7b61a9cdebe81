//! Web search through the DuckDuckGo Instant Answer API

use super::{ensure_object_parameters, optional_count, require_str, JsonHttpClient, Tool};
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_RESULTS: usize = 5;
const MAX_RESULTS: usize = 10;

pub struct WebSearchTool {
    http: JsonHttpClient,
    base_url: String,
}

impl WebSearchTool {
    pub fn new(http: JsonHttpClient, base_url: String) -> Self {
        Self { http, base_url }
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web (DuckDuckGo) and return an abstract plus related results"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "max_results": {"type": "integer", "description": "Number of related results (1-10)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let query = require_str(input, "query")?;
        let max_results = optional_count(input, "max_results", DEFAULT_RESULTS, MAX_RESULTS);

        let url = format!("{}/", self.base_url);
        let body = self
            .http
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("format", "json".to_string()),
                    ("no_html", "1".to_string()),
                    ("skip_disambig", "1".to_string()),
                ],
            )
            .await?;

        let results = collect_related(&body, max_results);
        debug!(query = %query, results = results.len(), "Web search completed");

        Ok(ToolOutput {
            success: true,
            data: json!({
                "query": query,
                "heading": text_field(&body, "Heading"),
                "answer": text_field(&body, "Answer"),
                "abstract": text_field(&body, "AbstractText"),
                "abstract_url": text_field(&body, "AbstractURL"),
                "results": results,
            }),
            error: None,
        })
    }
}

fn text_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Flattens `RelatedTopics`, which mixes plain topics with named groups of topics.
fn collect_related(body: &Value, limit: usize) -> Vec<Value> {
    let mut out = Vec::new();
    let Some(topics) = body.get("RelatedTopics").and_then(Value::as_array) else {
        return out;
    };

    let mut stack: Vec<&Value> = topics.iter().rev().collect();
    while let Some(topic) = stack.pop() {
        if out.len() >= limit {
            break;
        }
        if let Some(group) = topic.get("Topics").and_then(Value::as_array) {
            stack.extend(group.iter().rev());
            continue;
        }
        if let Some(text) = text_field(topic, "Text") {
            out.push(json!({
                "title": text,
                "url": text_field(topic, "FirstURL"),
            }));
        }
    }
    out
}
