//! Financial data through Yahoo Finance
//!
//! One tool per query kind, all sharing the same HTTP client.

use super::{ensure_object_parameters, optional_count, require_str, JsonHttpClient, Tool};
use crate::error::AppError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceQuery {
    StockPrice,
    AnalystRecommendations,
    CompanyInfo,
    CompanyNews,
}

impl FinanceQuery {
    pub const ALL: [FinanceQuery; 4] = [
        FinanceQuery::StockPrice,
        FinanceQuery::AnalystRecommendations,
        FinanceQuery::CompanyInfo,
        FinanceQuery::CompanyNews,
    ];

    fn tool_name(self) -> &'static str {
        match self {
            FinanceQuery::StockPrice => "get_stock_price",
            FinanceQuery::AnalystRecommendations => "get_analyst_recommendations",
            FinanceQuery::CompanyInfo => "get_company_info",
            FinanceQuery::CompanyNews => "get_company_news",
        }
    }

    fn tool_description(self) -> &'static str {
        match self {
            FinanceQuery::StockPrice => "Get the current stock price for a ticker symbol",
            FinanceQuery::AnalystRecommendations => {
                "Get analyst recommendation trends (buy/hold/sell counts) for a ticker symbol"
            }
            FinanceQuery::CompanyInfo => "Get company profile and key price data for a ticker symbol",
            FinanceQuery::CompanyNews => "Get the latest news stories for a ticker symbol",
        }
    }
}

pub struct YahooFinanceTool {
    query: FinanceQuery,
    http: JsonHttpClient,
    base_url: String,
}

impl YahooFinanceTool {
    pub fn new(query: FinanceQuery, http: JsonHttpClient, base_url: String) -> Self {
        Self {
            query,
            http,
            base_url,
        }
    }

    async fn stock_price(&self, symbol: &str) -> Result<Value> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let body = self
            .http
            .get_json(
                &url,
                &[("interval", "1d".to_string()), ("range", "1d".to_string())],
            )
            .await?;

        let meta = body
            .pointer("/chart/result/0/meta")
            .ok_or_else(|| AppError::ToolError(format!("No price data for {}", symbol)))?;

        Ok(json!({
            "symbol": symbol,
            "price": meta.get("regularMarketPrice"),
            "previous_close": meta.get("chartPreviousClose").or_else(|| meta.get("previousClose")),
            "currency": meta.get("currency"),
            "exchange": meta.get("exchangeName"),
        }))
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let body = self
            .http
            .get_json(&url, &[("modules", modules.to_string())])
            .await?;

        body.pointer("/quoteSummary/result/0")
            .cloned()
            .ok_or_else(|| AppError::ToolError(format!("No {} data for {}", modules, symbol)))
    }

    async fn analyst_recommendations(&self, symbol: &str) -> Result<Value> {
        let summary = self.quote_summary(symbol, "recommendationTrend").await?;
        let trend = summary
            .pointer("/recommendationTrend/trend")
            .cloned()
            .unwrap_or(Value::Array(vec![]));

        Ok(json!({ "symbol": symbol, "trend": trend }))
    }

    async fn company_info(&self, symbol: &str) -> Result<Value> {
        let summary = self.quote_summary(symbol, "assetProfile,price").await?;
        let profile = summary.get("assetProfile");
        let price = summary.get("price");

        Ok(json!({
            "symbol": symbol,
            "name": price.and_then(|p| p.get("longName")),
            "sector": profile.and_then(|p| p.get("sector")),
            "industry": profile.and_then(|p| p.get("industry")),
            "country": profile.and_then(|p| p.get("country")),
            "website": profile.and_then(|p| p.get("website")),
            "employees": profile.and_then(|p| p.get("fullTimeEmployees")),
            "summary": profile.and_then(|p| p.get("longBusinessSummary")),
            "market_cap": price.and_then(|p| p.pointer("/marketCap/raw")),
        }))
    }

    async fn company_news(&self, symbol: &str, count: usize) -> Result<Value> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let body = self
            .http
            .get_json(
                &url,
                &[
                    ("q", symbol.to_string()),
                    ("newsCount", count.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;

        let stories: Vec<Value> = body
            .get("news")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .take(count)
                    .map(|item| {
                        json!({
                            "title": item.get("title"),
                            "publisher": item.get("publisher"),
                            "link": item.get("link"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({ "symbol": symbol, "news": stories }))
    }
}

#[async_trait::async_trait]
impl Tool for YahooFinanceTool {
    fn name(&self) -> &'static str {
        self.query.tool_name()
    }

    fn description(&self) -> &'static str {
        self.query.tool_description()
    }

    fn parameters(&self) -> Value {
        let mut properties = json!({
            "symbol": {"type": "string", "description": "Ticker symbol, e.g. AAPL"}
        });
        if self.query == FinanceQuery::CompanyNews {
            properties["num_stories"] =
                json!({"type": "integer", "description": "Number of stories (1-10)"});
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["symbol"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let symbol = normalize_symbol(require_str(input, "symbol")?)?;

        let data = match self.query {
            FinanceQuery::StockPrice => self.stock_price(&symbol).await?,
            FinanceQuery::AnalystRecommendations => self.analyst_recommendations(&symbol).await?,
            FinanceQuery::CompanyInfo => self.company_info(&symbol).await?,
            FinanceQuery::CompanyNews => {
                let count = optional_count(input, "num_stories", 3, 10);
                self.company_news(&symbol, count).await?
            }
        };

        debug!(tool = self.name(), symbol = %symbol, "Finance lookup completed");

        Ok(ToolOutput {
            success: true,
            data,
            error: None,
        })
    }
}

/// Upper-cases a ticker and rejects anything that cannot be a path segment.
fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if valid {
        Ok(symbol)
    } else {
        Err(AppError::InvalidToolInput(format!(
            "'{}' is not a valid ticker symbol",
            raw
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(query: FinanceQuery, server: &MockServer) -> YahooFinanceTool {
        let http = JsonHttpClient::new(Duration::from_secs(5)).unwrap();
        YahooFinanceTool::new(query, http, server.uri())
    }

    fn input(parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: "finance".to_string(),
            parameters,
        }
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk-b").unwrap(), "BRK-B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("../etc").is_err());
        assert!(normalize_symbol("AAPL MSFT").is_err());
    }

    #[tokio::test]
    async fn test_stock_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {"result": [{"meta": {
                    "symbol": "AAPL",
                    "regularMarketPrice": 189.84,
                    "chartPreviousClose": 187.15,
                    "currency": "USD",
                    "exchangeName": "NMS"
                }}]}
            })))
            .mount(&server)
            .await;

        let output = tool(FinanceQuery::StockPrice, &server)
            .execute(&input(json!({"symbol": "aapl"})))
            .await
            .unwrap();

        assert_eq!(output.data["symbol"], "AAPL");
        assert_eq!(output.data["price"], 189.84);
        assert_eq!(output.data["currency"], "USD");
    }

    #[tokio::test]
    async fn test_company_news_respects_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "MSFT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "news": [
                    {"title": "One", "publisher": "A", "link": "https://a"},
                    {"title": "Two", "publisher": "B", "link": "https://b"},
                    {"title": "Three", "publisher": "C", "link": "https://c"}
                ]
            })))
            .mount(&server)
            .await;

        let output = tool(FinanceQuery::CompanyNews, &server)
            .execute(&input(json!({"symbol": "MSFT", "num_stories": 2})))
            .await
            .unwrap();

        let news = output.data["news"].as_array().unwrap();
        assert_eq!(news.len(), 2);
        assert_eq!(news[1]["title"], "Two");
    }

    #[tokio::test]
    async fn test_missing_result_is_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/ZZZZ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {"result": [], "error": null}
            })))
            .mount(&server)
            .await;

        let err = tool(FinanceQuery::CompanyInfo, &server)
            .execute(&input(json!({"symbol": "ZZZZ"})))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ToolError(_)));
    }
}
