//! Fact-lookup capabilities available to analysts.
//!
//! This module defines the tools an analyst model may call and a mocked
//! lookup backend that answers them with canned market data. The workflow
//! engine never calls these directly; only analysts do.

use crate::models::{Capability, CapabilitySet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Tool definition for Ollama's tool-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call made by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// Result of executing a lookup.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    /// Text handed back to the model.
    pub fn into_content(self) -> String {
        if self.success {
            self.output
        } else {
            format!("Error: {}", self.error.unwrap_or_default())
        }
    }
}

/// Build the tool definitions for a capability set.
pub fn get_tool_definitions(set: CapabilitySet) -> Vec<ToolDefinition> {
    set.capabilities().iter().map(|c| tool_definition(*c)).collect()
}

fn tool_definition(capability: Capability) -> ToolDefinition {
    let (description, parameters) = match capability {
        Capability::StockData => (
            "Get basic quote and valuation data for a stock symbol.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "Ticker symbol, e.g. 0700.HK"},
                    "period": {"type": "string", "description": "Lookback period (default: 1y)"}
                },
                "required": ["symbol"]
            }),
        ),
        Capability::FinancialNews => (
            "Get recent financial news headlines for a keyword.",
            json!({
                "type": "object",
                "properties": {
                    "keyword": {"type": "string", "description": "Company or topic"},
                    "days": {"type": "integer", "description": "How many days back (default: 7)"}
                },
                "required": ["keyword"]
            }),
        ),
        Capability::TechnicalIndicators => (
            "Compute technical indicators (moving averages, MACD, RSI, volume) for a symbol.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "Ticker symbol"},
                    "indicator": {"type": "string", "description": "Primary indicator (default: MA)"}
                },
                "required": ["symbol"]
            }),
        ),
        Capability::WebSearch => (
            "Search the web for general information.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"}
                },
                "required": ["query"]
            }),
        ),
        Capability::PortfolioOptimization => (
            "Suggest an asset allocation for a set of asset classes and a risk level.",
            json!({
                "type": "object",
                "properties": {
                    "assets": {"type": "string", "description": "Asset classes to allocate across"},
                    "risk_level": {"type": "string", "description": "low, medium or high (default: medium)"}
                },
                "required": ["assets"]
            }),
        ),
        Capability::RiskAssessment => (
            "Assess market, liquidity and credit risk for a position.",
            json!({
                "type": "object",
                "properties": {
                    "position_size": {"type": "string", "description": "Size of the position"},
                    "market_cap": {"type": "string", "description": "Market capitalization of the issuer"}
                },
                "required": ["position_size", "market_cap"]
            }),
        ),
    };

    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: capability.tool_name().to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// Mocked fact-lookup backend.
#[derive(Debug, Clone, Default)]
pub struct FactLookups;

impl FactLookups {
    pub fn new() -> Self {
        Self
    }

    /// Execute a tool call, refusing lookups outside the granted set.
    pub fn execute(&self, call: &ToolCall, allowed: CapabilitySet) -> ToolResult {
        let name = &call.function.name;
        let args = &call.function.arguments;

        debug!("Executing lookup: {} with args: {:?}", name, args);

        let Some(capability) = Capability::from_tool_name(name) else {
            return ToolResult::error(format!("Unknown tool: {}", name));
        };

        if !allowed.allows(capability) {
            return ToolResult::error(format!("Tool {} is not permitted for this analyst", name));
        }

        match capability {
            Capability::StockData => match required(args, "symbol") {
                Ok(symbol) => ToolResult::success(self.stock_data(symbol, optional(args, "period", "1y"))),
                Err(e) => e,
            },
            Capability::FinancialNews => match required(args, "keyword") {
                Ok(keyword) => {
                    let days = args.get("days").and_then(|v| v.as_u64()).unwrap_or(7);
                    ToolResult::success(self.financial_news(keyword, days))
                }
                Err(e) => e,
            },
            Capability::TechnicalIndicators => match required(args, "symbol") {
                Ok(symbol) => ToolResult::success(
                    self.technical_indicators(symbol, optional(args, "indicator", "MA")),
                ),
                Err(e) => e,
            },
            Capability::WebSearch => match required(args, "query") {
                Ok(query) => self.web_search(query),
                Err(e) => e,
            },
            Capability::PortfolioOptimization => match required(args, "assets") {
                Ok(assets) => ToolResult::success(
                    self.portfolio_optimization(assets, optional(args, "risk_level", "medium")),
                ),
                Err(e) => e,
            },
            Capability::RiskAssessment => {
                match (required(args, "position_size"), required(args, "market_cap")) {
                    (Ok(position), Ok(cap)) => ToolResult::success(self.risk_assessment(position, cap)),
                    (Err(e), _) | (_, Err(e)) => e,
                }
            }
        }
    }

    pub fn stock_data(&self, symbol: &str, period: &str) -> String {
        format!(
            "Symbol: {symbol}\nPeriod: {period}\n\n\
             Fundamentals:\n\
             - Last price: 125.50\n\
             - Market cap: 50B\n\
             - P/E: 18.5\n\
             - P/B: 2.3\n\
             - ROE: 15.2%\n\
             - 52-week high: 145.20\n\
             - 52-week low: 98.30\n\n\
             Recent performance:\n\
             - 1 day: +2.1%\n\
             - 1 week: +5.3%\n\
             - 1 month: +12.8%\n"
        )
    }

    pub fn financial_news(&self, keyword: &str, days: u64) -> String {
        format!(
            "Keyword: {keyword}\nWindow: last {days} days\n\n\
             Headlines:\n\
             1. Q3 results: revenue up 15% year over year\n\
             2. Awarded a major government contract worth about 1B\n\
             3. Board approves a share buyback program\n\
             4. Analysts raise price target to 150\n\
             5. Supportive sector policy lifts related stocks\n"
        )
    }

    pub fn technical_indicators(&self, symbol: &str, indicator: &str) -> String {
        format!(
            "Technical indicators for {symbol} (primary: {indicator})\n\n\
             Moving averages:\n\
             - MA5: 123.45 (support)\n\
             - MA20: 118.20 (strong support)\n\
             - MA60: 115.80 (long-term trend)\n\n\
             Signals:\n\
             - MACD: bullish crossover\n\
             - RSI: 65 (moderately strong)\n\
             - Volume: 30% above recent average\n\n\
             Key levels:\n\
             - Support: 120.00\n\
             - Resistance: 130.00\n"
        )
    }

    /// No search backend is wired in; the model is told so and carries on.
    pub fn web_search(&self, query: &str) -> ToolResult {
        ToolResult::error(format!(
            "web search backend is not configured (query: {})",
            query
        ))
    }

    pub fn portfolio_optimization(&self, assets: &str, risk_level: &str) -> String {
        format!(
            "Portfolio optimization\nAssets: {assets}\nRisk level: {risk_level}\n\n\
             Suggested allocation:\n\
             - Equities: 60% (blue chips 40%, growth 20%)\n\
             - Bonds: 30% (government 20%, corporate 10%)\n\
             - Cash: 10%\n\n\
             Expected return: 8-12%\n\
             Max drawdown: 15%\n\
             Sharpe ratio: 1.2\n"
        )
    }

    pub fn risk_assessment(&self, position_size: &str, market_cap: &str) -> String {
        format!(
            "Risk assessment\nPosition size: {position_size}\nMarket cap: {market_cap}\n\n\
             Metrics:\n\
             - VaR (95%): 2.5% max one-day loss\n\
             - Beta: 1.2 (above market)\n\
             - Liquidity risk: low\n\
             - Credit risk: medium\n\
             - Sector concentration: elevated\n\n\
             Advice: diversify and cap single-position weight\n"
        )
    }
}

fn required<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolResult> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolResult::error(format!("Missing required parameter: {}", key)))
}

fn optional<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        }
    }

    #[test]
    fn test_tool_definitions_follow_capability_set() {
        let base = get_tool_definitions(CapabilitySet::Base);
        let extended = get_tool_definitions(CapabilitySet::Extended);

        assert_eq!(base.len(), 4);
        assert_eq!(extended.len(), 6);
        assert!(!base.iter().any(|t| t.function.name == "risk_assessment"));
        assert!(extended.iter().any(|t| t.function.name == "portfolio_optimization"));
    }

    #[test]
    fn test_execute_stock_data() {
        let lookups = FactLookups::new();
        let result = lookups.execute(
            &call("get_stock_data", json!({"symbol": "0700.HK"})),
            CapabilitySet::Base,
        );
        assert!(result.success);
        assert!(result.output.contains("0700.HK"));
        assert!(result.output.contains("Period: 1y"));
    }

    #[test]
    fn test_execute_rejects_capability_outside_set() {
        let lookups = FactLookups::new();
        let args = json!({"position_size": "1M", "market_cap": "50B"});

        let denied = lookups.execute(&call("risk_assessment", args.clone()), CapabilitySet::Base);
        assert!(!denied.success);

        let allowed = lookups.execute(&call("risk_assessment", args), CapabilitySet::Extended);
        assert!(allowed.success);
        assert!(allowed.output.contains("VaR"));
    }

    #[test]
    fn test_execute_missing_parameter_and_unknown_tool() {
        let lookups = FactLookups::new();

        let missing = lookups.execute(&call("get_financial_news", json!({})), CapabilitySet::Base);
        assert_eq!(
            missing.error.as_deref(),
            Some("Missing required parameter: keyword")
        );

        let unknown = lookups.execute(&call("delete_files", json!({})), CapabilitySet::Extended);
        assert!(unknown.into_content().starts_with("Error: Unknown tool"));
    }
}
