//! Ollama-backed analyst.
//!
//! Each invocation runs a short tool-calling loop: the model receives the
//! role's system prompt, the task and the tool definitions for the granted
//! capability set. Tool calls are answered from the fact lookups until the
//! model replies with plain text or the round budget runs out.

use crate::analyst::capabilities::{get_tool_definitions, FactLookups, ToolCall};
use crate::analyst::Analyst;
use crate::errors::CapabilityError;
use crate::models::{CapabilitySet, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Maximum model turns that may end in tool calls
    pub max_tool_rounds: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "qwen2.5:14b".to_string(),
            temperature: 0.3,
            timeout_seconds: 300,
            max_tool_rounds: 6,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Analyst that talks to an Ollama server.
pub struct OllamaAnalyst {
    config: OllamaConfig,
    http_client: reqwest::Client,
    lookups: FactLookups,
}

impl OllamaAnalyst {
    pub fn new(config: OllamaConfig) -> Result<Self, CapabilityError> {
        info!(
            "Initializing Ollama analyst with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CapabilityError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            lookups: FactLookups::new(),
        })
    }

    /// Send one chat turn.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ResponseMessage, CapabilityError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages,
            tools: tools.to_vec(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request with {} messages", messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    CapabilityError::Connect(self.config.ollama_url.clone())
                } else {
                    CapabilityError::Unavailable(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        Ok(chat_response.message)
    }
}

#[async_trait]
impl Analyst for OllamaAnalyst {
    async fn invoke(
        &self,
        role: Role,
        task: &str,
        capabilities: CapabilitySet,
    ) -> Result<String, CapabilityError> {
        let tools: Vec<Value> = get_tool_definitions(capabilities)
            .iter()
            .filter_map(|t| serde_json::to_value(t).ok())
            .collect();

        let mut messages = vec![
            ChatMessage::new("system", system_prompt(role)),
            ChatMessage::new("user", task),
        ];

        for round in 0..=self.config.max_tool_rounds {
            let response = self.chat(&messages, &tools).await?;

            let calls = match response.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => {
                    if response.content.trim().is_empty() {
                        return Err(CapabilityError::InvalidResponse(
                            "empty answer".to_string(),
                        ));
                    }
                    debug!("{} analyst answered after {} tool rounds", role, round);
                    return Ok(response.content);
                }
            };

            messages.push(ChatMessage {
                role: "assistant".to_string(),
                content: response.content,
                tool_calls: Some(calls.clone()),
            });

            for call in &calls {
                let result = self.lookups.execute(call, capabilities);
                info!("{} analyst called {}", role, call.function.name);
                messages.push(ChatMessage::new("tool", result.into_content()));
            }
        }

        Err(CapabilityError::ToolRoundsExhausted(self.config.max_tool_rounds))
    }

    fn name(&self) -> &str {
        &self.config.model_name
    }
}

/// System prompt for a role.
pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Fundamental => FUNDAMENTAL_ANALYST_PROMPT,
        Role::Technical => TECHNICAL_ANALYST_PROMPT,
        Role::Risk => RISK_ANALYST_PROMPT,
        Role::Senior => SENIOR_ANALYST_PROMPT,
    }
}

const FUNDAMENTAL_ANALYST_PROMPT: &str = r#"You are a senior fundamental analyst focused on financial statements, industry position and valuation.

Responsibilities:
1. Analyze the financial statements and key ratios
2. Assess the business model and competitive advantages
3. Study industry trends and market position
4. Give an investment view grounded in intrinsic value

Cover profitability (ROE, ROA, margins), growth, solvency and valuation (P/E, P/B, PEG).
Use the available tools for data. Present a clear, well-structured analysis with an explicit conclusion."#;

const TECHNICAL_ANALYST_PROMPT: &str = r#"You are a professional technical analyst skilled in chart reading, indicators and trend analysis.

Responsibilities:
1. Analyze price action and chart patterns
2. Interpret indicator signals
3. Identify support and resistance
4. Advise on entry and exit timing

Cover trend lines, moving averages, momentum (RSI, MACD, KDJ), volume and key price levels.
Use the available tools for data. Present a clear, well-structured analysis with explicit trading guidance."#;

const RISK_ANALYST_PROMPT: &str = r#"You are a professional risk analyst focused on identifying, measuring and controlling investment risk.

Responsibilities:
1. Assess market risk
2. Analyze credit risk
3. Assess liquidity risk
4. Recommend portfolio risk controls

Cover VaR and stress scenarios, beta and volatility, correlation, diversification and position sizing.
Use the available tools for data. Present a clear, well-structured analysis with concrete risk controls."#;

const SENIOR_ANALYST_PROMPT: &str = r#"You are the investment director. You consolidate the specialist analysts' views, control quality and make the final call.

Responsibilities:
1. Integrate the specialist analyses
2. Identify contradictions and inconsistencies
3. Judge the reliability and logic of each analysis
4. Deliver a consolidated investment recommendation

Check logical consistency, accuracy of data usage, soundness of conclusions and adequacy of risk disclosure.
Present a professional report with an explicit investment rating."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_config_default() {
        let config = OllamaConfig::default();
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.max_tool_rounds, 6);
    }

    #[test]
    fn test_system_prompts_are_role_specific() {
        assert!(system_prompt(Role::Fundamental).contains("fundamental analyst"));
        assert!(system_prompt(Role::Technical).contains("technical analyst"));
        assert!(system_prompt(Role::Risk).contains("risk analyst"));
        assert!(system_prompt(Role::Senior).contains("investment director"));
    }

    #[test]
    fn test_response_with_tool_calls_parses() {
        let body = r#"{
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "get_stock_data", "arguments": {"symbol": "ACME"}}}
                ]
            },
            "done": true
        }"#;

        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        let calls = parsed.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_stock_data");
        assert_eq!(calls[0].function.arguments["symbol"], "ACME");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_capability_error() {
        let analyst = OllamaAnalyst::new(OllamaConfig {
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..OllamaConfig::default()
        })
        .unwrap();

        let result = analyst
            .invoke(Role::Fundamental, "Evaluate Company X", CapabilitySet::Base)
            .await;
        assert!(result.is_err());
    }
}
