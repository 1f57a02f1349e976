//! The two LLM flows: formula generation and step-by-step solution
//!
//! Each flow renders a fixed instruction template, makes one OpenRouter
//! chat-completions call with a JSON schema describing the expected output
//! shape, and validates what comes back. Missing or empty fields are
//! propagated as errors, never silently defaulted.

use crate::prompts::{FORMULA_INSTRUCTIONS, SOLUTION_INSTRUCTIONS};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENROUTER_REFERER: &str = "https://mathchat.app";
const OPENROUTER_TITLE: &str = "MathChat";

const FLOW_MAX_TOKENS: u32 = 1000;

/// Errors that can occur while running a flow
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("model returned malformed output: {0}")]
    MalformedOutput(String),
}

/// Input to the formula generation flow
#[derive(Debug, Clone)]
pub struct FormulaInput {
    pub question: String,
}

/// Output of the formula generation flow
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaOutput {
    pub formula: String,
}

/// Input to the step-by-step solution flow
#[derive(Debug, Clone)]
pub struct SolutionInput {
    pub problem: String,
    pub formula: Option<String>,
}

/// Output of the step-by-step solution flow
#[derive(Debug, Clone, Deserialize)]
pub struct SolutionOutput {
    pub solution: String,
}

/// The two flows the chat pipeline sequences. Kept behind a trait so tests
/// can script responses and count invocations.
#[async_trait]
pub trait MathFlows: Send + Sync {
    async fn generate_formula(&self, input: &FormulaInput) -> Result<FormulaOutput, FlowError>;
    async fn generate_solution(&self, input: &SolutionInput) -> Result<SolutionOutput, FlowError>;
}

// ============ Prompt Rendering ============

pub fn render_formula_prompt(question: &str) -> String {
    format!(
        "{}\n\nQuestion: {}\n\nFormula:",
        FORMULA_INSTRUCTIONS, question
    )
}

/// Renders the solution prompt. The formula block is omitted entirely when
/// no formula is present, not rendered as an empty placeholder.
pub fn render_solution_prompt(input: &SolutionInput) -> String {
    let mut prompt = format!("{}\n\nProblem: {}", SOLUTION_INSTRUCTIONS, input.problem);
    if let Some(formula) = input.formula.as_deref().filter(|f| !f.trim().is_empty()) {
        prompt.push('\n');
        prompt.push_str("Wolfram Language Formula: ");
        prompt.push_str(formula);
    }
    prompt
}

// ============ Response Parsing ============

fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start >= end {
        return None;
    }
    Some(raw[start..=end].to_string())
}

/// Parses the message content returned by the model into the expected output
/// shape. Falls back to extracting the first JSON object when the model wraps
/// it in prose or code fences.
fn parse_structured<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, FlowError> {
    serde_json::from_str::<T>(content).or_else(|_| {
        let maybe_json = extract_json_object(content).ok_or_else(|| {
            FlowError::MalformedOutput("response did not contain a JSON object".to_string())
        })?;
        serde_json::from_str::<T>(&maybe_json)
            .map_err(|e| FlowError::MalformedOutput(format!("failed to parse JSON: {}", e)))
    })
}

pub fn parse_formula_output(content: &str) -> Result<FormulaOutput, FlowError> {
    let output: FormulaOutput = parse_structured(content)?;
    if output.formula.trim().is_empty() {
        return Err(FlowError::MalformedOutput(
            "formula field was missing or empty".to_string(),
        ));
    }
    Ok(output)
}

pub fn parse_solution_output(content: &str) -> Result<SolutionOutput, FlowError> {
    let output: SolutionOutput = parse_structured(content)?;
    if output.solution.trim().is_empty() {
        return Err(FlowError::MalformedOutput(
            "solution field was missing or empty".to_string(),
        ));
    }
    Ok(output)
}

// ============ OpenRouter Implementation ============

fn formula_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "formula": {
                "type": "string",
                "description": "The Wolfram Language formula representing the question."
            }
        },
        "required": ["formula"],
        "additionalProperties": false
    })
}

fn solution_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "solution": {
                "type": "string",
                "description": "The step-by-step solution to the problem."
            }
        },
        "required": ["solution"],
        "additionalProperties": false
    })
}

/// Flows backed by the OpenRouter chat-completions API
pub struct OpenRouterFlows {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterFlows {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    /// Makes one structured chat-completions call and returns the message
    /// content produced by the model.
    async fn call_structured(
        &self,
        prompt: &str,
        schema_name: &str,
        schema: Value,
    ) -> Result<String, FlowError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": FLOW_MAX_TOKENS,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema
                }
            }
        });

        let response = self
            .client
            .post(OPENROUTER_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", OPENROUTER_REFERER)
            .header("X-Title", OPENROUTER_TITLE)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("[call_structured] API error {}: {}", status, error_text);
            return Err(FlowError::Api(format!("{}: {}", status, error_text)));
        }

        let response_json: Value = response.json().await?;

        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| FlowError::MalformedOutput("API returned empty content".to_string()))
    }
}

#[async_trait]
impl MathFlows for OpenRouterFlows {
    async fn generate_formula(&self, input: &FormulaInput) -> Result<FormulaOutput, FlowError> {
        info!("[generate_formula] Requesting formula from model {}", self.model);
        let prompt = render_formula_prompt(&input.question);
        let content = self
            .call_structured(&prompt, "wolfram_formula", formula_schema())
            .await?;
        parse_formula_output(&content)
    }

    async fn generate_solution(&self, input: &SolutionInput) -> Result<SolutionOutput, FlowError> {
        info!(
            "[generate_solution] Requesting solution from model {} (formula: {})",
            self.model,
            input.formula.is_some()
        );
        let prompt = render_solution_prompt(input);
        let content = self
            .call_structured(&prompt, "step_by_step_solution", solution_schema())
            .await?;
        parse_solution_output(&content)
    }
}
