//! Single-tool agent that answers over a tool's output.
//!
//! Where [`Agent`](super::Agent) lets the model pick tools, a
//! `ResponseAgent` always runs its one tool first with arguments supplied by
//! the caller, then asks the model to work on the result, e.g. "scrape this
//! URL and summarize it".

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::llm::{ChatMessage, LlmClient};
use crate::prompt::{PromptTemplate, TemplateError};
use crate::tools::{Tool, ToolArgs};

/// Placeholder receiving the tool output.
pub const ACTION_OUTPUT_VAR: &str = "action_output";

pub struct ResponseAgent {
    llm: Arc<dyn LlmClient>,
    tool: Box<dyn Tool>,
    prompt: PromptTemplate,
    temperature: f32,
}

impl ResponseAgent {
    /// Templates that do not mention `{action_output}` get it prepended as
    /// `Content: {action_output} `.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tool: Box<dyn Tool>,
        prompt: PromptTemplate,
    ) -> Result<Self, TemplateError> {
        let prompt = if prompt.requires(ACTION_OUTPUT_VAR) {
            prompt
        } else {
            prompt.prepend("Content: {action_output} ")?
        };

        Ok(Self {
            llm,
            tool,
            prompt,
            temperature: 0.0,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Run the tool with the matching `inputs`, then ask the model.
    pub async fn execute(&self, inputs: &HashMap<String, String>) -> anyhow::Result<String> {
        let action_output = self.invoke_tool(inputs).await?;

        let mut values = inputs.clone();
        values.insert(ACTION_OUTPUT_VAR.to_string(), action_output);
        let prompt = self.prompt.format(&values);
        info!("\nPROMPT:\n{}\n", prompt);

        let response = self
            .llm
            .chat(&[ChatMessage::user(prompt)], self.temperature)
            .await
            .map_err(|e| {
                error!("Error invoking LLM: {}", e);
                e
            })?;
        Ok(response.content)
    }

    async fn invoke_tool(&self, inputs: &HashMap<String, String>) -> anyhow::Result<String> {
        let args: ToolArgs = self
            .tool
            .arguments()
            .iter()
            .filter_map(|arg| {
                inputs
                    .get(arg.name)
                    .map(|v| (arg.name.to_string(), Value::String(v.clone())))
            })
            .collect();
        info!(
            "Invoking tool: action={}, action_input={:?}",
            self.tool.name(),
            args
        );

        self.tool.invoke(&args).await.map_err(|e| {
            error!("Error invoking tool: {}", e);
            e
        })
    }
}
