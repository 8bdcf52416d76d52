//! Core agent loop implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, OpenAiClient};
use crate::prompt::{react_template, PromptTemplate, SCRATCHPAD_VAR, TOOLS_VAR, TOOL_NAMES_VAR};
use crate::tools::ToolRegistry;

use super::parser::{extract_yes_no, split_content};
use super::scratchpad::{RunContext, StepResult, StepStatus};

/// Default step bound.
pub const DEFAULT_LIMIT: usize = 10;

/// A ReAct agent: prompts the model, dispatches the tools it asks for and
/// feeds observations back until the model answers or the bound is hit.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    prompt_template: PromptTemplate,
    limit: usize,
    temperature: f32,
}

impl Agent {
    /// Create an agent with an explicit model, tools and template.
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, prompt_template: PromptTemplate) -> Self {
        Self {
            llm,
            tools,
            prompt_template,
            limit: DEFAULT_LIMIT,
            temperature: 0.0,
        }
    }

    /// Create an agent talking to the configured OpenAI-compatible endpoint
    /// with the standard ReAct prompt.
    pub fn from_config(config: &Config, tools: ToolRegistry) -> anyhow::Result<Self> {
        let llm = Arc::new(OpenAiClient::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.default_model.clone(),
        ));
        Ok(Self::new(llm, tools, react_template()?)
            .with_limit(config.max_steps)
            .with_temperature(config.temperature))
    }

    /// Maximum number of steps per run.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run one task given as the `input` prompt variable.
    pub async fn run_task(&self, task: &str) -> anyhow::Result<Option<String>> {
        let mut inputs = HashMap::new();
        inputs.insert("input".to_string(), task.to_string());
        self.execute(&inputs).await
    }

    /// Run the loop with caller-supplied prompt variables.
    ///
    /// Returns `None` when no step ran (a bound of zero). Reaching the bound
    /// is not an error: the answer is taken from whatever the last step said.
    pub async fn execute(&self, inputs: &HashMap<String, String>) -> anyhow::Result<Option<String>> {
        let mut vars = inputs.clone();
        vars.insert(TOOL_NAMES_VAR.to_string(), self.tools.tool_names());
        vars.insert(TOOLS_VAR.to_string(), self.tools.tool_descriptions());

        let mut ctx = RunContext::new();
        while ctx.step() < self.limit {
            let result = self.step(&ctx, &vars).await?;
            let done = result.is_final();
            ctx.push(&result);
            if done {
                break;
            }
        }

        if ctx.step() == self.limit && self.limit > 0 {
            debug!("Agent stopped at step bound {}", self.limit);
        }
        Ok(ctx.final_answer())
    }

    /// Run a single step against the current scratchpad.
    pub async fn step(
        &self,
        ctx: &RunContext,
        vars: &HashMap<String, String>,
    ) -> anyhow::Result<StepResult> {
        let mut values = vars.clone();
        values.insert(SCRATCHPAD_VAR.to_string(), ctx.render());
        let prompt = self.prompt_template.format(&values);

        if ctx.step() == 0 {
            info!("\nPROMPT:\n{}\n", prompt);
        } else {
            debug!("Agent step {} ({} prompt chars)", ctx.step() + 1, prompt.len());
        }

        let messages = [ChatMessage::user(prompt)];
        let response = self.llm.chat(&messages, self.temperature).await?;
        info!("\nLLM output:\n{}", response.content);

        if !extract_yes_no(&response.content) {
            return Ok(StepResult {
                text: response.content,
                status: StepStatus::Final,
            });
        }

        let action = split_content(&response.content);
        Ok(StepResult {
            text: self.tools.dispatch(action).await,
            status: StepStatus::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolArg, ToolArgs};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned replies; repeats the last one once the script runs out.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        last: Mutex<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                last: Mutex::new(String::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> anyhow::Result<ChatMessage> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.replies.lock().unwrap().pop_front() {
                *last = next;
            }
            Ok(ChatMessage::assistant(last.clone()))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> anyhow::Result<ChatMessage> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    struct Upper {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "UpperTool"
        }

        fn description(&self) -> &str {
            "Upper-cases text."
        }

        fn arguments(&self) -> &[ToolArg] {
            const ARGS: &[ToolArg] = &[ToolArg::new("text", "Text to shout")];
            ARGS
        }

        async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(crate::tools::required_str(args, "text")?.to_uppercase())
        }
    }

    const USE_TOOL: &str =
        "Thought: Do I need to use a tool? Yes\nAction: UpperTool\nAction Input: text: `hi`";

    fn agent(llm: Arc<dyn LlmClient>, limit: usize) -> (Agent, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = ToolRegistry::with_tools(vec![Box::new(Upper {
            calls: calls.clone(),
        })])
        .unwrap();
        let agent = Agent::new(llm, tools, react_template().unwrap()).with_limit(limit);
        (agent, calls)
    }

    #[tokio::test]
    async fn final_answer_on_first_step() {
        let llm = ScriptedLlm::new(&["Thought: Do I need to use a tool? No\nAI: Hello!"]);
        let (agent, calls) = agent(llm.clone(), 10);

        let answer = agent.run_task("Say hello").await.unwrap();
        assert_eq!(answer.as_deref(), Some("Hello!"));
        assert_eq!(llm.prompts().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bound_stops_a_model_that_never_finishes() {
        let llm = ScriptedLlm::new(&[USE_TOOL]);
        let (agent, calls) = agent(llm.clone(), 3);

        let answer = agent.run_task("loop forever").await.unwrap();
        assert_eq!(llm.prompts().len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            answer.as_deref(),
            Some("Thought: Do I need to use a tool? Yes\nAction: UpperTool\nAction Input: text: hi\nObservation: HI")
        );
    }

    #[tokio::test]
    async fn zero_bound_yields_no_result() {
        let llm = ScriptedLlm::new(&[USE_TOOL]);
        let (agent, _) = agent(llm.clone(), 0);

        assert_eq!(agent.run_task("anything").await.unwrap(), None);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn observations_feed_the_next_prompt() {
        let llm = ScriptedLlm::new(&[
            "Thought: Do I need to use a tool? Yes\nAction: UpperTool\nAction Input: {'text': 'abc'}\nObservation: invented\nThought: Do I need to use a tool? No\nAI: fake",
            "Thought: Do I need to use a tool? No\nAI: The answer is `ABC`.",
        ]);
        let (agent, calls) = agent(llm.clone(), 5);

        let answer = agent.run_task("shout abc").await.unwrap();
        assert_eq!(answer.as_deref(), Some("The answer is ABC."));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("1. UpperTool:"));
        assert!(prompts[0].contains("should be one of [UpperTool]"));
        assert!(prompts[1].contains(
            "Action Input: {'text': 'abc'}\nObservation: ABC\n"
        ));
        assert!(!prompts[1].contains("invented"));
    }

    #[tokio::test]
    async fn unknown_action_leaves_transcript_untouched() {
        let llm = ScriptedLlm::new(&[
            "Thought: Do I need to use a tool? Yes\nAction: Nope\nAction Input: x",
            "Thought: Do I need to use a tool? No\nAI: gave up",
        ]);
        let (agent, calls) = agent(llm.clone(), 5);

        assert_eq!(agent.run_task("try").await.unwrap().as_deref(), Some("gave up"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let prompts = llm.prompts();
        assert!(prompts[1].contains("Action: Nope\nAction Input: x\n"));
        assert!(!prompts[1].contains("Observation: "));
    }

    #[tokio::test]
    async fn step_reports_status() {
        let llm = ScriptedLlm::new(&[USE_TOOL]);
        let (agent, _) = agent(llm, 1);
        let ctx = RunContext::new();

        let result = agent.step(&ctx, &HashMap::new()).await.unwrap();
        assert_eq!(result.status, StepStatus::Continue);
        assert!(result.text.ends_with("\nObservation: `HI`"));
    }

    #[tokio::test]
    async fn model_failure_aborts_the_run() {
        let (agent, _) = agent(Arc::new(FailingLlm), 3);
        let err = agent.run_task("anything").await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn agent_variables_override_caller_values() {
        let llm = ScriptedLlm::new(&["Thought: Do I need to use a tool? No\nAI: ok"]);
        let (agent, _) = agent(llm.clone(), 1);
        let mut inputs = HashMap::new();
        inputs.insert("tool_names".to_string(), "Spoofed".to_string());
        inputs.insert("chat_history".to_string(), "HUMAN: earlier\n".to_string());

        agent.execute(&inputs).await.unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("[UpperTool]"));
        assert!(prompt.contains("Previous conversation history:\nHUMAN: earlier\n"));
    }
}
