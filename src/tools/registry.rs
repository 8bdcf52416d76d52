//! Tool registry and dispatch of `Action:` blocks.

use std::collections::{HashMap, HashSet};

use futures::FutureExt;
use thiserror::Error;
use tracing::{error, info};

use super::{Tool, ToolArgs};
use crate::agent::parser::ParsedAction;

/// Observation used when a tool fails and no more specific advisory exists.
pub const GENERIC_TOOL_FAILURE: &str =
    "The tool failed to run, Please check the Action Input and try again.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool '{name}': {reason}")]
    InvalidTool { name: String, reason: String },
}

/// Result of dispatching one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool ran and produced output.
    Success(String),
    /// No tool matches the action name (or no action was found).
    UnknownTool(Option<String>),
    /// The arguments named parameters the tool does not declare; the tool
    /// was not run.
    InvalidArguments { tool: String, advisory: String },
    /// The tool returned an error or panicked.
    Failed {
        tool: String,
        error: String,
        fallback: String,
    },
}

impl ToolOutcome {
    /// Text to place after `Observation:`, or `None` when nothing ran.
    pub fn observation(&self) -> Option<&str> {
        match self {
            Self::Success(output) => Some(output.as_str()),
            Self::UnknownTool(_) => None,
            Self::InvalidArguments { advisory, .. } => Some(advisory.as_str()),
            Self::Failed { fallback, .. } => Some(fallback.as_str()),
        }
    }
}

/// Tools available to an agent, keyed by name.
///
/// Registration order is kept for the numbered catalogue shown to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools, failing on the first bad entry.
    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Register a tool. Names must be unique and the tool well-formed.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        validate(tool.as_ref())?;
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in registration order.
    pub fn list_tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Comma-separated tool names for the `[{tool_names}]` placeholder.
    pub fn tool_names(&self) -> String {
        self.list_tools()
            .map(|t| t.name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Numbered catalogue for the `{tools}` placeholder.
    pub fn tool_descriptions(&self) -> String {
        self.list_tools()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t.format_tool_info()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse an action block and run the named tool.
    pub async fn execute(&self, content: &str) -> ToolOutcome {
        let parsed = ParsedAction::parse(content, |name| {
            self.get(name)
                .map(|t| t.arguments().iter().map(|a| a.name).collect())
                .unwrap_or_default()
        });

        let Some(name) = parsed.action else {
            error!("No action found in content, skipping tool dispatch");
            return ToolOutcome::UnknownTool(None);
        };
        let Some(tool) = self.get(&name) else {
            error!("Action '{}' not found in tool registry", name);
            return ToolOutcome::UnknownTool(Some(name));
        };

        if let Some(advisory) = parsed.advisory {
            error!(
                "Action input for '{}' names undeclared arguments: {:?}",
                name, parsed.args
            );
            return ToolOutcome::InvalidArguments {
                tool: name,
                advisory,
            };
        }

        info!("Invoking tool: action={}, action_input={:?}", name, parsed.args);
        self.invoke_tool(tool, &parsed.args).await
    }

    /// Run a named tool with already structured arguments.
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> ToolOutcome {
        match self.get(name) {
            Some(tool) => self.invoke_tool(tool, args).await,
            None => {
                error!("Action '{}' not found in tool registry", name);
                ToolOutcome::UnknownTool(Some(name.to_string()))
            }
        }
    }

    async fn invoke_tool(&self, tool: &dyn Tool, args: &ToolArgs) -> ToolOutcome {
        let name = tool.name().to_string();
        let fut = std::panic::AssertUnwindSafe(tool.invoke(args));
        let error = match fut.catch_unwind().await {
            Ok(Ok(output)) => {
                info!("Action output:\n{}", output);
                return ToolOutcome::Success(output);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("Tool '{}' panicked during execution", name),
        };

        error!("Tool '{}' failed: {}", name, error);
        ToolOutcome::Failed {
            tool: name,
            error,
            fallback: GENERIC_TOOL_FAILURE.to_string(),
        }
    }

    /// Dispatch the action in `content` and append its observation.
    ///
    /// When no known tool is named the content comes back unchanged so the
    /// model can correct itself on the next step.
    pub async fn dispatch(&self, content: &str) -> String {
        match self.execute(content).await.observation() {
            Some(output) => format!("{}\nObservation: {}", content, output),
            None => content.to_string(),
        }
    }
}

fn validate(tool: &dyn Tool) -> Result<(), RegistryError> {
    let name = tool.name();
    let invalid = |reason: &str| RegistryError::InvalidTool {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() || name.contains(char::is_whitespace) {
        return Err(invalid("name must be a non-empty word"));
    }

    let mut seen = HashSet::new();
    for arg in tool.arguments() {
        if arg.name.trim().is_empty() {
            return Err(invalid("argument names must not be empty"));
        }
        if !seen.insert(arg.name) {
            return Err(invalid(&format!("duplicate argument '{}'", arg.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::parser::INCORRECT_INPUT_ADVISORY;
    use crate::tools::ToolArg;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

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

    struct Broken {
        panic: bool,
    }

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "BrokenTool"
        }

        fn description(&self) -> &str {
            "Always fails."
        }

        fn arguments(&self) -> &[ToolArg] {
            const ARGS: &[ToolArg] = &[ToolArg::new("x", "Anything")];
            ARGS
        }

        async fn invoke(&self, _args: &ToolArgs) -> anyhow::Result<String> {
            if self.panic {
                panic!("boom");
            }
            Err(anyhow::anyhow!("backend unavailable"))
        }
    }

    struct Shaped {
        name: &'static str,
        args: &'static [ToolArg],
    }

    #[async_trait]
    impl Tool for Shaped {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            ""
        }

        fn arguments(&self) -> &[ToolArg] {
            self.args
        }

        async fn invoke(&self, _args: &ToolArgs) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn upper() -> (Box<dyn Tool>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Upper {
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(upper().0).unwrap();
        assert_eq!(
            registry.register(upper().0),
            Err(RegistryError::DuplicateTool("UpperTool".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_malformed_tools() {
        let mut registry = ToolRegistry::new();
        const EMPTY: &[ToolArg] = &[];
        const DUP: &[ToolArg] = &[ToolArg::new("a", ""), ToolArg::new("a", "")];
        const BLANK: &[ToolArg] = &[ToolArg::new(" ", "")];

        for (name, args) in [("", EMPTY), ("two words", EMPTY), ("Dup", DUP), ("Blank", BLANK)] {
            let result = registry.register(Box::new(Shaped { name, args }));
            assert!(
                matches!(result, Err(RegistryError::InvalidTool { .. })),
                "{} should be rejected",
                name
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn catalogue_is_numbered_in_registration_order() {
        let registry = ToolRegistry::with_tools(vec![
            upper().0,
            Box::new(Broken { panic: false }),
        ])
        .unwrap();
        assert_eq!(registry.tool_names(), "UpperTool, BrokenTool");
        let catalogue = registry.tool_descriptions();
        assert!(catalogue.starts_with("1. UpperTool:\n    Description:\n     Upper-cases text."));
        assert!(catalogue.contains("\n2. BrokenTool:\n"));
    }

    #[tokio::test]
    async fn dispatch_appends_observation() {
        let (tool, calls) = upper();
        let registry = ToolRegistry::with_tools(vec![tool]).unwrap();
        let content = "Thought: Do I need to use a tool? Yes\nAction: UpperTool\nAction Input: text: hello";

        let out = registry.dispatch(content).await;
        assert_eq!(out, format!("{}\nObservation: HELLO", content));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_action_returns_content_unchanged() {
        let registry = ToolRegistry::with_tools(vec![upper().0]).unwrap();
        let content = "Action: MissingTool\nAction Input: text: hi";

        assert_eq!(
            registry.execute(content).await,
            ToolOutcome::UnknownTool(Some("MissingTool".into()))
        );
        assert_eq!(registry.dispatch(content).await, content);
        assert_eq!(registry.dispatch("no action at all").await, "no action at all");
    }

    #[tokio::test]
    async fn tool_errors_become_fallback_observation() {
        let registry = ToolRegistry::with_tools(vec![Box::new(Broken { panic: false })]).unwrap();
        let outcome = registry.execute("Action: BrokenTool\nAction Input: x: 1").await;
        match &outcome {
            ToolOutcome::Failed { tool, error, fallback } => {
                assert_eq!(tool, "BrokenTool");
                assert_eq!(error, "backend unavailable");
                assert_eq!(fallback, GENERIC_TOOL_FAILURE);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(outcome.observation(), Some(GENERIC_TOOL_FAILURE));
    }

    #[tokio::test]
    async fn tool_panics_are_contained() {
        let registry = ToolRegistry::with_tools(vec![Box::new(Broken { panic: true })]).unwrap();
        let out = registry.dispatch("Action: BrokenTool\nAction Input: x: 1").await;
        assert!(out.ends_with(&format!("Observation: {}", GENERIC_TOOL_FAILURE)));
    }

    #[tokio::test]
    async fn undeclared_literal_keys_skip_the_tool() {
        let (tool, calls) = upper();
        let registry = ToolRegistry::with_tools(vec![tool]).unwrap();
        let outcome = registry
            .execute("Action: UpperTool\nAction Input: {'txt': 'hi'}")
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::InvalidArguments {
                tool: "UpperTool".into(),
                advisory: INCORRECT_INPUT_ADVISORY.into(),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invoke_takes_structured_arguments() {
        let registry = ToolRegistry::with_tools(vec![upper().0]).unwrap();
        let mut args = ToolArgs::new();
        args.insert("text".into(), json!("abc"));

        assert_eq!(
            registry.invoke("UpperTool", &args).await,
            ToolOutcome::Success("ABC".into())
        );
        assert_eq!(
            registry.invoke("Nope", &args).await,
            ToolOutcome::UnknownTool(Some("Nope".into()))
        );
    }
}
