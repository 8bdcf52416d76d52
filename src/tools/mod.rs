//! Tools the agent can invoke from an `Action:` line.
//!
//! Every tool exposes a name, a description and an ordered argument list.
//! The argument names drive both the prompt catalogue and the positional
//! extraction of arguments from free-form `Action Input:` text.

mod arxiv;
mod email;
mod pdf;
mod registry;
mod web;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use arxiv::{ArxivTool, SortCriterion, SortOrder};
pub use email::{EmailSettings, EmailTool};
pub use pdf::PdfReaderTool;
pub use registry::{RegistryError, ToolOutcome, ToolRegistry, GENERIC_TOOL_FAILURE};
pub use web::{ScrapTool, SearchBackend, SearchTool, EMPTY_SEARCH_RESULT};

/// Named arguments handed to a tool.
pub type ToolArgs = Map<String, Value>;

/// One declared argument of a tool: its name and a description for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolArg {
    pub name: &'static str,
    pub description: &'static str,
}

impl ToolArg {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// A capability the agent can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses on the `Action:` line.
    fn name(&self) -> &str;

    /// Human-readable description shown in the tool catalogue.
    fn description(&self) -> &str;

    /// Ordered argument list; the order matters for positional extraction.
    fn arguments(&self) -> &[ToolArg];

    /// Run the tool. Errors are turned into observations by the registry.
    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String>;

    /// Catalogue entry for this tool.
    fn format_tool_info(&self) -> String {
        let arguments = self
            .arguments()
            .iter()
            .map(|a| format!("      {} ({})", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}:\n    Description:\n     {}\n    Arguments:\n{}\n",
            self.name(),
            self.description(),
            arguments
        )
    }
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(args: &'a ToolArgs, name: &str) -> anyhow::Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", name))
}

/// Fetch an optional argument rendered as text.
///
/// Non-string scalars (numbers, booleans) are stringified so that a literal
/// mapping like `{'query': 42}` still reaches the tool.
pub(crate) fn optional_text(args: &ToolArgs, name: &str) -> Option<String> {
    match args.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Repeats the text."
        }

        fn arguments(&self) -> &[ToolArg] {
            const ARGS: &[ToolArg] = &[
                ToolArg::new("text", "The text to repeat"),
                ToolArg::new("times", "How often"),
            ];
            ARGS
        }

        async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
            Ok(required_str(args, "text")?.to_string())
        }
    }

    #[test]
    fn tool_info_lists_arguments() {
        assert_eq!(
            Echo.format_tool_info(),
            "Echo:\n    Description:\n     Repeats the text.\n    Arguments:\n      text (The text to repeat)\n      times (How often)\n"
        );
    }

    #[test]
    fn required_str_rejects_missing_and_blank() {
        let mut args = ToolArgs::new();
        assert!(required_str(&args, "text").is_err());
        args.insert("text".into(), json!("   "));
        assert!(required_str(&args, "text").is_err());
        args.insert("text".into(), json!("hi"));
        assert_eq!(required_str(&args, "text").unwrap(), "hi");
    }

    #[test]
    fn optional_text_stringifies_scalars() {
        let mut args = ToolArgs::new();
        args.insert("n".into(), json!(3));
        args.insert("none".into(), Value::Null);
        assert_eq!(optional_text(&args, "n").as_deref(), Some("3"));
        assert_eq!(optional_text(&args, "none"), None);
        assert_eq!(optional_text(&args, "missing"), None);
    }
}
