//! # miniagent
//!
//! A minimal ReAct agent runtime.
//!
//! This library provides:
//! - A step loop that drives a chat model through a plain-text tool protocol
//! - A tolerant parser for the model's `Action:` / `Action Input:` output
//! - A tool registry that turns tool failures into observations
//! - Prompt templates, an OpenAI-compatible client and a few built-in tools
//!
//! ## Example
//!
//! ```rust,ignore
//! use miniagent::{agent::Agent, config::Config, tools::{SearchTool, ToolRegistry}};
//!
//! let config = Config::from_env()?;
//! let tools = ToolRegistry::with_tools(vec![Box::new(SearchTool::new())])?;
//! let agent = Agent::from_config(&config, tools)?;
//! let answer = agent.run_task("Who maintains the Rust compiler?").await?;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod prompt;
pub mod tools;

pub use config::Config;
