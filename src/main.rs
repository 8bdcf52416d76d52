//! miniagent - command-line entry point
//!
//! Runs the ReAct agent on the task given as arguments.

use miniagent::agent::Agent;
use miniagent::config::Config;
use miniagent::tools::{
    ArxivTool, EmailTool, PdfReaderTool, ScrapTool, SearchTool, Tool, ToolRegistry,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "miniagent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let task = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if task.trim().is_empty() {
        anyhow::bail!("Usage: miniagent <task>");
    }

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, max_steps={}",
        config.default_model, config.max_steps
    );

    let mut tools: Vec<Box<dyn Tool>> = vec![
        Box::new(SearchTool::new()),
        Box::new(ScrapTool::new()),
        Box::new(ArxivTool::new()),
        Box::new(PdfReaderTool::new()),
    ];
    if let Some(email) = config.email.clone() {
        tools.push(Box::new(EmailTool::new(email)));
    }
    let registry = ToolRegistry::with_tools(tools)?;
    info!("Registered tools: {}", registry.tool_names());

    let agent = Agent::from_config(&config, registry)?;
    match agent.run_task(&task).await? {
        Some(answer) => println!("{}", answer),
        None => println!("No result."),
    }

    Ok(())
}
