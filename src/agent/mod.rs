//! Agent module - the ReAct agent logic.
//!
//! The agent follows a "tools in a loop" pattern over a plain-text protocol:
//! 1. Render the prompt with the tool catalogue and the scratchpad
//! 2. Ask the model whether it needs a tool
//! 3. If yes, parse `Action:` / `Action Input:`, run the tool and append the
//!    `Observation:` to the scratchpad
//! 4. Repeat until the model answers with `AI:` or the step bound is reached

mod agent_loop;
mod human;
pub mod literal;
pub mod parser;
mod response;
mod scratchpad;

pub use agent_loop::{Agent, DEFAULT_LIMIT};
pub use human::HumanAgent;
pub use response::{ResponseAgent, ACTION_OUTPUT_VAR};
pub use scratchpad::{extract_final_answer, RunContext, StepResult, StepStatus};
