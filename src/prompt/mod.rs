//! Prompt templates and the ReAct framing.

mod react;
mod template;

pub use react::{
    react_template, react_template_from, REACT_BASE_PROMPT, REACT_PREFIX_PROMPT,
    REACT_SUFFIX_PROMPT, SCRATCHPAD_VAR, TOOLS_VAR, TOOL_NAMES_VAR,
};
pub use template::{PromptTemplate, TemplateError, COT_PROMPT, SYS_PROMPT};
