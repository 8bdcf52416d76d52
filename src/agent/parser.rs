//! Extraction of the ReAct text protocol from raw model output.
//!
//! The model answers in free text following the format laid down by the
//! ReAct prompt:
//!
//! ```text
//! Thought: Do I need to use a tool? Yes
//! Action: SearchTool
//! Action Input: {'query': 'rust async runtimes'}
//! ```
//!
//! Nothing guarantees the model sticks to it, so every function here is
//! total: malformed input degrades to `None`, `false` or an empty mapping,
//! never to a panic or an error.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::literal::parse_mapping;
use crate::tools::ToolArgs;

/// Sentinel preceding the `Yes`/`No` tool-use decision.
pub const TOOL_SENTINEL: &str = "Thought: Do I need to use a tool?";
pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const OBSERVATION_MARKER: &str = "Observation:";
pub const THOUGHT_MARKER: &str = "Thought:";
pub const AI_MARKER: &str = "AI:";

/// Advisory surfaced when a literal mapping carries undeclared argument names.
pub const INCORRECT_INPUT_ADVISORY: &str =
    "The Action Input has incorrect input, Please check again.";

/// Markers that end a multi-line `Action Input:` block.
const BLOCK_TERMINATORS: &[&str] = &[OBSERVATION_MARKER, THOUGHT_MARKER, ACTION_MARKER, AI_MARKER];

/// Arguments recovered from an `Action Input:` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArguments {
    pub args: ToolArgs,
    /// Set when the block parsed as a mapping with undeclared keys.
    pub advisory: Option<String>,
}

/// Everything recovered from one model step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAction {
    pub action: Option<String>,
    pub args: ToolArgs,
    pub advisory: Option<String>,
}

impl ParsedAction {
    /// Parse `text`, asking `declared_args` for the argument names of the
    /// named action. Unknown actions should map to an empty list.
    pub fn parse<'a, F>(text: &str, declared_args: F) -> Self
    where
        F: FnOnce(&str) -> Vec<&'a str>,
    {
        let Some(action) = extract_action(text) else {
            warn!("No action found in model output");
            return Self::default();
        };
        let names = declared_args(&action);
        let parsed = extract_action_input(text)
            .map(|block| extract_arguments(&block, &names))
            .unwrap_or_default();

        Self {
            action: Some(action),
            args: parsed.args,
            advisory: parsed.advisory,
        }
    }
}

/// Whether the model asked to use a tool.
///
/// Looks for [`TOOL_SENTINEL`] followed by a `Yes`/`No` token; anything but
/// `yes` (case-insensitive), including a missing sentinel, means stop.
pub fn extract_yes_no(text: &str) -> bool {
    let Some(idx) = text.find(TOOL_SENTINEL) else {
        return false;
    };
    let token: String = text[idx + TOOL_SENTINEL.len()..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();
    token.eq_ignore_ascii_case("yes")
}

/// Name on the first line starting with `Action:`.
pub fn extract_action(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim_start().strip_prefix(ACTION_MARKER))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Raw text after `Action Input:`, up to the next protocol marker line.
pub fn extract_action_input(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let first = lines.find_map(|line| line.trim_start().strip_prefix(ACTION_INPUT_MARKER))?;

    let mut block = vec![first.trim_start()];
    for line in lines {
        let trimmed = line.trim_start();
        if BLOCK_TERMINATORS.iter().any(|m| trimmed.starts_with(m)) {
            break;
        }
        block.push(line);
    }

    let block = block.join("\n");
    if block.trim().is_empty() {
        None
    } else {
        Some(block)
    }
}

/// Cut `text` at the first observation line, dropping anything the model
/// hallucinated past its own action.
pub fn split_content(text: &str) -> &str {
    text.split("\nObservation:").next().unwrap_or(text).trim()
}

/// Recover named arguments from an action-input block.
///
/// Tries, in order: a literal mapping, positional `name: value` extraction
/// over the declared names, and finally the whole block as the value of a
/// lone declared argument.
pub fn extract_arguments(block: &str, declared: &[&str]) -> ParsedArguments {
    let content = clean_value(block);

    if let Some(map) = parse_mapping(&content) {
        let advisory = map
            .keys()
            .any(|k| !declared.contains(&k.as_str()))
            .then(|| INCORRECT_INPUT_ADVISORY.to_string());
        return ParsedArguments { args: map, advisory };
    }
    debug!("Action input is not a mapping, falling back to positional extraction");

    let mut args = extract_positional(&content, declared);

    if args.is_empty() && declared.len() == 1 && !content.is_empty() {
        args.insert(declared[0].to_string(), Value::String(content.clone()));
    }
    if args.is_empty() {
        warn!("Could not extract any argument from action input: {}", content);
    }

    ParsedArguments { args, advisory: None }
}

fn extract_positional(content: &str, declared: &[&str]) -> ToolArgs {
    let markers: Vec<(&str, Regex)> = declared
        .iter()
        .filter_map(|name| {
            let pattern = format!(r#"[\s,]*["']?{}["']?\s*[:=]\s*"#, name_pattern(name));
            compile(&pattern).map(|re| (*name, re))
        })
        .collect();

    // Walk the text left to right. Each argument's marker is consumed once,
    // so a later value may mention an earlier argument's name freely.
    let mut found: Vec<(&str, usize, usize)> = Vec::new();
    let mut pending: Vec<usize> = (0..markers.len()).collect();
    let mut cursor = 0;
    while !pending.is_empty() {
        let next = pending
            .iter()
            .enumerate()
            .filter_map(|(slot, &i)| {
                markers[i]
                    .1
                    .find_at(content, cursor)
                    .map(|m| (slot, i, m.start(), m.end()))
            })
            .min_by_key(|&(_, _, start, _)| start);
        let Some((slot, i, start, end)) = next else {
            break;
        };
        found.push((markers[i].0, start, end));
        pending.remove(slot);
        cursor = end;
    }

    let mut args = ToolArgs::new();
    for (k, &(name, _, value_start)) in found.iter().enumerate() {
        let value_end = found
            .get(k + 1)
            .map_or(content.len(), |&(_, next_start, _)| next_start);
        let raw = &content[value_start..value_end.max(value_start)];
        if raw.is_empty() {
            continue;
        }
        args.insert(name.to_string(), Value::String(clean_value(raw)));
    }

    args
}

fn name_pattern(name: &str) -> String {
    let escaped = regex::escape(name);
    match name.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' => format!(r"\b{}", escaped),
        _ => escaped,
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping argument pattern {}: {}", pattern, e);
            None
        }
    }
}

/// Strip decoration the model wraps around values: one pair of outer
/// quotes (mismatch tolerated), a trailing run of newlines followed only by
/// punctuation, and surrounding whitespace. Repeats until stable, so the
/// result is a fixed point.
pub fn clean_value(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = strip_trailing_decoration(strip_outer_quotes(&current))
            .trim()
            .to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn strip_outer_quotes(s: &str) -> &str {
    let s = s.strip_prefix(is_quote).unwrap_or(s);
    if let Some(stripped) = s.strip_suffix(is_quote) {
        return stripped;
    }
    // A closing quote directly before a final newline counts as trailing.
    match s.strip_suffix('\n').and_then(|body| body.strip_suffix(is_quote)) {
        Some(body) => &s[..body.len()],
        None => s,
    }
}

fn strip_trailing_decoration(s: &str) -> &str {
    let mut cut = None;
    for (idx, c) in s.char_indices().rev() {
        if c.is_alphanumeric() {
            break;
        }
        if c == '\n' {
            cut = Some(idx);
        }
    }
    match cut {
        Some(idx) => &s[..idx],
        None => s,
    }
}
