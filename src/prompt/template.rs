//! `{placeholder}` templates.
//!
//! Syntax follows Python's `str.format` for named fields: `{name}` is a
//! placeholder and `{{` / `}}` are literal braces. Templates are tokenized
//! once when built, so formatting cannot fail.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

/// Default framing prepended to plain prompt templates.
pub const SYS_PROMPT: &str = "As an advanced and capable AI language model, your role is to \
assist users with their inquiries and tasks comprehensively and without reservation. \
Your objective is to provide accurate information, offer solutions, \
and facilitate task completion to the best of your abilities. Please ensure that \
your responses are informative, helpful, and adhere to the highest standard of assistance.";

/// Suffix appended when chain-of-thought prompting is enabled.
pub const COT_PROMPT: &str = "Let's think step by step.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Single '{brace}' encountered at byte {position}")]
    UnbalancedBrace { brace: char, position: usize },

    #[error("Empty placeholder at byte {0}; placeholders must be named")]
    EmptyPlaceholder(usize),

    #[error("Unsupported placeholder '{0}'; only plain names are allowed")]
    UnsupportedPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

/// An immutable prompt skeleton with named placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
    required: BTreeSet<String>,
    is_cot: bool,
}

impl PromptTemplate {
    /// Template with [`SYS_PROMPT`] prepended on its own line.
    pub fn new(prompt: &str) -> Result<Self, TemplateError> {
        Self::with_system_prompt(SYS_PROMPT, prompt)
    }

    /// Template with a custom system framing prepended on its own line.
    pub fn with_system_prompt(system_prompt: &str, prompt: &str) -> Result<Self, TemplateError> {
        Self::raw(&format!("{}\n{}", system_prompt, prompt))
    }

    /// Template made of exactly `source`.
    pub fn raw(source: &str) -> Result<Self, TemplateError> {
        let segments = tokenize(source)?;
        let required = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Text(_) => None,
            })
            .collect();

        Ok(Self {
            source: source.to_string(),
            segments,
            required,
            is_cot: false,
        })
    }

    /// Append [`COT_PROMPT`] to every formatted prompt.
    pub fn with_cot(mut self, is_cot: bool) -> Self {
        self.is_cot = is_cot;
        self
    }

    /// Declare extra variables that must be supplied even if the skeleton
    /// does not reference them.
    pub fn with_input_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// Prepend text to the skeleton, keeping the declared variables.
    pub fn prepend(&self, prefix: &str) -> Result<Self, TemplateError> {
        let mut template = Self::raw(&format!("{}{}", prefix, self.source))?;
        template.required.extend(self.required.iter().cloned());
        template.is_cot = self.is_cot;
        Ok(template)
    }

    pub fn required_placeholders(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn requires(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fill every placeholder; missing values render as empty strings.
    pub fn format(&self, values: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        if self.is_cot {
            out.push('\n');
            out.push_str(COT_PROMPT);
        }
        out
    }
}

impl std::fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn tokenize(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                text.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                text.push('}');
            }
            '}' => return Err(TemplateError::UnbalancedBrace { brace: '}', position: pos }),
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    name.push(d);
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace { brace: '{', position: pos });
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(pos));
                }
                if !name.chars().all(|c| c.is_alphanumeric() || c == '_')
                    || name.starts_with(|c: char| c.is_ascii_digit())
                {
                    return Err(TemplateError::UnsupportedPlaceholder(name.to_string()));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            }
            _ => text.push(c),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}
