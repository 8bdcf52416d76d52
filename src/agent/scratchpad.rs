//! Run-scoped transcript state.

use super::parser::AI_MARKER;

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// A tool was dispatched; the loop goes on.
    Continue,
    /// The model needs no further tool; its reply is the answer.
    Final,
}

/// Text produced by one step together with its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub text: String,
    pub status: StepStatus,
}

impl StepResult {
    pub fn is_final(&self) -> bool {
        self.status == StepStatus::Final
    }
}

/// Append-only transcript of one run plus its step counter.
///
/// Created by [`Agent::execute`](super::Agent::execute) and dropped when the
/// run ends; nothing is shared between runs.
#[derive(Debug, Default)]
pub struct RunContext {
    entries: Vec<String>,
    step: usize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based index of the step about to run.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Record a finished step.
    pub fn push(&mut self, result: &StepResult) {
        self.entries.push(result.text.clone());
        self.step += 1;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scratchpad text fed back into the prompt.
    pub fn render(&self) -> String {
        self.entries.join("\n")
    }

    /// Final answer derived from the last entry, or `None` when no step ran.
    pub fn final_answer(&self) -> Option<String> {
        self.entries.last().map(|entry| extract_final_answer(entry))
    }
}

/// Text after the last `AI:` marker (or the whole entry), without backticks.
pub fn extract_final_answer(entry: &str) -> String {
    let tail = entry.rsplit(AI_MARKER).next().unwrap_or(entry);
    tail.trim().replace('`', "").trim().to_string()
}
