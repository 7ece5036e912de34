//! Token-budgeted formatting: drop the oldest turns until the prompt fits.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use super::Formatter;
use crate::error::{AgentScopeError, Result};
use crate::message::{ContentBlock, Msg, Role};

/// Estimates the token size of a formatted prompt.
pub trait TokenCounter: Send + Sync {
    fn count(&self, prompt: &Value) -> usize;
}

/// Character-based estimate over the string leaves of the prompt.
#[derive(Debug, Clone, Copy)]
pub struct CharTokenCounter {
    pub chars_per_token: usize,
}

impl Default for CharTokenCounter {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenCounter for CharTokenCounter {
    fn count(&self, prompt: &Value) -> usize {
        let chars = string_chars(prompt);
        chars.div_ceil(self.chars_per_token.max(1))
    }
}

fn string_chars(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.iter().map(string_chars).sum(),
        Value::Object(map) => map.values().map(string_chars).sum(),
        _ => 0,
    }
}

/// Wraps a formatter and enforces a token budget.
///
/// A leading system message is never dropped. An assistant message that
/// issued tool calls is dropped together with the results of those calls.
pub struct TruncatedFormatter<F> {
    inner: F,
    counter: Box<dyn TokenCounter>,
    max_tokens: usize,
}

impl<F: Formatter> TruncatedFormatter<F> {
    pub fn new(inner: F, max_tokens: usize) -> Self {
        Self {
            inner,
            counter: Box::new(CharTokenCounter::default()),
            max_tokens,
        }
    }

    pub fn with_counter(mut self, counter: impl TokenCounter + 'static) -> Self {
        self.counter = Box::new(counter);
        self
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: Formatter> Formatter for TruncatedFormatter<F> {
    type Output = F::Output;

    fn format(&self, msgs: &[Msg]) -> Result<Self::Output> {
        let mut msgs = msgs.to_vec();
        let mut dropped = 0usize;
        loop {
            let prompt = self.inner.format(&msgs)?;
            let tokens = self.counter.count(&serde_json::to_value(&prompt)?);
            if tokens <= self.max_tokens {
                if dropped > 0 {
                    warn!(
                        dropped,
                        tokens,
                        max_tokens = self.max_tokens,
                        "Prompt truncated to fit token budget"
                    );
                }
                return Ok(prompt);
            }
            if !drop_oldest(&mut msgs) {
                return Err(AgentScopeError::format(format!(
                    "prompt needs {tokens} tokens but the budget is {} and nothing is left to drop",
                    self.max_tokens
                )));
            }
            dropped += 1;
        }
    }
}

fn drop_oldest(msgs: &mut Vec<Msg>) -> bool {
    let start = match msgs.first() {
        Some(first) if first.role == Role::System => 1,
        _ => 0,
    };
    if start >= msgs.len() {
        return false;
    }

    let removed = msgs.remove(start);
    let mut pending: HashSet<String> = removed
        .tool_uses()
        .into_iter()
        .map(|tool_use| tool_use.id.clone())
        .collect();

    let mut i = start;
    while !pending.is_empty() && i < msgs.len() {
        let msg = &mut msgs[i];
        let before = msg.content.len();
        msg.content.retain(|block| match block {
            ContentBlock::ToolResult(result) => !pending.remove(&result.id),
            _ => true,
        });
        if before > 0 && msg.content.is_empty() {
            msgs.remove(i);
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ToolResultBlock, ToolUseBlock};
    use serde_json::json;

    /// Formats each message as its text; enough to exercise truncation.
    struct TextFormatter;

    impl Formatter for TextFormatter {
        type Output = Vec<String>;

        fn format(&self, msgs: &[Msg]) -> Result<Vec<String>> {
            Ok(msgs
                .iter()
                .map(|m| {
                    let results: Vec<String> =
                        m.tool_results().iter().map(|r| r.id.clone()).collect();
                    format!("{}{}", m.text(), results.join(""))
                })
                .collect())
        }
    }

    #[test]
    fn counts_string_leaves() {
        let counter = CharTokenCounter { chars_per_token: 2 };
        assert_eq!(counter.count(&json!({"a": "abcd", "b": ["ef", 3]})), 3);
    }

    #[test]
    fn keeps_prompt_within_budget() {
        let formatter = TruncatedFormatter::new(TextFormatter, 4)
            .with_counter(CharTokenCounter { chars_per_token: 1 });
        let msgs = vec![
            Msg::system("S"),
            Msg::user("u", "aaaa"),
            Msg::user("u", "bb"),
        ];
        let out = formatter.format(&msgs).unwrap();
        assert_eq!(out, vec!["S".to_string(), "bb".to_string()]);
    }

    #[test]
    fn drops_tool_call_with_its_results() {
        let msgs = vec![
            Msg::new(
                "bot",
                Role::Assistant,
                vec![ContentBlock::ToolUse(ToolUseBlock::new("c1", "f", json!({})))],
            ),
            Msg::new(
                "system",
                Role::Tool,
                vec![ContentBlock::ToolResult(ToolResultBlock::text("c1", "f", "x"))],
            ),
            Msg::user("u", "ok"),
        ];
        let formatter = TruncatedFormatter::new(TextFormatter, 2)
            .with_counter(CharTokenCounter { chars_per_token: 1 });
        let out = formatter.format(&msgs).unwrap();
        assert_eq!(out, vec!["ok".to_string()]);
    }

    #[test]
    fn fails_when_system_prompt_alone_is_too_large() {
        let formatter = TruncatedFormatter::new(TextFormatter, 1)
            .with_counter(CharTokenCounter { chars_per_token: 1 });
        let err = formatter
            .format(&[Msg::system("too long"), Msg::user("u", "hi")])
            .unwrap_err();
        assert!(matches!(err, AgentScopeError::Format(_)));
    }
}
