//! Recovers a JSON value from free-form model output.
//!
//! Strategies run in a fixed order and the first one that yields a non-null
//! value wins. A strategy that fails to parse is a miss, not an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{truncate_text, AiError};

const PREVIEW_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Direct,
    FencedBlock,
    BalancedScan,
}

impl RecoveryStrategy {
    pub const CASCADE: [RecoveryStrategy; 3] =
        [Self::Direct, Self::FencedBlock, Self::BalancedScan];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::FencedBlock => "fenced_block",
            Self::BalancedScan => "balanced_scan",
        }
    }

    /// Runs this strategy alone.
    pub fn attempt(self, raw: &str) -> Option<Value> {
        let candidate = match self {
            Self::Direct => Some(raw.trim()),
            Self::FencedBlock => fenced_block(raw),
            Self::BalancedScan => balanced_slice(raw),
        }?;
        parse_non_null(candidate)
    }
}

/// Recovered value plus the strategy that produced it.
pub fn recover_json_with_strategy(raw: &str) -> Result<(Value, RecoveryStrategy), AiError> {
    RecoveryStrategy::CASCADE
        .into_iter()
        .find_map(|strategy| strategy.attempt(raw).map(|value| (value, strategy)))
        .ok_or_else(|| AiError::UnparsableResponse {
            preview: truncate_text(raw.trim(), PREVIEW_MAX_CHARS),
        })
}

pub fn recover_json(raw: &str) -> Result<Value, AiError> {
    recover_json_with_strategy(raw).map(|(value, _)| value)
}

/// Recovers JSON and deserializes it into `T`. A value that parses but does
/// not fit `T` is an [`AiError::InvalidResponseShape`].
pub fn recover<T: DeserializeOwned>(raw: &str, operation: &'static str) -> Result<T, AiError> {
    let value = recover_json(raw)?;
    serde_json::from_value(value).map_err(|_| AiError::InvalidResponseShape {
        operation,
        expected: std::any::type_name::<T>(),
    })
}

fn parse_non_null(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Null) | Err(_) => None,
        Ok(value) => Some(value),
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("valid fence regex"))
}

/// Inner text of the first fenced block, optionally tagged `json`.
fn fenced_block(raw: &str) -> Option<&str> {
    fence_re()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|inner| inner.as_str().trim())
}

/// Slice from the first `{` or `[` to the closer that empties the bracket
/// stack. Closers that do not match the innermost opener are skipped.
fn balanced_slice(raw: &str) -> Option<&str> {
    let mut stack: Vec<u8> = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, byte) in raw.bytes().enumerate() {
        match byte {
            b'{' | b'[' => {
                start.get_or_insert(idx);
                stack.push(byte);
            }
            b'}' | b']' => {
                let Some(&open) = stack.last() else {
                    continue;
                };
                let matches = (open == b'{' && byte == b'}') || (open == b'[' && byte == b']');
                if !matches {
                    continue;
                }
                stack.pop();
                if stack.is_empty() {
                    let begin = start?;
                    return Some(&raw[begin..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}
