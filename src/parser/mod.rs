//! Tool-call extraction from generated text.
//!
//! Models request tool execution by emitting lines of the form
//! `[TOOL:<name> <arguments>]`. The parser strips the wrapper and splits
//! the name from the arguments with a delimiter-depth scan: braces,
//! brackets, and parentheses are tracked independently, quoted regions
//! (with backslash escapes) are opaque, and the split happens at the
//! first unescaped, unquoted, zero-depth space. Arguments may be free
//! text, a math expression, or a JSON value; there is no declared type
//! tag, only the heuristics below.

use serde_json::Value;

use crate::error::{ParseError, ParseResult};

const WRAPPER_PREFIX: &str = "[TOOL:";
const WRAPPER_SUFFIX: char = ']';

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Tool name as written by the model.
    pub name: String,
    /// Raw argument text, possibly empty.
    pub arguments: String,
}

/// Result of a best-effort batch parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCalls {
    /// Successfully parsed calls, in input order.
    pub calls: Vec<ToolCall>,
    /// Candidate lines (those starting with `[TOOL:`) that failed to parse.
    /// Skipped lines usually mean the prompt taught the model a broken
    /// call format; callers should surface this count.
    pub skipped: usize,
}

/// Extract every tool call from a block of generated text.
///
/// Best-effort batch policy: a line that fails to parse is dropped from
/// the result rather than aborting the batch, and counted in
/// [`ParsedCalls::skipped`]. Order is preserved. Lines that do not start
/// with `[TOOL:` are not candidates and are ignored entirely.
pub fn parse_tool_calls(text: &str) -> ParsedCalls {
    let mut parsed = ParsedCalls::default();
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with(WRAPPER_PREFIX) {
            continue;
        }
        match parse_single_tool_call(line) {
            Ok(call) => parsed.calls.push(call),
            Err(_) => parsed.skipped += 1,
        }
    }
    parsed
}

/// Strictly parse one `[TOOL:name arguments]` line.
pub fn parse_single_tool_call(line: &str) -> ParseResult<ToolCall> {
    let line = line.trim();
    let body = line
        .strip_prefix(WRAPPER_PREFIX)
        .and_then(|rest| rest.strip_suffix(WRAPPER_SUFFIX))
        .ok_or_else(|| ParseError::MalformedWrapper {
            line: line.to_string(),
        })?;

    let (name, arguments) = match zero_depth_space(body) {
        Some(at) => (&body[..at], body[at + 1..].trim()),
        None => (body, ""),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::EmptyName);
    }

    Ok(ToolCall {
        name: name.to_string(),
        arguments: arguments.to_string(),
    })
}

/// Byte offset of the first unescaped, unquoted, zero-depth space.
fn zero_depth_space(body: &str) -> Option<usize> {
    let mut brace = 0i32;
    let mut bracket = 0i32;
    let mut paren = 0i32;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => brace += 1,
            '}' => brace -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            '(' => paren += 1,
            ')' => paren -= 1,
            ' ' if brace == 0 && bracket == 0 && paren == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Whether argument text looks like a JSON object or array.
pub fn is_json_arguments(arguments: &str) -> bool {
    matches!(arguments.trim_start().chars().next(), Some('{') | Some('['))
}

/// Whether argument text looks like a mathematical expression:
/// contains a digit and nothing outside digits, operators, parens,
/// decimal points, and whitespace.
pub fn is_math_expression(arguments: &str) -> bool {
    let trimmed = arguments.trim();
    if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/().%".contains(c))
}

/// Validate argument text as JSON.
///
/// Empty input is valid (a tool may take no arguments); anything else
/// must parse as a JSON value, and the serde error text is returned on
/// failure.
pub fn validate_json_arguments(arguments: &str) -> ParseResult<()> {
    if arguments.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<Value>(arguments)
        .map(|_| ())
        .map_err(|e| ParseError::InvalidJson {
            message: e.to_string(),
        })
}
