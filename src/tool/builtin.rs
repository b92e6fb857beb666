//! Bundled tools: arithmetic evaluation and vector-store search.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::Tool;
use crate::error::{ToolError, ToolResult};
use crate::parser::is_json_arguments;
use crate::vector::{EmbeddingModel, VectorStore};

const MATH_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "expression": {
      "type": "string",
      "description": "Arithmetic expression using + - * / and parentheses"
    }
  },
  "required": ["expression"]
}"#;

const SEARCH_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "q": { "type": "string", "description": "Query text" },
    "k": { "type": "integer", "description": "Number of documents to return" }
  },
  "required": ["q"]
}"#;

/// Evaluates arithmetic expressions (`+ - * /`, parentheses, unary minus).
#[derive(Debug, Default, Clone)]
pub struct MathTool;

impl MathTool {
    /// Create the math tool.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for MathTool {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression and return the numeric result"
    }

    fn schema(&self) -> Option<&str> {
        Some(MATH_SCHEMA)
    }

    async fn invoke(&self, arguments: &str, cancel: &CancellationToken) -> ToolResult<String> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let value = eval_expression(arguments)?;
        Ok(format_number(value))
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn eval_expression(input: &str) -> ToolResult<f64> {
    let mut parser = ExprParser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = parser.expression()?;
    parser.skip_spaces();
    if parser.pos != parser.bytes.len() {
        return Err(ToolError::InvalidArguments {
            message: format!("unexpected input at offset {}", parser.pos),
        });
    }
    Ok(value)
}

// Recursive descent over ASCII bytes: expression -> term -> factor.
struct ExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl ExprParser<'_> {
    fn expression(&mut self) -> ToolResult<f64> {
        let mut value = self.term()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> ToolResult<f64> {
        let mut value = self.factor()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(ToolError::Invoke {
                            message: "division by zero".to_string(),
                        });
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> ToolResult<f64> {
        self.skip_spaces();
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                self.skip_spaces();
                if self.peek() != Some(b')') {
                    return Err(ToolError::InvalidArguments {
                        message: "missing closing parenthesis".to_string(),
                    });
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            _ => Err(ToolError::InvalidArguments {
                message: format!("expected a number at offset {}", self.pos),
            }),
        }
    }

    fn number(&mut self) -> ToolResult<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        text.parse::<f64>().map_err(|_| ToolError::InvalidArguments {
            message: format!("invalid number '{}'", text),
        })
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    q: String,
    #[serde(default)]
    k: Option<usize>,
}

/// Similarity search over a vector store.
///
/// Arguments are either a JSON object `{"q": "...", "k": 3}` or plain
/// query text; `k` defaults to 3.
pub struct SearchTool {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl SearchTool {
    /// Create a search tool over the given store and embedder.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Retrieve the most similar documents from the vector store"
    }

    fn schema(&self) -> Option<&str> {
        Some(SEARCH_SCHEMA)
    }

    async fn invoke(&self, arguments: &str, cancel: &CancellationToken) -> ToolResult<String> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let (query, k) = if is_json_arguments(arguments) {
            let args: SearchArgs =
                serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
                    message: e.to_string(),
                })?;
            (args.q, args.k.unwrap_or(3))
        } else {
            (arguments.trim().to_string(), 3)
        };

        if query.is_empty() {
            return Err(ToolError::InvalidArguments {
                message: "query text is required".to_string(),
            });
        }

        let embedding = self.embedder.embed(&query, cancel).await.map_err(|e| {
            if e.is_cancelled() {
                ToolError::Cancelled
            } else {
                ToolError::Invoke {
                    message: e.to_string(),
                }
            }
        })?;

        let hits = self.store.similarity_search(&embedding, k).await;
        if hits.is_empty() {
            return Ok("no matching documents".to_string());
        }
        Ok(hits
            .iter()
            .map(|v| v.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
