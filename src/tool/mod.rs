//! Invocable tools and the immutable tool registry.
//!
//! Tools are exposed to the model as JSON schemas (injected into prompts
//! via the `{tools_schemas}` placeholder) and invoked when generated text
//! contains `[TOOL:name arguments]` lines.

mod builtin;

pub use builtin::{MathTool, SearchTool};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ToolResult;

/// A tool that can be invoked mid-generation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name; registry lookups are case-insensitive.
    fn name(&self) -> &str;

    /// Human-readable description injected into prompts.
    fn description(&self) -> &str;

    /// JSON-schema text for the tool's parameters, if it declares one.
    fn schema(&self) -> Option<&str> {
        None
    }

    /// Execute the tool against raw argument text.
    ///
    /// Cancellation must surface as [`crate::error::ToolError::Cancelled`],
    /// not a generic failure.
    async fn invoke(&self, arguments: &str, cancel: &CancellationToken) -> ToolResult<String>;
}

/// An immutable, name-keyed collection of tools.
///
/// [`ToolRegistry::with_tool`] is copy-on-write: the receiver is left
/// untouched and the returned registry holds all prior tools plus the new
/// one. Registering a name that already exists (case-insensitively)
/// replaces the previous tool in the returned registry. Every derived
/// registry is independently safe to hold onto.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    // Registration order, preserved for schema export.
    tools: Vec<Arc<dyn Tool>>,
    // Lowercased name -> position in `tools`.
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// The empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a new registry with one more tool.
    pub fn with_tool(&self, tool: Arc<dyn Tool>) -> Self {
        let mut next = self.clone();
        let key = tool.name().to_lowercase();
        match next.index.get(&key) {
            Some(&position) => next.tools[position] = tool,
            None => {
                next.index.insert(key, next.tools.len());
                next.tools.push(tool);
            }
        }
        next
    }

    /// Look up a tool by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&position| Arc::clone(&self.tools[position]))
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Serialize every tool as `{name, description, parameters}`.
    ///
    /// `parameters` is the tool's own parsed JSON schema, or `null` when
    /// the tool declares none (or the declared text is not valid JSON).
    pub fn export_schemas(&self) -> Value {
        Value::Array(
            self.tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool
                            .schema()
                            .and_then(|s| serde_json::from_str::<Value>(s).ok())
                            .unwrap_or(Value::Null),
                    })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo back the argument text"
        }

        fn schema(&self) -> Option<&str> {
            Some(r#"{"type":"object","properties":{"message":{"type":"string"}}}"#)
        }

        async fn invoke(&self, arguments: &str, cancel: &CancellationToken) -> ToolResult<String> {
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled);
            }
            Ok(arguments.to_string())
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        async fn invoke(&self, _arguments: &str, _cancel: &CancellationToken) -> ToolResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_with_tool_is_copy_on_write() {
        let empty = ToolRegistry::new();
        let one = empty.with_tool(Arc::new(EchoTool));
        let two = one.with_tool(Arc::new(NamedTool("other")));

        assert_eq!(empty.len(), 0);
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);

        // Older registries are unaffected by later derivations.
        assert!(empty.get("echo").is_none());
        assert!(one.get("other").is_none());
        assert!(two.get("echo").is_some());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        assert!(registry.get("ECHO").is_some());
        assert!(registry.get("Echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_same_name_replaces_in_derived_registry() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(NamedTool("dup")))
            .with_tool(Arc::new(NamedTool("dup")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_export_schemas_shape() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(EchoTool))
            .with_tool(Arc::new(NamedTool("bare")));

        let exported = registry.export_schemas();
        let list = exported.as_array().unwrap();
        assert_eq!(list.len(), 2);

        assert_eq!(list[0]["name"], "echo");
        assert_eq!(list[0]["description"], "Echo back the argument text");
        assert_eq!(list[0]["parameters"]["type"], "object");

        // A tool without a schema exports null parameters.
        assert_eq!(list[1]["name"], "bare");
        assert!(list[1]["parameters"].is_null());
    }

    #[test]
    fn test_export_preserves_registration_order() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(NamedTool("zeta")))
            .with_tool(Arc::new(NamedTool("alpha")));
        let exported = registry.export_schemas();
        let names: Vec<&str> = exported
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_invoke_through_registry() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let tool = registry.get("echo").unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(tool.invoke("hello", &cancel).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_invoke_cancelled_is_distinct() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let tool = registry.get("echo").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            tool.invoke("hello", &cancel).await,
            Err(ToolError::Cancelled)
        ));
    }
}
