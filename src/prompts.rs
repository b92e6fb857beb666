//! Centralized prompt templates for the reasoning stages
//!
//! This module contains the Draft/Critique/Improve templates and the
//! placeholder substitution helper. Centralizing prompts makes them
//! easier to maintain, test, and version.
//!
//! Placeholders are substituted verbatim: `{context}`, `{topic}`,
//! `{tools_schemas}`, `{draft}`, `{critique}`.

/// Prompt template for the Draft stage.
pub const DRAFT_PROMPT: &str = r#"You are a technical writer producing a first draft.

Reference material retrieved for this topic:
{context}

Topic to write about:
{topic}

You may invoke a tool at any point by emitting a line of the form:
[TOOL:<name> <arguments>]

Available tools (JSON schemas):
{tools_schemas}

Write a thorough first draft on the topic. Ground claims in the reference
material where it applies. Use tools when a computation or lookup would
make the draft more precise."#;

/// Prompt template for the Critique stage.
pub const CRITIQUE_PROMPT: &str = r#"You are a critical reviewer.

Text under review:
{draft}

Identify concrete weaknesses: factual gaps, unsupported claims, missing
structure, unclear reasoning. Be specific and actionable. Do not rewrite
the text; produce the critique only."#;

/// Prompt template for the Improve stage.
pub const IMPROVE_PROMPT: &str = r#"You are a technical writer revising a draft against a review.

Current text:
{draft}

Review to address:
{critique}

Produce the improved version of the text. Resolve every point the review
raises; keep what the review does not dispute."#;

/// Substitute `{key}` placeholders verbatim.
///
/// Pairs are applied in order, each as a full-text replace; keys absent
/// from `values` are left in place. Callers pass disjoint keys.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
