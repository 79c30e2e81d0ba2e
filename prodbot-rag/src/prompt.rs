//! Prompt templates and the registry that maps prompt types to them.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal
//! braces. Rendering is a single pass over the parsed template, so braces
//! inside substituted values are never interpreted.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{RagError, Result};

/// Slot filled with the formatted context block.
pub const CONTEXT_SLOT: &str = "context";
/// Slot filled with the user question.
pub const QUESTION_SLOT: &str = "question";

const PRODUCT_BOT_TEMPLATE: &str = "\
You are an expert e-commerce product recommendation assistant specialized in electronics.
Your task is to answer product-related queries using only the provided context.

Instructions:
- Use only the product titles, prices, ratings and reviews in the context.
- Highlight the key product features, pricing and what customers say.
- If several products fit, compare them briefly.
- If the context does not contain the answer, say that you don't know.
- Keep the answer concise and well structured.

CONTEXT:
{context}

QUESTION: {question}

YOUR ANSWER:
";

/// The prompts known to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptType {
    ProductBot,
}

impl PromptType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductBot => "product_bot",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "product_bot" | "PRODUCT_BOT" => Ok(Self::ProductBot),
            other => Err(RagError::Configuration(format!("unknown prompt type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] on an unbalanced brace or an
    /// empty placeholder name.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    let name = name.trim().to_string();
                    if !closed || name.is_empty() || name.contains('{') {
                        return Err(RagError::Configuration(format!(
                            "malformed placeholder at byte {pos} in prompt template"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(name));
                }
                '}' => {
                    return Err(RagError::Configuration(format!(
                        "unmatched '}}' at byte {pos} in prompt template"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance.
    pub fn slots(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fill every placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a placeholder has no value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| *key == name.as_str())
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            RagError::Configuration(format!("no value for prompt slot '{name}'"))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Ensure the template uses exactly the given slots.
    fn require_slots(&self, prompt_type: PromptType, required: &[&str]) -> Result<()> {
        let slots = self.slots();
        for name in required {
            if !slots.contains(name) {
                return Err(RagError::Configuration(format!(
                    "prompt '{prompt_type}' is missing the {{{name}}} slot"
                )));
            }
        }
        if let Some(extra) = slots.iter().find(|s| !required.contains(*s)) {
            return Err(RagError::Configuration(format!(
                "prompt '{prompt_type}' uses unknown slot {{{extra}}}"
            )));
        }
        Ok(())
    }
}

/// Parse and render a template in one step.
pub(crate) fn fill_template(template: &str, values: &[(&str, &str)]) -> Result<String> {
    PromptTemplate::parse(template)?.render(values)
}

/// Templates keyed by [`PromptType`], built once at startup.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: HashMap<PromptType, PromptTemplate>,
}

impl PromptRegistry {
    /// A registry without any templates.
    pub fn empty() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Register a template, validating it against the slots `prompt_type` requires.
    pub fn register(&mut self, prompt_type: PromptType, template: &str) -> Result<()> {
        let parsed = PromptTemplate::parse(template)?;
        parsed.require_slots(prompt_type, &[CONTEXT_SLOT, QUESTION_SLOT])?;
        self.templates.insert(prompt_type, parsed);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_template(mut self, prompt_type: PromptType, template: &str) -> Result<Self> {
        self.register(prompt_type, template)?;
        Ok(self)
    }

    /// Load templates from a JSON object such as `{"product_bot": "..."}`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] for invalid JSON, unknown keys,
    /// non-string values or invalid templates.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| RagError::Configuration(format!("invalid prompt registry: {e}")))?;
        let mut registry = Self::empty();
        for (key, template) in raw {
            registry.register(key.parse()?, &template)?;
        }
        Ok(registry)
    }

    /// Look up the template for `prompt_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if nothing is registered for it.
    pub fn get(&self, prompt_type: PromptType) -> Result<&PromptTemplate> {
        self.templates.get(&prompt_type).ok_or_else(|| {
            RagError::Configuration(format!("no template registered for prompt '{prompt_type}'"))
        })
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        let mut templates = HashMap::new();
        // Covered by `builtin_product_bot_template_is_valid`.
        if let Ok(parsed) = PromptTemplate::parse(PRODUCT_BOT_TEMPLATE) {
            templates.insert(PromptType::ProductBot, parsed);
        }
        Self { templates }
    }
}
