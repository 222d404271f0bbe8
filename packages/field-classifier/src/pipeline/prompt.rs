//! Prompt builder: renders a batch of fields into one classification prompt.

use std::path::Path;
use tracing::warn;

use crate::error::{ClassifyError, Result};

/// Token in the template that is replaced by the numbered field list.
pub const PLACEHOLDER: &str = "{{fields_text}}";

/// Built-in template, used when the caller has no template file.
pub const DEFAULT_TEMPLATE: &str = r#"You are classifying text fields extracted from software binaries.

For every numbered field below, decide which category it belongs to, for example:
Company, Person, Product, Address, URL, Email, Phone, Version, Path, Code, Other.
If a field cannot be classified, use the category Unclassified.

Output exactly one line per field, with four tab-separated columns and nothing else:
<raw text><TAB><category><TAB><confidence 0-100><TAB><short reason>

Copy the raw text exactly as given, without the leading number.

Fields:
{{fields_text}}"#;

/// A validated prompt template.
///
/// Construction checks the template once, so rendering a batch cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Validate a template string.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ClassifyError::Template("prompt template is empty".into()));
        }
        match text.matches(PLACEHOLDER).count() {
            0 => {
                return Err(ClassifyError::Template(format!(
                    "prompt template has no {} placeholder",
                    PLACEHOLDER
                )))
            }
            1 => {}
            n => warn!(
                occurrences = n,
                "Prompt template repeats the placeholder; every occurrence will be filled"
            ),
        }
        Ok(Self { text })
    }

    /// Read and validate a template file.
    ///
    /// A missing file is a template error, not an I/O error: the run cannot
    /// start without it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::Template(format!(
                "cannot read prompt template {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Render the prompt for one batch of fields.
    pub fn render<S: AsRef<str>>(&self, fields: &[S]) -> String {
        self.text.replace(PLACEHOLDER, &format_fields(fields))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Number fields as `1. first\n2. second`.
pub fn format_fields<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{}. {}", i + 1, field.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `fields` into `template` in one step.
pub fn render<S: AsRef<str>>(template: &str, fields: &[S]) -> Result<String> {
    Ok(PromptTemplate::new(template)?.render(fields))
}

/// Load a template file, see [`PromptTemplate::load`].
pub fn load_template(path: impl AsRef<Path>) -> Result<PromptTemplate> {
    PromptTemplate::load(path)
}
