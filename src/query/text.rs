//! Free-text queries against one index field.

use crate::index::{QueryOperation, TextField, TextOperation};

use super::analyzer::Analyzer;

/// Query by analyzed text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    field: TextField,
    /// The text as the user wrote it (unquoted).
    text: String,
    terms: Vec<String>,
}

impl TextQuery {
    pub fn new(analyzer: &dyn Analyzer, field: TextField, text: &str) -> Self {
        Self {
            field,
            text: text.to_string(),
            terms: analyzer.tokenize(text),
        }
    }

    pub fn field(&self) -> TextField {
        self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Text that analyzes to no terms (only punctuation) matches every
    /// item, and so its negation matches none.
    pub(crate) fn compile(&self, bool: bool) -> QueryOperation {
        if self.terms.is_empty() {
            return if bool {
                QueryOperation::AllResults
            } else {
                QueryOperation::NoResults
            };
        }
        QueryOperation::Text(TextOperation {
            field: self.field,
            terms: self.terms.clone(),
            bool,
        })
    }

    pub(crate) fn dump(&self, out: &mut String) {
        match self.field {
            TextField::Any => {}
            field => {
                out.push_str(&field.as_str().to_ascii_uppercase());
                out.push(':');
            }
        }
        super::push_value(out, &self.text);
    }
}
