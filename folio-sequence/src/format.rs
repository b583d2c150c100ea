use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DocumentType;

/// Minimum width of the zero-padded sequence segment.
pub const SEQUENCE_WIDTH: usize = 6;

/// Number handed to a document-creation flow.
///
/// Invoices and bills receive a formatted string; catalog items store the raw
/// integer as their identifier.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentNumber {
    Formatted(String),
    Raw(u64),
}

impl DocumentNumber {
    pub fn as_formatted(&self) -> Option<&str> {
        match self {
            DocumentNumber::Formatted(value) => Some(value),
            DocumentNumber::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<u64> {
        match self {
            DocumentNumber::Formatted(_) => None,
            DocumentNumber::Raw(value) => Some(*value),
        }
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentNumber::Formatted(value) => f.write_str(value),
            DocumentNumber::Raw(value) => write!(f, "{value}"),
        }
    }
}

/// Render `value` as the document number for `document_type`.
///
/// Padding widens short values to [`SEQUENCE_WIDTH`] digits and never truncates
/// longer ones.
pub fn format_number(document_type: DocumentType, value: u64, fiscal_year: &str) -> DocumentNumber {
    match document_type.prefix() {
        Some(prefix) => DocumentNumber::Formatted(format!(
            "{prefix}/{fiscal_year}/{value:0width$}",
            width = SEQUENCE_WIDTH
        )),
        None => DocumentNumber::Raw(value),
    }
}
