use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SequenceError;

/// Enumerates the documents that draw numbers from the allocator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Bill,
    Product,
    Kit,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Invoice,
        DocumentType::Bill,
        DocumentType::Product,
        DocumentType::Kit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Bill => "bill",
            DocumentType::Product => "product",
            DocumentType::Kit => "kit",
        }
    }

    /// Invoice and bill numbers restart every fiscal year; catalog identifiers never do.
    pub fn is_year_scoped(self) -> bool {
        matches!(self, DocumentType::Invoice | DocumentType::Bill)
    }

    /// Prefix used by the human-readable document number, if the type has one.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            DocumentType::Invoice => Some("INV"),
            DocumentType::Bill => Some("BILL"),
            DocumentType::Product | DocumentType::Kit => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(DocumentType::Invoice),
            "bill" => Ok(DocumentType::Bill),
            "product" => Ok(DocumentType::Product),
            "kit" => Ok(DocumentType::Kit),
            _ => Err(SequenceError::UnknownDocumentType(s.to_string())),
        }
    }
}
