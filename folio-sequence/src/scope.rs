use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Clock, DocumentType, FiscalYear};

/// Composite identity under which a counter is tracked.
///
/// `fiscal_year` is `None` for catalog types, whose sequence never resets.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ScopeKey {
    pub document_type: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<String>,
}

impl ScopeKey {
    /// Key for a catalog sequence that runs for the application's lifetime.
    pub fn lifetime(document_type: DocumentType) -> Self {
        Self {
            document_type,
            fiscal_year: None,
        }
    }

    /// Key for a sequence bound to a fiscal year.
    pub fn yearly(document_type: DocumentType, fiscal_year: impl Into<String>) -> Self {
        Self {
            document_type,
            fiscal_year: Some(fiscal_year.into()),
        }
    }

    /// Derive the key used for the next allocation of `document_type`.
    pub fn for_document(document_type: DocumentType, clock: &dyn Clock) -> Self {
        if document_type.is_year_scoped() {
            Self::yearly(
                document_type,
                FiscalYear::containing(clock.today()).label(),
            )
        } else {
            Self::lifetime(document_type)
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fiscal_year {
            Some(year) => write!(f, "{}@{}", self.document_type, year),
            None => write!(f, "{}", self.document_type),
        }
    }
}
