//! Translation errors
//!
//! Every error aborts the whole translation; nothing is retried.

use crate::term_code::{ContextualConcept, ContextualTermCode, TermCode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mapping not found for {0}")]
    MappingNotFound(ContextualTermCode),

    #[error("Attribute mapping not found for attribute {attribute} on mapping {key}")]
    AttributeMappingNotFound {
        key: ContextualTermCode,
        attribute: TermCode,
    },

    #[error("Code system alias not found for system '{system}' (term code {term_code})")]
    CodeSystemAliasNotFound { system: String, term_code: TermCode },

    #[error("Failed to expand concept {0}: no expanded code has a mapping")]
    ConceptExpansionEmpty(ContextualConcept),

    #[error("Unsupported modifier: {0}")]
    UnsupportedModifierShape(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
