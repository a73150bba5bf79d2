//! Term codes and concepts
//!
//! A [`TermCode`] is identified by its system and code; the display text is carried along for
//! messages only and takes no part in equality or hashing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermCode {
    pub system: String,
    pub code: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TermCode {
    pub fn new(
        system: impl Into<String>,
        code: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: display.into(),
            version: None,
        }
    }
}

impl PartialEq for TermCode {
    fn eq(&self, other: &Self) -> bool {
        self.system == other.system && self.code == other.code
    }
}

impl Eq for TermCode {}

impl Hash for TermCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.system.hash(state);
        self.code.hash(state);
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)?;
        if !self.display.is_empty() {
            write!(f, " ({})", self.display)?;
        }
        Ok(())
    }
}

/// A term code qualified by the context it is used in (e.g. `Laboratory` vs `Diagnosis`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextualTermCode {
    pub context: TermCode,
    pub term_code: TermCode,
}

impl ContextualTermCode {
    pub fn new(context: TermCode, term_code: TermCode) -> Self {
        Self { context, term_code }
    }
}

impl fmt::Display for ContextualTermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in context {}", self.term_code, self.context)
    }
}

/// A context together with one or more term codes; the unit of criterion selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualConcept {
    context: TermCode,
    term_codes: Vec<TermCode>,
}

impl ContextualConcept {
    pub fn new(context: TermCode, term_codes: Vec<TermCode>) -> Result<Self> {
        if term_codes.is_empty() {
            return Err(Error::MalformedInput(format!(
                "concept in context {context} has no term codes"
            )));
        }
        Ok(Self {
            context,
            term_codes,
        })
    }

    pub fn context(&self) -> &TermCode {
        &self.context
    }

    pub fn term_codes(&self) -> &[TermCode] {
        &self.term_codes
    }

    pub fn contextual_term_codes(&self) -> impl Iterator<Item = ContextualTermCode> + '_ {
        self.term_codes
            .iter()
            .map(|term_code| ContextualTermCode::new(self.context.clone(), term_code.clone()))
    }
}

impl fmt::Display for ContextualConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.term_codes.iter().map(ToString::to_string).collect();
        write!(f, "[{}] in context {}", codes.join(", "), self.context)
    }
}
