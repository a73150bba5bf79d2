//! CQL identifiers
//!
//! Two kinds exist: plain identifiers, whose name is fixed, and suffixed identifiers, which
//! carry a numeric suffix that the container algebra may shift when two independently built
//! containers define the same prefix.

use crate::print::{Print, PrintContext};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

static SIMPLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Suffix increments per identifier prefix.
pub type Increments = HashMap<String, u32>;

/// Rewrites every suffixed identifier reachable from a value.
pub trait IncrementIdentifiers: Sized {
    fn increment_identifiers(self, increments: &Increments) -> Self;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Plain(String),
    Suffixed { prefix: String, suffix: u32 },
}

impl Identifier {
    pub fn plain(name: impl Into<String>) -> Self {
        Identifier::Plain(name.into())
    }

    pub fn suffixed(prefix: impl Into<String>, suffix: u32) -> Self {
        Identifier::Suffixed {
            prefix: prefix.into(),
            suffix,
        }
    }

    /// Name as it appears to a reader, without quotes.
    pub fn display_name(&self) -> String {
        match self {
            Identifier::Plain(name) => name.clone(),
            Identifier::Suffixed { prefix, suffix: 0 } => prefix.clone(),
            Identifier::Suffixed { prefix, suffix } => format!("{prefix} {suffix}"),
        }
    }

    /// Prefix and suffix of a suffixed identifier.
    pub fn suffix_parts(&self) -> Option<(&str, u32)> {
        match self {
            Identifier::Plain(_) => None,
            Identifier::Suffixed { prefix, suffix } => Some((prefix, *suffix)),
        }
    }

    /// Shifts the suffix by the increment registered for its prefix, if any.
    pub fn increment(self, increments: &Increments) -> Self {
        match self {
            Identifier::Suffixed { prefix, suffix } => {
                let inc = increments.get(&prefix).copied().unwrap_or(0);
                Identifier::Suffixed {
                    prefix,
                    suffix: suffix + inc,
                }
            }
            plain => plain,
        }
    }
}

impl Print for Identifier {
    fn print(&self, _ctx: PrintContext) -> String {
        match self {
            Identifier::Plain(name) | Identifier::Suffixed { prefix: name, suffix: 0 } => {
                if is_simple(name) {
                    name.clone()
                } else {
                    quote(name)
                }
            }
            Identifier::Suffixed { .. } => quote(&self.display_name()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print(PrintContext::ZERO))
    }
}

pub(crate) fn is_simple(name: &str) -> bool {
    SIMPLE_IDENTIFIER.is_match(name)
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\\\""))
}
