//! Top-level library definitions

use crate::expression::{string_literal, Expression};
use crate::identifier::{IncrementIdentifiers, Increments};
use crate::print::{Print, PrintContext};
use crate::Identifier;

/// `codesystem alias: 'url'`
///
/// Ordered by alias first so that libraries list code systems alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeSystemDefinition {
    pub alias: String,
    pub url: String,
}

impl CodeSystemDefinition {
    pub fn new(alias: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            url: url.into(),
        }
    }
}

impl Print for CodeSystemDefinition {
    fn print(&self, ctx: PrintContext) -> String {
        format!(
            "codesystem {}: {}",
            Identifier::plain(self.alias.as_str()).print(ctx),
            string_literal(&self.url)
        )
    }
}

/// `define Name:` followed by the indented expression
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionDefinition {
    pub name: Identifier,
    pub expression: Expression,
}

impl ExpressionDefinition {
    pub fn new(name: Identifier, expression: Expression) -> Self {
        Self { name, expression }
    }
}

impl Print for ExpressionDefinition {
    fn print(&self, ctx: PrintContext) -> String {
        let body = ctx.reset_precedence().increase_indent();
        format!(
            "define {}:{}{}",
            self.name.print(ctx),
            body.newline(),
            self.expression.print(body)
        )
    }
}

impl IncrementIdentifiers for ExpressionDefinition {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        Self {
            name: self.name.increment(increments),
            expression: self.expression.increment_identifiers(increments),
        }
    }
}
