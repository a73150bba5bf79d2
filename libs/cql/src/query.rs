//! Retrieves and queries
//!
//! ```text
//! from <source> <Alias>
//!   with <source> <Alias>
//!     such that <predicate>
//!   where <condition>
//!   return <projection>
//! ```
//!
//! Query keywords disambiguate their children, so children are printed with the demanded
//! precedence reset to zero. Clause bodies are indented one step deeper than their keyword.

use crate::expression::Expression;
use crate::identifier::{IncrementIdentifiers, Increments};
use crate::print::{Print, PrintContext};
use crate::Identifier;

/// Retrieve: `[ResourceType]` or `[ResourceType: terminology]`
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieve {
    pub resource_type: String,
    pub terminology: Option<Box<Expression>>,
}

impl Retrieve {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            terminology: None,
        }
    }

    pub fn with_terminology(resource_type: impl Into<String>, terminology: Expression) -> Self {
        Self {
            resource_type: resource_type.into(),
            terminology: Some(Box::new(terminology)),
        }
    }
}

impl Print for Retrieve {
    fn print(&self, ctx: PrintContext) -> String {
        match &self.terminology {
            Some(terminology) => format!(
                "[{}: {}]",
                self.resource_type,
                terminology.print(ctx.reset_precedence())
            ),
            None => format!("[{}]", self.resource_type),
        }
    }
}

impl IncrementIdentifiers for Retrieve {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        Self {
            resource_type: self.resource_type,
            terminology: self
                .terminology
                .map(|t| Box::new(t.increment_identifiers(increments))),
        }
    }
}

/// Aliased query source: `<source> <Alias>`
#[derive(Debug, Clone, PartialEq)]
pub struct SourceClause {
    pub source: Expression,
    pub alias: Identifier,
}

impl SourceClause {
    pub fn new(source: impl Into<Expression>, alias: Identifier) -> Self {
        Self {
            source: source.into(),
            alias,
        }
    }

    pub fn alias_expression(&self) -> Expression {
        Expression::identifier(self.alias.clone())
    }
}

impl Print for SourceClause {
    fn print(&self, ctx: PrintContext) -> String {
        format!(
            "{} {}",
            self.source.print(ctx.reset_precedence()),
            self.alias.print(ctx)
        )
    }
}

impl IncrementIdentifiers for SourceClause {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        Self {
            source: self.source.increment_identifiers(increments),
            alias: self.alias,
        }
    }
}

/// Inclusion clause: `with <source> such that <predicate>`
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub source: SourceClause,
    pub such_that: Expression,
}

impl Print for WithClause {
    fn print(&self, ctx: PrintContext) -> String {
        let predicate_ctx = ctx.reset_precedence().increase_indent();
        format!(
            "with {}{}such that {}",
            self.source.print(ctx),
            predicate_ctx.newline(),
            self.such_that.print(predicate_ctx.increase_indent())
        )
    }
}

impl IncrementIdentifiers for WithClause {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        Self {
            source: self.source.increment_identifiers(increments),
            such_that: self.such_that.increment_identifiers(increments),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: SourceClause,
    pub with_clauses: Vec<WithClause>,
    pub where_clause: Option<Expression>,
    pub return_clause: Option<Expression>,
}

impl Query {
    pub fn from_source(source: SourceClause) -> Self {
        Self {
            source,
            with_clauses: Vec::new(),
            where_clause: None,
            return_clause: None,
        }
    }

    pub fn with(mut self, source: SourceClause, such_that: Expression) -> Self {
        self.with_clauses.push(WithClause { source, such_that });
        self
    }

    /// Adds a where condition, AND-ing it with an existing one.
    pub fn filter(mut self, condition: Expression) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => Expression::and(existing, condition),
            None => condition,
        });
        self
    }

    pub fn returning(mut self, projection: Expression) -> Self {
        self.return_clause = Some(projection);
        self
    }
}

impl Print for Query {
    fn print(&self, ctx: PrintContext) -> String {
        let ctx = ctx.reset_precedence();
        let clause_ctx = ctx.increase_indent();
        let body_ctx = clause_ctx.increase_indent();

        let mut out = format!("from {}", self.source.print(ctx));
        for with in &self.with_clauses {
            out.push_str(&clause_ctx.newline());
            out.push_str(&with.print(clause_ctx));
        }
        if let Some(condition) = &self.where_clause {
            out.push_str(&clause_ctx.newline());
            out.push_str("where ");
            out.push_str(&condition.print(body_ctx));
        }
        if let Some(projection) = &self.return_clause {
            out.push_str(&clause_ctx.newline());
            out.push_str("return ");
            out.push_str(&projection.print(body_ctx));
        }
        out
    }
}

impl IncrementIdentifiers for Query {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        Self {
            source: self.source.increment_identifiers(increments),
            with_clauses: self
                .with_clauses
                .into_iter()
                .map(|w| w.increment_identifiers(increments))
                .collect(),
            where_clause: self
                .where_clause
                .map(|w| w.increment_identifiers(increments)),
            return_clause: self
                .return_clause
                .map(|r| r.increment_identifiers(increments)),
        }
    }
}
