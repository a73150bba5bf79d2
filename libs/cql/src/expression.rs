//! CQL expression tree
//!
//! Only the subset of CQL needed to express Structured Query criteria is modeled. Every
//! variant carries a fixed precedence (see [`crate::print::precedence`]) which decides
//! parenthesization when the tree is printed.

use crate::identifier::{IncrementIdentifiers, Increments};
use crate::print::{precedence, Print, PrintContext};
use crate::query::{Query, Retrieve};
use crate::Identifier;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Comparison operator: '=' | '!=' | '~' | '<' | '<=' | '>' | '>='
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equal,
    NotEqual,
    Equivalent,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "!=",
            Comparator::Equivalent => "~",
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown comparator '{0}'")]
pub struct UnknownComparator(pub String);

impl FromStr for Comparator {
    type Err = UnknownComparator;

    /// Accepts both the Structured Query mnemonics (`gt`, `le`, ...) and CQL symbols.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" | "=" => Ok(Comparator::Equal),
            "ue" | "ne" | "!=" => Ok(Comparator::NotEqual),
            "~" => Ok(Comparator::Equivalent),
            "lt" | "<" => Ok(Comparator::Less),
            "le" | "<=" => Ok(Comparator::LessOrEqual),
            "gt" | ">" => Ok(Comparator::Greater),
            "ge" | ">=" => Ok(Comparator::GreaterOrEqual),
            other => Err(UnknownComparator(other.to_string())),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Membership operator: 'in' | 'contains'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipOperator {
    In,
    Contains,
}

impl MembershipOperator {
    fn keyword(&self) -> &'static str {
        match self {
            MembershipOperator::In => "in",
            MembershipOperator::Contains => "contains",
        }
    }
}

/// Code selector: `Code 'code' from system`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeSelector {
    pub code: String,
    pub system: Identifier,
}

impl CodeSelector {
    pub fn new(code: impl Into<String>, system_alias: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: Identifier::plain(system_alias),
        }
    }
}

impl Print for CodeSelector {
    fn print(&self, ctx: PrintContext) -> String {
        format!(
            "Code {} from {}",
            string_literal(&self.code),
            self.system.print(ctx)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),

    /// Member invocation: `target.path` (path may itself be dotted)
    Invocation {
        target: Box<Expression>,
        path: String,
    },

    Code(CodeSelector),

    /// Quantity literal: `50 'g/dl'`, or the bare value without a unit
    Quantity {
        value: Decimal,
        unit: Option<String>,
    },

    Number(Decimal),

    /// DateTime literal with day precision: `@2020-01-01T`
    DateTime(NaiveDate),

    String(String),

    Boolean(bool),

    /// Type cast: `expression as Type`
    TypeCast {
        expression: Box<Expression>,
        type_name: String,
    },

    Comparator {
        operator: Comparator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `value between low and high`
    Between {
        value: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
    },

    Membership {
        operator: MembershipOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// n-ary conjunction, never directly nested
    And(Vec<Expression>),

    /// n-ary disjunction, never directly nested
    Or(Vec<Expression>),

    Not(Box<Expression>),

    Exists(Box<Expression>),

    Retrieve(Retrieve),

    Query(Box<Query>),

    /// n-ary list union, never directly nested
    Union(Vec<Expression>),

    /// String concatenation: `left + right`
    Concatenation {
        left: Box<Expression>,
        right: Box<Expression>,
    },

    Function {
        name: String,
        arguments: Vec<Expression>,
    },

    /// `Interval[low, high]`
    Interval {
        low: Box<Expression>,
        high: Box<Expression>,
    },

    /// `left overlaps right`
    Overlaps {
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub const TRUE: Expression = Expression::Boolean(true);
    pub const FALSE: Expression = Expression::Boolean(false);

    pub fn identifier(identifier: Identifier) -> Self {
        Expression::Identifier(identifier)
    }

    pub fn invocation(target: Expression, path: impl Into<String>) -> Self {
        Expression::Invocation {
            target: Box::new(target),
            path: path.into(),
        }
    }

    pub fn code(selector: CodeSelector) -> Self {
        Expression::Code(selector)
    }

    pub fn quantity(value: Decimal, unit: Option<String>) -> Self {
        Expression::Quantity { value, unit }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::String(value.into())
    }

    pub fn type_cast(expression: Expression, type_name: impl Into<String>) -> Self {
        Expression::TypeCast {
            expression: Box::new(expression),
            type_name: type_name.into(),
        }
    }

    pub fn comparator(operator: Comparator, left: Expression, right: Expression) -> Self {
        Expression::Comparator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn between(value: Expression, low: Expression, high: Expression) -> Self {
        Expression::Between {
            value: Box::new(value),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    pub fn membership(operator: MembershipOperator, left: Expression, right: Expression) -> Self {
        Expression::Membership {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn contains(left: Expression, right: Expression) -> Self {
        Self::membership(MembershipOperator::Contains, left, right)
    }

    pub fn is_in(left: Expression, right: Expression) -> Self {
        Self::membership(MembershipOperator::In, left, right)
    }

    /// Conjunction that flattens nested conjunctions on either side.
    pub fn and(left: Expression, right: Expression) -> Self {
        let mut operands = Vec::new();
        for side in [left, right] {
            match side {
                Expression::And(inner) => operands.extend(inner),
                other => operands.push(other),
            }
        }
        Expression::And(operands)
    }

    /// Disjunction that flattens nested disjunctions on either side.
    pub fn or(left: Expression, right: Expression) -> Self {
        let mut operands = Vec::new();
        for side in [left, right] {
            match side {
                Expression::Or(inner) => operands.extend(inner),
                other => operands.push(other),
            }
        }
        Expression::Or(operands)
    }

    pub fn not(expression: Expression) -> Self {
        Expression::Not(Box::new(expression))
    }

    /// `left and not right`
    pub fn and_not(left: Expression, right: Expression) -> Self {
        Self::and(left, Self::not(right))
    }

    pub fn exists(expression: Expression) -> Self {
        Expression::Exists(Box::new(expression))
    }

    pub fn query(query: Query) -> Self {
        Expression::Query(Box::new(query))
    }

    pub fn union(left: Expression, right: Expression) -> Self {
        let mut operands = Vec::new();
        for side in [left, right] {
            match side {
                Expression::Union(inner) => operands.extend(inner),
                other => operands.push(other),
            }
        }
        Expression::Union(operands)
    }

    pub fn concatenation(left: Expression, right: Expression) -> Self {
        Expression::Concatenation {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            arguments,
        }
    }

    pub fn interval(low: Expression, high: Expression) -> Self {
        Expression::Interval {
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    pub fn overlaps(left: Expression, right: Expression) -> Self {
        Expression::Overlaps {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Expression::Identifier(_)
            | Expression::Code(_)
            | Expression::Quantity { .. }
            | Expression::Number(_)
            | Expression::DateTime(_)
            | Expression::String(_)
            | Expression::Retrieve(_)
            | Expression::Function { .. }
            | Expression::Interval { .. } => precedence::ATOM,
            // Boolean literals only appear as stand-ins and print parenthesized in operators
            Expression::Boolean(_) => 0,
            Expression::Invocation { .. } => precedence::INVOCATION,
            Expression::TypeCast { .. } => precedence::TYPE_CAST,
            Expression::Exists(_) => precedence::EXISTS,
            Expression::Between { .. } => precedence::BETWEEN,
            Expression::Not(_) => precedence::NOT,
            Expression::Concatenation { .. } => precedence::CONCATENATION,
            Expression::Comparator { .. } => precedence::COMPARATOR,
            Expression::Membership { .. } => precedence::MEMBERSHIP,
            Expression::Overlaps { .. } => precedence::OVERLAPS,
            Expression::And(_) => precedence::AND,
            Expression::Or(_) => precedence::OR,
            Expression::Union(_) => precedence::UNION,
            Expression::Query(_) => precedence::QUERY,
        }
    }
}

impl Print for Expression {
    fn print(&self, ctx: PrintContext) -> String {
        let own = self.precedence();
        let child = ctx.with_precedence(own);
        let text = match self {
            Expression::Identifier(identifier) => identifier.print(ctx),
            Expression::Invocation { target, path } => {
                format!("{}.{}", target.print(child), path)
            }
            Expression::Code(selector) => selector.print(ctx),
            Expression::Quantity {
                value,
                unit: Some(unit),
            } => format!("{value} {}", string_literal(unit)),
            Expression::Quantity { value, unit: None } | Expression::Number(value) => {
                value.to_string()
            }
            Expression::DateTime(date) => format!("@{}T", date.format("%Y-%m-%d")),
            Expression::String(value) => string_literal(value),
            Expression::Boolean(value) => value.to_string(),
            Expression::TypeCast {
                expression,
                type_name,
            } => format!("{} as {}", expression.print(child), type_name),
            Expression::Comparator {
                operator,
                left,
                right,
            } => format!("{} {} {}", left.print(child), operator, right.print(child)),
            Expression::Between { value, low, high } => format!(
                "{} between {} and {}",
                value.print(child),
                low.print(child),
                high.print(child)
            ),
            Expression::Membership {
                operator,
                left,
                right,
            } => format!(
                "{} {} {}",
                left.print(child),
                operator.keyword(),
                right.print(child)
            ),
            Expression::And(operands) => join(operands, "and", child),
            Expression::Or(operands) => join(operands, "or", child),
            Expression::Union(operands) => join(operands, "union", child),
            Expression::Not(expression) => format!("not {}", expression.print(child)),
            Expression::Exists(expression) => {
                format!("exists({})", expression.print(ctx.reset_precedence()))
            }
            Expression::Retrieve(retrieve) => retrieve.print(ctx.reset_precedence()),
            Expression::Query(query) => query.print(ctx.reset_precedence()),
            Expression::Concatenation { left, right } => {
                format!("{} + {}", left.print(child), right.print(child))
            }
            Expression::Function { name, arguments } => {
                let args: Vec<String> = arguments
                    .iter()
                    .map(|arg| arg.print(ctx.reset_precedence()))
                    .collect();
                format!("{}({})", name, args.join(", "))
            }
            Expression::Interval { low, high } => format!(
                "Interval[{}, {}]",
                low.print(ctx.reset_precedence()),
                high.print(ctx.reset_precedence())
            ),
            Expression::Overlaps { left, right } => {
                format!("{} overlaps {}", left.print(child), right.print(child))
            }
        };
        ctx.parenthesize(own, text)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print(PrintContext::ZERO))
    }
}

impl From<Identifier> for Expression {
    fn from(identifier: Identifier) -> Self {
        Expression::Identifier(identifier)
    }
}

impl From<Query> for Expression {
    fn from(query: Query) -> Self {
        Expression::query(query)
    }
}

impl From<Retrieve> for Expression {
    fn from(retrieve: Retrieve) -> Self {
        Expression::Retrieve(retrieve)
    }
}

impl IncrementIdentifiers for Expression {
    fn increment_identifiers(self, increments: &Increments) -> Self {
        let inc = |e: Box<Expression>| Box::new(e.increment_identifiers(increments));
        let inc_all = |operands: Vec<Expression>| {
            operands
                .into_iter()
                .map(|e| e.increment_identifiers(increments))
                .collect()
        };
        match self {
            Expression::Identifier(identifier) => {
                Expression::Identifier(identifier.increment(increments))
            }
            Expression::Invocation { target, path } => Expression::Invocation {
                target: inc(target),
                path,
            },
            Expression::TypeCast {
                expression,
                type_name,
            } => Expression::TypeCast {
                expression: inc(expression),
                type_name,
            },
            Expression::Comparator {
                operator,
                left,
                right,
            } => Expression::Comparator {
                operator,
                left: inc(left),
                right: inc(right),
            },
            Expression::Between { value, low, high } => Expression::Between {
                value: inc(value),
                low: inc(low),
                high: inc(high),
            },
            Expression::Membership {
                operator,
                left,
                right,
            } => Expression::Membership {
                operator,
                left: inc(left),
                right: inc(right),
            },
            Expression::And(operands) => Expression::And(inc_all(operands)),
            Expression::Or(operands) => Expression::Or(inc_all(operands)),
            Expression::Union(operands) => Expression::Union(inc_all(operands)),
            Expression::Not(expression) => Expression::Not(inc(expression)),
            Expression::Exists(expression) => Expression::Exists(inc(expression)),
            Expression::Retrieve(retrieve) => {
                Expression::Retrieve(retrieve.increment_identifiers(increments))
            }
            Expression::Query(query) => {
                Expression::Query(Box::new(query.increment_identifiers(increments)))
            }
            Expression::Concatenation { left, right } => Expression::Concatenation {
                left: inc(left),
                right: inc(right),
            },
            Expression::Function { name, arguments } => Expression::Function {
                name,
                arguments: inc_all(arguments),
            },
            Expression::Interval { low, high } => Expression::Interval {
                low: inc(low),
                high: inc(high),
            },
            Expression::Overlaps { left, right } => Expression::Overlaps {
                left: inc(left),
                right: inc(right),
            },
            leaf @ (Expression::Code(_)
            | Expression::Quantity { .. }
            | Expression::Number(_)
            | Expression::DateTime(_)
            | Expression::String(_)
            | Expression::Boolean(_)) => leaf,
        }
    }
}

fn join(operands: &[Expression], keyword: &str, ctx: PrintContext) -> String {
    let separator = format!(" {keyword}{}", ctx.newline());
    operands
        .iter()
        .map(|operand| operand.print(ctx))
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Single-quoted CQL string literal with embedded quotes escaped.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}
