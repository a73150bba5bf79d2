//! Query modifiers
//!
//! A modifier narrows the resources a criterion selects. Most modifiers contribute a condition
//! to the `where` clause; the reference modifier joins a helper query with a `with` clause.
//! Modifiers are built against the alias of the query they constrain.

use crate::criterion;
use chrono::NaiveDate;
use sq2cql_cql::{
    CodeSelector, Comparator, Container, Expression, Identifier, Query, SourceClause,
};
use sq2cql_model::{
    Criterion, Error, MappingContext, PathMapping, Quantity, Result, TermCode, ValueType,
};

/// What a numeric or range modifier compares.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `A.path as Quantity`, compared against a quantity
    Path(String),
    /// An age function like `AgeInYears()`, compared against a bare number
    Age(&'static str),
}

impl Operand {
    fn expression(&self, alias: &Expression) -> Expression {
        match self {
            Operand::Path(path) => {
                Expression::type_cast(Expression::invocation(alias.clone(), path), "Quantity")
            }
            Operand::Age(function) => Expression::function(*function, Vec::new()),
        }
    }

    fn value(&self, quantity: &Quantity) -> Expression {
        match self {
            Operand::Path(_) => quantity.to_expression(),
            Operand::Age(_) => Expression::Number(quantity.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// `A.path = 'code'` per code, OR-ed
    Code { path: String, codes: Vec<String> },
    /// `A.path contains Code 'code' from alias` per code, OR-ed
    Coding { path: String, codes: Vec<TermCode> },
    Numeric {
        operand: Operand,
        comparator: Comparator,
        value: Quantity,
    },
    Range {
        operand: Operand,
        low: Quantity,
        high: Quantity,
    },
    /// Joins the union of the nested criteria's references on `A.path.reference`
    Reference { path: String, criteria: Vec<Criterion> },
    TimeRestriction {
        path: PathMapping,
        after: Option<NaiveDate>,
        before: Option<NaiveDate>,
    },
}

/// Contribution of one modifier to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Where(Expression),
    With {
        source: SourceClause,
        such_that: Expression,
    },
}

impl Constraint {
    pub fn apply(self, query: Query) -> Query {
        match self {
            Constraint::Where(condition) => query.filter(condition),
            Constraint::With { source, such_that } => query.with(source, such_that),
        }
    }
}

fn default_after() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_before() -> NaiveDate {
    NaiveDate::from_ymd_opt(2040, 1, 1).unwrap_or(NaiveDate::MAX)
}

impl Modifier {
    /// Code matching on a path, shaped by the path's single declared type.
    pub fn coding(path: &PathMapping, codes: Vec<TermCode>) -> Result<Self> {
        match path.single_type()? {
            ValueType::Code => Ok(Modifier::Code {
                path: path.path.clone(),
                codes: codes.into_iter().map(|c| c.code).collect(),
            }),
            ValueType::CodeableConcept => Ok(Modifier::Coding {
                path: format!("{}.coding", path.path),
                codes,
            }),
            ValueType::Coding => Ok(Modifier::Coding {
                path: path.path.clone(),
                codes,
            }),
            other => Err(Error::UnsupportedModifierShape(format!(
                "cannot match codes on path `{}` of type {other}",
                path.path
            ))),
        }
    }

    pub fn build(&self, context: &MappingContext, alias: &Expression) -> Result<Container<Constraint>> {
        let target = |path: &str| Expression::invocation(alias.clone(), path);

        let condition = match self {
            Modifier::Code { path, codes } => Container::any_of(codes.iter().map(|code| {
                Container::of(Expression::comparator(
                    Comparator::Equal,
                    target(path),
                    Expression::string(code.as_str()),
                ))
            })),
            Modifier::Coding { path, codes } => code_alternatives(context, codes, |code| {
                Expression::contains(target(path), code)
            })?,
            Modifier::Numeric {
                operand,
                comparator,
                value,
            } => Container::of(Expression::comparator(
                *comparator,
                operand.expression(alias),
                operand.value(value),
            )),
            Modifier::Range {
                operand,
                low,
                high,
            } => Container::of(Expression::between(
                operand.expression(alias),
                operand.value(low),
                operand.value(high),
            )),
            Modifier::Reference { path, criteria } => {
                return reference(context, alias, path, criteria);
            }
            Modifier::TimeRestriction {
                path,
                after,
                before,
            } => Container::of(time_restriction(
                target(&path.path),
                path,
                after.unwrap_or_else(default_after),
                before.unwrap_or_else(default_before),
            )?),
        };
        Ok(condition.map(Constraint::Where))
    }
}

fn code_alternatives(
    context: &MappingContext,
    codes: &[TermCode],
    condition: impl Fn(Expression) -> Expression,
) -> Result<Container> {
    let alternatives = codes
        .iter()
        .map(|code| {
            let code_system = context.find_code_system_definition(code)?;
            let selector = CodeSelector::new(code.code.as_str(), code_system.alias.as_str());
            Ok(Container::of(condition(Expression::code(selector))).with_code_system(code_system))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Container::any_of(alternatives))
}

fn time_restriction(
    target: Expression,
    path: &PathMapping,
    after: NaiveDate,
    before: NaiveDate,
) -> Result<Expression> {
    let interval = || Expression::interval(Expression::DateTime(after), Expression::DateTime(before));

    let mut alternatives = Vec::new();
    if path.has_type(&ValueType::DateTime) {
        alternatives.push(Expression::is_in(
            Expression::function("ToDate", vec![Expression::type_cast(target.clone(), "dateTime")]),
            interval(),
        ));
    }
    if path.has_type(&ValueType::Period) {
        alternatives.push(Expression::overlaps(
            Expression::type_cast(target, "Period"),
            interval(),
        ));
    }

    alternatives
        .into_iter()
        .reduce(Expression::or)
        .ok_or_else(|| {
            Error::UnsupportedModifierShape(format!(
                "time restriction path `{}` is neither dateTime nor Period",
                path.path
            ))
        })
}

fn reference(
    context: &MappingContext,
    alias: &Expression,
    path: &str,
    criteria: &[Criterion],
) -> Result<Container<Constraint>> {
    let helper = criterion::reference_helper(context, criteria)?;
    let outer = alias.as_identifier().map(Identifier::display_name);
    let reference_alias = Identifier::plain(match outer.as_deref() {
        Some("R") => "R1",
        _ => "R",
    });

    Ok(helper.map(|helper| Constraint::With {
        source: SourceClause::new(helper, reference_alias.clone()),
        such_that: Expression::comparator(
            Comparator::Equal,
            Expression::invocation(alias.clone(), format!("{path}.reference")),
            Expression::identifier(reference_alias),
        ),
    }))
}
