//! Structured Query criteria
//!
//! A [`StructuredQuery`] holds inclusion criteria in conjunctive normal form (clauses are
//! AND-ed, criteria inside a clause OR-ed) and exclusion criteria in disjunctive normal form
//! (clauses are OR-ed, criteria inside a clause AND-ed).

use crate::error::{Error, Result};
use crate::term_code::{ContextualConcept, TermCode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sq2cql_cql::{Comparator, Expression};

/// Decimal value with an optional UCUM unit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        Self { value, unit }
    }

    pub fn unitless(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    pub fn to_expression(&self) -> Expression {
        Expression::quantity(self.value, self.unit.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRestriction {
    after: Option<NaiveDate>,
    before: Option<NaiveDate>,
}

impl TimeRestriction {
    pub fn new(after: Option<NaiveDate>, before: Option<NaiveDate>) -> Result<Self> {
        match (after, before) {
            (None, None) => Err(Error::MalformedInput(
                "time restriction needs at least one of afterDate and beforeDate".into(),
            )),
            (Some(after), Some(before)) if after > before => Err(Error::MalformedInput(format!(
                "time restriction afterDate {after} is later than beforeDate {before}"
            ))),
            _ => Ok(Self { after, before }),
        }
    }

    pub fn after(&self) -> Option<NaiveDate> {
        self.after
    }

    pub fn before(&self) -> Option<NaiveDate> {
        self.before
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriterionKind {
    Concept,
    Numeric {
        comparator: Comparator,
        value: Quantity,
    },
    Range {
        low: Quantity,
        high: Quantity,
    },
    ValueSet {
        selected_concepts: Vec<TermCode>,
    },
    Reference {
        criteria: Vec<Criterion>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    concept: ContextualConcept,
    kind: CriterionKind,
    attribute_filters: Vec<AttributeFilter>,
    time_restriction: Option<TimeRestriction>,
}

impl Criterion {
    fn of(concept: ContextualConcept, kind: CriterionKind) -> Self {
        Self {
            concept,
            kind,
            attribute_filters: Vec::new(),
            time_restriction: None,
        }
    }

    pub fn concept(concept: ContextualConcept) -> Self {
        Self::of(concept, CriterionKind::Concept)
    }

    pub fn numeric(concept: ContextualConcept, comparator: Comparator, value: Quantity) -> Self {
        Self::of(concept, CriterionKind::Numeric { comparator, value })
    }

    pub fn range(concept: ContextualConcept, low: Quantity, high: Quantity) -> Result<Self> {
        check_range(&low, &high)?;
        Ok(Self::of(concept, CriterionKind::Range { low, high }))
    }

    pub fn value_set(concept: ContextualConcept, selected_concepts: Vec<TermCode>) -> Result<Self> {
        if selected_concepts.is_empty() {
            return Err(Error::MalformedInput(format!(
                "value set criterion {concept} has no selected concepts"
            )));
        }
        Ok(Self::of(concept, CriterionKind::ValueSet { selected_concepts }))
    }

    pub fn reference(concept: ContextualConcept, criteria: Vec<Criterion>) -> Result<Self> {
        if criteria.is_empty() {
            return Err(Error::MalformedInput(format!(
                "reference criterion {concept} has no nested criteria"
            )));
        }
        Ok(Self::of(concept, CriterionKind::Reference { criteria }))
    }

    pub fn with_attribute_filter(mut self, filter: AttributeFilter) -> Self {
        self.attribute_filters.push(filter);
        self
    }

    pub fn with_time_restriction(mut self, time_restriction: TimeRestriction) -> Self {
        self.time_restriction = Some(time_restriction);
        self
    }

    pub fn contextual_concept(&self) -> &ContextualConcept {
        &self.concept
    }

    pub fn kind(&self) -> &CriterionKind {
        &self.kind
    }

    pub fn attribute_filters(&self) -> &[AttributeFilter] {
        &self.attribute_filters
    }

    pub fn time_restriction(&self) -> Option<&TimeRestriction> {
        self.time_restriction.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeFilterKind {
    Concept {
        selected_concepts: Vec<TermCode>,
    },
    Numeric {
        comparator: Comparator,
        value: Quantity,
    },
    Range {
        low: Quantity,
        high: Quantity,
    },
    Reference {
        criteria: Vec<Criterion>,
    },
}

/// A constraint on one attribute of the resources selected by a criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFilter {
    attribute_code: TermCode,
    kind: AttributeFilterKind,
}

impl AttributeFilter {
    pub fn concept(attribute_code: TermCode, selected_concepts: Vec<TermCode>) -> Result<Self> {
        if selected_concepts.is_empty() {
            return Err(Error::MalformedInput(format!(
                "attribute filter {attribute_code} has no selected concepts"
            )));
        }
        Ok(Self {
            attribute_code,
            kind: AttributeFilterKind::Concept { selected_concepts },
        })
    }

    pub fn numeric(attribute_code: TermCode, comparator: Comparator, value: Quantity) -> Self {
        Self {
            attribute_code,
            kind: AttributeFilterKind::Numeric { comparator, value },
        }
    }

    pub fn range(attribute_code: TermCode, low: Quantity, high: Quantity) -> Result<Self> {
        check_range(&low, &high)?;
        Ok(Self {
            attribute_code,
            kind: AttributeFilterKind::Range { low, high },
        })
    }

    pub fn reference(attribute_code: TermCode, criteria: Vec<Criterion>) -> Result<Self> {
        if criteria.is_empty() {
            return Err(Error::MalformedInput(format!(
                "attribute filter {attribute_code} has no nested criteria"
            )));
        }
        Ok(Self {
            attribute_code,
            kind: AttributeFilterKind::Reference { criteria },
        })
    }

    pub fn attribute_code(&self) -> &TermCode {
        &self.attribute_code
    }

    pub fn kind(&self) -> &AttributeFilterKind {
        &self.kind
    }
}

fn check_range(low: &Quantity, high: &Quantity) -> Result<()> {
    if low.value > high.value {
        return Err(Error::MalformedInput(format!(
            "range lower bound {} exceeds upper bound {}",
            low.value, high.value
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    inclusion_criteria: Vec<Vec<Criterion>>,
    exclusion_criteria: Vec<Vec<Criterion>>,
}

impl StructuredQuery {
    /// Fails unless at least one inclusion clause holds a criterion.
    pub fn new(
        inclusion_criteria: Vec<Vec<Criterion>>,
        exclusion_criteria: Vec<Vec<Criterion>>,
    ) -> Result<Self> {
        if inclusion_criteria.iter().all(Vec::is_empty) {
            return Err(Error::MalformedInput(
                "inclusionCriteria must contain at least one non-empty clause".into(),
            ));
        }
        Ok(Self {
            inclusion_criteria,
            exclusion_criteria,
        })
    }

    pub fn inclusion_criteria(&self) -> &[Vec<Criterion>] {
        &self.inclusion_criteria
    }

    pub fn exclusion_criteria(&self) -> &[Vec<Criterion>] {
        &self.exclusion_criteria
    }

    pub fn has_exclusion(&self) -> bool {
        self.exclusion_criteria.iter().any(|clause| !clause.is_empty())
    }
}
