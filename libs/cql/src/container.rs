//! Expression containers
//!
//! A [`Container`] bundles an expression with every top-level definition it depends on:
//! code systems, helper queries in the `Unfiltered` context and named criteria in the
//! `Patient` context. Containers built independently are merged with the combinators below,
//! which rename colliding suffixed identifiers before concatenating definitions.
//!
//! Merging deduplicates Patient definitions by final display name (first occurrence wins).
//! Two definitions ending up with the same name are assumed to have the same body; this is
//! not checked.

use crate::definition::{CodeSystemDefinition, ExpressionDefinition};
use crate::expression::Expression;
use crate::identifier::{IncrementIdentifiers, Increments};
use crate::Identifier;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::convert::Infallible;

#[derive(Debug, Clone, PartialEq)]
pub struct Container<T = Expression> {
    expression: Option<T>,
    code_systems: BTreeSet<CodeSystemDefinition>,
    unfiltered_definitions: Vec<ExpressionDefinition>,
    patient_definitions: Vec<ExpressionDefinition>,
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Container<T> {
    /// Container without expression; identity of every combinator.
    pub fn empty() -> Self {
        Self {
            expression: None,
            code_systems: BTreeSet::new(),
            unfiltered_definitions: Vec::new(),
            patient_definitions: Vec::new(),
        }
    }

    pub fn of(expression: T) -> Self {
        Self {
            expression: Some(expression),
            ..Self::empty()
        }
    }

    pub fn with_code_system(mut self, code_system: CodeSystemDefinition) -> Self {
        self.code_systems.insert(code_system);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.expression.is_none()
    }

    pub fn expression(&self) -> Option<&T> {
        self.expression.as_ref()
    }

    pub fn code_systems(&self) -> &BTreeSet<CodeSystemDefinition> {
        &self.code_systems
    }

    pub fn unfiltered_definitions(&self) -> &[ExpressionDefinition] {
        &self.unfiltered_definitions
    }

    pub fn patient_definitions(&self) -> &[ExpressionDefinition] {
        &self.patient_definitions
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Container<U> {
        Container {
            expression: self.expression.map(f),
            code_systems: self.code_systems,
            unfiltered_definitions: self.unfiltered_definitions,
            patient_definitions: self.patient_definitions,
        }
    }

    /// Maps the expression to another container and merges the auxiliary definitions of both.
    ///
    /// The returned container must not define Patient-context names of its own; use the
    /// combinators to merge containers carrying independent criteria.
    pub fn flat_map<U>(self, f: impl FnOnce(T) -> Container<U>) -> Container<U> {
        match self.try_flat_map(|expression| Ok::<_, Infallible>(f(expression))) {
            Ok(container) => container,
            Err(never) => match never {},
        }
    }

    /// Fallible [`Container::flat_map`].
    pub fn try_flat_map<U, E>(
        self,
        f: impl FnOnce(T) -> Result<Container<U>, E>,
    ) -> Result<Container<U>, E> {
        let Container {
            expression,
            code_systems,
            unfiltered_definitions,
            patient_definitions,
        } = self;
        let Some(expression) = expression else {
            return Ok(Container {
                expression: None,
                code_systems,
                unfiltered_definitions,
                patient_definitions,
            });
        };
        let inner = f(expression)?;
        Ok(Container {
            expression: inner.expression,
            code_systems: code_systems.into_iter().chain(inner.code_systems).collect(),
            unfiltered_definitions: merge_unfiltered(
                unfiltered_definitions,
                inner.unfiltered_definitions,
            ),
            patient_definitions: dedup_by_name(
                patient_definitions
                    .into_iter()
                    .chain(inner.patient_definitions),
            ),
        })
    }
}

impl<T: IncrementIdentifiers> Container<T> {
    /// Merges two containers, combining their expressions with `op`.
    pub fn combine(self, other: Self, op: impl FnOnce(T, T) -> T) -> Self {
        let (left, right) = match (self.expression, other.expression) {
            (None, right) => {
                return Container {
                    expression: right,
                    ..other
                }
            }
            (left, None) => {
                return Container {
                    expression: left,
                    ..self
                }
            }
            (Some(left), Some(right)) => (left, right),
        };

        let (left_increments, right_increments) =
            increments(&self.patient_definitions, &other.patient_definitions);

        let left_definitions = self
            .patient_definitions
            .into_iter()
            .map(|d| d.increment_identifiers(&left_increments));
        let right_definitions = other
            .patient_definitions
            .into_iter()
            .map(|d| d.increment_identifiers(&right_increments));

        Container {
            expression: Some(op(
                left.increment_identifiers(&left_increments),
                right.increment_identifiers(&right_increments),
            )),
            code_systems: self.code_systems.into_iter().chain(other.code_systems).collect(),
            unfiltered_definitions: merge_unfiltered(
                self.unfiltered_definitions,
                other.unfiltered_definitions,
            ),
            patient_definitions: dedup_by_name(left_definitions.chain(right_definitions)),
        }
    }
}

/// Builds a binary combinator from an expression operator.
pub fn combiner<T: IncrementIdentifiers>(
    op: fn(T, T) -> T,
) -> impl Fn(Container<T>, Container<T>) -> Container<T> {
    move |left, right| left.combine(right, op)
}

impl Container<Expression> {
    pub fn and(self, other: Self) -> Self {
        self.combine(other, Expression::and)
    }

    pub fn or(self, other: Self) -> Self {
        self.combine(other, Expression::or)
    }

    /// `self and not other`
    pub fn and_not(self, other: Self) -> Self {
        self.combine(other, Expression::and_not)
    }

    pub fn union(self, other: Self) -> Self {
        self.combine(other, Expression::union)
    }

    /// Folds containers with AND; the empty container is the result of an empty iterator.
    pub fn all_of(containers: impl IntoIterator<Item = Self>) -> Self {
        containers.into_iter().fold(Self::empty(), Self::and)
    }

    /// Folds containers with OR; the empty container is the result of an empty iterator.
    pub fn any_of(containers: impl IntoIterator<Item = Self>) -> Self {
        containers.into_iter().fold(Self::empty(), Self::or)
    }

    /// Hoists the expression into a suffixed Patient-context definition named `name`.
    ///
    /// The suffix is the next free one for `name` within this container.
    pub fn move_to_patient_context(self, name: &str) -> Self {
        let suffix = self
            .patient_definitions
            .iter()
            .filter_map(|d| d.name.suffix_parts())
            .filter(|(prefix, _)| *prefix == name)
            .map(|(_, suffix)| suffix + 1)
            .max()
            .unwrap_or(0);
        self.hoist(Identifier::suffixed(name, suffix), Context::Patient)
    }

    /// Hoists the expression into a Patient-context definition named exactly `name`.
    ///
    /// The caller guarantees that `name` is unique across the whole library.
    pub fn move_to_patient_context_with_unique_name(self, name: &str) -> Self {
        self.hoist(Identifier::plain(name), Context::Patient)
    }

    /// Hoists the expression into an Unfiltered-context definition named exactly `name`.
    pub fn move_to_unfiltered_context(self, name: &str) -> Self {
        self.hoist(Identifier::plain(name), Context::Unfiltered)
    }

    fn hoist(mut self, identifier: Identifier, context: Context) -> Self {
        match self.expression.take() {
            None => self,
            Some(expression @ Expression::Identifier(_)) => {
                self.expression = Some(expression);
                self
            }
            Some(expression) => {
                let definition = ExpressionDefinition::new(identifier.clone(), expression);
                match context {
                    Context::Patient => {
                        self.patient_definitions =
                            dedup_by_name(self.patient_definitions.into_iter().chain([definition]))
                    }
                    Context::Unfiltered => {
                        self.unfiltered_definitions =
                            merge_unfiltered(self.unfiltered_definitions, vec![definition])
                    }
                }
                self.expression = Some(Expression::identifier(identifier));
                self
            }
        }
    }

    /// Appends the final Patient-context definition `name` unconditionally.
    pub(crate) fn into_parts_with_definition(
        self,
        name: &str,
    ) -> (
        BTreeSet<CodeSystemDefinition>,
        Vec<ExpressionDefinition>,
        Vec<ExpressionDefinition>,
    ) {
        let mut patient_definitions = self.patient_definitions;
        if let Some(expression) = self.expression {
            patient_definitions.push(ExpressionDefinition::new(Identifier::plain(name), expression));
        }
        (
            self.code_systems,
            self.unfiltered_definitions,
            dedup_by_name(patient_definitions.into_iter()),
        )
    }
}

enum Context {
    Patient,
    Unfiltered,
}

/// Per-prefix (min, max) suffix over the names of `definitions`.
fn suffix_ranges(definitions: &[ExpressionDefinition]) -> HashMap<&str, (u32, u32)> {
    let mut ranges: HashMap<&str, (u32, u32)> = HashMap::new();
    for (prefix, suffix) in definitions.iter().filter_map(|d| d.name.suffix_parts()) {
        ranges
            .entry(prefix)
            .and_modify(|(min, max)| {
                *min = (*min).min(suffix);
                *max = (*max).max(suffix);
            })
            .or_insert((suffix, suffix));
    }
    ranges
}

/// Suffix increments for the left and right side of a merge.
fn increments(
    left: &[ExpressionDefinition],
    right: &[ExpressionDefinition],
) -> (Increments, Increments) {
    let left_ranges = suffix_ranges(left);
    let right_ranges = suffix_ranges(right);
    let mut left_increments = Increments::new();
    let mut right_increments = Increments::new();

    for (prefix, (_, left_max)) in &left_ranges {
        let Some((right_min, right_max)) = right_ranges.get(prefix) else {
            continue;
        };
        if *left_max == 0 && *right_max == 0 {
            left_increments.insert(prefix.to_string(), 1);
            right_increments.insert(prefix.to_string(), 2);
        } else if *left_max > 0 && *right_min <= *left_max {
            right_increments.insert(prefix.to_string(), left_max + 1 - right_min);
        } else if *left_max == 0 && *right_min == 0 {
            right_increments.insert(prefix.to_string(), 1);
        }
    }
    (left_increments, right_increments)
}

fn dedup_by_name(definitions: impl Iterator<Item = ExpressionDefinition>) -> Vec<ExpressionDefinition> {
    let mut seen = HashSet::new();
    definitions
        .filter(|d| seen.insert(d.name.display_name()))
        .collect()
}

fn merge_unfiltered(
    left: Vec<ExpressionDefinition>,
    right: Vec<ExpressionDefinition>,
) -> Vec<ExpressionDefinition> {
    dedup_by_name(left.into_iter().chain(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{Print, PrintContext};

    fn criterion(name: &str) -> Container {
        Container::of(Expression::exists(Expression::identifier(Identifier::plain(name))))
            .move_to_patient_context("Criterion")
    }

    fn names(container: &Container) -> Vec<String> {
        container
            .patient_definitions()
            .iter()
            .map(|d| d.name.display_name())
            .collect()
    }

    #[test]
    fn hoisting_replaces_expression_with_reference() {
        let container = criterion("A");
        assert_eq!(
            container.expression(),
            Some(&Expression::identifier(Identifier::suffixed("Criterion", 0)))
        );
        assert_eq!(names(&container), vec!["Criterion"]);
    }

    #[test]
    fn hoisting_an_identifier_is_a_no_op() {
        let container = criterion("A").move_to_patient_context("Other");
        assert_eq!(names(&container), vec!["Criterion"]);
    }

    #[test]
    fn hoisting_empty_container_is_a_no_op() {
        assert!(Container::<Expression>::empty()
            .move_to_patient_context("Criterion")
            .is_empty());
    }

    #[test]
    fn two_zero_suffixes_become_one_and_two() {
        let combined = criterion("A").or(criterion("B"));
        assert_eq!(names(&combined), vec!["Criterion 1", "Criterion 2"]);
        assert_eq!(
            combined.expression().map(|e| e.print(PrintContext::ZERO)),
            Some("\"Criterion 1\" or\n\"Criterion 2\"".to_string())
        );
    }

    #[test]
    fn third_container_does_not_collide() {
        let combined = criterion("A").and(criterion("B")).and(criterion("C"));
        assert_eq!(names(&combined), vec!["Criterion 1", "Criterion 2", "Criterion 3"]);

        let combined = criterion("C").and(criterion("A").and(criterion("B")));
        assert_eq!(names(&combined), vec!["Criterion", "Criterion 1", "Criterion 2"]);
    }

    #[test]
    fn merged_groups_shift_above_left_maximum() {
        let left = criterion("A").or(criterion("B"));
        let right = criterion("C").or(criterion("D"));
        let combined = left.and(right);
        assert_eq!(
            names(&combined),
            vec!["Criterion 1", "Criterion 2", "Criterion 3", "Criterion 4"]
        );
        let bodies: Vec<String> = combined
            .patient_definitions()
            .iter()
            .map(|d| d.expression.print(PrintContext::ZERO))
            .collect();
        assert_eq!(bodies, vec!["exists(A)", "exists(B)", "exists(C)", "exists(D)"]);
    }

    #[test]
    fn unique_names_are_deduplicated() {
        let a = Container::of(Expression::TRUE).move_to_patient_context_with_unique_name("Same");
        let b = Container::of(Expression::FALSE).move_to_patient_context_with_unique_name("Same");
        let combined = a.and(b);
        assert_eq!(names(&combined), vec!["Same"]);
        assert_eq!(
            combined.patient_definitions()[0].expression,
            Expression::TRUE
        );
    }

    #[test]
    fn final_definition_is_appended_after_criteria() {
        let (_, unfiltered, patient) =
            criterion("A").or(criterion("B")).into_parts_with_definition("InInitialPopulation");
        assert!(unfiltered.is_empty());
        let names: Vec<String> = patient.iter().map(|d| d.name.display_name()).collect();
        assert_eq!(names, vec!["Criterion 1", "Criterion 2", "InInitialPopulation"]);
    }

    #[test]
    fn final_definition_keeps_first_of_same_name() {
        let container = Container::of(Expression::TRUE)
            .move_to_patient_context_with_unique_name("InInitialPopulation");
        let (_, _, patient) = container.into_parts_with_definition("InInitialPopulation");
        assert_eq!(patient.len(), 1);
        assert_eq!(patient[0].expression, Expression::TRUE);
    }

    #[test]
    fn unfiltered_definitions_and_code_systems_are_unioned() {
        let a = Container::of(Expression::TRUE)
            .move_to_unfiltered_context("Helper")
            .with_code_system(CodeSystemDefinition::new("loinc", "http://loinc.org"));
        let b = Container::of(Expression::TRUE)
            .move_to_unfiltered_context("Helper")
            .with_code_system(CodeSystemDefinition::new("loinc", "http://loinc.org"));
        let combined = a.union(b);
        assert_eq!(combined.unfiltered_definitions().len(), 1);
        assert_eq!(combined.code_systems().len(), 1);
    }

    #[test]
    fn flat_map_keeps_auxiliary_definitions() {
        let container = Container::of(Expression::TRUE)
            .with_code_system(CodeSystemDefinition::new("icd10", "http://hl7.org/fhir/sid/icd-10"))
            .flat_map(|e| {
                Container::of(Expression::not(e))
                    .with_code_system(CodeSystemDefinition::new("loinc", "http://loinc.org"))
            });
        assert_eq!(container.code_systems().len(), 2);
        assert_eq!(container.expression(), Some(&Expression::not(Expression::TRUE)));
    }
}
