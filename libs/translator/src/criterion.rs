//! Criterion pipeline
//!
//! A criterion is expanded into the mapped codes it stands for. Each code yields one query over
//! the mapped resource type, narrowed by the criterion's value constraint and the mapping's
//! modifiers; the alternatives are OR-ed and hoisted into a `Criterion` definition.

use crate::age;
use crate::modifier::{Constraint, Modifier, Operand};
use sq2cql_cql::{CodeSelector, Container, Expression, Identifier, Query, Retrieve, SourceClause};
use sq2cql_model::{
    AttributeFilterKind, ContextualTermCode, Criterion, CriterionKind, Error, Mapping,
    MappingContext, Result,
};
use tracing::trace;

const PATIENT: &str = "Patient";
const MEDICATION_ADMINISTRATION: &str = "MedicationAdministration";

/// What a resource query evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    /// `exists(...)` of the matching resources
    Exists,
    /// The list of `'<ResourceType>/' + A.id` references of the matching resources
    Reference,
}

/// Translates a criterion into a container holding a reference to its hoisted definition.
pub fn translate(context: &MappingContext, criterion: &Criterion) -> Result<Container> {
    let alternatives = context
        .expand_concept(criterion.contextual_concept())?
        .iter()
        .map(|key| {
            trace!(code = %key, "Translating expanded code");
            let mapping = context.find_mapping(key)?;
            let modifiers = modifiers(criterion, mapping, key)?;
            if mapping.resource_type() == PATIENT {
                patient_condition(context, &modifiers)
            } else {
                resource_query(context, mapping, key, &modifiers, Projection::Exists)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Container::any_of(alternatives).move_to_patient_context("Criterion"))
}

/// Unfiltered definition holding the references of all resources matching `criteria`.
///
/// The definition is named after the contexts and codes of the criteria, so identical nested
/// criteria share one definition.
pub(crate) fn reference_helper(context: &MappingContext, criteria: &[Criterion]) -> Result<Container> {
    let mut union = Container::empty();
    for criterion in criteria {
        for key in context.expand_concept(criterion.contextual_concept())? {
            let mapping = context.find_mapping(&key)?;
            if mapping.resource_type() == PATIENT {
                return Err(Error::UnsupportedModifierShape(format!(
                    "cannot reference the Patient resource selected by {key}"
                )));
            }
            let modifiers = modifiers(criterion, mapping, &key)?;
            union = union.union(resource_query(
                context,
                mapping,
                &key,
                &modifiers,
                Projection::Reference,
            )?);
        }
    }
    Ok(union.move_to_unfiltered_context(&reference_helper_name(criteria)))
}

fn reference_helper_name(criteria: &[Criterion]) -> String {
    criteria
        .iter()
        .map(|criterion| {
            let concept = criterion.contextual_concept();
            std::iter::once(concept.context().code.as_str())
                .chain(concept.term_codes().iter().map(|c| c.code.as_str()))
                .collect::<Vec<_>>()
                .join("_")
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Modifiers in application order: value constraint, term code path, fixed criteria,
/// attribute filters, time restriction.
fn modifiers(criterion: &Criterion, mapping: &Mapping, key: &ContextualTermCode) -> Result<Vec<Modifier>> {
    let mut modifiers = Vec::new();
    modifiers.extend(value_modifier(criterion, mapping, key)?);

    if let Some(path) = mapping.term_code_path() {
        modifiers.push(Modifier::coding(path, vec![key.term_code.clone()])?);
    }

    for fixed in mapping.fixed_criteria() {
        modifiers.push(Modifier::coding(&fixed.path, fixed.values.clone())?);
    }

    for filter in criterion.attribute_filters() {
        let attribute = mapping.find_attribute(filter.attribute_code())?;
        let path = &attribute.path;
        modifiers.push(match filter.kind() {
            AttributeFilterKind::Concept { selected_concepts } => {
                Modifier::coding(path, selected_concepts.clone())?
            }
            AttributeFilterKind::Numeric { comparator, value } => Modifier::Numeric {
                operand: Operand::Path(path.path.clone()),
                comparator: *comparator,
                value: value.clone(),
            },
            AttributeFilterKind::Range { low, high } => Modifier::Range {
                operand: Operand::Path(path.path.clone()),
                low: low.clone(),
                high: high.clone(),
            },
            AttributeFilterKind::Reference { criteria } => {
                if attribute.reference_target_type.is_none() {
                    return Err(Error::UnsupportedModifierShape(format!(
                        "reference attribute {} of mapping {} has no target type",
                        attribute.key,
                        mapping.key()
                    )));
                }
                Modifier::Reference {
                    path: path.path.clone(),
                    criteria: criteria.clone(),
                }
            }
        });
    }

    if let Some(time_restriction) = criterion.time_restriction() {
        let path = mapping.time_restriction().ok_or_else(|| {
            Error::UnsupportedModifierShape(format!(
                "mapping {} has no time restriction path",
                mapping.key()
            ))
        })?;
        modifiers.push(Modifier::TimeRestriction {
            path: path.clone(),
            after: time_restriction.after(),
            before: time_restriction.before(),
        });
    }

    Ok(modifiers)
}

fn value_modifier(
    criterion: &Criterion,
    mapping: &Mapping,
    key: &ContextualTermCode,
) -> Result<Option<Modifier>> {
    let operand = || -> Result<Operand> {
        if age::is_age(&key.term_code) {
            let unit = match criterion.kind() {
                CriterionKind::Numeric { value, .. } => value.unit.as_deref(),
                CriterionKind::Range { low, .. } => low.unit.as_deref(),
                _ => None,
            };
            return Ok(Operand::Age(age::age_function(unit)?));
        }
        Ok(Operand::Path(value_path(mapping)?.path.clone()))
    };

    let modifier = match criterion.kind() {
        CriterionKind::Concept => return Ok(None),
        CriterionKind::Numeric { comparator, value } => Modifier::Numeric {
            operand: operand()?,
            comparator: *comparator,
            value: value.clone(),
        },
        CriterionKind::Range { low, high } => {
            if low.unit != high.unit {
                return Err(Error::MalformedInput(format!(
                    "range bounds of {key} have different units"
                )));
            }
            Modifier::Range {
                operand: operand()?,
                low: low.clone(),
                high: high.clone(),
            }
        }
        CriterionKind::ValueSet { selected_concepts } => {
            Modifier::coding(value_path(mapping)?, selected_concepts.clone())?
        }
        CriterionKind::Reference { criteria } => Modifier::Reference {
            path: value_path(mapping)?.path.clone(),
            criteria: criteria.clone(),
        },
    };
    Ok(Some(modifier))
}

fn value_path(mapping: &Mapping) -> Result<&sq2cql_model::PathMapping> {
    mapping.value().ok_or_else(|| {
        Error::UnsupportedModifierShape(format!(
            "mapping {} has no value path for a value filter",
            mapping.key()
        ))
    })
}

/// Conjunction of the modifier conditions on the `Patient` in context, `true` if unconstrained.
fn patient_condition(context: &MappingContext, modifiers: &[Modifier]) -> Result<Container> {
    let patient = Expression::identifier(Identifier::plain(PATIENT));
    let mut condition = Container::empty();
    for modifier in modifiers {
        let constraint = modifier.build(context, &patient)?;
        condition = condition.and(constraint.try_flat_map(|constraint| match constraint {
            Constraint::Where(expression) => Ok(Container::of(expression)),
            Constraint::With { .. } => Err(Error::UnsupportedModifierShape(
                "reference modifiers cannot constrain the Patient resource".into(),
            )),
        })?);
    }
    if condition.is_empty() {
        return Ok(Container::of(Expression::TRUE));
    }
    Ok(condition)
}

fn query_alias(resource_type: &str) -> Identifier {
    Identifier::plain(resource_type.get(..1).unwrap_or("R").to_uppercase())
}

fn resource_query(
    context: &MappingContext,
    mapping: &Mapping,
    key: &ContextualTermCode,
    modifiers: &[Modifier],
    projection: Projection,
) -> Result<Container> {
    let resource_type = mapping.resource_type();
    let alias = query_alias(resource_type);
    let alias_expression = Expression::identifier(alias.clone());

    let mut container = if resource_type == MEDICATION_ADMINISTRATION {
        medication_administration_source(context, mapping, alias)?
    } else {
        retrieve(context, mapping)?
            .map(|retrieve| Query::from_source(SourceClause::new(retrieve, alias)))
    };

    for modifier in modifiers {
        let constraint = modifier.build(context, &alias_expression)?;
        container = container.flat_map(|query| {
            if constraint.is_empty() {
                Container::of(query)
            } else {
                constraint.map(|constraint| constraint.apply(query))
            }
        });
    }

    Ok(container.map(|query| match projection {
        Projection::Exists if is_bare(&query) => Expression::exists(query.source.source),
        Projection::Exists => Expression::exists(Expression::query(query)),
        Projection::Reference => Expression::query(query.returning(Expression::concatenation(
            Expression::string(format!("{resource_type}/")),
            Expression::invocation(alias_expression, "id"),
        ))),
    }))
}

fn is_bare(query: &Query) -> bool {
    query.with_clauses.is_empty() && query.where_clause.is_none() && query.return_clause.is_none()
}

/// `[Type: Code 'c' from alias]`, or `[Type]` if codes are matched on a dedicated path.
fn retrieve(context: &MappingContext, mapping: &Mapping) -> Result<Container> {
    if mapping.term_code_path().is_some() {
        return Ok(Container::of(Retrieve::new(mapping.resource_type()).into()));
    }
    let code = mapping.primary_code();
    let code_system = context.find_code_system_definition(code)?;
    let selector = CodeSelector::new(code.code.as_str(), code_system.alias.as_str());
    Ok(
        Container::of(Retrieve::with_terminology(mapping.resource_type(), Expression::code(selector)).into())
            .with_code_system(code_system),
    )
}

/// Medication administrations refer to their medication, which carries the code.
///
/// The matching medications are collected once in an Unfiltered definition:
///
/// ```text
/// define "Medication_atc_B01AB01":
///   from [Medication: Code 'B01AB01' from atc] M
///     return 'Medication/' + M.id
/// ```
fn medication_administration_source(
    context: &MappingContext,
    mapping: &Mapping,
    alias: Identifier,
) -> Result<Container<Query>> {
    let code = mapping.primary_code();
    let code_system = context.find_code_system_definition(code)?;
    let name = format!("Medication_{}_{}", code_system.alias, code.code);

    let medication = SourceClause::new(
        Retrieve::with_terminology(
            "Medication",
            Expression::code(CodeSelector::new(code.code.as_str(), code_system.alias.as_str())),
        ),
        Identifier::plain("M"),
    );
    let reference = Expression::concatenation(
        Expression::string("Medication/"),
        Expression::invocation(medication.alias_expression(), "id"),
    );
    let helper = Container::of(Expression::query(Query::from_source(medication).returning(reference)))
        .with_code_system(code_system)
        .move_to_unfiltered_context(&name);

    let alias_expression = Expression::identifier(alias.clone());
    Ok(helper.map(|helper| {
        Query::from_source(SourceClause::new(Retrieve::new(MEDICATION_ADMINISTRATION), alias)).filter(
            Expression::is_in(
                Expression::invocation(alias_expression, "medication.reference"),
                helper,
            ),
        )
    }))
}
