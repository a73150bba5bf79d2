//! JSON binding
//!
//! Wire structures for Structured Queries, mapping tables, concept trees and code system
//! aliases. Polymorphic filters are decoded by their `type` tag and converted into the core
//! model with `TryFrom`, which enforces the model's invariants.

use crate::criterion::{AttributeFilter, Criterion, Quantity, StructuredQuery, TimeRestriction};
use crate::error::{Error, Result};
use crate::mapping::{AttributeMapping, Cardinality, FixedCriterion, Mapping, PathMapping, ValueType};
use crate::term_code::{ContextualConcept, ContextualTermCode, TermCode};
use crate::tree::{MappingTree, TermCodeNode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sq2cql_cql::Comparator;
use std::collections::BTreeMap;

// ============================================================================
// Structured Query
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQueryJson {
    #[serde(default)]
    pub version: Option<String>,
    pub inclusion_criteria: Vec<Vec<CriterionJson>>,
    #[serde(default)]
    pub exclusion_criteria: Option<Vec<Vec<CriterionJson>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionJson {
    pub context: TermCode,
    #[serde(default)]
    pub term_codes: Vec<TermCode>,
    /// Older documents carry a single code.
    #[serde(default)]
    pub term_code: Option<TermCode>,
    #[serde(default)]
    pub value_filter: Option<ValueFilterJson>,
    #[serde(default)]
    pub attribute_filters: Vec<AttributeFilterJson>,
    #[serde(default)]
    pub time_restriction: Option<TimeRestrictionJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ValueFilterJson {
    QuantityComparator(QuantityComparatorJson),
    QuantityRange(QuantityRangeJson),
    #[serde(alias = "coding")]
    Concept(ConceptFilterJson),
    Reference(ReferenceFilterJson),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitJson {
    pub code: String,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuantityComparatorJson {
    pub comparator: String,
    pub value: Decimal,
    #[serde(default)]
    pub unit: Option<UnitJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRangeJson {
    pub min_value: Decimal,
    pub max_value: Decimal,
    #[serde(default)]
    pub unit: Option<UnitJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptFilterJson {
    pub selected_concepts: Vec<TermCode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceFilterJson {
    pub criteria: Vec<CriterionJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFilterJson {
    pub attribute_code: TermCode,
    #[serde(flatten)]
    pub filter: ValueFilterJson,
}

/// Dates may carry a time part, which is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRestrictionJson {
    #[serde(default)]
    pub after_date: Option<String>,
    #[serde(default)]
    pub before_date: Option<String>,
}

fn quantity(value: Decimal, unit: Option<UnitJson>) -> Quantity {
    Quantity::new(value, unit.map(|unit| unit.code))
}

fn parse_comparator(comparator: &str) -> Result<Comparator> {
    comparator
        .parse()
        .map_err(|e: sq2cql_cql::UnknownComparator| Error::MalformedInput(e.to_string()))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| Error::MalformedInput(format!("invalid date '{value}': {e}")))
}

fn criteria(criteria: Vec<CriterionJson>) -> Result<Vec<Criterion>> {
    criteria.into_iter().map(Criterion::try_from).collect()
}

fn clauses(clauses: Vec<Vec<CriterionJson>>) -> Result<Vec<Vec<Criterion>>> {
    clauses.into_iter().map(criteria).collect()
}

impl TryFrom<StructuredQueryJson> for StructuredQuery {
    type Error = Error;

    fn try_from(json: StructuredQueryJson) -> Result<Self> {
        StructuredQuery::new(
            clauses(json.inclusion_criteria)?,
            clauses(json.exclusion_criteria.unwrap_or_default())?,
        )
    }
}

impl TryFrom<CriterionJson> for Criterion {
    type Error = Error;

    fn try_from(json: CriterionJson) -> Result<Self> {
        let mut term_codes = json.term_codes;
        if term_codes.is_empty() {
            term_codes.extend(json.term_code);
        }
        let concept = ContextualConcept::new(json.context, term_codes)?;

        let mut criterion = match json.value_filter {
            None => Criterion::concept(concept),
            Some(ValueFilterJson::QuantityComparator(filter)) => Criterion::numeric(
                concept,
                parse_comparator(&filter.comparator)?,
                quantity(filter.value, filter.unit),
            ),
            Some(ValueFilterJson::QuantityRange(filter)) => {
                let unit = filter.unit.map(|unit| unit.code);
                Criterion::range(
                    concept,
                    Quantity::new(filter.min_value, unit.clone()),
                    Quantity::new(filter.max_value, unit),
                )?
            }
            Some(ValueFilterJson::Concept(filter)) => {
                Criterion::value_set(concept, filter.selected_concepts)?
            }
            Some(ValueFilterJson::Reference(filter)) => {
                Criterion::reference(concept, criteria(filter.criteria)?)?
            }
        };

        for filter in json.attribute_filters {
            criterion = criterion.with_attribute_filter(filter.try_into()?);
        }
        if let Some(time_restriction) = json.time_restriction {
            criterion = criterion.with_time_restriction(time_restriction.try_into()?);
        }
        Ok(criterion)
    }
}

impl TryFrom<AttributeFilterJson> for AttributeFilter {
    type Error = Error;

    fn try_from(json: AttributeFilterJson) -> Result<Self> {
        let code = json.attribute_code;
        match json.filter {
            ValueFilterJson::QuantityComparator(filter) => Ok(AttributeFilter::numeric(
                code,
                parse_comparator(&filter.comparator)?,
                quantity(filter.value, filter.unit),
            )),
            ValueFilterJson::QuantityRange(filter) => {
                let unit = filter.unit.map(|unit| unit.code);
                AttributeFilter::range(
                    code,
                    Quantity::new(filter.min_value, unit.clone()),
                    Quantity::new(filter.max_value, unit),
                )
            }
            ValueFilterJson::Concept(filter) => {
                AttributeFilter::concept(code, filter.selected_concepts)
            }
            ValueFilterJson::Reference(filter) => {
                AttributeFilter::reference(code, criteria(filter.criteria)?)
            }
        }
    }
}

impl TryFrom<TimeRestrictionJson> for TimeRestriction {
    type Error = Error;

    fn try_from(json: TimeRestrictionJson) -> Result<Self> {
        TimeRestriction::new(
            json.after_date.as_deref().map(parse_date).transpose()?,
            json.before_date.as_deref().map(parse_date).transpose()?,
        )
    }
}

// ============================================================================
// Mappings
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathJson {
    pub fhir_path: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl From<PathJson> for PathMapping {
    fn from(json: PathJson) -> Self {
        PathMapping::new(
            json.fhir_path,
            json.types.iter().map(|t| ValueType::from(t.as_str())).collect(),
            json.cardinality,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixedCriterionJson {
    #[serde(flatten)]
    pub path: PathJson,
    pub value: Vec<TermCode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeNames {
    One(String),
    Many(Vec<String>),
}

impl TypeNames {
    fn into_value_types(self) -> Vec<ValueType> {
        match self {
            TypeNames::One(name) => vec![ValueType::from(name.as_str())],
            TypeNames::Many(names) => names.iter().map(|n| ValueType::from(n.as_str())).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMappingJson {
    pub attribute_key: TermCode,
    pub attribute_fhir_path: String,
    pub attribute_type: TypeNames,
    #[serde(default)]
    pub attribute_cardinality: Cardinality,
    #[serde(default)]
    pub reference_target_type: Option<String>,
}

impl From<AttributeMappingJson> for AttributeMapping {
    fn from(json: AttributeMappingJson) -> Self {
        AttributeMapping {
            key: json.attribute_key,
            path: PathMapping::new(
                json.attribute_fhir_path,
                json.attribute_type.into_value_types(),
                json.attribute_cardinality,
            ),
            reference_target_type: json.reference_target_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingJson {
    pub context: TermCode,
    pub key: TermCode,
    pub resource_type: String,
    #[serde(default)]
    pub value: Option<PathJson>,
    #[serde(default)]
    pub term_code: Option<PathJson>,
    #[serde(default)]
    pub fixed_criteria: Vec<FixedCriterionJson>,
    #[serde(default)]
    pub attributes: Vec<AttributeMappingJson>,
    #[serde(default)]
    pub time_restriction: Option<PathJson>,
    #[serde(default)]
    pub primary_code: Option<TermCode>,
}

impl From<MappingJson> for Mapping {
    fn from(json: MappingJson) -> Self {
        let mut mapping = Mapping::new(
            ContextualTermCode::new(json.context, json.key),
            json.resource_type,
        );
        if let Some(value) = json.value {
            mapping = mapping.with_value(value.into());
        }
        if let Some(path) = json.term_code {
            mapping = mapping.with_term_code_path(path.into());
        }
        for fixed in json.fixed_criteria {
            mapping = mapping.with_fixed_criterion(FixedCriterion {
                path: fixed.path.into(),
                values: fixed.value,
            });
        }
        for attribute in json.attributes {
            mapping = mapping.with_attribute(attribute.into());
        }
        if let Some(path) = json.time_restriction {
            mapping = mapping.with_time_restriction(path.into());
        }
        if let Some(code) = json.primary_code {
            mapping = mapping.with_primary_code(code);
        }
        mapping
    }
}

// ============================================================================
// Concept tree
// ============================================================================

/// Tree node; children without a context inherit their parent's.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermCodeNodeJson {
    #[serde(default)]
    pub context: Option<TermCode>,
    pub term_code: TermCode,
    #[serde(default)]
    pub children: Vec<TermCodeNodeJson>,
}

impl TermCodeNodeJson {
    fn into_node(self, parent_context: Option<&TermCode>) -> Result<TermCodeNode> {
        let context = match (self.context, parent_context) {
            (Some(context), _) => context,
            (None, Some(parent)) => parent.clone(),
            (None, None) => {
                return Err(Error::MalformedInput(format!(
                    "tree node {} has no context",
                    self.term_code
                )))
            }
        };
        let children = self
            .children
            .into_iter()
            .map(|child| child.into_node(Some(&context)))
            .collect::<Result<Vec<_>>>()?;
        Ok(TermCodeNode::new(context, self.term_code, children))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeJson {
    Roots(Vec<TermCodeNodeJson>),
    Root(TermCodeNodeJson),
}

// ============================================================================
// Entry points
// ============================================================================

pub fn parse_structured_query(json: &str) -> Result<StructuredQuery> {
    let query: StructuredQueryJson = serde_json::from_str(json)?;
    query.try_into()
}

pub fn parse_mappings(json: &str) -> Result<Vec<Mapping>> {
    let mappings: Vec<MappingJson> = serde_json::from_str(json)?;
    Ok(mappings.into_iter().map(Mapping::from).collect())
}

pub fn parse_mapping_tree(json: &str) -> Result<MappingTree> {
    let roots = match serde_json::from_str(json)? {
        TreeJson::Roots(roots) => roots,
        TreeJson::Root(root) => vec![root],
    };
    let nodes = roots
        .into_iter()
        .map(|root| root.into_node(None))
        .collect::<Result<Vec<_>>>()?;
    Ok(MappingTree::new(nodes))
}

/// Code system aliases as an object from system URL to alias.
pub fn parse_code_system_aliases(json: &str) -> Result<Vec<(String, String)>> {
    let aliases: BTreeMap<String, String> = serde_json::from_str(json)?;
    Ok(aliases.into_iter().collect())
}
