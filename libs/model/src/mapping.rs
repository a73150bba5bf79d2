//! Mappings from contextual term codes to FHIR resources
//!
//! A [`Mapping`] tells the translator which resource type a criterion selects, where the
//! criterion's value lives, which fixed constraints always apply, and where each attribute and
//! the clinically relevant time can be found.

use crate::error::{Error, Result};
use crate::term_code::{ContextualTermCode, TermCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// FHIR type of the element a path points to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Code,
    Coding,
    CodeableConcept,
    Quantity,
    Reference,
    DateTime,
    Period,
    Other(String),
}

impl ValueType {
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Code => "code",
            ValueType::Coding => "Coding",
            ValueType::CodeableConcept => "CodeableConcept",
            ValueType::Quantity => "Quantity",
            ValueType::Reference => "Reference",
            ValueType::DateTime => "dateTime",
            ValueType::Period => "Period",
            ValueType::Other(name) => name,
        }
    }
}

impl From<&str> for ValueType {
    fn from(name: &str) -> Self {
        match name {
            "code" => ValueType::Code,
            "Coding" => ValueType::Coding,
            "CodeableConcept" => ValueType::CodeableConcept,
            "Quantity" => ValueType::Quantity,
            "Reference" => ValueType::Reference,
            "dateTime" => ValueType::DateTime,
            "Period" => ValueType::Period,
            other => ValueType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    Many,
}

/// A FHIR path with the types and cardinality of the element it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub path: String,
    pub types: Vec<ValueType>,
    pub cardinality: Cardinality,
}

impl PathMapping {
    pub fn new(path: impl Into<String>, types: Vec<ValueType>, cardinality: Cardinality) -> Self {
        Self {
            path: path.into(),
            types,
            cardinality,
        }
    }

    pub fn single(path: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(path, vec![value_type], Cardinality::Single)
    }

    pub fn has_type(&self, value_type: &ValueType) -> bool {
        self.types.contains(value_type)
    }

    /// The only declared type; several or none is an unsupported shape.
    pub fn single_type(&self) -> Result<&ValueType> {
        match self.types.as_slice() {
            [value_type] => Ok(value_type),
            [] => Err(Error::UnsupportedModifierShape(format!(
                "path `{}` declares no type",
                self.path
            ))),
            types => Err(Error::UnsupportedModifierShape(format!(
                "path `{}` declares multiple types: {}",
                self.path,
                types
                    .iter()
                    .map(ValueType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Constraint that always applies to the resources of a mapping, e.g. `status = 'final'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedCriterion {
    pub path: PathMapping,
    pub values: Vec<TermCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    pub key: TermCode,
    pub path: PathMapping,
    /// Resource type the attribute refers to, for `Reference` attributes.
    pub reference_target_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    key: ContextualTermCode,
    resource_type: String,
    value: Option<PathMapping>,
    term_code_path: Option<PathMapping>,
    fixed_criteria: Vec<FixedCriterion>,
    attributes: HashMap<TermCode, AttributeMapping>,
    time_restriction: Option<PathMapping>,
    primary_code: Option<TermCode>,
}

impl Mapping {
    pub fn new(key: ContextualTermCode, resource_type: impl Into<String>) -> Self {
        Self {
            key,
            resource_type: resource_type.into(),
            value: None,
            term_code_path: None,
            fixed_criteria: Vec::new(),
            attributes: HashMap::new(),
            time_restriction: None,
            primary_code: None,
        }
    }

    pub fn with_value(mut self, value: PathMapping) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_term_code_path(mut self, path: PathMapping) -> Self {
        self.term_code_path = Some(path);
        self
    }

    pub fn with_fixed_criterion(mut self, criterion: FixedCriterion) -> Self {
        self.fixed_criteria.push(criterion);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMapping) -> Self {
        self.attributes.insert(attribute.key.clone(), attribute);
        self
    }

    pub fn with_time_restriction(mut self, path: PathMapping) -> Self {
        self.time_restriction = Some(path);
        self
    }

    pub fn with_primary_code(mut self, code: TermCode) -> Self {
        self.primary_code = Some(code);
        self
    }

    pub fn key(&self) -> &ContextualTermCode {
        &self.key
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn value(&self) -> Option<&PathMapping> {
        self.value.as_ref()
    }

    pub fn term_code_path(&self) -> Option<&PathMapping> {
        self.term_code_path.as_ref()
    }

    pub fn fixed_criteria(&self) -> &[FixedCriterion] {
        &self.fixed_criteria
    }

    pub fn time_restriction(&self) -> Option<&PathMapping> {
        self.time_restriction.as_ref()
    }

    /// Code used in the retrieve; the key's term code unless overridden.
    pub fn primary_code(&self) -> &TermCode {
        self.primary_code.as_ref().unwrap_or(&self.key.term_code)
    }

    pub fn find_attribute(&self, attribute_code: &TermCode) -> Result<&AttributeMapping> {
        self.attributes
            .get(attribute_code)
            .ok_or_else(|| Error::AttributeMappingNotFound {
                key: self.key.clone(),
                attribute: attribute_code.clone(),
            })
    }
}
