//! Structured Query model and mapping context
//!
//! The input side of the translator: criteria as selected in a feasibility query, the mapping
//! table describing how each concept is represented in FHIR, the concept tree used to expand
//! selections into their descendants, and the code system aliases used in generated CQL.
//!
//! All inputs can be decoded from their JSON representations with the functions in [`json`].

pub mod context;
pub mod criterion;
pub mod error;
pub mod json;
pub mod mapping;
pub mod term_code;
pub mod tree;

pub use context::{MappingContext, MappingContextBuilder};
pub use criterion::{
    AttributeFilter, AttributeFilterKind, Criterion, CriterionKind, Quantity, StructuredQuery,
    TimeRestriction,
};
pub use error::{Error, Result};
pub use mapping::{AttributeMapping, Cardinality, FixedCriterion, Mapping, PathMapping, ValueType};
pub use term_code::{ContextualConcept, ContextualTermCode, TermCode};
pub use tree::{MappingTree, TermCodeNode};
