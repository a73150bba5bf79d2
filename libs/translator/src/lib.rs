//! Structured Query to CQL translator
//!
//! Translates a [`StructuredQuery`] into a CQL [`Library`] whose `InInitialPopulation`
//! definition selects the patients matching the query.
//!
//! ```
//! use sq2cql::{Translator, MappingContext, Mapping, ContextualTermCode, TermCode, StructuredQuery, Criterion, ContextualConcept};
//!
//! let context_code = TermCode::new("fdpg.mii.cds", "Diagnose", "Diagnose");
//! let c71 = TermCode::new("http://fhir.de/CodeSystem/bfarm/icd-10-gm", "C71", "Malignant neoplasm of brain");
//! let mapping_context = MappingContext::builder()
//!     .mappings([Mapping::new(ContextualTermCode::new(context_code.clone(), c71.clone()), "Condition")])
//!     .code_system_alias("http://fhir.de/CodeSystem/bfarm/icd-10-gm", "icd10")
//!     .build();
//!
//! let concept = ContextualConcept::new(context_code, vec![c71])?;
//! let query = StructuredQuery::new(vec![vec![Criterion::concept(concept)]], vec![])?;
//! let library = Translator::new(mapping_context).to_cql(&query)?;
//!
//! assert!(library.print().contains("exists([Condition: Code 'C71' from icd10])"));
//! # Ok::<(), sq2cql::Error>(())
//! ```

pub mod age;
mod criterion;
pub mod modifier;
pub mod translator;

pub use modifier::{Constraint, Modifier, Operand};
pub use translator::{assemble, Translator, IN_INITIAL_POPULATION};

pub use sq2cql_cql::{Comparator, Container, Expression, Library, LibraryHeader, Print, PrintContext};
pub use sq2cql_model::{
    json, AttributeFilter, AttributeMapping, Cardinality, ContextualConcept, ContextualTermCode,
    Criterion, Error, FixedCriterion, Mapping, MappingContext, MappingTree, PathMapping, Quantity,
    Result, StructuredQuery, TermCode, TermCodeNode, TimeRestriction, ValueType,
};
