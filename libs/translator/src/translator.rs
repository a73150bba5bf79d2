//! Structured Query translator
//!
//! Inclusion criteria are in conjunctive normal form and exclusion criteria in disjunctive
//! normal form. Without exclusion criteria the reduced inclusion becomes `InInitialPopulation`
//! directly; otherwise both sides are hoisted into `Inclusion` and `Exclusion` and the
//! population is `Inclusion and not Exclusion`.

use crate::criterion;
use sq2cql_cql::{Container, Library, LibraryHeader};
use sq2cql_model::{MappingContext, Result, StructuredQuery};
use tracing::debug;

pub const IN_INITIAL_POPULATION: &str = "InInitialPopulation";

#[derive(Debug, Clone)]
pub struct Translator {
    context: MappingContext,
    header: LibraryHeader,
}

impl Translator {
    pub fn new(context: MappingContext) -> Self {
        Self {
            context,
            header: LibraryHeader::default(),
        }
    }

    pub fn with_header(mut self, header: LibraryHeader) -> Self {
        self.header = header;
        self
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    pub fn to_cql(&self, query: &StructuredQuery) -> Result<Library> {
        let span = tracing::debug_span!(
            "translate",
            inclusion_clauses = query.inclusion_criteria().len(),
            exclusion_clauses = query.exclusion_criteria().len()
        );
        let _enter = span.enter();

        let inclusion = self.translate_clauses(query.inclusion_criteria())?;
        let exclusion = self.translate_clauses(query.exclusion_criteria())?;
        let library = assemble(inclusion, exclusion, self.header.clone());

        debug!(
            code_systems = library.code_systems().len(),
            unfiltered_definitions = library.unfiltered_definitions().len(),
            patient_definitions = library.patient_definitions().len(),
            "Translated structured query"
        );
        Ok(library)
    }

    fn translate_clauses(&self, clauses: &[Vec<sq2cql_model::Criterion>]) -> Result<Vec<Vec<Container>>> {
        clauses
            .iter()
            .map(|clause| {
                clause
                    .iter()
                    .map(|c| criterion::translate(&self.context, c))
                    .collect()
            })
            .collect()
    }
}

/// Reduces translated clauses into a library.
///
/// Inclusion clauses are AND-ed with the criteria of each clause OR-ed; exclusion clauses are
/// OR-ed with the criteria of each clause AND-ed. Empty clauses are ignored.
pub fn assemble(
    inclusion: Vec<Vec<Container>>,
    exclusion: Vec<Vec<Container>>,
    header: LibraryHeader,
) -> Library {
    let inclusion = Container::all_of(inclusion.into_iter().map(Container::any_of));
    let exclusion = Container::any_of(exclusion.into_iter().map(Container::all_of));

    let population = if exclusion.is_empty() {
        inclusion
    } else {
        inclusion
            .move_to_patient_context("Inclusion")
            .and_not(exclusion.move_to_patient_context("Exclusion"))
    };
    Library::from_container(population, IN_INITIAL_POPULATION, header)
}
