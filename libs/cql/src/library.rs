//! Library output
//!
//! ```text
//! library Retrieve version '1.0.0'
//! using FHIR version '4.0.0'
//! include FHIRHelpers version '4.0.0'
//!
//! codesystem loinc: 'http://loinc.org'
//!
//! context Unfiltered
//!
//! define ...
//!
//! context Patient
//!
//! define InInitialPopulation:
//!   ...
//! ```
//!
//! Empty sections are omitted entirely.

use crate::container::Container;
use crate::definition::{CodeSystemDefinition, ExpressionDefinition};
use crate::expression::{string_literal, Expression};
use crate::print::{Print, PrintContext};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Header lines of a printed library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LibraryHeader {
    pub name: String,
    pub version: String,
    pub fhir_version: String,
    pub fhir_helpers_version: String,
}

impl Default for LibraryHeader {
    fn default() -> Self {
        Self {
            name: "Retrieve".to_string(),
            version: "1.0.0".to_string(),
            fhir_version: "4.0.0".to_string(),
            fhir_helpers_version: "4.0.0".to_string(),
        }
    }
}

impl Print for LibraryHeader {
    fn print(&self, _ctx: PrintContext) -> String {
        format!(
            "library {} version {}\nusing FHIR version {}\ninclude FHIRHelpers version {}\n",
            self.name,
            string_literal(&self.version),
            string_literal(&self.fhir_version),
            string_literal(&self.fhir_helpers_version)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    header: LibraryHeader,
    code_systems: BTreeSet<CodeSystemDefinition>,
    unfiltered_definitions: Vec<ExpressionDefinition>,
    patient_definitions: Vec<ExpressionDefinition>,
}

impl Library {
    /// Builds a library whose last Patient-context definition is `name`, defined as the
    /// container's expression (even if that expression is a plain reference).
    pub fn from_container(container: Container<Expression>, name: &str, header: LibraryHeader) -> Self {
        let (code_systems, unfiltered_definitions, patient_definitions) =
            container.into_parts_with_definition(name);
        Self {
            header,
            code_systems,
            unfiltered_definitions,
            patient_definitions,
        }
    }

    pub fn header(&self) -> &LibraryHeader {
        &self.header
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

    /// Full library text.
    pub fn print(&self) -> String {
        let mut out = self.header.print(PrintContext::ZERO);
        if !self.code_systems.is_empty() {
            out.push('\n');
            for code_system in &self.code_systems {
                out.push_str(&code_system.print(PrintContext::ZERO));
                out.push('\n');
            }
        }
        if !self.unfiltered_definitions.is_empty() {
            out.push('\n');
            out.push_str(&print_context("Unfiltered", &self.unfiltered_definitions));
        }
        if !self.patient_definitions.is_empty() {
            out.push('\n');
            out.push_str(&self.print_patient_context());
        }
        out
    }

    /// Patient-context block only, for embedding into a larger library.
    pub fn print_patient_context(&self) -> String {
        if self.patient_definitions.is_empty() {
            return String::new();
        }
        print_context("Patient", &self.patient_definitions)
    }
}

fn print_context(name: &str, definitions: &[ExpressionDefinition]) -> String {
    let mut out = format!("context {name}\n");
    for definition in definitions {
        out.push('\n');
        out.push_str(&definition.print(PrintContext::ZERO));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identifier;

    const HEADER: &str = "library Retrieve version '1.0.0'\nusing FHIR version '4.0.0'\ninclude FHIRHelpers version '4.0.0'\n";

    #[test]
    fn empty_sections_are_omitted() {
        let library = Library::from_container(Container::of(Expression::TRUE), "InInitialPopulation", LibraryHeader::default());
        assert_eq!(
            library.print(),
            format!("{HEADER}\ncontext Patient\n\ndefine InInitialPopulation:\n  true\n")
        );
    }

    #[test]
    fn code_systems_are_sorted_by_alias() {
        let container = Container::of(Expression::TRUE)
            .with_code_system(CodeSystemDefinition::new("snomed", "http://snomed.info/sct"))
            .with_code_system(CodeSystemDefinition::new("loinc", "http://loinc.org"));
        let library = Library::from_container(container, "InInitialPopulation", LibraryHeader::default());
        assert!(library.print().starts_with(&format!(
            "{HEADER}\ncodesystem loinc: 'http://loinc.org'\ncodesystem snomed: 'http://snomed.info/sct'\n\ncontext Patient\n"
        )));
    }

    #[test]
    fn final_definition_is_emitted_for_plain_reference() {
        let container = Container::of(Expression::TRUE).move_to_patient_context("Criterion");
        let library = Library::from_container(container, "InInitialPopulation", LibraryHeader::default());
        assert_eq!(
            library.print_patient_context(),
            "context Patient\n\ndefine Criterion:\n  true\n\ndefine InInitialPopulation:\n  Criterion\n"
        );
    }

    #[test]
    fn unfiltered_block_precedes_patient_block() {
        let container = Container::of(Expression::identifier(Identifier::plain("x")))
            .flat_map(|_| Container::of(Expression::TRUE).move_to_unfiltered_context("Helper"));
        let library = Library::from_container(container, "InInitialPopulation", LibraryHeader::default());
        assert_eq!(
            library.print(),
            format!("{HEADER}\ncontext Unfiltered\n\ndefine Helper:\n  true\n\ncontext Patient\n\ndefine InInitialPopulation:\n  Helper\n")
        );
    }
}
