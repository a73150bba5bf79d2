//! CQL model for generated libraries
//!
//! This crate holds the two lowest layers of the Structured Query translator:
//!
//! 1. **Expression model & printer**: an immutable tree of the CQL constructs the translator
//!    emits, printed with precedence-correct parenthesization and stable indentation.
//! 2. **Container algebra**: [`Container`] bundles an expression with the code systems and
//!    named definitions it needs; the combinators merge containers while keeping definition
//!    names unique.
//!
//! A finished container is turned into a [`Library`], whose printed text is the output of a
//! translation.
//!
//! ```
//! use sq2cql_cql::{CodeSelector, Container, Expression, Library, LibraryHeader, Retrieve};
//!
//! let retrieve = Retrieve::with_terminology("Condition", Expression::code(CodeSelector::new("C71", "icd10")));
//! let container = Container::of(Expression::exists(retrieve.into()))
//!     .move_to_patient_context("Criterion");
//! let library = Library::from_container(container, "InInitialPopulation", LibraryHeader::default());
//! assert!(library.print().contains("exists([Condition: Code 'C71' from icd10])"));
//! ```

pub mod container;
pub mod definition;
pub mod expression;
pub mod identifier;
pub mod library;
pub mod print;
pub mod query;

pub use container::{combiner, Container};
pub use definition::{CodeSystemDefinition, ExpressionDefinition};
pub use expression::{CodeSelector, Comparator, Expression, MembershipOperator, UnknownComparator};
pub use identifier::{Identifier, IncrementIdentifiers, Increments};
pub use library::{Library, LibraryHeader};
pub use print::{Print, PrintContext};
pub use query::{Query, Retrieve, SourceClause, WithClause};
