//! Mapping context
//!
//! Everything the translator looks up while turning criteria into CQL: the mapping table, the
//! concept tree, and the code system aliases. Immutable once built.

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::term_code::{ContextualConcept, ContextualTermCode, TermCode};
use crate::tree::{MappingTree, TermCodeNode};
use sq2cql_cql::CodeSystemDefinition;
use std::collections::{HashMap, HashSet};
use tracing::{trace, warn};

#[derive(Debug, Clone, Default)]
pub struct MappingContext {
    mappings: HashMap<ContextualTermCode, Mapping>,
    tree: MappingTree,
    code_system_aliases: HashMap<String, String>,
}

impl MappingContext {
    pub fn builder() -> MappingContextBuilder {
        MappingContextBuilder::default()
    }

    pub fn of(
        mappings: impl IntoIterator<Item = Mapping>,
        tree: MappingTree,
        code_system_aliases: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self::builder()
            .mappings(mappings)
            .tree(tree)
            .code_system_aliases(code_system_aliases)
            .build()
    }

    pub fn find_mapping(&self, key: &ContextualTermCode) -> Result<&Mapping> {
        self.mappings
            .get(key)
            .ok_or_else(|| Error::MappingNotFound(key.clone()))
    }

    /// Alias definition for the system of `term_code`.
    pub fn find_code_system_definition(&self, term_code: &TermCode) -> Result<CodeSystemDefinition> {
        self.code_system_aliases
            .get(&term_code.system)
            .map(|alias| CodeSystemDefinition::new(alias.clone(), term_code.system.clone()))
            .ok_or_else(|| Error::CodeSystemAliasNotFound {
                system: term_code.system.clone(),
                term_code: term_code.clone(),
            })
    }

    /// Expands a concept into the mapped contextual term codes it stands for.
    ///
    /// Each code contributes itself and its leaves in the concept tree. Codes absent from the
    /// tree contribute nothing unless no code expands at all, in which case the concept's own
    /// codes are used. Only codes with a mapping are kept.
    pub fn expand_concept(&self, concept: &ContextualConcept) -> Result<Vec<ContextualTermCode>> {
        let mut expanded: Vec<ContextualTermCode> = concept
            .contextual_term_codes()
            .flat_map(|code| self.tree.expand(&code))
            .collect();
        if expanded.is_empty() {
            expanded = concept.contextual_term_codes().collect();
        }

        let mut seen = HashSet::new();
        let mapped: Vec<ContextualTermCode> = expanded
            .into_iter()
            .filter(|code| seen.insert(code.clone()))
            .filter(|code| {
                let mapped = self.mappings.contains_key(code);
                if !mapped {
                    trace!(code = %code, "Dropping expanded code without mapping");
                }
                mapped
            })
            .collect();

        if mapped.is_empty() {
            return Err(Error::ConceptExpansionEmpty(concept.clone()));
        }
        Ok(mapped)
    }
}

#[derive(Debug, Default)]
pub struct MappingContextBuilder {
    mappings: HashMap<ContextualTermCode, Mapping>,
    tree: MappingTree,
    code_system_aliases: HashMap<String, String>,
}

impl MappingContextBuilder {
    /// Adds mappings; a repeated key replaces the earlier entry.
    pub fn mappings(mut self, mappings: impl IntoIterator<Item = Mapping>) -> Self {
        for mapping in mappings {
            let key = mapping.key().clone();
            if self.mappings.insert(key.clone(), mapping).is_some() {
                warn!(key = %key, "Duplicate mapping, keeping the last one");
            }
        }
        self
    }

    pub fn tree(mut self, tree: MappingTree) -> Self {
        self.tree = tree;
        self
    }

    pub fn tree_nodes(self, roots: impl IntoIterator<Item = TermCodeNode>) -> Self {
        self.tree(MappingTree::new(roots))
    }

    /// Adds `(system url, alias)` entries.
    pub fn code_system_aliases(
        mut self,
        aliases: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.code_system_aliases.extend(aliases);
        self
    }

    pub fn code_system_alias(mut self, system: impl Into<String>, alias: impl Into<String>) -> Self {
        self.code_system_aliases.insert(system.into(), alias.into());
        self
    }

    pub fn build(self) -> MappingContext {
        MappingContext {
            mappings: self.mappings,
            tree: self.tree,
            code_system_aliases: self.code_system_aliases,
        }
    }
}
