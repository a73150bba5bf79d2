//! Concept hierarchy used to expand selected codes into their descendants

use crate::term_code::{ContextualTermCode, TermCode};
use std::collections::{HashMap, HashSet};

/// Node of a concept tree as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCodeNode {
    pub context: TermCode,
    pub term_code: TermCode,
    pub children: Vec<TermCodeNode>,
}

impl TermCodeNode {
    pub fn leaf(context: TermCode, term_code: TermCode) -> Self {
        Self {
            context,
            term_code,
            children: Vec::new(),
        }
    }

    pub fn new(context: TermCode, term_code: TermCode, children: Vec<TermCodeNode>) -> Self {
        Self {
            context,
            term_code,
            children,
        }
    }

    fn key(&self) -> ContextualTermCode {
        ContextualTermCode::new(self.context.clone(), self.term_code.clone())
    }
}

/// Adjacency map of the concept hierarchy.
///
/// A code listed under several parents is stored once, its children merged. Cycles in the
/// input are tolerated.
#[derive(Debug, Clone, Default)]
pub struct MappingTree {
    children: HashMap<ContextualTermCode, Vec<ContextualTermCode>>,
}

impl MappingTree {
    pub fn new(roots: impl IntoIterator<Item = TermCodeNode>) -> Self {
        let mut tree = Self::default();
        let mut pending: Vec<TermCodeNode> = roots.into_iter().collect();
        while let Some(node) = pending.pop() {
            let key = node.key();
            let entry = tree.children.entry(key).or_default();
            for child in &node.children {
                let child_key = child.key();
                if !entry.contains(&child_key) {
                    entry.push(child_key);
                }
            }
            pending.extend(node.children);
        }
        tree
    }

    pub fn contains(&self, code: &ContextualTermCode) -> bool {
        self.children.contains_key(code)
    }

    /// The code itself followed by every leaf below it, in depth-first preorder.
    ///
    /// Empty if the code is not part of the tree.
    pub fn expand(&self, code: &ContextualTermCode) -> Vec<ContextualTermCode> {
        if !self.contains(code) {
            return Vec::new();
        }

        let mut expanded = vec![code.clone()];
        let mut visited: HashSet<&ContextualTermCode> = HashSet::from([code]);
        let mut stack: Vec<&ContextualTermCode> = self.children_of(code).iter().rev().collect();

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let children = self.children_of(node);
            if children.is_empty() {
                expanded.push(node.clone());
            } else {
                stack.extend(children.iter().rev());
            }
        }
        expanded
    }

    fn children_of(&self, code: &ContextualTermCode) -> &[ContextualTermCode] {
        self.children.get(code).map(Vec::as_slice).unwrap_or(&[])
    }
}
