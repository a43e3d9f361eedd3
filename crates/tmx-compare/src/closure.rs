//! Refinement oracle backed by a precomputed transitive closure.
//!
//! The comparison engine never fetches ontology data itself: the oracle is
//! always injected by the caller. The typical backing store is a set of
//! `(child_curie, parent_curie)` pairs exported from a knowledge graph;
//! membership is then a pure O(1) lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The refinement oracle signature: `(child_curie, parent_curie) -> bool`.
pub type RefinementFunc<'a> = &'a dyn Fn(&str, &str) -> bool;

/// A precomputed transitive closure over ontology curies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefinementClosure {
    transitive_closure: HashSet<(String, String)>,
}

impl RefinementClosure {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            transitive_closure: pairs
                .into_iter()
                .map(|(c, p)| (c.into(), p.into()))
                .collect(),
        }
    }

    /// True if `child_curie` is a transitive ontological child of
    /// `parent_curie`.
    pub fn is_ontological_child(&self, child_curie: &str, parent_curie: &str) -> bool {
        self.transitive_closure
            .contains(&(child_curie.to_string(), parent_curie.to_string()))
    }

    pub fn len(&self) -> usize {
        self.transitive_closure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitive_closure.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_directional() {
        let rc = RefinementClosure::new([("doid:0080314", "bfo:0000016")]);
        assert!(rc.is_ontological_child("doid:0080314", "bfo:0000016"));
        assert!(!rc.is_ontological_child("bfo:0000016", "doid:0080314"));
        assert!(!rc.is_ontological_child("doid:0080314", "doid:0080314"));
    }
}
