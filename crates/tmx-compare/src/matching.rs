//! Bipartite matching over unordered concept lists.
//!
//! Controller lists have no meaningful order, so list-level equality and
//! refinement reduce to a matching problem: pair up concepts under the
//! pairwise predicate and check that every concept on the *other* side is
//! covered. Saturating only the other side makes one check serve both
//! cases — equality (equal cardinalities, perfect matching) and refinement
//! (the refined side may carry extra controllers).
//!
//! Any maximum matching is acceptable; only the saturation count matters.

use petgraph::algo::matching::maximum_matching;
use petgraph::graph::UnGraph;
use tmx_metamodel::{Concept, IdentifierConfig};

/// Pairwise predicate selection for [`match_concepts`].
pub enum MatchPredicate<'a> {
    /// `is_equal_to` with the given context flag.
    Equality,
    /// `refinement_of` through the given oracle.
    Refinement(&'a dyn Fn(&str, &str) -> bool),
}

/// True if every concept in `other_concepts` can be matched one-to-one
/// against a distinct compatible concept in `self_concepts`.
pub fn match_concepts(
    self_concepts: &[Concept],
    other_concepts: &[Concept],
    predicate: MatchPredicate<'_>,
    with_context: bool,
    config: &IdentifierConfig,
) -> bool {
    if other_concepts.is_empty() {
        return true;
    }

    let mut graph: UnGraph<(), ()> = UnGraph::new_undirected();
    let self_nodes: Vec<_> = self_concepts.iter().map(|_| graph.add_node(())).collect();
    let other_nodes: Vec<_> = other_concepts.iter().map(|_| graph.add_node(())).collect();

    for (i, self_concept) in self_concepts.iter().enumerate() {
        for (j, other_concept) in other_concepts.iter().enumerate() {
            let compatible = match &predicate {
                MatchPredicate::Equality => {
                    self_concept.is_equal_to(other_concept, with_context, config)
                }
                MatchPredicate::Refinement(oracle) => {
                    self_concept.refinement_of(other_concept, *oracle, with_context, config)
                }
            };
            if compatible {
                graph.add_edge(self_nodes[i], other_nodes[j], ());
            }
        }
    }

    let matching = maximum_matching(&graph);
    matching.edges().count() == other_concepts.len()
}
