//! Comparison, refinement and composition of template models.
//!
//! Layering:
//!
//! - `closure` — the injected refinement oracle and its usual backing
//!   store, a precomputed transitive closure of curie pairs
//! - `matching` — bipartite matching over unordered concept lists
//! - `predicates` — template-level equality and refinement
//! - `comparison` — the multi-model comparison graph and similarity scores
//! - `compose` — merging models guided by a comparison
//!
//! Everything here is synchronous and pure apart from the oracle, which
//! the caller supplies and which may be arbitrarily expensive.

pub mod closure;
pub mod comparison;
pub mod compose;
pub mod matching;
pub mod predicates;

pub use closure::{RefinementClosure, RefinementFunc};
pub use comparison::{
    ComparisonError, InterModelEdge, InterModelRole, IntraModelEdge, ModelComparisonGraphdata,
    NodeRef, SimilarityScore, TemplateModelComparison,
};
pub use compose::{annotation_composition, compose, compose_two_models, CompositionError};
pub use matching::{match_concepts, MatchPredicate};
pub use predicates::{template_refinement_of, templates_equal};
