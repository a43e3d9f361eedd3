//! TMX metamodel: template models for compartmental/mechanistic modeling.
//!
//! A model is a set of typed process templates (conversions, productions,
//! degradations) over semantically grounded concepts, plus parameters,
//! initial conditions, observables and annotations. This crate defines the
//! data model and its derived identities; the comparison/composition engine
//! lives in `tmx-compare`.
//!
//! Layering:
//!
//! - `concept` — concepts, parameters, initials; curie derivation and the
//!   ground equality/refinement predicates
//! - `expr` — symbolic rate-law expressions (string-serialized)
//! - `template` — the closed set of template variants and their role tables
//! - `model` — the `TemplateModel` aggregate and its node-link graph
//! - `graph_key` — stable node identities shared with the comparison engine
//! - `io` — JSON file load/store

pub mod concept;
pub mod expr;
pub mod graph_key;
pub mod io;
pub mod model;
pub mod template;

pub use concept::{
    context_refinement, Concept, ConceptKey, Curie, IdentifierConfig, Initial, Parameter,
};
pub use expr::{parse_rate_expr, ExprParseError, RateExpr};
pub use graph_key::{get_concept_graph_key, get_template_graph_key, GraphKey};
pub use io::{model_from_json_file, model_to_json_file, ModelIoError};
pub use model::{
    Annotations, Author, ModelGraph, ModelGraphEdge, ModelGraphNode, ModelGraphNodeKind,
    Observable, TemplateModel, Time, Units,
};
pub use template::{
    ConceptRole, ControlledConversion, ControlledProduction, GroupedControlledConversion,
    GroupedControlledProduction, NaturalConversion, NaturalDegradation, NaturalProduction,
    Provenance, RoleValue, Template, TemplateKey,
};
