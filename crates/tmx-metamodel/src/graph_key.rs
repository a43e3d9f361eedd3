//! Stable graph keys for concepts and templates.
//!
//! Model graphs and the cross-model comparison graph both need a hashable,
//! reproducible identity for every node *before* integer indices are
//! assigned. The key is a flat sequence of strings:
//!
//! - concept: `[name, "identity", curie, ctx_key_1, ctx_val_1, ...]`
//!   (context pairs sorted by key)
//! - template: `[type_name, <concept key parts in declared role order>...]`

use crate::concept::{Concept, IdentifierConfig};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A flat, hashable node identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphKey(pub Vec<String>);

impl GraphKey {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

/// Key for a concept node: name, grounding and sorted context pairs.
pub fn get_concept_graph_key(concept: &Concept, config: &IdentifierConfig) -> GraphKey {
    let mut parts = vec![
        concept.name.clone(),
        "identity".to_string(),
        concept.get_curie_str(config),
    ];
    let mut context: Vec<(&String, &String)> = concept.context.iter().collect();
    context.sort();
    for (k, v) in context {
        parts.push(k.clone());
        parts.push(v.clone());
    }
    GraphKey(parts)
}

/// Key for a template node: variant name followed by the graph-key parts of
/// its concepts in declared role order.
pub fn get_template_graph_key(template: &Template, config: &IdentifierConfig) -> GraphKey {
    let mut parts = vec![template.type_name().to_string()];
    for concept in template.get_concepts() {
        parts.extend(get_concept_graph_key(concept, config).0);
    }
    GraphKey(parts)
}
