//! Cross-model comparison graphs.
//!
//! [`TemplateModelComparison`] ingests two or more template models and
//! builds one unified graph:
//!
//! - one node per distinct template and per distinct concept of every
//!   model (duplicate graph keys within a model collapse, first seen wins)
//! - **intra-model** role edges: controller/subject into the template
//!   node, template node out to the outcome
//! - **inter-model** edges between nodes of different models: `is_equal`
//!   (checked first, short-circuits) or directed `refinement_of`
//!
//! Node identifiers in the result are `(model index, node index)` pairs;
//! node indices restart at 0 for every model, templates numbered before
//! concepts, in first-discovery order. That ordering is part of the
//! contract — downstream composition and tests rely on it being
//! reproducible.

use crate::closure::RefinementFunc;
use crate::predicates::{template_refinement_of, templates_equal};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tmx_metamodel::{
    get_concept_graph_key, get_template_graph_key, Concept, ConceptRole, GraphKey,
    IdentifierConfig, Template, TemplateModel,
};

#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("need at least two models to make a comparison, got {0}")]
    TooFewModels(usize),
}

/// A `(model index, node index)` node identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeRef {
    pub model: usize,
    pub node: usize,
}

/// Relation carried by an inter-model edge. Equality edges are undirected
/// in intent; refinement edges point from the more specific node to the
/// more general one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterModelRole {
    IsEqual,
    RefinementOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterModelEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    pub role: InterModelRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntraModelEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    pub role: ConceptRole,
}

/// Pairwise similarity between two compared models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub models: (usize, usize),
    pub score: f64,
}

/// The comparison output: all models, their renumbered template/concept
/// nodes, and the intra/inter-model edge lists. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelComparisonGraphdata {
    pub template_models: BTreeMap<usize, TemplateModel>,
    pub template_nodes: BTreeMap<usize, BTreeMap<usize, Template>>,
    pub concept_nodes: BTreeMap<usize, BTreeMap<usize, Concept>>,
    pub inter_model_edges: Vec<InterModelEdge>,
    pub intra_model_edges: Vec<IntraModelEdge>,
}

impl ModelComparisonGraphdata {
    /// Build the comparison graph for the given models. Convenience for
    /// [`TemplateModelComparison::new`].
    pub fn from_template_models(
        template_models: &[TemplateModel],
        refinement_func: RefinementFunc<'_>,
        config: &IdentifierConfig,
    ) -> Result<Self, ComparisonError> {
        Ok(TemplateModelComparison::new(template_models, refinement_func, config)?.model_comparison)
    }

    fn concept_node_refs(&self, model: usize) -> Vec<NodeRef> {
        self.concept_nodes
            .get(&model)
            .map(|nodes| {
                nodes
                    .keys()
                    .map(|&node| NodeRef { model, node })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Concept-level similarity between two compared models.
    ///
    /// The model with more concept nodes acts as the reference side. Every
    /// reference concept contributes 1 for an equality edge into the other
    /// model, 0.5 for a refinement edge (in either direction), 0 otherwise;
    /// the score is the normalized sum in `[0, 1]`.
    pub fn get_similarity_score(&self, model1_id: usize, model2_id: usize) -> f64 {
        let nodes1 = self.concept_node_refs(model1_id);
        let nodes2 = self.concept_node_refs(model2_id);

        // The larger side becomes the reference model.
        let (reference_id, other_id, reference_nodes) = if nodes2.len() > nodes1.len() {
            (model2_id, model1_id, nodes2)
        } else {
            (model1_id, model2_id, nodes1)
        };
        if reference_nodes.is_empty() {
            return 0.0;
        }

        // Index inter-model edges between the pair, oriented reference ->
        // other regardless of stored direction.
        let mut equal_nodes: HashSet<NodeRef> = HashSet::new();
        let mut refined_nodes: HashSet<NodeRef> = HashSet::new();
        for edge in &self.inter_model_edges {
            let reference_side = if edge.source.model == reference_id
                && edge.target.model == other_id
            {
                edge.source
            } else if edge.source.model == other_id && edge.target.model == reference_id {
                edge.target
            } else {
                continue;
            };
            match edge.role {
                InterModelRole::IsEqual => {
                    equal_nodes.insert(reference_side);
                }
                InterModelRole::RefinementOf => {
                    refined_nodes.insert(reference_side);
                }
            }
        }

        let mut score = 0.0;
        for node in &reference_nodes {
            if equal_nodes.contains(node) {
                score += 1.0;
            } else if refined_nodes.contains(node) {
                score += 0.5;
            }
        }
        score / reference_nodes.len() as f64
    }

    /// Similarity scores for every unordered pair of compared models.
    pub fn get_similarity_scores(&self) -> Vec<SimilarityScore> {
        let ids: Vec<usize> = self.template_models.keys().copied().collect();
        let mut scores = Vec::new();
        for (pos, &i) in ids.iter().enumerate() {
            for &j in &ids[pos + 1..] {
                scores.push(SimilarityScore {
                    models: (i, j),
                    score: self.get_similarity_score(i, j),
                });
            }
        }
        scores
    }

    /// Number of template nodes in a model; concept node indices start
    /// after them.
    pub fn template_node_count(&self, model: usize) -> usize {
        self.template_nodes
            .get(&model)
            .map(|nodes| nodes.len())
            .unwrap_or(0)
    }
}

// ============================================================================
// Graph construction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Template,
    Concept,
}

/// Pre-renumbering node handle: kind-local index within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreNode {
    model: usize,
    kind: NodeKind,
    index: usize,
}

/// Compares template models into a graph-friendly structure.
pub struct TemplateModelComparison {
    pub model_comparison: ModelComparisonGraphdata,
}

struct ComparisonBuilder<'a> {
    refinement_func: RefinementFunc<'a>,
    config: &'a IdentifierConfig,
    // Per-model registries in first-discovery order.
    template_nodes: BTreeMap<usize, IndexMap<GraphKey, Template>>,
    concept_nodes: BTreeMap<usize, IndexMap<GraphKey, Concept>>,
    intra_model_edges: Vec<(PreNode, PreNode, ConceptRole)>,
    inter_model_edges: Vec<(PreNode, PreNode, InterModelRole)>,
}

impl<'a> ComparisonBuilder<'a> {
    fn new(refinement_func: RefinementFunc<'a>, config: &'a IdentifierConfig) -> Self {
        Self {
            refinement_func,
            config,
            template_nodes: BTreeMap::new(),
            concept_nodes: BTreeMap::new(),
            intra_model_edges: Vec::new(),
            inter_model_edges: Vec::new(),
        }
    }

    fn intern_template(&mut self, model: usize, template: &Template) -> PreNode {
        let key = get_template_graph_key(template, self.config);
        let registry = self.template_nodes.entry(model).or_default();
        let index = match registry.get_index_of(&key) {
            Some(index) => index,
            None => {
                registry.insert(key, template.clone());
                registry.len() - 1
            }
        };
        PreNode {
            model,
            kind: NodeKind::Template,
            index,
        }
    }

    fn intern_concept(&mut self, model: usize, concept: &Concept) -> PreNode {
        let key = get_concept_graph_key(concept, self.config);
        let registry = self.concept_nodes.entry(model).or_default();
        let index = match registry.get_index_of(&key) {
            Some(index) => index,
            None => {
                registry.insert(key, concept.clone());
                registry.len() - 1
            }
        };
        PreNode {
            model,
            kind: NodeKind::Concept,
            index,
        }
    }

    /// Register one model's templates and concepts, recording the role
    /// edges between them.
    fn add_template_model(&mut self, model: usize, template_model: &TemplateModel) {
        for template in &template_model.templates {
            let template_node = self.intern_template(model, template);
            for (role, value) in template.concepts_by_role() {
                for concept in value.iter() {
                    let concept_node = self.intern_concept(model, concept);
                    let edge = match role {
                        ConceptRole::Outcome => (template_node, concept_node, role),
                        ConceptRole::Subject | ConceptRole::Controller => {
                            (concept_node, template_node, role)
                        }
                    };
                    self.intra_model_edges.push(edge);
                }
            }
        }
    }

    /// Add at most one inter-model edge for a node pair: equality wins and
    /// short-circuits the refinement checks.
    fn add_template_edges(&mut self) {
        let models: Vec<usize> = self.template_nodes.keys().copied().collect();
        for (pos, &m1) in models.iter().enumerate() {
            for &m2 in &models[pos + 1..] {
                for (i, t1) in self.template_nodes[&m1].values().enumerate() {
                    for (j, t2) in self.template_nodes[&m2].values().enumerate() {
                        let a = PreNode {
                            model: m1,
                            kind: NodeKind::Template,
                            index: i,
                        };
                        let b = PreNode {
                            model: m2,
                            kind: NodeKind::Template,
                            index: j,
                        };
                        if templates_equal(t1, t2, true, self.config) {
                            self.inter_model_edges.push((a, b, InterModelRole::IsEqual));
                        } else if template_refinement_of(
                            t1,
                            t2,
                            self.refinement_func,
                            true,
                            self.config,
                        ) {
                            self.inter_model_edges
                                .push((a, b, InterModelRole::RefinementOf));
                        } else if template_refinement_of(
                            t2,
                            t1,
                            self.refinement_func,
                            true,
                            self.config,
                        ) {
                            self.inter_model_edges
                                .push((b, a, InterModelRole::RefinementOf));
                        }
                    }
                }
            }
        }
    }

    fn add_concept_edges(&mut self) {
        let models: Vec<usize> = self.concept_nodes.keys().copied().collect();
        for (pos, &m1) in models.iter().enumerate() {
            for &m2 in &models[pos + 1..] {
                for (i, c1) in self.concept_nodes[&m1].values().enumerate() {
                    for (j, c2) in self.concept_nodes[&m2].values().enumerate() {
                        let a = PreNode {
                            model: m1,
                            kind: NodeKind::Concept,
                            index: i,
                        };
                        let b = PreNode {
                            model: m2,
                            kind: NodeKind::Concept,
                            index: j,
                        };
                        if c1.is_equal_to(c2, true, self.config) {
                            self.inter_model_edges.push((a, b, InterModelRole::IsEqual));
                        } else if c1.refinement_of(c2, self.refinement_func, true, self.config) {
                            self.inter_model_edges
                                .push((a, b, InterModelRole::RefinementOf));
                        } else if c2.refinement_of(c1, self.refinement_func, true, self.config) {
                            self.inter_model_edges
                                .push((b, a, InterModelRole::RefinementOf));
                        }
                    }
                }
            }
        }
    }

    /// Final node identifier: per-model indices restart at 0, templates
    /// numbered before concepts, both in first-discovery order.
    fn resolve(&self, node: PreNode) -> NodeRef {
        let node_index = match node.kind {
            NodeKind::Template => node.index,
            NodeKind::Concept => {
                let template_count = self
                    .template_nodes
                    .get(&node.model)
                    .map(|r| r.len())
                    .unwrap_or(0);
                template_count + node.index
            }
        };
        NodeRef {
            model: node.model,
            node: node_index,
        }
    }

    fn finish(self, template_models: BTreeMap<usize, TemplateModel>) -> ModelComparisonGraphdata {
        let mut template_nodes: BTreeMap<usize, BTreeMap<usize, Template>> = BTreeMap::new();
        for (&model, registry) in &self.template_nodes {
            let out = template_nodes.entry(model).or_default();
            for (index, template) in registry.values().enumerate() {
                out.insert(index, template.clone());
            }
        }
        let mut concept_nodes: BTreeMap<usize, BTreeMap<usize, Concept>> = BTreeMap::new();
        for (&model, registry) in &self.concept_nodes {
            let offset = self
                .template_nodes
                .get(&model)
                .map(|r| r.len())
                .unwrap_or(0);
            let out = concept_nodes.entry(model).or_default();
            for (index, concept) in registry.values().enumerate() {
                out.insert(offset + index, concept.clone());
            }
        }
        let inter_model_edges = self
            .inter_model_edges
            .iter()
            .map(|&(source, target, role)| InterModelEdge {
                source: self.resolve(source),
                target: self.resolve(target),
                role,
            })
            .collect();
        let intra_model_edges = self
            .intra_model_edges
            .iter()
            .map(|&(source, target, role)| IntraModelEdge {
                source: self.resolve(source),
                target: self.resolve(target),
                role,
            })
            .collect();
        ModelComparisonGraphdata {
            template_models,
            template_nodes,
            concept_nodes,
            inter_model_edges,
            intra_model_edges,
        }
    }
}

impl TemplateModelComparison {
    /// Compare the given models (at least two) into a unified graph.
    ///
    /// The oracle decides ontological child-of relations between curies;
    /// callers needing performance should back it with a precomputed
    /// closure, since it is consulted O(n^2) times over node pairs.
    pub fn new(
        template_models: &[TemplateModel],
        refinement_func: RefinementFunc<'_>,
        config: &IdentifierConfig,
    ) -> Result<Self, ComparisonError> {
        if template_models.len() < 2 {
            return Err(ComparisonError::TooFewModels(template_models.len()));
        }
        let mut builder = ComparisonBuilder::new(refinement_func, config);
        for (model, template_model) in template_models.iter().enumerate() {
            builder.add_template_model(model, template_model);
        }
        builder.add_template_edges();
        builder.add_concept_edges();
        let models: BTreeMap<usize, TemplateModel> = template_models
            .iter()
            .cloned()
            .enumerate()
            .collect();
        Ok(TemplateModelComparison {
            model_comparison: builder.finish(models),
        })
    }
}
