//! The template model: the aggregate of templates, parameters, initials,
//! observables and annotations.
//!
//! Construction is incremental and value-oriented: `add_template`,
//! `add_transition` and `extend` return a *new* model with deep-copied
//! maps; nothing aliases the receiver's containers. Soft inconsistencies
//! (rate-law parameters missing from the parameter map, initials that point
//! at concepts no template mentions) are tolerated and only logged.

use crate::concept::{Concept, ConceptKey, IdentifierConfig, Initial, Parameter};
use crate::expr::RateExpr;
use crate::graph_key::{get_concept_graph_key, get_template_graph_key};
use crate::template::{ConceptRole, NaturalConversion, RoleValue, Template};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// A named observable quantity with a symbolic expression over model
/// symbols (concept names and parameters).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observable {
    pub name: String,
    pub expression: RateExpr,
}

/// Units attached to the model time, expressed symbolically (`day`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Units {
    pub expression: RateExpr,
}

/// The independent time variable of the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Time {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
}

/// A model author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
}

/// Descriptive metadata carried alongside a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pathogens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scale: Option<String>,
}

/// A template model: templates plus parameter, initial-condition and
/// observable maps, with optional annotations and time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateModel {
    /// The processes making up the model.
    pub templates: Vec<Template>,
    /// Parameter values keyed by how the parameter appears in rate laws.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,
    /// Initial conditions keyed by the concept name they apply to.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub initials: IndexMap<String, Initial>,
    /// Observables keyed by name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub observables: IndexMap<String, Observable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Time>,
}

impl TemplateModel {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            ..Default::default()
        }
    }

    /// The free symbols of `rate_law` that are parameters of this model.
    pub fn get_parameters_from_rate_law(&self, rate_law: &RateExpr) -> BTreeSet<String> {
        rate_law
            .free_symbols()
            .into_iter()
            .filter(|s| self.parameters.contains_key(s))
            .collect()
    }

    /// Parameter names a template's rate law draws from this model.
    pub fn template_parameter_names(&self, template: &Template) -> BTreeSet<String> {
        match template.rate_law() {
            Some(law) => self.get_parameters_from_rate_law(law),
            None => BTreeSet::new(),
        }
    }

    /// Set parameter values, creating plain parameters for unknown names.
    pub fn update_parameters(&mut self, values: &IndexMap<String, f64>) {
        for (name, value) in values {
            match self.parameters.get_mut(name) {
                Some(p) => p.value = *value,
                None => {
                    self.parameters
                        .insert(name.clone(), Parameter::new(name.clone(), *value));
                }
            }
        }
    }

    /// Return a new model with one more template, optionally merging in
    /// parameters and initials. The receiver's maps are deep-copied, never
    /// aliased.
    pub fn add_template(
        &self,
        template: Template,
        parameter_mapping: Option<&IndexMap<String, Parameter>>,
        initial_mapping: Option<&IndexMap<String, Initial>>,
    ) -> TemplateModel {
        let mut model = self.clone();
        model.templates.push(template);
        if let Some(params) = parameter_mapping {
            for (k, v) in params {
                model.parameters.insert(k.clone(), v.clone());
            }
        }
        if let Some(initials) = initial_mapping {
            for (k, v) in initials {
                model.initials.insert(k.clone(), v.clone());
            }
        }
        model
    }

    /// Add a natural conversion between two concepts, assuming mass-action
    /// kinetics with a single parameter when one is given.
    pub fn add_transition(
        &self,
        subject_concept: Concept,
        outcome_concept: Concept,
        parameter: Option<Parameter>,
    ) -> TemplateModel {
        let mut template = Template::NaturalConversion(NaturalConversion {
            subject: subject_concept,
            outcome: outcome_concept,
            rate_law: None,
            provenance: vec![],
        });
        let parameter_mapping = parameter.map(|p| {
            template.set_mass_action_rate_law(p.name(), false);
            let mut mapping = IndexMap::new();
            mapping.insert(p.name().to_string(), p);
            mapping
        });
        self.add_template(template, parameter_mapping.as_ref(), None)
    }

    /// Extend this model with every template of another model.
    pub fn extend(
        &self,
        other: &TemplateModel,
        parameter_mapping: Option<&IndexMap<String, Parameter>>,
        initial_mapping: Option<&IndexMap<String, Initial>>,
    ) -> TemplateModel {
        let mut model = self.clone();
        for template in &other.templates {
            model = model.add_template(template.clone(), parameter_mapping, initial_mapping);
        }
        model
    }

    /// All distinct concepts appearing in this model's templates, keyed by
    /// their derived identity.
    pub fn get_concepts_map(&self, config: &IdentifierConfig) -> IndexMap<ConceptKey, Concept> {
        let mut map = IndexMap::new();
        for template in &self.templates {
            for concept in template.get_concepts() {
                map.entry(concept.get_key(config))
                    .or_insert_with(|| concept.clone());
            }
        }
        map
    }

    /// All concepts with the given name, case-insensitively. Can return
    /// duplicates when concepts carry compositional grounding.
    pub fn get_concepts_by_name(&self, name: &str) -> Vec<Concept> {
        let needle = name.to_lowercase();
        self.templates
            .iter()
            .flat_map(|t| t.get_concepts())
            .filter(|c| c.name.to_lowercase() == needle)
            .cloned()
            .collect()
    }

    /// Log (but tolerate) inconsistencies: rate-law symbols that look like
    /// parameters but are missing from the parameter map, and initials for
    /// concept names no template mentions.
    pub fn warn_on_soft_inconsistencies(&self) {
        let concept_names: BTreeSet<String> = self
            .templates
            .iter()
            .flat_map(|t| t.concept_names())
            .collect();
        for template in &self.templates {
            if let Some(law) = template.rate_law() {
                for symbol in law.free_symbols() {
                    if !concept_names.contains(&symbol) && !self.parameters.contains_key(&symbol) {
                        warn!(
                            symbol,
                            template = template.type_name(),
                            "rate-law symbol has no parameter entry"
                        );
                    }
                }
            }
        }
        for name in self.initials.keys() {
            if !concept_names.contains(name) {
                warn!(initial = name.as_str(), "initial references unknown concept");
            }
        }
    }

    /// Build the node-link graph of this model: one node per template, one
    /// per distinct concept, controller/subject edges into the template
    /// node and outcome edges out of it.
    pub fn generate_model_graph(&self, config: &IdentifierConfig) -> ModelGraph {
        let mut graph = ModelGraph::default();
        let mut seen = BTreeSet::new();
        for template in &self.templates {
            let template_id = get_template_graph_key(template, config).to_string();
            if seen.insert(template_id.clone()) {
                graph.nodes.push(ModelGraphNode {
                    id: template_id.clone(),
                    kind: ModelGraphNodeKind::Template,
                    label: template.type_name().to_string(),
                });
            }
            for (role, value) in template.concepts_by_role() {
                for concept in value.iter() {
                    let concept_id = get_concept_graph_key(concept, config).to_string();
                    if seen.insert(concept_id.clone()) {
                        let curie = concept.get_curie(config);
                        let label = if curie.is_grounded() {
                            format!("{} ({})", concept.name, curie.as_str())
                        } else {
                            format!("{} (ungrounded)", concept.name)
                        };
                        graph.nodes.push(ModelGraphNode {
                            id: concept_id.clone(),
                            kind: ModelGraphNodeKind::Concept,
                            label,
                        });
                    }
                    let (source, target) = match role {
                        ConceptRole::Outcome => (template_id.clone(), concept_id),
                        ConceptRole::Subject | ConceptRole::Controller => {
                            (concept_id, template_id.clone())
                        }
                    };
                    graph.edges.push(ModelGraphEdge {
                        source,
                        target,
                        role,
                    });
                }
            }
        }
        graph
    }

    /// Substitute one symbol for another in every rate law and observable
    /// expression (used when merging models with differing time units).
    pub fn substitute_symbol(&mut self, from: &str, to: &RateExpr) {
        for template in &mut self.templates {
            if let Some(law) = template.rate_law_mut().as_mut() {
                *law = law.substitute_symbol(from, to);
            }
        }
        for observable in self.observables.values_mut() {
            observable.expression = observable.expression.substitute_symbol(from, to);
        }
    }
}

// ============================================================================
// Node-link model graph (exportable)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelGraphNodeKind {
    Template,
    Concept,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelGraphNode {
    pub id: String,
    pub kind: ModelGraphNodeKind,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelGraphEdge {
    pub source: String,
    pub target: String,
    pub role: ConceptRole,
}

/// Node-link data for one template model, ready for JSON export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelGraph {
    pub nodes: Vec<ModelGraphNode>,
    pub edges: Vec<ModelGraphEdge>,
}
