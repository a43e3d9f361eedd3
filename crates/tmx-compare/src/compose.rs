//! Model composition driven by the comparison graph.
//!
//! Two models compose by first comparing them: a similarity score of zero
//! means the models are wholly disjoint and the result is a plain union;
//! any overlap routes through the comparison graph's template relations so
//! that, per related pair, only the more specific template survives.
//!
//! All collision rules favor `tm0`, the first model passed in: parameters,
//! initials, observables, time, and the annotation time window. This holds
//! across an iterated `compose` fold, where the running composite always
//! sits in the `tm0` position.

use crate::closure::RefinementFunc;
use crate::comparison::{ComparisonError, NodeRef, TemplateModelComparison};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use thiserror::Error;
use tmx_metamodel::{
    Annotations, Author, IdentifierConfig, Initial, Parameter, RateExpr, Template, TemplateModel,
    Time,
};
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("need at least two models to compose, got {0}")]
    TooFewModels(usize),
    #[error(transparent)]
    Comparison(#[from] ComparisonError),
}

/// Compose a list of template models into one, left to right.
///
/// The running composite takes the `tm0` position of
/// [`compose_two_models`] at every step, so earlier models win all
/// precedence decisions.
pub fn compose(
    models: &[TemplateModel],
    refinement_func: RefinementFunc<'_>,
    config: &IdentifierConfig,
) -> Result<TemplateModel, CompositionError> {
    if models.len() < 2 {
        return Err(CompositionError::TooFewModels(models.len()));
    }
    let mut composed = models[0].clone();
    for model in &models[1..] {
        composed = compose_two_models(&composed, model, refinement_func, config)?;
    }
    Ok(composed)
}

/// Compose two template models into a new one, favoring `tm0` on every
/// collision. Neither input is mutated.
pub fn compose_two_models(
    tm0: &TemplateModel,
    tm1: &TemplateModel,
    refinement_func: RefinementFunc<'_>,
    config: &IdentifierConfig,
) -> Result<TemplateModel, CompositionError> {
    let comparison =
        TemplateModelComparison::new(&[tm0.clone(), tm1.clone()], refinement_func, config)?;
    let graph = &comparison.model_comparison;
    let score = graph.get_similarity_score(0, 1);
    debug!(score, "composing two models");

    let annotations = annotation_composition(tm0.annotations.as_ref(), tm1.annotations.as_ref());
    let time = tm0.time.clone().or_else(|| tm1.time.clone());

    let mut composed = if score == 0.0 {
        // Wholly disjoint: plain union, tm0 values win on key collisions.
        let mut templates = tm0.templates.clone();
        templates.extend(tm1.templates.iter().cloned());
        let mut parameters = tm1.parameters.clone();
        parameters.extend(tm0.parameters.clone());
        let mut initials = tm1.initials.clone();
        initials.extend(tm0.initials.clone());
        let mut observables = tm1.observables.clone();
        observables.extend(tm0.observables.clone());
        TemplateModel {
            templates,
            parameters,
            initials,
            observables,
            annotations,
            time,
        }
    } else {
        let mut templates: Vec<Template> = Vec::new();
        let mut parameters: IndexMap<String, Parameter> = IndexMap::new();
        let mut initials: IndexMap<String, Initial> = IndexMap::new();

        // Template-level relations: both endpoints are spoken for, and the
        // *source* template survives — for equality edges the source sits in
        // tm0, for refinement edges it is the more specific side.
        let mut related: HashSet<NodeRef> = HashSet::new();
        let mut survivors: Vec<NodeRef> = Vec::new();
        for edge in &graph.inter_model_edges {
            let is_template_edge = graph
                .template_nodes
                .get(&edge.source.model)
                .map(|nodes| nodes.contains_key(&edge.source.node))
                .unwrap_or(false);
            if is_template_edge {
                survivors.push(edge.source);
                related.insert(edge.source);
                related.insert(edge.target);
            }
        }

        for node in survivors {
            let template = &graph.template_nodes[&node.model][&node.node];
            let owner = &graph.template_models[&node.model];
            process_template(template, owner, &mut templates, &mut parameters, &mut initials);
        }

        // Unrelated templates, tm0's before tm1's so its entries land first.
        for (model, owner) in [(0usize, tm0), (1usize, tm1)] {
            if let Some(nodes) = graph.template_nodes.get(&model) {
                for (&node, template) in nodes {
                    if !related.contains(&NodeRef { model, node }) {
                        process_template(
                            template,
                            owner,
                            &mut templates,
                            &mut parameters,
                            &mut initials,
                        );
                    }
                }
            }
        }

        TemplateModel {
            templates,
            parameters,
            initials,
            // TODO: merge observables of partially overlapping models once
            // matched concepts can be mapped onto observable expressions.
            observables: IndexMap::new(),
            annotations,
            time,
        }
    };

    if let (Some(time0), Some(time1)) = (tm0.time.as_ref(), tm1.time.as_ref()) {
        substitute_time(&mut composed, time0, time1);
    }
    Ok(composed)
}

/// Add a template to the composed model unless an equal one is already
/// present, pulling its rate-law parameters and concept initials from the
/// owning model. Existing entries are never overwritten.
fn process_template(
    template: &Template,
    owner: &TemplateModel,
    templates: &mut Vec<Template>,
    parameters: &mut IndexMap<String, Parameter>,
    initials: &mut IndexMap<String, Initial>,
) {
    if templates.contains(template) {
        return;
    }
    for name in owner.template_parameter_names(template) {
        if let Some(parameter) = owner.parameters.get(&name) {
            parameters.entry(name).or_insert_with(|| parameter.clone());
        }
    }
    for name in template.concept_names() {
        if let Some(initial) = owner.initials.get(&name) {
            initials.entry(name).or_insert_with(|| initial.clone());
        }
    }
    templates.push(template.clone());
}

/// Rewrite `tm1`'s time-unit symbol to `tm0`'s in every rate law and
/// observable of the composed model. Only applies when `tm1`'s unit is a
/// plain symbol; richer unit expressions are left untouched.
fn substitute_time(composed: &mut TemplateModel, time0: &Time, time1: &Time) {
    let (Some(units0), Some(units1)) = (time0.units.as_ref(), time1.units.as_ref()) else {
        return;
    };
    if units0.expression == units1.expression {
        return;
    }
    if let RateExpr::Symbol(from) = &units1.expression {
        let from = from.clone();
        composed.substitute_symbol(&from, &units0.expression);
    }
}

fn union_dedup(first: &[String], second: &[String]) -> Vec<String> {
    let mut set: IndexSet<String> = IndexSet::new();
    set.extend(first.iter().cloned());
    set.extend(second.iter().cloned());
    set.into_iter().collect()
}

/// Merge the annotations of two models. A missing side returns the other
/// verbatim; otherwise names/descriptions/licenses concatenate with labeled
/// prefixes, list fields union preserving first-seen order, authors dedupe
/// by name, and the time window comes from `tm0` when fully populated, else
/// from `tm1`.
pub fn annotation_composition(
    tm0_annotations: Option<&Annotations>,
    tm1_annotations: Option<&Annotations>,
) -> Option<Annotations> {
    let (a0, a1) = match (tm0_annotations, tm1_annotations) {
        (Some(a0), Some(a1)) => (a0, a1),
        (Some(a0), None) => return Some(a0.clone()),
        (None, Some(a1)) => return Some(a1.clone()),
        (None, None) => return None,
    };

    let name = match (a0.name.as_deref(), a1.name.as_deref()) {
        (Some(n0), Some(n1)) => Some(format!("{n0} + {n1}")),
        (n0, n1) => n0.or(n1).map(str::to_string),
    };
    let description = match (a0.description.as_deref(), a1.description.as_deref()) {
        (Some(d0), Some(d1)) => Some(format!(
            "First model description: {d0}\nSecond model description: {d1}"
        )),
        (d0, d1) => d0.or(d1).map(str::to_string),
    };
    let license = match (a0.license.as_deref(), a1.license.as_deref()) {
        (Some(l0), Some(l1)) => Some(format!(
            "First model license: {l0}\nSecond model license: {l1}"
        )),
        (l0, l1) => l0.or(l1).map(str::to_string),
    };

    let mut authors: Vec<Author> = Vec::new();
    let mut seen_authors: HashSet<&str> = HashSet::new();
    for author in a0.authors.iter().chain(a1.authors.iter()) {
        if seen_authors.insert(author.name.as_str()) {
            authors.push(author.clone());
        }
    }

    let window_complete = |a: &Annotations| {
        a.time_start.is_some() && a.time_end.is_some() && a.time_scale.is_some()
    };
    let window = if window_complete(a0) {
        Some(a0)
    } else if window_complete(a1) {
        Some(a1)
    } else {
        None
    };

    Some(Annotations {
        name,
        description,
        license,
        authors,
        references: union_dedup(&a0.references, &a1.references),
        locations: union_dedup(&a0.locations, &a1.locations),
        pathogens: union_dedup(&a0.pathogens, &a1.pathogens),
        diseases: union_dedup(&a0.diseases, &a1.diseases),
        hosts: union_dedup(&a0.hosts, &a1.hosts),
        model_types: union_dedup(&a0.model_types, &a1.model_types),
        time_start: window.and_then(|a| a.time_start.clone()),
        time_end: window.and_then(|a| a.time_end.clone()),
        time_scale: window.and_then(|a| a.time_scale.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tmx_metamodel::{Concept, ControlledConversion, NaturalConversion, Units};

    fn concept(name: &str, ido: &str) -> Concept {
        Concept::new(name).with_identifier("ido", ido)
    }

    fn never(_: &str, _: &str) -> bool {
        false
    }

    fn sir_model() -> TemplateModel {
        let susceptible = concept("susceptible", "0000514");
        let infected = concept("infected", "0000511");
        let recovered = concept("recovered", "0000592");
        let mut infection = Template::ControlledConversion(ControlledConversion {
            controller: infected.clone(),
            subject: susceptible,
            outcome: infected.clone(),
            rate_law: None,
            provenance: vec![],
        });
        infection.set_mass_action_rate_law("beta", false);
        let mut recovery = Template::NaturalConversion(NaturalConversion {
            subject: infected,
            outcome: recovered,
            rate_law: None,
            provenance: vec![],
        });
        recovery.set_mass_action_rate_law("gamma", false);
        let mut model = TemplateModel::new(vec![infection, recovery]);
        model
            .parameters
            .insert("beta".to_string(), Parameter::new("beta", 0.5));
        model
            .parameters
            .insert("gamma".to_string(), Parameter::new("gamma", 0.1));
        model
    }

    fn conversion_model(subject: (&str, &str), outcome: (&str, &str)) -> TemplateModel {
        TemplateModel::new(vec![Template::NaturalConversion(NaturalConversion {
            subject: concept(subject.0, subject.1),
            outcome: concept(outcome.0, outcome.1),
            rate_law: None,
            provenance: vec![],
        })])
    }

    #[test]
    fn disjoint_models_union_templates() {
        let config = IdentifierConfig::default();
        let a = conversion_model(("a", "1"), ("b", "2"));
        let b = conversion_model(("c", "3"), ("d", "4"));
        let composed = compose_two_models(&a, &b, &never, &config).unwrap();
        assert_eq!(
            composed.templates.len(),
            a.templates.len() + b.templates.len()
        );
        assert_eq!(composed.templates[0], a.templates[0]);
        assert_eq!(composed.templates[1], b.templates[0]);
    }

    #[test]
    fn disjoint_collisions_prefer_first_model() {
        let config = IdentifierConfig::default();
        let mut a = conversion_model(("a", "1"), ("b", "2"));
        a.parameters
            .insert("k".to_string(), Parameter::new("k", 1.0));
        let mut b = conversion_model(("c", "3"), ("d", "4"));
        b.parameters
            .insert("k".to_string(), Parameter::new("k", 9.0));
        b.parameters
            .insert("only_b".to_string(), Parameter::new("only_b", 2.0));
        let composed = compose_two_models(&a, &b, &never, &config).unwrap();
        assert_eq!(composed.parameters["k"].value, 1.0);
        assert_eq!(composed.parameters["only_b"].value, 2.0);
    }

    #[test]
    fn identical_models_compose_to_first() {
        let config = IdentifierConfig::default();
        let a = sir_model();
        let composed = compose_two_models(&a, &sir_model(), &never, &config).unwrap();
        assert_eq!(composed.templates, a.templates);
        assert_eq!(composed.parameters, a.parameters);
    }

    #[test]
    fn refined_templates_replace_general_ones() {
        let config = IdentifierConfig::default();
        let plain = sir_model();
        let ctx = vec![("location".to_string(), "geonames:5128581".to_string())];
        let refined = TemplateModel::new(
            sir_model()
                .templates
                .into_iter()
                .map(|t| t.with_context(false, &ctx))
                .collect(),
        );
        // The contextualized model refines the plain one, so only its
        // templates survive, regardless of argument order.
        let composed = compose_two_models(&plain, &refined, &never, &config).unwrap();
        assert_eq!(composed.templates, refined.templates);
        let composed = compose_two_models(&refined, &plain, &never, &config).unwrap();
        assert_eq!(composed.templates, refined.templates);
    }

    #[test]
    fn partial_overlap_pulls_attributes_from_owning_model() {
        let config = IdentifierConfig::default();
        let a = sir_model();
        let mut b = conversion_model(
            ("infected", "0000511"),
            ("deceased", "0000598"),
        );
        if let Some(template) = b.templates.get_mut(0) {
            template.set_mass_action_rate_law("mu", false);
        }
        b.parameters
            .insert("mu".to_string(), Parameter::new("mu", 0.01));
        b.initials.insert(
            "deceased".to_string(),
            Initial {
                concept: concept("deceased", "0000598"),
                value: 0.0,
            },
        );
        let composed = compose_two_models(&a, &b, &never, &config).unwrap();
        assert_eq!(composed.templates.len(), 3);
        assert_eq!(composed.parameters["beta"].value, 0.5);
        assert_eq!(composed.parameters["mu"].value, 0.01);
        assert_eq!(composed.initials["deceased"].value, 0.0);
    }

    #[test]
    fn compose_requires_two_models() {
        let config = IdentifierConfig::default();
        let result = compose(&[sir_model()], &never, &config);
        assert!(matches!(result, Err(CompositionError::TooFewModels(1))));
    }

    #[test]
    fn compose_folds_left_to_right() {
        let config = IdentifierConfig::default();
        let a = conversion_model(("a", "1"), ("b", "2"));
        let b = conversion_model(("c", "3"), ("d", "4"));
        let c = conversion_model(("e", "5"), ("f", "6"));
        let composed = compose(&[a, b, c], &never, &config).unwrap();
        assert_eq!(composed.templates.len(), 3);
    }

    #[test]
    fn time_units_are_rewritten_to_first_models() {
        let config = IdentifierConfig::default();
        let mut a = conversion_model(("a", "1"), ("b", "2"));
        a.time = Some(Time {
            name: "t".to_string(),
            units: Some(Units {
                expression: RateExpr::symbol("day"),
            }),
        });
        let mut b = conversion_model(("c", "3"), ("d", "4"));
        if let Some(template) = b.templates.get_mut(0) {
            *template.rate_law_mut() = Some("k*c/week".parse().unwrap());
        }
        b.time = Some(Time {
            name: "t".to_string(),
            units: Some(Units {
                expression: RateExpr::symbol("week"),
            }),
        });
        let composed = compose_two_models(&a, &b, &never, &config).unwrap();
        assert_eq!(composed.time, a.time);
        assert_eq!(
            composed.templates[1].rate_law(),
            Some(&"k*c/day".parse().unwrap())
        );
    }

    #[test]
    fn annotations_merge_with_first_model_window() {
        let a0 = Annotations {
            name: Some("SIR".to_string()),
            description: Some("baseline".to_string()),
            authors: vec![Author {
                name: "Smith".to_string(),
            }],
            references: vec!["pubmed:1".to_string()],
            diseases: vec!["doid:0080600".to_string()],
            time_start: Some("2020-01-01".to_string()),
            time_end: Some("2020-06-01".to_string()),
            time_scale: Some("days".to_string()),
            ..Default::default()
        };
        let a1 = Annotations {
            name: Some("SIRD".to_string()),
            authors: vec![
                Author {
                    name: "Smith".to_string(),
                },
                Author {
                    name: "Jones".to_string(),
                },
            ],
            references: vec!["pubmed:1".to_string(), "pubmed:2".to_string()],
            time_start: Some("2021-01-01".to_string()),
            time_end: Some("2021-06-01".to_string()),
            time_scale: Some("days".to_string()),
            ..Default::default()
        };
        let merged = annotation_composition(Some(&a0), Some(&a1)).unwrap();
        assert_eq!(merged.name.as_deref(), Some("SIR + SIRD"));
        assert_eq!(merged.description.as_deref(), Some("baseline"));
        assert_eq!(merged.authors.len(), 2);
        assert_eq!(
            merged.references,
            vec!["pubmed:1".to_string(), "pubmed:2".to_string()]
        );
        assert_eq!(merged.time_start.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn missing_annotations_return_other_side() {
        let a = Annotations {
            name: Some("SIR".to_string()),
            ..Default::default()
        };
        assert_eq!(annotation_composition(Some(&a), None), Some(a.clone()));
        assert_eq!(annotation_composition(None, Some(&a)), Some(a));
        assert_eq!(annotation_composition(None, None), None);
    }

    proptest! {
        // Composing models over disjoint concept universes always unions
        // the template lists.
        #[test]
        fn disjoint_union_preserves_template_count(n0 in 1usize..4, n1 in 1usize..4) {
            let config = IdentifierConfig::default();
            let a = TemplateModel::new(
                (0..n0)
                    .map(|i| {
                        Template::NaturalConversion(NaturalConversion {
                            subject: concept(&format!("a{i}"), &format!("10{i}")),
                            outcome: concept(&format!("b{i}"), &format!("20{i}")),
                            rate_law: None,
                            provenance: vec![],
                        })
                    })
                    .collect(),
            );
            let b = TemplateModel::new(
                (0..n1)
                    .map(|i| {
                        Template::NaturalConversion(NaturalConversion {
                            subject: concept(&format!("c{i}"), &format!("30{i}")),
                            outcome: concept(&format!("d{i}"), &format!("40{i}")),
                            rate_law: None,
                            provenance: vec![],
                        })
                    })
                    .collect(),
            );
            let composed = compose_two_models(&a, &b, &never, &config).unwrap();
            prop_assert_eq!(composed.templates.len(), n0 + n1);
        }
    }
}
