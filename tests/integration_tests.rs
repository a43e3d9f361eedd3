//! Integration tests for the complete TMX pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Model construction → JSON round trip → reload
//! - Models → Comparison graph → Similarity scores
//! - Comparison → Composition → Merged model
//!
//! Run with: cargo test --test integration_tests

use approx::assert_relative_eq;
use tempfile::tempdir;
use tmx_compare::{
    compose, compose_two_models, InterModelRole, RefinementClosure, TemplateModelComparison,
};
use tmx_metamodel::{
    model_from_json_file, model_to_json_file, Concept, ControlledConversion, IdentifierConfig,
    NaturalConversion, NaturalDegradation, Parameter, Template, TemplateModel,
};

fn concept(name: &str, ido: &str) -> Concept {
    Concept::new(name).with_identifier("ido", ido)
}

fn never(_: &str, _: &str) -> bool {
    false
}

/// Classic SIR with mass-action rate laws: infection controlled by the
/// infected population, recovery a natural conversion.
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

/// SIR plus a mortality process on the infected compartment.
fn sird_model() -> TemplateModel {
    let mut death = Template::NaturalDegradation(NaturalDegradation {
        subject: concept("infected", "0000511"),
        rate_law: None,
        provenance: vec![],
    });
    death.set_mass_action_rate_law("mu", false);
    let mut model = sir_model().add_template(death, None, None);
    model
        .parameters
        .insert("mu".to_string(), Parameter::new("mu", 0.01));
    model
}

// ============================================================================
// JSON round trips
// ============================================================================

#[test]
fn test_model_file_round_trip_preserves_rate_laws() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sir.json");
    let model = sir_model();
    model_to_json_file(&model, &path).unwrap();
    let back = model_from_json_file(&path).unwrap();
    assert_eq!(model, back);
    assert_eq!(
        back.templates[0].rate_law(),
        Some(&"beta*infected*susceptible".parse().unwrap())
    );
}

#[test]
fn test_reloaded_model_compares_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sir.json");
    model_to_json_file(&sir_model(), &path).unwrap();
    let reloaded = model_from_json_file(&path).unwrap();

    let config = IdentifierConfig::default();
    let comparison =
        TemplateModelComparison::new(&[sir_model(), reloaded], &never, &config).unwrap();
    assert_relative_eq!(comparison.model_comparison.get_similarity_score(0, 1), 1.0);
}

// ============================================================================
// Comparison pipeline
// ============================================================================

#[test]
fn test_sir_vs_sird_comparison() {
    let config = IdentifierConfig::default();
    let comparison =
        TemplateModelComparison::new(&[sir_model(), sird_model()], &never, &config).unwrap();
    let graph = &comparison.model_comparison;

    assert_eq!(graph.template_nodes[&0].len(), 2);
    assert_eq!(graph.template_nodes[&1].len(), 3);
    assert_eq!(graph.concept_nodes[&0].len(), 3);
    assert_eq!(graph.concept_nodes[&1].len(), 3);

    // All shared nodes are exact matches; the extra degradation template
    // has no counterpart.
    assert!(graph
        .inter_model_edges
        .iter()
        .all(|e| e.role == InterModelRole::IsEqual));
    assert_relative_eq!(graph.get_similarity_score(0, 1), 1.0);
}

#[test]
fn test_refinement_closure_drives_cross_disease_comparison() {
    let config = IdentifierConfig::default();
    let general = TemplateModel::new(vec![Template::NaturalConversion(NaturalConversion {
        subject: concept("infected", "0000511"),
        outcome: concept("recovered", "0000592"),
        rate_law: None,
        provenance: vec![],
    })]);
    let specific = TemplateModel::new(vec![Template::NaturalConversion(NaturalConversion {
        subject: Concept::new("infected_flu").with_identifier("doid", "8469"),
        outcome: concept("recovered", "0000592"),
        rate_law: None,
        provenance: vec![],
    })]);

    let closure = RefinementClosure::new([("doid:8469", "ido:0000511")]);
    let oracle = |child: &str, parent: &str| closure.is_ontological_child(child, parent);
    let comparison =
        TemplateModelComparison::new(&[general, specific], &oracle, &config).unwrap();
    let graph = &comparison.model_comparison;

    let refinement_edges: Vec<_> = graph
        .inter_model_edges
        .iter()
        .filter(|e| e.role == InterModelRole::RefinementOf)
        .collect();
    assert!(!refinement_edges.is_empty());
    assert!(refinement_edges
        .iter()
        .all(|e| e.source.model == 1 && e.target.model == 0));
    // recovered matches exactly, infected_flu only refines: (1 + 0.5) / 2.
    assert_relative_eq!(graph.get_similarity_score(0, 1), 0.75);
}

// ============================================================================
// Composition pipeline
// ============================================================================

#[test]
fn test_compose_sir_with_sird_keeps_all_processes() {
    let config = IdentifierConfig::default();
    let composed = compose_two_models(&sir_model(), &sird_model(), &never, &config).unwrap();
    // Infection and recovery are shared; mortality comes from SIRD alone.
    assert_eq!(composed.templates.len(), 3);
    assert_eq!(composed.parameters["beta"].value, 0.5);
    assert_eq!(composed.parameters["mu"].value, 0.01);
}

#[test]
fn test_compose_disjoint_models_is_a_union() {
    let config = IdentifierConfig::default();
    let sir = sir_model();
    let predator_prey = TemplateModel::new(vec![Template::ControlledConversion(
        ControlledConversion {
            controller: concept("predator", "0000700"),
            subject: concept("prey", "0000701"),
            outcome: concept("predator", "0000700"),
            rate_law: None,
            provenance: vec![],
        },
    )]);
    let composed = compose_two_models(&sir, &predator_prey, &never, &config).unwrap();
    assert_eq!(
        composed.templates.len(),
        sir.templates.len() + predator_prey.templates.len()
    );
}

#[test]
fn test_compose_round_trips_through_files() {
    let dir = tempdir().unwrap();
    let sir_path = dir.path().join("sir.json");
    let sird_path = dir.path().join("sird.json");
    let composed_path = dir.path().join("composed.json");
    model_to_json_file(&sir_model(), &sir_path).unwrap();
    model_to_json_file(&sird_model(), &sird_path).unwrap();

    let config = IdentifierConfig::default();
    let models = vec![
        model_from_json_file(&sir_path).unwrap(),
        model_from_json_file(&sird_path).unwrap(),
    ];
    let composed = compose(&models, &never, &config).unwrap();
    model_to_json_file(&composed, &composed_path).unwrap();

    let back = model_from_json_file(&composed_path).unwrap();
    assert_eq!(back, composed);
    assert_eq!(back.templates.len(), 3);
}

// ============================================================================
// Model graph export
// ============================================================================

#[test]
fn test_model_graph_export_is_stable_json() {
    let config = IdentifierConfig::default();
    let graph = sir_model().generate_model_graph(&config);
    let json = serde_json::to_value(&graph).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    let edges = json["edges"].as_array().unwrap();
    assert_eq!(nodes.len(), 5);
    assert_eq!(edges.len(), 5);
    // Node ids are the derived graph keys, so susceptible carries its curie.
    assert!(nodes
        .iter()
        .any(|n| n["id"].as_str().unwrap().contains("ido:0000514")));
}
