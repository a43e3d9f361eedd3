//! TMX CLI
//!
//! Unified command-line interface for:
//! - Validating template-model JSON files (soft inconsistencies are warnings)
//! - Comparing two or more models into a comparison graph + similarity scores
//! - Composing models into one merged model
//! - Exporting a model's node-link graph for visualization

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tmx_compare::{compose, RefinementClosure, TemplateModelComparison};
use tmx_metamodel::{model_from_json_file, model_to_json_file, IdentifierConfig, TemplateModel};

#[derive(Parser)]
#[command(name = "tmx")]
#[command(author, version, about = "TMX: template-model exchange toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a template-model JSON file.
    Validate {
        /// Input model JSON
        input: PathBuf,
    },

    /// Compare two or more models; prints pairwise similarity scores.
    Compare {
        /// Input model JSON files (at least two)
        inputs: Vec<PathBuf>,
        /// Refinement closure JSON: an array of [child_curie, parent_curie] pairs
        #[arg(long)]
        closure: Option<PathBuf>,
        /// Write the full comparison graph JSON here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compose two or more models into one, earlier models taking precedence.
    Compose {
        /// Input model JSON files (at least two)
        inputs: Vec<PathBuf>,
        /// Refinement closure JSON: an array of [child_curie, parent_curie] pairs
        #[arg(long)]
        closure: Option<PathBuf>,
        /// Output model JSON
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Export a model's node-link graph as JSON.
    Graph {
        /// Input model JSON
        input: PathBuf,
        /// Output graph JSON
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Compare {
            inputs,
            closure,
            out,
        } => cmd_compare(&inputs, closure.as_deref(), out.as_deref()),
        Commands::Compose {
            inputs,
            closure,
            out,
        } => cmd_compose(&inputs, closure.as_deref(), &out),
        Commands::Graph { input, out } => cmd_graph(&input, &out),
    }
}

fn load_models(inputs: &[PathBuf]) -> Result<Vec<TemplateModel>> {
    if inputs.len() < 2 {
        bail!("expected at least two model files, got {}", inputs.len());
    }
    inputs
        .iter()
        .map(|path| {
            model_from_json_file(path).with_context(|| format!("loading {}", path.display()))
        })
        .collect()
}

fn load_closure(path: Option<&Path>) -> Result<Option<RefinementClosure>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading closure {}", path.display()))?;
    let pairs: Vec<(String, String)> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(RefinementClosure::new(pairs)))
}

fn cmd_validate(input: &Path) -> Result<()> {
    println!("{} {}", "Validating".green().bold(), input.display());
    let model =
        model_from_json_file(input).with_context(|| format!("loading {}", input.display()))?;
    println!(
        "  {} templates, {} parameters, {} initials",
        model.templates.len(),
        model.parameters.len(),
        model.initials.len()
    );
    println!("{}", "Valid.".green());
    Ok(())
}

fn cmd_compare(inputs: &[PathBuf], closure: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let models = load_models(inputs)?;
    let closure = load_closure(closure)?;
    let oracle = |child: &str, parent: &str| {
        closure
            .as_ref()
            .map(|c| c.is_ontological_child(child, parent))
            .unwrap_or(false)
    };
    let config = IdentifierConfig::default();
    let comparison = TemplateModelComparison::new(&models, &oracle, &config)?;
    let graph = &comparison.model_comparison;

    for score in graph.get_similarity_scores() {
        let (i, j) = score.models;
        println!(
            "{} {} ~ {}: {:.3}",
            "score".green().bold(),
            inputs[i].display(),
            inputs[j].display(),
            score.score
        );
    }
    if let Some(out) = out {
        let json = serde_json::to_string_pretty(graph)?;
        std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), out.display());
    }
    Ok(())
}

fn cmd_compose(inputs: &[PathBuf], closure: Option<&Path>, out: &Path) -> Result<()> {
    let models = load_models(inputs)?;
    let closure = load_closure(closure)?;
    let oracle = |child: &str, parent: &str| {
        closure
            .as_ref()
            .map(|c| c.is_ontological_child(child, parent))
            .unwrap_or(false)
    };
    let config = IdentifierConfig::default();
    let composed = compose(&models, &oracle, &config)?;
    println!(
        "{} {} models into {} templates",
        "Composed".green().bold(),
        models.len(),
        composed.templates.len()
    );
    model_to_json_file(&composed, out).with_context(|| format!("writing {}", out.display()))?;
    eprintln!("{} {}", "wrote".green().bold(), out.display());
    Ok(())
}

fn cmd_graph(input: &Path, out: &Path) -> Result<()> {
    let model =
        model_from_json_file(input).with_context(|| format!("loading {}", input.display()))?;
    let config = IdentifierConfig::default();
    let graph = model.generate_model_graph(&config);
    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    println!(
        "{} {} nodes, {} edges",
        "Graph".green().bold(),
        graph.nodes.len(),
        graph.edges.len()
    );
    eprintln!("{} {}", "wrote".green().bold(), out.display());
    Ok(())
}
