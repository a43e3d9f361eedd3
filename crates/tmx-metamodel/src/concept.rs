//! Concepts: named, ontology-grounded, context-qualified entities.
//!
//! A `Concept` is the atom of the metamodel (a compartment, a species).
//! Identity for comparison purposes is *derived*, not stored: the priority
//! curie picked by [`Concept::get_curie`] plus the sorted context pairs.
//!
//! Equality and refinement are the ground predicates the whole comparison
//! engine is built from:
//!
//! - `is_equal_to` — same curie; with `with_context`, identical context.
//! - `refinement_of` — equal curie, or an ontological child-of relation
//!   decided by a caller-supplied oracle; with `with_context`, the refined
//!   side's context must subsume the other's.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Determines how identity keys are derived from concept groundings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentifierConfig {
    /// Namespaces tried first, in order, when picking the priority curie.
    pub prefix_priority: Vec<String>,
    /// Namespaces ignored entirely when deriving identity.
    pub prefix_exclusions: Vec<String>,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            prefix_priority: vec!["ido".to_string()],
            prefix_exclusions: vec!["biomodels.species".to_string()],
        }
    }
}

/// A compact `prefix:identifier` ontology reference. An ungrounded concept
/// carries an empty prefix and its name as the identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Curie {
    pub prefix: String,
    pub identifier: String,
}

impl Curie {
    pub fn new(prefix: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            identifier: identifier.into(),
        }
    }

    /// True if this curie carries a real ontology grounding.
    pub fn is_grounded(&self) -> bool {
        !self.prefix.is_empty()
    }

    pub fn as_str(&self) -> String {
        format!("{}:{}", self.prefix, self.identifier)
    }
}

/// Derived identity of a concept: priority curie + sorted context pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptKey {
    pub curie: Curie,
    pub context: Vec<(String, String)>,
}

/// A concept is specified by its identifier(s), name, and optionally its
/// context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    /// The name of the concept.
    pub name: String,
    /// A mapping of namespaces to identifiers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub identifiers: IndexMap<String, String>,
    /// A mapping of context keys to values.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub context: IndexMap<String, String>,
}

impl Concept {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifiers: IndexMap::new(),
            context: IndexMap::new(),
        }
    }

    /// Attach a grounding, builder-style.
    pub fn with_identifier(mut self, prefix: impl Into<String>, id: impl Into<String>) -> Self {
        self.identifiers.insert(prefix.into(), id.into());
        self
    }

    /// Return this concept with extra context merged in. New keys override
    /// existing ones. With `do_rename`, the context values are appended to
    /// the name (used by stratification consumers to keep names unique).
    pub fn with_context<I, K, V>(&self, do_rename: bool, context: I) -> Concept
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let extra: Vec<(String, String)> = context
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let name = if do_rename {
            let mut parts = vec![self.name.clone()];
            parts.extend(extra.iter().map(|(_, v)| v.clone()));
            parts.join("_")
        } else {
            self.name.clone()
        };
        let mut merged = self.context.clone();
        for (k, v) in extra {
            merged.insert(k, v);
        }
        Concept {
            name,
            identifiers: self.identifiers.clone(),
            context: merged,
        }
    }

    /// Identifiers that participate in identity derivation (exclusions
    /// filtered out).
    pub fn included_identifiers(&self, config: &IdentifierConfig) -> IndexMap<String, String> {
        self.identifiers
            .iter()
            .filter(|(prefix, _)| !config.prefix_exclusions.contains(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Pick the priority prefix/identifier pair for this concept.
    ///
    /// Ungrounded concepts (no identifiers left after exclusions) reduce to
    /// an empty prefix with the concept name as the identifier. Otherwise
    /// the priority list is consulted in order, falling back to the
    /// lexicographically smallest remaining pair.
    pub fn get_curie(&self, config: &IdentifierConfig) -> Curie {
        let included = self.included_identifiers(config);
        if included.is_empty() {
            return Curie::new("", self.name.clone());
        }
        for prefix in &config.prefix_priority {
            if let Some(identifier) = included.get(prefix) {
                return Curie::new(prefix.clone(), identifier.clone());
            }
        }
        let sorted: BTreeMap<_, _> = included.into_iter().collect();
        let (prefix, identifier) = sorted
            .into_iter()
            .next()
            .unwrap_or((String::new(), self.name.clone()));
        Curie::new(prefix, identifier)
    }

    /// The priority curie rendered as a `prefix:identifier` string.
    pub fn get_curie_str(&self, config: &IdentifierConfig) -> String {
        self.get_curie(config).as_str()
    }

    /// Derived identity key: priority curie plus sorted context pairs.
    pub fn get_key(&self, config: &IdentifierConfig) -> ConceptKey {
        let mut context: Vec<(String, String)> = self
            .context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        context.sort();
        ConceptKey {
            curie: self.get_curie(config),
            context,
        }
    }

    /// Test for equality between concepts.
    ///
    /// With `with_context`, the two concepts must carry exactly the same
    /// context key/value pairs. The curies must match in every case.
    pub fn is_equal_to(&self, other: &Concept, with_context: bool, config: &IdentifierConfig) -> bool {
        if with_context {
            if self.context.len() != other.context.len() {
                return false;
            }
            for (k, v) in &self.context {
                if other.context.get(k) != Some(v) {
                    return false;
                }
            }
        }
        self.get_curie(config) == other.get_curie(config)
    }

    /// Check if this concept is a more detailed version of `other`.
    ///
    /// Equivalent identity counts as a (trivial) refinement. Otherwise both
    /// concepts must be grounded and the oracle must hold for
    /// `(this_curie, other_curie)`; ungrounded concepts never refine
    /// anything ontologically. With `with_context`, the context of this
    /// concept must additionally subsume the other's
    /// ([`context_refinement`]).
    pub fn refinement_of(
        &self,
        other: &Concept,
        refinement_func: &dyn Fn(&str, &str) -> bool,
        with_context: bool,
        config: &IdentifierConfig,
    ) -> bool {
        let ontological_refinement = if self.is_equal_to(other, false, config) {
            true
        } else {
            let this_curie = self.get_curie(config);
            let other_curie = other.get_curie(config);
            this_curie.is_grounded()
                && other_curie.is_grounded()
                && refinement_func(&this_curie.as_str(), &other_curie.as_str())
        };

        let contextual_refinement = if with_context {
            context_refinement(&self.context, &other.context)
        } else {
            true
        };

        ontological_refinement && contextual_refinement
    }
}

/// Check if one concept's context refines another's.
///
/// True when both are empty, or when only the refined side has context.
/// When both carry context, every key/value pair of `other` must appear
/// identically in `refined` (the refined side may have strictly more keys).
pub fn context_refinement(
    refined: &IndexMap<String, String>,
    other: &IndexMap<String, String>,
) -> bool {
    if refined.is_empty() && other.is_empty() {
        return true;
    }
    if !refined.is_empty() && other.is_empty() {
        return true;
    }
    if refined.is_empty() && !other.is_empty() {
        return false;
    }
    other
        .iter()
        .all(|(k, v)| refined.get(k).map(|rv| rv == v).unwrap_or(false))
}

/// A parameter is a special type of concept that carries a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    #[serde(flatten)]
    pub concept: Concept,
    /// Value of the parameter.
    pub value: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            concept: Concept::new(name),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.concept.name
    }
}

/// An initial condition for a concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Initial {
    pub concept: Concept,
    pub value: f64,
}
