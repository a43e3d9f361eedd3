//! Templates: typed processes over concepts.
//!
//! A template is one mechanistic process (conversion, production,
//! degradation), optionally controlled and optionally carrying a symbolic
//! rate law. The variant set is closed: dispatch is a `match` on the enum,
//! and each variant declares a fixed, ordered list of concept roles that
//! drives identity keys, graph edges and comparison.
//!
//! On the wire a template is a tagged union over `"type"`:
//!
//! ```json
//! {
//!   "type": "ControlledConversion",
//!   "controller": {...}, "subject": {...}, "outcome": {...},
//!   "rate_law": "beta*susceptible*infected"
//! }
//! ```

use crate::concept::{Concept, ConceptKey, IdentifierConfig};
use crate::expr::RateExpr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Where a template came from (imported SBML reaction, manual curation, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The role a concept plays within a template. Grouped controller lists
/// share the `Controller` role; the list shape is carried by [`RoleValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptRole {
    Subject,
    Outcome,
    Controller,
}

impl fmt::Display for ConceptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConceptRole::Subject => write!(f, "subject"),
            ConceptRole::Outcome => write!(f, "outcome"),
            ConceptRole::Controller => write!(f, "controller"),
        }
    }
}

/// A role's concepts: a single concept or a controller group.
#[derive(Debug, Clone, Copy)]
pub enum RoleValue<'a> {
    One(&'a Concept),
    Many(&'a [Concept]),
}

impl<'a> RoleValue<'a> {
    pub fn iter(self) -> std::slice::Iter<'a, Concept> {
        match self {
            RoleValue::One(c) => std::slice::from_ref(c).iter(),
            RoleValue::Many(cs) => cs.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RoleValue::One(_) => 1,
            RoleValue::Many(cs) => cs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity key of a template: variant name plus the identity keys of its
/// concepts in declared role order (controller groups sorted by their own
/// key, so the key is order-independent for grouped roles).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub type_name: &'static str,
    pub parts: Vec<ConceptKey>,
}

// ============================================================================
// Template variants
// ============================================================================

/// Natural conversion from subject to outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NaturalConversion {
    pub subject: Concept,
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Conversion from subject to outcome driven by a single controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlledConversion {
    pub controller: Concept,
    pub subject: Concept,
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Conversion from subject to outcome driven by several controllers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedControlledConversion {
    pub controllers: Vec<Concept>,
    pub subject: Concept,
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Production of the outcome at a constant rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NaturalProduction {
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Production of the outcome driven by a single controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlledProduction {
    pub controller: Concept,
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Production of the outcome driven by several controllers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedControlledProduction {
    pub controllers: Vec<Concept>,
    pub outcome: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// Degradation of the subject at a rate proportional to its amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NaturalDegradation {
    pub subject: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<RateExpr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

/// A typed process over concepts, tagged by `"type"` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Template {
    NaturalConversion(NaturalConversion),
    ControlledConversion(ControlledConversion),
    GroupedControlledConversion(GroupedControlledConversion),
    NaturalProduction(NaturalProduction),
    ControlledProduction(ControlledProduction),
    GroupedControlledProduction(GroupedControlledProduction),
    NaturalDegradation(NaturalDegradation),
}

impl Template {
    pub fn type_name(&self) -> &'static str {
        match self {
            Template::NaturalConversion(_) => "NaturalConversion",
            Template::ControlledConversion(_) => "ControlledConversion",
            Template::GroupedControlledConversion(_) => "GroupedControlledConversion",
            Template::NaturalProduction(_) => "NaturalProduction",
            Template::ControlledProduction(_) => "ControlledProduction",
            Template::GroupedControlledProduction(_) => "GroupedControlledProduction",
            Template::NaturalDegradation(_) => "NaturalDegradation",
        }
    }

    pub fn rate_law(&self) -> Option<&RateExpr> {
        match self {
            Template::NaturalConversion(t) => t.rate_law.as_ref(),
            Template::ControlledConversion(t) => t.rate_law.as_ref(),
            Template::GroupedControlledConversion(t) => t.rate_law.as_ref(),
            Template::NaturalProduction(t) => t.rate_law.as_ref(),
            Template::ControlledProduction(t) => t.rate_law.as_ref(),
            Template::GroupedControlledProduction(t) => t.rate_law.as_ref(),
            Template::NaturalDegradation(t) => t.rate_law.as_ref(),
        }
    }

    pub fn rate_law_mut(&mut self) -> &mut Option<RateExpr> {
        match self {
            Template::NaturalConversion(t) => &mut t.rate_law,
            Template::ControlledConversion(t) => &mut t.rate_law,
            Template::GroupedControlledConversion(t) => &mut t.rate_law,
            Template::NaturalProduction(t) => &mut t.rate_law,
            Template::ControlledProduction(t) => &mut t.rate_law,
            Template::GroupedControlledProduction(t) => &mut t.rate_law,
            Template::NaturalDegradation(t) => &mut t.rate_law,
        }
    }

    pub fn provenance(&self) -> &[Provenance] {
        match self {
            Template::NaturalConversion(t) => &t.provenance,
            Template::ControlledConversion(t) => &t.provenance,
            Template::GroupedControlledConversion(t) => &t.provenance,
            Template::NaturalProduction(t) => &t.provenance,
            Template::ControlledProduction(t) => &t.provenance,
            Template::GroupedControlledProduction(t) => &t.provenance,
            Template::NaturalDegradation(t) => &t.provenance,
        }
    }

    /// The concepts of this template keyed by role, in declared role order.
    pub fn concepts_by_role(&self) -> Vec<(ConceptRole, RoleValue<'_>)> {
        match self {
            Template::NaturalConversion(t) => vec![
                (ConceptRole::Subject, RoleValue::One(&t.subject)),
                (ConceptRole::Outcome, RoleValue::One(&t.outcome)),
            ],
            Template::ControlledConversion(t) => vec![
                (ConceptRole::Controller, RoleValue::One(&t.controller)),
                (ConceptRole::Subject, RoleValue::One(&t.subject)),
                (ConceptRole::Outcome, RoleValue::One(&t.outcome)),
            ],
            Template::GroupedControlledConversion(t) => vec![
                (ConceptRole::Controller, RoleValue::Many(&t.controllers)),
                (ConceptRole::Subject, RoleValue::One(&t.subject)),
                (ConceptRole::Outcome, RoleValue::One(&t.outcome)),
            ],
            Template::NaturalProduction(t) => {
                vec![(ConceptRole::Outcome, RoleValue::One(&t.outcome))]
            }
            Template::ControlledProduction(t) => vec![
                (ConceptRole::Controller, RoleValue::One(&t.controller)),
                (ConceptRole::Outcome, RoleValue::One(&t.outcome)),
            ],
            Template::GroupedControlledProduction(t) => vec![
                (ConceptRole::Controller, RoleValue::Many(&t.controllers)),
                (ConceptRole::Outcome, RoleValue::One(&t.outcome)),
            ],
            Template::NaturalDegradation(t) => {
                vec![(ConceptRole::Subject, RoleValue::One(&t.subject))]
            }
        }
    }

    /// All concepts in declared role order (controller groups unsorted).
    pub fn get_concepts(&self) -> Vec<&Concept> {
        self.concepts_by_role()
            .into_iter()
            .flat_map(|(_, value)| value.iter())
            .collect()
    }

    /// The names of the concepts in this template.
    pub fn concept_names(&self) -> BTreeSet<String> {
        self.get_concepts().into_iter().map(|c| c.name.clone()).collect()
    }

    /// The controllers of this template, if any.
    pub fn get_controllers(&self) -> Vec<&Concept> {
        self.concepts_by_role()
            .into_iter()
            .filter(|(role, _)| *role == ConceptRole::Controller)
            .flat_map(|(_, value)| value.iter())
            .collect()
    }

    /// Controllers plus the subject: the concepts whose amounts drive a
    /// mass-action rate.
    pub fn get_interactors(&self) -> Vec<&Concept> {
        let mut interactors = self.get_controllers();
        if let Some(subject) = self.subject() {
            interactors.push(subject);
        }
        interactors
    }

    fn subject(&self) -> Option<&Concept> {
        self.concepts_by_role()
            .into_iter()
            .find(|(role, _)| *role == ConceptRole::Subject)
            .and_then(|(_, value)| value.iter().next())
    }

    /// Identity key: variant name plus concept keys in declared role order,
    /// controller groups sorted by their own key.
    pub fn get_key(&self, config: &IdentifierConfig) -> TemplateKey {
        let mut parts = Vec::new();
        for (_, value) in self.concepts_by_role() {
            match value {
                RoleValue::One(c) => parts.push(c.get_key(config)),
                RoleValue::Many(cs) => {
                    let mut keys: Vec<ConceptKey> =
                        cs.iter().map(|c| c.get_key(config)).collect();
                    keys.sort();
                    parts.extend(keys);
                }
            }
        }
        TemplateKey {
            type_name: self.type_name(),
            parts,
        }
    }

    /// Return a copy of this template with context added to every concept.
    pub fn with_context(&self, do_rename: bool, context: &[(String, String)]) -> Template {
        let ctx = |c: &Concept| c.with_context(do_rename, context.iter().cloned());
        match self {
            Template::NaturalConversion(t) => Template::NaturalConversion(NaturalConversion {
                subject: ctx(&t.subject),
                outcome: ctx(&t.outcome),
                rate_law: t.rate_law.clone(),
                provenance: t.provenance.clone(),
            }),
            Template::ControlledConversion(t) => {
                Template::ControlledConversion(ControlledConversion {
                    controller: ctx(&t.controller),
                    subject: ctx(&t.subject),
                    outcome: ctx(&t.outcome),
                    rate_law: t.rate_law.clone(),
                    provenance: t.provenance.clone(),
                })
            }
            Template::GroupedControlledConversion(t) => {
                Template::GroupedControlledConversion(GroupedControlledConversion {
                    controllers: t.controllers.iter().map(&ctx).collect(),
                    subject: ctx(&t.subject),
                    outcome: ctx(&t.outcome),
                    rate_law: t.rate_law.clone(),
                    provenance: t.provenance.clone(),
                })
            }
            Template::NaturalProduction(t) => Template::NaturalProduction(NaturalProduction {
                outcome: ctx(&t.outcome),
                rate_law: t.rate_law.clone(),
                provenance: t.provenance.clone(),
            }),
            Template::ControlledProduction(t) => {
                Template::ControlledProduction(ControlledProduction {
                    controller: ctx(&t.controller),
                    outcome: ctx(&t.outcome),
                    rate_law: t.rate_law.clone(),
                    provenance: t.provenance.clone(),
                })
            }
            Template::GroupedControlledProduction(t) => {
                Template::GroupedControlledProduction(GroupedControlledProduction {
                    controllers: t.controllers.iter().map(&ctx).collect(),
                    outcome: ctx(&t.outcome),
                    rate_law: t.rate_law.clone(),
                    provenance: t.provenance.clone(),
                })
            }
            Template::NaturalDegradation(t) => Template::NaturalDegradation(NaturalDegradation {
                subject: ctx(&t.subject),
                rate_law: t.rate_law.clone(),
                provenance: t.provenance.clone(),
            }),
        }
    }

    /// Add a controller, upgrading singly-controlled variants to their
    /// grouped form. Returns `None` for variants with no controller slot.
    pub fn add_controller(&self, controller: Concept) -> Option<Template> {
        match self {
            Template::ControlledConversion(t) => Some(Template::GroupedControlledConversion(
                GroupedControlledConversion {
                    controllers: vec![t.controller.clone(), controller],
                    subject: t.subject.clone(),
                    outcome: t.outcome.clone(),
                    rate_law: None,
                    provenance: t.provenance.clone(),
                },
            )),
            Template::GroupedControlledConversion(t) => {
                let mut controllers = t.controllers.clone();
                controllers.push(controller);
                Some(Template::GroupedControlledConversion(
                    GroupedControlledConversion {
                        controllers,
                        subject: t.subject.clone(),
                        outcome: t.outcome.clone(),
                        rate_law: None,
                        provenance: t.provenance.clone(),
                    },
                ))
            }
            Template::ControlledProduction(t) => Some(Template::GroupedControlledProduction(
                GroupedControlledProduction {
                    controllers: vec![t.controller.clone(), controller],
                    outcome: t.outcome.clone(),
                    rate_law: None,
                    provenance: t.provenance.clone(),
                },
            )),
            Template::GroupedControlledProduction(t) => {
                let mut controllers = t.controllers.clone();
                controllers.push(controller);
                Some(Template::GroupedControlledProduction(
                    GroupedControlledProduction {
                        controllers,
                        outcome: t.outcome.clone(),
                        rate_law: None,
                        provenance: t.provenance.clone(),
                    },
                ))
            }
            _ => None,
        }
    }

    /// The interactor part of a mass-action rate law: the product of the
    /// interactor symbols, or, in the independent form,
    /// `subject * (1 + controller_1 + ...)`.
    pub fn interactor_rate_law(&self, independent: bool) -> RateExpr {
        if !independent {
            return RateExpr::product(
                self.get_interactors()
                    .into_iter()
                    .map(|c| RateExpr::symbol(c.name.clone())),
            );
        }
        let subject = match self.subject() {
            Some(s) => RateExpr::symbol(s.name.clone()),
            None => return RateExpr::number(1.0),
        };
        let controller_terms = RateExpr::sum(
            std::iter::once(RateExpr::number(1.0)).chain(
                self.get_controllers()
                    .into_iter()
                    .map(|c| RateExpr::symbol(c.name.clone())),
            ),
        );
        RateExpr::product([subject, controller_terms])
    }

    /// Mass-action rate law: the parameter times the interactor product.
    pub fn mass_action_rate_law(&self, parameter: &str, independent: bool) -> RateExpr {
        if !independent {
            return RateExpr::product(std::iter::once(RateExpr::symbol(parameter)).chain(
                self.get_interactors()
                    .into_iter()
                    .map(|c| RateExpr::symbol(c.name.clone())),
            ));
        }
        let subject = match self.subject() {
            Some(s) => RateExpr::symbol(s.name.clone()),
            None => return RateExpr::symbol(parameter),
        };
        let controller_terms = RateExpr::sum(
            std::iter::once(RateExpr::number(1.0)).chain(
                self.get_controllers()
                    .into_iter()
                    .map(|c| RateExpr::symbol(c.name.clone())),
            ),
        );
        RateExpr::product([RateExpr::symbol(parameter), subject, controller_terms])
    }

    /// Set this template's rate law to a mass-action rate law.
    pub fn set_mass_action_rate_law(&mut self, parameter: &str, independent: bool) {
        *self.rate_law_mut() = Some(self.mass_action_rate_law(parameter, independent));
    }
}
