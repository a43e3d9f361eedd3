//! Equality and refinement over whole templates.
//!
//! Template equality requires identical variants and role-by-role concept
//! equality (controller groups via bipartite matching). Refinement is
//! looser: a more specific variant may refine a more general one per the
//! compatibility table, and roles absent from the less specific side are
//! treated as satisfied.

use crate::matching::{match_concepts, MatchPredicate};
use std::slice;
use tmx_metamodel::{ConceptRole, IdentifierConfig, RoleValue, Template};

/// Variant pairs where the left (more specific) may refine the right
/// (more general) despite differing types.
const TYPE_COMPATIBILITIES: &[(&str, &str)] = &[
    ("ControlledConversion", "NaturalConversion"),
    ("GroupedControlledConversion", "NaturalConversion"),
    ("GroupedControlledConversion", "ControlledConversion"),
];

fn role_value<'a>(template: &'a Template, role: ConceptRole) -> Option<RoleValue<'a>> {
    template
        .concepts_by_role()
        .into_iter()
        .find(|(r, _)| *r == role)
        .map(|(_, v)| v)
}

/// Check if two templates are equal, optionally including concept context.
pub fn templates_equal(
    template: &Template,
    other: &Template,
    with_context: bool,
    config: &IdentifierConfig,
) -> bool {
    if template.type_name() != other.type_name() {
        return false;
    }
    for (role, value) in template.concepts_by_role() {
        let other_value = match role_value(other, role) {
            Some(v) => v,
            None => return false,
        };
        match (value, other_value) {
            (RoleValue::One(a), RoleValue::One(b)) => {
                if !a.is_equal_to(b, with_context, config) {
                    return false;
                }
            }
            (RoleValue::Many(a), RoleValue::Many(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                if !match_concepts(a, b, MatchPredicate::Equality, with_context, config) {
                    return false;
                }
            }
            // Same variant on both sides, so role shapes always agree.
            _ => return false,
        }
    }
    true
}

/// Check if `template` is a more detailed version of `other`.
///
/// Variants must match or appear in the compatibility table. Roles missing
/// on the less specific side are skipped; controller groups are matched
/// against the other side's (possibly single) controller via bipartite
/// refinement matching.
pub fn template_refinement_of(
    template: &Template,
    other: &Template,
    refinement_func: &dyn Fn(&str, &str) -> bool,
    with_context: bool,
    config: &IdentifierConfig,
) -> bool {
    let this_type = template.type_name();
    let other_type = other.type_name();
    if this_type != other_type
        && !TYPE_COMPATIBILITIES.contains(&(this_type, other_type))
    {
        return false;
    }

    for (role, value) in template.concepts_by_role() {
        let other_value = match role_value(other, role) {
            Some(v) => v,
            // The less detailed template lacks this role entirely.
            None => continue,
        };
        let matched = match (value, other_value) {
            (RoleValue::One(a), RoleValue::One(b)) => {
                a.refinement_of(b, refinement_func, with_context, config)
            }
            (RoleValue::Many(a), RoleValue::Many(b)) => match_concepts(
                a,
                b,
                MatchPredicate::Refinement(refinement_func),
                with_context,
                config,
            ),
            // Grouped controllers refining a single-controller variant.
            (RoleValue::Many(a), RoleValue::One(b)) => match_concepts(
                a,
                slice::from_ref(b),
                MatchPredicate::Refinement(refinement_func),
                with_context,
                config,
            ),
            // A single concept can never cover a whole group.
            (RoleValue::One(_), RoleValue::Many(_)) => false,
        };
        if !matched {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmx_metamodel::{
        Concept, ControlledConversion, GroupedControlledConversion, NaturalConversion,
    };

    fn concept(name: &str, ido: &str) -> Concept {
        Concept::new(name).with_identifier("ido", ido)
    }

    fn susceptible() -> Concept {
        concept("susceptible", "0000514")
    }

    fn infected() -> Concept {
        concept("infected", "0000511")
    }

    fn natural_infection() -> Template {
        Template::NaturalConversion(NaturalConversion {
            subject: susceptible(),
            outcome: infected(),
            rate_law: None,
            provenance: vec![],
        })
    }

    fn controlled_infection() -> Template {
        Template::ControlledConversion(ControlledConversion {
            controller: infected(),
            subject: susceptible(),
            outcome: infected(),
            rate_law: None,
            provenance: vec![],
        })
    }

    fn grouped_infection(controllers: Vec<Concept>) -> Template {
        Template::GroupedControlledConversion(GroupedControlledConversion {
            controllers,
            subject: susceptible(),
            outcome: infected(),
            rate_law: None,
            provenance: vec![],
        })
    }

    #[test]
    fn identical_templates_are_equal() {
        let config = IdentifierConfig::default();
        assert!(templates_equal(
            &controlled_infection(),
            &controlled_infection(),
            true,
            &config
        ));
    }

    #[test]
    fn different_variants_are_not_equal() {
        let config = IdentifierConfig::default();
        assert!(!templates_equal(
            &controlled_infection(),
            &natural_infection(),
            false,
            &config
        ));
    }

    #[test]
    fn grouped_equality_is_controller_order_independent() {
        let config = IdentifierConfig::default();
        let a = grouped_infection(vec![infected(), concept("asymptomatic", "0000569")]);
        let b = grouped_infection(vec![concept("asymptomatic", "0000569"), infected()]);
        assert!(templates_equal(&a, &b, true, &config));
    }

    #[test]
    fn grouped_equality_requires_equal_cardinality() {
        let config = IdentifierConfig::default();
        let a = grouped_infection(vec![infected(), concept("asymptomatic", "0000569")]);
        let b = grouped_infection(vec![infected()]);
        assert!(!templates_equal(&a, &b, true, &config));
    }

    #[test]
    fn controlled_refines_natural_conversion() {
        let config = IdentifierConfig::default();
        let never = |_: &str, _: &str| false;
        assert!(template_refinement_of(
            &controlled_infection(),
            &natural_infection(),
            &never,
            true,
            &config
        ));
        assert!(!template_refinement_of(
            &natural_infection(),
            &controlled_infection(),
            &never,
            true,
            &config
        ));
    }

    #[test]
    fn grouped_refines_controlled_with_matching_controller() {
        let config = IdentifierConfig::default();
        let never = |_: &str, _: &str| false;
        let grouped = grouped_infection(vec![infected(), concept("asymptomatic", "0000569")]);
        assert!(template_refinement_of(
            &grouped,
            &controlled_infection(),
            &never,
            true,
            &config
        ));
    }

    #[test]
    fn grouped_does_not_refine_unrelated_controller() {
        let config = IdentifierConfig::default();
        let never = |_: &str, _: &str| false;
        let grouped = grouped_infection(vec![concept("asymptomatic", "0000569")]);
        assert!(!template_refinement_of(
            &grouped,
            &controlled_infection(),
            &never,
            true,
            &config
        ));
    }

    #[test]
    fn equal_templates_refine_each_other_trivially() {
        let config = IdentifierConfig::default();
        let never = |_: &str, _: &str| false;
        assert!(template_refinement_of(
            &controlled_infection(),
            &controlled_infection(),
            &never,
            true,
            &config
        ));
    }

    #[test]
    fn contextualized_template_refines_plain() {
        let config = IdentifierConfig::default();
        let never = |_: &str, _: &str| false;
        let ctx = vec![("location".to_string(), "geonames:5128581".to_string())];
        let located = controlled_infection().with_context(false, &ctx);
        assert!(template_refinement_of(
            &located,
            &controlled_infection(),
            &never,
            true,
            &config
        ));
        assert!(!template_refinement_of(
            &controlled_infection(),
            &located,
            &never,
            true,
            &config
        ));
    }
}
