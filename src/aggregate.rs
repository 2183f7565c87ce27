//! # Inference Aggregation
//!
//! One data-driven pass over the Category Taxonomy that turns the sub-model
//! registry plus one respondent profile into the full set of named
//! percentage distributions.
//!
//! Resolution order matters only for the presence group: its resolved `si`
//! percentage parameterizes the presence-derived fallback of the
//! violence-type group, so it is computed first. Every other group is
//! independent, and no cross-group normalization is performed.
//!
//! A sub-model that scores exactly 0.0 is treated as if it were absent for
//! uniform-fallback groups (the historical serving behavior; artifacts in
//! the field were produced against it). Presence-share groups use a scored
//! value as-is, including genuine zeros.

use crate::profile::InputProfile;
use crate::registry::ModelRegistry;
use crate::taxonomy::{self, CategoryGroup, FallbackRule, GroupKind, TAXONOMY, round1};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::time::{Duration, Instant};
use thiserror::Error;

/// One finished category distribution: ordered member key -> percentage,
/// each rounded to one decimal place.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    entries: Vec<(&'static str, f64)>,
}

impl Distribution {
    pub fn get(&self, member: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| *key == member)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (member, value) in &self.entries {
            map.serialize_entry(member, value)?;
        }
        map.end()
    }
}

/// The complete response: every taxonomy group's distribution, in taxonomy
/// order. Serializes as one JSON object keyed by group name.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSet {
    groups: Vec<(&'static str, Distribution)>,
}

impl DistributionSet {
    pub fn group(&self, name: &str) -> Option<&Distribution> {
        self.groups
            .iter()
            .find(|(group, _)| *group == name)
            .map(|(_, distribution)| distribution)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Distribution)> + '_ {
        self.groups.iter().map(|(name, d)| (*name, d))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

impl Serialize for DistributionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (name, distribution) in &self.groups {
            map.serialize_entry(name, distribution)?;
        }
        map.end()
    }
}

/// The aggregation loop exceeded its per-request time budget. One request
/// amplifies into up to 36 sub-model evaluations, so a slow capability is
/// surfaced as a failed request rather than a silent fallback.
#[derive(Error, Debug)]
#[error("aggregation exceeded its {budget:?} budget after {elapsed:?}")]
pub struct DeadlineExceeded {
    pub elapsed: Duration,
    pub budget: Duration,
}

/// Produces every category distribution for one profile. Pure in
/// (`registry`, `profile`): identical inputs yield identical outputs.
pub fn infer(registry: &ModelRegistry, profile: &InputProfile) -> DistributionSet {
    // Resolved presence percentage; 0.0 when no presence model is loaded,
    // which deliberately yields the degenerate 0/100 split.
    let presence = scored(registry, taxonomy::PRESENCE_PREFIX, profile).unwrap_or(0.0);

    let groups = TAXONOMY
        .iter()
        .map(|group| (group.name, resolve_group(registry, profile, group, presence)))
        .collect();
    DistributionSet { groups }
}

/// Like [`infer`], but fails the whole request once the cumulative scoring
/// time passes `budget`. Checked between groups; an in-flight scoring call
/// is never interrupted.
pub fn infer_within(
    registry: &ModelRegistry,
    profile: &InputProfile,
    budget: Duration,
) -> Result<DistributionSet, DeadlineExceeded> {
    let started = Instant::now();
    let presence = scored(registry, taxonomy::PRESENCE_PREFIX, profile).unwrap_or(0.0);

    let mut groups = Vec::with_capacity(TAXONOMY.len());
    for group in TAXONOMY {
        let elapsed = started.elapsed();
        if elapsed >= budget {
            return Err(DeadlineExceeded { elapsed, budget });
        }
        groups.push((group.name, resolve_group(registry, profile, group, presence)));
    }
    Ok(DistributionSet { groups })
}

/// Raw sub-model percentage for `key`, or `None` when no model is loaded.
fn scored(registry: &ModelRegistry, key: &str, profile: &InputProfile) -> Option<f64> {
    registry
        .lookup(key)
        .map(|artifact| round1(artifact.score(profile) * 100.0))
}

/// Applies the zero-as-absent presence policy: a missing model and a model
/// that scored exactly 0.0 both resolve to the fallback.
fn usable_or(raw: Option<f64>, fallback: f64) -> f64 {
    match raw {
        Some(value) if value != 0.0 => value,
        _ => fallback,
    }
}

fn resolve_group(
    registry: &ModelRegistry,
    profile: &InputProfile,
    group: &CategoryGroup,
    presence: f64,
) -> Distribution {
    match group.kind {
        GroupKind::ComplementaryPair => {
            let raw = scored(registry, group.prefix, profile);
            let si = match group.fallback {
                // The presence pair keeps genuine zero scores and degrades
                // to 0/100 when its model is absent.
                FallbackRule::Zero => raw.unwrap_or(0.0),
                _ => usable_or(raw, group.uniform_share()),
            };
            Distribution {
                entries: vec![("si", si), ("no", round1(100.0 - si))],
            }
        }
        GroupKind::MultiValued => {
            let fallback = match group.fallback {
                FallbackRule::PresenceShare if presence != 0.0 => {
                    round1(presence / group.members.len() as f64)
                }
                _ => group.uniform_share(),
            };
            let entries = group
                .members
                .iter()
                .map(|&member| {
                    let raw = scored(registry, &group.member_key(member), profile);
                    let value = match group.fallback {
                        // Presence-share members use a scored value as-is.
                        FallbackRule::PresenceShare => raw.unwrap_or(fallback),
                        _ => usable_or(raw, fallback),
                    };
                    (member, value)
                })
                .collect();
            Distribution { entries }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::constant_artifact;
    use crate::profile::sample_profile;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_registry_yields_every_default_distribution() {
        let registry = ModelRegistry::from_artifacts([]);
        let response = infer(&registry, &sample_profile());
        assert_eq!(response.len(), 19);

        // Degenerate presence split.
        let presence = response.group("siYnoVg").unwrap();
        assert_abs_diff_eq!(presence.get("si").unwrap(), 0.0);
        assert_abs_diff_eq!(presence.get("no").unwrap(), 100.0);

        // Zero presence selects the uniform prior for violence types.
        let tipos = response.group("tiposDeViolencia").unwrap();
        for (_, value) in tipos.iter() {
            assert_abs_diff_eq!(value, 14.3);
        }

        // Complement pairs default to an even split.
        for name in ["siYnoCd", "siYnoApoyoU"] {
            let pair = response.group(name).unwrap();
            assert_abs_diff_eq!(pair.get("si").unwrap(), 50.0);
            assert_abs_diff_eq!(pair.get("no").unwrap(), 50.0);
        }

        // Every multi-valued group falls back to its default granularity.
        for (name, distribution) in response.iter() {
            let group = TAXONOMY.iter().find(|g| g.name == name).unwrap();
            if group.kind == GroupKind::MultiValued
                && group.fallback == FallbackRule::Uniform
            {
                for (_, value) in distribution.iter() {
                    assert_abs_diff_eq!(value, group.uniform_share());
                }
            }
        }
    }

    #[test]
    fn presence_score_feeds_the_violence_type_fallback() {
        let registry = ModelRegistry::from_artifacts([constant_artifact("vg", 0.8)]);
        let response = infer(&registry, &sample_profile());

        let presence = response.group("siYnoVg").unwrap();
        assert_abs_diff_eq!(presence.get("si").unwrap(), 80.0);
        assert_abs_diff_eq!(presence.get("no").unwrap(), 20.0);

        let tipos = response.group("tiposDeViolencia").unwrap();
        for (_, value) in tipos.iter() {
            assert_abs_diff_eq!(value, 11.4);
        }
    }

    #[test]
    fn scored_violence_types_pass_through_even_when_zero() {
        let registry = ModelRegistry::from_artifacts([
            // Scores low enough to round to 0.0 exactly.
            constant_artifact("tipo__fisica", 1e-6),
        ]);
        let response = infer(&registry, &sample_profile());
        let tipos = response.group("tiposDeViolencia").unwrap();
        assert_abs_diff_eq!(tipos.get("fisica").unwrap(), 0.0);
        assert_abs_diff_eq!(tipos.get("sexual").unwrap(), 14.3);
    }

    #[test]
    fn zero_scores_fall_back_in_uniform_groups() {
        let registry = ModelRegistry::from_artifacts([
            constant_artifact("denuncia", 1e-6),
            constant_artifact("frecuencia__nunca", 1e-6),
        ]);
        let response = infer(&registry, &sample_profile());

        // A rounded-to-zero reporting score is indistinguishable from an
        // absent model under the historical policy.
        let denuncia = response.group("siYnoCd").unwrap();
        assert_abs_diff_eq!(denuncia.get("si").unwrap(), 50.0);
        assert_abs_diff_eq!(denuncia.get("no").unwrap(), 50.0);

        let frecuencia = response.group("frecuencia").unwrap();
        assert_abs_diff_eq!(frecuencia.get("nunca").unwrap(), 20.0);
    }

    #[test]
    fn scored_members_override_only_their_own_slot() {
        let registry =
            ModelRegistry::from_artifacts([constant_artifact("programa__Derecho", 0.62)]);
        let response = infer(&registry, &sample_profile());
        let programas = response.group("programas").unwrap();
        assert_abs_diff_eq!(programas.get("Derecho").unwrap(), 62.0);
        assert_abs_diff_eq!(programas.get("Psicologia").unwrap(), 20.0);
    }

    #[test]
    fn complement_pairs_always_sum_to_one_hundred() {
        let registries = [
            ModelRegistry::from_artifacts([]),
            ModelRegistry::from_artifacts([
                constant_artifact("vg", 0.734),
                constant_artifact("denuncia", 0.219),
                constant_artifact("apoyo", 0.901),
            ]),
        ];
        for registry in &registries {
            let response = infer(registry, &sample_profile());
            for name in ["siYnoVg", "siYnoCd", "siYnoApoyoU"] {
                let pair = response.group(name).unwrap();
                let sum = pair.get("si").unwrap() + pair.get("no").unwrap();
                assert_abs_diff_eq!(sum, 100.0, epsilon = 0.1);
            }
        }
    }

    #[test]
    fn inference_is_idempotent() {
        let registry = ModelRegistry::from_artifacts([
            constant_artifact("vg", 0.42),
            constant_artifact("tipo__sexual", 0.13),
        ]);
        let profile = sample_profile();
        let first = serde_json::to_string(&infer(&registry, &profile)).unwrap();
        let second = serde_json::to_string(&infer(&registry, &profile)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn deadline_variant_matches_plain_inference_under_a_generous_budget() {
        let registry = ModelRegistry::from_artifacts([constant_artifact("vg", 0.3)]);
        let profile = sample_profile();
        let bounded = infer_within(&registry, &profile, Duration::from_secs(60)).unwrap();
        assert_eq!(bounded, infer(&registry, &profile));
    }

    #[test]
    fn exhausted_budget_fails_the_request() {
        let registry = ModelRegistry::from_artifacts([]);
        let result = infer_within(&registry, &sample_profile(), Duration::ZERO);
        assert!(result.is_err());
    }

    #[test]
    fn response_serializes_groups_in_taxonomy_order() {
        let registry = ModelRegistry::from_artifacts([]);
        let response = infer(&registry, &sample_profile());
        let json = serde_json::to_string(&response).unwrap();
        let mut last = 0;
        for group in TAXONOMY {
            let needle = format!("\"{}\":", group.name);
            let position = json[last..]
                .find(&needle)
                .unwrap_or_else(|| panic!("group {} missing or out of order", group.name));
            last += position;
        }
    }
}
