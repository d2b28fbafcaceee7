//! Immutable resource catalog for a session's lifetime.
//!
//! Built once from embedded (or injected) packs; reload means a fresh
//! instance, never in-place mutation of one referenced by in-flight
//! resolutions.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::models::position_for_slot;
use crate::resources::loader::load_pack;
use crate::resources::manifest::ResourceManifest;
use crate::resources::payload::{
    AssignmentTemplate, CoachingPolicy, ConceptDef, FormationDef, PersonnelPackage, PlaybookEntry,
    ResourceBundle, ResourcePayload, ResourceType, RulesProfile, TraitInfluenceProfile,
};
use crate::traits::TraitCatalog;

// Embedded default packs. Authored alongside the crate; checksums cover the
// canonicalized resources array of each file.
const PERSONNEL_PACK: &str = include_str!("../../data/packs/personnel_packages.json");
const FORMATIONS_PACK: &str = include_str!("../../data/packs/formations.json");
const CONCEPTS_OFFENSE_PACK: &str = include_str!("../../data/packs/concepts_offense.json");
const CONCEPTS_DEFENSE_PACK: &str = include_str!("../../data/packs/concepts_defense.json");
const COACHING_POLICIES_PACK: &str = include_str!("../../data/packs/coaching_policies.json");
const TRAIT_INFLUENCES_PACK: &str = include_str!("../../data/packs/trait_influences.json");
const PLAYBOOK_PACK: &str = include_str!("../../data/packs/playbook_entries.json");
const ASSIGNMENT_TEMPLATES_PACK: &str = include_str!("../../data/packs/assignment_templates.json");
const RULES_PROFILES_PACK: &str = include_str!("../../data/packs/rules_profiles.json");

#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    bundles: BTreeMap<ResourceType, BTreeMap<String, ResourceBundle>>,
}

impl ResourceCatalog {
    /// Load the embedded default packs and validate cross-references.
    pub fn load_embedded() -> Result<Self> {
        Self::from_packs(&[
            (ResourceType::PersonnelPackage, PERSONNEL_PACK),
            (ResourceType::Formation, FORMATIONS_PACK),
            (ResourceType::ConceptOffense, CONCEPTS_OFFENSE_PACK),
            (ResourceType::ConceptDefense, CONCEPTS_DEFENSE_PACK),
            (ResourceType::CoachingPolicy, COACHING_POLICIES_PACK),
            (ResourceType::TraitInfluenceProfile, TRAIT_INFLUENCES_PACK),
            (ResourceType::PlaybookEntry, PLAYBOOK_PACK),
            (ResourceType::AssignmentTemplate, ASSIGNMENT_TEMPLATES_PACK),
            (ResourceType::RulesProfile, RULES_PROFILES_PACK),
        ])
    }

    /// Load from raw pack documents. Exposed so tests and modded runtimes can
    /// inject packs; the same verification applies either way.
    pub fn from_packs(packs: &[(ResourceType, &str)]) -> Result<Self> {
        let mut bundles: BTreeMap<ResourceType, BTreeMap<String, ResourceBundle>> = BTreeMap::new();
        for (resource_type, raw) in packs {
            let by_id = bundles.entry(*resource_type).or_default();
            for bundle in load_pack(*resource_type, raw)? {
                if by_id
                    .insert(bundle.resource_id.clone(), bundle.clone())
                    .is_some()
                {
                    return Err(EngineError::Schema {
                        scope: resource_type.as_str().to_string(),
                        message: format!("duplicate resource id '{}'", bundle.resource_id),
                    });
                }
            }
        }
        let catalog = ResourceCatalog { bundles };
        catalog.validate_cross_references()?;
        Ok(catalog)
    }

    /// Fetch one bundle by type and id.
    pub fn load(&self, resource_type: ResourceType, resource_id: &str) -> Result<&ResourceBundle> {
        self.bundles
            .get(&resource_type)
            .and_then(|by_id| by_id.get(resource_id))
            .ok_or_else(|| EngineError::ReferentialIntegrity {
                field_path: format!("{}.id", resource_type.as_str()),
                id: resource_id.to_string(),
            })
    }

    pub fn contains(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.bundles
            .get(&resource_type)
            .map(|by_id| by_id.contains_key(resource_id))
            .unwrap_or(false)
    }

    pub fn ids(&self, resource_type: ResourceType) -> Vec<&str> {
        self.bundles
            .get(&resource_type)
            .map(|by_id| by_id.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn manifests(&self) -> Vec<ResourceManifest> {
        self.bundles
            .values()
            .filter_map(|by_id| by_id.values().next())
            .map(|b| ResourceManifest {
                resource_type: b.resource_type.as_str().to_string(),
                schema_version: b.schema_version.clone(),
                resource_version: b.resource_version.clone(),
                generated_at: b.generated_at.clone(),
                checksum: b.checksum.clone(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Typed resolvers
    // ------------------------------------------------------------------

    pub fn personnel(&self, id: &str) -> Result<&PersonnelPackage> {
        match &self.load(ResourceType::PersonnelPackage, id)?.payload {
            ResourcePayload::PersonnelPackage(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn formation(&self, id: &str) -> Result<&FormationDef> {
        match &self.load(ResourceType::Formation, id)?.payload {
            ResourcePayload::Formation(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn offense_concept(&self, id: &str) -> Result<&ConceptDef> {
        match &self.load(ResourceType::ConceptOffense, id)?.payload {
            ResourcePayload::ConceptOffense(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn defense_concept(&self, id: &str) -> Result<&ConceptDef> {
        match &self.load(ResourceType::ConceptDefense, id)?.payload {
            ResourcePayload::ConceptDefense(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn coaching_policy(&self, id: &str) -> Result<&CoachingPolicy> {
        match &self.load(ResourceType::CoachingPolicy, id)?.payload {
            ResourcePayload::CoachingPolicy(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn trait_influence(&self, play_type: &str) -> Result<&TraitInfluenceProfile> {
        match &self.load(ResourceType::TraitInfluenceProfile, play_type)?.payload {
            ResourcePayload::TraitInfluenceProfile(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn playbook_entry(&self, id: &str) -> Result<&PlaybookEntry> {
        match &self.load(ResourceType::PlaybookEntry, id)?.payload {
            ResourcePayload::PlaybookEntry(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn assignment_template(&self, id: &str) -> Result<&AssignmentTemplate> {
        match &self.load(ResourceType::AssignmentTemplate, id)?.payload {
            ResourcePayload::AssignmentTemplate(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    pub fn rules_profile(&self, id: &str) -> Result<&RulesProfile> {
        match &self.load(ResourceType::RulesProfile, id)?.payload {
            ResourcePayload::RulesProfile(p) => Ok(p),
            _ => unreachable!("bundle payload tagged by loader"),
        }
    }

    /// Find the playbook entry matching a parameterized intent exactly.
    pub fn playbook_entry_for_intent(
        &self,
        play_type: crate::models::PlayType,
        personnel_id: &str,
        formation_id: &str,
        offensive_concept_id: &str,
        defensive_concept_id: &str,
    ) -> Result<&PlaybookEntry> {
        for id in self.ids(ResourceType::PlaybookEntry) {
            let entry = self.playbook_entry(id)?;
            if entry.play_type == play_type
                && entry.personnel_id == personnel_id
                && entry.formation_id == formation_id
                && entry.offensive_concept_id == offensive_concept_id
                && entry.defensive_concept_id == defensive_concept_id
            {
                return Ok(entry);
            }
        }
        Err(EngineError::ReferentialIntegrity {
            field_path: "playcall".into(),
            id: format!(
                "{}:{personnel_id}:{formation_id}:{offensive_concept_id}:{defensive_concept_id}",
                play_type.as_str()
            ),
        })
    }

    // ------------------------------------------------------------------
    // Load-time cross-reference closure
    // ------------------------------------------------------------------

    fn validate_cross_references(&self) -> Result<()> {
        // Formations: personnel references, 11 disjoint slots.
        for id in self.ids(ResourceType::Formation) {
            let formation = self.formation(id)?;
            if formation.allowed_personnel.is_empty() {
                return Err(EngineError::Schema {
                    scope: "formation".into(),
                    message: format!("formation '{id}' allows no personnel"),
                });
            }
            for pid in &formation.allowed_personnel {
                if !self.contains(ResourceType::PersonnelPackage, pid) {
                    return Err(EngineError::ReferentialIntegrity {
                        field_path: format!("formation.{id}.allowed_personnel"),
                        id: pid.clone(),
                    });
                }
            }
            if formation.slots.len() != 11 {
                return Err(EngineError::Schema {
                    scope: "formation".into(),
                    message: format!(
                        "formation '{id}' must define 11 slots, has {}",
                        formation.slots.len()
                    ),
                });
            }
        }

        // Personnel: position counts must sum to 11.
        for id in self.ids(ResourceType::PersonnelPackage) {
            let package = self.personnel(id)?;
            let total: u32 = package.positions.values().sum();
            if total != 11 {
                return Err(EngineError::Schema {
                    scope: "personnel_package".into(),
                    message: format!("personnel '{id}' positions sum to {total}, expected 11"),
                });
            }
        }

        // Offensive concepts: formation references.
        for id in self.ids(ResourceType::ConceptOffense) {
            let concept = self.offense_concept(id)?;
            for fid in &concept.allowed_formations {
                if !self.contains(ResourceType::Formation, fid) {
                    return Err(EngineError::ReferentialIntegrity {
                        field_path: format!("concept_offense.{id}.allowed_formations"),
                        id: fid.clone(),
                    });
                }
            }
        }

        // Playbook: every reference must resolve, and the template's offense
        // role multiset must field exactly what the personnel package calls
        // for, so an entry cannot pass load and then die at the gate.
        for id in self.ids(ResourceType::PlaybookEntry) {
            let entry = self.playbook_entry(id)?;
            let refs: [(&str, ResourceType, &str); 5] = [
                ("personnel_id", ResourceType::PersonnelPackage, &entry.personnel_id),
                ("formation_id", ResourceType::Formation, &entry.formation_id),
                (
                    "offensive_concept_id",
                    ResourceType::ConceptOffense,
                    &entry.offensive_concept_id,
                ),
                (
                    "defensive_concept_id",
                    ResourceType::ConceptDefense,
                    &entry.defensive_concept_id,
                ),
                (
                    "assignment_template_id",
                    ResourceType::AssignmentTemplate,
                    &entry.assignment_template_id,
                ),
            ];
            for (field, resource_type, value) in refs {
                if !self.contains(resource_type, value) {
                    return Err(EngineError::ReferentialIntegrity {
                        field_path: format!("playbook_entry.{id}.{field}"),
                        id: value.to_string(),
                    });
                }
            }
            let template = self.assignment_template(&entry.assignment_template_id)?;
            let package = self.personnel(&entry.personnel_id)?;
            let mut fielded: BTreeMap<String, u32> = BTreeMap::new();
            for slot in &template.offense_roles {
                *fielded.entry(position_for_slot(slot)).or_insert(0) += 1;
            }
            if fielded != package.positions {
                return Err(EngineError::Schema {
                    scope: "playbook_entry".into(),
                    message: format!(
                        "entry '{id}' fields {fielded:?} through template '{}' but personnel '{}' requires {:?}",
                        entry.assignment_template_id, entry.personnel_id, package.positions
                    ),
                });
            }
        }

        // Coaching policies: every posture playlist references known plays.
        for id in self.ids(ResourceType::CoachingPolicy) {
            let policy = self.coaching_policy(id)?;
            for (posture, play_ids) in &policy.playbook_by_posture {
                if play_ids.is_empty() {
                    return Err(EngineError::Schema {
                        scope: "coaching_policy".into(),
                        message: format!("policy '{id}' posture '{posture}' playlist is empty"),
                    });
                }
                for play_id in play_ids {
                    if !self.contains(ResourceType::PlaybookEntry, play_id) {
                        return Err(EngineError::ReferentialIntegrity {
                            field_path: format!("coaching_policy.{id}.playbook_by_posture.{posture}"),
                            id: play_id.clone(),
                        });
                    }
                }
            }
        }

        // Assignment templates: 11v11 roles, non-empty contest groups.
        for id in self.ids(ResourceType::AssignmentTemplate) {
            let template = self.assignment_template(id)?;
            if template.offense_roles.len() != 11 || template.defense_roles.len() != 11 {
                return Err(EngineError::Schema {
                    scope: "assignment_template".into(),
                    message: format!("template '{id}' must define 11 offense and 11 defense roles"),
                });
            }
            if template.contest_groups.is_empty() {
                return Err(EngineError::Schema {
                    scope: "assignment_template".into(),
                    message: format!("template '{id}' defines no contest groups"),
                });
            }
            for group in &template.contest_groups {
                if group.group_size == 0 {
                    return Err(EngineError::Schema {
                        scope: "assignment_template".into(),
                        message: format!(
                            "template '{id}' family '{}' has zero group size",
                            group.family
                        ),
                    });
                }
            }
        }

        if self.ids(ResourceType::RulesProfile).is_empty() {
            return Err(EngineError::Schema {
                scope: "rules_profile".into(),
                message: "at least one rules profile is required".into(),
            });
        }

        Ok(())
    }

    /// Validate that every trait code referenced by influence profiles exists
    /// in the trait canon, and that outcome profiles are internally sane.
    /// Separated from load so the trait catalog stays an explicit input.
    pub fn validate_trait_references(&self, traits: &TraitCatalog) -> Result<()> {
        for id in self.ids(ResourceType::TraitInfluenceProfile) {
            let profile = self.trait_influence(id)?;
            for family in &profile.families {
                if family.offense_weights.is_empty() || family.defense_weights.is_empty() {
                    return Err(EngineError::Schema {
                        scope: "trait_influence_profile".into(),
                        message: format!(
                            "profile '{id}' family '{}' has empty weight table",
                            family.family
                        ),
                    });
                }
                for code in family
                    .offense_weights
                    .keys()
                    .chain(family.defense_weights.keys())
                {
                    if !traits.contains(code) {
                        return Err(EngineError::ReferentialIntegrity {
                            field_path: format!("trait_influence.{id}.{}", family.family),
                            id: code.clone(),
                        });
                    }
                }
            }
            let outcome = &profile.outcome_profile;
            if outcome.clock_delta_min < 1 || outcome.clock_delta_max < outcome.clock_delta_min {
                return Err(EngineError::Schema {
                    scope: "trait_influence_profile".into(),
                    message: format!("profile '{id}' has invalid clock delta bounds"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayType;

    #[test]
    fn embedded_packs_load_and_cross_validate() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        assert!(catalog.contains(ResourceType::Formation, "spread_2x2"));
        assert!(catalog.contains(ResourceType::PersonnelPackage, "11"));
        assert_eq!(catalog.manifests().len(), 9);
    }

    #[test]
    fn trait_references_resolve_against_canon() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let traits = TraitCatalog::canonical().unwrap();
        catalog.validate_trait_references(&traits).unwrap();
    }

    #[test]
    fn every_play_type_has_an_influence_profile() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        for play_type in PlayType::all() {
            catalog.trait_influence(play_type.as_str()).unwrap();
        }
    }

    #[test]
    fn unknown_id_is_referential_integrity_error() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let err = catalog.formation("wishbone_1948").unwrap_err();
        assert!(matches!(err, EngineError::ReferentialIntegrity { .. }));
    }

    #[test]
    fn template_that_underfields_personnel_fails_load() {
        // '21' personnel calls for two backs; the base scrimmage template
        // fields one, so pointing the entry at it must fail at load, not at
        // the gate mid-session.
        let mut doc: serde_json::Value = serde_json::from_str(PLAYBOOK_PACK).unwrap();
        for entry in doc["resources"].as_array_mut().unwrap() {
            if entry["id"] == "oz_21_base" {
                entry["assignment_template_id"] = "scrimmage_base".into();
            }
        }
        let checksum = crate::resources::payload_checksum(&doc["resources"]);
        doc["manifest"]["checksum"] = checksum.into();
        let tampered = doc.to_string();
        let err = ResourceCatalog::from_packs(&[
            (ResourceType::PersonnelPackage, PERSONNEL_PACK),
            (ResourceType::Formation, FORMATIONS_PACK),
            (ResourceType::ConceptOffense, CONCEPTS_OFFENSE_PACK),
            (ResourceType::ConceptDefense, CONCEPTS_DEFENSE_PACK),
            (ResourceType::CoachingPolicy, COACHING_POLICIES_PACK),
            (ResourceType::TraitInfluenceProfile, TRAIT_INFLUENCES_PACK),
            (ResourceType::PlaybookEntry, &tampered),
            (ResourceType::AssignmentTemplate, ASSIGNMENT_TEMPLATES_PACK),
            (ResourceType::RulesProfile, RULES_PROFILES_PACK),
        ])
        .unwrap_err();
        match err {
            EngineError::Schema { scope, message } => {
                assert_eq!(scope, "playbook_entry");
                assert!(message.contains("oz_21_base"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn intent_lookup_finds_exact_entry() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let entry = catalog
            .playbook_entry_for_intent(PlayType::Run, "11", "singleback", "inside_zone", "cover_3")
            .unwrap();
        assert_eq!(entry.id, "iz_11_base");
    }
}
