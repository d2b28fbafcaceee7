//! Resource definitions, verified loading, and the session-lifetime catalog.

mod catalog;
mod loader;
mod manifest;
mod payload;

pub use catalog::ResourceCatalog;
pub use loader::load_pack;
pub use manifest::{canonical_json, check_schema_version, payload_checksum, ResourceManifest};
pub use payload::{
    AssignmentTemplate, CoachingPolicy, ConceptDef, ContestGroup, FamilyProfile, FormationDef,
    OutcomeProfile, PersonnelPackage, PlaybookEntry, PostureDefaults, ResourceBundle,
    ResourcePayload, ResourceType, RulesProfile, TraitInfluenceProfile,
};
