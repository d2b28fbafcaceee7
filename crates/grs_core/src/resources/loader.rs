//! Pack document parsing and load-time verification.
//!
//! A pack is `{ manifest: {...}, resources: [...] }`. Loading verifies, in
//! order: structural shape, declared resource type, schema version range,
//! and the SHA-256 checksum over the canonicalized resources array. Any
//! mismatch is a hard fail; there is no partial load.

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::resources::manifest::{check_schema_version, payload_checksum, ResourceManifest};
use crate::resources::payload::{
    AssignmentTemplate, CoachingPolicy, ConceptDef, FormationDef, PersonnelPackage, PlaybookEntry,
    ResourceBundle, ResourcePayload, ResourceType, RulesProfile, TraitInfluenceProfile,
};

fn schema_err(scope: &str, message: impl Into<String>) -> EngineError {
    EngineError::Schema {
        scope: scope.to_string(),
        message: message.into(),
    }
}

/// Parse and verify one pack document, producing one bundle per resource.
pub fn load_pack(expected_type: ResourceType, raw: &str) -> Result<Vec<ResourceBundle>> {
    let scope = expected_type.as_str();
    let doc: Value =
        serde_json::from_str(raw).map_err(|e| schema_err(scope, format!("invalid JSON: {e}")))?;

    let manifest_value = doc
        .get("manifest")
        .ok_or_else(|| schema_err(scope, "pack missing 'manifest'"))?;
    let manifest: ResourceManifest = serde_json::from_value(manifest_value.clone())
        .map_err(|e| schema_err(scope, format!("invalid manifest: {e}")))?;

    if manifest.resource_type != scope {
        return Err(schema_err(
            scope,
            format!(
                "manifest resource_type '{}' does not match expected '{scope}'",
                manifest.resource_type
            ),
        ));
    }
    check_schema_version(scope, &manifest.schema_version)?;

    let resources = doc
        .get("resources")
        .and_then(Value::as_array)
        .ok_or_else(|| schema_err(scope, "pack missing 'resources' array"))?;
    if resources.is_empty() {
        return Err(schema_err(scope, "pack contains no resources"));
    }

    let found = payload_checksum(doc.get("resources").unwrap_or(&Value::Null));
    if found != manifest.checksum {
        return Err(EngineError::Checksum {
            resource_type: scope.to_string(),
            expected: manifest.checksum.clone(),
            found,
        });
    }

    let mut bundles = Vec::with_capacity(resources.len());
    for entry in resources {
        let payload = parse_payload(expected_type, entry)?;
        let resource_id = payload.id().to_string();
        if resource_id.is_empty() {
            return Err(schema_err(scope, "resource entry has empty id"));
        }
        bundles.push(ResourceBundle {
            resource_type: expected_type,
            resource_id,
            schema_version: manifest.schema_version.clone(),
            resource_version: manifest.resource_version.clone(),
            checksum: manifest.checksum.clone(),
            generated_at: manifest.generated_at.clone(),
            payload,
        });
    }
    Ok(bundles)
}

fn parse_payload(resource_type: ResourceType, entry: &Value) -> Result<ResourcePayload> {
    let scope = resource_type.as_str();
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<missing id>");
    let detail = |e: serde_json::Error| schema_err(scope, format!("resource '{id}': {e}"));
    let entry = entry.clone();
    let payload = match resource_type {
        ResourceType::PersonnelPackage => ResourcePayload::PersonnelPackage(
            serde_json::from_value::<PersonnelPackage>(entry).map_err(detail)?,
        ),
        ResourceType::Formation => ResourcePayload::Formation(
            serde_json::from_value::<FormationDef>(entry).map_err(detail)?,
        ),
        ResourceType::ConceptOffense => ResourcePayload::ConceptOffense(
            serde_json::from_value::<ConceptDef>(entry).map_err(detail)?,
        ),
        ResourceType::ConceptDefense => ResourcePayload::ConceptDefense(
            serde_json::from_value::<ConceptDef>(entry).map_err(detail)?,
        ),
        ResourceType::CoachingPolicy => ResourcePayload::CoachingPolicy(
            serde_json::from_value::<CoachingPolicy>(entry).map_err(detail)?,
        ),
        ResourceType::TraitInfluenceProfile => ResourcePayload::TraitInfluenceProfile(
            serde_json::from_value::<TraitInfluenceProfile>(entry).map_err(detail)?,
        ),
        ResourceType::PlaybookEntry => ResourcePayload::PlaybookEntry(
            serde_json::from_value::<PlaybookEntry>(entry).map_err(detail)?,
        ),
        ResourceType::AssignmentTemplate => ResourcePayload::AssignmentTemplate(
            serde_json::from_value::<AssignmentTemplate>(entry).map_err(detail)?,
        ),
        ResourceType::RulesProfile => ResourcePayload::RulesProfile(
            serde_json::from_value::<RulesProfile>(entry).map_err(detail)?,
        ),
    };
    Ok(payload)
}
