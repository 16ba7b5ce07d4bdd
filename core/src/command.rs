//! Typed payloads for every registered action kind.
//!
//! Payloads arrive as JSON objects. Fields are added over time, never
//! removed or renamed: older clients must keep parsing.

use crate::{
    action::{reject, ActionFailure},
    types::{BuildingId, WallId},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPayload {
    pub building_type: String,
    pub x: i64,
    pub y: i64,
}

/// Exactly one of `building_id` / `wall_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePayload {
    #[serde(default)]
    pub building_id: Option<BuildingId>,
    #[serde(default)]
    pub wall_id: Option<WallId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    pub building_id: BuildingId,
    pub x: i64,
    pub y: i64,
}

/// Accepts a single `building_id`, a `building_ids` batch, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemolishPayload {
    #[serde(default)]
    pub building_id: Option<BuildingId>,
    #[serde(default)]
    pub building_ids: Vec<BuildingId>,
}

impl DemolishPayload {
    /// Requested ids in order, duplicates dropped.
    pub fn ids(&self) -> Vec<BuildingId> {
        let mut ids = Vec::new();
        for id in self.building_id.iter().chain(self.building_ids.iter()) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWallPayload {
    #[serde(alias = "wall_generation")]
    pub generation: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTroopsPayload {
    pub combatant_type: String,
    #[serde(default = "one")]
    pub level: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointOfficialPayload {
    pub role: String,
    /// Pin a template. When absent one is drawn from the eligible set.
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {}

fn one() -> i64 { 1 }

/// Decode a payload, turning a shape mismatch into `invalid_payload`.
/// A null payload decodes as an empty object.
pub fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ActionFailure> {
    let value = if payload.is_null() { Value::Object(Default::default()) } else { payload.clone() };
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => reject("invalid_payload", format!("Invalid payload: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn train_defaults_to_one_level_one_unit() {
        let p: TrainTroopsPayload = parse_payload(&json!({ "combatant_type": "militia" })).unwrap();
        assert_eq!((p.level, p.quantity), (1, 1));
    }

    #[test]
    fn demolish_merges_single_and_batch_ids() {
        let p: DemolishPayload = parse_payload(&json!({ "building_id": 3, "building_ids": [1, 3, 2] })).unwrap();
        assert_eq!(p.ids(), vec![3, 1, 2]);
    }

    #[test]
    fn wall_generation_is_accepted_as_an_alias() {
        let p: BuildWallPayload = parse_payload(&json!({ "wall_generation": 2 })).unwrap();
        assert_eq!(p.generation, 2);
        let p: BuildWallPayload = parse_payload(&json!({ "generation": 1 })).unwrap();
        assert_eq!(p.generation, 1);
    }

    #[test]
    fn missing_field_is_invalid_payload() {
        let err = parse_payload::<BuildPayload>(&json!({ "x": 1 })).unwrap_err();
        assert_eq!(err.code(), "invalid_payload");
        assert!(parse_payload::<SyncPayload>(&Value::Null).is_ok());
    }
}
