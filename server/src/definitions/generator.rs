//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Definition document generation
//!
//! Pure functions from a citizen record to its behavior document and its
//! definition names. Serialization is canonical (stable key order, stable
//! formatting) so unchanged configuration always produces byte-identical
//! output.

use serde_json::{Value, json};
use townsfolk_common::citizen::{CitizenData, MovementType};
use townsfolk_common::id::CitizenId;

/// Deterministic definition name for a citizen's generated document
pub fn definition_name(id: CitizenId) -> String {
    format!("Citizen_{}_Def", id.as_simple())
}

/// File name the document is written under
pub fn definition_file_name(id: CitizenId) -> String {
    format!("{}.json", definition_name(id))
}

/// Wander radius folded into the fallback bucket. `Stay` citizens idle in
/// place, so their effective radius is zero regardless of configuration.
pub fn effective_radius(citizen: &CitizenData) -> f32 {
    match citizen.movement.movement_type {
        MovementType::Stay => 0.0,
        MovementType::Wander => citizen.movement.wander_radius,
    }
}

/// Monotonic step function mapping a wander radius onto one of the
/// pre-registered fallback radii. Breakpoints are fixed; they select which
/// static fallback definition an unindexed citizen runs under.
pub fn radius_bucket(radius: f32) -> u32 {
    if radius < 1.0 {
        0
    } else if radius < 2.0 {
        1
    } else if radius < 3.0 {
        2
    } else if radius <= 7.0 {
        5
    } else if radius <= 12.0 {
        10
    } else {
        15
    }
}

/// Static fallback definition name for a citizen whose generated document
/// is not yet indexed by the host
pub fn fallback_name(citizen: &CitizenData) -> String {
    let mut name = format!(
        "Citizen_{}_{}_R{}",
        citizen.movement.movement_type.as_name_segment(),
        citizen.attitude.as_name_segment(),
        radius_bucket(effective_radius(citizen)),
    );
    if citizen.interaction.uses_f_key() {
        name.push_str("_Interactable");
    }
    name
}

/// Generate the behavior document for a citizen: the idle variant for
/// `Stay` citizens, otherwise the parameterized variant carrying combat,
/// detection, path, and movement parameters.
pub fn generate_document(citizen: &CitizenData) -> Value {
    match citizen.movement.movement_type {
        MovementType::Stay => idle_document(citizen),
        MovementType::Wander => variant_document(citizen),
    }
}

/// Canonical serialized form of the behavior document
pub fn serialize_document(document: &Value) -> String {
    // Map keys serialize in sorted order and to_string_pretty is stable,
    // so identical configuration yields byte-identical text
    let mut text = serde_json::to_string_pretty(document).unwrap_or_default();
    text.push('\n');
    text
}

fn idle_document(citizen: &CitizenData) -> Value {
    json!({
        "Name": definition_name(citizen.id),
        "Base": "Citizen_Idle",
        "Parameters": {
            "Attitude": { "Value": citizen.attitude.as_name_segment() },
            "Interactable": { "Value": citizen.interaction.uses_f_key() },
        },
    })
}

fn variant_document(citizen: &CitizenData) -> Value {
    json!({
        "Name": definition_name(citizen.id),
        "Base": "Citizen_Variant",
        "Parameters": {
            "Attitude": { "Value": citizen.attitude.as_name_segment() },
            "Interactable": { "Value": citizen.interaction.uses_f_key() },
            "AttackDamage": { "Value": citizen.combat.attack_damage },
            "DetectionRadius": {
                "Value": citizen.combat.detection_radius,
                "Range": [0.0, 64.0],
            },
            "MoveSpeed": { "Value": citizen.movement.move_speed },
            "WanderRadius": {
                "Value": citizen.movement.wander_radius,
                "Range": [0.0, 64.0],
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use townsfolk_common::citizen::Attitude;
    use townsfolk_common::id::WorldId;
    use townsfolk_common::math::Vec3;
    use townsfolk_common::message::{Channel, CitizenMessage};

    fn sample() -> CitizenData {
        CitizenData::new("Guard", WorldId::new(), Vec3::new(0.0, 64.0, 0.0))
    }

    #[test]
    fn test_radius_buckets() {
        assert_eq!(radius_bucket(0.0), 0);
        assert_eq!(radius_bucket(0.9), 0);
        assert_eq!(radius_bucket(1.0), 1);
        assert_eq!(radius_bucket(1.9), 1);
        assert_eq!(radius_bucket(2.0), 2);
        assert_eq!(radius_bucket(2.9), 2);
        assert_eq!(radius_bucket(3.0), 5);
        assert_eq!(radius_bucket(7.0), 5);
        assert_eq!(radius_bucket(7.1), 10);
        assert_eq!(radius_bucket(12.0), 10);
        assert_eq!(radius_bucket(12.1), 15);
        assert_eq!(radius_bucket(100.0), 15);
    }

    #[test]
    fn test_fallback_name_wander_passive_interactable() {
        let citizen = sample()
            .with_attitude(Attitude::Passive)
            .with_movement(MovementType::Wander, 6.0)
            .with_message(CitizenMessage::new("Hello").with_trigger(Channel::FKey));
        assert_eq!(fallback_name(&citizen), "Citizen_Wander_Passive_R5_Interactable");
    }

    #[test]
    fn test_fallback_name_stay_ignores_radius() {
        let mut citizen = sample().with_attitude(Attitude::Hostile);
        citizen.movement.wander_radius = 12.0;
        assert_eq!(fallback_name(&citizen), "Citizen_Stay_Hostile_R0");
    }

    #[test]
    fn test_definition_name_is_deterministic() {
        let citizen = sample();
        assert_eq!(definition_name(citizen.id), definition_name(citizen.id));
        assert!(definition_name(citizen.id).starts_with("Citizen_"));
        assert!(definition_name(citizen.id).ends_with("_Def"));
    }

    #[test]
    fn test_serialization_is_stable() {
        let citizen = sample().with_movement(MovementType::Wander, 4.0);
        let first = serialize_document(&generate_document(&citizen));
        let second = serialize_document(&generate_document(&citizen));
        assert_eq!(first, second);
    }

    #[test]
    fn test_idle_vs_variant_documents() {
        let idle = generate_document(&sample());
        assert_eq!(idle["Base"], "Citizen_Idle");
        assert!(idle["Parameters"].get("WanderRadius").is_none());

        let variant = generate_document(&sample().with_movement(MovementType::Wander, 4.0));
        assert_eq!(variant["Base"], "Citizen_Variant");
        assert_eq!(variant["Parameters"]["WanderRadius"]["Value"], 4.0);
    }
}
