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

//! Animation behavior configuration

use serde::{Deserialize, Serialize};

/// When a configured animation plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimationTrigger {
    /// Continuously playing idle animation. The playback primitive does not
    /// loop on its own, so the scheduler re-triggers it on a short cadence.
    Default,
    /// Plays on its own configured interval
    Timed,
    /// Fires once when a player crosses into the radius
    OnProximityEnter,
    /// Fires once when a player crosses out of the radius
    OnProximityExit,
    /// Fires when the citizen takes (non-cancelled) damage
    OnAttack,
    /// Fires once right after the actor spawns
    OnSpawn,
}

/// One configured animation behavior on a citizen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Host animation name to play
    pub animation: String,
    /// Playback slot; concurrent slots animate independently
    #[serde(default = "default_slot")]
    pub slot: String,
    pub trigger: AnimationTrigger,
    /// Interval for `Timed` triggers, seconds
    #[serde(default)]
    pub interval_seconds: f32,
    /// Detection radius for proximity triggers, world units
    #[serde(default)]
    pub radius: f32,
    /// If set, a stop animation plays this many seconds after each trigger
    #[serde(default)]
    pub stop_after_seconds: Option<f32>,
    /// Explicit stop animation. Absent, the citizen's own `Default`
    /// animation for the slot is used, then a generic idle fallback.
    #[serde(default)]
    pub stop_animation: Option<String>,
}

impl AnimationConfig {
    pub fn new(animation: impl Into<String>, trigger: AnimationTrigger) -> Self {
        Self {
            animation: animation.into(),
            slot: default_slot(),
            trigger,
            interval_seconds: 0.0,
            radius: 0.0,
            stop_after_seconds: None,
            stop_animation: None,
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    pub fn with_interval(mut self, seconds: f32) -> Self {
        self.interval_seconds = seconds;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_stop_after(mut self, seconds: f32) -> Self {
        self.stop_after_seconds = Some(seconds);
        self
    }

    pub fn with_stop_animation(mut self, animation: impl Into<String>) -> Self {
        self.stop_animation = Some(animation.into());
        self
    }
}

fn default_slot() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let anim = AnimationConfig::new("Wave", AnimationTrigger::OnProximityEnter)
            .with_radius(8.0)
            .with_stop_after(3.0);
        assert_eq!(anim.animation, "Wave");
        assert_eq!(anim.slot, "default");
        assert_eq!(anim.radius, 8.0);
        assert_eq!(anim.stop_after_seconds, Some(3.0));
        assert!(anim.stop_animation.is_none());
    }

    #[test]
    fn test_trigger_serialized_form() {
        let json = serde_json::to_string(&AnimationTrigger::OnProximityEnter).unwrap();
        assert_eq!(json, "\"ON_PROXIMITY_ENTER\"");
    }
}
