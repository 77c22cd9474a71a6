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

//! Citizen configuration records
//!
//! A `CitizenData` is the persisted definition of a citizen, independent of
//! whether it currently has a live in-world instance. Runtime state (live
//! actor id, display entity ids, patrol progress) is owned by the engine's
//! registry, never stored here.

use crate::animation::AnimationConfig;
use crate::death::DeathConfig;
use crate::id::{CitizenId, WorldId};
use crate::math::Vec3;
use crate::message::{Channel, CitizenMessage, CommandAction, SelectionMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name display vertical offset used when no override is configured
pub const DEFAULT_NAMETAG_OFFSET: f32 = 2.2;

/// Disposition of a citizen toward players, folded into the generated
/// behavior definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Attitude {
    #[default]
    Passive,
    Neutral,
    Hostile,
}

impl Attitude {
    /// CamelCase segment used in fallback definition names
    pub fn as_name_segment(&self) -> &'static str {
        match self {
            Attitude::Passive => "Passive",
            Attitude::Neutral => "Neutral",
            Attitude::Hostile => "Hostile",
        }
    }
}

/// How a citizen moves when it has no patrol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Idle at the home anchor
    #[default]
    Stay,
    /// Wander within `wander_radius` of the home anchor
    Wander,
}

impl MovementType {
    /// CamelCase segment used in fallback definition names
    pub fn as_name_segment(&self) -> &'static str {
        match self {
            MovementType::Stay => "Stay",
            MovementType::Wander => "Wander",
        }
    }
}

/// Movement parameters carried into the behavior definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    #[serde(default)]
    pub movement_type: MovementType,
    #[serde(default = "default_wander_radius")]
    pub wander_radius: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    /// Name of a persisted patrol path to run while spawned
    #[serde(default)]
    pub patrol_path: Option<String>,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            movement_type: MovementType::Stay,
            wander_radius: default_wander_radius(),
            move_speed: default_move_speed(),
            patrol_path: None,
        }
    }
}

fn default_wander_radius() -> f32 {
    5.0
}

fn default_move_speed() -> f32 {
    1.0
}

/// Combat parameters carried into the behavior definition and applied to
/// the live actor on spawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Health override applied as an additive stat modifier on spawn
    #[serde(default)]
    pub health: Option<f32>,
    /// Invulnerable actors cancel all incoming damage
    #[serde(default)]
    pub invulnerable: bool,
    #[serde(default = "default_attack_damage")]
    pub attack_damage: f32,
    /// Radius within which a hostile citizen notices players
    #[serde(default = "default_detection_radius")]
    pub detection_radius: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            health: None,
            invulnerable: false,
            attack_damage: default_attack_damage(),
            detection_radius: default_detection_radius(),
        }
    }
}

fn default_attack_damage() -> f32 {
    1.0
}

fn default_detection_radius() -> f32 {
    10.0
}

/// What the live actor looks like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceConfig {
    /// Host model id for regular actors
    #[serde(default)]
    pub model_id: Option<String>,
    /// Username whose skin is resolved for player-appearance actors.
    /// Takes precedence over `model_id` when set.
    #[serde(default)]
    pub player_skin: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            model_id: None,
            player_skin: None,
            scale: default_scale(),
        }
    }
}

fn default_scale() -> f32 {
    1.0
}

/// Name display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NametagConfig {
    /// Hidden nametags render nothing, inline or otherwise
    #[serde(default)]
    pub hidden: bool,
    /// Vertical offset above the actor
    #[serde(default = "default_nametag_offset")]
    pub offset: f32,
}

impl Default for NametagConfig {
    fn default() -> Self {
        Self {
            hidden: false,
            offset: default_nametag_offset(),
        }
    }
}

fn default_nametag_offset() -> f32 {
    DEFAULT_NAMETAG_OFFSET
}

/// One equipment slot filled on the actor at spawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub slot: String,
    pub item_id: String,
}

/// Interaction messages, commands, and gating
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionConfig {
    #[serde(default)]
    pub messages: Vec<CitizenMessage>,
    #[serde(default)]
    pub message_selection: SelectionMode,
    #[serde(default)]
    pub commands: Vec<CommandAction>,
    #[serde(default)]
    pub command_selection: SelectionMode,
    /// Permission node the acting player must hold, if any
    #[serde(default)]
    pub permission: Option<String>,
    /// Override for the denial message sent when the permission gate fails
    #[serde(default)]
    pub permission_denied_message: Option<String>,
}

impl InteractionConfig {
    /// Whether any configured message or command resolves to the F-key
    /// channel. Drives the interactable marker on the live actor and the
    /// `_Interactable` suffix on fallback definition names.
    pub fn uses_f_key(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.trigger.matches(Channel::FKey))
            || self
                .commands
                .iter()
                .any(|c| c.trigger.matches(Channel::FKey))
    }
}

/// The persisted definition of one citizen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenData {
    pub id: CitizenId,
    /// Display name; newlines split it into multiple name-display lines
    pub name: String,
    pub world_id: WorldId,
    /// Home anchor the actor spawns at and leashes to
    pub position: Vec3,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub attitude: Attitude,
    #[serde(default)]
    pub appearance: AppearanceConfig,
    #[serde(default)]
    pub nametag: NametagConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub animations: Vec<AnimationConfig>,
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
    #[serde(default)]
    pub death: DeathConfig,
    #[serde(default)]
    pub respawn_on_death: bool,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay_seconds: f32,
    /// Group this citizen belongs to, if any
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_respawn_delay() -> f32 {
    5.0
}

impl CitizenData {
    pub fn new(name: impl Into<String>, world_id: WorldId, position: Vec3) -> Self {
        Self {
            id: CitizenId::new(),
            name: name.into(),
            world_id,
            position,
            rotation: 0.0,
            attitude: Attitude::Passive,
            appearance: AppearanceConfig::default(),
            nametag: NametagConfig::default(),
            movement: MovementConfig::default(),
            combat: CombatConfig::default(),
            interaction: InteractionConfig::default(),
            animations: Vec::new(),
            equipment: Vec::new(),
            death: DeathConfig::default(),
            respawn_on_death: false,
            respawn_delay_seconds: default_respawn_delay(),
            group: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_attitude(mut self, attitude: Attitude) -> Self {
        self.attitude = attitude;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.appearance.model_id = Some(model_id.into());
        self
    }

    pub fn with_player_skin(mut self, username: impl Into<String>) -> Self {
        self.appearance.player_skin = Some(username.into());
        self
    }

    pub fn with_movement(mut self, movement_type: MovementType, wander_radius: f32) -> Self {
        self.movement.movement_type = movement_type;
        self.movement.wander_radius = wander_radius;
        self
    }

    pub fn with_patrol_path(mut self, path: impl Into<String>) -> Self {
        self.movement.patrol_path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: CitizenMessage) -> Self {
        self.interaction.messages.push(message);
        self
    }

    pub fn with_command(mut self, command: CommandAction) -> Self {
        self.interaction.commands.push(command);
        self
    }

    pub fn with_animation(mut self, animation: AnimationConfig) -> Self {
        self.animations.push(animation);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Non-empty lines of the display name, one per display entity when
    /// separate display mode is active
    pub fn name_lines(&self) -> Vec<&str> {
        self.name
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect()
    }

    /// Inline rendering applies only for a single-line name at the default
    /// offset on a visible nametag; everything else uses display entities.
    pub fn uses_inline_nametag(&self) -> bool {
        !self.nametag.hidden
            && self.name_lines().len() == 1
            && (self.nametag.offset - DEFAULT_NAMETAG_OFFSET).abs() < f32::EPSILON
    }
}
