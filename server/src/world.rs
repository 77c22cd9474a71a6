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

//! World collaborator boundary
//!
//! The engine never owns world objects. Every mutation goes through
//! [`WorldHost`], whose implementations must funnel work into the owning
//! world's serialized execution queue; awaiting a trait method means the
//! mutation has been applied (or rejected), never that the caller held a
//! lock on world state. Actors and displays are addressed by stable ids
//! and resolved on demand.

pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use townsfolk_common::citizen::EquipmentItem;
use townsfolk_common::id::{ActorId, CitizenId, DisplayId, PlayerId, WorldId};
use townsfolk_common::math::{ChunkIndex, Vec3};

/// Stat modifier key for the configured health override. Reapplying a
/// modifier under the same key replaces it, so respawns stay idempotent.
pub const HEALTH_MODIFIER_ID: &str = "townsfolk:health_override";

/// Visual identity of an actor to construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorModel {
    /// Host model id
    Model(String),
    /// Player appearance with a resolved (or default) skin texture
    PlayerSkin {
        username: String,
        texture: Option<String>,
    },
}

/// Everything the host needs to construct one live actor
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSpawnSpec {
    pub citizen: CitizenId,
    pub model: ActorModel,
    pub position: Vec3,
    pub rotation: f32,
    pub scale: f32,
    /// Behavior definition name the actor runs under
    pub definition: String,
    /// Leash anchor the external AI keeps the actor near
    pub leash: Vec3,
    /// Inline name line, only when inline display mode applies
    pub inline_name: Option<String>,
    pub equipment: Vec<EquipmentItem>,
    pub invulnerable: bool,
    /// Additive health modifier applied under [`HEALTH_MODIFIER_ID`]
    pub health_bonus: Option<f32>,
    /// Marks the actor as accepting F-key interactions
    pub interactable: bool,
}

/// Who a command runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    Server,
    Player(PlayerId),
}

/// The game world boundary. One implementation per host environment; the
/// in-memory implementation in [`memory`] backs tests and the standalone
/// binary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldHost: Send + Sync {
    /// Whether the chunk is currently loaded. Entities can only be
    /// created or resolved inside loaded chunks.
    async fn is_chunk_loaded(&self, world: WorldId, chunk: ChunkIndex) -> bool;

    async fn spawn_actor(&self, world: WorldId, spec: ActorSpawnSpec) -> Result<ActorId>;

    async fn remove_actor(&self, world: WorldId, actor: ActorId) -> Result<()>;

    /// Whether the actor id still resolves to a live object
    async fn actor_exists(&self, world: WorldId, actor: ActorId) -> bool;

    async fn actor_position(&self, world: WorldId, actor: ActorId) -> Option<Vec3>;

    async fn set_actor_rotation(&self, world: WorldId, actor: ActorId, yaw: f32) -> Result<()>;

    /// Point the actor's movement target at a position. The host maintains
    /// the invisible target marker the external AI steers toward.
    async fn set_move_target(&self, world: WorldId, actor: ActorId, position: Vec3) -> Result<()>;

    /// Remove the actor's movement target marker, if any
    async fn clear_move_target(&self, world: WorldId, actor: ActorId) -> Result<()>;

    async fn play_animation(
        &self,
        world: WorldId,
        actor: ActorId,
        slot: &str,
        animation: &str,
    ) -> Result<()>;

    /// Spawn one name-display entity rendering a single text line
    async fn spawn_display(&self, world: WorldId, position: Vec3, text: &str)
    -> Result<DisplayId>;

    async fn move_display(&self, world: WorldId, display: DisplayId, position: Vec3)
    -> Result<()>;

    async fn remove_display(&self, world: WorldId, display: DisplayId) -> Result<()>;

    /// Drop an item stack into the world at a position
    async fn drop_items(
        &self,
        world: WorldId,
        position: Vec3,
        item_id: &str,
        quantity: u32,
    ) -> Result<()>;

    /// Connected players in a world with their current positions
    async fn players_in_world(&self, world: WorldId) -> Vec<(PlayerId, Vec3)>;

    async fn player_name(&self, player: PlayerId) -> Option<String>;

    async fn has_permission(&self, player: PlayerId, permission: &str) -> bool;

    async fn send_message(&self, player: PlayerId, message: &str) -> Result<()>;

    async fn run_command(&self, origin: CommandOrigin, command: &str) -> Result<()>;
}

/// Behavior-definition index collaborator. Freshly written definitions are
/// not indexed until the host hot-reloads them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefinitionIndex: Send + Sync {
    /// Index of a registered definition name, or `None` when not (yet)
    /// known to the host
    async fn index_of(&self, definition: &str) -> Option<u32>;
}

/// Skin/appearance lookup collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkinProvider: Send + Sync {
    /// Resolve a username to a skin texture, `None` when lookup fails
    async fn resolve(&self, username: &str) -> Option<String>;
}
