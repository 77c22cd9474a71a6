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

//! In-memory world host
//!
//! Backs the standalone binary and the test suites. Entities live in a
//! `hecs::World` behind a single async write lock, which stands in for the
//! host's serialized per-world execution queue: every mutation acquires the
//! write lock, so mutations are applied one at a time in submission order.

use crate::error::{CitizensError, Result};
use crate::world::{
    ActorModel, ActorSpawnSpec, CommandOrigin, DefinitionIndex, SkinProvider, WorldHost,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use tokio::sync::RwLock;
use townsfolk_common::citizen::EquipmentItem;
use townsfolk_common::id::{ActorId, CitizenId, DisplayId, PlayerId, WorldId};
use townsfolk_common::math::{ChunkIndex, Vec3};

/// Position component
#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec3);

/// Yaw component, degrees
#[derive(Debug, Clone, Copy)]
pub struct Rotation(pub f32);

/// Marks an entity as the live actor of a citizen
#[derive(Debug, Clone, Copy)]
pub struct CitizenActor(pub CitizenId);

/// One rendered name line
#[derive(Debug, Clone)]
pub struct DisplayText(pub String);

/// Movement target the external AI steers toward
#[derive(Debug, Clone, Copy)]
pub struct MoveTarget(pub Vec3);

/// Actor construction details retained for inspection
#[derive(Debug, Clone)]
pub struct ActorState {
    pub model: ActorModel,
    pub definition: String,
    pub leash: Vec3,
    pub inline_name: Option<String>,
    pub equipment: Vec<EquipmentItem>,
    pub invulnerable: bool,
    pub health_bonus: Option<f32>,
    pub interactable: bool,
    pub scale: f32,
}

#[derive(Debug, Clone)]
struct PlayerEntry {
    world: WorldId,
    name: String,
    position: Vec3,
}

pub type ChunkLoadHook = Box<dyn Fn(WorldId, ChunkIndex) + Send + Sync>;

/// An in-memory [`WorldHost`] that also provides the definition index and
/// skin lookup collaborators. Test helpers record every outbound side
/// effect (messages, commands, animations, drops) for assertion.
pub struct MemoryWorld {
    entities: Arc<RwLock<hecs::World>>,
    actors: DashMap<ActorId, hecs::Entity>,
    displays: DashMap<DisplayId, hecs::Entity>,
    actor_worlds: DashMap<ActorId, WorldId>,
    display_worlds: DashMap<DisplayId, WorldId>,
    loaded_chunks: DashMap<WorldId, HashSet<ChunkIndex>>,
    chunk_hooks: StdRwLock<Vec<ChunkLoadHook>>,
    players: DashMap<PlayerId, PlayerEntry>,
    permissions: DashMap<PlayerId, HashSet<String>>,
    definitions: DashMap<String, u32>,
    next_definition_index: AtomicU32,
    skins: DashMap<String, String>,
    sent_messages: Mutex<Vec<(PlayerId, String)>>,
    run_commands: Mutex<Vec<(CommandOrigin, String)>>,
    played_animations: Mutex<Vec<(ActorId, String, String)>>,
    dropped_items: Mutex<Vec<(WorldId, String, u32)>>,
    /// When set, chunk checks always pass; convenient for tests that do not
    /// exercise chunk availability
    all_chunks_loaded: std::sync::atomic::AtomicBool,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(hecs::World::new())),
            actors: DashMap::new(),
            displays: DashMap::new(),
            actor_worlds: DashMap::new(),
            display_worlds: DashMap::new(),
            loaded_chunks: DashMap::new(),
            chunk_hooks: StdRwLock::new(Vec::new()),
            players: DashMap::new(),
            permissions: DashMap::new(),
            definitions: DashMap::new(),
            next_definition_index: AtomicU32::new(1),
            skins: DashMap::new(),
            sent_messages: Mutex::new(Vec::new()),
            run_commands: Mutex::new(Vec::new()),
            played_animations: Mutex::new(Vec::new()),
            dropped_items: Mutex::new(Vec::new()),
            all_chunks_loaded: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Treat every chunk as loaded
    pub fn load_everything(&self) {
        self.all_chunks_loaded.store(true, Ordering::SeqCst);
    }

    /// Drop back to explicit per-chunk loading
    pub fn unload_everything(&self) {
        self.all_chunks_loaded.store(false, Ordering::SeqCst);
    }

    /// Mark a chunk loaded and fire chunk-availability hooks
    pub fn load_chunk(&self, world: WorldId, chunk: ChunkIndex) {
        self.loaded_chunks.entry(world).or_default().insert(chunk);
        let hooks = self.chunk_hooks.read().unwrap();
        for hook in hooks.iter() {
            hook(world, chunk);
        }
    }

    pub fn unload_chunk(&self, world: WorldId, chunk: ChunkIndex) {
        if let Some(mut chunks) = self.loaded_chunks.get_mut(&world) {
            chunks.remove(&chunk);
        }
    }

    /// Register a callback fired whenever a chunk becomes available
    pub fn on_chunk_load<F>(&self, hook: F)
    where
        F: Fn(WorldId, ChunkIndex) + Send + Sync + 'static,
    {
        self.chunk_hooks.write().unwrap().push(Box::new(hook));
    }

    /// Add a connected player, returning its id
    pub fn add_player(&self, world: WorldId, name: impl Into<String>, position: Vec3) -> PlayerId {
        let id = PlayerId::new();
        self.players.insert(
            id,
            PlayerEntry {
                world,
                name: name.into(),
                position,
            },
        );
        id
    }

    pub fn move_player(&self, player: PlayerId, position: Vec3) {
        if let Some(mut entry) = self.players.get_mut(&player) {
            entry.position = position;
        }
    }

    pub fn grant_permission(&self, player: PlayerId, permission: impl Into<String>) {
        self.permissions
            .entry(player)
            .or_default()
            .insert(permission.into());
    }

    /// Register a definition name with the index, as the host's hot reload
    /// would
    pub fn register_definition(&self, name: impl Into<String>) -> u32 {
        let index = self.next_definition_index.fetch_add(1, Ordering::SeqCst);
        self.definitions.insert(name.into(), index);
        index
    }

    pub fn put_skin(&self, username: impl Into<String>, texture: impl Into<String>) {
        self.skins.insert(username.into(), texture.into());
    }

    /// Detached handle for the live actor of a citizen, if any
    pub async fn actor_state(&self, actor: ActorId) -> Option<ActorState> {
        let entity = *self.actors.get(&actor)?;
        let entities = self.entities.read().await;
        entities.get::<&ActorState>(entity).ok().map(|s| (*s).clone())
    }

    pub async fn move_target_of(&self, actor: ActorId) -> Option<Vec3> {
        let entity = *self.actors.get(&actor)?;
        let entities = self.entities.read().await;
        entities.get::<&MoveTarget>(entity).ok().map(|t| t.0)
    }

    pub async fn actor_rotation(&self, actor: ActorId) -> Option<f32> {
        let entity = *self.actors.get(&actor)?;
        let entities = self.entities.read().await;
        entities.get::<&Rotation>(entity).ok().map(|r| r.0)
    }

    /// Teleport an actor, standing in for the host AI moving it
    pub async fn teleport_actor(&self, actor: ActorId, position: Vec3) {
        let Some(entity) = self.actors.get(&actor).map(|e| *e) else {
            return;
        };
        let mut entities = self.entities.write().await;
        if let Ok(mut stored) = entities.get::<&mut Position>(entity) {
            stored.0 = position;
        }
    }

    pub async fn display_position(&self, display: DisplayId) -> Option<Vec3> {
        let entity = *self.displays.get(&display)?;
        let entities = self.entities.read().await;
        entities.get::<&Position>(entity).ok().map(|p| p.0)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn display_count(&self) -> usize {
        self.displays.len()
    }

    pub fn sent_messages(&self) -> Vec<(PlayerId, String)> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn run_commands(&self) -> Vec<(CommandOrigin, String)> {
        self.run_commands.lock().unwrap().clone()
    }

    pub fn played_animations(&self) -> Vec<(ActorId, String, String)> {
        self.played_animations.lock().unwrap().clone()
    }

    pub fn dropped_items(&self) -> Vec<(WorldId, String, u32)> {
        self.dropped_items.lock().unwrap().clone()
    }

    fn resolve_actor(&self, actor: ActorId) -> Result<hecs::Entity> {
        self.actors
            .get(&actor)
            .map(|e| *e)
            .ok_or(CitizensError::StaleActor(actor))
    }
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorldHost for MemoryWorld {
    async fn is_chunk_loaded(&self, world: WorldId, chunk: ChunkIndex) -> bool {
        if self.all_chunks_loaded.load(Ordering::SeqCst) {
            return true;
        }
        self.loaded_chunks
            .get(&world)
            .map(|chunks| chunks.contains(&chunk))
            .unwrap_or(false)
    }

    async fn spawn_actor(&self, world: WorldId, spec: ActorSpawnSpec) -> Result<ActorId> {
        if !self.is_chunk_loaded(world, spec.position.chunk()).await {
            return Err(CitizensError::ChunkUnloaded {
                world,
                chunk: spec.position.chunk(),
            });
        }

        let mut entities = self.entities.write().await;
        let entity = entities.spawn((
            Position(spec.position),
            Rotation(spec.rotation),
            CitizenActor(spec.citizen),
            ActorState {
                model: spec.model,
                definition: spec.definition,
                leash: spec.leash,
                inline_name: spec.inline_name,
                equipment: spec.equipment,
                invulnerable: spec.invulnerable,
                health_bonus: spec.health_bonus,
                interactable: spec.interactable,
                scale: spec.scale,
            },
        ));
        drop(entities);

        let id = ActorId::new();
        self.actors.insert(id, entity);
        self.actor_worlds.insert(id, world);
        Ok(id)
    }

    async fn remove_actor(&self, world: WorldId, actor: ActorId) -> Result<()> {
        let entity = self.resolve_actor(actor)?;
        let position = {
            let entities = self.entities.read().await;
            entities
                .get::<&Position>(entity)
                .map(|p| p.0)
                .map_err(|_| CitizensError::StaleActor(actor))?
        };
        if !self.is_chunk_loaded(world, position.chunk()).await {
            return Err(CitizensError::ChunkUnloaded {
                world,
                chunk: position.chunk(),
            });
        }

        let mut entities = self.entities.write().await;
        let _ = entities.despawn(entity);
        drop(entities);
        self.actors.remove(&actor);
        self.actor_worlds.remove(&actor);
        Ok(())
    }

    async fn actor_exists(&self, _world: WorldId, actor: ActorId) -> bool {
        self.actors.contains_key(&actor)
    }

    async fn actor_position(&self, _world: WorldId, actor: ActorId) -> Option<Vec3> {
        let entity = *self.actors.get(&actor)?;
        let entities = self.entities.read().await;
        entities.get::<&Position>(entity).ok().map(|p| p.0)
    }

    async fn set_actor_rotation(&self, _world: WorldId, actor: ActorId, yaw: f32) -> Result<()> {
        let entity = self.resolve_actor(actor)?;
        let mut entities = self.entities.write().await;
        if let Ok(mut rotation) = entities.get::<&mut Rotation>(entity) {
            rotation.0 = yaw;
        }
        Ok(())
    }

    async fn set_move_target(&self, _world: WorldId, actor: ActorId, position: Vec3) -> Result<()> {
        let entity = self.resolve_actor(actor)?;
        let mut entities = self.entities.write().await;
        entities
            .insert_one(entity, MoveTarget(position))
            .map_err(|_| CitizensError::StaleActor(actor))?;
        Ok(())
    }

    async fn clear_move_target(&self, _world: WorldId, actor: ActorId) -> Result<()> {
        let entity = self.resolve_actor(actor)?;
        let mut entities = self.entities.write().await;
        let _ = entities.remove_one::<MoveTarget>(entity);
        Ok(())
    }

    async fn play_animation(
        &self,
        _world: WorldId,
        actor: ActorId,
        slot: &str,
        animation: &str,
    ) -> Result<()> {
        self.resolve_actor(actor)?;
        self.played_animations
            .lock()
            .unwrap()
            .push((actor, slot.to_string(), animation.to_string()));
        Ok(())
    }

    async fn spawn_display(
        &self,
        world: WorldId,
        position: Vec3,
        text: &str,
    ) -> Result<DisplayId> {
        if !self.is_chunk_loaded(world, position.chunk()).await {
            return Err(CitizensError::ChunkUnloaded {
                world,
                chunk: position.chunk(),
            });
        }
        let mut entities = self.entities.write().await;
        let entity = entities.spawn((Position(position), DisplayText(text.to_string())));
        drop(entities);
        let id = DisplayId::new();
        self.displays.insert(id, entity);
        self.display_worlds.insert(id, world);
        Ok(id)
    }

    async fn move_display(
        &self,
        _world: WorldId,
        display: DisplayId,
        position: Vec3,
    ) -> Result<()> {
        let entity = self
            .displays
            .get(&display)
            .map(|e| *e)
            .ok_or(CitizensError::Storage(format!("unknown display {display}")))?;
        let mut entities = self.entities.write().await;
        if let Ok(mut pos) = entities.get::<&mut Position>(entity) {
            pos.0 = position;
        }
        Ok(())
    }

    async fn remove_display(&self, world: WorldId, display: DisplayId) -> Result<()> {
        let entity = self
            .displays
            .get(&display)
            .map(|e| *e)
            .ok_or(CitizensError::Storage(format!("unknown display {display}")))?;
        let position = {
            let entities = self.entities.read().await;
            entities.get::<&Position>(entity).map(|p| p.0).ok()
        };
        if let Some(position) = position {
            if !self.is_chunk_loaded(world, position.chunk()).await {
                return Err(CitizensError::ChunkUnloaded {
                    world,
                    chunk: position.chunk(),
                });
            }
        }
        let mut entities = self.entities.write().await;
        let _ = entities.despawn(entity);
        drop(entities);
        self.displays.remove(&display);
        self.display_worlds.remove(&display);
        Ok(())
    }

    async fn drop_items(
        &self,
        world: WorldId,
        _position: Vec3,
        item_id: &str,
        quantity: u32,
    ) -> Result<()> {
        self.dropped_items
            .lock()
            .unwrap()
            .push((world, item_id.to_string(), quantity));
        Ok(())
    }

    async fn players_in_world(&self, world: WorldId) -> Vec<(PlayerId, Vec3)> {
        self.players
            .iter()
            .filter(|entry| entry.value().world == world)
            .map(|entry| (*entry.key(), entry.value().position))
            .collect()
    }

    async fn player_name(&self, player: PlayerId) -> Option<String> {
        self.players.get(&player).map(|entry| entry.name.clone())
    }

    async fn has_permission(&self, player: PlayerId, permission: &str) -> bool {
        self.permissions
            .get(&player)
            .map(|perms| perms.contains(permission))
            .unwrap_or(false)
    }

    async fn send_message(&self, player: PlayerId, message: &str) -> Result<()> {
        self.sent_messages
            .lock()
            .unwrap()
            .push((player, message.to_string()));
        Ok(())
    }

    async fn run_command(&self, origin: CommandOrigin, command: &str) -> Result<()> {
        self.run_commands
            .lock()
            .unwrap()
            .push((origin, command.to_string()));
        Ok(())
    }
}

#[async_trait]
impl DefinitionIndex for MemoryWorld {
    async fn index_of(&self, definition: &str) -> Option<u32> {
        self.definitions.get(definition).map(|index| *index)
    }
}

#[async_trait]
impl SkinProvider for MemoryWorld {
    async fn resolve(&self, username: &str) -> Option<String> {
        self.skins.get(username).map(|texture| texture.clone())
    }
}
