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

//! Lifecycle orchestration
//!
//! Spawning and despawning of live actors and their name displays. A spawn
//! always despawns any existing actor first, so respawns are idempotent,
//! and runs under the per-citizen spawning guard so concurrent requests
//! collapse into one. Chunk availability is polled with a bounded timeout;
//! removals that cannot run because a chunk unloaded are parked in the
//! pending-removal queue.

pub mod removal;

use crate::context::EngineContext;
use crate::definitions::DefinitionResolution;
use crate::error::{CitizensError, Result};
use crate::events::CitizenEvent;
use crate::patrol::PatrolEngine;
use crate::world::{ActorModel, ActorSpawnSpec};
use dashmap::DashMap;
use removal::PendingRemovalQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use townsfolk_common::animation::AnimationTrigger;
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::CitizenId;
use townsfolk_common::math::{ChunkIndex, Vec3};

/// Poll cadence while waiting for a citizen's home chunk to load
pub const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a spawn waits for the home chunk before giving up
pub const SPAWN_TIMEOUT: Duration = Duration::from_secs(15);
/// Delay before rechecking whether a freshly generated definition got indexed
pub const DEFINITION_RECHECK_DELAY: Duration = Duration::from_secs(5);
/// Vertical spacing between stacked name-display lines
pub const DISPLAY_LINE_SPACING: f32 = 0.3;

/// Spawns and despawns citizens against the world boundary
pub struct LifecycleOrchestrator {
    ctx: Arc<EngineContext>,
    patrols: Arc<PatrolEngine>,
    removals: Arc<PendingRemovalQueue>,
    recheck_tasks: DashMap<CitizenId, JoinHandle<()>>,
    respawn_tasks: DashMap<CitizenId, JoinHandle<()>>,
}

impl LifecycleOrchestrator {
    pub fn new(ctx: Arc<EngineContext>, patrols: Arc<PatrolEngine>) -> Arc<Self> {
        let removals = Arc::new(PendingRemovalQueue::new(ctx.world_arc()));
        Arc::new(Self {
            ctx,
            patrols,
            removals,
            recheck_tasks: DashMap::new(),
            respawn_tasks: DashMap::new(),
        })
    }

    pub fn removals(&self) -> &Arc<PendingRemovalQueue> {
        &self.removals
    }

    /// Add a new citizen: persist it, register it, generate its definition,
    /// and spawn it
    pub async fn add_citizen(self: &Arc<Self>, citizen: CitizenData) -> Result<()> {
        let id = citizen.id;
        self.ctx.store().save_citizen(&citizen)?;
        self.ctx.registry().add(citizen);
        self.ctx.registry().rebuild_indices();
        self.spawn_citizen(id).await
    }

    /// Apply a configuration change. The definition is regenerated and the
    /// citizen respawned only when the generated document actually changed;
    /// otherwise the live actor is left alone.
    pub async fn update_citizen<F>(self: &Arc<Self>, id: CitizenId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut CitizenData),
    {
        let updated = self.ctx.registry().update(id, mutate)?;
        {
            let _batch = self.ctx.store().begin_batch();
            self.ctx.store().save_citizen(&updated)?;
        }
        if self.ctx.definitions().regenerate(&updated)? {
            tracing::debug!(citizen = %id, "Definition changed, respawning");
            self.spawn_citizen(id).await?;
        }
        Ok(())
    }

    /// Delete a citizen: despawn it, drop its record, its persisted entry,
    /// and its definition file
    pub async fn remove_citizen(self: &Arc<Self>, id: CitizenId) -> Result<()> {
        self.despawn_citizen(id).await;
        self.ctx.registry().remove(id)?;
        self.ctx.registry().rebuild_indices();
        self.ctx.store().delete_citizen(id)?;
        if let Err(e) = self.ctx.definitions().delete(id) {
            tracing::warn!(citizen = %id, "Failed to delete definition file: {}", e);
        }
        self.ctx.events().publish(CitizenEvent::Removed { citizen: id });
        self.ctx.events().process_events();
        Ok(())
    }

    /// Spawn a citizen's live actor, despawning any existing one first.
    /// Concurrent requests for the same citizen collapse into the first.
    pub async fn spawn_citizen(self: &Arc<Self>, id: CitizenId) -> Result<()> {
        let citizen = self
            .ctx
            .registry()
            .get(id)
            .ok_or(CitizensError::UnknownCitizen(id))?;

        if !self.ctx.registry().try_begin_spawn(id) {
            tracing::debug!(citizen = %id, "Spawn already in flight, collapsing request");
            return Ok(());
        }
        let result = self.spawn_guarded(&citizen).await;
        self.ctx.registry().end_spawn(id);

        if let Err(e) = &result {
            tracing::warn!(citizen = %id, "Spawn aborted: {}", e);
        }
        result
    }

    async fn spawn_guarded(self: &Arc<Self>, citizen: &CitizenData) -> Result<()> {
        let world = citizen.world_id;
        let chunk = citizen.position.chunk();

        self.wait_for_chunk(world, chunk).await?;

        // Idempotent respawn: always fully tear down the previous actor
        // before the new spawn is queued
        self.despawn_for_respawn(citizen.id).await;

        let resolution = self
            .ctx
            .definitions()
            .resolve(citizen, self.ctx.definition_index())
            .await?;
        if let DefinitionResolution::Fallback { generated, .. } = &resolution {
            self.schedule_definition_recheck(citizen.id, generated.clone());
        }

        let model = self.resolve_model(citizen).await?;
        let spec = ActorSpawnSpec {
            citizen: citizen.id,
            model,
            position: citizen.position,
            rotation: citizen.rotation,
            scale: citizen.appearance.scale,
            definition: resolution.spawn_name().to_string(),
            leash: citizen.position,
            inline_name: if citizen.uses_inline_nametag() {
                citizen.name_lines().first().map(|line| line.to_string())
            } else {
                None
            },
            equipment: citizen.equipment.clone(),
            invulnerable: citizen.combat.invulnerable
                || citizen.attitude == townsfolk_common::citizen::Attitude::Passive,
            health_bonus: citizen.combat.health,
            interactable: citizen.interaction.uses_f_key(),
        };

        let actor = self.ctx.world().spawn_actor(world, spec).await?;
        self.ctx.registry().set_actor(citizen.id, Some(actor));
        self.ctx
            .registry()
            .set_current_position(citizen.id, citizen.position);
        tracing::info!(citizen = %citizen.id, %actor, "Spawned citizen");

        self.spawn_displays(citizen).await;

        for animation in &citizen.animations {
            if animation.trigger == AnimationTrigger::OnSpawn {
                if let Err(e) = self
                    .ctx
                    .world()
                    .play_animation(world, actor, &animation.slot, &animation.animation)
                    .await
                {
                    tracing::warn!(citizen = %citizen.id, "On-spawn animation failed: {}", e);
                }
            }
        }

        if let Some(path) = &citizen.movement.patrol_path {
            if let Err(e) = self.patrols.start_patrol(citizen.id, path).await {
                tracing::warn!(citizen = %citizen.id, path, "Failed to start patrol: {}", e);
            }
        }

        self.ctx.events().publish(CitizenEvent::Spawned {
            citizen: citizen.id,
            actor,
        });
        self.ctx.events().process_events();
        Ok(())
    }

    async fn wait_for_chunk(&self, world: townsfolk_common::id::WorldId, chunk: ChunkIndex) -> Result<()> {
        let deadline = tokio::time::Instant::now() + SPAWN_TIMEOUT;
        loop {
            if self.ctx.world().is_chunk_loaded(world, chunk).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CitizensError::ChunkTimeout { world, chunk });
            }
            tokio::time::sleep(SPAWN_POLL_INTERVAL).await;
        }
    }

    async fn resolve_model(&self, citizen: &CitizenData) -> Result<ActorModel> {
        if let Some(username) = &citizen.appearance.player_skin {
            let texture = self.ctx.skins().resolve(username).await;
            if texture.is_none() {
                tracing::debug!(citizen = %citizen.id, username, "Skin lookup failed, using default");
            }
            return Ok(ActorModel::PlayerSkin {
                username: username.clone(),
                texture,
            });
        }
        if let Some(model_id) = &citizen.appearance.model_id {
            return Ok(ActorModel::Model(model_id.clone()));
        }
        Err(CitizensError::UnresolvableAppearance(citizen.id))
    }

    /// Spawn one display entity per non-empty name line, top line highest
    async fn spawn_displays(&self, citizen: &CitizenData) {
        if citizen.uses_inline_nametag() || citizen.nametag.hidden {
            return;
        }
        let lines = citizen.name_lines();
        if lines.is_empty() {
            return;
        }
        if !self.ctx.registry().try_begin_display_spawn(citizen.id) {
            return;
        }

        let mut displays = Vec::with_capacity(lines.len());
        let base = citizen.position.with_y_offset(citizen.nametag.offset);
        for (index, line) in lines.iter().enumerate() {
            let position =
                base.with_y_offset((lines.len() - 1 - index) as f32 * DISPLAY_LINE_SPACING);
            match self
                .ctx
                .world()
                .spawn_display(citizen.world_id, position, line)
                .await
            {
                Ok(display) => displays.push(display),
                Err(e) => {
                    tracing::warn!(citizen = %citizen.id, "Failed to spawn name display: {}", e);
                    break;
                }
            }
        }
        self.ctx.registry().set_displays(citizen.id, displays);
        self.ctx.registry().end_display_spawn(citizen.id);
    }

    /// Tear down the live actor and displays without releasing the spawning
    /// guard, used inside a guarded respawn
    async fn despawn_for_respawn(&self, id: CitizenId) {
        self.patrols.stop_patrol(id).await;

        let citizen = self.ctx.registry().get(id);
        let world = match &citizen {
            Some(c) => c.world_id,
            None => return,
        };
        let anchor = self
            .ctx
            .registry()
            .current_position(id)
            .or(citizen.map(|c| c.position));

        for display in self.ctx.registry().displays_of(id) {
            match self.ctx.world().remove_display(world, display).await {
                Ok(()) => {}
                Err(CitizensError::ChunkUnloaded { chunk, .. }) => {
                    self.removals.defer_display(world, display, chunk);
                }
                Err(e) => {
                    tracing::debug!(citizen = %id, "Display removal failed: {}", e);
                }
            }
        }
        self.ctx.registry().set_displays(id, Vec::new());

        if let Some(actor) = self.ctx.registry().actor_of(id) {
            // Null the live id before anything else is queued so a respawn
            // can never observe the old actor
            self.ctx.registry().set_actor(id, None);
            match self.ctx.world().remove_actor(world, actor).await {
                Ok(()) => {
                    tracing::debug!(citizen = %id, %actor, "Despawned citizen actor");
                }
                Err(CitizensError::ChunkUnloaded { chunk, .. }) => {
                    self.removals.defer_actor(world, actor, chunk);
                }
                Err(CitizensError::StaleActor(_)) => {
                    // Already gone; deferring by the last known chunk would
                    // retry forever against nothing
                    tracing::debug!(citizen = %id, %actor, "Actor already removed");
                }
                Err(e) => {
                    if let Some(anchor) = anchor {
                        self.removals.defer_actor(world, actor, anchor.chunk());
                    } else {
                        tracing::warn!(citizen = %id, "Actor removal failed: {}", e);
                    }
                }
            }
        }
    }

    /// Despawn a citizen's live actor, clearing its patrol session, its
    /// pending one-shot tasks, and the spawning guard
    pub async fn despawn_citizen(self: &Arc<Self>, id: CitizenId) {
        if let Some((_, task)) = self.recheck_tasks.remove(&id) {
            task.abort();
        }
        if let Some((_, task)) = self.respawn_tasks.remove(&id) {
            task.abort();
        }
        self.ctx.registry().set_awaiting_respawn(id, false);
        self.despawn_for_respawn(id).await;
        self.ctx.registry().end_spawn(id);
        self.ctx.events().publish(CitizenEvent::Despawned { citizen: id });
        self.ctx.events().process_events();
    }

    /// One-shot recheck after the fixed delay: if the generated definition
    /// has become indexed, force a respawn onto it. A newer recheck for the
    /// same citizen supersedes any pending one.
    fn schedule_definition_recheck(self: &Arc<Self>, id: CitizenId, generated: String) {
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(DEFINITION_RECHECK_DELAY).await;
            orchestrator.recheck_tasks.remove(&id);
            if orchestrator
                .ctx
                .definition_index()
                .index_of(&generated)
                .await
                .is_some()
            {
                tracing::info!(citizen = %id, definition = %generated, "Definition now indexed, respawning");
                if let Err(e) = orchestrator.spawn_citizen(id).await {
                    tracing::warn!(citizen = %id, "Respawn onto indexed definition failed: {}", e);
                }
            }
        });
        if let Some(previous) = self.recheck_tasks.insert(id, task) {
            previous.abort();
        }
    }

    /// Schedule a respawn after a death. Supersedes any pending respawn for
    /// the same citizen.
    pub fn schedule_respawn(self: &Arc<Self>, id: CitizenId, delay: Duration) {
        self.ctx.registry().set_awaiting_respawn(id, true);
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            orchestrator.respawn_tasks.remove(&id);
            orchestrator.ctx.registry().set_awaiting_respawn(id, false);
            if let Err(e) = orchestrator.spawn_citizen(id).await {
                tracing::warn!(citizen = %id, "Respawn after death failed: {}", e);
            }
        });
        if let Some(previous) = self.respawn_tasks.insert(id, task) {
            previous.abort();
        }
    }

    /// Spawn every registered citizen. Individual failures are logged and
    /// never stop the rest of the population.
    pub async fn spawn_all(self: &Arc<Self>) {
        let citizens = self.ctx.registry().list_all();
        let futures: Vec<_> = citizens
            .iter()
            .map(|citizen| {
                let orchestrator = Arc::clone(self);
                let id = citizen.id;
                async move {
                    if let Err(e) = orchestrator.spawn_citizen(id).await {
                        tracing::warn!(citizen = %id, "Startup spawn failed: {}", e);
                    }
                }
            })
            .collect();
        futures::future::join_all(futures).await;
        tracing::info!("Startup spawn pass complete for {} citizens", citizens.len());
    }

    /// Cancel every pending one-shot task and despawn the whole population
    pub async fn shutdown(self: &Arc<Self>) {
        for entry in self.recheck_tasks.iter() {
            entry.value().abort();
        }
        self.recheck_tasks.clear();
        for entry in self.respawn_tasks.iter() {
            entry.value().abort();
        }
        self.respawn_tasks.clear();

        for citizen in self.ctx.registry().list_all() {
            self.despawn_citizen(citizen.id).await;
        }
        tracing::info!("Lifecycle shutdown complete");
    }

    /// Move a citizen's home anchor and respawn it there
    pub async fn move_citizen(self: &Arc<Self>, id: CitizenId, position: Vec3) -> Result<()> {
        self.update_citizen(id, |citizen| citizen.position = position)
            .await?;
        // Moving never changes the definition; force the respawn explicitly
        self.spawn_citizen(id).await
    }

    // ---- groups ----

    pub fn create_group(&self, name: &str) -> Result<()> {
        self.ctx.registry().create_group(name)?;
        self.ctx.store().save_groups(&self.ctx.registry().list_groups())
    }

    /// Delete a group; members are unassigned and re-persisted
    pub fn delete_group(&self, name: &str) -> Result<()> {
        let members: Vec<_> = self
            .ctx
            .registry()
            .list_all()
            .into_iter()
            .filter(|citizen| citizen.group.as_deref() == Some(name))
            .collect();
        self.ctx.registry().delete_group(name)?;
        let _batch = self.ctx.store().begin_batch();
        for member in members {
            if let Some(citizen) = self.ctx.registry().get(member.id) {
                self.ctx.store().save_citizen(&citizen)?;
            }
        }
        self.ctx.store().save_groups(&self.ctx.registry().list_groups())
    }

    pub fn rename_group(&self, from: &str, to: &str) -> Result<()> {
        let members: Vec<_> = self
            .ctx
            .registry()
            .list_all()
            .into_iter()
            .filter(|citizen| citizen.group.as_deref() == Some(from))
            .collect();
        self.ctx.registry().rename_group(from, to)?;
        let _batch = self.ctx.store().begin_batch();
        for member in members {
            if let Some(citizen) = self.ctx.registry().get(member.id) {
                self.ctx.store().save_citizen(&citizen)?;
            }
        }
        self.ctx.registry().rebuild_indices();
        self.ctx.store().save_groups(&self.ctx.registry().list_groups())
    }

    pub fn assign_group(&self, id: CitizenId, group: Option<String>) -> Result<()> {
        self.ctx.registry().assign_group(id, group)?;
        let _batch = self.ctx.store().begin_batch();
        if let Some(citizen) = self.ctx.registry().get(id) {
            self.ctx.store().save_citizen(&citizen)?;
        }
        self.ctx.registry().rebuild_indices();
        self.ctx.store().save_groups(&self.ctx.registry().list_groups())
    }
}
