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

//! Deferred entity removal
//!
//! Removals that failed because the owning chunk was unloaded are parked
//! here, keyed per world by the entity and its chunk. When the host signals
//! a chunk has become available the matching entries are retried after a
//! short fixed backoff. The host does not guarantee a chunk ever reloads,
//! so each entry carries an attempt counter and is dropped with a warning
//! once it reaches its cap; a lost stray entity is an accepted low-severity
//! condition, never a fatal one.

use crate::world::WorldHost;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use townsfolk_common::id::{ActorId, DisplayId, WorldId};
use townsfolk_common::math::ChunkIndex;

/// Retry cap for name-display entities
pub const MAX_DISPLAY_ATTEMPTS: u32 = 20;
/// Retry cap for actors
pub const MAX_ACTOR_ATTEMPTS: u32 = 24;
/// Backoff before retrying entries after a chunk-available signal
pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Entity awaiting removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalTarget {
    Actor(ActorId),
    Display(DisplayId),
}

impl RemovalTarget {
    fn max_attempts(&self) -> u32 {
        match self {
            RemovalTarget::Actor(_) => MAX_ACTOR_ATTEMPTS,
            RemovalTarget::Display(_) => MAX_DISPLAY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RemovalRecord {
    chunk: ChunkIndex,
    attempts: u32,
}

/// Per-world queues of deferred removals
pub struct PendingRemovalQueue {
    world: Arc<dyn WorldHost>,
    pending: DashMap<WorldId, DashMap<RemovalTarget, RemovalRecord>>,
}

impl PendingRemovalQueue {
    pub fn new(world: Arc<dyn WorldHost>) -> Self {
        Self {
            world,
            pending: DashMap::new(),
        }
    }

    /// Park an actor removal until its chunk reloads
    pub fn defer_actor(&self, world: WorldId, actor: ActorId, chunk: ChunkIndex) {
        tracing::warn!(%world, %actor, %chunk, "Deferring actor removal, chunk unloaded");
        self.pending.entry(world).or_default().insert(
            RemovalTarget::Actor(actor),
            RemovalRecord { chunk, attempts: 0 },
        );
    }

    /// Park a display removal until its chunk reloads
    pub fn defer_display(&self, world: WorldId, display_id: DisplayId, chunk: ChunkIndex) {
        tracing::warn!(%world, display = %display_id, %chunk, "Deferring display removal, chunk unloaded");
        self.pending.entry(world).or_default().insert(
            RemovalTarget::Display(display_id),
            RemovalRecord { chunk, attempts: 0 },
        );
    }

    /// Entries currently parked for a world
    pub fn pending_count(&self, world: WorldId) -> usize {
        self.pending.get(&world).map(|map| map.len()).unwrap_or(0)
    }

    /// Chunk-available signal entry point. Spawns the retry pass so the
    /// host's event callback never blocks.
    pub fn notify_chunk_available(self: &Arc<Self>, world: WorldId, chunk: ChunkIndex) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.retry_chunk(world, chunk).await;
        });
    }

    /// Retry every parked entry keyed to the chunk, once, after the fixed
    /// backoff. Successes leave the queue; failures increment the attempt
    /// counter and entries at their cap are dropped with a warning.
    pub async fn retry_chunk(&self, world: WorldId, chunk: ChunkIndex) {
        let targets: Vec<RemovalTarget> = match self.pending.get(&world) {
            Some(map) => map
                .iter()
                .filter(|entry| entry.value().chunk == chunk)
                .map(|entry| *entry.key())
                .collect(),
            None => return,
        };
        if targets.is_empty() {
            return;
        }

        tokio::time::sleep(RETRY_BACKOFF).await;

        for target in targets {
            let removed = match target {
                RemovalTarget::Actor(actor) => self.world.remove_actor(world, actor).await,
                RemovalTarget::Display(display) => {
                    self.world.remove_display(world, display).await
                }
            };

            let Some(map) = self.pending.get(&world) else {
                return;
            };
            match removed {
                Ok(()) => {
                    map.remove(&target);
                    tracing::debug!(%world, ?target, "Deferred removal completed");
                }
                Err(e) => {
                    let mut drop_entry = false;
                    if let Some(mut record) = map.get_mut(&target) {
                        record.attempts += 1;
                        if record.attempts >= target.max_attempts() {
                            drop_entry = true;
                        } else {
                            tracing::debug!(
                                %world,
                                ?target,
                                attempts = record.attempts,
                                "Deferred removal failed, will retry: {}",
                                e
                            );
                        }
                    }
                    if drop_entry {
                        map.remove(&target);
                        tracing::warn!(
                            %world,
                            ?target,
                            "Dropping deferred removal after too many attempts"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::memory::MemoryWorld;
    use crate::world::{ActorModel, ActorSpawnSpec};
    use townsfolk_common::id::CitizenId;
    use townsfolk_common::math::Vec3;

    async fn spawn_actor(world: &MemoryWorld, world_id: WorldId, position: Vec3) -> ActorId {
        world.load_chunk(world_id, position.chunk());
        world
            .spawn_actor(
                world_id,
                ActorSpawnSpec {
                    citizen: CitizenId::new(),
                    model: ActorModel::Model("Townsfolk_Villager".to_string()),
                    position,
                    rotation: 0.0,
                    scale: 1.0,
                    definition: "Citizen_Stay_Passive_R0".to_string(),
                    leash: position,
                    inline_name: None,
                    equipment: Vec::new(),
                    invulnerable: false,
                    health_bonus: None,
                    interactable: false,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_when_chunk_reloads() {
        let world = Arc::new(MemoryWorld::new());
        let world_id = WorldId::new();
        let position = Vec3::new(8.0, 64.0, 8.0);
        let actor = spawn_actor(&world, world_id, position).await;
        let chunk = position.chunk();

        world.unload_chunk(world_id, chunk);
        let queue = PendingRemovalQueue::new(world.clone() as Arc<dyn WorldHost>);
        queue.defer_actor(world_id, actor, chunk);
        assert_eq!(queue.pending_count(world_id), 1);

        world.load_chunk(world_id, chunk);
        queue.retry_chunk(world_id, chunk).await;

        assert_eq!(queue.pending_count(world_id), 0);
        assert!(!world.actor_exists(world_id, actor).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_dropped_after_exact_attempt_cap() {
        let world = Arc::new(MemoryWorld::new());
        let world_id = WorldId::new();
        let position = Vec3::new(8.0, 64.0, 8.0);
        let actor = spawn_actor(&world, world_id, position).await;
        let chunk = position.chunk();
        world.unload_chunk(world_id, chunk);

        let queue = PendingRemovalQueue::new(world.clone() as Arc<dyn WorldHost>);
        queue.defer_display(world_id, DisplayId::new(), chunk);

        // Display cap is 20: nineteen failed retries keep the entry parked
        for _ in 0..(MAX_DISPLAY_ATTEMPTS - 1) {
            queue.retry_chunk(world_id, chunk).await;
            assert_eq!(queue.pending_count(world_id), 1);
        }
        // The twentieth failure drops it
        queue.retry_chunk(world_id, chunk).await;
        assert_eq!(queue.pending_count(world_id), 0);

        // The parked actor was never touched
        world.load_chunk(world_id, chunk);
        assert!(world.actor_exists(world_id, actor).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ignores_other_chunks() {
        let world = Arc::new(MemoryWorld::new());
        let world_id = WorldId::new();
        let queue = PendingRemovalQueue::new(world.clone() as Arc<dyn WorldHost>);

        let parked_chunk = ChunkIndex { x: 5, z: 5 };
        queue.defer_display(world_id, DisplayId::new(), parked_chunk);

        queue.retry_chunk(world_id, ChunkIndex { x: 0, z: 0 }).await;
        assert_eq!(queue.pending_count(world_id), 1);
    }
}
