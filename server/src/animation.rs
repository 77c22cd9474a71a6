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

//! Animation scheduler
//!
//! Interval, default-loop, and proximity animation playback per citizen.
//! `Default` animations are re-triggered on a short fixed cadence because
//! the playback primitive does not loop on its own. Proximity triggers fire
//! once per threshold crossing per (citizen, animation, player), tracked in
//! a bounded was-in-range cache. Stop-after-time playback is a cancellable
//! one-shot task; re-triggering the same (animation, slot) supersedes any
//! pending stop so overlapping triggers never race.

use crate::context::EngineContext;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use townsfolk_common::animation::{AnimationConfig, AnimationTrigger};
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::{CitizenId, PlayerId};

/// Cadence for re-triggering `Default` animations
pub const DEFAULT_RETRIGGER: Duration = Duration::from_secs(2);
/// Last-resort stop animation when neither an explicit stop nor a default
/// slot animation is configured
pub const GENERIC_IDLE_ANIMATION: &str = "Idle";

const PROXIMITY_CACHE_CAPACITY: u64 = 4096;
const PROXIMITY_CACHE_TTL: Duration = Duration::from_secs(300);

type AnimationKey = (CitizenId, String, String);

/// Schedules animation playback for the whole population
pub struct AnimationScheduler {
    ctx: Arc<EngineContext>,
    last_triggered: DashMap<AnimationKey, Instant>,
    /// was-in-range flags per (citizen, animation, player); bounded and
    /// TTL-evicted so distinct players never grow it without limit
    proximity: moka::sync::Cache<(CitizenId, String, PlayerId), bool>,
    stop_tasks: DashMap<AnimationKey, JoinHandle<()>>,
}

impl AnimationScheduler {
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            last_triggered: DashMap::new(),
            proximity: moka::sync::Cache::builder()
                .max_capacity(PROXIMITY_CACHE_CAPACITY)
                .time_to_live(PROXIMITY_CACHE_TTL)
                .build(),
            stop_tasks: DashMap::new(),
        })
    }

    /// Advance every citizen's animation behaviors one tick
    pub async fn tick(self: &Arc<Self>) {
        for world in self.ctx.registry().indexed_worlds() {
            let players = self.ctx.world().players_in_world(world).await;
            for citizen in self.ctx.registry().list_by_world(world) {
                if citizen.animations.is_empty() {
                    continue;
                }
                let Some(actor) = self.ctx.registry().actor_of(citizen.id) else {
                    continue;
                };
                for animation in &citizen.animations {
                    match animation.trigger {
                        AnimationTrigger::Default => {
                            self.tick_cadenced(&citizen, actor, animation, DEFAULT_RETRIGGER)
                                .await;
                        }
                        AnimationTrigger::Timed => {
                            if animation.interval_seconds > 0.0 {
                                let interval =
                                    Duration::from_secs_f32(animation.interval_seconds);
                                self.tick_cadenced(&citizen, actor, animation, interval).await;
                            }
                        }
                        AnimationTrigger::OnProximityEnter
                        | AnimationTrigger::OnProximityExit => {
                            self.tick_proximity(&citizen, actor, animation, &players)
                                .await;
                        }
                        // Fired by the lifecycle and damage paths, not here
                        AnimationTrigger::OnSpawn | AnimationTrigger::OnAttack => {}
                    }
                }
            }
        }
    }

    async fn tick_cadenced(
        self: &Arc<Self>,
        citizen: &CitizenData,
        actor: townsfolk_common::id::ActorId,
        animation: &AnimationConfig,
        cadence: Duration,
    ) {
        let key = (
            citizen.id,
            animation.animation.clone(),
            animation.slot.clone(),
        );
        let now = Instant::now();
        if let Some(last) = self.last_triggered.get(&key) {
            if now.duration_since(*last) < cadence {
                return;
            }
        }
        self.last_triggered.insert(key, now);
        self.play(citizen, actor, animation).await;
    }

    async fn tick_proximity(
        self: &Arc<Self>,
        citizen: &CitizenData,
        actor: townsfolk_common::id::ActorId,
        animation: &AnimationConfig,
        players: &[(PlayerId, townsfolk_common::math::Vec3)],
    ) {
        if animation.radius <= 0.0 {
            return;
        }
        let center = self
            .ctx
            .registry()
            .current_position(citizen.id)
            .unwrap_or(citizen.position);
        let radius_sq = animation.radius * animation.radius;

        for (player, position) in players {
            let key = (citizen.id, animation.animation.clone(), *player);
            let in_range = center.distance_squared(position) <= radius_sq;
            let was_in_range = self.proximity.get(&key).unwrap_or(false);
            if in_range == was_in_range {
                continue;
            }
            // Exactly one cache update per crossing
            self.proximity.insert(key, in_range);

            let fires = match animation.trigger {
                AnimationTrigger::OnProximityEnter => in_range,
                AnimationTrigger::OnProximityExit => !in_range,
                _ => false,
            };
            if fires {
                self.play(citizen, actor, animation).await;
            }
        }
    }

    /// Play an animation and arm its stop task if configured. External
    /// callers use this for on-attack playback.
    pub async fn play(
        self: &Arc<Self>,
        citizen: &CitizenData,
        actor: townsfolk_common::id::ActorId,
        animation: &AnimationConfig,
    ) {
        if let Err(e) = self
            .ctx
            .world()
            .play_animation(citizen.world_id, actor, &animation.slot, &animation.animation)
            .await
        {
            tracing::debug!(citizen = %citizen.id, animation = %animation.animation, "Playback failed: {}", e);
            return;
        }
        if let Some(stop_after) = animation.stop_after_seconds {
            self.schedule_stop(citizen, animation, Duration::from_secs_f32(stop_after));
        }
    }

    /// Stop animation preference: explicit name, the citizen's own
    /// `Default` animation for the slot, then the generic idle fallback
    fn stop_animation_for(citizen: &CitizenData, animation: &AnimationConfig) -> String {
        if let Some(explicit) = &animation.stop_animation {
            return explicit.clone();
        }
        citizen
            .animations
            .iter()
            .find(|candidate| {
                candidate.trigger == AnimationTrigger::Default && candidate.slot == animation.slot
            })
            .map(|candidate| candidate.animation.clone())
            .unwrap_or_else(|| GENERIC_IDLE_ANIMATION.to_string())
    }

    fn schedule_stop(
        self: &Arc<Self>,
        citizen: &CitizenData,
        animation: &AnimationConfig,
        after: Duration,
    ) {
        let key = (
            citizen.id,
            animation.animation.clone(),
            animation.slot.clone(),
        );
        let scheduler = Arc::clone(self);
        let citizen_id = citizen.id;
        let slot = animation.slot.clone();
        let stop_name = Self::stop_animation_for(citizen, animation);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            scheduler.stop_tasks.remove(&task_key);
            // Re-resolve at fire time; the actor may have despawned
            let (Some(citizen), Some(actor)) = (
                scheduler.ctx.registry().get(citizen_id),
                scheduler.ctx.registry().actor_of(citizen_id),
            ) else {
                return;
            };
            if let Err(e) = scheduler
                .ctx
                .world()
                .play_animation(citizen.world_id, actor, &slot, &stop_name)
                .await
            {
                tracing::debug!(citizen = %citizen_id, "Stop animation failed: {}", e);
            }
        });
        // A fresh trigger for the same (animation, slot) supersedes the
        // pending stop
        if let Some(previous) = self.stop_tasks.insert(key, task) {
            previous.abort();
        }
    }

    /// Abort every pending stop task, used on shutdown
    pub fn cancel_all(&self) {
        for entry in self.stop_tasks.iter() {
            entry.value().abort();
        }
        self.stop_tasks.clear();
    }

    /// Spawn the fixed-cadence tick loop
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let tick = Duration::from_millis(scheduler.ctx.timers().animation_tick_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                scheduler.tick().await;
            }
        })
    }
}
