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

//! Presence upkeep
//!
//! Periodic polish tasks for the live population: stationary citizens turn
//! to face the nearest nearby player, name displays are repositioned above
//! their actor, live actor positions are snapshotted into the registry, the
//! by-world indices are rebuilt, and player-skin appearances are refreshed
//! through the skin collaborator. None of these affect correctness of the
//! lifecycle; every failure here is logged and skipped.

use crate::context::EngineContext;
use crate::lifecycle::{LifecycleOrchestrator, DISPLAY_LINE_SPACING};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use townsfolk_common::citizen::{CitizenData, MovementType};
use townsfolk_common::id::{ActorId, CitizenId, PlayerId};
use townsfolk_common::math::Vec3;

/// How far away a player can be and still be looked at
pub const ROTATION_RADIUS: f32 = 25.0;
/// Minimum yaw change in degrees worth sending to the host
pub const YAW_EPSILON: f32 = 1.0;

/// Pick the nearest player within the look radius, by horizontal distance
pub fn nearest_player_in_radius(
    center: &Vec3,
    players: &[(PlayerId, Vec3)],
) -> Option<(PlayerId, Vec3)> {
    let radius_sq = ROTATION_RADIUS * ROTATION_RADIUS;
    players
        .iter()
        .map(|(player, position)| (*player, *position, center.distance_squared_xz(position)))
        .filter(|(_, _, dist_sq)| *dist_sq <= radius_sq)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(player, position, _)| (player, position))
}

/// Periodic upkeep over the live population
pub struct PresenceService {
    ctx: Arc<EngineContext>,
    lifecycle: Arc<LifecycleOrchestrator>,
    last_yaw: DashMap<CitizenId, f32>,
    /// Last texture observed per player-skin citizen; a change forces a
    /// respawn onto the new appearance
    last_texture: DashMap<CitizenId, String>,
}

impl PresenceService {
    pub fn new(ctx: Arc<EngineContext>, lifecycle: Arc<LifecycleOrchestrator>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            lifecycle,
            last_yaw: DashMap::new(),
            last_texture: DashMap::new(),
        })
    }

    /// One upkeep pass over every indexed world
    pub async fn tick(&self) {
        for world in self.ctx.registry().indexed_worlds() {
            let players = self.ctx.world().players_in_world(world).await;
            for citizen in self.ctx.registry().list_by_world(world) {
                let Some(actor) = self.ctx.registry().actor_of(citizen.id) else {
                    continue;
                };
                let Some(position) = self.ctx.world().actor_position(world, actor).await else {
                    continue;
                };
                self.ctx.registry().set_current_position(citizen.id, position);
                self.reposition_displays(&citizen, position).await;
                if citizen.movement.movement_type == MovementType::Stay {
                    self.face_nearest_player(&citizen, actor, position, &players)
                        .await;
                }
            }
        }
    }

    /// Keep name-display lines stacked above the live actor, top line highest
    async fn reposition_displays(&self, citizen: &CitizenData, position: Vec3) {
        let displays = self.ctx.registry().displays_of(citizen.id);
        if displays.is_empty() {
            return;
        }
        let base = position.with_y_offset(citizen.nametag.offset);
        let count = displays.len();
        for (index, display_id) in displays.into_iter().enumerate() {
            let line_position =
                base.with_y_offset((count - 1 - index) as f32 * DISPLAY_LINE_SPACING);
            if let Err(e) = self
                .ctx
                .world()
                .move_display(citizen.world_id, display_id, line_position)
                .await
            {
                tracing::debug!(citizen = %citizen.id, display = %display_id, "Display move failed: {}", e);
            }
        }
    }

    async fn face_nearest_player(
        &self,
        citizen: &CitizenData,
        actor: ActorId,
        position: Vec3,
        players: &[(PlayerId, Vec3)],
    ) {
        let Some((_, player_position)) = nearest_player_in_radius(&position, players) else {
            return;
        };
        let yaw = position.yaw_toward(&player_position);
        if let Some(last) = self.last_yaw.get(&citizen.id) {
            if (yaw - *last).abs() < YAW_EPSILON {
                return;
            }
        }
        self.last_yaw.insert(citizen.id, yaw);
        if let Err(e) = self
            .ctx
            .world()
            .set_actor_rotation(citizen.world_id, actor, yaw)
            .await
        {
            tracing::debug!(citizen = %citizen.id, "Rotation update failed: {}", e);
        }
    }

    /// Re-resolve player-skin appearances and respawn citizens whose
    /// texture changed. The first resolution only records the baseline.
    pub async fn refresh_skins(self: &Arc<Self>) {
        for citizen in self.ctx.registry().list_all() {
            let Some(username) = &citizen.appearance.player_skin else {
                continue;
            };
            let Some(texture) = self.ctx.skins().resolve(username).await else {
                continue;
            };
            let changed = match self.last_texture.get(&citizen.id) {
                Some(last) => *last != texture,
                None => false,
            };
            self.last_texture.insert(citizen.id, texture);
            if changed {
                tracing::info!(citizen = %citizen.id, %username, "Skin changed, respawning");
                if let Err(e) = self.lifecycle.spawn_citizen(citizen.id).await {
                    tracing::warn!(citizen = %citizen.id, "Skin refresh respawn failed: {}", e);
                }
            }
        }
    }

    /// Spawn the fixed-cadence upkeep loop
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let tick = Duration::from_millis(service.ctx.timers().presence_tick_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                service.tick().await;
            }
        })
    }

    /// Spawn the periodic skin refresh loop
    pub fn spawn_skin_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = Duration::from_secs(service.ctx.timers().skin_refresh_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately and records baselines
            loop {
                interval.tick().await;
                service.refresh_skins().await;
            }
        })
    }

    /// Spawn the periodic by-world/by-group index rebuild loop
    pub fn spawn_index_rebuilder(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = Duration::from_secs(service.ctx.timers().index_rebuild_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                service.ctx.registry().rebuild_indices();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use townsfolk_common::id::PlayerId;

    #[test]
    fn test_nearest_player_selection() {
        let center = Vec3::ZERO;
        let near = PlayerId::new();
        let far = PlayerId::new();
        let players = vec![
            (far, Vec3::new(10.0, 0.0, 0.0)),
            (near, Vec3::new(3.0, 0.0, 0.0)),
        ];
        let picked = nearest_player_in_radius(&center, &players);
        assert_eq!(picked.map(|(player, _)| player), Some(near));
    }

    #[test]
    fn test_players_outside_radius_are_ignored() {
        let center = Vec3::ZERO;
        let players = vec![(PlayerId::new(), Vec3::new(26.0, 0.0, 0.0))];
        assert!(nearest_player_in_radius(&center, &players).is_none());
    }

    #[test]
    fn test_radius_is_horizontal_only() {
        let center = Vec3::ZERO;
        // 100 units straight up but beside the citizen horizontally
        let players = vec![(PlayerId::new(), Vec3::new(2.0, 100.0, 0.0))];
        assert!(nearest_player_in_radius(&center, &players).is_some());
    }
}
