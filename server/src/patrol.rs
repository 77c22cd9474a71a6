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

//! Patrol engine
//!
//! A per-citizen state machine advancing a movement target along a named
//! waypoint path on a fixed tick. Sessions are transient: they exist only
//! while the citizen has a live actor and are torn down on despawn. The
//! external AI steers the actor toward the movement target; the engine only
//! moves the target.

use crate::context::EngineContext;
use crate::error::{CitizensError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use townsfolk_common::id::CitizenId;
use townsfolk_common::math::Vec3;
use townsfolk_common::patrol::{PatrolMode, PatrolPath, PatrolWaypoint};

/// Squared arrival radius around a waypoint (2 world units)
pub const ARRIVAL_DISTANCE_SQ: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SessionState {
    Advancing,
    Paused { until: Instant },
}

#[derive(Debug)]
struct PatrolSession {
    path_name: String,
    index: usize,
    forward: bool,
    state: SessionState,
}

/// Read-only view of a session for callers and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub path_name: String,
    pub index: usize,
    pub forward: bool,
    pub paused: bool,
}

/// Drives every active patrol session on a fixed tick
pub struct PatrolEngine {
    ctx: Arc<EngineContext>,
    sessions: DashMap<CitizenId, PatrolSession>,
}

impl PatrolEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            sessions: DashMap::new(),
        })
    }

    /// Start (or restart) a patrol for a spawned citizen. Sets the movement
    /// target to the first waypoint immediately.
    pub async fn start_patrol(&self, id: CitizenId, path_name: &str) -> Result<()> {
        let path = self
            .ctx
            .store()
            .load_path(path_name)
            .ok_or_else(|| CitizensError::UnknownPath(path_name.to_string()))?;
        if path.is_empty() {
            tracing::warn!(citizen = %id, path = path_name, "Patrol path has no waypoints");
            return Ok(());
        }

        self.stop_patrol(id).await;
        self.sessions.insert(
            id,
            PatrolSession {
                path_name: path_name.to_string(),
                index: 0,
                forward: true,
                state: SessionState::Advancing,
            },
        );
        self.assert_target(id, path.waypoints[0].position).await;
        tracing::debug!(citizen = %id, path = path_name, "Patrol started");
        Ok(())
    }

    /// Tear down a citizen's patrol session and its movement target marker
    pub async fn stop_patrol(&self, id: CitizenId) {
        if self.sessions.remove(&id).is_none() {
            return;
        }
        if let (Some(citizen), Some(actor)) = (
            self.ctx.registry().get(id),
            self.ctx.registry().actor_of(id),
        ) {
            if let Err(e) = self
                .ctx
                .world()
                .clear_move_target(citizen.world_id, actor)
                .await
            {
                tracing::debug!(citizen = %id, "Failed to clear move target: {}", e);
            }
        }
        tracing::debug!(citizen = %id, "Patrol stopped");
    }

    /// One-shot movement order outside any patrol. Replaces an active
    /// patrol session.
    pub async fn move_to_position(&self, id: CitizenId, position: Vec3) -> Result<()> {
        self.stop_patrol(id).await;
        let citizen = self
            .ctx
            .registry()
            .get(id)
            .ok_or(CitizensError::UnknownCitizen(id))?;
        let actor = self
            .ctx
            .registry()
            .actor_of(id)
            .ok_or(CitizensError::UnknownCitizen(id))?;
        self.ctx
            .world()
            .set_move_target(citizen.world_id, actor, position)
            .await
    }

    pub fn session_of(&self, id: CitizenId) -> Option<SessionSnapshot> {
        self.sessions.get(&id).map(|session| SessionSnapshot {
            path_name: session.path_name.clone(),
            index: session.index,
            forward: session.forward,
            paused: matches!(session.state, SessionState::Paused { .. }),
        })
    }

    /// Advance every session one tick
    pub async fn tick(&self) {
        let ids: Vec<CitizenId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.tick_session(id).await;
        }
    }

    async fn tick_session(&self, id: CitizenId) {
        let Some(actor) = self.ctx.registry().actor_of(id) else {
            // Session outlived the live actor; despawn should have removed
            // it, but the world can also drop actors on its own
            self.sessions.remove(&id);
            return;
        };
        let Some(citizen) = self.ctx.registry().get(id) else {
            self.sessions.remove(&id);
            return;
        };

        let Some((path, index, forward, state)) = ({
            let session = match self.sessions.get(&id) {
                Some(session) => session,
                None => return,
            };
            self.ctx
                .store()
                .load_path(&session.path_name)
                .filter(|path| !path.is_empty())
                .map(|path| (path, session.index, session.forward, session.state))
        }) else {
            // Path deleted or emptied out from under the session
            self.stop_patrol(id).await;
            return;
        };

        // Path edits may have shrunk the waypoint list
        let index = index.min(path.len() - 1);

        if let SessionState::Paused { until } = state {
            if Instant::now() < until {
                return;
            }
            // Resuming: reassert the current waypoint as the target, since
            // the marker sat idle through the pause
            if let Some(mut session) = self.sessions.get_mut(&id) {
                session.state = SessionState::Advancing;
                session.index = index;
            }
            self.assert_target_actor(citizen.world_id, actor, path.waypoints[index].position)
                .await;
            return;
        }

        let Some(position) = self
            .ctx
            .world()
            .actor_position(citizen.world_id, actor)
            .await
        else {
            // Region temporarily unavailable; skip this cycle
            return;
        };

        let waypoint = &path.waypoints[index];
        if position.distance_squared(&waypoint.position) > ARRIVAL_DISTANCE_SQ {
            return;
        }

        let (next_index, next_forward) = next_waypoint(&path, index, forward);
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.index = next_index;
            session.forward = next_forward;
            if waypoint.pause_seconds > 0.0 {
                session.state = SessionState::Paused {
                    until: Instant::now() + Duration::from_secs_f32(waypoint.pause_seconds),
                };
                return;
            }
        }
        self.assert_target_actor(citizen.world_id, actor, path.waypoints[next_index].position)
            .await;
    }

    async fn assert_target(&self, id: CitizenId, position: Vec3) {
        if let (Some(citizen), Some(actor)) = (
            self.ctx.registry().get(id),
            self.ctx.registry().actor_of(id),
        ) {
            self.assert_target_actor(citizen.world_id, actor, position)
                .await;
        }
    }

    async fn assert_target_actor(
        &self,
        world: townsfolk_common::id::WorldId,
        actor: townsfolk_common::id::ActorId,
        position: Vec3,
    ) {
        if let Err(e) = self
            .ctx
            .world()
            .set_move_target(world, actor, position)
            .await
        {
            tracing::debug!(%actor, "Failed to move patrol target: {}", e);
        }
    }

    /// Spawn the fixed-cadence tick loop
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let tick = Duration::from_millis(engine.ctx.timers().patrol_tick_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                engine.tick().await;
            }
        })
    }

    // ---- path management ----

    pub fn create_path(&self, path: PatrolPath) -> Result<()> {
        if self.ctx.store().load_path(&path.name).is_some() {
            return Err(CitizensError::DuplicatePath(path.name));
        }
        self.ctx.store().save_path(&path)
    }

    /// Delete a path, stopping any session running it
    pub async fn delete_path(&self, name: &str) -> Result<()> {
        if self.ctx.store().load_path(name).is_none() {
            return Err(CitizensError::UnknownPath(name.to_string()));
        }
        let running: Vec<CitizenId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().path_name == name)
            .map(|entry| *entry.key())
            .collect();
        for id in running {
            self.stop_patrol(id).await;
        }
        self.ctx.store().delete_path(name)
    }

    pub fn add_waypoint(&self, name: &str, waypoint: PatrolWaypoint) -> Result<()> {
        let mut path = self
            .ctx
            .store()
            .load_path(name)
            .ok_or_else(|| CitizensError::UnknownPath(name.to_string()))?;
        path.waypoints.push(waypoint);
        self.ctx.store().save_path(&path)
    }

    /// Insert a waypoint before `index`; `index == len` appends
    pub fn insert_waypoint(&self, name: &str, index: usize, waypoint: PatrolWaypoint) -> Result<()> {
        let mut path = self
            .ctx
            .store()
            .load_path(name)
            .ok_or_else(|| CitizensError::UnknownPath(name.to_string()))?;
        if index > path.waypoints.len() {
            return Err(CitizensError::UnknownPath(format!(
                "{name} has no waypoint {index}"
            )));
        }
        path.waypoints.insert(index, waypoint);
        self.ctx.store().save_path(&path)
    }

    pub fn remove_waypoint(&self, name: &str, index: usize) -> Result<()> {
        let mut path = self
            .ctx
            .store()
            .load_path(name)
            .ok_or_else(|| CitizensError::UnknownPath(name.to_string()))?;
        if index >= path.waypoints.len() {
            return Err(CitizensError::UnknownPath(format!(
                "{name} has no waypoint {index}"
            )));
        }
        path.waypoints.remove(index);
        self.ctx.store().save_path(&path)
    }

    pub fn set_path_mode(&self, name: &str, mode: PatrolMode) -> Result<()> {
        let mut path = self
            .ctx
            .store()
            .load_path(name)
            .ok_or_else(|| CitizensError::UnknownPath(name.to_string()))?;
        path.mode = mode;
        self.ctx.store().save_path(&path)
    }

    /// Set how long arriving sessions linger at one waypoint
    pub fn set_waypoint_pause(&self, name: &str, index: usize, pause_seconds: f32) -> Result<()> {
        let mut path = self
            .ctx
            .store()
            .load_path(name)
            .ok_or_else(|| CitizensError::UnknownPath(name.to_string()))?;
        let Some(waypoint) = path.waypoints.get_mut(index) else {
            return Err(CitizensError::UnknownPath(format!(
                "{name} has no waypoint {index}"
            )));
        };
        waypoint.pause_seconds = pause_seconds;
        self.ctx.store().save_path(&path)
    }
}

/// Next waypoint index and direction after arriving at `index`.
/// `Loop` wraps modulo the path length; `PingPong` reverses direction
/// exactly at either end.
fn next_waypoint(path: &PatrolPath, index: usize, forward: bool) -> (usize, bool) {
    let len = path.len();
    if len <= 1 {
        return (0, true);
    }
    match path.mode {
        PatrolMode::Loop => ((index + 1) % len, true),
        PatrolMode::PingPong => {
            if forward {
                if index >= len - 1 {
                    (index - 1, false)
                } else {
                    (index + 1, true)
                }
            } else if index == 0 {
                (1, true)
            } else {
                (index - 1, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use townsfolk_common::id::WorldId;

    fn path_of(len: usize, mode: PatrolMode) -> PatrolPath {
        let mut path = PatrolPath::new("p", WorldId::new()).with_mode(mode);
        for i in 0..len {
            path = path.with_waypoint(PatrolWaypoint::new(Vec3::new(i as f32 * 10.0, 64.0, 0.0)));
        }
        path
    }

    #[test]
    fn test_loop_sequence_is_periodic() {
        let path = path_of(4, PatrolMode::Loop);
        let mut index = 0;
        let mut forward = true;
        let mut sequence = Vec::new();
        for _ in 0..8 {
            sequence.push(index);
            let (next, dir) = next_waypoint(&path, index, forward);
            index = next;
            forward = dir;
        }
        // Period N
        assert_eq!(sequence, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_ping_pong_sequence_period_2n_minus_2() {
        let path = path_of(4, PatrolMode::PingPong);
        let mut index = 0;
        let mut forward = true;
        let mut sequence = Vec::new();
        for _ in 0..12 {
            sequence.push(index);
            let (next, dir) = next_waypoint(&path, index, forward);
            index = next;
            forward = dir;
        }
        // Period 2N-2 = 6, never out of [0, N-1]
        assert_eq!(sequence, vec![0, 1, 2, 3, 2, 1, 0, 1, 2, 3, 2, 1]);
        assert!(sequence.iter().all(|i| *i < path.len()));
    }

    #[test]
    fn test_single_waypoint_path_stays_put() {
        let path = path_of(1, PatrolMode::Loop);
        assert_eq!(next_waypoint(&path, 0, true), (0, true));
        let path = path_of(1, PatrolMode::PingPong);
        assert_eq!(next_waypoint(&path, 0, true), (0, true));
    }

    #[test]
    fn test_ping_pong_two_waypoints() {
        let path = path_of(2, PatrolMode::PingPong);
        assert_eq!(next_waypoint(&path, 0, true), (1, true));
        assert_eq!(next_waypoint(&path, 1, true), (0, false));
        assert_eq!(next_waypoint(&path, 0, false), (1, true));
    }
}
