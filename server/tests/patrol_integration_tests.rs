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

//! Patrol engine integration tests

use std::sync::Arc;
use tempfile::TempDir;
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::{CitizenId, WorldId};
use townsfolk_common::math::Vec3;
use townsfolk_common::patrol::{PatrolMode, PatrolPath, PatrolWaypoint};
use townsfolk_server::config::TimerConfig;
use townsfolk_server::context::EngineContext;
use townsfolk_server::definitions::BehaviorDefinitionCache;
use townsfolk_server::error::CitizensError;
use townsfolk_server::lifecycle::LifecycleOrchestrator;
use townsfolk_server::patrol::PatrolEngine;
use townsfolk_server::store::ConfigStore;
use townsfolk_server::world::memory::MemoryWorld;

struct Harness {
    ctx: Arc<EngineContext>,
    world: Arc<MemoryWorld>,
    patrols: Arc<PatrolEngine>,
    lifecycle: Arc<LifecycleOrchestrator>,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open(dir.path().join("data")).unwrap());
    let definitions =
        Arc::new(BehaviorDefinitionCache::new(dir.path().join("definitions")).unwrap());
    let world = Arc::new(MemoryWorld::new());
    world.load_everything();
    let ctx = Arc::new(EngineContext::new(
        store,
        definitions,
        world.clone(),
        world.clone(),
        world.clone(),
        TimerConfig::default(),
    ));
    let patrols = PatrolEngine::new(ctx.clone());
    let lifecycle = LifecycleOrchestrator::new(ctx.clone(), patrols.clone());
    Harness {
        ctx,
        world,
        patrols,
        lifecycle,
        _dir: dir,
    }
}

const ANCHOR: Vec3 = Vec3 {
    x: 8.0,
    y: 64.0,
    z: 8.0,
};

/// Waypoints all within arrival range of the anchor, so a stationary fake
/// actor "arrives" every tick and the session advances deterministically
fn close_loop_path(world_id: WorldId, mode: PatrolMode) -> PatrolPath {
    PatrolPath::new("rounds", world_id)
        .with_mode(mode)
        .with_waypoint(PatrolWaypoint::new(Vec3::new(8.5, 64.0, 8.0)))
        .with_waypoint(PatrolWaypoint::new(Vec3::new(8.0, 64.0, 9.0)))
        .with_waypoint(PatrolWaypoint::new(Vec3::new(7.0, 64.0, 8.0)))
}

async fn spawn_patroller(h: &Harness, world_id: WorldId) -> CitizenId {
    let citizen = CitizenData::new("Sentry", world_id, ANCHOR)
        .with_model("Townsfolk_Guard")
        .with_patrol_path("rounds");
    let id = citizen.id;
    h.lifecycle.add_citizen(citizen).await.unwrap();
    id
}

#[tokio::test]
async fn test_spawn_starts_configured_patrol() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;

    let session = h.patrols.session_of(id).unwrap();
    assert_eq!(session.path_name, "rounds");
    assert_eq!(session.index, 0);

    // The first waypoint is asserted as the movement target immediately
    let actor = h.ctx.registry().actor_of(id).unwrap();
    assert_eq!(
        h.world.move_target_of(actor).await,
        Some(Vec3::new(8.5, 64.0, 8.0))
    );
}

#[tokio::test]
async fn test_loop_session_wraps_around() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;

    let mut indices = Vec::new();
    for _ in 0..6 {
        h.patrols.tick().await;
        indices.push(h.patrols.session_of(id).unwrap().index);
    }
    // Arrival every tick: 0 -> 1 -> 2 -> 0 -> ...
    assert_eq!(indices, vec![1, 2, 0, 1, 2, 0]);
}

#[tokio::test]
async fn test_ping_pong_session_reflects() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::PingPong))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;

    let mut indices = Vec::new();
    for _ in 0..8 {
        h.patrols.tick().await;
        indices.push(h.patrols.session_of(id).unwrap().index);
    }
    // Period 2N-2 = 4, never out of bounds
    assert_eq!(indices, vec![1, 2, 1, 0, 1, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_defers_the_next_target() {
    let h = harness();
    let world_id = WorldId::new();
    let path = PatrolPath::new("rounds", world_id)
        .with_waypoint(PatrolWaypoint::new(Vec3::new(8.5, 64.0, 8.0)).with_pause(1.0))
        .with_waypoint(PatrolWaypoint::new(Vec3::new(8.0, 64.0, 9.0)));
    h.patrols.create_path(path).unwrap();
    let id = spawn_patroller(&h, world_id).await;
    let actor = h.ctx.registry().actor_of(id).unwrap();

    // Arrival at the pausing waypoint: index advances, target does not move
    h.patrols.tick().await;
    let session = h.patrols.session_of(id).unwrap();
    assert_eq!(session.index, 1);
    assert!(session.paused);
    assert_eq!(
        h.world.move_target_of(actor).await,
        Some(Vec3::new(8.5, 64.0, 8.0))
    );

    // Still inside the pause window
    h.patrols.tick().await;
    assert!(h.patrols.session_of(id).unwrap().paused);

    // After the pause elapses the next waypoint becomes the target
    tokio::time::advance(std::time::Duration::from_millis(1100)).await;
    h.patrols.tick().await;
    let session = h.patrols.session_of(id).unwrap();
    assert!(!session.paused);
    assert_eq!(
        h.world.move_target_of(actor).await,
        Some(Vec3::new(8.0, 64.0, 9.0))
    );
}

#[tokio::test]
async fn test_despawn_tears_down_session_and_marker() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;
    assert!(h.patrols.session_of(id).is_some());

    h.lifecycle.despawn_citizen(id).await;
    assert!(h.patrols.session_of(id).is_none());
}

#[tokio::test]
async fn test_delete_path_stops_running_sessions() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;

    h.patrols.delete_path("rounds").await.unwrap();

    assert!(h.patrols.session_of(id).is_none());
    assert!(h.ctx.store().load_path("rounds").is_none());
    let actor = h.ctx.registry().actor_of(id).unwrap();
    assert_eq!(h.world.move_target_of(actor).await, None);
}

#[tokio::test]
async fn test_path_crud_is_persisted() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();

    // Duplicate names are rejected
    assert!(matches!(
        h.patrols.create_path(close_loop_path(world_id, PatrolMode::Loop)),
        Err(CitizensError::DuplicatePath(_))
    ));

    h.patrols
        .add_waypoint(
            "rounds",
            PatrolWaypoint::new(Vec3::new(0.0, 64.0, 0.0)).with_pause(2.0),
        )
        .unwrap();
    h.patrols.set_path_mode("rounds", PatrolMode::PingPong).unwrap();
    h.patrols.remove_waypoint("rounds", 0).unwrap();

    let stored = h.ctx.store().load_path("rounds").unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored.mode, PatrolMode::PingPong);
    assert_eq!(stored.waypoints[2].pause_seconds, 2.0);

    assert!(matches!(
        h.patrols.remove_waypoint("rounds", 9),
        Err(CitizensError::UnknownPath(_))
    ));
}

#[tokio::test]
async fn test_insert_waypoint_and_pause_edits_are_persisted() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();

    // Insert before the second waypoint; index == len appends
    h.patrols
        .insert_waypoint("rounds", 1, PatrolWaypoint::new(Vec3::new(9.0, 64.0, 9.0)))
        .unwrap();
    h.patrols
        .insert_waypoint("rounds", 4, PatrolWaypoint::new(Vec3::new(6.0, 64.0, 6.0)))
        .unwrap();
    h.patrols.set_waypoint_pause("rounds", 1, 3.5).unwrap();

    let stored = h.ctx.store().load_path("rounds").unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored.waypoints[1].position, Vec3::new(9.0, 64.0, 9.0));
    assert_eq!(stored.waypoints[1].pause_seconds, 3.5);
    assert_eq!(stored.waypoints[4].position, Vec3::new(6.0, 64.0, 6.0));

    // Out-of-range edits are rejected
    assert!(matches!(
        h.patrols
            .insert_waypoint("rounds", 9, PatrolWaypoint::new(Vec3::ZERO)),
        Err(CitizensError::UnknownPath(_))
    ));
    assert!(matches!(
        h.patrols.set_waypoint_pause("rounds", 9, 1.0),
        Err(CitizensError::UnknownPath(_))
    ));
    assert!(matches!(
        h.patrols.set_waypoint_pause("ghost", 0, 1.0),
        Err(CitizensError::UnknownPath(_))
    ));
}

#[tokio::test]
async fn test_move_to_position_replaces_patrol() {
    let h = harness();
    let world_id = WorldId::new();
    h.patrols
        .create_path(close_loop_path(world_id, PatrolMode::Loop))
        .unwrap();
    let id = spawn_patroller(&h, world_id).await;

    let target = Vec3::new(40.0, 64.0, 40.0);
    h.patrols.move_to_position(id, target).await.unwrap();

    assert!(h.patrols.session_of(id).is_none());
    let actor = h.ctx.registry().actor_of(id).unwrap();
    assert_eq!(h.world.move_target_of(actor).await, Some(target));
}
