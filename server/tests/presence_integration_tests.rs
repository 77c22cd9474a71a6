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

//! Presence upkeep integration tests

use std::sync::Arc;
use tempfile::TempDir;
use townsfolk_common::citizen::{CitizenData, MovementType};
use townsfolk_common::id::{CitizenId, WorldId};
use townsfolk_common::math::Vec3;
use townsfolk_server::config::TimerConfig;
use townsfolk_server::context::EngineContext;
use townsfolk_server::definitions::BehaviorDefinitionCache;
use townsfolk_server::lifecycle::LifecycleOrchestrator;
use townsfolk_server::patrol::PatrolEngine;
use townsfolk_server::presence::PresenceService;
use townsfolk_server::store::ConfigStore;
use townsfolk_server::world::memory::MemoryWorld;

struct Harness {
    ctx: Arc<EngineContext>,
    world: Arc<MemoryWorld>,
    lifecycle: Arc<LifecycleOrchestrator>,
    presence: Arc<PresenceService>,
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
    let lifecycle = LifecycleOrchestrator::new(ctx.clone(), patrols);
    let presence = PresenceService::new(ctx.clone(), lifecycle.clone());
    Harness {
        ctx,
        world,
        lifecycle,
        presence,
        _dir: dir,
    }
}

async fn add(h: &Harness, citizen: CitizenData) -> CitizenId {
    let id = citizen.id;
    h.lifecycle.add_citizen(citizen).await.unwrap();
    id
}

#[tokio::test]
async fn test_stay_citizen_faces_nearest_player() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(
        &h,
        CitizenData::new("Greeter", world_id, Vec3::new(8.0, 64.0, 8.0))
            .with_model("Townsfolk_Greeter"),
    )
    .await;
    let actor = h.ctx.registry().actor_of(id).unwrap();

    // Two players in range; the easterly one is closer and wins
    h.world.add_player(world_id, "alex", Vec3::new(12.0, 64.0, 8.0));
    h.world.add_player(world_id, "brook", Vec3::new(8.0, 64.0, 20.0));

    h.presence.tick().await;

    let yaw = h.world.actor_rotation(actor).await.unwrap();
    assert!((yaw - 90.0).abs() < 1e-3, "expected due east, got {yaw}");
}

#[tokio::test]
async fn test_small_yaw_changes_are_not_sent() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(
        &h,
        CitizenData::new("Greeter", world_id, Vec3::new(8.0, 64.0, 8.0))
            .with_model("Townsfolk_Greeter"),
    )
    .await;
    let actor = h.ctx.registry().actor_of(id).unwrap();
    let player = h.world.add_player(world_id, "alex", Vec3::new(18.0, 64.0, 8.0));

    h.presence.tick().await;
    assert!((h.world.actor_rotation(actor).await.unwrap() - 90.0).abs() < 1e-3);

    // Under a degree of change keeps the last rotation untouched
    h.world.move_player(player, Vec3::new(18.0, 64.0, 7.92));
    h.presence.tick().await;
    assert!((h.world.actor_rotation(actor).await.unwrap() - 90.0).abs() < 1e-3);

    // A real turn goes through
    h.world.move_player(player, Vec3::new(8.0, 64.0, 12.0));
    h.presence.tick().await;
    assert!(h.world.actor_rotation(actor).await.unwrap().abs() < 1e-3);
}

#[tokio::test]
async fn test_only_stay_citizens_rotate_and_only_in_radius() {
    let h = harness();
    let world_id = WorldId::new();

    let wanderer = add(
        &h,
        CitizenData::new("Wanderer", world_id, Vec3::new(8.0, 64.0, 8.0))
            .with_model("Townsfolk_Wanderer")
            .with_movement(MovementType::Wander, 6.0),
    )
    .await;
    let lonely = add(
        &h,
        CitizenData::new("Hermit", world_id, Vec3::new(100.0, 64.0, 100.0))
            .with_model("Townsfolk_Hermit"),
    )
    .await;
    let wanderer_actor = h.ctx.registry().actor_of(wanderer).unwrap();
    let lonely_actor = h.ctx.registry().actor_of(lonely).unwrap();

    // Beside the wanderer, 26+ blocks from the hermit
    h.world.add_player(world_id, "alex", Vec3::new(12.0, 64.0, 8.0));

    h.presence.tick().await;

    assert!(h.world.actor_rotation(wanderer_actor).await.unwrap().abs() < 1e-3);
    assert!(h.world.actor_rotation(lonely_actor).await.unwrap().abs() < 1e-3);
}

#[tokio::test]
async fn test_tick_snapshots_positions_and_restacks_displays() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(
        &h,
        CitizenData::new("Guide\nAsk me anything", world_id, Vec3::new(8.0, 64.0, 8.0))
            .with_model("Townsfolk_Guide"),
    )
    .await;
    let actor = h.ctx.registry().actor_of(id).unwrap();
    let displays = h.ctx.registry().displays_of(id);
    assert_eq!(displays.len(), 2);

    let moved = Vec3::new(10.0, 65.0, 11.0);
    h.world.teleport_actor(actor, moved).await;
    h.presence.tick().await;

    assert_eq!(h.ctx.registry().current_position(id), Some(moved));

    // Top line highest, lines a fixed step apart above the nametag offset
    let top = h.world.display_position(displays[0]).await.unwrap();
    let bottom = h.world.display_position(displays[1]).await.unwrap();
    assert!((top.y - (moved.y + 2.2 + 0.3)).abs() < 1e-3);
    assert!((bottom.y - (moved.y + 2.2)).abs() < 1e-3);
    assert_eq!((top.x, top.z), (moved.x, moved.z));
}

#[tokio::test]
async fn test_skin_refresh_respawns_only_on_texture_change() {
    let h = harness();
    let world_id = WorldId::new();
    h.world.put_skin("Notch", "texture-one");
    let id = add(
        &h,
        CitizenData::new("Lookalike", world_id, Vec3::new(8.0, 64.0, 8.0))
            .with_player_skin("Notch"),
    )
    .await;
    let original = h.ctx.registry().actor_of(id).unwrap();

    // First observation records the baseline without respawning
    h.presence.refresh_skins().await;
    assert_eq!(h.ctx.registry().actor_of(id), Some(original));

    // Unchanged texture keeps the actor alive
    h.presence.refresh_skins().await;
    assert_eq!(h.ctx.registry().actor_of(id), Some(original));

    // A texture change forces a respawn onto the new appearance
    h.world.put_skin("Notch", "texture-two");
    h.presence.refresh_skins().await;
    let refreshed = h.ctx.registry().actor_of(id).unwrap();
    assert_ne!(refreshed, original);
    assert_eq!(h.world.actor_count(), 1);
}
