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

//! Interaction dispatch integration tests

use std::sync::Arc;
use tempfile::TempDir;
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::{CitizenId, WorldId};
use townsfolk_common::math::Vec3;
use townsfolk_common::message::{Channel, CitizenMessage, CommandAction, SelectionMode};
use townsfolk_server::config::TimerConfig;
use townsfolk_server::context::EngineContext;
use townsfolk_server::definitions::BehaviorDefinitionCache;
use townsfolk_server::events::{CitizenEvent, EventDisposition};
use townsfolk_server::interaction::{InteractionDispatcher, DEFAULT_DENIAL_MESSAGE};
use townsfolk_server::lifecycle::LifecycleOrchestrator;
use townsfolk_server::patrol::PatrolEngine;
use townsfolk_server::store::ConfigStore;
use townsfolk_server::world::memory::MemoryWorld;
use townsfolk_server::world::CommandOrigin;

struct Harness {
    ctx: Arc<EngineContext>,
    world: Arc<MemoryWorld>,
    lifecycle: Arc<LifecycleOrchestrator>,
    interactions: Arc<InteractionDispatcher>,
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
    let interactions = InteractionDispatcher::new(ctx.clone());
    Harness {
        ctx,
        world,
        lifecycle,
        interactions,
        _dir: dir,
    }
}

async fn add(h: &Harness, citizen: CitizenData) -> CitizenId {
    let id = citizen.id;
    h.lifecycle.add_citizen(citizen).await.unwrap();
    id
}

fn greeter(world_id: WorldId) -> CitizenData {
    CitizenData::new("Greeter", world_id, Vec3::new(8.0, 64.0, 8.0))
        .with_model("Townsfolk_Greeter")
}

#[tokio::test]
async fn test_channel_mismatch_is_a_silent_noop() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(
        &h,
        greeter(world_id)
            .with_message(CitizenMessage::new("Welcome!").with_trigger(Channel::LeftClick)),
    )
    .await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.dispatch(id, player, Channel::FKey).await.unwrap();

    assert!(h.world.sent_messages().is_empty());
    assert!(h.world.run_commands().is_empty());
}

#[tokio::test]
async fn test_listeners_observe_interactions_on_unconfigured_channels() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(
        &h,
        greeter(world_id)
            .with_message(CitizenMessage::new("Welcome!").with_trigger(Channel::LeftClick)),
    )
    .await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen_clone = seen.clone();
    h.ctx.events().subscribe(move |event| {
        if matches!(event, CitizenEvent::Interacted { .. }) {
            seen_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        EventDisposition::Continue
    });

    // Nothing is configured for the F-key, but the event still fires
    h.interactions.dispatch(id, player, Channel::FKey).await.unwrap();

    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(h.world.sent_messages().is_empty());
    assert!(h.world.run_commands().is_empty());
}

#[tokio::test]
async fn test_sequential_messages_cycle_per_player() {
    let h = harness();
    let world_id = WorldId::new();
    let mut citizen = greeter(world_id)
        .with_message(CitizenMessage::new("one"))
        .with_message(CitizenMessage::new("two"))
        .with_message(CitizenMessage::new("three"));
    citizen.interaction.message_selection = SelectionMode::Sequential;
    let id = add(&h, citizen).await;
    let alex = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));
    let brook = h.world.add_player(world_id, "Brook", Vec3::new(7.0, 64.0, 8.0));

    for _ in 0..4 {
        h.interactions.dispatch(id, alex, Channel::Both).await.unwrap();
    }
    // A different player has an independent cursor
    h.interactions.dispatch(id, brook, Channel::Both).await.unwrap();

    let texts: Vec<String> = h
        .world
        .sent_messages()
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(texts, vec!["one", "two", "three", "one", "one"]);
}

#[tokio::test]
async fn test_cooldown_swallows_rapid_interactions() {
    let h = harness();
    let world_id = WorldId::new();
    let id = add(&h, greeter(world_id).with_message(CitizenMessage::new("hi"))).await;
    let actor = h.ctx.registry().actor_of(id).unwrap();
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.handle_raw(player, actor, Channel::Both).await;
    h.interactions.handle_raw(player, actor, Channel::Both).await;

    assert_eq!(h.world.sent_messages().len(), 1);
}

#[tokio::test]
async fn test_permission_gate_sends_denial() {
    let h = harness();
    let world_id = WorldId::new();
    let mut citizen = greeter(world_id)
        .with_message(CitizenMessage::new("secret"))
        .with_command(CommandAction::new("give {PlayerName} gold"));
    citizen.interaction.permission = Some("townsfolk.vip".to_string());
    let id = add(&h, citizen).await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();

    let messages = h.world.sent_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, DEFAULT_DENIAL_MESSAGE);
    assert!(h.world.run_commands().is_empty());

    // Granting the permission opens the gate
    h.world.grant_permission(player, "townsfolk.vip");
    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();
    let messages = h.world.sent_messages();
    assert_eq!(messages.last().map(|(_, text)| text.as_str()), Some("secret"));
    assert_eq!(h.world.run_commands().len(), 1);
}

#[tokio::test]
async fn test_placeholders_and_send_message_pseudo_command() {
    let h = harness();
    let world_id = WorldId::new();
    let citizen = greeter(world_id)
        .with_message(CitizenMessage::new("Well met, {PlayerName}!"))
        .with_command(CommandAction::new("{SendMessage} {CitizenName} nods."))
        .with_command(CommandAction::new("wave {playername}").as_server());
    let id = add(&h, citizen).await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();

    let texts: Vec<String> = h
        .world
        .sent_messages()
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(texts, vec!["Well met, Alex!", "Greeter nods."]);

    // The pseudo command never reaches the command runner
    let commands = h.world.run_commands();
    assert_eq!(commands.len(), 1);
    assert!(matches!(commands[0].0, CommandOrigin::Server));
    assert_eq!(commands[0].1, "wave Alex");
}

#[tokio::test]
async fn test_as_player_commands_run_as_the_interacting_player() {
    let h = harness();
    let world_id = WorldId::new();
    let citizen = greeter(world_id).with_command(CommandAction::new("warp plaza"));
    let id = add(&h, citizen).await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();

    let commands = h.world.run_commands();
    assert_eq!(commands.len(), 1);
    match commands[0].0 {
        CommandOrigin::Player(runner) => assert_eq!(runner, player),
        CommandOrigin::Server => panic!("expected player origin"),
    }
}

#[tokio::test]
async fn test_cancelled_event_stops_everything() {
    let h = harness();
    let world_id = WorldId::new();
    let citizen = greeter(world_id)
        .with_message(CitizenMessage::new("hi"))
        .with_command(CommandAction::new("give gold"));
    let id = add(&h, citizen).await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.ctx.events().subscribe(|event| match event {
        CitizenEvent::Interacted { .. } => EventDisposition::Cancel,
        _ => EventDisposition::Continue,
    });

    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();

    assert!(h.world.sent_messages().is_empty());
    assert!(h.world.run_commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_message_delays_are_honored_in_order() {
    let h = harness();
    let world_id = WorldId::new();
    let citizen = greeter(world_id)
        .with_message(CitizenMessage::new("first"))
        .with_message(CitizenMessage::new("second").with_delay(1.5))
        .with_message(CitizenMessage::new("third").with_delay(0.5));
    let id = add(&h, citizen).await;
    let player = h.world.add_player(world_id, "Alex", Vec3::new(9.0, 64.0, 8.0));

    h.interactions.dispatch(id, player, Channel::Both).await.unwrap();

    let texts: Vec<String> = h
        .world
        .sent_messages()
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}
