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

use clap::Parser;
use std::sync::Arc;
use townsfolk_server::animation::AnimationScheduler;
use townsfolk_server::config::{Arguments, Configuration};
use townsfolk_server::context::EngineContext;
use townsfolk_server::damage::DamageGate;
use townsfolk_server::definitions::BehaviorDefinitionCache;
use townsfolk_server::interaction::InteractionDispatcher;
use townsfolk_server::lifecycle::LifecycleOrchestrator;
use townsfolk_server::patrol::PatrolEngine;
use townsfolk_server::presence::PresenceService;
use townsfolk_server::store::ConfigStore;
use townsfolk_server::world::memory::MemoryWorld;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        // Try default .env file
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config: Configuration =
        Configuration::load(&arguments.config_file).expect("Unable to load configuration file");

    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Townsfolk Citizen Server...");

    // Open the persisted citizen/path/group store
    let store = Arc::new(ConfigStore::open(config.storage.data_dir.as_path())?);
    tracing::info!(
        "Config store opened at {}",
        config.storage.data_dir.as_path().display()
    );

    // Behavior definition cache writing into the host's definitions directory
    let definitions = Arc::new(BehaviorDefinitionCache::new(
        config.storage.definitions_dir.as_path(),
    )?);
    tracing::info!(
        "Definition cache writing to {}",
        config.storage.definitions_dir.as_path().display()
    );

    // The in-process world host doubles as definition index and skin source
    let world = Arc::new(MemoryWorld::new());
    world.load_everything();

    let context = Arc::new(EngineContext::new(
        store,
        definitions,
        world.clone(),
        world.clone(),
        world.clone(),
        config.timers.clone(),
    ));
    tracing::info!("Engine context initialized");

    // Engine components
    let patrols = PatrolEngine::new(context.clone());
    let lifecycle = LifecycleOrchestrator::new(context.clone(), patrols.clone());
    let animations = AnimationScheduler::new(context.clone());
    let presence = PresenceService::new(context.clone(), lifecycle.clone());
    let interactions = InteractionDispatcher::new(context.clone());
    let damage = DamageGate::new(context.clone(), lifecycle.clone(), animations.clone());

    // Reloaded chunks drain the deferred-removal queue
    let removals = lifecycle.removals().clone();
    world.on_chunk_load(move |world_id, chunk| {
        removals.notify_chunk_available(world_id, chunk);
    });

    // Load the population and make sure every definition file is current
    let loaded = context.load_population();
    let regenerated = context
        .definitions()
        .regenerate_all(&context.registry().list_all());
    tracing::info!(
        "Loaded {} citizens, {} definitions rewritten",
        loaded,
        regenerated
    );

    // Bring every citizen into the world
    lifecycle.spawn_all().await;

    // Periodic engine tasks
    let tickers = vec![
        patrols.spawn_ticker(),
        animations.spawn_ticker(),
        presence.spawn_ticker(),
        presence.spawn_skin_refresher(),
        presence.spawn_index_rebuilder(),
    ];
    tracing::info!("Engine tasks started");

    // The embedding host drives these from its own event feed; keep them
    // alive for the life of the process
    let _interactions = interactions;
    let _damage = damage;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    for ticker in tickers {
        ticker.abort();
    }
    animations.cancel_all();
    lifecycle.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
