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

//! Engine context
//!
//! One explicit context object owns the registry, the store, the definition
//! cache, the event bus, and the world collaborators. Every component takes
//! the context at construction; nothing reaches for a global.

use crate::config::TimerConfig;
use crate::definitions::BehaviorDefinitionCache;
use crate::events::EventBus;
use crate::registry::CitizenRegistry;
use crate::store::ConfigStore;
use crate::world::{DefinitionIndex, SkinProvider, WorldHost};
use std::sync::Arc;

/// Shared engine state handed to every component
pub struct EngineContext {
    registry: Arc<CitizenRegistry>,
    store: Arc<ConfigStore>,
    definitions: Arc<BehaviorDefinitionCache>,
    world: Arc<dyn WorldHost>,
    definition_index: Arc<dyn DefinitionIndex>,
    skins: Arc<dyn SkinProvider>,
    events: EventBus,
    timers: TimerConfig,
}

impl EngineContext {
    pub fn new(
        store: Arc<ConfigStore>,
        definitions: Arc<BehaviorDefinitionCache>,
        world: Arc<dyn WorldHost>,
        definition_index: Arc<dyn DefinitionIndex>,
        skins: Arc<dyn SkinProvider>,
        timers: TimerConfig,
    ) -> Self {
        Self {
            registry: Arc::new(CitizenRegistry::new()),
            store,
            definitions,
            world,
            definition_index,
            skins,
            events: EventBus::new(),
            timers,
        }
    }

    pub fn registry(&self) -> &CitizenRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn definitions(&self) -> &BehaviorDefinitionCache {
        &self.definitions
    }

    pub fn world(&self) -> &dyn WorldHost {
        self.world.as_ref()
    }

    pub fn world_arc(&self) -> Arc<dyn WorldHost> {
        Arc::clone(&self.world)
    }

    pub fn definition_index(&self) -> &dyn DefinitionIndex {
        self.definition_index.as_ref()
    }

    pub fn skins(&self) -> &dyn SkinProvider {
        self.skins.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn timers(&self) -> &TimerConfig {
        &self.timers
    }

    /// Load every persisted citizen into the registry and rebuild the
    /// indices. Returns the number of records loaded.
    pub fn load_population(&self) -> usize {
        let citizens = self.store.load_citizens();
        let count = citizens.len();
        for group in self.store.load_groups() {
            let _ = self.registry.create_group(&group);
        }
        for citizen in citizens {
            self.registry.add(citizen);
        }
        self.registry.rebuild_indices();
        tracing::info!("Loaded {} citizens into registry", count);
        count
    }
}
