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

//! Citizen registry
//!
//! The authoritative concurrent map of citizen records: the single source of
//! truth for "what should exist." Runtime state for each record (live actor
//! id, display entity ids, guards) lives beside the record, keyed by id, so
//! nothing here ever holds a reference into the world.
//!
//! The by-world and by-group indices are rebuilt periodically rather than on
//! every mutation; per-tick scans tolerate staleness of one rebuild interval.

use crate::error::{CitizensError, Result};
use dashmap::{DashMap, DashSet};
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::{ActorId, CitizenId, DisplayId, WorldId};
use townsfolk_common::math::Vec3;

/// Runtime state of one citizen. `actor` is re-nulled on despawn before any
/// respawn, upholding the at-most-one-live-actor invariant.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub actor: Option<ActorId>,
    /// One display entity per non-empty name line while separate display
    /// mode is active, empty otherwise
    pub displays: Vec<DisplayId>,
    /// Last observed live position
    pub current_position: Option<Vec3>,
    pub awaiting_respawn: bool,
    /// Wall-clock time of the most recent death
    pub last_death: Option<chrono::DateTime<chrono::Utc>>,
}

/// Registry of citizen records and their runtime state
pub struct CitizenRegistry {
    citizens: DashMap<CitizenId, CitizenData>,
    live: DashMap<CitizenId, LiveState>,
    actor_index: DashMap<ActorId, CitizenId>,
    spawning: DashSet<CitizenId>,
    display_spawning: DashSet<CitizenId>,
    groups: DashSet<String>,
    by_world: DashMap<WorldId, Vec<CitizenId>>,
    by_group: DashMap<String, Vec<CitizenId>>,
}

impl CitizenRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            citizens: DashMap::new(),
            live: DashMap::new(),
            actor_index: DashMap::new(),
            spawning: DashSet::new(),
            display_spawning: DashSet::new(),
            groups: DashSet::new(),
            by_world: DashMap::new(),
            by_group: DashMap::new(),
        }
    }

    /// Add a citizen record. Replaces any previous record with the same id.
    pub fn add(&self, citizen: CitizenData) {
        if let Some(group) = &citizen.group {
            self.groups.insert(group.clone());
        }
        self.live.entry(citizen.id).or_default();
        self.citizens.insert(citizen.id, citizen);
    }

    /// Apply a mutation to a citizen record
    pub fn update<F>(&self, id: CitizenId, mutate: F) -> Result<CitizenData>
    where
        F: FnOnce(&mut CitizenData),
    {
        let mut entry = self
            .citizens
            .get_mut(&id)
            .ok_or(CitizensError::UnknownCitizen(id))?;
        mutate(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Remove a citizen record and its runtime state. The caller is
    /// responsible for despawning the live actor first.
    pub fn remove(&self, id: CitizenId) -> Result<CitizenData> {
        let (_, citizen) = self
            .citizens
            .remove(&id)
            .ok_or(CitizensError::UnknownCitizen(id))?;
        if let Some((_, state)) = self.live.remove(&id) {
            if let Some(actor) = state.actor {
                self.actor_index.remove(&actor);
            }
        }
        self.spawning.remove(&id);
        self.display_spawning.remove(&id);
        Ok(citizen)
    }

    /// Snapshot of a citizen record
    pub fn get(&self, id: CitizenId) -> Option<CitizenData> {
        self.citizens.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: CitizenId) -> bool {
        self.citizens.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.citizens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citizens.is_empty()
    }

    /// Snapshot of every citizen record
    pub fn list_all(&self) -> Vec<CitizenData> {
        self.citizens
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Citizens in a world, from the periodically rebuilt index
    pub fn list_by_world(&self, world: WorldId) -> Vec<CitizenData> {
        self.by_world
            .get(&world)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Citizens in a group, from the periodically rebuilt index
    pub fn list_by_group(&self, group: &str) -> Vec<CitizenData> {
        self.by_group
            .get(group)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Worlds that currently have at least one indexed citizen
    pub fn indexed_worlds(&self) -> Vec<WorldId> {
        self.by_world.iter().map(|entry| *entry.key()).collect()
    }

    /// Rebuild the by-world and by-group indices from the primary map
    pub fn rebuild_indices(&self) {
        let mut worlds: std::collections::HashMap<WorldId, Vec<CitizenId>> = Default::default();
        let mut groups: std::collections::HashMap<String, Vec<CitizenId>> = Default::default();
        for entry in self.citizens.iter() {
            worlds
                .entry(entry.value().world_id)
                .or_default()
                .push(*entry.key());
            if let Some(group) = &entry.value().group {
                groups.entry(group.clone()).or_default().push(*entry.key());
            }
        }
        self.by_world.clear();
        for (world, ids) in worlds {
            self.by_world.insert(world, ids);
        }
        self.by_group.clear();
        for (group, ids) in groups {
            self.by_group.insert(group, ids);
        }
    }

    // ---- runtime state ----

    /// Live actor of a citizen, if spawned
    pub fn actor_of(&self, id: CitizenId) -> Option<ActorId> {
        self.live.get(&id).and_then(|state| state.actor)
    }

    /// Reverse lookup from a live actor to its citizen
    pub fn citizen_by_actor(&self, actor: ActorId) -> Option<CitizenId> {
        self.actor_index.get(&actor).map(|entry| *entry.value())
    }

    /// Record the live actor id (or clear it with `None`)
    pub fn set_actor(&self, id: CitizenId, actor: Option<ActorId>) {
        let mut state = self.live.entry(id).or_default();
        if let Some(previous) = state.actor.take() {
            self.actor_index.remove(&previous);
        }
        state.actor = actor;
        drop(state);
        if let Some(actor) = actor {
            self.actor_index.insert(actor, id);
        }
    }

    pub fn displays_of(&self, id: CitizenId) -> Vec<DisplayId> {
        self.live
            .get(&id)
            .map(|state| state.displays.clone())
            .unwrap_or_default()
    }

    pub fn set_displays(&self, id: CitizenId, displays: Vec<DisplayId>) {
        self.live.entry(id).or_default().displays = displays;
    }

    pub fn current_position(&self, id: CitizenId) -> Option<Vec3> {
        self.live.get(&id).and_then(|state| state.current_position)
    }

    pub fn set_current_position(&self, id: CitizenId, position: Vec3) {
        self.live.entry(id).or_default().current_position = Some(position);
    }

    pub fn is_awaiting_respawn(&self, id: CitizenId) -> bool {
        self.live
            .get(&id)
            .map(|state| state.awaiting_respawn)
            .unwrap_or(false)
    }

    pub fn set_awaiting_respawn(&self, id: CitizenId, awaiting: bool) {
        self.live.entry(id).or_default().awaiting_respawn = awaiting;
    }

    pub fn last_death(&self, id: CitizenId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.live.get(&id).and_then(|state| state.last_death)
    }

    pub fn record_death(&self, id: CitizenId) {
        self.live.entry(id).or_default().last_death = Some(chrono::Utc::now());
    }

    /// Claim the per-citizen spawning guard. Returns `false` when another
    /// spawn for the same citizen is already in flight.
    pub fn try_begin_spawn(&self, id: CitizenId) -> bool {
        self.spawning.insert(id)
    }

    pub fn end_spawn(&self, id: CitizenId) {
        self.spawning.remove(&id);
    }

    /// Claim the per-citizen display-spawning guard
    pub fn try_begin_display_spawn(&self, id: CitizenId) -> bool {
        self.display_spawning.insert(id)
    }

    pub fn end_display_spawn(&self, id: CitizenId) {
        self.display_spawning.remove(&id);
    }

    // ---- groups ----

    pub fn create_group(&self, name: &str) -> Result<()> {
        if !self.groups.insert(name.to_string()) {
            return Err(CitizensError::DuplicateGroup(name.to_string()));
        }
        Ok(())
    }

    /// Delete a group, unassigning every member
    pub fn delete_group(&self, name: &str) -> Result<()> {
        if self.groups.remove(name).is_none() {
            return Err(CitizensError::UnknownGroup(name.to_string()));
        }
        for mut entry in self.citizens.iter_mut() {
            if entry.value().group.as_deref() == Some(name) {
                entry.value_mut().group = None;
            }
        }
        self.by_group.remove(name);
        Ok(())
    }

    pub fn rename_group(&self, from: &str, to: &str) -> Result<()> {
        if self.groups.contains(to) {
            return Err(CitizensError::DuplicateGroup(to.to_string()));
        }
        if self.groups.remove(from).is_none() {
            return Err(CitizensError::UnknownGroup(from.to_string()));
        }
        self.groups.insert(to.to_string());
        for mut entry in self.citizens.iter_mut() {
            if entry.value().group.as_deref() == Some(from) {
                entry.value_mut().group = Some(to.to_string());
            }
        }
        Ok(())
    }

    /// Assign a citizen to a group (or clear with `None`). Creates the
    /// group on first use.
    pub fn assign_group(&self, id: CitizenId, group: Option<String>) -> Result<()> {
        if let Some(name) = &group {
            self.groups.insert(name.clone());
        }
        self.update(id, |citizen| citizen.group = group)?;
        Ok(())
    }

    pub fn list_groups(&self) -> Vec<String> {
        self.groups.iter().map(|name| name.clone()).collect()
    }
}

impl Default for CitizenRegistry {
    fn default() -> Self {
        Self::new()
    }
}
