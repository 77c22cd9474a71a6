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

//! Persistent configuration store
//!
//! Citizens, patrol paths, and groups are persisted as YAML documents under
//! the configured data directory. Saving a record normally flushes to disk
//! immediately; wrapping many writes in a [`BatchGuard`] from
//! [`ConfigStore::begin_batch`] defers the flush until the outermost guard
//! drops, so a multi-field save is one logical transaction against the
//! backing files.

use crate::error::{CitizensError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::CitizenId;
use townsfolk_common::patrol::PatrolPath;

const CITIZENS_FILE: &str = "citizens.yaml";
const PATHS_FILE: &str = "paths.yaml";
const GROUPS_FILE: &str = "groups.yaml";

#[derive(Default)]
struct StoreState {
    citizens: BTreeMap<CitizenId, CitizenData>,
    paths: BTreeMap<String, PatrolPath>,
    groups: BTreeSet<String>,
}

/// YAML-backed store for the persisted citizen population
pub struct ConfigStore {
    data_dir: PathBuf,
    state: Mutex<StoreState>,
    batch_depth: AtomicUsize,
    dirty: AtomicBool,
}

impl ConfigStore {
    /// Open a store rooted at `data_dir`, creating the directory and
    /// loading any existing documents
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let mut state = StoreState::default();
        let citizens_path = data_dir.join(CITIZENS_FILE);
        if citizens_path.exists() {
            let citizens: Vec<CitizenData> =
                serde_yaml::from_reader(std::fs::File::open(&citizens_path)?)?;
            state.citizens = citizens.into_iter().map(|c| (c.id, c)).collect();
        }
        let paths_path = data_dir.join(PATHS_FILE);
        if paths_path.exists() {
            let paths: Vec<PatrolPath> =
                serde_yaml::from_reader(std::fs::File::open(&paths_path)?)?;
            state.paths = paths.into_iter().map(|p| (p.name.clone(), p)).collect();
        }
        let groups_path = data_dir.join(GROUPS_FILE);
        if groups_path.exists() {
            state.groups = serde_yaml::from_reader(std::fs::File::open(&groups_path)?)?;
        }

        tracing::info!(
            citizens = state.citizens.len(),
            paths = state.paths.len(),
            groups = state.groups.len(),
            "Loaded configuration store from {}",
            data_dir.display()
        );

        Ok(Self {
            data_dir,
            state: Mutex::new(state),
            batch_depth: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
        })
    }

    /// Begin a write batch. Nested batches flush once, when the outermost
    /// guard drops.
    pub fn begin_batch(&self) -> BatchGuard<'_> {
        self.batch_depth.fetch_add(1, Ordering::SeqCst);
        BatchGuard { store: self }
    }

    fn after_write(&self) -> Result<()> {
        self.dirty.store(true, Ordering::SeqCst);
        if self.batch_depth.load(Ordering::SeqCst) == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every dirty document to disk
    pub fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let state = self.state.lock().unwrap();
        let citizens: Vec<&CitizenData> = state.citizens.values().collect();
        write_document(&self.data_dir.join(CITIZENS_FILE), &citizens)?;
        let paths: Vec<&PatrolPath> = state.paths.values().collect();
        write_document(&self.data_dir.join(PATHS_FILE), &paths)?;
        write_document(&self.data_dir.join(GROUPS_FILE), &state.groups)?;
        tracing::debug!(
            citizens = citizens.len(),
            "Flushed configuration store to {}",
            self.data_dir.display()
        );
        Ok(())
    }

    // ---- citizens ----

    pub fn save_citizen(&self, citizen: &CitizenData) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .citizens
            .insert(citizen.id, citizen.clone());
        self.after_write()
    }

    pub fn delete_citizen(&self, id: CitizenId) -> Result<()> {
        self.state.lock().unwrap().citizens.remove(&id);
        self.after_write()
    }

    pub fn load_citizen(&self, id: CitizenId) -> Option<CitizenData> {
        self.state.lock().unwrap().citizens.get(&id).cloned()
    }

    pub fn load_citizens(&self) -> Vec<CitizenData> {
        self.state.lock().unwrap().citizens.values().cloned().collect()
    }

    // ---- patrol paths ----

    pub fn save_path(&self, path: &PatrolPath) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .paths
            .insert(path.name.clone(), path.clone());
        self.after_write()
    }

    pub fn delete_path(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().paths.remove(name);
        self.after_write()
    }

    pub fn load_path(&self, name: &str) -> Option<PatrolPath> {
        self.state.lock().unwrap().paths.get(name).cloned()
    }

    pub fn load_paths(&self) -> Vec<PatrolPath> {
        self.state.lock().unwrap().paths.values().cloned().collect()
    }

    // ---- groups ----

    pub fn save_groups(&self, groups: &[String]) -> Result<()> {
        self.state.lock().unwrap().groups = groups.iter().cloned().collect();
        self.after_write()
    }

    pub fn load_groups(&self) -> Vec<String> {
        self.state.lock().unwrap().groups.iter().cloned().collect()
    }
}

fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value)?;
    std::fs::write(path, yaml).map_err(|e| {
        CitizensError::Storage(format!("failed to write {}: {}", path.display(), e))
    })
}

/// Scoped write batch. Dropping the outermost guard flushes everything
/// written while any batch was open.
pub struct BatchGuard<'a> {
    store: &'a ConfigStore,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.store.batch_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            if let Err(e) = self.store.flush() {
                tracing::warn!("Failed to flush configuration store: {}", e);
            }
        }
    }
}
