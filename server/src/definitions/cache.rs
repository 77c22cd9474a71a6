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

//! Definition cache and name resolution

use crate::definitions::generator;
use crate::error::Result;
use crate::world::DefinitionIndex;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::CitizenId;

/// Which definition name a live actor should run under right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionResolution {
    /// The generated definition is indexed and usable
    Registered(String),
    /// The generated definition is not indexed yet. Spawn on the static
    /// fallback and recheck for `generated` after a short delay.
    Fallback { fallback: String, generated: String },
}

impl DefinitionResolution {
    /// The name to spawn with now
    pub fn spawn_name(&self) -> &str {
        match self {
            DefinitionResolution::Registered(name) => name,
            DefinitionResolution::Fallback { fallback, .. } => fallback,
        }
    }
}

/// Writes one behavior document per citizen and remembers the last emitted
/// text so unchanged configuration never touches the filesystem.
pub struct BehaviorDefinitionCache {
    definitions_dir: PathBuf,
    last_written: DashMap<String, String>,
}

impl BehaviorDefinitionCache {
    pub fn new(definitions_dir: impl AsRef<Path>) -> Result<Self> {
        let definitions_dir = definitions_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&definitions_dir)?;
        Ok(Self {
            definitions_dir,
            last_written: DashMap::new(),
        })
    }

    /// Path of a citizen's generated definition file
    pub fn definition_path(&self, id: CitizenId) -> PathBuf {
        self.definitions_dir
            .join(generator::definition_file_name(id))
    }

    /// Regenerate a citizen's definition document, writing the file only
    /// when the serialized content differs from the last emitted document.
    /// Returns whether a change was written.
    pub fn regenerate(&self, citizen: &CitizenData) -> Result<bool> {
        let name = generator::definition_name(citizen.id);
        let content = generator::serialize_document(&generator::generate_document(citizen));

        let previous = match self.last_written.get(&name) {
            Some(cached) => Some(cached.clone()),
            // Cold cache: fall back to what is on disk from a prior run
            None => std::fs::read_to_string(self.definition_path(citizen.id)).ok(),
        };

        if previous.as_deref() == Some(content.as_str()) {
            self.last_written.insert(name, content);
            return Ok(false);
        }

        std::fs::write(self.definition_path(citizen.id), &content)?;
        tracing::debug!(citizen = %citizen.id, definition = %name, "Wrote behavior definition");
        self.last_written.insert(name, content);
        Ok(true)
    }

    /// Regenerate every citizen's definition, returning how many changed
    pub fn regenerate_all(&self, citizens: &[CitizenData]) -> usize {
        let mut changed = 0;
        for citizen in citizens {
            match self.regenerate(citizen) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(citizen = %citizen.id, "Failed to regenerate definition: {}", e);
                }
            }
        }
        changed
    }

    /// Delete a removed citizen's definition file
    pub fn delete(&self, id: CitizenId) -> Result<()> {
        self.last_written.remove(&generator::definition_name(id));
        let path = self.definition_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Resolve the definition name a spawn should use: regenerate the
    /// document, then prefer the generated name when the host has indexed
    /// it, falling back to the static name otherwise.
    pub async fn resolve(
        &self,
        citizen: &CitizenData,
        index: &dyn DefinitionIndex,
    ) -> Result<DefinitionResolution> {
        self.regenerate(citizen)?;
        let generated = generator::definition_name(citizen.id);
        if index.index_of(&generated).await.is_some() {
            Ok(DefinitionResolution::Registered(generated))
        } else {
            let fallback = generator::fallback_name(citizen);
            tracing::debug!(
                citizen = %citizen.id,
                %fallback,
                "Generated definition not indexed yet, using fallback"
            );
            Ok(DefinitionResolution::Fallback {
                fallback,
                generated,
            })
        }
    }
}
