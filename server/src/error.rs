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

//! Engine error taxonomy
//!
//! Transient environment failures (chunk unloaded, stale actor reference)
//! are retried or deferred, never fatal. Configuration failures abort one
//! citizen's processing and leave the rest of the population untouched.

use townsfolk_common::id::{ActorId, CitizenId, WorldId};
use townsfolk_common::math::ChunkIndex;

#[derive(Debug, thiserror::Error)]
pub enum CitizensError {
    #[error("unknown citizen {0}")]
    UnknownCitizen(CitizenId),

    #[error("unknown world {0}")]
    UnknownWorld(WorldId),

    #[error("unknown patrol path '{0}'")]
    UnknownPath(String),

    #[error("patrol path '{0}' already exists")]
    DuplicatePath(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("group '{0}' already exists")]
    DuplicateGroup(String),

    #[error("chunk {chunk} in world {world} not loaded")]
    ChunkUnloaded { world: WorldId, chunk: ChunkIndex },

    #[error("timed out waiting for chunk {chunk} in world {world}")]
    ChunkTimeout { world: WorldId, chunk: ChunkIndex },

    #[error("actor {0} not resolvable")]
    StaleActor(ActorId),

    #[error("citizen {0} has no resolvable model or skin")]
    UnresolvableAppearance(CitizenId),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for CitizensError {
    fn from(err: serde_yaml::Error) -> Self {
        CitizensError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CitizensError {
    fn from(err: serde_json::Error) -> Self {
        CitizensError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CitizensError>;
