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

//! Event type definitions

use townsfolk_common::id::{ActorId, CitizenId, PlayerId};
use townsfolk_common::message::Channel;

/// Events delivered to external listeners. `Interacted` and `Died` are
/// dispatched before their side effects commit and may be cancelled; the
/// rest are post-hoc notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum CitizenEvent {
    /// A player interacted with a live citizen
    Interacted {
        citizen: CitizenId,
        player: PlayerId,
        channel: Channel,
    },
    /// A citizen took lethal damage
    Died {
        citizen: CitizenId,
        killer: Option<PlayerId>,
    },
    /// A citizen's actor finished spawning
    Spawned {
        citizen: CitizenId,
        actor: ActorId,
    },
    /// A citizen's actor was removed (or queued for deferred removal)
    Despawned { citizen: CitizenId },
    /// A citizen record was deleted
    Removed { citizen: CitizenId },
}

impl CitizenEvent {
    pub fn citizen(&self) -> CitizenId {
        match self {
            CitizenEvent::Interacted { citizen, .. }
            | CitizenEvent::Died { citizen, .. }
            | CitizenEvent::Spawned { citizen, .. }
            | CitizenEvent::Despawned { citizen }
            | CitizenEvent::Removed { citizen } => *citizen,
        }
    }
}
