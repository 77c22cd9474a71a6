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

//! Patrol path configuration
//!
//! Paths are persisted independently of any one citizen; multiple citizens
//! may reference the same path by name. Runtime progress along a path lives
//! in the engine's patrol sessions, never here.

use crate::id::WorldId;
use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// What happens when a patrol reaches the end of its waypoint list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatrolMode {
    /// Index wraps modulo the waypoint count
    #[default]
    Loop,
    /// Direction reverses at either end of the list
    PingPong,
}

/// One stop along a patrol path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolWaypoint {
    pub position: Vec3,
    /// Seconds to wait at this waypoint before advancing
    #[serde(default)]
    pub pause_seconds: f32,
}

impl PatrolWaypoint {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            pause_seconds: 0.0,
        }
    }

    pub fn with_pause(mut self, seconds: f32) -> Self {
        self.pause_seconds = seconds;
        self
    }
}

/// A named, persisted waypoint path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolPath {
    pub name: String,
    pub world_id: WorldId,
    #[serde(default)]
    pub mode: PatrolMode,
    #[serde(default)]
    pub waypoints: Vec<PatrolWaypoint>,
}

impl PatrolPath {
    pub fn new(name: impl Into<String>, world_id: WorldId) -> Self {
        Self {
            name: name.into(),
            world_id,
            mode: PatrolMode::Loop,
            waypoints: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: PatrolMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_waypoint(mut self, waypoint: PatrolWaypoint) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}
