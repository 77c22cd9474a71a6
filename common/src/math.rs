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

//! Spatial value types

use serde::{Deserialize, Serialize};

/// Horizontal chunk edge length in world units
pub const CHUNK_SIZE: i32 = 16;

/// A position in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance. Arrival and proximity checks compare
    /// against squared thresholds to avoid the square root.
    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Horizontal squared distance, ignoring the vertical axis
    pub fn distance_squared_xz(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Yaw in degrees that faces from `self` toward `target`
    pub fn yaw_toward(&self, target: &Vec3) -> f32 {
        let dx = target.x - self.x;
        let dz = target.z - self.z;
        dx.atan2(dz).to_degrees()
    }

    /// Position offset vertically, used for name displays above an actor
    pub fn with_y_offset(&self, offset: f32) -> Vec3 {
        Vec3::new(self.x, self.y + offset, self.z)
    }

    /// Index of the chunk containing this position
    pub fn chunk(&self) -> ChunkIndex {
        ChunkIndex {
            x: (self.x.floor() as i32).div_euclid(CHUNK_SIZE),
            z: (self.z.floor() as i32).div_euclid(CHUNK_SIZE),
        }
    }
}

/// Index of a loadable world subdivision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub x: i32,
    pub z: i32,
}

impl std::fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
