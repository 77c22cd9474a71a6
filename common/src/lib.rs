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

//! Townsfolk Common Types
//!
//! This crate defines the shared data model used across the Townsfolk engine:
//! - Stable identifiers (citizens, worlds, actors, players, displays)
//! - Spatial value types (positions, chunk indices)
//! - Citizen configuration records and their sub-configs
//!   (messages, commands, animations, patrols, death handling)

pub mod animation;
pub mod citizen;
pub mod death;
pub mod id;
pub mod math;
pub mod message;
pub mod patrol;
