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

//! Townsfolk Citizen Engine
//!
//! Lifecycle, scheduling, and behavior-regeneration engine for a persistent
//! population of configurable world citizens. The engine owns the citizen
//! registry and every periodic task that keeps live actors, name displays,
//! animations, and patrols synchronized with configuration, while all world
//! mutations go through the world collaborator's serialized execution queue.

pub mod animation;
pub mod config;
pub mod context;
pub mod damage;
pub mod definitions;
pub mod error;
pub mod events;
pub mod interaction;
pub mod lifecycle;
pub mod patrol;
pub mod presence;
pub mod registry;
pub mod store;
pub mod world;
