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

//! Behavior definition generation and caching
//!
//! Each citizen gets one declarative behavior document, written as a JSON
//! file named deterministically from the citizen id. The host indexes these
//! documents on its own hot-reload schedule, so a freshly written definition
//! may not be usable yet; resolution falls back to a small fixed set of
//! pre-registered definitions until the generated one appears.

pub mod cache;
pub mod generator;

pub use cache::{BehaviorDefinitionCache, DefinitionResolution};
