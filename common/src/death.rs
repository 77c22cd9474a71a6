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

//! Death handling configuration

use crate::message::{CitizenMessage, CommandAction, SelectionMode};
use serde::{Deserialize, Serialize};

/// An item stack dropped when a citizen dies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathDropItem {
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl DeathDropItem {
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

fn default_quantity() -> u32 {
    1
}

/// What happens when a citizen dies. Messages and commands reuse the
/// interaction value objects but are selected and dispatched independently
/// of any interaction configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeathConfig {
    #[serde(default)]
    pub messages: Vec<CitizenMessage>,
    #[serde(default)]
    pub message_selection: SelectionMode,
    #[serde(default)]
    pub commands: Vec<CommandAction>,
    #[serde(default)]
    pub command_selection: SelectionMode,
    #[serde(default)]
    pub drops: Vec<DeathDropItem>,
}

impl DeathConfig {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.commands.is_empty() && self.drops.is_empty()
    }
}
