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

//! Message and command configuration

use serde::{Deserialize, Serialize};

/// Semantic interaction source used to filter which messages and commands
/// apply. `Both` matches every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    LeftClick,
    FKey,
    Both,
}

impl Channel {
    /// Whether a configured trigger matches the channel an interaction
    /// arrived on
    pub fn matches(&self, source: Channel) -> bool {
        *self == Channel::Both || *self == source
    }
}

/// How to pick among the messages or commands that match a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMode {
    /// One match chosen uniformly at random
    Random,
    /// A per-player cursor advances one match per interaction, wrapping
    Sequential,
    /// Every match, in configured order
    #[default]
    All,
}

/// A configured chat message a citizen can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenMessage {
    pub message: String,
    #[serde(default = "default_trigger")]
    pub trigger: Channel,
    #[serde(default)]
    pub delay_seconds: f32,
}

impl CitizenMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trigger: Channel::Both,
            delay_seconds: 0.0,
        }
    }

    pub fn with_trigger(mut self, trigger: Channel) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_delay(mut self, delay_seconds: f32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }
}

/// A configured command a citizen interaction can run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAction {
    pub command: String,
    #[serde(default = "default_trigger")]
    pub trigger: Channel,
    /// Run with server authority instead of as the acting player
    #[serde(default)]
    pub run_as_server: bool,
    #[serde(default)]
    pub delay_seconds: f32,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            trigger: Channel::Both,
            run_as_server: false,
            delay_seconds: 0.0,
        }
    }

    pub fn with_trigger(mut self, trigger: Channel) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn as_server(mut self) -> Self {
        self.run_as_server = true;
        self
    }

    pub fn with_delay(mut self, delay_seconds: f32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }
}

fn default_trigger() -> Channel {
    Channel::Both
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_matching() {
        assert!(Channel::Both.matches(Channel::FKey));
        assert!(Channel::Both.matches(Channel::LeftClick));
        assert!(Channel::FKey.matches(Channel::FKey));
        assert!(!Channel::FKey.matches(Channel::LeftClick));
        assert!(!Channel::LeftClick.matches(Channel::FKey));
    }

    #[test]
    fn test_message_defaults_from_yaml() {
        let msg: CitizenMessage = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(msg.trigger, Channel::Both);
        assert_eq!(msg.delay_seconds, 0.0);
    }

    #[test]
    fn test_channel_serialized_form() {
        let json = serde_json::to_string(&Channel::FKey).unwrap();
        assert_eq!(json, "\"F_KEY\"");
        let json = serde_json::to_string(&Channel::LeftClick).unwrap();
        assert_eq!(json, "\"LEFT_CLICK\"");
    }
}
