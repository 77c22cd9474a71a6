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

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub storage: StorageConfig,
    #[serde(default)]
    pub timers: TimerConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, String> {
        let conf = serde_yaml::from_reader(
            std::fs::File::open(path).map_err(|e| format!("Failed to open config file: {}", e))?,
        )
        .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(conf)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted citizen/path/group documents
    pub data_dir: EnvField<DataDirectory>,

    /// Directory the generated behavior definitions are written into
    pub definitions_dir: EnvField<DataDirectory>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Default::default(),
            definitions_dir: Default::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataDirectory(PathBuf);

impl DataDirectory {
    pub fn as_path(&self) -> &std::path::Path {
        self.0.as_path()
    }

    pub fn join(&self, child: &str) -> PathBuf {
        self.0.join(child)
    }
}

impl FromStr for DataDirectory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl Default for DataDirectory {
    fn default() -> Self {
        Self(PathBuf::from("data"))
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Periodic task cadences. Defaults match the engine's tuned values; most
/// deployments never override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Patrol state machine tick, milliseconds
    #[serde(default = "default_patrol_tick_ms")]
    pub patrol_tick_ms: u64,

    /// Animation scheduler tick, milliseconds
    #[serde(default = "default_animation_tick_ms")]
    pub animation_tick_ms: u64,

    /// Rotation / name-display / position-snapshot upkeep tick, milliseconds
    #[serde(default = "default_presence_tick_ms")]
    pub presence_tick_ms: u64,

    /// By-world index rebuild interval, seconds
    #[serde(default = "default_index_rebuild_secs")]
    pub index_rebuild_secs: u64,

    /// Player-skin refresh interval, seconds
    #[serde(default = "default_skin_refresh_secs")]
    pub skin_refresh_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            patrol_tick_ms: default_patrol_tick_ms(),
            animation_tick_ms: default_animation_tick_ms(),
            presence_tick_ms: default_presence_tick_ms(),
            index_rebuild_secs: default_index_rebuild_secs(),
            skin_refresh_secs: default_skin_refresh_secs(),
        }
    }
}

fn default_patrol_tick_ms() -> u64 {
    250
}

fn default_animation_tick_ms() -> u64 {
    250
}

fn default_presence_tick_ms() -> u64 {
    500
}

fn default_index_rebuild_secs() -> u64 {
    30
}

fn default_skin_refresh_secs() -> u64 {
    300
}
