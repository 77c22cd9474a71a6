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

//! Interaction dispatch
//!
//! Resolves a raw interaction into a semantic channel, applies the
//! per-player cooldown, fires the cancellable interacted event, then
//! applies the permission gate and runs the configured messages and
//! commands for that channel.
//! Per-player state (cooldowns, sequential cursors) lives in bounded
//! TTL caches so distinct players never grow it without limit.

use crate::context::EngineContext;
use crate::error::Result;
use crate::events::CitizenEvent;
use crate::world::CommandOrigin;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use townsfolk_common::citizen::CitizenData;
use townsfolk_common::id::{ActorId, CitizenId, PlayerId};
use townsfolk_common::message::{Channel, CitizenMessage, CommandAction, SelectionMode};

/// Per-player interaction cooldown
pub const INTERACTION_COOLDOWN: Duration = Duration::from_millis(500);
/// Pseudo-command prefix that short-circuits to a direct message
pub const SEND_MESSAGE_PREFIX: &str = "{SendMessage}";
/// Denial sent when the permission gate fails and no override is configured
pub const DEFAULT_DENIAL_MESSAGE: &str = "You cannot interact with this citizen.";

const CURSOR_CACHE_CAPACITY: u64 = 4096;
const CURSOR_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Case-insensitive replacement of a literal `{Token}` placeholder
fn replace_token_ci(text: &str, token: &str, value: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if let Some(candidate) = text.get(i..i + token.len()) {
            if candidate.eq_ignore_ascii_case(token) {
                result.push_str(value);
                i += token.len();
                continue;
            }
        }
        let Some(ch) = text[i..].chars().next() else {
            break;
        };
        result.push(ch);
        i += ch.len_utf8();
    }
    result
}

/// Substitute `{PlayerName}` and `{CitizenName}` placeholders
pub fn substitute_placeholders(text: &str, player_name: &str, citizen_name: &str) -> String {
    let text = replace_token_ci(text, "{PlayerName}", player_name);
    replace_token_ci(&text, "{CitizenName}", citizen_name)
}

/// Select which entries apply under a selection mode. `Sequential` uses the
/// caller-provided monotonic cursor.
pub fn select_entries<T: Clone>(entries: &[T], mode: SelectionMode, cursor: u64) -> Vec<T> {
    if entries.is_empty() {
        return Vec::new();
    }
    match mode {
        SelectionMode::Random => {
            let pick = rand::rng().random_range(0..entries.len());
            vec![entries[pick].clone()]
        }
        SelectionMode::Sequential => {
            vec![entries[(cursor as usize) % entries.len()].clone()]
        }
        SelectionMode::All => entries.to_vec(),
    }
}

/// Run a command chain sequentially: each entry's delay is honored before
/// it runs, placeholders are substituted, and the send-message pseudo
/// command short-circuits to a direct message.
pub async fn run_command_chain(
    ctx: &EngineContext,
    citizen_name: &str,
    player: PlayerId,
    player_name: &str,
    commands: &[CommandAction],
) {
    for command in commands {
        if command.delay_seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f32(command.delay_seconds)).await;
        }
        let rendered = substitute_placeholders(&command.command, player_name, citizen_name);
        if let Some(message) = rendered.strip_prefix(SEND_MESSAGE_PREFIX) {
            if let Err(e) = ctx.world().send_message(player, message.trim()).await {
                tracing::debug!(%player, "Send-message command failed: {}", e);
            }
            continue;
        }
        let origin = if command.run_as_server {
            CommandOrigin::Server
        } else {
            CommandOrigin::Player(player)
        };
        if let Err(e) = ctx.world().run_command(origin, &rendered).await {
            tracing::warn!(%player, command = %rendered, "Command failed: {}", e);
        }
    }
}

/// Maps raw interactions onto configured citizen behavior
pub struct InteractionDispatcher {
    ctx: Arc<EngineContext>,
    cooldowns: moka::sync::Cache<PlayerId, ()>,
    cursors: moka::sync::Cache<(CitizenId, PlayerId), u64>,
}

impl InteractionDispatcher {
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            cooldowns: moka::sync::Cache::builder()
                .max_capacity(CURSOR_CACHE_CAPACITY)
                .time_to_live(INTERACTION_COOLDOWN)
                .build(),
            cursors: moka::sync::Cache::builder()
                .max_capacity(CURSOR_CACHE_CAPACITY)
                .time_to_live(CURSOR_CACHE_TTL)
                .build(),
        })
    }

    /// Entry point for raw interaction events: resolve the target citizen
    /// by its live actor id and dispatch on the semantic channel. Unmatched
    /// actors and cooldown hits are silent.
    pub async fn handle_raw(&self, player: PlayerId, target: ActorId, channel: Channel) {
        let Some(citizen_id) = self.ctx.registry().citizen_by_actor(target) else {
            return;
        };
        if !self.check_cooldown(player) {
            return;
        }
        if let Err(e) = self.dispatch(citizen_id, player, channel).await {
            tracing::warn!(citizen = %citizen_id, %player, "Interaction failed: {}", e);
        }
    }

    /// Cooldown check and stamp. Returns `false` while the player is still
    /// cooling down.
    fn check_cooldown(&self, player: PlayerId) -> bool {
        if self.cooldowns.contains_key(&player) {
            return false;
        }
        self.cooldowns.insert(player, ());
        true
    }

    /// Clear a player's cooldown, used when they disconnect
    pub fn clear_cooldown(&self, player: PlayerId) {
        self.cooldowns.invalidate(&player);
    }

    /// Dispatch an interaction on a resolved citizen
    pub async fn dispatch(
        &self,
        citizen_id: CitizenId,
        player: PlayerId,
        channel: Channel,
    ) -> Result<()> {
        let Some(citizen) = self.ctx.registry().get(citizen_id) else {
            return Ok(());
        };

        // Listeners see every interaction, configured effects or not
        let cancelled = self.ctx.events().dispatch(&CitizenEvent::Interacted {
            citizen: citizen_id,
            player,
            channel,
        });
        if cancelled {
            tracing::debug!(citizen = %citizen_id, %player, "Interaction cancelled by listener");
            return Ok(());
        }

        let messages: Vec<CitizenMessage> = citizen
            .interaction
            .messages
            .iter()
            .filter(|message| message.trigger.matches(channel))
            .cloned()
            .collect();
        let commands: Vec<CommandAction> = citizen
            .interaction
            .commands
            .iter()
            .filter(|command| command.trigger.matches(channel))
            .cloned()
            .collect();
        if messages.is_empty() && commands.is_empty() {
            // Nothing configured for this channel: silent no-op
            return Ok(());
        }

        if let Some(permission) = &citizen.interaction.permission {
            if !self.ctx.world().has_permission(player, permission).await {
                let denial = citizen
                    .interaction
                    .permission_denied_message
                    .as_deref()
                    .unwrap_or(DEFAULT_DENIAL_MESSAGE);
                self.ctx.world().send_message(player, denial).await?;
                return Ok(());
            }
        }

        let player_name = self
            .ctx
            .world()
            .player_name(player)
            .await
            .unwrap_or_default();

        if !messages.is_empty() {
            let cursor = self.advance_cursor(citizen_id, player, &messages);
            let selected =
                select_entries(&messages, citizen.interaction.message_selection, cursor);
            self.send_messages(&citizen, player, &player_name, selected)
                .await;
        }

        if !commands.is_empty() {
            let selected = select_entries(&commands, citizen.interaction.command_selection, 0);
            run_command_chain(&self.ctx, &citizen.name, player, &player_name, &selected).await;
        }

        Ok(())
    }

    /// Advance the per-player sequential cursor by exactly one, returning
    /// the value to select with. Only `Sequential` mode consumes it.
    fn advance_cursor(
        &self,
        citizen_id: CitizenId,
        player: PlayerId,
        messages: &[CitizenMessage],
    ) -> u64 {
        let key = (citizen_id, player);
        let cursor = self.cursors.get(&key).unwrap_or(0);
        if !messages.is_empty() {
            self.cursors.insert(key, cursor.wrapping_add(1));
        }
        cursor
    }

    async fn send_messages(
        &self,
        citizen: &CitizenData,
        player: PlayerId,
        player_name: &str,
        messages: Vec<CitizenMessage>,
    ) {
        for message in messages {
            let text = substitute_placeholders(&message.message, player_name, &citizen.name);
            if message.delay_seconds > 0.0 {
                tokio::time::sleep(Duration::from_secs_f32(message.delay_seconds)).await;
            }
            if let Err(e) = self.ctx.world().send_message(player, &text).await {
                tracing::debug!(%player, "Message send failed: {}", e);
            }
        }
    }
}
