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

//! Damage gate and death flow
//!
//! Intercepts incoming damage to live citizen actors. Invulnerable and
//! passive citizens cancel damage outright; everyone else plays their
//! on-attack animations, and lethal damage enters the death flow: a
//! cancellable death event, then drops, commands, messages, teardown, and
//! an optional scheduled respawn. The `awaiting_respawn` flag guards
//! against the same death being handled twice while effects are in flight.

use crate::animation::AnimationScheduler;
use crate::context::EngineContext;
use crate::events::CitizenEvent;
use crate::interaction::{substitute_placeholders, SEND_MESSAGE_PREFIX};
use crate::lifecycle::LifecycleOrchestrator;
use crate::world::CommandOrigin;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use townsfolk_common::animation::AnimationTrigger;
use townsfolk_common::citizen::{Attitude, CitizenData};
use townsfolk_common::id::{ActorId, PlayerId};
use townsfolk_common::message::SelectionMode;

/// What the host should do with an intercepted damage event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The target is not a citizen actor
    Ignored,
    /// The damage is voided
    Cancelled,
    /// The damage stands and the citizen survives
    Applied,
    /// The damage stands and the death flow has run
    Fatal,
}

/// Whether a hit kills, given health before the hit
pub fn is_lethal(health_before: f32, damage: f32) -> bool {
    health_before - damage <= 0.0
}

/// Gate between raw damage events and citizen state
pub struct DamageGate {
    ctx: Arc<EngineContext>,
    lifecycle: Arc<LifecycleOrchestrator>,
    animations: Arc<AnimationScheduler>,
}

impl DamageGate {
    pub fn new(
        ctx: Arc<EngineContext>,
        lifecycle: Arc<LifecycleOrchestrator>,
        animations: Arc<AnimationScheduler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            lifecycle,
            animations,
        })
    }

    /// Handle a damage event against an actor. `health_before` is the
    /// target's health before the hit is applied.
    pub async fn handle_damage(
        &self,
        target: ActorId,
        attacker: Option<PlayerId>,
        damage: f32,
        health_before: f32,
    ) -> DamageOutcome {
        let Some(citizen_id) = self.ctx.registry().citizen_by_actor(target) else {
            return DamageOutcome::Ignored;
        };
        let Some(citizen) = self.ctx.registry().get(citizen_id) else {
            return DamageOutcome::Ignored;
        };

        // A death already in flight voids any further hits on the corpse
        if self.ctx.registry().is_awaiting_respawn(citizen_id) {
            return DamageOutcome::Cancelled;
        }

        if citizen.combat.invulnerable || citizen.attitude == Attitude::Passive {
            return DamageOutcome::Cancelled;
        }

        for animation in &citizen.animations {
            if animation.trigger == AnimationTrigger::OnAttack {
                self.animations.play(&citizen, target, animation).await;
            }
        }

        if !is_lethal(health_before, damage) {
            return DamageOutcome::Applied;
        }

        self.handle_death(citizen, attacker).await
    }

    /// Run the death flow for a citizen. Returns `Cancelled` when a
    /// listener vetoes the death, voiding the damage.
    async fn handle_death(
        &self,
        citizen: CitizenData,
        killer: Option<PlayerId>,
    ) -> DamageOutcome {
        let id = citizen.id;
        let cancelled = self.ctx.events().dispatch(&CitizenEvent::Died {
            citizen: id,
            killer,
        });
        if cancelled {
            tracing::debug!(citizen = %id, "Death cancelled by listener");
            return DamageOutcome::Cancelled;
        }

        self.ctx.registry().set_awaiting_respawn(id, true);
        self.ctx.registry().record_death(id);
        tracing::info!(citizen = %id, name = %citizen.name, "Citizen died");

        let position = self
            .ctx
            .registry()
            .current_position(id)
            .unwrap_or(citizen.position);

        for drop in &citizen.death.drops {
            if drop.item_id.trim().is_empty() {
                continue;
            }
            if let Err(e) = self
                .ctx
                .world()
                .drop_items(citizen.world_id, position, &drop.item_id, drop.quantity)
                .await
            {
                tracing::warn!(citizen = %id, item = %drop.item_id, "Death drop failed: {}", e);
            }
        }

        let killer_name = match killer {
            Some(player) => self
                .ctx
                .world()
                .player_name(player)
                .await
                .unwrap_or_default(),
            None => String::new(),
        };

        self.run_death_commands(&citizen, killer, &killer_name).await;
        if let Some(player) = killer {
            self.send_death_messages(&citizen, player, &killer_name).await;
        }

        // Tear down the actor and displays; killing the host entity is the
        // host's business, the engine just forgets it
        self.lifecycle.despawn_citizen(id).await;

        if citizen.respawn_on_death {
            self.lifecycle.schedule_respawn(
                id,
                Duration::from_secs_f32(citizen.respawn_delay_seconds),
            );
        }

        DamageOutcome::Fatal
    }

    /// Death commands: RANDOM picks one, anything else runs them all as a
    /// sequential chain with per-entry delays. As-killer commands are
    /// skipped when nobody killed the citizen.
    async fn run_death_commands(
        &self,
        citizen: &CitizenData,
        killer: Option<PlayerId>,
        killer_name: &str,
    ) {
        let commands = &citizen.death.commands;
        if commands.is_empty() {
            return;
        }
        let selected: Vec<_> = match citizen.death.command_selection {
            SelectionMode::Random => {
                let pick = rand::rng().random_range(0..commands.len());
                vec![commands[pick].clone()]
            }
            _ => commands.clone(),
        };

        for command in selected {
            if command.delay_seconds > 0.0 {
                tokio::time::sleep(Duration::from_secs_f32(command.delay_seconds)).await;
            }
            let rendered = substitute_placeholders(&command.command, killer_name, &citizen.name);
            if let Some(message) = rendered.strip_prefix(SEND_MESSAGE_PREFIX) {
                if let Some(player) = killer {
                    if let Err(e) = self.ctx.world().send_message(player, message.trim()).await {
                        tracing::debug!(citizen = %citizen.id, "Death message command failed: {}", e);
                    }
                }
                continue;
            }
            let origin = match (command.run_as_server, killer) {
                (true, _) => CommandOrigin::Server,
                (false, Some(player)) => CommandOrigin::Player(player),
                (false, None) => continue,
            };
            if let Err(e) = self.ctx.world().run_command(origin, &rendered).await {
                tracing::warn!(citizen = %citizen.id, command = %rendered, "Death command failed: {}", e);
            }
        }
    }

    /// Death messages to the killer: RANDOM picks one, anything else is a
    /// sequential chain honoring each entry's delay
    async fn send_death_messages(
        &self,
        citizen: &CitizenData,
        killer: PlayerId,
        killer_name: &str,
    ) {
        let messages = &citizen.death.messages;
        if messages.is_empty() {
            return;
        }
        let selected: Vec<_> = match citizen.death.message_selection {
            SelectionMode::Random => {
                let pick = rand::rng().random_range(0..messages.len());
                vec![messages[pick].clone()]
            }
            _ => messages.clone(),
        };

        for message in selected {
            if message.delay_seconds > 0.0 {
                tokio::time::sleep(Duration::from_secs_f32(message.delay_seconds)).await;
            }
            let text = substitute_placeholders(&message.message, killer_name, &citizen.name);
            if let Err(e) = self.ctx.world().send_message(killer, &text).await {
                tracing::debug!(citizen = %citizen.id, "Death message failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_lethal_boundaries() {
        assert!(is_lethal(10.0, 10.0));
        assert!(is_lethal(10.0, 12.5));
        assert!(!is_lethal(10.0, 9.9));
        assert!(is_lethal(0.0, 0.0));
    }
}
