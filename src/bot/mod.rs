//! # Bot Module
//!
//! Serenity event handler that feeds gateway events into the playback core:
//!
//! - `ready` announces the audio node to the [`SessionRegistry`]
//! - `reaction_add` forwards reactions to the [`TrackSelector`](crate::audio::selector::TrackSelector)
//! - `voice_state_update` detects voice channels left without human members
//!
//! Command parsing lives outside this crate; a dispatch layer calls the
//! registry directly.

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Reaction, ReactionType, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::{
    audio::{registry::SessionRegistry, selector::SelectionSignal},
    node::NodeEvent,
};

/// Handler principal de eventos de Discord
pub struct JukeboxHandler {
    registry: Arc<SessionRegistry>,
    events: UnboundedSender<NodeEvent>,
}

impl JukeboxHandler {
    pub fn new(registry: Arc<SessionRegistry>, events: UnboundedSender<NodeEvent>) -> Self {
        Self { registry, events }
    }

    /// Cuenta los miembros humanos que siguen en `channel` según la caché
    fn humans_in_channel(ctx: &Context, guild_id: GuildId, channel: ChannelId) -> Option<usize> {
        let guild = ctx.cache.guild(guild_id)?;
        let states = guild.voice_states.values().map(|state| {
            let is_bot = state
                .member
                .as_ref()
                .map(|member| member.user.bot)
                .or_else(|| guild.members.get(&state.user_id).map(|member| member.user.bot))
                .unwrap_or(false);
            (state.channel_id, is_bot)
        });
        Some(count_humans(channel, states))
    }
}

#[async_trait]
impl EventHandler for JukeboxHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if self
            .events
            .send(NodeEvent::NodeReady {
                identifier: "songbird".to_string(),
            })
            .is_err()
        {
            warn!("⚠️ El bucle de eventos ya no está activo");
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let Some(user_id) = reaction.user_id else {
            return;
        };
        if user_id == ctx.cache.current_user().id {
            return;
        }

        if let ReactionType::Unicode(marker) = reaction.emoji {
            let delivered = self.registry.selector().deliver(SelectionSignal {
                message_id: reaction.message_id,
                user_id,
                marker,
            });
            if delivered {
                debug!("Reacción entregada a la selección {}", reaction.message_id);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let current_user_id = ctx.cache.current_user().id;

        // El bot fue desconectado o movido desde fuera
        if new.user_id == current_user_id {
            match bot_transition(old.and_then(|state| state.channel_id), new.channel_id) {
                Some(BotTransition::Left) => {
                    info!("🔌 Bot desconectado en guild {}", guild_id);
                    if let Err(e) = self.registry.disconnect(guild_id).await {
                        warn!("⚠️ Error al limpiar la sesión: {}", e);
                    }
                }
                Some(BotTransition::Moved(channel)) => {
                    self.registry.on_bot_moved(guild_id, channel).await;
                }
                None => {}
            }
            return;
        }

        if new.member.as_ref().is_some_and(|member| member.user.bot) {
            return;
        }

        let Some(vacated) = vacated_channel(old.and_then(|state| state.channel_id), new.channel_id) else {
            return;
        };

        // La caché no puede cruzar un await
        let humans = Self::humans_in_channel(&ctx, guild_id, vacated);
        match humans {
            Some(0) => self.registry.on_voice_presence_changed(guild_id, vacated).await,
            Some(count) => debug!("Quedan {} miembros en el canal {}", count, vacated),
            None => debug!("Guild {} fuera de caché", guild_id),
        }
    }
}

/// Cambio de canal del propio bot
#[derive(Debug, PartialEq, Eq)]
enum BotTransition {
    Left,
    Moved(ChannelId),
}

fn bot_transition(old: Option<ChannelId>, new: Option<ChannelId>) -> Option<BotTransition> {
    match (old, new) {
        (Some(_), None) => Some(BotTransition::Left),
        (Some(old), Some(new)) if old != new => Some(BotTransition::Moved(new)),
        _ => None,
    }
}

/// Canal que un usuario dejó, si salió o se movió a otro
fn vacated_channel(old: Option<ChannelId>, new: Option<ChannelId>) -> Option<ChannelId> {
    old.filter(|channel| Some(*channel) != new)
}

fn count_humans<I>(channel: ChannelId, states: I) -> usize
where
    I: IntoIterator<Item = (Option<ChannelId>, bool)>,
{
    states
        .into_iter()
        .filter(|(state_channel, is_bot)| *state_channel == Some(channel) && !is_bot)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ChannelId = ChannelId::new(1);
    const B: ChannelId = ChannelId::new(2);

    #[test]
    fn leaving_or_moving_vacates_the_old_channel() {
        assert_eq!(vacated_channel(Some(A), None), Some(A));
        assert_eq!(vacated_channel(Some(A), Some(B)), Some(A));
        assert_eq!(vacated_channel(Some(A), Some(A)), None);
        assert_eq!(vacated_channel(None, Some(A)), None);
    }

    #[test]
    fn bot_moves_and_departures_are_told_apart() {
        assert_eq!(bot_transition(Some(A), None), Some(BotTransition::Left));
        assert_eq!(bot_transition(Some(A), Some(B)), Some(BotTransition::Moved(B)));
        assert_eq!(bot_transition(Some(A), Some(A)), None);
        assert_eq!(bot_transition(None, Some(A)), None);
    }

    #[test]
    fn bots_do_not_count_as_listeners() {
        let states = vec![(Some(A), true), (Some(B), false), (None, false)];
        assert_eq!(count_humans(A, states.clone()), 0);
        assert_eq!(count_humans(B, states), 1);
    }
}
