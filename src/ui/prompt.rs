use async_trait::async_trait;
use serenity::{
    all::{ChannelId, Http, MessageId, ReactionType},
    builder::CreateMessage,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::embeds::create_selection_embed;
use crate::audio::selector::{SelectionPrompt, SelectionRequest, OPTION_MARKERS};

/// Selección por reacciones sobre un mensaje de Discord
pub struct ReactionPrompt {
    http: Arc<Http>,
}

impl ReactionPrompt {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SelectionPrompt for ReactionPrompt {
    async fn present(&self, request: &SelectionRequest) -> anyhow::Result<MessageId> {
        let message = request
            .channel
            .send_message(
                &self.http,
                CreateMessage::new().embed(create_selection_embed(request)),
            )
            .await?;

        debug!("Selección publicada en mensaje {}", message.id);
        Ok(message.id)
    }

    async fn add_markers(&self, channel: ChannelId, message: MessageId, count: usize) -> anyhow::Result<()> {
        for marker in OPTION_MARKERS.iter().take(count) {
            channel
                .create_reaction(&self.http, message, ReactionType::Unicode(marker.to_string()))
                .await?;
        }
        Ok(())
    }

    async fn withdraw(&self, channel: ChannelId, message: MessageId) {
        if let Err(e) = channel.delete_message(&self.http, message).await {
            warn!("⚠️ No se pudo borrar el mensaje de selección: {:?}", e);
        }
    }
}
