//! # Audio Node
//!
//! Capability interface between the playback core and whatever actually
//! streams audio into a voice channel.
//!
//! The core never decodes audio. A [`PlaybackController`](crate::audio::player::PlaybackController)
//! holds an `Arc<dyn AudioNode>` and issues directives (connect, play, stop,
//! pause, seek, volume, equalizer) against it. The node reports back
//! asynchronously through [`NodeEvent`]s pushed into an unbounded channel
//! that the [`SessionRegistry`](crate::audio::registry::SessionRegistry) drains.
//!
//! ## Event contract
//!
//! A node emits exactly one lifecycle event per track termination:
//!
//! - [`NodeEvent::TrackEnd`] with a [`TrackEndReason`]
//! - [`NodeEvent::TrackStuck`] when the stream stalls
//! - [`NodeEvent::TrackException`] when decoding or loading fails
//!
//! Ends caused by the core's own directives (`stop`, or `play` replacing the
//! current track) must be reported as [`TrackEndReason::Stopped`] or
//! [`TrackEndReason::Replaced`] so they are not mistaken for a finished track.

pub mod voice;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, time::Duration};

use crate::error::NodeError;

pub use self::voice::SongbirdNode;

/// Track tal como lo entrega el nodo de audio
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub length: Duration,
    pub url: String,
    pub thumbnail: Option<String>,
}

impl Track {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            author: String::new(),
            length: Duration::ZERO,
            url: url.into(),
            thumbnail: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = length;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Duración en formato `m:ss`
    pub fn length_display(&self) -> String {
        let secs = self.length.as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.length_display())
    }
}

/// Resultado de una búsqueda en el nodo
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    /// Resultados sueltos; si hay varios el usuario elige uno
    Tracks(Vec<Track>),
    /// Playlist completa; se encola entera
    Playlist { name: String, tracks: Vec<Track> },
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        match self {
            SearchResult::Tracks(tracks) => tracks.is_empty(),
            SearchResult::Playlist { tracks, .. } => tracks.is_empty(),
        }
    }
}

/// Motivo por el que terminó un track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Solo un final natural (o un fallo de carga) hace avanzar la cola
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Eventos asíncronos del ciclo de vida de la reproducción
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    TrackEnd {
        guild_id: GuildId,
        reason: TrackEndReason,
    },
    TrackStuck {
        guild_id: GuildId,
        threshold: Duration,
    },
    TrackException {
        guild_id: GuildId,
        message: String,
    },
    NodeReady {
        identifier: String,
    },
}

impl NodeEvent {
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            NodeEvent::TrackEnd { guild_id, .. }
            | NodeEvent::TrackStuck { guild_id, .. }
            | NodeEvent::TrackException { guild_id, .. } => Some(*guild_id),
            NodeEvent::NodeReady { .. } => None,
        }
    }
}

/// Directivas que el núcleo envía al nodo de audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeError>;

    /// Devuelve `NodeError::NotConnected` si la guild no tenía conexión
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), NodeError>;

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError>;

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), NodeError>;

    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), NodeError>;

    /// Volumen en porcentaje (100 = sin cambio)
    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), NodeError>;

    /// Ganancias normalizadas de las 15 bandas
    async fn set_equalizer(&self, guild_id: GuildId, levels: &[f32]) -> Result<(), NodeError>;

    async fn search_tracks(&self, query: &str) -> Result<SearchResult, NodeError>;
}
