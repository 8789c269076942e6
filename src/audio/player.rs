use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        equalizer::{EqPreset, Equalizer},
        queue::{Queue, RepeatMode},
        timestamp::parse_timestamp,
    },
    error::{NodeError, PlayerError, Result},
    node::{AudioNode, NodeEvent, Track},
};

pub const DEFAULT_VOLUME: u16 = 100;
pub const MAX_VOLUME: u16 = 150;
pub const VOLUME_STEP: u16 = 10;

/// Estado de la sesión de voz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn is_connected(self) -> bool {
        self != PlayerState::Disconnected
    }
}

/// Track actual para la vista "now playing"
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub paused: bool,
}

/// Resultado de un salto dentro de la cola
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    /// Posición (base 1) que queda como actual
    pub index: usize,
    /// `None` si el salto dejó la cola agotada
    pub track: Option<Track>,
}

/// Controlador de reproducción de una guild.
///
/// Es dueño de la cola, del volumen y del ecualizador de la sesión, y envía
/// las directivas al nodo de audio. No tiene sincronización propia: el
/// [`SessionRegistry`](crate::audio::registry::SessionRegistry) lo guarda
/// detrás de un mutex por guild.
pub struct PlaybackController {
    guild_id: GuildId,
    node: Arc<dyn AudioNode>,
    queue: Queue,
    state: PlayerState,
    channel: Option<ChannelId>,
    volume: u16,
    equalizer: Equalizer,
    /// Aumenta en cada teardown; separa una sesión de la siguiente
    generation: u64,
}

impl PlaybackController {
    pub fn new(guild_id: GuildId, node: Arc<dyn AudioNode>) -> Self {
        Self {
            guild_id,
            node,
            queue: Queue::new(),
            state: PlayerState::Disconnected,
            channel: None,
            volume: DEFAULT_VOLUME,
            equalizer: Equalizer::new(),
            generation: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    /// Vista de solo lectura de la cola
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Conecta al canal del solicitante o, si no está en voz, al canal indicado
    pub async fn connect(
        &mut self,
        requester_channel: Option<ChannelId>,
        explicit: Option<ChannelId>,
    ) -> Result<ChannelId> {
        if self.is_connected() {
            return Err(PlayerError::AlreadyConnected);
        }

        let channel = requester_channel
            .or(explicit)
            .ok_or(PlayerError::NoVoiceChannel)?;

        self.node.connect(self.guild_id, channel).await?;
        self.channel = Some(channel);
        self.state = PlayerState::Idle;

        info!("🔊 Conectado al canal {} en guild {}", channel, self.guild_id);
        Ok(channel)
    }

    /// El bot fue movido a otro canal de voz sin pasar por `connect`
    pub fn moved_to(&mut self, channel: ChannelId) {
        if !self.is_connected() || self.channel == Some(channel) {
            return;
        }
        info!("🔀 Sesión de guild {} movida al canal {}", self.guild_id, channel);
        self.channel = Some(channel);
    }

    /// Libera la conexión y descarta la cola. Repetirlo no es un error.
    pub async fn teardown(&mut self) -> Result<()> {
        let result = match self.node.disconnect(self.guild_id).await {
            Ok(()) | Err(NodeError::NotConnected) => Ok(()),
            Err(e) => Err(e.into()),
        };

        self.queue.empty();
        self.queue.set_repeat_mode(RepeatMode::None);
        self.volume = DEFAULT_VOLUME;
        self.equalizer.reset();
        self.channel = None;
        self.state = PlayerState::Disconnected;
        self.generation += 1;

        info!("👋 Sesión cerrada en guild {}", self.guild_id);
        result
    }

    /// Encola tracks ya resueltos y arranca la reproducción si estaba inactiva
    pub async fn add_tracks(&mut self, tracks: Vec<Track>) -> Result<usize> {
        if tracks.is_empty() {
            return Err(PlayerError::NoTracksFound);
        }

        let added = tracks.len();
        if let [track] = tracks.as_slice() {
            info!("➕ Agregado a la cola: {}", track.title);
        } else {
            info!("➕ Agregadas {} canciones a la cola", added);
        }
        self.queue.add(tracks);

        if self.state == PlayerState::Idle {
            self.start_playback().await?;
        }

        Ok(added)
    }

    /// Reacciona a un evento del nodo de audio
    pub async fn on_track_event(&mut self, event: &NodeEvent) -> Result<()> {
        match event {
            NodeEvent::TrackEnd { reason, .. } if !reason.may_start_next() => {
                debug!("Track terminado por {:?} en guild {}, sin avanzar", reason, self.guild_id);
                Ok(())
            }
            NodeEvent::TrackEnd { .. } => self.advance_on_track_end().await,
            NodeEvent::TrackStuck { threshold, .. } => {
                warn!("⏳ Track atascado ({:?}) en guild {}", threshold, self.guild_id);
                self.advance_on_track_end().await
            }
            NodeEvent::TrackException { message, .. } => {
                error!("❌ Error en track para guild {}: {}", self.guild_id, message);
                self.advance_on_track_end().await
            }
            NodeEvent::NodeReady { .. } => Ok(()),
        }
    }

    /// Decide qué suena tras terminar el track actual
    pub async fn advance_on_track_end(&mut self) -> Result<()> {
        if !self.is_connected() {
            debug!("Evento de fin ignorado: guild {} desconectada", self.guild_id);
            return Ok(());
        }

        if self.queue.repeat_mode() == RepeatMode::One {
            let current = match self.queue.current_track() {
                Ok(track) => track.cloned(),
                Err(_) => None,
            };
            if let Some(track) = current {
                info!("🔂 Repitiendo track: {}", track.title);
                return self.play_track(&track).await;
            }
        }

        let next = if self.queue.is_empty() {
            None
        } else {
            self.queue.advance()?.cloned()
        };

        match next {
            Some(track) => self.play_track(&track).await,
            None => {
                info!("📭 Cola terminada en guild {}", self.guild_id);
                self.state = PlayerState::Idle;
                Ok(())
            }
        }
    }

    /// Detiene la reproducción y vacía la cola
    pub async fn stop_and_clear(&mut self) -> Result<()> {
        self.queue.empty();

        if self.is_connected() {
            self.node.stop(self.guild_id).await?;
            self.state = PlayerState::Idle;
        }

        info!("⏹️ Reproducción detenida");
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.state == PlayerState::Paused {
            return Err(PlayerError::PlayerAlreadyPaused);
        }

        self.node.set_pause(self.guild_id, true).await?;
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
        }

        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    /// Reanuda lo pausado o, si está inactivo, arranca el track actual
    pub async fn resume(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }

        match self.state {
            PlayerState::Idle => self.start_playback().await?,
            _ => {
                self.node.set_pause(self.guild_id, false).await?;
                if self.state == PlayerState::Paused {
                    self.state = PlayerState::Playing;
                }
            }
        }

        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    /// Salta al siguiente track
    pub async fn skip(&mut self) -> Result<Navigation> {
        if self.queue.upcoming()?.is_empty() {
            return Err(PlayerError::NoMoreTracks);
        }
        self.play_at(self.queue.position() + 1).await
    }

    /// Vuelve al track anterior
    pub async fn previous(&mut self) -> Result<Navigation> {
        if self.queue.history()?.is_empty() {
            return Err(PlayerError::NoPreviousTracks);
        }
        self.play_at(self.queue.position() - 1).await
    }

    /// Salta a la posición `index` (base 1)
    pub async fn skip_to(&mut self, index: i64) -> Result<Navigation> {
        let len = self.non_empty_len()?;
        if index < 1 || index > len as i64 {
            return Err(PlayerError::NoMoreTracks);
        }
        self.play_at(index as usize - 1).await
    }

    /// Avanza `count` posiciones desde el track actual
    pub async fn forward(&mut self, count: i64) -> Result<Navigation> {
        let len = self.non_empty_len()?;
        if !(0..=len as i64).contains(&count) {
            return Err(PlayerError::NoMoreTracks);
        }
        self.play_at(self.queue.position() + count as usize).await
    }

    /// Retrocede `count` posiciones desde el track actual
    pub async fn back(&mut self, count: i64) -> Result<Navigation> {
        let len = self.non_empty_len()?;
        if !(0..=len as i64).contains(&count) {
            return Err(PlayerError::NoMoreTracks);
        }

        let position = self.queue.position();
        let target = position
            .checked_sub(count as usize)
            .ok_or(PlayerError::NoPreviousTracks)?;
        self.play_at(target).await
    }

    pub async fn set_volume(&mut self, volume: i64) -> Result<u16> {
        if volume < 0 {
            return Err(PlayerError::VolumeTooLow);
        }
        if volume > MAX_VOLUME as i64 {
            return Err(PlayerError::VolumeTooHigh);
        }

        self.apply_volume(volume as u16).await
    }

    pub async fn volume_up(&mut self) -> Result<u16> {
        if self.volume >= MAX_VOLUME {
            return Err(PlayerError::MaxVolume);
        }
        self.apply_volume((self.volume + VOLUME_STEP).min(MAX_VOLUME)).await
    }

    pub async fn volume_down(&mut self) -> Result<u16> {
        if self.volume == 0 {
            return Err(PlayerError::MinVolume);
        }
        self.apply_volume(self.volume.saturating_sub(VOLUME_STEP)).await
    }

    pub async fn set_equalizer_preset(&mut self, name: &str) -> Result<EqPreset> {
        let preset: EqPreset = name.parse()?;

        let mut equalizer = self.equalizer.clone();
        equalizer.apply_preset(preset);
        self.apply_equalizer(equalizer).await?;

        Ok(preset)
    }

    /// Ajusta una banda (índice 1-15 o frecuencia en Hz). Devuelve el índice base 0.
    pub async fn set_equalizer_band(&mut self, band: i64, gain_db: f32) -> Result<usize> {
        let mut equalizer = self.equalizer.clone();
        let index = equalizer.set_band(band, gain_db)?;
        self.apply_equalizer(equalizer).await?;

        Ok(index)
    }

    pub fn set_repeat_mode(&mut self, mode: &str) -> Result<RepeatMode> {
        let mode: RepeatMode = mode.parse()?;
        self.queue.set_repeat_mode(mode);
        Ok(mode)
    }

    pub fn shuffle(&mut self) -> Result<()> {
        self.queue.shuffle()
    }

    /// Busca una posición dentro del track actual
    pub async fn seek(&mut self, input: &str) -> Result<Duration> {
        if self.queue.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }

        let position = parse_timestamp(input)?;
        self.node.seek(self.guild_id, position).await?;

        info!("⏩ Buscado a {:?} en guild {}", position, self.guild_id);
        Ok(position)
    }

    /// Reinicia el track actual
    pub async fn restart(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }

        self.node.seek(self.guild_id, Duration::ZERO).await?;
        Ok(())
    }

    pub fn now_playing(&self) -> Result<NowPlaying> {
        let paused = match self.state {
            PlayerState::Playing => false,
            PlayerState::Paused => true,
            _ => return Err(PlayerError::PlayerAlreadyPaused),
        };

        let track = self
            .queue
            .current_track()
            .ok()
            .flatten()
            .cloned()
            .ok_or(PlayerError::PlayerAlreadyPaused)?;

        Ok(NowPlaying { track, paused })
    }

    /// Título a buscar en el servicio de letras
    pub fn lyrics_query(&self, name: Option<&str>) -> Result<String> {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }

        self.queue
            .current_track()?
            .map(|track| track.title.clone())
            .ok_or(PlayerError::QueueEmpty)
    }

    // Funciones privadas

    async fn start_playback(&mut self) -> Result<()> {
        let current = self.queue.current_track()?.cloned();
        match current {
            Some(track) => self.play_track(&track).await,
            None => Ok(()),
        }
    }

    async fn play_track(&mut self, track: &Track) -> Result<()> {
        self.node.play(self.guild_id, track).await?;
        self.state = PlayerState::Playing;
        info!("🎵 Reproduciendo: {} en guild {}", track.title, self.guild_id);
        Ok(())
    }

    async fn play_at(&mut self, target: usize) -> Result<Navigation> {
        let track = self.queue.jump_to(target)?.cloned();
        let index = self.queue.position() + 1;

        if self.is_connected() {
            match &track {
                Some(track) => self.play_track(track).await?,
                None => {
                    self.node.stop(self.guild_id).await?;
                    self.state = PlayerState::Idle;
                }
            }
        }

        Ok(Navigation { index, track })
    }

    async fn apply_volume(&mut self, volume: u16) -> Result<u16> {
        self.node.set_volume(self.guild_id, volume).await?;
        self.volume = volume;
        info!("🔊 Volumen ajustado a {}%", volume);
        Ok(volume)
    }

    async fn apply_equalizer(&mut self, equalizer: Equalizer) -> Result<()> {
        self.node
            .set_equalizer(self.guild_id, equalizer.levels())
            .await?;
        self.equalizer = equalizer;
        Ok(())
    }

    fn non_empty_len(&self) -> Result<usize> {
        if self.queue.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }
        Ok(self.queue.len())
    }
}
