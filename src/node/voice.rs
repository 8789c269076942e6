use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError,
    input::{AuxMetadata, Compose, Input, YoutubeDl},
    tracks::{ControlError, PlayError, PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{AudioNode, NodeEvent, SearchResult, Track, TrackEndReason};
use crate::error::NodeError;

/// Estado compartido con los handlers de eventos de songbird
struct NodeShared {
    songbird: Arc<Songbird>,
    current: DashMap<GuildId, TrackHandle>,
    events: UnboundedSender<NodeEvent>,
}

impl NodeShared {
    fn emit(&self, event: NodeEvent) {
        if self.events.send(event).is_err() {
            debug!("Canal de eventos cerrado, evento descartado");
        }
    }

    /// Distingue un `stop` nuestro, un reemplazo por `play` y el cierre de la llamada
    fn stop_reason(&self, guild_id: GuildId, handle: &TrackHandle) -> TrackEndReason {
        match self.current.get(&guild_id) {
            Some(current) if current.uuid() != handle.uuid() => TrackEndReason::Replaced,
            Some(_) => TrackEndReason::Stopped,
            None if self.songbird.get(guild_id).is_none() => TrackEndReason::Cleanup,
            None => TrackEndReason::Stopped,
        }
    }
}

/// Nodo de audio sobre songbird: llamadas de voz y streams de yt-dlp
pub struct SongbirdNode {
    shared: Arc<NodeShared>,
    http: reqwest::Client,
    volumes: DashMap<GuildId, u16>,
    equalizers: RwLock<HashMap<GuildId, Vec<f32>>>,
    search_limit: usize,
}

impl SongbirdNode {
    pub fn new(
        songbird: Arc<Songbird>,
        http: reqwest::Client,
        events: UnboundedSender<NodeEvent>,
        search_limit: usize,
    ) -> Self {
        Self {
            shared: Arc::new(NodeShared {
                songbird,
                current: DashMap::new(),
                events,
            }),
            http,
            volumes: DashMap::new(),
            equalizers: RwLock::new(HashMap::new()),
            search_limit,
        }
    }

    /// Último vector de ecualización recibido para la guild
    pub fn equalizer(&self, guild_id: GuildId) -> Option<Vec<f32>> {
        self.equalizers.read().get(&guild_id).cloned()
    }

    fn call(&self, guild_id: GuildId) -> Result<Arc<Mutex<Call>>, NodeError> {
        self.shared
            .songbird
            .get(guild_id)
            .ok_or(NodeError::NotConnected)
    }

    fn register_events(&self, guild_id: GuildId, handle: &TrackHandle) -> Result<(), NodeError> {
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    guild_id,
                    shared: self.shared.clone(),
                },
            )
            .map_err(control_error)?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    guild_id,
                    shared: self.shared.clone(),
                },
            )
            .map_err(control_error)
    }

    async fn load_url(&self, url: &str) -> Result<SearchResult, NodeError> {
        let mut source = YoutubeDl::new(self.http.clone(), url.to_string());
        let metadata = source
            .aux_metadata()
            .await
            .map_err(|e| NodeError::Search(e.to_string()))?;

        Ok(SearchResult::Tracks(vec![track_from_metadata(metadata, url)]))
    }

    async fn load_playlist(&self, url: &str) -> Result<SearchResult, NodeError> {
        info!("📋 Obteniendo playlist: {}", url);

        let output = tokio::process::Command::new("yt-dlp")
            .args(["--flat-playlist", "--dump-json", "--no-warnings", url])
            .output()
            .await
            .map_err(|e| NodeError::Search(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NodeError::Search(stderr.trim().to_string()));
        }

        Ok(parse_flat_playlist(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn search_text(&self, query: &str) -> Result<SearchResult, NodeError> {
        let mut source = YoutubeDl::new_search(self.http.clone(), query.to_string());
        let results = source
            .search(Some(self.search_limit))
            .await
            .map_err(|e| NodeError::Search(e.to_string()))?;

        let tracks: Vec<Track> = results
            .filter_map(|metadata| {
                let url = metadata.source_url.clone()?;
                Some(track_from_metadata(metadata, &url))
            })
            .collect();

        debug!("🔍 {} resultados para '{}'", tracks.len(), query);
        Ok(SearchResult::Tracks(tracks))
    }
}

#[async_trait]
impl AudioNode for SongbirdNode {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeError> {
        info!("🔗 Conectando al canal {} en guild {}", channel_id, guild_id);

        self.shared
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| NodeError::Join(e.to_string()))?;

        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.shared.current.remove(&guild_id);
        self.volumes.remove(&guild_id);
        self.equalizers.write().remove(&guild_id);

        self.shared
            .songbird
            .remove(guild_id)
            .await
            .map_err(|e| match e {
                JoinError::NoCall => NodeError::NotConnected,
                other => NodeError::Playback(other.to_string()),
            })
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeError> {
        let call = self.call(guild_id)?;
        let input: Input = YoutubeDl::new(self.http.clone(), track.url.clone()).into();

        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        let volume = self.volumes.get(&guild_id).map(|v| *v).unwrap_or(100);
        let _ = handle.set_volume(f32::from(volume) / 100.0);
        self.register_events(guild_id, &handle)?;

        // El anterior se detiene después de registrar el nuevo para que su fin cuente como reemplazo
        if let Some(previous) = self.shared.current.insert(guild_id, handle) {
            let _ = previous.stop();
        }

        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), NodeError> {
        if let Some((_, handle)) = self.shared.current.remove(&guild_id) {
            let _ = handle.stop();
        }
        Ok(())
    }

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), NodeError> {
        if let Some(handle) = self.shared.current.get(&guild_id) {
            let result = if paused { handle.pause() } else { handle.play() };
            result.map_err(control_error)?;
        }
        Ok(())
    }

    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), NodeError> {
        let handle = self
            .shared
            .current
            .get(&guild_id)
            .map(|handle| handle.clone())
            .ok_or_else(|| NodeError::Playback("no hay track en reproducción".to_string()))?;

        let reached = handle.seek_async(position).await.map_err(control_error)?;
        debug!("⏩ Track de guild {} en {:?}", guild_id, reached);
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), NodeError> {
        self.volumes.insert(guild_id, volume);
        if let Some(handle) = self.shared.current.get(&guild_id) {
            handle
                .set_volume(f32::from(volume) / 100.0)
                .map_err(control_error)?;
        }
        Ok(())
    }

    async fn set_equalizer(&self, guild_id: GuildId, levels: &[f32]) -> Result<(), NodeError> {
        // songbird no procesa bandas: se guardan para cuando haya un filtro
        debug!("🎛️ Ecualizador de guild {}: {:?}", guild_id, levels);
        self.equalizers.write().insert(guild_id, levels.to_vec());
        Ok(())
    }

    async fn search_tracks(&self, query: &str) -> Result<SearchResult, NodeError> {
        match Url::parse(query) {
            Ok(url) if is_playlist_url(&url) => self.load_playlist(query).await,
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.load_url(query).await,
            _ => self.search_text(query).await,
        }
    }
}

/// Reporta el fin de un track al registro
struct TrackEndNotifier {
    guild_id: GuildId,
    shared: Arc<NodeShared>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, handle) in *track_list {
                let reason = match &state.playing {
                    PlayMode::End => TrackEndReason::Finished,
                    PlayMode::Stop => self.shared.stop_reason(self.guild_id, handle),
                    // Los errores los reporta TrackErrorNotifier
                    _ => continue,
                };

                if reason == TrackEndReason::Finished {
                    self.shared.current.remove_if(&self.guild_id, |_, current| {
                        current.uuid() == handle.uuid()
                    });
                }

                debug!("🎵 Track terminó en guild {} ({:?})", self.guild_id, reason);
                self.shared.emit(NodeEvent::TrackEnd {
                    guild_id: self.guild_id,
                    reason,
                });
            }
        }

        None
    }
}

/// Reporta errores de carga como fin del track y el resto como excepción
struct TrackErrorNotifier {
    guild_id: GuildId,
    shared: Arc<NodeShared>,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, handle) in *track_list {
                let PlayMode::Errored(play_error) = &state.playing else {
                    continue;
                };
                error!("❌ Error en track para guild {}: {}", self.guild_id, play_error);

                self.shared.current.remove_if(&self.guild_id, |_, current| {
                    current.uuid() == handle.uuid()
                });
                self.shared.emit(error_event(self.guild_id, play_error));
            }
        }

        None
    }
}

fn error_event(guild_id: GuildId, error: &PlayError) -> NodeEvent {
    match error {
        PlayError::Create(_) | PlayError::Parse(_) => NodeEvent::TrackEnd {
            guild_id,
            reason: TrackEndReason::LoadFailed,
        },
        other => NodeEvent::TrackException {
            guild_id,
            message: other.to_string(),
        },
    }
}

fn control_error(error: ControlError) -> NodeError {
    NodeError::Playback(error.to_string())
}

fn is_playlist_url(url: &Url) -> bool {
    url.path().starts_with("/playlist") || url.query_pairs().any(|(key, _)| key == "list")
}

fn track_from_metadata(metadata: AuxMetadata, url: &str) -> Track {
    let mut track = Track::new(
        url,
        metadata.title.unwrap_or_else(|| "Desconocido".to_string()),
        url,
    )
    .with_author(metadata.artist.or(metadata.channel).unwrap_or_default())
    .with_length(metadata.duration.unwrap_or_default());

    if let Some(thumbnail) = metadata.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    track
}

/// Entrada de `yt-dlp --flat-playlist --dump-json`
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    playlist_title: Option<String>,
}

impl FlatEntry {
    fn into_track(self) -> Option<Track> {
        let url = self.webpage_url.or(self.url)?;
        let length = self
            .duration
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default();

        Some(
            Track::new(self.id, self.title.unwrap_or_else(|| "Desconocido".to_string()), url)
                .with_author(self.uploader.or(self.channel).unwrap_or_default())
                .with_length(length),
        )
    }
}

fn parse_flat_playlist(stdout: &str) -> SearchResult {
    let entries: Vec<FlatEntry> = stdout
        .lines()
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("⚠️ Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .collect();

    let name = entries
        .iter()
        .find_map(|entry| entry.playlist_title.clone())
        .unwrap_or_else(|| "Playlist".to_string());
    let tracks = entries.into_iter().filter_map(FlatEntry::into_track).collect();

    SearchResult::Playlist { name, tracks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn playlist_urls_are_detected() {
        let playlist = Url::parse("https://www.youtube.com/playlist?list=PL123").unwrap();
        let watch_in_list = Url::parse("https://www.youtube.com/watch?v=abc&list=PL123").unwrap();
        let single = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();

        assert!(is_playlist_url(&playlist));
        assert!(is_playlist_url(&watch_in_list));
        assert!(!is_playlist_url(&single));
    }

    #[test]
    fn stream_failures_end_the_track_as_load_failed() {
        let guild_id = GuildId::new(1);

        let unopened = PlayError::Create(Arc::new(songbird::input::AudioStreamError::Unsupported));
        assert_eq!(
            error_event(guild_id, &unopened),
            NodeEvent::TrackEnd {
                guild_id,
                reason: TrackEndReason::LoadFailed,
            }
        );

        let corrupt = PlayError::Decode(Arc::new(symphonia::core::errors::Error::DecodeError("trama corrupta")));
        assert!(matches!(
            error_event(guild_id, &corrupt),
            NodeEvent::TrackException { .. }
        ));
    }

    #[test]
    fn failed_track_controls_surface_as_playback_errors() {
        assert!(matches!(
            control_error(ControlError::Finished),
            NodeError::Playback(message) if message.contains("track ended")
        ));
    }

    #[test]
    fn metadata_maps_to_track() {
        let metadata = AuxMetadata {
            title: Some("Never Gonna Give You Up".into()),
            channel: Some("Rick Astley".into()),
            duration: Some(Duration::from_secs(213)),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg".into()),
            ..Default::default()
        };

        let track = track_from_metadata(metadata, "https://youtu.be/dQw4w9WgXcQ");

        assert_eq!(track.title, "Never Gonna Give You Up");
        assert_eq!(track.author, "Rick Astley");
        assert_eq!(track.length_display(), "3:33");
        assert_eq!(track.url, "https://youtu.be/dQw4w9WgXcQ");
        assert!(track.thumbnail.is_some());
    }

    #[test]
    fn flat_playlist_lines_become_a_playlist() {
        let stdout = concat!(
            r#"{"id":"a1","title":"Uno","url":"https://www.youtube.com/watch?v=a1","duration":61.0,"uploader":"X","playlist_title":"Mix"}"#,
            "\n",
            "basura\n",
            r#"{"id":"b2","title":"Dos","url":"https://www.youtube.com/watch?v=b2","duration":null,"playlist_title":"Mix"}"#,
            "\n",
            r#"{"id":"c3","title":"Sin url"}"#,
        );

        match parse_flat_playlist(stdout) {
            SearchResult::Playlist { name, tracks } => {
                assert_eq!(name, "Mix");
                let ids: Vec<&str> = tracks.iter().map(|t| t.identifier.as_str()).collect();
                assert_eq!(ids, vec!["a1", "b2"]);
                assert_eq!(tracks[0].length_display(), "1:01");
                assert_eq!(tracks[1].length, Duration::ZERO);
            }
            other => panic!("se esperaba una playlist: {other:?}"),
        }
    }
}
