use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        player::PlaybackController,
        selector::{Requester, TrackSelector},
    },
    error::Result,
    lyrics::{LyricsProvider, SongLyrics},
    node::{AudioNode, NodeEvent, SearchResult},
};

pub type SharedController = Arc<Mutex<PlaybackController>>;

/// Sesiones de reproducción por guild.
///
/// Cada controlador vive detrás de su propio mutex: operaciones sobre la
/// misma guild se serializan y guilds distintas avanzan en paralelo. El
/// único bloqueo compartido es el de inserción en el `DashMap`.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SharedController>,
    node: Arc<dyn AudioNode>,
    selector: Arc<TrackSelector>,
    lyrics: Arc<dyn LyricsProvider>,
}

impl SessionRegistry {
    pub fn new(
        node: Arc<dyn AudioNode>,
        selector: Arc<TrackSelector>,
        lyrics: Arc<dyn LyricsProvider>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            node,
            selector,
            lyrics,
        }
    }

    /// Devuelve la sesión de la guild, creándola desconectada si no existe
    pub fn get(&self, guild_id: GuildId) -> SharedController {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Nueva sesión para guild {}", guild_id);
                Arc::new(Mutex::new(PlaybackController::new(guild_id, self.node.clone())))
            })
            .clone()
    }

    /// Sesión existente, sin crearla
    pub fn session(&self, guild_id: GuildId) -> Option<SharedController> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn selector(&self) -> &Arc<TrackSelector> {
        &self.selector
    }

    pub async fn connect(
        &self,
        guild_id: GuildId,
        requester: &Requester,
        explicit: Option<ChannelId>,
    ) -> Result<ChannelId> {
        let session = self.get(guild_id);
        let mut player = session.lock().await;
        player.connect(requester.voice_channel, explicit).await
    }

    /// Busca `query`, conectando primero si hace falta, y encola el resultado
    pub async fn play(&self, guild_id: GuildId, requester: &Requester, query: &str) -> Result<usize> {
        let generation = {
            let session = self.get(guild_id);
            let mut player = session.lock().await;
            if !player.is_connected() {
                player.connect(requester.voice_channel, None).await?;
            }
            player.generation()
        };

        let query = query.trim().trim_start_matches('<').trim_end_matches('>');
        let result = self.node.search_tracks(query).await?;
        self.enqueue(guild_id, requester, result, generation).await
    }

    /// Resuelve la búsqueda (con selección si hay varios candidatos) y encola.
    ///
    /// La espera de la selección ocurre fuera del mutex de la guild. Una
    /// selección sin respuesta, o que termina después de cerrarse la sesión,
    /// devuelve `Ok(0)`.
    pub async fn add_tracks(
        &self,
        guild_id: GuildId,
        requester: &Requester,
        result: SearchResult,
    ) -> Result<usize> {
        let generation = self.get(guild_id).lock().await.generation();
        self.enqueue(guild_id, requester, result, generation).await
    }

    /// Vincula la sesión al canal al que movieron al bot
    pub async fn on_bot_moved(&self, guild_id: GuildId, channel: ChannelId) {
        if let Some(session) = self.session(guild_id) {
            session.lock().await.moved_to(channel);
        }
    }

    pub async fn disconnect(&self, guild_id: GuildId) -> Result<()> {
        match self.session(guild_id) {
            Some(session) => session.lock().await.teardown().await,
            None => Ok(()),
        }
    }

    /// El canal `vacated` se quedó sin miembros humanos
    pub async fn on_voice_presence_changed(&self, guild_id: GuildId, vacated: ChannelId) {
        let Some(session) = self.session(guild_id) else {
            return;
        };

        let mut player = session.lock().await;
        if !player.is_connected() {
            return;
        }
        if player.channel().is_some_and(|channel| channel != vacated) {
            debug!("Canal {} vacío pero la sesión está en otro canal", vacated);
            return;
        }

        info!("👋 Canal de voz vacío, desconectando de guild {}", guild_id);
        if let Err(e) = player.teardown().await {
            warn!("⚠️ Error al desconectar guild {}: {}", guild_id, e);
        }
    }

    async fn enqueue(
        &self,
        guild_id: GuildId,
        requester: &Requester,
        result: SearchResult,
        generation: u64,
    ) -> Result<usize> {
        let tracks = self.selector.resolve(requester, result).await?;
        if tracks.is_empty() {
            debug!("Selección cancelada en guild {}", guild_id);
            return Ok(0);
        }

        let session = self.get(guild_id);
        let mut player = session.lock().await;
        if player.generation() != generation {
            info!("🗑️ Sesión de guild {} cerrada durante la búsqueda, se descartan {} tracks", guild_id, tracks.len());
            return Ok(0);
        }
        player.add_tracks(tracks).await
    }

    pub async fn handle_event(&self, event: NodeEvent) {
        let Some(guild_id) = event.guild_id() else {
            if let NodeEvent::NodeReady { identifier } = &event {
                info!("✅ Nodo de audio '{}' listo", identifier);
            }
            return;
        };

        let Some(session) = self.session(guild_id) else {
            debug!("Evento para guild {} sin sesión: {:?}", guild_id, event);
            return;
        };

        let mut player = session.lock().await;
        if let Err(e) = player.on_track_event(&event).await {
            warn!("⚠️ Error al manejar evento en guild {}: {}", guild_id, e);
        }
    }

    /// Consume los eventos del nodo.
    ///
    /// Cada guild tiene su propia tarea, que atiende sus eventos en orden de
    /// llegada; guilds distintas no se esperan entre sí. Al cerrarse el canal
    /// se drenan las tareas antes de terminar.
    pub fn spawn_event_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NodeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut workers: HashMap<GuildId, mpsc::UnboundedSender<NodeEvent>> = HashMap::new();
            let mut handles = Vec::new();

            while let Some(event) = events.recv().await {
                let Some(guild_id) = event.guild_id() else {
                    self.handle_event(event).await;
                    continue;
                };

                let worker = workers.entry(guild_id).or_insert_with(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    handles.push(tokio::spawn(self.clone().guild_worker(rx)));
                    tx
                });
                if worker.send(event).is_err() {
                    warn!("⚠️ La tarea de eventos de guild {} terminó", guild_id);
                    workers.remove(&guild_id);
                }
            }

            drop(workers);
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("⚠️ Tarea de eventos abortada: {}", e);
                }
            }
            debug!("Canal de eventos del nodo cerrado");
        })
    }

    async fn guild_worker(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NodeEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
    }

    /// Letra de `name` o, si no se indica, del track actual
    pub async fn lyrics(&self, guild_id: GuildId, name: Option<&str>) -> Result<SongLyrics> {
        let query = {
            let session = self.get(guild_id);
            let player = session.lock().await;
            player.lyrics_query(name)?
        };

        self.lyrics.fetch_lyrics(&query).await
    }

    /// Cierra todas las sesiones
    pub async fn shutdown(&self) {
        let sessions: Vec<SharedController> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for session in sessions {
            let mut player = session.lock().await;
            if player.is_connected() {
                if let Err(e) = player.teardown().await {
                    warn!("⚠️ Error al cerrar sesión de guild {}: {}", player.guild_id(), e);
                }
            }
        }

        self.sessions.clear();
        info!("🛑 Sesiones cerradas");
    }
}
