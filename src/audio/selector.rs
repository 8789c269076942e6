use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, MessageId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::{PlayerError, Result},
    node::{SearchResult, Track},
};

/// Reacciones que identifican cada opción, en orden
pub const OPTION_MARKERS: [&str; 5] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
];

pub const MAX_CANDIDATES: usize = OPTION_MARKERS.len();

pub const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Quién pidió la operación y desde dónde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub text_channel: ChannelId,
    /// Canal de voz en el que está el usuario, si está en alguno
    pub voice_channel: Option<ChannelId>,
}

/// Lista de candidatos a mostrar
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub requester: UserId,
    pub channel: ChannelId,
    pub candidates: Vec<Track>,
}

/// Reacción recibida sobre algún mensaje
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSignal {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub marker: String,
}

/// Capa de presentación que muestra y retira el mensaje de selección
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SelectionPrompt: Send + Sync {
    /// Publica los candidatos y devuelve el mensaje sobre el que se espera la reacción
    async fn present(&self, request: &SelectionRequest) -> anyhow::Result<MessageId>;

    /// Añade los primeros `count` marcadores como reacciones del mensaje
    async fn add_markers(&self, channel: ChannelId, message: MessageId, count: usize) -> anyhow::Result<()>;

    async fn withdraw(&self, channel: ChannelId, message: MessageId);
}

/// Índice de la opción asociada a una reacción (ignora el selector de variación)
pub fn marker_index(marker: &str) -> Option<usize> {
    let normalized = marker.replace('\u{fe0f}', "");
    OPTION_MARKERS
        .iter()
        .position(|option| option.replace('\u{fe0f}', "") == normalized)
}

/// Elección de un track entre varios resultados de búsqueda.
///
/// Cada elección en curso registra un canal en `pending`, indexado por el
/// mensaje publicado. El feed de reacciones entrega las señales con
/// [`TrackSelector::deliver`]; solo cuentan las del solicitante original con
/// uno de los marcadores mostrados.
pub struct TrackSelector {
    prompt: Arc<dyn SelectionPrompt>,
    pending: DashMap<MessageId, mpsc::UnboundedSender<SelectionSignal>>,
    timeout: Duration,
}

impl TrackSelector {
    pub fn new(prompt: Arc<dyn SelectionPrompt>, timeout: Duration) -> Self {
        Self {
            prompt,
            pending: DashMap::new(),
            timeout,
        }
    }

    /// Elecciones esperando respuesta
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Entrega una reacción. Devuelve `false` si ninguna elección espera ese mensaje.
    pub fn deliver(&self, signal: SelectionSignal) -> bool {
        match self.pending.get(&signal.message_id) {
            Some(listener) => listener.send(signal).is_ok(),
            None => false,
        }
    }

    /// Convierte un resultado de búsqueda en los tracks a encolar.
    ///
    /// Una lista vacía significa que el usuario no eligió nada a tiempo.
    pub async fn resolve(&self, requester: &Requester, result: SearchResult) -> Result<Vec<Track>> {
        match result {
            SearchResult::Playlist { name, tracks } => {
                if tracks.is_empty() {
                    return Err(PlayerError::NoTracksFound);
                }
                info!("📋 Playlist '{}' con {} canciones", name, tracks.len());
                Ok(tracks)
            }
            SearchResult::Tracks(tracks) if tracks.len() <= 1 => {
                if tracks.is_empty() {
                    return Err(PlayerError::NoTracksFound);
                }
                Ok(tracks)
            }
            SearchResult::Tracks(tracks) => Ok(self.choose(requester, tracks).await.into_iter().collect()),
        }
    }

    /// Muestra hasta cinco candidatos y espera la elección del solicitante
    pub async fn choose(&self, requester: &Requester, mut candidates: Vec<Track>) -> Option<Track> {
        candidates.truncate(MAX_CANDIDATES);
        let request = SelectionRequest {
            requester: requester.user_id,
            channel: requester.text_channel,
            candidates,
        };

        let message_id = match self.prompt.present(&request).await {
            Ok(id) => id,
            Err(e) => {
                warn!("⚠️ No se pudo mostrar la selección: {:?}", e);
                return None;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.pending.insert(message_id, tx);
        let listener = PendingListener {
            pending: &self.pending,
            message_id,
        };

        let offered = request.candidates.len();
        if let Err(e) = self.prompt.add_markers(request.channel, message_id, offered).await {
            warn!("⚠️ No se pudieron añadir las reacciones: {:?}", e);
            drop(listener);
            self.prompt.withdraw(request.channel, message_id).await;
            return None;
        }

        let choice = tokio::time::timeout(self.timeout, async {
            while let Some(signal) = rx.recv().await {
                if signal.user_id != request.requester || signal.message_id != message_id {
                    continue;
                }
                if let Some(index) = marker_index(&signal.marker).filter(|&i| i < offered) {
                    return Some(index);
                }
            }
            None
        })
        .await;

        drop(listener);
        self.prompt.withdraw(request.channel, message_id).await;

        match choice {
            Ok(Some(index)) => {
                let track = request.candidates.into_iter().nth(index);
                if let Some(track) = &track {
                    debug!("Opción {} elegida: {}", index + 1, track.title);
                }
                track
            }
            Ok(None) => None,
            Err(_) => {
                info!("⌛ Selección expirada para usuario {}", requester.user_id);
                None
            }
        }
    }
}

/// Quita la elección de `pending` aunque el futuro se cancele
struct PendingListener<'a> {
    pending: &'a DashMap<MessageId, mpsc::UnboundedSender<SelectionSignal>>,
    message_id: MessageId,
}

impl Drop for PendingListener<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REQUESTER: UserId = UserId::new(7);
    const MESSAGE: MessageId = MessageId::new(99);

    fn requester() -> Requester {
        Requester {
            user_id: REQUESTER,
            text_channel: ChannelId::new(3),
            voice_channel: Some(ChannelId::new(10)),
        }
    }

    fn candidates(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("t{i}"), format!("Track {i}"), format!("https://example.com/{i}")))
            .collect()
    }

    fn signal(user: UserId, marker: &str) -> SelectionSignal {
        SelectionSignal {
            message_id: MESSAGE,
            user_id: user,
            marker: marker.to_string(),
        }
    }

    fn prompt_expecting(presented: usize) -> MockSelectionPrompt {
        let mut prompt = MockSelectionPrompt::new();
        prompt
            .expect_present()
            .withf(move |request| request.candidates.len() == presented)
            .times(1)
            .returning(|_| Ok(MESSAGE));
        prompt
            .expect_add_markers()
            .withf(move |_, message, count| *message == MESSAGE && *count == presented)
            .times(1)
            .returning(|_, _, _| Ok(()));
        prompt.expect_withdraw().times(1).returning(|_, _| ());
        prompt
    }

    #[test]
    fn markers_match_with_or_without_variation_selector() {
        assert_eq!(marker_index("1\u{fe0f}\u{20e3}"), Some(0));
        assert_eq!(marker_index("2\u{20e3}"), Some(1));
        assert_eq!(marker_index("5\u{fe0f}\u{20e3}"), Some(4));
        assert_eq!(marker_index("👍"), None);
    }

    #[tokio::test]
    async fn only_the_requesters_valid_marker_counts() {
        let selector = Arc::new(TrackSelector::new(
            Arc::new(prompt_expecting(3)),
            Duration::from_secs(5),
        ));

        let feeder = selector.clone();
        tokio::spawn(async move {
            while feeder.pending_count() == 0 {
                tokio::task::yield_now().await;
            }
            feeder.deliver(signal(UserId::new(8), OPTION_MARKERS[0]));
            feeder.deliver(signal(REQUESTER, OPTION_MARKERS[4]));
            feeder.deliver(signal(REQUESTER, "🎵"));
            feeder.deliver(signal(REQUESTER, OPTION_MARKERS[1]));
        });

        let chosen = selector.choose(&requester(), candidates(3)).await;

        assert_eq!(chosen.map(|t| t.identifier), Some("t1".to_string()));
        assert_eq!(selector.pending_count(), 0);
    }

    #[tokio::test]
    async fn reactions_on_other_messages_are_ignored() {
        let selector = Arc::new(TrackSelector::new(
            Arc::new(prompt_expecting(2)),
            Duration::from_millis(100),
        ));

        let feeder = selector.clone();
        let feeding = tokio::spawn(async move {
            while feeder.pending_count() == 0 {
                tokio::task::yield_now().await;
            }
            feeder.deliver(SelectionSignal {
                message_id: MessageId::new(100),
                ..signal(REQUESTER, OPTION_MARKERS[0])
            })
        });

        let chosen = selector.choose(&requester(), candidates(2)).await;

        assert!(!feeding.await.unwrap());
        assert_eq!(chosen, None);
        assert_eq!(selector.pending_count(), 0);
    }

    #[tokio::test]
    async fn timeout_withdraws_and_returns_nothing() {
        let selector = TrackSelector::new(Arc::new(prompt_expecting(5)), Duration::from_millis(20));

        let chosen = selector.choose(&requester(), candidates(8)).await;

        assert_eq!(chosen, None);
        assert_eq!(selector.pending_count(), 0);
        assert!(!selector.deliver(signal(REQUESTER, OPTION_MARKERS[0])));
    }

    #[tokio::test]
    async fn failed_prompt_is_no_selection() {
        let mut prompt = MockSelectionPrompt::new();
        prompt
            .expect_present()
            .returning(|_| Err(anyhow::anyhow!("sin permisos")));
        prompt.expect_withdraw().never();
        let selector = TrackSelector::new(Arc::new(prompt), Duration::from_secs(1));

        assert_eq!(selector.choose(&requester(), candidates(2)).await, None);
    }

    #[tokio::test]
    async fn failed_reactions_withdraw_the_prompt() {
        let mut prompt = MockSelectionPrompt::new();
        prompt.expect_present().times(1).returning(|_| Ok(MESSAGE));
        prompt
            .expect_add_markers()
            .returning(|_, _, _| Err(anyhow::anyhow!("reacción rechazada")));
        prompt
            .expect_withdraw()
            .withf(|_, message| *message == MESSAGE)
            .times(1)
            .returning(|_, _| ());
        let selector = TrackSelector::new(Arc::new(prompt), Duration::from_secs(1));

        assert_eq!(selector.choose(&requester(), candidates(3)).await, None);
        assert_eq!(selector.pending_count(), 0);
    }

    #[tokio::test]
    async fn playlists_and_single_results_skip_the_prompt() {
        let mut prompt = MockSelectionPrompt::new();
        prompt.expect_present().never();
        let selector = TrackSelector::new(Arc::new(prompt), Duration::from_secs(1));

        let playlist = SearchResult::Playlist {
            name: "mix".into(),
            tracks: candidates(4),
        };
        assert_eq!(selector.resolve(&requester(), playlist).await.unwrap().len(), 4);

        let single = SearchResult::Tracks(candidates(1));
        assert_eq!(selector.resolve(&requester(), single).await.unwrap(), candidates(1));
    }

    #[tokio::test]
    async fn empty_results_are_no_tracks_found() {
        let selector = TrackSelector::new(Arc::new(MockSelectionPrompt::new()), Duration::from_secs(1));

        assert!(matches!(
            selector.resolve(&requester(), SearchResult::Tracks(vec![])).await,
            Err(PlayerError::NoTracksFound)
        ));
        let empty_playlist = SearchResult::Playlist {
            name: "vacía".into(),
            tracks: vec![],
        };
        assert!(matches!(
            selector.resolve(&requester(), empty_playlist).await,
            Err(PlayerError::NoTracksFound)
        ));
    }

    #[tokio::test]
    async fn unanswered_choice_resolves_to_nothing() {
        let selector = TrackSelector::new(Arc::new(prompt_expecting(2)), Duration::from_millis(20));
        let tracks = selector
            .resolve(&requester(), SearchResult::Tracks(candidates(2)))
            .await
            .unwrap();
        assert!(tracks.is_empty());
    }
}
