use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PlayerError, Result};

/// Límite de caracteres de un mensaje de Discord
pub const MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct SongLyrics {
    pub title: String,
    pub author: String,
    pub lyrics: String,
    pub thumbnail_url: Option<String>,
    pub source_link: Option<String>,
}

impl SongLyrics {
    /// Si la letra cabe en un solo mensaje
    pub fn fits_inline(&self) -> bool {
        self.lyrics.chars().count() <= MESSAGE_LIMIT
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Falla con `NoLyricsFound` si el servicio no tiene la canción
    async fn fetch_lyrics(&self, title: &str) -> Result<SongLyrics>;
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    title: String,
    #[serde(default)]
    author: String,
    lyrics: String,
    #[serde(default)]
    thumbnail: GeniusLink,
    #[serde(default)]
    links: GeniusLink,
}

#[derive(Debug, Default, Deserialize)]
struct GeniusLink {
    genius: Option<String>,
}

impl From<LyricsResponse> for SongLyrics {
    fn from(response: LyricsResponse) -> Self {
        Self {
            title: response.title,
            author: response.author,
            lyrics: response.lyrics,
            thumbnail_url: response.thumbnail.genius,
            source_link: response.links.genius,
        }
    }
}

/// Cliente del servicio HTTP de letras
pub struct HttpLyricsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLyricsClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("jukebox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn request_url(&self, title: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(title))
    }

    fn parse_body(body: &str) -> Result<SongLyrics> {
        serde_json::from_str::<LyricsResponse>(body)
            .map(SongLyrics::from)
            .map_err(|e| {
                debug!("Respuesta de letras no reconocida: {}", e);
                PlayerError::NoLyricsFound
            })
    }
}

#[async_trait]
impl LyricsProvider for HttpLyricsClient {
    async fn fetch_lyrics(&self, title: &str) -> Result<SongLyrics> {
        let url = self.request_url(title);
        debug!("🔍 Buscando letra: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("⚠️ Error consultando el servicio de letras: {}", e);
            PlayerError::NoLyricsFound
        })?;

        if !response.status().is_success() {
            debug!("Servicio de letras respondió {}", response.status());
            return Err(PlayerError::NoLyricsFound);
        }

        let body = response
            .text()
            .await
            .map_err(|_| PlayerError::NoLyricsFound)?;
        Self::parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_service_payload() {
        let body = r#"{
            "title": "Bohemian Rhapsody",
            "author": "Queen",
            "lyrics": "Is this the real life?",
            "thumbnail": { "genius": "https://images.genius.com/abc.jpg" },
            "links": { "genius": "https://genius.com/queen-bohemian-rhapsody-lyrics" }
        }"#;

        let lyrics = HttpLyricsClient::parse_body(body).unwrap();
        assert_eq!(
            lyrics,
            SongLyrics {
                title: "Bohemian Rhapsody".into(),
                author: "Queen".into(),
                lyrics: "Is this the real life?".into(),
                thumbnail_url: Some("https://images.genius.com/abc.jpg".into()),
                source_link: Some("https://genius.com/queen-bohemian-rhapsody-lyrics".into()),
            }
        );
        assert!(lyrics.fits_inline());
    }

    #[test]
    fn missing_links_are_optional() {
        let lyrics = HttpLyricsClient::parse_body(r#"{"title":"x","lyrics":"y"}"#).unwrap();
        assert_eq!(lyrics.thumbnail_url, None);
        assert_eq!(lyrics.source_link, None);
    }

    #[test]
    fn error_payload_is_no_lyrics_found() {
        assert!(matches!(
            HttpLyricsClient::parse_body(r#"{"error":"Sorry I couldn't find that song's lyrics"}"#),
            Err(PlayerError::NoLyricsFound)
        ));
    }

    #[test]
    fn query_is_url_encoded() {
        let client = HttpLyricsClient::with_client(reqwest::Client::new(), "https://lyrics.test/?title=");
        assert_eq!(
            client.request_url("AC/DC back in black"),
            "https://lyrics.test/?title=AC%2FDC%20back%20in%20black"
        );
    }

    #[test]
    fn long_lyrics_do_not_fit_inline() {
        let lyrics = SongLyrics {
            title: "t".into(),
            author: "a".into(),
            lyrics: "la ".repeat(700),
            thumbnail_url: None,
            source_link: None,
        };
        assert!(!lyrics.fits_inline());
    }
}
