use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::selector::MAX_CANDIDATES;

pub const DEFAULT_LYRICS_URL: &str = "https://some-random-api.com/lyrics?title=";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,

    // Selección de resultados
    pub selection_timeout_secs: u64,
    pub search_results: usize,

    // Servicios externos
    pub lyrics_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,

            selection_timeout_secs: std::env::var("SELECTION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            search_results: std::env::var("SEARCH_RESULTS")
                .unwrap_or_else(|_| MAX_CANDIDATES.to_string())
                .parse()?,

            lyrics_url: std::env::var("LYRICS_URL")
                .unwrap_or_else(|_| DEFAULT_LYRICS_URL.to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida los valores cargados.
    ///
    /// - El tiempo de selección debe ser mayor que 0
    /// - Los resultados de búsqueda deben caber en las opciones de reacción (1-5)
    /// - La URL de letras debe ser http(s)
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.selection_timeout_secs == 0 {
            anyhow::bail!("El tiempo de selección debe ser mayor que 0");
        }

        if !(1..=MAX_CANDIDATES).contains(&self.search_results) {
            anyhow::bail!(
                "SEARCH_RESULTS debe estar entre 1 y {}, recibido: {}",
                MAX_CANDIDATES,
                self.search_results
            );
        }

        let url = url::Url::parse(&self.lyrics_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("LYRICS_URL debe ser http o https, recibido: {}", self.lyrics_url);
        }

        Ok(())
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_timeout_secs)
    }

    /// Resumen sin secretos para el log de arranque
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Selección: {} resultados, {}s de espera\n  \
            Letras: {}",
            self.search_results, self.selection_timeout_secs, self.lyrics_url
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Sin token por defecto: debe venir del entorno
            discord_token: String::new(),

            selection_timeout_secs: 60,
            search_results: MAX_CANDIDATES,

            lyrics_url: DEFAULT_LYRICS_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".into(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_validate_once_a_token_is_set() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
        assert_eq!(valid().selection_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn search_results_must_fit_the_markers() {
        for search_results in [0, 6] {
            let config = Config {
                search_results,
                ..valid()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn rejects_zero_timeout_and_bad_lyrics_url() {
        let zero = Config {
            selection_timeout_secs: 0,
            ..valid()
        };
        assert!(zero.validate().is_err());

        let ftp = Config {
            lyrics_url: "ftp://lyrics.test/".into(),
            ..valid()
        };
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secreto".into(),
            ..Config::default()
        };
        assert!(!config.summary().contains("super-secreto"));
    }
}
