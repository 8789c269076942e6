//! Error taxonomy for the playback core.
//!
//! Every controller operation either succeeds or fails with exactly one
//! [`PlayerError`]. None of them are fatal: the dispatch layer matches on the
//! variant and picks the message shown to the user.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errores que puede devolver una sesión de reproducción
#[derive(Error, Debug)]
pub enum PlayerError {
    // Conexión
    #[error("Ya está conectado a un canal de voz")]
    AlreadyConnected,

    #[error("No se especificó ningún canal de voz")]
    NoVoiceChannel,

    // Estado de la cola
    #[error("La cola está vacía")]
    QueueEmpty,

    #[error("No se encontraron canciones")]
    NoTracksFound,

    #[error("No hay más canciones en la cola")]
    NoMoreTracks,

    #[error("No hay canciones anteriores en la cola")]
    NoPreviousTracks,

    // Estado del reproductor
    #[error("El reproductor ya está pausado")]
    PlayerAlreadyPaused,

    // Configuración
    #[error("Modo de repetición inválido: {0} (usa none, 1 o all)")]
    InvalidRepeatMode(String),

    #[error("El volumen debe ser 0% o mayor")]
    VolumeTooLow,

    #[error("El volumen debe ser 150% o menor")]
    VolumeTooHigh,

    #[error("El reproductor ya está al volumen máximo")]
    MaxVolume,

    #[error("El reproductor ya está al volumen mínimo")]
    MinVolume,

    #[error("Preset de ecualizador inválido: {0}")]
    InvalidEqPreset(String),

    #[error("Banda de ecualizador inexistente: {0}")]
    NonExistentEqBand(i64),

    #[error("Ganancia fuera de rango: {0} dB (debe estar entre -10 y 10)")]
    EqGainOutOfBounds(f32),

    #[error("Formato de tiempo inválido: {0}")]
    InvalidTimeString(String),

    // Búsqueda externa
    #[error("No se encontró la letra")]
    NoLyricsFound,

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Fallos reportados por el nodo de audio
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("No hay conexión de voz para esta guild")]
    NotConnected,

    #[error("Error al conectar al canal de voz: {0}")]
    Join(String),

    #[error("Error al buscar tracks: {0}")]
    Search(String),

    #[error("Error de reproducción: {0}")]
    Playback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_errors_convert_transparently() {
        let err: PlayerError = NodeError::Join("timeout".to_string()).into();
        assert!(matches!(err, PlayerError::Node(NodeError::Join(_))));
        assert_eq!(err.to_string(), "Error al conectar al canal de voz: timeout");
    }

    #[test]
    fn error_messages_carry_the_offending_value() {
        assert!(PlayerError::NonExistentEqBand(16).to_string().contains("16"));
        assert!(PlayerError::InvalidRepeatMode("twice".into())
            .to_string()
            .contains("twice"));
    }
}
