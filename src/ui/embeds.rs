use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{audio::selector::{SelectionRequest, OPTION_MARKERS}, node::Track};

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Crea el embed con los candidatos de una búsqueda
pub fn create_selection_embed(request: &SelectionRequest) -> CreateEmbed {
    CreateEmbed::default()
        .title("🔍 Elige una canción")
        .description(selection_lines(&request.candidates))
        .color(colors::MUSIC_PURPLE)
        .field("👤 Solicitado por", format!("<@{}>", request.requester), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Una línea por candidato, con su reacción
fn selection_lines(candidates: &[Track]) -> String {
    candidates
        .iter()
        .zip(OPTION_MARKERS)
        .map(|(track, marker)| format!("{} **{}** ({})", marker, track.title, format_duration(track.length)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_switch_to_hours() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn each_candidate_gets_its_marker() {
        let candidates = vec![
            Track::new("a", "Uno", "https://example.com/a").with_length(Duration::from_secs(90)),
            Track::new("b", "Dos", "https://example.com/b"),
        ];

        let lines = selection_lines(&candidates);

        assert_eq!(
            lines,
            format!("{} **Uno** (1:30)\n{} **Dos** (0:00)", OPTION_MARKERS[0], OPTION_MARKERS[1])
        );
    }
}
