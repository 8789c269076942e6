use rand::seq::SliceRandom;
use std::{fmt, str::FromStr};
use tracing::{debug, info};

use crate::{
    error::{PlayerError, Result},
    node::Track,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl FromStr for RepeatMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(RepeatMode::None),
            "1" => Ok(RepeatMode::One),
            "all" => Ok(RepeatMode::All),
            other => Err(PlayerError::InvalidRepeatMode(other.to_string())),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatMode::None => "none",
            RepeatMode::One => "1",
            RepeatMode::All => "all",
        };
        f.write_str(name)
    }
}

/// Cola ordenada con un cursor sobre el track actual.
///
/// `items` conserva el orden de inserción; `position` apunta al track que
/// está sonando. Tras un salto o tras agotar la cola `position` puede quedar
/// más allá del último índice: en ese caso no hay track actual, pero las
/// vistas siguen funcionando.
#[derive(Debug, Default)]
pub struct Queue {
    items: Vec<Track>,
    position: usize,
    repeat_mode: RepeatMode,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn items(&self) -> &[Track] {
        &self.items
    }

    /// Track actual; `None` si el cursor quedó fuera de la cola
    pub fn current_track(&self) -> Result<Option<&Track>> {
        self.ensure_not_empty()?;
        Ok(self.items.get(self.position))
    }

    /// Tracks posteriores al actual
    pub fn upcoming(&self) -> Result<&[Track]> {
        self.ensure_not_empty()?;
        let start = (self.position + 1).min(self.items.len());
        Ok(&self.items[start..])
    }

    /// Tracks anteriores al actual
    pub fn history(&self) -> Result<&[Track]> {
        self.ensure_not_empty()?;
        let end = self.position.min(self.items.len());
        Ok(&self.items[..end])
    }

    /// Agrega tracks al final, en el orden dado
    pub fn add<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        let before = self.items.len();
        self.items.extend(tracks);
        debug!("➕ {} track(s) agregados a la cola", self.items.len() - before);
    }

    /// Avanza el cursor una posición.
    ///
    /// Al pasar del último índice vuelve a 0 con repetición `All`; en otro
    /// caso devuelve `None` y el cursor queda en `len()`.
    pub fn advance(&mut self) -> Result<Option<&Track>> {
        self.jump_to(self.position + 1)
    }

    /// Coloca el cursor en `index` con la misma regla de desborde que `advance`
    pub fn jump_to(&mut self, index: usize) -> Result<Option<&Track>> {
        self.ensure_not_empty()?;

        self.position = index;
        if self.position >= self.items.len() {
            if self.repeat_mode != RepeatMode::All {
                debug!("📭 Cola agotada en posición {}", self.position);
                return Ok(None);
            }
            info!("🔁 Fin de la cola, volviendo al inicio");
            self.position = 0;
        }

        Ok(self.items.get(self.position))
    }

    /// Mezcla solo los tracks pendientes; historial y actual no se mueven
    pub fn shuffle(&mut self) -> Result<()> {
        self.ensure_not_empty()?;

        let start = (self.position + 1).min(self.items.len());
        let mut rng = rand::thread_rng();
        self.items[start..].shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} pendientes)", self.items.len() - start);
        Ok(())
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        match mode {
            RepeatMode::None => info!("➡️ Repetición desactivada"),
            RepeatMode::One => info!("🔂 Repetir canción activado"),
            RepeatMode::All => info!("🔁 Repetir cola activado"),
        }
    }

    /// Vacía la cola y reinicia el cursor
    pub fn empty(&mut self) {
        self.items.clear();
        self.position = 0;
        info!("🗑️ Cola limpiada");
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(id: &str) -> Track {
        Track::new(id, id.to_uppercase(), format!("https://example.com/{id}"))
    }

    fn queue_of(ids: &[&str]) -> Queue {
        let mut queue = Queue::new();
        queue.add(ids.iter().map(|id| track(id)));
        queue
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.identifier.as_str()).collect()
    }

    #[test]
    fn views_fail_on_empty_queue() {
        let mut queue = Queue::new();
        assert!(queue.is_empty());
        assert!(matches!(queue.current_track(), Err(PlayerError::QueueEmpty)));
        assert!(matches!(queue.upcoming(), Err(PlayerError::QueueEmpty)));
        assert!(matches!(queue.history(), Err(PlayerError::QueueEmpty)));
        assert!(matches!(queue.advance(), Err(PlayerError::QueueEmpty)));
        assert!(matches!(queue.shuffle(), Err(PlayerError::QueueEmpty)));
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn add_appends_regardless_of_position() {
        let mut queue = queue_of(&["a", "b"]);
        queue.advance().unwrap();
        queue.add([track("c")]);
        queue.add([track("d")]);
        assert_eq!(ids(queue.items()), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.position(), 1);
    }

    #[test]
    fn views_split_around_position() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.jump_to(2).unwrap();
        assert_eq!(queue.current_track().unwrap().unwrap().identifier, "c");
        assert_eq!(ids(queue.history().unwrap()), vec!["a", "b"]);
        assert_eq!(ids(queue.upcoming().unwrap()), vec!["d"]);
    }

    #[test]
    fn advance_without_repeat_exhausts_at_len() {
        let mut queue = queue_of(&["a", "b"]);
        assert_eq!(queue.advance().unwrap().unwrap().identifier, "b");
        assert!(queue.advance().unwrap().is_none());
        assert_eq!(queue.position(), 2);
        assert!(queue.current_track().unwrap().is_none());
        assert!(queue.upcoming().unwrap().is_empty());
        assert_eq!(ids(queue.history().unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn repeat_all_wraps_to_first_item() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.set_repeat_mode(RepeatMode::All);

        queue.advance().unwrap();
        assert_eq!(queue.advance().unwrap().unwrap().identifier, "c");
        assert_eq!(queue.position(), 2);

        assert_eq!(queue.advance().unwrap().unwrap().identifier, "a");
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn jump_past_end_leaves_cursor_overshooting() {
        let mut queue = queue_of(&["a", "b"]);
        assert!(queue.jump_to(5).unwrap().is_none());
        assert_eq!(queue.position(), 5);
        assert!(queue.current_track().unwrap().is_none());
        assert_eq!(ids(queue.history().unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn shuffle_keeps_history_and_current_in_place() {
        let names: Vec<String> = (0..30).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut queue = queue_of(&refs);
        queue.jump_to(9).unwrap();

        queue.shuffle().unwrap();

        assert_eq!(ids(&queue.items()[..10]), refs[..10].to_vec());
        let mut tail = ids(&queue.items()[10..]);
        tail.sort();
        let mut expected = refs[10..].to_vec();
        expected.sort();
        assert_eq!(tail, expected);
    }

    #[test]
    fn shuffle_on_exhausted_queue_is_a_no_op() {
        let mut queue = queue_of(&["a", "b"]);
        queue.jump_to(2).unwrap();
        queue.shuffle().unwrap();
        assert_eq!(ids(queue.items()), vec!["a", "b"]);
    }

    #[test]
    fn empty_resets_cursor() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(2).unwrap();
        queue.empty();
        assert!(queue.is_empty());
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn repeat_mode_parses_known_names_only() {
        assert_eq!("none".parse::<RepeatMode>().unwrap(), RepeatMode::None);
        assert_eq!("1".parse::<RepeatMode>().unwrap(), RepeatMode::One);
        assert_eq!("all".parse::<RepeatMode>().unwrap(), RepeatMode::All);
        assert!(matches!(
            "ALL".parse::<RepeatMode>(),
            Err(PlayerError::InvalidRepeatMode(_))
        ));
        assert_eq!(RepeatMode::One.to_string(), "1");
    }
}
