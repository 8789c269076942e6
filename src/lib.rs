//! # Jukebox
//!
//! Sesiones de música por guild para Discord: cola, máquina de estados de
//! reproducción y ciclo de vida de la conexión de voz.
//!
//! El núcleo ([`audio`]) no decodifica audio. Envía directivas a un
//! [`node::AudioNode`] y reacciona a los [`node::NodeEvent`] que éste reporta.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod node;
pub mod ui;

pub use crate::error::{NodeError, PlayerError, Result};
