use std::str::FromStr;
use tracing::info;

use crate::error::{PlayerError, Result};

pub const BAND_COUNT: usize = 15;

/// Frecuencias centrales (Hz) de las 15 bandas, en orden de índice
pub const HZ_BANDS: [i64; BAND_COUNT] = [
    20, 40, 63, 100, 150, 250, 400, 450, 630, 1000, 1600, 2500, 4000, 10000, 16000,
];

/// Ganancia máxima admitida por banda, en dB
pub const MAX_GAIN_DB: f32 = 10.0;

/// Presets predefinidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqPreset {
    Flat,
    Boost,
    Metal,
    Piano,
}

impl EqPreset {
    pub const ALL: [EqPreset; 4] = [EqPreset::Flat, EqPreset::Boost, EqPreset::Metal, EqPreset::Piano];

    pub fn name(self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::Boost => "boost",
            EqPreset::Metal => "metal",
            EqPreset::Piano => "piano",
        }
    }

    /// Niveles normalizados de cada banda
    pub fn levels(self) -> [f32; BAND_COUNT] {
        match self {
            EqPreset::Flat => [0.0; BAND_COUNT],
            EqPreset::Boost => [
                -0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15, 0.05,
            ],
            EqPreset::Metal => [
                0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075, 0.0,
            ],
            EqPreset::Piano => [
                -0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25, -0.025, 0.0,
            ],
        }
    }
}

impl FromStr for EqPreset {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        EqPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| PlayerError::InvalidEqPreset(s.to_string()))
    }
}

/// Resuelve una banda dada como índice 1-15 o como frecuencia central.
///
/// Devuelve el índice base 0.
pub fn resolve_band(band: i64) -> Result<usize> {
    if (1..=BAND_COUNT as i64).contains(&band) {
        return Ok((band - 1) as usize);
    }

    HZ_BANDS
        .iter()
        .position(|&hz| hz == band)
        .ok_or(PlayerError::NonExistentEqBand(band))
}

/// Ecualizador de 15 bandas de una sesión
#[derive(Debug, Clone, PartialEq)]
pub struct Equalizer {
    levels: [f32; BAND_COUNT],
}

impl Equalizer {
    pub fn new() -> Self {
        Self {
            levels: [0.0; BAND_COUNT],
        }
    }

    pub fn levels(&self) -> &[f32; BAND_COUNT] {
        &self.levels
    }

    /// Aplica un preset
    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.levels = preset.levels();
        info!("🎛️ Preset '{}' aplicado", preset.name());
    }

    /// Ajusta una banda; la ganancia en dB se guarda normalizada (dB / 10)
    pub fn set_band(&mut self, band: i64, gain_db: f32) -> Result<usize> {
        let index = resolve_band(band)?;

        if !(gain_db.abs() <= MAX_GAIN_DB) {
            return Err(PlayerError::EqGainOutOfBounds(gain_db));
        }

        self.levels[index] = gain_db / 10.0;
        info!("🎛️ Banda {} ({} Hz) ajustada a {} dB", index + 1, HZ_BANDS[index], gain_db);
        Ok(index)
    }

    pub fn reset(&mut self) {
        self.levels = [0.0; BAND_COUNT];
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}
