use regex::Regex;
use std::{sync::LazyLock, time::Duration};

use crate::error::{PlayerError, Result};

// minutos:segundos, 2m30s, 3m, 45s
static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})([:ms])(?:([0-9]{1,2})s?)?$").expect("regex de tiempo válida")
});

/// Convierte un token de búsqueda (`1:30`, `2m30s`, `3m`, `45s`) en una posición
pub fn parse_timestamp(input: &str) -> Result<Duration> {
    let invalid = || PlayerError::InvalidTimeString(input.to_string());

    let caps = TIME_REGEX.captures(input.trim()).ok_or_else(invalid)?;
    let lead: u64 = caps[1].parse().map_err(|_| invalid())?;

    let secs = match (caps.get(3), &caps[2]) {
        (Some(seconds), _) => {
            let seconds: u64 = seconds.as_str().parse().map_err(|_| invalid())?;
            lead * 60 + seconds
        }
        (None, "m") => lead * 60,
        (None, _) => lead,
    };

    Ok(Duration::from_secs(secs))
}
