//! User-facing generator settings.
//!
//! Resolved outside the compiler (settings screen, config file) and passed
//! in as plain data.
//!
//! ```
//! use corridorgen_logic::settings::{GeneratorSettings, validate_settings};
//!
//! let settings = GeneratorSettings::default();
//! assert!(settings.corner_pieces);
//! assert!(validate_settings(&settings).is_empty());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Theme name meaning "no theme".
pub const NO_THEME: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Place rounded corner pieces at swing changes.
    pub corner_pieces: bool,
    /// Place distance markers along the floor.
    pub meter_marks: bool,
    /// Distance between markers, in grid cells. 0 disables markers.
    pub marker_interval: i64,
    /// Theme to apply, by name.
    pub active_theme: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            corner_pieces: true,
            meter_marks: true,
            marker_interval: 100,
            active_theme: NO_THEME.to_string(),
        }
    }
}

impl GeneratorSettings {
    /// Whether meter marks will actually be placed.
    pub fn marks_enabled(&self) -> bool {
        self.meter_marks && self.marker_interval > 0
    }

    pub fn has_theme(&self) -> bool {
        let name = self.active_theme.trim();
        !name.is_empty() && !name.eq_ignore_ascii_case(NO_THEME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("marker interval must not be negative, got {0}")]
    NegativeMarkerInterval(i64),
    #[error("theme name `{0}` may only contain letters, digits, `-` and `_`")]
    InvalidThemeName(String),
}

/// Validate settings, returning all errors found.
pub fn validate_settings(settings: &GeneratorSettings) -> Vec<SettingsError> {
    let mut errors = Vec::new();

    if settings.marker_interval < 0 {
        errors.push(SettingsError::NegativeMarkerInterval(
            settings.marker_interval,
        ));
    }

    let name = settings.active_theme.trim();
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        errors.push(SettingsError::InvalidThemeName(
            settings.active_theme.clone(),
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_disables_marks() {
        let settings = GeneratorSettings {
            marker_interval: 0,
            ..Default::default()
        };
        assert!(!settings.marks_enabled());
        assert!(validate_settings(&settings).is_empty());
    }

    #[test]
    fn negative_interval_rejected() {
        let settings = GeneratorSettings {
            marker_interval: -5,
            ..Default::default()
        };
        assert!(validate_settings(&settings).contains(&SettingsError::NegativeMarkerInterval(-5)));
    }

    #[test]
    fn theme_name_cannot_escape_directory() {
        let settings = GeneratorSettings {
            active_theme: "../secrets".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings)[..],
            [SettingsError::InvalidThemeName(_)]
        ));
    }

    #[test]
    fn none_means_no_theme() {
        assert!(!GeneratorSettings::default().has_theme());
        let settings = GeneratorSettings {
            active_theme: "caves".to_string(),
            ..Default::default()
        };
        assert!(settings.has_theme());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: GeneratorSettings =
            serde_json::from_str(r#"{"corner_pieces": false}"#).unwrap();
        assert!(!settings.corner_pieces);
        assert_eq!(settings.marker_interval, 100);
    }
}
