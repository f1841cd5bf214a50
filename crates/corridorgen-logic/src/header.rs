//! Level header: colour channels and level settings.
//!
//! Emitted in front of the structural records. The channel and settings
//! tables come from outside the compiler; themes can add or replace
//! channels through [`LevelHeader::merge_channels`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One colour channel definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorChannel {
    pub slot: u32,
    pub rgb: [u8; 3],
    #[serde(default)]
    pub blending: bool,
    /// 0.0–1.0. Anything above 1.0 is written as fully opaque.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Channel this one copies its colour from.
    #[serde(default)]
    pub copy_color: Option<u32>,
    /// Extra raw `_key_value` suffix appended verbatim.
    #[serde(default)]
    pub special: String,
}

fn default_opacity() -> f64 {
    1.0
}

impl ColorChannel {
    pub fn new(slot: u32, rgb: [u8; 3]) -> Self {
        Self {
            slot,
            rgb,
            blending: false,
            opacity: 1.0,
            copy_color: None,
            special: String::new(),
        }
    }
}

impl fmt::Display for ColorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.rgb;
        write!(
            f,
            "1_{r}_2_{g}_3_{b}_11_255_12_255_13_255_4_-1_6_{}_15_1_18_0_8_1",
            self.slot
        )?;
        if self.blending {
            f.write_str("_5_1")?;
        }
        if self.opacity <= 1.0 {
            write!(f, "_7_{}", self.opacity)?;
        } else {
            f.write_str("_7_1")?;
        }
        if let Some(copy) = self.copy_color {
            write!(f, "_9_{copy}")?;
        }
        if !self.special.is_empty() {
            write!(f, "_{}", self.special)?;
        }
        f.write_str("|")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexColorError {
    #[error("colour `{0}` must have exactly six hex digits")]
    BadLength(String),
    #[error("colour `{0}` contains a non-hex digit")]
    BadDigit(String),
}

/// Parse `#rrggbb` (leading `#` optional) into an RGB triple.
pub fn hex_to_color(hex: &str) -> Result<[u8; 3], HexColorError> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(HexColorError::BadLength(hex.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| HexColorError::BadDigit(hex.to_string()))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Colour table plus the key/value level settings string.
///
/// Always serialized, even with no channels or settings (`kS38,,;`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelHeader {
    #[serde(default)]
    pub colors: Vec<ColorChannel>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl LevelHeader {
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.settings.is_empty()
    }

    /// Add channels, replacing any existing channel with the same slot.
    pub fn merge_channels(&mut self, channels: &[ColorChannel]) {
        for channel in channels {
            match self.colors.iter_mut().find(|c| c.slot == channel.slot) {
                Some(existing) => *existing = channel.clone(),
                None => self.colors.push(channel.clone()),
            }
        }
    }

    pub fn color_string(&self) -> String {
        let mut out = String::from("kS38,");
        for channel in &self.colors {
            out.push_str(&channel.to_string());
        }
        out
    }

    pub fn settings_string(&self) -> String {
        let mut out = String::from(",");
        for (key, value) in &self.settings {
            out.push_str(key);
            out.push(',');
            out.push_str(value);
            out.push(',');
        }
        out.push(';');
        out
    }
}

impl fmt::Display for LevelHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.color_string())?;
        f.write_str(&self.settings_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(hex_to_color("#ff8000"), Ok([255, 128, 0]));
        assert_eq!(hex_to_color("0A0B0C"), Ok([10, 11, 12]));
        assert!(matches!(hex_to_color("#fff"), Err(HexColorError::BadLength(_))));
        assert!(matches!(hex_to_color("#gg0000"), Err(HexColorError::BadDigit(_))));
    }

    #[test]
    fn channel_format() {
        let mut c = ColorChannel::new(1000, [40, 125, 255]);
        assert_eq!(
            c.to_string(),
            "1_40_2_125_3_255_11_255_12_255_13_255_4_-1_6_1000_15_1_18_0_8_1_7_1|"
        );
        c.blending = true;
        c.opacity = 0.5;
        c.copy_color = Some(1004);
        c.special = "17_1".to_string();
        assert_eq!(
            c.to_string(),
            "1_40_2_125_3_255_11_255_12_255_13_255_4_-1_6_1000_15_1_18_0_8_1_5_1_7_0.5_9_1004_17_1|"
        );
    }

    #[test]
    fn opacity_above_one_is_opaque() {
        let mut c = ColorChannel::new(1, [0, 0, 0]);
        c.opacity = 2.0;
        assert!(c.to_string().ends_with("_7_1|"));
    }

    #[test]
    fn merge_replaces_same_slot() {
        let mut header = LevelHeader::default();
        header.colors.push(ColorChannel::new(1000, [0, 0, 0]));
        header.merge_channels(&[
            ColorChannel::new(1000, [255, 255, 255]),
            ColorChannel::new(1004, [1, 2, 3]),
        ]);
        assert_eq!(header.colors.len(), 2);
        assert_eq!(header.colors[0].rgb, [255, 255, 255]);
    }

    #[test]
    fn settings_string_layout() {
        let mut header = LevelHeader::default();
        header.settings.insert("kA2".into(), "0".into());
        header.settings.insert("kA13".into(), "0".into());
        assert_eq!(header.settings_string(), ",kA13,0,kA2,0,;");
    }

    #[test]
    fn empty_header_keeps_block_markers() {
        assert_eq!(LevelHeader::default().to_string(), "kS38,,;");
    }
}
