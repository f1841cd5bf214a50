//! Input data model: levels, biomes, segments.
//!
//! Produced by an upstream sampler and treated as read-only here. Every type
//! deserializes from JSON with defaults for the optional options, so a
//! minimal segment is just `{"x": 465, "y": 195, "swing": "up"}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{objects, MAX_LENGTH};

/// Vertical direction of a segment's walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swing {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Swing {
    /// +1 / -1 / 0.
    pub fn sign(self) -> i32 {
        match self {
            Swing::Up => 1,
            Swing::Down => -1,
            Swing::Neutral => 0,
        }
    }

    pub fn is_up(self) -> bool {
        self == Swing::Up
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalKind {
    #[default]
    None,
    Gravity,
    Fake,
}

/// Requested speed change, either per segment or as the biome's start speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeedChange {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "0.5x")]
    Half,
    #[serde(rename = "1x")]
    Normal,
    #[serde(rename = "2x")]
    Double,
    #[serde(rename = "3x")]
    Triple,
    #[serde(rename = "4x")]
    Quadruple,
}

impl SpeedChange {
    /// Object id of the matching speed trigger.
    pub fn object_id(self) -> u32 {
        match self {
            SpeedChange::Half => objects::SPEED_HALF,
            SpeedChange::Normal => objects::SPEED_NORMAL,
            SpeedChange::Double => objects::SPEED_DOUBLE,
            SpeedChange::Quadruple => objects::SPEED_QUADRUPLE,
            _ => objects::SPEED_TRIPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveSize {
    #[default]
    Normal,
    Mini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Normal,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Normal,
    Low,
}

/// Optional features of one segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    pub portal: PortalKind,
    /// Gravity direction the portal sets (selects the portal object id).
    pub gravity: bool,
    pub speed_change: SpeedChange,
    /// Corridor spike present.
    pub spike: bool,
    /// Which wall the spike sits on.
    pub spike_side: bool,
    pub fuzzy: bool,
}

/// One grid-aligned unit of corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub swing: Swing,
    #[serde(default)]
    pub options: SegmentOptions,
}

impl Segment {
    pub fn new(x: i32, y: i32, swing: Swing) -> Self {
        Self {
            x,
            y,
            swing,
            options: SegmentOptions::default(),
        }
    }
}

/// Options shared by every segment of a biome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeOptions {
    /// Gap between floor and ceiling pieces. Must be positive.
    pub corridor_height: i32,
    pub starting_speed: SpeedChange,
    pub starting_size: WaveSize,
    pub color_mode: ColorMode,
    pub visibility: Visibility,
    /// The level starts with inverted gravity.
    pub starting_gravity: bool,
    /// Total length in grid cells (used by meter marks).
    pub length: i64,
    pub min_height: i32,
    pub max_height: i32,
}

impl Default for BiomeOptions {
    fn default() -> Self {
        Self {
            corridor_height: 60,
            starting_speed: SpeedChange::Normal,
            starting_size: WaveSize::Normal,
            color_mode: ColorMode::Normal,
            visibility: Visibility::Normal,
            starting_gravity: false,
            length: 0,
            min_height: 45,
            max_height: 195,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    #[serde(default)]
    pub options: BiomeOptions,
    #[serde(default = "default_x_initial")]
    pub x_initial: i32,
    #[serde(default = "default_y_initial")]
    pub y_initial: i32,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

fn default_x_initial() -> i32 {
    465
}

fn default_y_initial() -> i32 {
    195
}

impl Biome {
    pub fn new(options: BiomeOptions, segments: Vec<Segment>) -> Self {
        let (x_initial, y_initial) = segments
            .first()
            .map_or((default_x_initial(), default_y_initial()), |s| (s.x, s.y));
        Self {
            options,
            x_initial,
            y_initial,
            segments,
        }
    }
}

/// A full generated level as handed over by the sampler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub song: i32,
    #[serde(default)]
    pub biomes: Vec<Biome>,
}

/// A violated compile precondition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("corridor height must be positive, got {0}")]
    NonPositiveCorridorHeight(i32),
    #[error("height bounds are inverted: min {min} > max {max}")]
    InvertedHeightBounds { min: i32, max: i32 },
    #[error("meter length must not be negative, got {0}")]
    NegativeLength(i64),
    #[error("meter length {0} exceeds the maximum of {max}", max = MAX_LENGTH)]
    LengthTooLarge(i64),
}

/// Check the compile preconditions of a biome, returning every violation.
///
/// The compiler itself does not run these checks; callers are expected to
/// reject invalid biomes before compiling them.
pub fn validate_biome(biome: &Biome) -> Vec<LevelError> {
    let mut errors = Vec::new();
    let opts = &biome.options;

    if opts.corridor_height <= 0 {
        errors.push(LevelError::NonPositiveCorridorHeight(opts.corridor_height));
    }
    if opts.min_height > opts.max_height {
        errors.push(LevelError::InvertedHeightBounds {
            min: opts.min_height,
            max: opts.max_height,
        });
    }
    if opts.length < 0 {
        errors.push(LevelError::NegativeLength(opts.length));
    }
    if opts.length > MAX_LENGTH {
        errors.push(LevelError::LengthTooLarge(opts.length));
    }

    errors
}
