//! Level-level entry point: header + compiled biome + theme records.
//!
//! ```
//! use corridorgen_logic::level::{Biome, BiomeOptions, LevelData, Segment, Swing};
//! use corridorgen_logic::pipeline::generate_level;
//! use corridorgen_logic::settings::GeneratorSettings;
//! use corridorgen_logic::theme::{OverrideFlags, Theme};
//! use corridorgen_logic::header::LevelHeader;
//!
//! let level = LevelData {
//!     biomes: vec![Biome::new(
//!         BiomeOptions::default(),
//!         vec![Segment::new(465, 195, Swing::Up), Segment::new(495, 225, Swing::Up)],
//!     )],
//!     ..Default::default()
//! };
//! let output = generate_level(
//!     &level,
//!     &Theme::empty(),
//!     &GeneratorSettings::default(),
//!     &LevelHeader::default(),
//!     OverrideFlags::default(),
//! );
//! assert!(output.to_level_string().contains("1,1338,2,495,3,225,6,0,64,1,67,1;"));
//! ```

use serde::Serialize;

use crate::compiler::{compile, CompiledBiome};
use crate::header::LevelHeader;
use crate::level::LevelData;
use crate::record::serialize_records;
use crate::settings::GeneratorSettings;
use crate::theme::{OverrideFlags, Theme};

/// Everything one generation pass produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelOutput {
    /// Serialized header (colour channels and settings), possibly empty.
    pub header: String,
    pub compiled: CompiledBiome,
}

impl LevelOutput {
    /// Header, then structure, then theme records.
    pub fn to_level_string(&self) -> String {
        let mut level = self.header.clone();
        level.push_str(&serialize_records(&self.compiled.structure));
        level.push_str(&serialize_records(&self.compiled.theme));
        level
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
            && self.compiled.structure.is_empty()
            && self.compiled.theme.is_empty()
    }

    pub fn summary(&self) -> LevelSummary {
        LevelSummary {
            structure_records: self.compiled.structure.len(),
            theme_records: self.compiled.theme.len(),
            overrides: self
                .compiled
                .flags
                .active()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            bytes: self.to_level_string().len(),
        }
    }
}

/// Counts for logging and the CLI report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub structure_records: usize,
    pub theme_records: usize,
    pub overrides: Vec<String>,
    pub bytes: usize,
}

/// Compile a level.
///
/// Only the first biome is compiled; the sampler emits one biome per level
/// and any others are ignored with a warning. A level without biomes, or
/// whose first biome has no segments, produces empty output (no header).
pub fn generate_level(
    level: &LevelData,
    theme: &Theme,
    settings: &GeneratorSettings,
    header: &LevelHeader,
    flags: OverrideFlags,
) -> LevelOutput {
    let Some(biome) = level.biomes.first() else {
        log::info!("Level {} has no biomes, nothing to compile", level.seed);
        return LevelOutput::default();
    };
    if level.biomes.len() > 1 {
        log::warn!(
            "Level {} has {} biomes; only the first is compiled",
            level.seed,
            level.biomes.len()
        );
    }
    if biome.segments.is_empty() {
        log::info!("Level {} has an empty biome, nothing to compile", level.seed);
        return LevelOutput::default();
    }

    let compiled = compile(biome, settings, theme, flags);

    let mut header = header.clone();
    header.merge_channels(&theme.colors);

    let output = LevelOutput {
        header: header.to_string(),
        compiled,
    };

    let summary = output.summary();
    log::info!(
        "Compiled level {} ({} segments): {} structure records, {} theme records, overrides [{}]",
        level.seed,
        biome.segments.len(),
        summary.structure_records,
        summary.theme_records,
        summary.overrides.join(", ")
    );

    output
}
