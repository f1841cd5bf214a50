//! Per-segment orientation codes and the bounded history window.
//!
//! Every segment is reduced to one [`OrientationCode`]; the last
//! [`WINDOW_LEN`] codes form the window that theme rules match against.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::WINDOW_LEN;
use crate::level::{PortalKind, Segment, SpeedChange, Swing};

/// Classification of one segment. Theme files refer to codes by name or by
/// their numeric id (0 = `None` ... 8 = `Speed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeRepr")]
pub enum OrientationCode {
    None,
    Base,
    EndDown,
    EndUp,
    Slope,
    Fuzz,
    Spike,
    Portal,
    Speed,
}

impl OrientationCode {
    pub const ALL: [OrientationCode; 9] = [
        OrientationCode::None,
        OrientationCode::Base,
        OrientationCode::EndDown,
        OrientationCode::EndUp,
        OrientationCode::Slope,
        OrientationCode::Fuzz,
        OrientationCode::Spike,
        OrientationCode::Portal,
        OrientationCode::Speed,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            OrientationCode::None => "none",
            OrientationCode::Base => "base",
            OrientationCode::EndDown => "enddown",
            OrientationCode::EndUp => "endup",
            OrientationCode::Slope => "slope",
            OrientationCode::Fuzz => "fuzz",
            OrientationCode::Spike => "spike",
            OrientationCode::Portal => "portal",
            OrientationCode::Speed => "speed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.name() == lower)
    }
}

impl fmt::Display for OrientationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Id(u8),
    Name(String),
}

impl TryFrom<CodeRepr> for OrientationCode {
    type Error = String;

    fn try_from(repr: CodeRepr) -> Result<Self, Self::Error> {
        match repr {
            CodeRepr::Id(id) => {
                Self::from_id(id).ok_or_else(|| format!("unknown orientation id {id}"))
            }
            CodeRepr::Name(name) => {
                Self::from_name(&name).ok_or_else(|| format!("unknown orientation `{name}`"))
            }
        }
    }
}

/// Derive the orientation code of segment `index` out of `count`.
///
/// The first segment is `Base`, a last segment with a vertical swing is
/// `EndUp`/`EndDown`; everything else is classified by its most prominent
/// feature (portal, speed change, spike, fuzz) or `Slope` when it has none.
pub fn classify(segment: &Segment, index: usize, count: usize) -> OrientationCode {
    if index == 0 {
        return OrientationCode::Base;
    }
    if index + 1 == count {
        match segment.swing {
            Swing::Up => return OrientationCode::EndUp,
            Swing::Down => return OrientationCode::EndDown,
            Swing::Neutral => {}
        }
    }

    let opts = &segment.options;
    if opts.portal != PortalKind::None {
        OrientationCode::Portal
    } else if opts.speed_change != SpeedChange::None {
        OrientationCode::Speed
    } else if opts.spike {
        OrientationCode::Spike
    } else if opts.fuzzy {
        OrientationCode::Fuzz
    } else {
        OrientationCode::Slope
    }
}

/// Fixed-length history of orientation codes, most recent last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    codes: VecDeque<OrientationCode>,
}

impl Window {
    /// A window of `None` codes.
    pub fn new() -> Self {
        Self {
            codes: std::iter::repeat(OrientationCode::None)
                .take(WINDOW_LEN)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Most recent code.
    pub fn last(&self) -> OrientationCode {
        self.codes.back().copied().unwrap_or(OrientationCode::None)
    }

    /// Whether the last `pattern.len()` codes equal `pattern`. A pattern
    /// longer than the window never matches.
    pub fn ends_with(&self, pattern: &[OrientationCode]) -> bool {
        if pattern.len() > self.codes.len() {
            return false;
        }
        let start = self.codes.len() - pattern.len();
        self.codes.range(start..).eq(pattern.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = OrientationCode> + '_ {
        self.codes.iter().copied()
    }

    fn push(&mut self, code: OrientationCode) {
        if self.codes.len() == WINDOW_LEN {
            self.codes.pop_front();
        }
        self.codes.push_back(code);
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the window for one generation pass.
#[derive(Debug, Clone, Default)]
pub struct OrientationTracker {
    window: Window,
}

impl OrientationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one code, dropping the oldest, and return the updated window.
    pub fn advance(&mut self, code: OrientationCode) -> &Window {
        self.window.push(code);
        &self.window
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}
