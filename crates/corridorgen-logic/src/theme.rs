//! Theme rules: declarative decoration and structural overrides.
//!
//! A theme is a list of [`ThemeRule`]s matched against the orientation
//! window, plus [`RepeatingPattern`]s injected at fixed x intervals. Rules
//! are loaded from JSON, validated once, and compiled into tagged
//! [`MatchPredicate`]s so the engine has a single matcher.
//!
//! # Theme file
//!
//! ```json
//! {
//!   "metadata": { "name": "caves", "author": "someone" },
//!   "colors": [ { "slot": 1000, "hex": "#1a1a2e" } ],
//!   "rules": [
//!     { "pattern": ["slope", "slope"], "not_offsets": [1],
//!       "commands": ["1,1,2,{x},3,{y-30};"] },
//!     { "pattern": ["endup"], "commands": ["override:endup", "1,1,2,{x+30},3,{max_height};"] },
//!     { "pattern": ["slope"], "else": true, "commands": [] }
//!   ],
//!   "patterns": [ { "id": 1, "data": "1,1007,2,195,3,15;", "start": 195, "repeat": 300 } ]
//! }
//! ```
//!
//! Placeholders (`{x}`, `{y}`, `{max_height}`, `{min_height}`,
//! `{corridor_height}`, each optionally `+N` / `-N`) fill a whole record
//! value. A command of the form `override:<category>` sets an override flag
//! instead of emitting records.
//!
//! ```
//! use corridorgen_logic::orientation::{OrientationCode, OrientationTracker};
//! use corridorgen_logic::theme::{Position, Theme, ThemeRuleEngine, TemplateContext};
//!
//! let theme = Theme::from_json(r#"{"rules": [
//!     {"pattern": ["slope"], "commands": ["1,1,2,{x},3,{y+30};"]}
//! ]}"#).unwrap();
//! let mut tracker = OrientationTracker::new();
//! let window = tracker.advance(OrientationCode::Slope);
//! let ctx = TemplateContext { x: 495, y: 165, max_height: 195, min_height: 45, corridor_height: 60 };
//! let eval = ThemeRuleEngine::new(&theme).evaluate(window, Position { index: 3, x: 495 }, &ctx);
//! assert_eq!(eval.records[0].to_string(), "1,1,2,495,3,195;");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::WINDOW_LEN;
use crate::header::{hex_to_color, ColorChannel, HexColorError};
use crate::orientation::{OrientationCode, Window};
use crate::record::{parse_records, FieldValue, PlacementRecord, RecordParseError};

// ── Override flags ──────────────────────────────────────────────────────

/// Structural category whose default emission a theme can take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideCategory {
    Base,
    EndUp,
    EndDown,
    Slope,
    Fuzz,
    Spike,
    Portal,
    Speed,
}

impl OverrideCategory {
    pub const ALL: [OverrideCategory; 8] = [
        OverrideCategory::Base,
        OverrideCategory::EndUp,
        OverrideCategory::EndDown,
        OverrideCategory::Slope,
        OverrideCategory::Fuzz,
        OverrideCategory::Spike,
        OverrideCategory::Portal,
        OverrideCategory::Speed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OverrideCategory::Base => "base",
            OverrideCategory::EndUp => "endup",
            OverrideCategory::EndDown => "enddown",
            OverrideCategory::Slope => "slope",
            OverrideCategory::Fuzz => "fuzz",
            OverrideCategory::Spike => "spike",
            OverrideCategory::Portal => "portal",
            OverrideCategory::Speed => "speed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.name() == lower)
    }
}

impl fmt::Display for OverrideCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which structural categories a theme has taken over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideFlags {
    pub base: bool,
    pub end_up: bool,
    pub end_down: bool,
    pub slope: bool,
    pub fuzz: bool,
    pub spike: bool,
    pub portal: bool,
    pub speed: bool,
}

impl OverrideFlags {
    pub fn set(&mut self, category: OverrideCategory) {
        *self.slot(category) = true;
    }

    pub fn is_set(&self, category: OverrideCategory) -> bool {
        match category {
            OverrideCategory::Base => self.base,
            OverrideCategory::EndUp => self.end_up,
            OverrideCategory::EndDown => self.end_down,
            OverrideCategory::Slope => self.slope,
            OverrideCategory::Fuzz => self.fuzz,
            OverrideCategory::Spike => self.spike,
            OverrideCategory::Portal => self.portal,
            OverrideCategory::Speed => self.speed,
        }
    }

    /// Categories currently set, in declaration order.
    pub fn active(&self) -> Vec<OverrideCategory> {
        OverrideCategory::ALL
            .iter()
            .copied()
            .filter(|c| self.is_set(*c))
            .collect()
    }

    fn slot(&mut self, category: OverrideCategory) -> &mut bool {
        match category {
            OverrideCategory::Base => &mut self.base,
            OverrideCategory::EndUp => &mut self.end_up,
            OverrideCategory::EndDown => &mut self.end_down,
            OverrideCategory::Slope => &mut self.slope,
            OverrideCategory::Fuzz => &mut self.fuzz,
            OverrideCategory::Spike => &mut self.spike,
            OverrideCategory::Portal => &mut self.portal,
            OverrideCategory::Speed => &mut self.speed,
        }
    }
}

// ── Record templates ────────────────────────────────────────────────────

/// Values a record template can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVar {
    X,
    Y,
    MaxHeight,
    MinHeight,
    CorridorHeight,
}

impl TemplateVar {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(TemplateVar::X),
            "y" => Some(TemplateVar::Y),
            "max_height" => Some(TemplateVar::MaxHeight),
            "min_height" => Some(TemplateVar::MinHeight),
            "corridor_height" => Some(TemplateVar::CorridorHeight),
            _ => None,
        }
    }
}

/// Current segment and biome values substituted into templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateContext {
    pub x: i32,
    pub y: i32,
    pub max_height: i32,
    pub min_height: i32,
    pub corridor_height: i32,
}

impl TemplateContext {
    fn value(&self, var: TemplateVar) -> i64 {
        let v = match var {
            TemplateVar::X => self.x,
            TemplateVar::Y => self.y,
            TemplateVar::MaxHeight => self.max_height,
            TemplateVar::MinHeight => self.min_height,
            TemplateVar::CorridorHeight => self.corridor_height,
        };
        v as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Literal(String),
    Var { var: TemplateVar, offset: i64 },
}

impl Cell {
    fn parse(raw: &str) -> Result<Self, ThemeError> {
        if !raw.contains('{') && !raw.contains('}') {
            return Ok(Cell::Literal(raw.to_string()));
        }
        let inner = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| ThemeError::BadPlaceholder(raw.to_string()))?;

        let split = inner.find(|c: char| c == '+' || c == '-');
        let (name, offset) = match split {
            Some(i) => {
                let offset: i64 = inner[i..]
                    .trim()
                    .parse()
                    .map_err(|_| ThemeError::BadPlaceholder(raw.to_string()))?;
                (inner[..i].trim(), offset)
            }
            None => (inner.trim(), 0),
        };
        let var =
            TemplateVar::from_name(name).ok_or_else(|| ThemeError::BadPlaceholder(raw.to_string()))?;
        Ok(Cell::Var { var, offset })
    }

    fn render(&self, ctx: &TemplateContext) -> FieldValue {
        match self {
            Cell::Literal(text) => FieldValue::Text(text.clone()),
            Cell::Var { var, offset } => FieldValue::Int(ctx.value(*var) + offset),
        }
    }
}

/// One record with placeholder cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTemplate {
    fields: Vec<(u16, Cell)>,
}

impl RecordTemplate {
    /// Parse a `;`-separated template block.
    pub fn parse_block(block: &str) -> Result<Vec<RecordTemplate>, ThemeError> {
        parse_records(block)?
            .into_iter()
            .map(|rec| {
                let fields = rec
                    .fields()
                    .iter()
                    .map(|(key, value)| Ok((*key, Cell::parse(&value.to_string())?)))
                    .collect::<Result<Vec<_>, ThemeError>>()?;
                Ok(RecordTemplate { fields })
            })
            .collect()
    }

    pub fn render(&self, ctx: &TemplateContext) -> PlacementRecord {
        PlacementRecord::from_fields(
            self.fields
                .iter()
                .map(|(key, cell)| (*key, cell.render(ctx)))
                .collect(),
        )
    }
}

// ── Commands and predicates ─────────────────────────────────────────────

/// What a winning rule does.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Take over a structural category for the rest of the pass.
    Override(OverrideCategory),
    /// Emit records with the current segment's values substituted.
    Records(Vec<RecordTemplate>),
}

impl Command {
    pub fn parse(raw: &str) -> Result<Self, ThemeError> {
        let trimmed = raw.trim();
        let category = trimmed
            .strip_prefix("override:")
            .or_else(|| trimmed.strip_prefix("override-"));
        match category {
            Some(name) => OverrideCategory::from_name(name)
                .map(Command::Override)
                .ok_or_else(|| ThemeError::UnknownOverride(name.to_string())),
            None => Ok(Command::Records(RecordTemplate::parse_block(trimmed)?)),
        }
    }
}

/// One condition of a rule. A rule matches when all of its predicates hold.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPredicate {
    /// The window ends with these codes.
    Suffix(Vec<OrientationCode>),
    /// The window does not end with these codes.
    NotSuffix(Vec<OrientationCode>),
    /// `index mod period == residue`.
    Residue { period: u64, residue: u64 },
    /// `index mod period` is none of `residues`.
    NotResidue { period: u64, residues: Vec<u64> },
}

impl MatchPredicate {
    pub fn holds(&self, window: &Window, position: Position) -> bool {
        let index = position.index as u64;
        match self {
            MatchPredicate::Suffix(codes) => window.ends_with(codes),
            MatchPredicate::NotSuffix(codes) => !window.ends_with(codes),
            // A zero period constrains nothing.
            MatchPredicate::Residue { period, residue } => {
                index.checked_rem(*period).map_or(true, |r| r == *residue)
            }
            MatchPredicate::NotResidue { period, residues } => index
                .checked_rem(*period)
                .map_or(true, |r| !residues.contains(&r)),
        }
    }
}

/// Where the engine is evaluating: segment index and its x coordinate.
///
/// Rule offsets work on `index`; repeating patterns work on `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub x: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRule {
    pub predicates: Vec<MatchPredicate>,
    pub commands: Vec<Command>,
    pub is_else: bool,
}

impl ThemeRule {
    pub fn matches(&self, window: &Window, position: Position) -> bool {
        self.predicates.iter().all(|p| p.holds(window, position))
    }
}

/// A literal block injected every `repeat` units of x starting at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingPattern {
    pub id: i64,
    pub records: Vec<PlacementRecord>,
    pub start: i64,
    pub repeat: i64,
}

impl RepeatingPattern {
    pub fn fires_at(&self, x: i32) -> bool {
        let x = x as i64;
        x >= self.start && (x - self.start).checked_rem(self.repeat) == Some(0)
    }
}

// ── Theme files ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeMetadata {
    pub name: String,
    pub author: String,
    pub version: String,
    pub pack: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawColor {
    slot: u32,
    hex: String,
    #[serde(default)]
    blending: bool,
    #[serde(default = "default_opacity")]
    opacity: f64,
    #[serde(default)]
    copy_color: Option<u32>,
    #[serde(default)]
    special: String,
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(default)]
    pattern: Vec<OrientationCode>,
    #[serde(default)]
    not_patterns: Vec<Vec<OrientationCode>>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    not_offsets: Vec<i64>,
    #[serde(default = "default_period")]
    period: i64,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default, rename = "else")]
    is_else: bool,
}

fn default_period() -> i64 {
    2
}

#[derive(Debug, Clone, Deserialize)]
struct RawPattern {
    id: i64,
    data: String,
    #[serde(default = "default_start")]
    start: i64,
    #[serde(default = "default_repeat")]
    repeat: i64,
}

fn default_start() -> i64 {
    195
}

fn default_repeat() -> i64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawTheme {
    metadata: ThemeMetadata,
    colors: Vec<RawColor>,
    rules: Vec<RawRule>,
    patterns: Vec<RawPattern>,
}

/// Rejected theme definition.
#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule {rule} has an empty pattern")]
    EmptyPattern { rule: usize },
    #[error("rule {rule} has a pattern of {len} codes, longer than the window ({max})", max = WINDOW_LEN)]
    PatternTooLong { rule: usize, len: usize },
    #[error("rule {rule} has an empty not-pattern")]
    EmptyNotPattern { rule: usize },
    #[error("rule {rule} has non-positive period {period}")]
    NonPositivePeriod { rule: usize, period: i64 },
    #[error("rule {rule} offset {offset} is outside 0..{period}")]
    OffsetOutOfRange { rule: usize, offset: i64, period: i64 },
    #[error("rules {first} and {second} are both else rules")]
    MultipleElseRules { first: usize, second: usize },
    #[error("pattern {id} has non-positive repeat {repeat}")]
    NonPositiveRepeat { id: i64, repeat: i64 },
    #[error("pattern {id} has negative start {start}")]
    NegativeStart { id: i64, start: i64 },
    #[error("bad placeholder `{0}`")]
    BadPlaceholder(String),
    #[error("unknown override category `{0}`")]
    UnknownOverride(String),
    #[error(transparent)]
    Record(#[from] RecordParseError),
    #[error("colour slot {slot}: {source}")]
    Color {
        slot: u32,
        #[source]
        source: HexColorError,
    },
}

/// A validated rule table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Theme {
    pub metadata: ThemeMetadata,
    pub colors: Vec<ColorChannel>,
    pub rules: Vec<ThemeRule>,
    pub patterns: Vec<RepeatingPattern>,
}

impl Theme {
    /// A theme with no rules: every category keeps its default emission.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ThemeError> {
        let raw: RawTheme = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTheme) -> Result<Self, ThemeError> {
        let colors = raw
            .colors
            .into_iter()
            .map(|c| {
                let rgb = hex_to_color(&c.hex).map_err(|source| ThemeError::Color {
                    slot: c.slot,
                    source,
                })?;
                Ok(ColorChannel {
                    blending: c.blending,
                    opacity: c.opacity,
                    copy_color: c.copy_color,
                    special: c.special,
                    ..ColorChannel::new(c.slot, rgb)
                })
            })
            .collect::<Result<Vec<_>, ThemeError>>()?;

        let mut rules = Vec::with_capacity(raw.rules.len());
        let mut else_rule: Option<usize> = None;
        for (i, rule) in raw.rules.into_iter().enumerate() {
            if rule.is_else {
                if let Some(first) = else_rule {
                    return Err(ThemeError::MultipleElseRules { first, second: i });
                }
                else_rule = Some(i);
            }
            rules.push(compile_rule(i, rule)?);
        }

        let patterns = raw
            .patterns
            .into_iter()
            .map(|p| {
                if p.repeat <= 0 {
                    return Err(ThemeError::NonPositiveRepeat {
                        id: p.id,
                        repeat: p.repeat,
                    });
                }
                if p.start < 0 {
                    return Err(ThemeError::NegativeStart {
                        id: p.id,
                        start: p.start,
                    });
                }
                Ok(RepeatingPattern {
                    id: p.id,
                    records: parse_records(&p.data)?,
                    start: p.start,
                    repeat: p.repeat,
                })
            })
            .collect::<Result<Vec<_>, ThemeError>>()?;

        Ok(Self {
            metadata: raw.metadata,
            colors,
            rules,
            patterns,
        })
    }
}

fn compile_rule(index: usize, raw: RawRule) -> Result<ThemeRule, ThemeError> {
    if raw.pattern.is_empty() {
        return Err(ThemeError::EmptyPattern { rule: index });
    }
    if raw.pattern.len() > WINDOW_LEN {
        return Err(ThemeError::PatternTooLong {
            rule: index,
            len: raw.pattern.len(),
        });
    }
    if raw.period <= 0 {
        return Err(ThemeError::NonPositivePeriod {
            rule: index,
            period: raw.period,
        });
    }
    let period = raw.period as u64;

    let mut predicates = vec![MatchPredicate::Suffix(raw.pattern)];
    for not in raw.not_patterns {
        if not.is_empty() {
            return Err(ThemeError::EmptyNotPattern { rule: index });
        }
        predicates.push(MatchPredicate::NotSuffix(not));
    }
    if let Some(offset) = raw.offset {
        if !(0..raw.period).contains(&offset) {
            return Err(ThemeError::OffsetOutOfRange {
                rule: index,
                offset,
                period: raw.period,
            });
        }
        predicates.push(MatchPredicate::Residue {
            period,
            residue: offset as u64,
        });
    }
    if !raw.not_offsets.is_empty() {
        let residues = raw
            .not_offsets
            .iter()
            .map(|o| o.rem_euclid(raw.period) as u64)
            .collect();
        predicates.push(MatchPredicate::NotResidue { period, residues });
    }

    let commands = raw
        .commands
        .iter()
        .map(|c| Command::parse(c))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ThemeRule {
        predicates,
        commands,
        is_else: raw.is_else,
    })
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Result of evaluating the theme at one position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Index of the rule that fired, if any.
    pub rule: Option<usize>,
    /// Rendered rule records followed by injected pattern records.
    pub records: Vec<PlacementRecord>,
    /// Categories the winning rule takes over.
    pub overrides: Vec<OverrideCategory>,
}

impl Evaluation {
    pub fn apply(&self, flags: &mut OverrideFlags) {
        for category in &self.overrides {
            flags.set(*category);
        }
    }
}

/// Evaluates a [`Theme`] against the window at each segment.
pub struct ThemeRuleEngine<'a> {
    theme: &'a Theme,
}

impl<'a> ThemeRuleEngine<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }

    /// Pick the winning rule, render its commands, and append every
    /// repeating pattern that fires at `position.x`.
    pub fn evaluate(
        &self,
        window: &Window,
        position: Position,
        ctx: &TemplateContext,
    ) -> Evaluation {
        let mut eval = Evaluation {
            rule: self.select(window, position),
            ..Default::default()
        };

        if let Some(index) = eval.rule {
            for command in &self.theme.rules[index].commands {
                match command {
                    Command::Override(category) => eval.overrides.push(*category),
                    Command::Records(templates) => eval
                        .records
                        .extend(templates.iter().map(|t| t.render(ctx))),
                }
            }
            log::debug!(
                "segment {} (x={}): rule {} fired, {} records",
                position.index,
                position.x,
                index,
                eval.records.len()
            );
        }

        for pattern in &self.theme.patterns {
            if pattern.fires_at(position.x) {
                log::debug!("pattern {} injected at x={}", pattern.id, position.x);
                eval.records.extend(pattern.records.iter().cloned());
            }
        }

        eval
    }

    fn select(&self, window: &Window, position: Position) -> Option<usize> {
        let rules = &self.theme.rules;
        rules
            .iter()
            .position(|r| !r.is_else && r.matches(window, position))
            .or_else(|| {
                rules
                    .iter()
                    .position(|r| r.is_else && r.matches(window, position))
            })
    }
}
