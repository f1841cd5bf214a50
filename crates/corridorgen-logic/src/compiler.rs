//! Geometry compiler: biome segments → structural placement records.
//!
//! The theme is evaluated over every segment first, so a `Base` override
//! from any rule can suppress the start block. Then one deterministic pass
//! applies each segment's overrides and emits its default structure for
//! every category that is not overridden.
//!
//! # Emission order
//!
//! 1. Starting base block and connectors (unless `Base` is overridden anywhere)
//! 2. Starting speed trigger
//! 3. Per segment: slopes, corners, portal, speed trigger, spike, fuzz
//! 4. Ending connectors (unless the matching `EndUp`/`EndDown` is overridden)
//! 5. Meter marks, low-visibility overlay, upside-down start portal
//!
//! Preconditions (checked by [`crate::level::validate_biome`], not here):
//! `corridor_height > 0` and `min_height <= max_height`. Violating them
//! yields degenerate geometry, never a panic.

use serde::Serialize;

use crate::constants::{
    channels, fields, groups, objects, GRID, MAX_LENGTH, PORTAL_SQRT_2, REFERENCE_CORRIDOR_HEIGHT,
};
use crate::level::{Biome, ColorMode, PortalKind, Segment, SpeedChange, Swing, Visibility, WaveSize};
use crate::orientation::{classify, OrientationTracker};
use crate::record::{encode_text, PlacementRecord};
use crate::settings::GeneratorSettings;
use crate::theme::{
    Evaluation, OverrideCategory, OverrideFlags, Position, TemplateContext, Theme, ThemeRuleEngine,
};

/// Output of compiling one biome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledBiome {
    /// Default structure, in emission order.
    pub structure: Vec<PlacementRecord>,
    /// Records emitted by theme rules and repeating patterns.
    pub theme: Vec<PlacementRecord>,
    /// Override flags as they stood at the end of the pass.
    pub flags: OverrideFlags,
}

/// Compile `biome` with `theme` evaluated at every segment.
///
/// `flags` are the overrides in force before the first segment; rules can
/// only add to them. A flag set at segment `i` suppresses its category from
/// segment `i` to the end of the pass, except `Base`: the start block sits
/// before every segment, so a rule setting `Base` anywhere suppresses it.
pub fn compile(
    biome: &Biome,
    settings: &GeneratorSettings,
    theme: &Theme,
    flags: OverrideFlags,
) -> CompiledBiome {
    let mut out = CompiledBiome {
        flags,
        ..Default::default()
    };
    if biome.segments.is_empty() {
        return out;
    }

    let geometry = GeometryCompiler::new(biome, settings);
    let evaluations = evaluate_theme(biome, theme, &geometry);

    if evaluations
        .iter()
        .any(|e| e.overrides.contains(&OverrideCategory::Base))
    {
        out.flags.set(OverrideCategory::Base);
    }
    geometry.emit_start(&out.flags, &mut out.structure);

    for (index, eval) in evaluations.into_iter().enumerate() {
        eval.apply(&mut out.flags);
        out.theme.extend(eval.records);
        geometry.emit_segment(index, &out.flags, &mut out.structure);
    }

    geometry.emit_ending(&out.flags, &mut out.structure);
    geometry.emit_meter_marks(&mut out.structure);
    geometry.emit_overlays(&mut out.structure);

    out
}

/// Run the theme over every segment. Theme results depend only on the
/// orientation window and position, never on emitted structure.
fn evaluate_theme(biome: &Biome, theme: &Theme, geometry: &GeometryCompiler<'_>) -> Vec<Evaluation> {
    let engine = ThemeRuleEngine::new(theme);
    let mut tracker = OrientationTracker::new();
    let count = biome.segments.len();
    biome
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let window = tracker.advance(classify(segment, index, count));
            engine.evaluate(
                window,
                Position {
                    index,
                    x: segment.x,
                },
                &geometry.template_context(segment),
            )
        })
        .collect()
}

/// Per-biome geometry rules. Holds no mutable state; every method appends
/// the records for one part of the corridor.
pub struct GeometryCompiler<'a> {
    biome: &'a Biome,
    settings: &'a GeneratorSettings,
    corridor_height: i32,
}

impl<'a> GeometryCompiler<'a> {
    pub fn new(biome: &'a Biome, settings: &'a GeneratorSettings) -> Self {
        Self {
            biome,
            settings,
            corridor_height: biome.options.corridor_height,
        }
    }

    pub fn template_context(&self, segment: &Segment) -> TemplateContext {
        TemplateContext {
            x: segment.x,
            y: segment.y,
            max_height: self.biome.options.max_height,
            min_height: self.biome.options.min_height,
            corridor_height: self.corridor_height,
        }
    }

    // ── Start ───────────────────────────────────────────────────────────

    /// Base block, starting connectors and the starting speed trigger.
    pub fn emit_start(&self, flags: &OverrideFlags, out: &mut Vec<PlacementRecord>) {
        if !flags.is_set(OverrideCategory::Base) {
            out.extend(base_block());
            out.extend(starting_connectors(self.corridor_height));
        }
        out.push(
            PlacementRecord::new(self.biome.options.starting_speed.object_id())
                .at(255, 165)
                .field(fields::TOUCH_TRIGGERED, 1)
                .fixed_flags(),
        );
    }

    // ── Segments ────────────────────────────────────────────────────────

    /// All structure for segment `index`.
    pub fn emit_segment(&self, index: usize, flags: &OverrideFlags, out: &mut Vec<PlacementRecord>) {
        let segment = &self.biome.segments[index];
        let previous = index
            .checked_sub(1)
            .map(|i| self.biome.segments[i].swing);

        if !flags.is_set(OverrideCategory::Slope) {
            self.slopes(segment, out);
            if index > 1 && self.settings.corner_pieces {
                if let Some(prev) = previous {
                    self.corners(segment, prev, out);
                }
            }
        }

        if !flags.is_set(OverrideCategory::Portal) {
            match segment.options.portal {
                PortalKind::Gravity => out.push(self.gravity_portal(segment, previous)),
                PortalKind::Fake => out.push(self.fake_portal(segment)),
                PortalKind::None => {}
            }
        }

        if segment.options.speed_change != SpeedChange::None
            && !flags.is_set(OverrideCategory::Speed)
        {
            out.push(self.speed_trigger(segment));
        }

        if segment.options.spike && !flags.is_set(OverrideCategory::Spike) {
            out.push(spike(segment, self.corridor_height));
        }

        if segment.options.fuzzy && !flags.is_set(OverrideCategory::Fuzz) {
            self.fuzz(segment, out);
        }
    }

    fn slopes(&self, seg: &Segment, out: &mut Vec<PlacementRecord>) {
        let up = seg.swing.is_up();
        let ch = self.corridor_height;
        match self.biome.options.starting_size {
            WaveSize::Mini => {
                let flip = i32::from(up);
                out.push(
                    PlacementRecord::new(objects::MINI_SLOPE)
                        .at(seg.x, seg.y - 15)
                        .rotation(90)
                        .field(fields::FLIP_X, flip)
                        .fixed_flags(),
                );
                out.push(
                    PlacementRecord::new(objects::MINI_SLOPE)
                        .at(seg.x, seg.y + 15 + ch)
                        .rotation(-90)
                        .field(fields::FLIP_X, flip)
                        .fixed_flags(),
                );
            }
            WaveSize::Normal => {
                out.push(
                    PlacementRecord::new(objects::SLOPE)
                        .at(seg.x, seg.y)
                        .rotation(if up { 0 } else { 90 })
                        .fixed_flags(),
                );
                out.push(
                    PlacementRecord::new(objects::SLOPE)
                        .at(seg.x, seg.y + ch)
                        .rotation(if up { 180 } else { 270 })
                        .fixed_flags(),
                );
            }
        }
    }

    /// Rounded corner pair where the swing reverses.
    fn corners(&self, seg: &Segment, previous: Swing, out: &mut Vec<PlacementRecord>) {
        match (previous, seg.swing) {
            (Swing::Up, Swing::Down) => {
                let y = seg.y + self.corridor_height + GRID;
                out.push(
                    PlacementRecord::new(objects::CORNER)
                        .at(seg.x - GRID, y)
                        .rotation(-180),
                );
                out.push(
                    PlacementRecord::new(objects::CORNER)
                        .at(seg.x, y)
                        .rotation(-90)
                        .fixed_flags(),
                );
            }
            (Swing::Down, Swing::Up) => {
                let y = seg.y - GRID;
                out.push(
                    PlacementRecord::new(objects::CORNER)
                        .at(seg.x - GRID, y)
                        .rotation(90),
                );
                out.push(PlacementRecord::new(objects::CORNER).at(seg.x, y).fixed_flags());
            }
            _ => {}
        }
    }

    /// A gravity portal. When the swing continues in the same direction as
    /// the previous segment the portal faces the other way and shifts one
    /// cell along that direction.
    fn gravity_portal(&self, seg: &Segment, previous: Option<Swing>) -> PlacementRecord {
        let id = if seg.options.gravity {
            objects::GRAVITY_UP_PORTAL
        } else {
            objects::GRAVITY_DOWN_PORTAL
        };
        let mut orientation = seg.swing.sign();
        let mut shift = 0;
        if previous == Some(seg.swing) {
            orientation = -orientation;
            shift = GRID * orientation;
        }
        self.portal(seg, id, orientation, shift)
    }

    /// A decoy portal: inverted id mapping, no continuation shift.
    fn fake_portal(&self, seg: &Segment) -> PlacementRecord {
        let id = if seg.options.gravity {
            objects::GRAVITY_DOWN_PORTAL
        } else {
            objects::GRAVITY_UP_PORTAL
        };
        self.portal(seg, id, seg.swing.sign(), 0)
    }

    fn portal(&self, seg: &Segment, id: u32, orientation: i32, shift: i32) -> PlacementRecord {
        let ch = self.corridor_height;
        let factor = (f64::from(ch) / REFERENCE_CORRIDOR_HEIGHT) * PORTAL_SQRT_2;
        let normal = ch / 10;
        let pos = ch / 4;
        let y_offset = if orientation == 1 {
            normal + pos - 15
        } else {
            ch + 15 - normal - pos
        };
        PlacementRecord::new(id)
            .at(seg.x - 15 - normal + pos, seg.y + shift + y_offset)
            .rotation(if orientation == 1 { 45 } else { -45 })
            .scale(factor / 2.5)
            .fixed_flags()
    }

    fn speed_trigger(&self, seg: &Segment) -> PlacementRecord {
        let ch = self.corridor_height;
        let up = seg.swing.is_up();
        let y = seg.y + ch / 2 + 15 * if up { -1 } else { 1 };
        PlacementRecord::new(seg.options.speed_change.object_id())
            .at(seg.x - 15, y)
            .rotation(if up { -45 } else { 45 })
            .scale(0.5 * (f64::from(ch) / REFERENCE_CORRIDOR_HEIGHT))
            .fixed_flags()
            .z_layer(1)
    }

    fn fuzz(&self, seg: &Segment, out: &mut Vec<PlacementRecord>) {
        let up = seg.swing.is_up();
        let night = self.biome.options.color_mode == ColorMode::Night;
        let piece = |y: i32, rotation: i32| {
            let mut rec = PlacementRecord::new(objects::FUZZ).at(seg.x, y);
            if night {
                rec = rec
                    .field(fields::COLOR_CHANNEL, channels::NIGHT_FUZZ)
                    .field(fields::HSV_ENABLED, 1)
                    .field(fields::HSV, "0a1a0.60a0a0");
            }
            rec.rotation(rotation).fixed_flags().z_layer(7)
        };
        out.push(piece(seg.y, if up { 0 } else { 90 }));
        out.push(piece(seg.y + self.corridor_height, if up { 180 } else { 270 }));
    }

    // ── End ─────────────────────────────────────────────────────────────

    /// Diagonal connectors from the last segment out to the height bounds.
    pub fn emit_ending(&self, flags: &OverrideFlags, out: &mut Vec<PlacementRecord>) {
        let Some(last) = self.biome.segments.last() else {
            return;
        };
        let suppressed = match last.swing {
            Swing::Up => flags.is_set(OverrideCategory::EndUp),
            Swing::Down => flags.is_set(OverrideCategory::EndDown),
            Swing::Neutral => true,
        };
        if suppressed {
            return;
        }

        let ch = self.corridor_height;
        let opts = &self.biome.options;
        let (mut x_top, mut x_bottom) = (last.x, last.x);
        let (mut y_top, mut y_bottom) = (last.y + ch, last.y);
        if last.swing == Swing::Up {
            y_bottom += GRID;
        } else {
            y_top -= GRID;
        }

        while y_top <= opts.max_height + ch + GRID {
            x_top += GRID;
            y_top += GRID;
            out.push(
                PlacementRecord::new(objects::SLOPE)
                    .at(x_top, y_top)
                    .rotation(180)
                    .fixed_flags(),
            );
        }
        while y_bottom >= opts.min_height {
            x_bottom += GRID;
            y_bottom -= GRID;
            out.push(
                PlacementRecord::new(objects::SLOPE)
                    .at(x_bottom, y_bottom)
                    .rotation(90)
                    .fixed_flags(),
            );
        }
    }

    /// Distance markers: a stack of ticks and a text label every
    /// `marker_interval` cells.
    pub fn emit_meter_marks(&self, out: &mut Vec<PlacementRecord>) {
        if !self.settings.marks_enabled() {
            return;
        }
        let interval = self.settings.marker_interval;
        let grid = i64::from(GRID);
        let length = self.biome.options.length.min(MAX_LENGTH);
        for step in 1..=(length / interval) {
            let meters = interval * step;
            let mut height = 15.5;
            for _ in 0..10 {
                out.push(
                    PlacementRecord::new(objects::METER_TICK)
                        .at(345 + meters * grid, height)
                        .field(fields::EDITOR_LAYER, 1)
                        .field(fields::GROUP, groups::MARKERS)
                        .rotation(-90)
                        .fixed_flags()
                        .field(fields::COLOR_CHANNEL, channels::MARKER)
                        .z_layer(12)
                        .field(fields::Z_LAYER_OFFSET, 1)
                        .field(fields::Z_ORDER, 11),
                );
                height += 30.0;
            }
            out.push(
                PlacementRecord::new(objects::TEXT_LABEL)
                    .at(375 + meters * grid, 21)
                    .field(fields::EDITOR_LAYER, 1)
                    .field(fields::GROUP, groups::MARKERS)
                    .scale(0.62)
                    .field(fields::COLOR_CHANNEL, channels::MARKER)
                    .field(fields::TEXT, encode_text(&format!("{meters}m")))
                    .z_layer(12)
                    .field(fields::Z_LAYER_OFFSET, 1)
                    .fixed_flags()
                    .field(fields::Z_ORDER, 11),
            );
        }
    }

    /// Low-visibility haze and the inverted-gravity start portal.
    pub fn emit_overlays(&self, out: &mut Vec<PlacementRecord>) {
        let opts = &self.biome.options;
        if opts.visibility == Visibility::Low {
            out.push(
                PlacementRecord::new(objects::ALPHA_TRIGGER)
                    .at(285, 255)
                    .field(fields::TARGET_GROUP, groups::HAZE)
                    .field(fields::OPACITY, 0.55)
                    .field(fields::DURATION, 0)
                    .fixed_flags(),
            );
        }
        if opts.starting_gravity {
            out.push(
                PlacementRecord::new(objects::GRAVITY_UP_PORTAL)
                    .at(299, 99)
                    .rotation(45)
                    .scale(0.57),
            );
        }
    }
}

/// Floor row and the column under the corridor entrance.
fn base_block() -> Vec<PlacementRecord> {
    let floor = (15..=405).step_by(GRID as usize).map(|x| (x, 15));
    let column = (45..=165).step_by(GRID as usize).map(|y| (435, y));
    floor
        .chain(std::iter::once((435, 15)))
        .chain(column)
        .map(|(x, y)| {
            PlacementRecord::new(objects::SOLID_BLOCK)
                .at(x, y)
                .fixed_flags()
        })
        .collect()
}

/// Ceiling column above the entrance, raised by the corridor height.
fn starting_connectors(corridor_height: i32) -> Vec<PlacementRecord> {
    [165, 195, 225, 255, 285]
        .into_iter()
        .map(|y| {
            PlacementRecord::new(objects::SOLID_BLOCK)
                .at(435, y + corridor_height)
                .fixed_flags()
        })
        .collect()
}

fn spike(seg: &Segment, corridor_height: i32) -> PlacementRecord {
    let side = seg.options.spike_side;
    let x = if side { seg.x - 6 } else { seg.x + 6 };
    let (y, rotation) = match (seg.swing, side) {
        (Swing::Up, false) => (seg.y + corridor_height - 6, 135),
        (Swing::Up, true) => (seg.y + 6, -45),
        (Swing::Down, true) => (seg.y + corridor_height - 6, -135),
        _ => (seg.y + 6, 45),
    };
    PlacementRecord::new(objects::SPIKE)
        .at(x, y)
        .rotation(rotation)
        .fixed_flags()
}
