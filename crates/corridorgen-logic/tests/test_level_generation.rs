//! Integration tests for the full level generation pipeline.
//!
//! Exercises: LevelData → orientation window → theme rules → geometry
//! → serialized level string.
//!
//! All tests are pure logic: no files, no packaging.

use corridorgen_logic::compiler::compile;
use corridorgen_logic::constants::{fields, WINDOW_LEN};
use corridorgen_logic::header::LevelHeader;
use corridorgen_logic::level::{
    validate_biome, Biome, BiomeOptions, LevelData, PortalKind, Segment, SpeedChange, Swing,
};
use corridorgen_logic::orientation::{classify, OrientationCode, OrientationTracker};
use corridorgen_logic::pipeline::{generate_level, LevelOutput};
use corridorgen_logic::record::{encode_text, PlacementRecord};
use corridorgen_logic::settings::GeneratorSettings;
use corridorgen_logic::theme::{OverrideFlags, Theme};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ────────────────────────────────────────────────────────────

/// A plausible sampled biome: a random walk between the height bounds
/// with sprinkled features.
fn random_biome(seed: u64, len: usize) -> Biome {
    let mut rng = StdRng::seed_from_u64(seed);
    let options = BiomeOptions {
        corridor_height: [60, 90, 120][rng.gen_range(0..3)],
        length: rng.gen_range(0..500),
        starting_gravity: rng.gen_bool(0.2),
        ..Default::default()
    };
    let mut y = 195;
    let mut segments = Vec::with_capacity(len);
    for i in 0..len {
        let swing = if y >= options.max_height {
            Swing::Down
        } else if y <= options.min_height {
            Swing::Up
        } else if rng.gen_bool(0.5) {
            Swing::Up
        } else {
            Swing::Down
        };
        let mut seg = Segment::new(465 + 30 * i as i32, y, swing);
        match rng.gen_range(0..10) {
            0 => seg.options.portal = PortalKind::Gravity,
            1 => seg.options.portal = PortalKind::Fake,
            2 => seg.options.speed_change = SpeedChange::Double,
            3 => {
                seg.options.spike = true;
                seg.options.spike_side = rng.gen_bool(0.5);
            }
            4 => seg.options.fuzzy = true,
            _ => {}
        }
        seg.options.gravity = rng.gen_bool(0.5);
        segments.push(seg);
        y += 30 * swing.sign();
    }
    Biome::new(options, segments)
}

fn straight_biome(swings: &[Swing]) -> Biome {
    let mut y = 195;
    let segments = swings
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let seg = Segment::new(465 + 30 * i as i32, y, *s);
            y += 30 * s.sign();
            seg
        })
        .collect();
    Biome::new(BiomeOptions::default(), segments)
}

fn level_of(biome: Biome) -> LevelData {
    LevelData {
        seed: 42,
        song: 0,
        biomes: vec![biome],
    }
}

fn quiet_settings() -> GeneratorSettings {
    GeneratorSettings {
        meter_marks: false,
        ..Default::default()
    }
}

fn run(level: &LevelData, theme: &Theme, flags: OverrideFlags) -> LevelOutput {
    generate_level(
        level,
        theme,
        &quiet_settings(),
        &LevelHeader::default(),
        flags,
    )
}

fn rotation(rec: &PlacementRecord) -> Option<String> {
    rec.get_text(fields::ROTATION)
}

// ── Determinism ────────────────────────────────────────────────────────

#[test]
fn deterministic_output() {
    let theme = Theme::from_json(
        r#"{"rules": [
            {"pattern": ["slope", "slope"], "commands": ["1,1,2,{x},3,{y-30};"]},
            {"pattern": ["portal"], "commands": ["override:spike"]}
        ],
        "patterns": [{"id": 1, "data": "1,1007,2,195,3,15;"}]}"#,
    )
    .unwrap();
    for seed in 0..20 {
        let level = level_of(random_biome(seed, 60));
        let a = run(&level, &theme, OverrideFlags::default()).to_level_string();
        let b = run(&level, &theme, OverrideFlags::default()).to_level_string();
        assert_eq!(a, b, "seed {seed} produced different output");
    }
}

#[test]
fn random_biomes_are_valid_and_nonempty() {
    for seed in 0..20 {
        let biome = random_biome(seed, 40);
        assert!(validate_biome(&biome).is_empty());
        let out = run(&level_of(biome), &Theme::empty(), OverrideFlags::default());
        assert!(!out.is_empty());
        assert!(out.to_level_string().ends_with(';'));
    }
}

#[test]
fn segment_order_preserved() {
    let biome = random_biome(3, 30);
    let out = compile(
        &biome,
        &quiet_settings(),
        &Theme::empty(),
        OverrideFlags::default(),
    );
    let floor_xs: Vec<i64> = out
        .structure
        .iter()
        .filter(|r| r.object_id() == Some(1338))
        .filter(|r| matches!(rotation(r).as_deref(), Some("0") | Some("90")))
        .filter_map(|r| r.get_text(fields::X)?.parse().ok())
        .take(biome.segments.len())
        .collect();
    let mut sorted = floor_xs.clone();
    sorted.sort();
    assert_eq!(floor_xs, sorted);
}

// ── Orientation window ─────────────────────────────────────────────────

#[test]
fn window_tail_tracks_each_segment() {
    let biome = random_biome(11, 25);
    let count = biome.segments.len();
    let mut tracker = OrientationTracker::new();
    for (p, seg) in biome.segments.iter().enumerate() {
        let code = classify(seg, p, count);
        let window = tracker.advance(code);
        assert_eq!(window.len(), WINDOW_LEN);
        assert_eq!(window.last(), code);

        let padding = WINDOW_LEN.saturating_sub(p + 1);
        assert!(window
            .iter()
            .take(padding)
            .all(|c| c == OrientationCode::None));
    }
}

// ── Theme rules ────────────────────────────────────────────────────────

#[test]
fn specific_rule_beats_fallback() {
    let theme = Theme::from_json(
        r#"{"rules": [
            {"pattern": ["slope"], "else": true, "commands": ["1,2,2,{x},3,0;"]},
            {"pattern": ["slope", "slope"], "commands": ["1,1,2,{x},3,0;"]}
        ]}"#,
    )
    .unwrap();
    let biome = straight_biome(&[Swing::Up, Swing::Up, Swing::Up, Swing::Down, Swing::Down]);
    let out = run(&level_of(biome), &theme, OverrideFlags::default());

    // index 1 is Slope after Base: fallback; index 2 ends [Slope, Slope]: specific
    let theme_text: Vec<String> = out.compiled.theme.iter().map(|r| r.to_string()).collect();
    assert_eq!(theme_text, vec!["1,2,2,495,3,0;", "1,1,2,525,3,0;", "1,1,2,555,3,0;"]);
}

#[test]
fn repeating_pattern_injection_points() {
    let theme = Theme::from_json(
        r#"{"patterns": [{"id": 9, "data": "1,1007,2,195,3,15;", "start": 195, "repeat": 300}]}"#,
    )
    .unwrap();
    let segments = (0..40)
        .map(|i| Segment::new(15 + 30 * i, 195, Swing::Up))
        .collect();
    let biome = Biome::new(BiomeOptions::default(), segments);
    let out = run(&level_of(biome), &theme, OverrideFlags::default());

    // x = 195, 495, 795, 1095 within 15..=1185
    assert_eq!(out.compiled.theme.len(), 4);
    assert!(out
        .compiled
        .theme
        .iter()
        .all(|r| r.to_string() == "1,1007,2,195,3,15;"));
}

#[test]
fn patterns_ignore_overrides() {
    let theme = Theme::from_json(
        r#"{"rules": [{"pattern": ["base"], "commands": ["override:slope", "override:base"]}],
            "patterns": [{"id": 1, "data": "1,5,2,0,3,0;", "start": 465, "repeat": 30}]}"#,
    )
    .unwrap();
    let biome = straight_biome(&[Swing::Up; 6]);
    let out = run(&level_of(biome), &theme, OverrideFlags::default());
    assert_eq!(out.compiled.theme.len(), 6);
}

// ── Overrides ──────────────────────────────────────────────────────────

#[test]
fn end_up_override_removes_ending_connectors() {
    let biome = straight_biome(&[Swing::Down, Swing::Up, Swing::Up]);
    let last_x = i64::from(biome.segments[2].x);
    let level = level_of(biome);

    let past_end = |out: &LevelOutput| {
        out.compiled
            .structure
            .iter()
            .filter(|r| r.object_id() == Some(1338))
            .filter(|r| {
                r.get_text(fields::X)
                    .and_then(|x| x.parse::<i64>().ok())
                    .is_some_and(|x| x > last_x)
            })
            .count()
    };

    let plain = run(&level, &Theme::empty(), OverrideFlags::default());
    assert!(past_end(&plain) > 0);

    let overridden = run(
        &level,
        &Theme::empty(),
        OverrideFlags {
            end_up: true,
            ..Default::default()
        },
    );
    assert_eq!(past_end(&overridden), 0);
    assert!(overridden.compiled.flags.end_up);
}

#[test]
fn theme_can_take_over_ending() {
    let theme = Theme::from_json(
        r#"{"rules": [{"pattern": ["enddown"], "commands": ["override:enddown", "1,1,2,{x+30},3,{min_height};"]}]}"#,
    )
    .unwrap();
    let biome = straight_biome(&[Swing::Up, Swing::Down, Swing::Down]);
    let out = run(&level_of(biome), &theme, OverrideFlags::default());
    assert!(out.compiled.flags.end_down);
    assert_eq!(
        out.compiled.theme.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        vec!["1,1,2,555,3,45;"]
    );
    assert!(!out.compiled.structure.iter().any(|r| {
        r.get_text(fields::X)
            .and_then(|x| x.parse::<i64>().ok())
            .is_some_and(|x| x > 525)
    }));
}

// ── Geometry ───────────────────────────────────────────────────────────

#[test]
fn up_to_down_corner_pair() {
    let biome = straight_biome(&[Swing::Up, Swing::Up, Swing::Up, Swing::Down]);
    let seg = biome.segments[3].clone();
    let out = run(&level_of(biome), &Theme::empty(), OverrideFlags::default());

    let corners: Vec<&PlacementRecord> = out
        .compiled
        .structure
        .iter()
        .filter(|r| r.object_id() == Some(473))
        .collect();
    assert_eq!(corners.len(), 2);
    let y = (seg.y + 60 + 30).to_string();
    assert_eq!(corners[0].get_text(fields::X), Some((seg.x - 30).to_string()));
    assert_eq!(corners[0].get_text(fields::Y), Some(y.clone()));
    assert_eq!(rotation(corners[0]).as_deref(), Some("-180"));
    assert_eq!(corners[1].get_text(fields::X), Some(seg.x.to_string()));
    assert_eq!(corners[1].get_text(fields::Y), Some(y));
    assert_eq!(rotation(corners[1]).as_deref(), Some("-90"));
}

#[test]
fn corners_disabled_by_setting() {
    let biome = straight_biome(&[Swing::Up, Swing::Up, Swing::Up, Swing::Down]);
    let settings = GeneratorSettings {
        corner_pieces: false,
        meter_marks: false,
        ..Default::default()
    };
    let out = compile(&biome, &settings, &Theme::empty(), OverrideFlags::default());
    assert!(!out.structure.iter().any(|r| r.object_id() == Some(473)));
}

/// Steps the top chain takes from `y_top` to pass `bound`.
fn expected_steps(start: i32, bound: i32, rising: bool) -> usize {
    if rising {
        if start > bound {
            0
        } else {
            ((bound - start) / 30 + 1) as usize
        }
    } else if start < bound {
        0
    } else {
        ((start - bound) / 30 + 1) as usize
    }
}

#[test]
fn ending_telescopes_terminate() {
    for last_y in [45, 75, 105, 135, 165, 195, 225] {
        for swing in [Swing::Up, Swing::Down] {
            let mut biome = straight_biome(&[Swing::Up, swing]);
            biome.segments[1].y = last_y;
            biome.options.min_height = 45;
            biome.options.max_height = 225;
            biome.options.corridor_height = 60;

            let out = compile(
                &biome,
                &quiet_settings(),
                &Theme::empty(),
                OverrideFlags::default(),
            );
            let last_x = i64::from(biome.segments[1].x);
            let ending: Vec<&PlacementRecord> = out
                .structure
                .iter()
                .filter(|r| {
                    r.get_text(fields::X)
                        .and_then(|x| x.parse::<i64>().ok())
                        .is_some_and(|x| x > last_x)
                })
                .collect();

            let (y_top, y_bottom) = if swing == Swing::Up {
                (last_y + 60, last_y + 30)
            } else {
                (last_y + 30, last_y)
            };
            let top = expected_steps(y_top, 225 + 60 + 30, true);
            let bottom = expected_steps(y_bottom, 45, false);

            let tops = ending.iter().filter(|r| rotation(r).as_deref() == Some("180")).count();
            let bottoms = ending.iter().filter(|r| rotation(r).as_deref() == Some("90")).count();
            assert_eq!(tops, top, "top chain for y={last_y} {swing:?}");
            assert_eq!(bottoms, bottom, "bottom chain for y={last_y} {swing:?}");
            assert!(tops + bottoms <= 12);
        }
    }
}

#[test]
fn meter_marks_every_interval() {
    let mut biome = straight_biome(&[Swing::Up, Swing::Down]);
    biome.options.length = 350;
    let settings = GeneratorSettings {
        meter_marks: true,
        marker_interval: 100,
        ..Default::default()
    };
    let out = compile(&biome, &settings, &Theme::empty(), OverrideFlags::default());

    let ticks: Vec<&PlacementRecord> = out
        .structure
        .iter()
        .filter(|r| r.object_id() == Some(508))
        .collect();
    let labels: Vec<&PlacementRecord> = out
        .structure
        .iter()
        .filter(|r| r.object_id() == Some(914))
        .collect();
    assert_eq!(ticks.len(), 30);
    assert_eq!(labels.len(), 3);

    for (i, meters) in [100, 200, 300].into_iter().enumerate() {
        let group = &ticks[i * 10..(i + 1) * 10];
        let dist = (345 + meters * 30).to_string();
        assert!(group.iter().all(|r| r.get_text(fields::X) == Some(dist.clone())));
        assert_eq!(
            labels[i].get_text(fields::TEXT),
            Some(encode_text(&format!("{meters}m")))
        );
        assert_eq!(
            labels[i].get_text(fields::X),
            Some((375 + meters * 30).to_string())
        );
    }
}

#[test]
fn starting_gravity_and_low_visibility_overlays() {
    let mut biome = straight_biome(&[Swing::Up, Swing::Down]);
    biome.options.starting_gravity = true;
    biome.options.visibility = corridorgen_logic::level::Visibility::Low;
    let text = run(&level_of(biome), &Theme::empty(), OverrideFlags::default()).to_level_string();
    assert!(text.ends_with("1,11,2,299,3,99,6,45,32,0.57;"));
    assert!(text.contains("1,1007,2,285,3,255,"));
}

#[test]
fn empty_input_is_empty_output() {
    let out = run(&LevelData::default(), &Theme::empty(), OverrideFlags::default());
    assert_eq!(out.to_level_string(), "");
    let out = run(
        &level_of(Biome::new(BiomeOptions::default(), vec![])),
        &Theme::empty(),
        OverrideFlags::default(),
    );
    assert_eq!(out.to_level_string(), "");
}
