//! Corridor Level Compiler
//!
//! Loads a sampled level, a theme and generator settings from JSON,
//! compiles the first biome and writes the level string. Runs entirely
//! in-process with no editor and no networking.
//!
//! Usage:
//!   corridorgen --level level.json
//!   corridorgen --level level.json --themes demos/themes --settings settings.json
//!   corridorgen --level level.json --theme caves.json --override base --out level.txt
//!   corridorgen -l level.json -v

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use corridorgen_logic::header::LevelHeader;
use corridorgen_logic::level::{validate_biome, LevelData};
use corridorgen_logic::pipeline::{generate_level, LevelOutput};
use corridorgen_logic::settings::{validate_settings, GeneratorSettings};
use corridorgen_logic::theme::{OverrideCategory, OverrideFlags, Theme};
use serde::de::DeserializeOwned;

// ── Arguments ───────────────────────────────────────────────────────────

/// Compile a sampled corridor level into a level string.
#[derive(Debug, Parser)]
#[command(name = "corridorgen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Sampled level JSON (seed, song, biomes).
    #[arg(short, long)]
    level: PathBuf,

    /// Theme JSON file to apply, ignoring the settings' active theme.
    #[arg(short, long, conflicts_with = "themes")]
    theme: Option<PathBuf>,

    /// Directory holding `<name>.json` themes for the active theme name.
    #[arg(long)]
    themes: Option<PathBuf>,

    /// Generator settings JSON.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Level header JSON (colour channels and settings).
    #[arg(long)]
    header: Option<PathBuf>,

    /// Output file for the level string (stdout if omitted).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Category overridden from the start. May be repeated.
    #[arg(long = "override", value_name = "CATEGORY", value_parser = parse_override)]
    overrides: Vec<OverrideCategory>,

    /// Print every check, not just failures.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_override(name: &str) -> Result<OverrideCategory, String> {
    OverrideCategory::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = OverrideCategory::ALL.iter().map(|c| c.name()).collect();
        format!("unknown category `{name}` (expected one of: {})", known.join(", "))
    })
}

// ── Loading ─────────────────────────────────────────────────────────────

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} file {}", path.display()))
}

fn load_theme_file(path: &Path) -> Result<Theme> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading theme file {}", path.display()))?;
    Theme::from_json(&text).with_context(|| format!("loading theme {}", path.display()))
}

/// An explicit `--theme` file wins; otherwise the active theme name is
/// looked up as `<themes dir>/<name>.json`.
fn resolve_theme(args: &Args, settings: &GeneratorSettings) -> Result<Theme> {
    if let Some(path) = &args.theme {
        return load_theme_file(path);
    }
    if !settings.has_theme() {
        return Ok(Theme::empty());
    }
    let dir = args.themes.as_deref().with_context(|| {
        format!(
            "active theme `{}` needs --themes <dir> to resolve",
            settings.active_theme
        )
    })?;
    load_theme_file(&dir.join(format!("{}.json", settings.active_theme.trim())))
}

// ── Check harness ───────────────────────────────────────────────────────

struct CheckResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let verbose = args.verbose;

    println!("=== Corridor Level Compiler ===\n");

    let results = match run(&args) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed,
        results.len(),
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<Vec<CheckResult>> {
    let level: LevelData = read_json(&args.level, "level")?;
    let settings: GeneratorSettings = match &args.settings {
        Some(path) => read_json(path, "settings")?,
        None => GeneratorSettings::default(),
    };
    let header: LevelHeader = match &args.header {
        Some(path) => read_json(path, "header")?,
        None => LevelHeader::default(),
    };

    let mut results = Vec::new();

    // 1. Inputs
    println!("--- Inputs ---");
    let input_checks = validate_inputs(&level, &settings);
    let inputs_ok = input_checks.iter().all(|r| r.passed);
    results.extend(input_checks);
    if !inputs_ok {
        log::error!("Refusing to compile level {}: invalid input", level.seed);
        return Ok(results);
    }

    let theme = resolve_theme(args, &settings)?;
    if !theme.metadata.name.is_empty() {
        log::info!(
            "Using theme `{}` by {} ({} rules, {} patterns)",
            theme.metadata.name,
            theme.metadata.author,
            theme.rules.len(),
            theme.patterns.len()
        );
    }

    let mut flags = OverrideFlags::default();
    for category in &args.overrides {
        flags.set(*category);
    }

    // 2. Compile
    println!("--- Compile ---");
    let output = generate_level(&level, &theme, &settings, &header, flags);
    let level_string = output.to_level_string();
    results.extend(check_output(&level, &output, &level_string, args.verbose));

    // 3. Determinism
    let rerun = generate_level(&level, &theme, &settings, &header, flags).to_level_string();
    results.push(CheckResult {
        name: "deterministic".into(),
        passed: rerun == level_string,
        detail: format!("{} bytes on both runs", level_string.len()),
    });

    // 4. Write
    match &args.out {
        Some(path) => {
            std::fs::write(path, &level_string)
                .with_context(|| format!("writing level string to {}", path.display()))?;
            log::info!("Wrote {} bytes to {}", level_string.len(), path.display());
        }
        None => println!("{level_string}"),
    }

    Ok(results)
}

// ── 1. Inputs ───────────────────────────────────────────────────────────

fn validate_inputs(level: &LevelData, settings: &GeneratorSettings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let settings_errors = validate_settings(settings);
    results.push(CheckResult {
        name: "settings_valid".into(),
        passed: settings_errors.is_empty(),
        detail: if settings_errors.is_empty() {
            format!(
                "corners={}, marks={} every {}, theme={}",
                settings.corner_pieces,
                settings.meter_marks,
                settings.marker_interval,
                settings.active_theme
            )
        } else {
            join_errors(&settings_errors)
        },
    });

    for (i, biome) in level.biomes.iter().enumerate() {
        let errors = validate_biome(biome);
        results.push(CheckResult {
            name: format!("biome_{i}_preconditions"),
            passed: errors.is_empty(),
            detail: if errors.is_empty() {
                format!(
                    "{} segments, corridor height {}, heights {}..={}",
                    biome.segments.len(),
                    biome.options.corridor_height,
                    biome.options.min_height,
                    biome.options.max_height
                )
            } else {
                join_errors(&errors)
            },
        });
    }

    results
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ── 2. Output ───────────────────────────────────────────────────────────

fn check_output(
    level: &LevelData,
    output: &LevelOutput,
    level_string: &str,
    verbose: bool,
) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let summary = output.summary();

    if verbose {
        println!(
            "  structure={} theme={} bytes={} overrides=[{}]",
            summary.structure_records,
            summary.theme_records,
            summary.bytes,
            summary.overrides.join(", ")
        );
    }

    let has_segments = level.biomes.first().is_some_and(|b| !b.segments.is_empty());
    results.push(CheckResult {
        name: "output_matches_input".into(),
        passed: has_segments != output.is_empty(),
        detail: if has_segments {
            format!(
                "{} structure + {} theme records",
                summary.structure_records, summary.theme_records
            )
        } else {
            "no segments, empty output".into()
        },
    });

    let body = &level_string[output.header.len()..];
    results.push(CheckResult {
        name: "records_terminated".into(),
        passed: body.is_empty() || body.ends_with(';'),
        detail: format!("{} bytes of records", body.len()),
    });

    results
}
