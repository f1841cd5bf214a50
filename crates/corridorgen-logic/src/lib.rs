//! Pure corridor level compiler.
//!
//! This crate turns a sampled level (biomes of grid-aligned segments) into
//! the flat placement-record string of the external level format. It has no
//! I/O: functions take plain data and return records, making every stage
//! unit-testable and usable from the CLI or any other host.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`compiler`] | Geometry compiler: slopes, corners, portals, hazards, endings, marks |
//! | [`constants`] | Object ids, record field keys, grid size |
//! | [`header`] | Colour channel table and level settings string |
//! | [`level`] | Input model (level, biome, segment) and precondition checks |
//! | [`orientation`] | Orientation codes and the 11-slot history window |
//! | [`pipeline`] | `generate_level`: header + compiled biome + theme output |
//! | [`record`] | Placement record builder, parser and text embedding |
//! | [`settings`] | Generator settings (corners, meter marks, theme) |
//! | [`theme`] | Theme loading, rule matching, override flags |

pub mod compiler;
pub mod constants;
pub mod header;
pub mod level;
pub mod orientation;
pub mod pipeline;
pub mod record;
pub mod settings;
pub mod theme;
