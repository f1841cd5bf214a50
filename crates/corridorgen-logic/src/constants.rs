//! Level constants: object ids, record field keys, grid geometry.
//!
//! These are plain integer constants matching the external level-object
//! schema. Every number that lands in an output record is named here.

/// Side length of one grid cell in level units.
pub const GRID: i32 = 30;

/// Longest level length, in grid cells, that gets meter marks.
pub const MAX_LENGTH: i64 = 100_000;

/// Number of orientation codes kept in the history window.
pub const WINDOW_LEN: usize = 11;

/// Record field keys.
pub mod fields {
    pub const OBJECT_ID: u16 = 1;
    pub const X: u16 = 2;
    pub const Y: u16 = 3;
    pub const FLIP_X: u16 = 5;
    pub const ROTATION: u16 = 6;
    pub const DURATION: u16 = 10;
    pub const TOUCH_TRIGGERED: u16 = 13;
    pub const EDITOR_LAYER: u16 = 20;
    pub const COLOR_CHANNEL: u16 = 21;
    pub const Z_ORDER: u16 = 24;
    pub const Z_LAYER_OFFSET: u16 = 25;
    pub const TEXT: u16 = 31;
    pub const SCALE: u16 = 32;
    pub const OPACITY: u16 = 35;
    pub const HSV_ENABLED: u16 = 41;
    pub const HSV: u16 = 43;
    pub const TARGET_GROUP: u16 = 51;
    pub const GROUP: u16 = 57;
    pub const NO_GLOW: u16 = 64;
    pub const NO_EFFECTS: u16 = 67;
    pub const Z_LAYER: u16 = 155;
}

/// Object ids of the pieces the compiler places.
pub mod objects {
    // Structure
    pub const SOLID_BLOCK: u32 = 1;
    pub const CORNER: u32 = 473;
    pub const SLOPE: u32 = 1338;
    pub const MINI_SLOPE: u32 = 1339;
    // Portals
    pub const GRAVITY_DOWN_PORTAL: u32 = 10;
    pub const GRAVITY_UP_PORTAL: u32 = 11;
    // Speed triggers
    pub const SPEED_HALF: u32 = 200;
    pub const SPEED_NORMAL: u32 = 201;
    pub const SPEED_DOUBLE: u32 = 202;
    pub const SPEED_TRIPLE: u32 = 203;
    pub const SPEED_QUADRUPLE: u32 = 1334;
    // Hazards
    pub const SPIKE: u32 = 103;
    pub const FUZZ: u32 = 1717;
    // Overlays and markers
    pub const ALPHA_TRIGGER: u32 = 1007;
    pub const METER_TICK: u32 = 508;
    pub const TEXT_LABEL: u32 = 914;
}

/// Colour channels referenced by generated records.
pub mod channels {
    /// Tint applied to fuzz in night mode.
    pub const NIGHT_FUZZ: u32 = 1004;
    pub const MARKER: u32 = 1011;
}

/// Object groups referenced by generated records.
pub mod groups {
    pub const MARKERS: u32 = 2;
    pub const HAZE: u32 = 4;
}

/// Truncated √2 used in portal sizing. Output must match this exact value,
/// not `std::f64::consts::SQRT_2`.
pub const PORTAL_SQRT_2: f64 = 1.414;

/// Corridor height the portal and speed-trigger scales are normalized to.
pub const REFERENCE_CORRIDOR_HEIGHT: f64 = 60.0;
