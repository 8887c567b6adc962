//! Integer codes mirrored from the host scene API.
//!
//! Ideally these would be read off the live scene object, but that is
//! only possible after initialization; mirroring them as constants lets
//! application modules import the same values at build time.

/// Horizontal alignment codes for text-box primitives.
pub mod align_horizontal {
    pub const LEFT: i32 = 0;
    pub const CENTER: i32 = 1;
    pub const RIGHT: i32 = 2;
}

/// Vertical alignment codes for text-box primitives.
pub mod align_vertical {
    pub const TOP: i32 = 0;
    pub const CENTER: i32 = 1;
    pub const BOTTOM: i32 = 2;
}

/// Animation tween, option, and status codes.
pub mod animation {
    pub const TWEEN_LINEAR: i32 = 0;
    pub const TWEEN_EXP1: i32 = 1;
    pub const TWEEN_EXP2: i32 = 2;
    pub const TWEEN_EXP3: i32 = 3;
    pub const TWEEN_STOP: i32 = 4;
    pub const EASE_IN_QUAD: i32 = 5;
    pub const EASE_IN_CUBIC: i32 = 6;
    pub const EASE_IN_BACK: i32 = 7;
    pub const EASE_IN_ELASTIC: i32 = 8;
    pub const EASE_OUT_ELASTIC: i32 = 9;
    pub const EASE_OUT_BOUNCE: i32 = 10;

    pub const OPTION_OSCILLATE: i32 = 1;
    pub const OPTION_LOOP: i32 = 2;
    pub const OPTION_FASTFORWARD: i32 = 8;
    pub const OPTION_REWIND: i32 = 16;

    pub const STATUS_IDLE: i32 = 0;
    pub const STATUS_INPROGRESS: i32 = 1;
    pub const STATUS_CANCELLED: i32 = 2;
    pub const STATUS_ENDED: i32 = 3;

    pub const COUNT_FOREVER: i32 = -1;
}

/// Image stretch modes.
pub mod stretch {
    pub const NONE: i32 = 0;
    pub const STRETCH: i32 = 1;
    pub const REPEAT: i32 = 2;
}

/// Text truncation modes.
pub mod truncation {
    pub const NONE: i32 = 0;
    pub const TRUNCATE: i32 = 1;
    pub const TRUNCATE_AT_WORD: i32 = 2;
}
