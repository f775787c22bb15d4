//! Jitter tables and accumulation weights for supersampled rendering.
//!
//! Level `L` uses `2^L` sub-pixel offsets. Offsets are in pixels, stored in
//! sixteenths.

use glam::Vec2;

/// Highest supported sample level.
pub const MAX_SAMPLE_LEVEL: i32 = 5;

const JITTER_SCALE: f32 = 0.0625;

const LEVEL_0: &[[i8; 2]] = &[[0, 0]];

const LEVEL_1: &[[i8; 2]] = &[[4, 4], [-4, -4]];

const LEVEL_2: &[[i8; 2]] = &[[-2, -6], [6, -2], [-6, 2], [2, 6]];

const LEVEL_3: &[[i8; 2]] = &[
    [1, -3],
    [-1, 3],
    [5, 1],
    [-3, -5],
    [-5, 5],
    [-7, -1],
    [3, 7],
    [7, -7],
];

const LEVEL_4: &[[i8; 2]] = &[
    [1, 1],
    [-1, -3],
    [-3, 2],
    [4, -1],
    [-5, -2],
    [2, 5],
    [5, 3],
    [3, -5],
    [-2, 6],
    [0, -7],
    [-4, -6],
    [-6, 4],
    [-8, 0],
    [7, -4],
    [6, 7],
    [-7, -8],
];

const LEVEL_5: &[[i8; 2]] = &[
    [-4, -7],
    [-7, -5],
    [-3, -5],
    [-5, -4],
    [-1, -4],
    [-2, -2],
    [-6, -1],
    [-4, 0],
    [-7, 1],
    [-1, 2],
    [-6, 3],
    [-3, 3],
    [-7, 6],
    [-3, 6],
    [-5, 7],
    [-1, 7],
    [5, -7],
    [1, -6],
    [6, -5],
    [4, -4],
    [2, -3],
    [7, -2],
    [1, -1],
    [4, -1],
    [2, 1],
    [6, 2],
    [0, 4],
    [4, 4],
    [2, 5],
    [7, 5],
    [5, 6],
    [3, 7],
];

/// Clamps a requested level into `0..=MAX_SAMPLE_LEVEL`.
#[must_use]
pub fn clamp_level(level: i32) -> usize {
    // Non-negative after the clamp, so the cast is lossless.
    level.clamp(0, MAX_SAMPLE_LEVEL) as usize
}

/// Jitter offsets in pixels for a sample level.
#[must_use]
pub fn jitter_offsets(level: i32) -> Vec<Vec2> {
    let table = match clamp_level(level) {
        0 => LEVEL_0,
        1 => LEVEL_1,
        2 => LEVEL_2,
        3 => LEVEL_3,
        4 => LEVEL_4,
        _ => LEVEL_5,
    };
    table
        .iter()
        .map(|[x, y]| Vec2::new(f32::from(*x), f32::from(*y)) * JITTER_SCALE)
        .collect()
}

/// Accumulation weight of sample `index` out of `count`.
///
/// The ramp term cancels over the full set, so the weights of a level sum to one.
#[must_use]
pub fn sample_weight(index: usize, count: usize) -> f32 {
    let k = count as f32;
    let rounding = (index as f32 + 0.5) / k - 0.5;
    1.0 / k + rounding / 32.0
}

/// All weights for a sample level, in sample order.
#[must_use]
pub fn sample_weights(level: i32) -> Vec<f32> {
    let count = 1usize << clamp_level(level);
    (0..count).map(|i| sample_weight(i, count)).collect()
}
