//! Picking colors and neighborhood decoding.
//!
//! The picking pass renders every pickable primitive with a color that
//! encodes its slot inside the buffer (24 bits over RGB) and the scene object
//! it belongs to (alpha). A pick reads a 5x5 block around the cursor and takes
//! the first live sample in [`PICK_PIXEL_ORDER`].

use molscope_core::PickPrecision;

/// Side of the square read back around the cursor.
pub const PICK_NEIGHBORHOOD: u32 = 5;

/// Largest primitive slot the RGB channels can carry.
pub const MAX_PICK_INDEX: u32 = 0x00FF_FFFF;

/// Largest object id an 8-bit alpha channel can carry.
pub const MAX_BYTE_OBJECT_ID: u32 = 255;

/// Visit order of the 5x5 block, center first then spiralling outwards.
pub const PICK_PIXEL_ORDER: [usize; 25] = [
    12, 7, 13, 17, 11, 6, 8, 18, 16, 2, 14, 22, 10, 1, 3, 9, 19, 23, 21, 15, 5, 0, 4, 24, 20,
];

/// One picking-target pixel with normalized channels.
pub type PickPixel = [f32; 4];

/// Primitive slot carried by the RGB bytes of a picking pixel, red being
/// the most significant. The object id travels separately in alpha.
#[must_use]
pub fn color_to_index(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// RGB bytes for primitive slot `index`; slots past [`MAX_PICK_INDEX`] wrap.
#[must_use]
pub fn index_to_color(index: u32) -> [u8; 3] {
    [
        ((index >> 16) & 0xFF) as u8,
        ((index >> 8) & 0xFF) as u8,
        (index & 0xFF) as u8,
    ]
}

/// Builds the pixel the picking pass writes for primitive `pid` of object `object_id`.
#[must_use]
pub fn encode_pick_pixel(pid: u32, object_id: u32, precision: PickPrecision) -> PickPixel {
    let [r, g, b] = index_to_color(pid);
    let alpha = match precision {
        PickPrecision::Float => object_id as f32,
        PickPrecision::Byte => object_id.min(MAX_BYTE_OBJECT_ID) as f32 / 255.0,
    };
    [
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        alpha,
    ]
}

/// Splits a picking pixel into `(pid, object_id)`.
///
/// Object id 0 is the cleared background and decodes to `None`.
#[must_use]
pub fn decode_pick_pixel(pixel: PickPixel, precision: PickPrecision) -> Option<(u32, u32)> {
    let object_id = match precision {
        PickPrecision::Float => pixel[3].round(),
        PickPrecision::Byte => (pixel[3] * 255.0).round(),
    };
    if object_id.is_nan() || object_id < 1.0 {
        return None;
    }
    let pid = color_to_index(
        channel_byte(pixel[0]),
        channel_byte(pixel[1]),
        channel_byte(pixel[2]),
    );
    Some((pid, object_id as u32))
}

fn channel_byte(c: f32) -> u8 {
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Top-left corner of the block read for a pick at canvas position `(x, y)`.
///
/// `x`/`y` are scaled by the pixel ratio, moved two pixels up-left and kept
/// inside a `width` x `height` target.
#[must_use]
pub fn pick_origin(x: f32, y: f32, pixel_ratio: f32, width: u32, height: u32) -> (u32, u32) {
    let clamp_axis = |v: f32, extent: u32| {
        let v = (v * pixel_ratio - 2.0).max(0.0);
        let v = if v.is_finite() { v as u32 } else { 0 };
        v.min(extent.saturating_sub(PICK_NEIGHBORHOOD))
    };
    (clamp_axis(x, width), clamp_axis(y, height))
}

/// Scans a row-major 5x5 block and returns the first sample owned by a live object.
///
/// Returns `(pid, object_id)`; samples whose object `is_live` rejects are skipped.
#[must_use]
pub fn scan_neighborhood(
    block: &[PickPixel],
    precision: PickPrecision,
    mut is_live: impl FnMut(u32) -> bool,
) -> Option<(u32, u32)> {
    PICK_PIXEL_ORDER
        .iter()
        .filter_map(|&i| block.get(i))
        .filter_map(|&pixel| decode_pick_pixel(pixel, precision))
        .find(|&(_, object_id)| is_live(object_id))
}

/// GPU uniforms for the picking pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct PickUniforms {
    /// Scene object written into alpha.
    pub object_id: u32,
    /// 1 when the target stores 8-bit channels.
    pub byte_precision: u32,
    /// Padding to align to 16 bytes.
    pub _padding: [u32; 2],
}

impl PickUniforms {
    /// Uniforms for one object.
    #[must_use]
    pub fn new(object_id: u32, precision: PickPrecision) -> Self {
        Self {
            object_id,
            byte_precision: u32::from(precision == PickPrecision::Byte),
            _padding: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_specific_colors() {
        assert_eq!(index_to_color(0), [0, 0, 0]);
        assert_eq!(index_to_color(1), [0, 0, 1]);
        assert_eq!(index_to_color(256), [0, 1, 0]);
        assert_eq!(index_to_color(0x00FF_0000), [255, 0, 0]);
    }

    #[test]
    fn test_pixel_order_is_permutation() {
        let mut seen = [false; 25];
        for &i in &PICK_PIXEL_ORDER {
            assert!(!seen[i]);
            seen[i] = true;
        }
        assert_eq!(PICK_PIXEL_ORDER[0], 12);
    }

    #[test]
    fn test_background_decodes_to_none() {
        assert_eq!(decode_pick_pixel([0.0; 4], PickPrecision::Float), None);
        assert_eq!(decode_pick_pixel([0.0; 4], PickPrecision::Byte), None);
    }

    #[test]
    fn test_byte_precision_object_id() {
        let px = encode_pick_pixel(42, 17, PickPrecision::Byte);
        assert_eq!(decode_pick_pixel(px, PickPrecision::Byte), Some((42, 17)));
    }

    #[test]
    fn test_pick_origin_clamps() {
        assert_eq!(pick_origin(0.0, 1.0, 1.0, 100, 100), (0, 0));
        assert_eq!(pick_origin(50.0, 50.0, 2.0, 200, 200), (98, 98));
        assert_eq!(pick_origin(99.0, 99.0, 1.0, 100, 100), (95, 95));
    }

    #[test]
    fn test_scan_prefers_center_then_order() {
        let mut block = vec![[0.0f32; 4]; 25];
        block[7] = encode_pick_pixel(3, 2, PickPrecision::Float);
        block[13] = encode_pick_pixel(4, 1, PickPrecision::Float);
        assert_eq!(
            scan_neighborhood(&block, PickPrecision::Float, |_| true),
            Some((3, 2))
        );
        block[12] = encode_pick_pixel(9, 1, PickPrecision::Float);
        assert_eq!(
            scan_neighborhood(&block, PickPrecision::Float, |_| true),
            Some((9, 1))
        );
    }

    #[test]
    fn test_scan_skips_dead_objects() {
        let mut block = vec![[0.0f32; 4]; 25];
        block[12] = encode_pick_pixel(1, 5, PickPrecision::Float);
        block[20] = encode_pick_pixel(2, 6, PickPrecision::Float);
        assert_eq!(
            scan_neighborhood(&block, PickPrecision::Float, |id| id == 6),
            Some((2, 6))
        );
        assert_eq!(
            scan_neighborhood(&block, PickPrecision::Float, |_| false),
            None
        );
    }

    proptest! {
        #[test]
        fn test_pick_pixel_roundtrip(pid in 0u32..=MAX_PICK_INDEX, object_id in 1u32..100_000) {
            let px = encode_pick_pixel(pid, object_id, PickPrecision::Float);
            prop_assert_eq!(decode_pick_pixel(px, PickPrecision::Float), Some((pid, object_id)));
        }

        #[test]
        fn test_scan_is_deterministic(live in proptest::collection::vec(any::<bool>(), 25)) {
            let block: Vec<PickPixel> = (0..25u32)
                .map(|i| if live[i as usize] { encode_pick_pixel(i, i + 1, PickPrecision::Float) } else { [0.0; 4] })
                .collect();
            let first = scan_neighborhood(&block, PickPrecision::Float, |_| true);
            let second = scan_neighborhood(&block, PickPrecision::Float, |_| true);
            prop_assert_eq!(first, second);
            let expected = PICK_PIXEL_ORDER.iter().find(|&&i| live[i]).map(|&i| (i as u32, i as u32 + 1));
            prop_assert_eq!(first, expected);
        }
    }
}
