//! Edge outline around a coverage mask.

use glam::Vec4;

use molscope_core::OutlineParams;

/// Depth slack when deciding whether a masked pixel is the front-most surface.
const VISIBLE_EPSILON: f32 = 1e-4;

/// Summed-area table over a boolean mask.
struct Counts {
    width: usize,
    sums: Vec<u32>,
}

impl Counts {
    fn new(width: usize, height: usize, set: impl Fn(usize) -> bool) -> Self {
        let stride = width + 1;
        let mut sums = vec![0u32; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0u32;
            for x in 0..width {
                row += u32::from(set(y * width + x));
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { width, sums }
    }

    /// Set cells in `[x0, x1) x [y0, y1)`.
    fn window(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u32 {
        let stride = self.width + 1;
        self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0]
    }
}

/// Blends outline edges into `color` around pixels where `mask` is finite.
///
/// `mask` holds the nearest depth of the highlighted primitives, `depth` the
/// scene depth; edges next to visible coverage take the visible color.
pub(super) fn compose(
    color: &mut [Vec4],
    depth: &[f32],
    mask: &[f32],
    width: u32,
    height: u32,
    params: &OutlineParams,
) {
    let (w, h) = (width as usize, height as usize);
    let covered = Counts::new(w, h, |i| mask[i].is_finite());
    let visible = Counts::new(w, h, |i| {
        mask[i].is_finite() && mask[i] <= depth[i] + VISIBLE_EPSILON
    });
    let radius = params.edge_thickness.round().max(1.0) as usize;
    let glow_radius = radius * 2;

    let window = |x: usize, y: usize, r: usize| {
        let (x0, y0) = (x.saturating_sub(r), y.saturating_sub(r));
        let (x1, y1) = ((x + r + 1).min(w), (y + r + 1).min(h));
        ((x0, y0, x1, y1), ((x1 - x0) * (y1 - y0)) as f32)
    };

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if mask[i].is_finite() {
                continue;
            }
            let ((x0, y0, x1, y1), area) = window(x, y, radius);
            let near = covered.window(x0, y0, x1, y1);
            let ((gx0, gy0, gx1, gy1), glow_area) = window(x, y, glow_radius);
            let far = covered.window(gx0, gy0, gx1, gy1);
            if far == 0 {
                continue;
            }
            let edge = near as f32 / area * params.edge_strength;
            let glow = far as f32 / glow_area * params.edge_glow;
            let amount = (edge + glow).clamp(0.0, 1.0);
            let seen = if near > 0 {
                visible.window(x0, y0, x1, y1) > 0
            } else {
                visible.window(gx0, gy0, gx1, gy1) > 0
            };
            let edge_color = if seen {
                params.visible_edge_color
            } else {
                params.hidden_edge_color
            };
            color[i] = color[i].lerp(edge_color.extend(1.0), amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_counts_window() {
        let counts = Counts::new(3, 3, |i| i % 2 == 0);
        assert_eq!(counts.window(0, 0, 3, 3), 5);
        assert_eq!(counts.window(1, 1, 2, 2), 1);
    }

    #[test]
    fn test_edges_surround_mask() {
        let (w, h) = (13u32, 13u32);
        let mut color = vec![Vec4::ZERO; 169];
        let depth = vec![0.5; 169];
        let mut mask = vec![f32::INFINITY; 169];
        mask[6 * 13 + 6] = 0.5;
        compose(&mut color, &depth, &mask, w, h, &OutlineParams::default());
        // the masked pixel itself is untouched, its neighbour takes the visible color
        assert_eq!(color[6 * 13 + 6], Vec4::ZERO);
        let neighbour = color[6 * 13 + 7];
        assert!(neighbour.x > 0.0 && (neighbour.x - neighbour.y).abs() < 1e-6);
        assert_eq!(color[0], Vec4::ZERO);
    }

    #[test]
    fn test_hidden_edge_color() {
        let mut color = vec![Vec4::ZERO; 25];
        let depth = vec![0.2; 25];
        let mut mask = vec![f32::INFINITY; 25];
        mask[12] = 0.8;
        let params = OutlineParams {
            edge_strength: 100.0,
            ..OutlineParams::default()
        };
        compose(&mut color, &depth, &mask, 5, 5, &params);
        assert_eq!(color[13].truncate(), params.hidden_edge_color);
        assert_ne!(color[13].truncate(), Vec3::ONE);
    }
}
