use crate::field::Field;
use grayscott_common::{RenderMode, RenderTarget, SimParams, Vec3};
use rayon::prelude::*;

const LIGHT_MAIN_INTENSITY: f32 = 0.8;
const LIGHT_FILL_INTENSITY: f32 = 0.3;

/// RGBA8 color buffer, row-major, opaque alpha. Reused across frames and
/// reallocated only when the grid resolution changes.
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// RGBA bytes of one cell.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let o = (y * self.width + x) * 4;
        [self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]]
    }
}

/// Scalar the renderer visualizes at a (toroidally wrapped) coordinate.
#[inline(always)]
pub fn value_at(field: &Field, x: isize, y: isize, target: RenderTarget) -> f32 {
    let (u, v) = field.wrapped(x, y);
    match target {
        RenderTarget::U => u,
        RenderTarget::V => v,
        RenderTarget::AbsDiff => (u - v).abs(),
    }
}

#[inline(always)]
fn lambert(intensity: f32, normal: Vec3, light_dir: Vec3) -> f32 {
    intensity * normal.dot(light_dir).max(0.0)
}

/// Relief projection: treat the scalar field as a height map, estimate the
/// surface normal from central differences of the wrapped neighbors, and
/// light it with one bright key light and one dim fill light.
#[inline(always)]
pub fn shade_relief(field: &Field, x: usize, y: usize, target: RenderTarget, space_step: f32) -> f32 {
    let (xi, yi) = (x as isize, y as isize);
    let left = value_at(field, xi - 1, yi, target);
    let right = value_at(field, xi + 1, yi, target);
    let down = value_at(field, xi, yi - 1, target);
    let up = value_at(field, xi, yi + 1, target);

    let h2 = 2.0 * space_step;
    let dx = Vec3::new(h2, 0.0, (right - left) / h2);
    let dy = Vec3::new(0.0, h2, (up - down) / h2);
    // Halfway blend toward +Z keeps steep gradients from shading too harshly.
    let normal = dx.cross(dy).normalize().mix(Vec3::new(0.0, 0.0, 1.0), 0.5);

    lambert(LIGHT_MAIN_INTENSITY, normal, Vec3::new(1.0, 1.0, 1.0).normalize())
        + lambert(LIGHT_FILL_INTENSITY, normal, Vec3::new(-1.0, -1.0, 0.3).normalize())
}

/// Per-cell luminance kernel shared by the parallel renderer and the tests.
#[inline(always)]
pub fn shade(field: &Field, x: usize, y: usize, params: &SimParams) -> f32 {
    match params.render_mode {
        RenderMode::Flat => value_at(field, x as isize, y as isize, params.render_target),
        RenderMode::Relief => shade_relief(field, x, y, params.render_target, params.space_step),
    }
}

/// Renders the read grid into `frame`. A pure post-process of the field: the
/// simulation state is never touched, and rows are shaded in parallel.
pub fn render(field: &Field, params: &SimParams, frame: &mut FrameBuffer) {
    debug_assert_eq!(field.width(), frame.width);
    debug_assert_eq!(field.height(), frame.height);

    let width = field.width();
    frame
        .data
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                // Out-of-range values only exist under unstable parameters;
                // they saturate at quantization instead of wrapping.
                let level = shade(field, x, y, params);
                let byte = (level.clamp(0.0, 1.0) * 255.0).round() as u8;
                let o = x * 4;
                row[o] = byte;
                row[o + 1] = byte;
                row[o + 2] = byte;
                row[o + 3] = 255;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params(target: RenderTarget, mode: RenderMode) -> SimParams {
        SimParams {
            diffusion_u: 0.0009,
            diffusion_v: 0.004,
            feed: 0.09,
            kill: 0.06,
            space_step: 0.05,
            time_step: 0.1,
            time_scale: 200.0,
            render_target: target,
            render_mode: mode,
        }
    }

    fn gray(level: f32) -> u8 {
        (level.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    #[test]
    fn flat_mode_is_the_identity_on_the_target_channel() {
        let mut field = Field::new(4, 4).unwrap();
        field.set(1, 2, 0.42, 0.9);
        // Wild neighbor values must not influence the flat projection.
        field.set(0, 2, 7.0, -3.0);
        field.set(2, 2, -1.0, 5.0);

        let params = test_params(RenderTarget::U, RenderMode::Flat);
        let mut frame = FrameBuffer::new(4, 4);
        render(&field, &params, &mut frame);

        let expected = gray(0.42);
        assert_eq!(frame.pixel(1, 2), [expected, expected, expected, 255]);
    }

    #[test]
    fn abs_diff_target_folds_both_channels() {
        let mut field = Field::new(3, 3).unwrap();
        field.set(1, 1, 0.9, 0.2);
        let params = test_params(RenderTarget::AbsDiff, RenderMode::Flat);
        let mut frame = FrameBuffer::new(3, 3);
        render(&field, &params, &mut frame);
        assert_eq!(frame.pixel(1, 1)[0], gray((0.9f32 - 0.2).abs()));
    }

    #[test]
    fn uniform_field_relief_is_flat_lit() {
        let n = 8 * 8;
        let field = Field::from_raw(8, 8, vec![0.37; n], vec![0.0; n]).unwrap();
        let params = test_params(RenderTarget::U, RenderMode::Relief);
        let mut frame = FrameBuffer::new(8, 8);
        render(&field, &params, &mut frame);

        // No gradient anywhere: the normal is exactly (0, 0, 1) and every
        // cell gets the same two lambert contributions.
        let up = Vec3::new(0.0, 0.0, 1.0);
        let expected = gray(
            LIGHT_MAIN_INTENSITY * up.dot(Vec3::new(1.0, 1.0, 1.0).normalize())
                + LIGHT_FILL_INTENSITY * up.dot(Vec3::new(-1.0, -1.0, 0.3).normalize()),
        );
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(frame.pixel(x, y), [expected, expected, expected, 255]);
            }
        }
    }

    #[test]
    fn relief_gradient_estimation_wraps_toroidally() {
        // A cell on the left edge must see the rightmost column as its left
        // neighbor: changing only that far column must change the shading.
        let mut field = Field::new(6, 6).unwrap();
        field.set(0, 3, 1.0, 0.0);
        assert_eq!(value_at(&field, -1, 3, RenderTarget::U), 0.0);

        let flat_far_edge = shade_relief(&field, 0, 3, RenderTarget::U, 0.05);
        field.set(5, 3, 0.5, 0.0);
        let raised_far_edge = shade_relief(&field, 0, 3, RenderTarget::U, 0.05);
        assert_ne!(flat_far_edge, raised_far_edge);
    }

    #[test]
    fn quantization_saturates_out_of_range_values() {
        let n = 2 * 2;
        let field = Field::from_raw(2, 2, vec![3.7; n], vec![-1.0; n]).unwrap();
        let params = test_params(RenderTarget::V, RenderMode::Flat);
        let mut frame = FrameBuffer::new(2, 2);
        render(&field, &params, &mut frame);
        assert_eq!(frame.pixel(0, 0)[0], 0);

        let params = test_params(RenderTarget::U, RenderMode::Flat);
        render(&field, &params, &mut frame);
        assert_eq!(frame.pixel(0, 0)[0], 255);
    }
}
