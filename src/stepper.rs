use crate::field::Field;
use grayscott_common::SimParams;
use rayon::prelude::*;

/// Advances a single cell by `dt`: 5-point toroidal Laplacian per channel,
/// then the Gray-Scott reaction terms under explicit forward Euler. Reads
/// only `read`, so results are independent of evaluation order.
///
/// No clamping is applied anywhere; under unstable parameters values leave
/// [0, 1] or blow up to NaN, and that is accepted model behavior.
#[inline(always)]
pub fn step_cell(read: &Field, x: usize, y: usize, dt: f32, params: &SimParams) -> (f32, f32) {
    let (u, v) = read.at(x, y);
    let (xi, yi) = (x as isize, y as isize);
    let (left_u, left_v) = read.wrapped(xi - 1, yi);
    let (right_u, right_v) = read.wrapped(xi + 1, yi);
    let (down_u, down_v) = read.wrapped(xi, yi - 1);
    let (up_u, up_v) = read.wrapped(xi, yi + 1);

    let inv_h2 = 1.0 / (params.space_step * params.space_step);
    let lap_u = (left_u + right_u + down_u + up_u - 4.0 * u) * inv_h2;
    let lap_v = (left_v + right_v + down_v + up_v - 4.0 * v) * inv_h2;

    let reaction = u * u * v;
    let next_u = u + dt * (params.diffusion_u * lap_u + reaction - (params.feed + params.kill) * u);
    let next_v = v + dt * (params.diffusion_v * lap_v - reaction + params.feed * (1.0 - v));
    (next_u, next_v)
}

/// One integration step over the whole grid: reads `read`, fills `write`.
/// Output rows are computed in parallel; no cell ever samples `write`, so the
/// caller's swap afterwards is the only publication point.
pub fn step(read: &Field, write: &mut Field, dt: f32, params: &SimParams) {
    debug_assert_eq!(read.width(), write.width());
    debug_assert_eq!(read.height(), write.height());

    let width = read.width();
    let (u_out, v_out) = write.channels_mut();
    u_out
        .par_chunks_mut(width)
        .zip(v_out.par_chunks_mut(width))
        .enumerate()
        .for_each(|(y, (u_row, v_row))| {
            for x in 0..width {
                let (u, v) = step_cell(read, x, y, dt, params);
                u_row[x] = u;
                v_row[x] = v;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldPair;
    use crate::seed;
    use grayscott_common::{RenderMode, RenderTarget};

    fn test_params() -> SimParams {
        SimParams {
            diffusion_u: 0.0009,
            diffusion_v: 0.004,
            feed: 0.09,
            kill: 0.06,
            space_step: 0.05,
            time_step: 0.1,
            time_scale: 200.0,
            render_target: RenderTarget::U,
            render_mode: RenderMode::Relief,
        }
    }

    #[test]
    fn corner_cell_diffuses_across_all_four_edges() {
        let params = test_params();
        let mut pair = FieldPair::allocate(8, 6).unwrap();
        {
            let (_, write) = pair.split();
            write.set(0, 0, 1.0, 1.0);
        }
        pair.swap();

        {
            let (read, write) = pair.split();
            step(read, write, 0.1, &params);
        }
        pair.swap();

        // The wrap-adjacent neighbors of (0, 0) all receive diffusion mass.
        let out = pair.read();
        for (x, y) in [(1, 0), (7, 0), (0, 1), (0, 5)] {
            let (u, v) = out.at(x, y);
            assert!(u > 0.0, "no u diffusion into ({}, {})", x, y);
            assert!(v > 0.0, "no v diffusion into ({}, {})", x, y);
        }
        // A cell two steps away is untouched after one step (v only grows
        // through its feed term, which also applies to empty cells).
        let (u_far, _) = out.at(4, 3);
        assert_eq!(u_far, 0.0);
    }

    #[test]
    fn zero_grid_is_a_fixed_point_of_u() {
        let params = test_params();
        let mut pair = FieldPair::allocate(16, 16).unwrap();
        for _ in 0..3 {
            let (read, write) = pair.split();
            step(read, write, 0.1, &params);
            pair.swap();
        }
        assert!(pair.read().u().iter().all(|&u| u == 0.0));
    }

    #[test]
    fn fully_zero_state_stays_zero_without_feed() {
        let mut params = test_params();
        params.feed = 0.0;
        let mut pair = FieldPair::allocate(16, 16).unwrap();
        for _ in 0..5 {
            let (read, write) = pair.split();
            step(read, write, 0.1, &params);
            pair.swap();
        }
        assert!(pair.read().u().iter().all(|&u| u == 0.0));
        assert!(pair.read().v().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn stepping_is_deterministic() {
        let params = test_params();
        let mut read = Field::new(24, 24).unwrap();
        seed::initialize(&mut read, [321.5, 77.0]);

        let mut out_a = Field::new(24, 24).unwrap();
        let mut out_b = Field::new(24, 24).unwrap();
        step(&read, &mut out_a, 0.1, &params);
        step(&read, &mut out_b, 0.1, &params);

        // Bit-for-bit identical: there is no hidden randomness in the kernel.
        assert_eq!(out_a.u(), out_b.u());
        assert_eq!(out_a.v(), out_b.v());
    }

    #[test]
    fn matches_the_scalar_kernel() {
        let params = test_params();
        let mut read = Field::new(24, 20).unwrap();
        seed::initialize(&mut read, [9.0, 404.0]);
        assert!(read.u().iter().any(|&u| u != 0.0), "seed disc missed the grid");

        let mut out = Field::new(24, 20).unwrap();
        step(&read, &mut out, 0.1, &params);

        for y in 0..20 {
            for x in 0..24 {
                assert_eq!(out.at(x, y), step_cell(&read, x, y, 0.1, &params));
            }
        }
    }
}
