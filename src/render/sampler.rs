// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Adaptive anti-aliased sampling
//!
//! Samples an RGBA function over a pixel raster, recursively sub-sampling
//! each pixel quad where neighbouring values disagree, until precision at the
//! requested bit depth is very likely. If the pixel density is below the
//! Nyquist frequency implicit in the sample function, artifacts may result.

use super::color::{ImgRgbaF, RgbaF};
use nalgebra::Point2;
use rayon::prelude::*;

const INVALID: f32 = f32::MAX;

fn invalid() -> RgbaF {
    RgbaF([INVALID, 0.0, 0.0, 0.0])
}

// 'bs' are the 4 corner samples [tl,tr,bl,br] of the (sub-)quad [lc,uc].
// 'slo'/'sto' carry the left/top centre-edge samples from the previous
// raster-order call when valid (first channel not INVALID), and return the
// right/bottom ones for the next.
fn sample_recurse<F>(
    ircs: [u32; 2],
    sample_fn: &F,
    lc: Point2<f32>,
    uc: Point2<f32>,
    bs: [RgbaF; 4],
    max_diff: f32,
    slo: &mut RgbaF,
    sto: &mut RgbaF,
) -> RgbaF
where
    F: Fn([u32; 2], Point2<f32>) -> RgbaF + Sync,
{
    let del = uc - lc;
    let hdel = del * 0.5;
    let centre = lc + hdel;
    let hdelx = nalgebra::Vector2::new(hdel.x, 0.0);
    let hdely = nalgebra::Vector2::new(0.0, hdel.y);
    let sc = sample_fn(ircs, centre);
    // Recurse on all or none of the quads since they share boundary samples.
    // If recursion happens 'r' times in all branches of the quadtree, with
    // n=r+1 the ratio of border to total sample weights is (2^n-1)/4^n, which
    // becomes small with large r, and the highest ratios only occur when the
    // sample values are already close.
    if bs.iter().all(|b| sc.approx_eq(b, max_diff)) {
        // Invalidation only matters at the top level, not in recursed calls
        slo.0[0] = INVALID;
        sto.0[0] = INVALID;
        return (bs[0] + bs[1] + bs[2] + bs[3]) * 0.125 + sc * 0.5;
    }
    let md2 = max_diff * 2.0;
    let sl = if slo.0[0] == INVALID {
        sample_fn(ircs, centre - hdelx)
    } else {
        *slo
    };
    let sr = sample_fn(ircs, centre + hdelx);
    let st = if sto.0[0] == INVALID {
        sample_fn(ircs, centre - hdely)
    } else {
        *sto
    };
    let sb = sample_fn(ircs, centre + hdely);
    let mut sst = invalid();
    let mut ssl = invalid();
    let mut ssr = invalid();
    let mut ssb = invalid();
    let stl = sample_recurse(ircs, sample_fn, lc, centre, [bs[0], st, sl, sc], md2, &mut sst, &mut ssl);
    let str_ = sample_recurse(
        ircs,
        sample_fn,
        lc + hdelx,
        centre + hdelx,
        [st, bs[1], sc, sr],
        md2,
        &mut sst,
        &mut ssr,
    );
    let sbl = sample_recurse(
        ircs,
        sample_fn,
        lc + hdely,
        centre + hdely,
        [sl, sc, bs[2], sb],
        md2,
        &mut ssb,
        &mut ssl,
    );
    let sbr = sample_recurse(ircs, sample_fn, centre, uc, [sc, sr, sb, bs[3]], md2, &mut ssb, &mut ssr);
    *slo = sr;
    *sto = sb;
    (stl + str_ + sbl + sbr) * 0.25
}

// Corner-line samples for raster row boundary 'yy' (a coordinate, not a
// pixel index). The last sample keeps the pixel index of the column 1 less.
fn corner_line<F>(dims: [u32; 2], yf: f32, ircs_y: u32, sample_fn: &F) -> Vec<RgbaF>
where
    F: Fn([u32; 2], Point2<f32>) -> RgbaF + Sync,
{
    (0..=dims[0])
        .map(|xx| {
            let ircs_x = xx.min(dims[0] - 1);
            sample_fn([ircs_x, ircs_y], Point2::new(xx as f32, yf))
        })
        .collect()
}

/// Adaptively sample `sample_fn` (which must return linear alpha-weighted
/// RGBA with channel values in [0,channel_bound]) over a `dims` pixel raster.
/// Rows are evaluated in parallel; each row samples its own corner lines, so
/// results are deterministic regardless of thread count. The alpha channel
/// may carry machine precision error and not be exactly 1 even where fully
/// covered.
pub fn sample_adaptive_f<F>(
    dims: [u32; 2],
    sample_fn: &F,
    channel_bound: f32,
    anti_alias_bit_depth: u32,
) -> ImgRgbaF
where
    F: Fn([u32; 2], Point2<f32>) -> RgbaF + Sync,
{
    debug_assert!(dims[0] > 0 && dims[1] > 0);
    debug_assert!(anti_alias_bit_depth >= 1 && anti_alias_bit_depth <= 16);
    let max_diff = channel_bound / (1u32 << anti_alias_bit_depth) as f32;
    let rows: Vec<Vec<RgbaF>> = (0..dims[1])
        .into_par_iter()
        .map(|yy| {
            let yf0 = yy as f32;
            let yf1 = (yy + 1) as f32;
            let top = corner_line(dims, yf0, yy, sample_fn);
            let bot = corner_line(dims, yf1, yy, sample_fn);
            let mut ssl = invalid();
            let mut ssts = vec![invalid(); dims[0] as usize];
            (0..dims[0] as usize)
                .map(|xx| {
                    let lc = Point2::new(xx as f32, yf0);
                    let uc = Point2::new((xx + 1) as f32, yf1);
                    let bs = [top[xx], top[xx + 1], bot[xx], bot[xx + 1]];
                    sample_recurse(
                        [xx as u32, yy],
                        sample_fn,
                        lc,
                        uc,
                        bs,
                        max_diff,
                        &mut ssl,
                        &mut ssts[xx],
                    )
                })
                .collect()
        })
        .collect();
    ImgRgbaF::new(dims, rows.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_scene_converges_exactly() {
        let c = RgbaF::new(0.25, 0.5, 0.75, 1.0);
        for depth in [1, 3, 8] {
            let img = sample_adaptive_f([8, 8], &|_, _| c, 1.0, depth);
            for pix in &img.pixels {
                assert!(pix.approx_eq(&c, 1e-6), "depth {} pixel {:?}", depth, pix);
            }
        }
    }

    #[test]
    fn test_edge_antialiased() {
        // Vertical hard edge through the middle of a pixel column: the
        // boundary pixel converges towards the mean of the two sides
        let edge = 4.5f32;
        let fxn = |_: [u32; 2], p: Point2<f32>| {
            if p.x < edge {
                RgbaF::new(1.0, 1.0, 1.0, 1.0)
            } else {
                RgbaF::new(0.0, 0.0, 0.0, 1.0)
            }
        };
        let img = sample_adaptive_f([9, 3], &fxn, 1.0, 8);
        let centre = img.pixels[(9 + 4) as usize]; // row 1, column 4
        assert!((centre.0[0] - 0.5).abs() < 0.05, "got {:?}", centre);
        // Pixels away from the edge are exact
        assert!(img.pixels[9].approx_eq(&RgbaF::new(1.0, 1.0, 1.0, 1.0), 1e-6));
        assert!(img.pixels[9 + 8].approx_eq(&RgbaF::new(0.0, 0.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_rows_deterministic() {
        // Same scene sampled twice matches exactly despite parallel rows
        let fxn = |_: [u32; 2], p: Point2<f32>| {
            let v = ((p.x * 0.7).sin() * (p.y * 1.3).cos()).abs();
            RgbaF::new(v, v, v, 1.0)
        };
        let a = sample_adaptive_f([16, 16], &fxn, 1.0, 3);
        let b = sample_adaptive_f([16, 16], &fxn, 1.0, 3);
        assert_eq!(a.pixels.len(), b.pixels.len());
        for (pa, pb) in a.pixels.iter().zip(&b.pixels) {
            assert_eq!(pa, pb);
        }
    }
}
