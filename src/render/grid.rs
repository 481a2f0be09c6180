// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! 2D grid spatial index
//!
//! Buckets client objects by axis-aligned 2D bounds so that point queries
//! touch a roughly constant number of candidates. Bins are not exactly
//! square.

use nalgebra::{Point2, Vector2};

/// Axis-aligned bucket grid over a client-space rectangle
#[derive(Debug, Clone)]
pub struct GridIndex<T> {
    // Client space to grid IPCS (continuous pixel coords over the bins)
    scale: Vector2<f32>,
    trans: Vector2<f32>,
    dims: [usize; 2],
    bins: Vec<Vec<T>>,
    empty: Vec<T>,
}

impl<T: Clone> GridIndex<T> {
    /// `client_lo`/`client_hi` must span a strictly positive area. Typically
    /// pass the number of lookup objects for `approx_num_bins`.
    pub fn new(client_lo: Point2<f32>, client_hi: Point2<f32>, approx_num_bins: usize) -> Self {
        debug_assert!(approx_num_bins > 0);
        let client_sz = client_hi - client_lo;
        debug_assert!(client_sz.x > 0.0 && client_sz.y > 0.0);
        let scale_to_bins = (approx_num_bins as f64 / (client_sz.x as f64 * client_sz.y as f64)).sqrt();
        let dims = [
            ((client_sz.x as f64 * scale_to_bins + 0.5) as usize).max(1),
            ((client_sz.y as f64 * scale_to_bins + 0.5) as usize).max(1),
        ];
        let scale = Vector2::new(
            dims[0] as f32 / client_sz.x,
            dims[1] as f32 / client_sz.y,
        );
        let trans = -client_lo.coords.component_mul(&scale);
        Self {
            scale,
            trans,
            dims,
            bins: vec![Vec::new(); dims[0] * dims[1]],
            empty: Vec::new(),
        }
    }

    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    fn to_grid(&self, p: Point2<f32>) -> Point2<f32> {
        Point2::from(p.coords.component_mul(&self.scale) + self.trans)
    }

    /// Add `val` to every bin its bounds overlap, clipped to the grid.
    /// Bounds entirely outside the grid add nothing.
    pub fn add(&mut self, val: T, bounds_lo: Point2<f32>, bounds_hi: Point2<f32>) {
        let lo = self.to_grid(bounds_lo);
        let hi = self.to_grid(bounds_hi);
        let lo_x = lo.x.max(0.0);
        let lo_y = lo.y.max(0.0);
        if lo_x > hi.x || lo_y > hi.y {
            return;
        }
        let x0 = lo_x as usize;
        let y0 = lo_y as usize;
        let x1 = (hi.x as usize + 1).min(self.dims[0]);
        let y1 = (hi.y as usize + 1).min(self.dims[1]);
        for yy in y0..y1 {
            for xx in x0..x1 {
                self.bins[yy * self.dims[0] + xx].push(val.clone());
            }
        }
    }

    /// Candidates whose bounds overlap the bin containing `pos`; empty for
    /// positions outside the grid
    pub fn find(&self, pos: Point2<f32>) -> &[T] {
        let p = self.to_grid(pos);
        if p.x < 0.0 || p.y < 0.0 {
            return &self.empty;
        }
        let (xx, yy) = (p.x as usize, p.y as usize);
        if xx < self.dims[0] && yy < self.dims[1] {
            &self.bins[yy * self.dims[0] + xx]
        } else {
            &self.empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(bins: usize) -> GridIndex<u32> {
        GridIndex::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), bins)
    }

    #[test]
    fn test_bin_count_approximate() {
        let g = unit_grid(16);
        assert_eq!(g.dims(), [4, 4]);
        // Non-square client area still gets >= 1 bin per axis
        let g = GridIndex::<u32>::new(Point2::new(0.0, 0.0), Point2::new(100.0, 0.1), 4);
        assert!(g.dims()[0] >= 1 && g.dims()[1] >= 1);
    }

    #[test]
    fn test_add_then_find() {
        let mut g = unit_grid(16);
        g.add(7, Point2::new(0.1, 0.1), Point2::new(0.2, 0.2));
        assert_eq!(g.find(Point2::new(0.15, 0.15)), &[7]);
        assert!(g.find(Point2::new(0.9, 0.9)).is_empty());
    }

    #[test]
    fn test_spanning_bounds_hit_all_covered_bins() {
        let mut g = unit_grid(16);
        g.add(1, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        for &p in &[[0.01, 0.01], [0.99, 0.01], [0.5, 0.5], [0.01, 0.99]] {
            assert_eq!(g.find(Point2::new(p[0], p[1])), &[1]);
        }
    }

    #[test]
    fn test_out_of_bounds_query_empty() {
        let mut g = unit_grid(16);
        g.add(3, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        assert!(g.find(Point2::new(-0.1, 0.5)).is_empty());
        assert!(g.find(Point2::new(0.5, 1.1)).is_empty());
    }

    #[test]
    fn test_million_bin_scene() {
        // Bin count scales with scene size; nothing caps it
        let mut g = unit_grid((1 << 20) + 1);
        assert!(g.dims()[0] >= 1024 && g.dims()[1] >= 1024);
        g.add(1, Point2::new(0.4, 0.4), Point2::new(0.6, 0.6));
        assert_eq!(g.find(Point2::new(0.5, 0.5)), &[1]);
        assert!(g.find(Point2::new(0.1, 0.1)).is_empty());
    }

    #[test]
    fn test_bounds_clipped_to_grid() {
        let mut g = unit_grid(16);
        // Partially outside: clipped, still lands in overlapping bins
        g.add(5, Point2::new(-1.0, -1.0), Point2::new(0.1, 0.1));
        assert_eq!(g.find(Point2::new(0.05, 0.05)), &[5]);
        // Entirely outside: dropped
        g.add(9, Point2::new(2.0, 2.0), Point2::new(3.0, 3.0));
        assert!(g.find(Point2::new(0.9, 0.9)).is_empty());
    }
}
