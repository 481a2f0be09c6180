// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Linear alpha-premultiplied floating point RGBA

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, Mul};

/// Channels in [0,1], colour values weighted by alpha so that linear
/// averaging composites correctly
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RgbaF(pub [f32; 4]);

impl RgbaF {
    pub const TRANSPARENT: RgbaF = RgbaF([0.0; 4]);

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    pub fn alpha(&self) -> f32 {
        self.0[3]
    }

    /// All 4 channels within `max_diff`
    pub fn approx_eq(&self, other: &RgbaF, max_diff: f32) -> bool {
        self.0
            .iter()
            .zip(&other.0)
            .all(|(a, b)| (a - b).abs() <= max_diff)
    }

    /// Round to 8 bit, clamping each channel to [0,255]
    pub fn to_rgba8(self) -> Rgba<u8> {
        let mut c = [0u8; 4];
        for ii in 0..4 {
            c[ii] = (self.0[ii] * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
        }
        Rgba(c)
    }
}

impl Add for RgbaF {
    type Output = RgbaF;
    fn add(self, rhs: RgbaF) -> RgbaF {
        RgbaF([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
            self.0[3] + rhs.0[3],
        ])
    }
}

impl Mul<f32> for RgbaF {
    type Output = RgbaF;
    fn mul(self, rhs: f32) -> RgbaF {
        RgbaF([
            self.0[0] * rhs,
            self.0[1] * rhs,
            self.0[2] * rhs,
            self.0[3] * rhs,
        ])
    }
}

impl Index<usize> for RgbaF {
    type Output = f32;
    fn index(&self, idx: usize) -> &f32 {
        &self.0[idx]
    }
}

/// Floating point RGBA raster, row-major
#[derive(Debug, Clone)]
pub struct ImgRgbaF {
    pub dims: [u32; 2],
    pub pixels: Vec<RgbaF>,
}

impl ImgRgbaF {
    pub fn new(dims: [u32; 2], pixels: Vec<RgbaF>) -> Self {
        debug_assert_eq!(pixels.len(), (dims[0] * dims[1]) as usize);
        Self { dims, pixels }
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.dims[0], self.dims[1]);
        for (pix, out) in self.pixels.iter().zip(img.pixels_mut()) {
            *out = pix.to_rgba8();
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_compositing() {
        // Premultiplied "over": half-transparent red over opaque white
        let fg = RgbaF::new(0.5, 0.0, 0.0, 0.5);
        let bg = RgbaF::new(1.0, 1.0, 1.0, 1.0);
        let out = fg + bg * (1.0 - fg.alpha());
        assert!(out.approx_eq(&RgbaF::new(1.0, 0.5, 0.5, 1.0), 1e-6));
    }

    #[test]
    fn test_to_rgba8_rounds_and_clamps() {
        assert_eq!(RgbaF::new(0.5, 0.0, 1.0, 1.0).to_rgba8().0, [128, 0, 255, 255]);
        assert_eq!(RgbaF::new(1.5, -0.5, 0.0, 1.0).to_rgba8().0[0], 255);
        assert_eq!(RgbaF::new(1.5, -0.5, 0.0, 1.0).to_rgba8().0[1], 0);
    }
}
