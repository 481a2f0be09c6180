// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Surfcast
//!
//! Core of a 3D face-modeling SDK: mesh surface topology analysis
//! (boundaries, folds, manifold checks, edge-distance maps) and an
//! anti-aliased ray-casting software renderer with a parameterized camera
//! model and adaptive sampling.

pub mod geometry;
pub mod render;

pub use geometry::{Mesh, MeshNormals, Surf, SurfTopo};
pub use render::{
    render, render_soft, render_with_camera, Camera, CameraParams, RenderOptions, RgbaF,
};
