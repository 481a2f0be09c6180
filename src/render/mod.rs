// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Anti-aliased ray-casting software renderer

mod camera;
mod color;
mod grid;
mod raycast;
mod sampler;

pub use camera::{itcs_to_iucs, iucs_to_ipcs, AxAffine2, Camera, CameraParams, Frustum};
pub use color::{ImgRgbaF, RgbaF};
pub use grid::GridIndex;
pub use raycast::{barycentric_coord, oecs_to_iucs, sample_clamp_iucs, Intersect, RayCaster, TriIdxSM};
pub use sampler::sample_adaptive_f;

use crate::geometry::{bounds_of, Mesh};
use anyhow::{ensure, Result};
use image::{Rgba, RgbaImage};
use nalgebra::{Isometry3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Directional light at infinity, in OECS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    /// RGB range [0,1]
    pub colour: Vector3<f32>,
    /// Unit direction vector to the light
    pub direction: Vector3<f32>,
}

impl Light {
    pub fn new(colour: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self { colour, direction }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lighting {
    /// RGB range [0,1]
    pub ambient: Vector3<f32>,
    pub lights: Vec<Light>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: Vector3::new(0.4, 0.4, 0.4),
            lights: vec![Light::new(
                Vector3::new(0.6, 0.6, 0.6),
                Vector3::new(0.0, 0.0, 1.0),
            )],
        }
    }
}

/// Whether marked surface points are composited onto the render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderSurfPoints {
    Never,
    WhenVisible,
    Always,
}

/// Projected position and occlusion state of a labelled surface point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedSurfPoint {
    pub label: String,
    /// Not necessarily within the image
    pub pos_iucs: Point2<f32>,
    /// In view of the camera, camera-facing and not occluded
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    /// In OECS (not transformed by the modelview)
    pub lighting: Lighting,
    /// Channels in [0,1]; alpha 0 is transparent and colour values must be
    /// alpha-weighted
    pub background_color: RgbaF,
    /// Range [1,16]; higher is slower
    pub anti_alias_bit_depth: u32,
    pub render_surf_points: RenderSurfPoints,
    /// Values in [0,1]
    pub surf_point_color: RgbaF,
    pub surf_point_radius: f32,
    /// Turn off to see raw geometry
    pub use_maps: bool,
    pub all_shiny: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            lighting: Lighting::default(),
            background_color: RgbaF::TRANSPARENT,
            anti_alias_bit_depth: 3,
            render_surf_points: RenderSurfPoints::Never,
            surf_point_color: RgbaF::new(0.0, 1.0, 0.0, 1.0),
            surf_point_radius: 2.0,
            use_maps: true,
            all_shiny: false,
        }
    }
}

/// Paint a filled dot, ignoring any out-of-bounds part
pub fn paint_dot(img: &mut RgbaImage, pos_ircs: [i64; 2], color: Rgba<u8>, radius: i64) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let (x, y) = (pos_ircs[0] + dx, pos_ircs[1] + dy);
                if x >= 0 && x < w && y >= 0 && y < h {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

/// Software render of the given posed meshes. The modelview takes mesh
/// coordinates to OECS and `itcs_to_iucs` fully specifies the projection
/// since the optical centre is assumed at image centre with implicit [0,1]
/// IUCS bounds. Also returns the projected surface point records for
/// downstream landmark export.
pub fn render_soft(
    dims: [u32; 2],
    meshes: &[Mesh],
    modelview: Isometry3<f64>,
    itcs_to_iucs: AxAffine2,
    options: &RenderOptions,
) -> Result<(RgbaImage, Vec<ProjectedSurfPoint>)> {
    ensure!(dims[0] > 0 && dims[1] > 0, "render dims must be non-zero");
    ensure!(
        (1..=16).contains(&options.anti_alias_bit_depth),
        "anti-alias bit depth {} outside [1,16]",
        options.anti_alias_bit_depth
    );
    ensure!(
        options.background_color.0.iter().all(|&c| (0.0..=1.0).contains(&c)),
        "background colour channels must be in [0,1]"
    );
    ensure!(
        meshes.iter().all(|m| m.indices_valid()),
        "mesh facet or UV index out of range"
    );
    let rc = RayCaster::new(
        meshes,
        modelview,
        itcs_to_iucs,
        options.lighting.clone(),
        options.background_color,
        dims,
        options.use_maps,
        options.all_shiny,
    );
    let rend = sampler::sample_adaptive_f(
        dims,
        &|_ircs, ipcs| rc.cast(ipcs),
        1.0,
        options.anti_alias_bit_depth,
    );
    let mut img = rend.to_rgba8();
    // Calculate where the surface points land:
    let mut spps: Vec<ProjectedSurfPoint> = Vec::new();
    for (mm, mesh) in meshes.iter().enumerate() {
        let verts = &rc.vertss[mm];
        let norms = &rc.normss[mm];
        for (ss, surf) in mesh.surfaces.iter().enumerate() {
            for (ii, sp) in surf.surf_points.iter().enumerate() {
                let sp_oecs = surf.surf_point_pos(verts, ii);
                let sp_norm = norms.facet[ss].tri_equivs[sp.tri_equiv_idx as usize];
                // Camera-facing test
                let mut visible = sp_oecs.coords.dot(&sp_norm) < 0.0;
                let sp_iucs = oecs_to_iucs(sp_oecs, &itcs_to_iucs);
                if sp_iucs.z > 0.0 {
                    // In front of the camera: occluded unless its own tri is
                    // the closest intersection at this position
                    let iscts = rc.closest_intersects(Point2::new(sp_iucs.x, sp_iucs.y));
                    match iscts.first() {
                        Some(isct) => {
                            if isct.tri_idx.mesh_idx as usize != mm
                                || isct.tri_idx.surf_idx as usize != ss
                                || isct.tri_idx.tri_idx != sp.tri_equiv_idx
                            {
                                visible = false;
                            }
                        }
                        None => visible = false,
                    }
                } else {
                    visible = false;
                }
                spps.push(ProjectedSurfPoint {
                    label: sp.label.clone(),
                    pos_iucs: Point2::new(sp_iucs.x, sp_iucs.y),
                    visible,
                });
            }
        }
    }
    // Composite surface points:
    if options.render_surf_points != RenderSurfPoints::Never {
        for spp in &spps {
            if spp.visible || options.render_surf_points == RenderSurfPoints::Always {
                let pos = [
                    (spp.pos_iucs.x * dims[0] as f32) as i64,
                    (spp.pos_iucs.y * dims[1] as f32) as i64,
                ];
                let color = options.surf_point_color.to_rgba8();
                paint_dot(&mut img, pos, color, options.surf_point_radius.round() as i64);
            }
        }
    }
    Ok((img, spps))
}

/// As `render_soft` with the projection taken from a solved camera
pub fn render_with_camera(
    dims: [u32; 2],
    meshes: &[Mesh],
    camera: &Camera,
    options: &RenderOptions,
) -> Result<(RgbaImage, Vec<ProjectedSurfPoint>)> {
    render_soft(dims, meshes, camera.modelview, camera.itcs_to_iucs, options)
}

/// Render with a default camera automatically framing the mesh bounds
pub fn render(dims: [u32; 2], meshes: &[Mesh], background: RgbaF) -> Result<RgbaImage> {
    let camera = CameraParams::new(bounds_of(meshes)).camera(dims);
    let options = RenderOptions {
        background_color: background,
        ..Default::default()
    };
    let (img, _) = render_with_camera(dims, meshes, &camera, &options)?;
    Ok(img)
}
