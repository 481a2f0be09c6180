// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! End-to-end render scenes: visibility, winding, occlusion and texturing

use image::RgbaImage;
use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};
use std::sync::Arc;
use surfcast::geometry::{FacetInds, Material, SurfPoint};
use surfcast::render::{render_soft, AxAffine2, RenderOptions, RenderSurfPoints};
use surfcast::{Mesh, RgbaF, Surf};

fn centred_itcs_to_iucs() -> AxAffine2 {
    AxAffine2::new(Vector2::new(0.5, 0.5), Vector2::new(0.5, 0.5))
}

// Single triangle of equal width and height intersected by the optical axis
// at its barycentric centre, with a labelled surface point there
fn tri_mesh(winding: [u32; 3]) -> Mesh {
    let verts = vec![
        Point3::new(-1.0, 1.5, -4.0),
        Point3::new(-1.0, -1.5, -4.0),
        Point3::new(2.0, 0.0, -4.0),
    ];
    let mut surf = Surf::from_tris(FacetInds::new(vec![winding]));
    surf.surf_points
        .push(SurfPoint::new(0, [1.0 / 3.0; 3]).labelled("centre"));
    Mesh::new(verts, vec![surf])
}

fn point_options() -> RenderOptions {
    RenderOptions {
        render_surf_points: RenderSurfPoints::WhenVisible,
        ..Default::default()
    }
}

fn render64(meshes: &[Mesh]) -> (RgbaImage, Vec<surfcast::render::ProjectedSurfPoint>) {
    render_soft(
        [64, 64],
        meshes,
        Isometry3::identity(),
        centred_itcs_to_iucs(),
        &point_options(),
    )
    .unwrap()
}

#[test]
fn surf_point_visible_when_facing_camera() {
    let (img, spps) = render64(&[tri_mesh([0, 1, 2])]);
    assert_eq!(spps.len(), 1);
    assert!(spps[0].visible);
    assert_eq!(spps[0].label, "centre");
    // Projects to the image centre
    assert!((spps[0].pos_iucs - Point2::new(0.5, 0.5)).norm() < 1e-5);
    // Triangle shaded at the centre, background at the corner
    assert!(img.get_pixel(32, 32).0[3] > 0);
    assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 0]);
}

#[test]
fn surf_point_hidden_when_winding_flipped() {
    let (_, spps) = render64(&[tri_mesh([1, 0, 2])]);
    assert_eq!(spps.len(), 1);
    assert!(!spps[0].visible);
}

#[test]
fn surf_point_occluded_by_nearer_triangle() {
    let mut mesh = tri_mesh([0, 1, 2]);
    // A triangle just in front covering the same screen position
    mesh.verts.push(Point3::new(2.0, 0.0, -3.9));
    mesh.surfaces[0].tris.vert_inds.push([0, 1, 3]);
    let (_, spps) = render64(&[mesh]);
    assert_eq!(spps.len(), 1);
    assert!(!spps[0].visible);
}

#[test]
fn checkerboard_textured_quad() {
    // Two right-angle triangles making a square with a checkerboard map
    const Z: f32 = -4.0;
    let verts = vec![
        Point3::new(-1.0, 1.5, Z),
        Point3::new(-1.0, -1.5, Z),
        Point3::new(2.0, 1.5, Z),
        Point3::new(2.0, -1.5, Z),
    ];
    let uvs = vec![
        Point2::new(0.0, 1.0),
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 0.0),
    ];
    let mut map = RgbaImage::new(128, 128);
    for (xx, yy, pix) in map.enumerate_pixels_mut() {
        let black = (xx & 16) != (yy & 16);
        *pix = if black {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        };
    }
    let mut surf = Surf::from_tris(FacetInds::with_uvs(
        vec![[0, 1, 2], [2, 1, 3]],
        vec![[0, 1, 2], [2, 1, 3]],
    ));
    surf.material = Material {
        albedo_map: Some(Arc::new(map)),
        specular_map: None,
        shiny: false,
    };
    let mut mesh = Mesh::new(verts, vec![surf]);
    mesh.uvs = uvs;
    let (img, _) = render_soft(
        [256, 256],
        &[mesh],
        Isometry3::identity(),
        centred_itcs_to_iucs(),
        &RenderOptions::default(),
    )
    .unwrap();
    // Quad footprint in IPCS is x in [96,192], y in [80,176]: the checker
    // pattern produces both dark and light pixels inside it
    let mut dark = 0usize;
    let mut light = 0usize;
    for yy in 85..170 {
        for xx in 100..188 {
            let p = img.get_pixel(xx, yy).0;
            assert_eq!(p[3], 255, "inside footprint must be opaque");
            if p[0] < 64 {
                dark += 1;
            }
            if p[0] > 128 {
                light += 1;
            }
        }
    }
    assert!(dark > 100, "expected dark checker squares, got {}", dark);
    assert!(light > 100, "expected light checker squares, got {}", light);
    // Outside the footprint stays background
    assert_eq!(img.get_pixel(10, 10).0, [0, 0, 0, 0]);
    assert_eq!(img.get_pixel(245, 245).0, [0, 0, 0, 0]);
}

#[test]
fn perspective_view_still_covers_centre() {
    // Rotate the checker quad about Y through its own plane distance to get
    // an oblique view; the centre ray must still hit geometry
    let verts = vec![
        Point3::new(-1.0, 1.5, -4.0),
        Point3::new(-1.0, -1.5, -4.0),
        Point3::new(2.0, 1.5, -4.0),
        Point3::new(2.0, -1.5, -4.0),
    ];
    let surf = Surf::from_tris(FacetInds::new(vec![[0, 1, 2], [2, 1, 3]]));
    let mesh = Mesh::new(verts, vec![surf]);
    let modelview = Isometry3::translation(0.0, 0.0, -4.0)
        * Isometry3::rotation(Vector3::new(0.0, 1.0, 0.0) * 1.0)
        * Isometry3::translation(0.0, 0.0, 4.0);
    let (img, _) = render_soft(
        [256, 256],
        &[mesh],
        modelview,
        centred_itcs_to_iucs(),
        &RenderOptions::default(),
    )
    .unwrap();
    assert!(img.get_pixel(128, 128).0[3] > 0);
}

#[test]
fn lambertian_shading_scales_with_light() {
    let mut opts = RenderOptions::default();
    opts.lighting.ambient = Vector3::zeros();
    opts.lighting.lights[0].colour = Vector3::new(1.0, 1.0, 1.0);
    let (bright, _) = render_soft(
        [64, 64],
        &[tri_mesh([0, 1, 2])],
        Isometry3::identity(),
        centred_itcs_to_iucs(),
        &opts,
    )
    .unwrap();
    opts.lighting.lights[0].colour = Vector3::new(0.5, 0.5, 0.5);
    let (dim, _) = render_soft(
        [64, 64],
        &[tri_mesh([0, 1, 2])],
        Isometry3::identity(),
        centred_itcs_to_iucs(),
        &opts,
    )
    .unwrap();
    let b = bright.get_pixel(32, 32).0[0] as f32;
    let d = dim.get_pixel(32, 32).0[0] as f32;
    assert!(b > 0.0);
    assert!((d / b - 0.5).abs() < 0.05, "dim {} bright {}", d, b);
}
