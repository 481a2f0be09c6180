// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Ray casting against projected mesh triangles
//!
//! `RayCaster` caches the posed and projected geometry of a mesh list so
//! that per-sample casts are grid lookup + a handful of barycentric tests.
//! All caches are built at construction and read-only afterwards, so casts
//! are safe to evaluate from multiple threads.

use super::camera::AxAffine2;
use super::color::RgbaF;
use super::grid::GridIndex;
use super::Lighting;
use crate::geometry::{FacetInds, Material, Mesh, MeshNormals};
use image::RgbaImage;
use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};

/// Location of a triangle equivalent within a mesh list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriIdxSM {
    pub tri_idx: u32,
    pub surf_idx: u16,
    pub mesh_idx: u16,
}

impl TriIdxSM {
    pub fn new(tri_idx: usize, surf_idx: usize, mesh_idx: usize) -> Self {
        Self {
            tri_idx: tri_idx as u32,
            surf_idx: surf_idx as u16,
            mesh_idx: mesh_idx as u16,
        }
    }
}

/// Barycentric coordinate of `pos` wrt the 2D triangle `tri`, or None for a
/// degenerate (zero area) projection. Coordinates sum to 1 and are all
/// non-negative iff the point is inside the triangle, regardless of winding.
pub fn barycentric_coord(pos: Point2<f64>, tri: [Point2<f64>; 3]) -> Option<[f64; 3]> {
    fn cross2(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
        a.x * b.y - a.y * b.x
    }
    let det = cross2(tri[1] - tri[0], tri[2] - tri[0]);
    if det == 0.0 {
        return None;
    }
    Some([
        cross2(tri[1] - pos, tri[2] - pos) / det,
        cross2(tri[2] - pos, tri[0] - pos) / det,
        cross2(tri[0] - pos, tri[1] - pos) / det,
    ])
}

/// A ray-triangle intersection with perspective-corrected barycentrics
#[derive(Debug, Clone, Copy)]
pub struct Intersect {
    pub tri_idx: TriIdxSM,
    /// Inverse eye-space depth; larger is closer
    pub inv_depth: f64,
    /// Model space (perspective corrected) barycentric coordinate
    pub barycentric: [f64; 3],
}

// Keep only the closest few intersections per ray; enough layers of
// transparency for any practical composite
const MAX_INTERSECTS: usize = 8;

fn update_best(best: &mut Vec<Intersect>, isct: Intersect) {
    let pos = best
        .iter()
        .position(|b| isct.inv_depth > b.inv_depth)
        .unwrap_or(best.len());
    if pos < MAX_INTERSECTS {
        best.insert(pos, isct);
        best.truncate(MAX_INTERSECTS);
    }
}

/// Bilinear sample of an RGBA8 image by unit image coordinates, clamped at
/// the edges, channels scaled to [0,1]
pub fn sample_clamp_iucs(img: &RgbaImage, uv: Point2<f32>) -> RgbaF {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let xf = uv.x * w as f32 - 0.5;
    let yf = uv.y * h as f32 - 0.5;
    let x0 = xf.floor();
    let y0 = yf.floor();
    let (fx, fy) = (xf - x0, yf - y0);
    let cx = |x: i64| x.clamp(0, w - 1) as u32;
    let cy = |y: i64| y.clamp(0, h - 1) as u32;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let fetch = |x: u32, y: u32| {
        let p = img.get_pixel(x, y).0;
        RgbaF([
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        ])
    };
    let tl = fetch(cx(x0), cy(y0));
    let tr = fetch(cx(x0 + 1), cy(y0));
    let bl = fetch(cx(x0), cy(y0 + 1));
    let br = fetch(cx(x0 + 1), cy(y0 + 1));
    (tl * (1.0 - fx) + tr * fx) * (1.0 - fy) + (bl * (1.0 - fx) + br * fx) * fy
}

/// Posed, projected and spatially indexed scene for per-sample ray casts
pub struct RayCaster<'a> {
    /// Triangle equivalents by mesh, by surface
    pub tri_equivss: Vec<Vec<FacetInds<3>>>,
    pub materialss: Vec<Vec<Material>>,
    /// Verts by mesh, in OECS
    pub vertss: Vec<Vec<Point3<f32>>>,
    /// UVs by mesh, in OTCS
    pub uvss: Vec<&'a [Point2<f32>]>,
    /// Normals by mesh, in OECS
    pub normss: Vec<MeshNormals>,
    pub itcs_to_iucs: AxAffine2,
    /// By mesh; X,Y in IUCS, Z is inverse eye-space depth
    pub iucs_vertss: Vec<Vec<Vector3<f32>>>,
    grid: GridIndex<TriIdxSM>,
    pub lighting: Lighting,
    /// Channels [0,1], alpha-weighted
    pub background: RgbaF,
    pub img_dims: [u32; 2],
    pub use_maps: bool,
    pub all_shiny: bool,
}

impl<'a> RayCaster<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meshes: &'a [Mesh],
        modelview: Isometry3<f64>,
        itcs_to_iucs: AxAffine2,
        lighting: Lighting,
        background: RgbaF,
        img_dims: [u32; 2],
        use_maps: bool,
        all_shiny: bool,
    ) -> Self {
        let num_bins = crate::geometry::num_tri_equivs(meshes).max(1);
        // Grid over the whole unit image; tris outside never get added
        let mut grid = GridIndex::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), num_bins);
        let mut tri_equivss = Vec::with_capacity(meshes.len());
        let mut materialss = Vec::with_capacity(meshes.len());
        let mut vertss = Vec::with_capacity(meshes.len());
        let mut uvss = Vec::with_capacity(meshes.len());
        let mut normss = Vec::with_capacity(meshes.len());
        let mut iucs_vertss = Vec::with_capacity(meshes.len());
        for (mm, mesh) in meshes.iter().enumerate() {
            let tri_equivs: Vec<FacetInds<3>> =
                mesh.surfaces.iter().map(|s| s.tri_equivs()).collect();
            let materials: Vec<Material> =
                mesh.surfaces.iter().map(|s| s.material.clone()).collect();
            let verts: Vec<Point3<f32>> = mesh
                .verts
                .iter()
                .map(|v| modelview.transform_point(&v.cast::<f64>()).cast::<f32>())
                .collect();
            let norms = MeshNormals::new(&mesh.surfaces, &verts);
            let iucs_verts: Vec<Vector3<f32>> = verts
                .iter()
                .map(|&v| oecs_to_iucs(v, &itcs_to_iucs))
                .collect();
            for (ss, tris) in tri_equivs.iter().enumerate() {
                for (tt, &vis) in tris.vert_inds.iter().enumerate() {
                    let v0 = iucs_verts[vis[0] as usize];
                    let v1 = iucs_verts[vis[1] as usize];
                    let v2 = iucs_verts[vis[2] as usize];
                    // Only render tris fully in front of the camera
                    if v0.z > 0.0 && v1.z > 0.0 && v2.z > 0.0 {
                        let lo = Point2::new(v0.x.min(v1.x).min(v2.x), v0.y.min(v1.y).min(v2.y));
                        let hi = Point2::new(v0.x.max(v1.x).max(v2.x), v0.y.max(v1.y).max(v2.y));
                        grid.add(TriIdxSM::new(tt, ss, mm), lo, hi);
                    }
                }
            }
            tri_equivss.push(tri_equivs);
            materialss.push(materials);
            vertss.push(verts);
            uvss.push(mesh.uvs.as_slice());
            normss.push(norms);
            iucs_vertss.push(iucs_verts);
        }
        Self {
            tri_equivss,
            materialss,
            vertss,
            uvss,
            normss,
            itcs_to_iucs,
            iucs_vertss,
            grid,
            lighting,
            background,
            img_dims,
            use_maps,
            all_shiny,
        }
    }

    /// The closest (up to 8) triangle intersections of the ray through the
    /// given unit image position, ordered nearest first. Empty if the ray
    /// hits nothing.
    pub fn closest_intersects(&self, pos_iucs: Point2<f32>) -> Vec<Intersect> {
        let mut best: Vec<Intersect> = Vec::new();
        for &ti in self.grid.find(pos_iucs) {
            let tris = &self.tri_equivss[ti.mesh_idx as usize][ti.surf_idx as usize];
            let vis = tris.vert_inds[ti.tri_idx as usize];
            let iucs_verts = &self.iucs_vertss[ti.mesh_idx as usize];
            let verts = [
                iucs_verts[vis[0] as usize],
                iucs_verts[vis[1] as usize],
                iucs_verts[vis[2] as usize],
            ];
            let vts = verts.map(|v| Point2::new(v.x as f64, v.y as f64));
            let pos = Point2::new(pos_iucs.x as f64, pos_iucs.y as f64);
            if let Some(bc) = barycentric_coord(pos, vts) {
                if bc.iter().all(|&b| b >= 0.0) {
                    // Screen space to model space barycentrics (perspective
                    // correction); interpolation in projected values is
                    // harmonic:
                    let inv_depths = verts.map(|v| v.z as f64);
                    let inv_depth: f64 =
                        bc.iter().zip(&inv_depths).map(|(b, d)| b * d).sum();
                    let bcm = [
                        bc[0] * inv_depths[0] / inv_depth,
                        bc[1] * inv_depths[1] / inv_depth,
                        bc[2] * inv_depths[2] / inv_depth,
                    ];
                    update_best(
                        &mut best,
                        Intersect {
                            tri_idx: ti,
                            inv_depth,
                            barycentric: bcm,
                        },
                    );
                }
            }
        }
        best
    }

    /// Shade the ray through the given pixel coordinate. Channel values in
    /// [0,1] within precision, alpha-weighted.
    pub fn cast(&self, ipcs: Point2<f32>) -> RgbaF {
        let pos_iucs = Point2::new(
            ipcs.x / self.img_dims[0] as f32,
            ipcs.y / self.img_dims[1] as f32,
        );
        let best = self.closest_intersects(pos_iucs);
        let mut color = self.background;
        // Composite back to front
        for isct in best.iter().rev() {
            let isct_color = self.shade(isct);
            color = isct_color + color * (1.0 - isct_color.alpha());
        }
        color
    }

    fn shade(&self, isct: &Intersect) -> RgbaF {
        let (mm, ss) = (isct.tri_idx.mesh_idx as usize, isct.tri_idx.surf_idx as usize);
        let tris = &self.tri_equivss[mm][ss];
        let material = &self.materialss[mm][ss];
        let norms = &self.normss[mm];
        let vis = tris.vert_inds[isct.tri_idx.tri_idx as usize];
        let bc = isct.barycentric.map(|b| b as f32);
        // TODO: perspective-correct normal and UV interpolation (makes very
        // little difference for small tris)
        let norm = (norms.vert[vis[0] as usize] * bc[0]
            + norms.vert[vis[1] as usize] * bc[1]
            + norms.vert[vis[2] as usize] * bc[2])
            .normalize();
        let mut albedo = RgbaF::new(0.9, 0.9, 0.9, 1.0);
        let uvs = self.uvss[mm];
        let mut uv: Option<Point2<f32>> = None;
        if let Some(map) = &material.albedo_map {
            if !tris.uv_inds.is_empty() && !uvs.is_empty() && self.use_maps {
                let uis = tris.uv_inds[isct.tri_idx.tri_idx as usize];
                let mut pos = Point2::from(
                    uvs[uis[0] as usize].coords * bc[0]
                        + uvs[uis[1] as usize].coords * bc[1]
                        + uvs[uis[2] as usize].coords * bc[2],
                );
                pos.y = 1.0 - pos.y; // OTCS to IUCS
                albedo = sample_clamp_iucs(map, pos);
                uv = Some(pos);
            }
        }
        let aw = albedo.alpha();
        let surf_colour = Vector3::new(albedo[0], albedo[1], albedo[2]) * aw;
        let mut acc = Vector3::zeros();
        for lgt in &self.lighting.lights {
            let fac = norm.dot(&lgt.direction);
            if fac > 0.0 {
                acc += surf_colour.component_mul(&lgt.colour) * fac;
                let mut shininess = if material.shiny { 1.0 } else { 0.0 };
                if let (Some(uv), Some(spec)) = (uv, &material.specular_map) {
                    shininess = sample_clamp_iucs(spec, uv)[0];
                }
                if self.all_shiny {
                    shininess = 1.0;
                }
                if shininess > 0.0 {
                    let reflect_dir = norm * fac * 2.0 - lgt.direction;
                    if reflect_dir.z > 0.0 {
                        let delta_sqr = reflect_dir.x * reflect_dir.x
                            + reflect_dir.y * reflect_dir.y;
                        let val = (-delta_sqr * 32.0).exp() * shininess;
                        acc += Vector3::new(val, val, val);
                    }
                }
            }
        }
        acc += surf_colour.component_mul(&self.lighting.ambient);
        RgbaF::new(acc.x, acc.y, acc.z, aw)
    }
}

/// OECS to IUCS with inverse depth in the Z component; positive iff the
/// point is in front of the camera (-1 sentinel for points on the camera
/// plane)
pub fn oecs_to_iucs(pos_oecs: Point3<f32>, itcs_to_iucs: &AxAffine2) -> Vector3<f32> {
    let id = if pos_oecs.z == 0.0 {
        -1.0
    } else {
        -1.0 / pos_oecs.z as f64
    };
    // Both Y and Z change sign from OECS to ITCS
    let itcs = Point2::new(pos_oecs.x as f64 * id, -pos_oecs.y as f64 * id);
    let iucs = itcs_to_iucs.transform(itcs);
    Vector3::new(iucs.x as f32, iucs.y as f32, id as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Surf;
    use nalgebra::Vector2;

    fn centred_itcs_to_iucs() -> AxAffine2 {
        AxAffine2::new(Vector2::new(0.5, 0.5), Vector2::new(0.5, 0.5))
    }

    // Single triangle of equal width and height intersected by the optical
    // axis at its barycentric centre
    fn single_tri_mesh() -> Mesh {
        let verts = vec![
            Point3::new(-1.0, 1.5, -4.0),
            Point3::new(-1.0, -1.5, -4.0),
            Point3::new(2.0, 0.0, -4.0),
        ];
        Mesh::new(verts, vec![Surf::from_tris(FacetInds::new(vec![[0, 1, 2]]))])
    }

    fn caster(meshes: &[Mesh]) -> RayCaster<'_> {
        RayCaster::new(
            meshes,
            Isometry3::identity(),
            centred_itcs_to_iucs(),
            Lighting::default(),
            RgbaF::TRANSPARENT,
            [64, 64],
            true,
            false,
        )
    }

    #[test]
    fn test_barycentric_coord() {
        let tri = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let bc = barycentric_coord(Point2::new(0.25, 0.25), tri).unwrap();
        assert!((bc[0] - 0.5).abs() < 1e-12);
        assert!((bc[1] - 0.25).abs() < 1e-12);
        assert!((bc[2] - 0.25).abs() < 1e-12);
        // Outside the triangle: a negative coordinate
        let bc = barycentric_coord(Point2::new(1.0, 1.0), tri).unwrap();
        assert!(bc.iter().any(|&b| b < 0.0));
        // Degenerate
        let degen = [tri[0], tri[0], tri[1]];
        assert!(barycentric_coord(Point2::new(0.5, 0.5), degen).is_none());
    }

    #[test]
    fn test_oecs_to_iucs_depth_sign() {
        let xf = centred_itcs_to_iucs();
        let front = oecs_to_iucs(Point3::new(0.0, 0.0, -4.0), &xf);
        assert!(front.z > 0.0);
        assert!((front.x - 0.5).abs() < 1e-6 && (front.y - 0.5).abs() < 1e-6);
        let behind = oecs_to_iucs(Point3::new(0.0, 0.0, 4.0), &xf);
        assert!(behind.z < 0.0);
        let on_plane = oecs_to_iucs(Point3::new(1.0, 1.0, 0.0), &xf);
        assert!(on_plane.z < 0.0);
    }

    #[test]
    fn test_centre_hit_edge_miss() {
        let meshes = [single_tri_mesh()];
        let rc = caster(&meshes);
        // Optical axis passes through the triangle's barycentric centre
        let hit = rc.cast(Point2::new(32.0, 32.0));
        assert!(hit.alpha() > 0.99);
        assert!(hit.0[0] > 0.0);
        // Well outside the projected footprint: background
        let miss = rc.cast(Point2::new(2.0, 2.0));
        assert!(miss.approx_eq(&RgbaF::TRANSPARENT, 1e-6));
    }

    #[test]
    fn test_closest_intersects_ordering() {
        let mut mesh = single_tri_mesh();
        // Occluder just in front along the same ray
        mesh.verts.push(Point3::new(2.0, 0.0, -3.9));
        mesh.surfaces[0].tris.vert_inds.push([0, 1, 3]);
        let meshes = [mesh];
        let rc = caster(&meshes);
        let iscts = rc.closest_intersects(Point2::new(0.5, 0.5));
        assert_eq!(iscts.len(), 2);
        assert_eq!(iscts[0].tri_idx.tri_idx, 1); // the closer tri first
        assert!(iscts[0].inv_depth > iscts[1].inv_depth);
    }

    #[test]
    fn test_tris_behind_camera_ignored() {
        let verts = vec![
            Point3::new(-1.0, 1.5, 4.0),
            Point3::new(-1.0, -1.5, 4.0),
            Point3::new(2.0, 0.0, 4.0),
        ];
        let meshes = [Mesh::new(
            verts,
            vec![Surf::from_tris(FacetInds::new(vec![[0, 1, 2]]))],
        )];
        let rc = caster(&meshes);
        assert!(rc.closest_intersects(Point2::new(0.5, 0.5)).is_empty());
    }

    #[test]
    fn test_perspective_corrected_barycentrics() {
        // A triangle slanted in depth: interpolated inverse depth must match
        // the true inverse depth of the model-space point
        let verts = vec![
            Point3::new(-1.0, -1.0, -2.0),
            Point3::new(1.0, -1.0, -6.0),
            Point3::new(0.0, 1.0, -4.0),
        ];
        let meshes = [Mesh::new(
            verts.clone(),
            vec![Surf::from_tris(FacetInds::new(vec![[0, 1, 2]]))],
        )];
        let rc = caster(&meshes);
        let iscts = rc.closest_intersects(Point2::new(0.5, 0.5));
        assert_eq!(iscts.len(), 1);
        let bcm = iscts[0].barycentric;
        assert!((bcm.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // Model-space point reconstructed from bcm lies on the ray through
        // the image centre (x=0, y=0 in OECS)
        let p = verts[0].coords.cast::<f64>() * bcm[0]
            + verts[1].coords.cast::<f64>() * bcm[1]
            + verts[2].coords.cast::<f64>() * bcm[2];
        assert!((p.x / p.z).abs() < 1e-6);
        assert!((p.y / p.z).abs() < 1e-6);
        assert!((iscts[0].inv_depth - (-1.0 / p.z)).abs() < 1e-6);
    }
}
