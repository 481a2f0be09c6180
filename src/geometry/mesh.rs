// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Mesh representation consumed by the topology and rendering cores.
//!
//! A mesh holds one shared vertex position array, an optional shared UV
//! array, and one or more surfaces whose facets (tris and quads) index into
//! those arrays. Quads are treated as two "tri-equivalent" triangles for
//! intersection and rendering purposes; the tri-equivalent index space is
//! all tris first, then the quad splits in order, so surface points remain
//! valid across the split.

use super::BoundingBox;
use image::RgbaImage;
use nalgebra::{Point2, Point3};
use std::sync::Arc;

/// Facet index lists: vertex indices plus an optional parallel UV index list.
/// `uv_inds` is either empty or the same length as `vert_inds`.
#[derive(Debug, Clone, Default)]
pub struct FacetInds<const N: usize> {
    pub vert_inds: Vec<[u32; N]>,
    pub uv_inds: Vec<[u32; N]>,
}

impl<const N: usize> FacetInds<N> {
    pub fn new(vert_inds: Vec<[u32; N]>) -> Self {
        Self {
            vert_inds,
            uv_inds: Vec::new(),
        }
    }

    pub fn with_uvs(vert_inds: Vec<[u32; N]>, uv_inds: Vec<[u32; N]>) -> Self {
        Self { vert_inds, uv_inds }
    }

    pub fn len(&self) -> usize {
        self.vert_inds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vert_inds.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        self.uv_inds.len() == self.vert_inds.len() && !self.uv_inds.is_empty()
    }
}

/// Surface material. Texture maps are shared read-only; the core never
/// mutates them.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub albedo_map: Option<Arc<RgbaImage>>,
    pub specular_map: Option<Arc<RgbaImage>>,
    pub shiny: bool,
}

/// A named, barycentric-weighted position on a specific tri-equivalent
#[derive(Debug, Clone)]
pub struct SurfPoint {
    pub tri_equiv_idx: u32,
    pub weights: [f32; 3],
    pub label: String,
}

impl SurfPoint {
    pub fn new(tri_equiv_idx: u32, weights: [f32; 3]) -> Self {
        Self {
            tri_equiv_idx,
            weights,
            label: String::new(),
        }
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

/// A labelled vertex index
#[derive(Debug, Clone)]
pub struct MarkedVert {
    pub idx: u32,
    pub label: String,
}

/// One surface patch of a mesh
#[derive(Debug, Clone, Default)]
pub struct Surf {
    pub tris: FacetInds<3>,
    pub quads: FacetInds<4>,
    pub material: Material,
    pub surf_points: Vec<SurfPoint>,
}

impl Surf {
    pub fn from_tris(tris: FacetInds<3>) -> Self {
        Self {
            tris,
            ..Default::default()
        }
    }

    /// Number of triangles after splitting each quad into two
    pub fn num_tri_equivs(&self) -> usize {
        self.tris.len() + 2 * self.quads.len()
    }

    /// Vertex indices of the given tri-equivalent
    pub fn tri_equiv_vert_inds(&self, idx: usize) -> [u32; 3] {
        if idx < self.tris.len() {
            return self.tris.vert_inds[idx];
        }
        let qq = idx - self.tris.len();
        let quad = self.quads.vert_inds[qq / 2];
        // Split ordering must remain stable for surface points to stay valid
        if qq % 2 == 0 {
            [quad[0], quad[1], quad[2]]
        } else {
            [quad[2], quad[3], quad[0]]
        }
    }

    /// Flatten tris and quad splits into a single triangle index list
    pub fn tri_equivs(&self) -> FacetInds<3> {
        let mut ret = self.tris.clone();
        for quad in &self.quads.vert_inds {
            ret.vert_inds.push([quad[0], quad[1], quad[2]]);
            ret.vert_inds.push([quad[2], quad[3], quad[0]]);
        }
        for quad in &self.quads.uv_inds {
            ret.uv_inds.push([quad[0], quad[1], quad[2]]);
            ret.uv_inds.push([quad[2], quad[3], quad[0]]);
        }
        ret
    }

    /// Position of the given surface point over the given (posed) vertex array
    pub fn surf_point_pos(&self, verts: &[Point3<f32>], idx: usize) -> Point3<f32> {
        let sp = &self.surf_points[idx];
        let vis = self.tri_equiv_vert_inds(sp.tri_equiv_idx as usize);
        let p0 = verts[vis[0] as usize].coords * sp.weights[0];
        let p1 = verts[vis[1] as usize].coords * sp.weights[1];
        let p2 = verts[vis[2] as usize].coords * sp.weights[2];
        Point3::from(p0 + p1 + p2)
    }
}

/// Triangulated/quad mesh with shared vertex and UV arrays
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub verts: Vec<Point3<f32>>,
    pub uvs: Vec<Point2<f32>>,
    pub surfaces: Vec<Surf>,
    pub marked_verts: Vec<MarkedVert>,
}

impl Mesh {
    pub fn new(verts: Vec<Point3<f32>>, surfaces: Vec<Surf>) -> Self {
        Self {
            verts,
            uvs: Vec::new(),
            surfaces,
            marked_verts: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    pub fn num_tri_equivs(&self) -> usize {
        self.surfaces.iter().map(Surf::num_tri_equivs).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.verts)
    }

    pub fn add_marked_vert(&mut self, idx: u32, label: &str) {
        self.marked_verts.push(MarkedVert {
            idx,
            label: label.to_string(),
        });
    }

    /// All tri-equivalent vertex indices of every surface, in surface order
    pub fn all_tri_equivs(&self) -> Vec<[u32; 3]> {
        let mut ret = Vec::with_capacity(self.num_tri_equivs());
        for surf in &self.surfaces {
            let tris = surf.tri_equivs();
            ret.extend(tris.vert_inds);
        }
        ret
    }

    /// True iff every index addressed during a render is in range: facet
    /// vertex indices against the vertex array, facet UV indices against the
    /// UV array (UV lists empty or parallel, with presence uniform across a
    /// surface's tris and quads), surface points against the tri-equiv count
    /// and marked vertices against the vertex array
    pub fn indices_valid(&self) -> bool {
        fn uvs_parallel<const N: usize>(f: &FacetInds<N>) -> bool {
            f.uv_inds.is_empty() || f.uv_inds.len() == f.vert_inds.len()
        }
        let nv = self.verts.len() as u32;
        let nu = self.uvs.len() as u32;
        for surf in &self.surfaces {
            let tris_ok = surf.tris.vert_inds.iter().all(|t| t.iter().all(|&i| i < nv))
                && surf.quads.vert_inds.iter().all(|q| q.iter().all(|&i| i < nv));
            let uvs_ok = surf.tris.uv_inds.iter().all(|t| t.iter().all(|&i| i < nu))
                && surf.quads.uv_inds.iter().all(|q| q.iter().all(|&i| i < nu));
            if !tris_ok || !uvs_ok {
                return false;
            }
            if !uvs_parallel(&surf.tris) || !uvs_parallel(&surf.quads) {
                return false;
            }
            // Mixed UV presence would leave the flattened tri-equiv UV list
            // shorter than its vertex list
            if !surf.tris.is_empty()
                && !surf.quads.is_empty()
                && surf.tris.has_uvs() != surf.quads.has_uvs()
            {
                return false;
            }
            let nte = surf.num_tri_equivs() as u32;
            if surf.surf_points.iter().any(|sp| sp.tri_equiv_idx >= nte) {
                return false;
            }
        }
        self.marked_verts.iter().all(|mv| mv.idx < nv)
    }
}

/// Total tri-equivalent count over a list of meshes
pub fn num_tri_equivs(meshes: &[Mesh]) -> usize {
    meshes.iter().map(Mesh::num_tri_equivs).sum()
}

/// Combined vertex bounds over a list of meshes
pub fn bounds_of(meshes: &[Mesh]) -> BoundingBox {
    meshes
        .iter()
        .map(Mesh::bounding_box)
        .fold(BoundingBox::empty(), |acc, b| acc.union(&b))
}
