// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Facet and vertex normals over posed mesh geometry

use super::Surf;
use nalgebra::{Point3, Vector3};

/// Per-surface facet normals, one per tri-equivalent
#[derive(Debug, Clone)]
pub struct FacetNormals {
    pub tri_equivs: Vec<Vector3<f32>>,
}

/// Facet normals by surface plus averaged per-vertex normals
#[derive(Debug, Clone)]
pub struct MeshNormals {
    pub facet: Vec<FacetNormals>,
    pub vert: Vec<Vector3<f32>>,
}

/// Unit normal of a triangle, CC winding convention. Degenerate triangles
/// yield +Z so downstream shading stays finite.
pub fn tri_normal(p0: &Point3<f32>, p1: &Point3<f32>, p2: &Point3<f32>) -> Vector3<f32> {
    let cross = (p1 - p0).cross(&(p2 - p0));
    let norm = cross.norm();
    if norm > 1e-12 {
        cross / norm
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

impl MeshNormals {
    /// Compute facet normals for every tri-equivalent and area-weighted
    /// averaged vertex normals over the shared vertex array.
    pub fn new(surfaces: &[Surf], verts: &[Point3<f32>]) -> Self {
        let mut facet = Vec::with_capacity(surfaces.len());
        let mut vert_sums: Vec<Vector3<f32>> = vec![Vector3::zeros(); verts.len()];
        for surf in surfaces {
            let tris = surf.tri_equivs();
            let mut tri_norms = Vec::with_capacity(tris.len());
            for vis in &tris.vert_inds {
                let p0 = &verts[vis[0] as usize];
                let p1 = &verts[vis[1] as usize];
                let p2 = &verts[vis[2] as usize];
                let cross = (p1 - p0).cross(&(p2 - p0));
                let area = cross.norm();
                if area > 1e-12 {
                    let normal = cross / area;
                    for &idx in vis {
                        // Weight by facet area for better quality at valence changes
                        vert_sums[idx as usize] += normal * area;
                    }
                    tri_norms.push(normal);
                } else {
                    tri_norms.push(Vector3::new(0.0, 0.0, 1.0));
                }
            }
            facet.push(FacetNormals {
                tri_equivs: tri_norms,
            });
        }
        let vert = vert_sums
            .into_iter()
            .map(|sum| {
                let norm = sum.norm();
                if norm > 1e-12 {
                    sum / norm
                } else {
                    Vector3::new(0.0, 0.0, 1.0)
                }
            })
            .collect();
        Self { facet, vert }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FacetInds;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_tri_normals() {
        let verts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let surf = Surf::from_tris(FacetInds::new(vec![[0, 1, 2]]));
        let norms = MeshNormals::new(&[surf], &verts);
        assert_eq!(norms.facet.len(), 1);
        assert_relative_eq!(norms.facet[0].tri_equivs[0].z, 1.0, epsilon = 1e-6);
        for vn in &norms.vert {
            assert_relative_eq!(vn.z, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_winding_flips_normal() {
        let verts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let surf = Surf::from_tris(FacetInds::new(vec![[1, 0, 2]]));
        let norms = MeshNormals::new(&[surf], &verts);
        assert_relative_eq!(norms.facet[0].tri_equivs[0].z, -1.0, epsilon = 1e-6);
    }
}
