// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Topological analysis of a triangulated surface
//!
//! `SurfTopo` builds undirected vertex/edge/triangle adjacency tables from a
//! triangle index list and answers boundary, seam-fold, manifoldness and
//! edge-distance queries. The tables are built once at construction and never
//! mutated; rebuild the graph if the mesh changes.

use super::{Mesh, MeshNormals};
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};

/// Set the ordering of `vert_inds` so the edge runs in the winding direction
/// of `tri`. Both values must occur in `tri`, which must not contain
/// duplicates.
pub fn direct_edge_vert_inds(mut vert_inds: [u32; 2], tri: [u32; 3]) -> [u32; 2] {
    let idx0 = tri.iter().position(|&v| v == vert_inds[0]).unwrap_or(0);
    let idx1 = tri.iter().position(|&v| v == vert_inds[1]).unwrap_or(0);
    let del = (idx1 + 3 - idx0) % 3;
    debug_assert!(del == 1 || del == 2);
    if del == 2 {
        vert_inds.swap(0, 1);
    }
    vert_inds
}

/// Triangle record: vertex indices and the edge index of each side, in
/// winding order (0-1, 1-2, 2-0)
#[derive(Debug, Clone, Copy)]
pub struct Tri {
    pub vert_inds: [u32; 3],
    pub edge_inds: [u32; 3],
}

impl Tri {
    /// Ordered vertex indices of the 0, 1 or 2 side of this triangle
    pub fn edge(&self, rel_idx: usize) -> [u32; 2] {
        debug_assert!(rel_idx < 3);
        [self.vert_inds[rel_idx], self.vert_inds[(rel_idx + 1) % 3]]
    }
}

/// Shared undirected edge
#[derive(Debug, Clone)]
pub struct Edge {
    /// The two vertex indices, lower first
    pub vert_inds: [u32; 2],
    /// Triangles sharing this edge; 1 for a boundary edge, 2 for a manifold
    /// interior edge, more for a non-manifold edge
    pub tri_inds: Vec<u32>,
}

impl Edge {
    /// The other of the two vertices of this edge
    pub fn other_vert_idx(&self, vert_idx: u32) -> u32 {
        debug_assert!(self.vert_inds.contains(&vert_idx));
        if vert_idx == self.vert_inds[0] {
            self.vert_inds[1]
        } else {
            self.vert_inds[0]
        }
    }
}

/// Vertex record. Both lists are empty if the vertex is unused.
#[derive(Debug, Clone, Default)]
pub struct Vert {
    pub edge_inds: Vec<u32>,
    pub tri_inds: Vec<u32>,
}

/// One step of a boundary loop: a boundary edge (part of only 1 tri, which
/// determines its winding direction) and the vertex at the directed end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundEdge {
    pub edge_idx: u32,
    pub vert_idx: u32,
}

/// Adjacency tables for a triangulated surface
#[derive(Debug, Clone)]
pub struct SurfTopo {
    pub tris: Vec<Tri>,
    pub edges: Vec<Edge>,
    pub verts: Vec<Vert>,
    /// Input triangles dropped for having a repeated vertex index
    pub dropped_degenerate: usize,
    /// Input triangles dropped for duplicating an earlier triangle's vertex
    /// set (in any order)
    pub dropped_duplicate: usize,
}

impl SurfTopo {
    /// Build from a triangle list, checking indices against the given vertex
    /// count. Fails if any triangle references a vertex at or beyond
    /// `num_verts`.
    pub fn new(num_verts: usize, tris: &[[u32; 3]]) -> Result<Self> {
        let max_referenced = tris
            .iter()
            .flat_map(|t| t.iter().copied())
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        if num_verts < max_referenced {
            bail!(
                "SurfTopo vertex count {} smaller than max index reference {}",
                num_verts,
                max_referenced - 1
            );
        }
        Ok(Self::setup(num_verts, tris))
    }

    /// Build from a triangle list alone, inferring the vertex count from the
    /// largest referenced index
    pub fn from_tris(tris: &[[u32; 3]]) -> Self {
        let num_verts = tris
            .iter()
            .flat_map(|t| t.iter().copied())
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        Self::setup(num_verts, tris)
    }

    fn setup(num_verts: usize, tris: &[[u32; 3]]) -> Self {
        // Drop null and duplicate tris rather than letting them corrupt the
        // edge valence counts
        let mut dropped_degenerate = 0usize;
        let mut dropped_duplicate = 0usize;
        let mut seen: AHashSet<[u32; 3]> = AHashSet::with_capacity(tris.len());
        let mut kept: Vec<Tri> = Vec::with_capacity(tris.len());
        for &vis in tris {
            if vis[0] == vis[1] || vis[1] == vis[2] || vis[2] == vis[0] {
                dropped_degenerate += 1;
                continue;
            }
            let mut key = vis;
            key.sort_unstable();
            if seen.insert(key) {
                kept.push(Tri {
                    vert_inds: vis,
                    edge_inds: [u32::MAX; 3],
                });
            } else {
                dropped_duplicate += 1;
            }
        }
        if dropped_duplicate > 0 {
            eprintln!("Warning: ignored {} duplicate tris", dropped_duplicate);
        }
        if dropped_degenerate > 0 {
            eprintln!("Warning: ignored {} degenerate tris", dropped_degenerate);
        }
        let mut verts: Vec<Vert> = vec![Vert::default(); num_verts];
        // Ordered map keeps edge enumeration deterministic
        let mut edges_to_tris: BTreeMap<(u32, u32), Vec<u32>> = BTreeMap::new();
        for (tt, tri) in kept.iter().enumerate() {
            for jj in 0..3 {
                let v0 = tri.vert_inds[jj];
                let v1 = tri.vert_inds[(jj + 1) % 3];
                verts[v0 as usize].tri_inds.push(tt as u32);
                let key = (v0.min(v1), v0.max(v1));
                edges_to_tris.entry(key).or_default().push(tt as u32);
            }
        }
        let mut edges: Vec<Edge> = Vec::with_capacity(edges_to_tris.len());
        let mut edge_index: AHashMap<(u32, u32), u32> = AHashMap::with_capacity(edges_to_tris.len());
        for (&(lo, hi), tri_inds) in &edges_to_tris {
            edge_index.insert((lo, hi), edges.len() as u32);
            edges.push(Edge {
                vert_inds: [lo, hi],
                tri_inds: tri_inds.clone(),
            });
        }
        for (ee, edge) in edges.iter().enumerate() {
            verts[edge.vert_inds[0] as usize].edge_inds.push(ee as u32);
            verts[edge.vert_inds[1] as usize].edge_inds.push(ee as u32);
        }
        for tri in &mut kept {
            for jj in 0..3 {
                let v0 = tri.vert_inds[jj];
                let v1 = tri.vert_inds[(jj + 1) % 3];
                let key = (v0.min(v1), v0.max(v1));
                tri.edge_inds[jj] = edge_index[&key];
            }
        }
        debug_assert!(kept.iter().all(|t| t.edge_inds.iter().all(|&e| e != u32::MAX)));
        debug_assert!(edges.iter().all(|e| !e.tri_inds.is_empty()));
        Self {
            tris: kept,
            edges,
            verts,
            dropped_degenerate,
            dropped_duplicate,
        }
    }

    /// The two vertices facing the given edge (the opposite corner of each of
    /// its two triangles), or None unless the edge has exactly 2 triangles
    pub fn edge_facing_vert_inds(&self, edge_idx: u32) -> Option<[u32; 2]> {
        let tri_inds = &self.edges[edge_idx as usize].tri_inds;
        if tri_inds.len() != 2 {
            return None;
        }
        Some([
            self.opposite_vert(tri_inds[0], edge_idx),
            self.opposite_vert(tri_inds[1], edge_idx),
        ])
    }

    /// True iff any incident edge is a boundary edge. Unused vertices are not
    /// on a boundary.
    pub fn vert_on_boundary(&self, vert_idx: u32) -> bool {
        self.verts[vert_idx as usize]
            .edge_inds
            .iter()
            .any(|&ee| self.edges[ee as usize].tri_inds.len() == 1)
    }

    /// The other vertex of every incident edge; a multiset over the star of
    /// the vertex
    pub fn vert_neighbours(&self, vert_idx: u32) -> Vec<u32> {
        self.verts[vert_idx as usize]
            .edge_inds
            .iter()
            .map(|&ee| self.edges[ee as usize].other_vert_idx(vert_idx))
            .collect()
    }

    /// Neighbours across boundary edges only. Size 2 for a boundary vertex on
    /// a manifold surface.
    pub fn vert_boundary_neighbours(&self, vert_idx: u32) -> Vec<u32> {
        self.verts[vert_idx as usize]
            .edge_inds
            .iter()
            .filter(|&&ee| self.edges[ee as usize].tri_inds.len() == 1)
            .map(|&ee| self.edges[ee as usize].other_vert_idx(vert_idx))
            .collect()
    }

    // 'edge_idx' must be a boundary edge. Walks edge winding direction to the
    // terminal vertex and on through the next unvisited boundary edge until
    // the loop closes. A non-manifold boundary junction terminates the walk
    // with the partial loop accumulated so far.
    fn boundary_containing_edge(&self, mut edge_idx: u32) -> Vec<BoundEdge> {
        let mut bound_edges: Vec<BoundEdge> = Vec::new();
        loop {
            let edge = &self.edges[edge_idx as usize];
            // Every boundary edge has exactly 1 tri, which orients it
            let tri = &self.tris[edge.tri_inds[0] as usize];
            let vert_inds = direct_edge_vert_inds(edge.vert_inds, tri.vert_inds);
            bound_edges.push(BoundEdge {
                edge_idx,
                vert_idx: vert_inds[1],
            });
            let next = self.verts[vert_inds[1] as usize]
                .edge_inds
                .iter()
                .copied()
                .find(|&ee| {
                    ee != edge_idx
                        && self.edges[ee as usize].tri_inds.len() == 1
                        && !bound_edges.iter().any(|be| be.edge_idx == ee)
                });
            match next {
                Some(ee) => edge_idx = ee,
                None => break,
            }
        }
        bound_edges
    }

    /// If the given vertex touches a boundary edge, the full ordered boundary
    /// loop through that edge; otherwise empty
    pub fn boundary_containing_vert(&self, vert_idx: u32) -> Vec<BoundEdge> {
        for &ee in &self.verts[vert_idx as usize].edge_inds {
            if self.edges[ee as usize].tri_inds.len() == 1 {
                return self.boundary_containing_edge(ee);
            }
        }
        Vec::new()
    }

    /// All distinct boundary loops on the surface in winding order, arbitrary
    /// starting points, deduplicated by edge membership
    pub fn boundaries(&self) -> Vec<Vec<BoundEdge>> {
        let mut ret: Vec<Vec<BoundEdge>> = Vec::new();
        let mut visited: AHashSet<u32> = AHashSet::new();
        for ee in 0..self.edges.len() as u32 {
            if self.edges[ee as usize].tri_inds.len() == 1 && !visited.contains(&ee) {
                let loop_ = self.boundary_containing_edge(ee);
                visited.extend(loop_.iter().map(|be| be.edge_idx));
                ret.push(loop_);
            }
        }
        ret
    }

    /// Dense flags, 1-1 with vertices, true iff the vertex lies on any
    /// boundary edge
    pub fn boundary_vert_flags(&self) -> Vec<bool> {
        let mut ret = vec![false; self.verts.len()];
        for boundary in self.boundaries() {
            for be in boundary {
                let edge = &self.edges[be.edge_idx as usize];
                ret[edge.vert_inds[0] as usize] = true;
                ret[edge.vert_inds[1] as usize] = true;
            }
        }
        ret
    }

    /// Outward in-plane normal for each vertex of the given boundary loop:
    /// per boundary edge, the direction perpendicular to the edge and
    /// coplanar with its single triangle, averaged between the two edges
    /// adjacent to each vertex
    pub fn boundary_vert_normals(
        &self,
        boundary: &[BoundEdge],
        verts: &[Point3<f32>],
    ) -> Vec<Vector3<f32>> {
        if boundary.is_empty() {
            return Vec::new();
        }
        let mut edge_norms: Vec<Vector3<f32>> = Vec::with_capacity(boundary.len());
        let mut v0 = verts[boundary[boundary.len() - 1].vert_idx as usize];
        for be in boundary {
            let v1 = verts[be.vert_idx as usize];
            let edge = &self.edges[be.edge_idx as usize];
            let tri = &self.tris[edge.tri_inds[0] as usize]; // must be exactly 1 tri
            let tri_norm = super::tri_normal(
                &verts[tri.vert_inds[0] as usize],
                &verts[tri.vert_inds[1] as usize],
                &verts[tri.vert_inds[2] as usize],
            );
            let xp = (v1 - v0).cross(&tri_norm);
            edge_norms.push(xp.try_normalize(1e-12).unwrap_or_else(Vector3::zeros));
            v0 = v1;
        }
        (0..boundary.len())
            .map(|e0| {
                let e1 = (e0 + 1) % boundary.len();
                let dir = edge_norms[e0] + edge_norms[e1];
                dir.try_normalize(1e-12).unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }

    /// Trace a fold consisting only of edges whose facet normals differ by
    /// more than 60 degrees, starting from the given vertex. `norms` must be
    /// built from a single unified tri-only surface. `done` must be sized to
    /// the vertex count; it marks visited vertices and prevents re-traversal
    /// across calls.
    pub fn trace_fold(
        &self,
        norms: &MeshNormals,
        done: &mut [bool],
        vert_idx: u32,
    ) -> BTreeSet<u32> {
        debug_assert_eq!(done.len(), self.verts.len());
        let facet = &norms.facet[0];
        let mut ret = BTreeSet::new();
        // Iterative traversal; call-stack recursion would risk overflow on
        // long folds of large meshes
        let mut stack = vec![vert_idx];
        while let Some(vv) = stack.pop() {
            if done[vv as usize] {
                continue;
            }
            done[vv as usize] = true;
            for &ei in &self.verts[vv as usize].edge_inds {
                let edge = &self.edges[ei as usize];
                if edge.tri_inds.len() == 2 {
                    // Can not be part of a fold otherwise
                    let n0 = facet.tri_equivs[edge.tri_inds[0] as usize];
                    let n1 = facet.tri_equivs[edge.tri_inds[1] as usize];
                    if n0.dot(&n1) < 0.5 {
                        ret.insert(vv);
                        stack.push(edge.other_vert_idx(vv));
                    }
                }
            }
        }
        ret
    }

    /// Counts of (boundary edges, edges shared by >2 tris, edges whose two
    /// tris wind the same direction). All zero means watertight manifold;
    /// last two zero means manifold.
    pub fn is_manifold(&self) -> [u32; 3] {
        let mut ret = [0u32; 3];
        for (ee, edge) in self.edges.iter().enumerate() {
            if edge.tri_inds.len() == 1 {
                ret[0] += 1;
            } else if edge.tri_inds.len() > 2 {
                ret[1] += 1;
            } else {
                // Well-wound facets traverse a shared edge in opposite
                // directions. Some producers get this wrong, so the count is
                // reported rather than asserted.
                let tri0 = &self.tris[edge.tri_inds[0] as usize];
                let tri1 = &self.tris[edge.tri_inds[1] as usize];
                let rel0 = tri0.edge_inds.iter().position(|&e| e == ee as u32);
                let rel1 = tri1.edge_inds.iter().position(|&e| e == ee as u32);
                if let (Some(rel0), Some(rel1)) = (rel0, rel1) {
                    if tri0.edge(rel0) == tri1.edge(rel1) {
                        ret[2] += 1;
                    }
                }
            }
        }
        ret
    }

    /// Number of vertices referenced by no triangle
    pub fn unused_verts(&self) -> usize {
        self.verts.iter().filter(|v| v.tri_inds.is_empty()).count()
    }

    /// Minimum distance along mesh edges from the seed vertex to every
    /// vertex. Unconnected vertices keep `f32::MAX`.
    pub fn edge_distance_map(&self, verts: &[Point3<f32>], vert_idx: usize) -> Vec<f32> {
        debug_assert!(vert_idx < verts.len());
        let mut ret = vec![f32::MAX; verts.len()];
        ret[vert_idx] = 0.0;
        self.edge_distance_map_from(verts, &mut ret);
        ret
    }

    /// As above where `dists` has at least 1 distance defined and the rest
    /// set to `f32::MAX`. Full-pass relaxation until no update; O(V*E) worst
    /// case but simple and adequate for mesh sizes here.
    pub fn edge_distance_map_from(&self, verts: &[Point3<f32>], dists: &mut [f32]) {
        debug_assert_eq!(verts.len(), self.verts.len());
        debug_assert_eq!(dists.len(), verts.len());
        let mut done = false;
        while !done {
            done = true;
            for vv in 0..dists.len() {
                // Check each vertex each pass: the first assignment reaching
                // a vertex is often not the optimal one
                if dists[vv] < f32::MAX {
                    for &ee in &self.verts[vv].edge_inds {
                        let neigh = self.edges[ee as usize].other_vert_idx(vv as u32) as usize;
                        let neigh_dist = dists[vv] + (verts[neigh] - verts[vv]).norm();
                        if neigh_dist < dists[neigh] {
                            dists[neigh] = neigh_dist;
                            done = false;
                        }
                    }
                }
            }
        }
    }

    fn opposite_vert(&self, tri_idx: u32, edge_idx: u32) -> u32 {
        let tri = self.tris[tri_idx as usize].vert_inds;
        let vert_inds = self.edges[edge_idx as usize].vert_inds;
        for &vi in &tri {
            if vi != vert_inds[0] && vi != vert_inds[1] {
                return vi;
            }
        }
        debug_assert!(false, "edge not part of tri");
        tri[0]
    }
}

/// Indices of all vertices connected to `seed_idx` within a region bounded by
/// the mesh's marked vertices, including the bounding marked vertices
pub fn fill_marked_vert_region(mesh: &Mesh, topo: &SurfTopo, seed_idx: u32) -> BTreeSet<u32> {
    debug_assert!((seed_idx as usize) < topo.verts.len());
    let mut ret: BTreeSet<u32> = mesh.marked_verts.iter().map(|mv| mv.idx).collect();
    let mut todo: BTreeSet<u32> = BTreeSet::new();
    todo.insert(seed_idx);
    while !todo.is_empty() {
        let mut next = BTreeSet::new();
        for idx in todo {
            if !ret.contains(&idx) {
                for n in topo.vert_neighbours(idx) {
                    next.insert(n);
                }
                ret.insert(idx);
            }
        }
        todo = next;
    }
    ret
}
