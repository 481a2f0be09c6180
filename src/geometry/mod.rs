// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Geometry module - mesh representation, normals and surface topology

mod bbox;
mod mesh;
mod normals;
mod topology;

pub use bbox::BoundingBox;
pub use mesh::{
    bounds_of, num_tri_equivs, FacetInds, MarkedVert, Material, Mesh, Surf, SurfPoint,
};
pub use normals::{tri_normal, FacetNormals, MeshNormals};
pub use topology::{
    direct_edge_vert_inds, fill_marked_vert_region, BoundEdge, Edge, SurfTopo, Tri, Vert,
};
