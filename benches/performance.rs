// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Isometry3, Point3, Vector2};
use surfcast::geometry::{FacetInds, SurfTopo};
use surfcast::render::{render_soft, AxAffine2, RenderOptions};
use surfcast::{Mesh, Surf};

// Regular grid patch: (dim+1)^2 verts, 2*dim^2 tris
fn grid_mesh(dim: u32) -> (Vec<Point3<f32>>, Vec<[u32; 3]>) {
    let dimp = dim + 1;
    let mut verts = Vec::with_capacity((dimp * dimp) as usize);
    for yy in 0..dimp {
        for xx in 0..dimp {
            verts.push(Point3::new(xx as f32, yy as f32, 0.0));
        }
    }
    let mut tris = Vec::with_capacity((2 * dim * dim) as usize);
    for yy in 0..dim {
        for xx in 0..dim {
            let i = yy * dimp + xx;
            tris.push([i, i + 1, i + dimp]);
            tris.push([i + 1, i + dimp + 1, i + dimp]);
        }
    }
    (verts, tris)
}

fn bench_topology(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology");
    for dim in [32u32, 100] {
        let (verts, tris) = grid_mesh(dim);
        group.bench_with_input(BenchmarkId::new("build", dim), &tris, |b, tris| {
            b.iter(|| SurfTopo::new(black_box(verts.len()), black_box(tris)).unwrap());
        });
        let topo = SurfTopo::new(verts.len(), &tris).unwrap();
        group.bench_with_input(BenchmarkId::new("boundaries", dim), &topo, |b, topo| {
            b.iter(|| black_box(topo).boundaries());
        });
        group.bench_with_input(
            BenchmarkId::new("edge_distance_map", dim),
            &topo,
            |b, topo| {
                b.iter(|| black_box(topo).edge_distance_map(&verts, 0));
            },
        );
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let (mut verts, tris) = grid_mesh(32);
    // Push the patch in front of the camera, centred
    for v in &mut verts {
        *v = Point3::new(v.x - 16.0, v.y - 16.0, -40.0);
    }
    let mesh = Mesh::new(verts, vec![Surf::from_tris(FacetInds::new(tris))]);
    let meshes = [mesh];
    let itcs_to_iucs = AxAffine2::new(Vector2::new(0.5, 0.5), Vector2::new(0.5, 0.5));
    for dim in [64u32, 128] {
        group.bench_function(BenchmarkId::new("soft", dim), |b| {
            b.iter(|| {
                render_soft(
                    black_box([dim, dim]),
                    &meshes,
                    Isometry3::identity(),
                    itcs_to_iucs,
                    &RenderOptions::default(),
                )
                .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_topology, bench_render);
criterion_main!(benches);
