// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Surfcast CLI - software-render meshes and inspect surface topology

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::{Point3, UnitQuaternion};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use surfcast::geometry::{FacetInds, SurfTopo};
use surfcast::render::{render_with_camera, RenderOptions, RenderSurfPoints};
use surfcast::{CameraParams, Mesh, RgbaF, Surf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "surfcast")]
#[command(about = "Surfcast - ray-casting mesh renderer and topology inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an STL mesh to a PNG image
    Render {
        /// Input STL file
        input: PathBuf,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Render every STL file under a directory
    Batch {
        /// Input directory, searched recursively
        dir: PathBuf,

        /// Output directory for PNG images
        #[arg(short, long, default_value = "renders")]
        out: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Report manifold counts, boundary loops and unused vertices
    Topology {
        /// Input STL file
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args, Clone)]
struct ViewArgs {
    /// Image width in pixels
    #[arg(long, default_value = "512")]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value = "512")]
    height: u32,

    /// Field of view of the larger image dimension (degrees)
    #[arg(long, default_value = "17.0")]
    fov: f64,

    /// Model yaw around Y (degrees)
    #[arg(long, default_value = "0.0")]
    yaw: f64,

    /// Model pitch around X (degrees)
    #[arg(long, default_value = "0.0")]
    pitch: f64,

    /// Anti-alias bit depth [1,8]
    #[arg(long, default_value = "3")]
    aa: u32,

    /// Opaque background grey level [0,1] (default transparent)
    #[arg(long)]
    bg: Option<f32>,

    /// Ignore texture maps and render raw geometry
    #[arg(long)]
    no_maps: bool,

    /// Force specular highlights on all surfaces
    #[arg(long)]
    shiny: bool,

    /// Composite labelled surface points onto the image
    #[arg(long)]
    points: bool,

    /// Write projected surface point records to a JSON file
    #[arg(long)]
    landmarks: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Render { input, output, view } => render_command(input, output, view, cli.verbose),
        Commands::Batch { dir, out, view } => batch_command(dir, out, view, cli.verbose),
        Commands::Topology { input } => topology_command(input),
        Commands::Version => {
            println!("surfcast v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_stl(path: &Path) -> Result<Mesh> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open STL file: {}", path.display()))?;
    let stl = stl_io::read_stl(&mut file)
        .with_context(|| format!("Failed to read STL file: {}", path.display()))?;
    let verts: Vec<Point3<f32>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0], v[1], v[2]))
        .collect();
    let tris: Vec<[u32; 3]> = stl
        .faces
        .iter()
        .map(|f| {
            [
                f.vertices[0] as u32,
                f.vertices[1] as u32,
                f.vertices[2] as u32,
            ]
        })
        .collect();
    Ok(Mesh::new(verts, vec![Surf::from_tris(FacetInds::new(tris))]))
}

fn render_options(view: &ViewArgs) -> RenderOptions {
    RenderOptions {
        background_color: match view.bg {
            Some(g) => RgbaF::new(g, g, g, 1.0),
            None => RgbaF::TRANSPARENT,
        },
        anti_alias_bit_depth: view.aa.clamp(1, 8),
        render_surf_points: if view.points {
            RenderSurfPoints::WhenVisible
        } else {
            RenderSurfPoints::Never
        },
        use_maps: !view.no_maps,
        all_shiny: view.shiny,
        ..Default::default()
    }
}

fn render_one(input: &Path, output: &Path, view: &ViewArgs, verbose: bool) -> Result<()> {
    let mesh = load_stl(input)?;
    if verbose {
        println!(
            "Loaded {}: {} verts, {} tri equivalents",
            input.display(),
            mesh.vertex_count(),
            mesh.num_tri_equivs()
        );
    }
    let dims = [view.width, view.height];
    let mut params = CameraParams::new(mesh.bounding_box());
    params.fov_max_deg = view.fov;
    params.pose = UnitQuaternion::from_euler_angles(
        view.pitch.to_radians(),
        view.yaw.to_radians(),
        0.0,
    );
    let camera = params.camera(dims);
    let start = std::time::Instant::now();
    let meshes = [mesh];
    let (img, spps) = render_with_camera(dims, &meshes, &camera, &render_options(view))?;
    if verbose {
        println!("Rendered in {:.2?}", start.elapsed());
    }
    img.save(output)
        .with_context(|| format!("Failed to write image: {}", output.display()))?;
    if let Some(lm_path) = &view.landmarks {
        let file = File::create(lm_path)
            .with_context(|| format!("Failed to create landmark file: {}", lm_path.display()))?;
        serde_json::to_writer_pretty(file, &spps)?;
    }
    Ok(())
}

fn render_command(input: &Path, output: &Path, view: &ViewArgs, verbose: bool) -> Result<()> {
    render_one(input, output, view, verbose)?;
    println!("{} {}", "Rendered".green().bold(), output.display());
    Ok(())
}

fn batch_command(dir: &Path, out: &Path, view: &ViewArgs, verbose: bool) -> Result<()> {
    let inputs: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("stl"))
        })
        .map(|e| e.into_path())
        .collect();
    if inputs.is_empty() {
        bail!("No STL files found under {}", dir.display());
    }
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {}", out.display()))?;
    let progress = ProgressBar::new(inputs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    // One independent render job per file; no shared mutable state
    let results: Vec<(PathBuf, Result<()>)> = inputs
        .par_iter()
        .map(|input| {
            let name = input.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
            let mut output = out.join(name);
            output.set_extension("png");
            let res = render_one(input, &output, view, false);
            progress.inc(1);
            (input.clone(), res)
        })
        .collect();
    progress.finish_and_clear();
    let mut failed = 0usize;
    for (input, res) in &results {
        match res {
            Ok(()) => {
                if verbose {
                    println!("{} {}", "ok".green(), input.display());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {:#}", "failed".red().bold(), input.display(), e);
            }
        }
    }
    println!(
        "{} {}/{} rendered",
        "Batch complete:".bold(),
        results.len() - failed,
        results.len()
    );
    if failed > 0 {
        bail!("{} renders failed", failed);
    }
    Ok(())
}

fn topology_command(input: &Path) -> Result<()> {
    let mesh = load_stl(input)?;
    let topo = SurfTopo::new(mesh.vertex_count(), &mesh.all_tri_equivs())?;
    let [boundary, multi, rewound] = topo.is_manifold();
    println!("{}", input.display().to_string().bold());
    println!("  verts: {} ({} unused)", topo.verts.len(), topo.unused_verts());
    println!("  tris:  {}", topo.tris.len());
    println!("  edges: {}", topo.edges.len());
    if topo.dropped_degenerate + topo.dropped_duplicate > 0 {
        println!(
            "  {} {} degenerate, {} duplicate tris dropped",
            "warning:".yellow().bold(),
            topo.dropped_degenerate,
            topo.dropped_duplicate
        );
    }
    if boundary + multi + rewound == 0 {
        println!("  {}", "watertight manifold".green());
    } else {
        println!("  boundary edges:        {}", boundary);
        println!("  edges with >2 tris:    {}", multi);
        println!("  inconsistently wound:  {}", rewound);
    }
    let loops = topo.boundaries();
    if !loops.is_empty() {
        println!("  boundary loops: {}", loops.len());
        for (ii, l) in loops.iter().enumerate() {
            println!("    loop {}: {} edges", ii, l.len());
        }
    }
    Ok(())
}
