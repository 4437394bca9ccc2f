use argh::FromArgs;
use std::path::PathBuf;

use panomesh::{
    geometry::io::write_mesh, io::functional as F, Pipeline, PipelineConfig, StrategyKind,
};

#[derive(FromArgs)]
/// Reconstruct a colored mesh from a panorama and its depth map
struct Args {
    /// path to the color panorama
    #[argh(option, short = 'c')]
    color: PathBuf,

    /// path to the depth map, larger values meaning farther away
    #[argh(option, short = 'd')]
    depth: PathBuf,

    /// output mesh, .ply or .obj
    #[argh(option, short = 'o', default = "PathBuf::from(\"mesh.ply\")")]
    output: PathBuf,

    /// optional JSON configuration file
    #[argh(option)]
    config: Option<PathBuf>,

    /// reconstruction strategy: radial-slice, global-delaunay or poisson
    #[argh(option, short = 's')]
    strategy: Option<StrategyKind>,

    /// number of radial slices
    #[argh(option)]
    num_slices: Option<usize>,

    /// world units per pixel row
    #[argh(option)]
    vertical_scale: Option<f64>,

    /// also write a normalized preview of the depth map
    #[argh(option)]
    depth_preview: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(num_slices) = args.num_slices {
        config.num_slices = num_slices;
    }
    if let Some(vertical_scale) = args.vertical_scale {
        config.camera.vertical_scale = vertical_scale;
    }
    let pipeline = Pipeline::new(config)?;

    let color = F::read_color_image(&args.color)?;
    let depth = F::read_depth_map(&args.depth)?;
    println!("Panorama: {} color, {} depth", color.size(), depth.size());

    if let Some(path) = &args.depth_preview {
        F::write_depth_preview(path, &depth)?;
        log::info!("wrote depth preview to {}", path.display());
    }

    let mesh = pipeline.build_mesh(&color, &depth)?;
    write_mesh(&args.output, &mesh)?;

    println!(
        "Mesh: #{} vertices, #{} triangles -> {}",
        mesh.num_vertices(),
        mesh.num_triangles(),
        args.output.display()
    );

    Ok(())
}
