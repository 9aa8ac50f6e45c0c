//! cadre CLI - offline preview renders
//!
//! Renders TOML job files to PNG with the CPU ray tracer and reports BVH
//! statistics for the job's geometry.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use cadre_kernel_raytrace::{Renderer, SceneAccel};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod job;

use job::Job;

#[derive(Parser)]
#[command(name = "cadre")]
#[command(about = "Preview renderer for cadre scenes", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by CADRE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a job file to PNG
    Render {
        /// Path to the .toml job
        job: PathBuf,
        /// Output PNG
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,
        /// Override the job's image width
        #[arg(long)]
        width: Option<u32>,
        /// Override the job's image height
        #[arg(long)]
        height: Option<u32>,
        /// Render on the calling thread only
        #[arg(long)]
        serial: bool,
        /// Trace every triangle instead of using the BVH
        #[arg(long)]
        brute_force: bool,
    },
    /// Display scene and BVH statistics for a job file
    Info {
        /// Path to the .toml job
        job: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render {
            job,
            output,
            width,
            height,
            serial,
            brute_force,
        } => {
            let opts = RenderOpts {
                width,
                height,
                serial,
                brute_force,
            };
            render_job(&job, &output, &opts)?;
        }
        Commands::Info { job } => {
            show_info(&job)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("CADRE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct RenderOpts {
    width: Option<u32>,
    height: Option<u32>,
    serial: bool,
    brute_force: bool,
}

fn render_job(path: &Path, output: &Path, opts: &RenderOpts) -> Result<()> {
    let job = Job::load(path)?;
    let scene = job.build_scene()?;

    let width = opts.width.unwrap_or(job.render.width);
    let height = opts.height.unwrap_or(job.render.height);
    if width == 0 || height == 0 {
        anyhow::bail!("image size must be non-zero, got {width}x{height}");
    }

    let mut settings = job.settings();
    settings.parallel &= !opts.serial;
    settings.use_bvh &= !opts.brute_force;

    let camera = job.camera(width, height).context("setting up camera")?;
    let mut renderer = Renderer::new(width, height, settings)?;

    let start = Instant::now();
    renderer.render_scene(&scene, &camera);
    tracing::info!(
        width,
        height,
        triangles = scene.triangle_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rendered"
    );

    let image = renderer.image();
    let rgba = image::RgbaImage::from_raw(width, height, image.as_bytes().to_vec())
        .context("image buffer size mismatch")?;
    rgba.save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Rendered {}x{} to {}", width, height, output.display());
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let job = Job::load(path)?;
    let scene = job.build_scene()?;
    let settings = job.settings();

    println!("cadre job: {}", path.display());
    println!("  Entities: {}", scene.len());
    println!("  Triangles: {}", scene.triangle_count());

    if !scene.is_empty() {
        println!("\nScene:");
        for entity in scene.entities() {
            println!(
                "  {}: {} ({} triangles)",
                entity.id,
                entity.name,
                entity.mesh.num_triangles()
            );
        }
    }

    let start = Instant::now();
    let accel = SceneAccel::build(&scene, &settings.bvh);
    let elapsed = start.elapsed();
    let stats = accel.bvh().stats();

    println!(
        "\nBVH (leaf size {}, depth cap {}):",
        settings.bvh.max_leaf_size, settings.bvh.max_depth
    );
    println!("  Nodes: {}", stats.node_count);
    println!("  Leaves: {}", stats.leaf_count);
    println!("  Max depth: {}", stats.max_depth);
    println!("  Max leaf size: {}", stats.max_leaf_size);
    if stats.leaf_count > 0 {
        println!("  Avg leaf size: {:.2}", stats.avg_leaf_size);
    }
    if let Some(bounds) = accel.bvh().bounds() {
        println!(
            "  Bounds: [{:.3}, {:.3}, {:.3}] - [{:.3}, {:.3}, {:.3}]",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }
    println!("  Build time: {:.2?}", elapsed);

    Ok(())
}
