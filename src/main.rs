// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use eikonal_fmm::io;
use eikonal_fmm::{Mesh, Point3, Raytracer, Source, TetMesh};

#[derive(Parser)]
#[command(
    name = "eikonal-fmm",
    about = "Fast Marching Method travel times on tetrahedral meshes"
)]
struct Cli {
    /// Node coordinates (.npy, N x 3 floats)
    #[arg(long)]
    nodes: PathBuf,

    /// Cell connectivity (.npy, M x 4 integers)
    #[arg(long)]
    cells: PathBuf,

    /// Per-cell slowness: "uniform:<val>", "file:<path>", or
    /// "velocity-file:<path>"
    #[arg(long, default_value = "uniform:1.0")]
    slowness: String,

    /// Source as x,y,z[,t0[,radius]] (repeatable for multiple sources)
    #[arg(long, num_args = 1)]
    source: Vec<String>,

    /// Receiver points (.npy, K x 3 floats)
    #[arg(long, conflicts_with = "receiver")]
    receivers: Option<PathBuf>,

    /// Receiver as x,y,z (repeatable)
    #[arg(long, num_args = 1)]
    receiver: Vec<String>,

    /// Also backtrace raypaths to every receiver
    #[arg(long)]
    raypaths: bool,

    /// Output file for receiver travel times, or node times if no receivers are given (.npy)
    #[arg(short = 'o', long, default_value = "traveltimes.npy")]
    output: PathBuf,

    /// Output file for node travel times (.npy)
    #[arg(long)]
    node_times: Option<PathBuf>,

    /// Output file for raypaths (.npy, rows of path_index,x,y,z)
    #[arg(long, default_value = "raypaths.npy")]
    raypath_output: PathBuf,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Raypath step as a fraction of the local cell size
    #[arg(long)]
    raypath_step: Option<f64>,
}

fn parse_floats(s: &str, what: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated floats", what))
}

fn parse_source(s: &str) -> Result<Source<f64>> {
    let parts = parse_floats(s, "source")?;
    if !(3..=5).contains(&parts.len()) {
        bail!(
            "--source expects x,y,z[,t0[,radius]], got {} components",
            parts.len()
        );
    }
    let mut src = Source::new([parts[0], parts[1], parts[2]], parts.get(3).copied().unwrap_or(0.0));
    if let Some(&r) = parts.get(4) {
        src = src.with_radius(r);
    }
    Ok(src)
}

fn parse_point(s: &str) -> Result<Point3<f64>> {
    let parts = parse_floats(s, "receiver")?;
    if parts.len() != 3 {
        bail!("--receiver expects x,y,z, got {} components", parts.len());
    }
    Ok([parts[0], parts[1], parts[2]])
}

fn build_slowness_field(mode: &str, num_cells: usize) -> Result<Vec<f64>> {
    if let Some(val_str) = mode.strip_prefix("uniform:") {
        let val: f64 = val_str.parse().context("invalid uniform slowness value")?;
        if !val.is_finite() || val <= 0.0 {
            bail!("uniform slowness must be positive and finite, got {}", val);
        }
        return Ok(vec![val; num_cells]);
    }

    if let Some(path_str) = mode.strip_prefix("file:") {
        return io::load_slowness(Path::new(path_str), num_cells)
            .with_context(|| format!("failed to load slowness from {}", path_str));
    }

    if let Some(path_str) = mode.strip_prefix("velocity-file:") {
        let velocity = io::load_slowness(Path::new(path_str), num_cells)
            .with_context(|| format!("failed to load velocity from {}", path_str))?;
        return velocity
            .iter()
            .enumerate()
            .map(|(cell, &v)| {
                if !v.is_finite() || v <= 0.0 {
                    bail!("velocity of cell {} must be positive and finite, got {}", cell, v);
                }
                Ok(1.0 / v)
            })
            .collect();
    }

    bail!(
        "unknown --slowness mode: '{}'. Expected 'uniform:<val>', 'file:<path>', \
         or 'velocity-file:<path>'",
        mode
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.source.is_empty() {
        bail!("at least one --source must be specified");
    }
    let sources = cli
        .source
        .iter()
        .map(|s| parse_source(s))
        .collect::<Result<Vec<_>>>()?;

    let receivers: Vec<Point3<f64>> = match &cli.receivers {
        Some(path) => io::load_points(path)
            .with_context(|| format!("failed to load receivers from {}", path.display()))?,
        None => cli
            .receiver
            .iter()
            .map(|s| parse_point(s))
            .collect::<Result<Vec<_>>>()?,
    };
    if cli.raypaths && receivers.is_empty() {
        bail!("--raypaths needs at least one receiver");
    }

    let nodes = io::load_points(&cli.nodes)
        .with_context(|| format!("failed to load nodes from {}", cli.nodes.display()))?;
    let cells = io::load_cells(&cli.cells)
        .with_context(|| format!("failed to load cells from {}", cli.cells.display()))?;
    let slowness = build_slowness_field(&cli.slowness, cells.len())?;

    let start = Instant::now();
    let mesh = TetMesh::new(nodes, cells, slowness).context("invalid mesh")?;
    tracing::info!(
        nodes = mesh.num_nodes(),
        cells = mesh.num_cells(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "mesh built"
    );

    let mut tracer = Raytracer::new(mesh);
    if let Some(threads) = cli.threads {
        tracer = tracer.with_threads(threads)?;
    }
    if let Some(step) = cli.raypath_step {
        tracer = tracer.with_raypath_step(step)?;
    }

    let start = Instant::now();
    let state = tracer.solve(&sources).context("raytrace failed")?;
    tracing::info!(
        sources = sources.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "propagation finished"
    );

    if let Some(path) = &cli.node_times {
        io::save_times(path, state.times())?;
    }

    if receivers.is_empty() {
        io::save_times(&cli.output, state.times())?;
        tracing::info!(output = %cli.output.display(), "wrote node travel times");
        return Ok(());
    }

    let times = tracer.travel_times(&state, &receivers)?;
    io::save_times(&cli.output, &times)?;
    tracing::info!(
        receivers = times.len(),
        output = %cli.output.display(),
        "wrote receiver travel times"
    );

    if cli.raypaths {
        let paths = tracer
            .raypaths(&state, &sources, &receivers)
            .context("raypath backtracing failed")?;
        io::save_raypaths(&cli.raypath_output, &paths)?;
        tracing::info!(
            paths = paths.len(),
            output = %cli.raypath_output.display(),
            "wrote raypaths"
        );
    }

    tracer.recycle(state);
    Ok(())
}
