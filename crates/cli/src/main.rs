//! CLI for vtcompose - composite MVT tiles into one output tile
//!
//! This is a thin wrapper around the vtcompose-core library.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use vtcompose_core::compose::{CompositeRequest, SourceTile};
use vtcompose_core::pool::Compositor;
use vtcompose_core::tile::TileCoord;

#[derive(Parser, Debug)]
#[command(
    name = "vtcompose",
    about = "Composite Mapbox Vector Tiles into a single output tile",
    version
)]
struct Args {
    /// Target zoom level
    #[arg(value_name = "Z")]
    z: u32,

    /// Target tile column
    #[arg(value_name = "X")]
    x: u32,

    /// Target tile row
    #[arg(value_name = "Y")]
    y: u32,

    /// Source tile as z/x/y=FILE (repeatable, composited in order)
    #[arg(short, long = "tile", value_name = "SPEC", required = true)]
    tiles: Vec<String>,

    /// Output file
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// gzip the output tile
    #[arg(long)]
    gzip: bool,

    /// Worker threads (defaults to available parallelism)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Parse a `z/x/y=FILE` source tile spec.
fn parse_tile_spec(spec: &str) -> Result<(TileCoord, PathBuf)> {
    let (coord, path) = spec
        .split_once('=')
        .with_context(|| format!("invalid tile spec '{}': expected z/x/y=FILE", spec))?;

    let mut parts = coord.splitn(3, '/');
    let mut field = |name: &str| -> Result<u32> {
        let raw = parts
            .next()
            .with_context(|| format!("invalid tile spec '{}': missing '{}'", spec, name))?;
        raw.parse()
            .with_context(|| format!("invalid tile spec '{}': invalid '{}'", spec, name))
    };
    let z = field("z")?;
    let x = field("x")?;
    let y = field("y")?;

    Ok((TileCoord::new(z, x, y), PathBuf::from(path)))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    let target = TileCoord::new(args.z, args.x, args.y);

    // Read the source tiles
    let mut tiles = Vec::with_capacity(args.tiles.len());
    for spec in &args.tiles {
        let (coord, path) = parse_tile_spec(spec)?;
        let data = fs::read(&path)
            .with_context(|| format!("failed to read tile {}", path.display()))?;
        log::debug!("loaded {} ({} bytes) from {}", coord, data.len(), path.display());
        tiles.push(SourceTile::new(coord, data));
    }

    // Composite off the main thread and wait for the result
    let compositor = match args.threads {
        Some(n) => Compositor::new(n),
        None => Compositor::with_default_threads(),
    };
    let composite = compositor
        .submit(CompositeRequest { tiles, target })
        .wait()
        .with_context(|| format!("failed to composite tile {}", target))?;

    let bytes = if args.gzip {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&composite)?;
        encoder.finish().context("failed to gzip output tile")?
    } else {
        composite
    };

    fs::write(&args.output, &bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("✓ Composited {} into {}", target, args.output.display());

    Ok(())
}
