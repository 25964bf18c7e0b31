use std::path::PathBuf;

use clap::Parser;

use crate::projection::{DEFAULT_GLOBAL_SCALE, DEFAULT_MAX_POINT_SIZE};

/// Interactive viewer for antigenic maps: titer tables, fitted point
/// clouds, and the stress between them.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Map file (JSON: antigens, sera, titer matrix, optional styling)
    pub map: PathBuf,

    /// Render without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Write the rendered frame to this PNG (implies offscreen rendering)
    #[arg(long, value_name = "PNG")]
    pub dump_render: Option<PathBuf>,

    /// Offscreen render width in pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Offscreen render height in pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Multiplier applied to every point's base size
    #[arg(long, default_value_t = DEFAULT_GLOBAL_SCALE)]
    pub global_scale: f32,

    /// Largest sprite size in pixels before oversized points are halved
    #[arg(long, default_value_t = DEFAULT_MAX_POINT_SIZE)]
    pub max_point_size: f32,
}
