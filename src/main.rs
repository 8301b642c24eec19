use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use tilegrid_editor::{
    persist,
    render::{flatten, RenderCache},
    state::{ActiveGrid, EditorState},
};

/// Renders a tile map (or the tile set) of a project to a PNG file.
#[derive(Parser, Debug)]
struct Args {
    /// Project JSON file
    #[arg(long)]
    project: PathBuf,

    /// Name of the tile map to render; the tile set is rendered if omitted
    #[arg(long)]
    tilemap: Option<String>,

    /// Output pixels per grid pixel
    #[arg(long, default_value_t = 1)]
    scale: usize,

    /// Color index taken from the first palette in every palette
    #[arg(long)]
    locked_slot: Option<u8>,

    #[arg(long)]
    output: PathBuf,
}

pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let project = persist::load_project(&args.project)?;
    let mut state = EditorState::new(project, Default::default(), PathBuf::new());
    if let Some(name) = &args.tilemap {
        let idx = state
            .project
            .tilemaps
            .iter()
            .position(|m| &m.name == name)
            .with_context(|| format!("tile map {} not found", name))?;
        state.activate(ActiveGrid::TileMap(idx))?;
    }
    state.locked_slot = args.locked_slot;
    state.config.scale = args.scale.max(1);

    let render_state = state.render_state();
    let mut cache = RenderCache::new();
    cache.redraw(&render_state);
    let image = flatten(&cache, &render_state);
    info!("Rendered {}x{} image", image.width(), image.height());
    persist::save_png(&args.output, &image)?;
    Ok(())
}
