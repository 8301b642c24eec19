// Paint tools. Pixel tools build a `PixelEdits` plan that is applied to the
// tile set afterwards; cell tools edit a tile map directly.

mod brush;
mod cells;
mod fill;
mod sample;

pub use brush::{brush, brush_footprint, color_replace, BrushOptions, Pattern, PatternOrigin};
pub use cells::{paint_palette_block, stamp};
pub use fill::bucket_fill;
pub use sample::{pick_color, pick_tile};

use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    common::ColorIdx,
    grid::{PixelPoint, TileGridProvider, TileInfo},
    message::ChangeNotification,
    tile::{TileId, TilePixels},
    tilemap::TileMapTile,
    tileset::TileSet,
};

pub const MAX_BRUSH_SIZE: u32 = 50;

/// One planned pixel write, in the referenced tile's own (unflipped) pixel space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelEdit {
    pub tile_index: usize,
    pub tile_id: TileId,
    pub x: usize,
    pub y: usize,
    pub color: ColorIdx,
}

#[derive(Clone, Debug, Default)]
pub struct PixelEdits {
    edits: Vec<PixelEdit>,
}

impl PixelEdits {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PixelEdit> {
        self.edits.iter()
    }

    fn push(&mut self, info: &TileInfo, (x, y): (usize, usize), color: ColorIdx) {
        self.edits.push(PixelEdit {
            tile_index: info.index,
            tile_id: info.tile_id,
            x,
            y,
            color,
        });
    }

    /// Writes the plan into `tileset`. Edits that would not change the
    /// pre-stroke pixel, or whose tile no longer resolves, are dropped.
    pub fn apply(self, tileset: &mut TileSet) -> PaintResult {
        let mut previous: HashMap<TileId, TilePixels> = HashMap::new();
        let mut order: Vec<TileId> = vec![];
        let mut kept: Vec<PixelEdit> = vec![];
        for edit in self.edits {
            let Some(tile) = tileset.by_id_mut(edit.tile_id) else {
                continue;
            };
            let before = previous.entry(edit.tile_id).or_insert_with(|| {
                order.push(edit.tile_id);
                tile.pixels
            });
            if before[edit.y][edit.x] == edit.color {
                continue;
            }
            tile.pixels[edit.y][edit.x] = edit.color;
            kept.push(edit);
        }

        let touched: Vec<TileId> = kept.iter().map(|e| e.tile_id).unique().collect();
        PaintResult {
            affected_tile_indices: kept.iter().map(|e| e.tile_index).sorted().dedup().collect(),
            affected_tile_ids: touched.iter().copied().sorted().collect(),
            previous_pixels: order
                .into_iter()
                .filter(|id| touched.contains(id))
                .map(|id| (id, previous[&id]))
                .collect(),
            previous_cells: vec![],
            created_tile_ids: vec![],
            edits: kept,
        }
    }
}

/// Outcome of a paint operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaintResult {
    pub affected_tile_indices: Vec<usize>,
    pub affected_tile_ids: Vec<TileId>,
    // Pre-stroke pixel data of every modified tile.
    pub previous_pixels: Vec<(TileId, TilePixels)>,
    // Pre-edit contents of every modified tile map cell.
    pub previous_cells: Vec<(usize, TileMapTile)>,
    // Tiles created by the operation (link-break clones).
    pub created_tile_ids: Vec<TileId>,
    pub edits: Vec<PixelEdit>,
}

impl PaintResult {
    pub fn is_empty(&self) -> bool {
        self.affected_tile_indices.is_empty() && self.affected_tile_ids.is_empty()
    }

    pub fn previous_pixels_of(&self, id: TileId) -> Option<&TilePixels> {
        self.previous_pixels
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, p)| p)
    }

    pub fn notification(&self) -> ChangeNotification {
        if self.is_empty() {
            return ChangeNotification::default();
        }
        ChangeNotification {
            updated_tile_indexes: Some(self.affected_tile_indices.clone()),
            updated_tile_ids: Some(self.affected_tile_ids.clone()),
            redraw_full: false,
        }
    }
}

/// State captured when the pointer goes down, shared by every step of a stroke.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stroke {
    pub origin: PixelPoint,
    // Cell under the pointer at stroke start, used by `clamp_to_tile`.
    pub tile_index: Option<usize>,
    // Color under the pointer at stroke start, used by color replace.
    pub start_color: Option<ColorIdx>,
}

impl Stroke {
    pub fn begin<G: TileGridProvider + ?Sized>(grid: &G, tileset: &TileSet, origin: PixelPoint) -> Self {
        let sampled = read_pixel(grid, tileset, origin);
        Stroke {
            origin,
            tile_index: grid.tile_index_by_pixel(origin),
            start_color: sampled.map(|s| s.color),
        }
    }
}

pub(crate) struct SampledPixel {
    pub info: TileInfo,
    pub tile_xy: (usize, usize),
    pub color: ColorIdx,
}

// Reads the color displayed at grid pixel `p`, or `None` if the pixel is
// outside the grid, in an empty slot, or its cell references a missing tile.
pub(crate) fn read_pixel<G: TileGridProvider + ?Sized>(
    grid: &G,
    tileset: &TileSet,
    p: PixelPoint,
) -> Option<SampledPixel> {
    let info = grid.tile_info_by_pixel(p)?;
    let tile = tileset.by_id(info.tile_id)?;
    let tile_xy = info.tile_pixel(p);
    Some(SampledPixel {
        info,
        tile_xy,
        color: tile.pixels()[tile_xy.1][tile_xy.0],
    })
}
