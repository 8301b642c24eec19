use anyhow::{Context, Result};
use log::debug;

use crate::{
    paint::PaintResult,
    tile::{TileId, TilePixels},
    tilemap::{TileMap, TileMapTile},
    tileset::TileSet,
};

#[derive(Debug)]
pub enum UndoAction {
    None,
    Ok(UndoSnapshot),
}

/// Everything needed to revert one editing operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UndoSnapshot {
    // Tile map whose cells were edited, if any.
    pub tilemap: Option<usize>,
    pub previous_pixels: Vec<(TileId, TilePixels)>,
    pub previous_cells: Vec<(usize, TileMapTile)>,
    pub created_tile_ids: Vec<TileId>,
}

impl UndoSnapshot {
    pub fn restore(&self, tileset: &mut TileSet, tilemaps: &mut [TileMap]) -> Result<()> {
        for (id, pixels) in &self.previous_pixels {
            let tile = tileset
                .by_id_mut(*id)
                .with_context(|| format!("tile {} no longer exists", id))?;
            tile.set_pixels(*pixels)?;
        }
        if !self.previous_cells.is_empty() {
            let map_idx = self.tilemap.context("cell snapshot without a tile map")?;
            let tilemap = tilemaps
                .get_mut(map_idx)
                .with_context(|| format!("tile map {} no longer exists", map_idx))?;
            // Reverse order so that the earliest snapshot of a cell wins.
            for &(index, cell) in self.previous_cells.iter().rev() {
                tilemap.set_cell(index, cell)?;
            }
        }
        for &id in &self.created_tile_ids {
            if tileset.remove_by_id(id).is_none() {
                debug!("Created tile {} already removed", id);
            }
        }
        Ok(())
    }
}

pub fn get_undo_action(result: &PaintResult, tilemap: Option<usize>) -> UndoAction {
    if result.is_empty() {
        return UndoAction::None;
    }
    UndoAction::Ok(UndoSnapshot {
        tilemap,
        previous_pixels: result.previous_pixels.clone(),
        previous_cells: result.previous_cells.clone(),
        created_tile_ids: result.created_tile_ids.clone(),
    })
}
