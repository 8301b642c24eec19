// Copy-on-write for tiles referenced by more than one cell.

use hashbrown::HashMap;
use log::debug;

use crate::{
    paint::{PaintResult, PixelEdit},
    tile::TileId,
    tilemap::{TileMap, TileMapTile},
    tileset::TileSet,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkBreakResult {
    pub new_tile_ids: Vec<TileId>,
    // Cells of the edited map that now reference a clone.
    pub remapped_cells: Vec<usize>,
    // Contents of the remapped cells before they were repointed.
    pub previous_cells: Vec<(usize, TileMapTile)>,
}

impl LinkBreakResult {
    pub fn is_empty(&self) -> bool {
        self.new_tile_ids.is_empty()
    }

    /// Folds the clones and remapped cells into `result`.
    pub fn extend_paint_result(&self, result: &mut PaintResult) {
        result.affected_tile_ids.extend(&self.new_tile_ids);
        result.affected_tile_ids.sort_unstable();
        result.affected_tile_ids.dedup();
        result.previous_cells.extend(&self.previous_cells);
        result.created_tile_ids.extend(&self.new_tile_ids);
    }
}

/// Counts references to each tile across every tile map.
pub fn reference_counts(tilemaps: &[TileMap]) -> HashMap<TileId, usize> {
    let mut counts = HashMap::new();
    for map in tilemaps {
        for (id, n) in map.reference_counts() {
            *counts.entry(id).or_insert(0) += n;
        }
    }
    counts
}

fn is_shared(tileset: &TileSet, counts: &HashMap<TileId, usize>, id: TileId) -> bool {
    counts.get(&id).copied().unwrap_or(0) > 1 || tileset.by_id(id).is_some_and(|t| t.always_keep)
}

/// Resolves a pixel edit made through cells of `tilemaps[active]`. Shared
/// tiles (several references, or `always_keep`) get their pixels restored and
/// each editing cell gets a clone with its own edits.
pub fn break_links(
    tileset: &mut TileSet,
    tilemaps: &mut [TileMap],
    active: usize,
    result: &PaintResult,
) -> LinkBreakResult {
    let mut out = LinkBreakResult::default();
    if active >= tilemaps.len() || result.edits.is_empty() {
        return out;
    }
    let counts = reference_counts(tilemaps);
    let shared: Vec<TileId> = result
        .affected_tile_ids
        .iter()
        .copied()
        .filter(|&id| is_shared(tileset, &counts, id))
        .collect();
    if shared.is_empty() {
        return out;
    }

    for &id in &shared {
        if let (Some(before), Some(tile)) = (result.previous_pixels_of(id), tileset.by_id_mut(id)) {
            tile.pixels = *before;
        }
    }

    let mut per_cell: Vec<(usize, TileId, Vec<&PixelEdit>)> = vec![];
    for edit in result.edits.iter().filter(|e| shared.contains(&e.tile_id)) {
        match per_cell.iter_mut().find(|(i, _, _)| *i == edit.tile_index) {
            Some((_, _, edits)) => edits.push(edit),
            None => per_cell.push((edit.tile_index, edit.tile_id, vec![edit])),
        }
    }
    per_cell.sort_by_key(|(i, _, _)| *i);

    let map = &mut tilemaps[active];
    for (cell_index, id, edits) in per_cell {
        let Ok(&cell) = map.cell(cell_index) else {
            continue;
        };
        if cell.tile_id != id {
            continue;
        }
        let Some(new_id) = tileset.clone_tile(id) else {
            continue;
        };
        if let Some(clone) = tileset.by_id_mut(new_id) {
            for e in edits {
                clone.pixels[e.y][e.x] = e.color;
            }
        }
        let repointed = TileMapTile {
            tile_id: new_id,
            ..cell
        };
        if map.set_cell(cell_index, repointed).is_ok() {
            debug!(
                "Tile map {}: cell {} now references clone {} of shared tile {}",
                map.name, cell_index, new_id, id
            );
            out.new_tile_ids.push(new_id);
            out.remapped_cells.push(cell_index);
            out.previous_cells.push((cell_index, cell));
        }
    }
    out
}
