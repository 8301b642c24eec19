// Cell-level tools: tile stamp and palette-block paint.
use crate::{
    common::{PaletteSlot, MAX_PALETTE_SLOTS},
    grid::{PixelPoint, TileGridProvider},
    tilemap::{TileBlock, TileMap, TileMapTile},
};

use super::PaintResult;

// Writes `cells` into the map and records which ones changed.
fn write_cells(tilemap: &mut TileMap, cells: impl IntoIterator<Item = (usize, TileMapTile)>) -> PaintResult {
    let mut result = PaintResult::default();
    for (index, cell) in cells {
        let Ok(&before) = tilemap.cell(index) else {
            continue;
        };
        if let Ok(true) = tilemap.set_cell(index, cell) {
            result.previous_cells.push((index, before));
            result.affected_tile_indices.push(index);
            if !result.affected_tile_ids.contains(&cell.tile_id) {
                result.affected_tile_ids.push(cell.tile_id);
            }
        }
    }
    result.affected_tile_indices.sort_unstable();
    result.affected_tile_ids.sort_unstable();
    result
}

/// Copies `block` onto the map with its top-left cell at the tile under `at`,
/// clipped to the map.
pub fn stamp(tilemap: &mut TileMap, block: &TileBlock, at: PixelPoint) -> PaintResult {
    let info = tilemap.row_column_info(at, 1);
    let rows = tilemap.rows() as i64;
    let columns = tilemap.columns() as i64;
    let mut cells = vec![];
    for r in 0..block.rows {
        for c in 0..block.columns {
            let row = info.row as i64 + r as i64;
            let column = info.column as i64 + c as i64;
            if row < 0 || column < 0 || row >= rows || column >= columns {
                continue;
            }
            if let Some(&cell) = block.get(r, c) {
                cells.push(((row * columns + column) as usize, cell));
            }
        }
    }
    write_cells(tilemap, cells)
}

/// Sets the palette slot of every cell in the aligned
/// `tiles_per_block`×`tiles_per_block` block containing the pixel `at`.
pub fn paint_palette_block(
    tilemap: &mut TileMap,
    at: PixelPoint,
    slot: PaletteSlot,
    tiles_per_block: usize,
) -> PaintResult {
    if slot as usize >= MAX_PALETTE_SLOTS || !tilemap.is_in_bounds(at) {
        return PaintResult::default();
    }
    let tiles_per_block = tiles_per_block.max(1);
    let info = tilemap.row_column_info(at, tiles_per_block);
    let row0 = info.clamped_block_row * tiles_per_block;
    let column0 = info.clamped_block_column * tiles_per_block;
    let row1 = (row0 + tiles_per_block).min(tilemap.rows());
    let column1 = (column0 + tiles_per_block).min(tilemap.columns());
    let columns = tilemap.columns();
    let mut cells = vec![];
    for row in row0..row1 {
        for column in column0..column1 {
            let index = row * columns + column;
            if let Ok(&cell) = tilemap.cell(index) {
                cells.push((
                    index,
                    TileMapTile {
                        palette_slot: slot,
                        ..cell
                    },
                ));
            }
        }
    }
    write_cells(tilemap, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tile::{Flip, TileId},
        tilemap::TileRegion,
    };

    fn numbered_map(rows: usize, columns: usize) -> TileMap {
        let mut map = TileMap::new("m", rows, columns, TileId(0)).unwrap();
        for i in 0..rows * columns {
            map.set_cell(i, TileMapTile::new(TileId(i as u32))).unwrap();
        }
        map
    }

    #[test]
    fn test_stamp_copies_block() {
        let source = numbered_map(2, 2);
        let block = TileBlock::capture(&source, TileRegion::from_corners((0, 0), (1, 1))).unwrap();
        let mut map = TileMap::new("dst", 3, 3, TileId(9)).unwrap();
        let result = stamp(&mut map, &block, PixelPoint::new(8, 8));
        assert_eq!(result.affected_tile_indices, vec![4, 5, 7, 8]);
        assert_eq!(result.previous_cells.len(), 4);
        assert_eq!(map.get(1, 1).unwrap().tile_id, TileId(0));
        assert_eq!(map.get(2, 2).unwrap().tile_id, TileId(3));
        assert_eq!(map.get(0, 0).unwrap().tile_id, TileId(9));
    }

    #[test]
    fn test_stamp_clipped_at_edge() {
        let source = numbered_map(2, 2);
        let block = TileBlock::capture(&source, TileRegion::from_corners((0, 0), (1, 1))).unwrap();
        let mut map = TileMap::new("dst", 2, 2, TileId(9)).unwrap();
        let result = stamp(&mut map, &block, PixelPoint::new(15, 15));
        assert_eq!(result.affected_tile_indices, vec![3]);
        assert_eq!(map.get(1, 1).unwrap().tile_id, TileId(0));

        // Anchored above-left of the map, only the bottom-right cell lands.
        let result = stamp(&mut map, &block, PixelPoint::new(-1, -1));
        assert_eq!(result.affected_tile_indices, vec![0]);
        assert_eq!(map.get(0, 0).unwrap().tile_id, TileId(3));
    }

    #[test]
    fn test_stamp_outside_is_noop() {
        let source = numbered_map(1, 1);
        let block = TileBlock::capture(&source, TileRegion::from_corners((0, 0), (0, 0))).unwrap();
        let mut map = TileMap::new("dst", 2, 2, TileId(9)).unwrap();
        assert!(stamp(&mut map, &block, PixelPoint::new(100, 0)).is_empty());
        assert!(stamp(&mut map, &block, PixelPoint::new(-9, 0)).is_empty());
    }

    #[test]
    fn test_stamp_flipped_block() {
        let source = numbered_map(1, 2);
        let block = TileBlock::capture(&source, TileRegion::from_corners((0, 0), (0, 1)))
            .unwrap()
            .flipped(Flip::Horizontal);
        let mut map = TileMap::new("dst", 1, 2, TileId(9)).unwrap();
        stamp(&mut map, &block, PixelPoint::new(0, 0));
        assert_eq!(map.get(0, 0).unwrap().tile_id, TileId(1));
        assert_eq!(map.get(0, 0).unwrap().flip, Flip::Horizontal);
        assert_eq!(map.get(0, 1).unwrap().tile_id, TileId(0));
    }

    #[test]
    fn test_stamp_identical_cells_unreported() {
        let mut map = numbered_map(2, 2);
        let block = TileBlock::capture(&map, TileRegion::from_corners((0, 0), (1, 1))).unwrap();
        assert!(stamp(&mut map, &block, PixelPoint::new(0, 0)).is_empty());
    }

    #[test]
    fn test_palette_block() {
        let mut map = numbered_map(3, 3);
        let result = paint_palette_block(&mut map, PixelPoint::new(20, 3), 5, 2);
        // Block column 1 covers column 2 only; block row 0 covers rows 0..2.
        assert_eq!(result.affected_tile_indices, vec![2, 5]);
        assert_eq!(map.get(0, 2).unwrap().palette_slot, 5);
        assert_eq!(map.get(1, 2).unwrap().palette_slot, 5);
        assert_eq!(map.get(0, 0).unwrap().palette_slot, 0);

        // Repainting with the same slot reports nothing.
        assert!(paint_palette_block(&mut map, PixelPoint::new(20, 3), 5, 2).is_empty());
    }

    #[test]
    fn test_palette_block_invalid_slot() {
        let mut map = numbered_map(2, 2);
        assert!(paint_palette_block(&mut map, PixelPoint::new(0, 0), 16, 2).is_empty());
        assert!(paint_palette_block(&mut map, PixelPoint::new(-1, 0), 1, 2).is_empty());
        assert!(map.cells().iter().all(|c| c.palette_slot == 0));
    }
}
