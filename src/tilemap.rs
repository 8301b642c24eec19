// Tile maps: explicit grids of cells, each referencing a tile by id.
use hashbrown::HashMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    common::{PaletteSlot, MAX_GRID_DIMENSION, MAX_PALETTE_SLOTS},
    error::{check_index, GridError},
    palette::PaletteId,
    tile::{Flip, TileId},
    tileset::TileSet,
};

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileMapTile {
    pub tile_id: TileId,
    #[serde(default)]
    pub flip: Flip,
    #[serde(default)]
    pub palette_slot: PaletteSlot,
    #[serde(default)]
    pub priority: bool,
}

impl TileMapTile {
    pub fn new(tile_id: TileId) -> Self {
        TileMapTile {
            tile_id,
            flip: Flip::None,
            palette_slot: 0,
            priority: false,
        }
    }
}

/// A rectangular region of grid cells, in tile units.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileRegion {
    pub row: usize,
    pub column: usize,
    pub rows: usize,
    pub columns: usize,
}

impl TileRegion {
    // Normalizes two corner cells (in any order) into a region.
    pub fn from_corners(a: (usize, usize), b: (usize, usize)) -> Self {
        TileRegion {
            row: a.0.min(b.0),
            column: a.1.min(b.1),
            rows: a.0.abs_diff(b.0) + 1,
            columns: a.1.abs_diff(b.1) + 1,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TileMap {
    pub name: String,
    rows: usize,
    columns: usize,
    cells: Vec<TileMapTile>,
    // Indirection from per-cell palette slots to palettes.
    palette_slots: Vec<PaletteId>,
}

impl TileMap {
    pub fn new(name: &str, rows: usize, columns: usize, fill: TileId) -> Result<Self, GridError> {
        if !valid_dimensions(rows, columns) {
            return Err(GridError::InvalidDimensions { rows, columns });
        }
        Ok(TileMap {
            name: name.to_string(),
            rows,
            columns,
            cells: vec![TileMapTile::new(fill); rows * columns],
            palette_slots: vec![],
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> &[TileMapTile] {
        &self.cells
    }

    pub fn is_consistent(&self) -> bool {
        valid_dimensions(self.rows, self.columns)
            && self.rows.checked_mul(self.columns) == Some(self.cells.len())
            && self.palette_slots.len() <= MAX_PALETTE_SLOTS
    }

    fn flat_index(&self, row: usize, column: usize) -> Result<usize, GridError> {
        if row >= self.rows {
            return Err(GridError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        if column >= self.columns {
            return Err(GridError::ColumnOutOfRange {
                column,
                columns: self.columns,
            });
        }
        Ok(row * self.columns + column)
    }

    pub fn get(&self, row: usize, column: usize) -> Result<&TileMapTile, GridError> {
        let i = self.flat_index(row, column)?;
        Ok(&self.cells[i])
    }

    pub fn get_mut(&mut self, row: usize, column: usize) -> Result<&mut TileMapTile, GridError> {
        let i = self.flat_index(row, column)?;
        Ok(&mut self.cells[i])
    }

    pub fn cell(&self, index: usize) -> Result<&TileMapTile, GridError> {
        check_index(index, self.cells.len())?;
        Ok(&self.cells[index])
    }

    /// Replaces one cell, returning whether it changed.
    pub fn set_cell(&mut self, index: usize, cell: TileMapTile) -> Result<bool, GridError> {
        check_index(index, self.cells.len())?;
        let changed = self.cells[index] != cell;
        self.cells[index] = cell;
        Ok(changed)
    }

    pub fn palette_slots(&self) -> &[PaletteId] {
        &self.palette_slots
    }

    pub fn palette_for_slot(&self, slot: PaletteSlot) -> Option<PaletteId> {
        self.palette_slots.get(slot as usize).copied()
    }

    // Assigns a palette to a slot. Slots are dense: assigning slot N requires
    // slots 0..N to exist, and missing ones are filled with the same palette.
    pub fn set_palette_slot(&mut self, slot: PaletteSlot, id: PaletteId) -> Result<(), GridError> {
        let slot = slot as usize;
        if slot >= MAX_PALETTE_SLOTS {
            return Err(GridError::PaletteSlotOutOfRange(slot));
        }
        if slot >= self.palette_slots.len() {
            self.palette_slots.resize(slot + 1, id);
        }
        self.palette_slots[slot] = id;
        Ok(())
    }

    pub fn insert_row(&mut self, at: usize, fill: TileId) -> Result<(), GridError> {
        if at > self.rows {
            return Err(GridError::RowOutOfRange {
                row: at,
                rows: self.rows + 1,
            });
        }
        if self.rows == MAX_GRID_DIMENSION {
            return Err(GridError::InvalidDimensions {
                rows: self.rows + 1,
                columns: self.columns,
            });
        }
        let start = at * self.columns;
        self.cells.splice(
            start..start,
            std::iter::repeat(TileMapTile::new(fill)).take(self.columns),
        );
        self.rows += 1;
        Ok(())
    }

    pub fn remove_row(&mut self, at: usize) -> Result<Vec<TileMapTile>, GridError> {
        if at >= self.rows {
            return Err(GridError::RowOutOfRange {
                row: at,
                rows: self.rows,
            });
        }
        if self.rows == 1 {
            return Err(GridError::InvalidDimensions {
                rows: 0,
                columns: self.columns,
            });
        }
        let start = at * self.columns;
        let removed = self.cells.drain(start..start + self.columns).collect();
        self.rows -= 1;
        Ok(removed)
    }

    pub fn insert_column(&mut self, at: usize, fill: TileId) -> Result<(), GridError> {
        if at > self.columns {
            return Err(GridError::ColumnOutOfRange {
                column: at,
                columns: self.columns + 1,
            });
        }
        if self.columns == MAX_GRID_DIMENSION {
            return Err(GridError::InvalidDimensions {
                rows: self.rows,
                columns: self.columns + 1,
            });
        }
        let new_columns = self.columns + 1;
        let mut cells = Vec::with_capacity(self.rows * new_columns);
        for row in self.cells.chunks(self.columns) {
            cells.extend_from_slice(&row[..at]);
            cells.push(TileMapTile::new(fill));
            cells.extend_from_slice(&row[at..]);
        }
        self.cells = cells;
        self.columns = new_columns;
        Ok(())
    }

    pub fn remove_column(&mut self, at: usize) -> Result<Vec<TileMapTile>, GridError> {
        if at >= self.columns {
            return Err(GridError::ColumnOutOfRange {
                column: at,
                columns: self.columns,
            });
        }
        if self.columns == 1 {
            return Err(GridError::InvalidDimensions {
                rows: self.rows,
                columns: 0,
            });
        }
        let mut removed = Vec::with_capacity(self.rows);
        let mut cells = Vec::with_capacity(self.rows * (self.columns - 1));
        for row in self.cells.chunks(self.columns) {
            removed.push(row[at]);
            cells.extend_from_slice(&row[..at]);
            cells.extend_from_slice(&row[at + 1..]);
        }
        self.cells = cells;
        self.columns -= 1;
        Ok(removed)
    }

    pub fn reference_count(&self, id: TileId) -> usize {
        self.cells.iter().filter(|c| c.tile_id == id).count()
    }

    pub fn reference_counts(&self) -> HashMap<TileId, usize> {
        let mut counts = HashMap::new();
        for c in &self.cells {
            *counts.entry(c.tile_id).or_insert(0) += 1;
        }
        counts
    }

    /// Repoints every cell whose tile id does not resolve against `tileset` to
    /// `fallback`. Returns the indices of the repaired cells.
    pub fn repair_dangling(&mut self, tileset: &TileSet, fallback: TileId) -> Vec<usize> {
        let mut repaired = vec![];
        for (i, cell) in self.cells.iter_mut().enumerate() {
            if !tileset.contains(cell.tile_id) {
                warn!(
                    "Tile map {}: cell {} references missing tile {}, repointing to {}",
                    self.name, i, cell.tile_id, fallback
                );
                cell.tile_id = fallback;
                repaired.push(i);
            }
        }
        repaired
    }
}

fn valid_dimensions(rows: usize, columns: usize) -> bool {
    (1..=MAX_GRID_DIMENSION).contains(&rows) && (1..=MAX_GRID_DIMENSION).contains(&columns)
}

/// A captured rectangle of tile map cells, used as a stamp.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TileBlock {
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<TileMapTile>,
}

impl TileBlock {
    pub fn capture(tilemap: &TileMap, region: TileRegion) -> Result<Self, GridError> {
        if region.rows == 0 || region.columns == 0 {
            return Err(GridError::InvalidDimensions {
                rows: region.rows,
                columns: region.columns,
            });
        }
        // Validate the far corner first so that a partial capture is never produced.
        tilemap.flat_index(region.row + region.rows - 1, region.column + region.columns - 1)?;
        let mut cells = Vec::with_capacity(region.rows * region.columns);
        for r in 0..region.rows {
            for c in 0..region.columns {
                cells.push(*tilemap.get(region.row + r, region.column + c)?);
            }
        }
        Ok(TileBlock {
            rows: region.rows,
            columns: region.columns,
            cells,
        })
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&TileMapTile> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    // Mirrors the block as a whole: cell order is reversed along the flipped
    // axes and each cell's own flip is toggled to match.
    pub fn flipped(&self, flip: Flip) -> TileBlock {
        let mut cells = Vec::with_capacity(self.cells.len());
        for r in 0..self.rows {
            for c in 0..self.columns {
                let r1 = if flip.v() { self.rows - 1 - r } else { r };
                let c1 = if flip.h() { self.columns - 1 - c } else { c };
                let mut cell = self.cells[r1 * self.columns + c1];
                cell.flip = cell.flip.then(flip);
                cells.push(cell);
            }
        }
        TileBlock {
            rows: self.rows,
            columns: self.columns,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_map(rows: usize, columns: usize) -> TileMap {
        let mut map = TileMap::new("test", rows, columns, TileId(0)).unwrap();
        for i in 0..rows * columns {
            map.set_cell(i, TileMapTile::new(TileId(i as u32))).unwrap();
        }
        map
    }

    fn ids(map: &TileMap) -> Vec<u32> {
        map.cells().iter().map(|c| c.tile_id.0).collect()
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(TileMap::new("x", 0, 3, TileId(0)).is_err());
    }

    #[test]
    fn test_oversize_dimensions_rejected() {
        let too_big = MAX_GRID_DIMENSION + 1;
        assert_eq!(
            TileMap::new("x", too_big, 1, TileId(0)).unwrap_err(),
            GridError::InvalidDimensions {
                rows: too_big,
                columns: 1
            }
        );
        let mut map = TileMap::new("x", MAX_GRID_DIMENSION, 1, TileId(0)).unwrap();
        assert!(map.insert_row(0, TileId(0)).is_err());
        assert_eq!(map.rows(), MAX_GRID_DIMENSION);
    }

    #[test]
    fn test_consistency_with_overflowing_dimensions() {
        // rows * columns wraps to zero in usize arithmetic.
        let map = TileMap {
            name: "x".to_string(),
            rows: 1 << (usize::BITS - 2),
            columns: 4,
            cells: vec![],
            palette_slots: vec![],
        };
        assert!(!map.is_consistent());
    }

    #[test]
    fn test_get_range_errors() {
        let map = numbered_map(2, 3);
        assert_eq!(map.get(1, 2).unwrap().tile_id, TileId(5));
        assert_eq!(
            map.get(2, 0).unwrap_err(),
            GridError::RowOutOfRange { row: 2, rows: 2 }
        );
        assert_eq!(
            map.get(0, 3).unwrap_err(),
            GridError::ColumnOutOfRange {
                column: 3,
                columns: 3
            }
        );
    }

    #[test]
    fn test_insert_and_remove_row() {
        let mut map = numbered_map(2, 2);
        map.insert_row(1, TileId(9)).unwrap();
        assert_eq!(map.rows(), 3);
        assert_eq!(ids(&map), vec![0, 1, 9, 9, 2, 3]);
        let removed = map.remove_row(0).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(ids(&map), vec![9, 9, 2, 3]);
        assert!(map.is_consistent());
    }

    #[test]
    fn test_insert_and_remove_column() {
        let mut map = numbered_map(2, 2);
        map.insert_column(2, TileId(9)).unwrap();
        assert_eq!(ids(&map), vec![0, 1, 9, 2, 3, 9]);
        map.remove_column(0).unwrap();
        assert_eq!(ids(&map), vec![1, 9, 3, 9]);
        assert_eq!(map.columns(), 2);
        assert!(map.insert_column(5, TileId(0)).is_err());
    }

    #[test]
    fn test_cannot_remove_last_row() {
        let mut map = numbered_map(1, 2);
        assert!(map.remove_row(0).is_err());
        assert!(map.is_consistent());
    }

    #[test]
    fn test_palette_slots() {
        let mut map = numbered_map(1, 1);
        map.set_palette_slot(2, PaletteId(7)).unwrap();
        assert_eq!(map.palette_slots().len(), 3);
        assert_eq!(map.palette_for_slot(2), Some(PaletteId(7)));
        assert_eq!(map.palette_for_slot(3), None);
        assert_eq!(
            map.set_palette_slot(16, PaletteId(1)).unwrap_err(),
            GridError::PaletteSlotOutOfRange(16)
        );
    }

    #[test]
    fn test_reference_counts() {
        let mut map = TileMap::new("x", 2, 2, TileId(1)).unwrap();
        map.set_cell(3, TileMapTile::new(TileId(2))).unwrap();
        assert_eq!(map.reference_count(TileId(1)), 3);
        assert_eq!(map.reference_counts()[&TileId(2)], 1);
    }

    #[test]
    fn test_repair_dangling() {
        let mut ts = TileSet::new(4).unwrap();
        let a = ts.create_tile([[0; 8]; 8]);
        let mut map = TileMap::new("x", 1, 2, a).unwrap();
        map.set_cell(1, TileMapTile::new(TileId(42))).unwrap();
        assert_eq!(map.repair_dangling(&ts, a), vec![1]);
        assert_eq!(map.cell(1).unwrap().tile_id, a);
    }

    #[test]
    fn test_capture_block() {
        let map = numbered_map(3, 3);
        let block = TileBlock::capture(&map, TileRegion::from_corners((2, 2), (1, 1))).unwrap();
        assert_eq!((block.rows, block.columns), (2, 2));
        let got: Vec<u32> = block.cells.iter().map(|c| c.tile_id.0).collect();
        assert_eq!(got, vec![4, 5, 7, 8]);
        let outside = TileRegion {
            row: 2,
            column: 2,
            rows: 2,
            columns: 1,
        };
        assert!(TileBlock::capture(&map, outside).is_err());
    }

    #[test]
    fn test_flipped_block() {
        let map = numbered_map(1, 2);
        let block = TileBlock::capture(&map, TileRegion::from_corners((0, 0), (0, 1))).unwrap();
        let flipped = block.flipped(Flip::Horizontal);
        assert_eq!(flipped.cells[0].tile_id, TileId(1));
        assert_eq!(flipped.cells[0].flip, Flip::Horizontal);
        assert_eq!(flipped.flipped(Flip::Horizontal), block);
    }
}
