// Addressing shared by the tile set and tile maps. Pixel queries return
// `None` off the grid; row, column and index queries return `GridError`.

use crate::{
    common::{PaletteSlot, PixelCoord, TILE_SIZE},
    error::{check_index, GridError},
    tile::{Flip, TileId},
    tilemap::{TileMap, TileMapTile},
    tileset::TileSet,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: PixelCoord,
    pub y: PixelCoord,
}

impl PixelPoint {
    pub fn new(x: PixelCoord, y: PixelCoord) -> Self {
        PixelPoint { x, y }
    }
}

/// Everything needed to draw or edit one grid cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileInfo {
    pub index: usize,
    pub row: usize,
    pub column: usize,
    pub tile_id: TileId,
    pub flip: Flip,
    pub palette_slot: PaletteSlot,
    pub priority: bool,
}

impl TileInfo {
    fn from_cell(index: usize, columns: usize, cell: &TileMapTile) -> Self {
        TileInfo {
            index,
            row: index / columns,
            column: index % columns,
            tile_id: cell.tile_id,
            flip: cell.flip,
            palette_slot: cell.palette_slot,
            priority: cell.priority,
        }
    }

    // Pixel position inside the referenced tile's data for grid pixel `p`,
    // which must lie inside this cell.
    pub fn tile_pixel(&self, p: PixelPoint) -> (usize, usize) {
        let x = p.x as usize - self.column * TILE_SIZE;
        let y = p.y as usize - self.row * TILE_SIZE;
        self.flip.map_pixel(x, y)
    }
}

/// Position of a pointer relative to the grid at tile and tile-block
/// granularity. `nearest_*` values snap to insertion boundaries: a pointer in
/// the first half of a cell snaps to that cell's row/column, in the second half
/// to the next one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RowColumnInfo {
    pub row: i32,
    pub column: i32,
    pub clamped_row: usize,
    pub clamped_column: usize,
    pub nearest_row: usize,
    pub nearest_column: usize,
    pub block_row: i32,
    pub block_column: i32,
    pub clamped_block_row: usize,
    pub clamped_block_column: usize,
    pub nearest_block_row: usize,
    pub nearest_block_column: usize,
    pub is_in_bounds: bool,
}

// (raw, clamped, nearest) along one axis.
fn axis_position(pos: PixelCoord, unit: usize, count: usize) -> (i32, usize, usize) {
    let unit = unit as i32;
    let raw = pos.div_euclid(unit);
    let clamped = raw.clamp(0, count.saturating_sub(1) as i32) as usize;
    let past_half = pos.rem_euclid(unit) * 2 >= unit;
    let nearest = (raw + past_half as i32).clamp(0, count as i32) as usize;
    (raw, clamped, nearest)
}

pub trait TileGridProvider {
    fn tile_count(&self) -> usize;
    fn row_count(&self) -> usize;
    fn column_count(&self) -> usize;
    fn tile_info_by_index(&self, index: usize) -> Result<TileInfo, GridError>;

    fn pixel_width(&self) -> usize {
        self.column_count() * TILE_SIZE
    }

    fn pixel_height(&self) -> usize {
        self.row_count() * TILE_SIZE
    }

    /// Flat index of the cell at `(row, column)`, or `None` for an empty
    /// slot at the end of an implicit grid.
    fn tile_index_by_coordinate(&self, row: usize, column: usize) -> Result<Option<usize>, GridError> {
        if row >= self.row_count() {
            return Err(GridError::RowOutOfRange {
                row,
                rows: self.row_count(),
            });
        }
        if column >= self.column_count() {
            return Err(GridError::ColumnOutOfRange {
                column,
                columns: self.column_count(),
            });
        }
        let i = row * self.column_count() + column;
        Ok((i < self.tile_count()).then_some(i))
    }

    fn tile_info_by_row_column(&self, row: usize, column: usize) -> Result<Option<TileInfo>, GridError> {
        match self.tile_index_by_coordinate(row, column)? {
            Some(i) => Ok(Some(self.tile_info_by_index(i)?)),
            None => Ok(None),
        }
    }

    fn is_in_bounds(&self, p: PixelPoint) -> bool {
        p.x >= 0
            && p.y >= 0
            && (p.x as usize) < self.pixel_width()
            && (p.y as usize) < self.pixel_height()
    }

    fn tile_index_by_pixel(&self, p: PixelPoint) -> Option<usize> {
        if !self.is_in_bounds(p) {
            return None;
        }
        let row = p.y as usize / TILE_SIZE;
        let column = p.x as usize / TILE_SIZE;
        self.tile_index_by_coordinate(row, column).ok().flatten()
    }

    fn tile_info_by_pixel(&self, p: PixelPoint) -> Option<TileInfo> {
        let i = self.tile_index_by_pixel(p)?;
        self.tile_info_by_index(i).ok()
    }

    /// Top-left grid pixel of the cell at `index`.
    fn pixel_of(&self, index: usize) -> Result<PixelPoint, GridError> {
        check_index(index, self.tile_count())?;
        let columns = self.column_count();
        Ok(PixelPoint::new(
            ((index % columns) * TILE_SIZE) as PixelCoord,
            ((index / columns) * TILE_SIZE) as PixelCoord,
        ))
    }

    /// All cell indices referencing `id`.
    fn tile_id_indexes(&self, id: TileId) -> Vec<usize> {
        (0..self.tile_count())
            .filter(|&i| matches!(self.tile_info_by_index(i), Ok(info) if info.tile_id == id))
            .collect()
    }

    fn row_column_info(&self, p: PixelPoint, tiles_per_block: usize) -> RowColumnInfo {
        let tiles_per_block = tiles_per_block.max(1);
        let rows = self.row_count();
        let columns = self.column_count();
        let block_rows = rows.div_ceil(tiles_per_block);
        let block_columns = columns.div_ceil(tiles_per_block);
        let (row, clamped_row, nearest_row) = axis_position(p.y, TILE_SIZE, rows);
        let (column, clamped_column, nearest_column) = axis_position(p.x, TILE_SIZE, columns);
        let block_size = TILE_SIZE * tiles_per_block;
        let (block_row, clamped_block_row, nearest_block_row) =
            axis_position(p.y, block_size, block_rows);
        let (block_column, clamped_block_column, nearest_block_column) =
            axis_position(p.x, block_size, block_columns);
        RowColumnInfo {
            row,
            column,
            clamped_row,
            clamped_column,
            nearest_row,
            nearest_column,
            block_row,
            block_column,
            clamped_block_row,
            clamped_block_column,
            nearest_block_row,
            nearest_block_column,
            is_in_bounds: self.is_in_bounds(p),
        }
    }
}

impl TileGridProvider for TileSet {
    fn tile_count(&self) -> usize {
        self.len()
    }

    fn row_count(&self) -> usize {
        self.len().div_ceil(self.tile_width())
    }

    fn column_count(&self) -> usize {
        self.tile_width()
    }

    fn tile_info_by_index(&self, index: usize) -> Result<TileInfo, GridError> {
        let tile = self.get(index)?;
        Ok(TileInfo {
            index,
            row: index / self.tile_width(),
            column: index % self.tile_width(),
            tile_id: tile.id(),
            flip: Flip::None,
            palette_slot: 0,
            priority: false,
        })
    }

    fn tile_id_indexes(&self, id: TileId) -> Vec<usize> {
        self.index_of(id).into_iter().collect()
    }
}

impl TileGridProvider for TileMap {
    fn tile_count(&self) -> usize {
        self.cells().len()
    }

    fn row_count(&self) -> usize {
        self.rows()
    }

    fn column_count(&self) -> usize {
        self.columns()
    }

    fn tile_info_by_index(&self, index: usize) -> Result<TileInfo, GridError> {
        let cell = self.cell(index)?;
        Ok(TileInfo::from_cell(index, self.columns(), cell))
    }
}
