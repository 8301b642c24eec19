use thiserror::Error;

/// Range errors from row, column and index addressing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("row {row} out of range (0..{rows})")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("column {column} out of range (0..{columns})")]
    ColumnOutOfRange { column: usize, columns: usize },
    #[error("index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("pixel ({x}, {y}) out of tile bounds")]
    PixelOutOfRange { x: usize, y: usize },
    #[error("palette slot {0} out of range (0..16)")]
    PaletteSlotOutOfRange(usize),
    #[error("color index {0} out of range (0..16)")]
    ColorOutOfRange(u8),
    #[error("invalid grid dimensions {rows}x{columns}")]
    InvalidDimensions { rows: usize, columns: usize },
    #[error("tile width {0} out of range (1..=4096)")]
    InvalidTileWidth(usize),
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<(), GridError> {
    if index < len {
        Ok(())
    } else {
        Err(GridError::IndexOutOfRange { index, len })
    }
}
