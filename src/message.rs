use std::path::PathBuf;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    common::{ColorIdx, PaletteSlot},
    grid::PixelPoint,
    paint::Pattern,
    tile::{Flip, TileId},
    tilemap::TileRegion,
};

/// "Which tiles changed". `redraw_full` overrides the index and id lists.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeNotification {
    pub updated_tile_indexes: Option<Vec<usize>>,
    pub updated_tile_ids: Option<Vec<TileId>>,
    pub redraw_full: bool,
}

fn union<T: Ord + Copy>(a: Option<Vec<T>>, b: Option<Vec<T>>) -> Option<Vec<T>> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(
            a.into_iter()
                .flatten()
                .chain(b.into_iter().flatten())
                .sorted()
                .dedup()
                .collect(),
        ),
    }
}

impl ChangeNotification {
    pub fn full() -> Self {
        ChangeNotification {
            redraw_full: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.redraw_full
            && self.updated_tile_indexes.as_ref().map_or(true, |v| v.is_empty())
            && self.updated_tile_ids.as_ref().map_or(true, |v| v.is_empty())
    }

    /// Combines two notifications into one covering both.
    pub fn merge(self, other: ChangeNotification) -> ChangeNotification {
        if self.redraw_full || other.redraw_full {
            return ChangeNotification::full();
        }
        ChangeNotification {
            updated_tile_indexes: union(self.updated_tile_indexes, other.updated_tile_indexes),
            updated_tile_ids: union(self.updated_tile_ids, other.updated_tile_ids),
            redraw_full: false,
        }
    }
}

/// Editing commands issued by the UI layer. Pointer positions are grid pixels
/// of the active grid.
#[derive(Debug, Clone)]
pub enum Message {
    Nothing,
    SaveProject,
    OpenProject(PathBuf),
    ActivateTileSet,
    ActivateTileMap(usize),
    AddTileMap { name: String, rows: usize, columns: usize },
    SetPaletteSlot { slot: PaletteSlot, palette_index: usize },
    SetLockedSlot(Option<ColorIdx>),
    SelectColor(ColorIdx),
    SelectSecondaryColor(ColorIdx),
    SetBrushSize(u32),
    SetClampToTile(bool),
    SetPattern(Option<Pattern>),
    SetBreakLinks(bool),
    SetTilesPerBlock(usize),
    BeginStroke(PixelPoint),
    Brush(PixelPoint),
    ColorReplace(PixelPoint),
    Fill(PixelPoint),
    EndStroke,
    CaptureStamp(TileRegion),
    SetStampFlip(Flip),
    Stamp(PixelPoint),
    PaletteBlock(PixelPoint),
    PickColor(PixelPoint),
    PickTile(PixelPoint),
    Undo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unions_lists() {
        let a = ChangeNotification {
            updated_tile_indexes: Some(vec![3, 1]),
            updated_tile_ids: None,
            redraw_full: false,
        };
        let b = ChangeNotification {
            updated_tile_indexes: Some(vec![1, 2]),
            updated_tile_ids: Some(vec![TileId(7)]),
            redraw_full: false,
        };
        let merged = a.merge(b);
        assert_eq!(merged.updated_tile_indexes, Some(vec![1, 2, 3]));
        assert_eq!(merged.updated_tile_ids, Some(vec![TileId(7)]));
        assert!(!merged.redraw_full);
    }

    #[test]
    fn test_merge_full_dominates() {
        let a = ChangeNotification {
            updated_tile_indexes: Some(vec![3]),
            ..Default::default()
        };
        let merged = a.merge(ChangeNotification::full());
        assert!(merged.redraw_full);
        assert_eq!(merged.updated_tile_indexes, None);
    }

    #[test]
    fn test_empty() {
        assert!(ChangeNotification::default().is_empty());
        assert!(ChangeNotification::default()
            .merge(ChangeNotification::default())
            .is_empty());
        assert!(!ChangeNotification::full().is_empty());
    }
}
