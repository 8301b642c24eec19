// Bucket fill: 4-connected flood fill over the grid's pixels.
use crate::{
    common::{is_valid_color, ColorIdx, PixelCoord, TILE_SIZE},
    grid::{PixelPoint, TileGridProvider},
    tileset::TileSet,
};

use super::{read_pixel, PixelEdits};

/// Floods the 4-connected region of same-colored pixels around `seed`.
/// Cells without a resolvable tile act as walls.
pub fn bucket_fill<G: TileGridProvider + ?Sized>(
    grid: &G,
    tileset: &TileSet,
    seed: PixelPoint,
    color: ColorIdx,
    clamp_to_tile: bool,
) -> PixelEdits {
    let mut edits = PixelEdits::default();
    if !is_valid_color(color) {
        return edits;
    }
    let Some(start) = read_pixel(grid, tileset, seed) else {
        return edits;
    };
    let target = start.color;
    if target == color {
        return edits;
    }

    // Bounds of the walk as [x0, x1) x [y0, y1).
    let (x0, y0, x1, y1) = if clamp_to_tile {
        let x0 = (start.info.column * TILE_SIZE) as PixelCoord;
        let y0 = (start.info.row * TILE_SIZE) as PixelCoord;
        (x0, y0, x0 + TILE_SIZE as PixelCoord, y0 + TILE_SIZE as PixelCoord)
    } else {
        (
            0,
            0,
            grid.pixel_width() as PixelCoord,
            grid.pixel_height() as PixelCoord,
        )
    };
    let width = (x1 - x0) as usize;
    let mut visited = vec![false; width * (y1 - y0) as usize];

    let mut stack = vec![seed];
    while let Some(p) = stack.pop() {
        if p.x < x0 || p.y < y0 || p.x >= x1 || p.y >= y1 {
            continue;
        }
        let v = (p.y - y0) as usize * width + (p.x - x0) as usize;
        if visited[v] {
            continue;
        }
        visited[v] = true;
        let Some(sample) = read_pixel(grid, tileset, p) else {
            continue;
        };
        if sample.color != target {
            continue;
        }
        edits.push(&sample.info, sample.tile_xy, color);
        stack.extend([
            PixelPoint::new(p.x - 1, p.y),
            PixelPoint::new(p.x + 1, p.y),
            PixelPoint::new(p.x, p.y - 1),
            PixelPoint::new(p.x, p.y + 1),
        ]);
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::TILE_PIXELS, tilemap::TileMap};

    #[test]
    fn test_fill_blank_single_tile() {
        let mut ts = TileSet::with_blank_tiles(1, 1).unwrap();
        let result = bucket_fill(&ts, &ts, PixelPoint::new(4, 4), 5, false).apply(&mut ts);
        assert_eq!(result.edits.len(), TILE_PIXELS);
        assert!(ts.get(0).unwrap().pixels().iter().flatten().all(|&c| c == 5));
    }

    #[test]
    fn test_fill_stops_at_boundary_color() {
        let mut ts = TileSet::with_blank_tiles(1, 1).unwrap();
        {
            let tile = ts.get_mut(0).unwrap();
            for y in 0..8 {
                tile.set_pixel(3, y, 1).unwrap();
            }
        }
        bucket_fill(&ts, &ts, PixelPoint::new(0, 0), 2, false).apply(&mut ts);
        let tile = ts.get(0).unwrap();
        assert_eq!(tile.get_pixel(2, 7), Ok(2));
        assert_eq!(tile.get_pixel(3, 0), Ok(1));
        assert_eq!(tile.get_pixel(4, 0), Ok(0));
    }

    #[test]
    fn test_fill_is_four_connected() {
        let mut ts = TileSet::with_blank_tiles(1, 1).unwrap();
        {
            // A diagonal wall of 1s separates the top-left corner.
            let tile = ts.get_mut(0).unwrap();
            tile.set_pixel(1, 0, 1).unwrap();
            tile.set_pixel(0, 1, 1).unwrap();
        }
        let result = bucket_fill(&ts, &ts, PixelPoint::new(0, 0), 2, false).apply(&mut ts);
        assert_eq!(result.edits.len(), 1);
    }

    #[test]
    fn test_fill_crosses_tiles_when_unclamped() {
        let mut ts = TileSet::with_blank_tiles(2, 2).unwrap();
        let result = bucket_fill(&ts, &ts, PixelPoint::new(1, 1), 3, false).apply(&mut ts);
        assert_eq!(result.affected_tile_indices, vec![0, 1]);
        assert_eq!(result.edits.len(), 128);
    }

    #[test]
    fn test_fill_clamped_to_seed_tile() {
        let mut ts = TileSet::with_blank_tiles(4, 2).unwrap();
        let result = bucket_fill(&ts, &ts, PixelPoint::new(9, 9), 3, true).apply(&mut ts);
        assert_eq!(result.affected_tile_indices, vec![3]);
        for i in 0..3 {
            assert!(ts.get(i).unwrap().pixels().iter().flatten().all(|&c| c == 0));
        }
    }

    #[test]
    fn test_fill_with_seed_color_is_noop() {
        let ts = TileSet::with_blank_tiles(1, 1).unwrap();
        assert!(bucket_fill(&ts, &ts, PixelPoint::new(0, 0), 0, false).is_empty());
        assert!(bucket_fill(&ts, &ts, PixelPoint::new(0, 0), 16, false).is_empty());
        assert!(bucket_fill(&ts, &ts, PixelPoint::new(-1, 0), 4, false).is_empty());
    }

    #[test]
    fn test_fill_through_aliased_cells() {
        // Both cells show the same tile; filling one paints the shared tile once
        // per cell, and both cells are reported.
        let mut ts = TileSet::with_blank_tiles(1, 1).unwrap();
        let id = ts.get(0).unwrap().id();
        let map = TileMap::new("m", 1, 2, id).unwrap();
        let result = bucket_fill(&map, &ts, PixelPoint::new(0, 0), 4, false).apply(&mut ts);
        assert_eq!(result.affected_tile_indices, vec![0, 1]);
        assert_eq!(result.affected_tile_ids, vec![id]);
        assert!(ts.by_id(id).unwrap().pixels().iter().flatten().all(|&c| c == 4));
    }
}
