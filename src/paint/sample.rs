// Eyedropper tools. These only read the model.
use crate::{
    common::ColorIdx,
    grid::{PixelPoint, TileGridProvider, TileInfo},
    tileset::TileSet,
};

use super::read_pixel;

/// Color index displayed at grid pixel `p`, honoring the cell's flip.
pub fn pick_color<G: TileGridProvider + ?Sized>(grid: &G, tileset: &TileSet, p: PixelPoint) -> Option<ColorIdx> {
    read_pixel(grid, tileset, p).map(|s| s.color)
}

/// The cell under grid pixel `p`, including its placement attributes.
pub fn pick_tile<G: TileGridProvider + ?Sized>(grid: &G, p: PixelPoint) -> Option<TileInfo> {
    grid.tile_info_by_pixel(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tile::Flip, tilemap::TileMap};

    #[test]
    fn test_pick_color_flipped() {
        let mut ts = TileSet::with_blank_tiles(1, 1).unwrap();
        ts.get_mut(0).unwrap().set_pixel(0, 0, 9).unwrap();
        let id = ts.get(0).unwrap().id();
        let mut map = TileMap::new("m", 1, 2, id).unwrap();
        map.get_mut(0, 1).unwrap().flip = Flip::Horizontal;

        assert_eq!(pick_color(&map, &ts, PixelPoint::new(0, 0)), Some(9));
        assert_eq!(pick_color(&map, &ts, PixelPoint::new(15, 0)), Some(9));
        assert_eq!(pick_color(&map, &ts, PixelPoint::new(8, 0)), Some(0));
        assert_eq!(pick_color(&map, &ts, PixelPoint::new(16, 0)), None);
    }

    #[test]
    fn test_pick_tile() {
        let ts = TileSet::with_blank_tiles(3, 2).unwrap();
        let info = pick_tile(&ts, PixelPoint::new(3, 12)).unwrap();
        assert_eq!(info.index, 2);
        assert_eq!(info.tile_id, ts.get(2).unwrap().id());
        // Empty tail slot.
        assert_eq!(pick_tile(&ts, PixelPoint::new(12, 12)), None);
    }
}
