use serde::{Deserialize, Serialize};

use crate::{
    common::{is_valid_color, ColorIdx, TILE_SIZE},
    error::GridError,
};

pub type TilePixels = [[ColorIdx; TILE_SIZE]; TILE_SIZE];

/// Opaque handle of a tile inside its owning `TileSet`.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Flip {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn from_hv(h: bool, v: bool) -> Self {
        match (h, v) {
            (false, false) => Flip::None,
            (true, false) => Flip::Horizontal,
            (false, true) => Flip::Vertical,
            (true, true) => Flip::Both,
        }
    }

    pub fn h(self) -> bool {
        matches!(self, Flip::Horizontal | Flip::Both)
    }

    pub fn v(self) -> bool {
        matches!(self, Flip::Vertical | Flip::Both)
    }

    // Composition of two flips (e.g. a flipped stamp over a flipped cell).
    pub fn then(self, other: Flip) -> Flip {
        Flip::from_hv(self.h() ^ other.h(), self.v() ^ other.v())
    }

    // Maps an on-screen pixel position within a cell to the position inside
    // the referenced tile's pixel data. The mapping is its own inverse.
    pub fn map_pixel(self, x: usize, y: usize) -> (usize, usize) {
        let x1 = if self.h() { TILE_SIZE - 1 - x } else { x };
        let y1 = if self.v() { TILE_SIZE - 1 - y } else { y };
        (x1, y1)
    }

    pub fn apply_to_pixels(self, pixels: TilePixels) -> TilePixels {
        let mut out = pixels;
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let (sx, sy) = self.map_pixel(x, y);
                out[y][x] = pixels[sy][sx];
            }
        }
        out
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub(crate) id: TileId,
    pub(crate) pixels: TilePixels,
    #[serde(default)]
    pub always_keep: bool,
}

impl Tile {
    pub(crate) fn new(id: TileId, pixels: TilePixels) -> Self {
        Tile {
            id,
            pixels,
            always_keep: false,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn pixels(&self) -> &TilePixels {
        &self.pixels
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Result<ColorIdx, GridError> {
        if x >= TILE_SIZE || y >= TILE_SIZE {
            return Err(GridError::PixelOutOfRange { x, y });
        }
        Ok(self.pixels[y][x])
    }

    /// Writes one pixel, returning whether the stored value changed.
    pub fn set_pixel(&mut self, x: usize, y: usize, c: ColorIdx) -> Result<bool, GridError> {
        if x >= TILE_SIZE || y >= TILE_SIZE {
            return Err(GridError::PixelOutOfRange { x, y });
        }
        if !is_valid_color(c) {
            return Err(GridError::ColorOutOfRange(c));
        }
        let changed = self.pixels[y][x] != c;
        self.pixels[y][x] = c;
        Ok(changed)
    }

    pub fn set_pixels(&mut self, pixels: TilePixels) -> Result<(), GridError> {
        if let Some(&c) = pixels.iter().flatten().find(|&&c| !is_valid_color(c)) {
            return Err(GridError::ColorOutOfRange(c));
        }
        self.pixels = pixels;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.pixels.iter().flatten().all(|&c| is_valid_color(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_pixels() -> TilePixels {
        let mut p = [[0; 8]; 8];
        for y in 0..8 {
            for x in 0..8 {
                p[y][x] = ((x + y) % 16) as u8;
            }
        }
        p[0][0] = 15;
        p
    }

    #[test]
    fn test_flip_map_is_involution() {
        for flip in [Flip::None, Flip::Horizontal, Flip::Vertical, Flip::Both] {
            for y in 0..8 {
                for x in 0..8 {
                    let (x1, y1) = flip.map_pixel(x, y);
                    assert_eq!(flip.map_pixel(x1, y1), (x, y));
                }
            }
        }
    }

    #[test]
    fn test_apply_flip_both() {
        let p = numbered_pixels();
        let flipped = Flip::Both.apply_to_pixels(p);
        assert_eq!(flipped[7][7], 15);
        assert_eq!(Flip::Both.apply_to_pixels(flipped), p);
    }

    #[test]
    fn test_flip_composition() {
        assert_eq!(Flip::Horizontal.then(Flip::Vertical), Flip::Both);
        assert_eq!(Flip::Both.then(Flip::Horizontal), Flip::Vertical);
        assert_eq!(Flip::Vertical.then(Flip::Vertical), Flip::None);
    }

    #[test]
    fn test_set_pixel_rejects_invalid() {
        let mut tile = Tile::new(TileId(1), [[0; 8]; 8]);
        assert_eq!(
            tile.set_pixel(8, 0, 1),
            Err(GridError::PixelOutOfRange { x: 8, y: 0 })
        );
        assert_eq!(tile.set_pixel(0, 0, 16), Err(GridError::ColorOutOfRange(16)));
        assert_eq!(tile.set_pixel(1, 2, 5), Ok(true));
        assert_eq!(tile.set_pixel(1, 2, 5), Ok(false));
        assert_eq!(tile.get_pixel(1, 2), Ok(5));
    }
}
