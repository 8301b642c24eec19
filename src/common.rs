pub type ColorValue = u8; // Color channel value (0-255)
pub type ColorIdx = u8; // Index into 4bpp palette (0-15)
pub type PaletteSlot = u8; // Index into a tile map's palette slots (0-15)
pub type PixelCoord = i32; // Grid pixel coordinate; may fall outside the grid

pub type ColorRGB = [ColorValue; 3];
pub type ColorRGBA = [ColorValue; 4];

// Tiles are always 8x8 pixels.
pub const TILE_SIZE: usize = 8;
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

pub const PALETTE_SIZE: usize = 16;
pub const MAX_PALETTE_SLOTS: usize = 16;

// Upper bound on tile rows, tile columns and tile set width, keeping pixel
// extents within `PixelCoord`.
pub const MAX_GRID_DIMENSION: usize = 4096;

pub fn is_valid_color(c: ColorIdx) -> bool {
    (c as usize) < PALETTE_SIZE
}
