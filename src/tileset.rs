// The tile arena: an ordered collection of unique tiles addressed both by
// position and by id.
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    common::MAX_GRID_DIMENSION,
    error::{check_index, GridError},
    tile::{Tile, TileId, TilePixels},
};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TileSet {
    tiles: Vec<Tile>,
    // Columns per row when the tile set is laid out as a grid.
    tile_width: usize,
    #[serde(skip)]
    next_id: u32,
    #[serde(skip)]
    id_idx_map: HashMap<TileId, usize>,
}

impl PartialEq for TileSet {
    fn eq(&self, other: &Self) -> bool {
        self.tiles == other.tiles && self.tile_width == other.tile_width
    }
}

impl Default for TileSet {
    fn default() -> Self {
        TileSet {
            tiles: vec![],
            tile_width: 16,
            next_id: 0,
            id_idx_map: HashMap::new(),
        }
    }
}

impl TileSet {
    pub fn new(tile_width: usize) -> Result<Self, GridError> {
        if !(1..=MAX_GRID_DIMENSION).contains(&tile_width) {
            return Err(GridError::InvalidTileWidth(tile_width));
        }
        Ok(TileSet {
            tile_width,
            ..Default::default()
        })
    }

    /// Creates a tile set pre-filled with `count` blank tiles.
    pub fn with_blank_tiles(count: usize, tile_width: usize) -> Result<Self, GridError> {
        let mut tileset = TileSet::new(tile_width)?;
        for _ in 0..count {
            tileset.create_tile([[0; 8]; 8]);
        }
        Ok(tileset)
    }

    // Rebuilds derived state after deserialization.
    pub(crate) fn rebuild_index(&mut self) {
        self.id_idx_map.clear();
        for (i, tile) in self.tiles.iter().enumerate() {
            self.id_idx_map.insert(tile.id, i);
        }
        self.next_id = self.tiles.iter().map(|t| t.id.0 + 1).max().unwrap_or(0);
    }

    fn allocate_id(&mut self) -> TileId {
        let id = TileId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn get(&self, index: usize) -> Result<&Tile, GridError> {
        check_index(index, self.tiles.len())?;
        Ok(&self.tiles[index])
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Tile, GridError> {
        check_index(index, self.tiles.len())?;
        Ok(&mut self.tiles[index])
    }

    pub fn by_id(&self, id: TileId) -> Option<&Tile> {
        self.id_idx_map.get(&id).map(|&i| &self.tiles[i])
    }

    pub fn by_id_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        let i = *self.id_idx_map.get(&id)?;
        Some(&mut self.tiles[i])
    }

    pub fn index_of(&self, id: TileId) -> Option<usize> {
        self.id_idx_map.get(&id).copied()
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.id_idx_map.contains_key(&id)
    }

    /// Appends a new tile and returns its freshly allocated id.
    pub fn create_tile(&mut self, pixels: TilePixels) -> TileId {
        let id = self.allocate_id();
        self.id_idx_map.insert(id, self.tiles.len());
        self.tiles.push(Tile::new(id, pixels));
        id
    }

    pub fn insert_tile(&mut self, index: usize, pixels: TilePixels) -> Result<TileId, GridError> {
        check_index(index, self.tiles.len() + 1)?;
        let id = self.allocate_id();
        self.tiles.insert(index, Tile::new(id, pixels));
        self.reindex_from(index);
        Ok(id)
    }

    /// Clones an existing tile under a new id, appending the copy. Returns
    /// `None` if `id` does not resolve.
    pub fn clone_tile(&mut self, id: TileId) -> Option<TileId> {
        let pixels = self.by_id(id)?.pixels;
        Some(self.create_tile(pixels))
    }

    pub fn remove(&mut self, index: usize) -> Result<Tile, GridError> {
        check_index(index, self.tiles.len())?;
        let tile = self.tiles.remove(index);
        self.id_idx_map.remove(&tile.id);
        self.reindex_from(index);
        Ok(tile)
    }

    pub fn remove_by_id(&mut self, id: TileId) -> Option<Tile> {
        let index = self.index_of(id)?;
        self.remove(index).ok()
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), GridError> {
        check_index(a, self.tiles.len())?;
        check_index(b, self.tiles.len())?;
        self.tiles.swap(a, b);
        self.id_idx_map.insert(self.tiles[a].id, a);
        self.id_idx_map.insert(self.tiles[b].id, b);
        Ok(())
    }

    fn reindex_from(&mut self, start: usize) {
        for i in start..self.tiles.len() {
            self.id_idx_map.insert(self.tiles[i].id, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(c: u8) -> TilePixels {
        [[c; 8]; 8]
    }

    #[test]
    fn test_tile_width_bounds() {
        assert_eq!(TileSet::new(0).unwrap_err(), GridError::InvalidTileWidth(0));
        assert_eq!(
            TileSet::new(MAX_GRID_DIMENSION + 1).unwrap_err(),
            GridError::InvalidTileWidth(MAX_GRID_DIMENSION + 1)
        );
        assert!(TileSet::new(MAX_GRID_DIMENSION).is_ok());
    }

    #[test]
    fn test_ids_are_unique_and_resolvable() {
        let mut ts = TileSet::new(4).unwrap();
        let a = ts.create_tile(pixels(1));
        let b = ts.create_tile(pixels(2));
        assert_ne!(a, b);
        assert_eq!(ts.by_id(b).unwrap().pixels()[0][0], 2);
        assert_eq!(ts.index_of(a), Some(0));
    }

    #[test]
    fn test_insert_remove_preserve_order() {
        let mut ts = TileSet::new(4).unwrap();
        let a = ts.create_tile(pixels(1));
        let b = ts.create_tile(pixels(2));
        let c = ts.insert_tile(1, pixels(3)).unwrap();
        let order: Vec<TileId> = ts.tiles().iter().map(|t| t.id()).collect();
        assert_eq!(order, vec![a, c, b]);
        assert_eq!(ts.index_of(b), Some(2));

        ts.remove(0).unwrap();
        assert_eq!(ts.index_of(c), Some(0));
        assert_eq!(ts.index_of(b), Some(1));
        assert!(!ts.contains(a));
    }

    #[test]
    fn test_swap_updates_lookup() {
        let mut ts = TileSet::with_blank_tiles(3, 4).unwrap();
        let first = ts.get(0).unwrap().id();
        let last = ts.get(2).unwrap().id();
        ts.swap(0, 2).unwrap();
        assert_eq!(ts.index_of(first), Some(2));
        assert_eq!(ts.index_of(last), Some(0));
        assert!(ts.swap(0, 3).is_err());
    }

    #[test]
    fn test_clone_tile_gets_new_id() {
        let mut ts = TileSet::new(4).unwrap();
        let a = ts.create_tile(pixels(7));
        let b = ts.clone_tile(a).unwrap();
        assert_ne!(a, b);
        assert_eq!(ts.by_id(b).unwrap().pixels(), ts.by_id(a).unwrap().pixels());
        assert_eq!(ts.clone_tile(TileId(999)), None);
    }

    #[test]
    fn test_rebuild_index_after_deserialize() {
        let mut ts = TileSet::new(4).unwrap();
        ts.create_tile(pixels(1));
        ts.create_tile(pixels(2));
        let json = serde_json::to_string(&ts).unwrap();
        let mut loaded: TileSet = serde_json::from_str(&json).unwrap();
        loaded.rebuild_index();
        assert_eq!(loaded, ts);
        let c = loaded.create_tile(pixels(3));
        assert_eq!(c, TileId(2));
    }

    #[test]
    fn test_get_out_of_range() {
        let ts = TileSet::with_blank_tiles(2, 4).unwrap();
        assert_eq!(
            ts.get(2).unwrap_err(),
            GridError::IndexOutOfRange { index: 2, len: 2 }
        );
    }
}
