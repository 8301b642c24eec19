pub mod common;
pub mod config;
pub mod error;
pub mod grid;
pub mod helpers;
pub mod link_break;
pub mod message;
pub mod paint;
pub mod palette;
pub mod persist;
pub mod render;
pub mod state;
pub mod tile;
pub mod tilemap;
pub mod tileset;
pub mod undo;
pub mod update;
pub mod worker;
