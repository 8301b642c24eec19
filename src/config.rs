use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::{ColorIdx, ColorRGB};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    #[serde(skip_serializing, skip_deserializing)]
    pub modified: bool,
    pub project_path: Option<PathBuf>,
    pub tiles_per_block: usize,
    pub break_links: bool,
    pub scale: usize,
    pub show_tile_grid: bool,
    // Drawn from scale 4 up.
    pub show_pixel_grid: bool,
    pub grid_color: ColorRGB,
    pub grid_opacity: f32,
    pub transparency_index: Option<ColorIdx>,
    pub native_colors: bool,
    pub frame_interval_ms: u64,
    pub update_queue_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            modified: false,
            project_path: None,
            tiles_per_block: 2,
            break_links: true,
            scale: 2,
            show_tile_grid: true,
            show_pixel_grid: false,
            grid_color: [255, 255, 255],
            grid_opacity: 0.5,
            transparency_index: Some(0),
            native_colors: false,
            frame_interval_ms: 16,
            update_queue_capacity: 64,
        }
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("", "", "TilegridEditor")
        .context("Unable to open global config directory.")?;
    let config_dir = project_dirs.config_dir();
    Ok(config_dir.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"scale": 4}"#).unwrap();
        assert_eq!(config.scale, 4);
        assert_eq!(config.tiles_per_block, 2);
        assert!(config.break_links);
        assert_eq!(config.transparency_index, Some(0));
    }

    #[test]
    fn test_modified_not_serialized() {
        let config = EditorConfig {
            modified: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("modified"));
    }
}
