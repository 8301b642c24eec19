use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    common::{ColorIdx, ColorRGB, PALETTE_SIZE},
    error::GridError,
    helpers::round_to_bits,
};

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaletteId(pub u32);

/// Target hardware of a palette. Only used to derive the "native" rendering
/// variant, where each channel is rounded to the depth the hardware supports.
#[derive(Serialize_repr, Deserialize_repr, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PaletteSystem {
    #[default]
    Rgb24 = 0,
    MasterSystem = 1,
    GameGear = 2,
    Genesis = 3,
    Snes = 4,
}

impl PaletteSystem {
    pub fn bits_per_channel(self) -> u32 {
        match self {
            PaletteSystem::Rgb24 => 8,
            PaletteSystem::MasterSystem => 2,
            PaletteSystem::Genesis => 3,
            PaletteSystem::GameGear => 4,
            PaletteSystem::Snes => 5,
        }
    }

    pub fn round(self, [r, g, b]: ColorRGB) -> ColorRGB {
        let bits = self.bits_per_channel();
        [
            round_to_bits(r, bits),
            round_to_bits(g, bits),
            round_to_bits(b, bits),
        ]
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Palette {
    pub id: PaletteId,
    pub name: String,
    #[serde(default)]
    pub system: PaletteSystem,
    pub colors: [ColorRGB; PALETTE_SIZE],
}

impl Palette {
    pub fn new(id: PaletteId, name: &str, system: PaletteSystem) -> Self {
        Palette {
            id,
            name: name.to_string(),
            system,
            colors: [[0, 0, 0]; PALETTE_SIZE],
        }
    }

    pub fn color(&self, idx: ColorIdx) -> Result<ColorRGB, GridError> {
        self.colors
            .get(idx as usize)
            .copied()
            .ok_or(GridError::ColorOutOfRange(idx))
    }

    pub fn set_color(&mut self, idx: ColorIdx, color: ColorRGB) -> Result<(), GridError> {
        let slot = self
            .colors
            .get_mut(idx as usize)
            .ok_or(GridError::ColorOutOfRange(idx))?;
        *slot = color;
        Ok(())
    }

    pub fn native_colors(&self) -> [ColorRGB; PALETTE_SIZE] {
        self.colors.map(|c| self.system.round(c))
    }
}
