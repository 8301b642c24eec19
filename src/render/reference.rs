use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, ensure, Context, Result};
use log::info;

use crate::common::{ColorIdx, ColorRGBA};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ReferenceOrder {
    #[default]
    Under,
    Over,
    // Drawn only where the grid shows this (transparent) color index.
    Substitute(ColorIdx),
}

/// A tracing image placed over the grid. Position and size are in grid pixels;
/// the image is stretched to fit with nearest-neighbor sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceImage {
    width: usize,
    height: usize,
    pixels: Vec<ColorRGBA>,
    pub x: f32,
    pub y: f32,
    pub display_width: f32,
    pub display_height: f32,
    pub opacity: f32,
    pub order: ReferenceOrder,
}

impl ReferenceImage {
    pub fn from_rgba(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        ensure!(width > 0 && height > 0, "reference image is empty");
        ensure!(
            data.len() == width * height * 4,
            "expected {} bytes of RGBA data, got {}",
            width * height * 4,
            data.len()
        );
        Ok(ReferenceImage {
            width,
            height,
            pixels: data
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect(),
            x: 0.0,
            y: 0.0,
            display_width: width as f32,
            display_height: height as f32,
            opacity: 0.5,
            order: ReferenceOrder::Under,
        })
    }

    pub fn load_png(path: &Path) -> Result<Self> {
        info!("Loading reference image {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf)?;
        let buf = &buf[..frame.buffer_size()];
        let rgba: Vec<u8> = match frame.color_type {
            png::ColorType::Rgba => buf.to_vec(),
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|c| [c[0], c[1], c[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|c| [c[0], c[0], c[0], c[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::Indexed => bail!("indexed PNG was not expanded"),
        };
        Self::from_rgba(frame.width as usize, frame.height as usize, &rgba)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Source pixel shown at grid position (`gx`, `gy`), or `None` outside the
    /// destination rectangle.
    pub fn sample(&self, gx: f32, gy: f32) -> Option<ColorRGBA> {
        if self.display_width <= 0.0 || self.display_height <= 0.0 {
            return None;
        }
        let u = (gx - self.x) / self.display_width;
        let v = (gy - self.y) / self.display_height;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return None;
        }
        let sx = ((u * self.width as f32) as usize).min(self.width - 1);
        let sy = ((v * self.height as f32) as usize).min(self.height - 1);
        Some(self.pixels[sy * self.width + sx])
    }
}
