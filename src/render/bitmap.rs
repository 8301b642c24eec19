use crate::{
    common::{ColorRGB, ColorRGBA},
    helpers::alpha_blend,
};

/// An RGBA8 raster, row-major.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Bitmap {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) * 4)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<ColorRGBA> {
        let i = self.offset(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    pub fn set(&mut self, x: usize, y: usize, c: ColorRGBA) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 4].copy_from_slice(&c);
        }
    }

    // Signed-coordinate variant used by overlays, which may hang off the edges.
    pub fn set_clipped(&mut self, x: i64, y: i64, c: ColorRGBA) {
        if x >= 0 && y >= 0 {
            self.set(x as usize, y as usize, c);
        }
    }

    /// Blends `c` over the existing pixel; the result is opaque.
    pub fn blend(&mut self, x: i64, y: i64, c: ColorRGB, alpha: f32) {
        if x < 0 || y < 0 {
            return;
        }
        if let Some([r, g, b, _]) = self.get(x as usize, y as usize) {
            let [r, g, b] = alpha_blend([r, g, b], c, alpha);
            self.set(x as usize, y as usize, [r, g, b, 255]);
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, c: ColorRGBA) {
        let x1 = (x + width).min(self.width);
        let y1 = (y + height).min(self.height);
        for yy in y.min(y1)..y1 {
            for xx in x.min(x1)..x1 {
                self.set(xx, yy, c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clipped() {
        let mut bmp = Bitmap::new(2, 2);
        bmp.set(1, 1, [1, 2, 3, 4]);
        assert_eq!(bmp.get(1, 1), Some([1, 2, 3, 4]));
        assert_eq!(bmp.get(2, 0), None);
        bmp.set(5, 5, [9; 4]);
        bmp.set_clipped(-1, 0, [9; 4]);
        assert_eq!(bmp.data().iter().filter(|&&b| b == 9).count(), 0);
    }

    #[test]
    fn test_fill_rect_clipped() {
        let mut bmp = Bitmap::new(4, 4);
        bmp.fill_rect(2, 2, 10, 10, [255, 0, 0, 255]);
        assert_eq!(bmp.get(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(bmp.get(1, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_blend_is_opaque() {
        let mut bmp = Bitmap::new(1, 1);
        bmp.set(0, 0, [0, 0, 0, 0]);
        bmp.blend(0, 0, [255, 255, 255], 1.0);
        assert_eq!(bmp.get(0, 0), Some([255, 255, 255, 255]));
    }
}
