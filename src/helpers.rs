use crate::common::{ColorRGB, ColorValue};

// Quantize an 8-bit channel to `bits` bits and expand it back to 0-255, i.e. the
// closest color the hardware can actually display.
pub fn round_to_bits(c: ColorValue, bits: u32) -> ColorValue {
    if bits >= 8 {
        return c;
    }
    let max = (1u32 << bits) - 1;
    let q = (c as u32 * max + 127) / 255;
    scale_color(q as u8, bits)
}

// Expand a `bits`-bit channel value to 0-255.
pub fn scale_color(c: u8, bits: u32) -> ColorValue {
    if bits >= 8 {
        return c;
    }
    let max = (1u32 << bits) - 1;
    ((c as u32).min(max) * 255 / max) as u8
}

pub fn alpha_blend(bg: ColorRGB, fg: ColorRGB, alpha: f32) -> ColorRGB {
    let gamma = 2.2;
    let mut out: ColorRGB = [0, 0, 0];
    for i in 0..3 {
        out[i] = f32::powf(
            (1.0 - alpha) * f32::powf(bg[i] as f32, gamma) + alpha * f32::powf(fg[i] as f32, gamma),
            1.0 / gamma,
        )
        .round()
        .clamp(0.0, 255.0) as u8;
    }
    out
}

const CHECKER_LIGHT: ColorRGB = [204, 204, 204];
const CHECKER_DARK: ColorRGB = [153, 153, 153];

// Color of the transparency checkerboard at output pixel (x, y).
pub fn checker_color(x: usize, y: usize, cell: usize) -> ColorRGB {
    let cell = cell.max(1);
    if (x / cell + y / cell) % 2 == 0 {
        CHECKER_LIGHT
    } else {
        CHECKER_DARK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_color_five_bit() {
        assert_eq!(scale_color(0, 5), 0);
        assert_eq!(scale_color(31, 5), 255);
        assert_eq!(scale_color(16, 5), 131);
    }

    #[test]
    fn test_round_to_bits_endpoints() {
        for bits in [2, 3, 4, 5] {
            assert_eq!(round_to_bits(0, bits), 0);
            assert_eq!(round_to_bits(255, bits), 255);
        }
        assert_eq!(round_to_bits(100, 8), 100);
    }

    #[test]
    fn test_round_to_bits_two_bit_levels() {
        // Two bits per channel gives 0, 85, 170, 255.
        assert_eq!(round_to_bits(40, 2), 0);
        assert_eq!(round_to_bits(50, 2), 85);
        assert_eq!(round_to_bits(180, 2), 170);
    }

    #[test]
    fn test_alpha_blend_extremes() {
        let bg = [10, 20, 30];
        let fg = [200, 100, 50];
        assert_eq!(alpha_blend(bg, fg, 0.0), bg);
        assert_eq!(alpha_blend(bg, fg, 1.0), fg);
    }

    #[test]
    fn test_checker_alternates() {
        assert_ne!(checker_color(0, 0, 4), checker_color(4, 0, 4));
        assert_eq!(checker_color(0, 0, 4), checker_color(3, 3, 4));
    }
}
