//! Colour encodings of the display.
//!
//! The display stores RGB565. Scripts may pass either an RGB565 value or a 24-bit
//! RGB888 value; anything wider than 16 bits is taken to be RGB888.

use std::collections::HashMap;

use lazy_static::lazy_static;

pub const BLACK: u16 = 0x0000;
pub const WHITE: u16 = 0xFFFF;

/// Packs 8-bit channels into RGB565.
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Expands an RGB565 colour into 8-bit channels, replicating the high bits into the
/// low ones so that white stays white.
pub fn to_rgb888(color: u16) -> (u8, u8, u8) {
    let r = ((color >> 11) & 0x1F) as u8;
    let g = ((color >> 5) & 0x3F) as u8;
    let b = (color & 0x1F) as u8;

    ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Converts a colour number given by a script into RGB565.
///
/// Negative and non-finite numbers are black; values above 24 bits are masked.
pub fn from_number(n: f64) -> u16 {
    if !n.is_finite() || n <= 0.0 {
        return BLACK;
    }

    let n = (n as u64) & 0xFF_FFFF;

    if n > 0xFFFF {
        rgb565((n >> 16) as u8, (n >> 8) as u8, n as u8)
    } else {
        n as u16
    }
}

/// The `color565(r, g, b)` builtin. Channels are clamped to `0..=255`.
pub fn color565(r: f64, g: f64, b: f64) -> u16 {
    fn channel(c: f64) -> u8 {
        if c.is_nan() {
            0
        } else {
            c.max(0.0).min(255.0) as u8
        }
    }

    rgb565(channel(r), channel(g), channel(b))
}

lazy_static! {
    static ref NAMED: HashMap<&'static str, u16> = {
        let mut colors = HashMap::new();

        colors.insert("BLACK", BLACK);
        colors.insert("WHITE", WHITE);
        colors.insert("RED", 0xF800);
        colors.insert("GREEN", 0x07E0);
        colors.insert("BLUE", 0x001F);
        colors.insert("YELLOW", 0xFFE0);
        colors.insert("CYAN", 0x07FF);
        colors.insert("MAGENTA", 0xF81F);
        colors.insert("ORANGE", 0xFDA0);
        colors.insert("PURPLE", 0x780F);
        colors.insert("PINK", 0xFE19);
        colors.insert("GRAY", 0x8410);
        colors.insert("GREY", 0x8410);
        colors.insert("NAVY", 0x000F);
        colors.insert("DARKGREEN", 0x03E0);

        colors
    };
}

/// Looks up a named colour constant such as `RED` or `TFT_RED`.
pub fn named(name: &str) -> Option<u16> {
    let name = if name.starts_with("TFT_") { &name[4..] } else { name };
    NAMED.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(to_rgb888(WHITE), (255, 255, 255));
        assert_eq!(to_rgb888(0xF800), (255, 0, 0));
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(from_number(0xF800 as f64), 0xF800);
        assert_eq!(from_number(0xFF0000 as f64), 0xF800);
        assert_eq!(from_number(-5.0), BLACK);
        assert_eq!(color565(0.0, 300.0, 0.0), 0x07E0);
    }

    #[test]
    fn test_named() {
        assert_eq!(named("RED"), Some(0xF800));
        assert_eq!(named("TFT_BLUE"), Some(0x001F));
        assert_eq!(named("red"), None);
    }
}
