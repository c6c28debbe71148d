//! Color tables shared by the pad tree.
//!
//! [`ColorTable`] is the process-wide table owned by the [`PaintContext`].
//! [`PadColors`] is the override layer of a single pad; lookups fall back
//! to the parent pad and finally to the global table.
//!
//! [`PaintContext`]: crate::PaintContext

use palette::{FromColor, Hsv, LinSrgb, Srgb, Srgba};
use protocol::ColorEntry;
use std::cell::Cell;
use std::collections::BTreeMap;

/// Colors 0 to 10 of ROOT's default table.
const BASIC_COLORS: [(u8, u8, u8); 11] = [
    (255, 255, 255),
    (0, 0, 0),
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
    (89, 212, 84),
    (89, 84, 217),
    (254, 254, 254),
];

/// Number of colors in the generated automatic palette.
const AUTO_PALETTE_SIZE: usize = 50;

/// First index used for colors added at runtime.
const FIRST_RUNTIME_COLOR: u32 = 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    colors: BTreeMap<u32, Srgba<u8>>,
}

impl Default for ColorTable {
    fn default() -> Self {
        let colors = BASIC_COLORS
            .iter()
            .enumerate()
            .map(|(index, (r, g, b))| (index as u32, Srgba::new(*r, *g, *b, 255)))
            .collect();
        Self { colors }
    }
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<Srgba<u8>> {
        self.colors.get(&index).copied()
    }

    pub fn set(&mut self, index: u32, color: Srgba<u8>) {
        self.colors.insert(index, color);
    }

    /// Replace entries with the decoded definitions, keeping the others.
    pub fn adopt(&mut self, entries: &[ColorEntry]) {
        for entry in entries {
            self.colors.insert(entry.index, entry.to_srgba());
        }
    }

    /// Copy of this table extended with `entries`, optionally converted to
    /// gray levels.
    pub fn extended(&self, entries: &[ColorEntry], grayscale: bool) -> ColorTable {
        let mut table = self.clone();
        table.adopt(entries);
        if grayscale {
            table = table.to_grayscale();
        }
        table
    }

    pub fn to_grayscale(&self) -> ColorTable {
        ColorTable {
            colors: self
                .colors
                .iter()
                .map(|(index, color)| (*index, gray_level(*color)))
                .collect(),
        }
    }

    /// Index of an existing identical color, or a newly added one.
    pub fn add_color(&mut self, color: Srgba<u8>) -> u32 {
        if let Some((index, _)) = self.colors.iter().find(|(_, c)| **c == color) {
            return *index;
        }
        let index = self
            .colors
            .keys()
            .next_back()
            .map_or(FIRST_RUNTIME_COLOR, |last| (*last + 1).max(FIRST_RUNTIME_COLOR));
        self.colors.insert(index, color);
        index
    }
}

pub trait ColorEntryExt {
    fn to_srgba(&self) -> Srgba<u8>;
}

impl ColorEntryExt for ColorEntry {
    fn to_srgba(&self) -> Srgba<u8> {
        let [r, g, b] = self.rgb;
        let alpha = self
            .alpha
            .map_or(255, |a| (a.clamp(0.0, 1.0) * 255.0).round() as u8);
        Srgba::new(r, g, b, alpha)
    }
}

/// Convert to the gray level of equal luminance.
pub fn gray_level(color: Srgba<u8>) -> Srgba<u8> {
    let lin: LinSrgb<f32> = Srgb::new(color.red, color.green, color.blue)
        .into_format::<f32>()
        .into_linear();
    let y = 0.2126 * lin.red + 0.7152 * lin.green + 0.0722 * lin.blue;
    let gray: Srgb<f32> = Srgb::from_linear(LinSrgb::new(y, y, y));
    let gray: Srgb<u8> = gray.into_format();
    Srgba::new(gray.red, gray.green, gray.blue, color.alpha)
}

pub fn to_hex(color: Srgba<u8>) -> String {
    if color.alpha == 255 {
        format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
    } else {
        format!(
            "#{:02x}{:02x}{:02x}{:02x}",
            color.red, color.green, color.blue, color.alpha
        )
    }
}

/// Hue sweep used when neither the pad nor the canvas defines a palette.
pub fn auto_palette(grayscale: bool) -> Vec<Srgba<u8>> {
    (0..AUTO_PALETTE_SIZE)
        .map(|n| {
            let hue = 270.0 - 270.0 * n as f32 / (AUTO_PALETTE_SIZE - 1) as f32;
            let rgb: Srgb<f32> = Srgb::from_color(Hsv::new(hue, 0.9, 0.95));
            let rgb: Srgb<u8> = rgb.into_format();
            let color = Srgba::new(rgb.red, rgb.green, rgb.blue, 255);
            if grayscale {
                gray_level(color)
            } else {
                color
            }
        })
        .collect()
}

/// Pad-local color state.
#[derive(Debug, Default)]
pub struct PadColors {
    /// Local color table, only set with the `LCOLORS` option.
    pub custom_colors: Option<ColorTable>,
    pub custom_palette: Option<Vec<Srgba<u8>>>,
    /// Color indexes of the custom palette.
    pub palette_indexes: Option<Vec<u32>>,
    /// Palette colors before grayscale conversion.
    pub palette_source: Option<Vec<Srgba<u8>>>,
    pub auto_color: Cell<usize>,
}

impl PadColors {
    pub fn color(&self, index: u32) -> Option<Srgba<u8>> {
        self.custom_colors.as_ref().and_then(|table| table.get(index))
    }

    pub fn clear_palette(&mut self) {
        self.custom_palette = None;
        self.palette_indexes = None;
        self.palette_source = None;
    }

    /// Install a palette given by color indexes, resolving colors in `table`.
    pub fn set_palette_indexes(&mut self, indexes: Vec<u32>, table: &ColorTable, grayscale: bool) {
        let colors: Vec<Srgba<u8>> = indexes
            .iter()
            .map(|index| table.get(*index).unwrap_or_else(|| Srgba::new(0, 0, 0, 255)))
            .collect();
        self.palette_indexes = Some(indexes);
        self.set_palette_colors(colors, grayscale);
    }

    pub fn set_palette_colors(&mut self, colors: Vec<Srgba<u8>>, grayscale: bool) {
        self.custom_palette = Some(if grayscale {
            colors.iter().copied().map(gray_level).collect()
        } else {
            colors.clone()
        });
        self.palette_source = Some(colors);
    }

    /// Rebuild the palette from its source colors after a grayscale change.
    pub fn regrade(&mut self, grayscale: bool) {
        if let Some(colors) = self.palette_source.take() {
            self.set_palette_colors(colors, grayscale);
        }
    }

    /// Next automatic color position among `count` primitives.
    pub fn next_auto_index(&self, count: usize) -> usize {
        let count = count.max(2);
        let index = self.auto_color.get();
        self.auto_color.set((index + 1) % count);
        index.min(count - 1)
    }
}

/// Position inside a palette of `len` colors for primitive `index` of `count`.
pub fn palette_position(index: usize, count: usize, len: usize) -> usize {
    if len < 3 || count < 2 {
        return 0;
    }
    let pos = (index as f64 * (len - 3) as f64 / (count - 1) as f64).round() as usize;
    pos.min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_root_basics() {
        let table = ColorTable::new();
        assert_eq!(table.get(2), Some(Srgba::new(255, 0, 0, 255)));
        assert_eq!(to_hex(table.get(1).unwrap()), "#000000");
        assert!(table.get(400).is_none());
    }

    #[test]
    fn adopt_overrides_and_extends() {
        let mut table = ColorTable::new();
        table.adopt(&[
            ColorEntry {
                index: 2,
                rgb: [200, 0, 0],
                alpha: None,
            },
            ColorEntry {
                index: 632,
                rgb: [1, 2, 3],
                alpha: Some(0.5),
            },
        ]);
        assert_eq!(table.get(2), Some(Srgba::new(200, 0, 0, 255)));
        assert_eq!(table.get(632).map(|c| c.alpha), Some(128));
    }

    #[test]
    fn grayscale_keeps_white_and_black() {
        assert_eq!(gray_level(Srgba::new(255, 255, 255, 255)), Srgba::new(255, 255, 255, 255));
        assert_eq!(gray_level(Srgba::new(0, 0, 0, 255)), Srgba::new(0, 0, 0, 255));
        let gray = gray_level(Srgba::new(255, 0, 0, 255));
        assert_eq!(gray.red, gray.green);
        assert_eq!(gray.green, gray.blue);
        assert!(gray.red > 0 && gray.red < 255);
    }

    #[test]
    fn add_color_reuses_existing_index() {
        let mut table = ColorTable::new();
        assert_eq!(table.add_color(Srgba::new(255, 0, 0, 255)), 2);
        let index = table.add_color(Srgba::new(10, 20, 30, 255));
        assert_eq!(index, FIRST_RUNTIME_COLOR);
        assert_eq!(table.add_color(Srgba::new(10, 20, 30, 255)), index);
    }

    #[test]
    fn auto_index_wraps_around() {
        let colors = PadColors::default();
        let picked: Vec<usize> = (0..5).map(|_| colors.next_auto_index(3)).collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1]);
        assert_eq!(palette_position(2, 3, 10), 7);
    }

    #[test]
    fn auto_palette_has_fixed_length() {
        assert_eq!(auto_palette(false).len(), AUTO_PALETTE_SIZE);
        let gray = auto_palette(true);
        assert!(gray.iter().all(|c| c.red == c.green && c.green == c.blue));
    }
}
