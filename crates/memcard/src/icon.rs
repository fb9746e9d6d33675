use byteorder::{ByteOrder, LittleEndian};

use crate::layout::{data, ICON_BYTES, ICON_FRAME_COUNT, ICON_HEIGHT, ICON_WIDTH, PALETTE_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Decodes a 15-bit PS1 color word (`STP BBBBB GGGGG RRRRR`).
    ///
    /// A word of all zeros is the transparent color; everything else is opaque,
    /// including black with the STP bit set.
    pub fn from_ps1(word: u16) -> Self {
        if word == 0 {
            return Color::TRANSPARENT;
        }
        Color {
            r: ((word & 0x1F) << 3) as u8,
            g: (((word >> 5) & 0x1F) << 3) as u8,
            b: (((word >> 10) & 0x1F) << 3) as u8,
            a: 0xFF,
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

pub type Palette = [Color; PALETTE_LEN];

/// One 16x16 icon frame as palette indices, row-major.
pub type IconBitmap = [u8; ICON_WIDTH * ICON_HEIGHT];

pub fn decode_palette(block: &[u8]) -> Palette {
    let mut palette = [Color::TRANSPARENT; PALETTE_LEN];
    for (color, word) in palette
        .iter_mut()
        .zip(data::PALETTE.slice(block).chunks_exact(2))
    {
        *color = Color::from_ps1(LittleEndian::read_u16(word));
    }
    palette
}

pub fn decode_icons(block: &[u8]) -> [IconBitmap; ICON_FRAME_COUNT] {
    let mut icons = [[0u8; ICON_WIDTH * ICON_HEIGHT]; ICON_FRAME_COUNT];
    for (frame, icon) in icons.iter_mut().enumerate() {
        let start = data::ICONS + frame * ICON_BYTES;
        let packed = &block[start..start + ICON_BYTES];
        for (pixels, byte) in icon.chunks_exact_mut(2).zip(packed) {
            pixels[0] = byte & 0x0F;
            pixels[1] = byte >> 4;
        }
    }
    icons
}

pub fn decode_frame_count(block: &[u8]) -> u8 {
    match block[data::ICON_FLAG] {
        0x11 => 1,
        0x12 => 2,
        0x13 => 3,
        _ => 0,
    }
}

pub fn render_rgba(icon: &IconBitmap, palette: &Palette) -> Vec<u8> {
    icon.iter()
        .flat_map(|index| palette[usize::from(*index)].to_rgba())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_palette(words: &[u16]) -> Vec<u8> {
        let mut block = vec![0u8; 8192];
        for (i, word) in words.iter().enumerate() {
            LittleEndian::write_u16(&mut block[96 + i * 2..], *word);
        }
        block
    }

    #[test]
    fn palette_decodes_channels() {
        let block = block_with_palette(&[0x0000, 0x001F, 0x03E0, 0x7C00, 0x8000]);
        let palette = decode_palette(&block);
        assert_eq!(palette[0], Color::TRANSPARENT);
        assert_eq!(palette[1].to_rgba(), [0xF8, 0, 0, 0xFF]);
        assert_eq!(palette[2].to_rgba(), [0, 0xF8, 0, 0xFF]);
        assert_eq!(palette[3].to_rgba(), [0, 0, 0xF8, 0xFF]);
        assert_eq!(palette[4].to_rgba(), [0, 0, 0, 0xFF]);
        assert_eq!(palette[15], Color::TRANSPARENT);
    }

    #[test]
    fn icons_unpack_low_nibble_first() {
        let mut block = vec![0u8; 8192];
        block[128] = 0x21;
        block[256] = 0xF3;
        let icons = decode_icons(&block);
        assert_eq!(&icons[0][..2], &[1, 2]);
        assert_eq!(&icons[1][..2], &[3, 15]);
        assert!(icons[2].iter().all(|p| *p == 0));
    }

    #[test]
    fn frame_count_lookup() {
        let mut block = vec![0u8; 8192];
        for (flag, frames) in [(0x11, 1), (0x12, 2), (0x13, 3), (0x14, 0), (0x00, 0)] {
            block[2] = flag;
            assert_eq!(decode_frame_count(&block), frames);
        }
    }

    #[test]
    fn rgba_render_uses_palette() {
        let block = block_with_palette(&[0x0000, 0x001F]);
        let palette = decode_palette(&block);
        let mut icon = [0u8; 256];
        icon[1] = 1;
        let rgba = render_rgba(&icon, &palette);
        assert_eq!(rgba.len(), 1024);
        assert_eq!(&rgba[..8], &[0, 0, 0, 0, 0xF8, 0, 0, 0xFF]);
    }
}
