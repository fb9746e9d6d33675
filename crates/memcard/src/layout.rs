//! Byte layout of a PS1 memory card image and of the wrappers around it.
//!
//! Every structured field is described as a [`Field`] (offset + length) and
//! every fixed wrapper header as a [`HeaderTemplate`] (size + constant byte
//! patches), so the codecs stay table driven.

pub const CARD_SIZE: usize = 131_072;
pub const FRAME_SIZE: usize = 128;
pub const BLOCK_SIZE: usize = 8192;
pub const SLOT_COUNT: usize = 15;

/// Size of one exported save holding a single block: header frame + data block.
pub const SINGLE_BLOCK_SAVE_SIZE: usize = FRAME_SIZE + BLOCK_SIZE;

pub const NO_NEXT_SLOT: u8 = 0xFF;

/// Icon palette + three 16x16 4bpp icon frames, starting at `ICON_REGION.offset`.
pub const ICON_REGION: Field = Field::new(96, 416);
pub const ICON_FRAME_COUNT: usize = 3;
pub const ICON_WIDTH: usize = 16;
pub const ICON_HEIGHT: usize = 16;
pub const ICON_BYTES: usize = ICON_WIDTH * ICON_HEIGHT / 2;
pub const PALETTE_LEN: usize = 16;

pub const COMMENT_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub len: usize,
}

impl Field {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn slice<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.offset..self.end()]
    }

    pub fn slice_mut<'a>(&self, bytes: &'a mut [u8]) -> &'a mut [u8] {
        &mut bytes[self.offset..self.end()]
    }
}

/// Fields of a 128-byte slot header (directory frame).
pub mod header {
    use super::Field;

    pub const BLOCK_TYPE: Field = Field::new(0, 1);
    pub const SAVE_SIZE: Field = Field::new(4, 3);
    pub const NEXT_SLOT: Field = Field::new(8, 2);
    pub const NAME: Field = Field::new(10, 20);
    pub const REGION: Field = Field::new(10, 2);
    pub const PRODUCT_CODE: Field = Field::new(12, 10);
    pub const IDENTIFIER: Field = Field::new(22, 8);
    /// Bytes covered by the XOR checksum.
    pub const CHECKSUMMED: Field = Field::new(0, 126);
    pub const CHECKSUM: usize = 127;

    /// Room for product code + identifier when rewriting them together.
    pub const PRODUCT_AND_IDENTIFIER_MAX: usize = 17;
}

/// Fields of the first data block of a save.
pub mod data {
    use super::Field;

    pub const ICON_FLAG: usize = 2;
    pub const TITLE: Field = Field::new(4, 64);
    pub const PALETTE: Field = Field::new(96, 32);
    pub const ICONS: usize = 128;
}

/// Fixed frames of block 0 that are not slot headers.
pub mod system {
    pub const CARD_HEADER: usize = 0;
    pub const WRITE_TEST_FRAME: usize = 8064;
    pub const MAGIC: &[u8] = b"MC";
    pub const FRAME_CHECKSUM: u8 = 0x0E;
    pub const BROKEN_FRAMES: usize = 2048;
    pub const BROKEN_FRAME_COUNT: usize = 20;
}

pub const fn header_offset(slot: usize) -> usize {
    FRAME_SIZE + slot * FRAME_SIZE
}

pub const fn data_offset(slot: usize) -> usize {
    BLOCK_SIZE + slot * BLOCK_SIZE
}

/// A zero-filled header with constant bytes stamped at fixed offsets.
#[derive(Debug)]
pub struct HeaderTemplate {
    pub size: usize,
    pub patches: &'static [(usize, &'static [u8])],
}

impl HeaderTemplate {
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size];
        for (offset, value) in self.patches {
            bytes[*offset..*offset + value.len()].copy_from_slice(value);
        }
        bytes
    }
}

pub const GME_HEADER: HeaderTemplate = HeaderTemplate {
    size: 3904,
    patches: &[(0, b"123-456-STD"), (18, &[0x01]), (20, &[0x01, b'M'])],
};

pub mod gme {
    pub const BLOCK_TYPES: usize = 22;
    pub const NEXT_SLOTS: usize = 38;
    pub const COMMENTS: usize = 64;
}

pub const VGS_HEADER: HeaderTemplate = HeaderTemplate {
    size: 64,
    patches: &[
        (0, b"VgsM"),
        (4, &[0x01]),
        (8, &[0x01]),
        (12, &[0x01]),
        (17, &[0x02]),
    ],
};

pub const VMP_HEADER: HeaderTemplate = HeaderTemplate {
    size: 0x80,
    patches: &[(1, b"PMV"), (4, &[0x80])],
};

pub const PSV_HEADER: HeaderTemplate = HeaderTemplate {
    size: 0x84,
    patches: &[
        (1, b"VSP"),
        (0x08, b"www.bucanero.com.ar\0"),
        (0x38, &[0x14]),
        (0x3C, &[0x01]),
        (0x44, &[0x84]),
        (0x49, &[0x02]),
        (0x5D, &[0x20]),
        (0x60, &[0x03, 0x90]),
    ],
};

pub mod psv {
    use super::Field;

    pub const TYPE_TAG: usize = 60;
    pub const PS1_TYPE: u8 = 1;
    pub const SAVE_LENGTH: usize = 0x40;
    pub const NAME: Field = Field::new(0x64, 0x20);
    /// Name as read back on import, matching the 20-byte header name field.
    pub const IMPORT_NAME: Field = Field::new(0x64, 20);
    pub const DATA: usize = 0x84;
}

pub const AR_HEADER: HeaderTemplate = HeaderTemplate {
    size: 54,
    patches: &[],
};

pub mod action_replay {
    use super::Field;

    pub const NAME: Field = Field::new(0, 20);
    pub const FILE_NAME: Field = Field::new(21, 33);
    pub const MAGIC_OFFSET: usize = 0x36;
    pub const DATA: usize = 54;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_views_tile_the_card() {
        assert_eq!(header_offset(0), 128);
        assert_eq!(header_offset(SLOT_COUNT - 1) + FRAME_SIZE, 2048);
        assert_eq!(data_offset(SLOT_COUNT - 1) + BLOCK_SIZE, CARD_SIZE);
    }

    #[test]
    fn gme_header_fits_fifteen_comments() {
        assert_eq!(gme::COMMENTS + SLOT_COUNT * COMMENT_LEN, GME_HEADER.size);
        let header = GME_HEADER.build();
        assert_eq!(&header[..11], b"123-456-STD");
        assert_eq!(header[18], 1);
        assert_eq!(&header[20..22], &[1, b'M']);
    }

    #[test]
    fn vmp_header_is_unsigned() {
        let header = VMP_HEADER.build();
        assert_eq!(&header[..5], &[0, b'P', b'M', b'V', 0x80]);
        assert!(header[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn psv_template_matches_layout() {
        let header = PSV_HEADER.build();
        assert_eq!(header.len(), psv::DATA);
        assert_eq!(&header[..4], b"\0VSP");
        assert_eq!(header[0x61], 0x90);
        assert_eq!(psv::NAME.end(), psv::DATA);
    }

    #[test]
    fn action_replay_file_name_ends_at_data() {
        assert_eq!(action_replay::FILE_NAME.end(), action_replay::DATA);
        assert_eq!(AR_HEADER.build(), vec![0u8; 54]);
    }
}
