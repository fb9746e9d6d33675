use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::block::BlockType;
use crate::icon::{self, IconBitmap, Palette};
use crate::layout::{data, header, Field, ICON_FRAME_COUNT, NO_NEXT_SLOT, SLOT_COUNT};
use crate::sjis;

/// Interpreted view of one slot, rebuilt from the raw card after each change.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub index: usize,
    pub block_type: BlockType,
    pub next_slot: u8,
    pub region: u16,
    pub product_code: String,
    pub identifier: String,
    pub name: String,
    pub title: [u8; 64],
    pub size: u32,
    pub palette: Palette,
    pub icons: [IconBitmap; ICON_FRAME_COUNT],
    pub icon_frames: u8,
}

impl SlotInfo {
    pub(crate) fn empty(index: usize) -> Self {
        Self {
            index,
            block_type: BlockType::Formatted,
            next_slot: NO_NEXT_SLOT,
            region: 0,
            product_code: String::new(),
            identifier: String::new(),
            name: String::new(),
            title: [0; 64],
            size: 0,
            palette: [icon::Color::TRANSPARENT; 16],
            icons: [[0; 256]; ICON_FRAME_COUNT],
            icon_frames: 0,
        }
    }

    /// `next_slot` as an index, or `None` at the end of a chain.
    pub fn next(&self) -> Option<usize> {
        if self.next_slot == NO_NEXT_SLOT {
            None
        } else {
            Some(usize::from(self.next_slot))
        }
    }

    /// Region as its two-letter prefix, e.g. `BI`, `BA` or `BE`.
    pub fn region_code(&self) -> String {
        let [low, high] = self.region.to_le_bytes();
        [low, high]
            .iter()
            .filter(|b| **b != 0)
            .map(|b| char::from(*b))
            .collect()
    }

    pub fn title_lossy(&self) -> String {
        sjis::decode_lossy(sjis::trim_title(&self.title))
    }

    /// Default PSV file name: region, product code, hex identifier.
    pub fn psv_file_name(&self) -> String {
        let identifier: String = self
            .identifier
            .bytes()
            .map(|b| format!("{b:02X}"))
            .collect();
        format!(
            "{}{}{}.PSV",
            self.region_code(),
            self.product_code,
            identifier
        )
    }
}

bitflags! {
    /// Which derived fields to rebuild after a mutation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Refresh: u8 {
        const BLOCK_TYPES = 0b0000_0001;
        const STRINGS     = 0b0000_0010;
        const REGION      = 0b0000_0100;
        const SIZE        = 0b0000_1000;
        const ICONS       = 0b0001_0000;
    }
}

pub(crate) fn refresh_slot(info: &mut SlotInfo, frame: &[u8], block: &[u8], what: Refresh) {
    if what.contains(Refresh::BLOCK_TYPES) {
        info.next_slot = frame[header::NEXT_SLOT.offset];
        info.block_type = classify(frame);
        if info.block_type == BlockType::Corrupted {
            log::warn!(
                "slot {} is corrupted (type {:#04X}, next {:#04X})",
                info.index,
                frame[header::BLOCK_TYPE.offset],
                info.next_slot
            );
        }
    }
    if what.contains(Refresh::STRINGS) {
        info.product_code = read_string(frame, header::PRODUCT_CODE);
        info.identifier = read_string(frame, header::IDENTIFIER);
        info.name = read_string(frame, header::NAME);
        info.title.copy_from_slice(data::TITLE.slice(block));
    }
    if what.contains(Refresh::REGION) {
        info.region = LittleEndian::read_u16(header::REGION.slice(frame));
    }
    if what.contains(Refresh::SIZE) {
        info.size = LittleEndian::read_u24(header::SAVE_SIZE.slice(frame));
    }
    if what.contains(Refresh::ICONS) {
        info.palette = icon::decode_palette(block);
        info.icons = icon::decode_icons(block);
        info.icon_frames = icon::decode_frame_count(block);
    }
}

fn classify(frame: &[u8]) -> BlockType {
    let next = frame[header::NEXT_SLOT.offset];
    if next != NO_NEXT_SLOT && usize::from(next) >= SLOT_COUNT {
        return BlockType::Corrupted;
    }
    BlockType::from_byte(frame[header::BLOCK_TYPE.offset])
}

/// Bytes up to the first NUL, one char per byte.
pub(crate) fn read_string(bytes: &[u8], field: Field) -> String {
    field
        .slice(bytes)
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| char::from(*b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_for(name: &[u8]) -> [u8; 128] {
        let mut frame = [0u8; 128];
        frame[0] = 0x51;
        frame[4..7].copy_from_slice(&[0x00, 0x40, 0x00]);
        frame[8] = 0xFF;
        frame[10..10 + name.len()].copy_from_slice(name);
        frame
    }

    #[test]
    fn refresh_decodes_header_fields() {
        let frame = frame_for(b"BISLUS-00594GAME0001");
        let block = [0u8; 8192];
        let mut info = SlotInfo::empty(3);
        refresh_slot(&mut info, &frame, &block, Refresh::all());

        assert_eq!(info.block_type, BlockType::Initial);
        assert_eq!(info.next(), None);
        assert_eq!(info.name, "BISLUS-00594GAME0001");
        assert_eq!(info.product_code, "SLUS-00594");
        assert_eq!(info.identifier, "GAME0001");
        assert_eq!(info.region_code(), "BI");
        assert_eq!(info.size, 0x4000);
        assert_eq!(info.psv_file_name(), "BISLUS-0059447414D4530303031.PSV");
    }

    #[test]
    fn out_of_range_pointer_is_corrupted() {
        let mut frame = frame_for(b"BI");
        frame[8] = 15;
        let mut info = SlotInfo::empty(0);
        refresh_slot(&mut info, &frame, &[0u8; 8192], Refresh::BLOCK_TYPES);
        assert_eq!(info.block_type, BlockType::Corrupted);
    }

    #[test]
    fn partial_refresh_leaves_other_fields() {
        let frame = frame_for(b"BESCES-00001");
        let mut info = SlotInfo::empty(0);
        info.name = "stale".to_string();
        refresh_slot(&mut info, &frame, &[0u8; 8192], Refresh::BLOCK_TYPES);
        assert_eq!(info.block_type, BlockType::Initial);
        assert_eq!(info.name, "stale");
    }

    #[test]
    fn refresh_flags_combine() {
        let strings_and_region = Refresh::STRINGS | Refresh::REGION;
        assert!(strings_and_region.contains(Refresh::REGION));
        assert!(!strings_and_region.contains(Refresh::ICONS));
        assert_eq!(Refresh::all().bits(), 0x1F);
    }

    #[test]
    fn strings_stop_at_nul() {
        let frame = frame_for(b"BASLPS\0junk");
        assert_eq!(read_string(&frame, header::NAME), "BASLPS");
    }
}
