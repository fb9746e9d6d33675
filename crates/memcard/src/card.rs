use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::block::BlockType;
use crate::checksum::stamp_checksum;
use crate::container::CardFormat;
use crate::error::{Error, Result};
use crate::icon;
use crate::layout::{
    data_offset, gme, header, header_offset, system, BLOCK_SIZE, CARD_SIZE, COMMENT_LEN,
    FRAME_SIZE, ICON_REGION, NO_NEXT_SLOT, SINGLE_BLOCK_SAVE_SIZE, SLOT_COUNT,
};
use crate::single_save::SaveFormat;
use crate::slot::{self, Refresh, SlotInfo};

/// Slots reachable from a start slot by following next-slot pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveChain {
    pub slots: Vec<usize>,
    /// The walk stopped on a corrupted slot or hit the hop limit.
    pub partial: bool,
}

impl SaveChain {
    pub fn first(&self) -> usize {
        self.slots[0]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rejects partial chains.
    pub fn complete(self) -> Result<Self> {
        if self.partial {
            return Err(Error::CorruptedChain {
                start: self.first(),
                walked: self.len(),
            });
        }
        Ok(self)
    }
}

/// Outcome of placing a save on the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub slots: Vec<usize>,
}

impl Allocation {
    pub fn first(&self) -> usize {
        self.slots[0]
    }

    pub fn blocks(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardStats {
    pub used: usize,
    pub free: usize,
    pub corrupted: usize,
}

/// An open PS1 memory card image.
#[derive(Debug, Clone)]
pub struct MemoryCard {
    raw: Vec<u8>,
    format: CardFormat,
    comments: Vec<Vec<u8>>,
    slots: Vec<SlotInfo>,
}

impl Default for MemoryCard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCard {
    /// A freshly formatted raw card.
    pub fn new() -> Self {
        let mut card = Self::blank(vec![0u8; CARD_SIZE], CardFormat::Raw);
        card.stamp_system_frames();
        card.format_card();
        card
    }

    fn blank(raw: Vec<u8>, format: CardFormat) -> Self {
        Self {
            raw,
            format,
            comments: vec![Vec::new(); SLOT_COUNT],
            slots: (0..SLOT_COUNT).map(SlotInfo::empty).collect(),
        }
    }

    /// Opens any supported whole-card wrapper.
    ///
    /// With `fix_data` every slot checksum is recomputed on load.
    pub fn open(bytes: &[u8], fix_data: bool) -> Result<Self> {
        let (format, image) = CardFormat::unwrap_image(bytes)?;
        log::debug!("detected {format} memory card");

        let mut card = Self::blank(image.to_vec(), format);
        if format == CardFormat::Gme {
            card.load_gme_comments(bytes);
        }
        if fix_data {
            card.recalculate_checksums();
        }
        card.refresh(Refresh::all());
        Ok(card)
    }

    pub fn open_path(path: &Path, fix_data: bool) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;
        Self::open(&bytes, fix_data)
    }

    /// The wrapper the card was loaded from.
    pub fn format(&self) -> CardFormat {
        self.format
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&SlotInfo> {
        self.slots.get(index).ok_or(Error::InvalidSlot(index))
    }

    pub fn header(&self, index: usize) -> Result<&[u8]> {
        check_index(index)?;
        Ok(&self.raw[frame_range(index)])
    }

    pub fn block(&self, index: usize) -> Result<&[u8]> {
        check_index(index)?;
        Ok(&self.raw[block_range(index)])
    }

    pub fn stats(&self) -> CardStats {
        self.slots
            .iter()
            .fold(CardStats::default(), |mut stats, slot| {
                match slot.block_type {
                    BlockType::Formatted => stats.free += 1,
                    BlockType::Corrupted => stats.corrupted += 1,
                    _ => stats.used += 1,
                }
                stats
            })
    }

    /// Raw GME comment bytes, without the terminating NUL.
    pub fn comment(&self, index: usize) -> Result<&[u8]> {
        self.comments
            .get(index)
            .map(Vec::as_slice)
            .ok_or(Error::InvalidSlot(index))
    }

    /// Sets a GME comment; anything past 255 bytes is dropped on export.
    pub fn set_comment(&mut self, index: usize, comment: &[u8]) -> Result<()> {
        check_index(index)?;
        self.comments[index] = comment.to_vec();
        Ok(())
    }

    /// Serializes the card with the given wrapper.
    ///
    /// With `fix_data` the card header, write-test and reserved frames are
    /// re-stamped before writing.
    pub fn to_bytes(&mut self, format: CardFormat, fix_data: bool) -> Vec<u8> {
        if fix_data {
            self.stamp_system_frames();
        }

        let mut out = format
            .header_template()
            .map(|template| template.build())
            .unwrap_or_default();
        if format == CardFormat::Gme {
            self.fill_gme_header(&mut out);
        }
        out.extend_from_slice(&self.raw);
        out
    }

    pub fn save_path(&mut self, path: &Path, format: CardFormat, fix_data: bool) -> Result<()> {
        let bytes = self.to_bytes(format, fix_data);
        std::fs::write(path, bytes).map_err(|err| Error::io(path, err))?;
        log::debug!("wrote {format} memory card to {}", path.display());
        Ok(())
    }

    /// Walks the chain starting at `start`.
    ///
    /// The walk never takes more than [`SLOT_COUNT`] steps, so cyclic or
    /// corrupted pointers produce a partial chain instead of looping.
    pub fn find_save_links(&self, start: usize) -> Result<SaveChain> {
        check_index(start)?;

        let mut slots = Vec::with_capacity(SLOT_COUNT);
        let mut current = start;
        let mut partial = true;

        for _ in 0..SLOT_COUNT {
            slots.push(current);
            let info = &self.slots[current];
            if info.block_type == BlockType::Corrupted {
                break;
            }
            match info.next() {
                None => {
                    partial = false;
                    break;
                }
                Some(next) => current = next,
            }
        }

        if partial {
            log::warn!(
                "save chain at slot {start} is corrupted after {} blocks",
                slots.len()
            );
        }
        Ok(SaveChain { slots, partial })
    }

    /// First run of `count` consecutive free slots, or an empty list.
    pub fn find_free_slots(&self, count: usize) -> Vec<usize> {
        if count == 0 || count > SLOT_COUNT {
            return Vec::new();
        }
        (0..=SLOT_COUNT - count)
            .find(|start| {
                self.slots[*start..*start + count]
                    .iter()
                    .all(|slot| slot.block_type.is_free())
            })
            .map(|start| (start..start + count).collect())
            .unwrap_or_default()
    }

    /// Header of the first slot followed by the data of every chained slot.
    pub fn get_save_bytes(&self, start: usize) -> Result<Vec<u8>> {
        let chain = self.find_save_links(start)?;
        let mut out = Vec::with_capacity(FRAME_SIZE + chain.len() * BLOCK_SIZE);
        out.extend_from_slice(&self.raw[frame_range(chain.first())]);
        for slot in &chain.slots {
            out.extend_from_slice(&self.raw[block_range(*slot)]);
        }
        Ok(out)
    }

    /// Places a native save (128-byte header + data blocks) into free slots.
    ///
    /// Either every block lands in one contiguous run of free slots or the
    /// card is left untouched.
    pub fn set_save_bytes(&mut self, save: &[u8]) -> Result<Allocation> {
        if save.len() < SINGLE_BLOCK_SAVE_SIZE {
            return Err(Error::TruncatedInput {
                expected: SINGLE_BLOCK_SAVE_SIZE,
                actual: save.len(),
            });
        }

        let required = (save.len() - FRAME_SIZE) / BLOCK_SIZE;
        let slots = self.find_free_slots(required);
        if slots.len() < required {
            return Err(Error::InsufficientSpace { required });
        }

        let first = slots[0];
        self.raw[frame_range(first)].copy_from_slice(&save[..FRAME_SIZE]);
        LittleEndian::write_u24(
            header::SAVE_SIZE.slice_mut(&mut self.raw[frame_range(first)]),
            (required * BLOCK_SIZE) as u32,
        );

        for (i, slot) in slots.iter().enumerate() {
            let chunk = &save[FRAME_SIZE + i * BLOCK_SIZE..FRAME_SIZE + (i + 1) * BLOCK_SIZE];
            self.raw[block_range(*slot)].copy_from_slice(chunk);
        }

        for pair in slots.windows(2) {
            self.link(pair[0], BlockType::MiddleLink, Some(pair[1]));
        }
        if let Some(last) = slots.last() {
            self.link(*last, BlockType::EndLink, None);
        }
        // A one-block save ends up Initial with no successor.
        self.set_block_type(first, BlockType::Initial);

        self.recalculate_checksums();
        self.refresh(Refresh::all());
        log::debug!("allocated {required} blocks at slots {slots:?}");
        Ok(Allocation { slots })
    }

    /// Detects a single-save wrapper and imports it.
    pub fn import_save(&mut self, bytes: &[u8], file_name: &str) -> Result<Allocation> {
        let (format, save) = SaveFormat::decode(bytes, file_name)?;
        log::debug!("importing {format:?} save {file_name}");
        self.set_save_bytes(&save)
    }

    pub fn open_single_save(&mut self, path: &Path) -> Result<Allocation> {
        let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.import_save(&bytes, &file_name)
    }

    /// Wraps the save starting at `start`, which must be an initial block.
    pub fn export_save(&self, start: usize, format: SaveFormat, file_name: &str) -> Result<Vec<u8>> {
        let info = self.slot(start)?;
        if info.block_type != BlockType::Initial {
            return Err(Error::InvalidSlot(start));
        }
        let save = self.get_save_bytes(start)?;
        Ok(format.encode(&save, file_name))
    }

    pub fn save_single_save(&self, path: &Path, start: usize, format: SaveFormat) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = self.export_save(start, format, &file_name)?;
        std::fs::write(path, bytes).map_err(|err| Error::io(path, err))
    }

    /// Resets one slot to a free block, ignoring any chain it belongs to.
    pub fn format_slot(&mut self, index: usize) -> Result<()> {
        check_index(index)?;
        self.clear_slot(index);
        self.recalculate_checksums();
        self.refresh(Refresh::all());
        Ok(())
    }

    /// Frees every slot of the chain starting at `start`.
    pub fn format_save(&mut self, start: usize) -> Result<SaveChain> {
        let chain = self.find_save_links(start)?;
        for slot in &chain.slots {
            self.clear_slot(*slot);
        }
        self.recalculate_checksums();
        self.refresh(Refresh::all());
        Ok(chain)
    }

    pub fn format_card(&mut self) {
        for index in 0..SLOT_COUNT {
            self.clear_slot(index);
        }
        self.recalculate_checksums();
        self.refresh(Refresh::all());
    }

    /// Flips every block of a chain between its live and deleted state.
    pub fn toggle_delete_save(&mut self, start: usize) -> Result<SaveChain> {
        let chain = self.find_save_links(start)?;
        for slot in &chain.slots {
            if let Some(toggled) = self.slots[*slot].block_type.toggled() {
                self.set_block_type(*slot, toggled);
            }
        }
        self.recalculate_checksums();
        self.refresh(Refresh::BLOCK_TYPES);
        Ok(chain)
    }

    /// Rewrites region, product code and identifier of a save header.
    pub fn set_header_data(
        &mut self,
        index: usize,
        product_code: &str,
        identifier: &str,
        region: u16,
    ) -> Result<()> {
        check_index(index)?;
        let frame = &mut self.raw[frame_range(index)];
        header::NAME.slice_mut(frame).fill(0);
        LittleEndian::write_u16(header::REGION.slice_mut(frame), region);

        let combined = format!("{product_code}{identifier}");
        let bytes = combined.as_bytes();
        let len = bytes.len().min(header::PRODUCT_AND_IDENTIFIER_MAX);
        let start = header::PRODUCT_CODE.offset;
        frame[start..start + len].copy_from_slice(&bytes[..len]);

        self.refresh(Refresh::STRINGS | Refresh::REGION);
        self.recalculate_checksums();
        Ok(())
    }

    /// The palette and icon frames of a slot, as stored on the card.
    pub fn icon_bytes(&self, index: usize) -> Result<Vec<u8>> {
        check_index(index)?;
        Ok(ICON_REGION.slice(&self.raw[block_range(index)]).to_vec())
    }

    pub fn set_icon_bytes(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        check_index(index)?;
        if bytes.len() != ICON_REGION.len {
            return Err(Error::InvalidIconData {
                expected: ICON_REGION.len,
                actual: bytes.len(),
            });
        }
        ICON_REGION
            .slice_mut(&mut self.raw[block_range(index)])
            .copy_from_slice(bytes);
        self.refresh(Refresh::ICONS);
        Ok(())
    }

    /// One icon frame as 16x16 RGBA8, or `None` past the animation length.
    pub fn icon_rgba(&self, index: usize, frame: usize) -> Result<Option<Vec<u8>>> {
        let info = self.slot(index)?;
        if frame >= usize::from(info.icon_frames) {
            return Ok(None);
        }
        Ok(Some(icon::render_rgba(&info.icons[frame], &info.palette)))
    }

    fn clear_slot(&mut self, index: usize) {
        self.raw[frame_range(index)].fill(0);
        self.raw[block_range(index)].fill(0);
        self.comments[index].clear();
        self.link(index, BlockType::Formatted, None);
    }

    fn link(&mut self, index: usize, block_type: BlockType, next: Option<usize>) {
        self.set_block_type(index, block_type);
        let frame = &mut self.raw[frame_range(index)];
        let pointer = header::NEXT_SLOT.slice_mut(frame);
        match next {
            Some(next) => pointer.copy_from_slice(&[next as u8, 0x00]),
            None => pointer.copy_from_slice(&[NO_NEXT_SLOT, NO_NEXT_SLOT]),
        }
    }

    fn set_block_type(&mut self, index: usize, block_type: BlockType) {
        if let Some(tag) = block_type.to_byte() {
            self.raw[header_offset(index) + header::BLOCK_TYPE.offset] = tag;
        }
    }

    fn recalculate_checksums(&mut self) {
        for index in 0..SLOT_COUNT {
            stamp_checksum(&mut self.raw[frame_range(index)]);
        }
    }

    fn refresh(&mut self, what: Refresh) {
        for (index, info) in self.slots.iter_mut().enumerate() {
            slot::refresh_slot(
                info,
                &self.raw[frame_range(index)],
                &self.raw[block_range(index)],
                what,
            );
        }
    }

    fn stamp_system_frames(&mut self) {
        for frame in [system::CARD_HEADER, system::WRITE_TEST_FRAME] {
            let bytes = &mut self.raw[frame..frame + FRAME_SIZE];
            bytes.fill(0);
            bytes[..system::MAGIC.len()].copy_from_slice(system::MAGIC);
            bytes[header::CHECKSUM] = system::FRAME_CHECKSUM;
        }

        for i in 0..system::BROKEN_FRAME_COUNT {
            let start = system::BROKEN_FRAMES + i * FRAME_SIZE;
            let frame = &mut self.raw[start..start + FRAME_SIZE];
            frame[..4].fill(0xFF);
            header::NEXT_SLOT.slice_mut(frame).fill(0xFF);
        }
    }

    fn load_gme_comments(&mut self, bytes: &[u8]) {
        for (index, comment) in self.comments.iter_mut().enumerate() {
            let start = gme::COMMENTS + index * COMMENT_LEN;
            let raw = &bytes[start..start + COMMENT_LEN];
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            *comment = raw[..end].to_vec();
        }
    }

    fn fill_gme_header(&self, out: &mut [u8]) {
        for index in 0..SLOT_COUNT {
            let frame = &self.raw[frame_range(index)];
            out[gme::BLOCK_TYPES + index] = frame[header::BLOCK_TYPE.offset];
            out[gme::NEXT_SLOTS + index] = frame[header::NEXT_SLOT.offset];

            let comment = &self.comments[index];
            let len = comment.len().min(COMMENT_LEN - 1);
            let start = gme::COMMENTS + index * COMMENT_LEN;
            out[start..start + len].copy_from_slice(&comment[..len]);
        }
    }
}

fn check_index(index: usize) -> Result<()> {
    if index >= SLOT_COUNT {
        return Err(Error::InvalidSlot(index));
    }
    Ok(())
}

fn frame_range(index: usize) -> std::ops::Range<usize> {
    header_offset(index)..header_offset(index) + FRAME_SIZE
}

fn block_range(index: usize) -> std::ops::Range<usize> {
    data_offset(index)..data_offset(index) + BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum_matches;

    fn save(blocks: usize, name: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; FRAME_SIZE + blocks * BLOCK_SIZE];
        bytes[0] = 0x51;
        bytes[10..10 + name.len()].copy_from_slice(name);
        for block in 0..blocks {
            bytes[FRAME_SIZE + block * BLOCK_SIZE + 100] = block as u8 + 1;
        }
        bytes
    }

    #[test]
    fn new_card_is_formatted_and_signed() {
        let card = MemoryCard::new();
        assert_eq!(&card.raw()[..2], b"MC");
        assert_eq!(card.raw()[127], 0x0E);
        assert_eq!(&card.raw()[8064..8066], b"MC");
        assert_eq!(&card.raw()[2048..2052], &[0xFF; 4]);
        assert_eq!(card.stats().free, SLOT_COUNT);
        for index in 0..SLOT_COUNT {
            let frame = card.header(index).unwrap();
            assert_eq!(frame[0], 0xA0);
            assert_eq!(&frame[8..10], &[0xFF, 0xFF]);
            assert!(checksum_matches(frame));
        }
    }

    #[test]
    fn single_block_save_stays_initial() {
        let mut card = MemoryCard::new();
        let allocation = card.set_save_bytes(&save(1, b"BISLUS")).unwrap();
        assert_eq!(allocation.slots, vec![0]);

        let info = card.slot(0).unwrap();
        assert_eq!(info.block_type, BlockType::Initial);
        assert_eq!(info.next_slot, 0xFF);
        assert_eq!(info.size, 8192);
    }

    #[test]
    fn chain_walk_stops_on_cycles() {
        let mut card = MemoryCard::new();
        card.set_save_bytes(&save(2, b"BI")).unwrap();
        // Point the end link back at the initial block.
        card.link(1, BlockType::MiddleLink, Some(0));
        card.refresh(Refresh::BLOCK_TYPES);

        let chain = card.find_save_links(0).unwrap();
        assert_eq!(chain.len(), SLOT_COUNT);
        assert!(chain.partial);
        assert!(matches!(chain.complete(), Err(Error::CorruptedChain { .. })));
    }

    #[test]
    fn chain_walk_stops_at_corrupted_block() {
        let mut card = MemoryCard::new();
        card.set_save_bytes(&save(3, b"BI")).unwrap();
        card.raw[header_offset(1)] = 0x00;
        card.refresh(Refresh::BLOCK_TYPES);

        let chain = card.find_save_links(0).unwrap();
        assert_eq!(chain.slots, vec![0, 1]);
        assert!(chain.partial);
    }

    #[test]
    fn out_of_range_start_is_invalid() {
        let card = MemoryCard::new();
        assert!(matches!(card.find_save_links(15), Err(Error::InvalidSlot(15))));
        assert!(matches!(
            card.clone().format_slot(20),
            Err(Error::InvalidSlot(20))
        ));
    }

    #[test]
    fn too_short_save_is_rejected() {
        let mut card = MemoryCard::new();
        assert!(matches!(
            card.set_save_bytes(&[0x51; 200]),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn set_header_data_rewrites_name_fields() {
        let mut card = MemoryCard::new();
        card.set_save_bytes(&save(1, b"BISLUS-00001OLDNAME0")).unwrap();
        card.set_header_data(0, "SCUS-94163", "FF7SAVE01X", u16::from_le_bytes(*b"BA"))
            .unwrap();

        let info = card.slot(0).unwrap();
        assert_eq!(info.region_code(), "BA");
        assert_eq!(info.product_code, "SCUS-94163");
        assert_eq!(info.identifier, "FF7SAVE");
        assert_eq!(info.name, "BASCUS-94163FF7SAVE");
        assert!(checksum_matches(card.header(0).unwrap()));
    }

    #[test]
    fn icon_bytes_roundtrip_and_refresh() {
        let mut card = MemoryCard::new();
        card.set_save_bytes(&save(1, b"BI")).unwrap();

        let mut icon = card.icon_bytes(0).unwrap();
        assert_eq!(icon.len(), 416);
        icon[2..4].copy_from_slice(&0x001Fu16.to_le_bytes());
        icon[32] = 0x11;
        card.set_icon_bytes(0, &icon).unwrap();

        let info = card.slot(0).unwrap();
        assert_eq!(info.palette[1].to_rgba(), [0xF8, 0, 0, 0xFF]);
        assert_eq!(&info.icons[0][..2], &[1, 1]);
        assert!(matches!(
            card.set_icon_bytes(0, &icon[..10]),
            Err(Error::InvalidIconData { .. })
        ));
    }

    #[test]
    fn icon_rgba_respects_frame_count() {
        let mut card = MemoryCard::new();
        let mut bytes = save(1, b"BI");
        bytes[FRAME_SIZE + 2] = 0x12;
        card.set_save_bytes(&bytes).unwrap();

        assert!(card.icon_rgba(0, 1).unwrap().is_some());
        assert!(card.icon_rgba(0, 2).unwrap().is_none());
        assert_eq!(card.icon_rgba(0, 0).unwrap().map(|rgba| rgba.len()), Some(1024));
    }
}
