#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Formatted,
    Initial,
    MiddleLink,
    EndLink,
    DeletedInitial,
    DeletedMiddleLink,
    DeletedEndLink,
    Corrupted,
}

impl BlockType {
    /// Unknown tags classify as [`BlockType::Corrupted`].
    pub fn from_byte(value: u8) -> Self {
        match value {
            0xA0 => BlockType::Formatted,
            0x51 => BlockType::Initial,
            0x52 => BlockType::MiddleLink,
            0x53 => BlockType::EndLink,
            0xA1 => BlockType::DeletedInitial,
            0xA2 => BlockType::DeletedMiddleLink,
            0xA3 => BlockType::DeletedEndLink,
            _ => BlockType::Corrupted,
        }
    }

    pub fn to_byte(self) -> Option<u8> {
        match self {
            BlockType::Formatted => Some(0xA0),
            BlockType::Initial => Some(0x51),
            BlockType::MiddleLink => Some(0x52),
            BlockType::EndLink => Some(0x53),
            BlockType::DeletedInitial => Some(0xA1),
            BlockType::DeletedMiddleLink => Some(0xA2),
            BlockType::DeletedEndLink => Some(0xA3),
            BlockType::Corrupted => None,
        }
    }

    /// The live/deleted counterpart, or `None` for blocks that never toggle.
    pub fn toggled(self) -> Option<Self> {
        match self {
            BlockType::Initial => Some(BlockType::DeletedInitial),
            BlockType::MiddleLink => Some(BlockType::DeletedMiddleLink),
            BlockType::EndLink => Some(BlockType::DeletedEndLink),
            BlockType::DeletedInitial => Some(BlockType::Initial),
            BlockType::DeletedMiddleLink => Some(BlockType::MiddleLink),
            BlockType::DeletedEndLink => Some(BlockType::EndLink),
            BlockType::Formatted | BlockType::Corrupted => None,
        }
    }

    pub fn is_free(self) -> bool {
        self == BlockType::Formatted
    }

    pub fn is_deleted(self) -> bool {
        matches!(
            self,
            BlockType::DeletedInitial | BlockType::DeletedMiddleLink | BlockType::DeletedEndLink
        )
    }

    pub fn is_save_start(self) -> bool {
        matches!(self, BlockType::Initial | BlockType::DeletedInitial)
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = match self {
            BlockType::Formatted => "free",
            BlockType::Initial => "save",
            BlockType::MiddleLink => "link",
            BlockType::EndLink => "end link",
            BlockType::DeletedInitial => "deleted save",
            BlockType::DeletedMiddleLink => "deleted link",
            BlockType::DeletedEndLink => "deleted end link",
            BlockType::Corrupted => "corrupted",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_tag_roundtrips() {
        for tag in [0xA0, 0x51, 0x52, 0x53, 0xA1, 0xA2, 0xA3] {
            assert_eq!(BlockType::from_byte(tag).to_byte(), Some(tag));
        }
    }

    #[test]
    fn unknown_tags_are_corrupted() {
        assert_eq!(BlockType::from_byte(0x00), BlockType::Corrupted);
        assert_eq!(BlockType::from_byte(0xFF), BlockType::Corrupted);
        assert_eq!(BlockType::from_byte(0x54), BlockType::Corrupted);
    }

    #[test]
    fn toggling_twice_is_identity() {
        for tag in [0x51, 0x52, 0x53, 0xA1, 0xA2, 0xA3] {
            let block = BlockType::from_byte(tag);
            assert_eq!(block.toggled().and_then(BlockType::toggled), Some(block));
        }
        assert_eq!(BlockType::Formatted.toggled(), None);
        assert_eq!(BlockType::Corrupted.toggled(), None);
    }
}
