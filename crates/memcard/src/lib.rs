//! PS1 memory card images: slot metadata, save chains, block allocation and
//! the card/save container formats found in the wild.
//!
//! A [`MemoryCard`] owns one 128 KiB image. Every mutating call keeps the
//! header checksums and the derived [`SlotInfo`] table in sync with the raw
//! bytes, so the card can be written back at any point.

pub mod block;
pub mod card;
pub mod checksum;
pub mod container;
mod error;
pub mod icon;
pub mod layout;
pub mod single_save;
pub mod sjis;
pub mod slot;

pub use block::BlockType;
pub use card::{Allocation, CardStats, MemoryCard, SaveChain};
pub use container::CardFormat;
pub use error::{Error, Result};
pub use icon::Color;
pub use single_save::SaveFormat;
pub use slot::SlotInfo;
