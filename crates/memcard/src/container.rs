use std::str::FromStr;

use crate::error::{Error, Result};
use crate::layout::{HeaderTemplate, CARD_SIZE, GME_HEADER, VGS_HEADER, VMP_HEADER};

/// Whole-card wrapper around the raw 128 KiB image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CardFormat {
    #[default]
    Raw,
    Gme,
    Vgs,
    Vmp,
}

impl CardFormat {
    pub const ALL: [CardFormat; 4] = [
        CardFormat::Raw,
        CardFormat::Gme,
        CardFormat::Vgs,
        CardFormat::Vmp,
    ];

    pub fn magic(self) -> &'static [u8] {
        match self {
            CardFormat::Raw => b"MC",
            CardFormat::Gme => b"123-456-STD",
            CardFormat::Vgs => b"VgsM",
            CardFormat::Vmp => b"\0PMV",
        }
    }

    /// Offset of the raw image inside the wrapped file.
    pub fn image_offset(self) -> usize {
        self.header_template().map(|t| t.size).unwrap_or(0)
    }

    pub fn header_template(self) -> Option<&'static HeaderTemplate> {
        match self {
            CardFormat::Raw => None,
            CardFormat::Gme => Some(&GME_HEADER),
            CardFormat::Vgs => Some(&VGS_HEADER),
            CardFormat::Vmp => Some(&VMP_HEADER),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CardFormat::Raw => "mcr",
            CardFormat::Gme => "gme",
            CardFormat::Vgs => "vgs",
            CardFormat::Vmp => "vmp",
        }
    }

    /// Sniffs the wrapper from the leading bytes, in priority order.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        CardFormat::ALL
            .into_iter()
            .find(|format| bytes.starts_with(format.magic()))
            .ok_or(Error::UnsupportedFormat)
    }

    /// Returns the wrapper and the raw image it contains.
    pub fn unwrap_image(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let format = Self::detect(bytes)?;
        let start = format.image_offset();
        let image = bytes
            .get(start..start + CARD_SIZE)
            .ok_or(Error::TruncatedInput {
                expected: start + CARD_SIZE,
                actual: bytes.len(),
            })?;
        Ok((format, image))
    }
}

impl FromStr for CardFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "raw" | "mcr" | "mcd" | "bin" | "ddf" | "mc" | "mem" => Ok(CardFormat::Raw),
            "gme" => Ok(CardFormat::Gme),
            "vgs" | "vm1" => Ok(CardFormat::Vgs),
            "vmp" => Ok(CardFormat::Vmp),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

impl std::fmt::Display for CardFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = match self {
            CardFormat::Raw => "raw",
            CardFormat::Gme => "gme",
            CardFormat::Vgs => "vgs",
            CardFormat::Vmp => "vmp",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(format: CardFormat) -> Vec<u8> {
        let mut bytes = format
            .header_template()
            .map(HeaderTemplate::build)
            .unwrap_or_default();
        let mut image = vec![0u8; CARD_SIZE];
        image[..2].copy_from_slice(b"MC");
        image[CARD_SIZE - 1] = 0x77;
        bytes.extend_from_slice(&image);
        bytes
    }

    #[test]
    fn every_wrapper_is_detected() {
        for format in CardFormat::ALL {
            let bytes = wrapped(format);
            let (detected, image) = CardFormat::unwrap_image(&bytes).expect("detect");
            assert_eq!(detected, format);
            assert_eq!(image.len(), CARD_SIZE);
            assert_eq!(&image[..2], b"MC");
            assert_eq!(image[CARD_SIZE - 1], 0x77);
        }
    }

    #[test]
    fn short_input_is_truncated() {
        let mut bytes = wrapped(CardFormat::Vgs);
        bytes.pop();
        match CardFormat::unwrap_image(&bytes) {
            Err(Error::TruncatedInput { expected, actual }) => {
                assert_eq!(expected, 64 + CARD_SIZE);
                assert_eq!(actual, 64 + CARD_SIZE - 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_magic_is_unsupported() {
        assert!(matches!(
            CardFormat::detect(b"PMV\0"),
            Err(Error::UnsupportedFormat)
        ));
        assert!(matches!(CardFormat::detect(b""), Err(Error::UnsupportedFormat)));
    }

    #[test]
    fn encrypted_wrappers_are_not_parsed() {
        assert!(matches!(
            "mcx".parse::<CardFormat>(),
            Err(Error::UnsupportedFormat)
        ));
        assert_eq!("GME".parse::<CardFormat>().ok(), Some(CardFormat::Gme));
    }
}
