use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::layout::{action_replay, header, psv, AR_HEADER, FRAME_SIZE, PSV_HEADER};

const MCS_MAGIC: u8 = b'Q';
const RAW_MAGIC: &[u8] = b"SC";
const PSV_MAGIC: &[u8] = b"\0VSP";

/// Initial-block tag written into synthesised headers.
const INITIAL_TAG: u8 = 0x51;

/// Single-save file wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveFormat {
    /// Native 128-byte header followed by the data blocks.
    Mcs,
    /// Data blocks only.
    Raw,
    ActionReplay,
    /// Unsigned PS3 virtual save.
    Psv,
}

impl SaveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Mcs => "mcs",
            SaveFormat::Raw => "raw",
            SaveFormat::ActionReplay => "psx",
            SaveFormat::Psv => "psv",
        }
    }

    pub fn detect(bytes: &[u8]) -> Result<Self> {
        if bytes.first() == Some(&MCS_MAGIC) {
            return Ok(SaveFormat::Mcs);
        }
        if bytes.len() >= 2 && bytes[..2].eq_ignore_ascii_case(RAW_MAGIC) {
            return Ok(SaveFormat::Raw);
        }
        if bytes.starts_with(PSV_MAGIC) && bytes.get(psv::TYPE_TAG) == Some(&psv::PS1_TYPE) {
            return Ok(SaveFormat::Psv);
        }
        let ar_magic = action_replay::MAGIC_OFFSET..action_replay::MAGIC_OFFSET + 2;
        if bytes.get(ar_magic) == Some(RAW_MAGIC) {
            return Ok(SaveFormat::ActionReplay);
        }
        Err(Error::UnrecognizedSaveFormat)
    }

    /// Converts a wrapped save into a native header + data buffer.
    ///
    /// `file_name` supplies the save name for headerless raw saves.
    pub fn decode(bytes: &[u8], file_name: &str) -> Result<(Self, Vec<u8>)> {
        let format = Self::detect(bytes)?;
        let canonical = match format {
            SaveFormat::Mcs => bytes.to_vec(),
            SaveFormat::Raw => {
                let name = file_name.as_bytes();
                let name = &name[..name.len().min(header::NAME.len)];
                synthesize(name, bytes)
            }
            SaveFormat::Psv => {
                require(bytes, psv::DATA)?;
                synthesize(psv::IMPORT_NAME.slice(bytes), &bytes[psv::DATA..])
            }
            SaveFormat::ActionReplay => {
                require(bytes, action_replay::DATA)?;
                synthesize(
                    action_replay::NAME.slice(bytes),
                    &bytes[action_replay::DATA..],
                )
            }
        };
        log::debug!(
            "decoded {format:?} save: {} bytes -> {} bytes",
            bytes.len(),
            canonical.len()
        );
        Ok((format, canonical))
    }

    /// Wraps a native header + data buffer.
    ///
    /// The save name is copied byte for byte from the native header.
    /// `file_name` is the destination file name, stored by Action Replay.
    pub fn encode(self, save: &[u8], file_name: &str) -> Vec<u8> {
        let data = &save[FRAME_SIZE.min(save.len())..];
        let save_name = save
            .get(header::NAME.offset..header::NAME.end())
            .unwrap_or_default();
        match self {
            SaveFormat::Mcs => save.to_vec(),
            SaveFormat::Raw => data.to_vec(),
            SaveFormat::ActionReplay => {
                let mut out = AR_HEADER.build();
                put_truncated(action_replay::NAME.slice_mut(&mut out), save_name);
                put_truncated(
                    action_replay::FILE_NAME.slice_mut(&mut out),
                    file_name.as_bytes(),
                );
                out.extend_from_slice(data);
                out
            }
            SaveFormat::Psv => {
                let mut out = PSV_HEADER.build();
                LittleEndian::write_u32(
                    &mut out[psv::SAVE_LENGTH..psv::SAVE_LENGTH + 4],
                    data.len() as u32,
                );
                put_truncated(psv::NAME.slice_mut(&mut out), save_name);
                out.extend_from_slice(data);
                out
            }
        }
    }
}

fn synthesize(name: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; FRAME_SIZE + data.len()];
    out[header::BLOCK_TYPE.offset] = INITIAL_TAG;
    put_truncated(header::NAME.slice_mut(&mut out), name);
    out[FRAME_SIZE..].copy_from_slice(data);
    out
}

fn put_truncated(dest: &mut [u8], value: &[u8]) {
    let len = dest.len().min(value.len());
    dest[..len].copy_from_slice(&value[..len]);
}

fn require(bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() < len {
        return Err(Error::TruncatedInput {
            expected: len,
            actual: bytes.len(),
        });
    }
    Ok(())
}

impl FromStr for SaveFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mcs" | "ps1" => Ok(SaveFormat::Mcs),
            "raw" => Ok(SaveFormat::Raw),
            "ar" | "arx" | "psx" | "action-replay" => Ok(SaveFormat::ActionReplay),
            "psv" => Ok(SaveFormat::Psv),
            _ => Err(Error::UnrecognizedSaveFormat),
        }
    }
}
