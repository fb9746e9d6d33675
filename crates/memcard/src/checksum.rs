use crate::layout::header;

pub fn header_checksum(frame: &[u8]) -> u8 {
    header::CHECKSUMMED
        .slice(frame)
        .iter()
        .fold(0, |acc, byte| acc ^ byte)
}

pub fn stamp_checksum(frame: &mut [u8]) {
    frame[header::CHECKSUM] = header_checksum(frame);
}

pub fn checksum_matches(frame: &[u8]) -> bool {
    frame[header::CHECKSUM] == header_checksum(frame)
}
