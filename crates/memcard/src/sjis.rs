//! Lossy Shift-JIS decoding for save titles.
//!
//! Save titles are almost always full-width ASCII, which is folded back to
//! plain ASCII here. Kana and kanji are not mapped and come out as U+FFFD.

const REPLACEMENT: char = '\u{FFFD}';

/// Cuts a title at the first NUL found on a character boundary.
pub fn trim_title(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .chunks(2)
        .position(|pair| pair[0] == 0)
        .map(|index| index * 2)
        .unwrap_or(bytes.len());
    &bytes[..end]
}

pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();

    while let Some(lead) = iter.next() {
        match lead {
            0x00 => break,
            0x01..=0x7F => out.push(lead as char),
            0xA1..=0xDF => {
                let offset = u32::from(lead - 0xA1);
                out.push(char::from_u32(0xFF61 + offset).unwrap_or(REPLACEMENT));
            }
            0x81..=0x9F | 0xE0..=0xFC => match iter.next() {
                Some(trail) => out.push(fold_double_byte(lead, trail)),
                None => out.push(REPLACEMENT),
            },
            _ => out.push(REPLACEMENT),
        }
    }

    out
}

fn fold_double_byte(lead: u8, trail: u8) -> char {
    let code = u16::from_be_bytes([lead, trail]);
    match code {
        0x824F..=0x8258 => char::from(b'0' + (code - 0x824F) as u8),
        0x8260..=0x8279 => char::from(b'A' + (code - 0x8260) as u8),
        0x8281..=0x829A => char::from(b'a' + (code - 0x8281) as u8),
        _ => punctuation(code).unwrap_or(REPLACEMENT),
    }
}

fn punctuation(code: u16) -> Option<char> {
    let c = match code {
        0x8140 => ' ',
        0x8143 => ',',
        0x8144 => '.',
        0x8146 => ':',
        0x8147 => ';',
        0x8148 => '?',
        0x8149 => '!',
        0x8151 => '_',
        0x815B | 0x815D | 0x817C => '-',
        0x815E => '/',
        0x815F => '\\',
        0x8160 => '~',
        0x8162 => '|',
        0x8165 | 0x8166 => '\'',
        0x8167 | 0x8168 => '"',
        0x8169 => '(',
        0x816A => ')',
        0x816D => '[',
        0x816E => ']',
        0x816F => '{',
        0x8170 => '}',
        0x817B => '+',
        0x8181 => '=',
        0x8183 => '<',
        0x8184 => '>',
        0x818F => '\u{A5}',
        0x8190 => '$',
        0x8193 => '%',
        0x8194 => '#',
        0x8195 => '&',
        0x8196 => '*',
        0x8197 => '@',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_full_width_ascii() {
        // "ＦＦ７ ２"
        let bytes = [0x82, 0x65, 0x82, 0x65, 0x82, 0x56, 0x81, 0x40, 0x82, 0x51];
        assert_eq!(decode_lossy(&bytes), "FF7 2");
    }

    #[test]
    fn trims_at_even_nul() {
        let bytes = [0x82, 0x60, 0x00, 0x00, 0x41, 0x41];
        assert_eq!(trim_title(&bytes), &[0x82, 0x60]);
    }

    #[test]
    fn odd_nul_is_part_of_a_character() {
        let bytes = [b'A', 0x00, b'B', b'C'];
        assert_eq!(trim_title(&bytes), &bytes[..]);
        assert_eq!(decode_lossy(&bytes), "A");
    }

    #[test]
    fn unmapped_characters_are_replaced() {
        let bytes = [0x88, 0x9F, b'x', 0x82];
        assert_eq!(decode_lossy(&bytes), "\u{FFFD}x\u{FFFD}");
    }
}
