use std::{collections::HashMap, sync::OnceLock};

use thiserror::Error;

/// Errors produced by [`SingleByteCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The character has no byte in the table and there is no fallback.
    #[error("the encoding windows-1256 cannot encode the character {character:?} at index {index}")]
    UnsupportedCharacter { character: char, index: usize },
    /// The requested fallback character is not encodable itself.
    #[error("cannot use the character {0:?} as fallback since it is not supported by the encoding")]
    InvalidFallback(char),
}

/// The IANA name of the encoding this codec implements.
pub const WEB_NAME: &str = "windows-1256";

/// The number of characters the codec supports.
pub const CHARACTER_COUNT: usize = 256;

/// Characters for the bytes `0x80..=0xFF`.
///
/// The lower half of the table is plain ASCII.
#[rustfmt::skip]
const UPPER_HALF: [char; 128] = [
    '\u{20AC}', '\u{067E}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}', // 0x80
    '\u{02C6}', '\u{2030}', '\u{0679}', '\u{2039}', '\u{0152}', '\u{0686}', '\u{0698}', '\u{0688}', // 0x88
    '\u{06AF}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', // 0x90
    '\u{06A9}', '\u{2122}', '\u{0691}', '\u{203A}', '\u{0153}', '\u{200C}', '\u{200D}', '\u{06BA}', // 0x98
    '\u{00A0}', '\u{060C}', '\u{00A2}', '\u{00A3}', '\u{00A4}', '\u{00A5}', '\u{00A6}', '\u{00A7}', // 0xA0
    '\u{00A8}', '\u{00A9}', '\u{06BE}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{00AF}', // 0xA8
    '\u{00B0}', '\u{00B1}', '\u{00B2}', '\u{00B3}', '\u{00B4}', '\u{00B5}', '\u{00B6}', '\u{00B7}', // 0xB0
    '\u{00B8}', '\u{00B9}', '\u{061B}', '\u{00BB}', '\u{00BC}', '\u{00BD}', '\u{00BE}', '\u{061F}', // 0xB8
    '\u{06C1}', '\u{0621}', '\u{0622}', '\u{0623}', '\u{0624}', '\u{0625}', '\u{0626}', '\u{0627}', // 0xC0
    '\u{0628}', '\u{0629}', '\u{062A}', '\u{062B}', '\u{062C}', '\u{062D}', '\u{062E}', '\u{062F}', // 0xC8
    '\u{0630}', '\u{0631}', '\u{0632}', '\u{0633}', '\u{0634}', '\u{0635}', '\u{0636}', '\u{00D7}', // 0xD0
    '\u{0637}', '\u{0638}', '\u{0639}', '\u{063A}', '\u{0640}', '\u{0641}', '\u{0642}', '\u{0643}', // 0xD8
    '\u{00E0}', '\u{0644}', '\u{00E2}', '\u{0645}', '\u{0646}', '\u{0647}', '\u{0648}', '\u{00E7}', // 0xE0
    '\u{00E8}', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{0649}', '\u{064A}', '\u{00EE}', '\u{00EF}', // 0xE8
    '\u{064B}', '\u{064C}', '\u{064D}', '\u{064E}', '\u{00F4}', '\u{064F}', '\u{0650}', '\u{00F7}', // 0xF0
    '\u{0651}', '\u{00F9}', '\u{0652}', '\u{00FB}', '\u{00FC}', '\u{200E}', '\u{200F}', '\u{06D2}', // 0xF8
];

const fn build_table() -> [char; CHARACTER_COUNT] {
    let mut table = ['\0'; CHARACTER_COUNT];
    let mut index = 0;
    while index < 128 {
        table[index] = index as u8 as char;
        index += 1;
    }
    while index < CHARACTER_COUNT {
        table[index] = UPPER_HALF[index - 128];
        index += 1;
    }
    table
}

static BYTE_TO_CHAR: [char; CHARACTER_COUNT] = build_table();

fn char_to_byte() -> &'static HashMap<char, u8> {
    static MAP: OnceLock<HashMap<char, u8>> = OnceLock::new();
    MAP.get_or_init(|| {
        BYTE_TO_CHAR
            .iter()
            .enumerate()
            .map(|(byte, &ch)| (ch, byte as u8))
            .collect()
    })
}

/// Returns the character a byte decodes to.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Returns the byte a character encodes to, if there is one.
#[inline]
pub fn char_to_byte_lookup(ch: char) -> Option<u8> {
    char_to_byte().get(&ch).copied()
}

/// The Windows-1256 (Arabic) codec with an optional fallback character.
///
/// Every byte maps to exactly one character, so decoding never fails.
/// Characters outside of the table are replaced by the fallback byte or
/// rejected when there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleByteCodec {
    fallback: Option<(char, u8)>,
}

impl Default for SingleByteCodec {
    /// The default codec substitutes unsupported characters with `?`.
    fn default() -> Self {
        Self {
            fallback: Some(('?', b'?')),
        }
    }
}

impl SingleByteCodec {
    /// Creates a codec that substitutes unsupported characters with `?`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strict codec that fails on unsupported characters.
    pub const fn without_fallback() -> Self {
        Self { fallback: None }
    }

    pub fn fallback_char(&self) -> Option<char> {
        self.fallback.map(|(ch, _)| ch)
    }

    pub fn fallback_byte(&self) -> Option<u8> {
        self.fallback.map(|(_, byte)| byte)
    }

    /// Sets or clears the fallback character.
    ///
    /// The character must be encodable, otherwise the previous fallback is kept.
    pub fn set_fallback(&mut self, fallback: Option<char>) -> Result<(), CodecError> {
        self.fallback = match fallback {
            Some(ch) => {
                let byte = char_to_byte_lookup(ch).ok_or(CodecError::InvalidFallback(ch))?;
                Some((ch, byte))
            }
            None => None,
        };
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| byte_to_char(b)).collect()
    }

    pub fn encode(&self, s: &str) -> Result<Vec<u8>, CodecError> {
        s.chars()
            .enumerate()
            .map(|(index, character)| {
                char_to_byte_lookup(character)
                    .or(self.fallback_byte())
                    .ok_or(CodecError::UnsupportedCharacter { character, index })
            })
            .collect()
    }

    /// The number of bytes `s` encodes to.
    pub fn byte_count(&self, s: &str) -> usize {
        s.chars().count()
    }

    /// The number of characters `bytes` decodes to.
    pub fn char_count(&self, bytes: &[u8]) -> usize {
        bytes.len()
    }

    pub const fn max_byte_count(&self, char_count: usize) -> usize {
        char_count
    }

    pub const fn max_char_count(&self, byte_count: usize) -> usize {
        byte_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_byte() {
        let codec = SingleByteCodec::without_fallback();
        for byte in 0..=255u8 {
            let decoded = codec.decode(&[byte]);
            let encoded = codec.encode(&decoded).expect("table is bijective");
            assert_eq!(encoded, vec![byte]);
            assert_eq!(codec.decode(&encoded), decoded);
        }
    }

    #[test]
    fn test_known_characters() {
        assert_eq!(byte_to_char(b'A'), 'A');
        assert_eq!(byte_to_char(0x80), '€');
        assert_eq!(byte_to_char(0xC7), 'ا');
        assert_eq!(byte_to_char(0xBF), '؟');
        assert_eq!(byte_to_char(0xFF), '\u{06D2}');
        assert_eq!(char_to_byte_lookup('ی'), None);
        assert_eq!(char_to_byte_lookup('ي'), Some(0xED));
    }

    #[test]
    fn test_encode_fallback() {
        let codec = SingleByteCodec::new();
        assert_eq!(codec.fallback_char(), Some('?'));
        assert_eq!(codec.encode("a日b").unwrap(), b"a?b");

        let strict = SingleByteCodec::without_fallback();
        assert_eq!(
            strict.encode("a日b"),
            Err(CodecError::UnsupportedCharacter {
                character: '日',
                index: 1
            })
        );
    }

    #[test]
    fn test_invalid_fallback() {
        let mut codec = SingleByteCodec::new();
        assert_eq!(
            codec.set_fallback(Some('日')),
            Err(CodecError::InvalidFallback('日'))
        );
        assert_eq!(codec.fallback_char(), Some('?'));

        codec.set_fallback(Some('؟')).unwrap();
        assert_eq!(codec.fallback_byte(), Some(0xBF));
        assert_eq!(codec.encode("日").unwrap(), vec![0xBF]);

        codec.set_fallback(None).unwrap();
        assert!(codec.encode("日").is_err());
    }

    #[test]
    fn test_counts_are_identity() {
        let codec = SingleByteCodec::new();
        assert_eq!(codec.byte_count("سلام"), 4);
        assert_eq!(codec.char_count(&[0xD3, 0xE1, 0xC7, 0xE3]), 4);
        assert_eq!(codec.max_byte_count(10), 10);
        assert_eq!(codec.max_char_count(7), 7);
    }
}
