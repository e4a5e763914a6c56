use std::{
    fmt::Display,
    io::{Read, Seek, SeekFrom},
    sync::OnceLock,
};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

use crate::codec::SingleByteCodec;

/// The text encoding a subtitle stream was sniffed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingKind {
    Ascii,
    Utf7,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32,
    /// The Windows-1256 table in [`crate::codec`].
    CustomSingleByte,
}

impl EncodingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingKind::Ascii => "ascii",
            EncodingKind::Utf7 => "utf-7",
            EncodingKind::Utf8 => "utf-8",
            EncodingKind::Utf16Le => "utf-16le",
            EncodingKind::Utf16Be => "utf-16be",
            EncodingKind::Utf32 => "utf-32",
            EncodingKind::CustomSingleByte => crate::codec::WEB_NAME,
        }
    }
}

impl Display for EncodingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefixes of subtitle dialects that are usually stored as Windows-1256
/// when they fail the UTF-8 scan.
const SINGLE_BYTE_MAGIC: [&[u8]; 10] = [
    &[0x31, 0x0D],       // "1\r"
    &[0x3C, 0x3F, 0x78], // "<?x"
    &[0x5B, 0x53, 0x63], // "[Sc"
    &[0x7B, 0x32, 0x34], // "{24"
    &[0x7B, 0x48, 0x45], // "{HE"
    &[0x5B, 0x54, 0x49], // "[TI"
    &[0x2A, 0x50, 0x41], // "*PA"
    &[0x30, 0x30, 0x30], // "000"
    &[0x30, 0x30, 0x3A], // "00:"
    &[0x5B, 0x49, 0x4E], // "[IN"
];

const INITIAL_CHUNK_SIZE: usize = 4 * 1024;

/// Applies the sniffing rules in order, the first match wins.
fn classify(prefix: [u8; 4], is_utf8: bool) -> EncodingKind {
    match prefix {
        [0x2B, 0x2F, 0x76, _] => EncodingKind::Utf7,
        _ if is_utf8 => EncodingKind::Utf8,
        [0xEF, 0xBB, 0xBF, _] => EncodingKind::Utf8,
        [0xFF, 0xFE, ..] => EncodingKind::Utf16Le,
        [0xFE, 0xFF, ..] => EncodingKind::Utf16Be,
        [0x00, 0x00, 0xFE, 0xFF] => EncodingKind::Utf32,
        _ if SINGLE_BYTE_MAGIC.iter().any(|m| prefix.starts_with(m)) => {
            EncodingKind::CustomSingleByte
        }
        _ => EncodingKind::Ascii,
    }
}

/// Returns the first four bytes, zero padded if the input is shorter.
fn prefix_of(bytes: &[u8]) -> [u8; 4] {
    let mut prefix = [0; 4];
    let len = bytes.len().min(4);
    prefix[..len].copy_from_slice(&bytes[..len]);
    prefix
}

/// Detects the encoding of an in-memory buffer.
pub fn detect_bytes(bytes: &[u8]) -> EncodingKind {
    let kind = classify(prefix_of(bytes), is_utf8(bytes));
    log::debug!("auto detected encoding: {kind}");
    kind
}

/// Detects the encoding of a stream starting at its current position.
///
/// The stream is rewound to where it was before returning.
pub fn detect<R: Read + Seek>(reader: &mut R) -> std::io::Result<EncodingKind> {
    let origin = reader.stream_position()?;
    let buffer = read_in_chunks(reader, origin)?;
    reader.seek(SeekFrom::Start(origin))?;
    let kind = classify(prefix_of(&buffer), is_utf8(&buffer));
    log::debug!("auto detected encoding: {kind}");
    Ok(kind)
}

/// Reads from `origin` with a doubling buffer size until a short read.
fn read_in_chunks<R: Read + Seek>(reader: &mut R, origin: u64) -> std::io::Result<Vec<u8>> {
    let mut count = INITIAL_CHUNK_SIZE;
    loop {
        reader.seek(SeekFrom::Start(origin))?;
        let mut buffer = Vec::with_capacity(count);
        reader.by_ref().take(count as u64).read_to_end(&mut buffer)?;
        if buffer.len() < count {
            return Ok(buffer);
        }
        count *= 2;
    }
}

#[inline]
fn is_continuation(byte: u8) -> bool {
    (0x80..=0xBF).contains(&byte)
}

/// Returns the length of the well-formed sequence starting at `bytes[0]`.
fn sequence_length(bytes: &[u8]) -> Option<usize> {
    let lead = *bytes.first()?;
    let (len, second) = match lead {
        0x00..=0x7F => return Some(1),
        0xC2..=0xDF => (2, 0x80..=0xBF),
        0xE0 => (3, 0xA0..=0xBF),
        0xE1..=0xEF => (3, 0x80..=0xBF),
        0xF0 => (4, 0x90..=0xBF),
        0xF1..=0xF3 => (4, 0x80..=0xBF),
        0xF4 => (4, 0x80..=0x8F),
        _ => return None,
    };
    let tail = bytes.get(1..len)?;
    if !second.contains(&tail[0]) || !tail[1..].iter().copied().all(is_continuation) {
        return None;
    }
    Some(len)
}

/// A strict byte-level UTF-8 scan.
pub fn is_utf8(bytes: &[u8]) -> bool {
    let mut position = 0;
    while position < bytes.len() {
        match sequence_length(&bytes[position..]) {
            Some(len) => position += len,
            None => return false,
        }
    }
    true
}

fn utf7_engine() -> &'static GeneralPurpose {
    static ENGINE: OnceLock<GeneralPurpose> = OnceLock::new();
    ENGINE.get_or_init(|| {
        GeneralPurpose::new(
            &alphabet::STANDARD,
            GeneralPurposeConfig::new()
                .with_encode_padding(false)
                .with_decode_padding_mode(DecodePaddingMode::RequireNone)
                .with_decode_allow_trailing_bits(true),
        )
    })
}

#[inline]
fn is_base64_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/'
}

fn decode_utf7(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        index += 1;
        if byte != b'+' {
            output.push(if byte.is_ascii() { byte as char } else { '\u{FFFD}' });
            continue;
        }

        let start = index;
        while index < bytes.len() && is_base64_char(bytes[index]) {
            index += 1;
        }
        let run = &bytes[start..index];
        // "-" terminates a run and is swallowed
        if bytes.get(index) == Some(&b'-') {
            index += 1;
        }

        if run.is_empty() {
            output.push('+');
            continue;
        }

        match utf7_engine().decode(run) {
            Ok(decoded) => {
                let units = decoded
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
                output.extend(
                    char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
                );
            }
            Err(e) => {
                log::debug!("invalid utf-7 shifted sequence: {e}");
                output.push(char::REPLACEMENT_CHARACTER);
            }
        }
    }
    output
}

fn decode_utf16(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let chunks = bytes.chunks_exact(2);
    let trailing = !chunks.remainder().is_empty();
    let units = chunks.map(|pair| from_bytes([pair[0], pair[1]]));
    let mut output: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if trailing {
        output.push(char::REPLACEMENT_CHARACTER);
    }
    output
}

fn decode_utf32_be(bytes: &[u8]) -> String {
    let chunks = bytes.chunks_exact(4);
    let trailing = !chunks.remainder().is_empty();
    let mut output: String = chunks
        .map(|c| {
            char::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    if trailing {
        output.push(char::REPLACEMENT_CHARACTER);
    }
    output
}

/// Decodes `bytes` as the given encoding.
///
/// A leading byte order mark is removed. Invalid input never fails, it
/// decodes to replacement characters instead (or `?` for ASCII).
pub fn decode_text(bytes: &[u8], kind: EncodingKind) -> String {
    let mut text = match kind {
        EncodingKind::Ascii => bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect(),
        EncodingKind::Utf7 => decode_utf7(bytes),
        EncodingKind::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        EncodingKind::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
        EncodingKind::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
        EncodingKind::Utf32 => decode_utf32_be(bytes),
        EncodingKind::CustomSingleByte => SingleByteCodec::new().decode(bytes),
    };

    if text.starts_with('\u{feff}') {
        // U+FEFF is 3 bytes
        text.drain(..3);
    }
    text
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_bom_always_utf8() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        assert_eq!(detect_bytes(&bytes), EncodingKind::Utf8);
        // garbage after the BOM still counts as UTF-8
        bytes.extend_from_slice(&[0xFF, 0xFE, 0xC3, 0x28, 0x80]);
        assert_eq!(detect_bytes(&bytes), EncodingKind::Utf8);
    }

    #[test]
    fn test_valid_utf8_without_bom() {
        let text = "1\n00:00:01,000 --> 00:00:02,000\nHéllo, こんにちは 😀";
        assert_eq!(detect_bytes(text.as_bytes()), EncodingKind::Utf8);
        // a multibyte character at the very end of the buffer
        assert_eq!(detect_bytes("né".as_bytes()), EncodingKind::Utf8);
        assert_eq!(detect_bytes(b""), EncodingKind::Utf8);
    }

    #[test]
    fn test_invalid_continuation() {
        let mut bytes = "hé, world".as_bytes().to_vec();
        assert_eq!(bytes[2], 0xA9);
        bytes[2] = b'A';
        assert!(!is_utf8(&bytes));
        assert_eq!(detect_bytes(&bytes), EncodingKind::Ascii);
    }

    #[test]
    fn test_utf8_scan_rules() {
        assert!(is_utf8(&[0xE0, 0xA0, 0x80]));
        assert!(!is_utf8(&[0xE0, 0x80, 0x80]));
        assert!(is_utf8(&[0xF0, 0x90, 0x80, 0x80]));
        assert!(!is_utf8(&[0xF0, 0x80, 0x80, 0x80]));
        assert!(is_utf8(&[0xF4, 0x8F, 0xBF, 0xBF]));
        assert!(!is_utf8(&[0xF4, 0x90, 0x80, 0x80]));
        assert!(!is_utf8(&[0xC0, 0x80]));
        assert!(!is_utf8(&[0xF5, 0x80, 0x80, 0x80]));
        // truncated sequences
        assert!(!is_utf8(&[b'a', 0xE1, 0x80]));
        assert!(!is_utf8(&[0xC3]));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(detect_bytes(b"+/v8-abc"), EncodingKind::Utf7);
        assert_eq!(detect_bytes(&[0xFF, 0xFE, 0x41, 0x00]), EncodingKind::Utf16Le);
        assert_eq!(detect_bytes(&[0xFE, 0xFF, 0x00, 0x41]), EncodingKind::Utf16Be);
        assert_eq!(detect_bytes(&[0xFF, 0xFE]), EncodingKind::Utf16Le);
        assert_eq!(
            detect_bytes(&[0x00, 0x00, 0xFE, 0xFF, 0x00, 0x00, 0x00, 0x41, 0xFF]),
            EncodingKind::Utf32
        );
    }

    #[test]
    fn test_single_byte_magic() {
        let mut srt = b"1\r\n00:00:01,000 --> 00:00:02,000\r\n".to_vec();
        // valid UTF-8 wins over the magic table
        assert_eq!(detect_bytes(&srt), EncodingKind::Utf8);
        srt.extend_from_slice(&[0xD3, 0xE1, 0xC7, 0xE3]);
        assert_eq!(detect_bytes(&srt), EncodingKind::CustomSingleByte);

        for magic in SINGLE_BYTE_MAGIC {
            let mut bytes = magic.to_vec();
            bytes.extend_from_slice(&[b' ', 0xE1]);
            assert_eq!(detect_bytes(&bytes), EncodingKind::CustomSingleByte);
        }

        assert_eq!(detect_bytes(&[b'x', 0xE1]), EncodingKind::Ascii);
    }

    #[test]
    fn test_detect_restores_position() {
        let mut data = b"ignored".to_vec();
        data.extend_from_slice(&[0xFF, 0xFE, 0x41, 0x00, 0x42, 0x00]);
        let mut cursor = Cursor::new(data);
        cursor.seek(SeekFrom::Start(7)).unwrap();
        assert_eq!(detect(&mut cursor).unwrap(), EncodingKind::Utf16Le);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn test_detect_large_stream() {
        // crosses several chunk boundaries
        let mut data = "é".repeat(10_000).into_bytes();
        let mut cursor = Cursor::new(data.clone());
        assert_eq!(detect(&mut cursor).unwrap(), EncodingKind::Utf8);
        assert_eq!(cursor.position(), 0);

        data.push(0xFF);
        let mut cursor = Cursor::new(data);
        assert_eq!(detect(&mut cursor).unwrap(), EncodingKind::Ascii);
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhi", EncodingKind::Utf8), "hi");
        assert_eq!(decode_text(b"a\xE9b", EncodingKind::Ascii), "a?b");
        assert_eq!(
            decode_text(&[0xFF, 0xFE, 0x68, 0x00, 0x69, 0x00], EncodingKind::Utf16Le),
            "hi"
        );
        assert_eq!(
            decode_text(&[0xFE, 0xFF, 0x00, 0x68, 0x00, 0x69], EncodingKind::Utf16Be),
            "hi"
        );
        assert_eq!(
            decode_text(
                &[0x00, 0x00, 0xFE, 0xFF, 0x00, 0x00, 0x00, 0x68],
                EncodingKind::Utf32
            ),
            "h"
        );
        assert_eq!(
            decode_text(&[0xD3, 0xE1, 0xC7, 0xE3], EncodingKind::CustomSingleByte),
            "سلام"
        );
    }

    #[test]
    fn test_decode_utf7() {
        assert_eq!(decode_text(b"Hi Mom -+Jjo--!", EncodingKind::Utf7), "Hi Mom -☺-!");
        assert_eq!(decode_text(b"A+ImIDkQ.", EncodingKind::Utf7), "A≢Α.");
        assert_eq!(decode_text(b"1 +- 1", EncodingKind::Utf7), "1 + 1");
        assert_eq!(decode_text(b"+/v8-hi", EncodingKind::Utf7), "hi");
    }
}
