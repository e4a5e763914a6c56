use std::{
    io::{Read, Seek},
    path::Path,
};

pub mod codec;
pub mod colour;
pub mod encoding;
pub mod format;
pub mod json;
pub mod markup;
pub mod selector;
pub mod ttml;
pub mod utils;

pub use encoding::EncodingKind;
pub use format::{Format, ParseError, SubtitleItem, SubtitlesParser};
pub use selector::{DisplayUpdate, Inline, Session};

/// A parsed subtitle file along with what was detected about it.
#[derive(Debug, Clone)]
pub struct LoadedSubtitles {
    pub encoding: EncodingKind,
    pub format: Format,
    pub items: Vec<SubtitleItem>,
}

/// Loads subtitles from an in-memory buffer.
///
/// If `format` is not given it's guessed from the decoded text.
pub fn load_from_bytes(bytes: &[u8], format: Option<Format>) -> Result<LoadedSubtitles, ParseError> {
    let encoding = encoding::detect_bytes(bytes);
    let text = encoding::decode_text(bytes, encoding);
    let format = match format {
        Some(format) => format,
        None => Format::detect(&text).ok_or(ParseError::UnknownFormat)?,
    };
    log::debug!("loading {format} subtitles encoded as {encoding}");
    let items = format.parser().parse_text(&text)?;
    Ok(LoadedSubtitles {
        encoding,
        format,
        items,
    })
}

/// Loads subtitles of a known format from a seekable stream.
///
/// The encoding is sniffed starting at the current position.
pub fn load_from_reader<R: Read + Seek>(
    reader: &mut R,
    format: Format,
) -> Result<LoadedSubtitles, ParseError> {
    let encoding = encoding::detect(reader)?;
    log::debug!("loading {format} subtitles encoded as {encoding}");
    let items = format.parser().parse_stream(reader, encoding)?;
    Ok(LoadedSubtitles {
        encoding,
        format,
        items,
    })
}

/// Loads a subtitle file.
///
/// Without an explicit format the file extension is checked first and then
/// the contents.
pub fn load_file(path: &Path, format: Option<Format>) -> Result<LoadedSubtitles, ParseError> {
    let format = format.or_else(|| {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Format::from_extension)
    });

    let mut fp = std::fs::File::open(path)?;
    match format {
        Some(format) => load_from_reader(&mut fp, format),
        None => {
            let mut bytes = Vec::new();
            fp.read_to_end(&mut bytes)?;
            load_from_bytes(&bytes, None)
        }
    }
}
