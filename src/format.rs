use std::{fmt::Display, io::Read};

use thiserror::Error;

use crate::{
    encoding::{decode_text, EncodingKind},
    json::JsonParser,
    ttml::TtmlParser,
    utils::format_timestamp,
};

/// A single caption with its display window in milliseconds.
///
/// A negative time means the timecode could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubtitleItem {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub lines: Vec<String>,
}

impl SubtitleItem {
    pub fn new(start_time_ms: i64, end_time_ms: i64, lines: Vec<String>) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            lines,
        }
    }

    /// Returns `true` if neither timecode is the invalid marker.
    pub fn has_valid_times(&self) -> bool {
        self.start_time_ms >= 0 && self.end_time_ms >= 0
    }

    /// Returns `true` if the item is visible at `position_ms` after shifting it by `offset_ms`.
    pub fn contains(&self, position_ms: f64, offset_ms: i64) -> bool {
        let start = self.start_time_ms.saturating_add(offset_ms) as f64;
        let end = self.end_time_ms.saturating_add(offset_ms) as f64;
        start <= position_ms && position_ms <= end
    }
}

impl Display for SubtitleItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} --> {}",
            format_timestamp(self.start_time_ms),
            format_timestamp(self.end_time_ms)
        )?;
        for line in &self.lines {
            f.write_str("\n")?;
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// An error that aborts parsing a whole document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not read subtitle stream: {0}")]
    Io(#[from] std::io::Error),
    /// The document produced no subtitles.
    #[error("{0}")]
    Format(String),
    #[error("could not recognize subtitle format")]
    UnknownFormat,
}

/// A single record that could not be turned into a [`SubtitleItem`].
///
/// These are logged and skipped rather than failing the document.
#[derive(Debug, Error)]
#[error("malformed record {index}: {reason}")]
pub struct MalformedRecord {
    pub index: usize,
    pub reason: String,
}

impl MalformedRecord {
    pub(crate) fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Collects the parsed records, logging the ones that failed.
pub(crate) fn collect_records<I>(format: &str, records: I) -> Result<Vec<SubtitleItem>, ParseError>
where
    I: Iterator<Item = Result<SubtitleItem, MalformedRecord>>,
{
    let items = records
        .filter_map(|record| match record {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("skipping {format} record: {e}");
                None
            }
        })
        .collect::<Vec<_>>();

    if items.is_empty() {
        Err(ParseError::Format(format!(
            "stream is not in a valid {format} format, or represents empty subtitles"
        )))
    } else {
        log::debug!("parsed {} {format} subtitles", items.len());
        Ok(items)
    }
}

/// Turns a subtitle stream into a list of items.
pub trait SubtitlesParser {
    /// A human readable name of the format, e.g. `JSON`.
    fn name(&self) -> &'static str;

    /// Parses already decoded text.
    ///
    /// Returns [`ParseError::Format`] if no subtitles were found.
    fn parse_text(&self, text: &str) -> Result<Vec<SubtitleItem>, ParseError>;

    /// Reads the stream to the end, decodes it and parses the result.
    fn parse_stream(
        &self,
        reader: &mut dyn Read,
        encoding: EncodingKind,
    ) -> Result<Vec<SubtitleItem>, ParseError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.parse_text(&decode_text(&bytes, encoding))
    }
}

/// The subtitle formats that have a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Ttml,
}

impl Format {
    /// Guesses the format from the first significant character of the text.
    pub fn detect(text: &str) -> Option<Self> {
        match text.trim_start_matches(['\u{feff}', ' ', '\t', '\r', '\n']).chars().next()? {
            '[' => Some(Self::Json),
            '<' => Some(Self::Ttml),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "ttml" | "dfxp" | "xml" => Some(Self::Ttml),
            _ => None,
        }
    }

    pub fn parser(&self) -> &'static dyn SubtitlesParser {
        match self {
            Format::Json => &JsonParser,
            Format::Ttml => &TtmlParser,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.parser().name()
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
