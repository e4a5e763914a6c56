use serde::Deserialize;

use crate::{
    format::{collect_records, MalformedRecord, ParseError, SubtitleItem, SubtitlesParser},
    utils::split_any,
};

/// The strings that separate lines inside of `text`.
const LINE_SEPARATORS: [&str; 5] = ["<br />", "\r\n", "\n", "<br/>", "/<br>"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timecode {
    Number(f64),
    Text(String),
}

impl Timecode {
    fn to_millis(&self) -> i64 {
        match self {
            // f64's Display drops a trailing `.0`
            Timecode::Number(n) => parse_timecode(&n.to_string()),
            Timecode::Text(s) => parse_timecode(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonCue {
    start: Timecode,
    end: Timecode,
    text: String,
}

/// Removes every `.` and reads the rest as an integer, or `-1` on failure.
pub(crate) fn parse_timecode(s: &str) -> i64 {
    s.trim().replace('.', "").parse().unwrap_or(-1)
}

fn parse_cue(index: usize, value: serde_json::Value) -> Result<SubtitleItem, MalformedRecord> {
    let cue = JsonCue::deserialize(value).map_err(|e| MalformedRecord::new(index, e.to_string()))?;
    Ok(SubtitleItem {
        start_time_ms: cue.start.to_millis(),
        end_time_ms: cue.end.to_millis(),
        lines: split_any(&cue.text, &LINE_SEPARATORS)
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// A parser for JSON subtitle arrays such as
/// `[{"start": 12.5, "end": 15.0, "text": "first<br />second"}]`.
///
/// Timecodes are not seconds. Their decimal point is dropped and the digits
/// are read as milliseconds, so `12.5` becomes 125.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl SubtitlesParser for JsonParser {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn parse_text(&self, text: &str) -> Result<Vec<SubtitleItem>, ParseError> {
        let values = match serde_json::from_str::<Vec<serde_json::Value>>(text) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("subtitle stream is not a JSON array: {e}");
                Vec::new()
            }
        };

        collect_records(
            self.name(),
            values
                .into_iter()
                .enumerate()
                .map(|(index, value)| parse_cue(index, value)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_timecodes() {
        let items = JsonParser
            .parse_text(r#"[{"start":"1.5","end":"2.0","text":"hi<br />there"}]"#)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].start_time_ms, 15);
        assert_eq!(items[0].end_time_ms, 20);
        assert_eq!(items[0].lines, ["hi", "there"]);
    }

    #[test]
    fn test_numeric_timecodes() {
        let items = JsonParser
            .parse_text(r#"[{"start": 12.5, "end": 2.0, "text": "a"}, {"start": 100, "end": 250, "text": "b"}]"#)
            .unwrap();
        assert_eq!(items[0].start_time_ms, 125);
        assert_eq!(items[0].end_time_ms, 2);
        assert_eq!(items[1].start_time_ms, 100);
        assert_eq!(items[1].end_time_ms, 250);
    }

    #[test]
    fn test_invalid_timecode() {
        let items = JsonParser
            .parse_text(r#"[{"start": "soon", "end": "1.0", "text": "x"}]"#)
            .unwrap();
        assert_eq!(items[0].start_time_ms, -1);
        assert_eq!(items[0].end_time_ms, 10);
        assert_eq!(parse_timecode("99999999999999999999"), -1);
    }

    #[test]
    fn test_line_separators() {
        let items = JsonParser
            .parse_text(r#"[{"start": 1, "end": 2, "text": "a<br/>b/<br>c\r\nd<br />e<br>f<br/><br/>"}]"#)
            .unwrap();
        assert_eq!(items[0].lines, ["a", "b", "c", "d", "e<br>f"]);
    }

    #[test]
    fn test_empty_array() {
        assert!(matches!(JsonParser.parse_text("[]"), Err(ParseError::Format(_))));
        assert!(matches!(JsonParser.parse_text("{}"), Err(ParseError::Format(_))));
        assert!(matches!(JsonParser.parse_text("not json"), Err(ParseError::Format(_))));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let items = JsonParser
            .parse_text(r#"[42, {"start": 1}, {"start": 3, "end": 4, "text": "ok"}]"#)
            .unwrap();
        assert_eq!(items, vec![SubtitleItem::new(3, 4, vec!["ok".into()])]);

        assert!(JsonParser.parse_text(r#"[42, {"start": 1}]"#).is_err());
    }
}
