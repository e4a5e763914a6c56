use std::{borrow::Cow, time::Duration};

fn maybe_replace_separator(s: &str) -> Cow<'_, str> {
    match s.find(',') {
        None => Cow::Borrowed(s),
        Some(idx) => {
            let mut output = String::from(&s[..idx]);
            output.reserve(s.len() - idx);
            output.push('.');
            output.push_str(&s[idx + 1..]);
            Cow::Owned(output)
        }
    }
}

/// A duration that can be parsed from the command line or as a string input.
///
/// The format is `HH:MM:SS.ssss` with `HH` and `.ssss` being optional.
/// So e.g. 10:24 is 10 minutes and 24 seconds but 10:24:00 is 10 hours, 24 minutes and 0 seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut components = s.splitn(3, ':');
    let first = components.next()?;
    let second = components.next()?;
    let seconds = match components.next() {
        Some(third) => {
            // This case contains hours, minutes, and seconds
            let hours: f64 = first.parse().ok()?;
            let minutes: f64 = second.parse().ok()?;
            let seconds: f64 = maybe_replace_separator(third).parse().ok()?;
            hours * 3600.0 + minutes * 60.0 + seconds
        }
        None => {
            let minutes: f64 = first.parse().ok()?;
            let seconds: f64 = maybe_replace_separator(second).parse().ok()?;
            // This case is just 10:24
            minutes * 60.0 + seconds
        }
    };
    Duration::try_from_secs_f64(seconds).ok()
}

/// Formats milliseconds as `HH:MM:SS,mmm`.
///
/// Negative values are the invalid timecode marker and print as dashes.
pub fn format_timestamp(ms: i64) -> String {
    if ms < 0 {
        return String::from("--:--:--,---");
    }
    let (seconds, ms) = (ms / 1000, ms % 1000);
    let (hours, seconds) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, ms)
}

/// Splits `text` on any of the separators, dropping empty pieces.
///
/// At each position the separators are tried in order and the first one
/// that matches is consumed.
pub(crate) fn split_any<'a>(text: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut index = 0;
    while index < text.len() {
        let rest = &text[index..];
        match separators.iter().find(|sep| rest.starts_with(**sep)) {
            Some(sep) => {
                pieces.push(&text[start..index]);
                index += sep.len();
                start = index;
            }
            None => index += rest.chars().next().map_or(1, char::len_utf8),
        }
    }
    pieces.push(&text[start..]);
    pieces.retain(|s| !s.is_empty());
    pieces
}
