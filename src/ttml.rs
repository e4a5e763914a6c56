use crate::{
    format::{collect_records, MalformedRecord, ParseError, SubtitleItem, SubtitlesParser},
    utils::parse_duration,
};

/// Ticks are 100ns units.
const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Parses a `begin` or `end` attribute into milliseconds.
///
/// Tick values (`12340000t`) are the common case but offset times in
/// seconds or milliseconds and clock times are understood too.
fn parse_time(value: &str) -> Option<i64> {
    let value = value.trim();
    let ticks = value.strip_suffix('t').unwrap_or(value);
    if let Ok(ticks) = ticks.parse::<i64>() {
        return Some(ticks / TICKS_PER_MILLISECOND);
    }

    if let Some(ms) = value.strip_suffix("ms") {
        let ms: f64 = ms.parse().ok()?;
        return ms.is_finite().then_some(ms as i64);
    }

    if let Some(seconds) = value.strip_suffix('s') {
        let seconds: f64 = seconds.parse().ok()?;
        return seconds.is_finite().then_some((seconds * 1000.0) as i64);
    }

    parse_duration(value).map(|d| d.as_millis() as i64)
}

/// Returns the raw markup between the start and end tag of `node`.
fn inner_xml<'a>(source: &'a str, node: &roxmltree::Node) -> &'a str {
    let outer = &source[node.range()];
    let mut quote = None;
    let mut start_tag_end = None;
    for (index, ch) in outer.char_indices() {
        match (quote, ch) {
            (Some(q), _) if q == ch => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => {
                start_tag_end = Some(index);
                break;
            }
            _ => {}
        }
    }

    match (start_tag_end, outer.rfind("</")) {
        // `<p/>` has no end tag
        (Some(start), Some(end)) if start < end && !outer[..=start].ends_with("/>") => {
            &outer[start + 1..end]
        }
        _ => "",
    }
}

fn parse_paragraph(
    index: usize,
    source: &str,
    node: &roxmltree::Node,
    namespace: &str,
) -> Result<SubtitleItem, MalformedRecord> {
    let time_of = |name: &str| {
        let value = node
            .attribute(name)
            .ok_or_else(|| MalformedRecord::new(index, format!("missing `{name}` attribute")))?;
        parse_time(value)
            .ok_or_else(|| MalformedRecord::new(index, format!("invalid `{name}` time {value:?}")))
    };

    let start_time_ms = time_of("begin")?;
    let end_time_ms = time_of("end")?;
    let text = inner_xml(source, node)
        .replace("<tt:", "<")
        .replace("</tt:", "</")
        .replace(&format!(r#" xmlns:tt="{namespace}""#), "");

    Ok(SubtitleItem {
        start_time_ms,
        end_time_ms,
        lines: vec![text],
    })
}

/// A parser for Timed Text Markup Language (.ttml/.dfxp) documents.
///
/// Only `<tt:p>` elements are read. Their inner markup is kept verbatim as
/// a single line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtmlParser;

impl SubtitlesParser for TtmlParser {
    fn name(&self) -> &'static str {
        "TTML"
    }

    fn parse_text(&self, text: &str) -> Result<Vec<SubtitleItem>, ParseError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
            ParseError::Format(format!("stream is not in a valid TTML format: {e}"))
        })?;

        let root = doc.root_element();
        // Documents without a `tt` prefix put everything in the default namespace
        let namespace = root
            .lookup_namespace_uri(Some("tt"))
            .or_else(|| root.tag_name().namespace())
            .unwrap_or_default();

        let paragraphs = root.descendants().filter(|n| {
            n.is_element()
                && n.tag_name().name() == "p"
                && n.tag_name().namespace().unwrap_or_default() == namespace
        });

        collect_records(
            self.name(),
            paragraphs
                .enumerate()
                .map(|(index, node)| parse_paragraph(index, text, &node, namespace)),
        )
    }
}
