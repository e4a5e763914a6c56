use std::sync::OnceLock;

use regex::Regex;

use crate::colour::Colour;

/// A piece of text with the styling that applies to all of it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub foreground: Option<Colour>,
}

impl StyleRun {
    /// Creates an unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

fn italic_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)< ?(/?) ?i ?>"#).unwrap())
}

fn underline_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)< ?(/?) ?u ?>"#).unwrap())
}

fn bold_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)< ?(/?) ?b ?>"#).unwrap())
}

fn font_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)<(/?)font\b"#).unwrap())
}

fn removable_tags_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"</?(?:font(?:\s[^>]*)?|i|u|b)>"#).unwrap())
}

fn bold_span_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"<b>.*</b>"#).unwrap())
}

fn italic_span_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"<i>.*</i>"#).unwrap())
}

fn line_break_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)<br\s*/?>"#).unwrap())
}

fn font_colour_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"<font\s+(?i:color)=([^\s>]*)"#).unwrap())
}

pub fn fix_italic_tags(text: &str) -> String {
    italic_tag_regex().replace_all(text, "<${1}i>").into_owned()
}

/// Only fixes the case of font tags since they carry attributes.
pub fn fix_font_tags(text: &str) -> String {
    font_tag_regex().replace_all(text, "<${1}font").into_owned()
}

pub fn fix_underline_tags(text: &str) -> String {
    underline_tag_regex().replace_all(text, "<${1}u>").into_owned()
}

pub fn fix_bold_tags(text: &str) -> String {
    bold_tag_regex().replace_all(text, "<${1}b>").into_owned()
}

/// Rewrites sloppy `<i>`, `<font>`, `<u>` and `<b>` tags into a canonical form.
///
/// For example `< I >` becomes `<i>` and `</ b >` becomes `</b>`.
pub fn normalize_tags(text: &str) -> String {
    let text = fix_italic_tags(text);
    let text = fix_font_tags(&text);
    let text = fix_underline_tags(&text);
    fix_bold_tags(&text)
}

/// Removes font, italic, underline and bold tags from the text.
///
/// If `fix_first` is set then broken tags are repaired first so they're
/// removed as well.
pub fn strip_tags(text: &str, fix_first: bool) -> String {
    if fix_first {
        let fixed = normalize_tags(text);
        removable_tags_regex().replace_all(&fixed, "").into_owned()
    } else {
        removable_tags_regex().replace_all(text, "").into_owned()
    }
}

fn parse_colour_value(value: &str) -> Option<Colour> {
    let value = value.trim_matches(['"', '\'']);
    if value.starts_with('#') {
        match Colour::from_hex(Some(value)) {
            Ok(colour) => Some(colour),
            Err(e) => {
                log::debug!("ignoring font colour: {e}");
                None
            }
        }
    } else {
        let colour = Colour::from_name(value);
        if colour.is_none() {
            log::debug!("colour {value:?} not supported");
        }
        colour
    }
}

/// Derives a single style run from a line of subtitle markup.
///
/// `<br>` tags become `\n` in the run's text. Returns `None` if there is
/// nothing to render.
pub fn extract_run(line: &str) -> Option<StyleRun> {
    if line.is_empty() {
        return None;
    }

    let text = normalize_tags(line);
    let bold = bold_span_regex().is_match(&text);
    let italic = italic_span_regex().is_match(&text);
    // The last recognised colour wins
    let foreground = font_colour_regex()
        .captures_iter(&text)
        .filter_map(|caps| parse_colour_value(&caps[1]))
        .last();

    let stripped = strip_tags(&text, false);
    Some(StyleRun {
        text: line_break_regex().replace_all(&stripped, "\n").into_owned(),
        bold,
        italic,
        foreground,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_tags() {
        assert_eq!(normalize_tags("< I >hello</ i>"), "<i>hello</i>");
        assert_eq!(normalize_tags("<I>a< /I >"), "<i>a</i>");
        assert_eq!(normalize_tags("< / b >x<B >"), "</b>x<b>");
        assert_eq!(normalize_tags("<U>u</U>"), "<u>u</u>");
        assert_eq!(
            normalize_tags("<FONT color=red>x</Font>"),
            "<font color=red>x</font>"
        );
        // these aren't tags that get repaired
        assert_eq!(normalize_tags("<br>a <   i> b <img>"), "<br>a <   i> b <img>");
        assert_eq!(normalize_tags("1 < 2 > 0"), "1 < 2 > 0");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "< i >a</ I >",
            "<I>b< / i>",
            "< b>c</b >",
            "<u >d< /U>",
            "<FONT color=#ff0000>e</FONT>",
            "< B >< I >nested< / I ></ B >",
            "plain text",
        ];
        for sample in samples {
            let once = normalize_tags(sample);
            assert_eq!(normalize_tags(&once), once, "not idempotent for {sample}");
        }
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<font color=\"#fff\"><i>hi</i></font> <u>there</u>", false),
            "hi there"
        );
        assert_eq!(strip_tags("< I >hi</ i>", false), "< I >hi</ i>");
        assert_eq!(strip_tags("< I >hi</ i>", true), "hi");
        assert_eq!(strip_tags("a<br/>b", true), "a<br/>b");
    }

    #[test]
    fn test_extract_run() {
        assert_eq!(extract_run(""), None);

        let run = extract_run("<b>bold</b> text").unwrap();
        assert_eq!(run, StyleRun {
            text: "bold text".into(),
            bold: true,
            ..Default::default()
        });

        let run = extract_run("< I >slanted</ i>").unwrap();
        assert!(run.italic);
        assert!(!run.bold);
        assert_eq!(run.text, "slanted");

        assert_eq!(extract_run("just text"), Some(StyleRun::plain("just text")));
    }

    #[test]
    fn test_extract_run_colours() {
        let run = extract_run("<font color=Yellow>warn</font>").unwrap();
        assert_eq!(run.foreground, Some(Colour::YELLOW));
        assert_eq!(run.text, "warn");

        let run = extract_run("<FONT color=#00ff00>go</FONT>").unwrap();
        assert_eq!(run.foreground, Some(Colour::from_rgb(0, 0xFF, 0)));
        assert_eq!(run.text, "go");

        let run = extract_run("<font color=\"#8000ff00\">half</font>").unwrap();
        assert_eq!(run.foreground, Some(Colour::from_argb(0x80, 0, 0xFF, 0)));

        let run = extract_run("<font color=magenta>x</font>").unwrap();
        assert_eq!(run.foreground, None);
        assert_eq!(run.text, "x");

        let run = extract_run("<font color=#zzz>x</font>").unwrap();
        assert_eq!(run.foreground, None);

        let run = extract_run("<font color=red>a</font><font color=blue>b</font>").unwrap();
        assert_eq!(run.foreground, Some(Colour::BLUE));
        assert_eq!(run.text, "ab");
    }

    #[test]
    fn test_extract_run_line_breaks() {
        // what the TTML parser leaves of `<tt:br/>`
        let run = extract_run("<i>First<br/>Second</i>").unwrap();
        assert_eq!(run.text, "First\nSecond");
        assert!(run.italic);

        assert_eq!(extract_run("e<br>f").unwrap().text, "e\nf");
        assert_eq!(extract_run("a<BR />b").unwrap().text, "a\nb");
        assert_eq!(extract_run("<bright>").unwrap().text, "<bright>");
    }
}
