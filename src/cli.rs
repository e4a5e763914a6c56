use anyhow::Context;
use clap::{
    builder::styling::{Effects, Reset, RgbColor, Style as AnsiStyle},
    Args, CommandFactory, Parser, Subcommand, ValueEnum,
};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{stdin, stdout, IsTerminal, Read},
    path::PathBuf,
    time::Duration,
};

use sub_overlay::{
    colour::Colour,
    encoding,
    markup::{extract_run, strip_tags, StyleRun},
    utils::format_timestamp,
    DisplayUpdate, Format, Inline, LoadedSubtitles, ParseError, Session, SubtitleItem,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct InvalidDuration;

impl std::fmt::Display for InvalidDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid duration given (must be HH:MM:SS.ssss format, HH is optional)")
    }
}

impl std::error::Error for InvalidDuration {}

fn parse_duration(s: &str) -> Result<Duration, InvalidDuration> {
    sub_overlay::utils::parse_duration(s).ok_or(InvalidDuration)
}

fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputLocation {
    Path(PathBuf),
    Stdio,
}

impl InputLocation {
    fn new(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdio
        } else {
            Self::Path(path)
        }
    }

    fn extension(&self) -> Option<&str> {
        match self {
            InputLocation::Path(path) => path.extension().and_then(|s| s.to_str()),
            InputLocation::Stdio => None,
        }
    }

    fn read_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match self {
            InputLocation::Path(path) => {
                File::open(path)
                    .and_then(|mut fp| fp.read_to_end(&mut buffer))
                    .with_context(|| format!("could not read {}", path.display()))?;
            }
            InputLocation::Stdio => {
                stdin()
                    .read_to_end(&mut buffer)
                    .context("could not read from stdin")?;
            }
        }
        Ok(buffer)
    }
}

impl std::fmt::Display for InputLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputLocation::Path(path) => write!(f, "{}", path.display()),
            InputLocation::Stdio => f.write_str("<stdin>"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log more details to stderr, can be repeated.
    ///
    /// The `RUST_LOG` environment variable takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Subcommands,
}

#[derive(Subcommand, Debug)]
pub enum Subcommands {
    /// Prints the detected text encoding of subtitle files
    Detect(DetectArgs),
    /// Shows some high level information about a subtitle file
    Info(InfoArgs),
    /// Prints every subtitle of a file
    Dump(DumpArgs),
    /// Shows the caption that is visible at a given time
    Show(ShowArgs),
    /// Simulates playback and prints every change of the visible caption
    Play(PlayArgs),
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    Auto,
    Json,
    Ttml,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// The subtitle file to read.
    ///
    /// If `-` is given, then it's interpreted as stdin.
    pub file: PathBuf,
    /// The format of the subtitle file.
    ///
    /// With `auto` the file extension is used and, failing that,
    /// the first character of the file.
    #[arg(long, default_value_t = FormatArg::Auto, value_enum, verbatim_doc_comment)]
    pub format: FormatArg,
}

impl SourceArgs {
    fn load(self) -> anyhow::Result<LoadedSubtitles> {
        let input = InputLocation::new(self.file);
        let format = match self.format {
            FormatArg::Json => Some(Format::Json),
            FormatArg::Ttml => Some(Format::Ttml),
            FormatArg::Auto => input.extension().and_then(Format::from_extension),
        };
        let bytes = input.read_bytes()?;
        match sub_overlay::load_from_bytes(&bytes, format) {
            Ok(loaded) => Ok(loaded),
            Err(ParseError::UnknownFormat) => Cli::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    "could not recognize subtitle type, use --format",
                )
                .exit(),
            Err(e) => Err(e).with_context(|| format!("could not load subtitles from {input}")),
        }
    }
}

fn run_style(run: &StyleRun) -> AnsiStyle {
    AnsiStyle::new()
        .effects(
            Effects::new()
                .set(Effects::BOLD, run.bold)
                .set(Effects::ITALIC, run.italic),
        )
        .fg_color(
            run.foreground
                .map(|c| RgbColor(c.red, c.green, c.blue).into()),
        )
}

/// Renders the caption for the terminal.
///
/// Every line after the first is prefixed with `indent`.
fn render_inlines(inlines: &[Inline], styled: bool, indent: &str) -> String {
    let mut buffer = String::new();
    for inline in inlines {
        match inline {
            Inline::Run(run) if styled => {
                let style = run_style(run);
                buffer.push_str(&format!("{style}{}{style:#}", run.text));
            }
            Inline::Run(run) => buffer.push_str(&run.text),
            Inline::LineBreak => {
                buffer.push('\n');
                buffer.push_str(indent);
            }
        }
    }
    buffer
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// The files to check.
    ///
    /// If `-` is given, then it's interpreted as stdin.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl DetectArgs {
    pub fn run(self) -> anyhow::Result<()> {
        for file in self.files {
            let input = InputLocation::new(file);
            let kind = match &input {
                InputLocation::Path(path) => {
                    let mut fp = File::open(path)
                        .with_context(|| format!("could not open {}", path.display()))?;
                    encoding::detect(&mut fp)
                        .with_context(|| format!("could not read {}", path.display()))?
                }
                InputLocation::Stdio => encoding::detect_bytes(&input.read_bytes()?),
            };
            println!("{input}: {kind}");
        }
        Ok(())
    }
}

struct ColourDisplay {
    colour: Colour,
    count: usize,
    styled: bool,
}

impl ColourDisplay {
    fn proper_background(&self) -> RgbColor {
        // Contrast ratio is defined as L1 + 0.05 / L2 + 0.05
        // L2 is the relative luminance of the background colour
        // L1 is the relative luminance of the actual text colour
        // For simplicity the background colour can only be white/black
        let l1 = self.colour.relative_luminance();
        let l2 = Colour::BLACK.relative_luminance();
        let cr = (l1 + 0.05) / (l2 + 0.05);
        if cr >= 3.0 {
            RgbColor(0, 0, 0)
        } else {
            RgbColor(255, 255, 255)
        }
    }

    fn as_rgb(&self) -> RgbColor {
        RgbColor(self.colour.red, self.colour.green, self.colour.blue)
    }
}

impl std::fmt::Display for ColourDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.styled {
            write!(
                f,
                "{}{}{}{}",
                self.as_rgb().render_fg(),
                self.proper_background().render_bg(),
                self.colour.to_hex(),
                Reset
            )?;
        } else {
            f.write_str(&self.colour.to_hex())?;
        }
        write!(f, ": {}", self.count)
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Counts the items that start before an earlier item has ended.
fn count_overlaps(items: &[SubtitleItem]) -> usize {
    let mut sorted = items
        .iter()
        .filter(|item| item.has_valid_times())
        .collect::<Vec<_>>();
    sorted.sort();

    let mut overlaps = 0;
    let mut latest_end = None;
    for item in sorted {
        if latest_end.is_some_and(|end| item.start_time_ms < end) {
            overlaps += 1;
        }
        latest_end = latest_end.max(Some(item.end_time_ms));
    }
    overlaps
}

impl InfoArgs {
    pub fn run(self) -> anyhow::Result<()> {
        let loaded = self.source.load()?;
        let items = &loaded.items;
        println!("Format: {}", loaded.format);
        println!("Encoding: {}", loaded.encoding);

        println!("Subtitles:");
        println!("  Total: {}", items.len());
        let invalid = items.iter().filter(|i| !i.has_valid_times()).count();
        if invalid != 0 {
            println!("  Invalid timecodes: {invalid}");
        }
        let valid = items.iter().filter(|i| i.has_valid_times());
        let start = valid.clone().map(|i| i.start_time_ms).min();
        let end = valid.map(|i| i.end_time_ms).max();
        if let (Some(start), Some(end)) = (start, end) {
            println!(
                "  Span: {} --> {}",
                format_timestamp(start),
                format_timestamp(end)
            );
        }
        println!("  Overlapping: {}", count_overlaps(items));

        let mut bold = 0;
        let mut italic = 0;
        let mut colours = BTreeMap::new();
        for run in items
            .iter()
            .flat_map(|i| i.lines.iter())
            .filter_map(|line| extract_run(line.trim()))
        {
            bold += run.bold as usize;
            italic += run.italic as usize;
            if let Some(colour) = run.foreground {
                *colours.entry(colour).or_insert(0) += 1;
            }
        }

        println!("Styled lines:");
        println!("  Bold: {bold}");
        println!("  Italic: {italic}");
        if !colours.is_empty() {
            let styled = stdout().is_terminal();
            println!("Colours: #AARRGGBB");
            for (colour, count) in colours {
                let display = ColourDisplay {
                    colour,
                    count,
                    styled,
                };
                println!("  {display}");
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Remove the markup from every line
    #[arg(long)]
    pub plain: bool,
}

impl DumpArgs {
    pub fn run(self) -> anyhow::Result<()> {
        let loaded = self.source.load()?;
        for (index, item) in loaded.items.iter().enumerate() {
            println!("{}", index + 1);
            if self.plain {
                let stripped = SubtitleItem {
                    lines: item.lines.iter().map(|l| strip_tags(l, true)).collect(),
                    ..item.clone()
                };
                println!("{stripped}\n");
            } else {
                println!("{item}\n");
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct OffsetArgs {
    /// Shift every subtitle by the given milliseconds.
    ///
    /// A positive value shows the subtitles later.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// The playback position to show.
    ///
    /// The duration format is `HH:MM:SS.ssss`. The `HH` and `.ssss`
    /// components are not required. For example, `10:24` and `00:10:24`
    /// are both accepted.
    #[arg(long, value_parser = parse_duration, verbatim_doc_comment)]
    pub at: Duration,
    #[command(flatten)]
    pub offset: OffsetArgs,
}

impl ShowArgs {
    pub fn run(self) -> anyhow::Result<()> {
        let loaded = self.source.load()?;
        let mut session = Session::with_document(loaded.items);
        session.set_seek_offset_ms(self.offset.offset);
        match session.tick(self.at) {
            DisplayUpdate::Show(inlines) => {
                println!("{}", render_inlines(&inlines, stdout().is_terminal(), ""))
            }
            DisplayUpdate::Clear => log::info!(
                "nothing is shown at {}",
                format_timestamp(duration_to_millis(self.at))
            ),
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// The position to start playing from.
    ///
    /// Uses the same format as `show --at`.
    #[arg(long, value_parser = parse_duration)]
    pub from: Option<Duration>,
    /// The position to stop at.
    ///
    /// Defaults to the end of the last subtitle.
    #[arg(long, value_parser = parse_duration)]
    pub to: Option<Duration>,
    /// How many milliseconds the simulated timer advances per tick
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub step: u64,
    #[command(flatten)]
    pub offset: OffsetArgs,
}

impl PlayArgs {
    pub fn run(self) -> anyhow::Result<()> {
        let loaded = self.source.load()?;
        let offset = self.offset.offset;
        let to = match self.to {
            Some(to) => to,
            None => {
                let end = loaded
                    .items
                    .iter()
                    .filter(|i| i.has_valid_times())
                    .map(|i| i.end_time_ms.saturating_add(offset))
                    .max()
                    .unwrap_or_default();
                Duration::from_millis(end.max(0) as u64)
            }
        };

        let mut session = Session::with_document(loaded.items);
        session.set_seek_offset_ms(offset);

        let styled = stdout().is_terminal();
        let step = Duration::from_millis(self.step);
        let mut position = self.from.unwrap_or_default();
        let mut previous = None;
        while position <= to {
            let update = session.tick(position);
            if previous.as_ref() != Some(&update) {
                let timestamp = format_timestamp(duration_to_millis(position));
                match &update {
                    DisplayUpdate::Show(inlines) => {
                        let indent = " ".repeat(timestamp.len() + 3);
                        println!("[{timestamp}] {}", render_inlines(inlines, styled, &indent));
                    }
                    DisplayUpdate::Clear => println!("[{timestamp}]"),
                }
                previous = Some(update);
            }
            position += step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_overlaps() {
        let items = vec![
            SubtitleItem::new(500, 1500, vec![]),
            SubtitleItem::new(0, 1000, vec![]),
            SubtitleItem::new(1500, 2000, vec![]),
            SubtitleItem::new(-1, 3000, vec![]),
        ];
        assert_eq!(count_overlaps(&items), 1);
        assert_eq!(count_overlaps(&[]), 0);
    }

    #[test]
    fn test_render_inlines_plain() {
        let inlines = vec![
            Inline::Run(StyleRun::plain("one")),
            Inline::LineBreak,
            Inline::Run(StyleRun::plain("two")),
        ];
        assert_eq!(render_inlines(&inlines, false, "  "), "one\n  two");
    }

    #[test]
    fn test_input_location() {
        assert_eq!(InputLocation::new("-".into()), InputLocation::Stdio);
        let input = InputLocation::new("subs/movie.TTML".into());
        assert_eq!(input.extension(), Some("TTML"));
        assert_eq!(InputLocation::Stdio.extension(), None);
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from([
            "sub-overlay", "-vv", "show", "a.json", "--at", "01:02", "--offset", "-250",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Subcommands::Show(args) => {
                assert_eq!(args.at, Duration::from_secs(62));
                assert_eq!(args.offset.offset, -250);
                assert_eq!(args.source.format, FormatArg::Auto);
            }
            other => panic!("unexpected subcommand {other:?}"),
        }
        assert!(Cli::try_parse_from(["sub-overlay", "play", "a.json", "--step", "0"]).is_err());
    }
}
