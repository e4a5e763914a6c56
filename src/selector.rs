use std::{sync::Arc, time::Duration};

use crate::{
    format::SubtitleItem,
    markup::{extract_run, StyleRun},
};

/// A piece of rendered caption output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Run(StyleRun),
    LineBreak,
}

/// Returns the item that is visible at `position`.
///
/// This runs on every timer tick so it does no I/O and keeps no caches.
///
/// Items are shifted by `seek_offset_ms` first. When several items overlap
/// the greatest one by natural ordering wins, and among equal items the one
/// that appears first. Items with an invalid timecode are never visible.
pub fn select_active(
    items: &[SubtitleItem],
    position: Duration,
    seek_offset_ms: i64,
) -> Option<&SubtitleItem> {
    let position_ms = position.as_secs_f64() * 1000.0;
    items
        .iter()
        .filter(|item| item.has_valid_times() && item.contains(position_ms, seek_offset_ms))
        .fold(None, |best, item| match best {
            Some(best) if best >= item => Some(best),
            _ => Some(item),
        })
}

/// Converts every line of the item into style runs.
///
/// A line break follows each rendered line except the item's last one.
/// Breaks inside a line split its run into pieces with the same style.
pub fn render_item(item: &SubtitleItem) -> Vec<Inline> {
    let last = item.lines.len().saturating_sub(1);
    let mut inlines = Vec::with_capacity(item.lines.len() * 2);
    for (index, line) in item.lines.iter().enumerate() {
        let Some(run) = extract_run(line.trim()) else {
            continue;
        };
        for (n, piece) in run.text.split('\n').filter(|p| !p.is_empty()).enumerate() {
            if n != 0 {
                inlines.push(Inline::LineBreak);
            }
            inlines.push(Inline::Run(StyleRun {
                text: piece.to_owned(),
                ..run.clone()
            }));
        }
        if index != last {
            inlines.push(Inline::LineBreak);
        }
    }
    inlines
}

/// Flattens rendered output into plain text.
pub fn to_plain_text(inlines: &[Inline]) -> String {
    let mut buffer = String::new();
    for inline in inlines {
        match inline {
            Inline::Run(run) => buffer.push_str(&run.text),
            Inline::LineBreak => buffer.push('\n'),
        }
    }
    buffer
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionState {
    #[default]
    Idle,
    /// Showing the item at this index of the document.
    Showing(usize),
}

/// What the renderer should do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    Show(Vec<Inline>),
    Clear,
}

/// The playback side of a loaded subtitle file.
#[derive(Debug, Clone, Default)]
pub struct Session {
    document: Option<Arc<[SubtitleItem]>>,
    seek_offset_ms: i64,
    state: CaptionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(items: Vec<SubtitleItem>) -> Self {
        let mut session = Self::new();
        session.load(items);
        session
    }

    /// Replaces the whole document.
    ///
    /// The next tick only ever sees the new document.
    pub fn load(&mut self, items: Vec<SubtitleItem>) {
        log::debug!("loaded {} subtitles", items.len());
        self.document = Some(items.into());
        self.state = CaptionState::Idle;
    }

    pub fn unload(&mut self) {
        self.document = None;
        self.state = CaptionState::Idle;
    }

    pub fn document(&self) -> Option<&[SubtitleItem]> {
        self.document.as_deref()
    }

    pub fn seek_offset_ms(&self) -> i64 {
        self.seek_offset_ms
    }

    /// Shifts every item by the given milliseconds, e.g. to correct drift.
    pub fn set_seek_offset_ms(&mut self, offset: i64) {
        self.seek_offset_ms = offset;
    }

    pub fn state(&self) -> CaptionState {
        self.state
    }

    /// Returns the item that is currently shown, if any.
    pub fn current_item(&self) -> Option<&SubtitleItem> {
        match self.state {
            CaptionState::Idle => None,
            CaptionState::Showing(index) => self.document()?.get(index),
        }
    }

    /// Updates the state for the playback position and returns what to display.
    pub fn tick(&mut self, position: Duration) -> DisplayUpdate {
        let Some(document) = self.document.as_deref() else {
            self.state = CaptionState::Idle;
            return DisplayUpdate::Clear;
        };

        match select_active(document, position, self.seek_offset_ms) {
            Some(item) => {
                // select_active hands back a reference into `document`
                let index = document
                    .iter()
                    .position(|i| std::ptr::eq(i, item))
                    .unwrap_or_default();
                self.state = CaptionState::Showing(index);
                DisplayUpdate::Show(render_item(item))
            }
            None => {
                self.state = CaptionState::Idle;
                DisplayUpdate::Clear
            }
        }
    }
}
