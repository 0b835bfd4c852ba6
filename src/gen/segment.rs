//! Pause-directive parsing
//!
//! Lines may embed `[pause N seconds]` directives between spoken phrases.
//! A directive is not spoken; it becomes explicit silence when the line's
//! audio segments are concatenated.

use regex::Regex;
use std::sync::OnceLock;

fn pause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[pause\s+(\d+(?:\.\d+)?)\s+seconds?\]").expect("valid pattern")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Speech(String),
    Pause(f64),
}

impl Segment {
    pub fn is_pause(&self) -> bool {
        matches!(self, Segment::Pause(_))
    }
}

/// Split a line into ordered speech and pause segments.
///
/// Whitespace around directives is absorbed; empty speech chunks are
/// dropped, so a pause-only line yields a single `Pause` segment.
pub fn parse_segments(line: &str) -> Vec<Segment> {
    let pattern = pause_pattern();
    let mut segments = Vec::new();
    let mut last_end = 0;

    for captures in pattern.captures_iter(line) {
        let whole = captures.get(0).expect("full match");

        let speech = line[last_end..whole.start()].trim();
        if !speech.is_empty() {
            segments.push(Segment::Speech(speech.to_string()));
        }

        // The pattern only matches digits and an optional fraction, so the
        // capture always parses.
        let seconds: f64 = captures[1].parse().unwrap_or(0.0);
        segments.push(Segment::Pause(seconds));

        last_end = whole.end();
    }

    let tail = line[last_end..].trim();
    if !tail.is_empty() {
        segments.push(Segment::Speech(tail.to_string()));
    }

    segments
}
