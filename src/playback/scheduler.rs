//! Dual-channel scheduler
//!
//! Draws lines from a chooser and alternates them across two playback
//! channels. After each successful hand-off the scheduler sleeps for the
//! line's spoken duration before drawing again; that sleep, not the
//! channels' own consumption rate, paces hand-offs. One channel then starts
//! its next line's dry signal while the other channel's echo tail is still
//! decaying, which is what produces the staggered, overlapping chorus.
//!
//! Hand-offs are strictly serialized (at most one line in flight per turn)
//! even though the two channels' real playback, echo tails included,
//! overlaps in wall-clock time.

use crate::lines::LineChooser;
use crate::playback::channel::{AssignError, ChannelHandle};
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

/// Backoff while the target channel's slot is occupied.
const QUEUE_POLL: Duration = Duration::from_millis(100);

pub struct Scheduler {
    chooser: Box<dyn LineChooser>,
    channels: [ChannelHandle; 2],
    current: usize,
}

impl Scheduler {
    pub fn new(chooser: Box<dyn LineChooser>, channels: [ChannelHandle; 2]) -> Self {
        Self {
            chooser,
            channels,
            current: 0,
        }
    }

    /// Run until a playback channel disappears (device failure / teardown).
    pub fn run(mut self) {
        loop {
            if !self.step(thread::sleep) {
                return;
            }
        }
    }

    /// One draw-assign-sleep turn. Returns false when a channel is gone.
    ///
    /// A line whose audio is not rendered yet is skipped, not waited for:
    /// one missing render must not stall the whole pipeline.
    pub fn step(&mut self, mut sleep: impl FnMut(Duration)) -> bool {
        let mut line = self.chooser.next_line();

        if line.duration.is_none() {
            if let Err(e) = line.measure_duration() {
                warn!("Audio not ready for line '{}': {}", line.text, e);
                return true;
            }
        }
        let duration = line.duration.expect("duration measured above");

        // Poll the target slot until it has room
        loop {
            match self.channels[self.current].try_assign(line) {
                Ok(()) => break,
                Err(AssignError::Full(returned)) => {
                    line = returned;
                    sleep(QUEUE_POLL);
                }
                Err(AssignError::Disconnected(returned)) => {
                    error!(
                        "Playback channel {} is gone, stopping scheduler (line '{}')",
                        self.current, returned.text
                    );
                    return false;
                }
            }
        }

        self.current = (self.current + 1) % self.channels.len();
        sleep(Duration::from_secs_f64(duration));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChooserPolicy, EffectParams};
    use crate::lines::chooser::SequentialChooser;
    use crate::lines::{Line, LineRegistry};
    use crate::playback::channel::{channel_pair, PlaybackChannel};
    use indexmap::IndexMap;
    use std::path::Path;
    use std::sync::Arc;

    fn test_params() -> EffectParams {
        EffectParams {
            initial_pitch_shift: 0.0,
            max_echoes: 0,
            echo_delay: 0.0,
        }
    }

    fn registry_with_durations(entries: &[(&str, f64)]) -> Arc<LineRegistry> {
        let registry = Arc::new(LineRegistry::new());
        let contents: IndexMap<String, Line> = entries
            .iter()
            .map(|(text, duration)| {
                let mut line = Line::from_text(text, Path::new("/lines"));
                line.duration = Some(*duration);
                (text.to_string(), line)
            })
            .collect();
        registry.replace(contents);
        registry
    }

    fn drain(channel: &PlaybackChannel) -> Option<Line> {
        channel.receiver.try_recv().ok()
    }

    #[test]
    fn test_alternates_channels_and_paces_by_duration() {
        let registry = registry_with_durations(&[("hello", 2.0), ("world", 3.0)]);
        let chooser = SequentialChooser::new(registry);

        let (handle_a, channel_a) = channel_pair(test_params());
        let (handle_b, channel_b) = channel_pair(test_params());
        let mut scheduler = Scheduler::new(Box::new(chooser), [handle_a, handle_b]);

        let mut sleeps = Vec::new();
        let mut assignments = Vec::new();

        for _ in 0..4 {
            assert!(scheduler.step(|d| sleeps.push(d)));
            if let Some(line) = drain(&channel_a) {
                assignments.push((0, line.text));
            }
            if let Some(line) = drain(&channel_b) {
                assignments.push((1, line.text));
            }
        }

        assert_eq!(
            assignments,
            vec![
                (0, "hello".to_string()),
                (1, "world".to_string()),
                (0, "hello".to_string()),
                (1, "world".to_string()),
            ]
        );
        assert_eq!(
            sleeps,
            vec![
                Duration::from_secs_f64(2.0),
                Duration::from_secs_f64(3.0),
                Duration::from_secs_f64(2.0),
                Duration::from_secs_f64(3.0),
            ]
        );
    }

    #[test]
    fn test_alternation_holds_for_any_policy() {
        for policy in [ChooserPolicy::Shuffled, ChooserPolicy::Random] {
            let registry =
                registry_with_durations(&[("one", 1.0), ("two", 1.0), ("three", 1.0)]);
            let chooser = policy.build(registry);

            let (handle_a, channel_a) = channel_pair(test_params());
            let (handle_b, channel_b) = channel_pair(test_params());
            let mut scheduler = Scheduler::new(chooser, [handle_a, handle_b]);

            for turn in 0..6 {
                assert!(scheduler.step(|_| {}));
                let expected_channel = turn % 2;
                let (hit, other) = if expected_channel == 0 {
                    (drain(&channel_a), drain(&channel_b))
                } else {
                    (drain(&channel_b), drain(&channel_a))
                };
                assert!(hit.is_some(), "turn {} should land on channel {}", turn, expected_channel);
                assert!(other.is_none(), "turn {} hit both channels", turn);
            }
        }
    }

    #[test]
    fn test_unrendered_line_is_skipped_without_advancing() {
        // Duration unset and file nonexistent: the draw is skipped and the
        // channel index stays put for the next drawn line.
        let registry = registry_with_durations(&[("ready", 1.0)]);
        let mut missing = Line::from_text("missing", Path::new("/nonexistent"));
        missing.duration = None;
        let ready = registry.snapshot().remove(0);

        let contents: IndexMap<String, Line> = [
            ("missing".to_string(), missing),
            ("ready".to_string(), ready),
        ]
        .into_iter()
        .collect();
        registry.replace(contents);

        let chooser = SequentialChooser::new(registry);
        let (handle_a, channel_a) = channel_pair(test_params());
        let (handle_b, channel_b) = channel_pair(test_params());
        let mut scheduler = Scheduler::new(Box::new(chooser), [handle_a, handle_b]);

        // First step draws "missing": skipped, nothing queued
        assert!(scheduler.step(|_| {}));
        assert!(drain(&channel_a).is_none());
        assert!(drain(&channel_b).is_none());

        // Next step draws "ready": lands on channel 0, not channel 1
        assert!(scheduler.step(|_| {}));
        assert_eq!(drain(&channel_a).unwrap().text, "ready");
        assert!(drain(&channel_b).is_none());
    }

    #[test]
    fn test_stops_when_channel_disconnects() {
        let registry = registry_with_durations(&[("solo", 1.0)]);
        let chooser = SequentialChooser::new(registry);

        let (handle_a, channel_a) = channel_pair(test_params());
        let (handle_b, _channel_b) = channel_pair(test_params());
        drop(channel_a);

        let mut scheduler = Scheduler::new(Box::new(chooser), [handle_a, handle_b]);
        assert!(!scheduler.step(|_| {}));
    }
}
