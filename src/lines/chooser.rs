//! Line selection policies
//!
//! A chooser produces an unbounded stream of lines from registry snapshots.
//! All four policies share the same contract: `next_line` blocks until a
//! line is available, and an empty registry means "sleep and retry", never
//! an error.
//!
//! Policies differ in when they re-snapshot the registry and whether they
//! suppress back-to-back repeats:
//!
//! - [`SequentialChooser`]: one snapshot per pass, insertion order, registry
//!   changes picked up only between passes.
//! - [`SequentialRefreshingChooser`]: like sequential, but a key-set change
//!   abandons the current pass immediately.
//! - [`ShuffledChooser`]: one shuffled permutation per pass; never yields the
//!   same line twice in a row when more than one line exists.
//! - [`RandomChooser`]: fresh snapshot and uniform pick per draw, with the
//!   same immediate-repeat suppression.

use crate::config::ChooserPolicy;
use crate::lines::{Line, LineRegistry};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Backoff while the registry is empty.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// An infinite, blocking stream of lines drawn from the registry.
pub trait LineChooser: Send {
    /// Draw the next line, blocking while the registry is empty.
    fn next_line(&mut self) -> Line;
}

impl ChooserPolicy {
    /// Build the chooser for this policy over a shared registry.
    pub fn build(&self, registry: Arc<LineRegistry>) -> Box<dyn LineChooser> {
        match self {
            ChooserPolicy::Sequential => Box::new(SequentialChooser::new(registry)),
            ChooserPolicy::SequentialRefreshing => {
                Box::new(SequentialRefreshingChooser::new(registry))
            }
            ChooserPolicy::Shuffled => Box::new(ShuffledChooser::new(registry)),
            ChooserPolicy::Random => Box::new(RandomChooser::new(registry)),
        }
    }
}

/// Yields lines in insertion order, looping forever.
///
/// The registry is snapshotted once per full pass; additions and removals
/// become visible only after the current pass completes.
pub struct SequentialChooser {
    registry: Arc<LineRegistry>,
    pending: VecDeque<Line>,
    poll: Duration,
}

impl SequentialChooser {
    pub fn new(registry: Arc<LineRegistry>) -> Self {
        Self {
            registry,
            pending: VecDeque::new(),
            poll: POLL_INTERVAL,
        }
    }

    /// Override the empty-registry backoff (used by tests).
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl LineChooser for SequentialChooser {
    fn next_line(&mut self) -> Line {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return line;
            }

            let snapshot = self.registry.snapshot();
            if snapshot.is_empty() {
                thread::sleep(self.poll);
                continue;
            }
            self.pending = snapshot.into();
        }
    }
}

/// Sequential order, but restarts the pass when the registry's key set
/// changes so new lines become eligible without waiting for the cycle to
/// finish.
pub struct SequentialRefreshingChooser {
    registry: Arc<LineRegistry>,
    pending: VecDeque<Line>,
    /// Key set the current pass was snapshotted from
    pass_keys: Vec<String>,
    poll: Duration,
}

impl SequentialRefreshingChooser {
    pub fn new(registry: Arc<LineRegistry>) -> Self {
        Self {
            registry,
            pending: VecDeque::new(),
            pass_keys: Vec::new(),
            poll: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl LineChooser for SequentialRefreshingChooser {
    fn next_line(&mut self) -> Line {
        loop {
            // Abandon the pass if the key set changed mid-pass. Key-set
            // equality is the change test: a duration being filled in later
            // is not a structural change.
            if !self.pending.is_empty() && self.registry.keys() != self.pass_keys {
                self.pending.clear();
            }

            if let Some(line) = self.pending.pop_front() {
                return line;
            }

            let snapshot = self.registry.snapshot();
            if snapshot.is_empty() {
                thread::sleep(self.poll);
                continue;
            }
            self.pass_keys = snapshot.iter().map(|line| line.text.clone()).collect();
            self.pending = snapshot.into();
        }
    }
}

/// Yields a full random permutation per pass, reshuffling between passes.
///
/// When the snapshot holds more than one line, a line equal to the
/// immediately-preceding yield is skipped so pass boundaries cannot produce
/// back-to-back repeats. With exactly one line, repeats are unavoidable and
/// allowed.
pub struct ShuffledChooser {
    registry: Arc<LineRegistry>,
    pending: VecDeque<Line>,
    pass_had_multiple: bool,
    last: Option<Line>,
    rng: StdRng,
    poll: Duration,
}

impl ShuffledChooser {
    pub fn new(registry: Arc<LineRegistry>) -> Self {
        Self {
            registry,
            pending: VecDeque::new(),
            pass_had_multiple: false,
            last: None,
            rng: StdRng::from_entropy(),
            poll: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl LineChooser for ShuffledChooser {
    fn next_line(&mut self) -> Line {
        loop {
            while let Some(line) = self.pending.pop_front() {
                if self.pass_had_multiple && self.last.as_ref() == Some(&line) {
                    continue;
                }
                self.last = Some(line.clone());
                return line;
            }

            let mut snapshot = self.registry.snapshot();
            if snapshot.is_empty() {
                thread::sleep(self.poll);
                continue;
            }
            snapshot.shuffle(&mut self.rng);
            self.pass_had_multiple = snapshot.len() > 1;
            self.pending = snapshot.into();
        }
    }
}

/// Uniform random pick with a fresh snapshot before every draw.
pub struct RandomChooser {
    registry: Arc<LineRegistry>,
    last: Option<Line>,
    rng: StdRng,
    poll: Duration,
}

impl RandomChooser {
    pub fn new(registry: Arc<LineRegistry>) -> Self {
        Self {
            registry,
            last: None,
            rng: StdRng::from_entropy(),
            poll: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl LineChooser for RandomChooser {
    fn next_line(&mut self) -> Line {
        loop {
            let snapshot = self.registry.snapshot();
            if snapshot.is_empty() {
                thread::sleep(self.poll);
                continue;
            }

            let line = snapshot
                .choose(&mut self.rng)
                .expect("non-empty snapshot")
                .clone();

            let suppress = snapshot.len() > 1 && self.last.as_ref() == Some(&line);
            self.last = Some(line.clone());
            if !suppress {
                return line;
            }
        }
    }
}
