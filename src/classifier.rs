//! # Debounced state classifier
//!
//! Turns a per-tick raw activity code into a history of gesture records. The same state machine serves the push
//! buttons, the switch jacks, and the sip/puff detector, only the source of the code and the reaction time differ.
//!
//! A record moves through three phases:
//!
//! - `Waiting` nothing is active
//! - `Started` an input became active, the record tracks for how long
//! - `Released` the input let go, the record keeps the code and duration of the gesture that just finished
//!
//! While the raw code stays the same the newest record is amended in place with a fresh elapsed time, so one gesture
//! is one history entry no matter how many ticks it spans. A new entry is pushed only on a phase transition.
//!
//! The reaction time is the debounce window. While a record is younger than it, any change to another nonzero code is
//! folded into the record instead of being reported as a release and a new press.

use crate::ring_history::RingHistory;
use crate::timer::{Scheduler, TimerId};

/// The phase of a gesture record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    #[default]
    Waiting,
    Started,
    Released,
}

/// One gesture record is represented here
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Classification {
    /// Which inputs are (or, once released, were) active
    pub main_state: u8,

    pub phase: Phase,

    /// How long the record has been in its phase, or for released records how long the gesture lasted
    pub elapsed_ms: u32,
}

impl Classification {
    /// The record of an idle input
    pub const IDLE: Self = Self {
        main_state: 0,
        phase: Phase::Waiting,
        elapsed_ms: 0,
    };
}

/// What a single `update` did to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The newest record was amended in place
    Held,

    /// A new record was pushed
    Changed,

    /// The input has been idle for longer than `ACTION_TIMEOUT_MS`, the idle timer was restarted
    IdleTimeout,
}

/// A debounced classifier with a history `DEPTH` records deep is represented here
pub struct InputClassifier<const DEPTH: usize> {
    history: RingHistory<Classification, DEPTH>,

    timer: Scheduler<(), (), 1>,
    stopwatch: TimerId,

    reaction_time_ms: u32,
}

impl<const DEPTH: usize> InputClassifier<DEPTH> {
    /// `InputClassifier::new(r, now)` is a new idle classifier with reaction time `r`
    ///
    /// # Arguments:
    ///
    /// * `reaction_time_ms` - the debounce window in milliseconds, zero disables chatter absorption
    ///
    /// * `now_ms` - the current time, the idle record starts here
    pub fn new(reaction_time_ms: u32, now_ms: u32) -> Self {
        let (timer, stopwatch) = Scheduler::with_stopwatch(now_ms);
        let mut history = RingHistory::new();
        history.push(Classification::IDLE);

        Self {
            history,
            timer,
            stopwatch,
            reaction_time_ms,
        }
    }

    /// `c.update(code, now)` classifies the raw activity code sampled at `now`
    ///
    /// Must be called once per poll tick of the input.
    ///
    /// # Arguments:
    ///
    /// * `code` - the raw activity code, `0` means nothing is active
    ///
    /// * `now_ms` - the current time
    pub fn update(&mut self, code: u8, now_ms: u32) -> Step {
        let elapsed_ms = self.timer.elapsed_time(self.stopwatch, now_ms);
        let prev = self.history.last();

        let same_gesture = code == prev.main_state && prev.phase != Phase::Released;
        let settling =
            code != 0 && prev.phase == Phase::Started && elapsed_ms < self.reaction_time_ms;

        if same_gesture || settling {
            self.history.update_last(Classification {
                main_state: code,
                phase: prev.phase,
                elapsed_ms,
            });

            if prev.phase == Phase::Waiting && ACTION_TIMEOUT_MS < elapsed_ms {
                // keeps the idle stopwatch far from wrapping during very long idle periods
                self.timer.restart_timer(self.stopwatch, now_ms);
                return Step::IdleTimeout;
            }

            return Step::Held;
        }

        let next = match prev.phase {
            Phase::Waiting => Classification {
                main_state: code,
                phase: Phase::Started,
                elapsed_ms: 0,
            },
            // a release reports the gesture that just finished, not the new code
            Phase::Started => Classification {
                main_state: prev.main_state,
                phase: Phase::Released,
                elapsed_ms: prev.elapsed_ms,
            },
            Phase::Released => {
                if code == 0 {
                    Classification::IDLE
                } else {
                    Classification {
                        main_state: code,
                        phase: Phase::Started,
                        elapsed_ms: 0,
                    }
                }
            }
        };

        self.history.push(next);
        self.timer.restart_timer(self.stopwatch, now_ms);

        Step::Changed
    }

    /// `c.clear(now)` pushes an idle record and restarts the phase timer
    pub fn clear(&mut self, now_ms: u32) {
        self.history.push(Classification::IDLE);
        self.timer.restart_timer(self.stopwatch, now_ms);
    }

    /// `c.state()` is the newest record
    pub fn state(&self) -> Classification {
        self.history.last()
    }

    /// `c.history()` is the record history, newest first
    pub fn history(&self) -> &RingHistory<Classification, DEPTH> {
        &self.history
    }

    /// `c.elapsed(now)` is the time since the newest record was pushed
    pub fn elapsed(&self, now_ms: u32) -> u32 {
        self.timer.elapsed_time(self.stopwatch, now_ms)
    }

    /// `c.set_reaction_time(r)` sets the debounce window to `r` milliseconds
    pub fn set_reaction_time(&mut self, reaction_time_ms: u32) {
        self.reaction_time_ms = reaction_time_ms;
    }

    /// `c.reaction_time()` is the debounce window in milliseconds
    pub fn reaction_time(&self) -> u32 {
        self.reaction_time_ms
    }
}

/// `encode_active(states)` is the activity code of a set of inputs, bit `i` set iff `states[i]` is true
///
/// Only the first 8 inputs are encoded.
pub fn encode_active(states: &[bool]) -> u8 {
    states
        .iter()
        .take(8)
        .enumerate()
        .filter(|(_, active)| **active)
        .fold(0, |code, (i, _)| code | (1u8 << i))
}

/// Idle time after which `update` reports `Step::IdleTimeout`
pub const ACTION_TIMEOUT_MS: u32 = 60_000;

/// Default debounce window for mechanical buttons and switches
pub const DEFAULT_REACTION_TIME_MS: u32 = 120;
