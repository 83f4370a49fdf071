//! Error types
//!
//! Errors only appear at configuration time (registering timers, applying settings) and at the sensor driver
//! boundary. The steady-state polling path turns sensor problems into health flags instead of propagating them.

use thiserror::Error;

/// Errors from registering software timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Every slot of the timer table is occupied
    #[error("timer table is full ({capacity} slots)")]
    TableFull {
        /// Number of slots in the table
        capacity: usize,
    },
}

/// Errors from reading a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The driver did not find the device at startup
    #[error("sensor not present")]
    NotPresent,

    /// The driver reported a bus or device error
    #[error("sensor driver error")]
    Driver,

    /// No physically valid reading arrived before the retry window closed
    #[error("no valid reading after {waited_ms} ms")]
    Timeout {
        /// How long the read loop kept retrying
        waited_ms: u32,
    },
}

/// Errors from invalid configuration values
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// Sip and puff thresholds are magnitudes and must be strictly positive
    #[error("pressure threshold must be positive, got {0} hPa")]
    ThresholdNotPositive(f32),

    /// Speed and scroll levels live in `1..=10`
    #[error("level {0} is outside 1..=10")]
    LevelOutOfRange(u8),

    /// Deadzone factors are fractions of the full input range
    #[error("deadzone factor {0} is outside [0, 1]")]
    DeadzoneOutOfRange(f32),

    /// The inner deadzone must end before the outer deadzone starts
    #[error("inner deadzone {inner} does not lie below outer deadzone {outer}")]
    DeadzonesOverlap {
        /// Inner deadzone factor
        inner: f32,
        /// Outer deadzone factor
        outer: f32,
    },

    /// An enumerated setting held a code with no meaning
    #[error("unknown {setting} code {code}")]
    UnknownCode {
        /// Which setting the code belongs to
        setting: &'static str,
        /// The offending code
        code: u8,
    },

    /// The settings document was written by an incompatible schema
    #[error("settings schema version {found} is not supported (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u8,
        /// Version this crate reads and writes
        expected: u8,
    },
}

/// Errors from bringing up the controller
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Error {
    /// Polling timers could not be registered
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// The supplied settings were rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}
