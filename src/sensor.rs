//! # Collaborator interfaces
//!
//! The processing core never touches hardware directly. Drivers for the magnetometer, the two pressure sensors, the
//! button and switch inputs, and the millisecond clock are handed in by the board support code through the traits
//! below.

use crate::classifier::encode_active;
use crate::point::PointF;

/// The maximum number of digital inputs a single switch bank can encode
pub const MAX_BANK_INPUTS: usize = 8;

/// A free running millisecond counter is represented here
///
/// The counter is expected to wrap at `u32::MAX`, every consumer uses wrapping arithmetic.
pub trait Clock {
    /// `c.now_ms()` is the current time in milliseconds
    fn now_ms(&self) -> u32;
}

/// A barometric pressure sensor is represented here
pub trait PressureSensor {
    type Error: core::fmt::Debug;

    /// `s.is_present()` is true iff the driver found the device at startup
    fn is_present(&self) -> bool;

    /// `s.read_hpa()` is a fresh pressure reading in hectopascals
    ///
    /// Drivers pass readings through unfiltered, the caller rejects non-physical values.
    fn read_hpa(&mut self) -> Result<f32, Self::Error>;
}

/// A 3-axis magnetometer is represented here
pub trait MagneticSensor {
    type Error: core::fmt::Debug;

    /// `s.is_present()` is true iff the driver found the device at startup
    fn is_present(&self) -> bool;

    /// `s.read_field()` is a fresh field reading in millitesla
    fn read_field(&mut self) -> Result<FieldSample, Self::Error>;
}

/// A bank of digital inputs such as push buttons or switch jacks is represented here
pub trait SwitchBank {
    /// `b.input_count()` is the number of inputs in the bank, at most `MAX_BANK_INPUTS`
    fn input_count(&self) -> usize;

    /// `b.is_active(i)` is true iff input `i` is currently pressed or closed
    fn is_active(&self, index: usize) -> bool;

    /// `b.code()` is the activity code of the whole bank, bit `i` set iff input `i` is active
    fn code(&self) -> u8 {
        let count = self.input_count().min(MAX_BANK_INPUTS);
        let mut states = [false; MAX_BANK_INPUTS];
        for (i, state) in states.iter_mut().enumerate().take(count) {
            *state = self.is_active(i);
        }
        encode_active(&states[..count])
    }
}

/// One magnetometer reading in millitesla
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FieldSample {
    /// `f.planar()` is the joystick plane component of the reading
    ///
    /// The sensor is mounted rotated a quarter turn, so its axes are swapped.
    pub fn planar(&self) -> PointF {
        PointF::new(self.y, self.x)
    }
}

/// The health of one sensor as reported to the display and feedback layers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorHealth {
    /// The driver found the device at startup
    pub present: bool,

    /// The most recent read failed or timed out, values are stale
    pub degraded: bool,
}

impl SensorHealth {
    /// `h.is_ok()` is true iff the sensor is present and its values are fresh
    pub fn is_ok(&self) -> bool {
        self.present && !self.degraded
    }
}
