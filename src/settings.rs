//! # Persisted settings
//!
//! User settings live outside the core as a flat key/value document with short keys, for example
//!
//! ```text
//! {"VN":1,"OM":1,"CM":1,"SS":5,"SL":5,"PM":2,"ST":3.0,"PT":3.0,"IZ":0.05,"OZ":0.95,
//!  "CA0":[0.0,0.0],"CA1":[-13.0,13.0],"CA2":[13.0,13.0],"CA3":[13.0,-13.0],"CA4":[-13.0,-13.0]}
//! ```
//!
//! `Settings` mirrors that document one field per key, so any serde format can read and write it. Mode codes are
//! stored as integers. Keys missing from a document take their factory value and unknown keys are ignored.
//!
//! The core only ever sees settings through `apply`, which validates them and pushes them into the live components,
//! and `capture`, which reads the live components back.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::joystick::{
    CalibrationSet, Deadzone, Joystick, OutputMode, Quadrant, DEFAULT_INNER_DEADZONE,
    DEFAULT_OUTER_DEADZONE, DEFAULT_SPEED_LEVEL, MAX_SPEED_LEVEL, MIN_SPEED_LEVEL,
};
use crate::point::PointF;
use crate::pressure::{Pressure, PressureMode, DEFAULT_THRESHOLD_HPA};

/// What kind of host device the controller presents itself as
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    #[default]
    Mouse = 1,
    Gamepad = 2,

    /// Nothing is sent to the host, only the menu stays usable
    Safe = 3,
}

impl OperatingMode {
    /// `om.output_mode()` is the joystick output mode this operating mode drives
    ///
    /// Safe mode keeps the cursor range, its output is held at zero by the controller.
    pub fn output_mode(self) -> OutputMode {
        match self {
            OperatingMode::Mouse | OperatingMode::Safe => OutputMode::Cursor,
            OperatingMode::Gamepad => OutputMode::Gamepad,
        }
    }

    fn from_output_mode(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Cursor => OperatingMode::Mouse,
            OutputMode::Gamepad => OperatingMode::Gamepad,
        }
    }
}

impl TryFrom<u8> for OperatingMode {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, ConfigError> {
        match code {
            1 => Ok(OperatingMode::Mouse),
            2 => Ok(OperatingMode::Gamepad),
            3 => Ok(OperatingMode::Safe),
            _ => Err(ConfigError::UnknownCode {
                setting: "operating mode",
                code,
            }),
        }
    }
}

impl From<OperatingMode> for u8 {
    fn from(mode: OperatingMode) -> u8 {
        mode as u8
    }
}

/// Which transport carries the output to the host
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommMode {
    #[default]
    Usb = 1,
    Bluetooth = 2,
}

impl TryFrom<u8> for CommMode {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, ConfigError> {
        match code {
            1 => Ok(CommMode::Usb),
            2 => Ok(CommMode::Bluetooth),
            _ => Err(ConfigError::UnknownCode {
                setting: "communication mode",
                code,
            }),
        }
    }
}

impl From<CommMode> for u8 {
    fn from(mode: CommMode) -> u8 {
        mode as u8
    }
}

/// The persisted settings document is represented here
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Schema version, must equal `SCHEMA_VERSION`
    #[serde(rename = "VN")]
    pub version: u8,

    #[serde(rename = "OM")]
    pub operating_mode: OperatingMode,

    #[serde(rename = "CM")]
    pub comm_mode: CommMode,

    /// Cursor speed level, in `[1, 10]`
    #[serde(rename = "SS")]
    pub speed_level: u8,

    /// Scroll speed level, in `[1, 10]`
    #[serde(rename = "SL")]
    pub scroll_level: u8,

    #[serde(rename = "PM")]
    pub pressure_mode: PressureMode,

    /// Sip threshold in hectopascals
    #[serde(rename = "ST")]
    pub sip_threshold_hpa: f32,

    /// Puff threshold in hectopascals
    #[serde(rename = "PT")]
    pub puff_threshold_hpa: f32,

    /// Inner deadzone as a fraction of the input range
    #[serde(rename = "IZ")]
    pub inner_deadzone: f32,

    /// Outer deadzone as a fraction of the input range
    #[serde(rename = "OZ")]
    pub outer_deadzone: f32,

    /// Joystick center, raw sensor units
    #[serde(rename = "CA0")]
    pub center: [f32; 2],

    /// Joystick corners of quadrants one to four, raw sensor units
    #[serde(rename = "CA1")]
    pub corner_1: [f32; 2],

    #[serde(rename = "CA2")]
    pub corner_2: [f32; 2],

    #[serde(rename = "CA3")]
    pub corner_3: [f32; 2],

    #[serde(rename = "CA4")]
    pub corner_4: [f32; 2],
}

impl Default for Settings {
    fn default() -> Self {
        let calibration = CalibrationSet::default();

        Self {
            version: SCHEMA_VERSION,
            operating_mode: OperatingMode::Mouse,
            comm_mode: CommMode::Usb,
            speed_level: DEFAULT_SPEED_LEVEL,
            scroll_level: DEFAULT_SCROLL_LEVEL,
            pressure_mode: PressureMode::Differential,
            sip_threshold_hpa: DEFAULT_THRESHOLD_HPA,
            puff_threshold_hpa: DEFAULT_THRESHOLD_HPA,
            inner_deadzone: DEFAULT_INNER_DEADZONE,
            outer_deadzone: DEFAULT_OUTER_DEADZONE,
            center: calibration.points[0].as_array(),
            corner_1: calibration.points[1].as_array(),
            corner_2: calibration.points[2].as_array(),
            corner_3: calibration.points[3].as_array(),
            corner_4: calibration.points[4].as_array(),
        }
    }
}

impl Settings {
    /// `s.validate()` checks every value against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: SCHEMA_VERSION,
            });
        }

        for level in [self.speed_level, self.scroll_level] {
            if !(MIN_SPEED_LEVEL..=MAX_SPEED_LEVEL).contains(&level) {
                return Err(ConfigError::LevelOutOfRange(level));
            }
        }

        for threshold in [self.sip_threshold_hpa, self.puff_threshold_hpa] {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(ConfigError::ThresholdNotPositive(threshold));
            }
        }

        for factor in [self.inner_deadzone, self.outer_deadzone] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::DeadzoneOutOfRange(factor));
            }
        }

        if self.outer_deadzone <= self.inner_deadzone {
            return Err(ConfigError::DeadzonesOverlap {
                inner: self.inner_deadzone,
                outer: self.outer_deadzone,
            });
        }

        Ok(())
    }

    /// `s.calibration()` is the calibration set stored in the document
    pub fn calibration(&self) -> CalibrationSet {
        CalibrationSet {
            points: [
                PointF::from(self.center),
                PointF::from(self.corner_1),
                PointF::from(self.corner_2),
                PointF::from(self.corner_3),
                PointF::from(self.corner_4),
            ],
        }
    }

    /// `s.apply(js, p)` validates the settings and pushes them into the joystick `js` and the pressure detector `p`
    ///
    /// Nothing is changed if validation fails. A changed pressure mode only takes effect properly once the pressure
    /// detector has been zeroed again.
    pub fn apply(&self, joystick: &mut Joystick, pressure: &mut Pressure) -> Result<(), ConfigError> {
        self.validate()?;

        joystick.set_output_mode(self.operating_mode.output_mode());
        joystick.set_speed_level(self.speed_level);
        joystick.set_inner_deadzone(Deadzone::new(self.inner_deadzone))?;
        joystick.set_outer_deadzone(Deadzone::new(self.outer_deadzone))?;
        joystick.load_calibration(self.calibration());

        pressure.set_mode(self.pressure_mode);
        pressure.set_sip_threshold(self.sip_threshold_hpa)?;
        pressure.set_puff_threshold(self.puff_threshold_hpa)?;

        log::info!("settings applied");
        Ok(())
    }

    /// `s.capture(js, p)` is `s` with every value the joystick `js` and pressure detector `p` own read back from them
    ///
    /// Values the core does not use, like the communication mode and scroll level, are kept from `s`. So is safe
    /// mode, which the joystick output mode can't express.
    pub fn capture(&self, joystick: &Joystick, pressure: &Pressure) -> Self {
        let calibration = joystick.calibration();
        let operating_mode = match self.operating_mode {
            OperatingMode::Safe => OperatingMode::Safe,
            _ => OperatingMode::from_output_mode(joystick.output_mode()),
        };

        Self {
            version: SCHEMA_VERSION,
            operating_mode,
            comm_mode: self.comm_mode,
            speed_level: joystick.speed_level(),
            scroll_level: self.scroll_level,
            pressure_mode: pressure.mode(),
            sip_threshold_hpa: pressure.sip_threshold(),
            puff_threshold_hpa: pressure.puff_threshold(),
            inner_deadzone: joystick.inner_deadzone().factor,
            outer_deadzone: joystick.outer_deadzone().factor,
            center: calibration.center().as_array(),
            corner_1: calibration.corner(Quadrant::One).as_array(),
            corner_2: calibration.corner(Quadrant::Two).as_array(),
            corner_3: calibration.corner(Quadrant::Three).as_array(),
            corner_4: calibration.corner(Quadrant::Four).as_array(),
        }
    }
}

/// The settings schema version this crate reads and writes
pub const SCHEMA_VERSION: u8 = 1;

/// Factory scroll level
pub const DEFAULT_SCROLL_LEVEL: u8 = 5;
