//! # Magnetic joystick calibration and mapping
//!
//! A magnet on the joystick shaft moves above a 3-axis hall effect sensor. The planar field components give the stick
//! position, the sign of the vertical component tells which way up the magnet was mounted.
//!
//! Every raw sample goes through the same pipeline:
//!
//! 1. samples that moved less than `INPUT_CHANGE_TOLERANCE` on both axes since the previous one are recorded but not
//!    processed any further
//! 2. the learned center is subtracted and the mounting orientation corrected
//! 3. points outside the usable radius are pulled onto it, then each axis is mapped to `[-INPUT_XY_MAX, INPUT_XY_MAX]`
//! 4. a radial deadzone zeroes the center, saturates the rim, and stretches the band in between to the full range
//! 5. the magnitude is scaled down to the output range chosen by the speed level or output mode
//!
//! The raw sample, the mapped input (after step 3) and the final output each land in their own history.
//!
//! ## Calibration
//!
//! The calibration set holds the neutral center point and one extreme point per quadrant. The usable radius is the
//! smallest center to corner distance scaled by `1/sqrt(2)`, so the circle fits inside the square the corners describe.
//! Corners that are zeroed are ignored. The radius is recomputed every time the calibration changes.

use core::f32::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::point::{PointF, PointI};
use crate::ring_history::RingHistory;
use crate::sensor::MagneticSensor;
use crate::utils::{fabs, map_range, map_range_round, round_to_i32};

/// The orientation of one sensor axis
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Default = 1,
    Inverse = -1,

    /// The orientation could not be determined, the axis is disabled
    Fault = 0,
}

impl Direction {
    /// `d.sign()` is the multiplier applied to the axis
    pub fn sign(self) -> f32 {
        match self {
            Direction::Default => 1.0,
            Direction::Inverse => -1.0,
            Direction::Fault => 0.0,
        }
    }
}

/// The kind of device the output vector drives
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Mouse cursor, the speed level picks the output range
    #[default]
    Cursor,

    /// Gamepad axes, the output range is fixed
    Gamepad,
}

/// One of the four joystick corners used for calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Quadrant {
    One,
    Two,
    Three,
    Four,
}

impl Quadrant {
    /// Every quadrant, in calibration order
    pub const ALL: [Quadrant; 4] = [
        Quadrant::One,
        Quadrant::Two,
        Quadrant::Three,
        Quadrant::Four,
    ];

    /// `q.index()` is the position of the quadrant's corner in a calibration set, in `[1, 4]`
    pub fn index(self) -> usize {
        match self {
            Quadrant::One => 1,
            Quadrant::Two => 2,
            Quadrant::Three => 3,
            Quadrant::Four => 4,
        }
    }
}

/// The learned center point and four corner extremes, in raw sensor units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSet {
    /// Index 0 is the center, indices 1 to 4 are the corners of quadrants one to four
    pub points: [PointF; CALIBRATION_POINTS],
}

impl CalibrationSet {
    /// `cs.center()` is the neutral point
    pub fn center(&self) -> PointF {
        self.points[0]
    }

    /// `cs.corner(q)` is the extreme point recorded for quadrant `q`
    pub fn corner(&self, quadrant: Quadrant) -> PointF {
        self.points[quadrant.index()]
    }
}

impl Default for CalibrationSet {
    fn default() -> Self {
        Self {
            points: [
                PointF::ZERO,
                PointF::new(-DEFAULT_CORNER_MT, DEFAULT_CORNER_MT),
                PointF::new(DEFAULT_CORNER_MT, DEFAULT_CORNER_MT),
                PointF::new(DEFAULT_CORNER_MT, -DEFAULT_CORNER_MT),
                PointF::new(-DEFAULT_CORNER_MT, -DEFAULT_CORNER_MT),
            ],
        }
    }
}

/// A radial deadzone boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    pub enabled: bool,

    /// Fraction of `INPUT_XY_MAX` where the boundary sits, in `[0.0, 1.0]`
    pub factor: f32,
}

impl Deadzone {
    /// `Deadzone::new(f)` is an enabled deadzone at factor `f`
    pub const fn new(factor: f32) -> Self {
        Self {
            enabled: true,
            factor,
        }
    }

    fn value(&self, disabled_value: i32) -> i32 {
        if self.enabled {
            round_to_i32(INPUT_XY_MAX as f32 * self.factor)
        } else {
            disabled_value
        }
    }
}

/// A magnetic joystick calibration and mapping pipeline is represented here
pub struct Joystick {
    raw: RingHistory<PointF, RAW_BUFFER_SIZE>,
    input: RingHistory<PointI, INPUT_BUFFER_SIZE>,
    output: RingHistory<PointI, OUTPUT_BUFFER_SIZE>,
    center_samples: RingHistory<PointF, CENTER_BUFFER_SIZE>,

    calibration: CalibrationSet,

    /// Usable radius around the center in raw sensor units, derived from the calibration set
    input_radius: f32,

    x_direction: Direction,
    y_direction: Direction,
    z_direction: Direction,

    /// Per axis multiplier combining the mounting orientation and the magnet orientation
    axis_sign: PointF,

    inner_deadzone: Deadzone,
    outer_deadzone: Deadzone,

    output_mode: OutputMode,
    speed_level: u8,

    /// Maximum output magnitude, derived from the output mode and speed level
    range_value: i32,
}

impl Joystick {
    /// `Joystick::new()` is a new joystick with the factory calibration and default settings
    pub fn new() -> Self {
        let mut joystick = Self {
            raw: RingHistory::new(),
            input: RingHistory::new(),
            output: RingHistory::new(),
            center_samples: RingHistory::new(),
            calibration: CalibrationSet::default(),
            input_radius: 0.0,
            x_direction: Direction::Default,
            y_direction: Direction::Default,
            z_direction: Direction::Default,
            axis_sign: PointF::ZERO,
            inner_deadzone: Deadzone::new(DEFAULT_INNER_DEADZONE),
            outer_deadzone: Deadzone::new(DEFAULT_OUTER_DEADZONE),
            output_mode: OutputMode::Cursor,
            speed_level: DEFAULT_SPEED_LEVEL,
            range_value: 0,
        };
        joystick.update_input_radius();
        joystick.update_axis_signs();
        joystick.update_range_value();
        joystick
    }

    /// `js.poll(sensor)` reads the magnetometer and feeds the sample through the pipeline
    ///
    /// Returns true iff the sample moved far enough to be processed, see `update`.
    pub fn poll<S: MagneticSensor>(&mut self, sensor: &mut S) -> Result<bool, S::Error> {
        let field = sensor.read_field()?;
        Ok(self.update(field.planar()))
    }

    /// `js.update(raw)` feeds one raw sample through the pipeline
    ///
    /// Returns true iff the sample was processed and new input and output values were recorded. The raw sample itself
    /// is always recorded.
    ///
    /// # Arguments:
    ///
    /// * `raw` - the planar field reading in millitesla
    pub fn update(&mut self, raw: PointF) -> bool {
        let prev = self.raw.last();
        let unchanged = !self.raw.is_empty()
            && fabs(raw.x - prev.x) < INPUT_CHANGE_TOLERANCE
            && fabs(raw.y - prev.y) < INPUT_CHANGE_TOLERANCE;

        self.raw.push(raw);

        if unchanged {
            return false;
        }

        let input = self.map_input(raw);
        self.input.push(input);

        let output = self.scale_output(self.deadzone(input));
        self.output.push(output);

        true
    }

    /// `js.map_input(raw)` is the raw sample centered, oriented, bounded by the usable radius, and mapped per axis
    /// to `[-INPUT_XY_MAX, INPUT_XY_MAX]`
    pub fn map_input(&self, raw: PointF) -> PointI {
        let radius = self.input_radius;
        if radius <= 0.0 {
            return PointI::ZERO;
        }

        let center = self.calibration.center();
        let mut centered = PointF::new(
            (raw.x - center.x) * self.axis_sign.x,
            (raw.y - center.y) * self.axis_sign.y,
        );

        if radius * radius <= centered.magnitude_squared() {
            centered = PointF::from_polar(radius, centered.angle());
        }

        PointI::new(
            map_range_round(centered.x, -radius, radius, -INPUT_XY_MAX, INPUT_XY_MAX),
            map_range_round(centered.y, -radius, radius, -INPUT_XY_MAX, INPUT_XY_MAX),
        )
    }

    /// `js.deadzone(p)` is the mapped input point `p` with the radial deadzones applied
    ///
    /// Magnitudes at or below the inner deadzone become zero, magnitudes at or above the outer deadzone are pulled onto
    /// the `INPUT_XY_MAX` circle, and the band in between is stretched to `[0, INPUT_XY_MAX]`. The angle is kept.
    pub fn deadzone(&self, input: PointI) -> PointI {
        let magnitude = input.magnitude();
        let angle = input.angle();

        let inner = self.inner_deadzone.value(0) as f32;
        let outer = self.outer_deadzone.value(INPUT_XY_MAX) as f32;

        if magnitude <= inner {
            PointI::ZERO
        } else if outer <= magnitude {
            PointI::from_polar(INPUT_XY_MAX as f32, angle)
        } else {
            let stretched = map_range_round(magnitude, inner, outer, 0, INPUT_XY_MAX);
            PointI::from_polar(stretched as f32, angle)
        }
    }

    fn scale_output(&self, deadzoned: PointI) -> PointI {
        let range = self.range_value as f32;
        let magnitude = map_range(
            deadzoned.magnitude(),
            0.0,
            INPUT_XY_MAX as f32,
            0.0,
            range,
        )
        .clamp(0.0, range);

        PointI::from_polar(magnitude, deadzoned.angle())
    }

    /// `js.zero_output()` records a zero output vector, for when no sample could be read this tick
    ///
    /// The raw history is cleared, so the next sample is processed even if the stick did not move meanwhile.
    pub fn zero_output(&mut self) {
        self.raw.reset();
        self.output.push(PointI::ZERO);
    }

    /// `js.raw()` is the newest raw sample
    pub fn raw(&self) -> PointF {
        self.raw.last()
    }

    /// `js.input()` is the newest mapped input, before deadzones and scaling
    pub fn input(&self) -> PointI {
        self.input.last()
    }

    /// `js.output()` is the newest output vector
    pub fn output(&self) -> PointI {
        self.output.last()
    }

    pub fn raw_history(&self) -> &RingHistory<PointF, RAW_BUFFER_SIZE> {
        &self.raw
    }

    pub fn input_history(&self) -> &RingHistory<PointI, INPUT_BUFFER_SIZE> {
        &self.input
    }

    pub fn output_history(&self) -> &RingHistory<PointI, OUTPUT_BUFFER_SIZE> {
        &self.output
    }

    /// `js.push_center_sample(p)` records a raw sample taken while the stick is at rest
    pub fn push_center_sample(&mut self, sample: PointF) {
        self.center_samples.push(sample);
    }

    /// `js.sample_center(sensor)` reads the magnetometer and records the reading as a center sample
    pub fn sample_center<S: MagneticSensor>(&mut self, sensor: &mut S) -> Result<(), S::Error> {
        let field = sensor.read_field()?;
        self.push_center_sample(field.planar());
        Ok(())
    }

    /// `js.evaluate_center()` makes the average of the recorded center samples the new center, and is that center
    ///
    /// Without any recorded samples the center is left as is.
    pub fn evaluate_center(&mut self) -> PointF {
        let count = self.center_samples.len();
        if count == 0 {
            return self.calibration.center();
        }

        let mut sum = PointF::ZERO;
        for k in 0..count {
            let sample = self.center_samples.get(k);
            sum.x += sample.x;
            sum.y += sample.y;
        }
        let center = PointF::new(sum.x / count as f32, sum.y / count as f32);

        log::debug!("joystick center evaluated at ({}, {})", center.x, center.y);
        self.set_center(center);
        center
    }

    /// `js.center()` is the learned neutral point
    pub fn center(&self) -> PointF {
        self.calibration.center()
    }

    /// `js.set_center(p)` sets the neutral point
    pub fn set_center(&mut self, center: PointF) {
        self.calibration.points[0] = center;
        self.update_input_radius();
    }

    /// `js.capture_corner(q, p)` records `p` as the corner of quadrant `q` if it lies farther from the center than the
    /// corner recorded so far, and is the resulting corner
    ///
    /// Call repeatedly while the user holds the stick in the corner, the stored corner converges to the extreme.
    pub fn capture_corner(&mut self, quadrant: Quadrant, sample: PointF) -> PointF {
        let center = self.calibration.center();
        let current = self.calibration.corner(quadrant);

        if current.distance_to(center) < sample.distance_to(center) {
            log::debug!(
                "joystick corner {} replaced with ({}, {})",
                quadrant.index(),
                sample.x,
                sample.y
            );
            self.set_corner(quadrant, sample);
        }

        self.calibration.corner(quadrant)
    }

    /// `js.capture_corner_from(q, sensor)` reads the magnetometer and captures the reading as the corner of `q`
    pub fn capture_corner_from<S: MagneticSensor>(
        &mut self,
        quadrant: Quadrant,
        sensor: &mut S,
    ) -> Result<PointF, S::Error> {
        let field = sensor.read_field()?;
        Ok(self.capture_corner(quadrant, field.planar()))
    }

    /// `js.corner(q)` is the corner recorded for quadrant `q`
    pub fn corner(&self, quadrant: Quadrant) -> PointF {
        self.calibration.corner(quadrant)
    }

    /// `js.set_corner(q, p)` unconditionally records `p` as the corner of quadrant `q`
    pub fn set_corner(&mut self, quadrant: Quadrant, corner: PointF) {
        self.calibration.points[quadrant.index()] = corner;
        self.update_input_radius();
    }

    /// `js.zero_corner(q)` forgets the corner of quadrant `q`, it no longer limits the usable radius
    pub fn zero_corner(&mut self, quadrant: Quadrant) {
        self.set_corner(quadrant, PointF::ZERO);
    }

    /// `js.load_calibration(cs)` replaces the whole calibration set
    pub fn load_calibration(&mut self, calibration: CalibrationSet) {
        self.calibration = calibration;
        self.update_input_radius();
    }

    /// `js.calibration()` is the current calibration set
    pub fn calibration(&self) -> CalibrationSet {
        self.calibration
    }

    /// `js.input_radius()` is the usable radius around the center in raw sensor units
    pub fn input_radius(&self) -> f32 {
        self.input_radius
    }

    fn update_input_radius(&mut self) {
        let center = self.calibration.center();
        let mut radius = PointF::new(RAW_XY_MAX, RAW_XY_MAX).distance_to(center) / SQRT_2;

        for quadrant in Quadrant::ALL {
            let corner = self.calibration.corner(quadrant);
            if 0.0 < corner.magnitude() {
                radius = radius.min(corner.distance_to(center) / SQRT_2);
            }
        }

        self.input_radius = radius;
    }

    /// `js.probe_z_direction(sensor)` averages a few vertical field readings to find which way up the magnet is
    /// mounted, applies it, and is the detected direction
    pub fn probe_z_direction<S: MagneticSensor>(
        &mut self,
        sensor: &mut S,
    ) -> Result<Direction, S::Error> {
        let mut total = 0.0;
        for _ in 0..MAG_SAMPLE_SIZE {
            total += sensor.read_field()?.z;
        }

        let direction = z_direction_from_reading(total / MAG_SAMPLE_SIZE as f32);
        if direction == Direction::Fault {
            log::warn!("joystick magnet orientation could not be detected, axes disabled");
        }

        self.z_direction = direction;
        self.update_axis_signs();
        Ok(direction)
    }

    /// `js.set_magnet_direction(x, y, z)` sets the orientation of each axis
    pub fn set_magnet_direction(&mut self, x: Direction, y: Direction, z: Direction) {
        self.x_direction = x;
        self.y_direction = y;
        self.z_direction = z;
        self.update_axis_signs();
    }

    pub fn x_direction(&self) -> Direction {
        self.x_direction
    }

    pub fn y_direction(&self) -> Direction {
        self.y_direction
    }

    pub fn z_direction(&self) -> Direction {
        self.z_direction
    }

    fn update_axis_signs(&mut self) {
        // the sensor sits upside down relative to the stick
        let z = self.z_direction.sign();
        self.axis_sign = PointF::new(
            -z * self.x_direction.sign(),
            -z * self.y_direction.sign(),
        );
    }

    /// `js.set_inner_deadzone(dz)` sets the deadzone around the center
    pub fn set_inner_deadzone(&mut self, deadzone: Deadzone) -> Result<(), ConfigError> {
        check_deadzone_factor(deadzone.factor)?;
        self.inner_deadzone = deadzone;
        Ok(())
    }

    /// `js.set_outer_deadzone(dz)` sets the deadzone at the rim
    pub fn set_outer_deadzone(&mut self, deadzone: Deadzone) -> Result<(), ConfigError> {
        check_deadzone_factor(deadzone.factor)?;
        self.outer_deadzone = deadzone;
        Ok(())
    }

    pub fn inner_deadzone(&self) -> Deadzone {
        self.inner_deadzone
    }

    pub fn outer_deadzone(&self) -> Deadzone {
        self.outer_deadzone
    }

    /// `js.set_speed_level(l)` sets the cursor speed level, clamped to `[MIN_SPEED_LEVEL, MAX_SPEED_LEVEL]`
    pub fn set_speed_level(&mut self, level: u8) {
        self.speed_level = level.clamp(MIN_SPEED_LEVEL, MAX_SPEED_LEVEL);
        self.update_range_value();
    }

    pub fn speed_level(&self) -> u8 {
        self.speed_level
    }

    /// `js.set_output_mode(m)` selects what kind of device the output drives
    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
        self.update_range_value();
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// `js.range_value()` is the maximum output magnitude
    pub fn range_value(&self) -> i32 {
        self.range_value
    }

    fn update_range_value(&mut self) {
        self.range_value = range_value(self.output_mode, self.speed_level);
        log::debug!(
            "joystick output range {} (mode {:?}, speed {})",
            self.range_value,
            self.output_mode,
            self.speed_level
        );
    }
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new()
    }
}

/// `range_value(m, l)` is the maximum output magnitude for output mode `m` at speed level `l`
///
/// Cursor ranges follow an empirically tuned polynomial of the speed level, gamepads always use the full axis.
pub fn range_value(mode: OutputMode, speed_level: u8) -> i32 {
    match mode {
        OutputMode::Cursor => {
            let l = speed_level as f32;
            let range = libm::floorf(0.125 * l * l + 0.3 * l + 2.0) as i32;
            range.min(CURSOR_OUTPUT_MAX)
        }
        OutputMode::Gamepad => GAMEPAD_OUTPUT_MAX,
    }
}

/// `z_direction_from_reading(z)` is the magnet orientation implied by an averaged vertical field reading
pub fn z_direction_from_reading(z: f32) -> Direction {
    if z < -Z_DIRECTION_THRESHOLD {
        Direction::Inverse
    } else if Z_DIRECTION_THRESHOLD < z {
        Direction::Default
    } else {
        Direction::Fault
    }
}

fn check_deadzone_factor(factor: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&factor) {
        Ok(())
    } else {
        Err(ConfigError::DeadzoneOutOfRange(factor))
    }
}

/// Depth of the raw sample history
pub const RAW_BUFFER_SIZE: usize = 10;

/// Depth of the mapped input history
pub const INPUT_BUFFER_SIZE: usize = 5;

/// Depth of the output history
pub const OUTPUT_BUFFER_SIZE: usize = 5;

/// Number of center samples averaged by `evaluate_center`
pub const CENTER_BUFFER_SIZE: usize = 5;

/// Number of points in a calibration set, the center plus four corners
pub const CALIBRATION_POINTS: usize = 5;

/// Number of vertical readings averaged when probing the magnet orientation
pub const MAG_SAMPLE_SIZE: usize = 5;

/// Vertical field strength in millitesla separating a detected orientation from a fault
pub const Z_DIRECTION_THRESHOLD: f32 = 9.0;

/// Largest raw reading per axis in millitesla, bounds the usable radius before any corner is known
pub const RAW_XY_MAX: f32 = 30.0;

/// Factory corner distance per axis in millitesla
pub const DEFAULT_CORNER_MT: f32 = 13.0;

/// Mapped inputs span `[-INPUT_XY_MAX, INPUT_XY_MAX]` per axis
pub const INPUT_XY_MAX: i32 = 1024;

/// Raw samples closer than this to the previous one on both axes are not processed, in millitesla
pub const INPUT_CHANGE_TOLERANCE: f32 = 0.1;

/// Default inner deadzone as a fraction of `INPUT_XY_MAX`
pub const DEFAULT_INNER_DEADZONE: f32 = 0.05;

/// Default outer deadzone as a fraction of `INPUT_XY_MAX`
pub const DEFAULT_OUTER_DEADZONE: f32 = 1.0 - DEFAULT_INNER_DEADZONE;

pub const MIN_SPEED_LEVEL: u8 = 1;
pub const MAX_SPEED_LEVEL: u8 = 10;
pub const DEFAULT_SPEED_LEVEL: u8 = 5;

/// Largest cursor output magnitude
pub const CURSOR_OUTPUT_MAX: i32 = 1024;

/// Output magnitude in gamepad mode
pub const GAMEPAD_OUTPUT_MAX: i32 = 127;
