//! # Two dimensional samples
//!
//! Joystick readings travel through the pipeline as points. Raw magnetic field readings are floating point millitesla,
//! mapped and output values are integers.

use serde::{Deserialize, Serialize};

use crate::utils::round_to_i32;

/// A 2D point is represented here
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

/// A floating point sample, typically raw sensor units
pub type PointF = Point<f32>;

/// An integer sample, typically normalized or output units
pub type PointI = Point<i32>;

impl<T> Point<T> {
    /// `Point::new(x, y)` is a new point at `(x, y)`
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Point<f32> {
    /// The origin
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// `Point::from_polar(m, a)` is the point at magnitude `m` and angle `a` in radians
    pub fn from_polar(magnitude: f32, angle: f32) -> Self {
        Self::new(magnitude * libm::cosf(angle), magnitude * libm::sinf(angle))
    }

    /// `p.magnitude()` is the distance from the origin to `p`
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.magnitude_squared())
    }

    /// `p.magnitude_squared()` is the squared distance from the origin to `p`
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// `p.distance_to(q)` is the distance between `p` and `q`
    pub fn distance_to(&self, other: Self) -> f32 {
        (*self - other).magnitude()
    }

    /// `p.angle()` is the angle of `p` in radians, in `[-PI, PI]`
    pub fn angle(&self) -> f32 {
        libm::atan2f(self.y, self.x)
    }

    /// `p.as_array()` is `[x, y]`
    pub fn as_array(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl From<[f32; 2]> for Point<f32> {
    fn from(xy: [f32; 2]) -> Self {
        Self::new(xy[0], xy[1])
    }
}

impl core::ops::Sub for Point<f32> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Point<i32> {
    /// The origin
    pub const ZERO: Self = Self::new(0, 0);

    /// `Point::from_polar(m, a)` is the point at magnitude `m` and angle `a`, each coordinate rounded
    pub fn from_polar(magnitude: f32, angle: f32) -> Self {
        Self::new(
            round_to_i32(magnitude * libm::cosf(angle)),
            round_to_i32(magnitude * libm::sinf(angle)),
        )
    }

    /// `p.magnitude()` is the distance from the origin to `p`
    pub fn magnitude(&self) -> f32 {
        let (x, y) = (self.x as f32, self.y as f32);
        libm::sqrtf(x * x + y * y)
    }

    /// `p.angle()` is the angle of `p` in radians, in `[-PI, PI]`
    pub fn angle(&self) -> f32 {
        libm::atan2f(self.y as f32, self.x as f32)
    }
}
