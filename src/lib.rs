#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

pub mod classifier;
pub mod controller;
pub mod error;
pub mod joystick;
pub mod point;
pub mod pressure;
pub mod ring_history;
pub mod sensor;
pub mod settings;
pub mod timer;
pub mod utils;

pub use controller::{Board, Controller, Peripherals, SafeModeReason, Snapshot, Status, Subsystem};
pub use error::{ConfigError, Error, SensorError, TimerError};
pub use settings::Settings;
