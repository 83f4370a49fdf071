//! # Pressure compensation and sip/puff detection
//!
//! The mouthpiece pressure sensor sees the user's breath on top of the ambient air pressure. A second sensor measures
//! the ambient pressure so weather and altitude changes can be subtracted out.
//!
//! In differential mode the breath pressure is `mouthpiece - ambient - offset`, where the offset absorbs the static
//! difference between the two sensors. It is measured at startup by averaging a few readings taken while nobody uses
//! the mouthpiece, and measured again whenever the sip/puff classifier has been idle for [`ACTION_TIMEOUT_MS`]. The
//! ambient reference only follows the ambient sensor once it moves by more than a small tolerance, which keeps sensor
//! noise out of the breath pressure.
//!
//! In absolute mode only the mouthpiece sensor is used and its own idle reading serves as the reference.
//!
//! The breath pressure is compared against the sip and puff thresholds and the resulting `SapState` code drives a
//! debounced classifier.
//!
//! [`ACTION_TIMEOUT_MS`]: crate::classifier::ACTION_TIMEOUT_MS

use serde::{Deserialize, Serialize};

use crate::classifier::{Classification, InputClassifier, Step};
use crate::error::{ConfigError, SensorError};
use crate::ring_history::RingHistory;
use crate::sensor::{Clock, PressureSensor, SensorHealth};
use crate::utils::fabs;

/// How the breath pressure is referenced
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressureMode {
    /// Mouthpiece sensor only, referenced to its own idle reading
    Absolute = 1,

    /// Mouthpiece sensor referenced to the ambient sensor
    #[default]
    Differential = 2,
}

impl TryFrom<u8> for PressureMode {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, ConfigError> {
        match code {
            1 => Ok(PressureMode::Absolute),
            2 => Ok(PressureMode::Differential),
            _ => Err(ConfigError::UnknownCode {
                setting: "pressure mode",
                code,
            }),
        }
    }
}

impl From<PressureMode> for u8 {
    fn from(mode: PressureMode) -> u8 {
        mode as u8
    }
}

/// The breath gesture detected on one poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SapState {
    #[default]
    None = 0,
    Sip = 1,
    Puff = 2,
}

impl SapState {
    /// `s.code()` is the activity code fed to the classifier
    pub fn code(self) -> u8 {
        self as u8
    }

    /// `SapState::from_code(c)` is the state with activity code `c`, if any
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SapState::None),
            1 => Some(SapState::Sip),
            2 => Some(SapState::Puff),
            _ => None,
        }
    }
}

/// How the breath pressure is read back from the sample history
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    /// The newest sample
    #[default]
    None,

    /// The mean of the samples in the history
    Average,
}

/// One compensated pressure reading, in hectopascals
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PressureSample {
    /// The mouthpiece sensor reading
    pub absolute_hpa: f32,

    /// The ambient reference in effect
    pub ambient_hpa: f32,

    /// The breath pressure, positive for puffs and negative for sips
    pub differential_hpa: f32,
}

/// The mouthpiece and ambient pressure sensors, with their health
pub struct PressureSensors<M, A> {
    pub mouthpiece: M,
    pub ambient: A,

    mouthpiece_health: SensorHealth,
    ambient_health: SensorHealth,
}

impl<M: PressureSensor, A: PressureSensor> PressureSensors<M, A> {
    /// `PressureSensors::new(m, a)` bundles the mouthpiece sensor `m` and the ambient sensor `a`
    pub fn new(mouthpiece: M, ambient: A) -> Self {
        let mouthpiece_health = SensorHealth {
            present: mouthpiece.is_present(),
            degraded: false,
        };
        let ambient_health = SensorHealth {
            present: ambient.is_present(),
            degraded: false,
        };

        Self {
            mouthpiece,
            ambient,
            mouthpiece_health,
            ambient_health,
        }
    }

    /// `ps.read_valid(mode, clock)` is a physically valid mouthpiece reading and, in differential mode, a valid
    /// ambient reading
    ///
    /// Readings at or below zero are rejected and both sensors read again, for at most `READ_TIMEOUT_MS` and
    /// `READ_MAX_ATTEMPTS` attempts. A sensor that produced the last rejected reading, or a driver error, is flagged as
    /// degraded until it reads valid again.
    pub fn read_valid<C: Clock>(
        &mut self,
        mode: PressureMode,
        clock: &C,
    ) -> Result<(f32, Option<f32>), SensorError> {
        let use_ambient = mode == PressureMode::Differential;

        if !self.mouthpiece_health.present || (use_ambient && !self.ambient_health.present) {
            return Err(SensorError::NotPresent);
        }

        let start_ms = clock.now_ms();
        let mut waited_ms = 0;
        let mut mouthpiece_ok = true;
        let mut ambient_ok = true;

        for _ in 0..READ_MAX_ATTEMPTS {
            let mouthpiece = match self.mouthpiece.read_hpa() {
                Ok(hpa) => hpa,
                Err(e) => {
                    log::warn!("mouthpiece pressure sensor error: {:?}", e);
                    self.mouthpiece_health.degraded = true;
                    return Err(SensorError::Driver);
                }
            };

            let ambient = if use_ambient {
                match self.ambient.read_hpa() {
                    Ok(hpa) => Some(hpa),
                    Err(e) => {
                        log::warn!("ambient pressure sensor error: {:?}", e);
                        self.ambient_health.degraded = true;
                        return Err(SensorError::Driver);
                    }
                }
            } else {
                None
            };

            mouthpiece_ok = 0.0 < mouthpiece;
            ambient_ok = ambient.map_or(true, |hpa| 0.0 < hpa);

            if mouthpiece_ok && ambient_ok {
                self.mouthpiece_health.degraded = false;
                if use_ambient {
                    self.ambient_health.degraded = false;
                }
                return Ok((mouthpiece, ambient));
            }

            waited_ms = clock.now_ms().wrapping_sub(start_ms);
            if READ_TIMEOUT_MS <= waited_ms {
                break;
            }
        }

        self.mouthpiece_health.degraded |= !mouthpiece_ok;
        self.ambient_health.degraded |= !ambient_ok;
        log::warn!("no valid pressure reading after {} ms", waited_ms);
        Err(SensorError::Timeout { waited_ms })
    }

    pub fn mouthpiece_health(&self) -> SensorHealth {
        self.mouthpiece_health
    }

    pub fn ambient_health(&self) -> SensorHealth {
        self.ambient_health
    }
}

/// A pressure compensation stage and sip/puff detector is represented here
pub struct Pressure {
    samples: RingHistory<PressureSample, PRESSURE_BUFFER_SIZE>,
    classifier: InputClassifier<SAP_BUFFER_SIZE>,

    mode: PressureMode,
    filter: FilterMode,

    /// The ambient pressure the breath pressure is referenced to
    ambient_hpa: f32,

    /// The static difference between the sensors, measured by `zero`
    offset_hpa: f32,

    /// Smallest ambient change that moves the ambient reference
    ref_tolerance_hpa: f32,

    sip_threshold_hpa: f32,
    puff_threshold_hpa: f32,
}

impl Pressure {
    /// `Pressure::new(now)` is a new differential detector with default thresholds
    ///
    /// It has no reference yet, call `zero` before polling.
    pub fn new(now_ms: u32) -> Self {
        Self {
            samples: RingHistory::new(),
            classifier: InputClassifier::new(DEFAULT_SAP_REACTION_TIME_MS, now_ms),
            mode: PressureMode::Differential,
            filter: FilterMode::None,
            ambient_hpa: 0.0,
            offset_hpa: 0.0,
            ref_tolerance_hpa: REF_TOLERANCE_HPA,
            sip_threshold_hpa: DEFAULT_THRESHOLD_HPA,
            puff_threshold_hpa: DEFAULT_THRESHOLD_HPA,
        }
    }

    /// `p.zero(sensors, clock)` measures the reference and offset from a few readings taken at rest, and is the new
    /// offset
    ///
    /// If any reading fails the previous reference and offset are kept.
    pub fn zero<M: PressureSensor, A: PressureSensor, C: Clock>(
        &mut self,
        sensors: &mut PressureSensors<M, A>,
        clock: &C,
    ) -> Result<f32, SensorError> {
        let mut total_offset = 0.0;
        let mut ambient_hpa = self.ambient_hpa;

        for _ in 0..ZERO_SAMPLE_SIZE {
            let (mouthpiece, ambient) = sensors.read_valid(self.mode, clock)?;
            match ambient {
                Some(ambient) => {
                    total_offset += mouthpiece - ambient;
                    ambient_hpa = ambient;
                }
                // absolute mode, the mouthpiece at rest is its own reference
                None => ambient_hpa = mouthpiece,
            }
        }

        self.ambient_hpa = ambient_hpa;
        self.offset_hpa = total_offset / ZERO_SAMPLE_SIZE as f32;
        log::debug!(
            "pressure zeroed, reference {} hPa, offset {} hPa",
            self.ambient_hpa,
            self.offset_hpa
        );

        Ok(self.offset_hpa)
    }

    /// `p.update(sensors, clock)` reads the sensors, records the compensated sample, and classifies it
    ///
    /// A failed read keeps the previous sample, the sensors' health flags report the failure. When the classifier
    /// reports a long idle period the reference and offset are measured again.
    pub fn update<M: PressureSensor, A: PressureSensor, C: Clock>(
        &mut self,
        sensors: &mut PressureSensors<M, A>,
        clock: &C,
    ) -> Step {
        if let Ok((mouthpiece, ambient)) = sensors.read_valid(self.mode, clock) {
            self.ingest(mouthpiece, ambient);
        }

        let step = self.classify(clock.now_ms());

        if step == Step::IdleTimeout {
            // failures are already flagged on the sensors, the old offset stays in use
            self.zero(sensors, clock).ok();
        }

        step
    }

    /// `p.ingest(m, a)` records a compensated sample from the mouthpiece reading `m` and the ambient reading `a`
    ///
    /// The ambient reading is only used in differential mode. Samples are dropped until a positive reference exists.
    pub fn ingest(&mut self, mouthpiece_hpa: f32, ambient_hpa: Option<f32>) {
        if self.mode == PressureMode::Differential {
            if let Some(ambient) = ambient_hpa {
                if 0.0 < ambient && self.ref_tolerance_hpa <= fabs(self.ambient_hpa - ambient) {
                    self.ambient_hpa = ambient;
                }
            }
        }

        if 0.0 < mouthpiece_hpa && 0.0 < self.ambient_hpa {
            self.samples.push(PressureSample {
                absolute_hpa: mouthpiece_hpa,
                ambient_hpa: self.ambient_hpa,
                differential_hpa: mouthpiece_hpa - self.ambient_hpa - self.offset_hpa,
            });
        }
    }

    /// `p.classify(now)` feeds the current breath pressure through the thresholds and the classifier
    pub fn classify(&mut self, now_ms: u32) -> Step {
        let state = self.sap_state();
        self.classifier.update(state.code(), now_ms)
    }

    /// `p.sap_state()` is the gesture the current breath pressure crosses the thresholds for
    pub fn sap_state(&self) -> SapState {
        let pressure = self.differential();

        if self.puff_threshold_hpa < pressure {
            SapState::Puff
        } else if pressure < -self.sip_threshold_hpa {
            SapState::Sip
        } else {
            SapState::None
        }
    }

    /// `p.differential()` is the current breath pressure in hectopascals, filtered according to the filter mode
    pub fn differential(&self) -> f32 {
        match self.filter {
            FilterMode::None => self.samples.last().differential_hpa,
            FilterMode::Average => {
                let count = self.samples.len();
                if count == 0 {
                    return 0.0;
                }
                let total: f32 = (0..count)
                    .map(|k| self.samples.get(k).differential_hpa)
                    .sum();
                total / count as f32
            }
        }
    }

    /// `p.sample()` is the newest compensated sample
    pub fn sample(&self) -> PressureSample {
        self.samples.last()
    }

    pub fn samples(&self) -> &RingHistory<PressureSample, PRESSURE_BUFFER_SIZE> {
        &self.samples
    }

    /// `p.state()` is the newest sip/puff record
    pub fn state(&self) -> Classification {
        self.classifier.state()
    }

    pub fn classifier(&self) -> &InputClassifier<SAP_BUFFER_SIZE> {
        &self.classifier
    }

    /// `p.set_reaction_time(r)` sets the sip/puff debounce window to `r` milliseconds
    pub fn set_reaction_time(&mut self, reaction_time_ms: u32) {
        self.classifier.set_reaction_time(reaction_time_ms);
    }

    /// `p.set_sip_threshold(t)` sets how far below the reference the breath pressure must fall to count as a sip
    pub fn set_sip_threshold(&mut self, threshold_hpa: f32) -> Result<(), ConfigError> {
        self.sip_threshold_hpa = check_threshold(threshold_hpa)?;
        Ok(())
    }

    /// `p.set_puff_threshold(t)` sets how far above the reference the breath pressure must rise to count as a puff
    pub fn set_puff_threshold(&mut self, threshold_hpa: f32) -> Result<(), ConfigError> {
        self.puff_threshold_hpa = check_threshold(threshold_hpa)?;
        Ok(())
    }

    pub fn sip_threshold(&self) -> f32 {
        self.sip_threshold_hpa
    }

    pub fn puff_threshold(&self) -> f32 {
        self.puff_threshold_hpa
    }

    /// `p.set_mode(m)` selects the pressure mode, `zero` must run again before the next poll
    pub fn set_mode(&mut self, mode: PressureMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> PressureMode {
        self.mode
    }

    pub fn set_filter_mode(&mut self, filter: FilterMode) {
        self.filter = filter;
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter
    }

    /// `p.set_ref_tolerance(t)` sets the smallest ambient change that moves the ambient reference
    pub fn set_ref_tolerance(&mut self, tolerance_hpa: f32) {
        self.ref_tolerance_hpa = tolerance_hpa;
    }

    /// `p.offset()` is the measured static difference between the sensors
    pub fn offset(&self) -> f32 {
        self.offset_hpa
    }

    /// `p.ambient_reference()` is the ambient pressure the breath pressure is referenced to
    pub fn ambient_reference(&self) -> f32 {
        self.ambient_hpa
    }
}

fn check_threshold(threshold_hpa: f32) -> Result<f32, ConfigError> {
    // written this way round so NaN is rejected too
    if 0.0 < threshold_hpa {
        Ok(threshold_hpa)
    } else {
        Err(ConfigError::ThresholdNotPositive(threshold_hpa))
    }
}

/// Depth of the compensated sample history
pub const PRESSURE_BUFFER_SIZE: usize = 5;

/// Depth of the sip/puff record history
pub const SAP_BUFFER_SIZE: usize = 12;

/// Number of readings averaged by `zero`
pub const ZERO_SAMPLE_SIZE: usize = 5;

/// Smallest ambient change in hectopascals that moves the ambient reference
pub const REF_TOLERANCE_HPA: f32 = 0.1;

/// Default sip and puff threshold in hectopascals
pub const DEFAULT_THRESHOLD_HPA: f32 = 3.0;

/// Default sip/puff debounce window, the thresholds already reject noise
pub const DEFAULT_SAP_REACTION_TIME_MS: u32 = 0;

/// Longest time `read_valid` keeps retrying
pub const READ_TIMEOUT_MS: u32 = 20;

/// Most attempts `read_valid` makes, bounds the retry loop even if the clock stalls
pub const READ_MAX_ATTEMPTS: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Phase, ACTION_TIMEOUT_MS};
    use crate::utils::is_almost;
    use core::cell::Cell;

    /// a clock that moves forward by `step_ms` every time it is read
    struct TestClock {
        now_ms: Cell<u32>,
        step_ms: u32,
    }

    impl TestClock {
        fn at(now_ms: u32) -> Self {
            Self {
                now_ms: Cell::new(now_ms),
                step_ms: 0,
            }
        }

        fn ticking(step_ms: u32) -> Self {
            Self {
                now_ms: Cell::new(0),
                step_ms,
            }
        }

        fn set(&self, now_ms: u32) {
            self.now_ms.set(now_ms);
        }
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u32 {
            let now = self.now_ms.get();
            self.now_ms.set(now + self.step_ms);
            now
        }
    }

    struct FakeSensor {
        hpa: f32,
        present: bool,
        failing: bool,
    }

    impl FakeSensor {
        fn reading(hpa: f32) -> Self {
            Self {
                hpa,
                present: true,
                failing: false,
            }
        }
    }

    impl PressureSensor for FakeSensor {
        type Error = ();

        fn is_present(&self) -> bool {
            self.present
        }

        fn read_hpa(&mut self) -> Result<f32, ()> {
            if self.failing {
                Err(())
            } else {
                Ok(self.hpa)
            }
        }
    }

    fn sensors(mouthpiece: f32, ambient: f32) -> PressureSensors<FakeSensor, FakeSensor> {
        PressureSensors::new(FakeSensor::reading(mouthpiece), FakeSensor::reading(ambient))
    }

    #[test]
    fn zero_averages_sensor_difference() {
        let mut s = sensors(1015.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);

        assert_eq!(p.zero(&mut s, &clock), Ok(2.0));
        assert_eq!(p.offset(), 2.0);
        assert_eq!(p.ambient_reference(), 1013.0);
    }

    #[test]
    fn differential_is_zero_at_rest() {
        let mut s = sensors(1015.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        p.ingest(1013.0 + p.offset(), Some(1013.0));
        assert!(is_almost(p.differential(), 0.0, 1E-3));
        assert_eq!(p.sap_state(), SapState::None);
    }

    #[test]
    fn ambient_reference_ignores_small_changes() {
        let mut s = sensors(1013.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        p.ingest(1013.0, Some(1013.05));
        assert_eq!(p.ambient_reference(), 1013.0);

        // a real ambient change moves the reference and cancels out of the breath pressure
        p.ingest(1014.0, Some(1014.0));
        assert_eq!(p.ambient_reference(), 1014.0);
        assert!(is_almost(p.differential(), 0.0, 1E-3));
    }

    #[test]
    fn thresholds_pick_sip_and_puff() {
        let mut s = sensors(1013.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        p.ingest(1016.5, Some(1013.0));
        assert_eq!(p.sap_state(), SapState::Puff);

        p.ingest(1009.5, Some(1013.0));
        assert_eq!(p.sap_state(), SapState::Sip);

        // exactly on the threshold is not enough
        p.ingest(1010.0, Some(1013.0));
        assert_eq!(p.sap_state(), SapState::None);
    }

    #[test]
    fn held_sip_is_one_record() {
        let mut s = sensors(1013.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.set_reaction_time(120);
        p.zero(&mut s, &clock).unwrap();

        s.mouthpiece.hpa = 1009.5;
        for t in (0..=1200).step_by(20) {
            clock.set(t);
            p.update(&mut s, &clock);
        }

        let history = p.classifier().history();
        assert_eq!(history.len(), 2);
        assert_eq!(
            p.state(),
            Classification {
                main_state: SapState::Sip.code(),
                phase: Phase::Started,
                elapsed_ms: 1200,
            }
        );
    }

    #[test]
    fn puff_release_is_reported() {
        let mut s = sensors(1013.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        s.mouthpiece.hpa = 1018.0;
        for t in [0, 50, 100, 150] {
            clock.set(t);
            p.update(&mut s, &clock);
        }
        s.mouthpiece.hpa = 1013.0;
        clock.set(200);
        p.update(&mut s, &clock);

        assert_eq!(
            p.state(),
            Classification {
                main_state: SapState::Puff.code(),
                phase: Phase::Released,
                elapsed_ms: 150,
            }
        );
    }

    #[test]
    fn idle_timeout_rezeroes() {
        let mut s = sensors(1015.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        // the sensors drift apart slowly
        s.mouthpiece.hpa = 1015.5;
        clock.set(1_000);
        assert_eq!(p.update(&mut s, &clock), Step::Held);
        assert!(is_almost(p.offset(), 2.0, 1E-3));

        clock.set(ACTION_TIMEOUT_MS + 1);
        assert_eq!(p.update(&mut s, &clock), Step::IdleTimeout);
        assert!(is_almost(p.offset(), 2.5, 1E-3));
    }

    #[test]
    fn average_filter_smooths() {
        let mut p = Pressure::new(0);
        p.set_filter_mode(FilterMode::Average);
        p.set_mode(PressureMode::Absolute);
        let mut s = sensors(1000.0, 0.0);
        p.zero(&mut s, &TestClock::at(0)).unwrap();
        assert_eq!(p.ambient_reference(), 1000.0);

        p.ingest(1000.0, None);
        p.ingest(1004.0, None);
        assert!(is_almost(p.differential(), 2.0, 1E-3));
        assert_eq!(p.samples().len(), 2);
    }

    #[test]
    fn invalid_readings_time_out() {
        let mut s = sensors(0.0, 1013.0);
        let clock = TestClock::ticking(5);

        assert_eq!(
            s.read_valid(PressureMode::Differential, &clock),
            Err(SensorError::Timeout {
                waited_ms: READ_TIMEOUT_MS
            })
        );
        assert!(s.mouthpiece_health().degraded);
        assert!(!s.ambient_health().degraded);

        // the next good reading clears the flag
        s.mouthpiece.hpa = 1013.0;
        assert!(s.read_valid(PressureMode::Differential, &clock).is_ok());
        assert!(s.mouthpiece_health().is_ok());
    }

    #[test]
    fn stalled_clock_still_gives_up() {
        let mut s = sensors(-1.0, 1013.0);
        let clock = TestClock::at(7);
        assert_eq!(
            s.read_valid(PressureMode::Differential, &clock),
            Err(SensorError::Timeout { waited_ms: 0 })
        );
        assert!(s.mouthpiece_health().degraded);
    }

    #[test]
    fn failed_read_keeps_stale_sample() {
        let mut s = sensors(1013.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();
        p.update(&mut s, &clock);
        let before = p.sample();

        s.ambient.failing = true;
        p.update(&mut s, &clock);
        assert_eq!(p.sample(), before);
        assert!(s.ambient_health().degraded);
    }

    #[test]
    fn failed_zero_keeps_offset() {
        let mut s = sensors(1015.0, 1013.0);
        let clock = TestClock::at(0);
        let mut p = Pressure::new(0);
        p.zero(&mut s, &clock).unwrap();

        s.mouthpiece.failing = true;
        assert_eq!(p.zero(&mut s, &clock), Err(SensorError::Driver));
        assert_eq!(p.offset(), 2.0);
    }

    #[test]
    fn absent_sensor_is_reported() {
        let mut s = PressureSensors::new(
            FakeSensor::reading(1013.0),
            FakeSensor {
                hpa: 1013.0,
                present: false,
                failing: false,
            },
        );
        let clock = TestClock::at(0);

        assert_eq!(
            s.read_valid(PressureMode::Differential, &clock),
            Err(SensorError::NotPresent)
        );
        assert!(!s.ambient_health().present);

        // absolute mode doesn't need the ambient sensor
        assert_eq!(
            s.read_valid(PressureMode::Absolute, &clock),
            Ok((1013.0, None))
        );
    }

    #[test]
    fn thresholds_must_be_positive() {
        let mut p = Pressure::new(0);
        assert_eq!(
            p.set_sip_threshold(0.0),
            Err(ConfigError::ThresholdNotPositive(0.0))
        );
        assert!(p.set_puff_threshold(f32::NAN).is_err());
        assert!(p.set_puff_threshold(2.5).is_ok());
        assert_eq!(p.puff_threshold(), 2.5);
        assert_eq!(p.sip_threshold(), DEFAULT_THRESHOLD_HPA);
    }

    #[test]
    fn sap_codes_round_trip() {
        for state in [SapState::None, SapState::Sip, SapState::Puff] {
            assert_eq!(SapState::from_code(state.code()), Some(state));
        }
        assert_eq!(SapState::from_code(3), None);
    }
}
