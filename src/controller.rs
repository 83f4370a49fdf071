//! # Controller main loop
//!
//! Owns the peripherals and every processing component, and polls each component at its own period from a shared
//! cooperative scheduler. The board's main loop only has to call `tick` and forward the returned `Snapshot` to the
//! HID, display and feedback layers.
//!
//! Each poll is a complete read, process, store cycle on one component, so a snapshot never contains a half updated
//! value. Sensor failures never stop the loop, they show up as health flags in the snapshot's `Status`.
//!
//! ## Safe mode
//!
//! The controller starts in safe mode when the previous boot ended in a watchdog reset or when a required sensor is
//! missing or failing. In safe mode every subsystem except the joystick keeps running, so the menu stays usable, and
//! the joystick output is held at zero. A restart is the only way out of a safe mode entered at startup. A settings
//! document with `OperatingMode::Safe` also puts the controller in safe mode, applying other settings leaves it.

use crate::classifier::{Classification, InputClassifier, DEFAULT_REACTION_TIME_MS};
use crate::error::{ConfigError, Error, SensorError};
use crate::joystick::{Direction, Joystick, Quadrant};
use crate::point::{PointF, PointI};
use crate::pressure::{Pressure, PressureSample, PressureSensors};
use crate::sensor::{Clock, MagneticSensor, PressureSensor, SensorHealth, SwitchBank};
use crate::settings::{OperatingMode, Settings};
use crate::timer::{Callback, Scheduler};

/// The concrete driver types of a board
pub trait Board {
    type Clock: Clock;
    type Magnet: MagneticSensor;
    type Mouthpiece: PressureSensor;
    type Ambient: PressureSensor;
    type Buttons: SwitchBank;
    type Switches: SwitchBank;
}

/// The drivers handed to the controller at startup
pub struct Peripherals<B: Board> {
    pub clock: B::Clock,
    pub magnet: B::Magnet,
    pub mouthpiece: B::Mouthpiece,
    pub ambient: B::Ambient,
    pub buttons: B::Buttons,
    pub switches: B::Switches,
}

/// The components polled by the controller's timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subsystem {
    Joystick,
    Pressure,
    Buttons,
    Switches,
}

impl Subsystem {
    /// `s.poll_period_ms()` is how often the subsystem is polled
    pub fn poll_period_ms(self) -> u32 {
        match self {
            Subsystem::Joystick => JOYSTICK_POLL_MS,
            Subsystem::Pressure => PRESSURE_POLL_MS,
            Subsystem::Buttons => BUTTONS_POLL_MS,
            Subsystem::Switches => SWITCHES_POLL_MS,
        }
    }

    const ALL: [Subsystem; POLL_TIMERS] = [
        Subsystem::Joystick,
        Subsystem::Pressure,
        Subsystem::Buttons,
        Subsystem::Switches,
    ];
}

/// Why the controller started in safe mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafeModeReason {
    /// The previous boot ended in a watchdog reset
    Watchdog = 1,

    /// A required input sensor was not found
    Input = 2,

    /// A sensor was found but failed while the controller was starting
    Hardware = 3,
}

/// The health of the controller's sensors and the mode it runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub magnet: SensorHealth,
    pub mouthpiece: SensorHealth,
    pub ambient: SensorHealth,

    /// The detected magnet orientation, `Direction::Fault` means the joystick is disabled
    pub magnet_direction: Direction,

    pub operating_mode: OperatingMode,

    /// Set iff the controller started in safe mode
    pub safe_mode_reason: Option<SafeModeReason>,
}

/// The latest committed result of every subsystem
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    /// The joystick output vector
    pub joystick: PointI,

    /// The joystick input before deadzones and scaling
    pub joystick_input: PointI,

    pub buttons: Classification,
    pub switches: Classification,
    pub sip_puff: Classification,

    pub pressure: PressureSample,

    pub status: Status,
}

/// Everything the poll timers work on
pub struct Subsystems<B: Board> {
    clock: B::Clock,

    magnet: B::Magnet,
    magnet_health: SensorHealth,
    pressure_sensors: PressureSensors<B::Mouthpiece, B::Ambient>,
    buttons: B::Buttons,
    switches: B::Switches,

    joystick: Joystick,
    pressure: Pressure,
    button_classifier: InputClassifier<INPUT_BUFFER_SIZE>,
    switch_classifier: InputClassifier<INPUT_BUFFER_SIZE>,

    safe_mode: bool,
}

fn poll<B: Board>(s: &mut Subsystems<B>, subsystem: Subsystem) {
    match subsystem {
        Subsystem::Joystick => {
            if s.safe_mode || !s.magnet_health.present {
                return;
            }

            match s.joystick.poll(&mut s.magnet) {
                Ok(_) => s.magnet_health.degraded = false,
                Err(e) => {
                    log::warn!("magnetometer read failed: {:?}", e);
                    s.magnet_health.degraded = true;
                    s.joystick.zero_output();
                }
            }
        }
        Subsystem::Pressure => {
            s.pressure.update(&mut s.pressure_sensors, &s.clock);
        }
        Subsystem::Buttons => {
            let now_ms = s.clock.now_ms();
            s.button_classifier.update(s.buttons.code(), now_ms);
        }
        Subsystem::Switches => {
            let now_ms = s.clock.now_ms();
            s.switch_classifier.update(s.switches.code(), now_ms);
        }
    }
}

/// A complete assistive input controller is represented here
pub struct Controller<B: Board> {
    scheduler: Scheduler<Subsystems<B>, Subsystem, POLL_TIMERS>,
    subsystems: Subsystems<B>,

    /// Settings the components do not hold themselves, see `Settings::capture`
    settings: Settings,

    safe_mode_reason: Option<SafeModeReason>,
}

impl<B: Board> Controller<B> {
    /// `Controller::new(p, s, w)` is a new controller driving peripherals `p` with settings `s`
    ///
    /// Applies the settings, detects the magnet orientation, zeroes the pressure sensors, and registers the poll
    /// timers. Missing or failing sensors are logged and reported through `Status`, they don't stop the controller
    /// from starting but put it in safe mode.
    ///
    /// # Arguments:
    ///
    /// * `peripherals` - the board's drivers
    ///
    /// * `settings` - the settings loaded from storage
    ///
    /// * `watchdog_reset` - true iff the previous boot ended in a watchdog reset, starts the controller in safe mode
    pub fn new(
        peripherals: Peripherals<B>,
        settings: Settings,
        watchdog_reset: bool,
    ) -> Result<Self, Error> {
        let Peripherals {
            clock,
            mut magnet,
            mouthpiece,
            ambient,
            buttons,
            switches,
        } = peripherals;

        let now_ms = clock.now_ms();

        let mut joystick = Joystick::new();
        let mut pressure = Pressure::new(now_ms);
        settings.apply(&mut joystick, &mut pressure)?;

        let mut safe_mode_reason = watchdog_reset.then_some(SafeModeReason::Watchdog);

        let mut magnet_health = SensorHealth {
            present: magnet.is_present(),
            degraded: false,
        };
        if magnet_health.present {
            if let Err(e) = joystick.probe_z_direction(&mut magnet) {
                log::warn!("magnet orientation probe failed: {:?}", e);
                magnet_health.degraded = true;
                safe_mode_reason = safe_mode_reason.or(Some(SafeModeReason::Hardware));
            }
        } else {
            log::warn!("magnetometer not present");
            safe_mode_reason = safe_mode_reason.or(Some(SafeModeReason::Input));
        }

        let mut pressure_sensors = PressureSensors::new(mouthpiece, ambient);
        if let Err(e) = pressure.zero(&mut pressure_sensors, &clock) {
            log::warn!("pressure zeroing failed: {}", e);
            let reason = match e {
                SensorError::NotPresent => SafeModeReason::Input,
                SensorError::Driver | SensorError::Timeout { .. } => SafeModeReason::Hardware,
            };
            safe_mode_reason = safe_mode_reason.or(Some(reason));
        }

        let mut scheduler: Scheduler<Subsystems<B>, Subsystem, POLL_TIMERS> =
            Scheduler::new(now_ms);
        for subsystem in Subsystem::ALL {
            scheduler.set_interval(
                subsystem.poll_period_ms(),
                0,
                Callback::WithParam(poll::<B>, subsystem),
                now_ms,
            )?;
        }

        match safe_mode_reason {
            Some(reason) => log::warn!("controller ready in safe mode ({:?})", reason),
            None => log::info!("controller ready"),
        }

        let safe_mode = safe_mode_reason.is_some() || settings.operating_mode == OperatingMode::Safe;

        Ok(Self {
            scheduler,
            subsystems: Subsystems {
                clock,
                magnet,
                magnet_health,
                pressure_sensors,
                buttons,
                switches,
                joystick,
                pressure,
                button_classifier: InputClassifier::new(DEFAULT_REACTION_TIME_MS, now_ms),
                switch_classifier: InputClassifier::new(DEFAULT_REACTION_TIME_MS, now_ms),
                safe_mode,
            },
            settings,
            safe_mode_reason,
        })
    }

    /// `c.tick()` polls every subsystem that is due and is the latest result of each
    ///
    /// Must be called on every iteration of the board's main loop.
    pub fn tick(&mut self) -> Snapshot {
        let now_ms = self.subsystems.clock.now_ms();
        self.scheduler.run(&mut self.subsystems, now_ms);
        self.snapshot()
    }

    /// `c.snapshot()` is the latest result of each subsystem, without polling anything
    pub fn snapshot(&self) -> Snapshot {
        let s = &self.subsystems;
        let joystick = if s.safe_mode {
            PointI::ZERO
        } else {
            s.joystick.output()
        };

        Snapshot {
            joystick,
            joystick_input: s.joystick.input(),
            buttons: s.button_classifier.state(),
            switches: s.switch_classifier.state(),
            sip_puff: s.pressure.state(),
            pressure: s.pressure.sample(),
            status: self.status(),
        }
    }

    /// `c.status()` is the health of the sensors
    pub fn status(&self) -> Status {
        let s = &self.subsystems;

        Status {
            magnet: s.magnet_health,
            mouthpiece: s.pressure_sensors.mouthpiece_health(),
            ambient: s.pressure_sensors.ambient_health(),
            magnet_direction: s.joystick.z_direction(),
            operating_mode: self.operating_mode(),
            safe_mode_reason: self.safe_mode_reason,
        }
    }

    /// `c.operating_mode()` is the mode the controller runs in, `OperatingMode::Safe` overrides the settings
    pub fn operating_mode(&self) -> OperatingMode {
        if self.subsystems.safe_mode {
            OperatingMode::Safe
        } else {
            self.settings.operating_mode
        }
    }

    /// `c.sample_center()` records one joystick center sample, the stick must be at rest
    pub fn sample_center(&mut self) -> Result<(), SensorError> {
        let s = &mut self.subsystems;
        s.joystick
            .sample_center(&mut s.magnet)
            .map_err(|e| magnet_error(&mut s.magnet_health, e))
    }

    /// `c.finish_center_calibration()` makes the average of the recorded center samples the joystick center, and is
    /// that center
    pub fn finish_center_calibration(&mut self) -> PointF {
        self.subsystems.joystick.evaluate_center()
    }

    /// `c.capture_corner(q)` reads the joystick and keeps the reading as the corner of `q` if it is the farthest yet
    pub fn capture_corner(&mut self, quadrant: Quadrant) -> Result<PointF, SensorError> {
        let s = &mut self.subsystems;
        s.joystick
            .capture_corner_from(quadrant, &mut s.magnet)
            .map_err(|e| magnet_error(&mut s.magnet_health, e))
    }

    /// `c.rezero_pressure()` measures the pressure reference and offset again, the mouthpiece must be at rest
    pub fn rezero_pressure(&mut self) -> Result<f32, SensorError> {
        let s = &mut self.subsystems;
        s.pressure.zero(&mut s.pressure_sensors, &s.clock)
    }

    /// `c.settings()` is the current settings, ready to be persisted
    pub fn settings(&self) -> Settings {
        self.settings
            .capture(&self.subsystems.joystick, &self.subsystems.pressure)
    }

    /// `c.apply_settings(s)` validates and applies new settings
    ///
    /// The pressure sensors are zeroed again if the pressure mode changed.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        let s = &mut self.subsystems;
        let previous_mode = s.pressure.mode();

        settings.apply(&mut s.joystick, &mut s.pressure)?;
        self.settings = settings;
        s.safe_mode =
            self.safe_mode_reason.is_some() || settings.operating_mode == OperatingMode::Safe;

        if s.pressure.mode() != previous_mode {
            if let Err(e) = s.pressure.zero(&mut s.pressure_sensors, &s.clock) {
                log::warn!("pressure zeroing failed: {}", e);
            }
        }

        Ok(())
    }

    /// `c.set_reaction_time(sub, r)` sets the debounce window of the classifier fed by `sub` to `r` milliseconds
    ///
    /// The joystick has no classifier, setting its reaction time does nothing.
    pub fn set_reaction_time(&mut self, subsystem: Subsystem, reaction_time_ms: u32) {
        let s = &mut self.subsystems;
        match subsystem {
            Subsystem::Joystick => log::warn!("the joystick has no reaction time"),
            Subsystem::Pressure => s.pressure.set_reaction_time(reaction_time_ms),
            Subsystem::Buttons => s.button_classifier.set_reaction_time(reaction_time_ms),
            Subsystem::Switches => s.switch_classifier.set_reaction_time(reaction_time_ms),
        }
    }

    /// `c.reaction_time(sub)` is the debounce window of the classifier fed by `sub`, if it has one
    pub fn reaction_time(&self, subsystem: Subsystem) -> Option<u32> {
        let s = &self.subsystems;
        match subsystem {
            Subsystem::Joystick => None,
            Subsystem::Pressure => Some(s.pressure.classifier().reaction_time()),
            Subsystem::Buttons => Some(s.button_classifier.reaction_time()),
            Subsystem::Switches => Some(s.switch_classifier.reaction_time()),
        }
    }

    pub fn joystick(&self) -> &Joystick {
        &self.subsystems.joystick
    }

    pub fn pressure(&self) -> &Pressure {
        &self.subsystems.pressure
    }

    pub fn buttons(&self) -> &InputClassifier<INPUT_BUFFER_SIZE> {
        &self.subsystems.button_classifier
    }

    pub fn switches(&self) -> &InputClassifier<INPUT_BUFFER_SIZE> {
        &self.subsystems.switch_classifier
    }
}

fn magnet_error<E: core::fmt::Debug>(health: &mut SensorHealth, e: E) -> SensorError {
    log::warn!("magnetometer read failed: {:?}", e);
    health.degraded = true;
    if health.present {
        SensorError::Driver
    } else {
        SensorError::NotPresent
    }
}

/// Number of poll timers, one per subsystem
pub const POLL_TIMERS: usize = 4;

/// Depth of the button and switch record histories
pub const INPUT_BUFFER_SIZE: usize = 5;

pub const JOYSTICK_POLL_MS: u32 = 20;
pub const PRESSURE_POLL_MS: u32 = 50;
pub const BUTTONS_POLL_MS: u32 = 20;
pub const SWITCHES_POLL_MS: u32 = 20;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Phase;
    use crate::pressure::{PressureMode, SapState};
    use crate::sensor::FieldSample;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct TestClock(Rc<Cell<u32>>);

    impl Clock for TestClock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    struct TestMagnet {
        field: Rc<Cell<FieldSample>>,
        failing: Rc<Cell<bool>>,
        present: bool,
    }

    impl MagneticSensor for TestMagnet {
        type Error = &'static str;

        fn is_present(&self) -> bool {
            self.present
        }

        fn read_field(&mut self) -> Result<FieldSample, &'static str> {
            if !self.present {
                Err("no device")
            } else if self.failing.get() {
                Err("bus error")
            } else {
                Ok(self.field.get())
            }
        }
    }

    struct TestBarometer(Rc<Cell<f32>>);

    impl PressureSensor for TestBarometer {
        type Error = ();

        fn is_present(&self) -> bool {
            true
        }

        fn read_hpa(&mut self) -> Result<f32, ()> {
            Ok(self.0.get())
        }
    }

    struct TestBank<const N: usize>(Rc<Cell<[bool; N]>>);

    impl<const N: usize> SwitchBank for TestBank<N> {
        fn input_count(&self) -> usize {
            N
        }

        fn is_active(&self, index: usize) -> bool {
            self.0.get()[index]
        }
    }

    struct TestBoard;

    impl Board for TestBoard {
        type Clock = TestClock;
        type Magnet = TestMagnet;
        type Mouthpiece = TestBarometer;
        type Ambient = TestBarometer;
        type Buttons = TestBank<3>;
        type Switches = TestBank<2>;
    }

    /// handles the test keeps to drive the fake hardware
    struct Rig {
        now: Rc<Cell<u32>>,
        field: Rc<Cell<FieldSample>>,
        magnet_failing: Rc<Cell<bool>>,
        mouthpiece: Rc<Cell<f32>>,
        buttons: Rc<Cell<[bool; 3]>>,
        switches: Rc<Cell<[bool; 2]>>,
    }

    impl Rig {
        fn at(&self, now_ms: u32) {
            self.now.set(now_ms);
        }
    }

    const AT_REST: FieldSample = FieldSample {
        x: 0.0,
        y: 0.0,
        z: 20.0,
    };

    // planar reading (-20, 0), full deflection along the stick's x axis
    const DEFLECTED: FieldSample = FieldSample {
        x: 0.0,
        y: -20.0,
        z: 20.0,
    };

    fn is_idle(c: Classification) -> bool {
        c.main_state == 0 && c.phase == Phase::Waiting
    }

    fn rig(magnet_present: bool) -> (Rig, Peripherals<TestBoard>) {
        let rig = Rig {
            now: Rc::new(Cell::new(0)),
            field: Rc::new(Cell::new(AT_REST)),
            magnet_failing: Rc::new(Cell::new(false)),
            mouthpiece: Rc::new(Cell::new(1013.0)),
            buttons: Rc::new(Cell::new([false; 3])),
            switches: Rc::new(Cell::new([false; 2])),
        };

        let peripherals = Peripherals {
            clock: TestClock(rig.now.clone()),
            magnet: TestMagnet {
                field: rig.field.clone(),
                failing: rig.magnet_failing.clone(),
                present: magnet_present,
            },
            mouthpiece: TestBarometer(rig.mouthpiece.clone()),
            ambient: TestBarometer(Rc::new(Cell::new(1013.0))),
            buttons: TestBank(rig.buttons.clone()),
            switches: TestBank(rig.switches.clone()),
        };

        (rig, peripherals)
    }

    fn controller() -> (Rig, Controller<TestBoard>) {
        let (rig, peripherals) = rig(true);
        let c = Controller::new(peripherals, Settings::default(), false).unwrap();
        (rig, c)
    }

    #[test]
    fn starts_idle_and_healthy() {
        let (_rig, mut c) = controller();
        let snap = c.tick();

        assert_eq!(snap.joystick, PointI::ZERO);
        assert!(is_idle(snap.buttons));
        assert!(is_idle(snap.sip_puff));
        assert!(snap.status.magnet.is_ok());
        assert!(snap.status.mouthpiece.is_ok());
        assert_eq!(snap.status.magnet_direction, Direction::Default);
        assert_eq!(snap.status.operating_mode, OperatingMode::Mouse);
        assert_eq!(snap.status.safe_mode_reason, None);
    }

    #[test]
    fn joystick_deflection_reaches_output() {
        let (rig, mut c) = controller();
        c.tick();

        // the sensor's y axis is the stick's x axis
        rig.field.set(DEFLECTED);
        rig.at(20);
        let snap = c.tick();
        assert_eq!(snap.joystick, PointI::new(6, 0));
        assert_eq!(snap.joystick_input, PointI::new(1024, 0));
    }

    #[test]
    fn subsystems_poll_at_their_own_period() {
        let (rig, mut c) = controller();

        for t in [0, 20, 40] {
            rig.at(t);
            c.tick();
        }
        assert_eq!(c.pressure().samples().len(), 1);
        assert_eq!(c.joystick().raw_history().len(), 3);

        rig.at(50);
        c.tick();
        assert_eq!(c.pressure().samples().len(), 2);
        assert_eq!(c.joystick().raw_history().len(), 3);
    }

    #[test]
    fn button_press_and_release() {
        let (rig, mut c) = controller();
        c.tick();

        rig.buttons.set([false, true, false]);
        for t in (20..=300).step_by(20) {
            rig.at(t);
            c.tick();
        }
        assert_eq!(c.snapshot().buttons.main_state, 2);
        assert_eq!(c.snapshot().buttons.phase, Phase::Started);

        rig.buttons.set([false; 3]);
        rig.at(320);
        let snap = c.tick();
        assert_eq!(
            snap.buttons,
            Classification {
                main_state: 2,
                phase: Phase::Released,
                elapsed_ms: 280,
            }
        );
        assert!(is_idle(snap.switches));
        assert_eq!(snap.switches.elapsed_ms, 320);
    }

    #[test]
    fn switches_are_classified_separately() {
        let (rig, mut c) = controller();
        c.tick();

        rig.switches.set([true, true]);
        rig.at(20);
        let snap = c.tick();
        assert_eq!(snap.switches.main_state, 3);
        assert_eq!(snap.switches.phase, Phase::Started);
        assert!(is_idle(snap.buttons));
        assert_eq!(snap.buttons.elapsed_ms, 20);
    }

    #[test]
    fn reaction_time_changes_chatter_absorption() {
        let run = |reaction_time_ms: Option<u32>| {
            let (rig, mut c) = controller();
            if let Some(r) = reaction_time_ms {
                c.set_reaction_time(Subsystem::Buttons, r);
            }
            c.tick();

            rig.buttons.set([true, false, false]);
            rig.at(20);
            c.tick();

            // a second button bounces in 20 ms later
            rig.buttons.set([true, true, false]);
            rig.at(40);
            c.tick().buttons
        };

        let absorbed = run(None);
        assert_eq!(absorbed.main_state, 3);
        assert_eq!(absorbed.phase, Phase::Started);

        let reported = run(Some(0));
        assert_eq!(reported.main_state, 1);
        assert_eq!(reported.phase, Phase::Released);
    }

    #[test]
    fn reaction_times_are_per_subsystem() {
        let (_rig, mut c) = controller();
        assert_eq!(
            c.reaction_time(Subsystem::Buttons),
            Some(DEFAULT_REACTION_TIME_MS)
        );
        assert_eq!(c.reaction_time(Subsystem::Joystick), None);

        c.set_reaction_time(Subsystem::Switches, 40);
        c.set_reaction_time(Subsystem::Pressure, 10);
        c.set_reaction_time(Subsystem::Joystick, 99);
        assert_eq!(c.reaction_time(Subsystem::Switches), Some(40));
        assert_eq!(c.reaction_time(Subsystem::Pressure), Some(10));
        assert_eq!(
            c.reaction_time(Subsystem::Buttons),
            Some(DEFAULT_REACTION_TIME_MS)
        );
        assert_eq!(c.reaction_time(Subsystem::Joystick), None);
    }

    #[test]
    fn sip_is_detected() {
        let (rig, mut c) = controller();
        c.tick();

        rig.mouthpiece.set(1009.0);
        rig.at(50);
        let snap = c.tick();
        assert_eq!(snap.sip_puff.main_state, SapState::Sip.code());
        assert_eq!(snap.sip_puff.phase, Phase::Started);
        assert!(snap.pressure.differential_hpa < -3.0);
    }

    #[test]
    fn missing_magnet_starts_safe_mode() {
        let (rig, peripherals) = rig(false);
        let mut c = Controller::new(peripherals, Settings::default(), false).unwrap();

        for t in [0, 20, 40] {
            rig.at(t);
            c.tick();
        }
        let snap = c.snapshot();
        assert!(!snap.status.magnet.present);
        assert_eq!(snap.status.operating_mode, OperatingMode::Safe);
        assert_eq!(snap.status.safe_mode_reason, Some(SafeModeReason::Input));
        assert_eq!(snap.joystick, PointI::ZERO);

        // an absent magnetometer is never polled
        assert_eq!(c.joystick().raw_history().len(), 0);
        assert!(!snap.status.magnet.degraded);

        assert_eq!(c.sample_center(), Err(SensorError::NotPresent));
    }

    #[test]
    fn watchdog_reset_starts_safe_mode() {
        let (rig, peripherals) = rig(true);
        let mut c = Controller::new(peripherals, Settings::default(), true).unwrap();

        rig.field.set(DEFLECTED);
        rig.buttons.set([true, false, false]);
        let snap = c.tick();

        assert_eq!(snap.status.operating_mode, OperatingMode::Safe);
        assert_eq!(snap.status.safe_mode_reason, Some(SafeModeReason::Watchdog));
        assert_eq!(snap.joystick, PointI::ZERO);
        assert!(snap.status.magnet.is_ok());

        // the menu still gets button input
        assert_eq!(snap.buttons.main_state, 1);
        assert_eq!(snap.buttons.phase, Phase::Started);

        // other settings can't leave a safe mode entered at startup
        let mut s = c.settings();
        s.operating_mode = OperatingMode::Mouse;
        c.apply_settings(s).unwrap();
        rig.at(20);
        assert_eq!(c.tick().joystick, PointI::ZERO);
        assert_eq!(c.operating_mode(), OperatingMode::Safe);
    }

    #[test]
    fn failed_pressure_zeroing_starts_safe_mode() {
        let (rig, peripherals) = rig(true);
        rig.mouthpiece.set(0.0);
        let c = Controller::new(peripherals, Settings::default(), false).unwrap();

        let status = c.status();
        assert_eq!(status.safe_mode_reason, Some(SafeModeReason::Hardware));
        assert!(status.mouthpiece.degraded);
    }

    #[test]
    fn safe_mode_from_settings_can_be_left() {
        let (rig, mut c) = controller();
        rig.field.set(DEFLECTED);
        assert_eq!(c.tick().joystick, PointI::new(6, 0));

        let mut s = c.settings();
        s.operating_mode = OperatingMode::Safe;
        c.apply_settings(s).unwrap();
        rig.at(20);
        let snap = c.tick();
        assert_eq!(snap.joystick, PointI::ZERO);
        assert_eq!(snap.status.operating_mode, OperatingMode::Safe);
        assert_eq!(snap.status.safe_mode_reason, None);
        assert_eq!(c.settings().operating_mode, OperatingMode::Safe);

        s.operating_mode = OperatingMode::Mouse;
        c.apply_settings(s).unwrap();
        rig.at(40);
        assert_eq!(c.tick().joystick, PointI::new(6, 0));
        assert_eq!(c.operating_mode(), OperatingMode::Mouse);
    }

    #[test]
    fn failed_magnet_read_stops_the_cursor() {
        let (rig, mut c) = controller();
        rig.field.set(DEFLECTED);
        assert_eq!(c.tick().joystick, PointI::new(6, 0));

        rig.magnet_failing.set(true);
        rig.at(20);
        let snap = c.tick();
        assert_eq!(snap.joystick, PointI::ZERO);
        assert!(snap.status.magnet.degraded);

        // recovers with the stick still deflected
        rig.magnet_failing.set(false);
        rig.at(40);
        let snap = c.tick();
        assert_eq!(snap.joystick, PointI::new(6, 0));
        assert!(snap.status.magnet.is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected_at_startup() {
        let (_rig, peripherals) = rig(true);
        let mut settings = Settings::default();
        settings.speed_level = 0;

        assert!(matches!(
            Controller::new(peripherals, settings, false),
            Err(Error::Config(ConfigError::LevelOutOfRange(0)))
        ));
    }

    #[test]
    fn calibration_through_controller() {
        let (rig, mut c) = controller();

        rig.field.set(FieldSample {
            x: -0.5,
            y: 1.0,
            z: 20.0,
        });
        for _ in 0..3 {
            c.sample_center().unwrap();
        }
        assert_eq!(c.finish_center_calibration(), PointF::new(1.0, -0.5));

        rig.field.set(FieldSample {
            x: 20.0,
            y: -20.0,
            z: 20.0,
        });
        let corner = c.capture_corner(Quadrant::One).unwrap();
        assert_eq!(corner, PointF::new(-20.0, 20.0));

        let saved = c.settings();
        assert_eq!(saved.center, [1.0, -0.5]);
        assert_eq!(saved.corner_1, [-20.0, 20.0]);
    }

    #[test]
    fn settings_round_trip_through_controller() {
        let (rig, mut c) = controller();

        let mut s = c.settings();
        s.operating_mode = OperatingMode::Gamepad;
        s.scroll_level = 9;
        c.apply_settings(s).unwrap();
        assert_eq!(c.settings(), s);

        rig.field.set(DEFLECTED);
        let snap = c.tick();
        assert_eq!(snap.joystick, PointI::new(127, 0));
    }

    #[test]
    fn pressure_mode_change_rezeroes() {
        let (rig, mut c) = controller();
        rig.mouthpiece.set(1020.0);

        let mut s = c.settings();
        s.pressure_mode = PressureMode::Absolute;
        c.apply_settings(s).unwrap();

        assert_eq!(c.pressure().ambient_reference(), 1020.0);
        assert_eq!(c.rezero_pressure(), Ok(0.0));
    }
}
