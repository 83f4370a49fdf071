//! # Cooperative timer scheduler
//!
//! A fixed table of software timers standing in for an RTOS. The main loop calls `run` once per iteration, and every
//! timer whose delay has elapsed fires its callback synchronously from inside that call.
//!
//! Timers come in a few shapes:
//!
//! - intervals repeat forever, optionally waiting a different start offset before the first firing
//! - timeouts fire once and free their slot
//! - finite timers fire a fixed number of times and then free their slot
//! - stopwatches never fire, they only remember when they were started so the elapsed time can be read back
//!
//! Time is a wrapping millisecond counter supplied by the caller, so the scheduler keeps working across counter
//! rollover.
//!
//! Callbacks receive a caller-owned context passed to `run`. The scheduler itself is mutably borrowed for the whole of
//! `run`, so a callback can never re-enter it. Callbacks must not block, every other timer waits for them.

use heapless::Vec;

use crate::error::TimerError;

/// The default number of slots in a timer table
pub const MAX_TIMERS: usize = 10;

/// A run count meaning "repeat until deleted"
pub const RUN_FOREVER: u32 = 0;

/// A run count meaning "fire once and free the slot"
pub const RUN_ONCE: u32 = 1;

/// A handle to one slot of a timer table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(usize);

impl TimerId {
    /// `id.index()` is the slot index the handle refers to
    pub fn index(self) -> usize {
        self.0
    }
}

/// A timer callback is represented here
///
/// Either a plain function of the context, or a function of the context plus a parameter stored alongside the timer.
pub enum Callback<C, P> {
    Plain(fn(&mut C)),
    WithParam(fn(&mut C, P), P),
}

impl<C, P: Copy> Clone for Callback<C, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, P: Copy> Copy for Callback<C, P> {}

impl<C, P: Copy> Callback<C, P> {
    fn invoke(self, ctx: &mut C) {
        match self {
            Callback::Plain(f) => f(ctx),
            Callback::WithParam(f, param) => f(ctx, param),
        }
    }
}

enum Occupant<C, P> {
    Free,
    Stopwatch,
    Callback(Callback<C, P>),
}

impl<C, P: Copy> Clone for Occupant<C, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, P: Copy> Copy for Occupant<C, P> {}

/// What `run` should do with a slot once its delay has elapsed
#[derive(Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Run,
    RunAndFree,
}

struct Slot<C, P> {
    occupant: Occupant<C, P>,

    // reference time of the previous firing, or of registration/restart
    last_fire_ms: u32,

    period_ms: u32,

    // RUN_FOREVER or the number of firings before the slot is freed
    max_runs: u32,

    runs: u32,

    enabled: bool,

    // delay before the first firing, used instead of the period while no run has happened yet
    start_offset_ms: u32,
    offset_enabled: bool,
}

impl<C, P: Copy> Slot<C, P> {
    fn free(now_ms: u32) -> Self {
        Self {
            occupant: Occupant::Free,
            last_fire_ms: now_ms,
            period_ms: 0,
            max_runs: 0,
            runs: 0,
            enabled: false,
            start_offset_ms: 0,
            offset_enabled: false,
        }
    }

    fn is_free(&self) -> bool {
        matches!(self.occupant, Occupant::Free)
    }

    /// `slot.poll(now)` advances the slot's reference time if its delay has elapsed, and is what to do about it
    fn poll(&mut self, now_ms: u32) -> Option<Disposition> {
        if !matches!(self.occupant, Occupant::Callback(_)) {
            return None;
        }

        let delay_ms = if self.runs == 0 && self.offset_enabled {
            self.start_offset_ms
        } else {
            self.period_ms
        };

        if now_ms.wrapping_sub(self.last_fire_ms) < delay_ms {
            return None;
        }

        // step by the delay rather than jumping to now, a late loop catches up one firing per run
        self.last_fire_ms = self.last_fire_ms.wrapping_add(delay_ms);

        if !self.enabled {
            return None;
        }

        if self.max_runs == RUN_FOREVER {
            self.runs = self.runs.saturating_add(1);
            Some(Disposition::Run)
        } else if self.runs < self.max_runs {
            self.runs += 1;
            if self.max_runs <= self.runs {
                Some(Disposition::RunAndFree)
            } else {
                Some(Disposition::Run)
            }
        } else {
            None
        }
    }
}

/// A fixed table of cooperative software timers is represented here
///
/// # Generic arguments:
///
/// * `C` - the context type handed to callbacks by `run`
///
/// * `P` - the parameter type stored with `Callback::WithParam` timers
///
/// * `N` - the number of slots in the table
pub struct Scheduler<C, P = (), const N: usize = MAX_TIMERS> {
    slots: [Slot<C, P>; N],
    num_timers: usize,
}

impl<C, P: Copy, const N: usize> Scheduler<C, P, N> {
    const TABLE_IS_NONZERO: () = assert!(0 < N, "a timer table needs at least one slot");

    /// `Scheduler::new(now)` is a new scheduler with every slot free
    pub fn new(now_ms: u32) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::TABLE_IS_NONZERO;

        Self {
            slots: core::array::from_fn(|_| Slot::free(now_ms)),
            num_timers: 0,
        }
    }

    /// `Scheduler::with_stopwatch(now)` is a new scheduler whose first slot is a stopwatch started at `now`
    ///
    /// Handy for components that own a private timer purely to measure elapsed time.
    pub fn with_stopwatch(now_ms: u32) -> (Self, TimerId) {
        let mut scheduler = Self::new(now_ms);
        scheduler.slots[0] = Self::stopwatch_slot(now_ms);
        scheduler.num_timers = 1;
        (scheduler, TimerId(0))
    }

    /// `s.run(ctx, now)` fires every due timer, must be called on every iteration of the main loop
    ///
    /// Due timers are collected first and then invoked in slot order, so the set of timers fired by one call does not
    /// depend on what the callbacks do. Slots that completed their final run are freed after their callback returns.
    pub fn run(&mut self, ctx: &mut C, now_ms: u32) {
        let mut due: Vec<(usize, Disposition), N> = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(disposition) = slot.poll(now_ms) {
                // at most one entry per slot, can't overflow
                due.push((index, disposition)).ok();
            }
        }

        for &(index, disposition) in due.iter() {
            if let Occupant::Callback(callback) = self.slots[index].occupant {
                callback.invoke(ctx);
            }

            if disposition == Disposition::RunAndFree {
                self.delete_timer(TimerId(index), now_ms);
            }
        }
    }

    /// `s.set_interval(p, o, f, now)` calls `f` every `p` milliseconds, the first call after `o` milliseconds
    pub fn set_interval(
        &mut self,
        period_ms: u32,
        start_offset_ms: u32,
        callback: Callback<C, P>,
        now_ms: u32,
    ) -> Result<TimerId, TimerError> {
        self.setup(
            period_ms,
            start_offset_ms,
            true,
            RUN_FOREVER,
            callback,
            now_ms,
        )
    }

    /// `s.set_timeout(d, f, now)` calls `f` once after `d` milliseconds and then frees the slot
    pub fn set_timeout(
        &mut self,
        delay_ms: u32,
        callback: Callback<C, P>,
        now_ms: u32,
    ) -> Result<TimerId, TimerError> {
        self.setup(delay_ms, 0, false, RUN_ONCE, callback, now_ms)
    }

    /// `s.set_timer(p, o, n, f, now)` calls `f` every `p` milliseconds for `n` times, the first call after `o`
    ///
    /// A run count of `RUN_FOREVER` makes this an interval.
    pub fn set_timer(
        &mut self,
        period_ms: u32,
        start_offset_ms: u32,
        runs: u32,
        callback: Callback<C, P>,
        now_ms: u32,
    ) -> Result<TimerId, TimerError> {
        self.setup(period_ms, start_offset_ms, true, runs, callback, now_ms)
    }

    /// `s.start_timer(now)` registers a stopwatch started at `now`
    ///
    /// Stopwatches never fire. Read them with `elapsed_time` and reset them with `restart_timer`.
    pub fn start_timer(&mut self, now_ms: u32) -> Result<TimerId, TimerError> {
        let index = self.first_free_slot()?;
        self.slots[index] = Self::stopwatch_slot(now_ms);
        self.num_timers += 1;
        Ok(TimerId(index))
    }

    /// `s.elapsed_time(id, now)` is the time since the timer was registered, restarted, or last fired
    ///
    /// Unknown ids read as zero.
    pub fn elapsed_time(&self, id: TimerId, now_ms: u32) -> u32 {
        self.slots
            .get(id.0)
            .map_or(0, |slot| now_ms.wrapping_sub(slot.last_fire_ms))
    }

    /// `s.delete_timer(id, now)` frees the slot, deleting a free slot does nothing
    pub fn delete_timer(&mut self, id: TimerId, now_ms: u32) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if !slot.is_free() {
                *slot = Slot::free(now_ms);
                self.num_timers -= 1;
            }
        }
    }

    /// `s.restart_timer(id, now)` makes `now` the reference time and forgets the runs so far
    pub fn restart_timer(&mut self, id: TimerId, now_ms: u32) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.last_fire_ms = now_ms;
            slot.runs = 0;
        }
    }

    /// `s.is_enabled(id)` is true iff the timer is allowed to fire
    pub fn is_enabled(&self, id: TimerId) -> bool {
        self.slots.get(id.0).map_or(false, |slot| slot.enabled)
    }

    /// `s.enable(id)` allows the timer to fire
    pub fn enable(&mut self, id: TimerId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.enabled = true;
        }
    }

    /// `s.disable(id)` stops the timer from firing without freeing its slot
    ///
    /// The reference time keeps advancing while disabled, so re-enabling does not cause a burst of catch-up firings.
    pub fn disable(&mut self, id: TimerId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.enabled = false;
        }
    }

    /// `s.toggle(id)` flips whether the timer is allowed to fire
    pub fn toggle(&mut self, id: TimerId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.enabled = !slot.enabled;
        }
    }

    /// `s.num_timers()` is the number of occupied slots
    pub fn num_timers(&self) -> usize {
        self.num_timers
    }

    /// `s.num_available_timers()` is the number of free slots
    pub fn num_available_timers(&self) -> usize {
        N - self.num_timers
    }

    /// `s.num_runs(id)` is how many times the timer has fired since it was registered or restarted
    pub fn num_runs(&self, id: TimerId) -> u32 {
        self.slots.get(id.0).map_or(0, |slot| slot.runs)
    }

    fn setup(
        &mut self,
        period_ms: u32,
        start_offset_ms: u32,
        offset_enabled: bool,
        max_runs: u32,
        callback: Callback<C, P>,
        now_ms: u32,
    ) -> Result<TimerId, TimerError> {
        let index = self.first_free_slot()?;

        self.slots[index] = Slot {
            occupant: Occupant::Callback(callback),
            last_fire_ms: now_ms,
            period_ms,
            max_runs,
            runs: 0,
            enabled: true,
            start_offset_ms,
            offset_enabled,
        };
        self.num_timers += 1;

        Ok(TimerId(index))
    }

    fn first_free_slot(&self) -> Result<usize, TimerError> {
        self.slots.iter().position(Slot::is_free).ok_or_else(|| {
            log::warn!("timer table full, all {} slots in use", N);
            TimerError::TableFull { capacity: N }
        })
    }

    fn stopwatch_slot(now_ms: u32) -> Slot<C, P> {
        Slot {
            occupant: Occupant::Stopwatch,
            last_fire_ms: now_ms,
            period_ms: 0,
            max_runs: RUN_ONCE,
            runs: 0,
            enabled: true,
            start_offset_ms: 0,
            offset_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// records which callbacks ran, in order
    #[derive(Default)]
    struct CallLog {
        calls: Vec<u8, 32>,
    }

    fn plain(log: &mut CallLog) {
        log.calls.push(0).ok();
    }

    fn tagged(log: &mut CallLog, tag: u8) {
        log.calls.push(tag).ok();
    }

    fn test_scheduler() -> Scheduler<CallLog, u8> {
        Scheduler::new(0)
    }

    #[test]
    fn interval_waits_for_offset_then_period() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        s.set_interval(20, 5, Callback::Plain(plain), 0).unwrap();

        s.run(&mut log, 4);
        assert!(log.calls.is_empty());

        s.run(&mut log, 5);
        assert_eq!(log.calls.len(), 1);

        // the offset only applies to the first firing
        s.run(&mut log, 24);
        assert_eq!(log.calls.len(), 1);
        s.run(&mut log, 25);
        assert_eq!(log.calls.len(), 2);
        s.run(&mut log, 45);
        assert_eq!(log.calls.len(), 3);
    }

    #[test]
    fn timeout_fires_once_and_frees_slot() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        s.set_timeout(100, Callback::Plain(plain), 0).unwrap();
        assert_eq!(s.num_timers(), 1);

        s.run(&mut log, 99);
        assert!(log.calls.is_empty());

        s.run(&mut log, 100);
        assert_eq!(log.calls.len(), 1);
        assert_eq!(s.num_timers(), 0);

        s.run(&mut log, 200);
        s.run(&mut log, 300);
        assert_eq!(log.calls.len(), 1);
    }

    #[test]
    fn finite_timer_fires_n_times() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        let id = s
            .set_timer(10, 0, 3, Callback::WithParam(tagged, 7), 0)
            .unwrap();

        // zero offset fires right away
        s.run(&mut log, 0);
        assert_eq!(s.num_runs(id), 1);
        s.run(&mut log, 10);
        s.run(&mut log, 20);
        s.run(&mut log, 30);
        s.run(&mut log, 40);

        assert_eq!(log.calls.as_slice(), &[7, 7, 7]);
        assert_eq!(s.num_timers(), 0);
    }

    #[test]
    fn full_table_rejects_registration() {
        let mut s = test_scheduler();
        for _ in 0..MAX_TIMERS {
            assert!(s.set_interval(10, 0, Callback::Plain(plain), 0).is_ok());
        }
        assert_eq!(s.num_available_timers(), 0);
        assert_eq!(
            s.set_timeout(10, Callback::Plain(plain), 0),
            Err(TimerError::TableFull {
                capacity: MAX_TIMERS
            })
        );
        assert_eq!(
            s.start_timer(0),
            Err(TimerError::TableFull {
                capacity: MAX_TIMERS
            })
        );
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut s = test_scheduler();
        let first = s.set_interval(10, 0, Callback::Plain(plain), 0).unwrap();
        let _second = s.set_interval(10, 0, Callback::Plain(plain), 0).unwrap();
        s.delete_timer(first, 0);

        let third = s.set_interval(10, 0, Callback::Plain(plain), 0).unwrap();
        assert_eq!(third, first);
        assert_eq!(s.num_timers(), 2);
    }

    #[test]
    fn deleting_twice_only_frees_once() {
        let mut s = test_scheduler();
        let id = s.start_timer(0).unwrap();
        s.delete_timer(id, 0);
        s.delete_timer(id, 0);
        assert_eq!(s.num_timers(), 0);
    }

    #[test]
    fn stopwatch_measures_and_restarts() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        let id = s.start_timer(1_000).unwrap();

        s.run(&mut log, 1_250);
        assert_eq!(s.elapsed_time(id, 1_250), 250);
        // reading has no side effects
        assert_eq!(s.elapsed_time(id, 1_250), 250);

        s.restart_timer(id, 1_300);
        assert_eq!(s.elapsed_time(id, 1_400), 100);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn stopwatch_slot_is_not_handed_out_again() {
        let mut s = test_scheduler();
        let watch = s.start_timer(0).unwrap();
        let timer = s.set_interval(10, 0, Callback::Plain(plain), 0).unwrap();
        assert_ne!(watch, timer);
        assert_eq!(s.num_timers(), 2);
    }

    #[test]
    fn with_stopwatch_starts_measuring() {
        let (s, id) = Scheduler::<(), (), 1>::with_stopwatch(50);
        assert_eq!(s.num_timers(), 1);
        assert_eq!(s.num_available_timers(), 0);
        assert_eq!(s.elapsed_time(id, 80), 30);
    }

    #[test]
    fn disabled_timer_keeps_slot_but_does_not_fire() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        let id = s.set_interval(10, 10, Callback::Plain(plain), 0).unwrap();

        s.disable(id);
        assert!(!s.is_enabled(id));
        s.run(&mut log, 10);
        s.run(&mut log, 20);
        assert!(log.calls.is_empty());
        assert_eq!(s.num_timers(), 1);

        s.toggle(id);
        assert!(s.is_enabled(id));
        s.run(&mut log, 30);
        assert_eq!(log.calls.len(), 1);
    }

    #[test]
    fn due_callbacks_run_in_slot_order() {
        let mut s = test_scheduler();
        let mut log = CallLog::default();
        s.set_interval(10, 10, Callback::WithParam(tagged, 3), 0)
            .unwrap();
        s.set_interval(10, 10, Callback::WithParam(tagged, 1), 0)
            .unwrap();
        s.set_interval(10, 10, Callback::Plain(plain), 0).unwrap();

        s.run(&mut log, 10);
        assert_eq!(log.calls.as_slice(), &[3, 1, 0]);
    }

    #[test]
    fn survives_clock_rollover() {
        let start = u32::MAX - 5;
        let mut s = Scheduler::<CallLog, u8>::new(start);
        let mut log = CallLog::default();
        let id = s.set_interval(10, 10, Callback::Plain(plain), start).unwrap();

        s.run(&mut log, start.wrapping_add(9));
        assert!(log.calls.is_empty());

        // wrapped past zero
        s.run(&mut log, 4);
        assert_eq!(log.calls.len(), 1);
        assert_eq!(s.elapsed_time(id, 6), 2);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut big = test_scheduler();
        // the last of six ids, past the end of a two slot scheduler
        let foreign = (0..6).map(|_| big.start_timer(0).unwrap()).last().unwrap();
        assert_eq!(foreign.index(), 5);

        let mut s = Scheduler::<CallLog, u8, 2>::new(0);
        s.enable(foreign);
        s.restart_timer(foreign, 5);
        s.delete_timer(foreign, 5);
        assert_eq!(s.elapsed_time(foreign, 10), 0);
        assert!(!s.is_enabled(foreign));
        assert_eq!(s.num_runs(foreign), 0);
    }
}
