//! # Ring history buffer
//!
//! A fixed capacity circular store of the most recent samples, read newest-first.
//!
//! Index `0` is always the most recently pushed element, index `k` is the element pushed `k` steps before it. Pushing
//! into a full buffer silently overwrites the oldest element. The newest element may also be amended in place without
//! creating a new history entry, which is how the input classifiers fold a held or settling input into one record.
//!
//! The capacity is a const generic and the storage is an inline array, so a history never allocates, grows, or
//! shrinks.

/// A fixed capacity, newest-first history of `Copy` samples is represented here
///
/// # Generic arguments:
///
/// * `CAPACITY` - the number of elements the history can hold, must be at least 1
#[derive(Debug, Clone)]
pub struct RingHistory<T, const CAPACITY: usize> {
    data: [T; CAPACITY],

    // slot holding the newest element
    cursor: usize,

    // number of elements pushed so far, saturates at CAPACITY
    used: usize,
}

impl<T: Copy + Default, const CAPACITY: usize> RingHistory<T, CAPACITY> {
    const CAPACITY_IS_NONZERO: () = assert!(0 < CAPACITY, "a ring history needs room for one element");

    /// `RingHistory::new()` is a new empty history
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_IS_NONZERO;

        Self {
            data: [T::default(); CAPACITY],
            cursor: 0,
            used: 0,
        }
    }

    /// `rh.reset()` forgets every element, as if the history was just created
    pub fn reset(&mut self) {
        self.data = [T::default(); CAPACITY];
        self.cursor = 0;
        self.used = 0;
    }

    /// `rh.push(v)` makes `v` the newest element, overwriting the oldest element if the history is full
    pub fn push(&mut self, val: T) {
        self.cursor = (self.cursor + 1) % CAPACITY;
        self.data[self.cursor] = val;
        self.used = (self.used + 1).min(CAPACITY);
    }

    /// `rh.update_last(v)` replaces the newest element with `v` without advancing the history
    ///
    /// The length does not change, even for an empty history.
    pub fn update_last(&mut self, val: T) {
        self.data[self.cursor] = val;
    }

    /// `rh.get(k)` is the element pushed `k` steps before the newest one
    ///
    /// # Arguments
    ///
    /// * `k` - the depth into the history, must be less than `CAPACITY`. Reading deeper than `len()` yields
    /// whatever the slot holds, the default value if it was never written.
    pub fn get(&self, k: usize) -> T {
        debug_assert!(k < CAPACITY, "ring history read past its capacity");
        let k = k % CAPACITY;
        self.data[(self.cursor + CAPACITY - k) % CAPACITY]
    }

    /// `rh.last()` is the newest element
    pub fn last(&self) -> T {
        self.data[self.cursor]
    }

    /// `rh.len()` is the number of elements pushed so far, at most `CAPACITY`
    pub fn len(&self) -> usize {
        self.used
    }

    /// `rh.is_empty()` is true iff nothing has been pushed yet
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// `rh.capacity()` is the maximum number of elements the history holds
    pub fn capacity(&self) -> usize {
        CAPACITY
    }
}

impl<T: Copy + Default, const CAPACITY: usize> Default for RingHistory<T, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
