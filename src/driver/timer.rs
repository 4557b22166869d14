/// Nanoseconds per tick of the system timer.
pub const NS_PER_TICK: u64 = 135;

/// A reading of the free-running 32-bit timer.
///
/// The counter wraps at `u32::MAX` and keeps counting, so differences are
/// taken modulo 2^32. Spans longer than one full wrap (about 579.8 s) are
/// not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instant(u32);

impl Instant {
    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    pub const fn ticks_since(self, earlier: Instant) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub const fn ns_since(self, earlier: Instant) -> u64 {
        self.ticks_since(earlier) as u64 * NS_PER_TICK
    }
}

/// Converts a duration to timer ticks, rounding up and saturating at one wrap.
pub const fn ticks_from_ns(ns: u64) -> u32 {
    let ticks = ns / NS_PER_TICK + (ns % NS_PER_TICK != 0) as u64;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

pub trait Timer {
    fn now(&self) -> Instant;

    /// Busy-waits for `ticks` timer ticks.
    fn delay_ticks(&self, ticks: u32) {
        let start = self.now();
        while self.now().ticks_since(start) < ticks {}
    }

    fn delay_ns(&self, ns: u64) {
        self.delay_ticks(ticks_from_ns(ns));
    }
}
