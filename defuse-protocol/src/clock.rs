//! Time sources for the main context.

/// Millisecond clock plus a hook for idling in poll loops
pub trait Clock {
    /// Milliseconds since an arbitrary start
    fn now_millis(&self) -> u64;

    /// Called once per iteration of a cooperative poll loop
    fn idle(&self) {}
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }

    fn idle(&self) {
        (**self).idle()
    }
}

/// Clock that advances a fixed step on every idle, for tests and simulations
#[derive(Debug, Default)]
pub struct StepClock {
    now: core::cell::Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step_millis: u64) -> Self {
        StepClock {
            now: core::cell::Cell::new(0),
            step: step_millis,
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }
}

impl Clock for StepClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }

    fn idle(&self) {
        self.advance(self.step);
    }
}

#[cfg(feature = "std")]
pub use system::SystemClock;

#[cfg(feature = "std")]
mod system {
    use super::Clock;
    use std::time::{Duration, Instant};

    /// Wall clock; idling sleeps briefly to avoid busy-waiting
    #[derive(Debug, Clone)]
    pub struct SystemClock {
        start: Instant,
        idle: Duration,
    }

    impl SystemClock {
        pub fn new() -> Self {
            SystemClock {
                start: Instant::now(),
                idle: Duration::from_millis(1),
            }
        }
    }

    impl Default for SystemClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for SystemClock {
        fn now_millis(&self) -> u64 {
            self.start.elapsed().as_millis() as u64
        }

        fn idle(&self) {
            std::thread::sleep(self.idle);
        }
    }
}
