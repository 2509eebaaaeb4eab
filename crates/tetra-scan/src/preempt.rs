use std::time::{Duration, Instant};

/// Tells a running scan to hand control back to the caller.
///
/// Sampled before every opcode the scan interprets. Once it answers `true`
/// the scan returns without touching its cursor.
pub trait Preempt {
    fn should_yield(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Preempt for F {
    fn should_yield(&mut self) -> bool {
        self()
    }
}

/// Yield once a wall-clock instant has passed. One per control tick.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(when: Instant) -> Self {
        Self(when)
    }

    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }
}

impl Preempt for Deadline {
    fn should_yield(&mut self) -> bool {
        Instant::now() >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_and_deadlines() {
        let mut calls = 0;
        let mut after_two = || {
            calls += 1;
            calls > 2
        };
        assert!(!after_two.should_yield());
        assert!(!after_two.should_yield());
        assert!(after_two.should_yield());

        assert!(Deadline::at(Instant::now()).should_yield());
        assert!(!Deadline::after(Duration::from_secs(60)).should_yield());
    }
}
