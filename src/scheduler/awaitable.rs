//! Suspension points a routine can wait on.

use crate::error::Result;
use crate::scheduler::routine::Routine;
use crate::scheduler::Scheduler;

/// Something a routine is suspended on.
///
/// `advance` is called once per scheduler tick while the owning routine waits;
/// the routine resumes once `is_done` reports true.
pub trait Awaitable {
    fn is_done(&self) -> bool;

    fn start(&mut self, _scheduler: &Scheduler) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _scheduler: &Scheduler) {}

    fn advance(&mut self) {}

    /// Set when the awaitable is itself a routine.
    fn as_routine(&self) -> Option<&Routine> {
        None
    }
}

/// Resumes on the next tick.
#[derive(Debug, Default)]
pub struct NextTick {
    done: bool,
}

impl NextTick {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Awaitable for NextTick {
    fn is_done(&self) -> bool {
        self.done
    }

    fn start(&mut self, _scheduler: &Scheduler) -> Result<()> {
        self.done = false;
        Ok(())
    }

    fn advance(&mut self) {
        self.done = true;
    }
}

/// Resumes after a fixed number of ticks.
#[derive(Debug)]
pub struct WaitTicks {
    total: u32,
    remaining: u32,
}

impl WaitTicks {
    pub fn new(ticks: u32) -> Self {
        Self {
            total: ticks,
            remaining: ticks,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Awaitable for WaitTicks {
    fn is_done(&self) -> bool {
        self.remaining == 0
    }

    fn start(&mut self, _scheduler: &Scheduler) -> Result<()> {
        self.remaining = self.total;
        Ok(())
    }

    fn advance(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Resumes once a predicate holds.
pub struct WaitUntil {
    predicate: Box<dyn Fn() -> bool>,
}

impl WaitUntil {
    pub fn new(predicate: impl Fn() -> bool + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl std::fmt::Debug for WaitUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitUntil").finish_non_exhaustive()
    }
}

impl Awaitable for WaitUntil {
    fn is_done(&self) -> bool {
        (self.predicate)()
    }
}
