//! Cooperative single-threaded scheduler
//!
//! Routines are registered with [`Scheduler::start`] and then advanced one
//! step at a time by tick notifications from a [`TickSource`]. Nothing here
//! blocks or spawns threads: a routine only suspends at its own yield points,
//! and `stop` takes effect at the next of those.
//!
//! ```text
//! Created --start--> Running --yield--> Suspended --awaitable done--> Running
//!                       |                                               |
//!                       +------------- body exhausted / stop -----------+--> Done
//! ```

pub mod adapters;
pub mod awaitable;
pub mod routine;
pub mod tick;

pub use adapters::AwaitableAdapters;
pub use awaitable::{Awaitable, NextTick, WaitTicks, WaitUntil};
pub use routine::{Foreign, Routine, RoutineId, RoutineState, Step};
pub use tick::{ManualTickSource, TickSource};

use crate::error::{InspectError, Result};
use crate::reflect::TypeTable;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct SchedulerCore {
    routines: RefCell<Vec<Routine>>,
    ticks: Rc<dyn TickSource>,
    types: Rc<TypeTable>,
    adapters: Option<Rc<AwaitableAdapters>>,
}

/// Handle to a scheduler. Clones share the same registry.
#[derive(Clone)]
pub struct Scheduler {
    core: Rc<SchedulerCore>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.len())
            .finish()
    }
}

impl Scheduler {
    /// Scheduler using the thread-local adapter registry.
    pub fn new(ticks: Rc<dyn TickSource>, types: Rc<TypeTable>) -> Self {
        Self::build(ticks, types, None)
    }

    /// Scheduler with its own adapter registry.
    pub fn with_adapters(
        ticks: Rc<dyn TickSource>,
        types: Rc<TypeTable>,
        adapters: AwaitableAdapters,
    ) -> Self {
        Self::build(ticks, types, Some(Rc::new(adapters)))
    }

    fn build(
        ticks: Rc<dyn TickSource>,
        types: Rc<TypeTable>,
        adapters: Option<Rc<AwaitableAdapters>>,
    ) -> Self {
        Self {
            core: Rc::new(SchedulerCore {
                routines: RefCell::new(Vec::new()),
                ticks,
                types,
                adapters,
            }),
        }
    }

    fn from_weak(core: &Weak<SchedulerCore>) -> Option<Self> {
        core.upgrade().map(|core| Self { core })
    }

    fn registered(&self, routine: &Routine) -> Option<Routine> {
        self.core
            .routines
            .borrow()
            .iter()
            .find(|r| r.id() == routine.id())
            .cloned()
    }

    pub fn is_running(&self, routine: &Routine) -> bool {
        self.registered(routine).is_some()
    }

    /// Routines currently registered, in start order.
    pub fn running(&self) -> Vec<Routine> {
        self.core.routines.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.core.routines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.routines.borrow().is_empty()
    }

    /// Register and advance once. Starting a registered routine returns the
    /// registered instance untouched; starting a finished one restarts its body.
    pub fn start(&self, routine: &Routine) -> Result<Routine> {
        self.register(routine, true)
    }

    /// Register a routine awaited by another one. It is not subscribed to
    /// the tick source: the awaiting routine drives it from its own budget.
    pub(crate) fn start_nested(&self, routine: &Routine) -> Result<Routine> {
        self.register(routine, false)
    }

    fn register(&self, routine: &Routine, subscribe: bool) -> Result<Routine> {
        if let Some(existing) = self.registered(routine) {
            tracing::trace!("{} already running", routine.id());
            return Ok(existing);
        }
        if routine.state() != RoutineState::Created {
            routine.reset();
        }

        self.core.routines.borrow_mut().push(routine.clone());
        if subscribe {
            let weak = Rc::downgrade(&self.core);
            let ticked = routine.clone();
            self.core.ticks.subscribe(
                routine.id(),
                Rc::new(move || {
                    if let Some(scheduler) = Scheduler::from_weak(&weak) {
                        if let Err(e) = scheduler.update(&ticked) {
                            tracing::error!("{} ('{}') failed: {}", ticked.id(), ticked.name(), e);
                        }
                    }
                }),
            );
        }
        routine.set_state(RoutineState::Running);
        tracing::debug!("Started {} ('{}')", routine.id(), routine.name());

        self.step(routine)?;
        Ok(routine.clone())
    }

    /// Stop a registered routine. Returns false when it was not registered.
    pub fn stop(&self, routine: &Routine) -> bool {
        if !self.is_running(routine) {
            return false;
        }

        if let Some(mut current) = routine.take_current() {
            current.stop(self);
        }
        self.core
            .routines
            .borrow_mut()
            .retain(|r| r.id() != routine.id());
        self.core.ticks.unsubscribe(routine.id());
        routine.set_state(RoutineState::Done);
        tracing::debug!("Stopped {} ('{}')", routine.id(), routine.name());

        if let Some(callback) = routine.take_completion() {
            callback(routine);
        }
        true
    }

    /// Start if needed, then drain synchronously until done. Nested routines
    /// are finished first. Plain awaitables are stepped over without being
    /// ticked, so waits that only complete through repeated ticking are cut
    /// short rather than honored.
    pub fn finish(&self, routine: &Routine) -> Result<()> {
        if !self.is_running(routine) {
            self.start(routine)?;
        }
        while !routine.is_done() {
            if let Some(nested) = routine.current_routine() {
                if !nested.is_done() {
                    self.finish(&nested)?;
                }
            }
            if routine.is_done() {
                break;
            }
            self.step(routine)?;
        }
        Ok(())
    }

    /// One scheduler tick for `routine`, repeated `multiplier` times. Nested
    /// routines spend the budget of the routine awaiting them.
    pub fn update(&self, routine: &Routine) -> Result<()> {
        for _ in 0..routine.multiplier() {
            if routine.is_done() || !self.is_running(routine) {
                break;
            }
            self.advance_once(routine)?;
        }
        Ok(())
    }

    /// One unit of progress: advance the awaited nested routine if there is
    /// one, else the current awaitable, and step once it is done.
    fn advance_once(&self, routine: &Routine) -> Result<()> {
        if routine.is_paused() {
            return Ok(());
        }
        if let Some(nested) = routine.current_routine().filter(|n| !n.is_done()) {
            self.advance_once(&nested)?;
            if nested.is_done() && !routine.is_done() {
                self.step(routine)?;
            }
            return Ok(());
        }
        match routine.advance_current() {
            None | Some(true) => self.step(routine),
            Some(false) => {
                routine.set_state(RoutineState::Suspended);
                Ok(())
            }
        }
    }

    /// Stop the current awaitable and move to the next yield of the body.
    pub fn step(&self, routine: &Routine) -> Result<()> {
        if let Some(mut current) = routine.take_current() {
            current.stop(self);
        }

        let step = match routine.next_step() {
            None => {
                self.stop(routine);
                return Ok(());
            }
            Some(Err(e)) => return Err(self.fail(routine, e)),
            Some(Ok(step)) => step,
        };
        tracing::trace!("{} yielded {:?}", routine.id(), step);

        let mut awaitable = match self.to_awaitable(step) {
            Ok(awaitable) => awaitable,
            Err(e) => return Err(self.fail(routine, e)),
        };
        if let Err(e) = awaitable.start(self) {
            return Err(self.fail(routine, e));
        }

        if routine.is_done() {
            // Stopped while the awaitable was starting
            awaitable.stop(self);
        } else {
            routine.set_state(if awaitable.is_done() {
                RoutineState::Running
            } else {
                RoutineState::Suspended
            });
            routine.set_current(awaitable);
        }
        Ok(())
    }

    /// Convert a yielded step into an awaitable.
    pub fn to_awaitable(&self, step: Step) -> Result<Box<dyn Awaitable>> {
        match step {
            Step::Tick => Ok(Box::new(NextTick::new())),
            Step::Await(awaitable) => Ok(awaitable),
            Step::Routine(routine) => Ok(Box::new(routine)),
            Step::Foreign(foreign) => {
                let types = &self.core.types;
                let adapter = match &self.core.adapters {
                    Some(local) => local.resolve(types, foreign.type_id),
                    None => adapters::resolve_global(types, foreign.type_id),
                };
                match adapter {
                    Some(adapter) => adapter(foreign),
                    None => Err(adapters::unsupported(types, foreign.type_id)),
                }
            }
        }
    }

    fn fail(&self, routine: &Routine, error: InspectError) -> InspectError {
        tracing::error!("{} ('{}') aborted: {}", routine.id(), routine.name(), error);
        routine.set_error(error.to_string());
        self.stop(routine);
        error
    }
}
