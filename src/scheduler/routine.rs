//! Routines: restartable, suspendable units of work.
//!
//! A routine body is an iterator of [`Step`]s. Each item is a yield point: the
//! scheduler converts it into an [`Awaitable`] and resumes the body once that
//! awaitable is done. The body is created lazily from a factory, so a routine
//! that ran to completion can be started again from the beginning.

use crate::error::Result;
use crate::reflect::TypeId;
use crate::scheduler::awaitable::Awaitable;
use crate::scheduler::Scheduler;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ROUTINE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity used to detect duplicate starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineId(pub u64);

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "routine#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineState {
    Created,
    Running,
    Suspended,
    Done,
}

/// A suspension value from outside the scheduler's own vocabulary. It is
/// turned into an awaitable by the adapter registered for `type_id` or for
/// the nearest of its supertypes.
pub struct Foreign {
    pub type_id: TypeId,
    pub payload: Box<dyn Any>,
}

impl Foreign {
    pub fn new(type_id: TypeId, payload: impl Any) -> Self {
        Self {
            type_id,
            payload: Box::new(payload),
        }
    }
}

impl fmt::Debug for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Foreign")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// One yield of a routine body.
pub enum Step {
    /// Resume on the next tick
    Tick,
    Await(Box<dyn Awaitable>),
    /// Run a nested routine to completion
    Routine(Routine),
    Foreign(Foreign),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Tick => write!(f, "Tick"),
            Step::Await(_) => write!(f, "Await(..)"),
            Step::Routine(r) => write!(f, "Routine({})", r.id()),
            Step::Foreign(foreign) => write!(f, "{:?}", foreign),
        }
    }
}

pub type Body = Box<dyn Iterator<Item = Result<Step>>>;
type Factory = Box<dyn Fn() -> Body>;
type Completion = Box<dyn FnOnce(&Routine)>;

struct RoutineInner {
    id: RoutineId,
    name: String,
    factory: Factory,
    body: RefCell<Option<Body>>,
    current: RefCell<Option<Box<dyn Awaitable>>>,
    state: Cell<RoutineState>,
    multiplier: Cell<u32>,
    paused: Cell<bool>,
    on_complete: RefCell<Option<Completion>>,
    last_error: RefCell<Option<String>>,
}

/// Shared handle to a routine. Clones refer to the same routine.
#[derive(Clone)]
pub struct Routine {
    inner: Rc<RoutineInner>,
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.get())
            .field("paused", &self.inner.paused.get())
            .finish()
    }
}

impl Routine {
    /// A restartable routine; `factory` builds a fresh body on every (re)start.
    pub fn new<I, F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> I + 'static,
        I: Iterator<Item = Result<Step>> + 'static,
    {
        Self {
            inner: Rc::new(RoutineInner {
                id: RoutineId(NEXT_ROUTINE_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
                factory: Box::new(move || Box::new(factory()) as Body),
                body: RefCell::new(None),
                current: RefCell::new(None),
                state: Cell::new(RoutineState::Created),
                multiplier: Cell::new(1),
                paused: Cell::new(false),
                on_complete: RefCell::new(None),
                last_error: RefCell::new(None),
            }),
        }
    }

    /// A routine over a single body; restarting it yields nothing.
    pub fn once<I>(name: impl Into<String>, body: I) -> Self
    where
        I: Iterator<Item = Result<Step>> + 'static,
    {
        let routine = Self::new(name, || std::iter::empty::<Result<Step>>());
        *routine.inner.body.borrow_mut() = Some(Box::new(body));
        routine
    }

    /// A routine yielding `Step::Tick` `ticks` times.
    pub fn ticks(name: impl Into<String>, ticks: usize) -> Self {
        Self::new(name, move || (0..ticks).map(|_| Ok(Step::Tick)))
    }

    pub fn id(&self) -> RoutineId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> RoutineState {
        self.inner.state.get()
    }

    pub fn is_done(&self) -> bool {
        self.inner.state.get() == RoutineState::Done
    }

    pub fn ptr_eq(&self, other: &Routine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn multiplier(&self) -> u32 {
        self.inner.multiplier.get()
    }

    /// Steps processed per scheduler tick (at least one).
    pub fn set_multiplier(&self, multiplier: u32) {
        self.inner.multiplier.set(multiplier.max(1));
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    /// Pause or resume; cascades to the routine currently awaited, if any.
    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.set(paused);
        if let Some(nested) = self.current_routine() {
            nested.set_paused(paused);
        }
    }

    /// Callback fired once when the routine stops, by completion or by `stop`.
    pub fn on_complete(&self, callback: impl FnOnce(&Routine) + 'static) {
        *self.inner.on_complete.borrow_mut() = Some(Box::new(callback));
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.borrow().clone()
    }

    /// Nested routine this routine is currently waiting on.
    pub fn current_routine(&self) -> Option<Routine> {
        self.inner
            .current
            .borrow()
            .as_ref()
            .and_then(|a| a.as_routine().cloned())
    }

    pub fn has_current(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    pub(crate) fn set_state(&self, state: RoutineState) {
        self.inner.state.set(state);
    }

    pub(crate) fn set_error(&self, message: String) {
        *self.inner.last_error.borrow_mut() = Some(message);
    }

    pub(crate) fn take_current(&self) -> Option<Box<dyn Awaitable>> {
        self.inner.current.borrow_mut().take()
    }

    pub(crate) fn set_current(&self, awaitable: Box<dyn Awaitable>) {
        *self.inner.current.borrow_mut() = Some(awaitable);
    }

    /// Advance the current awaitable by one tick; Some(done) when there is one.
    pub(crate) fn advance_current(&self) -> Option<bool> {
        let mut current = self.inner.current.borrow_mut();
        current.as_mut().map(|awaitable| {
            awaitable.advance();
            awaitable.is_done()
        })
    }

    /// Pull the next yield from the body, creating the body on first use.
    pub(crate) fn next_step(&self) -> Option<Result<Step>> {
        let mut body = {
            let mut slot = self.inner.body.borrow_mut();
            match slot.take() {
                Some(body) => body,
                None => (self.inner.factory)(),
            }
        };
        // Body runs without the slot borrowed, it may inspect this routine
        let next = body.next();
        *self.inner.body.borrow_mut() = Some(body);
        next
    }

    /// Forget the body so the next start begins from the factory again.
    pub(crate) fn reset(&self) {
        self.inner.body.borrow_mut().take();
        self.inner.last_error.borrow_mut().take();
        self.inner.state.set(RoutineState::Created);
    }

    pub(crate) fn take_completion(&self) -> Option<Completion> {
        self.inner.on_complete.borrow_mut().take()
    }
}

impl Awaitable for Routine {
    fn is_done(&self) -> bool {
        Routine::is_done(self)
    }

    fn start(&mut self, scheduler: &Scheduler) -> Result<()> {
        scheduler.start_nested(self).map(|_| ())
    }

    fn stop(&mut self, scheduler: &Scheduler) {
        scheduler.stop(self);
    }

    fn as_routine(&self) -> Option<&Routine> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Routine::ticks("a", 1);
        let b = Routine::ticks("b", 1);
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_body_created_lazily_and_restartable() {
        let routine = Routine::ticks("r", 2);
        assert!(matches!(routine.next_step(), Some(Ok(Step::Tick))));
        assert!(matches!(routine.next_step(), Some(Ok(Step::Tick))));
        assert!(routine.next_step().is_none());

        routine.reset();
        assert_eq!(routine.state(), RoutineState::Created);
        assert!(matches!(routine.next_step(), Some(Ok(Step::Tick))));
    }

    #[test]
    fn test_once_does_not_restart() {
        let routine = Routine::once("once", std::iter::once(Ok(Step::Tick)));
        assert!(routine.next_step().is_some());
        assert!(routine.next_step().is_none());
        routine.reset();
        assert!(routine.next_step().is_none());
    }

    #[test]
    fn test_multiplier_floor() {
        let routine = Routine::ticks("r", 0);
        routine.set_multiplier(0);
        assert_eq!(routine.multiplier(), 1);
    }
}
