//! Tick sources driving the scheduler.

use crate::scheduler::routine::RoutineId;
use std::cell::RefCell;
use std::rc::Rc;

pub type TickCallback = Rc<dyn Fn()>;

/// Delivers "advance by one tick" notifications to subscribed routines.
pub trait TickSource {
    fn subscribe(&self, id: RoutineId, callback: TickCallback);
    fn unsubscribe(&self, id: RoutineId);
}

/// Tick source driven explicitly by the host, once per host frame.
#[derive(Default)]
pub struct ManualTickSource {
    subscribers: RefCell<Vec<(RoutineId, TickCallback)>>,
    ticks: std::cell::Cell<u64>,
}

impl ManualTickSource {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Notify every subscriber once. Subscriptions made during the tick start
    /// receiving notifications on the next one; routines unsubscribed during
    /// the tick are skipped.
    pub fn tick(&self) {
        self.ticks.set(self.ticks.get() + 1);
        let snapshot: Vec<(RoutineId, TickCallback)> = self.subscribers.borrow().clone();
        for (id, callback) in snapshot {
            if self.is_subscribed(id) {
                callback();
            }
        }
    }

    /// Tick until nothing is subscribed or `max_ticks` is reached. Returns the
    /// number of ticks delivered.
    pub fn run_until_idle(&self, max_ticks: u64) -> u64 {
        let mut delivered = 0;
        while !self.is_idle() && delivered < max_ticks {
            self.tick();
            delivered += 1;
        }
        delivered
    }

    pub fn is_subscribed(&self, id: RoutineId) -> bool {
        self.subscribers.borrow().iter().any(|(sub, _)| *sub == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Ticks delivered so far.
    pub fn elapsed(&self) -> u64 {
        self.ticks.get()
    }
}

impl TickSource for ManualTickSource {
    fn subscribe(&self, id: RoutineId, callback: TickCallback) {
        let mut subscribers = self.subscribers.borrow_mut();
        if !subscribers.iter().any(|(sub, _)| *sub == id) {
            subscribers.push((id, callback));
        }
    }

    fn unsubscribe(&self, id: RoutineId) {
        self.subscribers.borrow_mut().retain(|(sub, _)| *sub != id);
    }
}
