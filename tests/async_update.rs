//! Scheduler and asynchronous tree refresh tests.

mod common;

use common::builders::WorldBuilder;
use common::find;
use inspector_rs::reflect::TypeTable;
use inspector_rs::scheduler::{
    adapters, Foreign, ManualTickSource, Routine, RoutineState, Scheduler, Step, WaitTicks,
};
use inspector_rs::tree::{async_update, ChannelObserver, NodeEvent, UpdateOptions};
use inspector_rs::InspectError;
use serial_test::serial;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

fn scheduler() -> (Scheduler, Rc<ManualTickSource>) {
    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), Rc::new(TypeTable::new()));
    (scheduler, ticks)
}

#[test]
fn test_start_twice_returns_same_routine() {
    let (scheduler, _ticks) = scheduler();
    let routine = Routine::ticks("r", 5);
    let a = scheduler.start(&routine).unwrap();
    let b = scheduler.start(&routine).unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(scheduler.len(), 1);
}

#[test]
fn test_stop_unregistered_returns_false() {
    let (scheduler, _ticks) = scheduler();
    let routine = Routine::ticks("idle", 1);
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    routine.on_complete(move |_| flag.set(true));

    assert!(!scheduler.stop(&routine));
    assert_eq!(routine.state(), RoutineState::Created);
    assert!(!fired.get());
}

#[test]
fn test_finish_drains_three_yields() {
    let (scheduler, ticks) = scheduler();
    let resumed = Rc::new(Cell::new(0));
    let counter = resumed.clone();
    let routine = Routine::new("three", move || {
        let counter = counter.clone();
        (0..3).map(move |_| {
            counter.set(counter.get() + 1);
            Ok(Step::Tick)
        })
    });

    scheduler.finish(&routine).unwrap();
    assert!(routine.is_done());
    assert_eq!(resumed.get(), 3);
    assert_eq!(ticks.elapsed(), 0);
    assert!(scheduler.is_empty());
}

#[test]
fn test_completion_fires_once() {
    let (scheduler, ticks) = scheduler();
    let fired = Rc::new(Cell::new(0));
    let routine = Routine::ticks("done", 2);
    let count = fired.clone();
    routine.on_complete(move |_| count.set(count.get() + 1));

    scheduler.start(&routine).unwrap();
    ticks.run_until_idle(10);
    scheduler.stop(&routine);
    assert_eq!(fired.get(), 1);
}

#[test]
#[serial]
fn test_foreign_awaitable_through_global_adapter() {
    let mut types = TypeTable::new();
    let base = types.define_class("Delay", None).id();
    let derived = types.define_class("ShortDelay", Some(base)).id();
    let types = Rc::new(types);

    adapters::reset_global();
    adapters::register_global(base, |foreign: Foreign| {
        let ticks = foreign.payload.downcast_ref::<u32>().copied().unwrap_or(1);
        Ok(Box::new(WaitTicks::new(ticks)) as Box<dyn inspector_rs::scheduler::Awaitable>)
    });

    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), types);
    let routine = Routine::once(
        "foreign",
        std::iter::once(Ok(Step::Foreign(Foreign::new(derived, 3u32)))),
    );
    scheduler.start(&routine).unwrap();
    assert!(!routine.is_done());
    ticks.run_until_idle(20);
    assert!(routine.is_done());
    assert!(routine.last_error().is_none());

    adapters::reset_global();
}

#[test]
#[serial]
fn test_unknown_foreign_awaitable_fails_routine() {
    adapters::reset_global();
    let (scheduler, _ticks) = scheduler();
    let routine = Routine::once(
        "foreign",
        std::iter::once(Ok(Step::Foreign(Foreign::new(TypeTable::STRING, ())))),
    );
    let result = scheduler.start(&routine);
    assert!(matches!(result, Err(InspectError::UnsupportedAwaitable(_))));
    assert!(routine.is_done());
    assert!(routine.last_error().is_some());
}

#[test]
fn test_async_update_matches_sync_update() {
    let mut sync_world = WorldBuilder::new().build();
    sync_world
        .tree
        .update(sync_world.root, &UpdateOptions::default())
        .unwrap();
    let expected: BTreeSet<String> = sync_world
        .tree
        .iter()
        .map(|n| sync_world.tree.path(n.id()).unwrap())
        .collect();

    let world = WorldBuilder::new().build();
    let root = world.root;
    let tree = Rc::new(RefCell::new(world.tree));
    let (observer, events) = ChannelObserver::unbounded();
    tree.borrow_mut().add_observer(observer);

    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), tree.borrow().context().types.clone());
    let routine = async_update(&tree, &scheduler, root, UpdateOptions::default(), 1).unwrap();
    let elapsed = ticks.run_until_idle(1_000);
    assert!(routine.is_done());
    assert!(elapsed > 1);

    let t = tree.borrow();
    let actual: BTreeSet<String> = t.iter().map(|n| t.path(n.id()).unwrap()).collect();
    assert_eq!(actual, expected);

    let created = events
        .try_iter()
        .filter(|e| matches!(e, NodeEvent::Created { .. }))
        .count();
    assert_eq!(created, t.len() - 1);
}

#[test]
fn test_higher_multiplier_finishes_sooner() {
    let run = |multiplier: u32| {
        let world = WorldBuilder::new().build();
        let root = world.root;
        let tree = Rc::new(RefCell::new(world.tree));
        let ticks = ManualTickSource::new();
        let scheduler = Scheduler::new(ticks.clone(), tree.borrow().context().types.clone());
        async_update(&tree, &scheduler, root, UpdateOptions::default(), multiplier).unwrap();
        ticks.run_until_idle(1_000)
    };
    assert!(run(4) < run(1));
}

#[test]
fn test_async_update_on_child_stops_ancestor_walk() {
    let mut world = WorldBuilder::new().build();
    world
        .tree
        .update(world.root, &UpdateOptions::default())
        .unwrap();
    let health = find(&world.tree, "Player.members.health").unwrap();
    let root = world.root;
    let tree = Rc::new(RefCell::new(world.tree));

    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), tree.borrow().context().types.clone());
    let outer = async_update(&tree, &scheduler, root, UpdateOptions::default(), 1).unwrap();
    let inner = async_update(&tree, &scheduler, health, UpdateOptions::default(), 1).unwrap();

    assert!(outer.is_done());
    ticks.run_until_idle(100);
    assert!(inner.is_done());
    assert!(scheduler.is_empty());
}

#[test]
fn test_stopping_walk_stops_nested_routines() {
    let world = WorldBuilder::new().build();
    let root = world.root;
    let tree = Rc::new(RefCell::new(world.tree));
    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), tree.borrow().context().types.clone());

    let routine = async_update(&tree, &scheduler, root, UpdateOptions::default(), 1).unwrap();
    ticks.tick();
    ticks.tick();
    assert!(scheduler.len() > 1);

    scheduler.stop(&routine);
    assert!(scheduler.is_empty());
    assert!(ticks.is_idle());
}
