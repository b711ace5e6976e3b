//! Inspector demo host
//!
//! Builds a small object graph, refreshes it asynchronously through the
//! scheduler and prints the visible tree. An optional argument filters the
//! printed rows by name.

use anyhow::Context;
use inspector_rs::{
    config::InspectorConfig,
    logging,
    reflect::{member::PropertyGetter, AccessError, ListRef, ObjectRef, TypeTable, Value},
    render::{draw_tree, NameFilter, TextRenderer},
    scheduler::{ManualTickSource, Scheduler},
    selection::NodeRegistry,
    state::StateStore,
    tree::{async_update, InspectorContext, InspectorTree, NodeId},
};
use std::cell::RefCell;
use std::rc::Rc;

const MAX_TICKS: u64 = 10_000;

fn sample_graph(types: &mut TypeTable) -> (Value, inspector_rs::reflect::TypeId) {
    let vec3 = types
        .define_class("Vec3", None)
        .field("x", TypeTable::FLOAT)
        .field("y", TypeTable::FLOAT)
        .field("z", TypeTable::FLOAT)
        .id();
    let item = types
        .define_class("Item", None)
        .field("name", TypeTable::STRING)
        .field("count", TypeTable::INT)
        .id();
    let sensor: PropertyGetter =
        Rc::new(|_: &ObjectRef| -> Result<Value, AccessError> {
            Err(AccessError::Failed("sensor offline".to_string()))
        });
    let player = types
        .define_class("Player", None)
        .field("name", TypeTable::STRING)
        .field("health", TypeTable::INT)
        .field("position", vec3)
        .field("inventory", TypeTable::ARRAY)
        .property("temperature", TypeTable::FLOAT, Some(sensor), None)
        .id();

    let inventory = ListRef::from_values(
        item,
        vec![
            Value::Object(
                ObjectRef::new(item)
                    .with_field("name", "potion")
                    .with_field("count", 3i64),
            ),
            Value::Object(
                ObjectRef::new(item)
                    .with_field("name", "sword")
                    .with_field("count", 1i64),
            ),
        ],
    );
    let obj = ObjectRef::new(player)
        .with_field("name", "hero")
        .with_field("health", 100i64)
        .with_field(
            "position",
            ObjectRef::new(vec3)
                .with_field("x", 1.0)
                .with_field("y", 0.0)
                .with_field("z", -4.5),
        )
        .with_field("inventory", inventory);
    (Value::Object(obj), player)
}

fn main() -> anyhow::Result<()> {
    let config = InspectorConfig::load_or_default();
    let _guard = logging::init(&config.logging).context("Failed to initialize logging")?;

    tracing::info!("Starting inspector demo");

    let state_file = config.persistence.resolved_state_file();
    let store = match &state_file {
        Some(path) => StateStore::load_or_default(path),
        None => StateStore::new(),
    };
    let store = Rc::new(RefCell::new(store));

    let mut types = TypeTable::new();
    let (graph, player) = sample_graph(&mut types);
    let ctx = InspectorContext::new(types)
        .with_registry(NodeRegistry::with_max_elements(config.elements.max_elements))
        .with_state(store.clone());

    let ticks = ManualTickSource::new();
    let scheduler = Scheduler::new(ticks.clone(), ctx.types.clone());
    let tree = Rc::new(RefCell::new(InspectorTree::new(ctx)));
    let root = tree.borrow_mut().create_root_for("Player", graph, player)?;

    // Expand a few levels so the demo has something to show
    {
        let mut t = tree.borrow_mut();
        t.update(root, &config.update.options().deep(true).with_max_depth(2))?;
        let expand: Vec<NodeId> = t.subtree(root);
        for id in expand {
            t.set_children_visible(id, true)?;
        }
    }

    let routine = async_update(
        &tree,
        &scheduler,
        root,
        config.update.options(),
        config.update.multiplier,
    )?;
    let elapsed = ticks.run_until_idle(MAX_TICKS);
    if let Some(error) = routine.last_error() {
        anyhow::bail!("Async refresh failed: {}", error);
    }
    tracing::info!("Async refresh finished after {} ticks", elapsed);

    let mut renderer = TextRenderer::new();
    let drawn = draw_tree(&mut tree.borrow_mut(), &mut renderer, root)?;
    tracing::debug!("Drew {} rows", drawn);
    print!("{}", renderer.output());

    if let Some(query) = std::env::args().nth(1) {
        let t = tree.borrow();
        println!("\nMatches for '{}':", query);
        for id in t.search(&NameFilter::new(&query).with_path()) {
            println!("  {}", t.path(id)?);
        }
    }

    if config.persistence.autosave {
        let saved = tree.borrow().save_state()?;
        if let Some(path) = &state_file {
            store
                .borrow_mut()
                .save(path)
                .with_context(|| format!("Failed to save node state to {:?}", path))?;
            tracing::info!("Saved state of {} nodes", saved);
        }
    }

    Ok(())
}
