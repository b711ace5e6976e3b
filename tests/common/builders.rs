//! Test data builders for creating object graphs and trees

use inspector_rs::reflect::member::PropertyGetter;
use inspector_rs::reflect::{AccessError, ListRef, ObjectRef, TypeId, TypeTable, Value};
use inspector_rs::selection::NodeRegistry;
use inspector_rs::state::NodeStateStore;
use inspector_rs::tree::{InspectorContext, InspectorTree, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

/// Types of the sample game world
#[derive(Debug, Clone, Copy)]
pub struct GameTypes {
    pub vec3: TypeId,
    pub item: TypeId,
    pub player: TypeId,
}

/// Register `Vec3`, `Item` and `Player` (with a failing `temperature` property).
pub fn define_game_types(types: &mut TypeTable) -> GameTypes {
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
    GameTypes { vec3, item, player }
}

pub fn item(types: &GameTypes, name: &str, count: i64) -> Value {
    Value::Object(
        ObjectRef::new(types.item)
            .with_field("name", name)
            .with_field("count", count),
    )
}

/// A tree showing one `Player`
pub struct World {
    pub tree: InspectorTree,
    pub root: NodeId,
    pub player: ObjectRef,
    pub inventory: ListRef,
    pub types: GameTypes,
}

/// Builder for a [`World`]
pub struct WorldBuilder {
    inventory: usize,
    health: i64,
    max_elements: Option<usize>,
    state: Option<Rc<RefCell<dyn NodeStateStore>>>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            inventory: 2,
            health: 100,
            max_elements: None,
            state: None,
        }
    }

    pub fn inventory(mut self, count: usize) -> Self {
        self.inventory = count;
        self
    }

    pub fn health(mut self, health: i64) -> Self {
        self.health = health;
        self
    }

    pub fn max_elements(mut self, max: usize) -> Self {
        self.max_elements = Some(max);
        self
    }

    pub fn state(mut self, state: Rc<RefCell<dyn NodeStateStore>>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> World {
        let mut table = TypeTable::new();
        let types = define_game_types(&mut table);

        let inventory = ListRef::new(types.item);
        for i in 0..self.inventory {
            inventory.push(item(&types, &format!("item{}", i), i as i64 + 1));
        }
        let position = ObjectRef::new(types.vec3)
            .with_field("x", 1.0)
            .with_field("y", 2.0)
            .with_field("z", 3.0);
        let player = ObjectRef::new(types.player)
            .with_field("name", "hero")
            .with_field("health", self.health)
            .with_field("position", position)
            .with_field("inventory", inventory.clone());

        let mut ctx = InspectorContext::new(table);
        if let Some(max) = self.max_elements {
            ctx = ctx.with_registry(NodeRegistry::with_max_elements(max));
        }
        if let Some(state) = self.state {
            ctx = ctx.with_state(state);
        }
        let mut tree = InspectorTree::new(ctx);
        let root = tree
            .create_root_for("Player", Value::Object(player.clone()), types.player)
            .unwrap();

        World {
            tree,
            root,
            player,
            inventory,
            types,
        }
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_builder() {
        let world = WorldBuilder::new().inventory(3).health(7).build();
        assert_eq!(world.inventory.len(), 3);
        assert_eq!(world.player.field("health"), Some(Value::Int(7)));
        assert_eq!(world.tree.len(), 1);
    }
}
