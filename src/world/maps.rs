use crate::chat::Notifier;
use crate::entities::entity::{CounterKind, Entity, EntityId, Interaction};
use crate::entities::kinds::EntityKind;
use crate::world::area::Rect;
use crate::world::map::{MapKey, Wall, WallKind, WorldMap};
use crate::world::region::TileType;
use crate::world::snapshot::{capture, SaveOptions};
use crate::world::state::World;

pub const MAIN_MAP_ID: &str = "main";
pub const HOUSE_MAP_ID: &str = "house";

const TOOLBOX_POSITION: (f32, f32) = (1.5, 1.5);

/// Collectibles reappear almost immediately so the pickup reads as a
/// visible blink rather than the spot going empty.
const COLLECTIBLE_RESPAWN_MS: u64 = 50;
const COLLECTIBLE_RANGE: f32 = 1.5;

fn sign(world: &mut World, x: f32, y: f32, name: &str, text: &str) -> Entity {
    Entity::new(world.alloc_entity_id(), EntityKind::Sign, x, y)
        .named(name)
        .with_interaction(Interaction::ShowText(text.to_string()))
}

fn collectible(world: &mut World, kind: EntityKind, x: f32, y: f32, counter: CounterKind) -> Entity {
    let mut entity = Entity::new(world.alloc_entity_id(), kind, x, y).with_interaction(
        Interaction::Collect {
            counter,
            respawn_ms: COLLECTIBLE_RESPAWN_MS,
        },
    );
    entity.options.interact_range = Some(COLLECTIBLE_RANGE);
    entity
}

/// Build and register the main meadow: 4 by 4 regions of grass with a
/// pond and a stone path, fixture signs, and the collectible spawns.
pub fn build_main_map(
    world: &mut World,
    notifier: &mut dyn Notifier,
) -> Result<MapKey, String> {
    let key = MapKey::new(MAIN_MAP_ID);
    let mut map = WorldMap::new(key.clone(), 4, 4, TileType::Grass);

    // Pond in the north-east corner.
    for y in 2..7 {
        for x in 24..30 {
            map.set_tile(x, y, TileType::Water)?;
        }
    }
    // Stone path from the center toward the house sign.
    for x in 8..16 {
        map.set_tile(x, 16, TileType::Stone)?;
    }
    map.mark_tiles_original();

    let center_x = map.width as f32 / 2.0;
    let center_y = map.height as f32 / 2.0;
    map.spawn_area = Rect::point(center_x, center_y);
    map.spawns
        .insert("center".to_string(), Rect::point(center_x, center_y));
    map.spawns
        .insert("pond".to_string(), Rect::new(25.0, 7.5, 4.0, 1.0));

    world.add_map(map)?;

    let welcome = sign(
        world,
        center_x,
        center_y - 2.0,
        "welcome",
        "Welcome to the meadow!",
    );
    world.spawn_entity(&key, welcome, notifier)?;

    let milestones = sign(
        world,
        20.25,
        14.0,
        "collectables",
        "Milestones:\nGifts: every 100\nEggs: every 50\nClovers: every 25\nCandies: every 75",
    );
    world.spawn_entity(&key, milestones, notifier)?;

    let house_sign = Entity::new(world.alloc_entity_id(), EntityKind::Sign, 7.0, 16.0)
        .named("house")
        .with_interaction(Interaction::GoToMap {
            id: HOUSE_MAP_ID.to_string(),
            target: "spawn".to_string(),
        });
    world.spawn_entity(&key, house_sign, notifier)?;

    let barrel = Entity::new(world.alloc_entity_id(), EntityKind::Barrel, 5.0, 5.0);
    world.spawn_entity(&key, barrel, notifier)?;

    for entity in [
        collectible(world, EntityKind::Gift, 20.0, 15.0, CounterKind::Gifts),
        collectible(world, EntityKind::Egg, 19.25, 15.0, CounterKind::Eggs),
        collectible(world, EntityKind::Clover, 20.625, 14.5, CounterKind::Clovers),
        collectible(world, EntityKind::Candy, 21.25, 14.8, CounterKind::Candies),
    ] {
        world.spawn_entity(&key, entity, notifier)?;
    }

    Ok(key)
}

/// Build and register one house instance: wood floor, perimeter walls,
/// a toolbox fixture and starter furniture. The pristine editable state
/// is captured as the map's default save for `resethouse`.
pub fn build_house_instance(
    world: &mut World,
    instance: &str,
    notifier: &mut dyn Notifier,
) -> Result<MapKey, String> {
    let key = MapKey::instanced(HOUSE_MAP_ID, instance);
    if world.map(&key).is_some() {
        return Ok(key);
    }
    let mut map = WorldMap::new(key.clone(), 2, 2, TileType::Wood);
    map.persistent = false;

    for x in 0..map.width {
        map.walls.insert(Wall {
            x,
            y: 0,
            kind: WallKind::Horizontal,
        });
    }
    for y in 0..map.height {
        map.walls.insert(Wall {
            x: 0,
            y,
            kind: WallKind::Vertical,
        });
        map.walls.insert(Wall {
            x: map.width - 1,
            y,
            kind: WallKind::Vertical,
        });
    }

    let center = map.width as f32 / 2.0;
    map.spawn_area = Rect::point(center, map.height as f32 - 2.0);

    let toolbox = Entity::new(
        world.alloc_entity_id(),
        EntityKind::Toolbox,
        TOOLBOX_POSITION.0,
        TOOLBOX_POSITION.1,
    );
    map.insert_entity(toolbox)?;

    let back_sign = Entity::new(world.alloc_entity_id(), EntityKind::Sign, center, 1.0)
        .named("go back")
        .with_interaction(Interaction::GoToMap {
            id: MAIN_MAP_ID.to_string(),
            target: "center".to_string(),
        });
    map.insert_entity(back_sign)?;

    let crate_box = Entity::new(world.alloc_entity_id(), EntityKind::Crate, 3.0, 3.0)
        .editable(true);
    map.insert_entity(crate_box)?;
    let lantern = Entity::new(world.alloc_entity_id(), EntityKind::Lantern, 12.0, 3.0)
        .editable(true);
    map.insert_entity(lantern)?;

    map.default_save = Some(capture(&map, &SaveOptions::editable()));

    let ids = map.entity_ids();
    world.add_map(map)?;
    for id in ids {
        notifier.entity_added(&key, id);
    }
    Ok(key)
}

fn toolbox_id(world: &World, key: &MapKey) -> Option<EntityId> {
    world
        .map(key)?
        .find_entities(|e| e.kind == EntityKind::Toolbox)
        .first()
        .map(|e| e.id)
}

/// Take the toolbox fixture out of a house instance. No-op when it is
/// already gone.
pub fn remove_toolbox(
    world: &mut World,
    key: &MapKey,
    notifier: &mut dyn Notifier,
) -> Result<(), String> {
    if let Some(id) = toolbox_id(world, key) {
        world.remove_entity(id, notifier)?;
    }
    Ok(())
}

/// Put the toolbox fixture back at its built-in spot. No-op when one is
/// already present.
pub fn restore_toolbox(
    world: &mut World,
    key: &MapKey,
    notifier: &mut dyn Notifier,
) -> Result<(), String> {
    if toolbox_id(world, key).is_some() {
        return Ok(());
    }
    let toolbox = Entity::new(
        world.alloc_entity_id(),
        EntityKind::Toolbox,
        TOOLBOX_POSITION.0,
        TOOLBOX_POSITION.1,
    );
    world.spawn_entity(key, toolbox, notifier)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageBuffer;
    use crate::world::rng::WorldRng;
    use crate::world::snapshot::{apply, LoadOptions};
    use crate::world::time::DEFAULT_TIME_SCALE;

    fn world() -> World {
        World::new(DEFAULT_TIME_SCALE, WorldRng::from_seed(3))
    }

    #[test]
    fn main_map_has_fixtures_and_collectibles() {
        let mut world = world();
        let mut sink = MessageBuffer::new();
        let key = build_main_map(&mut world, &mut sink).expect("main map");

        let map = world.map(&key).expect("registered");
        assert_eq!(map.width, 32);
        assert!(map.spawns.contains_key("center"));
        assert!(map.spawns.contains_key("pond"));
        assert_eq!(map.tile(25, 3), Some(TileType::Water));

        let collectibles = map.find_entities(|e| {
            matches!(e.interact, Some(Interaction::Collect { .. }))
        });
        assert_eq!(collectibles.len(), 4);

        let portals = map.find_entities(|e| {
            matches!(e.interact, Some(Interaction::GoToMap { .. }))
        });
        assert_eq!(portals.len(), 1);
    }

    #[test]
    fn house_instances_are_separate_maps() {
        let mut world = world();
        let mut sink = MessageBuffer::new();
        let a = build_house_instance(&mut world, "party-1", &mut sink).expect("house a");
        let b = build_house_instance(&mut world, "party-2", &mut sink).expect("house b");
        assert_ne!(a, b);
        // Repeat request reuses the live instance.
        let again = build_house_instance(&mut world, "party-1", &mut sink).expect("again");
        assert_eq!(a, again);
    }

    #[test]
    fn toolbox_can_be_removed_and_restored() {
        let mut world = world();
        let mut sink = MessageBuffer::new();
        let key = build_house_instance(&mut world, "party-1", &mut sink).expect("house");

        let has_toolbox = |world: &World| {
            !world
                .map(&key)
                .unwrap()
                .find_entities(|e| e.kind == EntityKind::Toolbox)
                .is_empty()
        };
        assert!(has_toolbox(&world));

        remove_toolbox(&mut world, &key, &mut sink).expect("remove");
        assert!(!has_toolbox(&world));
        // Removing twice stays a no-op.
        remove_toolbox(&mut world, &key, &mut sink).expect("remove again");

        restore_toolbox(&mut world, &key, &mut sink).expect("restore");
        assert!(has_toolbox(&world));
        restore_toolbox(&mut world, &key, &mut sink).expect("restore again");
        assert_eq!(
            world
                .map(&key)
                .unwrap()
                .find_entities(|e| e.kind == EntityKind::Toolbox)
                .len(),
            1
        );
    }

    #[test]
    fn default_save_restores_starter_furniture() {
        let mut world = world();
        let mut sink = MessageBuffer::new();
        let key = build_house_instance(&mut world, "party-1", &mut sink).expect("house");

        let snapshot = world
            .map(&key)
            .unwrap()
            .default_save
            .clone()
            .expect("default save");

        // Trash the editable furniture, then reset from the default save.
        let doomed: Vec<_> = world
            .map(&key)
            .unwrap()
            .find_entities(|e| e.editable)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(doomed.len(), 2);
        for id in doomed {
            world.remove_entity(id, &mut sink).unwrap();
        }

        let mut ids = Vec::new();
        {
            let mut next = || {
                ids.push(());
                crate::entities::entity::EntityId(10_000 + ids.len() as u32)
            };
            let map = world.map_mut(&key).unwrap();
            let options = LoadOptions {
                tiles: false,
                clear: true,
                ..LoadOptions::editable()
            };
            apply(map, &snapshot, &options, &mut next).expect("reset");
        }
        let restored = world.map(&key).unwrap().find_entities(|e| e.editable);
        assert_eq!(restored.len(), 2);
    }
}
