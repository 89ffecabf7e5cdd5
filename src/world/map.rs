use crate::entities::entity::{Entity, EntityId};
use crate::world::area::{clamp, Rect};
use crate::world::region::{region_coords_for, Region, TileType, REGION_SIZE};
use crate::world::rng::WorldRng;
use crate::world::snapshot::MapSnapshot;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Half a tile: placements are kept off the map's far edge by this much.
pub const EDGE_MARGIN: f32 = 0.5;

/// Identity of one live map: stable id plus an optional instance
/// discriminator (per-party house instances share an id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapKey {
    pub id: String,
    pub instance: Option<String>,
}

impl MapKey {
    pub fn new(id: impl Into<String>) -> Self {
        MapKey {
            id: id.into(),
            instance: None,
        }
    }

    pub fn instanced(id: impl Into<String>, instance: impl Into<String>) -> Self {
        MapKey {
            id: id.into(),
            instance: Some(instance.into()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{} ({})", self.id, instance),
            None => write!(f, "{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    #[default]
    None,
    Rain,
}

impl Weather {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(Weather::None),
            "rain" => Some(Weather::Rain),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weather::None => "none",
            Weather::Rain => "rain",
        }
    }
}

/// A wall segment sitting on a tile's north or west edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wall {
    pub x: u32,
    pub y: u32,
    pub kind: WallKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WallKind {
    Horizontal,
    Vertical,
}

impl WallKind {
    pub fn code(self) -> u8 {
        match self {
            WallKind::Horizontal => 0,
            WallKind::Vertical => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(WallKind::Horizontal),
            1 => Some(WallKind::Vertical),
            _ => None,
        }
    }
}

/// One map: a region grid, the entities on it, spawn areas, and editing
/// state. Exactly one `WorldMap` exists per occupied (id, instance)
/// pair; the world owns the registry.
#[derive(Debug, Clone)]
pub struct WorldMap {
    pub key: MapKey,
    pub width: u32,
    pub height: u32,
    regions_x: u32,
    regions_y: u32,
    pub regions: Vec<Region>,
    entities: HashMap<EntityId, Entity>,
    pub walls: BTreeSet<Wall>,
    pub spawns: BTreeMap<String, Rect>,
    pub spawn_area: Rect,
    /// Server-side gate: editing-class operations are rejected while
    /// set, whatever the client claims.
    pub editing_locked: bool,
    pub weather: Weather,
    /// Persistent maps survive with zero clients; instanced maps that
    /// are not persistent are reclaimed when the last client leaves.
    pub persistent: bool,
    /// Pristine editable state, applied by house reset.
    pub default_save: Option<MapSnapshot>,
}

impl WorldMap {
    /// Build a map of `regions_x` by `regions_y` regions filled with a
    /// default tile. The default spawn area is the map center.
    pub fn new(key: MapKey, regions_x: u32, regions_y: u32, default_tile: TileType) -> Self {
        let regions_x = regions_x.max(1);
        let regions_y = regions_y.max(1);
        let mut regions = Vec::with_capacity((regions_x * regions_y) as usize);
        for ry in 0..regions_y {
            for rx in 0..regions_x {
                regions.push(Region::new(rx, ry, default_tile));
            }
        }
        let width = regions_x * REGION_SIZE;
        let height = regions_y * REGION_SIZE;
        WorldMap {
            key,
            width,
            height,
            regions_x,
            regions_y,
            regions,
            entities: HashMap::new(),
            walls: BTreeSet::new(),
            spawns: BTreeMap::new(),
            spawn_area: Rect::point(width as f32 / 2.0, height as f32 / 2.0),
            editing_locked: false,
            weather: Weather::None,
            persistent: true,
            default_save: None,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32
    }

    fn region_index(&self, x: f32, y: f32) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        let (rx, ry) = region_coords_for(x, y);
        Some((ry * self.regions_x + rx) as usize)
    }

    pub fn region_at(&self, x: f32, y: f32) -> Option<&Region> {
        self.region_index(x, y).map(|i| &self.regions[i])
    }

    pub fn region_at_mut(&mut self, x: f32, y: f32) -> Option<&mut Region> {
        let index = self.region_index(x, y)?;
        Some(&mut self.regions[index])
    }

    /// Indices of every region intersecting `rect`, clipped to the map.
    pub fn regions_overlapping(&self, rect: Rect) -> Vec<usize> {
        let min_x = rect.x.max(0.0);
        let min_y = rect.y.max(0.0);
        let max_x = (rect.x + rect.w).min(self.width as f32 - EDGE_MARGIN);
        let max_y = (rect.y + rect.h).min(self.height as f32 - EDGE_MARGIN);
        if max_x < min_x || max_y < min_y {
            return Vec::new();
        }
        let (rx0, ry0) = region_coords_for(min_x, min_y);
        let (rx1, ry1) = region_coords_for(max_x, max_y);
        let mut indices = Vec::new();
        for ry in ry0..=ry1.min(self.regions_y - 1) {
            for rx in rx0..=rx1.min(self.regions_x - 1) {
                indices.push((ry * self.regions_x + rx) as usize);
            }
        }
        indices
    }

    pub fn tile(&self, x: u32, y: u32) -> Option<TileType> {
        let region = self.region_at(x as f32, y as f32)?;
        region.tile(x % REGION_SIZE, y % REGION_SIZE)
    }

    pub fn set_tile(&mut self, x: u32, y: u32, tile: TileType) -> Result<(), String> {
        let key = self.key.clone();
        let region = self
            .region_at_mut(x as f32, y as f32)
            .ok_or_else(|| format!("tile ({}, {}) outside map {}", x, y, key))?;
        region.set_tile(x % REGION_SIZE, y % REGION_SIZE, tile)
    }

    /// Freeze the current tile layout as the state `reset_tiles` goes
    /// back to.
    pub fn mark_tiles_original(&mut self) {
        for region in &mut self.regions {
            region.mark_tiles_original();
        }
    }

    pub fn reset_tiles(&mut self) {
        for region in &mut self.regions {
            region.reset_tiles();
        }
    }

    /// Place an entity, registering it with the region containing its
    /// position. The caller (the world) maintains the global id index
    /// and fires the change notification.
    pub fn insert_entity(&mut self, entity: Entity) -> Result<(), String> {
        if self.entities.contains_key(&entity.id) {
            return Err(format!("entity {} already on map {}", entity.id.0, self.key));
        }
        let index = self.region_index(entity.x, entity.y).ok_or_else(|| {
            format!(
                "entity position ({}, {}) outside map {}",
                entity.x, entity.y, self.key
            )
        })?;
        self.regions[index].insert_entity(entity.id);
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    pub fn take_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(index) = self.region_index(entity.x, entity.y) {
            self.regions[index].remove_entity(id);
        }
        Some(entity)
    }

    /// Move an entity, rebuilding region membership when it crosses a
    /// boundary. Fails without side effects if the target is outside
    /// the map.
    pub fn move_entity(&mut self, id: EntityId, x: f32, y: f32) -> Result<(), String> {
        let new_index = self
            .region_index(x, y)
            .ok_or_else(|| format!("position ({}, {}) outside map {}", x, y, self.key))?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or_else(|| format!("entity {} not on map {}", id.0, self.key))?;
        let old_index = {
            let (rx, ry) = region_coords_for(entity.x, entity.y);
            (ry * self.regions_x + rx) as usize
        };
        entity.x = x;
        entity.y = y;
        if old_index != new_index {
            self.regions[old_index].remove_entity(id);
            self.regions[new_index].insert_entity(id);
        }
        Ok(())
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Point-in-time snapshot of matching entities; iterating the
    /// result never observes later mutations.
    pub fn find_entities(&self, predicate: impl Fn(&Entity) -> bool) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .entities
            .values()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect();
        found.sort_by_key(|entity| entity.id);
        found
    }

    /// Entities inside an area, via the region index.
    pub fn entities_in(&self, rect: Rect) -> Vec<EntityId> {
        let mut found = Vec::new();
        for index in self.regions_overlapping(rect) {
            for id in self.regions[index].entities() {
                if let Some(entity) = self.entities.get(&id) {
                    if rect.contains(entity.x, entity.y) {
                        found.push(id);
                    }
                }
            }
        }
        found
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a spawn-target token to a point.
    ///
    /// `"spawn"` picks a random point in the default spawn area; a known
    /// spawn name picks one in that area; `"<x> <y>"` clamps explicit
    /// coordinates half a tile inside the map; anything else is a
    /// parameter error for the invoking client.
    pub fn spawn_target(&self, token: &str, rng: &mut WorldRng) -> Result<(f32, f32), String> {
        let token = token.trim();
        if token == "spawn" {
            return Ok(self.spawn_area.random_point(rng));
        }
        if let Some(area) = self.spawns.get(token) {
            return Ok(area.random_point(rng));
        }
        let mut parts = token.split_whitespace();
        if let (Some(tx), Some(ty), None) = (parts.next(), parts.next(), parts.next()) {
            if let (Ok(x), Ok(y)) = (tx.parse::<i64>(), ty.parse::<i64>()) {
                let x = clamp(x as f32, 0.0, self.width as f32 - EDGE_MARGIN);
                let y = clamp(y as f32, 0.0, self.height as f32 - EDGE_MARGIN);
                return Ok((x, y));
            }
        }
        Err("invalid parameters".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::kinds::EntityKind;

    fn test_map() -> WorldMap {
        WorldMap::new(MapKey::new("meadow"), 4, 4, TileType::Grass)
    }

    fn entity(id: u32, x: f32, y: f32) -> Entity {
        Entity::new(EntityId(id), EntityKind::Barrel, x, y)
    }

    #[test]
    fn dimensions_follow_region_grid() {
        let map = test_map();
        assert_eq!(map.width, 32);
        assert_eq!(map.height, 32);
        assert_eq!(map.regions.len(), 16);
    }

    #[test]
    fn insert_assigns_region_membership() {
        let mut map = test_map();
        map.insert_entity(entity(1, 10.0, 20.0)).unwrap();
        let region = map.region_at(10.0, 20.0).unwrap();
        assert!(region.contains_entity(EntityId(1)));
        let elsewhere = map.region_at(0.0, 0.0).unwrap();
        assert!(!elsewhere.contains_entity(EntityId(1)));
    }

    #[test]
    fn insert_rejects_out_of_bounds() {
        let mut map = test_map();
        assert!(map.insert_entity(entity(1, 32.0, 0.0)).is_err());
        assert!(map.insert_entity(entity(1, -1.0, 0.0)).is_err());
        assert_eq!(map.entity_count(), 0);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut map = test_map();
        map.insert_entity(entity(1, 1.0, 1.0)).unwrap();
        assert!(map.insert_entity(entity(1, 2.0, 2.0)).is_err());
    }

    #[test]
    fn move_across_boundary_rebuilds_membership() {
        let mut map = test_map();
        map.insert_entity(entity(1, 7.9, 0.0)).unwrap();
        map.move_entity(EntityId(1), 8.0, 0.0).unwrap();

        assert!(!map.region_at(7.9, 0.0).unwrap().contains_entity(EntityId(1)));
        assert!(map.region_at(8.0, 0.0).unwrap().contains_entity(EntityId(1)));

        // Membership is exactly one region.
        let holding = map
            .regions
            .iter()
            .filter(|r| r.contains_entity(EntityId(1)))
            .count();
        assert_eq!(holding, 1);
    }

    #[test]
    fn failed_move_changes_nothing() {
        let mut map = test_map();
        map.insert_entity(entity(1, 3.0, 3.0)).unwrap();
        assert!(map.move_entity(EntityId(1), 99.0, 3.0).is_err());
        let e = map.entity(EntityId(1)).unwrap();
        assert_eq!((e.x, e.y), (3.0, 3.0));
        assert!(map.region_at(3.0, 3.0).unwrap().contains_entity(EntityId(1)));
    }

    #[test]
    fn area_query_returns_assigned_entity() {
        let mut map = test_map();
        map.insert_entity(entity(7, 12.5, 13.5)).unwrap();
        let found = map.entities_in(Rect::new(8.0, 8.0, 8.0, 8.0));
        assert_eq!(found, vec![EntityId(7)]);
    }

    #[test]
    fn find_entities_is_a_snapshot() {
        let mut map = test_map();
        map.insert_entity(entity(1, 1.0, 1.0)).unwrap();
        map.insert_entity(entity(2, 2.0, 2.0)).unwrap();
        let found = map.find_entities(|e| e.kind == EntityKind::Barrel);
        map.take_entity(EntityId(1)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn spawn_target_default_area() {
        let mut map = test_map();
        map.spawn_area = Rect::new(4.0, 4.0, 2.0, 2.0);
        let mut rng = WorldRng::from_seed(1);
        for _ in 0..100 {
            let (x, y) = map.spawn_target("spawn", &mut rng).unwrap();
            assert!(map.spawn_area.contains(x, y));
        }
    }

    #[test]
    fn spawn_target_named_area() {
        let mut map = test_map();
        map.spawns
            .insert("lake".to_string(), Rect::new(24.0, 24.0, 1.0, 1.0));
        let mut rng = WorldRng::from_seed(1);
        let (x, y) = map.spawn_target("lake", &mut rng).unwrap();
        assert!(Rect::new(24.0, 24.0, 1.0, 1.0).contains(x, y));
    }

    #[test]
    fn spawn_target_explicit_coordinates_clamped() {
        let map = test_map();
        let mut rng = WorldRng::from_seed(1);
        assert_eq!(map.spawn_target("10 10", &mut rng).unwrap(), (10.0, 10.0));
        // Far edge is kept half a tile away.
        assert_eq!(
            map.spawn_target("100 100", &mut rng).unwrap(),
            (31.5, 31.5)
        );
        assert_eq!(map.spawn_target("-5 0", &mut rng).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn spawn_target_rejects_bogus_token() {
        let map = test_map();
        let mut rng = WorldRng::from_seed(1);
        let err = map.spawn_target("bogus", &mut rng).unwrap_err();
        assert_eq!(err, "invalid parameters");
    }

    #[test]
    fn tile_edit_round_trip() {
        let mut map = test_map();
        map.set_tile(9, 9, TileType::Water).unwrap();
        assert_eq!(map.tile(9, 9), Some(TileType::Water));
        let err = map.set_tile(32, 0, TileType::Dirt).unwrap_err();
        assert_eq!(err, "tile (32, 0) outside map meadow");
    }

    #[test]
    fn reset_tiles_reverts_to_marked_layout() {
        let mut map = test_map();
        map.set_tile(9, 9, TileType::Water).unwrap();
        map.mark_tiles_original();
        map.set_tile(9, 9, TileType::Stone).unwrap();
        map.set_tile(2, 17, TileType::Dirt).unwrap();
        map.reset_tiles();
        assert_eq!(map.tile(9, 9), Some(TileType::Water));
        assert_eq!(map.tile(2, 17), Some(TileType::Grass));
    }
}
