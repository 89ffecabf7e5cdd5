use crate::entities::entity::{Entity, EntityId, EntityOptions};
use crate::entities::kinds::EntityKind;
use crate::world::map::{Wall, WallKind, WorldMap};
use crate::world::region::TileType;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Transportable map state. Omitted sections correspond to save flags
/// that were off; interactions and ownership are runtime-only and are
/// rebuilt by map builders, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walls: Option<Vec<WallEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntityEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallEntry {
    pub x: u32,
    pub y: u32,
    pub k: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    #[serde(rename = "type")]
    pub kind: u16,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "EntityOptions::is_empty")]
    pub options: EntityOptions,
}

/// Which sections `capture` includes.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub tiles: bool,
    pub entities: bool,
    pub walls: bool,
    /// Restrict the entity section to player-placed entities.
    pub editable_only: bool,
}

impl SaveOptions {
    pub fn all() -> Self {
        SaveOptions {
            tiles: true,
            entities: true,
            walls: true,
            editable_only: false,
        }
    }

    /// House saves keep only what the player placed.
    pub fn editable() -> Self {
        SaveOptions {
            tiles: true,
            entities: true,
            walls: true,
            editable_only: true,
        }
    }
}

/// Which sections `apply` restores. Loads are additive; callers that
/// want a clean slate set `clear`, which removes player-placed state
/// first. That the default is additive is a documented contract.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub tiles: bool,
    pub entities: bool,
    pub walls: bool,
    /// Mark restored entities editable.
    pub entities_editable: bool,
    /// Remove editable entities and walls before applying.
    pub clear: bool,
}

impl LoadOptions {
    pub fn all() -> Self {
        LoadOptions {
            tiles: true,
            entities: true,
            walls: true,
            entities_editable: false,
            clear: false,
        }
    }

    pub fn editable() -> Self {
        LoadOptions {
            entities_editable: true,
            ..LoadOptions::all()
        }
    }
}

/// Entity ids that changed hands during `apply`, so the caller can
/// update its global id index and notify viewers.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
}

pub fn capture(map: &WorldMap, options: &SaveOptions) -> MapSnapshot {
    let tiles = options.tiles.then(|| {
        let mut codes = Vec::with_capacity((map.width * map.height) as usize);
        for y in 0..map.height {
            for x in 0..map.width {
                let tile = map.tile(x, y).unwrap_or(TileType::None);
                codes.push(tile.code());
            }
        }
        codes
    });

    let walls = options.walls.then(|| {
        map.walls
            .iter()
            .map(|wall| WallEntry {
                x: wall.x,
                y: wall.y,
                k: wall.kind.code(),
            })
            .collect()
    });

    let entities = options.entities.then(|| {
        map.find_entities(|entity| {
            entity.owner.is_none() && (!options.editable_only || entity.editable)
        })
        .into_iter()
        .map(|entity| EntityEntry {
            kind: entity.kind.code(),
            x: entity.x,
            y: entity.y,
            options: entity.options,
        })
        .collect()
    });

    MapSnapshot {
        version: SNAPSHOT_VERSION,
        width: map.width,
        height: map.height,
        tiles,
        walls,
        entities,
    }
}

/// Restore a snapshot onto a map. Everything is validated before any
/// mutation, so a rejected snapshot leaves the map untouched.
pub fn apply(
    map: &mut WorldMap,
    snapshot: &MapSnapshot,
    options: &LoadOptions,
    alloc_id: &mut dyn FnMut() -> EntityId,
) -> Result<ApplyOutcome, String> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!(
            "unsupported snapshot version {} for map {}",
            snapshot.version, map.key
        ));
    }

    let tiles = match (&snapshot.tiles, options.tiles) {
        (Some(codes), true) => {
            if snapshot.width != map.width || snapshot.height != map.height {
                return Err(format!(
                    "snapshot is {}x{} but map {} is {}x{}",
                    snapshot.width, snapshot.height, map.key, map.width, map.height
                ));
            }
            if codes.len() != (map.width * map.height) as usize {
                return Err(format!(
                    "snapshot tile section has {} codes, expected {}",
                    codes.len(),
                    map.width * map.height
                ));
            }
            let mut decoded = Vec::with_capacity(codes.len());
            for &code in codes {
                let tile = TileType::from_code(code)
                    .ok_or_else(|| format!("unknown tile code {} in snapshot", code))?;
                decoded.push(tile);
            }
            Some(decoded)
        }
        _ => None,
    };

    let walls = match (&snapshot.walls, options.walls) {
        (Some(entries), true) => {
            let mut decoded = Vec::with_capacity(entries.len());
            for entry in entries {
                let kind = WallKind::from_code(entry.k)
                    .ok_or_else(|| format!("unknown wall code {} in snapshot", entry.k))?;
                if entry.x >= map.width || entry.y >= map.height {
                    return Err(format!(
                        "wall ({}, {}) outside map {}",
                        entry.x, entry.y, map.key
                    ));
                }
                decoded.push(Wall {
                    x: entry.x,
                    y: entry.y,
                    kind,
                });
            }
            Some(decoded)
        }
        _ => None,
    };

    let entities = match (&snapshot.entities, options.entities) {
        (Some(entries), true) => {
            let mut decoded = Vec::with_capacity(entries.len());
            for entry in entries {
                let kind = EntityKind::from_code(entry.kind)
                    .ok_or_else(|| format!("unknown entity code {} in snapshot", entry.kind))?;
                if !map.contains(entry.x, entry.y) {
                    return Err(format!(
                        "entity at ({}, {}) outside map {}",
                        entry.x, entry.y, map.key
                    ));
                }
                decoded.push((kind, entry.x, entry.y, entry.options.clone()));
            }
            Some(decoded)
        }
        _ => None,
    };

    let mut outcome = ApplyOutcome::default();

    if options.clear {
        for entity in map.find_entities(|entity| entity.editable) {
            map.take_entity(entity.id);
            outcome.removed.push(entity.id);
        }
        map.walls.clear();
    }

    if let Some(decoded) = tiles {
        for (index, tile) in decoded.into_iter().enumerate() {
            let x = index as u32 % map.width;
            let y = index as u32 / map.width;
            map.set_tile(x, y, tile)?;
        }
    }

    if let Some(decoded) = walls {
        for wall in decoded {
            map.walls.insert(wall);
        }
    }

    if let Some(decoded) = entities {
        for (kind, x, y, entity_options) in decoded {
            let id = alloc_id();
            let mut entity = Entity::new(id, kind, x, y);
            entity.options = entity_options;
            entity.editable = options.entities_editable;
            map.insert_entity(entity)?;
            outcome.added.push(id);
        }
    }

    Ok(outcome)
}

/// Tile grids compare equal cell by cell.
pub fn same_tiles(a: &WorldMap, b: &WorldMap) -> bool {
    if a.width != b.width || a.height != b.height {
        return false;
    }
    for y in 0..a.height {
        for x in 0..a.width {
            if a.tile(x, y) != b.tile(x, y) {
                return false;
            }
        }
    }
    true
}
