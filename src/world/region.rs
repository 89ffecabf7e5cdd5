use crate::entities::entity::EntityId;
use crate::world::area::Rect;
use std::collections::BTreeSet;

/// Tiles per region side. Regions are a uniform grid over the map, so
/// region lookup is a pair of integer divisions.
pub const REGION_SIZE: u32 = 8;

/// Tile type catalog. Codes are stable and appear in map snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    None,
    Dirt,
    Grass,
    Water,
    Wood,
    Stone,
    Snow,
}

impl TileType {
    pub fn code(self) -> u8 {
        match self {
            TileType::None => 0,
            TileType::Dirt => 1,
            TileType::Grass => 2,
            TileType::Water => 3,
            TileType::Wood => 4,
            TileType::Stone => 5,
            TileType::Snow => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let tile = match code {
            0 => TileType::None,
            1 => TileType::Dirt,
            2 => TileType::Grass,
            3 => TileType::Water,
            4 => TileType::Wood,
            5 => TileType::Stone,
            6 => TileType::Snow,
            _ => return None,
        };
        Some(tile)
    }

    /// Solid tiles contribute a collider for their cell.
    pub fn is_solid(self) -> bool {
        matches!(self, TileType::None | TileType::Water)
    }
}

/// A one-tile collider, in absolute tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collider {
    pub x: u32,
    pub y: u32,
}

/// Region index for a position. Boundary positions round toward the
/// region containing the lower coordinate; placement and lookup must
/// both go through here or entities fall out of area queries.
pub fn region_coords_for(x: f32, y: f32) -> (u32, u32) {
    let tx = x.max(0.0).floor() as u32;
    let ty = y.max(0.0).floor() as u32;
    (tx / REGION_SIZE, ty / REGION_SIZE)
}

/// A fixed-size square of tiles plus the entities currently inside it.
/// Membership is a cached index over entity positions, not a second
/// source of truth.
#[derive(Debug, Clone)]
pub struct Region {
    pub rx: u32,
    pub ry: u32,
    tiles: Vec<TileType>,
    original_tiles: Vec<TileType>,
    pub colliders: Vec<Collider>,
    entities: BTreeSet<EntityId>,
}

impl Region {
    pub fn new(rx: u32, ry: u32, default_tile: TileType) -> Self {
        let tiles = vec![default_tile; (REGION_SIZE * REGION_SIZE) as usize];
        let mut region = Region {
            rx,
            ry,
            original_tiles: tiles.clone(),
            tiles,
            colliders: Vec::new(),
            entities: BTreeSet::new(),
        };
        region.rebuild_colliders();
        region
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            (self.rx * REGION_SIZE) as f32,
            (self.ry * REGION_SIZE) as f32,
            REGION_SIZE as f32,
            REGION_SIZE as f32,
        )
    }

    /// Tile at region-local coordinates.
    pub fn tile(&self, lx: u32, ly: u32) -> Option<TileType> {
        if lx >= REGION_SIZE || ly >= REGION_SIZE {
            return None;
        }
        Some(self.tiles[(ly * REGION_SIZE + lx) as usize])
    }

    pub fn set_tile(&mut self, lx: u32, ly: u32, tile: TileType) -> Result<(), String> {
        if lx >= REGION_SIZE || ly >= REGION_SIZE {
            return Err(format!(
                "tile coordinate ({}, {}) outside region {}x{}",
                lx, ly, REGION_SIZE, REGION_SIZE
            ));
        }
        self.tiles[(ly * REGION_SIZE + lx) as usize] = tile;
        self.rebuild_colliders();
        Ok(())
    }

    /// Freeze the current tiles as the built-in state `reset_tiles`
    /// falls back to. Map builders call this once composition is done.
    pub fn mark_tiles_original(&mut self) {
        self.original_tiles.clone_from(&self.tiles);
    }

    pub fn reset_tiles(&mut self) {
        self.tiles.clone_from(&self.original_tiles);
        self.rebuild_colliders();
    }

    fn rebuild_colliders(&mut self) {
        self.colliders.clear();
        let base_x = self.rx * REGION_SIZE;
        let base_y = self.ry * REGION_SIZE;
        for ly in 0..REGION_SIZE {
            for lx in 0..REGION_SIZE {
                if self.tiles[(ly * REGION_SIZE + lx) as usize].is_solid() {
                    self.colliders.push(Collider {
                        x: base_x + lx,
                        y: base_y + ly,
                    });
                }
            }
        }
    }

    pub fn insert_entity(&mut self, id: EntityId) {
        self.entities.insert(id);
    }

    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id)
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_index_uses_floor_division() {
        assert_eq!(region_coords_for(0.0, 0.0), (0, 0));
        assert_eq!(region_coords_for(7.9, 7.9), (0, 0));
        // Boundary rounds toward the lower region's far side: exactly 8.0
        // belongs to region 1.
        assert_eq!(region_coords_for(8.0, 0.0), (1, 0));
        assert_eq!(region_coords_for(15.5, 23.0), (1, 2));
    }

    #[test]
    fn region_index_is_deterministic_across_calls() {
        for i in 0..64 {
            let x = i as f32 * 0.73;
            assert_eq!(region_coords_for(x, x), region_coords_for(x, x));
        }
    }

    #[test]
    fn solid_tiles_become_colliders() {
        let mut region = Region::new(2, 1, TileType::Grass);
        assert!(region.colliders.is_empty());
        region.set_tile(3, 4, TileType::Water).unwrap();
        assert_eq!(
            region.colliders,
            vec![Collider {
                x: 2 * REGION_SIZE + 3,
                y: REGION_SIZE + 4
            }]
        );
        region.set_tile(3, 4, TileType::Grass).unwrap();
        assert!(region.colliders.is_empty());
    }

    #[test]
    fn set_tile_rejects_out_of_range() {
        let mut region = Region::new(0, 0, TileType::Grass);
        assert!(region.set_tile(REGION_SIZE, 0, TileType::Dirt).is_err());
    }

    #[test]
    fn reset_restores_marked_tiles() {
        let mut region = Region::new(0, 0, TileType::Grass);
        region.set_tile(2, 2, TileType::Water).unwrap();
        region.mark_tiles_original();
        region.set_tile(2, 2, TileType::Stone).unwrap();
        region.set_tile(5, 5, TileType::Water).unwrap();
        region.reset_tiles();
        assert_eq!(region.tile(2, 2), Some(TileType::Water));
        assert_eq!(region.tile(5, 5), Some(TileType::Grass));
        // Colliders follow the restored tiles.
        assert_eq!(region.colliders, vec![Collider { x: 2, y: 2 }]);
    }

    #[test]
    fn entity_membership_round_trip() {
        let mut region = Region::new(0, 0, TileType::Grass);
        region.insert_entity(EntityId(9));
        assert!(region.contains_entity(EntityId(9)));
        assert_eq!(region.entity_count(), 1);
        assert!(region.remove_entity(EntityId(9)));
        assert!(!region.remove_entity(EntityId(9)));
    }

    #[test]
    fn bounds_cover_region_square() {
        let region = Region::new(1, 2, TileType::Grass);
        let bounds = region.bounds();
        assert!(bounds.contains(8.0, 16.0));
        assert!(bounds.contains(15.9, 23.9));
        assert!(!bounds.contains(7.9, 16.0));
    }
}
