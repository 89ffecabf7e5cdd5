use crate::admin::roles::Grants;
use crate::chat::Notifier;
use crate::entities::entity::{Entity, EntityId, Interaction};
use crate::entities::kinds::EntityKind;
use crate::persistence::accounts::AccountId;
use crate::world::map::{MapKey, WorldMap};
use crate::world::rng::WorldRng;
use crate::world::time::WorldClock;
use crate::world::timers::{TimerId, TimerSystem, TimerTask};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Interactions with no explicit range use this (tile units).
pub const DEFAULT_INTERACT_RANGE: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

/// A connected session. The world owns the registry; the map field is a
/// key for lookup, never an owning reference.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub account: AccountId,
    pub name: String,
    pub grants: Grants,
    pub map: MapKey,
    pub pony: EntityId,
    pub last_action: Duration,
}

/// What an interaction did, for the session layer to finish (counter
/// credit, follow-up teleport).
#[derive(Debug, Clone, PartialEq)]
pub enum InteractOutcome {
    Collected(crate::entities::entity::CounterKind),
    Text(String),
    GoToMap { id: String, target: String },
    Nothing,
}

#[derive(Debug, Default)]
struct MapIo {
    in_flight: bool,
    last_done: Option<Duration>,
}

/// The single simulation authority: every map, client, and timer lives
/// here, and all mutation happens on one sequential path.
pub struct World {
    maps: BTreeMap<MapKey, WorldMap>,
    clients: BTreeMap<ClientId, Client>,
    entity_index: HashMap<EntityId, MapKey>,
    map_io: HashMap<MapKey, MapIo>,
    next_entity_id: u32,
    next_client_id: u32,
    pub clock: WorldClock,
    pub timers: TimerSystem,
    pub rng: WorldRng,
    /// Simulated elapsed time since world start, fed by `tick`.
    now: Duration,
    /// At most one periodic time-assertion timer; replacing it cancels
    /// the previous one.
    time_cycle: Option<TimerId>,
}

impl World {
    pub fn new(time_scale: f64, rng: WorldRng) -> Self {
        World {
            maps: BTreeMap::new(),
            clients: BTreeMap::new(),
            entity_index: HashMap::new(),
            map_io: HashMap::new(),
            next_entity_id: 0,
            next_client_id: 0,
            clock: WorldClock::new(time_scale),
            timers: TimerSystem::new(),
            rng,
            now: Duration::ZERO,
            time_cycle: None,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn now_ms(&self) -> u64 {
        self.now.as_millis() as u64
    }

    /// Next entity id. Strictly increasing for the process lifetime, so
    /// stale ids held across a delay resolve to nothing.
    pub fn alloc_entity_id(&mut self) -> EntityId {
        self.next_entity_id += 1;
        EntityId(self.next_entity_id)
    }

    fn alloc_client_id(&mut self) -> ClientId {
        self.next_client_id += 1;
        ClientId(self.next_client_id)
    }

    // -- maps --------------------------------------------------------

    pub fn add_map(&mut self, map: WorldMap) -> Result<(), String> {
        if self.maps.contains_key(&map.key) {
            return Err(format!("map {} already registered", map.key));
        }
        for id in map.entity_ids() {
            self.entity_index.insert(id, map.key.clone());
        }
        self.maps.insert(map.key.clone(), map);
        Ok(())
    }

    pub fn map(&self, key: &MapKey) -> Option<&WorldMap> {
        self.maps.get(key)
    }

    pub fn map_mut(&mut self, key: &MapKey) -> Option<&mut WorldMap> {
        self.maps.get_mut(key)
    }

    pub fn map_keys(&self) -> Vec<MapKey> {
        self.maps.keys().cloned().collect()
    }

    /// Drop non-persistent maps with no clients on them. A map a client
    /// occupies is never reclaimed.
    pub fn reclaim_empty_instances(&mut self) -> Vec<MapKey> {
        let occupied: Vec<MapKey> = self.clients.values().map(|c| c.map.clone()).collect();
        let doomed: Vec<MapKey> = self
            .maps
            .values()
            .filter(|map| !map.persistent && !occupied.contains(&map.key))
            .map(|map| map.key.clone())
            .collect();
        for key in &doomed {
            if let Some(map) = self.maps.remove(key) {
                for id in map.entity_ids() {
                    self.entity_index.remove(&id);
                }
            }
            self.map_io.remove(key);
        }
        doomed
    }

    // -- clients -----------------------------------------------------

    pub fn add_client(
        &mut self,
        account: AccountId,
        name: impl Into<String>,
        grants: Grants,
        map_key: &MapKey,
        x: f32,
        y: f32,
        notifier: &mut dyn Notifier,
    ) -> Result<ClientId, String> {
        let name = name.into();
        if !self.maps.contains_key(map_key) {
            return Err(format!("map {} does not exist", map_key));
        }
        let client_id = self.alloc_client_id();
        let pony_id = self.alloc_entity_id();
        let mut pony = Entity::new(pony_id, EntityKind::Pony, x, y).named(name.clone());
        pony.owner = Some(client_id);

        let map = self
            .maps
            .get_mut(map_key)
            .ok_or_else(|| format!("map {} does not exist", map_key))?;
        map.insert_entity(pony)?;
        self.entity_index.insert(pony_id, map_key.clone());
        notifier.entity_added(map_key, pony_id);

        let now = self.now;
        self.clients.insert(
            client_id,
            Client {
                id: client_id,
                account,
                name,
                grants,
                map: map_key.clone(),
                pony: pony_id,
                last_action: now,
            },
        );
        Ok(client_id)
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn clients_on_map(&self, key: &MapKey) -> Vec<ClientId> {
        self.clients
            .values()
            .filter(|client| client.map == *key)
            .map(|client| client.id)
            .collect()
    }

    pub fn touch(&mut self, id: ClientId) {
        let now = self.now;
        if let Some(client) = self.clients.get_mut(&id) {
            client.last_action = now;
        }
    }

    /// Forcibly disconnect a client: their pony is removed, their map is
    /// reclaimed if it was a private instance. Safe to call from a
    /// command handler.
    pub fn kick(
        &mut self,
        id: ClientId,
        reason: &str,
        notifier: &mut dyn Notifier,
    ) -> Result<(), String> {
        let client = self
            .clients
            .remove(&id)
            .ok_or_else(|| format!("client {} is not connected", id.0))?;
        if let Some(map) = self.maps.get_mut(&client.map) {
            if map.take_entity(client.pony).is_some() {
                notifier.entity_removed(&client.map, client.pony);
            }
        }
        self.entity_index.remove(&client.pony);
        notifier.client_disconnected(id, reason);
        self.reclaim_empty_instances();
        Ok(())
    }

    // -- entities ----------------------------------------------------

    pub fn entity_by_id(&self, id: EntityId) -> Option<&Entity> {
        let key = self.entity_index.get(&id)?;
        self.maps.get(key)?.entity(id)
    }

    pub fn entity_map(&self, id: EntityId) -> Option<&MapKey> {
        self.entity_index.get(&id)
    }

    /// Place a prepared entity (id already allocated from this world).
    pub fn spawn_entity(
        &mut self,
        map_key: &MapKey,
        entity: Entity,
        notifier: &mut dyn Notifier,
    ) -> Result<EntityId, String> {
        let id = entity.id;
        let map = self
            .maps
            .get_mut(map_key)
            .ok_or_else(|| format!("map {} does not exist", map_key))?;
        map.insert_entity(entity)?;
        self.entity_index.insert(id, map_key.clone());
        notifier.entity_added(map_key, id);
        Ok(id)
    }

    pub fn remove_entity(
        &mut self,
        id: EntityId,
        notifier: &mut dyn Notifier,
    ) -> Result<Entity, String> {
        let key = self
            .entity_index
            .remove(&id)
            .ok_or_else(|| format!("entity {} does not exist", id.0))?;
        let map = self
            .maps
            .get_mut(&key)
            .ok_or_else(|| format!("map {} does not exist", key))?;
        let entity = map
            .take_entity(id)
            .ok_or_else(|| format!("entity {} not on map {}", id.0, key))?;
        notifier.entity_removed(&key, id);
        Ok(entity)
    }

    pub fn move_entity(&mut self, id: EntityId, x: f32, y: f32) -> Result<(), String> {
        let key = self
            .entity_index
            .get(&id)
            .ok_or_else(|| format!("entity {} does not exist", id.0))?
            .clone();
        let map = self
            .maps
            .get_mut(&key)
            .ok_or_else(|| format!("map {} does not exist", key))?;
        map.move_entity(id, x, y)
    }

    /// Move a client's pony to another map as one failure-atomic step.
    /// On any failure the pony is back on its source map at its original
    /// position and an error is returned.
    pub fn switch_to_map(
        &mut self,
        client_id: ClientId,
        dest_key: &MapKey,
        x: f32,
        y: f32,
        notifier: &mut dyn Notifier,
    ) -> Result<(), String> {
        let (pony_id, source_key) = {
            let client = self
                .clients
                .get(&client_id)
                .ok_or_else(|| format!("client {} is not connected", client_id.0))?;
            (client.pony, client.map.clone())
        };
        if source_key == *dest_key {
            return self.move_entity(pony_id, x, y);
        }
        {
            let dest = self
                .maps
                .get(dest_key)
                .ok_or_else(|| format!("map {} does not exist", dest_key))?;
            if !dest.contains(x, y) {
                return Err(format!("position ({}, {}) outside map {}", x, y, dest_key));
            }
        }

        let pony = {
            let source = self
                .maps
                .get_mut(&source_key)
                .ok_or_else(|| format!("map {} does not exist", source_key))?;
            source
                .take_entity(pony_id)
                .ok_or_else(|| format!("entity {} not on map {}", pony_id.0, source_key))?
        };
        let original = (pony.x, pony.y);
        let mut pony = pony;
        pony.x = x;
        pony.y = y;

        let insert_result = match self.maps.get_mut(dest_key) {
            Some(dest) => dest.insert_entity(pony.clone()),
            None => Err(format!("map {} does not exist", dest_key)),
        };
        if let Err(err) = insert_result {
            pony.x = original.0;
            pony.y = original.1;
            if let Some(source) = self.maps.get_mut(&source_key) {
                // Re-inserting at the original position cannot fail:
                // the slot was just vacated.
                source.insert_entity(pony)?;
            }
            return Err(err);
        }

        self.entity_index.insert(pony_id, dest_key.clone());
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.map = dest_key.clone();
        }
        notifier.entity_removed(&source_key, pony_id);
        notifier.entity_added(dest_key, pony_id);
        self.reclaim_empty_instances();
        Ok(())
    }

    /// Run an entity's interaction for a client. Collectibles despawn
    /// and schedule their own respawn; the caller credits the counter.
    pub fn interact_entity(
        &mut self,
        client_id: ClientId,
        entity_id: EntityId,
        notifier: &mut dyn Notifier,
    ) -> Result<InteractOutcome, String> {
        let client = self
            .clients
            .get(&client_id)
            .ok_or_else(|| format!("client {} is not connected", client_id.0))?;
        let map_key = client.map.clone();
        let pony_id = client.pony;

        let (interaction, position) = {
            let map = self
                .maps
                .get(&map_key)
                .ok_or_else(|| format!("map {} does not exist", map_key))?;
            let pony = map
                .entity(pony_id)
                .ok_or_else(|| format!("entity {} not on map {}", pony_id.0, map_key))?;
            let target = match map.entity(entity_id) {
                Some(target) => target,
                None => return Ok(InteractOutcome::Nothing),
            };
            let range = target.options.interact_range.unwrap_or(DEFAULT_INTERACT_RANGE);
            let dx = target.x - pony.x;
            let dy = target.y - pony.y;
            if dx * dx + dy * dy > range * range {
                return Ok(InteractOutcome::Nothing);
            }
            (target.interact.clone(), (target.x, target.y))
        };

        match interaction {
            Some(Interaction::Collect {
                counter,
                respawn_ms,
            }) => {
                let kind = self.remove_entity(entity_id, notifier)?.kind;
                let now_ms = self.now_ms();
                self.timers.schedule(
                    TimerTask::RespawnCollectible {
                        map: map_key,
                        kind,
                        x: position.0,
                        y: position.1,
                        counter,
                        respawn_ms,
                    },
                    respawn_ms,
                    now_ms,
                );
                Ok(InteractOutcome::Collected(counter))
            }
            Some(Interaction::ShowText(text)) => Ok(InteractOutcome::Text(text)),
            Some(Interaction::GoToMap { id, target }) => {
                Ok(InteractOutcome::GoToMap { id, target })
            }
            None => Ok(InteractOutcome::Nothing),
        }
    }

    /// Resolve a spawn-target token on a map, drawing from the world's
    /// RNG for area targets.
    pub fn spawn_target(&mut self, key: &MapKey, token: &str) -> Result<(f32, f32), String> {
        let map = self
            .maps
            .get(key)
            .ok_or_else(|| format!("map {} does not exist", key))?;
        map.spawn_target(token, &mut self.rng)
    }

    /// Restore a snapshot onto a live map, allocating fresh entity ids
    /// and keeping the global index in step. A failed apply leaves the
    /// map unchanged.
    pub fn apply_snapshot(
        &mut self,
        key: &MapKey,
        snapshot: &crate::world::snapshot::MapSnapshot,
        options: &crate::world::snapshot::LoadOptions,
        notifier: &mut dyn Notifier,
    ) -> Result<(), String> {
        let mut map = self
            .maps
            .remove(key)
            .ok_or_else(|| format!("map {} does not exist", key))?;
        let mut next = self.next_entity_id;
        let mut alloc = || {
            next += 1;
            EntityId(next)
        };
        let result = crate::world::snapshot::apply(&mut map, snapshot, options, &mut alloc);
        self.maps.insert(key.clone(), map);
        match result {
            Ok(outcome) => {
                self.next_entity_id = next;
                for id in &outcome.removed {
                    self.entity_index.remove(id);
                    notifier.entity_removed(key, *id);
                }
                for id in &outcome.added {
                    self.entity_index.insert(*id, key.clone());
                    notifier.entity_added(key, *id);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // -- time --------------------------------------------------------

    /// Force the hour. Cancels any active day/night cycle; forcing time
    /// does not, by itself, repeat.
    pub fn set_time(&mut self, hour: f64) -> Result<(), String> {
        self.clock.set_hour(hour)?;
        self.stop_time_cycle();
        Ok(())
    }

    /// Start the periodic re-assertion of a fixed hour. Replaces any
    /// previous cycle; at most one is ever active.
    pub fn start_time_cycle(&mut self, hour: f64, interval_ms: u64) -> Result<(), String> {
        self.clock.set_hour(hour)?;
        self.stop_time_cycle();
        let now_ms = self.now_ms();
        let id = self.timers.schedule(
            TimerTask::AssertHour { hour, interval_ms },
            interval_ms,
            now_ms,
        );
        self.time_cycle = Some(id);
        Ok(())
    }

    pub fn stop_time_cycle(&mut self) -> bool {
        match self.time_cycle.take() {
            Some(id) => self.timers.cancel(id),
            None => false,
        }
    }

    pub fn time_cycle_active(&self) -> bool {
        self.time_cycle.is_some()
    }

    // -- persistence gating ------------------------------------------

    /// Claim the per-map save/load slot. Enforces both the in-flight
    /// guard and the cooldown; the returned error is the user-facing
    /// wait message.
    pub fn begin_map_io(&mut self, key: &MapKey, cooldown: Duration) -> Result<(), String> {
        let now = self.now;
        let io = self.map_io.entry(key.clone()).or_default();
        if io.in_flight {
            return Err("Already saving or loading this map.".to_string());
        }
        if let Some(done) = io.last_done {
            let elapsed = now.saturating_sub(done);
            if elapsed < cooldown {
                let wait = (cooldown - elapsed).as_secs().max(1);
                return Err(format!("Wait {} seconds before trying again.", wait));
            }
        }
        io.in_flight = true;
        Ok(())
    }

    pub fn end_map_io(&mut self, key: &MapKey) {
        let now = self.now;
        if let Some(io) = self.map_io.get_mut(key) {
            io.in_flight = false;
            io.last_done = Some(now);
        }
    }

    // -- tick --------------------------------------------------------

    /// Advance simulated time and fire everything that came due.
    pub fn tick(&mut self, dt: Duration, notifier: &mut dyn Notifier) {
        self.now += dt;
        self.clock.advance(dt);
        let now_ms = self.now_ms();
        while let Some((id, task)) = self.timers.pop_due(now_ms) {
            match task {
                TimerTask::AssertHour { hour, interval_ms } => {
                    if self.time_cycle == Some(id) {
                        // set_hour cannot fail for an hour it accepted
                        // when the cycle was started.
                        let _ = self.clock.set_hour(hour);
                        let next = self.timers.schedule(
                            TimerTask::AssertHour { hour, interval_ms },
                            interval_ms,
                            now_ms,
                        );
                        self.time_cycle = Some(next);
                    }
                }
                TimerTask::RespawnCollectible {
                    map,
                    kind,
                    x,
                    y,
                    counter,
                    respawn_ms,
                } => {
                    // The map may have been reclaimed since the pickup.
                    if self.maps.contains_key(&map) {
                        let id = self.alloc_entity_id();
                        let entity = Entity::new(id, kind, x, y).with_interaction(
                            Interaction::Collect {
                                counter,
                                respawn_ms,
                            },
                        );
                        // Spawn position was valid when collected.
                        let _ = self.spawn_entity(&map, entity, notifier);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageBuffer;
    use crate::entities::entity::CounterKind;
    use crate::world::region::TileType;
    use crate::world::time::DEFAULT_TIME_SCALE;

    fn test_world() -> (World, MapKey) {
        let mut world = World::new(DEFAULT_TIME_SCALE, WorldRng::from_seed(7));
        let key = MapKey::new("meadow");
        world
            .add_map(WorldMap::new(key.clone(), 4, 4, TileType::Grass))
            .unwrap();
        (world, key)
    }

    fn join(world: &mut World, key: &MapKey, name: &str) -> ClientId {
        let mut sink = MessageBuffer::new();
        world
            .add_client(
                AccountId::from(name),
                name,
                Grants::default(),
                key,
                5.0,
                5.0,
                &mut sink,
            )
            .unwrap()
    }

    #[test]
    fn client_ids_strictly_increase() {
        let (mut world, key) = test_world();
        let a = join(&mut world, &key, "apple");
        let b = join(&mut world, &key, "berry");
        assert!(b > a);
        let mut sink = MessageBuffer::new();
        world.kick(a, "test", &mut sink).unwrap();
        let c = join(&mut world, &key, "cherry");
        assert!(c > b);
    }

    #[test]
    fn entity_index_is_global() {
        let (mut world, key) = test_world();
        let client = join(&mut world, &key, "apple");
        let pony = world.client(client).unwrap().pony;
        assert_eq!(world.entity_by_id(pony).unwrap().kind, EntityKind::Pony);
        assert_eq!(world.entity_map(pony), Some(&key));
    }

    #[test]
    fn kick_removes_pony_and_notifies() {
        let (mut world, key) = test_world();
        let client = join(&mut world, &key, "apple");
        let pony = world.client(client).unwrap().pony;

        let mut sink = MessageBuffer::new();
        world.kick(client, "bye", &mut sink).unwrap();

        assert!(world.client(client).is_none());
        assert!(world.entity_by_id(pony).is_none());
        assert_eq!(world.map(&key).unwrap().entity_count(), 0);
        assert_eq!(sink.disconnects, vec![(client, "bye".to_string())]);
    }

    #[test]
    fn switch_to_map_moves_pony_once() {
        let (mut world, key) = test_world();
        let house = MapKey::instanced("house", "p1");
        let mut house_map = WorldMap::new(house.clone(), 2, 2, TileType::Wood);
        house_map.persistent = false;
        world.add_map(house_map).unwrap();

        let client = join(&mut world, &key, "apple");
        let pony = world.client(client).unwrap().pony;
        let mut sink = MessageBuffer::new();

        world
            .switch_to_map(client, &house, 3.0, 3.0, &mut sink)
            .unwrap();
        assert_eq!(world.client(client).unwrap().map, house);
        assert_eq!(world.entity_map(pony), Some(&house));
        assert_eq!(world.map(&key).unwrap().entity_count(), 0);
        assert_eq!(world.map(&house).unwrap().entity_count(), 1);
    }

    #[test]
    fn failed_switch_rolls_back() {
        let (mut world, key) = test_world();
        let client = join(&mut world, &key, "apple");
        let pony = world.client(client).unwrap().pony;
        let mut sink = MessageBuffer::new();

        let missing = MapKey::new("nowhere");
        assert!(world
            .switch_to_map(client, &missing, 1.0, 1.0, &mut sink)
            .is_err());

        // Out-of-bounds destination on an existing map.
        let house = MapKey::new("house");
        world
            .add_map(WorldMap::new(house.clone(), 1, 1, TileType::Wood))
            .unwrap();
        assert!(world
            .switch_to_map(client, &house, 50.0, 1.0, &mut sink)
            .is_err());

        let entity = world.entity_by_id(pony).unwrap();
        assert_eq!((entity.x, entity.y), (5.0, 5.0));
        assert_eq!(world.client(client).unwrap().map, key);
        assert_eq!(world.map(&key).unwrap().entity_count(), 1);
    }

    #[test]
    fn empty_instance_reclaimed_after_leaving() {
        let (mut world, key) = test_world();
        let house = MapKey::instanced("house", "p1");
        let mut house_map = WorldMap::new(house.clone(), 2, 2, TileType::Wood);
        house_map.persistent = false;
        world.add_map(house_map).unwrap();

        let client = join(&mut world, &key, "apple");
        let mut sink = MessageBuffer::new();
        world
            .switch_to_map(client, &house, 2.0, 2.0, &mut sink)
            .unwrap();
        // Occupied instance survives.
        assert!(world.map(&house).is_some());

        world.switch_to_map(client, &key, 5.0, 5.0, &mut sink).unwrap();
        assert!(world.map(&house).is_none());
    }

    #[test]
    fn collect_despawns_and_respawns() {
        let (mut world, key) = test_world();
        let client = join(&mut world, &key, "apple");
        let mut sink = MessageBuffer::new();

        let gift_id = world.alloc_entity_id();
        let gift = Entity::new(gift_id, EntityKind::Gift, 6.0, 5.0).with_interaction(
            Interaction::Collect {
                counter: CounterKind::Gifts,
                respawn_ms: 1000,
            },
        );
        world.spawn_entity(&key, gift, &mut sink).unwrap();

        let outcome = world.interact_entity(client, gift_id, &mut sink).unwrap();
        assert_eq!(outcome, InteractOutcome::Collected(CounterKind::Gifts));
        assert!(world.entity_by_id(gift_id).is_none());

        // Interacting with the stale id is a no-op.
        let again = world.interact_entity(client, gift_id, &mut sink).unwrap();
        assert_eq!(again, InteractOutcome::Nothing);

        world.tick(Duration::from_millis(1000), &mut sink);
        let respawned = world
            .map(&key)
            .unwrap()
            .find_entities(|e| e.kind == EntityKind::Gift);
        assert_eq!(respawned.len(), 1);
        assert_ne!(respawned[0].id, gift_id);
        assert_eq!((respawned[0].x, respawned[0].y), (6.0, 5.0));
    }

    #[test]
    fn out_of_range_interaction_does_nothing() {
        let (mut world, key) = test_world();
        let client = join(&mut world, &key, "apple");
        let mut sink = MessageBuffer::new();

        let sign_id = world.alloc_entity_id();
        let sign = Entity::new(sign_id, EntityKind::Sign, 25.0, 25.0)
            .with_interaction(Interaction::ShowText("far away".to_string()));
        world.spawn_entity(&key, sign, &mut sink).unwrap();

        let outcome = world.interact_entity(client, sign_id, &mut sink).unwrap();
        assert_eq!(outcome, InteractOutcome::Nothing);
    }

    #[test]
    fn time_cycle_is_single_slot() {
        let (mut world, _) = test_world();
        let mut sink = MessageBuffer::new();

        world.start_time_cycle(12.0, 2500).unwrap();
        world.start_time_cycle(0.0, 2500).unwrap();
        assert_eq!(world.timers.len(), 1);
        assert_eq!(world.clock.hour(), 0.0);

        // The cycle keeps re-asserting the hour across ticks.
        for _ in 0..4 {
            world.tick(Duration::from_millis(2500), &mut sink);
            assert!(world.clock.hour() < 0.1);
        }
        assert!(world.time_cycle_active());

        world.set_time(13.5).unwrap();
        assert!(!world.time_cycle_active());
        assert_eq!(world.timers.len(), 0);
        assert!((world.clock.hour() - 13.5).abs() < 1e-9);
    }

    #[test]
    fn map_io_guard_and_cooldown() {
        let (mut world, key) = test_world();
        let cooldown = Duration::from_secs(15);

        world.begin_map_io(&key, cooldown).unwrap();
        // Second request while in flight.
        assert!(world.begin_map_io(&key, cooldown).is_err());
        world.end_map_io(&key);

        // Cooldown not yet elapsed.
        let err = world.begin_map_io(&key, cooldown).unwrap_err();
        assert!(err.starts_with("Wait"));

        let mut sink = MessageBuffer::new();
        world.tick(Duration::from_secs(15), &mut sink);
        world.begin_map_io(&key, cooldown).unwrap();
    }
}
