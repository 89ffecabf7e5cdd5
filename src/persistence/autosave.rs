use crate::persistence::accounts::AccountRegistry;
use crate::persistence::store::SnapshotStore;
use crate::world::snapshot::{capture, SaveOptions};
use crate::world::state::World;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval_seconds: u64,
}

impl AutosaveConfig {
    pub fn interval(self) -> Option<Duration> {
        if self.interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_seconds.max(1)))
        }
    }
}

/// Due-time tracking over the world's simulated elapsed time. A zero
/// interval disables autosaving.
#[derive(Debug, Clone)]
pub struct AutosaveState {
    interval: Option<Duration>,
    next_due: Option<Duration>,
}

impl AutosaveState {
    pub fn new(config: AutosaveConfig, now: Duration) -> Self {
        let interval = config.interval();
        let next_due = interval.map(|interval| now + interval);
        Self { interval, next_due }
    }

    pub fn due(&self, now: Duration) -> bool {
        self.next_due.map_or(false, |next| now >= next)
    }

    pub fn mark_saved(&mut self, now: Duration) {
        if let Some(interval) = self.interval {
            self.next_due = Some(now + interval);
        }
    }
}

#[derive(Debug, Default)]
pub struct AutosaveReport {
    pub saved_maps: usize,
    pub map_errors: Vec<String>,
    pub account_error: Option<String>,
}

impl AutosaveReport {
    pub fn clean(&self) -> bool {
        self.map_errors.is_empty() && self.account_error.is_none()
    }
}

/// Flush persistent maps and the account registry. Per-map failures are
/// collected, never fatal; one bad map must not block the rest.
pub fn autosave_world(
    world: &World,
    accounts: &AccountRegistry,
    store: &mut SnapshotStore,
    root: &Path,
) -> AutosaveReport {
    let mut report = AutosaveReport::default();
    for key in world.map_keys() {
        let Some(map) = world.map(&key) else { continue };
        if !map.persistent || key.instance.is_some() {
            continue;
        }
        let snapshot = capture(map, &SaveOptions::all());
        match store.save_snapshot(&key.id, &snapshot) {
            Ok(()) => report.saved_maps += 1,
            Err(err) => report.map_errors.push(err),
        }
    }
    if let Err(err) = accounts.save(root) {
        report.account_error = Some(err);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::rng::WorldRng;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("meadow-autosave-test-{}", suffix))
    }

    #[test]
    fn zero_interval_never_due() {
        let state = AutosaveState::new(AutosaveConfig { interval_seconds: 0 }, Duration::ZERO);
        assert!(!state.due(Duration::from_secs(100_000)));
    }

    #[test]
    fn due_after_interval_then_rearmed() {
        let mut state =
            AutosaveState::new(AutosaveConfig { interval_seconds: 60 }, Duration::ZERO);
        assert!(!state.due(Duration::from_secs(59)));
        assert!(state.due(Duration::from_secs(60)));
        state.mark_saved(Duration::from_secs(60));
        assert!(!state.due(Duration::from_secs(61)));
        assert!(state.due(Duration::from_secs(120)));
    }

    #[test]
    fn autosave_writes_persistent_maps_and_accounts() {
        use crate::world::map::{MapKey, WorldMap};
        use crate::world::region::TileType;

        let root = temp_root();
        let mut store = SnapshotStore::new(root.clone(), 4);
        let mut world = World::new(24.0, WorldRng::from_seed(1));
        world
            .add_map(WorldMap::new(MapKey::new("meadow"), 2, 2, TileType::Grass))
            .unwrap();
        let mut house = WorldMap::new(MapKey::instanced("house", "p1"), 1, 1, TileType::Wood);
        house.persistent = false;
        world.add_map(house).unwrap();

        let accounts = AccountRegistry::new();
        let report = autosave_world(&world, &accounts, &mut store, &root);
        assert!(report.clean());
        assert_eq!(report.saved_maps, 1);
        assert!(store.load_snapshot("meadow").unwrap().is_some());

        let _ = fs::remove_dir_all(root);
    }
}
