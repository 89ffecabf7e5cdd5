mod config;
pub mod admin;
pub mod chat;
pub mod entities;
pub mod persistence;
pub mod telemetry;
pub mod world;

pub use admin::commands::{
    command_table, help_text, parse_command, run_command, spam_command_names, Command,
    CommandCtx, CommandError, Parsed,
};
pub use admin::roles::{Grants, Privilege, RequiredRole};
pub use chat::{ChatType, MessageKind, Notifier};
pub use config::{AppConfig, ServerSettings};
pub use world::state::{ClientId, World};

use entities::entity::EntityId;
use persistence::accounts::{AccountId, AccountRegistry};
use persistence::autosave::{autosave_world, AutosaveConfig, AutosaveState};
use persistence::store::SnapshotStore;
use world::map::MapKey;
use world::maps::{build_main_map, MAIN_MAP_ID};
use world::party::PartyService;
use world::rng::WorldRng;
use world::snapshot::LoadOptions;

use std::io::BufRead;
use std::time::Instant;

/// Notifier for the local operator console: everything goes straight
/// to stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn system(&mut self, _client: ClientId, message: &str) {
        println!("{}", message);
    }

    fn chat(&mut self, _from: ClientId, _chat_type: ChatType, kind: MessageKind, message: &str) {
        match kind {
            MessageKind::Announcement => println!("* {}", message),
            _ => println!("{}", message),
        }
    }

    fn entity_added(&mut self, _map: &MapKey, _entity: EntityId) {}

    fn entity_removed(&mut self, _map: &MapKey, _entity: EntityId) {}

    fn client_disconnected(&mut self, _client: ClientId, reason: &str) {
        println!("disconnected: {}", reason);
    }
}

const OPERATOR_ACCOUNT: &str = "operator";

/// Boot the world and drive a local operator console session over
/// stdin until EOF or a disconnect command.
pub fn run(args: &[String]) -> Result<(), String> {
    let config = AppConfig::from_args(args)?;
    telemetry::logging::init(&config.root)?;
    let settings = ServerSettings::load(&config.settings_path)?;

    let mut accounts = match AccountRegistry::load(&config.root)? {
        Some(accounts) => accounts,
        None => AccountRegistry::new(),
    };
    let mut store = SnapshotStore::new(config.root.clone(), settings.snapshot_cache_size);
    let mut party = PartyService::new();
    let mut notifier = ConsoleNotifier;

    let mut world = World::new(settings.time_scale, WorldRng::from_clock());
    let main = build_main_map(&mut world, &mut notifier)?;
    restore_main_map(&mut world, &mut store, &mut notifier)?;

    // The console operator gets superadmin on first boot; afterwards
    // the account file is authoritative.
    let fresh_root = accounts.is_empty();
    let record = accounts.get_or_create(&AccountId::from(OPERATOR_ACCOUNT), OPERATOR_ACCOUNT);
    if fresh_root && record.privilege == Privilege::None {
        record.privilege = Privilege::Superadmin;
    }
    let grants = accounts
        .get(&AccountId::from(OPERATOR_ACCOUNT))
        .map(|record| record.grants())
        .unwrap_or_default();

    let (x, y) = world.spawn_target(&main, "spawn")?;
    let operator = world.add_client(
        AccountId::from(OPERATOR_ACCOUNT),
        OPERATOR_ACCOUNT,
        grants,
        &main,
        x,
        y,
        &mut notifier,
    )?;

    telemetry::logging::log_game(&format!(
        "session start: root={}, maps={}, accounts={}",
        config.root.display(),
        world.map_keys().len(),
        accounts.len()
    ));
    println!("meadow: world up, type /help for commands");

    let autosave_config = AutosaveConfig {
        interval_seconds: settings.autosave_interval_secs,
    };
    let mut autosave = AutosaveState::new(autosave_config, world.now());

    let stdin = std::io::stdin();
    let mut last = Instant::now();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| format!("stdin read failed: {}", err))?;

        let elapsed = last.elapsed();
        last = Instant::now();
        world.tick(elapsed, &mut notifier);

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        world.touch(operator);

        match parse_command(text, ChatType::Say) {
            Parsed::Plain { text, chat_type } => {
                telemetry::logging::log_chat(&format!("[{}] {}", OPERATOR_ACCOUNT, text));
                notifier.chat(operator, chat_type, MessageKind::Chat, &text);
            }
            Parsed::Invoke {
                name,
                args,
                chat_type,
            } => {
                let mut ctx = CommandCtx {
                    world: &mut world,
                    notifier: &mut notifier,
                    settings: &settings,
                    party: &mut party,
                    accounts: &mut accounts,
                    store: &mut store,
                    root: &config.root,
                };
                match run_command(&mut ctx, operator, &name, &args, chat_type, None) {
                    Ok(true) => {}
                    Ok(false) => notifier.chat(operator, chat_type, MessageKind::Chat, text),
                    Err(CommandError::User(message)) => notifier.system(operator, &message),
                    Err(CommandError::Internal(message)) => {
                        telemetry::logging::log_error(&message);
                        eprintln!("meadow: command failed: {}", message);
                    }
                }
            }
        }

        // /dc and /leave remove the operator; end the session.
        if world.client(operator).is_none() {
            break;
        }

        if autosave.due(world.now()) {
            let report = autosave_world(&world, &accounts, &mut store, &config.root);
            if !report.clean() {
                for err in &report.map_errors {
                    eprintln!("meadow: autosave map error: {}", err);
                }
                if let Some(err) = &report.account_error {
                    eprintln!("meadow: autosave account error: {}", err);
                }
            }
            autosave.mark_saved(world.now());
        }
    }

    let report = autosave_world(&world, &accounts, &mut store, &config.root);
    for err in &report.map_errors {
        eprintln!("meadow: shutdown save error: {}", err);
    }
    if let Some(err) = &report.account_error {
        eprintln!("meadow: shutdown save error: {}", err);
    }
    telemetry::logging::log_game("session end");
    Ok(())
}

/// Bring back the persisted main-map terrain. Only tiles are restored;
/// the built-in fixtures are rebuilt by `build_main_map` and an
/// additive entity load would duplicate them.
fn restore_main_map(
    world: &mut World,
    store: &mut SnapshotStore,
    notifier: &mut dyn Notifier,
) -> Result<(), String> {
    let Some(snapshot) = store.load_snapshot(MAIN_MAP_ID)? else {
        return Ok(());
    };
    let options = LoadOptions {
        tiles: true,
        entities: false,
        walls: false,
        entities_editable: false,
        clear: false,
    };
    world.apply_snapshot(&MapKey::new(MAIN_MAP_ID), &snapshot, &options, notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageBuffer;
    use crate::world::snapshot::{capture, SaveOptions};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("meadow-lib-test-{}", suffix))
    }

    #[test]
    fn restore_brings_back_saved_terrain() {
        use crate::world::region::TileType;

        let root = temp_root();
        let mut store = SnapshotStore::new(root.clone(), 4);
        let mut buffer = MessageBuffer::new();

        let mut world = World::new(24.0, WorldRng::from_seed(3));
        let main = build_main_map(&mut world, &mut buffer).unwrap();
        world
            .map_mut(&main)
            .unwrap()
            .set_tile(1, 1, TileType::Stone)
            .unwrap();
        let snapshot = capture(world.map(&main).unwrap(), &SaveOptions::all());
        store.save_snapshot(MAIN_MAP_ID, &snapshot).unwrap();

        let mut fresh = World::new(24.0, WorldRng::from_seed(3));
        let main = build_main_map(&mut fresh, &mut buffer).unwrap();
        let before = fresh.map(&main).unwrap().entity_count();
        restore_main_map(&mut fresh, &mut store, &mut buffer).unwrap();
        assert_eq!(fresh.map(&main).unwrap().tile(1, 1), Some(TileType::Stone));
        // Entities are rebuilt, not restored, so nothing doubled up.
        assert_eq!(fresh.map(&main).unwrap().entity_count(), before);

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn restore_is_a_no_op_without_a_snapshot() {
        let root = temp_root();
        let mut store = SnapshotStore::new(root.clone(), 4);
        let mut buffer = MessageBuffer::new();
        let mut world = World::new(24.0, WorldRng::from_seed(3));
        build_main_map(&mut world, &mut buffer).unwrap();
        restore_main_map(&mut world, &mut store, &mut buffer).unwrap();
        let _ = std::fs::remove_dir_all(root);
    }
}
