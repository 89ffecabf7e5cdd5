use crate::admin::roles::{Grants, Privilege, RequiredRole};
use crate::chat::{ChatType, MessageKind, Notifier};
use crate::config::ServerSettings;
use crate::entities::entity::CounterKind;
use crate::persistence::accounts::AccountRegistry;
use crate::persistence::store::SnapshotStore;
use crate::telemetry::logging;
use crate::world::map::{MapKey, Weather};
use crate::world::maps::{remove_toolbox, restore_toolbox, HOUSE_MAP_ID};
use crate::world::party::PartyService;
use crate::world::snapshot::{capture, LoadOptions, SaveOptions};
use crate::world::state::{ClientId, World};
use crate::world::time::format_hour_minutes;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Two-kind handler error. `User` is delivered to the invoking client
/// and consumed; `Internal` propagates past the dispatcher so handler
/// bugs surface instead of becoming chat messages.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    User(String),
    Internal(String),
}

impl CommandError {
    pub fn user(message: impl Into<String>) -> Self {
        CommandError::User(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CommandError::Internal(message.into())
    }
}

/// Shared execution context handed to every handler. A closed set of
/// fields, built per dispatch on the sequential authority path.
pub struct CommandCtx<'a> {
    pub world: &'a mut World,
    pub notifier: &'a mut dyn Notifier,
    pub settings: &'a ServerSettings,
    pub party: &'a mut PartyService,
    pub accounts: &'a mut AccountRegistry,
    pub store: &'a mut SnapshotStore,
    pub root: &'a Path,
}

type Handler =
    fn(&mut CommandCtx<'_>, ClientId, &str, ChatType, Option<ClientId>) -> Result<(), CommandError>;

pub struct Command {
    pub names: &'static [&'static str],
    pub help: &'static str,
    pub required_role: RequiredRole,
    pub category: &'static str,
    pub spam_eligible: bool,
    pub handler: Handler,
}

const CATEGORY_ORDER: [&str; 7] = [
    "Chat",
    "Actions",
    "House",
    "Mod",
    "Admin",
    "Superadmin",
    "Other",
];

fn cmd(
    names: &'static [&'static str],
    help: &'static str,
    required_role: RequiredRole,
    category: &'static str,
    spam_eligible: bool,
    handler: Handler,
) -> Command {
    Command {
        names,
        help,
        required_role,
        category,
        spam_eligible,
        handler,
    }
}

static COMMANDS: OnceLock<Vec<Command>> = OnceLock::new();

/// The full command table. Registration order matters: lookup picks the
/// first command carrying a matching name.
pub fn command_table() -> &'static [Command] {
    COMMANDS.get_or_init(build_commands)
}

fn build_commands() -> Vec<Command> {
    use RequiredRole::None as Anyone;
    let moderator = RequiredRole::Privilege(Privilege::Mod);
    let admin = RequiredRole::Privilege(Privilege::Admin);
    let superadmin = RequiredRole::Privilege(Privilege::Superadmin);

    vec![
        // chat
        cmd(&["help", "h", "?"], "/help - show help", Anyone, "Chat", false, handle_help),
        cmd(
            &["roll", "rand", "random"],
            "/roll [[min-]max] - randomize a number",
            Anyone,
            "Chat",
            true,
            handle_roll,
        ),
        cmd(&["s", "say"], "/s - say", Anyone, "Chat", false, should_not_be_called),
        cmd(&["p", "party"], "/p - party chat", Anyone, "Chat", false, should_not_be_called),
        cmd(&["t", "think"], "/t - thinking balloon", Anyone, "Chat", false, should_not_be_called),
        cmd(
            &["w", "whisper"],
            "/w <name> - whisper to player",
            Anyone,
            "Chat",
            false,
            should_not_be_called,
        ),
        cmd(&["r", "reply"], "/r - reply to whisper", Anyone, "Chat", false, should_not_be_called),
        cmd(&["shrug"], "/shrug - \u{00af}\\_(\u{30c4})_/\u{00af}", Anyone, "Chat", false, should_not_be_called),
        cmd(&["gifts"], "/gifts - show gift score", Anyone, "Chat", true, handle_gifts),
        cmd(&["candies", "candy"], "/candies - show candy score", Anyone, "Chat", true, handle_candies),
        cmd(&["eggs"], "/eggs - show egg score", Anyone, "Chat", true, handle_eggs),
        cmd(&["clovers", "clover"], "/clovers - show clover score", Anyone, "Chat", true, handle_clovers),
        cmd(&["leave"], "/leave - leave the game", Anyone, "Chat", false, handle_leave),
        // house
        cmd(
            &["savehouse"],
            "/savehouse - saves current house setup",
            Anyone,
            "House",
            false,
            handle_savehouse,
        ),
        cmd(
            &["loadhouse"],
            "/loadhouse - loads saved house setup",
            Anyone,
            "House",
            false,
            handle_loadhouse,
        ),
        cmd(
            &["resethouse"],
            "/resethouse - resets house setup to original state",
            Anyone,
            "House",
            false,
            handle_resethouse,
        ),
        cmd(
            &["lockhouse"],
            "/lockhouse - prevents other people from changing the house",
            Anyone,
            "House",
            false,
            handle_lockhouse,
        ),
        cmd(
            &["unlockhouse"],
            "/unlockhouse - enables editing by other people",
            Anyone,
            "House",
            false,
            handle_unlockhouse,
        ),
        cmd(
            &["removetoolbox"],
            "/removetoolbox - removes toolbox from the house",
            Anyone,
            "House",
            false,
            handle_removetoolbox,
        ),
        cmd(
            &["restoretoolbox"],
            "/restoretoolbox - restores toolbox to the house",
            Anyone,
            "House",
            false,
            handle_restoretoolbox,
        ),
        // mod
        cmd(&["m"], "/m - mod text", moderator, "Mod", false, handle_mod_chat),
        cmd(
            &["goto"],
            "/goto <map_id> [instance] - teleport to map spawn",
            moderator,
            "Mod",
            false,
            handle_goto,
        ),
        cmd(
            &["tp"],
            "/tp <location|x y> - teleport to location/coords",
            moderator,
            "Mod",
            false,
            handle_tp,
        ),
        cmd(
            &["locations"],
            "/locations - list all spawn locations on current map",
            moderator,
            "Mod",
            false,
            handle_locations,
        ),
        cmd(
            &["players"],
            "/players - list all players on this map and total",
            moderator,
            "Mod",
            false,
            handle_players,
        ),
        cmd(&["maps"], "/maps - list all maps on the server", moderator, "Mod", false, handle_maps),
        cmd(&["map"], "/map - show current map info", moderator, "Mod", false, handle_map_info),
        // admin
        cmd(&["a"], "/a - admin text", admin, "Admin", false, handle_admin_chat),
        cmd(&["announce"], "/announce - global announcement", admin, "Admin", false, handle_announce),
        cmd(
            &["time"],
            "/time <HH:MM|day|night> - set server time",
            admin,
            "Admin",
            false,
            handle_time,
        ),
        cmd(
            &["collect"],
            "/collect <kind> [amount|clear] - give/remove counters",
            admin,
            "Admin",
            false,
            handle_collect,
        ),
        cmd(&["weather"], "/weather <none|rain>", admin, "Admin", false, handle_weather),
        cmd(
            &["resettiles"],
            "/resettiles - reset tiles to original state",
            admin,
            "Admin",
            false,
            handle_resettiles,
        ),
        // superadmin
        cmd(
            &["savemap"],
            "/savemap <file name> - save map to file",
            superadmin,
            "Superadmin",
            false,
            handle_savemap,
        ),
        cmd(
            &["loadmap"],
            "/loadmap <file name> - load map from file",
            superadmin,
            "Superadmin",
            false,
            handle_loadmap,
        ),
        cmd(&["info"], "/info <id>", superadmin, "Superadmin", false, handle_info),
        cmd(
            &["throwerror"],
            "/throwerror <message> - throw test error",
            superadmin,
            "Superadmin",
            false,
            handle_throwerror,
        ),
        cmd(&["dc"], "/dc", superadmin, "Superadmin", false, handle_dc),
    ]
}

/// Every alias of every spam-eligible command, for the external rate
/// limiter.
pub fn spam_command_names(commands: &[Command]) -> Vec<&'static str> {
    commands
        .iter()
        .filter(|command| command.spam_eligible)
        .flat_map(|command| command.names.iter().copied())
        .collect()
}

/// What `parse_command` made of one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Plain chat, possibly re-labelled by a chat-type alias.
    Plain { text: String, chat_type: ChatType },
    /// A command invocation to hand to `run_command`.
    Invoke {
        name: String,
        args: String,
        chat_type: ChatType,
    },
}

fn chat_type_alias(token: &str, current: ChatType) -> Option<ChatType> {
    match token {
        "p" | "party" => Some(ChatType::Party),
        "s" | "say" => Some(ChatType::Say),
        "t" | "think" => Some(if current == ChatType::Party {
            ChatType::PartyThink
        } else {
            ChatType::Think
        }),
        "ss" => Some(ChatType::Supporter),
        "s1" => Some(ChatType::Supporter1),
        "s2" => Some(ChatType::Supporter2),
        "s3" => Some(ChatType::Supporter3),
        "r" | "reply" | "w" | "whisper" => Some(ChatType::Whisper),
        _ => None,
    }
}

/// Split a line into command and arguments. A leading `/` marks a
/// command, with `/shrug` as the one idiom that never is; chat-type
/// aliases re-label the message instead of invoking anything.
pub fn parse_command(text: &str, chat_type: ChatType) -> Parsed {
    if !text.starts_with('/') || text.len() < 2 || text.to_ascii_lowercase().starts_with("/shrug")
    {
        return Parsed::Plain {
            text: text.to_string(),
            chat_type,
        };
    }

    let body = &text[1..];
    let (token, args) = match body.split_once(char::is_whitespace) {
        Some((token, args)) => (token, args.trim()),
        None => (body, ""),
    };
    let name = token.trim().to_ascii_lowercase();

    if let Some(relabelled) = chat_type_alias(&name, chat_type) {
        return Parsed::Plain {
            text: args.to_string(),
            chat_type: relabelled,
        };
    }

    Parsed::Invoke {
        name,
        args: args.to_string(),
        chat_type,
    }
}

/// Dispatch one invocation. `Ok(true)` means the input was consumed as
/// a command (even if it failed with a user error); `Ok(false)` means
/// unknown or unauthorized, and the caller should fall through to
/// plain chat.
pub fn run_command(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    name: &str,
    args: &str,
    chat_type: ChatType,
    target: Option<ClientId>,
) -> Result<bool, CommandError> {
    let name = name.trim().to_ascii_lowercase();
    let Some(command) = command_table()
        .iter()
        .find(|command| command.names.iter().any(|n| n.eq_ignore_ascii_case(&name)))
    else {
        return Ok(false);
    };
    let grants = client_grants(ctx, client)?;
    if !command.required_role.authorizes(grants) {
        return Ok(false);
    }
    match (command.handler)(ctx, client, args, chat_type, target) {
        Ok(()) => Ok(true),
        Err(CommandError::User(message)) => {
            ctx.notifier.system(client, &message);
            Ok(true)
        }
        Err(err) => Err(err),
    }
}

/// Authorized, help-bearing commands grouped by category in the fixed
/// display order. Empty categories render no header.
pub fn help_text(commands: &[Command], grants: Grants) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for command in commands {
        if command.help.is_empty() || !command.required_role.authorizes(grants) {
            continue;
        }
        let category = if CATEGORY_ORDER.contains(&command.category) {
            command.category
        } else {
            "Other"
        };
        grouped.entry(category).or_default().push(command.help);
    }

    let mut lines: Vec<String> = Vec::new();
    for category in CATEGORY_ORDER {
        if let Some(helps) = grouped.get(category) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(category.to_string());
            lines.extend(helps.iter().map(|help| help.to_string()));
        }
    }
    lines.join("\n")
}

// -- shared helpers --------------------------------------------------

fn client_grants(ctx: &CommandCtx<'_>, client: ClientId) -> Result<Grants, CommandError> {
    ctx.world
        .client(client)
        .map(|c| c.grants)
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))
}

fn client_map_key(ctx: &CommandCtx<'_>, client: ClientId) -> Result<MapKey, CommandError> {
    ctx.world
        .client(client)
        .map(|c| c.map.clone())
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))
}

fn should_not_be_called(
    _ctx: &mut CommandCtx<'_>,
    _client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    Err(CommandError::internal("should not be called"))
}

fn show_counter(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    kind: CounterKind,
    chat_type: ChatType,
) -> Result<(), CommandError> {
    let account = ctx
        .world
        .client(client)
        .map(|c| c.account.clone())
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))?;
    let value = ctx
        .accounts
        .get(&account)
        .map(|record| record.counters.get(kind))
        .unwrap_or(0);
    let message = format!("collected {} {}", value, kind.symbol());
    ctx.notifier
        .chat(client, chat_type, MessageKind::Announcement, &message);
    Ok(())
}

/// House-editing gate: right map id, party leader where required, lock
/// respected, and the per-map save/load slot claimed when the operation
/// touches persistence. Callers that claim the slot must release it.
/// The leader passes the lock check so a locked house stays editable by
/// the one who locked it.
fn ensure_house_editing(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    claim_io: bool,
    only_leader: bool,
) -> Result<MapKey, CommandError> {
    let key = client_map_key(ctx, client)?;
    if key.id != HOUSE_MAP_ID {
        return Err(CommandError::user("Can only be done inside the house"));
    }
    if only_leader && !ctx.party.is_leader(client) {
        return Err(CommandError::user("Only party leader can do this"));
    }
    let locked = ctx
        .world
        .map(&key)
        .map(|map| map.editing_locked)
        .unwrap_or(false);
    if locked && !ctx.party.is_leader(client) {
        return Err(CommandError::user("House is locked"));
    }
    if claim_io {
        let cooldown = Duration::from_secs(ctx.settings.map_load_save_timeout_secs);
        ctx.world
            .begin_map_io(&key, cooldown)
            .map_err(CommandError::User)?;
    }
    Ok(key)
}

// -- chat handlers ---------------------------------------------------

fn handle_help(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let grants = client_grants(ctx, client)?;
    let text = help_text(command_table(), grants);
    ctx.notifier.system(client, &text);
    Ok(())
}

const ROLL_MAX: u32 = 1_000_000;

fn parse_roll(args: &str) -> (u32, u32) {
    let args = args.trim();
    let (min_text, max_text) = match args.split_once('-') {
        Some((min, max)) => (min, max),
        None => ("", args),
    };
    let all_digits =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) && s.len() <= 7;
    let min = if all_digits(min_text) {
        min_text.parse().unwrap_or(1)
    } else {
        1
    };
    // Anything unparseable falls back to the stock 1..100 roll.
    let max = if all_digits(max_text) {
        max_text.parse().unwrap_or(100)
    } else {
        100
    };
    let min = min.min(ROLL_MAX);
    let max = max.clamp(min, ROLL_MAX);
    (min, max)
}

fn handle_roll(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let (min, max) = parse_roll(args);
    let result = ctx.world.rng.roll_range(min, max);
    let range = if min != 1 {
        format!("{}-{}", min, max)
    } else {
        format!("{}", max)
    };
    let message = format!("\u{1f3b2} rolled {} of {}", result, range);
    ctx.notifier
        .chat(client, chat_type, MessageKind::Announcement, &message);
    Ok(())
}

fn handle_gifts(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    show_counter(ctx, client, CounterKind::Gifts, chat_type)
}

fn handle_candies(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    show_counter(ctx, client, CounterKind::Candies, chat_type)
}

fn handle_eggs(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    show_counter(ctx, client, CounterKind::Eggs, chat_type)
}

fn handle_clovers(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    show_counter(ctx, client, CounterKind::Clovers, chat_type)
}

fn handle_leave(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    ctx.world
        .kick(client, "/leave", ctx.notifier)
        .map_err(CommandError::Internal)
}

// -- house handlers --------------------------------------------------

fn handle_savehouse(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, true, false)?;
    let result = save_house(ctx, client, &key);
    ctx.world.end_map_io(&key);
    result
}

fn save_house(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    key: &MapKey,
) -> Result<(), CommandError> {
    let account = ctx
        .world
        .client(client)
        .map(|c| c.account.clone())
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))?;
    let map = ctx
        .world
        .map(key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    let snapshot = capture(map, &SaveOptions::editable());
    let encoded = match SnapshotStore::encode_inline(&snapshot) {
        Ok(encoded) => encoded,
        Err(err) => {
            logging::log_error(&err);
            return Err(CommandError::user("Saving failed"));
        }
    };
    let name = ctx
        .world
        .client(client)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    ctx.accounts.get_or_create(&account, &name).saved_map = Some(encoded);
    if let Err(err) = ctx.accounts.save(ctx.root) {
        logging::log_error(&err);
        return Err(CommandError::user("Saving failed"));
    }
    logging::log_houses(&format!("{} saved house {}", name, key));
    ctx.notifier.system(client, "Saved");
    Ok(())
}

const HOUSE_LOAD_OPTIONS: LoadOptions = LoadOptions {
    tiles: false,
    entities: true,
    walls: true,
    entities_editable: true,
    clear: true,
};

fn handle_loadhouse(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, true, true)?;
    let result = load_house(ctx, client, &key);
    ctx.world.end_map_io(&key);
    result
}

fn load_house(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    key: &MapKey,
) -> Result<(), CommandError> {
    let account = ctx
        .world
        .client(client)
        .map(|c| c.account.clone())
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))?;
    let Some(saved) = ctx
        .accounts
        .get(&account)
        .and_then(|record| record.saved_map.clone())
    else {
        return Err(CommandError::user("No saved map state"));
    };
    let snapshot = match SnapshotStore::parse_inline(&account.0, &saved) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            logging::log_error(&err);
            return Err(CommandError::user("Loading failed"));
        }
    };
    if let Err(err) = ctx
        .world
        .apply_snapshot(key, &snapshot, &HOUSE_LOAD_OPTIONS, ctx.notifier)
    {
        logging::log_error(&err);
        return Err(CommandError::user("Loading failed"));
    }
    logging::log_houses(&format!("loaded house {}", key));
    ctx.notifier.system(client, "Loaded");
    Ok(())
}

fn handle_resethouse(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, true, true)?;
    let result = reset_house(ctx, client, &key);
    ctx.world.end_map_io(&key);
    result
}

fn reset_house(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    key: &MapKey,
) -> Result<(), CommandError> {
    let Some(snapshot) = ctx.world.map(key).and_then(|map| map.default_save.clone()) else {
        return Err(CommandError::user("No default house state"));
    };
    if let Err(err) = ctx
        .world
        .apply_snapshot(key, &snapshot, &HOUSE_LOAD_OPTIONS, ctx.notifier)
    {
        logging::log_error(&err);
        return Err(CommandError::user("Reset failed"));
    }
    logging::log_houses(&format!("reset house {}", key));
    ctx.notifier.system(client, "Reset");
    Ok(())
}

fn handle_lockhouse(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    set_house_lock(ctx, client, true, "House locked")
}

fn handle_unlockhouse(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    set_house_lock(ctx, client, false, "House unlocked")
}

fn set_house_lock(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    locked: bool,
    message: &str,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, false, true)?;
    let map = ctx
        .world
        .map_mut(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    map.editing_locked = locked;
    logging::log_houses(&format!("{} {}", message.to_ascii_lowercase(), key));
    ctx.notifier.system(client, message);
    Ok(())
}

fn handle_removetoolbox(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, true, true)?;
    let result = remove_toolbox(ctx.world, &key, ctx.notifier).map_err(CommandError::Internal);
    ctx.world.end_map_io(&key);
    result?;
    logging::log_houses(&format!("toolbox removed {}", key));
    ctx.notifier.system(client, "Toolbox removed");
    Ok(())
}

fn handle_restoretoolbox(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = ensure_house_editing(ctx, client, true, true)?;
    let result = restore_toolbox(ctx.world, &key, ctx.notifier).map_err(CommandError::Internal);
    ctx.world.end_map_io(&key);
    result?;
    logging::log_houses(&format!("toolbox restored {}", key));
    ctx.notifier.system(client, "Toolbox restored");
    Ok(())
}

// -- mod handlers ----------------------------------------------------

fn handle_mod_chat(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    ctx.notifier.chat(client, chat_type, MessageKind::Mod, args);
    Ok(())
}

fn handle_goto(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let mut parts = args.split_whitespace();
    let Some(id) = parts.next() else {
        // Bare /goto lists what exists.
        let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in ctx.world.map_keys() {
            let instances = by_id.entry(key.id).or_default();
            if let Some(instance) = key.instance {
                instances.push(instance);
            }
        }
        let mut lines = vec!["Available Maps:".to_string()];
        for (id, instances) in by_id {
            if instances.is_empty() {
                lines.push(format!("  {}", id));
            } else {
                lines.push(format!("  {} (instances: {})", id, instances.join(", ")));
            }
        }
        lines.push(String::new());
        lines.push("Usage: /goto <map_id> [instance]".to_string());
        ctx.notifier.system(client, &lines.join("\n"));
        return Ok(());
    };
    let instance = parts.next();

    let key = ctx
        .world
        .map_keys()
        .into_iter()
        .find(|key| key.id == id && instance.map_or(true, |i| key.instance.as_deref() == Some(i)))
        .ok_or_else(|| {
            CommandError::user(format!("Map \"{}\" not found or instance mismatch", id))
        })?;
    let (x, y) = ctx
        .world
        .spawn_target(&key, "spawn")
        .map_err(CommandError::Internal)?;
    ctx.world
        .switch_to_map(client, &key, x, y, ctx.notifier)
        .map_err(CommandError::Internal)?;
    ctx.notifier.system(client, &format!("Teleported to {}", key));
    Ok(())
}

fn handle_tp(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    if args.trim().is_empty() {
        let lines = [
            "Teleport help",
            "",
            "Usage: /tp <location> or /tp <x> <y>",
            "Examples:",
            "  /tp spawn",
            "  /tp 100 200",
        ];
        ctx.notifier.system(client, &lines.join("\n"));
        return Ok(());
    }
    let key = client_map_key(ctx, client)?;
    let (x, y) = ctx
        .world
        .spawn_target(&key, args)
        .map_err(CommandError::User)?;
    let pony = ctx
        .world
        .client(client)
        .map(|c| c.pony)
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))?;
    ctx.world
        .move_entity(pony, x, y)
        .map_err(CommandError::Internal)?;
    ctx.notifier
        .system(client, &format!("Teleported to ({:.1}, {:.1})", x, y));
    Ok(())
}

fn handle_locations(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = client_map_key(ctx, client)?;
    let map = ctx
        .world
        .map(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    let mut names: Vec<&str> = map.spawns.keys().map(|name| name.as_str()).collect();
    names.push("spawn");
    ctx.notifier
        .system(client, &format!("Locations on: {}", names.join(", ")));
    Ok(())
}

fn handle_players(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = client_map_key(ctx, client)?;
    let afk_after = Duration::from_secs(ctx.settings.afk_timeout_secs);
    let now = ctx.world.now();
    let here: Vec<String> = ctx
        .world
        .clients()
        .filter(|c| c.map == key)
        .map(|c| {
            let afk = now.saturating_sub(c.last_action) > afk_after;
            format!("  {}{}", c.name, if afk { " (afk)" } else { "" })
        })
        .collect();
    let mut lines = vec![
        format!(
            "PLAYERS ({} here / {} total)",
            here.len(),
            ctx.world.client_count()
        ),
        String::new(),
    ];
    if here.is_empty() {
        lines.push("No players on this map".to_string());
    } else {
        lines.extend(here);
    }
    ctx.notifier.system(client, &lines.join("\n"));
    Ok(())
}

fn handle_maps(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let mut by_id: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for key in ctx.world.map_keys() {
        let players = ctx.world.clients_on_map(&key).len();
        let entry = by_id.entry(key.id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += players;
    }
    let mut lines = vec![
        format!("Server Maps ({} total)", by_id.len()),
        "---------------------".to_string(),
    ];
    for (index, (id, (_, players))) in by_id.iter().enumerate() {
        let line = if *players == 0 {
            format!("{}. {}", index + 1, id)
        } else {
            let noun = if *players == 1 { "pony" } else { "ponies" };
            format!("{}. {}: {} {}", index + 1, id, players, noun)
        };
        lines.push(line);
    }
    ctx.notifier.system(client, &lines.join("\n"));
    Ok(())
}

fn handle_map_info(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = client_map_key(ctx, client)?;
    let (x, y) = ctx
        .world
        .client(client)
        .and_then(|c| ctx.world.entity_by_id(c.pony))
        .map(|pony| (pony.x, pony.y))
        .ok_or_else(|| CommandError::internal(format!("client {} has no pony", client.0)))?;
    let players = ctx.world.clients_on_map(&key).len();
    let map = ctx
        .world
        .map(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    let lines = [
        "Map info".to_string(),
        "-----------------".to_string(),
        format!("Name:        {}", key),
        format!("Position:    {:.1}x, {:.1}y", x, y),
        format!("Dimensions:  {}x | {}y tiles", map.width, map.height),
        format!("Players:     {}", players),
        format!("Regions:     {}", map.regions.len()),
        format!("Entities:    {}", map.entity_count()),
    ];
    ctx.notifier.system(client, &lines.join("\n"));
    Ok(())
}

// -- admin handlers --------------------------------------------------

fn handle_admin_chat(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    ctx.notifier
        .chat(client, chat_type, MessageKind::Admin, args);
    Ok(())
}

fn handle_announce(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    ctx.notifier
        .chat(client, chat_type, MessageKind::Announcement, args);
    logging::log_game(&format!("announcement: {}", args));
    Ok(())
}

fn handle_time(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let input = args.trim();
    if input.is_empty() {
        let message = format!(
            "Current time: {}",
            format_hour_minutes(ctx.world.clock.hour())
        );
        ctx.notifier.system(client, &message);
        return Ok(());
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    if let Some((hour, minute)) = parse_clock_input(&parts) {
        if hour > 23 || minute > 59 {
            return Err(CommandError::user(
                "Invalid time. Hours must be 0-23, minutes must be 0-59",
            ));
        }
        let value = hour as f64 + minute as f64 / 60.0;
        ctx.world.set_time(value).map_err(CommandError::Internal)?;
        let message = format!("Time set to {}", format_hour_minutes(value));
        ctx.notifier.system(client, &message);
        return Ok(());
    }

    let interval = ctx.settings.time_cycle_interval_ms;
    match parts[0].to_ascii_lowercase().as_str() {
        "day" => {
            ctx.world
                .start_time_cycle(12.0, interval)
                .map_err(CommandError::Internal)?;
            ctx.notifier.system(
                client,
                "Time set to eternal day (12:00) - continuously enforced",
            );
            Ok(())
        }
        "night" => {
            ctx.world
                .start_time_cycle(0.0, interval)
                .map_err(CommandError::Internal)?;
            ctx.notifier.system(
                client,
                "Time set to eternal night (00:00) - continuously enforced",
            );
            Ok(())
        }
        _ => Err(CommandError::user(
            "Usage: /time HH:MM or /time day or /time night",
        )),
    }
}

/// Accepts `HH:MM` as one token or `HH MM` as two. Out-of-range values
/// are the caller's problem; unparseable shapes return `None`.
fn parse_clock_input(parts: &[&str]) -> Option<(u32, u32)> {
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
    let short_number = |s: &str| {
        (1..=2).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
    };
    if parts.len() == 1 {
        let (hour, minute) = parts[0].split_once(':')?;
        if short_number(hour) && two_digits(minute) {
            return Some((hour.parse().ok()?, minute.parse().ok()?));
        }
        return None;
    }
    if parts.len() == 2 && short_number(parts[0]) && two_digits(parts[1]) {
        return Some((parts[0].parse().ok()?, parts[1].parse().ok()?));
    }
    None
}

fn handle_collect(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.is_empty() {
        let lines = [
            "Usage: /collect <kind> [amount|clear]",
            "Kinds: gift/gifts, egg/eggs, clover/clovers, candy/candies",
            "Examples:",
            "  /collect gift 100 - give 100 gifts",
            "  /collect 100 gift - give 100 gifts (order is flexible)",
            "  /collect gift -50 - remove 50 gifts",
            "  /collect gift clear - clear all gifts to 0",
        ];
        ctx.notifier.system(client, &lines.join("\n"));
        return Ok(());
    }

    // Kind and amount may arrive in either order.
    let mut kind: Option<CounterKind> = None;
    let mut amount: Option<&str> = None;
    for part in &parts {
        let lowered = part.to_ascii_lowercase();
        if let Some(parsed) = parse_counter_kind(&lowered) {
            if kind.is_some() {
                return Err(CommandError::user("Type specified twice"));
            }
            kind = Some(parsed);
        } else if lowered == "clear" {
            if amount.is_some() {
                return Err(CommandError::user("Cannot specify amount and clear together"));
            }
            amount = Some("clear");
        } else if part.parse::<i64>().is_ok() {
            match amount {
                Some("clear") => {
                    return Err(CommandError::user("Cannot specify amount and clear together"))
                }
                Some(_) => return Err(CommandError::user("Amount specified twice")),
                None => amount = Some(part),
            }
        } else {
            return Err(CommandError::user(format!("Unknown param: \"{}\"", part)));
        }
    }

    let kind = kind.ok_or_else(|| {
        CommandError::user("Type not specified (gift, egg, clover or candy)")
    })?;
    let amount = amount.ok_or_else(|| CommandError::user("Specify amount or clear"))?;

    let account = ctx
        .world
        .client(client)
        .map(|c| (c.account.clone(), c.name.clone()))
        .ok_or_else(|| CommandError::internal(format!("client {} is not connected", client.0)))?;
    let record = ctx.accounts.get_or_create(&account.0, &account.1);

    if amount == "clear" {
        record.counters.clear(kind);
        ctx.notifier
            .system(client, &format!("{} cleared", kind.name()));
    } else {
        let delta: i64 = amount
            .parse()
            .map_err(|_| CommandError::user("Invalid amount"))?;
        record.counters.adjust(kind, delta);
        let verb = if delta >= 0 { "Given" } else { "Removed" };
        ctx.notifier.system(
            client,
            &format!("{} {} {}", verb, delta.unsigned_abs(), kind.name()),
        );
    }
    Ok(())
}

fn parse_counter_kind(token: &str) -> Option<CounterKind> {
    match token {
        "gift" | "gifts" => Some(CounterKind::Gifts),
        "candy" | "candies" => Some(CounterKind::Candies),
        "egg" | "eggs" => Some(CounterKind::Eggs),
        "clover" | "clovers" => Some(CounterKind::Clovers),
        _ => None,
    }
}

fn handle_weather(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let weather =
        Weather::parse(args.trim()).ok_or_else(|| CommandError::user("invalid weather"))?;
    let key = client_map_key(ctx, client)?;
    let map = ctx
        .world
        .map_mut(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    map.weather = weather;
    ctx.notifier
        .system(client, &format!("Weather set to {}", weather.name()));
    Ok(())
}

fn handle_resettiles(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let key = client_map_key(ctx, client)?;
    let map = ctx
        .world
        .map_mut(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    map.reset_tiles();
    logging::log_game(&format!("tiles reset on {}", key));
    ctx.notifier.system(client, "Tiles reset");
    Ok(())
}

// -- superadmin handlers ---------------------------------------------

fn sanitize_file_name(message: &str) -> Result<String, CommandError> {
    let name: String = message
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if name.is_empty() {
        return Err(CommandError::user("invalid file name"));
    }
    Ok(name)
}

const MAP_FILE_SAVE_OPTIONS: SaveOptions = SaveOptions {
    tiles: true,
    entities: false,
    walls: false,
    editable_only: false,
};

const MAP_FILE_LOAD_OPTIONS: LoadOptions = LoadOptions {
    tiles: true,
    entities: false,
    walls: false,
    entities_editable: false,
    clear: false,
};

fn handle_savemap(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let file_name = sanitize_file_name(args)?;
    let key = client_map_key(ctx, client)?;
    let map = ctx
        .world
        .map(&key)
        .ok_or_else(|| CommandError::internal(format!("map {} does not exist", key)))?;
    let snapshot = capture(map, &MAP_FILE_SAVE_OPTIONS);
    if let Err(err) = ctx.store.save_snapshot(&file_name, &snapshot) {
        logging::log_error(&err);
        return Err(CommandError::user("Saving failed"));
    }
    ctx.notifier.system(client, "saved");
    Ok(())
}

fn handle_loadmap(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let file_name = sanitize_file_name(args)?;
    let key = client_map_key(ctx, client)?;
    let snapshot = match ctx.store.load_snapshot(&file_name) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Err(CommandError::user("file not found")),
        Err(err) => {
            logging::log_error(&err);
            return Err(CommandError::user("Loading failed"));
        }
    };
    if let Err(err) = ctx
        .world
        .apply_snapshot(&key, &snapshot, &MAP_FILE_LOAD_OPTIONS, ctx.notifier)
    {
        logging::log_error(&err);
        return Err(CommandError::user("Loading failed"));
    }
    ctx.notifier.system(client, "loaded");
    Ok(())
}

fn handle_info(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let id: u32 = args
        .trim()
        .parse()
        .map_err(|_| CommandError::user("Usage: /info <entity id>"))?;
    let Some(entity) = ctx.world.entity_by_id(crate::entities::entity::EntityId(id)) else {
        ctx.notifier.system(client, "undefined");
        return Ok(());
    };
    let mut lines = vec![
        format!("id:   {}", entity.id.0),
        format!("kind: {}", entity.kind.name()),
        format!("x:    {}", entity.x),
        format!("y:    {}", entity.y),
    ];
    if let Some(name) = &entity.options.name {
        lines.push(format!("name: {}", name));
    }
    ctx.notifier.system(client, &lines.join("\n"));
    Ok(())
}

fn handle_throwerror(
    _ctx: &mut CommandCtx<'_>,
    _client: ClientId,
    args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    let message = if args.trim().is_empty() {
        "test"
    } else {
        args.trim()
    };
    Err(CommandError::internal(message))
}

fn handle_dc(
    ctx: &mut CommandCtx<'_>,
    client: ClientId,
    _args: &str,
    _chat_type: ChatType,
    _target: Option<ClientId>,
) -> Result<(), CommandError> {
    ctx.world
        .kick(client, "/dc", ctx.notifier)
        .map_err(CommandError::Internal)
}
