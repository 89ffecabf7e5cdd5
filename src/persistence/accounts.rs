use crate::admin::roles::{Grants, Privilege};
use crate::entities::entity::CounterKind;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Normalized account key. Lookup is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub String);

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.trim().to_ascii_lowercase())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        AccountId::from(value.as_str())
    }
}

/// Collectible tallies for one account. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub gifts: u32,
    pub candies: u32,
    pub eggs: u32,
    pub clovers: u32,
}

impl Counters {
    pub fn get(&self, kind: CounterKind) -> u32 {
        match kind {
            CounterKind::Gifts => self.gifts,
            CounterKind::Candies => self.candies,
            CounterKind::Eggs => self.eggs,
            CounterKind::Clovers => self.clovers,
        }
    }

    fn slot(&mut self, kind: CounterKind) -> &mut u32 {
        match kind {
            CounterKind::Gifts => &mut self.gifts,
            CounterKind::Candies => &mut self.candies,
            CounterKind::Eggs => &mut self.eggs,
            CounterKind::Clovers => &mut self.clovers,
        }
    }

    /// Apply a signed delta, clamping at zero.
    pub fn adjust(&mut self, kind: CounterKind, delta: i64) -> u32 {
        let slot = self.slot(kind);
        let next = (*slot as i64).saturating_add(delta).max(0);
        *slot = next.min(u32::MAX as i64) as u32;
        *slot
    }

    pub fn clear(&mut self, kind: CounterKind) {
        *self.slot(kind) = 0;
    }
}

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub name: String,
    pub privilege: Privilege,
    pub supporter: u8,
    pub counters: Counters,
    /// Serialized house snapshot, stored as one JSON document.
    pub saved_map: Option<String>,
}

impl AccountRecord {
    pub fn new(name: impl Into<String>) -> Self {
        AccountRecord {
            name: name.into(),
            privilege: Privilege::None,
            supporter: 0,
            counters: Counters::default(),
            saved_map: None,
        }
    }

    pub fn grants(&self) -> Grants {
        Grants::new(self.privilege, self.supporter)
    }
}

/// On-disk account registry, one `accounts.txt` under the save root.
/// The previous file is kept as `accounts.txt#` on every write.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: BTreeMap<AccountId, AccountRecord>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        AccountRegistry::default()
    }

    pub fn load(root: &Path) -> Result<Option<Self>, String> {
        let path = accounts_path(root);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(format!(
                    "account registry read failed for {}: {}",
                    path.display(),
                    err
                ))
            }
        };
        let accounts = parse_accounts(&data)?;
        Ok(Some(AccountRegistry { accounts }))
    }

    pub fn save(&self, root: &Path) -> Result<(), String> {
        let dir = root.join("save");
        fs::create_dir_all(&dir).map_err(|err| {
            format!("save dir create failed for {}: {}", dir.display(), err)
        })?;
        let path = accounts_path(root);
        let backup = accounts_backup_path(root);
        if path.exists() {
            fs::copy(&path, &backup).map_err(|err| {
                format!("account backup failed for {}: {}", backup.display(), err)
            })?;
        }
        fs::write(&path, self.serialize()).map_err(|err| {
            format!("account write failed for {}: {}", path.display(), err)
        })
    }

    pub fn get(&self, id: &AccountId) -> Option<&AccountRecord> {
        self.accounts.get(id)
    }

    pub fn get_or_create(&mut self, id: &AccountId, name: &str) -> &mut AccountRecord {
        self.accounts
            .entry(id.clone())
            .or_insert_with(|| AccountRecord::new(name))
    }

    pub fn get_mut(&mut self, id: &AccountId) -> Option<&mut AccountRecord> {
        self.accounts.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str("# meadow account registry\n");
        for record in self.accounts.values() {
            out.push('\n');
            out.push_str(&format!("account = {}\n", record.name));
            if record.privilege != Privilege::None {
                out.push_str(&format!("privilege = {}\n", record.privilege.name()));
            }
            if record.supporter != 0 {
                out.push_str(&format!("supporter = {}\n", record.supporter));
            }
            for kind in [
                CounterKind::Gifts,
                CounterKind::Candies,
                CounterKind::Eggs,
                CounterKind::Clovers,
            ] {
                let value = record.counters.get(kind);
                if value != 0 {
                    out.push_str(&format!("{} = {}\n", kind.name(), value));
                }
            }
            if let Some(saved) = &record.saved_map {
                out.push_str(&format!("saved_map = \"{}\"\n", escape_string(saved)));
            }
        }
        out
    }
}

fn accounts_path(root: &Path) -> PathBuf {
    root.join("save").join("accounts.txt")
}

fn accounts_backup_path(root: &Path) -> PathBuf {
    root.join("save").join("accounts.txt#")
}

#[derive(Debug, Default)]
struct AccountEntry {
    name: Option<String>,
    privilege: Option<Privilege>,
    supporter: Option<u8>,
    counters: Counters,
    saved_map: Option<String>,
}

impl AccountEntry {
    fn has_data(&self) -> bool {
        self.name.is_some()
    }

    fn into_record(self, line_no: usize) -> Result<AccountRecord, String> {
        let name = self
            .name
            .ok_or_else(|| format!("accounts.txt missing account name at line {}", line_no))?;
        Ok(AccountRecord {
            name,
            privilege: self.privilege.unwrap_or(Privilege::None),
            supporter: self.supporter.unwrap_or(0),
            counters: self.counters,
            saved_map: self.saved_map,
        })
    }
}

fn parse_accounts(data: &str) -> Result<BTreeMap<AccountId, AccountRecord>, String> {
    let mut accounts = BTreeMap::new();
    let mut entry = AccountEntry::default();
    let mut last_line = 1usize;

    let flush = |entry: &mut AccountEntry,
                 accounts: &mut BTreeMap<AccountId, AccountRecord>,
                 line_no: usize|
     -> Result<(), String> {
        if !entry.has_data() {
            return Ok(());
        }
        let record = std::mem::take(entry).into_record(line_no)?;
        let key = AccountId::from(record.name.as_str());
        if accounts.contains_key(&key) {
            return Err(format!(
                "accounts.txt duplicate account '{}' at line {}",
                record.name, line_no
            ));
        }
        accounts.insert(key, record);
        Ok(())
    };

    for (idx, raw_line) in data.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = split_kv(line, line_no)?;
        match key {
            "account" => {
                flush(&mut entry, &mut accounts, last_line)?;
                entry.name = Some(parse_string(value, "account", line_no)?);
            }
            "privilege" => {
                entry.privilege = Some(Privilege::parse(value).ok_or_else(|| {
                    format!(
                        "accounts.txt unknown privilege '{}' at line {}",
                        value, line_no
                    )
                })?);
            }
            "supporter" => {
                entry.supporter = Some(parse_u32(value, "supporter", line_no)?.min(3) as u8);
            }
            "gifts" => entry.counters.gifts = parse_u32(value, "gifts", line_no)?,
            "candies" => entry.counters.candies = parse_u32(value, "candies", line_no)?,
            "eggs" => entry.counters.eggs = parse_u32(value, "eggs", line_no)?,
            "clovers" => entry.counters.clovers = parse_u32(value, "clovers", line_no)?,
            "saved_map" => {
                entry.saved_map = Some(parse_string(value, "saved_map", line_no)?);
            }
            other => {
                return Err(format!(
                    "accounts.txt unknown field '{}' at line {}",
                    other, line_no
                ));
            }
        }
        last_line = line_no;
    }
    flush(&mut entry, &mut accounts, last_line)?;

    Ok(accounts)
}

fn split_kv(line: &str, line_no: usize) -> Result<(&str, &str), String> {
    let (key, value) = line.split_once('=').ok_or_else(|| {
        format!(
            "accounts.txt expected key=value at line {}, got '{}'",
            line_no, line
        )
    })?;
    Ok((key.trim(), value.trim()))
}

fn parse_u32(value: &str, label: &str, line_no: usize) -> Result<u32, String> {
    value.parse::<u32>().map_err(|_| {
        format!(
            "{} expects unsigned int at line {}, got '{}'",
            label, line_no, value
        )
    })
}

fn parse_string(value: &str, label: &str, line_no: usize) -> Result<String, String> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        unescape_string(&value[1..value.len() - 1])
            .map_err(|err| format!("{} string parse failed at line {}: {}", label, line_no, err))
    } else {
        Ok(value.to_string())
    }
}

fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_string(input: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(next) = chars.next() else {
            return Err("invalid escape: trailing backslash".to_string());
        };
        match next {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            other => return Err(format!("invalid escape '\\{}'", other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        std::env::temp_dir().join(format!("meadow-accounts-test-{}", suffix))
    }

    #[test]
    fn registry_round_trip() {
        let root = temp_root();
        let mut registry = AccountRegistry::new();
        {
            let record = registry.get_or_create(&AccountId::from("Apple"), "Apple");
            record.privilege = Privilege::Admin;
            record.supporter = 2;
            record.counters.adjust(CounterKind::Gifts, 5);
            record.saved_map = Some("{\"version\":1}".to_string());
        }
        registry.get_or_create(&AccountId::from("berry"), "berry");
        registry.save(&root).expect("save");

        let loaded = AccountRegistry::load(&root).expect("load").expect("some");
        assert_eq!(loaded.len(), 2);
        let apple = loaded.get(&AccountId::from("apple")).expect("apple");
        assert_eq!(apple.privilege, Privilege::Admin);
        assert_eq!(apple.supporter, 2);
        assert_eq!(apple.counters.gifts, 5);
        assert_eq!(apple.saved_map.as_deref(), Some("{\"version\":1}"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_file_is_none() {
        let root = temp_root();
        assert!(AccountRegistry::load(&root).expect("load").is_none());
    }

    #[test]
    fn save_keeps_backup_of_previous_file() {
        let root = temp_root();
        let mut registry = AccountRegistry::new();
        registry.get_or_create(&AccountId::from("apple"), "apple");
        registry.save(&root).expect("first save");
        registry.get_or_create(&AccountId::from("berry"), "berry");
        registry.save(&root).expect("second save");

        let backup = fs::read_to_string(accounts_backup_path(&root)).expect("backup");
        assert!(backup.contains("account = apple"));
        assert!(!backup.contains("account = berry"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn duplicate_account_rejected() {
        let data = "account = apple\n\naccount = Apple\n";
        assert!(parse_accounts(data).is_err());
    }

    #[test]
    fn counter_adjust_clamps_at_zero() {
        let mut counters = Counters::default();
        assert_eq!(counters.adjust(CounterKind::Candies, 3), 3);
        assert_eq!(counters.adjust(CounterKind::Candies, -10), 0);
        counters.clear(CounterKind::Candies);
        assert_eq!(counters.get(CounterKind::Candies), 0);
    }

    #[test]
    fn saved_map_string_escaping_round_trips() {
        let raw = "{\"a\":\"line\\nbreak\"}";
        let escaped = escape_string(raw);
        assert_eq!(unescape_string(&escaped).expect("unescape"), raw);
    }
}
