/// Entity type catalog. Codes are stable and appear in map snapshots;
/// never renumber an existing kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Pony,
    Sign,
    Barrel,
    Crate,
    Lantern,
    Gift,
    Candy,
    Egg,
    Clover,
    Cloud,
    Butterfly,
    Firefly,
    Toolbox,
}

impl EntityKind {
    pub fn code(self) -> u16 {
        match self {
            EntityKind::Pony => 1,
            EntityKind::Sign => 2,
            EntityKind::Barrel => 3,
            EntityKind::Crate => 4,
            EntityKind::Lantern => 5,
            EntityKind::Gift => 10,
            EntityKind::Candy => 11,
            EntityKind::Egg => 12,
            EntityKind::Clover => 13,
            EntityKind::Cloud => 20,
            EntityKind::Butterfly => 21,
            EntityKind::Firefly => 22,
            EntityKind::Toolbox => 30,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            1 => EntityKind::Pony,
            2 => EntityKind::Sign,
            3 => EntityKind::Barrel,
            4 => EntityKind::Crate,
            5 => EntityKind::Lantern,
            10 => EntityKind::Gift,
            11 => EntityKind::Candy,
            12 => EntityKind::Egg,
            13 => EntityKind::Clover,
            20 => EntityKind::Cloud,
            21 => EntityKind::Butterfly,
            22 => EntityKind::Firefly,
            30 => EntityKind::Toolbox,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Pony => "pony",
            EntityKind::Sign => "sign",
            EntityKind::Barrel => "barrel",
            EntityKind::Crate => "crate",
            EntityKind::Lantern => "lantern",
            EntityKind::Gift => "gift",
            EntityKind::Candy => "candy",
            EntityKind::Egg => "egg",
            EntityKind::Clover => "clover",
            EntityKind::Cloud => "cloud",
            EntityKind::Butterfly => "butterfly",
            EntityKind::Firefly => "firefly",
            EntityKind::Toolbox => "toolbox",
        }
    }
}
