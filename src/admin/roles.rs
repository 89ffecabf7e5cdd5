/// Staff privilege levels, totally ordered. A level authorizes itself
/// and everything below it; there are no lateral roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Privilege {
    #[default]
    None,
    Mod,
    Admin,
    Superadmin,
}

impl Privilege {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => Some(Privilege::None),
            "mod" => Some(Privilege::Mod),
            "admin" => Some(Privilege::Admin),
            "superadmin" => Some(Privilege::Superadmin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Privilege::None => "",
            Privilege::Mod => "mod",
            Privilege::Admin => "admin",
            Privilege::Superadmin => "superadmin",
        }
    }
}

/// What one client actually holds: a privilege level plus a supporter
/// tier (0 for none). Supporter tiers are orthogonal to privilege
/// except that moderator-or-above passes every supporter gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grants {
    pub privilege: Privilege,
    pub supporter: u8,
}

impl Grants {
    pub fn new(privilege: Privilege, supporter: u8) -> Self {
        Grants {
            privilege,
            supporter,
        }
    }
}

/// A command's gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    /// Open to everyone.
    None,
    /// Supporter tier at least N, or moderator-or-above.
    Supporter(u8),
    Privilege(Privilege),
}

impl RequiredRole {
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            return Some(RequiredRole::None);
        }
        if let Some(tier) = value.strip_prefix("sup") {
            return tier.parse::<u8>().ok().map(RequiredRole::Supporter);
        }
        match Privilege::parse(value)? {
            Privilege::None => Some(RequiredRole::None),
            privilege => Some(RequiredRole::Privilege(privilege)),
        }
    }

    pub fn authorizes(self, grants: Grants) -> bool {
        match self {
            RequiredRole::None => true,
            RequiredRole::Supporter(tier) => {
                grants.supporter >= tier || grants.privilege >= Privilege::Mod
            }
            RequiredRole::Privilege(required) => grants.privilege >= required,
        }
    }
}
