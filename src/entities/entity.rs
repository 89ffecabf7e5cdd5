use crate::entities::kinds::EntityKind;
use crate::world::state::ClientId;
use serde::{Deserialize, Serialize};

/// World-unique entity handle. Ids are allocated by the world from a
/// strictly increasing counter and never reused while the process runs,
/// so a stale id held across a delay resolves to nothing instead of to
/// an unrelated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// Counters an account can accumulate by picking things up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Gifts,
    Candies,
    Eggs,
    Clovers,
}

impl CounterKind {
    pub fn name(self) -> &'static str {
        match self {
            CounterKind::Gifts => "gifts",
            CounterKind::Candies => "candies",
            CounterKind::Eggs => "eggs",
            CounterKind::Clovers => "clovers",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CounterKind::Gifts => "🎁",
            CounterKind::Candies => "🍬",
            CounterKind::Eggs => "🥚",
            CounterKind::Clovers => "🍀",
        }
    }
}

/// What happens when a client interacts with an entity. Kept as data so
/// entities stay plain values; the world interprets these.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Award a counter, despawn, respawn in place after the delay.
    Collect {
        counter: CounterKind,
        respawn_ms: u64,
    },
    /// Signs with fixed text.
    ShowText(String),
    /// Signs that send the client to another map's spawn target.
    GoToMap { id: String, target: String },
}

/// Free-form per-entity data carried through snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact_range: Option<f32>,
}

impl EntityOptions {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.text.is_none() && self.interact_range.is_none()
    }
}

/// Anything placed in the world. Owned by exactly one map at a time;
/// positions are in fractional tile units.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub options: EntityOptions,
    /// Player-placed; subject to house save/load/reset.
    pub editable: bool,
    /// Set for client-controlled ponies; such entities are removed when
    /// their client disconnects.
    pub owner: Option<ClientId>,
    pub interact: Option<Interaction>,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, x: f32, y: f32) -> Self {
        Entity {
            id,
            kind,
            x,
            y,
            options: EntityOptions::default(),
            editable: false,
            owner: None,
            interact: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interact = Some(interaction);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_empty_detection() {
        let mut options = EntityOptions::default();
        assert!(options.is_empty());
        options.name = Some("sign".to_string());
        assert!(!options.is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let entity = Entity::new(EntityId(5), EntityKind::Sign, 1.0, 2.0)
            .named("welcome")
            .editable(true)
            .with_interaction(Interaction::ShowText("hi".to_string()));
        assert_eq!(entity.id, EntityId(5));
        assert_eq!(entity.options.name.as_deref(), Some("welcome"));
        assert!(entity.editable);
        assert!(matches!(entity.interact, Some(Interaction::ShowText(_))));
    }
}
