use crate::entities::entity::EntityId;
use crate::world::map::MapKey;
use crate::world::state::ClientId;

/// Audience scope of a chat message. Commands like `/p` re-label a
/// message's chat type without invoking a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Say,
    Party,
    Think,
    PartyThink,
    Whisper,
    Supporter,
    Supporter1,
    Supporter2,
    Supporter3,
}

/// How a delivered message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    System,
    Mod,
    Admin,
    Announcement,
}

/// Outbound notification sink. The simulation core produces events;
/// delivery (framing, broadcast fan-out, rendering) belongs to the
/// session layer, which implements this.
pub trait Notifier {
    /// One system line to a single client. Multi-line responses are
    /// newline-separated blocks.
    fn system(&mut self, client: ClientId, message: &str);

    /// Player-originated chat, broadcast per chat type by the session
    /// layer.
    fn chat(&mut self, from: ClientId, chat_type: ChatType, kind: MessageKind, message: &str);

    fn entity_added(&mut self, _map: &MapKey, _entity: EntityId) {}

    fn entity_removed(&mut self, _map: &MapKey, _entity: EntityId) {}

    fn client_disconnected(&mut self, _client: ClientId, _reason: &str) {}
}

/// Collecting notifier for tests and the local console session.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    pub system: Vec<(ClientId, String)>,
    pub chat: Vec<(ClientId, ChatType, MessageKind, String)>,
    pub disconnects: Vec<(ClientId, String)>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// System messages sent to one client, in order.
    pub fn system_for(&self, client: ClientId) -> Vec<&str> {
        self.system
            .iter()
            .filter(|(to, _)| *to == client)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn last_system_for(&self, client: ClientId) -> Option<&str> {
        self.system_for(client).last().copied()
    }

    pub fn clear(&mut self) {
        self.system.clear();
        self.chat.clear();
        self.disconnects.clear();
    }
}

impl Notifier for MessageBuffer {
    fn system(&mut self, client: ClientId, message: &str) {
        self.system.push((client, message.to_string()));
    }

    fn chat(&mut self, from: ClientId, chat_type: ChatType, kind: MessageKind, message: &str) {
        self.chat.push((from, chat_type, kind, message.to_string()));
    }

    fn client_disconnected(&mut self, client: ClientId, reason: &str) {
        self.disconnects.push((client, reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_filters_per_client() {
        let mut buffer = MessageBuffer::new();
        buffer.system(ClientId(1), "first");
        buffer.system(ClientId(2), "other");
        buffer.system(ClientId(1), "second");
        assert_eq!(buffer.system_for(ClientId(1)), vec!["first", "second"]);
        assert_eq!(buffer.last_system_for(ClientId(1)), Some("second"));
        assert_eq!(buffer.last_system_for(ClientId(3)), None);
    }
}
