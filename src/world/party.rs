use crate::world::state::ClientId;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyId(pub u32);

#[derive(Debug, Clone)]
pub struct Party {
    pub leader: ClientId,
    pub members: Vec<ClientId>,
}

/// Grouping service. House instances are keyed per party, and
/// house-editing operations require the party leader; a client with no
/// party counts as the leader of a party of one.
#[derive(Debug, Default)]
pub struct PartyService {
    parties: BTreeMap<PartyId, Party>,
    by_client: HashMap<ClientId, PartyId>,
    next_id: u32,
}

impl PartyService {
    pub fn new() -> Self {
        PartyService::default()
    }

    pub fn party_of(&self, client: ClientId) -> Option<PartyId> {
        self.by_client.get(&client).copied()
    }

    pub fn members_of(&self, party: PartyId) -> &[ClientId] {
        self.parties
            .get(&party)
            .map(|p| p.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn leader_of(&self, party: PartyId) -> Option<ClientId> {
        self.parties.get(&party).map(|p| p.leader)
    }

    pub fn is_leader(&self, client: ClientId) -> bool {
        match self.party_of(client) {
            Some(party) => self.leader_of(party) == Some(client),
            None => true,
        }
    }

    /// Start a party led by `leader`. Fails if the leader is already
    /// grouped.
    pub fn create(&mut self, leader: ClientId) -> Result<PartyId, String> {
        if self.by_client.contains_key(&leader) {
            return Err(format!("client {} is already in a party", leader.0));
        }
        self.next_id += 1;
        let id = PartyId(self.next_id);
        self.parties.insert(
            id,
            Party {
                leader,
                members: vec![leader],
            },
        );
        self.by_client.insert(leader, id);
        Ok(id)
    }

    pub fn add_member(&mut self, party: PartyId, client: ClientId) -> Result<(), String> {
        if self.by_client.contains_key(&client) {
            return Err(format!("client {} is already in a party", client.0));
        }
        let entry = self
            .parties
            .get_mut(&party)
            .ok_or_else(|| format!("party {} does not exist", party.0))?;
        entry.members.push(client);
        self.by_client.insert(client, party);
        Ok(())
    }

    /// Remove a client from their party. Leadership passes to the
    /// longest-standing remaining member; an emptied party is dropped.
    pub fn leave(&mut self, client: ClientId) -> Option<PartyId> {
        let party = self.by_client.remove(&client)?;
        let disband = {
            let entry = self.parties.get_mut(&party)?;
            entry.members.retain(|m| *m != client);
            if entry.members.is_empty() {
                true
            } else {
                if entry.leader == client {
                    entry.leader = entry.members[0];
                }
                false
            }
        };
        if disband {
            self.parties.remove(&party);
        }
        Some(party)
    }
}
