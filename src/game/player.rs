//! Per-participant records (humans and bots)

use std::collections::HashMap;

use serde::Serialize;

use super::{CharacterId, ParticipantId, TeamId};

/// Who drives a record's controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Human,
    Ai,
}

/// Player record (authoritative). Mutated only by the match state machine.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    id: ParticipantId,
    name: String,
    kind: ControllerKind,
    team: Option<TeamId>,
    kills: u32,
    deaths: u32,
    /// Currently drives a body in the world
    active: bool,
    body: Option<CharacterId>,
    /// Arrival order, used for stable listings
    seq: u64,
}

impl PlayerRecord {
    fn new(id: ParticipantId, name: String, kind: ControllerKind, seq: u64) -> Self {
        Self {
            id,
            name,
            kind,
            team: None,
            kills: 0,
            deaths: 0,
            active: false,
            body: None,
            seq,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn is_ai(&self) -> bool {
        self.kind == ControllerKind::Ai
    }

    pub fn team(&self) -> Option<TeamId> {
        self.team
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn body(&self) -> Option<CharacterId> {
        self.body
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_team(&mut self, team: TeamId) {
        self.team = Some(team);
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_body(&mut self, body: Option<CharacterId>) {
        self.body = body;
    }

    pub(crate) fn increment_kills(&mut self) {
        self.kills += 1;
    }

    pub(crate) fn increment_deaths(&mut self) {
        self.deaths += 1;
    }

    pub(crate) fn reset_stats(&mut self) {
        self.kills = 0;
        self.deaths = 0;
    }
}

/// All records of a match, keyed by participant
#[derive(Debug, Default)]
pub struct Roster {
    records: HashMap<ParticipantId, PlayerRecord>,
    next_seq: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and insert a record, returning it for further setup
    pub(crate) fn insert(
        &mut self,
        id: ParticipantId,
        name: String,
        kind: ControllerKind,
    ) -> &mut PlayerRecord {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records
            .entry(id)
            .or_insert_with(|| PlayerRecord::new(id, name, kind, seq))
    }

    pub(crate) fn remove(&mut self, id: &ParticipantId) -> Option<PlayerRecord> {
        self.records.remove(id)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&PlayerRecord> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut PlayerRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn team_of(&self, id: &ParticipantId) -> Option<TeamId> {
        self.records.get(id).and_then(PlayerRecord::team)
    }

    /// Record currently driving `body`
    pub fn controller_of(&self, body: CharacterId) -> Option<&PlayerRecord> {
        self.records.values().find(|r| r.body == Some(body))
    }

    pub(crate) fn controller_of_mut(&mut self, body: CharacterId) -> Option<&mut PlayerRecord> {
        self.records.values_mut().find(|r| r.body == Some(body))
    }

    /// Records in arrival order
    pub fn ordered(&self) -> Vec<&PlayerRecord> {
        let mut records: Vec<&PlayerRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_insert_and_lookup() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();
        roster
            .insert(id, "Calamity".to_string(), ControllerKind::Human)
            .set_team(1);

        assert_eq!(roster.team_of(&id), Some(1));
        assert!(!roster.get(&id).unwrap().is_active());
        assert!(!roster.get(&id).unwrap().is_ai());
    }

    #[test]
    fn test_controller_of_body() {
        let mut roster = Roster::new();
        let bot = Uuid::new_v4();
        roster
            .insert(bot, "Bot 0".to_string(), ControllerKind::Ai)
            .set_body(Some(4));

        assert_eq!(roster.controller_of(4).map(|r| r.id()), Some(bot));
        assert!(roster.controller_of(5).is_none());
    }

    #[test]
    fn test_ordered_follows_arrival() {
        let mut roster = Roster::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            roster.insert(*id, format!("P{i}"), ControllerKind::Human);
        }

        let ordered: Vec<Uuid> = roster.ordered().iter().map(|r| r.id()).collect();
        assert_eq!(ordered, ids);
    }

    #[test]
    fn test_reset_stats() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();
        let record = roster.insert(id, "Doc".to_string(), ControllerKind::Human);
        record.increment_kills();
        record.increment_deaths();
        record.reset_stats();

        assert_eq!(roster.get(&id).map(|r| (r.kills(), r.deaths())), Some((0, 0)));
    }
}
