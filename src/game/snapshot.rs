//! Replicated match view
//!
//! The authority publishes an immutable snapshot after every processed
//! event. Replicas only ever read it.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::settings::MatchSettings;

use super::ledger::{MatchPhase, WinningTeam};
use super::player::ControllerKind;
use super::state_machine::MatchStateMachine;
use super::{CharacterId, ParticipantId, TeamId};

/// Replicated part of a player record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ControllerKind,
    pub team: Option<TeamId>,
    pub kills: u32,
    pub deaths: u32,
    pub active: bool,
    pub character: Option<CharacterId>,
}

/// Per-team view: score and colors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSnapshot {
    pub team: TeamId,
    pub score: i32,
    pub color: String,
    pub darker_color: String,
}

/// Everything a replica may read about a match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSnapshot {
    pub session_id: Uuid,
    /// Bumped on every publication
    pub version: u64,
    pub phase: MatchPhase,
    pub remaining_time: u32,
    /// Remaining time as `m:ss`
    pub formatted_time: String,
    pub winning_team: WinningTeam,
    pub match_started: bool,
    pub torn_down: bool,
    pub settings: MatchSettings,
    pub teams: Vec<TeamSnapshot>,
    /// Records in arrival order
    pub players: Vec<PlayerSnapshot>,
}

impl MatchSnapshot {
    /// Scoreboard rows of `team`: active records only
    pub fn scoreboard(&self, team: TeamId) -> Vec<&PlayerSnapshot> {
        self.players
            .iter()
            .filter(|p| p.team == Some(team) && p.active)
            .collect()
    }

    pub fn score(&self, team: TeamId) -> Option<i32> {
        self.teams.iter().find(|t| t.team == team).map(|t| t.score)
    }

    pub fn player(&self, id: &ParticipantId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == *id)
    }

    /// Participants driven by a human
    pub fn human_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.kind == ControllerKind::Human)
            .count()
    }
}

/// Builds snapshots out of the authoritative state
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, machine: &MatchStateMachine) -> MatchSnapshot {
        self.version += 1;
        let ledger = machine.ledger();

        let teams = machine
            .team_colors()
            .iter()
            .enumerate()
            .map(|(team, color)| TeamSnapshot {
                team: team as TeamId,
                score: ledger.score(team as TeamId).unwrap_or(0),
                color: color.primary.to_hex_string(),
                darker_color: color.darker.to_hex_string(),
            })
            .collect();

        let players = machine
            .roster()
            .ordered()
            .into_iter()
            .map(|r| PlayerSnapshot {
                id: r.id(),
                name: r.name().to_string(),
                kind: r.kind(),
                team: r.team(),
                kills: r.kills(),
                deaths: r.deaths(),
                active: r.is_active(),
                character: r.body(),
            })
            .collect();

        MatchSnapshot {
            session_id: machine.session_id(),
            version: self.version,
            phase: ledger.phase(),
            remaining_time: ledger.remaining_time(),
            formatted_time: ledger.formatted_remaining_time(),
            winning_team: ledger.winning_team(),
            match_started: machine.match_started(),
            torn_down: machine.is_torn_down(),
            settings: machine.settings().clone(),
            teams,
            players,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Read-only replica of the authoritative state
#[derive(Debug, Clone)]
pub struct MatchReplica {
    current: Arc<RwLock<Arc<MatchSnapshot>>>,
}

impl MatchReplica {
    pub fn new(initial: MatchSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Latest published snapshot
    pub fn load(&self) -> Arc<MatchSnapshot> {
        self.current.read().clone()
    }

    /// Authority side only
    pub(crate) fn publish(&self, snapshot: MatchSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    pub fn phase(&self) -> MatchPhase {
        self.current.read().phase
    }

    pub fn remaining_time(&self) -> u32 {
        self.current.read().remaining_time
    }

    pub fn winning_team(&self) -> WinningTeam {
        self.current.read().winning_team
    }

    pub fn team_of(&self, participant: &ParticipantId) -> Option<TeamId> {
        self.current.read().player(participant).and_then(|p| p.team)
    }

    /// False when either participant is unknown
    pub fn same_team(&self, a: &ParticipantId, b: &ParticipantId) -> bool {
        let snapshot = self.load();
        match (
            snapshot.player(a).and_then(|p| p.team),
            snapshot.player(b).and_then(|p| p.team),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
