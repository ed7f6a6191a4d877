//! Registry of live sessions

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::game::{MatchHandle, MatchPhase, MatchSnapshot, WinningTeam};

/// Registry entry
#[derive(Clone)]
pub struct SessionEntry {
    pub handle: MatchHandle,
    pub created_at: DateTime<Utc>,
}

/// Listing view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub game_name: String,
    pub phase: MatchPhase,
    pub remaining_time: u32,
    pub winning_team: WinningTeam,
    pub nb_teams: u32,
    pub players_per_team: u32,
    pub humans: usize,
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    fn new(snapshot: &MatchSnapshot, created_at: DateTime<Utc>) -> Self {
        Self {
            id: snapshot.session_id,
            game_name: snapshot.settings.game_name.clone(),
            phase: snapshot.phase,
            remaining_time: snapshot.remaining_time,
            winning_team: snapshot.winning_team,
            nb_teams: snapshot.settings.nb_teams,
            players_per_team: snapshot.settings.players_per_team,
            humans: snapshot.human_count(),
            created_at,
        }
    }
}

/// All live sessions, keyed by session id
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.sessions.get(id).map(|s| s.value().handle.clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.sessions.insert(
            handle.id,
            SessionEntry {
                handle,
                created_at: Utc::now(),
            },
        );
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.sessions.remove(id).map(|(_, s)| s.handle)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Humans across every session
    pub fn total_humans(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.value().handle.snapshot().human_count())
            .sum()
    }

    pub fn summary(&self, id: &Uuid) -> Option<SessionSummary> {
        self.sessions
            .get(id)
            .map(|s| SessionSummary::new(&s.value().handle.snapshot(), s.value().created_at))
    }

    /// Oldest first
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|s| SessionSummary::new(&s.value().handle.snapshot(), s.value().created_at))
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
