//! Per-match scorekeeping and clock

use serde::{Deserialize, Serialize};

use crate::util::time::format_match_clock;

use super::TeamId;

/// Points for killing an opponent, awarded to the killer's team
pub const KILL_POINTS: i32 = 10;
/// Points for a suicide, charged to the victim's team
pub const SUICIDE_POINTS: i32 = -5;
/// Points for killing a teammate with an explosive, charged to the killer's team
pub const TEAMMATE_KILL_POINTS: i32 = -5;

/// Match phase, traversed once per match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting in the lobby for the host to start
    InLobby,
    /// Optional warm-up, scores are wiped when it ends
    WarmUp,
    /// Match in progress
    Playing,
    /// Final scores on display until the session is torn down
    Scoreboard,
}

/// Leading team, or a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinningTeam {
    Team(TeamId),
    Draw,
}

/// Kind of scoring event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Kill,
    Suicide,
    TeammateKill,
}

impl ScoreKind {
    pub fn points(self) -> i32 {
        match self {
            ScoreKind::Kill => KILL_POINTS,
            ScoreKind::Suicide => SUICIDE_POINTS,
            ScoreKind::TeammateKill => TEAMMATE_KILL_POINTS,
        }
    }
}

/// A scoring event reported by the combat layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub kind: ScoreKind,
    /// Team of the instigator, absent for suicides
    #[serde(default)]
    pub killer_team: Option<TeamId>,
    pub victim_team: TeamId,
}

impl ScoreEvent {
    /// Team whose score changes
    pub fn scoring_team(&self) -> Option<TeamId> {
        match self.kind {
            ScoreKind::Kill => self.killer_team,
            ScoreKind::Suicide => Some(self.victim_team),
            ScoreKind::TeammateKill => Some(self.killer_team.unwrap_or(self.victim_team)),
        }
    }
}

/// Mutable per-match state: clock, scores, phase and leader
#[derive(Debug, Clone)]
pub struct MatchLedger {
    remaining_time: u32,
    scores: Vec<i32>,
    winning_team: WinningTeam,
    phase: MatchPhase,
}

impl MatchLedger {
    pub fn new(nb_teams: u32) -> Self {
        Self {
            remaining_time: 0,
            scores: vec![0; nb_teams as usize],
            winning_team: WinningTeam::Draw,
            phase: MatchPhase::InLobby,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn remaining_time(&self) -> u32 {
        self.remaining_time
    }

    pub fn scores(&self) -> &[i32] {
        &self.scores
    }

    pub fn score(&self, team: TeamId) -> Option<i32> {
        self.scores.get(team as usize).copied()
    }

    /// Scores of the first two teams
    pub fn team_scores(&self) -> (i32, i32) {
        (
            self.score(super::TEAM_A).unwrap_or(0),
            self.score(super::TEAM_B).unwrap_or(0),
        )
    }

    pub fn winning_team(&self) -> WinningTeam {
        self.winning_team
    }

    /// Enter `phase` with a fresh countdown
    pub fn set_phase(&mut self, phase: MatchPhase, remaining_time: u32) {
        self.phase = phase;
        self.remaining_time = remaining_time;
    }

    /// Count down one second. Returns true when this call reached zero.
    pub fn tick(&mut self) -> bool {
        if self.remaining_time == 0 {
            return false;
        }
        self.remaining_time -= 1;
        self.remaining_time == 0
    }

    /// Returns false for a team outside the match
    pub fn add_points(&mut self, team: TeamId, points: i32) -> bool {
        match self.scores.get_mut(team as usize) {
            Some(score) => {
                *score += points;
                true
            }
            None => false,
        }
    }

    /// Leader is the unique strictly highest score, otherwise a draw
    pub fn recompute_winner(&mut self) {
        let best = self.scores.iter().copied().max();
        self.winning_team = match best {
            Some(best) if self.scores.iter().filter(|s| **s == best).count() == 1 => self
                .scores
                .iter()
                .position(|s| *s == best)
                .map(|i| WinningTeam::Team(i as TeamId))
                .unwrap_or(WinningTeam::Draw),
            _ => WinningTeam::Draw,
        };
    }

    pub fn clear_winner(&mut self) {
        self.winning_team = WinningTeam::Draw;
    }

    /// True once any team has reached `threshold`
    pub fn threshold_reached(&self, threshold: i32) -> bool {
        self.scores.iter().any(|s| *s >= threshold)
    }

    /// Zero the clock and every score
    pub fn reset_stats(&mut self) {
        self.remaining_time = 0;
        self.scores.iter_mut().for_each(|s| *s = 0);
    }

    /// Remaining time as `m:ss`
    pub fn formatted_remaining_time(&self) -> String {
        format_match_clock(self.remaining_time)
    }
}
