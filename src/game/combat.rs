//! Combat bookkeeping - health and death attribution

use serde::{Deserialize, Serialize};

use super::ledger::{ScoreEvent, ScoreKind};
use super::player::Roster;
use super::ParticipantId;

/// Full health of a fresh character
pub const MAX_HEALTH: f32 = 100.0;

/// Health of a character body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthState {
    pub current: f32,
    pub max: f32,
}

impl HealthState {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Apply damage, returns true if this killed the character
    pub fn apply_damage(&mut self, damage: f32) -> bool {
        let was_alive = self.is_alive();
        self.current = (self.current - damage).max(0.0);
        was_alive && !self.is_alive()
    }

    pub fn kill(&mut self) {
        self.current = 0.0;
    }

    pub fn revive(&mut self) {
        self.current = self.max;
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new(MAX_HEALTH)
    }
}

/// What dealt the killing blow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageCause {
    /// A fired weapon
    Weapon,
    /// An exploding barrel or similar
    Explosive,
    /// Level hazard volume
    DamageZone,
}

/// A character died (reported by the combat layer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathReport {
    pub victim: ParticipantId,
    /// Controller credited with the damage, if any
    #[serde(default)]
    pub instigator: Option<ParticipantId>,
    pub cause: DamageCause,
}

/// Attribution of a death: who scores and what everyone is told
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathOutcome {
    pub score: ScoreEvent,
    /// Credited with a kill
    pub killer: Option<ParticipantId>,
    /// Controller behind the death, the victim itself for suicides
    pub instigator: Option<ParticipantId>,
    pub message: String,
}

/// Classify a death. Returns `None` when nobody can be credited and the
/// death was not self-inflicted.
pub fn classify_death(report: &DeathReport, roster: &Roster) -> Option<DeathOutcome> {
    let victim = roster.get(&report.victim)?;
    let victim_team = victim.team()?;
    let victim_name = victim.name();

    let self_inflicted = report.instigator == Some(report.victim);
    if self_inflicted || report.cause == DamageCause::DamageZone {
        return Some(DeathOutcome {
            score: ScoreEvent {
                kind: ScoreKind::Suicide,
                killer_team: None,
                victim_team,
            },
            killer: None,
            instigator: Some(report.victim),
            message: format!("{victim_name} committed suicide."),
        });
    }

    let instigator = roster.get(&report.instigator?)?;
    let killer_team = instigator.team()?;

    if killer_team == victim_team && report.cause == DamageCause::Explosive {
        return Some(DeathOutcome {
            score: ScoreEvent {
                kind: ScoreKind::TeammateKill,
                killer_team: Some(killer_team),
                victim_team,
            },
            killer: None,
            instigator: Some(instigator.id()),
            message: format!("{victim_name} was killed by a teammate."),
        });
    }

    Some(DeathOutcome {
        score: ScoreEvent {
            kind: ScoreKind::Kill,
            killer_team: Some(killer_team),
            victim_team,
        },
        killer: Some(instigator.id()),
        instigator: Some(instigator.id()),
        message: format!("{victim_name} was killed by {}", instigator.name()),
    })
}
