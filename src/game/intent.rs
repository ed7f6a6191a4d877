//! Typed events posted to the match state machine
//!
//! Engine-side callbacks (clock, match readiness) are posted with
//! [`Origin::Authority`]. Everything arriving from a non-authoritative
//! caller is posted with [`Origin::Remote`] and validated by the authority
//! before it is applied.

use serde::{Deserialize, Serialize};

use super::combat::DeathReport;
use super::ledger::{MatchPhase, ScoreEvent};
use super::{CharacterId, ParticipantId, TeamId};

/// Where an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The match task itself
    Authority,
    /// A replica or outer surface asking for a change
    Remote,
}

/// An event for the match state machine, processed in arrival order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Session is ready; enter the lobby
    WaitingToStart,
    /// Host asks to start the match
    Start,
    /// One second of match clock
    Tick,
    /// A participant logged in with its connect options
    Join {
        participant: ParticipantId,
        #[serde(default)]
        options: String,
    },
    /// A participant left for good
    Leave { participant: ParticipantId },
    /// Raw scoring event
    Score(ScoreEvent),
    /// A character died
    Death(DeathReport),
    /// Bring a participant's character back at a spawn point
    Respawn { participant: ParticipantId },
}

impl MatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::WaitingToStart => "waiting_to_start",
            MatchEvent::Start => "start",
            MatchEvent::Tick => "tick",
            MatchEvent::Join { .. } => "join",
            MatchEvent::Leave { .. } => "leave",
            MatchEvent::Score(_) => "score",
            MatchEvent::Death(_) => "death",
            MatchEvent::Respawn { .. } => "respawn",
        }
    }

    /// Clock and readiness signals belong to the authority only
    pub fn remote_permitted(&self) -> bool {
        !matches!(self, MatchEvent::WaitingToStart | MatchEvent::Tick)
    }
}

/// Result of an applied event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    Applied,
    /// Nothing to do in the current state
    Ignored,
    Joined {
        participant: ParticipantId,
        team: TeamId,
        /// `None` when the team had no character left
        character: Option<CharacterId>,
    },
    Left {
        /// Bot that took the character over
        takeover: Option<ParticipantId>,
    },
}

/// Authority-side refusal of a remote event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentRejected {
    #[error("'{0}' may only be issued by the authority")]
    NotPermitted(&'static str),

    #[error("Session has been torn down")]
    SessionClosed,

    #[error("'{event}' is not allowed during {phase:?}")]
    WrongPhase {
        event: &'static str,
        phase: MatchPhase,
    },

    #[error("Participant {0} already joined")]
    AlreadyJoined(ParticipantId),

    #[error("Unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Participant {0} is a bot")]
    BotParticipant(ParticipantId),

    #[error("Unknown team {0}")]
    UnknownTeam(TeamId),

    #[error("Kill without a killer team")]
    MissingKillerTeam,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ledger::ScoreKind;
    use uuid::Uuid;

    #[test]
    fn test_clock_is_authority_only() {
        assert!(!MatchEvent::Tick.remote_permitted());
        assert!(!MatchEvent::WaitingToStart.remote_permitted());
        assert!(MatchEvent::Start.remote_permitted());
    }

    #[test]
    fn test_event_wire_format() {
        let participant = Uuid::nil();
        let json = serde_json::to_value(MatchEvent::Leave { participant }).unwrap();
        assert_eq!(json["type"], "leave");

        let event: MatchEvent = serde_json::from_str(
            r#"{"type":"score","kind":"kill","killer_team":1,"victim_team":0}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            MatchEvent::Score(ScoreEvent {
                kind: ScoreKind::Kill,
                killer_team: Some(1),
                victim_team: 0,
            })
        );
    }
}
