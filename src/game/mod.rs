//! Match simulation modules

pub mod combat;
pub mod intent;
pub mod ledger;
pub mod r#match;
pub mod player;
pub mod pool;
pub mod snapshot;
pub mod spawn;
pub mod state_machine;

pub use combat::{DamageCause, DeathReport};
pub use intent::{EventOutcome, IntentRejected, MatchEvent, Origin};
pub use ledger::{MatchLedger, MatchPhase, ScoreEvent, ScoreKind, WinningTeam};
pub use r#match::{GameMatch, MatchHandle, RunnerConfig, SubmitError};
pub use player::{PlayerRecord, Roster};
pub use snapshot::{MatchReplica, MatchSnapshot, PlayerSnapshot};
pub use state_machine::{MatchStateMachine, Notification, SetupError};

use uuid::Uuid;

/// Team index, `0..nb_teams`
pub type TeamId = u32;

/// Identifies a controller (human or AI) and its player record
pub type ParticipantId = Uuid;

/// Identifies a character body in the world
pub type CharacterId = u32;

pub const TEAM_A: TeamId = 0;
pub const TEAM_B: TeamId = 1;
