//! Match state machine (authoritative)
//!
//! Owns the ledger, the roster, the character pools and the spawn points of
//! one match. Lobby -> (warm-up) -> playing -> scoreboard, one way, driven by
//! events processed one at a time.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::level::{LevelError, LevelLayout, Transform};
use crate::settings::{MatchSettings, PaletteError, TeamColor};

use super::combat::{classify_death, DeathReport};
use super::intent::{EventOutcome, IntentRejected, MatchEvent, Origin};
use super::ledger::{MatchLedger, MatchPhase, ScoreEvent, WinningTeam};
use super::player::{ControllerKind, PlayerRecord, Roster};
use super::pool::{BodyCensus, CharacterPool, SeedError, MAX_PLAYERS_PER_TEAM};
use super::spawn::{MissingSpawnPoints, SpawnPointAllocator};
use super::{CharacterId, ParticipantId, TeamId};

/// Warm-up length in seconds
pub const WARMUP_TIME: u32 = 30;
/// Scoreboard display length in seconds before teardown
pub const SCOREBOARD_TIME: u32 = 5;

/// Message for participants and the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    PhaseChanged {
        phase: MatchPhase,
        remaining_time: u32,
    },
    /// Sent to the joiner; `started` tells whether play already began
    JoinAccepted {
        participant: ParticipantId,
        started: bool,
    },
    PlayerJoined {
        name: String,
    },
    PlayerLeft {
        name: String,
    },
    /// Lobby roster changed, refresh the player list
    PlayerListChanged,
    DeathMessage {
        text: String,
    },
    /// Sent to the human controller behind a death
    KilledOther {
        participant: ParticipantId,
    },
    MatchEnded {
        winning_team: WinningTeam,
    },
    SessionTeardown,
}

/// Broken match setup. Aborts session creation.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    MissingSpawnPoints(#[from] MissingSpawnPoints),

    #[error(transparent)]
    Palette(#[from] PaletteError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Level(#[from] LevelError),
}

pub struct MatchStateMachine {
    session_id: Uuid,
    settings: MatchSettings,
    ledger: MatchLedger,
    roster: Roster,
    pools: CharacterPool,
    spawns: SpawnPointAllocator,
    team_colors: Vec<TeamColor>,
    rng: ChaCha8Rng,
    match_started: bool,
    /// Repeating one-second clock is running
    clock_armed: bool,
    torn_down: bool,
    outbox: Vec<Notification>,
}

impl MatchStateMachine {
    /// Reject team and player counts the match cannot be built with. Runs
    /// before anything is sized from the settings.
    pub fn check_settings(settings: &MatchSettings) -> Result<(), SetupError> {
        TeamColor::ensure_available(settings.nb_teams as usize)?;
        if settings.players_per_team > MAX_PLAYERS_PER_TEAM {
            return Err(SeedError::PoolTooLarge {
                requested: settings.players_per_team,
                max: MAX_PLAYERS_PER_TEAM,
            }
            .into());
        }
        Ok(())
    }

    /// Build spawn pools and seed every team with bot-driven characters
    pub fn new(
        session_id: Uuid,
        settings: MatchSettings,
        level: &LevelLayout,
        seed: u64,
    ) -> Result<Self, SetupError> {
        Self::check_settings(&settings)?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut spawns = SpawnPointAllocator::from_level(level, settings.nb_teams)?;
        let team_colors = TeamColor::predefined(settings.nb_teams as usize, &mut rng)?;

        let mut roster = Roster::new();
        let mut pools = CharacterPool::new(settings.nb_teams);
        for (team, tint) in (0..settings.nb_teams).zip(team_colors.iter()) {
            pools.seed(
                team,
                settings.players_per_team,
                *tint,
                &mut spawns,
                &mut roster,
                &mut rng,
            )?;
        }

        info!(
            session_id = %session_id,
            level = %level.name,
            nb_teams = settings.nb_teams,
            players_per_team = settings.players_per_team,
            "Match initialized"
        );

        Ok(Self {
            session_id,
            ledger: MatchLedger::new(settings.nb_teams),
            settings,
            roster,
            pools,
            spawns,
            team_colors,
            rng,
            match_started: false,
            clock_armed: false,
            torn_down: false,
            outbox: Vec::new(),
        })
    }

    /// Post an event. Remote events are validated before being applied.
    pub fn dispatch(
        &mut self,
        event: MatchEvent,
        origin: Origin,
    ) -> Result<EventOutcome, IntentRejected> {
        if origin == Origin::Remote {
            if let Err(rejection) = self.validate(&event) {
                warn!(
                    session_id = %self.session_id,
                    event = event.name(),
                    reason = %rejection,
                    "Rejected remote event"
                );
                return Err(rejection);
            }
        }

        Ok(match event {
            MatchEvent::WaitingToStart => self.handle_match_waiting_to_start(),
            MatchEvent::Start => self.start_match(),
            MatchEvent::Tick => self.tick(),
            MatchEvent::Join {
                participant,
                options,
            } => self.join(participant, &options),
            MatchEvent::Leave { participant } => self.leave(participant),
            MatchEvent::Score(event) => self.score(event),
            MatchEvent::Death(report) => self.report_death(report),
            MatchEvent::Respawn { participant } => self.respawn(participant),
        })
    }

    /// Authority-side checks for an event requested by a non-authority
    pub fn validate(&self, event: &MatchEvent) -> Result<(), IntentRejected> {
        if !event.remote_permitted() {
            return Err(IntentRejected::NotPermitted(event.name()));
        }
        if self.torn_down {
            return Err(IntentRejected::SessionClosed);
        }

        let phase = self.ledger.phase();
        let wrong_phase = || IntentRejected::WrongPhase {
            event: event.name(),
            phase,
        };

        match event {
            MatchEvent::Start => {
                if phase != MatchPhase::InLobby || self.match_started {
                    return Err(wrong_phase());
                }
            }
            MatchEvent::Join { participant, .. } => {
                if self.roster.contains(participant) {
                    return Err(IntentRejected::AlreadyJoined(*participant));
                }
                if phase == MatchPhase::Scoreboard {
                    return Err(wrong_phase());
                }
            }
            MatchEvent::Leave { participant } => {
                let record = self.known(participant)?;
                if record.is_ai() {
                    return Err(IntentRejected::BotParticipant(*participant));
                }
            }
            MatchEvent::Score(score) => {
                if !self.scoring_open() {
                    return Err(wrong_phase());
                }
                self.known_team(score.victim_team)?;
                if let Some(team) = score.killer_team {
                    self.known_team(team)?;
                }
                if score.scoring_team().is_none() {
                    return Err(IntentRejected::MissingKillerTeam);
                }
            }
            MatchEvent::Death(report) => {
                if !self.scoring_open() {
                    return Err(wrong_phase());
                }
                self.known(&report.victim)?;
                if let Some(instigator) = &report.instigator {
                    self.known(instigator)?;
                }
            }
            MatchEvent::Respawn { participant } => {
                self.known(participant)?;
            }
            MatchEvent::WaitingToStart | MatchEvent::Tick => {}
        }

        Ok(())
    }

    fn known(&self, participant: &ParticipantId) -> Result<&PlayerRecord, IntentRejected> {
        self.roster
            .get(participant)
            .ok_or(IntentRejected::UnknownParticipant(*participant))
    }

    fn known_team(&self, team: TeamId) -> Result<(), IntentRejected> {
        if team < self.settings.nb_teams {
            Ok(())
        } else {
            Err(IntentRejected::UnknownTeam(team))
        }
    }

    fn scoring_open(&self) -> bool {
        matches!(
            self.ledger.phase(),
            MatchPhase::WarmUp | MatchPhase::Playing
        )
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    /// Session ready: lobby, no leader, clock at zero
    pub fn handle_match_waiting_to_start(&mut self) -> EventOutcome {
        if self.match_started || self.torn_down {
            return EventOutcome::Ignored;
        }
        self.ledger.clear_winner();
        self.update_match_state(MatchPhase::InLobby, 0);
        EventOutcome::Applied
    }

    /// Arm the clock and enter warm-up (or playing). Bots may move.
    pub fn start_match(&mut self) -> EventOutcome {
        if self.match_started || self.torn_down || self.ledger.phase() != MatchPhase::InLobby {
            warn!(session_id = %self.session_id, phase = ?self.ledger.phase(), "Match start ignored");
            return EventOutcome::Ignored;
        }

        self.match_started = true;
        self.clock_armed = true;

        if self.settings.warmup_wanted {
            self.update_match_state(MatchPhase::WarmUp, WARMUP_TIME);
        } else {
            self.update_match_state(MatchPhase::Playing, self.settings.game_time);
        }

        self.pools.set_ai_movement(true, &self.roster);
        EventOutcome::Applied
    }

    /// One second of match clock
    pub fn tick(&mut self) -> EventOutcome {
        if !self.clock_armed || self.torn_down {
            return EventOutcome::Ignored;
        }
        if !self.ledger.tick() {
            return EventOutcome::Applied;
        }

        match self.ledger.phase() {
            MatchPhase::WarmUp => {
                self.reset_all_characters();
                self.ledger.reset_stats();
                self.update_match_state(MatchPhase::Playing, self.settings.game_time);
            }
            MatchPhase::Playing => self.process_end_game(),
            MatchPhase::Scoreboard => self.teardown(),
            MatchPhase::InLobby => {}
        }
        EventOutcome::Applied
    }

    fn process_end_game(&mut self) {
        self.update_match_state(MatchPhase::Scoreboard, SCOREBOARD_TIME);

        let winning_team = self.ledger.winning_team();
        info!(session_id = %self.session_id, ?winning_team, scores = ?self.ledger.scores(), "Match ended");
        self.outbox.push(Notification::MatchEnded { winning_team });
        self.pools.set_ai_movement(false, &self.roster);
    }

    fn teardown(&mut self) {
        self.clock_armed = false;
        self.torn_down = true;
        info!(session_id = %self.session_id, "Session teardown");
        self.outbox.push(Notification::SessionTeardown);
    }

    fn update_match_state(&mut self, phase: MatchPhase, remaining_time: u32) {
        self.ledger.set_phase(phase, remaining_time);
        info!(session_id = %self.session_id, ?phase, remaining_time, "Match phase changed");
        self.outbox.push(Notification::PhaseChanged {
            phase,
            remaining_time,
        });
    }

    /// Respawn every character and wipe every record's kills and deaths
    fn reset_all_characters(&mut self) {
        let participants: Vec<ParticipantId> =
            self.roster.ordered().iter().map(|r| r.id()).collect();

        for participant in participants {
            self.respawn(participant);
            if let Some(record) = self.roster.get_mut(&participant) {
                record.reset_stats();
            }
        }
    }

    // ------------------------------------------------------------------
    // Join / leave
    // ------------------------------------------------------------------

    /// Team with the fewest counted members, lowest id on ties
    pub fn best_team_for_new_player(&self, joiner: &ParticipantId) -> TeamId {
        let mut counts = vec![0usize; self.settings.nb_teams as usize];
        for record in self.roster.iter().filter(|r| r.id() != *joiner) {
            if let Some(count) = record.team().and_then(|t| counts.get_mut(t as usize)) {
                *count += 1;
            }
        }

        let mut best = 0;
        for (team, count) in counts.iter().enumerate() {
            if *count < counts[best] {
                best = team;
            }
        }
        best as TeamId
    }

    /// Put a new participant on the emptiest team and hand it a character
    pub fn join(&mut self, participant: ParticipantId, options: &str) -> EventOutcome {
        if self.roster.contains(&participant) {
            warn!(session_id = %self.session_id, participant = %participant, "Participant already in match");
            return EventOutcome::Ignored;
        }

        let login = MatchSettings::parse_with_rng(options, &mut self.rng);
        let team = self.best_team_for_new_player(&participant);
        let name = login.character_name;

        // Joiners arrive without a character of their own, so there is no
        // default body to discard before the takeover.
        self.roster
            .insert(participant, name.clone(), ControllerKind::Human)
            .set_team(team);

        let character =
            self.pools
                .acquire_ai_controlled_body(team, &mut self.roster, &mut self.rng);
        match character {
            Some(character) => CharacterPool::possess(&mut self.roster, participant, character),
            None => error!(
                session_id = %self.session_id,
                participant = %participant,
                team,
                "Joined without a character, team pool exhausted"
            ),
        }

        if let Some(record) = self.roster.get_mut(&participant) {
            record.set_active(true);
        }

        info!(
            session_id = %self.session_id,
            participant = %participant,
            name = %name,
            team,
            ?character,
            "Participant joined"
        );

        self.outbox.push(Notification::JoinAccepted {
            participant,
            started: self.match_started,
        });
        if self.ledger.phase() == MatchPhase::InLobby {
            self.outbox.push(Notification::PlayerListChanged);
        } else {
            self.outbox.push(Notification::PlayerJoined { name });
        }

        EventOutcome::Joined {
            participant,
            team,
            character,
        }
    }

    /// Hand the leaver's character back to a bot and drop its record
    pub fn leave(&mut self, participant: ParticipantId) -> EventOutcome {
        match self.roster.get(&participant) {
            None => {
                warn!(session_id = %self.session_id, participant = %participant, "Unknown participant left");
                return EventOutcome::Ignored;
            }
            Some(record) if record.is_ai() => {
                warn!(session_id = %self.session_id, participant = %participant, "Bots do not leave");
                return EventOutcome::Ignored;
            }
            Some(_) => {}
        }

        let takeover = self
            .pools
            .release_to_ai(participant, &mut self.roster, &mut self.rng);
        if let (Some(bot), true) = (takeover, self.clock_armed) {
            // A bot taking over mid-match must be able to move
            if let Some(character) = self.roster.get(&bot).and_then(PlayerRecord::body) {
                if let Some(character) = self.pools.character_mut(character) {
                    character.ai_can_move = self.ledger.phase() != MatchPhase::Scoreboard;
                }
            }
        }

        let Some(record) = self.roster.remove(&participant) else {
            return EventOutcome::Left { takeover };
        };

        info!(
            session_id = %self.session_id,
            participant = %participant,
            name = %record.name(),
            ?takeover,
            "Participant left"
        );

        if self.ledger.phase() == MatchPhase::InLobby {
            self.outbox.push(Notification::PlayerListChanged);
        } else {
            self.outbox.push(Notification::PlayerLeft {
                name: record.name().to_string(),
            });
        }

        EventOutcome::Left { takeover }
    }

    // ------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------

    /// Apply a scoring event, then re-evaluate the leader and win threshold
    pub fn score(&mut self, event: ScoreEvent) -> EventOutcome {
        if !self.add_score(event) {
            return EventOutcome::Ignored;
        }
        self.evaluate_scores();
        EventOutcome::Applied
    }

    fn add_score(&mut self, event: ScoreEvent) -> bool {
        if !self.scoring_open() {
            debug!(session_id = %self.session_id, phase = ?self.ledger.phase(), "Score event outside play");
            return false;
        }
        let Some(team) = event.scoring_team() else {
            warn!(session_id = %self.session_id, ?event, "Score event without a scoring team");
            return false;
        };
        if !self.ledger.add_points(team, event.kind.points()) {
            warn!(session_id = %self.session_id, team, "Score event for unknown team");
            return false;
        }
        true
    }

    fn evaluate_scores(&mut self) {
        self.ledger.recompute_winner();
        if self.ledger.threshold_reached(self.settings.points_for_win) {
            self.process_end_game();
        }
    }

    /// Attribute a death: counters, messages, team score
    pub fn report_death(&mut self, report: DeathReport) -> EventOutcome {
        if let Some(character) = self.roster.get(&report.victim).and_then(PlayerRecord::body) {
            if let Some(character) = self.pools.character_mut(character) {
                character.health.kill();
            }
        }

        let Some(outcome) = classify_death(&report, &self.roster) else {
            debug!(session_id = %self.session_id, ?report, "Unattributed death");
            return EventOutcome::Ignored;
        };

        if let Some(victim) = self.roster.get_mut(&report.victim) {
            victim.increment_deaths();
        }
        if let Some(record) = outcome.killer.and_then(|k| self.roster.get_mut(&k)) {
            record.increment_kills();
        }
        // Only human controllers are told
        if let Some(record) = outcome.instigator.and_then(|i| self.roster.get(&i)) {
            if !record.is_ai() {
                self.outbox.push(Notification::KilledOther {
                    participant: record.id(),
                });
            }
        }

        let scored = self.add_score(outcome.score);
        self.outbox.push(Notification::DeathMessage {
            text: outcome.message,
        });
        if scored {
            self.evaluate_scores();
        }

        EventOutcome::Applied
    }

    /// Revive a participant's character at its team's next spawn point
    pub fn respawn(&mut self, participant: ParticipantId) -> EventOutcome {
        let Some(record) = self.roster.get(&participant) else {
            return EventOutcome::Ignored;
        };
        let (Some(team), Some(character)) = (record.team(), record.body()) else {
            return EventOutcome::Ignored;
        };

        let Some(spawn) = self.spawns.choose(team) else {
            error!(session_id = %self.session_id, team, "No spawn point for team");
            return EventOutcome::Ignored;
        };

        match self.pools.character_mut(character) {
            Some(character) => {
                character.health.revive();
                character.transform = spawn;
                EventOutcome::Applied
            }
            None => EventOutcome::Ignored,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &MatchLedger {
        &self.ledger
    }

    pub fn phase(&self) -> MatchPhase {
        self.ledger.phase()
    }

    pub fn remaining_time(&self) -> u32 {
        self.ledger.remaining_time()
    }

    pub fn scores(&self) -> (i32, i32) {
        self.ledger.team_scores()
    }

    pub fn winning_team(&self) -> WinningTeam {
        self.ledger.winning_team()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn pools(&self) -> &CharacterPool {
        &self.pools
    }

    pub fn team_colors(&self) -> &[TeamColor] {
        &self.team_colors
    }

    pub fn team_of(&self, participant: &ParticipantId) -> Option<TeamId> {
        self.roster.team_of(participant)
    }

    /// False when either participant is unknown
    pub fn same_team(&self, a: &ParticipantId, b: &ParticipantId) -> bool {
        match (self.team_of(a), self.team_of(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Next spawn location for `team` (advances the round-robin cursor)
    pub fn choose_spawn_point(&mut self, team: TeamId) -> Option<Transform> {
        self.spawns.choose(team)
    }

    pub fn character_of(&self, participant: &ParticipantId) -> Option<CharacterId> {
        self.roster.get(participant).and_then(PlayerRecord::body)
    }

    pub fn census(&self, team: TeamId) -> BodyCensus {
        self.pools.census(team, &self.roster)
    }

    /// Records shown on the scoreboard for `team`: active ones only
    pub fn scoreboard(&self, team: TeamId) -> Vec<&PlayerRecord> {
        self.roster
            .ordered()
            .into_iter()
            .filter(|r| r.team() == Some(team) && r.is_active())
            .collect()
    }

    pub fn match_started(&self) -> bool {
        self.match_started
    }

    pub fn clock_armed(&self) -> bool {
        self.clock_armed
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Take every notification produced since the last call
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }
}
