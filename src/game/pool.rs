//! Per-team character pools and human/AI hand-off
//!
//! Every team owns a fixed set of characters created at match setup. A
//! character is always in one of three states: driven by a human, driven by
//! a bot and available for takeover, or driven by a bot outside the pool.
//! Hand-off only moves characters between these states, it never creates
//! or destroys one.

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::level::Transform;
use crate::settings::TeamColor;

use super::combat::HealthState;
use super::player::{ControllerKind, Roster};
use super::spawn::SpawnPointAllocator;
use super::{CharacterId, ParticipantId, TeamId};

const BOT_NAME_PREFIX: &str = "Bot ";

/// Most characters a single team can be seeded with
pub const MAX_PLAYERS_PER_TEAM: u32 = 64;

/// A character body in the world
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub team: TeamId,
    pub tint: TeamColor,
    pub transform: Transform,
    pub health: HealthState,
    /// Bots only move while the match runs
    pub ai_can_move: bool,
}

#[derive(Debug, Clone, Default)]
struct TeamPool {
    /// Bot-driven characters a joining human can take over
    available: Vec<CharacterId>,
    /// Bot controllers without a character, ready to take one back
    idle_controllers: Vec<ParticipantId>,
}

/// How a team's characters are currently driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BodyCensus {
    pub pooled: usize,
    pub ai_active: usize,
    pub human: usize,
    pub uncontrolled: usize,
}

impl BodyCensus {
    pub fn total(&self) -> usize {
        self.pooled + self.ai_active + self.human + self.uncontrolled
    }
}

/// Owns every character and the per-team hand-off pools
#[derive(Debug)]
pub struct CharacterPool {
    characters: BTreeMap<CharacterId, Character>,
    teams: Vec<TeamPool>,
    next_character_id: CharacterId,
    next_bot_id: u32,
}

impl CharacterPool {
    pub fn new(nb_teams: u32) -> Self {
        Self {
            characters: BTreeMap::new(),
            teams: vec![TeamPool::default(); nb_teams as usize],
            next_character_id: 0,
            next_bot_id: 0,
        }
    }

    /// Create `count` bot-driven characters for `team`, tinted and placed at
    /// round-robin spawn points, and make them available for takeover.
    pub fn seed<R: Rng + ?Sized>(
        &mut self,
        team: TeamId,
        count: u32,
        tint: TeamColor,
        spawns: &mut SpawnPointAllocator,
        roster: &mut Roster,
        rng: &mut R,
    ) -> Result<(), SeedError> {
        if count == 0 {
            return Err(SeedError::EmptyPool { team });
        }
        if count > MAX_PLAYERS_PER_TEAM {
            return Err(SeedError::PoolTooLarge {
                requested: count,
                max: MAX_PLAYERS_PER_TEAM,
            });
        }
        if self.teams.get(team as usize).is_none() {
            return Err(SeedError::UnknownTeam { team });
        }

        for _ in 0..count {
            let transform = spawns
                .choose(team)
                .ok_or(SeedError::UnknownTeam { team })?;

            let id = self.next_character_id;
            self.next_character_id += 1;
            self.characters.insert(
                id,
                Character {
                    id,
                    team,
                    tint,
                    transform,
                    health: HealthState::default(),
                    ai_can_move: false,
                },
            );

            let bot_id = Uuid::from_u128(rng.gen());
            let name = format!("{BOT_NAME_PREFIX}{}", self.next_bot_id);
            self.next_bot_id += 1;

            let record = roster.insert(bot_id, name, ControllerKind::Ai);
            record.set_team(team);
            record.set_active(true);
            record.set_body(Some(id));

            self.teams[team as usize].available.push(id);
        }

        debug!(team, count, "Seeded character pool");
        Ok(())
    }

    /// Take a random bot-driven character out of `team`'s pool. The bot's
    /// record goes inactive and its controller waits for a character to come
    /// back. Returns `None` when the team has no character left.
    pub fn acquire_ai_controlled_body<R: Rng + ?Sized>(
        &mut self,
        team: TeamId,
        roster: &mut Roster,
        rng: &mut R,
    ) -> Option<CharacterId> {
        let Some(pool) = self.teams.get_mut(team as usize) else {
            error!(team, "No character pool for team");
            return None;
        };

        if pool.available.is_empty() {
            error!(team, "Not enough available characters for team");
            return None;
        }

        let index = rng.gen_range(0..pool.available.len());
        let character = pool.available.remove(index);

        match roster.controller_of_mut(character) {
            Some(bot) => {
                bot.set_active(false);
                bot.set_body(None);
                pool.idle_controllers.push(bot.id());
            }
            None => error!(character, team, "Pooled character has no controller"),
        }

        Some(character)
    }

    /// Hand a departing human's character back to a random idle bot of the
    /// same team. Returns the bot now driving it, or `None` when no bot is
    /// idle (pool exhaustion) or the human had no character.
    pub fn release_to_ai<R: Rng + ?Sized>(
        &mut self,
        departing: ParticipantId,
        roster: &mut Roster,
        rng: &mut R,
    ) -> Option<ParticipantId> {
        let Some(record) = roster.get(&departing) else {
            warn!(participant = %departing, "Unknown participant released to AI");
            return None;
        };
        let team = record.team()?;
        let character = record.body();

        let Some(pool) = self.teams.get_mut(team as usize) else {
            error!(team, "No character pool for team");
            return None;
        };

        if pool.idle_controllers.is_empty() {
            error!(team, participant = %departing, "Not enough available AI controllers for team");
            return None;
        }

        let Some(character) = character else {
            error!(participant = %departing, "Departing participant has no character to hand off");
            return None;
        };

        let index = rng.gen_range(0..pool.idle_controllers.len());
        let bot = pool.idle_controllers.remove(index);
        pool.available.push(character);

        Self::possess(roster, bot, character);
        if let Some(bot_record) = roster.get_mut(&bot) {
            bot_record.set_active(true);
        }

        Some(bot)
    }

    /// Give `character` to `controller`, detaching it from its previous one
    pub fn possess(roster: &mut Roster, controller: ParticipantId, character: CharacterId) {
        if let Some(previous) = roster.controller_of_mut(character) {
            previous.set_body(None);
        }
        if let Some(record) = roster.get_mut(&controller) {
            record.set_body(Some(character));
        }
    }

    /// Count how `team`'s characters are driven
    pub fn census(&self, team: TeamId, roster: &Roster) -> BodyCensus {
        let pooled = self
            .teams
            .get(team as usize)
            .map(|p| p.available.as_slice())
            .unwrap_or(&[]);

        let mut census = BodyCensus::default();
        for character in self.characters.values().filter(|c| c.team == team) {
            match roster.controller_of(character.id) {
                None => census.uncontrolled += 1,
                Some(r) if r.is_ai() && pooled.contains(&character.id) => census.pooled += 1,
                Some(r) if r.is_ai() => census.ai_active += 1,
                Some(_) => census.human += 1,
            }
        }
        census
    }

    /// Enable or disable movement of every bot-driven character
    pub fn set_ai_movement(&mut self, enabled: bool, roster: &Roster) {
        for character in self.characters.values_mut() {
            if roster.controller_of(character.id).is_some_and(|r| r.is_ai()) {
                character.ai_can_move = enabled;
            }
        }
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Characters of `team` available for takeover
    pub fn available(&self, team: TeamId) -> usize {
        self.teams
            .get(team as usize)
            .map(|p| p.available.len())
            .unwrap_or(0)
    }

    /// Bot controllers of `team` waiting for a character
    pub fn idle_controllers(&self, team: TeamId) -> usize {
        self.teams
            .get(team as usize)
            .map(|p| p.idle_controllers.len())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeedError {
    #[error("Character pool for team {team} would be empty")]
    EmptyPool { team: TeamId },

    #[error("Team {team} is not part of the match")]
    UnknownTeam { team: TeamId },

    #[error("{requested} characters per team requested, at most {max} allowed")]
    PoolTooLarge { requested: u32, max: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelLayout;
    use crate::settings::Rgb;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        pool: CharacterPool,
        roster: Roster,
        rng: ChaCha8Rng,
    }

    fn fixture(per_team: u32) -> Fixture {
        let level = LevelLayout::generated(2, 4);
        let mut spawns = SpawnPointAllocator::from_level(&level, 2).unwrap();
        let mut pool = CharacterPool::new(2);
        let mut roster = Roster::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let tint = TeamColor::from_primary(Rgb::from_hex(0xFF0000));

        for team in 0..2 {
            pool.seed(team, per_team, tint, &mut spawns, &mut roster, &mut rng)
                .unwrap();
        }

        Fixture { pool, roster, rng }
    }

    fn join_human(f: &mut Fixture, team: TeamId) -> (ParticipantId, Option<CharacterId>) {
        let human = Uuid::new_v4();
        f.roster
            .insert(human, "Human".into(), ControllerKind::Human)
            .set_team(team);
        let character = f
            .pool
            .acquire_ai_controlled_body(team, &mut f.roster, &mut f.rng);
        if let Some(character) = character {
            CharacterPool::possess(&mut f.roster, human, character);
        }
        (human, character)
    }

    #[test]
    fn test_seed_creates_active_bots() {
        let f = fixture(3);

        assert_eq!(f.roster.len(), 6);
        assert_eq!(f.pool.available(0), 3);
        assert_eq!(f.pool.idle_controllers(0), 0);
        assert!(f.roster.iter().all(|r| r.is_ai() && r.is_active()));

        let names: Vec<_> = f.roster.ordered().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names[0], "Bot 0");
        assert_eq!(names[5], "Bot 5");
    }

    #[test]
    fn test_seed_empty_pool_is_fatal() {
        let level = LevelLayout::generated(1, 1);
        let mut spawns = SpawnPointAllocator::from_level(&level, 1).unwrap();
        let mut pool = CharacterPool::new(1);
        let mut roster = Roster::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tint = TeamColor::from_primary(Rgb::from_hex(0x00FFFF));

        let err = pool
            .seed(0, 0, tint, &mut spawns, &mut roster, &mut rng)
            .unwrap_err();
        assert_eq!(err, SeedError::EmptyPool { team: 0 });
    }

    #[test]
    fn test_seed_rejects_oversized_pool() {
        let level = LevelLayout::generated(1, 1);
        let mut spawns = SpawnPointAllocator::from_level(&level, 1).unwrap();
        let mut pool = CharacterPool::new(1);
        let mut roster = Roster::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tint = TeamColor::from_primary(Rgb::from_hex(0x00FFFF));

        let err = pool
            .seed(0, 2_000_000_000, tint, &mut spawns, &mut roster, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            SeedError::PoolTooLarge {
                requested: 2_000_000_000,
                max: MAX_PLAYERS_PER_TEAM
            }
        );
        assert!(roster.is_empty());
    }

    #[test]
    fn test_acquire_benches_the_bot() {
        let mut f = fixture(2);
        let (human, character) = join_human(&mut f, 0);
        let character = character.unwrap();

        assert_eq!(f.pool.available(0), 1);
        assert_eq!(f.pool.idle_controllers(0), 1);
        assert_eq!(f.roster.controller_of(character).map(|r| r.id()), Some(human));

        let benched = f.roster.iter().filter(|r| r.is_ai() && !r.is_active()).count();
        assert_eq!(benched, 1);
    }

    #[test]
    fn test_acquire_from_empty_pool() {
        let mut f = fixture(1);
        assert!(join_human(&mut f, 1).1.is_some());

        let (_, character) = join_human(&mut f, 1);
        assert!(character.is_none());
    }

    #[test]
    fn test_release_returns_character_to_bot() {
        let mut f = fixture(2);
        let (human, character) = join_human(&mut f, 0);
        let character = character.unwrap();

        let bot = f
            .pool
            .release_to_ai(human, &mut f.roster, &mut f.rng)
            .unwrap();

        let bot_record = f.roster.get(&bot).unwrap();
        assert!(bot_record.is_ai());
        assert!(bot_record.is_active());
        assert_eq!(bot_record.body(), Some(character));
        assert_eq!(f.roster.get(&human).unwrap().body(), None);
        assert_eq!(f.pool.available(0), 2);
        assert_eq!(f.pool.idle_controllers(0), 0);
    }

    #[test]
    fn test_release_without_idle_bot() {
        let mut f = fixture(1);
        let human = Uuid::new_v4();
        f.roster
            .insert(human, "Late".into(), ControllerKind::Human)
            .set_team(1);

        assert!(f.pool.release_to_ai(human, &mut f.roster, &mut f.rng).is_none());
    }

    #[test]
    fn test_census_is_conserved_across_hand_off() {
        let mut f = fixture(3);
        let seeded = f.pool.census(0, &f.roster);
        assert_eq!(seeded.total(), 3);
        assert_eq!(seeded.pooled, 3);

        let (first, _) = join_human(&mut f, 0);
        let (_second, _) = join_human(&mut f, 0);
        let census = f.pool.census(0, &f.roster);
        assert_eq!(census.human, 2);
        assert_eq!(census.total(), 3);

        f.pool.release_to_ai(first, &mut f.roster, &mut f.rng);
        let census = f.pool.census(0, &f.roster);
        assert_eq!(census.human, 1);
        assert_eq!(census.pooled, 2);
        assert_eq!(census.total(), 3);
    }

    #[test]
    fn test_ai_movement_skips_humans() {
        let mut f = fixture(2);
        let (_, character) = join_human(&mut f, 0);
        let character = character.unwrap();

        f.pool.set_ai_movement(true, &f.roster);

        assert!(!f.pool.character(character).unwrap().ai_can_move);
        let moving = f.pool.characters().filter(|c| c.ai_can_move).count();
        assert_eq!(moving, 3);
    }
}
