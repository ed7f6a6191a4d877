//! Connect-string encoding of match settings
//!
//! Settings travel as `?Key=value` pairs. Encoding always emits the same
//! field order; decoding looks each key up independently and falls back to
//! the compiled default when a key is missing or its value does not parse.

use rand::Rng;
use serde::Serialize;

const OPT_GAME_TIME: &str = "GameTime";
const OPT_WARMUP_WANTED: &str = "WarmupWanted";
const OPT_POINTS_FOR_WIN: &str = "NbPointsForWin";
const OPT_NB_TEAMS: &str = "NbTeams";
const OPT_PLAYERS_PER_TEAM: &str = "NbPlayersPerTeams";
const OPT_CHARACTER_NAME: &str = "CharacterName";
const OPT_GAME_NAME: &str = "GameName";

pub const DEFAULT_GAME_TIME: u32 = 300;
pub const DEFAULT_WARMUP_WANTED: bool = true;
pub const DEFAULT_POINTS_FOR_WIN: i32 = 500;
pub const DEFAULT_NB_TEAMS: u32 = 2;
pub const DEFAULT_PLAYERS_PER_TEAM: u32 = 4;
pub const DEFAULT_CHARACTER_NAME: &str = "Cowboy_";
const DEFAULT_CHARACTER_NAME_MIN_ID: u32 = 1;
const DEFAULT_CHARACTER_NAME_MAX_ID: u32 = 999;

const PARAM_SEPARATOR: char = '?';
const VALUE_SEPARATOR: char = '=';

/// Options chosen for a game (duration, teams, win score, player name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSettings {
    /// Length of the playing phase in seconds
    pub game_time: u32,
    /// Run a warm-up phase before playing
    pub warmup_wanted: bool,
    /// Score a team needs to end the match
    pub points_for_win: i32,
    /// Number of teams, always positive
    pub nb_teams: u32,
    /// Bodies per team, always positive
    pub players_per_team: u32,
    /// Name of the joining player. An empty name does not survive a round
    /// trip: it decodes as a fresh default name.
    pub character_name: String,
    /// Display name of the hosted game, empty when unnamed
    pub game_name: String,
}

impl MatchSettings {
    /// Default settings with a random `Cowboy_<n>` character name
    pub fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            game_time: DEFAULT_GAME_TIME,
            warmup_wanted: DEFAULT_WARMUP_WANTED,
            points_for_win: DEFAULT_POINTS_FOR_WIN,
            nb_teams: DEFAULT_NB_TEAMS,
            players_per_team: DEFAULT_PLAYERS_PER_TEAM,
            character_name: default_character_name(rng),
            game_name: String::new(),
        }
    }

    /// Encode as a connect string, including the leading separator
    pub fn encode(&self) -> String {
        let mut params = vec![
            (OPT_GAME_TIME, self.game_time.to_string()),
            (OPT_WARMUP_WANTED, self.warmup_wanted.to_string()),
            (OPT_POINTS_FOR_WIN, self.points_for_win.to_string()),
            (OPT_NB_TEAMS, self.nb_teams.to_string()),
            (OPT_PLAYERS_PER_TEAM, self.players_per_team.to_string()),
            (OPT_CHARACTER_NAME, self.character_name.clone()),
        ];
        if !self.game_name.is_empty() {
            params.push((OPT_GAME_NAME, self.game_name.clone()));
        }

        params
            .into_iter()
            .map(|(key, value)| format!("{PARAM_SEPARATOR}{key}{VALUE_SEPARATOR}{value}"))
            .collect()
    }

    /// Decode a connect string, using the thread RNG for a missing name
    pub fn parse(options: &str) -> Self {
        Self::parse_with_rng(options, &mut rand::thread_rng())
    }

    /// Decode a connect string. Never fails: every missing or malformed
    /// field takes its default.
    pub fn parse_with_rng<R: Rng + ?Sized>(options: &str, rng: &mut R) -> Self {
        let game_time = option(options, OPT_GAME_TIME)
            .and_then(parse_int)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_GAME_TIME);

        let warmup_wanted = option(options, OPT_WARMUP_WANTED)
            .and_then(parse_bool)
            .unwrap_or(DEFAULT_WARMUP_WANTED);

        let points_for_win = option(options, OPT_POINTS_FOR_WIN)
            .and_then(parse_int)
            .filter(|v| *v > 0)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(DEFAULT_POINTS_FOR_WIN);

        let nb_teams = option(options, OPT_NB_TEAMS)
            .and_then(parse_positive)
            .unwrap_or(DEFAULT_NB_TEAMS);

        let players_per_team = option(options, OPT_PLAYERS_PER_TEAM)
            .and_then(parse_positive)
            .unwrap_or(DEFAULT_PLAYERS_PER_TEAM);

        let character_name = match option(options, OPT_CHARACTER_NAME) {
            Some(name) => name.to_string(),
            None => default_character_name(rng),
        };

        let game_name = option(options, OPT_GAME_NAME)
            .map(str::to_string)
            .unwrap_or_default();

        Self {
            game_time,
            warmup_wanted,
            points_for_win,
            nb_teams,
            players_per_team,
            character_name,
            game_name,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }
}

fn default_character_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let id = rng.gen_range(DEFAULT_CHARACTER_NAME_MIN_ID..=DEFAULT_CHARACTER_NAME_MAX_ID);
    format!("{DEFAULT_CHARACTER_NAME}{id}")
}

/// Find the value of `key`. Keys compare case-insensitively, the first
/// occurrence wins and an empty value counts as absent.
fn option<'a>(options: &'a str, key: &str) -> Option<&'a str> {
    options
        .split(PARAM_SEPARATOR)
        .filter_map(|pair| pair.split_once(VALUE_SEPARATOR))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

fn parse_positive(value: &str) -> Option<u32> {
    parse_int(value)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_encode_fixed_order() {
        let settings = MatchSettings {
            game_time: 120,
            warmup_wanted: false,
            points_for_win: 50,
            nb_teams: 2,
            players_per_team: 3,
            character_name: "Ringo".to_string(),
            game_name: String::new(),
        };

        assert_eq!(
            settings.encode(),
            "?GameTime=120?WarmupWanted=false?NbPointsForWin=50?NbTeams=2?NbPlayersPerTeams=3?CharacterName=Ringo"
        );
    }

    #[test]
    fn test_round_trip() {
        let mut rng = rng();
        let mut settings = MatchSettings::with_rng(&mut rng);
        settings.game_time = 42;
        settings.warmup_wanted = false;
        settings.game_name = "Dusty Town".to_string();

        let decoded = MatchSettings::parse_with_rng(&settings.encode(), &mut rng);
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_decode_is_order_independent() {
        let a = MatchSettings::parse_with_rng(
            "?NbTeams=3?GameTime=60?CharacterName=Doc?WarmupWanted=false",
            &mut rng(),
        );
        let b = MatchSettings::parse_with_rng(
            "?WarmupWanted=false?CharacterName=Doc?GameTime=60?NbTeams=3",
            &mut rng(),
        );

        assert_eq!(a, b);
        assert_eq!(a.nb_teams, 3);
        assert_eq!(a.game_time, 60);
        assert!(!a.warmup_wanted);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = MatchSettings::parse_with_rng("DesertMap?Listen", &mut rng());

        assert_eq!(settings.game_time, DEFAULT_GAME_TIME);
        assert_eq!(settings.warmup_wanted, DEFAULT_WARMUP_WANTED);
        assert_eq!(settings.points_for_win, DEFAULT_POINTS_FOR_WIN);
        assert_eq!(settings.nb_teams, DEFAULT_NB_TEAMS);
        assert_eq!(settings.players_per_team, DEFAULT_PLAYERS_PER_TEAM);
        assert!(settings.character_name.starts_with(DEFAULT_CHARACTER_NAME));
        assert!(settings.game_name.is_empty());

        let id: u32 = settings.character_name[DEFAULT_CHARACTER_NAME.len()..]
            .parse()
            .unwrap();
        assert!((1..=999).contains(&id));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let settings = MatchSettings::parse_with_rng(
            "?GameTime=soon?WarmupWanted=maybe?NbPointsForWin=-3?NbTeams=0?NbPlayersPerTeams=x",
            &mut rng(),
        );

        assert_eq!(settings.game_time, DEFAULT_GAME_TIME);
        assert_eq!(settings.warmup_wanted, DEFAULT_WARMUP_WANTED);
        assert_eq!(settings.points_for_win, DEFAULT_POINTS_FOR_WIN);
        assert_eq!(settings.nb_teams, DEFAULT_NB_TEAMS);
        assert_eq!(settings.players_per_team, DEFAULT_PLAYERS_PER_TEAM);
    }

    #[test]
    fn test_bool_spellings_and_key_case() {
        let on = MatchSettings::parse_with_rng("?warmupwanted=YES", &mut rng());
        assert!(on.warmup_wanted);

        let off = MatchSettings::parse_with_rng("?WARMUPWANTED=0", &mut rng());
        assert!(!off.warmup_wanted);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let settings = MatchSettings::parse_with_rng("?GameTime=10?GameTime=20", &mut rng());
        assert_eq!(settings.game_time, 10);
    }

    #[test]
    fn test_empty_character_name_decodes_as_default() {
        let mut settings = MatchSettings::with_rng(&mut rng());
        settings.character_name = String::new();

        let encoded = settings.encode();
        assert!(encoded.ends_with("?CharacterName="));

        let decoded = MatchSettings::parse_with_rng(&encoded, &mut rng());
        assert!(decoded.character_name.starts_with(DEFAULT_CHARACTER_NAME));
        assert_ne!(decoded, settings);
    }

    #[test]
    fn test_separator_in_name_is_not_escaped() {
        let mut settings = MatchSettings::with_rng(&mut rng());
        settings.character_name = "Billy?NbTeams=5".to_string();

        let decoded = MatchSettings::parse_with_rng(&settings.encode(), &mut rng());
        assert_eq!(decoded.character_name, "Billy");
        assert_eq!(decoded.nb_teams, DEFAULT_NB_TEAMS);
    }
}
