//! Round-robin spawn point allocation per team

use tracing::warn;

use crate::level::{LevelLayout, Transform};

use super::TeamId;

/// Spawn locations of one team and the round-robin cursor
#[derive(Debug, Clone)]
struct SpawnPointList {
    locations: Vec<Transform>,
    /// Next location to hand out, always in `0..locations.len()`
    last_index_used: usize,
}

impl SpawnPointList {
    fn next(&mut self) -> Transform {
        let location = self.locations[self.last_index_used];
        self.last_index_used = (self.last_index_used + 1) % self.locations.len();
        location
    }
}

/// Per-team pools of spawn locations, fixed at match setup
#[derive(Debug, Clone)]
pub struct SpawnPointAllocator {
    teams: Vec<SpawnPointList>,
}

impl SpawnPointAllocator {
    /// Collect the level's markers for teams `0..nb_teams`. Every team must
    /// own at least one marker.
    pub fn from_level(level: &LevelLayout, nb_teams: u32) -> Result<Self, MissingSpawnPoints> {
        let mut teams: Vec<SpawnPointList> = (0..nb_teams)
            .map(|_| SpawnPointList {
                locations: Vec::new(),
                last_index_used: 0,
            })
            .collect();

        for marker in &level.spawn_markers {
            match teams.get_mut(marker.team as usize) {
                Some(list) => list.locations.push(marker.transform),
                None => warn!(
                    level = %level.name,
                    team = marker.team,
                    nb_teams,
                    "Ignoring spawn marker for a team outside the match"
                ),
            }
        }

        if let Some(team) = teams.iter().position(|t| t.locations.is_empty()) {
            return Err(MissingSpawnPoints {
                team: team as TeamId,
            });
        }

        Ok(Self { teams })
    }

    /// Next spawn location for `team`, advancing its cursor. `None` only for
    /// a team outside the match.
    pub fn choose(&mut self, team: TeamId) -> Option<Transform> {
        self.teams.get_mut(team as usize).map(SpawnPointList::next)
    }

    /// Number of locations registered for `team`
    pub fn len(&self, team: TeamId) -> usize {
        self.teams
            .get(team as usize)
            .map(|t| t.locations.len())
            .unwrap_or(0)
    }

    /// Cursor position for `team`
    pub fn cursor(&self, team: TeamId) -> Option<usize> {
        self.teams.get(team as usize).map(|t| t.last_index_used)
    }
}

/// A team has no spawn point in the level
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("No spawn point detected for team {team}")]
pub struct MissingSpawnPoints {
    pub team: TeamId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::SpawnMarker;

    fn marker(team: TeamId, x: f32) -> SpawnMarker {
        SpawnMarker {
            team,
            transform: Transform {
                position: [x, 0.0, 0.0],
                yaw: 0.0,
            },
        }
    }

    fn level(markers: Vec<SpawnMarker>) -> LevelLayout {
        LevelLayout {
            name: "test".to_string(),
            spawn_markers: markers,
        }
    }

    #[test]
    fn test_round_robin_visits_each_point_once() {
        let level = level(vec![marker(0, 1.0), marker(0, 2.0), marker(0, 3.0), marker(1, 9.0)]);
        let mut spawns = SpawnPointAllocator::from_level(&level, 2).unwrap();

        // Move the cursor off the start first
        spawns.choose(0);

        let visited: Vec<f32> = (0..3)
            .map(|_| spawns.choose(0).unwrap().position[0])
            .collect();
        assert_eq!(visited, vec![2.0, 3.0, 1.0]);
        assert_eq!(spawns.cursor(0), Some(1));
    }

    #[test]
    fn test_consecutive_choices_differ() {
        let level = level(vec![marker(0, 1.0), marker(0, 2.0), marker(1, 9.0)]);
        let mut spawns = SpawnPointAllocator::from_level(&level, 2).unwrap();

        let first = spawns.choose(0).unwrap();
        let second = spawns.choose(0).unwrap();
        assert_ne!(first, second);

        // A single point is always reused
        assert_eq!(spawns.choose(1), spawns.choose(1));
    }

    #[test]
    fn test_team_without_spawn_points_is_fatal() {
        let level = level(vec![marker(0, 1.0)]);
        let err = SpawnPointAllocator::from_level(&level, 2).unwrap_err();
        assert_eq!(err, MissingSpawnPoints { team: 1 });
    }

    #[test]
    fn test_foreign_markers_are_skipped() {
        let level = level(vec![marker(0, 1.0), marker(1, 2.0), marker(7, 3.0)]);
        let spawns = SpawnPointAllocator::from_level(&level, 2).unwrap();

        assert_eq!(spawns.len(0), 1);
        assert_eq!(spawns.len(1), 1);
        assert_eq!(spawns.len(7), 0);
    }

    #[test]
    fn test_unknown_team_has_no_spawn() {
        let level = level(vec![marker(0, 1.0)]);
        let mut spawns = SpawnPointAllocator::from_level(&level, 1).unwrap();
        assert!(spawns.choose(3).is_none());
    }
}
