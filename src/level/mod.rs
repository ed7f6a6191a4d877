//! Level layout: team-tagged spawn markers placed by the level author

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::game::TeamId;

/// Distance from the level center to each team's base
const BASE_RADIUS: f32 = 2000.0;
/// Spacing between two markers of the same base
const MARKER_SPACING: f32 = 150.0;

/// Position and orientation of a spawn location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    /// Facing direction in radians
    pub yaw: f32,
}

/// A level-placed spawn point tagged with its team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnMarker {
    pub team: TeamId,
    #[serde(flatten)]
    pub transform: Transform,
}

/// Static description of the map a match is played on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelLayout {
    pub name: String,
    pub spawn_markers: Vec<SpawnMarker>,
}

impl LevelLayout {
    /// Load a layout from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| LevelError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Symmetric layout: one base per team on a ring around the center,
    /// markers lined up across the base and facing the center.
    pub fn generated(nb_teams: u32, spawns_per_team: u32) -> Self {
        let mut spawn_markers =
            Vec::with_capacity(nb_teams.saturating_mul(spawns_per_team) as usize);

        for team in 0..nb_teams {
            let angle = TAU * team as f32 / nb_teams.max(1) as f32;
            let (sin, cos) = angle.sin_cos();
            let base_x = cos * BASE_RADIUS;
            let base_y = sin * BASE_RADIUS;
            let yaw = (angle + TAU / 2.0) % TAU;

            for i in 0..spawns_per_team {
                let offset = (i as f32 - (spawns_per_team as f32 - 1.0) / 2.0) * MARKER_SPACING;
                spawn_markers.push(SpawnMarker {
                    team,
                    transform: Transform {
                        position: [base_x - sin * offset, base_y + cos * offset, 0.0],
                        yaw,
                    },
                });
            }
        }

        Self {
            name: format!("generated-{nb_teams}x{spawns_per_team}"),
            spawn_markers,
        }
    }

    /// Markers belonging to `team`, in placement order
    pub fn markers_for(&self, team: TeamId) -> impl Iterator<Item = &SpawnMarker> {
        self.spawn_markers.iter().filter(move |m| m.team == team)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("Failed to read level file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid level file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_layout_covers_every_team() {
        let level = LevelLayout::generated(3, 4);

        assert_eq!(level.spawn_markers.len(), 12);
        for team in 0..3 {
            assert_eq!(level.markers_for(team).count(), 4);
        }
    }

    #[test]
    fn test_generated_markers_are_distinct() {
        let level = LevelLayout::generated(2, 3);
        let team_a: Vec<_> = level.markers_for(0).map(|m| m.transform.position).collect();

        assert_ne!(team_a[0], team_a[1]);
        assert_ne!(team_a[1], team_a[2]);
    }

    #[test]
    fn test_parse_json_layout() {
        let raw = r#"{
            "name": "canyon",
            "spawn_markers": [
                { "team": 0, "position": [0.0, 0.0, 10.0], "yaw": 0.0 },
                { "team": 1, "position": [500.0, 0.0, 10.0], "yaw": 3.14 }
            ]
        }"#;

        let level: LevelLayout = serde_json::from_str(raw).unwrap();
        assert_eq!(level.name, "canyon");
        assert_eq!(level.markers_for(1).count(), 1);
        assert_eq!(level.spawn_markers[0].transform.position, [0.0, 0.0, 10.0]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LevelLayout::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, LevelError::Io { .. }));
    }
}
