//! Session hosting - match creation and lifetime

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::game::{GameMatch, MatchHandle, MatchStateMachine, RunnerConfig, SetupError};
use crate::level::LevelLayout;
use crate::settings::MatchSettings;
use crate::util::rate_limit::{create_limiter, Limiter, HOSTING_RATE_LIMIT};

use super::registry::SessionRegistry;

/// Spawn markers per team in a generated level
pub const DEFAULT_SPAWNS_PER_TEAM: u32 = 8;

/// Where a new session takes its spawn markers from
#[derive(Debug, Clone)]
pub enum LevelSource {
    /// JSON level file, loaded for every session
    File(PathBuf),
    /// Ring layout sized to the session's team count
    Generated { spawns_per_team: u32 },
}

impl Default for LevelSource {
    fn default() -> Self {
        LevelSource::Generated {
            spawns_per_team: DEFAULT_SPAWNS_PER_TEAM,
        }
    }
}

/// Hosting configuration shared by every session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub level: LevelSource,
    pub runner: RunnerConfig,
    /// Fixed base seed; sessions get consecutive seeds from it
    pub seed: Option<u64>,
    /// Options used when the host sends none
    pub default_options: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Too many sessions hosted, try again later")]
    RateLimited,
}

/// Hosts sessions and removes them once torn down
pub struct SessionService {
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
    hosting_limiter: Arc<Limiter>,
    sessions_hosted: AtomicU64,
}

impl SessionService {
    pub fn new(registry: Arc<SessionRegistry>, config: SessionConfig) -> Self {
        Self {
            registry,
            config,
            hosting_limiter: create_limiter(HOSTING_RATE_LIMIT),
            sessions_hosted: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Create a match from a connect-options string and start its task
    pub fn host_session(&self, options: &str) -> Result<MatchHandle, HostError> {
        if self.hosting_limiter.check().is_err() {
            return Err(HostError::RateLimited);
        }

        let options = if options.is_empty() {
            self.config.default_options.as_str()
        } else {
            options
        };
        let settings = MatchSettings::parse(options);
        MatchStateMachine::check_settings(&settings).map_err(|e| {
            error!(error = %e, options, "Rejected session settings");
            e
        })?;

        let level = match &self.config.level {
            LevelSource::File(path) => LevelLayout::load(path).map_err(SetupError::from)?,
            LevelSource::Generated { spawns_per_team } => {
                LevelLayout::generated(settings.nb_teams, *spawns_per_team)
            }
        };

        let hosted = self.sessions_hosted.fetch_add(1, Ordering::Relaxed);
        let seed = match self.config.seed {
            Some(base) => base.wrapping_add(hosted),
            None => rand::random(),
        };

        let id = Uuid::new_v4();
        let (game_match, handle) = GameMatch::new(id, settings, &level, seed, self.config.runner)
            .map_err(|e| {
                error!(error = %e, "Session setup failed");
                e
            })?;

        self.registry.insert(handle.clone());
        info!(session_id = %id, seed, options, "Session hosted");

        let registry = self.registry.clone();
        tokio::spawn(async move {
            game_match.run().await;
            registry.remove(&id);
            info!(session_id = %id, "Session removed");
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MatchEvent, MatchPhase};
    use std::time::Duration;
    use tokio::time::timeout;

    fn service(config: SessionConfig) -> SessionService {
        SessionService::new(Arc::new(SessionRegistry::new()), config)
    }

    #[tokio::test]
    async fn test_host_registers_session() {
        let service = service(SessionConfig::default());
        let handle = service
            .host_session("?NbTeams=3?NbPlayersPerTeams=2?GameName=Saloon")
            .unwrap();

        assert!(service.registry().contains(&handle.id));
        let summary = service.registry().summary(&handle.id).unwrap();
        assert_eq!(summary.nb_teams, 3);
        assert_eq!(summary.game_name, "Saloon");
        assert_eq!(summary.phase, MatchPhase::InLobby);
    }

    #[tokio::test]
    async fn test_default_options_apply_to_empty_request() {
        let service = service(SessionConfig {
            default_options: "?NbPlayersPerTeams=1?GameTime=60".to_string(),
            ..SessionConfig::default()
        });
        let handle = service.host_session("").unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.settings.game_time, 60);
        assert_eq!(snapshot.players.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_level_file_fails_setup() {
        let service = service(SessionConfig {
            level: LevelSource::File(PathBuf::from("/nonexistent/level.json")),
            ..SessionConfig::default()
        });

        let err = service.host_session("?NbPlayersPerTeams=1").err().unwrap();
        assert!(matches!(err, HostError::Setup(SetupError::Level(_))));
        assert_eq!(service.registry().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_huge_team_count_fails_setup() {
        let service = service(SessionConfig::default());

        let err = service.host_session("?NbTeams=600000000").err().unwrap();
        assert!(matches!(err, HostError::Setup(SetupError::Palette(_))));
        assert_eq!(service.registry().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_huge_player_count_fails_setup() {
        let service = service(SessionConfig::default());

        let err = service
            .host_session("?NbPlayersPerTeams=2000000000")
            .err()
            .unwrap();
        assert!(matches!(err, HostError::Setup(SetupError::Seed(_))));
        assert_eq!(service.registry().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_removed_after_teardown() {
        let service = service(SessionConfig {
            runner: RunnerConfig {
                tick_interval: Duration::from_millis(1),
                ..RunnerConfig::default()
            },
            seed: Some(9),
            ..SessionConfig::default()
        });
        let handle = service
            .host_session("?GameTime=1?WarmupWanted=false?NbPlayersPerTeams=1")
            .unwrap();
        handle.submit(MatchEvent::Start).await.unwrap();

        let registry = service.registry().clone();
        timeout(Duration::from_secs(5), async {
            while registry.contains(&handle.id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(registry.active_sessions(), 0);
    }
}
