//! Match task and its handle
//!
//! Each match runs on its own task. Intents arrive through a bounded queue
//! and are applied one at a time, interleaved with clock ticks while the
//! clock is armed. After every processed event the task publishes a fresh
//! snapshot and broadcasts the notifications it produced.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::level::LevelLayout;
use crate::settings::MatchSettings;
use crate::util::rate_limit::{create_limiter, Limiter, INTENT_RATE_LIMIT};
use crate::util::time::DEFAULT_TICK_INTERVAL;

use super::intent::{EventOutcome, IntentRejected, MatchEvent, Origin};
use super::snapshot::{MatchReplica, MatchSnapshot, SnapshotBuilder};
use super::state_machine::{MatchStateMachine, Notification, SetupError};

/// Runtime knobs of a match task
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Length of one match-clock second
    pub tick_interval: Duration,
    /// Intent queue capacity
    pub intent_queue: usize,
    /// Intents accepted per second per session
    pub intents_per_second: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            intent_queue: 256,
            intents_per_second: INTENT_RATE_LIMIT,
        }
    }
}

/// Intent waiting for the match task, with the channel for its outcome
struct IntentEnvelope {
    event: MatchEvent,
    reply: oneshot::Sender<Result<EventOutcome, IntentRejected>>,
}

/// Why an intent never produced an outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Rejected(#[from] IntentRejected),

    #[error("Too many intents for this session")]
    RateLimited,

    #[error("Match task has stopped")]
    Closed,
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    intent_tx: mpsc::Sender<IntentEnvelope>,
    notify_tx: broadcast::Sender<Notification>,
    replica: MatchReplica,
    limiter: Arc<Limiter>,
}

impl MatchHandle {
    /// Queue a remote intent and wait for the authority's verdict
    pub async fn submit(&self, event: MatchEvent) -> Result<EventOutcome, SubmitError> {
        if self.limiter.check().is_err() {
            return Err(SubmitError::RateLimited);
        }

        let (reply, outcome) = oneshot::channel();
        self.intent_tx
            .send(IntentEnvelope { event, reply })
            .await
            .map_err(|_| SubmitError::Closed)?;

        Ok(outcome.await.map_err(|_| SubmitError::Closed)??)
    }

    pub fn replica(&self) -> &MatchReplica {
        &self.replica
    }

    pub fn snapshot(&self) -> Arc<MatchSnapshot> {
        self.replica.load()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.intent_tx.is_closed()
    }
}

/// The authoritative match task
pub struct GameMatch {
    machine: MatchStateMachine,
    intent_rx: mpsc::Receiver<IntentEnvelope>,
    notify_tx: broadcast::Sender<Notification>,
    replica: MatchReplica,
    snapshot_builder: SnapshotBuilder,
    tick_interval: Duration,
}

impl GameMatch {
    /// Set the match up. Nothing runs until [`GameMatch::run`] is polled.
    pub fn new(
        id: Uuid,
        settings: MatchSettings,
        level: &LevelLayout,
        seed: u64,
        config: RunnerConfig,
    ) -> Result<(Self, MatchHandle), SetupError> {
        let machine = MatchStateMachine::new(id, settings, level, seed)?;

        let (intent_tx, intent_rx) = mpsc::channel(config.intent_queue.max(1));
        let (notify_tx, _) = broadcast::channel(64);
        let mut snapshot_builder = SnapshotBuilder::new();
        let replica = MatchReplica::new(snapshot_builder.build(&machine));

        let handle = MatchHandle {
            id,
            intent_tx,
            notify_tx: notify_tx.clone(),
            replica: replica.clone(),
            limiter: create_limiter(config.intents_per_second),
        };

        let game_match = Self {
            machine,
            intent_rx,
            notify_tx,
            replica,
            snapshot_builder,
            tick_interval: config.tick_interval,
        };

        Ok((game_match, handle))
    }

    /// Run until the session is torn down or every handle is gone
    pub async fn run(mut self) {
        let id = self.machine.session_id();
        info!(session_id = %id, "Match task started");

        let _ = self.apply(MatchEvent::WaitingToStart, Origin::Authority);
        let mut clock: Option<Interval> = None;

        loop {
            match (self.machine.clock_armed(), clock.is_some()) {
                (true, false) => clock = Some(self.arm_clock()),
                (false, true) => clock = None,
                _ => {}
            }

            tokio::select! {
                envelope = self.intent_rx.recv() => {
                    let Some(envelope) = envelope else {
                        info!(session_id = %id, "All handles dropped, stopping match");
                        break;
                    };
                    let result = self.apply(envelope.event, Origin::Remote);
                    let _ = envelope.reply.send(result);
                }
                _ = next_tick(&mut clock) => {
                    let _ = self.apply(MatchEvent::Tick, Origin::Authority);
                }
            }

            if self.machine.is_torn_down() {
                break;
            }
        }

        info!(session_id = %id, "Match task stopped");
    }

    fn arm_clock(&self) -> Interval {
        let period = self.tick_interval;
        let mut clock = interval_at(Instant::now() + period, period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        clock
    }

    fn apply(
        &mut self,
        event: MatchEvent,
        origin: Origin,
    ) -> Result<EventOutcome, IntentRejected> {
        let name = event.name();
        let result = self.machine.dispatch(event, origin);
        match &result {
            Ok(outcome) => debug!(event = name, ?outcome, "Event processed"),
            Err(rejection) if origin == Origin::Authority => {
                warn!(event = name, reason = %rejection, "Authority event rejected")
            }
            Err(_) => {}
        }
        self.publish();
        result
    }

    /// Publish the snapshot, then the notifications produced with it
    fn publish(&mut self) {
        self.replica
            .publish(self.snapshot_builder.build(&self.machine));

        for notification in self.machine.drain_notifications() {
            // No subscriber is fine
            let _ = self.notify_tx.send(notification);
        }
    }
}

async fn next_tick(clock: &mut Option<Interval>) {
    match clock {
        Some(clock) => {
            clock.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ledger::{MatchPhase, ScoreEvent, ScoreKind, WinningTeam};
    use tokio::time::timeout;

    fn spawn_match(options: &str, config: RunnerConfig) -> MatchHandle {
        let settings = MatchSettings::parse(options);
        let level = LevelLayout::generated(settings.nb_teams, 4);
        let (game_match, handle) =
            GameMatch::new(Uuid::new_v4(), settings, &level, 3, config).unwrap();
        tokio::spawn(game_match.run());
        handle
    }

    fn fast() -> RunnerConfig {
        RunnerConfig {
            tick_interval: Duration::from_millis(1),
            ..RunnerConfig::default()
        }
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<Notification>,
        wanted: impl Fn(&Notification) -> bool,
    ) -> Notification {
        timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(n) if wanted(&n) => return n,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("notifications closed"),
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_join_through_handle() {
        let handle = spawn_match("?NbPlayersPerTeams=2", RunnerConfig::default());
        let participant = Uuid::new_v4();

        let outcome = tokio_test::assert_ok!(
            handle
                .submit(MatchEvent::Join {
                    participant,
                    options: "?CharacterName=Wyatt".to_string(),
                })
                .await
        );
        assert!(matches!(outcome, EventOutcome::Joined { team: 0, .. }));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, MatchPhase::InLobby);
        assert_eq!(snapshot.player(&participant).unwrap().name, "Wyatt");
    }

    #[tokio::test]
    async fn test_authority_rejects_clock_from_remote() {
        let handle = spawn_match("?NbPlayersPerTeams=1", RunnerConfig::default());
        let err = tokio_test::assert_err!(handle.submit(MatchEvent::Tick).await);
        assert_eq!(err, SubmitError::Rejected(IntentRejected::NotPermitted("tick")));
    }

    #[tokio::test]
    async fn test_full_match_lifecycle() {
        let handle = spawn_match(
            "?GameTime=2?WarmupWanted=false?NbPlayersPerTeams=1",
            fast(),
        );
        let mut rx = handle.subscribe();

        handle.submit(MatchEvent::Start).await.unwrap();

        let ended = wait_for(&mut rx, |n| matches!(n, Notification::MatchEnded { .. })).await;
        assert_eq!(
            ended,
            Notification::MatchEnded {
                winning_team: WinningTeam::Draw
            }
        );

        wait_for(&mut rx, |n| *n == Notification::SessionTeardown).await;
        assert!(handle.snapshot().torn_down);

        // Task is gone once torn down
        timeout(Duration::from_secs(5), async {
            while !handle.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            handle.submit(MatchEvent::Start).await,
            Err(SubmitError::Closed)
        );
    }

    #[tokio::test]
    async fn test_score_reaches_threshold() {
        let handle = spawn_match(
            "?WarmupWanted=false?NbPointsForWin=20?NbPlayersPerTeams=1",
            RunnerConfig::default(),
        );
        handle.submit(MatchEvent::Start).await.unwrap();

        let kill = MatchEvent::Score(ScoreEvent {
            kind: ScoreKind::Kill,
            killer_team: Some(1),
            victim_team: 0,
        });
        handle.submit(kill.clone()).await.unwrap();
        assert_eq!(handle.snapshot().score(1), Some(10));
        handle.submit(kill).await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, MatchPhase::Scoreboard);
        assert_eq!(snapshot.winning_team, WinningTeam::Team(1));
    }

    #[tokio::test]
    async fn test_intents_are_rate_limited() {
        let handle = spawn_match(
            "?NbPlayersPerTeams=1",
            RunnerConfig {
                intents_per_second: 1,
                ..RunnerConfig::default()
            },
        );

        handle.submit(MatchEvent::Start).await.unwrap();
        assert_eq!(
            handle.submit(MatchEvent::Start).await,
            Err(SubmitError::RateLimited)
        );
    }
}
