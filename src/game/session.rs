//! The tick task: owns the round and talks to everything else over channels

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::lobby::players_path;
use crate::store::watch::spawn_collection_watch;
use crate::store::{Document, DocumentStore, LobbyStore};
use crate::sync::{spawn_state_writer, Synchronizer};
use crate::util::time::{monotonic_millis, tick_duration, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{FlapSource, ServerMsg};

use super::mode::RoundConfig;
use super::round::{CountdownDisplay, Requirement, Round, RoundEvent, RoundPhase};
use super::snapshot::{RoundOutcome, RoundSnapshot, SnapshotBuilder};

/// Inputs accepted by the session
#[derive(Debug, Clone)]
pub enum SessionInput {
    Flap { source: FlapSource },
    Ready(Requirement),
    CaptureDenied { reason: String },
    /// The player document exists in lobby `code`; start syncing with it
    LobbyJoined { code: String },
    /// Stop syncing (the player left the lobby)
    LobbyLeft,
    /// Replace the round with a fresh one
    Restart,
}

/// Startup parameters of a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub round: RoundConfig,
    pub seed: u64,
    pub player_id: String,
    pub player_name: String,
    pub peer_poll: Duration,
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<SessionInput>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub snapshot_rx: watch::Receiver<RoundSnapshot>,
}

impl SessionHandle {
    /// Queue an input for the next tick. False if the session has stopped.
    pub async fn send(&self, input: SessionInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Most recent published snapshot
    pub fn latest(&self) -> RoundSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

/// Live connection to a lobby
struct SyncLink {
    code: String,
    synchronizer: Synchronizer,
    peer_rx: mpsc::Receiver<Vec<Document>>,
}

/// The single writer of round state
pub struct GameSession<S> {
    settings: SessionSettings,
    rng: ChaCha8Rng,
    round: Round,
    lobbies: LobbyStore<S>,
    link: Option<SyncLink>,
    /// Requirements met so far; replayed into every new round
    satisfied: Vec<Requirement>,
    denied: bool,
    outcome: Option<RoundOutcome>,
    last_countdown: Option<CountdownDisplay>,
    pending_events: Vec<RoundEvent>,
    input_rx: mpsc::Receiver<SessionInput>,
    events_tx: broadcast::Sender<ServerMsg>,
    snapshot_tx: watch::Sender<RoundSnapshot>,
    snapshot_builder: SnapshotBuilder,
}

impl<S: DocumentStore> GameSession<S> {
    pub fn new(settings: SessionSettings, lobbies: LobbyStore<S>) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(64);

        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let round = Round::new(settings.round.clone(), rng.gen());
        let snapshot_builder = SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS);
        let initial = snapshot_builder.build(&round, None, None, monotonic_millis());
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let handle = SessionHandle {
            input_tx,
            events_tx: events_tx.clone(),
            snapshot_rx,
        };

        let session = Self {
            settings,
            rng,
            round,
            lobbies,
            link: None,
            satisfied: Vec::new(),
            denied: false,
            outcome: None,
            last_countdown: None,
            pending_events: Vec::new(),
            input_rx,
            events_tx,
            snapshot_tx,
            snapshot_builder,
        };

        (session, handle)
    }

    /// Run the tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            player_id = %self.settings.player_id,
            mode = ?self.settings.round.mode,
            "Session started"
        );

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = monotonic_millis();

            if !self.process_inputs(now) {
                break;
            }
            self.process_peer_snapshots();
            self.run_tick(now);
        }

        info!(player_id = %self.settings.player_id, "Session stopped");
    }

    /// Drain the input queue. Returns false once every sender is gone.
    fn process_inputs(&mut self, now: u64) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => self.handle_input(input, now),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_input(&mut self, input: SessionInput, now: u64) {
        match input {
            SessionInput::Flap { source } => {
                if self.round.flap() {
                    debug!(source = ?source, "Flap");
                }
            }
            SessionInput::Ready(requirement) => {
                if !self.satisfied.contains(&requirement) {
                    self.satisfied.push(requirement);
                }
                self.round.mark_ready(requirement, now);
            }
            SessionInput::CaptureDenied { reason } => {
                warn!(player_id = %self.settings.player_id, reason = %reason, "Camera access denied");
                self.denied = true;
                self.round.deny(Requirement::Capture);
                self.snapshot_builder.force_next();
                let _ = self.events_tx.send(ServerMsg::error(
                    "capture_denied",
                    format!("Camera access is required to play: {}", reason),
                ));
            }
            SessionInput::LobbyJoined { code } => self.attach_lobby(code, now),
            SessionInput::LobbyLeft => {
                // The next round has to wait for a lobby again
                self.satisfied.retain(|r| *r != Requirement::Lobby);
                if let Some(link) = self.link.take() {
                    info!(lobby = %link.code, player_id = %self.settings.player_id, "Left lobby");
                }
            }
            SessionInput::Restart => self.restart(now),
        }
    }

    fn attach_lobby(&mut self, code: String, now: u64) {
        if !self.settings.round.sync_enabled {
            warn!(lobby = %code, mode = ?self.settings.round.mode, "Lobby ignored outside multiplayer");
            return;
        }

        let (push_tx, push_rx) = mpsc::channel(8);
        let (peer_tx, peer_rx) = mpsc::channel(4);

        spawn_state_writer(
            self.lobbies.clone(),
            code.clone(),
            self.settings.player_id.clone(),
            push_rx,
        );
        spawn_collection_watch(
            self.lobbies.store().clone(),
            players_path(&code),
            self.settings.peer_poll,
            peer_tx,
        );

        let mut synchronizer = Synchronizer::new(
            self.settings.player_id.clone(),
            self.settings.player_name.clone(),
            self.settings.round.push_interval_ms,
            push_tx,
        );
        synchronizer.force_push(self.round.actor(), now);

        info!(lobby = %code, player_id = %self.settings.player_id, "Syncing with lobby");
        // Replacing a previous link drops its channels, which stops its tasks
        self.link = Some(SyncLink {
            code,
            synchronizer,
            peer_rx,
        });

        if !self.satisfied.contains(&Requirement::Lobby) {
            self.satisfied.push(Requirement::Lobby);
        }
        self.round.mark_ready(Requirement::Lobby, now);
    }

    fn restart(&mut self, now: u64) {
        info!(player_id = %self.settings.player_id, "Round restarted");
        self.round = Round::new(self.settings.round.clone(), self.rng.gen());
        self.outcome = None;
        self.last_countdown = None;
        self.pending_events.clear();

        if self.denied {
            self.round.deny(Requirement::Capture);
        }
        for requirement in self.satisfied.clone() {
            self.round.mark_ready(requirement, now);
        }

        if let Some(link) = self.link.as_mut() {
            link.synchronizer.force_push(self.round.actor(), now);
        }

        let _ = self.events_tx.send(ServerMsg::Phase {
            phase: self.round.phase(),
        });
        self.snapshot_builder.force_next();
    }

    /// Keep only the newest queued peer snapshot
    fn process_peer_snapshots(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };

        let mut latest = None;
        while let Ok(docs) = link.peer_rx.try_recv() {
            latest = Some(docs);
        }
        if let Some(docs) = latest {
            link.synchronizer.on_snapshot(docs);
        }
    }

    fn run_tick(&mut self, now: u64) {
        let phase_before = self.round.phase();
        let events = self.round.tick(now);
        let phase = self.round.phase();

        if phase == RoundPhase::Active {
            if let Some(link) = self.link.as_mut() {
                link.synchronizer.push_if_due(self.round.actor(), now);
            }
        }

        if phase != phase_before {
            let _ = self.events_tx.send(ServerMsg::Phase { phase });
            self.snapshot_builder.force_next();
            if phase == RoundPhase::Terminal {
                self.finish_round(now);
            }
        }

        let countdown = self.round.countdown_display(now);
        if countdown != self.last_countdown {
            if let Some(display) = countdown {
                let _ = self.events_tx.send(ServerMsg::Countdown { display });
            }
            self.last_countdown = countdown;
        }

        self.pending_events.extend(events);
        if self.snapshot_builder.should_send() {
            self.publish(now);
        }
    }

    fn finish_round(&mut self, now: u64) {
        let Some(reason) = self.round.end_reason() else {
            return;
        };
        let score = self.round.actor().score;

        let winner = self.link.as_mut().and_then(|link| {
            // Final state goes out regardless of the push interval
            link.synchronizer.force_push(self.round.actor(), now);
            link.synchronizer.select_winner(score)
        });

        let outcome = RoundOutcome {
            reason,
            score,
            winner,
        };
        info!(
            player_id = %self.settings.player_id,
            reason = ?outcome.reason,
            score = outcome.score,
            winner = ?outcome.winner.as_ref().map(|w| w.name.as_str()),
            "Round outcome"
        );

        let _ = self.events_tx.send(ServerMsg::RoundEnd {
            outcome: outcome.clone(),
        });
        self.outcome = Some(outcome);
    }

    fn publish(&mut self, now: u64) {
        let sync = self.link.as_ref().map(|link| &link.synchronizer);
        let snapshot = self
            .snapshot_builder
            .build(&self.round, sync, self.outcome.as_ref(), now);

        self.snapshot_tx.send_replace(snapshot.clone());
        let events = std::mem::take(&mut self.pending_events);
        // No subscribers is fine
        let _ = self.events_tx.send(ServerMsg::Snapshot {
            snapshot: Box::new(snapshot),
            events,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mode::{GameMode, World};
    use crate::game::round::EndReason;
    use crate::store::MemoryStore;

    fn settings(mode: GameMode) -> SessionSettings {
        let mut round = RoundConfig::for_mode(mode, World::new(1280.0, 800.0));
        round.countdown_secs = 0;
        round.go_hold_ms = 0;
        SessionSettings {
            round,
            seed: 3,
            player_id: "me00001".to_string(),
            player_name: "Me".to_string(),
            peer_poll: Duration::from_millis(10),
        }
    }

    /// Wait until the published snapshot satisfies `check`
    async fn wait_for(
        handle: &SessionHandle,
        check: impl Fn(&RoundSnapshot) -> bool,
    ) -> RoundSnapshot {
        let mut rx = handle.snapshot_rx.clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if check(&snapshot) {
                        return snapshot.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    panic!("session stopped");
                }
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    #[tokio::test]
    async fn test_solo_round_starts_after_ready() {
        let (session, handle) =
            GameSession::new(settings(GameMode::Solo), LobbyStore::new(MemoryStore::new()));
        tokio::spawn(session.run());

        handle.send(SessionInput::Ready(Requirement::Assets)).await;
        let waiting = wait_for(&handle, |s| s.pending == vec![Requirement::Capture]).await;
        assert_eq!(waiting.phase, RoundPhase::WaitingForReady);

        handle.send(SessionInput::Ready(Requirement::Capture)).await;
        let active = wait_for(&handle, |s| s.phase == RoundPhase::Active).await;
        assert_eq!(active.obstacles.len(), 1);

        handle.send(SessionInput::Flap { source: FlapSource::Key }).await;
        wait_for(&handle, |s| s.actor.velocity < -5.0).await;
    }

    #[tokio::test]
    async fn test_capture_denial_blocks_round() {
        let (session, handle) =
            GameSession::new(settings(GameMode::Solo), LobbyStore::new(MemoryStore::new()));
        let mut events = handle.subscribe();
        tokio::spawn(session.run());

        handle
            .send(SessionInput::CaptureDenied {
                reason: "NotAllowedError".to_string(),
            })
            .await;
        handle.send(SessionInput::Ready(Requirement::Assets)).await;
        handle.send(SessionInput::Ready(Requirement::Capture)).await;

        let blocked = wait_for(&handle, |s| s.blocked.is_some()).await;
        assert_eq!(blocked.phase, RoundPhase::WaitingForReady);

        let error = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(ServerMsg::Error { code, .. }) = events.recv().await {
                    return code;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(error, "capture_denied");
    }

    #[tokio::test]
    async fn test_timed_round_ends_and_restarts() {
        let mut settings = settings(GameMode::Solo);
        settings.round.duration_secs = Some(0);
        let (session, handle) = GameSession::new(settings, LobbyStore::new(MemoryStore::new()));
        tokio::spawn(session.run());

        handle.send(SessionInput::Ready(Requirement::Assets)).await;
        handle.send(SessionInput::Ready(Requirement::Capture)).await;

        let ended = wait_for(&handle, |s| s.outcome.is_some()).await;
        let outcome = ended.outcome.unwrap();
        assert_eq!(outcome.reason, EndReason::TimeUp);
        assert!(outcome.winner.is_none());

        handle.send(SessionInput::Restart).await;
        let restarted = wait_for(&handle, |s| s.outcome.is_none()).await;
        assert_eq!(restarted.score, 0);
    }

    #[tokio::test]
    async fn test_multiplayer_syncs_with_lobby() {
        let store = MemoryStore::new();
        let lobbies = LobbyStore::new(store.clone());
        let code = lobbies.create_lobby("bo00001", "Bo").await.unwrap();
        lobbies
            .enter_game(&code, "me00001", "Me", 100.0, 300.0)
            .await
            .unwrap();

        let (session, handle) = GameSession::new(settings(GameMode::Multiplayer), lobbies.clone());
        tokio::spawn(session.run());

        handle.send(SessionInput::Ready(Requirement::Assets)).await;
        handle.send(SessionInput::Ready(Requirement::Capture)).await;
        let waiting = wait_for(&handle, |s| s.pending == vec![Requirement::Lobby]).await;
        assert_eq!(waiting.phase, RoundPhase::WaitingForReady);

        handle
            .send(SessionInput::LobbyJoined { code: code.clone() })
            .await;
        wait_for(&handle, |s| s.phase == RoundPhase::Active).await;

        // The other player shows up as a peer
        let with_peer = wait_for(&handle, |s| !s.peers.is_empty()).await;
        assert_eq!(with_peer.peers[0].player_id, "bo00001");

        // Our falling bird reaches the store
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let players = lobbies.list_players(&code).await.unwrap();
                let me = players.iter().find(|(id, _)| id == "me00001").unwrap();
                if me.1.y > 300.0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_leaving_lobby_waits_for_lobby() {
        let lobbies = LobbyStore::new(MemoryStore::new());
        let code = lobbies.create_lobby("bo00001", "Bo").await.unwrap();
        lobbies
            .enter_game(&code, "me00001", "Me", 100.0, 300.0)
            .await
            .unwrap();

        let (session, handle) = GameSession::new(settings(GameMode::Multiplayer), lobbies);
        tokio::spawn(session.run());

        handle.send(SessionInput::Ready(Requirement::Assets)).await;
        handle.send(SessionInput::Ready(Requirement::Capture)).await;
        handle.send(SessionInput::LobbyJoined { code }).await;
        wait_for(&handle, |s| s.phase == RoundPhase::Active).await;

        handle.send(SessionInput::LobbyLeft).await;
        handle.send(SessionInput::Restart).await;
        let restarted = wait_for(&handle, |s| s.phase == RoundPhase::WaitingForReady).await;
        assert_eq!(restarted.pending, vec![Requirement::Lobby]);
        assert!(restarted.peers.is_empty());
    }

    #[tokio::test]
    async fn test_stops_when_handles_dropped() {
        let (session, handle) =
            GameSession::new(settings(GameMode::Solo), LobbyStore::new(MemoryStore::new()));
        let task = tokio::spawn(session.run());
        drop(handle);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
