//! Render snapshots of the running round

use serde::{Deserialize, Serialize};

use crate::sync::{PeerState, Standing, Synchronizer};

use super::actor::Actor;
use super::mode::{GameMode, World};
use super::obstacles::Obstacle;
use super::round::{CountdownDisplay, EndReason, Requirement, Round, RoundPhase};

/// How the round finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub reason: EndReason,
    pub score: u32,
    /// Multiplayer only
    pub winner: Option<Standing>,
}

/// Everything the front-end needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub tick: u64,
    pub mode: GameMode,
    pub phase: RoundPhase,
    pub pending: Vec<Requirement>,
    pub blocked: Option<Requirement>,
    pub countdown: Option<CountdownDisplay>,
    pub remaining_secs: Option<u32>,
    pub world: World,
    pub actor: Actor,
    pub score: u32,
    pub speed: f32,
    pub frozen: bool,
    pub obstacles: Vec<Obstacle>,
    /// Other players, without the local one
    pub peers: Vec<PeerState>,
    pub leaderboard: Vec<Standing>,
    pub outcome: Option<RoundOutcome>,
}

/// Builds snapshots at a fixed tick interval
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (phase changes, round end)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn build(
        &self,
        round: &Round,
        sync: Option<&Synchronizer>,
        outcome: Option<&RoundOutcome>,
        now_ms: u64,
    ) -> RoundSnapshot {
        let (peers, leaderboard) = match sync {
            Some(sync) => (
                sync.mirror()
                    .peers()
                    .iter()
                    .filter(|p| p.player_id != sync.player_id())
                    .cloned()
                    .collect(),
                sync.leaderboard().to_vec(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let actor = round.actor().clone();
        RoundSnapshot {
            tick: round.tick_count(),
            mode: round.config().mode,
            phase: round.phase(),
            pending: round.pending(),
            blocked: round.denied(),
            countdown: round.countdown_display(now_ms),
            remaining_secs: round.remaining_secs(now_ms),
            world: round.config().world,
            score: actor.score,
            actor,
            speed: round.speed(),
            frozen: round.is_frozen(now_ms),
            obstacles: round.obstacles().to_vec(),
            peers,
            leaderboard,
            outcome: outcome.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mode::RoundConfig;
    use crate::store::{to_fields, Document, PlayerDoc};
    use tokio::sync::mpsc;

    fn player(id: &str, score: u32) -> Document {
        let doc = PlayerDoc {
            name: id.to_uppercase(),
            color: "yellow".to_string(),
            x: 100.0,
            y: 300.0,
            score,
            ready: true,
        };
        Document {
            id: id.to_string(),
            fields: to_fields(&doc).unwrap(),
        }
    }

    #[test]
    fn test_interval() {
        let mut builder = SnapshotBuilder::new(2);
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn test_solo_snapshot_has_no_peers() {
        let round = Round::new(
            RoundConfig::for_mode(GameMode::Solo, World::new(1280.0, 800.0)),
            1,
        );
        let snapshot = SnapshotBuilder::new(2).build(&round, None, None, 0);

        assert_eq!(snapshot.phase, RoundPhase::WaitingForReady);
        assert_eq!(snapshot.pending, vec![Requirement::Assets, Requirement::Capture]);
        assert_eq!(snapshot.remaining_secs, Some(60));
        assert!(snapshot.peers.is_empty());
        assert!(snapshot.outcome.is_none());
    }

    #[test]
    fn test_peers_exclude_local_player() {
        let round = Round::new(
            RoundConfig::for_mode(GameMode::Multiplayer, World::new(1280.0, 800.0)),
            1,
        );
        let (tx, _rx) = mpsc::channel(4);
        let mut sync = Synchronizer::new("me".to_string(), "Me".to_string(), 200, tx);
        sync.on_snapshot(vec![player("bo", 4), player("me", 1), player("cy", 2)]);

        let snapshot = SnapshotBuilder::new(2).build(&round, Some(&sync), None, 0);
        let ids: Vec<&str> = snapshot.peers.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["bo", "cy"]);
        assert_eq!(snapshot.leaderboard.len(), 3);
        assert_eq!(snapshot.leaderboard[0].player_id, "bo");
    }
}
