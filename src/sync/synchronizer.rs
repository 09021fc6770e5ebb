//! Throttled state push and snapshot intake for multiplayer rounds

use tokio::sync::mpsc;
use tracing::debug;

use crate::game::actor::Actor;
use crate::store::Document;

use super::mirror::{PeerMirror, Standing};

/// Local state written to the player's document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatePush {
    pub x: f32,
    pub y: f32,
    pub score: u32,
}

impl StatePush {
    pub fn from_actor(actor: &Actor) -> Self {
        Self {
            x: actor.x,
            y: actor.y,
            score: actor.score,
        }
    }
}

/// Multiplayer state synchronizer. Lives inside the tick task; it never
/// awaits the store, writes leave through `outbound`.
pub struct Synchronizer {
    player_id: String,
    player_name: String,
    push_interval_ms: u64,
    last_push_ms: Option<u64>,
    outbound: mpsc::Sender<StatePush>,
    mirror: PeerMirror,
}

impl Synchronizer {
    pub fn new(
        player_id: String,
        player_name: String,
        push_interval_ms: u64,
        outbound: mpsc::Sender<StatePush>,
    ) -> Self {
        Self {
            player_id,
            player_name,
            push_interval_ms,
            last_push_ms: None,
            outbound,
            mirror: PeerMirror::new(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn mirror(&self) -> &PeerMirror {
        &self.mirror
    }

    pub fn leaderboard(&self) -> &[Standing] {
        self.mirror.leaderboard()
    }

    /// Hand the local state to the writer if the push interval has elapsed.
    /// Returns whether a push was emitted.
    pub fn push_if_due(&mut self, actor: &Actor, now_ms: u64) -> bool {
        let due = self
            .last_push_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.push_interval_ms);
        if !due {
            return false;
        }

        self.last_push_ms = Some(now_ms);
        self.emit(StatePush::from_actor(actor));
        true
    }

    /// Push regardless of the interval (round reset)
    pub fn force_push(&mut self, actor: &Actor, now_ms: u64) {
        self.last_push_ms = Some(now_ms);
        self.emit(StatePush::from_actor(actor));
    }

    fn emit(&self, push: StatePush) {
        // Full queue: drop this push, a fresher one follows within the interval
        if let Err(e) = self.outbound.try_send(push) {
            debug!(player_id = %self.player_id, error = %e, "State push skipped");
        }
    }

    /// Replace the peer mirror with a store snapshot
    pub fn on_snapshot(&mut self, docs: Vec<Document>) {
        self.mirror.replace(docs);

        if let Some(me) = self.mirror.get(&self.player_id) {
            if !me.name.is_empty() && me.name != self.player_name {
                self.player_name = me.name.clone();
            }
        }
    }

    /// Round winner over the last snapshot plus the live local score
    pub fn select_winner(&self, local_score: u32) -> Option<Standing> {
        let local = Standing {
            player_id: self.player_id.clone(),
            name: super::mirror::display_name(&self.player_id, &self.player_name),
            score: local_score,
        };
        self.mirror.select_winner(&local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mode::{GameMode, RoundConfig, World};
    use crate::store::{to_fields, PlayerDoc};

    fn synchronizer(capacity: usize) -> (Synchronizer, mpsc::Receiver<StatePush>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Synchronizer::new("me".to_string(), "Me".to_string(), 200, tx),
            rx,
        )
    }

    fn actor() -> Actor {
        Actor::spawn(&RoundConfig::for_mode(
            GameMode::Multiplayer,
            World::new(1280.0, 800.0),
        ))
    }

    #[test]
    fn test_push_throttled_to_interval() {
        let (mut sync, mut rx) = synchronizer(16);
        let mut actor = actor();

        assert!(sync.push_if_due(&actor, 1_000));
        assert!(!sync.push_if_due(&actor, 1_100));
        assert!(!sync.push_if_due(&actor, 1_199));

        actor.y = 320.0;
        actor.score = 2;
        assert!(sync.push_if_due(&actor, 1_200));

        assert_eq!(rx.try_recv().unwrap().y, 300.0);
        let second = rx.try_recv().unwrap();
        assert_eq!(second, StatePush { x: 100.0, y: 320.0, score: 2 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_push() {
        let (mut sync, mut rx) = synchronizer(1);
        let actor = actor();

        assert!(sync.push_if_due(&actor, 0));
        // Still counts as the push for this window even though it is dropped
        assert!(sync.push_if_due(&actor, 200));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot_adopts_stored_name() {
        let (mut sync, _rx) = synchronizer(4);
        let doc = PlayerDoc {
            name: "Captain".to_string(),
            color: "yellow".to_string(),
            x: 100.0,
            y: 300.0,
            score: 0,
            ready: false,
        };
        sync.on_snapshot(vec![Document {
            id: "me".to_string(),
            fields: to_fields(&doc).unwrap(),
        }]);

        assert_eq!(sync.player_name(), "Captain");
        assert_eq!(sync.select_winner(3).unwrap().name, "Captain");
    }
}
