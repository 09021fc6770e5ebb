//! Local mirror of the other players' documents

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{Document, PlayerDoc};

/// Entries shown on the leaderboard
pub const LEADERBOARD_SIZE: usize = 3;

/// A player as last seen in the shared store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    pub player_id: String,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub ready: bool,
}

impl PeerState {
    pub fn from_doc(player_id: String, doc: PlayerDoc) -> Self {
        Self {
            player_id,
            name: doc.name,
            color: doc.color,
            x: doc.x,
            y: doc.y,
            score: doc.score,
            ready: doc.ready,
        }
    }
}

/// Name shown for a player, falling back to a short id
pub fn display_name(player_id: &str, name: &str) -> String {
    if name.is_empty() {
        let short: String = player_id.chars().take(4).collect();
        format!("Player {}", short)
    } else {
        name.to_string()
    }
}

/// A (player, score) pair for the leaderboard and the round result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: String,
    pub name: String,
    pub score: u32,
}

/// Peer mirror. Replaced wholesale by every snapshot, in snapshot order
/// (document id order for both store backends).
#[derive(Debug, Default)]
pub struct PeerMirror {
    peers: Vec<PeerState>,
    leaderboard: Vec<Standing>,
}

impl PeerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peers(&self) -> &[PeerState] {
        &self.peers
    }

    pub fn get(&self, player_id: &str) -> Option<&PeerState> {
        self.peers.iter().find(|p| p.player_id == player_id)
    }

    pub fn leaderboard(&self) -> &[Standing] {
        &self.leaderboard
    }

    /// Replace the mirror with a snapshot's documents. Documents that fail to
    /// decode are skipped.
    pub fn replace(&mut self, docs: Vec<Document>) {
        self.peers = docs
            .into_iter()
            .filter_map(|doc| match doc.decode::<PlayerDoc>() {
                Ok(player) => Some(PeerState::from_doc(doc.id, player)),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed player document");
                    None
                }
            })
            .collect();
        self.leaderboard = Self::rank(&self.peers);
    }

    /// Top scores, descending; ties keep mirror order
    fn rank(peers: &[PeerState]) -> Vec<Standing> {
        let mut standings: Vec<Standing> = peers
            .iter()
            .map(|p| Standing {
                player_id: p.player_id.clone(),
                name: display_name(&p.player_id, &p.name),
                score: p.score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings.truncate(LEADERBOARD_SIZE);
        standings
    }

    /// Highest score over the mirror with the local entry replaced by the
    /// live local score (appended if the store has not echoed it yet).
    /// The first maximum in mirror order wins.
    pub fn select_winner(&self, local: &Standing) -> Option<Standing> {
        let mut candidates: Vec<Standing> = self
            .peers
            .iter()
            .map(|p| {
                if p.player_id == local.player_id {
                    local.clone()
                } else {
                    Standing {
                        player_id: p.player_id.clone(),
                        name: display_name(&p.player_id, &p.name),
                        score: p.score,
                    }
                }
            })
            .collect();

        if !candidates.iter().any(|c| c.player_id == local.player_id) {
            candidates.push(local.clone());
        }

        let mut winner: Option<Standing> = None;
        for candidate in candidates {
            match &winner {
                Some(best) if candidate.score <= best.score => {}
                _ => winner = Some(candidate),
            }
        }
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::to_fields;

    fn doc(id: &str, name: &str, score: u32) -> Document {
        let player = PlayerDoc {
            name: name.to_string(),
            color: "white".to_string(),
            x: 100.0,
            y: 300.0,
            score,
            ready: true,
        };
        Document {
            id: id.to_string(),
            fields: to_fields(&player).unwrap(),
        }
    }

    fn local(id: &str, score: u32) -> Standing {
        Standing {
            player_id: id.to_string(),
            name: "Me".to_string(),
            score,
        }
    }

    #[test]
    fn test_snapshot_replaces_mirror() {
        let mut mirror = PeerMirror::new();
        mirror.replace(vec![doc("a", "Ada", 1), doc("b", "Bo", 2)]);
        assert_eq!(mirror.peers().len(), 2);

        mirror.replace(vec![doc("c", "Cy", 5)]);
        assert_eq!(mirror.peers().len(), 1);
        assert!(mirror.get("a").is_none());
        assert_eq!(mirror.get("c").unwrap().score, 5);
    }

    #[test]
    fn test_malformed_documents_are_skipped() {
        let mut mirror = PeerMirror::new();
        let mut broken = doc("b", "Bo", 2);
        broken
            .fields
            .insert("score".to_string(), serde_json::json!("lots"));

        mirror.replace(vec![doc("a", "Ada", 1), broken]);
        assert_eq!(mirror.peers().len(), 1);
    }

    #[test]
    fn test_leaderboard_top_three_stable() {
        let mut mirror = PeerMirror::new();
        mirror.replace(vec![
            doc("a", "Ada", 4),
            doc("b", "Bo", 9),
            doc("c", "Cy", 4),
            doc("d", "", 1),
            doc("e", "Eve", 4),
        ]);

        let ids: Vec<&str> = mirror
            .leaderboard()
            .iter()
            .map(|s| s.player_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_winner_first_max_wins() {
        let mut mirror = PeerMirror::new();
        mirror.replace(vec![doc("A", "Ada", 3), doc("B", "Bo", 7), doc("C", "Cy", 7)]);

        let winner = mirror.select_winner(&local("A", 3)).unwrap();
        assert_eq!(winner.player_id, "B");
        assert_eq!(winner.score, 7);
    }

    #[test]
    fn test_winner_uses_live_local_score() {
        let mut mirror = PeerMirror::new();
        // Store still holds the stale score of 2 for the local player
        mirror.replace(vec![doc("me", "Me", 2), doc("zed", "Zed", 6)]);

        let winner = mirror.select_winner(&local("me", 8)).unwrap();
        assert_eq!(winner.player_id, "me");
        assert_eq!(winner.score, 8);
    }

    #[test]
    fn test_winner_without_snapshot_is_local() {
        let mirror = PeerMirror::new();
        let winner = mirror.select_winner(&local("me", 0)).unwrap();
        assert_eq!(winner.player_id, "me");
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name("k3j9x2a", ""), "Player k3j9");
        assert_eq!(display_name("k3j9x2a", "Ada"), "Ada");
    }
}
