mod map;
mod player;

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use map::{GameMap, MapError, TILES_IN_ROW, TileGrid, TileRef};
pub use player::{
    Player, PlayerId, PlayerUpdate, SantaColor, Score, SkinError, merge_players, scores_from,
};

use crate::event::KillLogEntry;

pub type SnowballId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snowball {
    pub id: SnowballId,
    pub x: f32,
    pub y: f32,
}

impl Snowball {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Resolving,
    Connecting,
    Ready,
    /// The endpoint lookup or the channel open failed.
    Failed(String),
    Closed,
}

/// One published snapshot of the client-side world.
///
/// Never mutated after publication; every change produces a new value with a
/// higher `version`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub version: u64,
    pub is_ready: bool,
    pub status: ConnectionStatus,
    pub player_id: PlayerId,
    pub players: Vec<Player>,
    pub snowballs: Vec<Snowball>,
    pub scores: Vec<Score>,
    /// Milliseconds left in the round.
    pub remaining_time: u64,
    /// Last measured round trip in milliseconds.
    pub latency: u64,
    pub kill_log: Vec<KillLogEntry>,
    pub map: Arc<GameMap>,
}

impl GameState {
    pub fn local_player(&self) -> Option<&Player> {
        if self.player_id.is_empty() {
            return None;
        }
        self.players.iter().find(|p| p.id == self.player_id)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_time / 1000
    }

    /// The oldest `max` live entries, in arrival order.
    pub fn visible_kill_log(&self, max: usize) -> &[KillLogEntry] {
        &self.kill_log[..self.kill_log.len().min(max)]
    }

    /// Scoreboard order: most kills first, fewest deaths breaking ties.
    pub fn ranked_scores(&self) -> Vec<&Score> {
        let mut ranked: Vec<&Score> = self.scores.iter().collect();
        ranked.sort_by(|a, b| b.kills.cmp(&a.kills).then(a.deaths.cmp(&b.deaths)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(victim: &str) -> KillLogEntry {
        KillLogEntry::new(victim.to_string(), "k".to_string())
    }

    #[test]
    fn kill_feed_is_capped_for_display() {
        let state = GameState {
            kill_log: vec![entry("a"), entry("b"), entry("c"), entry("d")],
            ..Default::default()
        };

        let visible: Vec<&str> = state
            .visible_kill_log(3)
            .iter()
            .map(|e| e.victim.as_str())
            .collect();
        assert_eq!(visible, ["a", "b", "c"]);
        assert_eq!(state.kill_log.len(), 4);
    }

    #[test]
    fn local_player_requires_identity() {
        let mut state = GameState {
            players: vec![Player {
                id: "me".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(state.local_player().is_none());

        state.player_id = "me".into();
        assert_eq!(state.local_player().map(|p| p.id.as_str()), Some("me"));
    }

    #[test]
    fn remaining_time_in_whole_seconds() {
        let state = GameState {
            remaining_time: 59_999,
            ..Default::default()
        };
        assert_eq!(state.remaining_secs(), 59);
    }
}
