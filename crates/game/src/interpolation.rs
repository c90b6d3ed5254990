use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use glam::Vec2;

use crate::config::{MAX_INTERPOLATION_DISTANCE, SERVER_TICK_RATE, SessionConfig};
use crate::state::{GameState, PlayerId, SnowballId};

#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    pub server_tick_rate: u32,
    /// Per-axis displacement above which the entity snaps to its target.
    pub max_distance: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            server_tick_rate: SERVER_TICK_RATE,
            max_distance: MAX_INTERPOLATION_DISTANCE,
        }
    }
}

impl From<&SessionConfig> for InterpolationConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            server_tick_rate: config.server_tick_rate,
            max_distance: config.max_interpolation_distance,
        }
    }
}

/// Blend weight for one display frame, clamped to `[0, 1]`.
pub fn interpolation_factor(frame_delta: Duration, server_tick_rate: u32) -> f32 {
    let effective_tick_rate = server_tick_rate.max(1) as f32;
    let frame_time_s = frame_delta.as_secs_f32();
    (frame_time_s * effective_tick_rate).clamp(0.0, 1.0)
}

/// Moves `prev` toward `target` by `factor`, snapping each axis whose gap
/// exceeds `max_distance`.
pub fn approach(prev: Vec2, target: Vec2, factor: f32, max_distance: f32) -> Vec2 {
    Vec2::new(
        approach_axis(prev.x, target.x, factor, max_distance),
        approach_axis(prev.y, target.y, factor, max_distance),
    )
}

fn approach_axis(prev: f32, target: f32, factor: f32, max_distance: f32) -> f32 {
    if (target - prev).abs() > max_distance {
        target
    } else {
        prev + factor * (target - prev)
    }
}

/// Per-session smoothing state: one client-local position per visible
/// entity, advanced once per display frame toward the latest snapshot.
#[derive(Debug, Default)]
pub struct InterpolationEngine {
    config: InterpolationConfig,
    players: HashMap<PlayerId, Vec2>,
    snowballs: HashMap<SnowballId, Vec2>,
    last_frame: Option<Instant>,
}

impl InterpolationEngine {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            players: HashMap::new(),
            snowballs: HashMap::new(),
            last_frame: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(InterpolationConfig::default())
    }

    /// Frame driver entry point. The first frame has a zero delta, so every
    /// entity starts exactly at its authoritative position.
    pub fn frame(&mut self, state: &GameState, now: Instant) {
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        self.advance(state, delta);
    }

    pub fn advance(&mut self, state: &GameState, frame_delta: Duration) {
        let factor = interpolation_factor(frame_delta, self.config.server_tick_rate);
        let max_distance = self.config.max_distance;

        for player in &state.players {
            let target = player.position();
            let prev = self.players.get(&player.id).copied().unwrap_or(target);
            self.players
                .insert(player.id.clone(), approach(prev, target, factor, max_distance));
        }

        for snowball in &state.snowballs {
            let target = snowball.position();
            let prev = self.snowballs.get(&snowball.id).copied().unwrap_or(target);
            self.snowballs
                .insert(snowball.id, approach(prev, target, factor, max_distance));
        }

        self.evict_missing(state);
    }

    fn evict_missing(&mut self, state: &GameState) {
        if self.players.len() > state.players.len() {
            let live: HashSet<&str> = state.players.iter().map(|p| p.id.as_str()).collect();
            self.players.retain(|id, _| live.contains(id.as_str()));
        }
        if self.snowballs.len() > state.snowballs.len() {
            let live: HashSet<SnowballId> = state.snowballs.iter().map(|s| s.id).collect();
            self.snowballs.retain(|id, _| live.contains(id));
        }
    }

    pub fn player(&self, id: &str) -> Option<Vec2> {
        self.players.get(id).copied()
    }

    pub fn snowball(&self, id: SnowballId) -> Option<Vec2> {
        self.snowballs.get(&id).copied()
    }

    /// Top-left world coordinate of a viewport centred on the local player.
    pub fn camera_origin(&self, state: &GameState, viewport: Vec2) -> Vec2 {
        state
            .local_player()
            .and_then(|player| self.player(&player.id))
            .map(|pos| (pos - viewport / 2.0).floor())
            .unwrap_or(Vec2::ZERO)
    }

    /// Forgets every tracked entity. The next frame snaps to the snapshot.
    pub fn reset(&mut self) {
        self.players.clear();
        self.snowballs.clear();
        self.last_frame = None;
    }

    pub fn debug_stats(&self) -> InterpolationStats {
        InterpolationStats {
            player_count: self.players.len(),
            snowball_count: self.snowballs.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationStats {
    pub player_count: usize,
    pub snowball_count: usize,
}
