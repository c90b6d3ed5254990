use std::time::Duration;

use crate::state::SantaColor;

pub const SERVER_TICK_RATE: u32 = 20;
pub const MAX_INTERPOLATION_DISTANCE: f32 = 100.0;
pub const PING_INTERVAL: Duration = Duration::from_millis(1000);
pub const KILL_LOG_TTL: Duration = Duration::from_millis(1000);
pub const KILL_LOG_DISPLAY_MAX: usize = 3;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a `players` update does with known players that it does not mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentPlayerPolicy {
    /// Keep them. Required when the server sends partial (delta) lists.
    #[default]
    Retain,
    /// Drop them. Only correct when every update carries the full roster.
    Remove,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_tick_rate: u32,
    pub max_interpolation_distance: f32,
    pub ping_interval: Duration,
    pub kill_log_ttl: Duration,
    pub kill_log_display_max: usize,
    pub absent_players: AbsentPlayerPolicy,
    pub secure: bool,
    /// Upper bound for each of room lookup and channel open.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_tick_rate: SERVER_TICK_RATE,
            max_interpolation_distance: MAX_INTERPOLATION_DISTANCE,
            ping_interval: PING_INTERVAL,
            kill_log_ttl: KILL_LOG_TTL,
            kill_log_display_max: KILL_LOG_DISPLAY_MAX,
            absent_players: AbsentPlayerPolicy::Retain,
            secure: true,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Locally chosen identity sent as connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub nickname: String,
    pub skin: SantaColor,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            nickname: String::from("Santa"),
            skin: SantaColor::default(),
        }
    }
}
