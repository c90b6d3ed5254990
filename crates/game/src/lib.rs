pub mod config;
pub mod event;
pub mod input;
pub mod interpolation;
pub mod net;
pub mod state;
pub mod store;

pub use config::{
    AbsentPlayerPolicy, KILL_LOG_DISPLAY_MAX, KILL_LOG_TTL, MAX_INTERPOLATION_DISTANCE,
    PING_INTERVAL, PlayerProfile, SERVER_TICK_RATE, SessionConfig,
};
pub use event::{ExpiryQueue, KillLogEntry};
pub use input::{Direction, InputEncoder, KeyCode, fire_angle};
pub use interpolation::{InterpolationConfig, InterpolationEngine, InterpolationStats};
pub use net::{
    Channel, ChannelError, ChannelHandle, ConnectionInfo, Connector, HttpProvisioner,
    InboundEvent, LatencyProbe, OutboundEvent, ProvisionError, Provisioner, StaticProvisioner,
    WebSocketConnector,
};
pub use state::{
    ConnectionStatus, GameMap, GameState, Player, PlayerId, PlayerUpdate, SantaColor, Score,
    Snowball, TileRef,
};
pub use store::{GameStore, SessionEnd, SessionError, SessionHooks, Subscription};
