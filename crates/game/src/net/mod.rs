mod channel;
mod latency;
mod protocol;
mod provision;
mod socket;

pub use channel::{Channel, ChannelError, ChannelHandle, Connector};
pub use latency::LatencyProbe;
pub use protocol::{
    DeathEvent, Frame, Handshake, InboundEvent, OutboundEvent, Participant, ProtocolError,
    decode_frame,
};
pub use provision::{
    ConnectionInfo, HttpProvisioner, ProvisionError, Provisioner, StaticProvisioner, channel_url,
};
pub use socket::{SocketChannel, WebSocketConnector};
