//! WebSocket channel to the game server.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::channel::{Channel, ChannelError, ChannelHandle, Connector};
use super::protocol::{
    Frame, HEARTBEAT_REPLY, Handshake, InboundEvent, NAMESPACE_CONNECT, NAMESPACE_DISCONNECT,
    OutboundEvent, decode_frame,
};

#[derive(Debug)]
enum Outgoing {
    Frame(String),
    Close,
}

pub struct SocketChannel {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closed: bool,
}

impl Channel for SocketChannel {
    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.outgoing
            .send(Outgoing::Frame(event.encode()))
            .map_err(|_| ChannelError::Closed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<ChannelHandle, ChannelError> {
        log::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Open {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        log::info!("WebSocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Outgoing>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<InboundEvent>();
        let replies = outgoing_tx.clone();

        let reader_handle = tokio::spawn(async move {
            // The server pings at least this often; silence past it means the peer is gone.
            let mut idle_timeout = Handshake::default().idle_timeout();
            let reason = loop {
                let next = match tokio::time::timeout(idle_timeout, read.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        log::warn!("No frame from server for {:?}", idle_timeout);
                        break Some(String::from("ping timeout"));
                    }
                };
                let text = match next {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) => break Some(String::from("server closed connection")),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        log::error!("WebSocket read error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break None,
                };

                match decode_frame(text.as_str()) {
                    Ok(Frame::Open(handshake)) => {
                        idle_timeout = handshake.idle_timeout();
                        log::debug!("Engine open, idle timeout {:?}", idle_timeout);
                        let _ = replies.send(Outgoing::Frame(NAMESPACE_CONNECT.to_string()));
                    }
                    Ok(Frame::Heartbeat) => {
                        let _ = replies.send(Outgoing::Frame(HEARTBEAT_REPLY.to_string()));
                    }
                    Ok(Frame::Event(InboundEvent::Disconnect { reason })) => break reason,
                    Ok(Frame::Event(event)) => {
                        if events_tx.send(event).is_err() {
                            log::debug!("Event receiver dropped");
                            return;
                        }
                    }
                    Ok(Frame::Ignored) => {}
                    Err(e) => {
                        log::warn!("Dropping undecodable frame: {} - {}", e, text.as_str());
                    }
                }
            };

            let _ = events_tx.send(InboundEvent::Disconnect { reason });
            log::info!("Reader task ended");
        });

        tokio::spawn(async move {
            while let Some(outgoing) = outgoing_rx.recv().await {
                match outgoing {
                    Outgoing::Frame(frame) => {
                        log::trace!("Sending: {}", frame);
                        if let Err(e) = write.send(Message::text(frame)).await {
                            log::error!("Failed to send frame: {}", e);
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = write.send(Message::text(NAMESPACE_DISCONNECT)).await;
                        let _ = write.close().await;
                        reader_handle.abort();
                        break;
                    }
                }
            }
            log::info!("Writer loop ended");
        });

        Ok(ChannelHandle {
            channel: Box::new(SocketChannel {
                outgoing: outgoing_tx,
                closed: false,
            }),
            events: events_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use super::*;

    #[test]
    fn emit_after_close_fails() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = SocketChannel {
            outgoing: tx,
            closed: false,
        };

        channel.emit(OutboundEvent::Ping).unwrap();
        channel.close();
        channel.close();

        assert!(matches!(channel.emit(OutboundEvent::Ping), Err(ChannelError::Closed)));
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Frame(ref f)) if f == r#"42["ping"]"#));
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Close)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_open_error() {
        let url = Url::parse("ws://127.0.0.1:9/socket.io/?EIO=4&transport=websocket").unwrap();
        let result = WebSocketConnector.open(&url).await;
        assert!(matches!(result, Err(ChannelError::Open { .. })));
    }

    #[tokio::test]
    async fn secure_url_attempts_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let url = Url::parse(&format!("wss://{addr}/socket.io/?EIO=4&transport=websocket")).unwrap();
        let Err(ChannelError::Open { reason, .. }) = WebSocketConnector.open(&url).await else {
            panic!("a plain tcp peer cannot complete a tls handshake");
        };

        assert!(!reason.contains("TLS support not compiled in"), "{reason}");
    }

    #[tokio::test]
    async fn silent_server_ends_in_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::text(
                r#"0{"sid":"s","upgrades":[],"pingInterval":100,"pingTimeout":100}"#,
            ))
            .await
            .unwrap();
            ws.send(Message::text(r#"40{"sid":"me"}"#)).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let url = Url::parse(&format!("ws://{addr}/socket.io/?EIO=4&transport=websocket")).unwrap();
        let mut handle = WebSocketConnector.open(&url).await.unwrap();

        let connect = timeout(Duration::from_secs(2), handle.events.recv()).await.unwrap();
        assert_eq!(connect, Some(InboundEvent::Connect { id: "me".into() }));

        let dropped = timeout(Duration::from_secs(2), handle.events.recv()).await.unwrap();
        assert_eq!(
            dropped,
            Some(InboundEvent::Disconnect {
                reason: Some(String::from("ping timeout"))
            })
        );
        server.abort();
    }
}
