use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::{PlayerProfile, SessionConfig};
use crate::event::{ExpiryQueue, KillLogEntry, append_entry, remove_entries};
use crate::net::{
    Channel, ChannelError, Connector, DeathEvent, InboundEvent, LatencyProbe, OutboundEvent,
    ProvisionError, Provisioner, channel_url,
};
use crate::state::{ConnectionStatus, GameMap, GameState, MapError, merge_players, scores_from};

type Listener = Rc<RefCell<dyn FnMut(&GameState)>>;
type Registry = RefCell<Vec<(u64, Listener)>>;

/// Handle returned by [`GameStore::subscribe`].
#[must_use = "dropping a subscription keeps the listener registered"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Callbacks into the UI layer when a session ends.
#[derive(Default)]
pub struct SessionHooks {
    on_disconnect: Option<Box<dyn FnMut()>>,
    on_game_over: Option<Box<dyn FnMut(&str)>>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_disconnect(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_disconnect = Some(Box::new(callback));
        self
    }

    pub fn on_game_over(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.on_game_over = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Disconnected { reason: Option<String> },
    GameOver { winner: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("map rejected: {0}")]
    Map(#[from] MapError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already initialized")]
    AlreadyInitialized,
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("invalid channel url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },
}

impl SessionError {
    fn timeout(stage: &'static str, after: Duration) -> Self {
        Self::Timeout { stage, after }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Fresh,
    Live,
    TornDown,
}

/// Owner of the canonical client-side [`GameState`].
///
/// Every inbound event is one transition: clone the current snapshot, apply a
/// pure change to the copy, publish it, then notify listeners. Listeners only
/// ever see complete snapshots. A rejected transition publishes nothing.
///
/// Single-threaded: events, timers and frames are all fed in by one driver.
pub struct GameStore {
    config: SessionConfig,
    profile: PlayerProfile,
    snapshot: Arc<GameState>,
    listeners: Rc<Registry>,
    next_listener_id: u64,
    hooks: SessionHooks,
    channel: Option<Box<dyn Channel>>,
    probe: LatencyProbe,
    expiries: ExpiryQueue,
    lifecycle: Lifecycle,
    outcome: Option<SessionEnd>,
}

impl GameStore {
    pub fn new(config: SessionConfig, profile: PlayerProfile, hooks: SessionHooks) -> Self {
        Self {
            probe: LatencyProbe::new(config.ping_interval),
            expiries: ExpiryQueue::new(config.kill_log_ttl),
            config,
            profile,
            snapshot: Arc::new(GameState::default()),
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener_id: 0,
            hooks,
            channel: None,
            lifecycle: Lifecycle::Fresh,
            outcome: None,
        }
    }

    pub fn snapshot(&self) -> Arc<GameState> {
        Arc::clone(&self.snapshot)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GameState) + 'static) -> Subscription {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        let listener: Listener = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().push((id, listener));
        Subscription {
            id,
            registry: Rc::downgrade(&self.listeners),
        }
    }

    /// Resolves the room, opens the channel and starts the latency probe.
    /// Returns the channel's event stream, which the driver feeds back
    /// through [`GameStore::handle`]. Only the first call does anything.
    pub async fn init<P, C>(
        &mut self,
        provisioner: &P,
        connector: &C,
        room_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<InboundEvent>, SessionError>
    where
        P: Provisioner + ?Sized,
        C: Connector + ?Sized,
    {
        if self.lifecycle != Lifecycle::Fresh {
            return Err(SessionError::AlreadyInitialized);
        }
        self.lifecycle = Lifecycle::Live;
        self.set_status(ConnectionStatus::Resolving);

        let limit = self.config.connect_timeout;
        let info = match timeout(limit, provisioner.resolve(room_id)).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => return Err(self.fail(e.into())),
            Err(_) => return Err(self.fail(SessionError::timeout("room lookup", limit))),
        };
        log::info!("Room {} is hosted at {}:{}", room_id, info.host, info.port);

        let url = match channel_url(&info, room_id, &self.profile, self.config.secure) {
            Ok(url) => url,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.set_status(ConnectionStatus::Connecting);
        let handle = match timeout(limit, connector.open(&url)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(self.fail(e.into())),
            Err(_) => return Err(self.fail(SessionError::timeout("channel open", limit))),
        };

        self.attach(handle.channel, Instant::now());
        Ok(handle.events)
    }

    /// Takes ownership of an already open channel and starts the probe.
    pub fn attach(&mut self, channel: Box<dyn Channel>, now: Instant) {
        self.channel = Some(channel);
        self.lifecycle = Lifecycle::Live;
        self.probe.start(now);
    }

    fn fail(&mut self, error: SessionError) -> SessionError {
        log::error!("Session setup failed: {}", error);
        self.lifecycle = Lifecycle::TornDown;
        self.set_status(ConnectionStatus::Failed(error.to_string()));
        error
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.transition("status", |state| {
            state.status = status;
            Ok(())
        });
    }

    pub fn handle(&mut self, event: InboundEvent, now: Instant) {
        if self.lifecycle != Lifecycle::Live {
            log::debug!("Ignoring `{}` outside a live session", event.name());
            return;
        }

        match event {
            InboundEvent::Connect { id } => {
                log::info!("Connected as {}", id);
                self.transition("connect", |state| {
                    state.player_id = id;
                    state.is_ready = true;
                    state.status = ConnectionStatus::Ready;
                    Ok(())
                });
            }
            InboundEvent::Disconnect { reason } => {
                self.teardown(SessionEnd::Disconnected { reason });
            }
            InboundEvent::Map(map) => self.on_map(map),
            InboundEvent::End { winner } => {
                self.teardown(SessionEnd::GameOver { winner });
            }
            InboundEvent::Players(players) => {
                let policy = self.config.absent_players;
                self.transition("players", |state| {
                    state.players = merge_players(&state.players, &players, policy);
                    state.scores = scores_from(&state.players);
                    Ok(())
                });
            }
            InboundEvent::Snowballs(snowballs) => {
                self.transition("snowballs", |state| {
                    state.snowballs = snowballs;
                    Ok(())
                });
            }
            InboundEvent::Death(death) => self.on_death(death, now),
            InboundEvent::Remaining(ms) => {
                self.transition("remaining", |state| {
                    state.remaining_time = ms;
                    Ok(())
                });
            }
            InboundEvent::Pong => {
                if let Some(rtt) = self.probe.on_pong(now) {
                    log::debug!("Ping RTT: {} ms", rtt);
                    self.transition("pong", |state| {
                        state.latency = rtt;
                        Ok(())
                    });
                }
            }
            InboundEvent::Refresh => {
                self.transition("refresh", |state| {
                    state.scores = scores_from(&state.players);
                    Ok(())
                });
            }
        }
    }

    fn on_map(&mut self, map: GameMap) {
        self.transition("map", |state| {
            let map = map.validated()?;
            log::info!("Map received: {}x{}", map.width, map.height);
            state.map = Arc::new(map);
            Ok(())
        });
    }

    fn on_death(&mut self, death: DeathEvent, now: Instant) {
        let entry = KillLogEntry::new(death.victim.nickname, death.killer.nickname);
        let id = entry.id;
        if self.transition("death", |state| {
            state.kill_log = append_entry(&state.kill_log, entry);
            Ok(())
        }) {
            self.expiries.schedule(id, now);
        }
    }

    /// Timer driver: sends due pings and expires kill log entries.
    pub fn poll(&mut self, now: Instant) {
        if self.lifecycle != Lifecycle::Live {
            return;
        }

        if self.probe.poll_ping(now) {
            let _ = self.emit(OutboundEvent::Ping);
        }

        let expired = self.expiries.take_expired(now);
        if !expired.is_empty() {
            self.transition("kill log expiry", |state| {
                state.kill_log = remove_entries(&state.kill_log, &expired);
                Ok(())
            });
        }
    }

    /// Sends an event to the server. A failing channel ends the session as
    /// a disconnect.
    pub fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
        if self.lifecycle != Lifecycle::Live {
            return Err(ChannelError::Closed);
        }
        let Some(channel) = self.channel.as_mut() else {
            return Err(ChannelError::Closed);
        };

        if let Err(e) = channel.emit(event) {
            log::warn!("Failed to emit `{}`: {}", event.name(), e);
            self.teardown(SessionEnd::Disconnected {
                reason: Some(e.to_string()),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Ends the session from the client side, e.g. when the user quits.
    pub fn disconnect(&mut self) {
        self.teardown(SessionEnd::Disconnected {
            reason: Some(String::from("client disconnected")),
        });
    }

    fn teardown(&mut self, end: SessionEnd) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        self.lifecycle = Lifecycle::TornDown;

        if self.probe.stop() {
            log::debug!("Ping interval cleared");
        }
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.expiries.cancel_all();

        self.transition("teardown", |state| {
            state.is_ready = false;
            state.status = ConnectionStatus::Closed;
            Ok(())
        });

        match &end {
            SessionEnd::Disconnected { reason } => {
                log::info!("Disconnected: {}", reason.as_deref().unwrap_or("no reason given"));
                if let Some(callback) = self.hooks.on_disconnect.as_mut() {
                    callback();
                }
            }
            SessionEnd::GameOver { winner } => {
                log::info!("Game over, winner: {}", winner);
                if let Some(callback) = self.hooks.on_game_over.as_mut() {
                    callback(winner);
                }
            }
        }
        self.outcome = Some(end);
    }

    /// Applies `change` to a copy of the current snapshot and publishes it.
    /// Returns whether the transition was published.
    fn transition(
        &mut self,
        name: &str,
        change: impl FnOnce(&mut GameState) -> Result<(), TransitionError>,
    ) -> bool {
        let mut next = GameState::clone(&self.snapshot);
        if let Err(e) = change(&mut next) {
            log::warn!("Rejected `{}` update: {}", name, e);
            return false;
        }
        next.version = self.snapshot.version + 1;
        self.snapshot = Arc::new(next);
        self.notify();
        true
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            (listener.borrow_mut())(&self.snapshot);
        }
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Live
    }

    pub fn outcome(&self) -> Option<&SessionEnd> {
        self.outcome.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pending_expiries(&self) -> usize {
        self.expiries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::net::Participant;
    use crate::state::{PlayerUpdate, TileRef};

    #[derive(Default)]
    struct Recorded {
        sent: Vec<OutboundEvent>,
        closes: usize,
        fail_next: bool,
    }

    struct RecordingChannel(Arc<Mutex<Recorded>>);

    impl Channel for RecordingChannel {
        fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
            let mut recorded = self.0.lock().unwrap();
            if recorded.fail_next {
                return Err(ChannelError::Closed);
            }
            recorded.sent.push(event);
            Ok(())
        }

        fn close(&mut self) {
            self.0.lock().unwrap().closes += 1;
        }
    }

    fn live_store(now: Instant) -> (GameStore, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut store = GameStore::new(
            SessionConfig::default(),
            PlayerProfile::default(),
            SessionHooks::new(),
        );
        store.attach(Box::new(RecordingChannel(Arc::clone(&recorded))), now);
        (store, recorded)
    }

    fn player(id: &str, x: f32) -> PlayerUpdate {
        PlayerUpdate {
            id: id.to_string(),
            x: Some(x),
            ..Default::default()
        }
    }

    fn death(victim: &str, killer: &str) -> InboundEvent {
        InboundEvent::Death(DeathEvent {
            victim: Participant {
                id: None,
                nickname: victim.to_string(),
            },
            killer: Participant {
                id: None,
                nickname: killer.to_string(),
            },
        })
    }

    #[test]
    fn snapshot_before_init_is_empty() {
        let store = GameStore::new(
            SessionConfig::default(),
            PlayerProfile::default(),
            SessionHooks::new(),
        );
        let snapshot = store.snapshot();
        assert_eq!(*snapshot, GameState::default());
        assert!(!snapshot.is_ready);
    }

    #[test]
    fn connect_assigns_identity() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        store.handle(InboundEvent::Connect { id: "sid-1".into() }, now);

        let snapshot = store.snapshot();
        assert!(snapshot.is_ready);
        assert_eq!(snapshot.player_id, "sid-1");
        assert_eq!(snapshot.status, ConnectionStatus::Ready);
    }

    #[test]
    fn every_transition_notifies_with_a_new_version() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let subscription = store.subscribe(move |state| sink.borrow_mut().push(state.version));

        store.handle(InboundEvent::Remaining(5000), now);
        store.handle(InboundEvent::Players(vec![player("a", 1.0)]), now);
        assert_eq!(*seen.borrow(), [1, 2]);

        subscription.unsubscribe();
        store.handle(InboundEvent::Remaining(4000), now);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(store.snapshot().version, 3);
    }

    #[test]
    fn old_snapshots_are_unchanged() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        store.handle(InboundEvent::Players(vec![player("a", 1.0)]), now);
        let before = store.snapshot();

        store.handle(InboundEvent::Players(vec![player("a", 9.0)]), now);

        assert_eq!(before.players[0].x, 1.0);
        assert_eq!(store.snapshot().players[0].x, 9.0);
    }

    #[test]
    fn players_update_is_idempotent_and_rescored() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        let update = vec![PlayerUpdate {
            kills: Some(2),
            nickname: Some("al".into()),
            ..player("a", 1.0)
        }];

        store.handle(InboundEvent::Players(update.clone()), now);
        let first = store.snapshot();
        store.handle(InboundEvent::Players(update), now);
        let second = store.snapshot();

        assert_eq!(first.players, second.players);
        assert_eq!(second.scores.len(), 1);
        assert_eq!(second.scores[0].kills, 2);
        assert_eq!(second.scores[0].nickname, "al");
    }

    #[test]
    fn snowballs_are_replaced_wholesale() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        let ball = |id| crate::state::Snowball { id, x: 0.0, y: 0.0 };

        store.handle(InboundEvent::Snowballs(vec![ball(1), ball(2)]), now);
        store.handle(InboundEvent::Snowballs(vec![ball(3)]), now);

        let ids: Vec<u64> = store.snapshot().snowballs.iter().map(|s| s.id).collect();
        assert_eq!(ids, [3]);
    }

    #[test]
    fn malformed_map_is_rejected_atomically() {
        let now = Instant::now();
        let (mut store, _) = live_store(now);
        let good = GameMap {
            width: 10,
            height: 10,
            ground: vec![vec![Some(TileRef { id: 0 }); 10]; 10],
            decal: Vec::new(),
        };
        store.handle(InboundEvent::Map(good), now);
        let version = store.snapshot().version;

        let bad = GameMap {
            width: 10,
            height: 10,
            ground: vec![vec![None; 3]; 10],
            decal: Vec::new(),
        };
        store.handle(InboundEvent::Map(bad), now);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, version);
        assert_eq!((snapshot.map.width, snapshot.map.height), (10, 10));
        assert_eq!(snapshot.map.ground[0].len(), 10);
    }

    #[test]
    fn ping_then_pong_sets_latency() {
        let t0 = Instant::now();
        let (mut store, recorded) = live_store(t0);
        let sent_at = t0 + Duration::from_millis(1000);

        store.poll(sent_at);
        assert_eq!(recorded.lock().unwrap().sent, [OutboundEvent::Ping]);

        store.handle(InboundEvent::Pong, sent_at + Duration::from_millis(37));
        assert_eq!(store.snapshot().latency, 37);
    }

    #[test]
    fn kill_log_entries_expire_by_id() {
        let t0 = Instant::now();
        let (mut store, _) = live_store(t0);

        store.handle(death("a", "x"), t0);
        store.handle(death("b", "y"), t0 + Duration::from_millis(300));
        store.handle(death("c", "z"), t0 + Duration::from_millis(600));

        store.poll(t0 + Duration::from_millis(999));
        assert_eq!(store.snapshot().kill_log.len(), 3);

        store.poll(t0 + Duration::from_millis(1000));
        let victims: Vec<String> = store
            .snapshot()
            .kill_log
            .iter()
            .map(|e| e.victim.clone())
            .collect();
        assert_eq!(victims, ["b", "c"]);

        store.poll(t0 + Duration::from_millis(1600));
        assert!(store.snapshot().kill_log.is_empty());
    }

    #[test]
    fn disconnect_tears_down_once() {
        let now = Instant::now();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (on_disconnect, on_game_over) = (Rc::clone(&calls), Rc::clone(&calls));
        let hooks = SessionHooks::new()
            .on_disconnect(move || on_disconnect.borrow_mut().push(String::from("disconnect")))
            .on_game_over(move |winner| on_game_over.borrow_mut().push(winner.to_string()));
        let mut store = GameStore::new(SessionConfig::default(), PlayerProfile::default(), hooks);
        store.attach(Box::new(RecordingChannel(Arc::clone(&recorded))), now);
        store.handle(death("a", "b"), now);

        store.handle(InboundEvent::Disconnect { reason: None }, now);
        store.handle(InboundEvent::End { winner: "b".into() }, now);
        let version = store.snapshot().version;
        store.poll(now + Duration::from_secs(5));

        assert_eq!(*calls.borrow(), ["disconnect"]);
        assert_eq!(recorded.lock().unwrap().closes, 1);
        assert!(recorded.lock().unwrap().sent.is_empty());
        assert_eq!(store.snapshot().version, version);
        assert_eq!(store.snapshot().kill_log.len(), 1);
        assert_eq!(store.pending_expiries(), 0);
        assert_eq!(store.snapshot().status, ConnectionStatus::Closed);
    }

    #[test]
    fn end_reports_winner() {
        let now = Instant::now();
        let (mut store, recorded) = live_store(now);

        store.handle(InboundEvent::End { winner: "rudolph".into() }, now);

        assert_eq!(
            store.outcome(),
            Some(&SessionEnd::GameOver {
                winner: "rudolph".into()
            })
        );
        assert_eq!(recorded.lock().unwrap().closes, 1);
        assert!(matches!(store.emit(OutboundEvent::Ping), Err(ChannelError::Closed)));
    }

    #[test]
    fn failing_channel_is_treated_as_disconnect() {
        let now = Instant::now();
        let (mut store, recorded) = live_store(now);
        recorded.lock().unwrap().fail_next = true;

        assert!(store.emit(OutboundEvent::Snowball(1.0)).is_err());

        assert!(!store.is_live());
        assert!(matches!(store.outcome(), Some(SessionEnd::Disconnected { .. })));
    }
}
