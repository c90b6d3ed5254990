use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    Event, EventStream, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers, MouseButton,
    MouseEventKind,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use snowfight::{
    ConnectionStatus, GameState, GameStore, InboundEvent, InputEncoder, InterpolationConfig,
    InterpolationEngine, KeyCode, OutboundEvent, PlayerProfile, Provisioner, SessionConfig,
    SessionHooks, Subscription, WebSocketConnector,
};

use crate::tui::{self, Tui, View};

pub struct App {
    store: GameStore,
    interpolation: InterpolationEngine,
    encoder: InputEncoder,
    banner: Rc<RefCell<Option<String>>>,
    should_quit: bool,
}

impl App {
    pub fn new(config: SessionConfig, profile: PlayerProfile) -> Self {
        let banner = Rc::new(RefCell::new(None));
        let (on_disconnect, on_game_over) = (Rc::clone(&banner), Rc::clone(&banner));
        let hooks = SessionHooks::new()
            .on_disconnect(move || {
                *on_disconnect.borrow_mut() =
                    Some(String::from("Disconnected from the server. Press Q to quit."));
            })
            .on_game_over(move |winner| {
                *on_game_over.borrow_mut() =
                    Some(format!("Game over! {} wins. Press Q to quit.", winner));
            });

        Self {
            interpolation: InterpolationEngine::new(InterpolationConfig::from(&config)),
            store: GameStore::new(config, profile, hooks),
            encoder: InputEncoder::new(),
            banner,
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        provisioner: &dyn Provisioner,
        room: &str,
        frame_interval: Duration,
    ) -> Result<()> {
        let mut tui = Tui::new()?;
        let mut terminal_events = EventStream::new();
        let status_log = self.log_status_changes();

        self.draw(&mut tui, room, &self.store.snapshot())?;

        let mut inbound = self.join(provisioner, room, &mut terminal_events).await?;

        let mut frames = tokio::time::interval(frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.should_quit {
            tokio::select! {
                event = next_inbound(&mut inbound) => match event {
                    Some(event) => self.on_inbound(event, Instant::now()),
                    None => inbound = None,
                },
                _ = frames.tick() => {
                    let now = Instant::now();
                    self.store.poll(now);
                    let state = self.store.snapshot();
                    if self.store.is_live() {
                        self.interpolation.frame(&state, now);
                    } else {
                        self.interpolation.reset();
                    }
                    self.draw(&mut tui, room, &state)?;
                }
                input = terminal_events.next() => match input {
                    Some(Ok(event)) => self.on_terminal_event(event, &tui),
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }

        self.store.disconnect();
        status_log.unsubscribe();
        log::info!("Exiting");
        Ok(())
    }

    /// Runs session setup while still honouring quit keys.
    async fn join(
        &mut self,
        provisioner: &dyn Provisioner,
        room: &str,
        terminal_events: &mut EventStream,
    ) -> Result<Option<mpsc::UnboundedReceiver<InboundEvent>>> {
        let init = self.store.init(provisioner, &WebSocketConnector, room);
        tokio::pin!(init);

        loop {
            tokio::select! {
                result = &mut init => {
                    return Ok(match result {
                        Ok(events) => Some(events),
                        Err(e) => {
                            *self.banner.borrow_mut() = Some(format!("Could not join room: {}", e));
                            None
                        }
                    });
                }
                input = terminal_events.next() => match input {
                    Some(Ok(Event::Key(key))) if is_quit(&key) => {
                        log::info!("Quit while joining room {}", room);
                        self.should_quit = true;
                        return Ok(None);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        self.should_quit = true;
                        return Ok(None);
                    }
                },
            }
        }
    }

    fn on_inbound(&mut self, event: InboundEvent, now: Instant) {
        let was_ready = self.store.snapshot().is_ready;
        self.store.handle(event, now);

        // Keys pressed before the connection was ready were never sent.
        if !was_ready && self.store.snapshot().is_ready {
            let held = self.encoder.current();
            if !held.is_empty() {
                self.send(OutboundEvent::Inputs(held));
            }
        }
        if !self.store.is_live() {
            self.interpolation.reset();
        }
    }

    fn log_status_changes(&mut self) -> Subscription {
        let mut last = ConnectionStatus::Idle;
        self.store.subscribe(move |state| {
            if state.status != last {
                log::info!("Connection status: {:?}", state.status);
                last = state.status.clone();
            }
        })
    }

    fn draw(&self, tui: &mut Tui, room: &str, state: &GameState) -> Result<()> {
        let banner = self.banner.borrow();
        let view = View {
            room,
            state,
            interpolation: &self.interpolation,
            kill_feed_max: self.store.config().kill_log_display_max,
            banner: banner.as_deref(),
        };
        tui.draw(&view)?;
        Ok(())
    }

    fn on_terminal_event(&mut self, event: Event, tui: &Tui) {
        match event {
            Event::Key(key) => self.on_key(key),
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                if let Some((pointer, canvas)) =
                    tui::pointer_in_arena(tui.arena(), mouse.column, mouse.row)
                {
                    let event = self.encoder.click(pointer, canvas);
                    self.send(event);
                }
            }
            _ => {}
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if is_quit(&key) {
            self.should_quit = true;
            return;
        }

        let event = match (key.code, key.kind) {
            (TermKey::Char(' '), KeyEventKind::Press) => self.encoder.release_all(),
            (code, KeyEventKind::Press | KeyEventKind::Repeat) => {
                self.encoder.key_down(game_key(code))
            }
            (code, KeyEventKind::Release) => self.encoder.key_up(game_key(code)),
        };
        self.send(event);
    }

    fn send(&mut self, event: OutboundEvent) {
        if !self.store.snapshot().is_ready {
            return;
        }
        // A failed emit ends the session inside the store.
        let _ = self.store.emit(event);
    }
}

async fn next_inbound(
    inbound: &mut Option<mpsc::UnboundedReceiver<InboundEvent>>,
) -> Option<InboundEvent> {
    match inbound {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    let quit = match key.code {
        TermKey::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        TermKey::Char('q') | TermKey::Esc => true,
        _ => false,
    };
    quit && key.kind == KeyEventKind::Press
}

fn game_key(code: TermKey) -> KeyCode {
    match code {
        TermKey::Char(c) => match c.to_ascii_lowercase() {
            'w' => KeyCode::KeyW,
            'a' => KeyCode::KeyA,
            's' => KeyCode::KeyS,
            'd' => KeyCode::KeyD,
            _ => KeyCode::Other,
        },
        _ => KeyCode::Other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crossterm::event::KeyEventState;
    use snowfight::{Channel, ChannelError, Direction};

    use super::*;

    struct Recorder(Arc<Mutex<Vec<OutboundEvent>>>);

    impl Channel for Recorder {
        fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn key(code: TermKey, modifiers: KeyModifiers, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind,
            state: KeyEventState::NONE,
        }
    }

    fn attached_app(now: Instant) -> (App, Arc<Mutex<Vec<OutboundEvent>>>) {
        let mut app = App::new(SessionConfig::default(), PlayerProfile::default());
        let sent = Arc::new(Mutex::new(Vec::new()));
        app.store.attach(Box::new(Recorder(Arc::clone(&sent))), now);
        (app, sent)
    }

    #[test]
    fn wasd_maps_case_insensitively() {
        assert_eq!(game_key(TermKey::Char('W')), KeyCode::KeyW);
        assert_eq!(game_key(TermKey::Char('d')), KeyCode::KeyD);
        assert_eq!(game_key(TermKey::Char('x')), KeyCode::Other);
        assert_eq!(game_key(TermKey::Up), KeyCode::Other);
    }

    #[test]
    fn held_keys_combine() {
        let mut encoder = InputEncoder::new();
        encoder.key_down(game_key(TermKey::Char('w')));
        let event = encoder.key_down(game_key(TermKey::Char('d')));
        assert_eq!(event, OutboundEvent::Inputs(Direction::UP | Direction::RIGHT));
    }

    #[test]
    fn quit_keys_need_a_press() {
        let none = KeyModifiers::NONE;
        assert!(is_quit(&key(TermKey::Char('q'), none, KeyEventKind::Press)));
        assert!(is_quit(&key(TermKey::Esc, none, KeyEventKind::Press)));
        assert!(is_quit(&key(
            TermKey::Char('c'),
            KeyModifiers::CONTROL,
            KeyEventKind::Press
        )));
        assert!(!is_quit(&key(TermKey::Char('c'), none, KeyEventKind::Press)));
        assert!(!is_quit(&key(TermKey::Char('q'), none, KeyEventKind::Release)));
    }

    #[test]
    fn keys_held_while_connecting_are_sent_on_connect() {
        let now = Instant::now();
        let (mut app, sent) = attached_app(now);

        app.on_key(key(TermKey::Char('w'), KeyModifiers::NONE, KeyEventKind::Press));
        assert!(sent.lock().unwrap().is_empty());

        app.on_inbound(InboundEvent::Connect { id: "me".into() }, now);
        assert_eq!(*sent.lock().unwrap(), vec![OutboundEvent::Inputs(Direction::UP)]);

        app.on_inbound(InboundEvent::Connect { id: "me".into() }, now);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn idle_connect_sends_nothing() {
        let now = Instant::now();
        let (mut app, sent) = attached_app(now);

        app.on_inbound(InboundEvent::Connect { id: "me".into() }, now);

        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn disconnect_clears_interpolated_positions() {
        let now = Instant::now();
        let (mut app, _sent) = attached_app(now);
        app.on_inbound(InboundEvent::Connect { id: "me".into() }, now);
        let state = GameState {
            players: vec![snowfight::Player {
                id: "me".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        app.interpolation.frame(&state, now);
        assert_eq!(app.interpolation.debug_stats().player_count, 1);

        app.on_inbound(InboundEvent::Disconnect { reason: None }, now);

        assert!(!app.store.is_live());
        assert_eq!(app.interpolation.debug_stats().player_count, 0);
    }
}
