//! The protocol engine.
//!
//! A [`Deck`] owns at most one session: a TCP connection plus the two
//! background tasks that keep it alive.
//!
//! ```text
//!             ┌──────────── Deck (cheap to clone) ────────────┐
//!  callers ──►│ send() ──► CommandGate ──► socket write half  │
//!             │                ▲                              │
//!             │   reader task ─┴─ route() ─► media changed ───┼─► clip refresh
//!             │   poller task ──► refresh_status()            │   (detached)
//!             │   StateCache (watch snapshots)   EventBus ────┼─► subscribers
//!             └───────────────────────────────────────────────┘
//! ```
//!
//! Background tasks hold only a `Weak` reference to the engine, so
//! dropping the last `Deck` handle tears the session down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::EngineConfig;
use crate::error::DeckError;
use crate::event::{DeckEvent, EventBus, Subscription};
use crate::flags::NotifyFlags;
use crate::network::{self, CommandWriter, ConnectionInfo, ResponseReader};
use crate::response::{Response, codes};
use crate::router::{Route, route};
use crate::state::cache::{self, Clip, StateCache, StatusMap};
use crate::state::{CommandGate, ConnectionPhase};
use crate::task::SessionTasks;

type Gate = CommandGate<CommandWriter>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Session ──────────────────────────────────────────────────────

/// One transport instance and everything running on it.
struct Session {
    id: u64,
    gate: Arc<Gate>,
    tasks: SessionTasks,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.tasks.is_cancelled()
    }
}

// ── DeckInner ────────────────────────────────────────────────────

struct DeckInner {
    config: EngineConfig,
    target: Mutex<ConnectionInfo>,
    phase: Mutex<ConnectionPhase>,
    session: Mutex<Option<Arc<Session>>>,
    next_session: AtomicU64,
    /// Serializes connect / reconfigure / close.
    lifecycle: tokio::sync::Mutex<()>,
    cache: StateCache,
    events: EventBus,
}

impl DeckInner {
    fn current_session(&self) -> Result<Arc<Session>, DeckError> {
        match lock(&self.session).as_ref() {
            Some(session) if session.is_live() => Ok(session.clone()),
            _ => Err(DeckError::NotConnected),
        }
    }

    /// Called by a reader that hit EOF or an error.
    fn session_lost(&self, session_id: u64, reason: String) {
        let lost = {
            let mut slot = lock(&self.session);
            match slot.as_ref() {
                Some(session) if session.id == session_id => slot.take(),
                _ => None,
            }
        };
        if lost.is_none() {
            return;
        }
        lock(&self.phase).close();
        self.events.publish(DeckEvent::ConnectionLost { reason });
    }

    /// Stop the current session's tasks and drop its transport.
    async fn teardown(&self) {
        let taken = lock(&self.session).take();
        let Some(session) = taken else {
            return;
        };
        info!(session = session.id, "closing connection");
        session.gate.shut();
        session.tasks.shutdown().await;
        lock(&self.phase).close();
    }

    fn schedule_clip_refresh(self: &Arc<Self>, session_id: u64) {
        let Ok(session) = self.current_session() else {
            return;
        };
        if session.id != session_id {
            return;
        }

        let deck = Arc::downgrade(self);
        let delay = self.config.slot_settle_delay;
        session.tasks.spawn("clip-refresh", async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = deck.upgrade() else {
                return;
            };
            if let Err(e) = (Deck { inner }).refresh_clips().await {
                warn!(error = %e, "clip refresh after media change failed");
            }
        });
    }
}

// ── Background loops ─────────────────────────────────────────────

/// Frame reader loop: routes every response until the stream ends.
async fn read_loop(
    mut reader: ResponseReader,
    gate: Arc<Gate>,
    deck: Weak<DeckInner>,
    session_id: u64,
    token: CancellationToken,
) {
    let reason = loop {
        match reader.next().await {
            Some(Ok(response)) => {
                debug!(lines = ?response.lines(), "received");
                dispatch(response, &gate, &deck, session_id);
            }
            Some(Err(e)) => {
                error!(error = %e, "connection failed");
                break e.to_string();
            }
            None => {
                warn!("deck closed the connection");
                break "connection closed by deck".to_string();
            }
        }
    };

    gate.shut();
    token.cancel();
    if let Some(inner) = deck.upgrade() {
        inner.session_lost(session_id, reason);
    }
}

fn dispatch(response: Response, gate: &Gate, deck: &Weak<DeckInner>, session_id: u64) {
    match route(&response) {
        Route::Reply => {
            if let Err(orphan) = gate.resolve(response) {
                warn!(code = orphan.code(), "discarding reply with no command waiting");
            }
        }
        Route::MediaChanged => {
            info!("media changed; clip list will be refreshed");
            if let Some(inner) = deck.upgrade() {
                inner.schedule_clip_refresh(session_id);
            }
        }
        Route::Notification(code) => debug!(code, "notification ignored"),
    }
}

/// Periodic status refresh for the lifetime of a session.
async fn poll_loop(deck: Weak<DeckInner>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(inner) = deck.upgrade() else {
            break;
        };
        match (Deck { inner }).refresh_status().await {
            Ok(_) => {}
            Err(e) if e.is_session_fatal() => {
                debug!(error = %e, "poller stopping");
                break;
            }
            Err(e) => warn!(error = %e, "status poll failed"),
        }
    }
}

// ── Deck ─────────────────────────────────────────────────────────

/// Handle to the protocol engine. Clones share one connection.
#[derive(Clone)]
pub struct Deck {
    inner: Arc<DeckInner>,
}

impl Deck {
    pub fn new(target: ConnectionInfo, config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            inner: Arc::new(DeckInner {
                config,
                target: Mutex::new(target),
                phase: Mutex::new(ConnectionPhase::default()),
                session: Mutex::new(None),
                next_session: AtomicU64::new(1),
                lifecycle: tokio::sync::Mutex::new(()),
                cache: StateCache::new(),
                events,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the transport, start the reader and poller, subscribe to
    /// notifications and load both caches.
    ///
    /// Fails with `InvalidTransition` if a session is already open.
    pub async fn connect(&self) -> Result<(), DeckError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.connect_locked().await
    }

    /// Point the engine at a new deck and reconnect.
    ///
    /// The current transport and all of its tasks are torn down first.
    pub async fn set_network(&self, host: impl Into<String>, port: u16) -> Result<(), DeckError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;
        *lock(&self.inner.target) = ConnectionInfo::new(host, port);
        self.connect_locked().await
    }

    /// Tear down the current session, if any.
    pub async fn close(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;
    }

    async fn connect_locked(&self) -> Result<(), DeckError> {
        let inner = &self.inner;
        lock(&inner.phase).begin_connect()?;

        let target = self.connection_info();
        let (reader, writer) = match network::open(&target, inner.config.connect_timeout).await {
            Ok(halves) => halves,
            Err(e) => {
                error!(error = %e, "failed to connect to {target}");
                let _ = lock(&inner.phase).fail_connect();
                return Err(e);
            }
        };

        let session = Arc::new(Session {
            id: inner.next_session.fetch_add(1, Ordering::Relaxed),
            gate: Arc::new(CommandGate::new(writer, inner.config.command_timeout)),
            tasks: SessionTasks::new(),
        });
        *lock(&inner.session) = Some(session.clone());
        lock(&inner.phase).complete_connect()?;

        session.tasks.spawn(
            "reader",
            read_loop(
                reader,
                session.gate.clone(),
                Arc::downgrade(inner),
                session.id,
                session.tasks.token(),
            ),
        );
        session.tasks.spawn(
            "poller",
            poll_loop(Arc::downgrade(inner), inner.config.poll_interval),
        );

        if let Err(e) = self.initialize().await {
            error!(error = %e, "deck initialization failed");
            inner.teardown().await;
            return Err(e);
        }
        info!(session = session.id, "connected to {target}");
        Ok(())
    }

    async fn initialize(&self) -> Result<(), DeckError> {
        if !self.enable_notifications(NotifyFlags::all()).await? {
            warn!("deck rejected the notification subscription");
        }
        self.refresh_clips().await?;
        self.refresh_status().await?;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn connection_info(&self) -> ConnectionInfo {
        lock(&self.inner.target).clone()
    }

    pub fn host(&self) -> String {
        lock(&self.inner.target).host().to_string()
    }

    pub fn port(&self) -> u16 {
        lock(&self.inner.target).port()
    }

    pub fn phase(&self) -> ConnectionPhase {
        lock(&self.inner.phase).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.current_session().is_ok()
    }

    /// Current clip snapshot; clip id is index + 1.
    pub fn clips(&self) -> Arc<Vec<Clip>> {
        self.inner.cache.clips()
    }

    pub fn status(&self) -> Arc<StatusMap> {
        self.inner.cache.status()
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    pub fn watch_clips(&self) -> watch::Receiver<Arc<Vec<Clip>>> {
        self.inner.cache.watch_clips()
    }

    pub fn watch_status(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.inner.cache.watch_status()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Issue one command through the gate and publish its transcript.
    ///
    /// Fails immediately with `NotConnected` when there is no session.
    pub async fn send(&self, command: Command) -> Result<Response, DeckError> {
        let session = self.inner.current_session()?;
        let sent = command.transcript_lines();
        let response = session.gate.send(command).await?;
        self.inner.events.publish(DeckEvent::Transcript {
            sent,
            received: response.lines().to_vec(),
        });
        Ok(response)
    }

    /// `Ok(true)` unless the deck answered with an error code.
    async fn succeeds(&self, command: Command) -> Result<bool, DeckError> {
        Ok(!self.send(command).await?.is_error())
    }

    /// Liveness probe.
    pub async fn connected(&self) -> Result<bool, DeckError> {
        self.succeeds(Command::Ping).await
    }

    pub async fn record(&self) -> Result<bool, DeckError> {
        self.succeeds(Command::Record).await
    }

    pub async fn record_named(&self, name: impl Into<String>) -> Result<bool, DeckError> {
        self.succeeds(Command::RecordNamed(name.into())).await
    }

    pub async fn stop(&self) -> Result<bool, DeckError> {
        self.succeeds(Command::Stop).await
    }

    /// Start playback at `speed` times normal, clamped to ±16.
    pub async fn play(&self, single: bool, looped: bool, speed: f64) -> Result<bool, DeckError> {
        self.succeeds(Command::play(single, looped, speed)).await
    }

    /// Select a clip by 0-based index.
    pub async fn select_clip_by_index(&self, index: i64) -> Result<bool, DeckError> {
        self.succeeds(Command::goto_index(index)).await
    }

    pub async fn select_clip_by_offset(&self, offset: i64) -> Result<bool, DeckError> {
        self.succeeds(Command::GotoClipOffset(offset)).await
    }

    pub async fn jog_to_timecode(&self, timecode: impl Into<String>) -> Result<bool, DeckError> {
        self.succeeds(Command::Jog(timecode.into())).await
    }

    pub async fn enable_notifications(&self, flags: NotifyFlags) -> Result<bool, DeckError> {
        self.succeeds(Command::Notify(flags)).await
    }

    pub async fn select_slot(&self, slot: u32) -> Result<bool, DeckError> {
        self.succeeds(Command::SlotSelect(slot)).await
    }

    /// Properties of `slot`, or of the active slot. Empty if the deck
    /// rejects the query.
    pub async fn slot_info(&self, slot: Option<u32>) -> Result<StatusMap, DeckError> {
        let response = self.send(Command::SlotInfo(slot)).await?;
        Ok(cache::parse_properties(&response, codes::SLOT_INFO))
    }

    // ── Cache refresh ────────────────────────────────────────────

    /// Re-read the clip list.
    ///
    /// The cache is replaced whatever the outcome (empty on failure) and
    /// `ClipsChanged` is always published.
    pub async fn refresh_clips(&self) -> Result<Arc<Vec<Clip>>, DeckError> {
        let outcome = self.send(Command::ClipsGet).await;
        let clips = match &outcome {
            Ok(response) if response.is_error() => {
                warn!(code = response.code(), "clip listing rejected");
                Vec::new()
            }
            Ok(response) => cache::parse_clip_list(response),
            Err(_) => Vec::new(),
        };
        let snapshot = self.inner.cache.replace_clips(clips);
        self.inner.events.publish(DeckEvent::ClipsChanged);
        outcome.map(|_| snapshot)
    }

    /// Re-read transport status.
    ///
    /// The map is replaced whatever the outcome and `StatusChanged` is
    /// always published.
    pub async fn refresh_status(&self) -> Result<Arc<StatusMap>, DeckError> {
        let outcome = self.send(Command::TransportInfo).await;
        let status = match &outcome {
            Ok(response) => cache::parse_properties(response, codes::TRANSPORT_INFO),
            Err(_) => StatusMap::new(),
        };
        let snapshot = self.inner.cache.replace_status(status);
        self.inner.events.publish(DeckEvent::StatusChanged);
        outcome.map(|_| snapshot)
    }
}

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("target", &self.connection_info())
            .field("phase", &self.phase())
            .finish()
    }
}
