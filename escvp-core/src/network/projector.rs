//! The persistent projector client.
//!
//! One TCP session at a time. Commands are written strictly one after
//! another; each waits for its predecessor's answer before going out, so
//! the read loop can match every non-event frame to the head of the
//! queue. A connection drop rejects whatever is queued and schedules a
//! single reconnect attempt.

use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::codec::{EscvpCodec, Frame};
use crate::config::ClientConfig;
use crate::error::{EscvpError, Result};
use crate::handshake::{self, HANDSHAKE_LEN};
use crate::listener::{Dispatcher, FnListener, PropertyListener, PropertyUpdate};
use crate::property::{self, PowerState, PropertyCodec, PropertyValue, RemoteKey};
use crate::state::power::{is_power_command, power_off_command, power_on_command};
use crate::state::{Completion, Enqueued, Session};
use crate::task::TaskPool;

type CommandWriter = FramedWrite<OwnedWriteHalf, EscvpCodec>;
type FrameReader = FramedRead<OwnedReadHalf, EscvpCodec>;

/// Handle to a projector. Cheap to clone; all clones share one session.
#[derive(Debug, Clone)]
pub struct Projector {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ClientConfig,
    codec: PropertyCodec,
    session: Mutex<Session>,
    /// Write half, tagged with the generation of the session that owns it.
    writer: Mutex<Option<(u64, CommandWriter)>>,
    /// Serializes connect and close. Holds `true` once the user has
    /// closed the client, which cancels a scheduled reconnect.
    connect_lock: Mutex<bool>,
    dispatcher: StdMutex<Option<Dispatcher>>,
    tasks: TaskPool,
}

impl Projector {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                codec: PropertyCodec::new(),
                session: Mutex::new(Session::new()),
                writer: Mutex::new(None),
                connect_lock: Mutex::new(false),
                dispatcher: StdMutex::new(None),
                tasks: TaskPool::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Listener ─────────────────────────────────────────────────

    /// Install the property listener, replacing any previous one.
    /// Must be called from within a Tokio runtime.
    pub fn register_listener<L: PropertyListener>(&self, listener: L) {
        let dispatcher = Dispatcher::spawn(Arc::new(listener), &self.inner.tasks);
        *self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(dispatcher);
    }

    /// Shorthand for [`register_listener`](Self::register_listener) with a closure.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&str, &PropertyValue) + Send + Sync + 'static,
    {
        self.register_listener(FnListener(callback));
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the session if it is not open yet. Concurrent callers share
    /// one attempt.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Close the session. Queued requests fail with
    /// [`EscvpError::ConnectionClosed`]. A reconnect scheduled by an
    /// earlier drop is cancelled; the next request connects again.
    pub async fn close(&self) {
        let inner = &self.inner;
        let mut closed = inner.connect_lock.lock().await;
        *closed = true;
        let generation = {
            let mut session = inner.session.lock().await;
            if !session.phase.is_open() {
                return;
            }
            let generation = session.generation;
            // Flag first so the read loop's exit does not reconnect.
            session.close();
            if let Some(task) = session.read_task.take() {
                task.abort();
            }
            generation
        };
        inner.shutdown_writer(generation).await;
        info!(host = %inner.config.host, "connection closed");
    }

    pub async fn is_open(&self) -> bool {
        self.inner.session.lock().await.phase.is_open()
    }

    /// Last observed power state; `None` until one has been seen.
    pub async fn power_state(&self) -> Option<PowerState> {
        self.inner.session.lock().await.power.state()
    }

    /// `true` while an alarm reported by a status event is latched.
    pub async fn has_error(&self) -> bool {
        self.inner.session.lock().await.power.has_error()
    }

    pub async fn pending_requests(&self) -> usize {
        self.inner.session.lock().await.queue.len()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Query a property (`NAME?`).
    pub async fn get(&self, property: &str) -> Result<PropertyValue> {
        ensure_name(property)?;
        self.request(format!("{property}?"), None).await
    }

    /// Set a property (`NAME VALUE`). Resolves with `value` on ack.
    pub async fn set(
        &self,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<PropertyValue> {
        ensure_name(property)?;
        let value = value.into();
        let encoded = self.inner.codec.encode(property, &value)?;
        ensure_clean("value", &encoded)?;
        self.request(format!("{property} {encoded}"), Some(value))
            .await
    }

    /// Send a raw command with an optional argument.
    pub async fn send(&self, command: &str, argument: Option<&str>) -> Result<PropertyValue> {
        ensure_name(command)?;
        let command = match argument {
            Some(argument) => {
                ensure_clean("argument", argument)?;
                format!("{command} {argument}")
            }
            None => command.to_string(),
        };
        self.request(command, None).await
    }

    pub async fn power_on(&self) -> Result<PropertyValue> {
        self.request(power_on_command(), Some(PowerState::On.into()))
            .await
    }

    pub async fn power_off(&self) -> Result<PropertyValue> {
        self.request(power_off_command(), Some(PowerState::Off.into()))
            .await
    }

    pub async fn press_key(&self, key: RemoteKey) -> Result<PropertyValue> {
        self.send(property::COMMAND_KEY, Some(key.code())).await
    }

    pub async fn load_lens_memory(&self, id: u8) -> Result<PropertyValue> {
        let argument = property::to_hex(id);
        self.send(property::COMMAND_LOAD_LENS_MEMORY, Some(&argument))
            .await
    }

    pub async fn load_picture_memory(&self, id: u8) -> Result<PropertyValue> {
        let argument = format!("{} {}", property::PICTURE_MEMORY_TYPE, property::to_hex(id));
        self.send(property::COMMAND_LOAD_PICTURE_MEMORY, Some(&argument))
            .await
    }

    /// Send `command` and wait for the frame that answers it.
    ///
    /// Identical commands already in flight share one outcome instead of
    /// being written twice. `new_value` is what a bare ack resolves to.
    pub async fn request(
        &self,
        command: String,
        new_value: Option<PropertyValue>,
    ) -> Result<PropertyValue> {
        let inner = &self.inner;
        debug!(%command, "queueing request");

        let mut reconnected = false;
        let (completion, previous) = loop {
            let enqueued = {
                let mut session = inner.session.lock().await;
                session
                    .phase
                    .is_open()
                    .then(|| session.queue.enqueue(&command, new_value.clone()))
            };
            match enqueued {
                Some(Enqueued::New {
                    completion,
                    previous,
                }) => break (completion, previous),
                Some(Enqueued::Duplicate(shared)) => {
                    debug!(%command, "identical request in flight, sharing its result");
                    match shared.wait().await {
                        // Its owner gave up before writing; queue our own.
                        Err(EscvpError::Cancelled) => continue,
                        outcome => return outcome,
                    }
                }
                None if reconnected => return Err(EscvpError::ConnectionClosed),
                None => {
                    inner.connect().await?;
                    reconnected = true;
                }
            }
        };

        let mut flight = InFlight {
            inner,
            command: &command,
            completion,
            limit: inner.round_trip_limit(&command),
            deadline: None,
            written: false,
            finished: false,
        };
        let result = inner.exchange(&command, &mut flight, previous).await;
        flight.finished = true;
        if let Err(e) = &result {
            flight.completion.reject(e.clone());
            warn!(%command, error = %e, "request failed");
        }
        inner.session.lock().await.queue.remove(&flight.completion);
        result
    }
}

/// A queued request owned by a caller.
///
/// If the caller drops its future before the command is written, the
/// entry fails with [`EscvpError::Cancelled`] and leaves the queue so it
/// cannot swallow a later answer. Once written, the entry stays: its
/// answer is still due and may be shared by identical requests, so it
/// is only expired when the round trip would have timed out.
struct InFlight<'a> {
    inner: &'a Arc<Inner>,
    command: &'a str,
    completion: Completion,
    limit: Duration,
    deadline: Option<Instant>,
    written: bool,
    finished: bool,
}

impl InFlight<'_> {
    fn expire_abandoned(&self) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let inner = Arc::downgrade(self.inner);
        let completion = self.completion.clone();
        let command = self.command.to_string();
        let after = self.limit;
        self.inner.tasks.spawn("abandoned", async move {
            if tokio::time::timeout_at(deadline, completion.wait()).await.is_ok() {
                return;
            }
            warn!(%command, "abandoned request was never answered");
            completion.reject(EscvpError::RequestTimeout { command, after });
            if let Some(inner) = inner.upgrade() {
                inner.session.lock().await.queue.remove(&completion);
            }
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.written {
            self.expire_abandoned();
            return;
        }
        self.completion.reject(EscvpError::Cancelled);
        if let Ok(mut session) = self.inner.session.try_lock() {
            session.queue.remove(&self.completion);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(self.inner);
            let completion = self.completion.clone();
            handle.spawn(async move {
                inner.session.lock().await.queue.remove(&completion);
            });
        }
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>) -> Result<()> {
        let mut closed = self.connect_lock.lock().await;
        *closed = false;
        self.open_session().await
    }

    /// Reconnect after a dropped session unless the user closed the
    /// client in the meantime.
    async fn reconnect(self: &Arc<Self>) -> Result<()> {
        let closed = self.connect_lock.lock().await;
        if *closed {
            debug!("client was closed, skipping reconnect");
            return Ok(());
        }
        self.open_session().await
    }

    /// Caller holds `connect_lock`.
    async fn open_session(self: &Arc<Self>) -> Result<()> {
        {
            let mut session = self.session.lock().await;
            if session.phase.is_open() {
                return Ok(());
            }
            session.phase.begin_connect()?;
        }

        let address = self.config.address();
        info!(%address, "connecting");
        let result = match self.open_stream(&address).await {
            Ok(stream) => self.start_session(stream).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.session.lock().await.phase.disconnect();
            error!(%address, error = %e, "failed to connect");
        }
        result
    }

    /// TCP connect plus handshake, bounded by the connect timeout.
    async fn open_stream(&self, address: &str) -> Result<TcpStream> {
        let limit = self.config.connect_timeout();
        let attempt = async {
            let mut stream = TcpStream::connect(address)
                .await
                .map_err(|e| EscvpError::ConnectFailed(format!("{address}: {e}")))?;
            self.session.lock().await.phase.begin_handshake()?;

            stream
                .write_all(&handshake::connect_request())
                .await
                .map_err(|e| EscvpError::ConnectFailed(format!("handshake write: {e}")))?;
            let mut response = [0u8; HANDSHAKE_LEN];
            stream
                .read_exact(&mut response)
                .await
                .map_err(|e| EscvpError::ConnectFailed(format!("handshake read: {e}")))?;
            let header = handshake::validate_response(&response)?;
            debug!(?header, "handshake accepted");
            Ok(stream)
        };
        match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(EscvpError::ConnectFailed(format!(
                "{address}: timed out after {limit:?}"
            ))),
        }
    }

    async fn start_session(self: &Arc<Self>, stream: TcpStream) -> Result<()> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable nagle");
        }
        let (read_half, write_half) = stream.into_split();

        let mut session = self.session.lock().await;
        session.phase.complete_handshake()?;
        session.generation += 1;
        let generation = session.generation;
        *self.writer.lock().await = Some((generation, FramedWrite::new(write_half, EscvpCodec)));

        let reader = FramedRead::new(read_half, EscvpCodec);
        let task = tokio::spawn(
            read_loop(Arc::downgrade(self), reader, generation)
                .instrument(info_span!("read_loop", host = %self.config.host, generation)),
        );
        session.read_task = Some(task);
        info!(host = %self.config.host, generation, "connection opened");
        Ok(())
    }

    async fn handle_frame(&self, frame: Frame) {
        let updates = self.session.lock().await.handle_frame(frame, &self.codec);
        self.publish(updates);
    }

    fn publish(&self, updates: Vec<PropertyUpdate>) {
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(dispatcher) = dispatcher.as_ref() {
            for update in updates {
                dispatcher.dispatch(update);
            }
        }
    }

    /// The read loop for `generation` ended on its own.
    async fn on_connection_lost(self: &Arc<Self>, generation: u64) {
        {
            let mut session = self.session.lock().await;
            if session.generation != generation || !session.phase.is_open() {
                // Closed deliberately, or already superseded.
                return;
            }
            session.read_task = None;
            session.close();
        }
        self.shutdown_writer(generation).await;

        warn!(host = %self.config.host, "connection lost, reconnecting");
        self.tasks.spawn("reconnect", reconnect(Arc::downgrade(self)));
    }

    async fn shutdown_writer(&self, generation: u64) {
        let mut slot = self.writer.lock().await;
        if !matches!(slot.as_ref(), Some((owner, _)) if *owner == generation) {
            return;
        }
        if let Some((_, mut writer)) = slot.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "error shutting down socket");
            }
        }
    }

    /// Wait for our turn, then write `command` and wait for its answer.
    async fn exchange(
        &self,
        command: &str,
        flight: &mut InFlight<'_>,
        previous: Option<Completion>,
    ) -> Result<PropertyValue> {
        if let Some(previous) = previous {
            debug!(command, "waiting for previous request");
            // Its outcome belongs to its own caller.
            let _ = previous.wait().await;
        }
        // Rejected while queued (session closed).
        if let Some(outcome) = flight.completion.peek() {
            return outcome;
        }

        self.wait_for_power_transition(command).await;

        let limit = flight.limit;
        flight.deadline = Some(Instant::now() + limit);
        let round_trip = async {
            self.write(command, flight).await?;
            flight.completion.wait().await
        };
        match tokio::time::timeout(limit, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(EscvpError::RequestTimeout {
                command: command.to_string(),
                after: limit,
            }),
        }
    }

    fn round_trip_limit(&self, command: &str) -> Duration {
        if is_power_command(command) {
            self.config.power_timeout()
        } else {
            self.config.request_timeout()
        }
    }

    async fn wait_for_power_transition(&self, command: &str) {
        let Some(signal) = self.session.lock().await.power.pending_transition() else {
            return;
        };
        debug!(command, "waiting for power state change");
        let limit = self.config.power_timeout();
        if tokio::time::timeout(limit, signal.wait()).await.is_err() {
            warn!(command, "timed out waiting for power state change");
            self.session.lock().await.power.expire(
                &signal,
                EscvpError::RequestTimeout {
                    command: command.to_string(),
                    after: limit,
                },
            );
        }
    }

    async fn write(&self, command: &str, flight: &mut InFlight<'_>) -> Result<()> {
        let mut slot = self.writer.lock().await;
        let Some((_, writer)) = slot.as_mut() else {
            return Err(EscvpError::ConnectionClosed);
        };
        // Already failed by a close; the caller picks up that outcome.
        if flight.completion.is_done() {
            return Ok(());
        }
        debug!(command, "writing command");
        flight.written = true;
        writer.send(command.to_string()).await
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.session.get_mut().read_task.take() {
            task.abort();
        }
    }
}

async fn read_loop(inner: Weak<Inner>, mut reader: FrameReader, generation: u64) {
    debug!("listening for frames");
    loop {
        let frame = match reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                break;
            }
            None => {
                info!("connection reached end of stream");
                break;
            }
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.handle_frame(frame).await;
    }
    if let Some(inner) = inner.upgrade() {
        inner.on_connection_lost(generation).await;
    }
}

/// Boxed so the connect → read loop → reconnect cycle has a named type.
fn reconnect(inner: Weak<Inner>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if let Err(e) = inner.reconnect().await {
            warn!(error = %e, "reconnect failed");
        }
    })
}

fn ensure_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EscvpError::InvalidCommand("empty command name".into()));
    }
    ensure_clean("command name", name)
}

/// One command per line: a terminator or frame delimiter inside the
/// text would put two commands on the wire for one queue entry.
fn ensure_clean(what: &str, text: &str) -> Result<()> {
    if text.contains(['\r', '\n', ':']) {
        return Err(EscvpError::InvalidCommand(format!(
            "{what} {text:?} contains a delimiter"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(ensure_name("PWR").is_ok());
        assert!(matches!(ensure_name(""), Err(EscvpError::InvalidCommand(_))));
        assert!(ensure_name("PWR\r").is_err());
        assert!(ensure_name("A:B").is_err());
        assert!(ensure_clean("argument", "02 0A").is_ok());
        assert!(ensure_clean("argument", "1\rVOL 2").is_err());
    }

    #[tokio::test]
    async fn delimiters_in_arguments_and_values_are_rejected() {
        let projector = Projector::new(ClientConfig::new("127.0.0.1").with_port(1));
        assert!(matches!(
            projector.send("KEY", Some("1\rVOL 2")).await,
            Err(EscvpError::InvalidCommand(_))
        ));
        assert!(matches!(
            projector.set("SOURCE", "30:").await,
            Err(EscvpError::InvalidCommand(_))
        ));
        assert!(!projector.is_open().await);
        assert_eq!(projector.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn reconnect_is_skipped_after_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let projector = Projector::new(ClientConfig::new("127.0.0.1").with_port(port));

        projector.close().await;
        reconnect(Arc::downgrade(&projector.inner)).await;

        assert!(!projector.is_open().await);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), listener.accept())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn empty_names_fail_before_connecting() {
        // Nothing listens on this port; validation must come first.
        let projector = Projector::new(ClientConfig::new("127.0.0.1").with_port(1));
        assert!(matches!(
            projector.get("").await,
            Err(EscvpError::InvalidCommand(_))
        ));
        assert!(matches!(
            projector.send("", Some("1")).await,
            Err(EscvpError::InvalidCommand(_))
        ));
        assert!(!projector.is_open().await);
    }

    #[tokio::test]
    async fn unencodable_set_value_is_rejected() {
        let projector = Projector::new(ClientConfig::default());
        assert!(matches!(
            projector.set(property::VOLUME, PropertyValue::Empty).await,
            Err(EscvpError::InvalidCommand(_))
        ));
        assert_eq!(projector.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn introspection_before_connect() {
        let projector = Projector::new(ClientConfig::default());
        assert!(!projector.is_open().await);
        assert_eq!(projector.power_state().await, None);
        assert!(!projector.has_error().await);
        projector.close().await;
    }
}
