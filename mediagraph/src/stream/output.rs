// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous, push-based output retrieval.
//!
//! The engine invokes a registered callback on its own worker thread, once
//! per delivered packet. The callback trampoline here does the minimum on
//! that foreign thread: look the stream up by registration token, enforce
//! strictly increasing delivery timestamps, decode the payload and push the
//! event into a bounded channel. A host-owned dispatcher thread drains the
//! channel and fans events out to listeners, so listener code never runs on
//! the engine thread.
//!
//! Registration uses an integer token mapped to a weak reference; a closed
//! or dropped stream simply drops in-flight deliveries.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::CString;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::graph::Graph;
use crate::packet::{Packet, PacketValue};
use crate::status::{Status, consume_status};
use crate::stream::OutputStreamPoller;
use crate::{Error, Result, StatusCode, Timestamp, name};

/// What to do when the engine delivers a packet whose timestamp does not
/// exceed the last one seen. The delivery is dropped either way; it is
/// never passed on to listeners twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Drop silently.
    #[default]
    Ignore,
    /// Drop and emit a `tracing` warning.
    Warn,
}

/// One delivery from an output stream.
///
/// `value` is `None` for a "no output this cycle" notification (an empty
/// packet whose timeout elapsed).
#[derive(Debug, Clone, PartialEq)]
pub struct Output<T> {
    pub timestamp: Timestamp,
    pub value: Option<T>,
}

/// Tuning knobs for an [`OutputStream`].
#[derive(Debug, Clone)]
pub struct OutputStreamOptions {
    /// Deliver empty packets for cycles that produced no output. Without
    /// this there is no way to learn that a cycle came and went empty.
    pub observe_timestamp_bounds: bool,
    /// Minimum quiet period before an empty delivery is reported as a
    /// "no output this cycle" event. Zero reports every empty cycle.
    pub timeout: Duration,
    /// Handling of stale or duplicate delivery timestamps.
    pub duplicate_policy: DuplicatePolicy,
    /// Capacity of the bounded channel between the engine thread and the
    /// dispatcher. Deliveries beyond a full channel are dropped with a
    /// warning rather than blocking the engine.
    pub queue_capacity: usize,
    /// Companion bool stream produced by a `PacketPresenceCalculator`;
    /// enables the non-blocking [`OutputStream::try_get_next`] path.
    ///
    /// Setting this forces `observe_timestamp_bounds` off: the presence
    /// stream carries the absence signal, and empty deliveries on the data
    /// stream would double-report it and misalign the two pollers.
    pub presence_stream: Option<String>,
}

impl Default for OutputStreamOptions {
    fn default() -> Self {
        Self {
            observe_timestamp_bounds: true,
            timeout: Duration::ZERO,
            duplicate_policy: DuplicatePolicy::Ignore,
            queue_capacity: 64,
            presence_stream: None,
        }
    }
}

/// Registration table mapping callback tokens to live streams.
///
/// Holds weak references only: the engine-side registration must never keep
/// a disposed stream alive, and a dead entry just drops the delivery.
static REGISTRY: LazyLock<Mutex<HashMap<u64, Weak<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Shared state the trampoline needs; everything else stays host-side.
struct StreamState<T: PacketValue> {
    stream_name: String,
    timeout_micros: i64,
    duplicate_policy: DuplicatePolicy,
    /// Last timestamp delivered to the host. The single piece of state the
    /// engine thread and host threads both touch; the lock is held only for
    /// the compare-and-update.
    last_timestamp: Mutex<i64>,
    sender: SyncSender<Output<T>>,
}

impl<T: PacketValue> StreamState<T> {
    fn send(&self, output: Output<T>) {
        match self.sender.try_send(output) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    stream = %self.stream_name,
                    "delivery queue is full; dropping output"
                );
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn lookup_stream<T: PacketValue>(token: u64) -> Option<Arc<StreamState<T>>> {
    let registry = lock(&REGISTRY);
    let erased = registry.get(&token)?.upgrade()?;
    erased.downcast::<StreamState<T>>().ok()
}

/// Decodes one engine delivery and forwards it to the host channel.
fn handle_delivery<T: PacketValue>(
    token: u64,
    packet: *mut mediagraph_sys::MgPacket,
) -> Result<()> {
    let Some(state) = lookup_stream::<T>(token) else {
        // Stream closed or dropped: discard the in-flight delivery.
        return Ok(());
    };
    let packet = unsafe { Packet::<T>::borrowed(packet) };
    let timestamp = packet.timestamp()?;
    let micros = timestamp.micros();

    if packet.is_empty()? {
        let mut last = lock(&state.last_timestamp);
        if micros.saturating_sub(*last) >= state.timeout_micros {
            *last = micros;
            drop(last);
            state.send(Output {
                timestamp,
                value: None,
            });
        }
        return Ok(());
    }

    {
        let mut last = lock(&state.last_timestamp);
        if micros <= *last {
            if state.duplicate_policy == DuplicatePolicy::Warn {
                tracing::warn!(
                    stream = %state.stream_name,
                    timestamp = micros,
                    last_timestamp = *last,
                    "dropping stale or duplicate delivery"
                );
            }
            return Ok(());
        }
        *last = micros;
    }

    let value = packet.get()?;
    state.send(Output {
        timestamp,
        value: Some(value),
    });
    Ok(())
}

fn error_to_raw_status(error: &Error) -> *mut mediagraph_sys::MgStatus {
    let (code, message) = match error {
        Error::BadStatus { code, message } => (*code, message.clone()),
        other => (StatusCode::Internal, other.to_string()),
    };
    match Status::new(code, &message).and_then(Status::into_raw) {
        Ok(ptr) => ptr,
        // Failing to build the report must not take the engine down;
        // answer ok instead.
        Err(_) => std::ptr::null_mut(),
    }
}

/// The callback registered with the engine. Runs on the engine's worker
/// thread; failures (including panics from decoding) are reported through
/// the engine's status-return channel, never unwound across the boundary.
unsafe extern "C" fn trampoline<T: PacketValue>(
    token: u64,
    packet: *mut mediagraph_sys::MgPacket,
) -> *mut mediagraph_sys::MgStatus {
    match catch_unwind(AssertUnwindSafe(|| handle_delivery::<T>(token, packet))) {
        Ok(Ok(())) => std::ptr::null_mut(),
        Ok(Err(error)) => error_to_raw_status(&error),
        Err(_) => error_to_raw_status(&Error::Other(
            "panic while handling an output stream delivery".to_string(),
        )),
    }
}

type Listener<T> = Box<dyn Fn(&Output<T>) + Send>;

/// Asynchronous push binding to one named output stream.
///
/// Deliveries are guaranteed strictly increasing in timestamp: stale or
/// duplicate deliveries are dropped according to the configured
/// [`DuplicatePolicy`] and never reach listeners.
///
/// # Examples
///
/// ```no_run
/// use mediagraph::{Graph, OutputStream, OutputStreamOptions};
///
/// # fn example(graph: Graph) -> Result<(), mediagraph::Error> {
/// let mut stream =
///     OutputStream::<i32>::new(&graph, "output", OutputStreamOptions::default())?;
/// stream.add_listener(|output| {
///     if let Some(value) = &output.value {
///         println!("{}: {}", output.timestamp, value);
///     }
/// });
/// graph.start_run()?;
/// // ... push inputs ...
/// stream.close()?;
/// # Ok(())
/// # }
/// ```
pub struct OutputStream<T: PacketValue> {
    graph: Graph,
    stream_name: String,
    options: OutputStreamOptions,
    id: u64,
    state: Option<Arc<StreamState<T>>>,
    listeners: Arc<Mutex<Vec<Listener<T>>>>,
    dispatcher: Option<JoinHandle<()>>,
    poller: Option<OutputStreamPoller<T>>,
    packet: Option<Packet<T>>,
    presence_poller: Option<OutputStreamPoller<bool>>,
    presence_packet: Option<Packet<bool>>,
}

impl<T: PacketValue> OutputStream<T> {
    /// Binds an asynchronous output stream. Must be called before
    /// [`Graph::start_run`].
    ///
    /// The stream spec (and the presence stream spec, if configured) is
    /// validated host-side before the engine is asked.
    pub fn new(graph: &Graph, stream: &str, options: OutputStreamOptions) -> Result<Self> {
        let stream_name = name::parse_tag_index_name(stream)?.name;
        let presence_name = options
            .presence_stream
            .as_deref()
            .map(|spec| Ok::<_, Error>(name::parse_tag_index_name(spec)?.name))
            .transpose()?;
        let observe_timestamp_bounds = options.observe_timestamp_bounds && presence_name.is_none();

        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = sync_channel(options.queue_capacity.max(1));
        let state = Arc::new(StreamState::<T> {
            stream_name: stream_name.clone(),
            timeout_micros: options.timeout.as_micros().min(i64::MAX as u128) as i64,
            duplicate_policy: options.duplicate_policy,
            last_timestamp: Mutex::new(i64::MIN),
            sender,
        });
        {
            let erased: Arc<dyn Any + Send + Sync> = state.clone();
            lock(&REGISTRY).insert(id, Arc::downgrade(&erased));
        }

        let listeners: Arc<Mutex<Vec<Listener<T>>>> = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = spawn_dispatcher(&stream_name, receiver, listeners.clone())?;

        let mut output_stream = Self {
            graph: graph.clone(),
            stream_name,
            options: OutputStreamOptions {
                presence_stream: presence_name,
                observe_timestamp_bounds,
                ..options
            },
            id,
            state: Some(state),
            listeners,
            dispatcher: Some(dispatcher),
            poller: None,
            packet: None,
            presence_poller: None,
            presence_packet: None,
        };

        if let Err(error) = output_stream.register() {
            output_stream.shutdown();
            return Err(error);
        }
        Ok(output_stream)
    }

    fn register(&self) -> Result<()> {
        let stream = CString::new(self.stream_name.as_str())?;
        let mut status = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgGraphObserveOutputStream(
                self.graph.context().raw(),
                stream.as_ptr(),
                self.id,
                trampoline::<T>,
                self.options.observe_timestamp_bounds,
                &mut status,
            )
        })?;
        unsafe { consume_status(status) }
    }

    /// The bare stream name this binding observes.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Registers a listener invoked on the stream's dispatcher thread for
    /// every delivery.
    ///
    /// Safe to call while deliveries are in flight.
    pub fn add_listener(&self, listener: impl Fn(&Output<T>) + Send + 'static) {
        lock(&self.listeners).push(Box::new(listener));
    }

    /// Removes every registered listener.
    pub fn remove_all_listeners(&self) {
        lock(&self.listeners).clear();
    }

    /// Additionally binds a blocking poller (and the presence poller, if
    /// configured) for the pull-style [`Self::try_get_next`] API. Must be
    /// called before [`Graph::start_run`].
    pub fn start_polling(&mut self) -> Result<()> {
        self.poller = Some(
            self.graph
                .add_output_stream_poller::<T>(
                    &self.stream_name,
                    self.options.observe_timestamp_bounds,
                )?
                .take()?,
        );
        self.packet = Some(Packet::empty()?);
        if let Some(presence) = self.options.presence_stream.clone() {
            self.presence_poller = Some(
                self.graph
                    .add_output_stream_poller::<bool>(&presence, false)?
                    .take()?,
            );
            self.presence_packet = Some(Packet::empty()?);
        }
        Ok(())
    }

    /// Pulls the next fresh value, if any.
    ///
    /// With a presence stream configured and `allow_block` false, the call
    /// returns `Ok(None)` instead of blocking when no presence verdict is
    /// queued. Returns `Ok(None)` for empty cycles, stale or duplicate
    /// timestamps, and a closed stream.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedOperation`] if [`Self::start_polling`] has not
    /// been called.
    pub fn try_get_next(&mut self, allow_block: bool) -> Result<Option<T>> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::DisposedAccess("OutputStream"))?
            .clone();
        let (Some(poller), Some(packet)) = (self.poller.as_mut(), self.packet.as_mut()) else {
            return Err(Error::UnsupportedOperation(
                "start_polling must be called before try_get_next".to_string(),
            ));
        };

        match (self.presence_poller.as_mut(), self.presence_packet.as_mut()) {
            (Some(presence_poller), Some(presence_packet)) => {
                if !allow_block && presence_poller.queue_size()? == 0 {
                    return Ok(None);
                }
                if !presence_poller.next(presence_packet)? {
                    return Ok(None);
                }
                if presence_packet.is_empty()? || !presence_packet.get()? {
                    // No output this cycle; nothing is queued on the data
                    // stream for this timestamp.
                    return Ok(None);
                }
            }
            _ => {
                if !allow_block {
                    tracing::warn!(
                        stream = %self.stream_name,
                        "cannot avoid blocking without a presence stream"
                    );
                    return Ok(None);
                }
            }
        }

        if !poller.next(packet)? {
            return Ok(None);
        }
        let micros = packet.timestamp()?.micros();
        if packet.is_empty()? {
            return Ok(None);
        }
        {
            let mut last = lock(&state.last_timestamp);
            if micros <= *last {
                if state.duplicate_policy == DuplicatePolicy::Warn {
                    tracing::warn!(
                        stream = %self.stream_name,
                        timestamp = micros,
                        "dropping stale or duplicate packet"
                    );
                }
                return Ok(None);
            }
            *last = micros;
        }
        Ok(Some(packet.get()?))
    }

    /// Deregisters the stream and stops the dispatcher.
    ///
    /// Idempotent. A delivery already in flight on the engine thread is
    /// dropped; it can never reach freed memory because the registration
    /// table only holds a weak reference.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.remove_all_listeners();
        if self.state.take().is_some() {
            lock(&REGISTRY).remove(&self.id);
        }
        // Dropping the state dropped the sender; the dispatcher drains the
        // channel and exits.
        if let Some(handle) = self.dispatcher.take()
            && handle.join().is_err()
        {
            tracing::error!(stream = %self.stream_name, "dispatcher thread panicked");
        }
        self.poller = None;
        self.packet = None;
        self.presence_poller = None;
        self.presence_packet = None;
    }
}

impl<T: PacketValue> Drop for OutputStream<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_dispatcher<T: PacketValue>(
    stream_name: &str,
    receiver: Receiver<Output<T>>,
    listeners: Arc<Mutex<Vec<Listener<T>>>>,
) -> Result<JoinHandle<()>> {
    let thread_name = format!("mediagraph-dispatch-{stream_name}");
    let stream_name = stream_name.to_string();
    std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            while let Ok(output) = receiver.recv() {
                let listeners = lock(&listeners);
                for listener in listeners.iter() {
                    if catch_unwind(AssertUnwindSafe(|| listener(&output))).is_err() {
                        tracing::error!(
                            stream = %stream_name,
                            "output stream listener panicked"
                        );
                    }
                }
            }
        })
        .map_err(|e| Error::Other(format!("failed to spawn dispatcher thread: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::RecvTimeoutError;

    /// Builds a state + registry entry the way `OutputStream::new` does,
    /// without needing a graph.
    fn register_test_stream(
        timeout_micros: i64,
        capacity: usize,
    ) -> (u64, Arc<StreamState<i32>>, Receiver<Output<i32>>) {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = sync_channel(capacity);
        let state = Arc::new(StreamState::<i32> {
            stream_name: "test".to_string(),
            timeout_micros,
            duplicate_policy: DuplicatePolicy::Ignore,
            last_timestamp: Mutex::new(i64::MIN),
            sender,
        });
        let erased: Arc<dyn Any + Send + Sync> = state.clone();
        lock(&REGISTRY).insert(id, Arc::downgrade(&erased));
        (id, state, receiver)
    }

    fn deliver(id: u64, value: i32, micros: i64) {
        let mut packet = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketCreateInt(value, micros, &mut packet) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        let status = unsafe { trampoline::<i32>(id, packet) };
        assert!(status.is_null() || unsafe { mediagraph_sys::mgStatusOk(status) });
        unsafe { mediagraph_sys::mgStatusDelete(status) };
        unsafe { mediagraph_sys::mgPacketDelete(packet) };
    }

    fn deliver_empty(id: u64, micros: i64) {
        let mut packet = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketCreate(&mut packet) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        let mut stamped = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketAt(packet, micros, &mut stamped) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        let status = unsafe { trampoline::<i32>(id, stamped) };
        assert!(status.is_null());
        unsafe { mediagraph_sys::mgPacketDelete(stamped) };
        unsafe { mediagraph_sys::mgPacketDelete(packet) };
    }

    #[test]
    fn duplicate_timestamps_are_dropped() {
        let (id, state, receiver) = register_test_stream(0, 16);

        deliver(id, 1, 1000);
        deliver(id, 2, 2000);
        deliver(id, 22, 2000); // duplicate timestamp: dropped
        deliver(id, 0, 1500); // stale timestamp: dropped
        deliver(id, 3, 3000);

        let values: Vec<_> = receiver.try_iter().map(|o| o.value.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(*lock(&state.last_timestamp), 3000);

        lock(&REGISTRY).remove(&id);
    }

    #[test]
    fn empty_deliveries_report_no_output_after_timeout() {
        let (id, _state, receiver) = register_test_stream(0, 16);

        deliver_empty(id, 500);
        let output = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("expected a no-output event");
        assert_eq!(output.timestamp, Timestamp::from_micros(500));
        assert_eq!(output.value, None);

        lock(&REGISTRY).remove(&id);
    }

    #[test]
    fn empty_deliveries_within_timeout_are_suppressed() {
        let (id, _state, receiver) = register_test_stream(10_000, 16);

        deliver(id, 1, 1000);
        deliver_empty(id, 2000); // only 1ms after the last value
        assert_eq!(receiver.try_iter().count(), 1);
        assert!(matches!(
            receiver.recv_timeout(Duration::from_millis(20)),
            Err(RecvTimeoutError::Timeout)
        ));

        lock(&REGISTRY).remove(&id);
    }

    #[test]
    fn delivery_to_a_dead_registration_is_dropped() {
        let (id, state, receiver) = register_test_stream(0, 16);
        lock(&REGISTRY).remove(&id);
        drop(state);

        // Must neither crash nor produce an event.
        deliver(id, 9, 9000);
        assert_eq!(receiver.try_iter().count(), 0);
    }

    #[test]
    fn wrong_payload_type_reports_an_error_status() {
        let (id, _state, _receiver) = register_test_stream(0, 16);

        let mut packet = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketCreateFloat(1.5, 1000, &mut packet) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        let status = unsafe { trampoline::<i32>(id, packet) };
        assert!(!status.is_null());
        assert!(!unsafe { mediagraph_sys::mgStatusOk(status) });
        unsafe { mediagraph_sys::mgStatusDelete(status) };
        unsafe { mediagraph_sys::mgPacketDelete(packet) };

        lock(&REGISTRY).remove(&id);
    }
}
