// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Graph configuration, the worker thread and output delivery.
//!
//! A graph is configured from a small text grammar, then driven through the
//! ABI: inputs are queued from host threads, a single worker thread executes
//! one cycle per input packet and delivers the produced output packets to
//! blocking poller queues and observer callbacks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use super::fence::Fence;
use super::lock;
use super::packet::MgPacket;
use super::status::MgStatus;
use super::value::Value;
use crate::types::{
    MG_STATUS_ALREADY_EXISTS, MG_STATUS_FAILED_PRECONDITION, MG_STATUS_INVALID_ARGUMENT,
    MG_STATUS_NOT_FOUND, MG_TIMESTAMP_MAX, MG_TIMESTAMP_MIN, MG_TIMESTAMP_POST_STREAM,
    MG_TIMESTAMP_PRE_STREAM, MG_TIMESTAMP_UNSET, PacketCallback,
};

/// Calculators the engine knows how to run.
///
/// Deliberately minimal: these exist to route, thin and annotate packets so
/// the delivery machinery has something to deliver, not to do real media
/// processing.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CalculatorKind {
    /// Forwards its input unchanged.
    PassThrough,
    /// Drops packets at odd-microsecond timestamps, producing an empty
    /// output cycle in their place.
    PacketThinner,
    /// Emits `true`/`false` telling whether the companion input produced a
    /// payload this cycle.
    PacketPresence,
}

impl CalculatorKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "PassThroughCalculator" => Some(Self::PassThrough),
            "PacketThinnerCalculator" => Some(Self::PacketThinner),
            "PacketPresenceCalculator" => Some(Self::PacketPresence),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct NodeSpec {
    calculator: CalculatorKind,
    input: String,
    output: String,
}

/// Parsed graph shape: named boundary streams plus a node list in
/// topological order.
#[derive(Clone)]
pub(crate) struct Topology {
    inputs: Vec<String>,
    outputs: Vec<String>,
    nodes: Vec<NodeSpec>,
}

impl Topology {
    fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|n| n == name)
    }

    fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|n| n == name)
    }
}

/// Strips an optional `TAG:` / `TAG:index:` prefix from a stream spec.
fn stream_name(spec: &str) -> &str {
    spec.rsplit(':').next().unwrap_or(spec)
}

/// Extracts the quoted value of a `key: "value"` config line.
fn unquote(rest: &str, line_no: usize) -> Result<String, MgStatus> {
    let trimmed = rest.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| {
            MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!("line {line_no}: expected a quoted value, got \"{trimmed}\""),
            )
        })?;
    Ok(inner.to_string())
}

/// Parses the engine's text config grammar.
///
/// ```text
/// input_stream: "in"
/// output_stream: "out"
/// node {
///   calculator: "PassThroughCalculator"
///   input_stream: "in"
///   output_stream: "out"
/// }
/// ```
fn parse_config(text: &str) -> Result<Topology, MgStatus> {
    struct PartialNode {
        calculator: Option<String>,
        input: Option<String>,
        output: Option<String>,
    }

    let mut topology = Topology {
        inputs: Vec::new(),
        outputs: Vec::new(),
        nodes: Vec::new(),
    };
    let mut node: Option<PartialNode> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "node {" {
            if node.is_some() {
                return Err(MgStatus::new(
                    MG_STATUS_INVALID_ARGUMENT,
                    format!("line {line_no}: nested node block"),
                ));
            }
            node = Some(PartialNode {
                calculator: None,
                input: None,
                output: None,
            });
        } else if line == "}" {
            let partial = node.take().ok_or_else(|| {
                MgStatus::new(
                    MG_STATUS_INVALID_ARGUMENT,
                    format!("line {line_no}: unmatched closing brace"),
                )
            })?;
            let missing = |field: &str| {
                MgStatus::new(
                    MG_STATUS_INVALID_ARGUMENT,
                    format!("line {line_no}: node block is missing {field}"),
                )
            };
            let calculator_name = partial.calculator.ok_or_else(|| missing("calculator"))?;
            let calculator = CalculatorKind::from_name(&calculator_name).ok_or_else(|| {
                MgStatus::new(
                    MG_STATUS_INVALID_ARGUMENT,
                    format!("unknown calculator \"{calculator_name}\""),
                )
            })?;
            topology.nodes.push(NodeSpec {
                calculator,
                input: partial.input.ok_or_else(|| missing("input_stream"))?,
                output: partial.output.ok_or_else(|| missing("output_stream"))?,
            });
        } else if let Some(rest) = line.strip_prefix("calculator:") {
            match node.as_mut() {
                Some(partial) => partial.calculator = Some(unquote(rest, line_no)?),
                None => {
                    return Err(MgStatus::new(
                        MG_STATUS_INVALID_ARGUMENT,
                        format!("line {line_no}: calculator outside of a node block"),
                    ));
                }
            }
        } else if let Some(rest) = line.strip_prefix("input_stream:") {
            let name = stream_name(&unquote(rest, line_no)?).to_string();
            match node.as_mut() {
                Some(partial) => partial.input = Some(name),
                None => topology.inputs.push(name),
            }
        } else if let Some(rest) = line.strip_prefix("output_stream:") {
            let name = stream_name(&unquote(rest, line_no)?).to_string();
            match node.as_mut() {
                Some(partial) => partial.output = Some(name),
                None => topology.outputs.push(name),
            }
        } else {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!("line {line_no}: unrecognized directive \"{line}\""),
            ));
        }
    }

    if node.is_some() {
        return Err(MgStatus::new(
            MG_STATUS_INVALID_ARGUMENT,
            "unterminated node block",
        ));
    }
    if topology.inputs.is_empty() {
        return Err(MgStatus::new(
            MG_STATUS_INVALID_ARGUMENT,
            "config declares no input streams",
        ));
    }
    if topology.outputs.is_empty() {
        return Err(MgStatus::new(
            MG_STATUS_INVALID_ARGUMENT,
            "config declares no output streams",
        ));
    }

    // Nodes must be topologically ordered and every declared output must be
    // produced by something.
    let mut produced: HashSet<&str> = topology.inputs.iter().map(String::as_str).collect();
    for spec in &topology.nodes {
        if !produced.contains(spec.input.as_str()) {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!("node input stream \"{}\" is not produced upstream", spec.input),
            ));
        }
        if !produced.insert(spec.output.as_str()) {
            return Err(MgStatus::new(
                MG_STATUS_ALREADY_EXISTS,
                format!("stream \"{}\" is produced twice", spec.output),
            ));
        }
    }
    for output in &topology.outputs {
        if !produced.contains(output.as_str()) {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!("output stream \"{output}\" is not produced by any node"),
            ));
        }
    }

    Ok(topology)
}

/// Blocking hand-off queue backing one output stream poller.
pub(crate) struct PollerQueue {
    state: Mutex<PollerQueueState>,
    cond: Condvar,
    observe_timestamp_bounds: bool,
}

struct PollerQueueState {
    items: VecDeque<MgPacket>,
    closed: bool,
}

impl PollerQueue {
    fn new(observe_timestamp_bounds: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PollerQueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            cond: Condvar::new(),
            observe_timestamp_bounds,
        })
    }

    fn push(&self, packet: MgPacket) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.items.push_back(packet);
        self.cond.notify_one();
    }

    fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        self.cond.notify_all();
    }

    /// Blocks until a packet is available (`Some`) or the stream is closed
    /// and drained (`None`).
    pub(crate) fn next(&self) -> Option<MgPacket> {
        let mut state = lock(&self.state);
        loop {
            if let Some(packet) = state.items.pop_front() {
                return Some(packet);
            }
            if state.closed {
                return None;
            }
            state = match self.cond.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.state).items.len()
    }
}

/// Blocking pull handle bound to one output stream.
///
/// Opaque at the ABI; released with `mgPollerDelete`.
pub struct MgPoller {
    pub(crate) queue: Arc<PollerQueue>,
}

/// Result cell for `mgGraphAddOutputStreamPoller`: an error status or an
/// owned poller, extractable once.
pub struct MgStatusOrPoller {
    pub(crate) status: MgStatus,
    pub(crate) poller: Option<Box<MgPoller>>,
}

struct Observer {
    token: u64,
    callback: PacketCallback,
    observe_timestamp_bounds: bool,
}

#[derive(Default)]
struct StreamSinks {
    observers: Vec<Observer>,
    pollers: Vec<Arc<PollerQueue>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Done,
}

struct State {
    phase: Phase,
    queue: VecDeque<(usize, MgPacket)>,
    closed: Vec<bool>,
    open_inputs: usize,
    last_timestamp: Vec<i64>,
    /// Queued plus in-flight cycles; zero means the graph is idle.
    pending: usize,
    cancelled: bool,
    error: Option<MgStatus>,
}

struct Shared {
    state: Mutex<State>,
    /// Wakes the worker when input arrives or the graph winds down.
    input_cond: Condvar,
    /// Wakes `WaitUntilIdle` / `WaitUntilDone` callers.
    idle_cond: Condvar,
    sinks: Mutex<HashMap<String, StreamSinks>>,
}

/// A configured processing graph.
///
/// Opaque at the ABI; released with `mgGraphDelete`.
pub struct MgGraph {
    topology: Topology,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn timestamp_allowed_in_stream(timestamp: i64) -> bool {
    timestamp == MG_TIMESTAMP_PRE_STREAM
        || timestamp == MG_TIMESTAMP_POST_STREAM
        || (MG_TIMESTAMP_MIN..=MG_TIMESTAMP_MAX).contains(&timestamp)
}

impl MgGraph {
    pub(crate) fn from_config(text: &str) -> Result<Self, MgStatus> {
        let topology = parse_config(text)?;
        let input_count = topology.inputs.len();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                phase: Phase::NotStarted,
                queue: VecDeque::new(),
                closed: vec![false; input_count],
                open_inputs: input_count,
                last_timestamp: vec![MG_TIMESTAMP_UNSET; input_count],
                pending: 0,
                cancelled: false,
                error: None,
            }),
            input_cond: Condvar::new(),
            idle_cond: Condvar::new(),
            sinks: Mutex::new(HashMap::new()),
        });
        Ok(Self {
            topology,
            shared,
            worker: Mutex::new(None),
        })
    }

    pub(crate) fn observe_output_stream(
        &self,
        name: &str,
        token: u64,
        callback: PacketCallback,
        observe_timestamp_bounds: bool,
    ) -> Result<(), MgStatus> {
        self.check_can_add_sink(name)?;
        let mut sinks = lock(&self.shared.sinks);
        sinks.entry(name.to_string()).or_default().observers.push(Observer {
            token,
            callback,
            observe_timestamp_bounds,
        });
        Ok(())
    }

    pub(crate) fn add_output_stream_poller(
        &self,
        name: &str,
        observe_timestamp_bounds: bool,
    ) -> Result<Box<MgPoller>, MgStatus> {
        self.check_can_add_sink(name)?;
        let queue = PollerQueue::new(observe_timestamp_bounds);
        let mut sinks = lock(&self.shared.sinks);
        sinks
            .entry(name.to_string())
            .or_default()
            .pollers
            .push(queue.clone());
        Ok(Box::new(MgPoller { queue }))
    }

    fn check_can_add_sink(&self, name: &str) -> Result<(), MgStatus> {
        if !self.topology.has_output(name) {
            return Err(MgStatus::new(
                MG_STATUS_NOT_FOUND,
                format!("output stream \"{name}\" is not declared by the graph"),
            ));
        }
        let state = lock(&self.shared.state);
        if state.phase != Phase::NotStarted {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "output streams must be bound before the graph is started",
            ));
        }
        Ok(())
    }

    pub(crate) fn start_run(&self) -> Result<(), MgStatus> {
        {
            let mut state = lock(&self.shared.state);
            match state.phase {
                Phase::NotStarted => state.phase = Phase::Running,
                Phase::Running => {
                    return Err(MgStatus::new(
                        MG_STATUS_FAILED_PRECONDITION,
                        "graph is already running",
                    ));
                }
                Phase::Done => {
                    return Err(MgStatus::new(
                        MG_STATUS_FAILED_PRECONDITION,
                        "graph has already finished",
                    ));
                }
            }
        }
        let topology = self.topology.clone();
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("mediagraph-worker".to_string())
            .spawn(move || run_worker(topology, shared))
            .map_err(|e| {
                MgStatus::new(
                    MG_STATUS_FAILED_PRECONDITION,
                    format!("failed to spawn worker thread: {e}"),
                )
            })?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    pub(crate) fn add_packet(&self, name: &str, packet: MgPacket) -> Result<(), MgStatus> {
        let index = self.topology.input_index(name).ok_or_else(|| {
            MgStatus::new(
                MG_STATUS_NOT_FOUND,
                format!("input stream \"{name}\" is not declared by the graph"),
            )
        })?;
        let mut state = lock(&self.shared.state);
        if state.phase != Phase::Running {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph is not running",
            ));
        }
        if state.closed[index] {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                format!("input stream \"{name}\" is closed"),
            ));
        }
        if packet.is_empty() {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                "cannot add an empty packet to an input stream",
            ));
        }
        if !timestamp_allowed_in_stream(packet.timestamp) {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!("timestamp {} is not allowed in stream", packet.timestamp),
            ));
        }
        if packet.timestamp <= state.last_timestamp[index] {
            return Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!(
                    "timestamp mismatch on input stream \"{name}\": {} <= {}",
                    packet.timestamp, state.last_timestamp[index]
                ),
            ));
        }
        state.last_timestamp[index] = packet.timestamp;
        state.queue.push_back((index, packet));
        state.pending += 1;
        self.shared.input_cond.notify_one();
        Ok(())
    }

    pub(crate) fn close_input_stream(&self, name: &str) -> Result<(), MgStatus> {
        let index = self.topology.input_index(name).ok_or_else(|| {
            MgStatus::new(
                MG_STATUS_NOT_FOUND,
                format!("input stream \"{name}\" is not declared by the graph"),
            )
        })?;
        let mut state = lock(&self.shared.state);
        if state.phase != Phase::Running {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph is not running",
            ));
        }
        if state.closed[index] {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                format!("input stream \"{name}\" is already closed"),
            ));
        }
        state.closed[index] = true;
        state.open_inputs -= 1;
        self.shared.input_cond.notify_all();
        Ok(())
    }

    pub(crate) fn close_all_packet_sources(&self) -> Result<(), MgStatus> {
        let mut state = lock(&self.shared.state);
        if state.phase != Phase::Running {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph is not running",
            ));
        }
        for closed in state.closed.iter_mut() {
            *closed = true;
        }
        state.open_inputs = 0;
        self.shared.input_cond.notify_all();
        Ok(())
    }

    /// Blocks until every queued cycle has been processed.
    pub(crate) fn wait_until_idle(&self) -> Result<(), MgStatus> {
        let mut state = lock(&self.shared.state);
        if state.phase == Phase::NotStarted {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph has not been started",
            ));
        }
        while state.pending > 0 && state.phase == Phase::Running {
            state = match self.shared.idle_cond.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        match &state.error {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }

    /// Blocks until the worker has exited (all inputs closed and drained, or
    /// the run was cancelled).
    pub(crate) fn wait_until_done(&self) -> Result<(), MgStatus> {
        let mut state = lock(&self.shared.state);
        if state.phase == Phase::NotStarted {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph has not been started",
            ));
        }
        while state.phase != Phase::Done {
            state = match self.shared.idle_cond.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        match &state.error {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn has_error(&self) -> bool {
        lock(&self.shared.state).error.is_some()
    }

    pub(crate) fn cancel(&self) -> Result<(), MgStatus> {
        let mut state = lock(&self.shared.state);
        if state.phase != Phase::Running {
            return Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "graph is not running",
            ));
        }
        state.cancelled = true;
        self.shared.input_cond.notify_all();
        Ok(())
    }

    /// Tears the run down for deletion: cancels, then joins the worker.
    pub(crate) fn shutdown(&mut self) {
        {
            let mut state = lock(&self.shared.state);
            if state.phase == Phase::Running {
                state.cancelled = true;
                self.shared.input_cond.notify_all();
            }
        }
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

/// One cycle: seeds the arriving input stream, runs each node in config
/// order and returns every stream touched this cycle. `None` entries mark
/// streams whose producer dropped the packet (empty output this cycle).
fn execute_cycle(
    topology: &Topology,
    stream_index: usize,
    packet: &MgPacket,
) -> HashMap<String, Option<Value>> {
    let mut streams: HashMap<String, Option<Value>> = HashMap::new();
    streams.insert(
        topology.inputs[stream_index].clone(),
        packet.value.clone(),
    );
    for node in &topology.nodes {
        let Some(input) = streams.get(&node.input) else {
            continue;
        };
        let output = match node.calculator {
            CalculatorKind::PassThrough => input.clone(),
            CalculatorKind::PacketThinner => {
                if packet.timestamp.rem_euclid(2) == 1 {
                    None
                } else {
                    input.clone()
                }
            }
            CalculatorKind::PacketPresence => Some(Value::Bool(input.is_some())),
        };
        streams.insert(node.output.clone(), output);
    }
    streams
}

fn run_worker(topology: Topology, shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = lock(&shared.state);
            loop {
                if state.cancelled {
                    let dropped = state.queue.len();
                    state.queue.clear();
                    state.pending -= dropped;
                    break None;
                }
                if let Some(message) = state.queue.pop_front() {
                    break Some(message);
                }
                if state.open_inputs == 0 {
                    break None;
                }
                state = match shared.input_cond.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };
        let Some((stream_index, packet)) = next else {
            break;
        };

        let mut streams = execute_cycle(&topology, stream_index, &packet);

        // A fresh fence per GPU-backed output: the consuming context must
        // not touch the buffer before this cycle's work retires.
        let mut cycle_fences = Vec::new();
        for cell in streams.values_mut() {
            if let Some(Value::GpuBuffer(buffer)) = cell {
                let fence = Fence::new();
                buffer.fence = fence.clone();
                cycle_fences.push(fence);
            }
        }

        deliver_outputs(&topology, &shared, &streams, packet.timestamp);

        for fence in cycle_fences {
            fence.signal();
        }

        let mut state = lock(&shared.state);
        state.pending -= 1;
        if state.pending == 0 {
            shared.idle_cond.notify_all();
        }
    }

    // Wind-down: close every poller queue, then report done.
    {
        let sinks = lock(&shared.sinks);
        for stream_sinks in sinks.values() {
            for queue in &stream_sinks.pollers {
                queue.close();
            }
        }
    }
    let mut state = lock(&shared.state);
    state.phase = Phase::Done;
    shared.idle_cond.notify_all();
}

fn deliver_outputs(
    topology: &Topology,
    shared: &Shared,
    streams: &HashMap<String, Option<Value>>,
    timestamp: i64,
) {
    let sinks = lock(&shared.sinks);
    for name in &topology.outputs {
        let Some(cell) = streams.get(name) else {
            continue;
        };
        let Some(stream_sinks) = sinks.get(name) else {
            continue;
        };
        for queue in &stream_sinks.pollers {
            if cell.is_some() || queue.observe_timestamp_bounds {
                queue.push(MgPacket {
                    value: cell.clone(),
                    timestamp,
                });
            }
        }
        for observer in &stream_sinks.observers {
            if cell.is_none() && !observer.observe_timestamp_bounds {
                continue;
            }
            let mut delivered = MgPacket {
                value: cell.clone(),
                timestamp,
            };
            let status_ptr = unsafe { (observer.callback)(observer.token, &mut delivered) };
            if !status_ptr.is_null() {
                let status = unsafe { Box::from_raw(status_ptr) };
                if !status.is_ok() {
                    let mut state = lock(&shared.state);
                    if state.error.is_none() {
                        state.error = Some(*status);
                    }
                }
            }
        }
    }
}
