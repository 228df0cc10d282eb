// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the MediaGraph bindings.
//!
//! These tests exercise the binding core end to end against the engine:
//! round-trip delivery through pollers, asynchronous listener delivery with
//! the strictly-increasing timestamp guarantee, presence-gated non-blocking
//! polls, GPU fence hand-off and graph error propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediagraph::{
    DuplicatePolicy, Error, Graph, GraphConfig, GpuBuffer, OutputStream, OutputStreamOptions,
    Packet, StatusCode, Timestamp,
};
use tracing::info;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

fn setup() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

fn pass_through_config() -> GraphConfig {
    GraphConfig::new()
        .input_stream("input")
        .output_stream("output")
        .node("PassThroughCalculator", "input", "output")
}

/// Pushing ten packets with strictly increasing timestamps through a
/// pass-through graph and polling the output yields the same ten values in
/// the same order.
#[test]
fn poller_round_trip_preserves_order() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut poller = graph
        .add_output_stream_poller::<i32>("output", false)
        .unwrap()
        .take()
        .unwrap();
    graph.start_run().unwrap();

    for i in 0..10 {
        let packet = Packet::new_at(i, Timestamp::from_micros(i64::from(i) * 10)).unwrap();
        graph.add_packet_to_input_stream("input", packet).unwrap();
    }
    graph.close_input_stream("input").unwrap();

    let mut received = Vec::new();
    let mut packet = Packet::<i32>::empty().unwrap();
    while poller.next(&mut packet).unwrap() {
        received.push(packet.get().unwrap());
    }
    assert_eq!(received, (0..10).collect::<Vec<_>>());

    graph.wait_until_done().unwrap();
    assert!(!graph.has_error());
    info!("round-tripped {} packets", received.len());
}

/// `next` keeps returning `false` after stream closure instead of blocking
/// or failing.
#[test]
fn poller_returns_false_after_closure() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut poller = graph
        .add_output_stream_poller::<i32>("output", false)
        .unwrap()
        .take()
        .unwrap();
    graph.start_run().unwrap();
    graph.close_input_stream("input").unwrap();
    graph.wait_until_done().unwrap();

    let mut packet = Packet::<i32>::empty().unwrap();
    assert!(!poller.next(&mut packet).unwrap());
    assert!(!poller.next(&mut packet).unwrap());
}

/// Listener delivery is in strictly increasing timestamp order and sees
/// every pushed value.
#[test]
fn listeners_observe_ordered_deliveries() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut stream =
        OutputStream::<i32>::new(&graph, "output", OutputStreamOptions::default()).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    stream.add_listener(move |output| {
        if let Some(value) = output.value {
            sink.lock().unwrap().push((output.timestamp.micros(), value));
        }
    });

    graph.start_run().unwrap();
    for i in 0..5 {
        let packet = Packet::new_at(i, Timestamp::from_micros(i64::from(i) * 100)).unwrap();
        graph.add_packet_to_input_stream("input", packet).unwrap();
    }
    graph.close_input_stream("input").unwrap();
    graph.wait_until_done().unwrap();
    stream.close().unwrap();

    let received = received.lock().unwrap();
    assert_eq!(
        *received,
        vec![(0, 0), (100, 1), (200, 2), (300, 3), (400, 4)]
    );
    let timestamps: Vec<_> = received.iter().map(|(t, _)| *t).collect();
    assert!(
        timestamps.windows(2).all(|pair| pair[0] < pair[1]),
        "timestamps must be strictly increasing"
    );
}

/// Closing the stream mid-run drops in-flight deliveries without failing
/// the graph.
#[test]
fn closing_a_stream_mid_run_is_safe() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut stream = OutputStream::<i32>::new(
        &graph,
        "output",
        OutputStreamOptions {
            duplicate_policy: DuplicatePolicy::Warn,
            ..OutputStreamOptions::default()
        },
    )
    .unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    stream.add_listener(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    graph.start_run().unwrap();
    graph
        .add_packet_to_input_stream("input", Packet::new_at(1, Timestamp::from_micros(1000)).unwrap())
        .unwrap();
    graph.wait_until_idle().unwrap();
    stream.close().unwrap();
    stream.close().unwrap(); // idempotent

    graph
        .add_packet_to_input_stream("input", Packet::new_at(2, Timestamp::from_micros(2000)).unwrap())
        .unwrap();
    graph.close_input_stream("input").unwrap();
    graph.wait_until_done().unwrap();

    assert!(!graph.has_error());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// A thinner graph with a presence companion: `try_get_next(false)` never
/// blocks and reports only the cycles that produced output.
#[test]
fn presence_gated_non_blocking_poll() {
    setup();
    let config = GraphConfig::new()
        .input_stream("input")
        .output_stream("output")
        .output_stream("presence")
        .node("PacketThinnerCalculator", "input", "output")
        .node("PacketPresenceCalculator", "output", "presence");
    let graph = Graph::from_config(&config).unwrap();

    let mut stream = OutputStream::<i32>::new(
        &graph,
        "output",
        OutputStreamOptions {
            presence_stream: Some("presence".to_string()),
            ..OutputStreamOptions::default()
        },
    )
    .unwrap();
    stream.start_polling().unwrap();

    graph.start_run().unwrap();

    // Even timestamps pass the thinner, odd ones are dropped.
    for (value, micros) in [(1, 2), (2, 3), (3, 4)] {
        graph
            .add_packet_to_input_stream(
                "input",
                Packet::new_at(value, Timestamp::from_micros(micros)).unwrap(),
            )
            .unwrap();
    }
    graph.wait_until_idle().unwrap();

    // One poll per cycle: the dropped middle cycle reports no output.
    let mut results = Vec::new();
    for _ in 0..3 {
        results.push(stream.try_get_next(false).unwrap());
    }
    assert_eq!(results, vec![Some(1), None, Some(3)]);

    // Nothing queued: the non-blocking poll answers immediately.
    assert_eq!(stream.try_get_next(false).unwrap(), None);

    graph.close_input_stream("input").unwrap();
    graph.wait_until_done().unwrap();
    stream.close().unwrap();
}

/// GPU buffers come back with a fence tied to the producing cycle; waiting
/// on it is required (and sufficient) before reading, and the token is
/// strictly one-shot.
#[test]
fn gpu_buffer_hand_off_with_fence() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut poller = graph
        .add_output_stream_poller::<GpuBuffer>("output", false)
        .unwrap()
        .take()
        .unwrap();
    graph.start_run().unwrap();

    let pixels = vec![10_u8, 20, 30, 40];
    graph
        .add_packet_to_input_stream(
            "input",
            Packet::new_at(GpuBuffer::new(2, 2, pixels.clone()), Timestamp::from_micros(0))
                .unwrap(),
        )
        .unwrap();
    graph.close_input_stream("input").unwrap();

    let mut packet = Packet::<GpuBuffer>::empty().unwrap();
    assert!(poller.next(&mut packet).unwrap());
    let mut buffer = packet.get().unwrap();
    let mut sync = buffer.take_sync_point().expect("fence expected");
    sync.wait().unwrap();
    assert_eq!(buffer.data, pixels);
    assert!(matches!(
        sync.wait(),
        Err(Error::UseAfterConsume("SyncPoint"))
    ));

    graph.wait_until_done().unwrap();
}

/// Engine-side failures surface as `BadStatus` with the foreign code.
#[test]
fn engine_errors_surface_as_bad_status() {
    setup();

    // Unparseable config.
    match Graph::new("nonsense") {
        Err(Error::BadStatus { code, .. }) => assert_eq!(code, StatusCode::InvalidArgument),
        other => panic!("expected BadStatus, got {other:?}"),
    }

    // Unknown output stream.
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let result = graph
        .add_output_stream_poller::<i32>("missing", false)
        .unwrap()
        .take();
    match result {
        Err(Error::BadStatus { code, .. }) => assert_eq!(code, StatusCode::NotFound),
        other => panic!("expected BadStatus, got {other:?}"),
    }

    // Pushing before the run starts.
    let packet = Packet::new_at(1, Timestamp::from_micros(0)).unwrap();
    match graph.add_packet_to_input_stream("input", packet) {
        Err(Error::BadStatus { code, .. }) => {
            assert_eq!(code, StatusCode::FailedPrecondition);
        }
        other => panic!("expected BadStatus, got {other:?}"),
    }

    // Non-increasing input timestamps.
    graph.start_run().unwrap();
    graph
        .add_packet_to_input_stream("input", Packet::new_at(1, Timestamp::from_micros(10)).unwrap())
        .unwrap();
    match graph
        .add_packet_to_input_stream("input", Packet::new_at(2, Timestamp::from_micros(10)).unwrap())
    {
        Err(Error::BadStatus { code, .. }) => assert_eq!(code, StatusCode::InvalidArgument),
        other => panic!("expected BadStatus, got {other:?}"),
    }

    // Malformed stream specs never reach the engine.
    assert!(matches!(
        graph.add_output_stream_poller::<i32>("2Invalid", false),
        Err(Error::InvalidName(_))
    ));

    graph.close_all_packet_sources().unwrap();
    graph.wait_until_done().unwrap();
}

/// Cancellation stops the run; `wait_until_done` returns once the worker
/// has wound down and pollers report closure.
#[test]
fn cancel_closes_pollers() {
    setup();
    let graph = Graph::from_config(&pass_through_config()).unwrap();
    let mut poller = graph
        .add_output_stream_poller::<i32>("output", false)
        .unwrap()
        .take()
        .unwrap();
    graph.start_run().unwrap();
    graph.cancel().unwrap();
    graph.wait_until_done().unwrap();

    let mut packet = Packet::<i32>::empty().unwrap();
    assert!(!poller.next(&mut packet).unwrap());
}

/// The async path delivers "no output this cycle" events for thinned
/// cycles when timestamp bounds are observed.
#[test]
fn thinned_cycles_report_no_output() {
    setup();
    let config = GraphConfig::new()
        .input_stream("input")
        .output_stream("output")
        .node("PacketThinnerCalculator", "input", "output");
    let graph = Graph::from_config(&config).unwrap();
    let stream = OutputStream::<i32>::new(
        &graph,
        "output",
        OutputStreamOptions {
            observe_timestamp_bounds: true,
            timeout: Duration::ZERO,
            ..OutputStreamOptions::default()
        },
    )
    .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    stream.add_listener(move |output| {
        sink.lock().unwrap().push((output.timestamp.micros(), output.value));
    });

    graph.start_run().unwrap();
    graph
        .add_packet_to_input_stream("input", Packet::new_at(1, Timestamp::from_micros(2)).unwrap())
        .unwrap();
    graph
        .add_packet_to_input_stream("input", Packet::new_at(2, Timestamp::from_micros(3)).unwrap())
        .unwrap();
    graph.close_input_stream("input").unwrap();
    graph.wait_until_done().unwrap();

    // Give the dispatcher a moment to drain.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while events.lock().unwrap().len() < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(
        *events.lock().unwrap(),
        vec![(2, Some(1)), (3, None)],
        "the even cycle passes, the odd cycle reports no output"
    );
    drop(stream);
}
