// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Minimal end-to-end demo: a pass-through graph with both retrieval
//! protocols.
//!
//! ```sh
//! cargo run --example pass_through -- --packets 10
//! ```

use clap::Parser;
use mediagraph::{Graph, GraphConfig, OutputStream, OutputStreamOptions, Packet, Timestamp};
use tracing::info;

#[derive(Parser)]
#[command(about = "Push packets through a pass-through graph")]
struct Args {
    /// Number of packets to push.
    #[arg(long, default_value_t = 10)]
    packets: i64,

    /// Microseconds between packet timestamps.
    #[arg(long, default_value_t = 1000)]
    interval: i64,
}

fn main() -> Result<(), mediagraph::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let config = GraphConfig::new()
        .input_stream("input")
        .output_stream("output")
        .node("PassThroughCalculator", "input", "output");

    let graph = Graph::from_config(&config)?;

    // Async retrieval: listeners fire on the stream's dispatcher thread.
    let stream = OutputStream::<i32>::new(&graph, "output", OutputStreamOptions::default())?;
    stream.add_listener(|output| {
        if let Some(value) = output.value {
            info!("listener received {value} at {}", output.timestamp);
        }
    });

    // Sync retrieval: a blocking poller on the same stream.
    let mut poller = graph.add_output_stream_poller::<i32>("output", false)?.take()?;

    graph.start_run()?;
    for i in 0..args.packets {
        let packet = Packet::new_at(i as i32, Timestamp::from_micros(i * args.interval))?;
        graph.add_packet_to_input_stream("input", packet)?;
    }
    graph.close_input_stream("input")?;

    let mut packet = Packet::<i32>::empty()?;
    while poller.next(&mut packet)? {
        info!(
            "poller received {} at {}",
            packet.get()?,
            packet.timestamp()?
        );
    }

    graph.wait_until_done()?;
    info!("graph finished without error: {}", !graph.has_error());
    Ok(())
}
