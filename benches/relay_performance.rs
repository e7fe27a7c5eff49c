//! Performance benchmarks for the relay hot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lobby_relay::error::Result;
use lobby_relay::metrics::MetricsCollector;
use lobby_relay::protocol::OutboundMessage;
use lobby_relay::registry::MessageSink;
use lobby_relay::session::{Session, SessionHandler};
use lobby_relay::utils::current_timestamp;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// Sink that discards everything
struct NullSink;

impl MessageSink for NullSink {
    fn deliver(&self, message: OutboundMessage) -> Result<()> {
        black_box(message);
        Ok(())
    }
}

fn create_bench_handler() -> SessionHandler {
    SessionHandler::new(Arc::new(
        MetricsCollector::new().expect("Failed to create metrics collector"),
    ))
}

fn connect(handler: &SessionHandler) -> Session {
    handler
        .connect(Arc::new(NullSink))
        .expect("Failed to connect")
}

fn send(handler: &SessionHandler, session: &mut Session, value: serde_json::Value) {
    handler
        .handle_message(session, value.to_string().as_bytes())
        .expect("Failed to handle message");
}

/// One lobby with `members` clients; returns the sender and the lobby id
fn populated_lobby(handler: &SessionHandler, members: usize) -> (Session, String) {
    let mut host = connect(handler);
    send(handler, &mut host, json!({"type": "create_lobby"}));
    let lobby_id = host
        .current_lobby_id()
        .expect("Host should be in lobby")
        .to_string();

    for _ in 1..members {
        let mut guest = connect(handler);
        send(handler, &mut guest, json!({"type": "join_lobby", "lobby_id": lobby_id}));
    }

    (host, lobby_id)
}

fn bench_relay_fan_out(c: &mut Criterion) {
    let handler = create_bench_handler();
    let (mut host, lobby_id) = populated_lobby(&handler, 8);
    let frame = json!({"type": "relay", "lobby_id": lobby_id, "payload": {"x": 1.5, "y": -3.0}})
        .to_string();

    c.bench_function("relay_fan_out_8_members", |b| {
        b.iter(|| {
            handler
                .handle_message(&mut host, black_box(frame.as_bytes()))
                .expect("Relay failed")
        })
    });
}

fn bench_lobby_list(c: &mut Criterion) {
    let handler = create_bench_handler();
    for _ in 0..100 {
        populated_lobby(&handler, 2);
    }

    c.bench_function("lobby_list_100_lobbies", |b| {
        b.iter(|| black_box(handler.list_lobbies().expect("List failed")))
    });
}

fn bench_presence_sweep(c: &mut Criterion) {
    let handler = create_bench_handler();
    for _ in 0..100 {
        populated_lobby(&handler, 4);
    }

    c.bench_function("presence_sweep_400_fresh_members", |b| {
        b.iter(|| {
            black_box(
                handler
                    .sweep_presence(current_timestamp(), Duration::from_secs(45))
                    .expect("Sweep failed"),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_relay_fan_out,
    bench_lobby_list,
    bench_presence_sweep
);
criterion_main!(benches);
