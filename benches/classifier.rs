use criterion::{criterion_group, criterion_main, Criterion};
use signal_relay::broadcast::RelayPayload;
use signal_relay::protocol::classify;
use signal_relay::server::{RelayServer, RelayServerConfig};
use std::hint::black_box;

fn bench_classifier(c: &mut Criterion) {
    let offer = RelayPayload::text(format!(
        r#"{{"type":"offer","sdp":"{}"}}"#,
        "a=candidate ".repeat(64)
    ));
    let webcam = RelayPayload::text(
        r#"{"type":"data-channel-message","payload":"[Binary data: 4096 bytes]","clientId":"cam-1"}"#,
    );
    let garbage = RelayPayload::binary(vec![0xFFu8; 1024]);

    c.bench_function("classify_signaling", |b| {
        b.iter(|| black_box(classify(offer.clone())));
    });

    c.bench_function("classify_webcam_notice", |b| {
        b.iter(|| black_box(classify(webcam.clone())));
    });

    c.bench_function("classify_malformed", |b| {
        b.iter(|| black_box(classify(garbage.clone())));
    });
}

fn bench_fanout(c: &mut Criterion) {
    let server = RelayServer::new(RelayServerConfig {
        announce_client_id: false,
        outbound_queue_capacity: 1,
        ..RelayServerConfig::default()
    });
    let (sender, _sender_rx) = server.connect_client(None);
    // Queues stay full after the first send, so each iteration measures the
    // snapshot and enqueue attempts without unbounded memory growth
    let _peers: Vec<_> = (0..16).map(|_| server.connect_client(None)).collect();
    let candidate = RelayPayload::text(r#"{"type":"ice-candidate","candidate":"x"}"#);

    c.bench_function("handle_inbound_fanout_16", |b| {
        b.iter(|| black_box(server.handle_inbound(sender.id(), candidate.clone())));
    });
}

criterion_group!(classifier, bench_classifier, bench_fanout);
criterion_main!(classifier);
