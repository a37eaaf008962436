use crate::metrics::MetricsSnapshot;

/// Render a metrics snapshot in the Prometheus text exposition format
/// (version 0.0.4).
pub(crate) fn render_prometheus_metrics(snapshot: &MetricsSnapshot, live_clients: usize) -> String {
    use std::fmt::Write;

    fn write_metric(buf: &mut String, name: &str, help: &str, metric_type: &str, value: u64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} {metric_type}");
        let _ = writeln!(buf, "{name} {value}");
    }

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "counter", value);
    }

    fn gauge(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "gauge", value);
    }

    let mut buf = String::with_capacity(2048);
    let connections = &snapshot.connections;
    let traffic = &snapshot.traffic;
    let fanout = &snapshot.fanout;

    counter(
        &mut buf,
        "signal_relay_connections_total",
        "Connections accepted since start",
        connections.total_connections,
    );
    gauge(
        &mut buf,
        "signal_relay_connections_active",
        "Currently registered connections",
        connections.active_connections,
    );
    gauge(
        &mut buf,
        "signal_relay_registry_clients",
        "Clients present in the registry",
        live_clients as u64,
    );
    counter(
        &mut buf,
        "signal_relay_disconnections_total",
        "Connections unregistered since start",
        connections.disconnections,
    );
    counter(
        &mut buf,
        "signal_relay_idle_disconnects_total",
        "Connections closed by the idle reaper",
        connections.idle_disconnects,
    );
    counter(
        &mut buf,
        "signal_relay_websocket_errors_total",
        "WebSocket read or write errors",
        connections.websocket_errors,
    );

    counter(
        &mut buf,
        "signal_relay_messages_received_total",
        "Inbound messages accepted for dispatch",
        traffic.messages_received,
    );
    counter(
        &mut buf,
        "signal_relay_signaling_messages_total",
        "Inbound signaling messages",
        traffic.signaling_messages,
    );
    counter(
        &mut buf,
        "signal_relay_generic_messages_total",
        "Inbound JSON messages outside the signaling vocabulary",
        traffic.generic_messages,
    );
    counter(
        &mut buf,
        "signal_relay_data_channel_messages_total",
        "Inbound data-channel messages consumed locally",
        traffic.data_channel_messages,
    );
    counter(
        &mut buf,
        "signal_relay_malformed_messages_total",
        "Inbound payloads that were not JSON",
        traffic.malformed_messages,
    );
    counter(
        &mut buf,
        "signal_relay_oversized_messages_total",
        "Inbound messages dropped for exceeding the size limit",
        traffic.oversized_messages,
    );

    counter(
        &mut buf,
        "signal_relay_broadcasts_total",
        "Broadcast fan-outs performed",
        fanout.broadcasts,
    );
    counter(
        &mut buf,
        "signal_relay_deliveries_total",
        "Payloads enqueued to recipients",
        fanout.deliveries,
    );
    counter(
        &mut buf,
        "signal_relay_skipped_closed_total",
        "Recipients skipped because they were no longer open",
        fanout.skipped_closed_recipients,
    );
    counter(
        &mut buf,
        "signal_relay_send_failures_total",
        "Per-recipient enqueue failures",
        fanout.send_failures,
    );

    buf
}
