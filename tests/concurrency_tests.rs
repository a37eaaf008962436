//! Ordering, completeness and isolation under concurrent senders.


use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use test_helpers::{expect_silence, next_data, quiet_config, start_relay, RECV_TIMEOUT};
use tokio_tungstenite::tungstenite::Message;

const SENDERS: usize = 4;
const MESSAGES_PER_SENDER: usize = 50;

/// Checks per-sender ordering of relayed candidates and counts them.
#[derive(Default)]
struct DeliveryLog {
    next_expected: HashMap<u64, u64>,
}

impl DeliveryLog {
    fn record(&mut self, message: Option<Message>, receiver: &str) -> u64 {
        let text = match message {
            Some(Message::Text(text)) => text,
            other => panic!("{receiver} stopped receiving, got {other:?}"),
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        let sender = value["sender"].as_u64().unwrap();
        let seq = value["seq"].as_u64().unwrap();

        let expected = self.next_expected.entry(sender).or_insert(0);
        assert_eq!(
            seq, *expected,
            "{receiver}: sender {sender} delivered out of order"
        );
        *expected += 1;
        sender
    }

    fn assert_complete_from(&self, senders: impl Iterator<Item = u64>) {
        let mut expected: Vec<u64> = senders.collect();
        expected.sort_unstable();
        let mut seen: Vec<u64> = self.next_expected.keys().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, expected);
        assert!(self
            .next_expected
            .values()
            .all(|count| *count == MESSAGES_PER_SENDER as u64));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_client_gets_all_other_senders_in_order() {
    let relay = start_relay(quiet_config()).await;

    let mut observer = relay.connect().await;
    let mut senders = Vec::with_capacity(SENDERS);
    for _ in 0..SENDERS {
        senders.push(relay.connect().await);
    }

    let tasks: Vec<_> = senders
        .into_iter()
        .enumerate()
        .map(|(sender, ws)| {
            let sender = sender as u64;
            tokio::spawn(async move {
                let (mut outgoing, mut incoming) = ws.split();
                let send_all = async {
                    for seq in 0..MESSAGES_PER_SENDER {
                        let message =
                            format!(r#"{{"type":"ice-candidate","sender":{sender},"seq":{seq}}}"#);
                        outgoing.send(Message::text(message)).await.unwrap();
                    }
                };
                let receive_all = async {
                    let receiver = format!("sender {sender}");
                    let mut log = DeliveryLog::default();
                    for _ in 0..(SENDERS - 1) * MESSAGES_PER_SENDER {
                        let message = next_data(&mut incoming, RECV_TIMEOUT).await;
                        let from = log.record(message, &receiver);
                        assert_ne!(from, sender, "sender {sender} received its own message");
                    }
                    log
                };
                let ((), log) = tokio::join!(send_all, receive_all);

                log.assert_complete_from((0..SENDERS as u64).filter(|other| *other != sender));
                expect_silence(&mut incoming).await;
                // Keep the socket open until every client is checked
                (outgoing, incoming)
            })
        })
        .collect();

    let mut log = DeliveryLog::default();
    for _ in 0..SENDERS * MESSAGES_PER_SENDER {
        log.record(next_data(&mut observer, RECV_TIMEOUT).await, "observer");
    }
    log.assert_complete_from(0..SENDERS as u64);
    expect_silence(&mut observer).await;

    let mut sockets = Vec::with_capacity(SENDERS);
    for task in tasks {
        sockets.push(task.await.unwrap());
    }
    assert_eq!(relay.server.registry().len(), SENDERS + 1);
}
