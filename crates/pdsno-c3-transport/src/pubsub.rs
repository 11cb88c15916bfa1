//! In-memory pub/sub broker with MQTT-style wildcard matching (spec §5).
//! Grounded on `pdsno_bus::registry::InProcessBus` (per-recipient mpsc
//! channel registry) generalized from exact recipient IDs to topic patterns
//! via `pdsno_bus::topic_matches`.

use std::sync::Arc;

use dashmap::DashMap;
use pdsno_bus::topic_matches;
use pdsno_types::Envelope;
use tokio::sync::mpsc;

pub struct Subscription {
    pub receiver: mpsc::UnboundedReceiver<Envelope>,
}

#[derive(Clone)]
pub struct InMemoryBroker {
    subscribers: Arc<DashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self, pattern: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(pattern.to_string())
            .or_default()
            .push(tx);
        Subscription { receiver: rx }
    }

    /// Publish to `topic`, delivering to every live subscription whose
    /// pattern matches. Dead (closed) senders are pruned opportunistically.
    pub fn publish(&self, topic: &str, envelope: Envelope) -> usize {
        let mut delivered = 0;
        for mut entry in self.subscribers.iter_mut() {
            if topic_matches(entry.key(), topic) {
                entry.value_mut().retain(|tx| {
                    let ok = tx.send(envelope.clone()).is_ok();
                    if ok {
                        delivered += 1;
                    }
                    ok
                });
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdsno_types::envelope::Destination;

    fn sample_envelope(topic: &str) -> Envelope {
        Envelope {
            message_id: "m1".into(),
            sender_id: "lc_zone_a_1".into(),
            recipient: Destination::Topic(topic.to_string()),
            message_type: "discovery_report".into(),
            payload: serde_json::json!({}),
            signed_at: "2026-01-01T00:00:00Z".into(),
            nonce: "n1".into(),
            signature: "sig".into(),
        }
    }

    #[tokio::test]
    async fn wildcard_subscription_receives_matching_publish() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("discovery/+/report");
        let delivered = broker.publish("discovery/zone_a/report", sample_envelope("discovery/zone_a/report"));
        assert_eq!(delivered, 1);
        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.message_id, "m1");
    }

    #[tokio::test]
    async fn non_matching_topic_is_not_delivered() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("discovery/zone_a/#");
        broker.publish("policy/zone_b/update", sample_envelope("policy/zone_b/update"));
        assert!(sub.receiver.try_recv().is_err());
    }
}
