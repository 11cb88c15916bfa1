//! `TransportRouter`: the single façade C2/C4/C5/C6 call through. Picks a
//! transport per `policy::preferred_transport`, falling over to the
//! documented alternate on failure (spec §5 "Fallback hierarchy").

use std::sync::Arc;

use pdsno_types::catalog::MessageType;
use pdsno_types::Envelope;
use tracing::warn;

use crate::errors::TransportError;
use crate::policy::{preferred_transport, TransportKind};
use crate::pubsub::{InMemoryBroker, Subscription};
use crate::transport::UnicastTransport;

pub struct TransportRouter {
    bus: Option<Arc<dyn UnicastTransport>>,
    http: Option<Arc<dyn UnicastTransport>>,
    pubsub: Arc<InMemoryBroker>,
}

impl TransportRouter {
    pub fn new(
        bus: Option<Arc<dyn UnicastTransport>>,
        http: Option<Arc<dyn UnicastTransport>>,
        pubsub: Arc<InMemoryBroker>,
    ) -> Self {
        Self { bus, http, pubsub }
    }

    fn unicast_for(&self, kind: TransportKind) -> Option<&Arc<dyn UnicastTransport>> {
        match kind {
            TransportKind::Bus => self.bus.as_ref(),
            TransportKind::Http => self.http.as_ref(),
            TransportKind::PubSub => None,
        }
    }

    /// Route a unicast envelope per policy, topic envelopes go through
    /// `publish` instead.
    pub async fn send(&self, message_type: MessageType, envelope: Envelope) -> Result<(), TransportError> {
        let (primary, fallback) = preferred_transport(message_type);

        if primary == TransportKind::PubSub {
            let topic = match &envelope.recipient {
                pdsno_types::envelope::Destination::Topic(t) => t.clone(),
                pdsno_types::envelope::Destination::Controller(id) => {
                    format!("controller/{id}")
                }
            };
            self.pubsub.publish(&topic, envelope.clone());
            return Ok(());
        }

        let transport = self
            .unicast_for(primary)
            .ok_or_else(|| TransportError::UnknownRecipient("no primary transport configured".into()))?;
        match transport.send(envelope.clone()).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                let Some(fallback_kind) = fallback else {
                    return Err(primary_err);
                };
                warn!(?primary, ?fallback_kind, error = %primary_err, "primary transport failed, trying fallback");
                let fallback_transport = self
                    .unicast_for(fallback_kind)
                    .ok_or(primary_err)?;
                fallback_transport.send(envelope).await
            }
        }
    }

    pub fn publish(&self, topic: &str, envelope: Envelope) -> usize {
        self.pubsub.publish(topic, envelope)
    }

    pub fn subscribe(&self, pattern: &str) -> Subscription {
        self.pubsub.subscribe(pattern)
    }
}
