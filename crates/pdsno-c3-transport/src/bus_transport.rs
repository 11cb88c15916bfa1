//! `UnicastTransport` adapter over `pdsno_bus::InProcessBus` (spec §5, "Bus
//! tier: same-process delivery").

use async_trait::async_trait;
use pdsno_bus::{DispatchError, InProcessBus};
use pdsno_types::envelope::Destination;
use pdsno_types::Envelope;

use crate::errors::TransportError;
use crate::transport::UnicastTransport;

pub struct BusTransport {
    bus: InProcessBus,
    sender_id: String,
}

impl BusTransport {
    pub fn new(bus: InProcessBus, sender_id: impl Into<String>) -> Self {
        Self {
            bus,
            sender_id: sender_id.into(),
        }
    }
}

#[async_trait]
impl UnicastTransport for BusTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let Destination::Controller(recipient_id) = &envelope.recipient else {
            return Err(TransportError::UnknownRecipient(
                "bus transport only delivers to a named controller".to_string(),
            ));
        };
        let recipient_id = recipient_id.clone();
        self.bus
            .send(&self.sender_id, &recipient_id, envelope)
            .map_err(|e| match e {
                DispatchError::UnknownRecipient(id) => TransportError::UnknownRecipient(id),
                DispatchError::Closed => TransportError::Closed,
            })
    }
}
