//! The point-to-point transport port (spec §5): one envelope in, delivered
//! or a typed failure out. `BusTransport` and `HttpTransport` both implement
//! this so `TransportRouter` can fail over between them per `policy`.

use async_trait::async_trait;
use pdsno_types::Envelope;

use crate::errors::TransportError;

#[async_trait]
pub trait UnicastTransport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}
